use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::auth::{RequireUser, require_endpoint, require_guardian};
use crate::membership::Membership;
use crate::repository::Entity;
use crate::server::AppState;
use crate::server::dto::{StudentResponse, UserRef};
use crate::server::response::{ApiResponse, ApiResult};
use crate::store::Unlinked;
use crate::types::{NewStudent, Student, StudentId, StudentPatch};

const SECTION: &str = "/students";

fn student_response(state: &AppState, student: Student) -> ApiResult<StudentResponse> {
    let guardians = state.store.list_guardians(student.id)?;
    Ok(StudentResponse { student, guardians })
}

/// Students the caller is a guardian of.
pub async fn list_students(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiResponse<Vec<Student>>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    let students = state.store.list_user_students(&user.id)?;
    Ok(Json(ApiResponse::success(students)))
}

pub async fn create_student(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewStudent>,
) -> ApiResult<(StatusCode, Json<ApiResponse<StudentResponse>>)> {
    require_endpoint(&state.policy, &user, SECTION)?;
    let student = Membership::new(state.store.as_ref()).create_student_for(&user.id, &req)?;
    let response = student_response(&state, student)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn get_student(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<StudentId>,
) -> ApiResult<Json<ApiResponse<StudentResponse>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_guardian(state.store.as_ref(), &user, id)?;
    let student = Student::open(state.store.as_ref(), &id)?;
    Ok(Json(ApiResponse::success(student_response(&state, student)?)))
}

pub async fn update_student(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<StudentId>,
    Json(patch): Json<StudentPatch>,
) -> ApiResult<Json<ApiResponse<StudentResponse>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_guardian(state.store.as_ref(), &user, id)?;
    let student = Student::update(state.store.as_ref(), &id, patch)?;
    Ok(Json(ApiResponse::success(student_response(&state, student)?)))
}

/// Unlinks the caller as a guardian. The student itself goes away with its
/// last guardian. Admins who are not guardians delete the student outright.
pub async fn delete_student(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<StudentId>,
) -> ApiResult<Json<ApiResponse<Unlinked>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_guardian(state.store.as_ref(), &user, id)?;

    let membership = Membership::new(state.store.as_ref());
    let outcome = if membership.is_guardian(&user.id, id)? {
        membership.remove_guardian(&user.id, id)?
    } else {
        Unlinked {
            removed: false,
            pruned: Student::delete(state.store.as_ref(), &id)?,
        }
    };
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn add_guardian(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<StudentId>,
    Json(req): Json<UserRef>,
) -> ApiResult<Json<ApiResponse<StudentResponse>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_guardian(state.store.as_ref(), &user, id)?;
    Membership::new(state.store.as_ref()).add_guardian(&req.user_id, id)?;
    let student = Student::open(state.store.as_ref(), &id)?;
    Ok(Json(ApiResponse::success(student_response(&state, student)?)))
}
