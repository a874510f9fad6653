use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::auth::{RequireUser, require_camp_manager, require_endpoint, require_program_owner};
use crate::membership::Membership;
use crate::repository::Entity;
use crate::server::AppState;
use crate::server::dto::{CampListParams, UserRef};
use crate::server::response::{ApiResponse, ApiResult};
use crate::types::{Camp, CampId, CampListing, CampPatch, NewCamp};

const SECTION: &str = "/camps";

/// Every camp with its program, served from the camp directory.
pub async fn list_camps(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<CampListParams>,
) -> ApiResult<Json<ApiResponse<Vec<CampListing>>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    let camps = if params.refresh {
        state.camps.refresh(state.store.as_ref())?
    } else {
        state.camps.get(state.store.as_ref())?
    };
    Ok(Json(ApiResponse::success((*camps).clone())))
}

pub async fn create_camp(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewCamp>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Camp>>)> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_program_owner(state.store.as_ref(), &user, req.program_id)?;
    let camp = Camp::create_new(state.store.as_ref(), req)?;
    state.camps.invalidate();
    Ok((StatusCode::CREATED, Json(ApiResponse::success(camp))))
}

pub async fn get_camp(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<CampId>,
) -> ApiResult<Json<ApiResponse<Camp>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    let camp = Camp::open(state.store.as_ref(), &id)?;
    Ok(Json(ApiResponse::success(camp)))
}

pub async fn update_camp(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<CampId>,
    Json(patch): Json<CampPatch>,
) -> ApiResult<Json<ApiResponse<Camp>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_camp_manager(state.store.as_ref(), &user, id)?;
    if let Some(program_id) = patch.program_id {
        require_program_owner(state.store.as_ref(), &user, program_id)?;
    }
    let camp = Camp::update(state.store.as_ref(), &id, patch)?;
    state.camps.invalidate();
    Ok(Json(ApiResponse::success(camp)))
}

pub async fn delete_camp(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<CampId>,
) -> ApiResult<StatusCode> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_camp_manager(state.store.as_ref(), &user, id)?;
    Camp::delete(state.store.as_ref(), &id)?;
    state.camps.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_instructor(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<CampId>,
    Json(req): Json<UserRef>,
) -> ApiResult<Json<ApiResponse<Camp>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_camp_manager(state.store.as_ref(), &user, id)?;
    let camp = Membership::new(state.store.as_ref()).add_instructor(id, &req.user_id)?;
    state.camps.invalidate();
    Ok(Json(ApiResponse::success(camp)))
}

/// Camp managers may remove anyone; an instructor may always leave on their own.
pub async fn remove_instructor(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, instructor_id)): Path<(CampId, String)>,
) -> ApiResult<Json<ApiResponse<Camp>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    if instructor_id != user.id {
        require_camp_manager(state.store.as_ref(), &user, id)?;
    }
    let camp = Membership::new(state.store.as_ref()).remove_instructor(id, &instructor_id)?;
    state.camps.invalidate();
    Ok(Json(ApiResponse::success(camp)))
}

pub async fn make_primary(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, instructor_id)): Path<(CampId, String)>,
) -> ApiResult<Json<ApiResponse<Camp>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_camp_manager(state.store.as_ref(), &user, id)?;
    let camp = Membership::new(state.store.as_ref()).make_primary(id, &instructor_id)?;
    state.camps.invalidate();
    Ok(Json(ApiResponse::success(camp)))
}
