use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::auth::{RequireUser, require_admin, require_endpoint};
use crate::repository::{self, Entity};
use crate::server::AppState;
use crate::server::dto::{EmailRequest, SetRolesRequest};
use crate::server::response::{ApiResponse, ApiResult};
use crate::types::User;

const SECTION: &str = "/users";

/// Users manage their own emails; anyone else needs the users section.
fn require_self_or_section(state: &AppState, user: &User, id: &str) -> ApiResult<()> {
    if user.id == id {
        Ok(())
    } else {
        require_endpoint(&state.policy, user, SECTION)
    }
}

pub async fn list_users(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiResponse<Vec<User>>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    let users = state.store.list_users()?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn get_user(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<User>>> {
    require_self_or_section(&state, &user, &id)?;
    let found = User::open(state.store.as_ref(), &id)?;
    Ok(Json(ApiResponse::success(found)))
}

/// Deletes a user after detaching them from students, programs and camps.
pub async fn delete_user(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_admin(&user)?;
    User::delete(state.store.as_ref(), &id)?;
    state.camps.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_roles(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetRolesRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_admin(&user)?;
    let updated = repository::set_roles(state.store.as_ref(), &state.policy, &id, &req.roles)?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn add_email(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    require_self_or_section(&state, &user, &id)?;
    let updated = repository::add_email(state.store.as_ref(), &id, &req.email)?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn set_primary_email(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    require_self_or_section(&state, &user, &id)?;
    let updated = repository::set_primary_email(state.store.as_ref(), &id, &req.email)?;
    Ok(Json(ApiResponse::success(updated)))
}
