use std::sync::Arc;

use axum::{Json, extract::State};

use crate::auth::RequireUser;
use crate::repository;
use crate::server::AppState;
use crate::server::dto::MeResponse;
use crate::server::response::{ApiResponse, ApiResult};
use crate::types::{Identity, User};

fn me_response(state: &AppState, user: User) -> MeResponse {
    let endpoints = state.policy.endpoints_for(&user.roles);
    MeResponse { user, endpoints }
}

/// Called by the OAuth proxy with the identity it just verified.
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(identity): Json<Identity>,
) -> ApiResult<Json<ApiResponse<MeResponse>>> {
    let user = repository::sign_in(state.store.as_ref(), identity)?;
    Ok(Json(ApiResponse::success(me_response(&state, user))))
}

pub async fn me(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiResponse<MeResponse>>> {
    Ok(Json(ApiResponse::success(me_response(&state, user))))
}
