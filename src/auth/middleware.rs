use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::server::AppState;
use crate::types::User;

/// Header carrying the caller's user id, set by the OAuth proxy in front of
/// the service once the identity provider has vouched for the user.
pub const USER_HEADER: &str = "x-campdesk-user";

/// Extractor that resolves the calling user from [`USER_HEADER`].
pub struct RequireUser {
    pub user: User,
}

#[derive(Debug)]
pub enum AuthError {
    MissingIdentity,
    InvalidHeader,
    UnknownUser,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingIdentity => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidHeader => (StatusCode::UNAUTHORIZED, "Invalid identity header"),
            AuthError::UnknownUser => (StatusCode::UNAUTHORIZED, "Unknown user, sign in first"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });
        (status, Json(body)).into_response()
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_HEADER)
            .ok_or(AuthError::MissingIdentity)?
            .to_str()
            .map_err(|_| AuthError::InvalidHeader)?
            .trim();

        if user_id.is_empty() {
            return Err(AuthError::MissingIdentity);
        }

        let user = state
            .store
            .get_user(user_id)
            .map_err(|e| {
                tracing::error!("Failed to load user {user_id}: {e}");
                AuthError::InternalError
            })?
            .ok_or(AuthError::UnknownUser)?;

        Ok(RequireUser { user })
    }
}
