use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::auth::{RequireUser, require_endpoint, require_program_owner};
use crate::error::Error;
use crate::ordering::LevelList;
use crate::repository::Entity;
use crate::server::AppState;
use crate::server::dto::MoveLevelRequest;
use crate::server::response::{ApiResponse, ApiResult};
use crate::store::Store;
use crate::types::{Level, LevelId, LevelPatch, NewLevel, Program, ProgramId};

const SECTION: &str = "/programs";

/// Loads a level, treating one that belongs to another program as missing.
fn level_of(store: &dyn Store, program_id: ProgramId, level_id: LevelId) -> ApiResult<Level> {
    match store.get_level(level_id)? {
        Some(level) if level.program_id == program_id => Ok(level),
        _ => Err(Error::NotFound.into()),
    }
}

pub async fn list_levels(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProgramId>,
) -> ApiResult<Json<ApiResponse<Vec<Level>>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    Program::open(state.store.as_ref(), &id)?;
    let levels = LevelList::new(state.store.as_ref(), id).sorted()?;
    Ok(Json(ApiResponse::success(levels)))
}

/// Appends a level at the end of the program's order.
pub async fn create_level(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProgramId>,
    Json(req): Json<NewLevel>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Level>>)> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_program_owner(state.store.as_ref(), &user, id)?;
    let level = Level::create_new(state.store.as_ref(), (id, req))?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(level))))
}

pub async fn update_level(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, level_id)): Path<(ProgramId, LevelId)>,
    Json(patch): Json<LevelPatch>,
) -> ApiResult<Json<ApiResponse<Level>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_program_owner(state.store.as_ref(), &user, id)?;
    level_of(state.store.as_ref(), id, level_id)?;
    let level = Level::update(state.store.as_ref(), &level_id, patch)?;
    Ok(Json(ApiResponse::success(level)))
}

pub async fn delete_level(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, level_id)): Path<(ProgramId, LevelId)>,
) -> ApiResult<StatusCode> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_program_owner(state.store.as_ref(), &user, id)?;
    level_of(state.store.as_ref(), id, level_id)?;
    LevelList::new(state.store.as_ref(), id).delete(level_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Moves a level and returns the program's levels in their new order.
pub async fn move_level(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((id, level_id)): Path<(ProgramId, LevelId)>,
    Json(req): Json<MoveLevelRequest>,
) -> ApiResult<Json<ApiResponse<Vec<Level>>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_program_owner(state.store.as_ref(), &user, id)?;
    level_of(state.store.as_ref(), id, level_id)?;

    let list = LevelList::new(state.store.as_ref(), id);
    list.move_to(level_id, req.list_index)?;
    Ok(Json(ApiResponse::success(list.sorted()?)))
}
