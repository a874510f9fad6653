use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::auth::{RequireUser, require_endpoint, require_program_owner};
use crate::membership::Membership;
use crate::ordering::LevelList;
use crate::repository::Entity;
use crate::server::AppState;
use crate::server::dto::{ProgramResponse, UserRef};
use crate::server::response::{ApiResponse, ApiResult};
use crate::store::Unlinked;
use crate::types::{NewProgram, Program, ProgramId, ProgramPatch};

const SECTION: &str = "/programs";

fn program_response(state: &AppState, program: Program) -> ApiResult<ProgramResponse> {
    let owners = state.store.list_program_owners(program.id)?;
    let levels = LevelList::new(state.store.as_ref(), program.id).sorted()?;
    Ok(ProgramResponse {
        program,
        owners,
        levels,
    })
}

pub async fn list_programs(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ApiResponse<Vec<Program>>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    let programs = state.store.list_programs()?;
    Ok(Json(ApiResponse::success(programs)))
}

/// Creates a program owned by the caller, who must hold the instructor role.
pub async fn create_program(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewProgram>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ProgramResponse>>)> {
    require_endpoint(&state.policy, &user, SECTION)?;
    let program = Membership::new(state.store.as_ref()).create_program_for(&user.id, &req)?;
    let response = program_response(&state, program)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn get_program(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProgramId>,
) -> ApiResult<Json<ApiResponse<ProgramResponse>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    let program = Program::open(state.store.as_ref(), &id)?;
    Ok(Json(ApiResponse::success(program_response(&state, program)?)))
}

pub async fn update_program(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProgramId>,
    Json(patch): Json<ProgramPatch>,
) -> ApiResult<Json<ApiResponse<ProgramResponse>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_program_owner(state.store.as_ref(), &user, id)?;
    let program = Program::update(state.store.as_ref(), &id, patch)?;
    state.camps.invalidate();
    Ok(Json(ApiResponse::success(program_response(&state, program)?)))
}

/// Unlinks the caller as an owner; the program with its levels and camps is
/// deleted once no owner remains. Admins who do not own it delete it outright.
pub async fn delete_program(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProgramId>,
) -> ApiResult<Json<ApiResponse<Unlinked>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_program_owner(state.store.as_ref(), &user, id)?;

    let membership = Membership::new(state.store.as_ref());
    let outcome = if membership.is_program_owner(&user.id, id)? {
        membership.remove_program_owner(&user.id, id)?
    } else {
        Unlinked {
            removed: false,
            pruned: Program::delete(state.store.as_ref(), &id)?,
        }
    };
    if outcome.pruned {
        state.camps.invalidate();
    }
    Ok(Json(ApiResponse::success(outcome)))
}

pub async fn add_owner(
    RequireUser { user }: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProgramId>,
    Json(req): Json<UserRef>,
) -> ApiResult<Json<ApiResponse<ProgramResponse>>> {
    require_endpoint(&state.policy, &user, SECTION)?;
    require_program_owner(state.store.as_ref(), &user, id)?;
    Membership::new(state.store.as_ref()).add_program_owner(&req.user_id, id)?;
    let program = Program::open(state.store.as_ref(), &id)?;
    Ok(Json(ApiResponse::success(program_response(&state, program)?)))
}
