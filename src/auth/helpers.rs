use crate::error::Error;
use crate::membership::Membership;
use crate::policy::AccessPolicy;
use crate::server::response::ApiError;
use crate::store::Store;
use crate::types::{ADMIN, CampId, ProgramId, StudentId, User};

/// Rejects the request unless one of the user's roles lists `section`.
pub fn require_endpoint(policy: &AccessPolicy, user: &User, section: &str) -> Result<(), ApiError> {
    policy.require(user, section).map_err(|e| {
        tracing::warn!("{e}");
        ApiError::from(e)
    })
}

pub fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.has_role(ADMIN) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Admin role required"))
    }
}

/// Guardians of the student, and admins, may act on it.
pub fn require_guardian(store: &dyn Store, user: &User, student_id: StudentId) -> Result<(), ApiError> {
    if store.get_student(student_id)?.is_none() {
        return Err(Error::NotFound.into());
    }
    if user.has_role(ADMIN) || Membership::new(store).is_guardian(&user.id, student_id)? {
        return Ok(());
    }
    Err(ApiError::forbidden("Not a guardian of this student"))
}

/// Owners of the program, and admins, may act on it.
pub fn require_program_owner(
    store: &dyn Store,
    user: &User,
    program_id: ProgramId,
) -> Result<(), ApiError> {
    if store.get_program(program_id)?.is_none() {
        return Err(Error::NotFound.into());
    }
    if user.has_role(ADMIN) || Membership::new(store).is_program_owner(&user.id, program_id)? {
        return Ok(());
    }
    Err(ApiError::forbidden("Not an owner of this program"))
}

/// A camp is managed by the owners of the program it runs.
pub fn require_camp_manager(store: &dyn Store, user: &User, camp_id: CampId) -> Result<(), ApiError> {
    let camp = store.get_camp(camp_id)?.ok_or(Error::NotFound)?;
    require_program_owner(store, user, camp.program_id)
}
