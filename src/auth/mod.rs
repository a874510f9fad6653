mod helpers;
mod middleware;

pub use helpers::{require_admin, require_camp_manager, require_endpoint, require_guardian, require_program_owner};
pub use middleware::{AuthError, RequireUser, USER_HEADER};
