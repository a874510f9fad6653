mod camps;
mod levels;
mod programs;
mod session;
mod students;
mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Session routes
        .route("/sign-in", post(session::sign_in))
        .route("/me", get(session::me))
        // Student routes
        .route(
            "/students",
            get(students::list_students).post(students::create_student),
        )
        .route(
            "/students/{id}",
            get(students::get_student)
                .patch(students::update_student)
                .delete(students::delete_student),
        )
        .route("/students/{id}/guardians", post(students::add_guardian))
        // Program routes
        .route(
            "/programs",
            get(programs::list_programs).post(programs::create_program),
        )
        .route(
            "/programs/{id}",
            get(programs::get_program)
                .patch(programs::update_program)
                .delete(programs::delete_program),
        )
        .route("/programs/{id}/owners", post(programs::add_owner))
        // Level routes
        .route(
            "/programs/{id}/levels",
            get(levels::list_levels).post(levels::create_level),
        )
        .route(
            "/programs/{id}/levels/{level_id}",
            patch(levels::update_level).delete(levels::delete_level),
        )
        .route(
            "/programs/{id}/levels/{level_id}/move",
            post(levels::move_level),
        )
        // Camp routes
        .route("/camps", get(camps::list_camps).post(camps::create_camp))
        .route(
            "/camps/{id}",
            get(camps::get_camp)
                .patch(camps::update_camp)
                .delete(camps::delete_camp),
        )
        .route("/camps/{id}/instructors", post(camps::add_instructor))
        .route(
            "/camps/{id}/instructors/{user_id}",
            delete(camps::remove_instructor),
        )
        .route(
            "/camps/{id}/instructors/{user_id}/primary",
            post(camps::make_primary),
        )
        // User administration routes
        .route("/users", get(users::list_users))
        .route("/users/{id}", get(users::get_user).delete(users::delete_user))
        .route("/users/{id}/roles", put(users::set_roles))
        .route("/users/{id}/emails", post(users::add_email))
        .route("/users/{id}/emails/primary", post(users::set_primary_email))
}
