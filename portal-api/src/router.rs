//! API Router
//!
//! Route definitions for the portal API. Everything except health, login and
//! registration sits behind the session middleware.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        // Listing and lifecycle
        .route("/", get(handlers::files::list_files))
        .route("/upload", post(handlers::files::upload))
        .route("/download/:file", get(handlers::files::download))
        .route("/delete/:file", post(handlers::files::delete_file))
        // Metadata
        .route("/edit/:file", post(handlers::files::edit_file))
        .route("/update_file/:file", post(handlers::files::update_file))
        .route("/set_note/:file", post(handlers::files::set_note))
        .route("/set_urgency/:file", post(handlers::files::set_urgency))
        .route("/set_stage/:file", post(handlers::files::set_stage))
        .route(
            "/toggle_reviewed/:file",
            post(handlers::files::toggle_reviewed),
        )
        // Archive
        .route("/approve/:file", post(handlers::archive::approve))
        .route("/archive", get(handlers::archive::list_archive))
        .route(
            "/download_archived/:file",
            get(handlers::archive::download_archived),
        )
        .route("/restore/:file", post(handlers::archive::restore))
        .route(
            "/delete_archived/:file",
            post(handlers::archive::delete_archived),
        )
        // Session
        .route("/logout", get(handlers::auth::logout))
        // Administration
        .route("/admin/users", get(handlers::admin::list_users))
        .route("/admin/users/action", post(handlers::admin::user_action))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/login", post(handlers::auth::login))
        .route("/register", post(handlers::auth::register))
        .merge(protected)
        .with_state(state)
}
