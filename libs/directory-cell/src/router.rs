use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put, patch},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn user_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_user).get(handlers::list_users))
        .route("/me", get(handlers::get_current_user))
        .route("/{user_id}", get(handlers::get_user).put(handlers::update_user))
        .route("/{user_id}/deactivate", patch(handlers::deactivate_user))
        .route("/{user_id}/activate", patch(handlers::activate_user))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::browse_doctors));

    let protected_routes = Router::new()
        .route("/profile", post(handlers::create_doctor_profile))
        .route("/profiles", get(handlers::list_doctor_profiles))
        .route("/{doctor_id}/profile", get(handlers::get_doctor_profile))
        .route("/{doctor_id}/profile", put(handlers::update_doctor_profile))
        .route("/{doctor_id}/approve", patch(handlers::approve_doctor_profile))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn specialty_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::list_specialties))
        .with_state(state)
}
