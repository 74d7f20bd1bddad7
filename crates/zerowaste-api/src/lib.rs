pub mod auth;
pub mod dashboard;
pub mod donations;
pub mod error;
pub mod middleware;
pub mod profiles;
pub mod requests;

use axum::{
    Router,
    routing::{get, post},
};

pub use auth::{AppState, AppStateInner};

/// All API routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/profile", get(profiles::get_profile).patch(profiles::update_profile))
        .route("/admin/profiles/{profile_id}/verify", post(profiles::verify_profile))
        .route("/donations", get(donations::list_open).post(donations::create_donation))
        .route("/donations/mine", get(donations::list_mine))
        .route("/donations/{donation_id}", get(donations::get_donation))
        .route("/donations/{donation_id}/pickup", post(donations::mark_picked_up))
        .route("/donations/{donation_id}/verify", post(donations::verify_donation))
        .route("/donations/{donation_id}/requests", post(requests::create_request))
        .route("/requests/incoming", get(requests::list_incoming))
        .route("/requests/mine", get(requests::list_mine))
        .route("/requests/{request_id}/decision", post(requests::decide_request))
        .route("/dashboard", get(dashboard::get_dashboard))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
