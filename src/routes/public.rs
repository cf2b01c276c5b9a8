use crate::{
    AppState,
    handlers::{auth, health_check, invites},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that are **unauthenticated**. None of them exposes organization data
/// beyond what an invitee needs to see before signing in.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancer checks.
        .route("/health", get(health_check))
        // --- Identity ---
        .route("/users", post(auth::create_account))
        .route("/sessions/password", post(auth::authenticate_with_password))
        // Always 201, whether or not the e-mail exists.
        .route("/password/recover", post(auth::request_password_recover))
        .route("/password/reset", post(auth::reset_password))
        // GET /invites/{invite_id}
        // Invite preview for the accept page.
        .route("/invites/{invite_id}", get(invites::get_invite))
}
