use crate::{
    AppState,
    handlers::{auth, billing, invites, members, organizations, projects, uploads},
};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer, so handlers always
/// receive a validated `AuthUser`. Routes under `/organizations/{slug}` additionally
/// resolve the caller's membership and check the permission engine before acting.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/profile", get(auth::get_profile))
        // POST /upload
        // Presigned PUT URL (10 minutes) for a direct-to-storage upload.
        .route("/upload", post(uploads::create_upload))
        // --- Organizations ---
        .route(
            "/organizations",
            post(organizations::create_organization).get(organizations::get_organizations),
        )
        .route(
            "/organizations/{slug}",
            get(organizations::get_organization)
                .put(organizations::update_organization)
                .delete(organizations::shutdown_organization),
        )
        .route(
            "/organizations/{slug}/membership",
            get(organizations::get_membership),
        )
        // PATCH /organizations/{slug}/owner
        // Owner-only: hands the organization to another member.
        .route(
            "/organizations/{slug}/owner",
            patch(organizations::transfer_organization),
        )
        .route(
            "/organizations/{slug}/avatar-url",
            patch(organizations::update_organization_avatar),
        )
        // --- Projects ---
        .route(
            "/organizations/{slug}/projects",
            post(projects::create_project).get(projects::get_projects),
        )
        // GET takes the project slug; PUT and DELETE take the project id.
        .route(
            "/organizations/{slug}/projects/{project}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        // --- Members ---
        .route("/organizations/{slug}/members", get(members::get_members))
        .route(
            "/organizations/{slug}/members/{member_id}",
            put(members::update_member).delete(members::remove_member),
        )
        // --- Invites ---
        .route(
            "/organizations/{slug}/invites",
            post(invites::create_invite).get(invites::get_invites),
        )
        .route(
            "/organizations/{slug}/invites/{invite_id}",
            axum::routing::delete(invites::revoke_invite),
        )
        .route("/pending-invites", get(invites::get_pending_invites))
        .route("/invites/{invite_id}/accept", post(invites::accept_invite))
        .route("/invites/{invite_id}/reject", post(invites::reject_invite))
        // --- Billing ---
        .route(
            "/organizations/{slug}/billing",
            get(billing::get_organization_billing),
        )
}
