//! HTTP handlers, one module per resource.
//!
//! Organization-scoped handlers share one shape: resolve the caller's
//! [`Membership`](crate::membership::Membership) from the slug, ask the permission
//! engine through `Membership::require`, then touch the repository. A denied check
//! returns before any mutation.

pub mod auth;
pub mod billing;
pub mod invites;
pub mod members;
pub mod organizations;
pub mod projects;
pub mod uploads;

use crate::error::AppError;

/// health_check
///
/// [Public Route] Liveness probe for monitoring and load balancers.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health_check() -> &'static str {
    "ok"
}

/// The part after `@` of a syntactically plausible e-mail address.
pub(crate) fn email_domain(email: &str) -> Option<&str> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Some(domain)
        }
        _ => None,
    }
}

pub(crate) fn require_email(email: &str) -> Result<&str, AppError> {
    email_domain(email).ok_or_else(|| AppError::BadRequest("Invalid e-mail address.".to_string()))
}

pub(crate) fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{field} must not be empty.")));
    }
    Ok(())
}
