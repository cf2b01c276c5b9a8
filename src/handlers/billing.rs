use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    AppState,
    auth::AuthUser,
    billing::Billing,
    error::AppError,
    membership::Membership,
    permissions::{Action, Resource},
};

/// get_organization_billing
///
/// [Authenticated Route] Current monthly bill of the organization. The body is the
/// `Billing` object itself, not wrapped in a `billing` field.
#[utoipa::path(
    get,
    path = "/organizations/{slug}/billing",
    params(("slug" = String, Path, description = "Organization slug")),
    responses(
        (status = 200, description = "Billing", body = Billing),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn get_organization_billing(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Billing>, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Get,
        Resource::Billing,
        "You're not allowed to get billing details from this organization.",
    )?;

    let organization_id = membership.organization.id;
    let (seats, projects) = tokio::try_join!(
        state.repo.count_billable_members(organization_id),
        state.repo.count_projects(organization_id),
    )?;

    Ok(Json(Billing::compute(seats, projects)))
}
