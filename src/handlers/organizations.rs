use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::require_non_empty;
use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    membership::Membership,
    models::{
        CreatedOrganizationResponse, Member, NewOrganization, Organization, OrganizationChanges,
        OrganizationRequest, OrganizationSummary, TransferOwnershipRequest, UpdateAvatarRequest,
    },
    permissions::Action,
    repository::TARGET_NOT_A_MEMBER,
    slug::create_slug,
};

const DOMAIN_TAKEN: &str = "Another organization with same domain already exists.";

/// create_organization
///
/// [Authenticated Route] Creates an organization owned by the caller, who becomes
/// its first ADMIN member.
#[utoipa::path(
    post,
    path = "/organizations",
    request_body = OrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = CreatedOrganizationResponse),
        (status = 400, description = "Invalid name or domain already in use")
    )
)]
pub async fn create_organization(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<OrganizationRequest>,
) -> Result<(StatusCode, Json<CreatedOrganizationResponse>), AppError> {
    require_non_empty(&payload.name, "Name")?;

    if let Some(domain) = payload.domain.as_deref()
        && state
            .repo
            .get_organization_by_domain(domain, None)
            .await?
            .is_some()
    {
        return Err(AppError::BadRequest(DOMAIN_TAKEN.to_string()));
    }

    let slug = create_slug(&payload.name);
    if slug.is_empty() {
        return Err(AppError::BadRequest(
            "Name must contain at least one letter or digit.".to_string(),
        ));
    }

    let organization = state
        .repo
        .create_organization(NewOrganization {
            name: payload.name,
            slug,
            domain: payload.domain,
            should_attach_users_by_domain: payload.should_attach_users_by_domain.unwrap_or(false),
            owner_id: user_id,
        })
        .await?;

    tracing::info!(organization = %organization.slug, owner = %user_id, "organization created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedOrganizationResponse {
            organization_id: organization.id,
        }),
    ))
}

/// get_organizations
///
/// [Authenticated Route] Organizations the caller belongs to, with the caller's role.
#[utoipa::path(
    get,
    path = "/organizations",
    responses((status = 200, description = "My organizations", body = [OrganizationSummary]))
)]
pub async fn get_organizations(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<OrganizationSummary>>, AppError> {
    let organizations = state.repo.get_organizations_by_user(user_id).await?;
    Ok(Json(organizations))
}

/// get_membership
///
/// [Authenticated Route] The caller's membership in the organization.
#[utoipa::path(
    get,
    path = "/organizations/{slug}/membership",
    params(("slug" = String, Path, description = "Organization slug")),
    responses(
        (status = 200, description = "Membership", body = Member),
        (status = 403, description = "Not a member")
    )
)]
pub async fn get_membership(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Member>, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    Ok(Json(membership.member))
}

#[utoipa::path(
    get,
    path = "/organizations/{slug}",
    params(("slug" = String, Path, description = "Organization slug")),
    responses(
        (status = 200, description = "Organization", body = Organization),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn get_organization(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Organization>, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Get,
        membership.organization_resource(),
        "You're not allowed to see this organization.",
    )?;

    Ok(Json(membership.organization))
}

/// update_organization
///
/// [Authenticated Route] Replaces name and domain. An omitted
/// `should_attach_users_by_domain` keeps its current value.
#[utoipa::path(
    put,
    path = "/organizations/{slug}",
    params(("slug" = String, Path, description = "Organization slug")),
    request_body = OrganizationRequest,
    responses(
        (status = 204, description = "Updated"),
        (status = 400, description = "Invalid name or domain already in use"),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn update_organization(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<OrganizationRequest>,
) -> Result<StatusCode, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Update,
        membership.organization_resource(),
        "You're not allowed to update this organization.",
    )?;
    require_non_empty(&payload.name, "Name")?;

    let organization = &membership.organization;
    if let Some(domain) = payload.domain.as_deref()
        && state
            .repo
            .get_organization_by_domain(domain, Some(organization.id))
            .await?
            .is_some()
    {
        return Err(AppError::BadRequest(DOMAIN_TAKEN.to_string()));
    }

    state
        .repo
        .update_organization(
            organization.id,
            OrganizationChanges {
                name: payload.name,
                domain: payload.domain,
                should_attach_users_by_domain: payload
                    .should_attach_users_by_domain
                    .unwrap_or(organization.should_attach_users_by_domain),
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// shutdown_organization
///
/// [Authenticated Route] Deletes the organization with its memberships, projects
/// and invites.
#[utoipa::path(
    delete,
    path = "/organizations/{slug}",
    params(("slug" = String, Path, description = "Organization slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn shutdown_organization(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<StatusCode, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Delete,
        membership.organization_resource(),
        "You're not allowed to shutdown this organization.",
    )?;

    state
        .repo
        .delete_organization(membership.organization.id)
        .await?;

    tracing::info!(organization = %slug, by = %user_id, "organization shut down");
    Ok(StatusCode::NO_CONTENT)
}

/// transfer_organization
///
/// [Authenticated Route] Hands ownership to another member, who is promoted to ADMIN.
/// Only the current owner may do this.
#[utoipa::path(
    patch,
    path = "/organizations/{slug}/owner",
    params(("slug" = String, Path, description = "Organization slug")),
    request_body = TransferOwnershipRequest,
    responses(
        (status = 204, description = "Ownership transferred"),
        (status = 400, description = "Target is not a member"),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn transfer_organization(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<TransferOwnershipRequest>,
) -> Result<StatusCode, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::TransferOwnership,
        membership.organization_resource(),
        "You're not allowed to transfer this organization ownership.",
    )?;

    let organization_id = membership.organization.id;
    if state
        .repo
        .get_member_by_user(organization_id, payload.transfer_to_user_id)
        .await?
        .is_none()
    {
        return Err(AppError::BadRequest(TARGET_NOT_A_MEMBER.to_string()));
    }

    state
        .repo
        .transfer_organization_ownership(organization_id, payload.transfer_to_user_id)
        .await?;

    tracing::info!(
        organization = %slug,
        from = %user_id,
        to = %payload.transfer_to_user_id,
        "organization ownership transferred"
    );
    Ok(StatusCode::NO_CONTENT)
}

/// update_organization_avatar
///
/// [Authenticated Route] Points the organization avatar at an object the caller
/// uploaded through POST /upload. The pending upload is consumed, so a key that is
/// already attached elsewhere is rejected. The previous object is removed from
/// storage only after the new key is stored.
#[utoipa::path(
    patch,
    path = "/organizations/{slug}/avatar-url",
    params(("slug" = String, Path, description = "Organization slug")),
    request_body = UpdateAvatarRequest,
    responses(
        (status = 204, description = "Avatar updated"),
        (status = 400, description = "Not a pending upload of the caller"),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn update_organization_avatar(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateAvatarRequest>,
) -> Result<StatusCode, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Update,
        membership.organization_resource(),
        "You're not allowed to update this organization.",
    )?;
    require_non_empty(&payload.image_name, "Image name")?;

    let organization = &membership.organization;
    if organization.avatar_key.as_deref() == Some(payload.image_name.as_str()) {
        return Ok(StatusCode::NO_CONTENT);
    }

    let previous = state
        .repo
        .update_organization_avatar(organization.id, &payload.image_name, user_id)
        .await?;

    // The new avatar is committed; a leftover object is only logged.
    if let Some(previous) = previous.filter(|key| *key != payload.image_name)
        && let Err(e) = state.storage.delete_object(&previous).await
    {
        tracing::error!(organization = %slug, key = %previous, "failed to delete previous avatar: {:?}", e);
    }

    Ok(StatusCode::NO_CONTENT)
}
