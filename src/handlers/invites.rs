use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use super::require_email;
use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    membership::Membership,
    models::{CreateInviteRequest, CreatedInviteResponse, Invite, InviteDetails, NewInvite, User},
    permissions::{Action, ResourceKind},
};

/// Loads an invite together with the caller, failing unless it is addressed to them.
async fn invite_for_caller(
    state: &AppState,
    user_id: Uuid,
    invite_id: Uuid,
) -> Result<(Invite, User), AppError> {
    let invite = state
        .repo
        .get_invite(invite_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invite not found or expired.".to_string()))?;

    let user = state
        .repo
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    if !invite.email.eq_ignore_ascii_case(&user.email) {
        return Err(AppError::BadRequest(
            "This invite belongs to another user.".to_string(),
        ));
    }

    Ok((invite, user))
}

/// create_invite
///
/// [Authenticated Route] Invites an e-mail into the organization with a role.
#[utoipa::path(
    post,
    path = "/organizations/{slug}/invites",
    params(("slug" = String, Path, description = "Organization slug")),
    request_body = CreateInviteRequest,
    responses(
        (status = 201, description = "Invite created", body = CreatedInviteResponse),
        (status = 400, description = "Redundant invite"),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn create_invite(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<CreateInviteRequest>,
) -> Result<(StatusCode, Json<CreatedInviteResponse>), AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Create,
        ResourceKind::Invite,
        "You're not allowed to create new invites.",
    )?;

    let domain = require_email(&payload.email)?;
    let organization = &membership.organization;

    if organization.should_attach_users_by_domain
        && organization
            .domain
            .as_deref()
            .is_some_and(|org_domain| org_domain.eq_ignore_ascii_case(domain))
    {
        return Err(AppError::BadRequest(format!(
            "Users with '{domain}' domain will join your organization automatically on login."
        )));
    }

    if state
        .repo
        .get_invite_by_email(organization.id, &payload.email)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(
            "Another invite with same e-mail already exists.".to_string(),
        ));
    }

    if state
        .repo
        .get_member_by_email(organization.id, &payload.email)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(
            "A member with this e-mail already belongs to your organization.".to_string(),
        ));
    }

    let invite = state
        .repo
        .create_invite(NewInvite {
            email: payload.email,
            role: payload.role,
            organization_id: organization.id,
            author_id: user_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedInviteResponse {
            invite_id: invite.id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/organizations/{slug}/invites",
    params(("slug" = String, Path, description = "Organization slug")),
    responses(
        (status = 200, description = "Organization invites", body = [InviteDetails]),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn get_invites(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<InviteDetails>>, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Get,
        ResourceKind::Invite,
        "You're not allowed to get organization invites.",
    )?;

    let invites = state.repo.get_invites(membership.organization.id).await?;
    Ok(Json(invites))
}

/// revoke_invite
///
/// [Authenticated Route] Deletes a pending invite of the organization.
#[utoipa::path(
    delete,
    path = "/organizations/{slug}/invites/{invite_id}",
    params(
        ("slug" = String, Path, description = "Organization slug"),
        ("invite_id" = Uuid, Path, description = "Invite id")
    ),
    responses(
        (status = 204, description = "Invite revoked"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn revoke_invite(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path((slug, invite_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Delete,
        ResourceKind::Invite,
        "You're not allowed to delete an invite.",
    )?;

    let invite = state
        .repo
        .get_invite(invite_id)
        .await?
        .filter(|invite| invite.organization_id == membership.organization.id)
        .ok_or_else(|| AppError::NotFound("Invite not found.".to_string()))?;

    state.repo.delete_invite(invite.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// get_invite
///
/// [Public Route] Invite details, shown on the accept page before signing in.
#[utoipa::path(
    get,
    path = "/invites/{invite_id}",
    params(("invite_id" = Uuid, Path, description = "Invite id")),
    responses(
        (status = 200, description = "Invite", body = InviteDetails),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_invite(
    State(state): State<AppState>,
    Path(invite_id): Path<Uuid>,
) -> Result<Json<InviteDetails>, AppError> {
    let invite = state
        .repo
        .get_invite_details(invite_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Invite not found.".to_string()))?;
    Ok(Json(invite))
}

/// get_pending_invites
///
/// [Authenticated Route] Invites addressed to the caller's e-mail.
#[utoipa::path(
    get,
    path = "/pending-invites",
    responses((status = 200, description = "Pending invites", body = [InviteDetails]))
)]
pub async fn get_pending_invites(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<InviteDetails>>, AppError> {
    let user = state
        .repo
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;

    let invites = state.repo.get_pending_invites(&user.email).await?;
    Ok(Json(invites))
}

/// accept_invite
///
/// [Authenticated Route] Joins the organization with the invited role and consumes
/// the invite.
#[utoipa::path(
    post,
    path = "/invites/{invite_id}/accept",
    params(("invite_id" = Uuid, Path, description = "Invite id")),
    responses(
        (status = 204, description = "Invite accepted"),
        (status = 400, description = "Invite belongs to another user"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn accept_invite(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(invite_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let (invite, user) = invite_for_caller(&state, user_id, invite_id).await?;

    if state
        .repo
        .get_member_by_user(invite.organization_id, user.id)
        .await?
        .is_some()
    {
        return Err(AppError::BadRequest(
            "You're already a member of this organization.".to_string(),
        ));
    }

    state.repo.accept_invite(&invite, user.id).await?;

    tracing::info!(user_id = %user.id, organization_id = %invite.organization_id, role = %invite.role, "invite accepted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/invites/{invite_id}/reject",
    params(("invite_id" = Uuid, Path, description = "Invite id")),
    responses(
        (status = 204, description = "Invite rejected"),
        (status = 400, description = "Invite belongs to another user"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn reject_invite(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(invite_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let (invite, _) = invite_for_caller(&state, user_id, invite_id).await?;
    state.repo.delete_invite(invite.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
