use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    membership::Membership,
    models::{MemberDetails, UpdateMemberRequest},
    permissions::{Action, ResourceKind},
    repository::MEMBER_NOT_REMOVABLE,
};

#[utoipa::path(
    get,
    path = "/organizations/{slug}/members",
    params(("slug" = String, Path, description = "Organization slug")),
    responses(
        (status = 200, description = "Organization members", body = [MemberDetails]),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn get_members(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<MemberDetails>>, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Get,
        ResourceKind::User,
        "You're not allowed to see organization members.",
    )?;

    let members = state.repo.get_members(membership.organization.id).await?;
    Ok(Json(members))
}

/// update_member
///
/// [Authenticated Route] Changes the role of a membership. `member_id` is the
/// membership id, not the user id.
#[utoipa::path(
    put,
    path = "/organizations/{slug}/members/{member_id}",
    params(
        ("slug" = String, Path, description = "Organization slug"),
        ("member_id" = Uuid, Path, description = "Membership id")
    ),
    request_body = UpdateMemberRequest,
    responses(
        (status = 204, description = "Role updated"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_member(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path((slug, member_id)): Path<(String, Uuid)>,
    Json(payload): Json<UpdateMemberRequest>,
) -> Result<StatusCode, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    let organization_id = membership.organization.id;

    let member = state
        .repo
        .get_member(member_id, organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Member not found.".to_string()))?;

    membership.require(
        Action::Update,
        membership.member_resource(&member),
        "You're not allowed to update this member.",
    )?;

    state
        .repo
        .update_member_role(member.id, organization_id, payload.role)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// remove_member
///
/// [Authenticated Route] Removes a membership. An unknown member id answers like a
/// denied removal. The organization owner can never be removed.
#[utoipa::path(
    delete,
    path = "/organizations/{slug}/members/{member_id}",
    params(
        ("slug" = String, Path, description = "Organization slug"),
        ("member_id" = Uuid, Path, description = "Membership id")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn remove_member(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path((slug, member_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    let organization_id = membership.organization.id;

    let member = state
        .repo
        .get_member(member_id, organization_id)
        .await?
        .ok_or_else(|| AppError::Forbidden(MEMBER_NOT_REMOVABLE.to_string()))?;

    membership.require(
        Action::Delete,
        membership.member_resource(&member),
        MEMBER_NOT_REMOVABLE,
    )?;

    // The delete re-checks ownership, which may have moved since the read above.
    state.repo.delete_member(member.id, organization_id).await?;

    tracing::info!(organization = %slug, member_user = %member.user_id, by = %user_id, "member removed");
    Ok(StatusCode::NO_CONTENT)
}
