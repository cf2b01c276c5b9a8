use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::permissions::Role;

// --- Core Rows (Mapped to Database) ---

/// User
///
/// Canonical account record from the `users` table. Never serialized as-is since it
/// carries the password hash; handlers answer with [`UserProfile`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    // Absent for accounts created through an external provider.
    pub password_hash: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// Output schema for the authenticated user's profile (GET /profile).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar_url: user.avatar_url,
        }
    }
}

/// Organization
///
/// A tenant. `owner_id` points at the single user who owns it; that user always
/// holds a membership in the organization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    // New accounts whose e-mail domain matches `domain` join automatically.
    pub should_attach_users_by_domain: bool,
    pub avatar_key: Option<String>,
    pub owner_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// OrganizationSummary
///
/// One entry of GET /organizations: an organization plus the caller's role in it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub avatar_key: Option<String>,
    pub role: Role,
}

/// Member
///
/// A membership row: exactly one role per (user, organization).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Member {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

/// MemberDetails
///
/// Membership joined with the member's user record (GET /organizations/{slug}/members).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct MemberDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub name: Option<String>,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// Project
///
/// Belongs to one organization; owned by its creator independently of the
/// organization owner.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub slug: String,
    pub avatar_key: Option<String>,
    pub organization_id: Uuid,
    pub owner_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// ProjectDetails
///
/// Project joined with its owner's public profile fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct ProjectDetails {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub slug: String,
    pub avatar_key: Option<String>,
    pub organization_id: Uuid,
    pub owner_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub owner_name: Option<String>,
    pub owner_avatar_url: Option<String>,
}

/// Invite
///
/// A pending invitation of an e-mail address into an organization with a role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Invite {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub organization_id: Uuid,
    // Nullable: the author may have deleted their account since.
    pub author_id: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// InviteDetails
///
/// Invite joined with its author and organization names.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct InviteDetails {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub organization_id: Uuid,
    pub organization_name: Option<String>,
    pub author_id: Option<Uuid>,
    pub author_name: Option<String>,
    pub author_avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "token_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    PasswordRecover,
}

/// Token
///
/// Single-use code backing the password recovery flow. The code is the row id.
#[derive(Debug, Clone, FromRow)]
pub struct Token {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    pub token_type: TokenType,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// --- Repository Inputs ---

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub slug: String,
    pub domain: Option<String>,
    pub should_attach_users_by_domain: bool,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct OrganizationChanges {
    pub name: String,
    pub domain: Option<String>,
    pub should_attach_users_by_domain: bool,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub organization_id: Uuid,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewInvite {
    pub email: String,
    pub role: Role,
    pub organization_id: Uuid,
    pub author_id: Uuid,
}

/// NewFile
///
/// An upload that has been presigned but not yet attached to an entity.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub content_type: String,
    pub url: String,
    pub key: String,
    pub user_id: Uuid,
}

// --- Request Payloads (Input Schemas) ---

/// CreateAccountRequest
///
/// Input payload for POST /users.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateAccountRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthenticateWithPasswordRequest {
    pub email: String,
    pub password: String,
}

/// SessionResponse
///
/// Bearer token returned by POST /sessions/password.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PasswordRecoverRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ResetPasswordRequest {
    // The recovery code issued by POST /password/recover.
    pub code: Uuid,
    pub password: String,
}

/// OrganizationRequest
///
/// Input payload for creating (POST /organizations) and updating
/// (PUT /organizations/{slug}) an organization.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OrganizationRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_attach_users_by_domain: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatedOrganizationResponse {
    pub organization_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TransferOwnershipRequest {
    pub transfer_to_user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateAvatarRequest {
    /// Object key returned by POST /upload.
    pub image_name: String,
}

/// ProjectRequest
///
/// Input payload for creating and updating a project.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProjectRequest {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatedProjectResponse {
    pub project_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateMemberRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateInviteRequest {
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatedInviteResponse {
    pub invite_id: Uuid,
}

/// CreateUploadRequest
///
/// Input payload for requesting a short-lived upload URL (POST /upload).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateUploadRequest {
    #[schema(example = "logo.png")]
    pub name: String,
    #[schema(example = "image/png")]
    pub content_type: String,
}

/// UploadResponse
///
/// The presigned PUT URL plus the object key to reference the file with later.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UploadResponse {
    pub signed_url: String,
    pub file_name: String,
}
