use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        Invite, InviteDetails, Member, MemberDetails, NewAccount, NewFile, NewInvite,
        NewOrganization, NewProject, Organization, OrganizationChanges, OrganizationSummary,
        Project, ProjectDetails, Token, User,
    },
    permissions::Role,
};

mod postgres;

pub use postgres::PostgresRepository;

pub type RepoResult<T> = Result<T, AppError>;

// Messages for the conditional writes that re-check their precondition.
pub const TARGET_NOT_A_MEMBER: &str = "Target user is not a member of this organization.";
pub const MEMBER_NOT_REMOVABLE: &str =
    "You're not allowed to remove this member from the organization.";
pub const UPLOAD_NOT_FOUND: &str = "Upload not found. Request an upload URL first.";

/// Repository Trait
///
/// The contract for every persistence operation. Handlers and the `AuthUser`
/// extractor only see this trait, so tests swap in an in-memory implementation.
///
/// Lookups answer with the committed state at call time. Operations documented as
/// atomic must apply all of their writes or none of them.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Tokens ---
    async fn get_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Atomic: inserts the user and, when given, its MEMBER membership in
    /// `auto_join_org`.
    async fn create_account(
        &self,
        account: NewAccount,
        auto_join_org: Option<Uuid>,
    ) -> RepoResult<User>;
    async fn create_password_recover_token(&self, user_id: Uuid) -> RepoResult<Token>;
    async fn get_token(&self, code: Uuid) -> RepoResult<Option<Token>>;
    /// Atomic: sets the new hash and consumes the recovery token.
    async fn reset_password(&self, user_id: Uuid, password_hash: &str, code: Uuid)
    -> RepoResult<()>;

    // --- Organizations ---
    /// Organization that auto-attaches users whose e-mail domain is `domain`.
    async fn get_auto_join_organization(&self, domain: &str) -> RepoResult<Option<Organization>>;
    /// Any organization using `domain`, other than `excluding`.
    async fn get_organization_by_domain(
        &self,
        domain: &str,
        excluding: Option<Uuid>,
    ) -> RepoResult<Option<Organization>>;
    /// Atomic: inserts the organization and the owner's ADMIN membership.
    async fn create_organization(&self, organization: NewOrganization) -> RepoResult<Organization>;
    async fn get_organizations_by_user(&self, user_id: Uuid)
    -> RepoResult<Vec<OrganizationSummary>>;
    async fn update_organization(&self, id: Uuid, changes: OrganizationChanges) -> RepoResult<()>;
    /// Atomic: consumes the pending upload `avatar_key` made by `uploaded_by` and
    /// stores it as the avatar. Returns the previous avatar key. An unknown or
    /// foreign upload is `BadRequest` and changes nothing.
    async fn update_organization_avatar(
        &self,
        id: Uuid,
        avatar_key: &str,
        uploaded_by: Uuid,
    ) -> RepoResult<Option<String>>;
    async fn delete_organization(&self, id: Uuid) -> RepoResult<()>;
    /// Atomic: promotes the target member to ADMIN and makes them the owner. A
    /// target without a membership is `BadRequest` and changes nothing.
    async fn transfer_organization_ownership(
        &self,
        organization_id: Uuid,
        to_user_id: Uuid,
    ) -> RepoResult<()>;

    // --- Members ---
    /// The membership of `user_id` in the organization identified by `org_slug`.
    async fn get_membership(
        &self,
        user_id: Uuid,
        org_slug: &str,
    ) -> RepoResult<Option<(Member, Organization)>>;
    async fn get_members(&self, organization_id: Uuid) -> RepoResult<Vec<MemberDetails>>;
    async fn get_member(&self, member_id: Uuid, organization_id: Uuid)
    -> RepoResult<Option<Member>>;
    async fn get_member_by_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> RepoResult<Option<Member>>;
    async fn get_member_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<Member>>;
    async fn update_member_role(
        &self,
        member_id: Uuid,
        organization_id: Uuid,
        role: Role,
    ) -> RepoResult<()>;
    /// Never removes the owner's membership: that row, or a missing one, is
    /// `Forbidden`.
    async fn delete_member(&self, member_id: Uuid, organization_id: Uuid) -> RepoResult<()>;
    /// Members that occupy a paid seat (everyone except BILLING).
    async fn count_billable_members(&self, organization_id: Uuid) -> RepoResult<i64>;

    // --- Projects ---
    async fn create_project(&self, project: NewProject) -> RepoResult<Project>;
    async fn get_project(&self, project_id: Uuid, organization_id: Uuid)
    -> RepoResult<Option<Project>>;
    async fn get_project_by_slug(
        &self,
        organization_id: Uuid,
        project_slug: &str,
    ) -> RepoResult<Option<ProjectDetails>>;
    async fn get_projects(&self, organization_id: Uuid) -> RepoResult<Vec<ProjectDetails>>;
    async fn update_project(&self, project_id: Uuid, name: &str, description: &str)
    -> RepoResult<()>;
    async fn delete_project(&self, project_id: Uuid) -> RepoResult<()>;
    async fn count_projects(&self, organization_id: Uuid) -> RepoResult<i64>;

    // --- Invites ---
    async fn create_invite(&self, invite: NewInvite) -> RepoResult<Invite>;
    async fn get_invite(&self, invite_id: Uuid) -> RepoResult<Option<Invite>>;
    async fn get_invite_details(&self, invite_id: Uuid) -> RepoResult<Option<InviteDetails>>;
    async fn get_invites(&self, organization_id: Uuid) -> RepoResult<Vec<InviteDetails>>;
    async fn get_pending_invites(&self, email: &str) -> RepoResult<Vec<InviteDetails>>;
    async fn get_invite_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<Invite>>;
    /// Atomic: inserts the membership with the invite's role and deletes the invite.
    async fn accept_invite(&self, invite: &Invite, user_id: Uuid) -> RepoResult<()>;
    async fn delete_invite(&self, invite_id: Uuid) -> RepoResult<()>;

    // --- Files ---
    async fn create_file(&self, file: NewFile) -> RepoResult<()>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
