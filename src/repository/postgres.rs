use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{MEMBER_NOT_REMOVABLE, RepoResult, Repository, TARGET_NOT_A_MEMBER, UPLOAD_NOT_FOUND};
use crate::{
    error::AppError,
    models::{
        Invite, InviteDetails, Member, MemberDetails, NewAccount, NewFile, NewInvite,
        NewOrganization, NewProject, Organization, OrganizationChanges, OrganizationSummary,
        Project, ProjectDetails, Token, TokenType, User,
    },
    permissions::Role,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, avatar_url, created_at";

const ORGANIZATION_COLUMNS: &str = "id, name, slug, domain, should_attach_users_by_domain, \
     avatar_key, owner_id, created_at, updated_at";

// The projects table stores the avatar key in `avatar_url`.
const PROJECT_COLUMNS: &str = "id, name, description, slug, avatar_url AS avatar_key, \
     organization_id, owner_id, created_at, updated_at";

const INVITE_COLUMNS: &str = "id, email, role, organization_id, author_id, created_at";

const INVITE_DETAILS_SELECT: &str = r#"
    SELECT
        i.id, i.email, i.role, i.created_at, i.organization_id,
        o.name AS organization_name,
        i.author_id, u.name AS author_name, u.avatar_url AS author_avatar_url
    FROM invites i
    LEFT JOIN users u ON u.id = i.author_id
    LEFT JOIN organizations o ON o.id = i.organization_id
"#;

const PROJECT_DETAILS_SELECT: &str = r#"
    SELECT
        p.id, p.name, p.description, p.slug, p.avatar_url AS avatar_key,
        p.organization_id, p.owner_id, p.created_at,
        u.name AS owner_name, u.avatar_url AS owner_avatar_url
    FROM projects p
    LEFT JOIN users u ON u.id = p.owner_id
"#;

/// Maps a unique-constraint violation to a client error; anything else stays a
/// database error.
fn unique_violation(err: sqlx::Error, message: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::BadRequest(message.to_string())
        }
        _ => AppError::Database(err),
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
/// Multi-statement operations run inside a single transaction.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS & TOKENS ---

    async fn get_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// create_account
    ///
    /// Inserts the user and, for an auto-join domain match, the MEMBER membership
    /// in the same transaction.
    async fn create_account(
        &self,
        account: NewAccount,
        auto_join_org: Option<Uuid>,
    ) -> RepoResult<User> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.password_hash)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| unique_violation(e, "User with same e-mail already exists."))?;

        if let Some(organization_id) = auto_join_org {
            sqlx::query("INSERT INTO members (user_id, organization_id, role) VALUES ($1, $2, $3)")
                .bind(user.id)
                .bind(organization_id)
                .bind(Role::Member)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn create_password_recover_token(&self, user_id: Uuid) -> RepoResult<Token> {
        let token = sqlx::query_as::<_, Token>(
            "INSERT INTO tokens (type, user_id) VALUES ($1, $2) RETURNING id, type, user_id, created_at",
        )
        .bind(TokenType::PasswordRecover)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(token)
    }

    async fn get_token(&self, code: Uuid) -> RepoResult<Option<Token>> {
        let token = sqlx::query_as::<_, Token>(
            "SELECT id, type, user_id, created_at FROM tokens WHERE id = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    /// reset_password
    ///
    /// Stores the new hash and deletes the recovery token so the code is single-use.
    async fn reset_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        code: Uuid,
    ) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(code)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // --- ORGANIZATIONS ---

    async fn get_auto_join_organization(&self, domain: &str) -> RepoResult<Option<Organization>> {
        let query = format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations \
             WHERE domain = $1 AND should_attach_users_by_domain = true"
        );
        let organization = sqlx::query_as::<_, Organization>(&query)
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(organization)
    }

    /// get_organization_by_domain
    ///
    /// Domain uniqueness lookup. `excluding` skips the organization being updated.
    async fn get_organization_by_domain(
        &self,
        domain: &str,
        excluding: Option<Uuid>,
    ) -> RepoResult<Option<Organization>> {
        let query = format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations \
             WHERE domain = $1 AND ($2::uuid IS NULL OR id <> $2)"
        );
        let organization = sqlx::query_as::<_, Organization>(&query)
            .bind(domain)
            .bind(excluding)
            .fetch_optional(&self.pool)
            .await?;
        Ok(organization)
    }

    /// create_organization
    ///
    /// Inserts the organization and its owner's ADMIN membership atomically, so an
    /// organization never exists without its owner being a member.
    async fn create_organization(&self, organization: NewOrganization) -> RepoResult<Organization> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "INSERT INTO organizations (name, slug, domain, should_attach_users_by_domain, owner_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ORGANIZATION_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Organization>(&query)
            .bind(&organization.name)
            .bind(&organization.slug)
            .bind(&organization.domain)
            .bind(organization.should_attach_users_by_domain)
            .bind(organization.owner_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| unique_violation(e, "Another organization with same name or domain already exists."))?;

        sqlx::query("INSERT INTO members (user_id, organization_id, role) VALUES ($1, $2, $3)")
            .bind(organization.owner_id)
            .bind(created.id)
            .bind(Role::Admin)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_organizations_by_user(
        &self,
        user_id: Uuid,
    ) -> RepoResult<Vec<OrganizationSummary>> {
        let organizations = sqlx::query_as::<_, OrganizationSummary>(
            r#"
            SELECT o.id, o.name, o.slug, o.avatar_key, m.role
            FROM organizations o
            JOIN members m ON m.organization_id = o.id
            WHERE m.user_id = $1
            ORDER BY o.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(organizations)
    }

    async fn update_organization(&self, id: Uuid, changes: OrganizationChanges) -> RepoResult<()> {
        sqlx::query(
            r#"
            UPDATE organizations
            SET name = $1, domain = $2, should_attach_users_by_domain = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.domain)
        .bind(changes.should_attach_users_by_domain)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// update_organization_avatar
    ///
    /// Attaches the uploaded object and removes its pending `files` record.
    async fn update_organization_avatar(
        &self,
        id: Uuid,
        avatar_key: &str,
        uploaded_by: Uuid,
    ) -> RepoResult<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query("DELETE FROM files WHERE key = $1 AND user_id = $2")
            .bind(avatar_key)
            .bind(uploaded_by)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if consumed == 0 {
            tx.rollback().await?;
            return Err(AppError::BadRequest(UPLOAD_NOT_FOUND.to_string()));
        }

        // Row lock so concurrent avatar changes each see the key they replace.
        let previous: Option<String> =
            sqlx::query_scalar("SELECT avatar_key FROM organizations WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("UPDATE organizations SET avatar_key = $1, updated_at = NOW() WHERE id = $2")
            .bind(avatar_key)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(previous)
    }

    async fn delete_organization(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// transfer_organization_ownership
    ///
    /// Promotes the target member to ADMIN and moves `owner_id` in one transaction.
    /// The previous owner keeps their membership and role.
    async fn transfer_organization_ownership(
        &self,
        organization_id: Uuid,
        to_user_id: Uuid,
    ) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        let promoted =
            sqlx::query("UPDATE members SET role = $1 WHERE organization_id = $2 AND user_id = $3")
                .bind(Role::Admin)
                .bind(organization_id)
                .bind(to_user_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        // The membership may have been removed since the handler looked it up.
        if promoted != 1 {
            tx.rollback().await?;
            return Err(AppError::BadRequest(TARGET_NOT_A_MEMBER.to_string()));
        }

        sqlx::query("UPDATE organizations SET owner_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(to_user_id)
            .bind(organization_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // --- MEMBERS ---

    /// get_membership
    ///
    /// Resolves the caller's membership and the organization in two reads: the
    /// organization by slug, then the membership row inside it.
    async fn get_membership(
        &self,
        user_id: Uuid,
        org_slug: &str,
    ) -> RepoResult<Option<(Member, Organization)>> {
        let query = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE slug = $1");
        let Some(organization) = sqlx::query_as::<_, Organization>(&query)
            .bind(org_slug)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let member = self.get_member_by_user(organization.id, user_id).await?;
        Ok(member.map(|member| (member, organization)))
    }

    async fn get_members(&self, organization_id: Uuid) -> RepoResult<Vec<MemberDetails>> {
        let members = sqlx::query_as::<_, MemberDetails>(
            r#"
            SELECT m.id, m.user_id, m.role, u.name, u.email, u.avatar_url
            FROM members m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1
            ORDER BY m.role ASC
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    async fn get_member(
        &self,
        member_id: Uuid,
        organization_id: Uuid,
    ) -> RepoResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT id, user_id, organization_id, role FROM members WHERE id = $1 AND organization_id = $2",
        )
        .bind(member_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn get_member_by_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> RepoResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT id, user_id, organization_id, role FROM members WHERE organization_id = $1 AND user_id = $2",
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn get_member_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<Member>> {
        let member = sqlx::query_as::<_, Member>(
            r#"
            SELECT m.id, m.user_id, m.organization_id, m.role
            FROM members m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1 AND u.email = $2
            "#,
        )
        .bind(organization_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn update_member_role(
        &self,
        member_id: Uuid,
        organization_id: Uuid,
        role: Role,
    ) -> RepoResult<()> {
        sqlx::query("UPDATE members SET role = $1 WHERE id = $2 AND organization_id = $3")
            .bind(role)
            .bind(member_id)
            .bind(organization_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_member(&self, member_id: Uuid, organization_id: Uuid) -> RepoResult<()> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM members
            WHERE id = $1
              AND organization_id = $2
              AND user_id <> (SELECT owner_id FROM organizations WHERE id = $2)
            "#,
        )
        .bind(member_id)
        .bind(organization_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Err(AppError::Forbidden(MEMBER_NOT_REMOVABLE.to_string()));
        }
        Ok(())
    }

    async fn count_billable_members(&self, organization_id: Uuid) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM members WHERE organization_id = $1 AND role <> $2",
        )
        .bind(organization_id)
        .bind(Role::Billing)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // --- PROJECTS ---

    async fn create_project(&self, project: NewProject) -> RepoResult<Project> {
        let query = format!(
            "INSERT INTO projects (name, slug, description, organization_id, owner_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PROJECT_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Project>(&query)
            .bind(&project.name)
            .bind(&project.slug)
            .bind(&project.description)
            .bind(project.organization_id)
            .bind(project.owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "Another project with same name already exists."))?;
        Ok(created)
    }

    /// get_project
    ///
    /// Scoped to the organization: a project id from another tenant resolves to `None`.
    async fn get_project(
        &self,
        project_id: Uuid,
        organization_id: Uuid,
    ) -> RepoResult<Option<Project>> {
        let query = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1 AND organization_id = $2"
        );
        let project = sqlx::query_as::<_, Project>(&query)
            .bind(project_id)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn get_project_by_slug(
        &self,
        organization_id: Uuid,
        project_slug: &str,
    ) -> RepoResult<Option<ProjectDetails>> {
        let query =
            format!("{PROJECT_DETAILS_SELECT} WHERE p.organization_id = $1 AND p.slug = $2 LIMIT 1");
        let project = sqlx::query_as::<_, ProjectDetails>(&query)
            .bind(organization_id)
            .bind(project_slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn get_projects(&self, organization_id: Uuid) -> RepoResult<Vec<ProjectDetails>> {
        let query =
            format!("{PROJECT_DETAILS_SELECT} WHERE p.organization_id = $1 ORDER BY p.created_at DESC");
        let projects = sqlx::query_as::<_, ProjectDetails>(&query)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(projects)
    }

    async fn update_project(
        &self,
        project_id: Uuid,
        name: &str,
        description: &str,
    ) -> RepoResult<()> {
        sqlx::query(
            "UPDATE projects SET name = $1, description = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(name)
        .bind(description)
        .bind(project_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_project(&self, project_id: Uuid) -> RepoResult<()> {
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count_projects(&self, organization_id: Uuid) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE organization_id = $1")
            .bind(organization_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // --- INVITES ---

    async fn create_invite(&self, invite: NewInvite) -> RepoResult<Invite> {
        let query = format!(
            "INSERT INTO invites (email, role, organization_id, author_id) \
             VALUES ($1, $2, $3, $4) RETURNING {INVITE_COLUMNS}"
        );
        let created = sqlx::query_as::<_, Invite>(&query)
            .bind(&invite.email)
            .bind(invite.role)
            .bind(invite.organization_id)
            .bind(invite.author_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn get_invite(&self, invite_id: Uuid) -> RepoResult<Option<Invite>> {
        let query = format!("SELECT {INVITE_COLUMNS} FROM invites WHERE id = $1");
        let invite = sqlx::query_as::<_, Invite>(&query)
            .bind(invite_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invite)
    }

    async fn get_invite_details(&self, invite_id: Uuid) -> RepoResult<Option<InviteDetails>> {
        let query = format!("{INVITE_DETAILS_SELECT} WHERE i.id = $1");
        let invite = sqlx::query_as::<_, InviteDetails>(&query)
            .bind(invite_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invite)
    }

    async fn get_invites(&self, organization_id: Uuid) -> RepoResult<Vec<InviteDetails>> {
        let query =
            format!("{INVITE_DETAILS_SELECT} WHERE i.organization_id = $1 ORDER BY i.created_at ASC");
        let invites = sqlx::query_as::<_, InviteDetails>(&query)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(invites)
    }

    async fn get_pending_invites(&self, email: &str) -> RepoResult<Vec<InviteDetails>> {
        let query = format!("{INVITE_DETAILS_SELECT} WHERE lower(i.email) = lower($1) ORDER BY i.created_at ASC");
        let invites = sqlx::query_as::<_, InviteDetails>(&query)
            .bind(email)
            .fetch_all(&self.pool)
            .await?;
        Ok(invites)
    }

    async fn get_invite_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<Invite>> {
        let query = format!(
            "SELECT {INVITE_COLUMNS} FROM invites WHERE organization_id = $1 AND email = $2"
        );
        let invite = sqlx::query_as::<_, Invite>(&query)
            .bind(organization_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invite)
    }

    /// accept_invite
    ///
    /// Creates the membership with the invited role and consumes the invite.
    async fn accept_invite(&self, invite: &Invite, user_id: Uuid) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO members (user_id, organization_id, role) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(invite.organization_id)
            .bind(invite.role)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM invites WHERE id = $1")
            .bind(invite.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_invite(&self, invite_id: Uuid) -> RepoResult<()> {
        sqlx::query("DELETE FROM invites WHERE id = $1")
            .bind(invite_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- FILES ---

    async fn create_file(&self, file: NewFile) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO files (name, content_type, url, key, user_id) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&file.name)
        .bind(&file.content_type)
        .bind(&file.url)
        .bind(&file.key)
        .bind(file.user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
