#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use saas_api::{
    AppConfig, AppError, AppState, MockStorageService, create_router,
    auth::issue_token,
    models::{
        Invite, InviteDetails, Member, MemberDetails, NewAccount, NewFile, NewInvite,
        NewOrganization, NewProject, Organization, OrganizationChanges, OrganizationSummary,
        Project, ProjectDetails, Token, TokenType, User,
    },
    permissions::Role,
    repository::{
        MEMBER_NOT_REMOVABLE, RepoResult, Repository, RepositoryState, TARGET_NOT_A_MEMBER,
        UPLOAD_NOT_FOUND,
    },
    slug::create_slug,
    storage::StorageState,
};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::util::ServiceExt;
use uuid::Uuid;

// --- In-memory repository ---

#[derive(Default)]
pub struct Store {
    pub users: Vec<User>,
    pub tokens: Vec<Token>,
    pub organizations: Vec<Organization>,
    pub members: Vec<Member>,
    pub projects: Vec<Project>,
    pub invites: Vec<Invite>,
    pub files: Vec<NewFile>,
}

type StoreHook = Box<dyn FnOnce(&mut Store) + Send>;

/// InMemoryRepository
///
/// `Repository` implementation over a mutex-guarded `Store`, mirroring the
/// Postgres semantics the handlers rely on (tenant scoping, cascades, uniqueness,
/// conditional writes).
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    after_member_lookup: Mutex<Option<StoreHook>>,
}

impl InMemoryRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    /// Runs `hook` once, right after the next `get_member`/`get_member_by_user`
    /// returns, to interleave a concurrent write between a handler's read and
    /// its write.
    pub fn after_next_member_lookup(&self, hook: impl FnOnce(&mut Store) + Send + 'static) {
        *self.after_member_lookup.lock().unwrap() = Some(Box::new(hook));
    }

    fn run_member_lookup_hook(&self) {
        let hook = self.after_member_lookup.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&mut self.store());
        }
    }

    // --- Seeding ---

    pub fn seed_user(&self, name: &str, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: Some(name.to_string()),
            email: email.to_string(),
            password_hash: None,
            avatar_url: None,
            created_at: Utc::now(),
        };
        self.store().users.push(user.clone());
        user
    }

    pub fn seed_organization(&self, owner: &User, name: &str) -> Organization {
        let organization = Organization {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: create_slug(name),
            domain: None,
            should_attach_users_by_domain: false,
            avatar_key: None,
            owner_id: owner.id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut store = self.store();
        store.organizations.push(organization.clone());
        store.members.push(Member {
            id: Uuid::new_v4(),
            user_id: owner.id,
            organization_id: organization.id,
            role: Role::Admin,
        });
        organization
    }

    pub fn add_member(&self, organization: &Organization, user: &User, role: Role) -> Member {
        let member = Member {
            id: Uuid::new_v4(),
            user_id: user.id,
            organization_id: organization.id,
            role,
        };
        self.store().members.push(member.clone());
        member
    }

    pub fn seed_project(&self, organization: &Organization, owner: &User, name: &str) -> Project {
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: format!("{name} description"),
            slug: create_slug(name),
            avatar_key: None,
            organization_id: organization.id,
            owner_id: owner.id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.store().projects.push(project.clone());
        project
    }

    pub fn seed_invite(&self, organization: &Organization, author: &User, email: &str, role: Role) -> Invite {
        let invite = Invite {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
            organization_id: organization.id,
            author_id: Some(author.id),
            created_at: Utc::now(),
        };
        self.store().invites.push(invite.clone());
        invite
    }

    /// A pending upload by `user`, as POST /upload records it.
    pub fn seed_upload(&self, user: &User, key: &str) {
        self.store().files.push(NewFile {
            name: key.to_string(),
            content_type: "image/png".to_string(),
            url: format!("http://localhost:9000/mock-bucket/{key}"),
            key: key.to_string(),
            user_id: user.id,
        });
    }

    // --- Inspection ---

    pub fn member_of(&self, organization_id: Uuid, user_id: Uuid) -> Option<Member> {
        self.store()
            .members
            .iter()
            .find(|m| m.organization_id == organization_id && m.user_id == user_id)
            .cloned()
    }

    pub fn organization(&self, organization_id: Uuid) -> Option<Organization> {
        self.store()
            .organizations
            .iter()
            .find(|o| o.id == organization_id)
            .cloned()
    }

    pub fn project(&self, project_id: Uuid) -> Option<Project> {
        self.store().projects.iter().find(|p| p.id == project_id).cloned()
    }

    fn member_details(store: &Store, member: &Member) -> Option<MemberDetails> {
        let user = store.users.iter().find(|u| u.id == member.user_id)?;
        Some(MemberDetails {
            id: member.id,
            user_id: member.user_id,
            role: member.role,
            name: user.name.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
        })
    }

    fn project_details(store: &Store, project: &Project) -> ProjectDetails {
        let owner = store.users.iter().find(|u| u.id == project.owner_id);
        ProjectDetails {
            id: project.id,
            name: project.name.clone(),
            description: project.description.clone(),
            slug: project.slug.clone(),
            avatar_key: project.avatar_key.clone(),
            organization_id: project.organization_id,
            owner_id: project.owner_id,
            created_at: project.created_at,
            owner_name: owner.and_then(|u| u.name.clone()),
            owner_avatar_url: owner.and_then(|u| u.avatar_url.clone()),
        }
    }

    fn invite_details(store: &Store, invite: &Invite) -> InviteDetails {
        let author = invite
            .author_id
            .and_then(|id| store.users.iter().find(|u| u.id == id));
        let organization = store
            .organizations
            .iter()
            .find(|o| o.id == invite.organization_id);
        InviteDetails {
            id: invite.id,
            email: invite.email.clone(),
            role: invite.role,
            created_at: invite.created_at,
            organization_id: invite.organization_id,
            organization_name: organization.map(|o| o.name.clone()),
            author_id: author.map(|u| u.id),
            author_name: author.and_then(|u| u.name.clone()),
            author_avatar_url: author.and_then(|u| u.avatar_url.clone()),
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user_by_id(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.store().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self.store().users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_account(
        &self,
        account: NewAccount,
        auto_join_org: Option<Uuid>,
    ) -> RepoResult<User> {
        let mut store = self.store();
        if store.users.iter().any(|u| u.email == account.email) {
            return Err(AppError::BadRequest("User with same e-mail already exists.".to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: Some(account.name),
            email: account.email,
            password_hash: Some(account.password_hash),
            avatar_url: None,
            created_at: Utc::now(),
        };
        store.users.push(user.clone());
        if let Some(organization_id) = auto_join_org {
            store.members.push(Member {
                id: Uuid::new_v4(),
                user_id: user.id,
                organization_id,
                role: Role::Member,
            });
        }
        Ok(user)
    }

    async fn create_password_recover_token(&self, user_id: Uuid) -> RepoResult<Token> {
        let token = Token {
            id: Uuid::new_v4(),
            token_type: TokenType::PasswordRecover,
            user_id,
            created_at: Utc::now(),
        };
        self.store().tokens.push(token.clone());
        Ok(token)
    }

    async fn get_token(&self, code: Uuid) -> RepoResult<Option<Token>> {
        Ok(self.store().tokens.iter().find(|t| t.id == code).cloned())
    }

    async fn reset_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        code: Uuid,
    ) -> RepoResult<()> {
        let mut store = self.store();
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = Some(password_hash.to_string());
        }
        store.tokens.retain(|t| t.id != code);
        Ok(())
    }

    async fn get_auto_join_organization(&self, domain: &str) -> RepoResult<Option<Organization>> {
        Ok(self
            .store()
            .organizations
            .iter()
            .find(|o| o.should_attach_users_by_domain && o.domain.as_deref() == Some(domain))
            .cloned())
    }

    async fn get_organization_by_domain(
        &self,
        domain: &str,
        excluding: Option<Uuid>,
    ) -> RepoResult<Option<Organization>> {
        Ok(self
            .store()
            .organizations
            .iter()
            .find(|o| o.domain.as_deref() == Some(domain) && Some(o.id) != excluding)
            .cloned())
    }

    async fn create_organization(&self, organization: NewOrganization) -> RepoResult<Organization> {
        let mut store = self.store();
        if store.organizations.iter().any(|o| o.slug == organization.slug) {
            return Err(AppError::BadRequest(
                "Another organization with same name or domain already exists.".to_string(),
            ));
        }
        let created = Organization {
            id: Uuid::new_v4(),
            name: organization.name,
            slug: organization.slug,
            domain: organization.domain,
            should_attach_users_by_domain: organization.should_attach_users_by_domain,
            avatar_key: None,
            owner_id: organization.owner_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.organizations.push(created.clone());
        store.members.push(Member {
            id: Uuid::new_v4(),
            user_id: organization.owner_id,
            organization_id: created.id,
            role: Role::Admin,
        });
        Ok(created)
    }

    async fn get_organizations_by_user(
        &self,
        user_id: Uuid,
    ) -> RepoResult<Vec<OrganizationSummary>> {
        let store = self.store();
        Ok(store
            .members
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                store
                    .organizations
                    .iter()
                    .find(|o| o.id == m.organization_id)
                    .map(|o| OrganizationSummary {
                        id: o.id,
                        name: o.name.clone(),
                        slug: o.slug.clone(),
                        avatar_key: o.avatar_key.clone(),
                        role: m.role,
                    })
            })
            .collect())
    }

    async fn update_organization(&self, id: Uuid, changes: OrganizationChanges) -> RepoResult<()> {
        if let Some(organization) = self.store().organizations.iter_mut().find(|o| o.id == id) {
            organization.name = changes.name;
            organization.domain = changes.domain;
            organization.should_attach_users_by_domain = changes.should_attach_users_by_domain;
            organization.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_organization_avatar(
        &self,
        id: Uuid,
        avatar_key: &str,
        uploaded_by: Uuid,
    ) -> RepoResult<Option<String>> {
        let mut store = self.store();
        let Some(pending) = store
            .files
            .iter()
            .position(|f| f.key == avatar_key && f.user_id == uploaded_by)
        else {
            return Err(AppError::BadRequest(UPLOAD_NOT_FOUND.to_string()));
        };
        store.files.remove(pending);

        let organization = store
            .organizations
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| AppError::Internal("organization vanished".to_string()))?;
        Ok(organization.avatar_key.replace(avatar_key.to_string()))
    }

    async fn delete_organization(&self, id: Uuid) -> RepoResult<()> {
        let mut store = self.store();
        store.organizations.retain(|o| o.id != id);
        store.members.retain(|m| m.organization_id != id);
        store.projects.retain(|p| p.organization_id != id);
        store.invites.retain(|i| i.organization_id != id);
        Ok(())
    }

    async fn transfer_organization_ownership(
        &self,
        organization_id: Uuid,
        to_user_id: Uuid,
    ) -> RepoResult<()> {
        let mut store = self.store();
        let Some(member) = store
            .members
            .iter_mut()
            .find(|m| m.organization_id == organization_id && m.user_id == to_user_id)
        else {
            return Err(AppError::BadRequest(TARGET_NOT_A_MEMBER.to_string()));
        };
        member.role = Role::Admin;
        if let Some(organization) = store
            .organizations
            .iter_mut()
            .find(|o| o.id == organization_id)
        {
            organization.owner_id = to_user_id;
        }
        Ok(())
    }

    async fn get_membership(
        &self,
        user_id: Uuid,
        org_slug: &str,
    ) -> RepoResult<Option<(Member, Organization)>> {
        let store = self.store();
        let Some(organization) = store.organizations.iter().find(|o| o.slug == org_slug) else {
            return Ok(None);
        };
        Ok(store
            .members
            .iter()
            .find(|m| m.organization_id == organization.id && m.user_id == user_id)
            .map(|m| (m.clone(), organization.clone())))
    }

    async fn get_members(&self, organization_id: Uuid) -> RepoResult<Vec<MemberDetails>> {
        let store = self.store();
        Ok(store
            .members
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .filter_map(|m| Self::member_details(&store, m))
            .collect())
    }

    async fn get_member(
        &self,
        member_id: Uuid,
        organization_id: Uuid,
    ) -> RepoResult<Option<Member>> {
        let member = self
            .store()
            .members
            .iter()
            .find(|m| m.id == member_id && m.organization_id == organization_id)
            .cloned();
        self.run_member_lookup_hook();
        Ok(member)
    }

    async fn get_member_by_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> RepoResult<Option<Member>> {
        let member = self.member_of(organization_id, user_id);
        self.run_member_lookup_hook();
        Ok(member)
    }

    async fn get_member_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<Member>> {
        let store = self.store();
        let Some(user) = store.users.iter().find(|u| u.email == email) else {
            return Ok(None);
        };
        Ok(store
            .members
            .iter()
            .find(|m| m.organization_id == organization_id && m.user_id == user.id)
            .cloned())
    }

    async fn update_member_role(
        &self,
        member_id: Uuid,
        organization_id: Uuid,
        role: Role,
    ) -> RepoResult<()> {
        if let Some(member) = self
            .store()
            .members
            .iter_mut()
            .find(|m| m.id == member_id && m.organization_id == organization_id)
        {
            member.role = role;
        }
        Ok(())
    }

    async fn delete_member(&self, member_id: Uuid, organization_id: Uuid) -> RepoResult<()> {
        let mut store = self.store();
        let owner_id = store
            .organizations
            .iter()
            .find(|o| o.id == organization_id)
            .map(|o| o.owner_id);
        let Some(position) = store.members.iter().position(|m| {
            m.id == member_id && m.organization_id == organization_id && Some(m.user_id) != owner_id
        }) else {
            return Err(AppError::Forbidden(MEMBER_NOT_REMOVABLE.to_string()));
        };
        store.members.remove(position);
        Ok(())
    }

    async fn count_billable_members(&self, organization_id: Uuid) -> RepoResult<i64> {
        Ok(self
            .store()
            .members
            .iter()
            .filter(|m| m.organization_id == organization_id && m.role != Role::Billing)
            .count() as i64)
    }

    async fn create_project(&self, project: NewProject) -> RepoResult<Project> {
        let mut store = self.store();
        if store.projects.iter().any(|p| p.slug == project.slug) {
            return Err(AppError::BadRequest(
                "Another project with same name already exists.".to_string(),
            ));
        }
        let created = Project {
            id: Uuid::new_v4(),
            name: project.name,
            description: project.description,
            slug: project.slug,
            avatar_key: None,
            organization_id: project.organization_id,
            owner_id: project.owner_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.projects.push(created.clone());
        Ok(created)
    }

    async fn get_project(
        &self,
        project_id: Uuid,
        organization_id: Uuid,
    ) -> RepoResult<Option<Project>> {
        Ok(self
            .store()
            .projects
            .iter()
            .find(|p| p.id == project_id && p.organization_id == organization_id)
            .cloned())
    }

    async fn get_project_by_slug(
        &self,
        organization_id: Uuid,
        project_slug: &str,
    ) -> RepoResult<Option<ProjectDetails>> {
        let store = self.store();
        Ok(store
            .projects
            .iter()
            .find(|p| p.organization_id == organization_id && p.slug == project_slug)
            .map(|p| Self::project_details(&store, p)))
    }

    async fn get_projects(&self, organization_id: Uuid) -> RepoResult<Vec<ProjectDetails>> {
        let store = self.store();
        Ok(store
            .projects
            .iter()
            .filter(|p| p.organization_id == organization_id)
            .map(|p| Self::project_details(&store, p))
            .collect())
    }

    async fn update_project(
        &self,
        project_id: Uuid,
        name: &str,
        description: &str,
    ) -> RepoResult<()> {
        if let Some(project) = self.store().projects.iter_mut().find(|p| p.id == project_id) {
            project.name = name.to_string();
            project.description = description.to_string();
            project.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_project(&self, project_id: Uuid) -> RepoResult<()> {
        self.store().projects.retain(|p| p.id != project_id);
        Ok(())
    }

    async fn count_projects(&self, organization_id: Uuid) -> RepoResult<i64> {
        Ok(self
            .store()
            .projects
            .iter()
            .filter(|p| p.organization_id == organization_id)
            .count() as i64)
    }

    async fn create_invite(&self, invite: NewInvite) -> RepoResult<Invite> {
        let created = Invite {
            id: Uuid::new_v4(),
            email: invite.email,
            role: invite.role,
            organization_id: invite.organization_id,
            author_id: Some(invite.author_id),
            created_at: Utc::now(),
        };
        self.store().invites.push(created.clone());
        Ok(created)
    }

    async fn get_invite(&self, invite_id: Uuid) -> RepoResult<Option<Invite>> {
        Ok(self.store().invites.iter().find(|i| i.id == invite_id).cloned())
    }

    async fn get_invite_details(&self, invite_id: Uuid) -> RepoResult<Option<InviteDetails>> {
        let store = self.store();
        Ok(store
            .invites
            .iter()
            .find(|i| i.id == invite_id)
            .map(|i| Self::invite_details(&store, i)))
    }

    async fn get_invites(&self, organization_id: Uuid) -> RepoResult<Vec<InviteDetails>> {
        let store = self.store();
        Ok(store
            .invites
            .iter()
            .filter(|i| i.organization_id == organization_id)
            .map(|i| Self::invite_details(&store, i))
            .collect())
    }

    async fn get_pending_invites(&self, email: &str) -> RepoResult<Vec<InviteDetails>> {
        let store = self.store();
        Ok(store
            .invites
            .iter()
            .filter(|i| i.email.eq_ignore_ascii_case(email))
            .map(|i| Self::invite_details(&store, i))
            .collect())
    }

    async fn get_invite_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> RepoResult<Option<Invite>> {
        Ok(self
            .store()
            .invites
            .iter()
            .find(|i| i.organization_id == organization_id && i.email == email)
            .cloned())
    }

    async fn accept_invite(&self, invite: &Invite, user_id: Uuid) -> RepoResult<()> {
        let mut store = self.store();
        store.members.push(Member {
            id: Uuid::new_v4(),
            user_id,
            organization_id: invite.organization_id,
            role: invite.role,
        });
        store.invites.retain(|i| i.id != invite.id);
        Ok(())
    }

    async fn delete_invite(&self, invite_id: Uuid) -> RepoResult<()> {
        self.store().invites.retain(|i| i.id != invite_id);
        Ok(())
    }

    async fn create_file(&self, file: NewFile) -> RepoResult<()> {
        self.store().files.push(file);
        Ok(())
    }
}

// --- Tenant fixture ---

/// One organization with a user per role. `owner` is an ADMIN and the org owner.
pub struct Tenant {
    pub repo: Arc<InMemoryRepository>,
    pub organization: Organization,
    pub owner: User,
    pub admin: User,
    pub member: User,
    pub billing: User,
    pub outsider: User,
}

impl Tenant {
    pub fn seed() -> Self {
        let repo = InMemoryRepository::new();
        let owner = repo.seed_user("Olivia Owner", "owner@acme.com");
        let admin = repo.seed_user("Adam Admin", "admin@acme.com");
        let member = repo.seed_user("Mia Member", "member@acme.com");
        let billing = repo.seed_user("Bill Billing", "billing@acme.com");
        let outsider = repo.seed_user("Otto Outsider", "otto@elsewhere.io");

        let organization = repo.seed_organization(&owner, "Acme Inc");
        repo.add_member(&organization, &admin, Role::Admin);
        repo.add_member(&organization, &member, Role::Member);
        repo.add_member(&organization, &billing, Role::Billing);

        Self {
            repo,
            organization,
            owner,
            admin,
            member,
            billing,
            outsider,
        }
    }

    pub fn membership_of(&self, user: &User) -> Member {
        self.repo
            .member_of(self.organization.id, user.id)
            .expect("user should be a member")
    }

    pub fn state(&self) -> AppState {
        test_state(self.repo.clone(), MockStorageService::new())
    }

    pub fn router(&self) -> Router {
        create_router(self.state())
    }
}

// --- State & HTTP helpers ---

pub fn test_state(repo: Arc<InMemoryRepository>, storage: MockStorageService) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        storage: Arc::new(storage) as StorageState,
        config: AppConfig::default(),
    }
}

pub fn bearer(user_id: Uuid) -> String {
    let token = issue_token(&AppConfig::default(), user_id).expect("token should sign");
    format!("Bearer {token}")
}

/// Sends one request through the router and returns the status with the JSON body
/// (`Value::Null` when the body is empty).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user {
        builder = builder.header(header::AUTHORIZATION, bearer(user_id));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
