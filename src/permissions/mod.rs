//! Role-based access control for organization resources.
//!
//! A check is built from the acting [`Subject`] (user id + membership role)
//! and evaluated against the static [`RULES`] table:
//!
//! 1. Deleting the membership of the organization owner is always denied.
//! 2. A matching role rule allows the action. Rules conditioned on ownership
//!    only match a concrete, owned [`Resource`].
//! 3. Otherwise the owner of a specific instance may still update, delete or
//!    transfer it, whatever their role.
//!
//! Evaluation is pure and never fails: a combination with no rule is denied.

mod rules;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

pub use rules::{Condition, RULES, Rule};

/// Membership role of a user within one organization.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    ToSchema,
    sqlx::Type,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "role", rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    Member,
    Billing,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Member, Role::Billing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
            Role::Billing => "BILLING",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Get,
    Update,
    Delete,
    TransferOwnership,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Create,
        Action::Get,
        Action::Update,
        Action::Delete,
        Action::TransferOwnership,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Get => "get",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::TransferOwnership => "transfer_ownership",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action `{0}`")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Organization,
    Project,
    User,
    Billing,
    Invite,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Organization,
        ResourceKind::Project,
        ResourceKind::User,
        ResourceKind::Billing,
        ResourceKind::Invite,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Organization => "Organization",
            ResourceKind::Project => "Project",
            ResourceKind::User => "User",
            ResourceKind::Billing => "Billing",
            ResourceKind::Invite => "Invite",
        };
        f.write_str(name)
    }
}

/// A concrete resource instance, carrying exactly what ownership needs.
///
/// Built at the data-access boundary (see [`crate::membership`]), never from
/// request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Organization { id: Uuid, owner_id: Uuid },
    /// Owned independently of the organization owner.
    Project { id: Uuid, owner_id: Uuid },
    /// A membership record. `id` is the member's user id; `owner` is true iff
    /// that user owns the organization.
    User { id: Uuid, role: Role, owner: bool },
    Billing,
    Invite,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Organization { .. } => ResourceKind::Organization,
            Resource::Project { .. } => ResourceKind::Project,
            Resource::User { .. } => ResourceKind::User,
            Resource::Billing => ResourceKind::Billing,
            Resource::Invite => ResourceKind::Invite,
        }
    }

    fn is_owned_by(&self, subject: &Subject) -> bool {
        match *self {
            Resource::Organization { owner_id, .. } | Resource::Project { owner_id, .. } => {
                owner_id == subject.user_id
            }
            Resource::User { id, owner, .. } => owner && id == subject.user_id,
            Resource::Billing | Resource::Invite => false,
        }
    }

    fn is_owner_membership(&self) -> bool {
        matches!(self, Resource::User { owner: true, .. })
    }
}

/// What a check is evaluated against: a whole kind or one instance of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Kind(ResourceKind),
    Instance(Resource),
}

impl Target {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Target::Kind(kind) => *kind,
            Target::Instance(resource) => resource.kind(),
        }
    }

    fn instance(&self) -> Option<&Resource> {
        match self {
            Target::Kind(_) => None,
            Target::Instance(resource) => Some(resource),
        }
    }
}

impl From<ResourceKind> for Target {
    fn from(kind: ResourceKind) -> Self {
        Target::Kind(kind)
    }
}

impl From<Resource> for Target {
    fn from(resource: Resource) -> Self {
        Target::Instance(resource)
    }
}

impl From<&Resource> for Target {
    fn from(resource: &Resource) -> Self {
        Target::Instance(*resource)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Kind(kind) => write!(f, "{kind}"),
            Target::Instance(
                Resource::Organization { id, .. }
                | Resource::Project { id, .. }
                | Resource::User { id, .. },
            ) => write!(f, "{}({id})", self.kind()),
            Target::Instance(resource) => write!(f, "{}", resource.kind()),
        }
    }
}

/// The actor of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subject {
    pub user_id: Uuid,
    pub role: Role,
}

/// Permission set of one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    subject: Subject,
}

/// Builds the permission set for `user_id` acting with `role`.
pub fn get_user_permissions(user_id: Uuid, role: Role) -> Permissions {
    Permissions {
        subject: Subject { user_id, role },
    }
}

impl Permissions {
    pub fn subject(&self) -> Subject {
        self.subject
    }

    pub fn can(&self, action: Action, target: impl Into<Target>) -> bool {
        let target = target.into();
        let instance = target.instance();

        // The organization must always keep its owner.
        if action == Action::Delete && instance.is_some_and(Resource::is_owner_membership) {
            return false;
        }

        self.role_allows(action, &target) || self.owner_override(action, instance)
    }

    pub fn cannot(&self, action: Action, target: impl Into<Target>) -> bool {
        !self.can(action, target)
    }

    fn role_allows(&self, action: Action, target: &Target) -> bool {
        rules::matching(self.subject.role, action, target.kind()).any(|rule| match rule.condition
        {
            Condition::Always => true,
            Condition::Owner => target
                .instance()
                .is_some_and(|resource| resource.is_owned_by(&self.subject)),
        })
    }

    fn owner_override(&self, action: Action, instance: Option<&Resource>) -> bool {
        matches!(
            action,
            Action::Update | Action::Delete | Action::TransferOwnership
        ) && instance.is_some_and(|resource| resource.is_owned_by(&self.subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ME: Uuid = Uuid::from_u128(1);
    const OTHER: Uuid = Uuid::from_u128(2);
    const ORG: Uuid = Uuid::from_u128(10);
    const PROJECT: Uuid = Uuid::from_u128(20);

    fn org(owner_id: Uuid) -> Resource {
        Resource::Organization { id: ORG, owner_id }
    }

    fn project(owner_id: Uuid) -> Resource {
        Resource::Project {
            id: PROJECT,
            owner_id,
        }
    }

    fn member(id: Uuid, owner: bool) -> Resource {
        Resource::User {
            id,
            role: Role::Member,
            owner,
        }
    }

    fn every_target() -> Vec<Target> {
        let mut targets: Vec<Target> = ResourceKind::ALL.into_iter().map(Target::from).collect();
        for owner in [ME, OTHER] {
            targets.push(org(owner).into());
            targets.push(project(owner).into());
            targets.push(member(owner, true).into());
            targets.push(member(owner, false).into());
        }
        targets.push(Resource::Billing.into());
        targets.push(Resource::Invite.into());
        targets
    }

    #[test]
    fn cannot_is_the_negation_of_can() {
        for role in Role::ALL {
            let permissions = get_user_permissions(ME, role);
            for action in Action::ALL {
                for target in every_target() {
                    assert_eq!(
                        permissions.cannot(action, target),
                        !permissions.can(action, target),
                        "{role} {action} {target}"
                    );
                }
            }
        }
    }

    #[test]
    fn unlisted_combinations_are_denied() {
        for role in Role::ALL {
            let permissions = get_user_permissions(ME, role);
            for action in Action::ALL {
                for kind in ResourceKind::ALL {
                    let granted = rules::matching(role, action, kind)
                        .any(|rule| rule.condition == Condition::Always);
                    assert_eq!(permissions.can(action, kind), granted, "{role} {action} {kind}");
                }
            }
        }
    }

    #[test]
    fn admin_manages_projects_members_and_invites() {
        let admin = get_user_permissions(ME, Role::Admin);
        for action in [Action::Create, Action::Get, Action::Update, Action::Delete] {
            assert!(admin.can(action, ResourceKind::Project));
            assert!(admin.can(action, ResourceKind::User));
            assert!(admin.can(action, ResourceKind::Invite));
        }
        assert!(admin.can(Action::Update, org(OTHER)));
        assert!(admin.can(Action::Delete, org(OTHER)));
        assert!(admin.can(Action::Get, ResourceKind::Billing));
        assert!(admin.cannot(Action::Create, ResourceKind::Organization));
    }

    #[test]
    fn admin_transfers_only_an_owned_organization() {
        let admin = get_user_permissions(ME, Role::Admin);
        assert!(admin.cannot(Action::TransferOwnership, org(OTHER)));
        assert!(admin.cannot(Action::TransferOwnership, ResourceKind::Organization));
        assert!(admin.can(Action::TransferOwnership, org(ME)));
    }

    #[test]
    fn member_reads_and_edits_own_projects() {
        let member_permissions = get_user_permissions(ME, Role::Member);
        assert!(member_permissions.cannot(Action::Create, ResourceKind::Project));
        assert!(member_permissions.can(Action::Get, ResourceKind::Project));
        assert!(member_permissions.can(Action::Get, org(OTHER)));
        assert!(member_permissions.can(Action::Update, project(ME)));
        assert!(member_permissions.can(Action::Delete, project(ME)));
        assert!(member_permissions.cannot(Action::Update, project(OTHER)));
        assert!(member_permissions.cannot(Action::Delete, project(OTHER)));
    }

    #[test]
    fn member_cannot_manage_others() {
        let member_permissions = get_user_permissions(ME, Role::Member);
        assert!(member_permissions.cannot(Action::Get, ResourceKind::Billing));
        assert!(member_permissions.cannot(Action::Get, ResourceKind::Invite));
        assert!(member_permissions.cannot(Action::Create, ResourceKind::Invite));
        assert!(member_permissions.cannot(Action::Update, member(OTHER, false)));
        assert!(member_permissions.cannot(Action::Delete, member(OTHER, false)));
        assert!(member_permissions.cannot(Action::TransferOwnership, org(OTHER)));
        // Only the organization owner owns a membership record.
        assert!(member_permissions.cannot(Action::Update, member(ME, false)));
    }

    #[test]
    fn billing_only_reads_billing() {
        let billing = get_user_permissions(ME, Role::Billing);
        assert!(billing.can(Action::Get, ResourceKind::Billing));
        assert!(billing.can(Action::Get, Resource::Billing));
        assert!(billing.cannot(Action::Get, ResourceKind::Project));
        assert!(billing.cannot(Action::Get, org(OTHER)));
        assert!(billing.cannot(Action::TransferOwnership, Resource::Billing));
    }

    #[test]
    fn owner_override_applies_to_every_role() {
        for role in Role::ALL {
            let permissions = get_user_permissions(ME, role);
            for resource in [org(ME), project(ME)] {
                assert!(permissions.can(Action::Update, resource), "{role} update {resource:?}");
                assert!(permissions.can(Action::Delete, resource), "{role} delete {resource:?}");
                assert!(permissions.can(Action::TransferOwnership, resource));
            }
            assert!(permissions.can(Action::Update, member(ME, true)));
        }
    }

    #[test]
    fn owner_override_never_escalates_to_the_kind() {
        let billing = get_user_permissions(ME, Role::Billing);
        assert!(billing.can(Action::Update, project(ME)));
        assert!(billing.cannot(Action::Update, ResourceKind::Project));
        assert!(billing.cannot(Action::Update, project(OTHER)));
        assert!(billing.cannot(Action::Get, project(ME)));
    }

    #[test]
    fn owner_membership_is_never_deleted() {
        for role in Role::ALL {
            for actor in [ME, OTHER] {
                let permissions = get_user_permissions(actor, role);
                assert!(
                    permissions.cannot(Action::Delete, member(ME, true)),
                    "{role} as {actor} deleted the owner membership"
                );
            }
        }
        let admin = get_user_permissions(ME, Role::Admin);
        assert!(admin.can(Action::Delete, member(OTHER, false)));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let permissions = get_user_permissions(ME, Role::Member);
        let first: Vec<bool> = every_target()
            .into_iter()
            .map(|target| permissions.can(Action::Update, target))
            .collect();
        let second: Vec<bool> = every_target()
            .into_iter()
            .map(|target| permissions.can(Action::Update, target))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn actions_parse_from_their_wire_names() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>(), Ok(action));
        }
        assert_eq!(
            "manage".parse::<Action>(),
            Err(UnknownAction("manage".to_string()))
        );
    }
}
