use super::{Action, ResourceKind, Role};

/// Ownership predicate attached to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Granted for the kind and every instance of it.
    Always,
    /// Granted only for an instance owned by the acting subject.
    Owner,
}

/// One row of the permission table: `role` may perform each of `actions` on
/// `kind` when `condition` holds.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub role: Role,
    pub actions: &'static [Action],
    pub kind: ResourceKind,
    pub condition: Condition,
}

const MANAGE: &[Action] = &[Action::Create, Action::Get, Action::Update, Action::Delete];

/// The complete permission table. Anything not listed here is denied.
pub const RULES: &[Rule] = &[
    // ADMIN
    Rule {
        role: Role::Admin,
        actions: MANAGE,
        kind: ResourceKind::Project,
        condition: Condition::Always,
    },
    Rule {
        role: Role::Admin,
        actions: MANAGE,
        kind: ResourceKind::User,
        condition: Condition::Always,
    },
    Rule {
        role: Role::Admin,
        actions: MANAGE,
        kind: ResourceKind::Invite,
        condition: Condition::Always,
    },
    Rule {
        role: Role::Admin,
        actions: &[Action::Get, Action::Update, Action::Delete],
        kind: ResourceKind::Organization,
        condition: Condition::Always,
    },
    Rule {
        role: Role::Admin,
        actions: &[Action::TransferOwnership],
        kind: ResourceKind::Organization,
        condition: Condition::Owner,
    },
    Rule {
        role: Role::Admin,
        actions: &[Action::Get],
        kind: ResourceKind::Billing,
        condition: Condition::Always,
    },
    // MEMBER
    Rule {
        role: Role::Member,
        actions: &[Action::Get],
        kind: ResourceKind::Project,
        condition: Condition::Always,
    },
    Rule {
        role: Role::Member,
        actions: &[Action::Get],
        kind: ResourceKind::Organization,
        condition: Condition::Always,
    },
    Rule {
        role: Role::Member,
        actions: &[Action::Update, Action::Delete],
        kind: ResourceKind::Project,
        condition: Condition::Owner,
    },
    Rule {
        role: Role::Member,
        actions: &[Action::Update, Action::Delete],
        kind: ResourceKind::User,
        condition: Condition::Owner,
    },
    // BILLING
    Rule {
        role: Role::Billing,
        actions: &[Action::Get],
        kind: ResourceKind::Billing,
        condition: Condition::Always,
    },
];

/// Rules granting `action` on `kind` to `role`.
pub(super) fn matching(
    role: Role,
    action: Action,
    kind: ResourceKind,
) -> impl Iterator<Item = &'static Rule> {
    RULES
        .iter()
        .filter(move |rule| rule.role == role && rule.kind == kind && rule.actions.contains(&action))
}
