//! Resolution of the caller's membership in an organization.
//!
//! Every organization-scoped handler starts here: the slug is resolved into the
//! caller's [`Member`] row and its [`Organization`], and all engine inputs
//! ([`Subject`](crate::permissions::Subject) and [`Resource`]) are built from those
//! stored rows, never from request input.

use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Member, Organization, Project},
    permissions::{Action, Permissions, Resource, Target, get_user_permissions},
    repository::Repository,
};

#[derive(Debug, Clone)]
pub struct Membership {
    pub user_id: Uuid,
    pub member: Member,
    pub organization: Organization,
}

impl Membership {
    /// resolve
    ///
    /// Looks up the membership of `user_id` in the organization `slug`. An unknown
    /// slug and a non-member caller are the same failure.
    pub async fn resolve(
        repo: &dyn Repository,
        user_id: Uuid,
        slug: &str,
    ) -> Result<Self, AppError> {
        let (member, organization) = repo.get_membership(user_id, slug).await?.ok_or_else(|| {
            AppError::Forbidden("You're not a member of this organization.".to_string())
        })?;

        Ok(Self {
            user_id,
            member,
            organization,
        })
    }

    pub fn permissions(&self) -> Permissions {
        get_user_permissions(self.user_id, self.member.role)
    }

    pub fn organization_resource(&self) -> Resource {
        Resource::from(&self.organization)
    }

    /// The `User` resource for a membership row of this organization.
    pub fn member_resource(&self, member: &Member) -> Resource {
        Resource::User {
            id: member.user_id,
            role: member.role,
            owner: member.user_id == self.organization.owner_id,
        }
    }

    /// require
    ///
    /// Evaluates `action` on `target` for the caller and turns a deny into
    /// `AppError::Forbidden(message)`.
    pub fn require(
        &self,
        action: Action,
        target: impl Into<Target>,
        message: &str,
    ) -> Result<(), AppError> {
        let target = target.into();
        let permissions = self.permissions();

        if permissions.cannot(action, target) {
            tracing::debug!(
                user_id = %self.user_id,
                role = %self.member.role,
                %action,
                %target,
                organization = %self.organization.slug,
                "permission denied"
            );
            return Err(AppError::Forbidden(message.to_string()));
        }
        Ok(())
    }
}

impl From<&Organization> for Resource {
    fn from(organization: &Organization) -> Self {
        Resource::Organization {
            id: organization.id,
            owner_id: organization.owner_id,
        }
    }
}

impl From<&Project> for Resource {
    fn from(project: &Project) -> Self {
        Resource::Project {
            id: project.id,
            owner_id: project.owner_id,
        }
    }
}
