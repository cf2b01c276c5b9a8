use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use super::require_non_empty;
use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    membership::Membership,
    models::{CreatedProjectResponse, NewProject, Project, ProjectDetails, ProjectRequest},
    permissions::{Action, Resource, ResourceKind},
    slug::create_slug,
};

/// Lookup scoped to the caller's organization; a project of another tenant is not found.
async fn find_project(
    state: &AppState,
    membership: &Membership,
    project_id: Uuid,
) -> Result<Project, AppError> {
    state
        .repo
        .get_project(project_id, membership.organization.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found.".to_string()))
}

/// create_project
///
/// [Authenticated Route] Creates a project in the organization, owned by the caller.
#[utoipa::path(
    post,
    path = "/organizations/{slug}/projects",
    params(("slug" = String, Path, description = "Organization slug")),
    request_body = ProjectRequest,
    responses(
        (status = 201, description = "Project created", body = CreatedProjectResponse),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn create_project(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(payload): Json<ProjectRequest>,
) -> Result<(StatusCode, Json<CreatedProjectResponse>), AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Create,
        ResourceKind::Project,
        "You're not allowed to create new projects.",
    )?;
    require_non_empty(&payload.name, "Name")?;

    let project_slug = create_slug(&payload.name);
    if project_slug.is_empty() {
        return Err(AppError::BadRequest(
            "Name must contain at least one letter or digit.".to_string(),
        ));
    }

    let project = state
        .repo
        .create_project(NewProject {
            name: payload.name,
            slug: project_slug,
            description: payload.description,
            organization_id: membership.organization.id,
            owner_id: user_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedProjectResponse {
            project_id: project.id,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/organizations/{slug}/projects",
    params(("slug" = String, Path, description = "Organization slug")),
    responses(
        (status = 200, description = "Organization projects", body = [ProjectDetails]),
        (status = 403, description = "Forbidden")
    )
)]
pub async fn get_projects(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<ProjectDetails>>, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Get,
        ResourceKind::Project,
        "You're not allowed to see organization projects.",
    )?;

    let projects = state.repo.get_projects(membership.organization.id).await?;
    Ok(Json(projects))
}

/// get_project
///
/// [Authenticated Route] Project details by slug. The permission is checked before
/// the lookup, so a caller without access cannot probe for project slugs.
#[utoipa::path(
    get,
    path = "/organizations/{slug}/projects/{project_slug}",
    params(
        ("slug" = String, Path, description = "Organization slug"),
        ("project_slug" = String, Path, description = "Project slug")
    ),
    responses(
        (status = 200, description = "Project", body = ProjectDetails),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_project(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path((slug, project_slug)): Path<(String, String)>,
) -> Result<Json<ProjectDetails>, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    membership.require(
        Action::Get,
        ResourceKind::Project,
        "You're not allowed to see this project.",
    )?;

    let project = state
        .repo
        .get_project_by_slug(membership.organization.id, &project_slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found.".to_string()))?;
    Ok(Json(project))
}

/// update_project
///
/// [Authenticated Route] ADMINs may update any project; other roles only the
/// projects they own.
#[utoipa::path(
    put,
    path = "/organizations/{slug}/projects/{project_id}",
    params(
        ("slug" = String, Path, description = "Organization slug"),
        ("project_id" = Uuid, Path, description = "Project id")
    ),
    request_body = ProjectRequest,
    responses(
        (status = 204, description = "Updated"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_project(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path((slug, project_id)): Path<(String, Uuid)>,
    Json(payload): Json<ProjectRequest>,
) -> Result<StatusCode, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    let project = find_project(&state, &membership, project_id).await?;
    membership.require(
        Action::Update,
        Resource::from(&project),
        "You're not allowed to update this project.",
    )?;
    require_non_empty(&payload.name, "Name")?;

    state
        .repo
        .update_project(project.id, &payload.name, &payload.description)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/organizations/{slug}/projects/{project_id}",
    params(
        ("slug" = String, Path, description = "Organization slug"),
        ("project_id" = Uuid, Path, description = "Project id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_project(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Path((slug, project_id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    let membership = Membership::resolve(state.repo.as_ref(), user_id, &slug).await?;
    let project = find_project(&state, &membership, project_id).await?;
    membership.require(
        Action::Delete,
        Resource::from(&project),
        "You're not allowed to delete this project.",
    )?;

    state.repo.delete_project(project.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
