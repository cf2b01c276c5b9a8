use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod billing;
pub mod config;
pub mod error;
pub mod handlers;
pub mod membership;
pub mod models;
pub mod password;
pub mod permissions;
pub mod repository;
pub mod slug;
pub mod storage;

// Routing segregation (Public, Authenticated).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// Registers the bearer-token scheme used by every authenticated route.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` payload into the
/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health_check,
        handlers::auth::create_account, handlers::auth::authenticate_with_password,
        handlers::auth::get_profile, handlers::auth::request_password_recover,
        handlers::auth::reset_password,
        handlers::organizations::create_organization, handlers::organizations::get_organizations,
        handlers::organizations::get_membership, handlers::organizations::get_organization,
        handlers::organizations::update_organization, handlers::organizations::shutdown_organization,
        handlers::organizations::transfer_organization,
        handlers::organizations::update_organization_avatar,
        handlers::projects::create_project, handlers::projects::get_projects,
        handlers::projects::get_project, handlers::projects::update_project,
        handlers::projects::delete_project,
        handlers::members::get_members, handlers::members::update_member,
        handlers::members::remove_member,
        handlers::invites::create_invite, handlers::invites::get_invites,
        handlers::invites::revoke_invite, handlers::invites::get_invite,
        handlers::invites::get_pending_invites, handlers::invites::accept_invite,
        handlers::invites::reject_invite,
        handlers::billing::get_organization_billing,
        handlers::uploads::create_upload,
    ),
    components(
        schemas(
            permissions::Role,
            models::UserProfile, models::Organization, models::OrganizationSummary,
            models::Member, models::MemberDetails, models::Project, models::ProjectDetails,
            models::Invite, models::InviteDetails,
            models::CreateAccountRequest, models::AuthenticateWithPasswordRequest,
            models::SessionResponse, models::PasswordRecoverRequest, models::ResetPasswordRequest,
            models::OrganizationRequest, models::CreatedOrganizationResponse,
            models::TransferOwnershipRequest, models::UpdateAvatarRequest,
            models::ProjectRequest, models::CreatedProjectResponse,
            models::UpdateMemberRequest, models::CreateInviteRequest, models::CreatedInviteResponse,
            models::CreateUploadRequest, models::UploadResponse,
            billing::Billing, billing::BillingItem,
        )
    ),
    modifiers(&BearerAuth),
    security(("bearerAuth" = [])),
    tags(
        (name = "saas-api", description = "Multi-tenant SaaS API with role-based access control")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, immutable container of application services shared across requests.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: persistence behind the `Repository` trait.
    pub repo: RepositoryState,
    /// Storage Layer: object storage and presigned URLs.
    pub storage: StorageState,
    /// Configuration: loaded once at startup.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let handlers and the `AuthUser` extractor pull single components out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Enforces authentication for `authenticated_routes`. Extracting `AuthUser` runs the
/// JWT validation and user lookup; a failure short-circuits with 401 before the
/// handler executes.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of a request carries its
/// `x-request-id` alongside method and URI.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
