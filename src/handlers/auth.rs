use axum::{Json, extract::State, http::StatusCode};

use super::{require_email, require_non_empty};
use crate::{
    AppState,
    auth::{AuthUser, issue_token},
    error::AppError,
    models::{
        AuthenticateWithPasswordRequest, CreateAccountRequest, NewAccount,
        PasswordRecoverRequest, ResetPasswordRequest, SessionResponse, UserProfile,
    },
    password::{MIN_PASSWORD_LENGTH, hash_password, verify_password},
};

fn require_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Password must have at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    Ok(())
}

/// create_account
///
/// [Public Route] Registers a new account. When an organization auto-attaches the
/// e-mail's domain, the user joins it as MEMBER in the same transaction.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Invalid payload or e-mail already in use")
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<StatusCode, AppError> {
    require_non_empty(&payload.name, "Name")?;
    let domain = require_email(&payload.email)?;
    require_password(&payload.password)?;

    if state.repo.get_user_by_email(&payload.email).await?.is_some() {
        return Err(AppError::BadRequest(
            "User with same e-mail already exists.".to_string(),
        ));
    }

    let auto_join = state.repo.get_auto_join_organization(domain).await?;
    let password_hash = hash_password(&payload.password)?;

    let user = state
        .repo
        .create_account(
            NewAccount {
                name: payload.name,
                email: payload.email,
                password_hash,
            },
            auto_join.as_ref().map(|organization| organization.id),
        )
        .await?;

    if let Some(organization) = auto_join {
        tracing::info!(user_id = %user.id, organization = %organization.slug, "user auto-joined by domain");
    }

    Ok(StatusCode::CREATED)
}

/// authenticate_with_password
///
/// [Public Route] Exchanges e-mail and password for a session token. Every failure
/// answers with the same message so the endpoint does not reveal which e-mails exist.
#[utoipa::path(
    post,
    path = "/sessions/password",
    request_body = AuthenticateWithPasswordRequest,
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn authenticate_with_password(
    State(state): State<AppState>,
    Json(payload): Json<AuthenticateWithPasswordRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let invalid = || AppError::BadRequest("Invalid credentials.".to_string());

    let user = state
        .repo
        .get_user_by_email(&payload.email)
        .await?
        .ok_or_else(invalid)?;

    // Accounts created through an external provider have no password.
    let password_hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&payload.password, password_hash)? {
        return Err(invalid());
    }

    let token = issue_token(&state.config, user.id)?;
    Ok((StatusCode::CREATED, Json(SessionResponse { token })))
}

/// get_profile
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Unauthenticated")
    )
)]
pub async fn get_profile(
    AuthUser { id }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, AppError> {
    let user = state
        .repo
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))?;
    Ok(Json(user.into()))
}

/// request_password_recover
///
/// [Public Route] Issues a recovery code. Always answers 201 so the endpoint does not
/// reveal whether the e-mail is registered. There is no mail transport: the code is
/// written to the log.
#[utoipa::path(
    post,
    path = "/password/recover",
    request_body = PasswordRecoverRequest,
    responses((status = 201, description = "Recovery requested"))
)]
pub async fn request_password_recover(
    State(state): State<AppState>,
    Json(payload): Json<PasswordRecoverRequest>,
) -> Result<StatusCode, AppError> {
    let Some(user) = state.repo.get_user_by_email(&payload.email).await? else {
        return Ok(StatusCode::CREATED);
    };

    let token = state.repo.create_password_recover_token(user.id).await?;
    tracing::info!(user_id = %user.id, code = %token.id, "password recover token issued");

    Ok(StatusCode::CREATED)
}

/// reset_password
///
/// [Public Route] Sets a new password from a recovery code and consumes the code.
#[utoipa::path(
    post,
    path = "/password/reset",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 400, description = "Invalid password"),
        (status = 401, description = "Unknown recovery code")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<StatusCode, AppError> {
    require_password(&payload.password)?;

    let token = state
        .repo
        .get_token(payload.code)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Invalid recovery code.".to_string()))?;

    let password_hash = hash_password(&payload.password)?;
    state
        .repo
        .reset_password(token.user_id, &password_hash, token.id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
