use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

use super::require_non_empty;
use crate::{
    AppState,
    auth::AuthUser,
    error::AppError,
    models::{CreateUploadRequest, NewFile, UploadResponse},
    storage::sanitize_key,
};

/// A `type/subtype` MIME string, parameters allowed (`text/plain; charset=utf-8`).
fn is_valid_content_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((kind, subtype)) => {
            let token = |part: &str| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || "!#$&-^_.+".contains(c))
            };
            token(kind) && token(subtype)
        }
        None => false,
    }
}

/// create_upload
///
/// [Authenticated Route] Presigns a direct-to-storage PUT for one file and records
/// it as a pending upload. The returned `file_name` is the object key to pass to
/// endpoints such as PATCH /organizations/{slug}/avatar-url.
#[utoipa::path(
    post,
    path = "/upload",
    request_body = CreateUploadRequest,
    responses(
        (status = 201, description = "Presigned URL issued", body = UploadResponse),
        (status = 400, description = "Invalid name or content type"),
        (status = 500, description = "Storage error")
    )
)]
pub async fn create_upload(
    AuthUser { id: user_id }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUploadRequest>,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    require_non_empty(&payload.name, "Name")?;
    if !is_valid_content_type(&payload.content_type) {
        return Err(AppError::BadRequest("Invalid content type.".to_string()));
    }

    let sanitized = sanitize_key(&payload.name);
    if sanitized.is_empty() {
        return Err(AppError::BadRequest("Invalid file name.".to_string()));
    }
    let key = format!("{}-{}", Uuid::new_v4(), sanitized);

    let signed_url = state
        .storage
        .get_presigned_upload_url(&key, &payload.content_type)
        .await?;

    state
        .repo
        .create_file(NewFile {
            name: payload.name,
            content_type: payload.content_type,
            url: state.storage.public_url(&key),
            key: key.clone(),
            user_id,
        })
        .await?;

    tracing::debug!(user_id = %user_id, key = %key, "upload presigned");

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            signed_url,
            file_name: key,
        }),
    ))
}
