//! Avatar upload signing

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use shared::{ErrorCode, SignedUpload, SignedUploadQuery};

use crate::{error::AppError, routes::auth::AuthUser, state::AppState, storage};

/// GET /storage/avatar/signed-upload?filename=...
pub async fn avatar_signed_upload(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    params: Result<Query<SignedUploadQuery>, QueryRejection>,
) -> Result<Json<SignedUpload>, AppError> {
    let Query(params) = params.map_err(|e| AppError::Unprocessable {
        message: "Invalid query".to_string(),
        details: Some(serde_json::json!({ "reason": e.body_text() })),
    })?;

    storage::validate_filename(&params.filename).map_err(|e| AppError::Unprocessable {
        message: "Invalid query".to_string(),
        details: Some(e.details()),
    })?;

    let upload = state
        .storage
        .sign_avatar_upload(user_id, &params.filename)
        .await
        .map_err(|e| AppError::service(ErrorCode::StorageError, e))?;

    Ok(Json(upload))
}
