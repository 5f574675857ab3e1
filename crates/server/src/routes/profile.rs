//! Profile endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use shared::{ErrorCode, Profile, UpdateProfileRequest, MAX_NICKNAME_CHARS};

use crate::{
    error::AppError,
    routes::auth::AuthUser,
    state::AppState,
    validation::{self, ValidationError},
};

/// Trimmed nickname and optional avatar URL, ready to store
fn validate_update(req: UpdateProfileRequest) -> Result<(String, Option<String>), ValidationError> {
    let nickname = req.nickname.trim().to_string();
    validation::max_chars("nickname", &nickname, MAX_NICKNAME_CHARS)?;
    if let Some(avatar_url) = &req.avatar_url {
        validation::url("avatar_url", avatar_url)?;
    }
    Ok((nickname, req.avatar_url))
}

/// GET /profile
/// Creates an empty profile on first read
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Profile>, AppError> {
    let id = user_id.to_string();

    let row = match state
        .db
        .get_profile(&id)
        .await
        .map_err(|e| AppError::service(ErrorCode::ProfileFetchError, e))?
    {
        Some(row) => row,
        None => {
            tracing::info!("Initializing profile for user {}", user_id);
            state
                .db
                .init_profile(&id)
                .await
                .map_err(|e| AppError::service(ErrorCode::ProfileUpdateError, e))?
        }
    };

    let profile = Profile::try_from(row).map_err(|e| AppError::service(ErrorCode::ProfileFetchError, e))?;
    Ok(Json(profile))
}

/// PUT /profile
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<Profile>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::Unprocessable {
        message: "Invalid payload".to_string(),
        details: Some(serde_json::json!({ "reason": e.body_text() })),
    })?;

    let (nickname, avatar_url) = validate_update(req).map_err(|e| AppError::Unprocessable {
        message: "Invalid payload".to_string(),
        details: Some(e.details()),
    })?;

    let row = state
        .db
        .upsert_profile(&user_id.to_string(), &nickname, avatar_url.as_deref())
        .await
        .map_err(|e| AppError::service(ErrorCode::ProfileUpdateError, e))?;

    tracing::debug!("Profile updated for user {}", user_id);
    let profile = Profile::try_from(row).map_err(|e| AppError::service(ErrorCode::ProfileUpdateError, e))?;
    Ok(Json(profile))
}
