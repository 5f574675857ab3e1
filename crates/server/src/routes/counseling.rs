//! Counseling endpoints: categories, sessions, messages

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use shared::{
    Category, CategoryList, CreateCategoryRequest, CreateMessageRequest, CreateSessionRequest,
    DeleteSessionResponse, ErrorCode, Message, MessageListQuery, MessagePage, Session,
    SessionListQuery, SessionPage, SessionStats, UpdateSessionRequest,
};
use uuid::Uuid;

use crate::{
    counseling::CounselingService, error::AppError, routes::auth::AuthUser, state::AppState,
};

type Created<T> = (StatusCode, Json<T>);

fn path_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    path.map(|Path(id)| id)
        .map_err(|e| AppError::invalid_request(format!("Invalid id: {}", e.body_text())))
}

fn query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    query
        .map(|Query(q)| q)
        .map_err(|e| AppError::invalid_request(e.body_text()))
}

/// Unparseable bodies are reported with the entity's validation code
fn body<T>(payload: Result<Json<T>, JsonRejection>, code: ErrorCode) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|e| AppError::BadRequest {
        code,
        message: e.body_text(),
        details: None,
    })
}

// ============================================================================
// Categories
// ============================================================================

/// GET /counseling/categories
pub async fn list_categories(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CategoryList>, AppError> {
    let categories = CounselingService::new(&state.db).list_categories(user_id).await?;
    Ok(Json(categories))
}

/// POST /counseling/categories
pub async fn create_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<Created<Category>, AppError> {
    let req = body(payload, ErrorCode::CategoryValidationError)?;
    let category = CounselingService::new(&state.db)
        .create_category(user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /counseling/categories/:categoryId
pub async fn get_category(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    category_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Category>, AppError> {
    let category_id = path_id(category_id)?;
    let category = CounselingService::new(&state.db)
        .get_category(user_id, category_id)
        .await?;
    Ok(Json(category))
}

// ============================================================================
// Sessions
// ============================================================================

/// GET /counseling/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    params: Result<Query<SessionListQuery>, QueryRejection>,
) -> Result<Json<SessionPage>, AppError> {
    let params = query(params)?;
    let page = CounselingService::new(&state.db)
        .list_sessions(user_id, params)
        .await?;
    Ok(Json(page))
}

/// POST /counseling/sessions
pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<Created<Session>, AppError> {
    let req = body(payload, ErrorCode::SessionValidationError)?;
    let session = CounselingService::new(&state.db)
        .create_session(user_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /counseling/sessions/stats
pub async fn session_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SessionStats>, AppError> {
    let stats = CounselingService::new(&state.db).session_stats(user_id).await?;
    Ok(Json(stats))
}

/// GET /counseling/sessions/:sessionId
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    session_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Session>, AppError> {
    let session_id = path_id(session_id)?;
    let session = CounselingService::new(&state.db)
        .get_session(user_id, session_id)
        .await?;
    Ok(Json(session))
}

/// PATCH /counseling/sessions/:sessionId
pub async fn update_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    session_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateSessionRequest>, JsonRejection>,
) -> Result<Json<Session>, AppError> {
    let session_id = path_id(session_id)?;
    let req = body(payload, ErrorCode::SessionValidationError)?;
    let session = CounselingService::new(&state.db)
        .update_session(user_id, session_id, req)
        .await?;
    Ok(Json(session))
}

/// DELETE /counseling/sessions/:sessionId
pub async fn delete_session(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    session_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeleteSessionResponse>, AppError> {
    let session_id = path_id(session_id)?;
    let response = CounselingService::new(&state.db)
        .delete_session(user_id, session_id)
        .await?;
    Ok(Json(response))
}

// ============================================================================
// Messages
// ============================================================================

/// GET /counseling/sessions/:sessionId/messages
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    session_id: Result<Path<Uuid>, PathRejection>,
    params: Result<Query<MessageListQuery>, QueryRejection>,
) -> Result<Json<MessagePage>, AppError> {
    let session_id = path_id(session_id)?;
    let params = query(params)?;
    let page = CounselingService::new(&state.db)
        .list_messages(user_id, session_id, params)
        .await?;
    Ok(Json(page))
}

/// POST /counseling/sessions/:sessionId/messages
pub async fn create_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    session_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<Created<Message>, AppError> {
    let session_id = path_id(session_id)?;
    let req = body(payload, ErrorCode::MessageValidationError)?;
    let message = CounselingService::new(&state.db)
        .create_message(user_id, session_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// PATCH /counseling/messages/:messageId/bookmark
pub async fn toggle_bookmark(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    message_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Message>, AppError> {
    let message_id = path_id(message_id)?;
    let message = CounselingService::new(&state.db)
        .toggle_bookmark(user_id, message_id)
        .await?;
    Ok(Json(message))
}
