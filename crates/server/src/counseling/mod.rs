//! Counseling categories, sessions and messages
//!
//! Every operation is scoped to the authenticated user. Rows coming back
//! from the database are validated before they are mapped to API types:
//! list operations skip rows that fail, single-row operations report a
//! `*_VALIDATION_ERROR`.

use serde_json::Value;
use shared::{
    Category, CategoryList, CreateCategoryRequest, CreateMessageRequest, CreateSessionRequest,
    CursorPagination, DeleteSessionResponse, ErrorCode, Message, MessageListQuery, MessagePage,
    MostActiveCategory, OffsetPagination, Page, Session, SessionListQuery, SessionMetadata,
    SessionPage, SessionStats, SessionStatus, UpdateSessionRequest, DEFAULT_CATEGORY_COLOR,
    DEFAULT_CATEGORY_ICON,
};
use uuid::Uuid;

use crate::db::{
    format_timestamp, now, CategoryRow, Database, MessageFilter, MessageRow, RowError,
    SessionChanges, SessionFilter, SessionRow,
};
use crate::error::AppError;

mod stats;
mod validate;

pub struct CounselingService<'a> {
    db: &'a Database,
}

impl<'a> CounselingService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn list_categories(&self, user_id: Uuid) -> Result<CategoryList, AppError> {
        let default_rows = self
            .db
            .list_default_categories()
            .await
            .map_err(|e| AppError::service(ErrorCode::CategoryFetchError, e))?;
        let custom_rows = self
            .db
            .list_custom_categories(&user_id.to_string())
            .await
            .map_err(|e| AppError::service(ErrorCode::CategoryFetchError, e))?;

        Ok(CategoryList {
            default_categories: keep_valid(default_rows, "category"),
            custom_categories: keep_valid(custom_rows, "category"),
        })
    }

    /// Default categories and the user's own custom ones are visible
    pub async fn get_category(&self, user_id: Uuid, category_id: Uuid) -> Result<Category, AppError> {
        let row = self
            .db
            .get_category(&category_id.to_string())
            .await
            .map_err(|e| AppError::service(ErrorCode::CategoryFetchError, e))?
            .ok_or(AppError::NotFound(ErrorCode::CategoryNotFound))?;

        let category: Category = validated(row, ErrorCode::CategoryValidationError)?;
        if category.is_custom && category.user_id != Some(user_id) {
            return Err(AppError::NotFound(ErrorCode::CategoryNotFound));
        }
        Ok(category)
    }

    pub async fn create_category(
        &self,
        user_id: Uuid,
        req: CreateCategoryRequest,
    ) -> Result<Category, AppError> {
        validate::create_category(&req).map_err(|e| {
            AppError::invalid(ErrorCode::CategoryValidationError, "Invalid category data", e)
        })?;

        let initial_questions = serde_json::to_string(&req.initial_questions)
            .map_err(|e| AppError::service(ErrorCode::CategoryCreateError, e))?;
        let row = CategoryRow {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            description: req.description,
            icon: req.icon.unwrap_or_else(|| DEFAULT_CATEGORY_ICON.to_string()),
            color: req.color.unwrap_or_else(|| DEFAULT_CATEGORY_COLOR.to_string()),
            initial_questions,
            is_custom: true,
            user_id: Some(user_id.to_string()),
            created_at: now(),
        };

        self.db
            .create_category(&row)
            .await
            .map_err(|e| AppError::service(ErrorCode::CategoryCreateError, e))?;

        tracing::info!("User {} created custom category {}", user_id, row.id);
        validated(row, ErrorCode::CategoryValidationError)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    pub async fn create_session(
        &self,
        user_id: Uuid,
        req: CreateSessionRequest,
    ) -> Result<Session, AppError> {
        validate::create_session(&req).map_err(|e| {
            AppError::invalid(ErrorCode::SessionValidationError, "Invalid session data", e)
        })?;

        // Unknown and foreign custom categories are both "not found"
        self.get_category(user_id, req.category_id).await?;

        let initial_responses = serde_json::to_string(&req.initial_responses)
            .map_err(|e| AppError::service(ErrorCode::SessionCreateError, e))?;
        let metadata = serde_json::to_string(&SessionMetadata::with_message_count(0))
            .map_err(|e| AppError::service(ErrorCode::SessionCreateError, e))?;
        let timestamp = now();

        let row = SessionRow {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            category_id: req.category_id.to_string(),
            counselor_id: None,
            title: req.title,
            status: SessionStatus::Active.to_string(),
            initial_responses,
            metadata,
            summary: None,
            thumbnail: None,
            created_at: timestamp.clone(),
            last_activity_at: timestamp.clone(),
            updated_at: timestamp,
        };

        self.db
            .create_session(&row)
            .await
            .map_err(|e| AppError::service(ErrorCode::SessionCreateError, e))?;

        tracing::info!("Session created: {} (user {})", row.id, user_id);
        validated(row, ErrorCode::SessionValidationError)
    }

    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        query: SessionListQuery,
    ) -> Result<SessionPage, AppError> {
        validate::session_list_query(&query).map_err(|e| {
            AppError::invalid(ErrorCode::InvalidRequest, "Invalid query parameters", e)
        })?;

        let user_id = user_id.to_string();
        let filter = SessionFilter {
            status: query.status.map(|s| s.to_string()),
            category_id: query.category_id.map(|id| id.to_string()),
        };
        let (limit, offset) = (query.limit(), query.offset());

        let total = self
            .db
            .count_sessions(&user_id, &filter)
            .await
            .map_err(|e| AppError::service(ErrorCode::SessionFetchError, e))?;
        let rows = self
            .db
            .list_sessions(&user_id, &filter, limit, offset)
            .await
            .map_err(|e| AppError::service(ErrorCode::SessionFetchError, e))?;

        let data: Vec<Session> = keep_valid(rows, "session");
        let has_more = total > u64::from(offset) + data.len() as u64;

        Ok(Page {
            data,
            pagination: OffsetPagination {
                total,
                limit,
                offset,
                has_more,
            },
        })
    }

    pub async fn get_session(&self, user_id: Uuid, session_id: Uuid) -> Result<Session, AppError> {
        let row = self.find_session_row(user_id, session_id).await?;
        validated(row, ErrorCode::SessionValidationError)
    }

    pub async fn update_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        req: UpdateSessionRequest,
    ) -> Result<Session, AppError> {
        validate::update_session(&req).map_err(|e| {
            AppError::invalid(ErrorCode::SessionValidationError, "Invalid update data", e)
        })?;

        let metadata = match req.metadata {
            Some(patch) => match serde_json::to_value(patch) {
                Ok(Value::Object(map)) => Some(map),
                Ok(_) => None,
                Err(e) => return Err(AppError::service(ErrorCode::SessionUpdateError, e)),
            },
            None => None,
        };

        let changes = SessionChanges {
            title: req.title,
            status: req.status.map(|s| s.to_string()),
            summary: req.summary,
            thumbnail: req.thumbnail,
            metadata,
        };

        let row = self
            .db
            .update_session(&session_id.to_string(), &user_id.to_string(), &changes)
            .await
            .map_err(|e| AppError::service(ErrorCode::SessionUpdateError, e))?
            .ok_or(AppError::NotFound(ErrorCode::SessionNotFound))?;

        tracing::debug!("Session updated: {}", session_id);
        validated(row, ErrorCode::SessionValidationError)
    }

    /// Archives the session. Archiving twice is not an error.
    pub async fn delete_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<DeleteSessionResponse, AppError> {
        let archived = self
            .db
            .archive_session(&session_id.to_string(), &user_id.to_string())
            .await
            .map_err(|e| AppError::service(ErrorCode::SessionDeleteError, e))?;

        if !archived {
            return Err(AppError::NotFound(ErrorCode::SessionNotFound));
        }

        tracing::info!("Session archived: {}", session_id);
        Ok(DeleteSessionResponse { success: true })
    }

    pub async fn session_stats(&self, user_id: Uuid) -> Result<SessionStats, AppError> {
        let rows = self
            .db
            .get_sessions_for_user(&user_id.to_string())
            .await
            .map_err(|e| AppError::service(ErrorCode::SessionFetchError, e))?;
        let sessions: Vec<Session> = keep_valid(rows, "session");

        let mut stats = stats::summarize(&sessions);

        if let Some((category_id, session_count)) = stats::top_category(&sessions) {
            let category = self
                .db
                .get_category(&category_id.to_string())
                .await
                .map_err(|e| AppError::service(ErrorCode::SessionFetchError, e))?;

            // A missing category row leaves the field empty
            stats.most_active_category = category.map(|c| MostActiveCategory {
                id: category_id,
                name: c.name,
                session_count,
            });
        }

        Ok(stats)
    }

    // ========================================================================
    // Messages
    // ========================================================================

    pub async fn create_message(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        req: CreateMessageRequest,
    ) -> Result<Message, AppError> {
        validate::create_message(&req).map_err(|e| {
            AppError::invalid(ErrorCode::MessageValidationError, "Invalid message data", e)
        })?;

        self.find_session_row(user_id, session_id).await?;

        let metadata = req
            .metadata
            .map(|m| serde_json::to_string(&m))
            .transpose()
            .map_err(|e| AppError::service(ErrorCode::MessageCreateError, e))?;

        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            sender_id: user_id.to_string(),
            content: req.content,
            message_type: req.message_type.to_string(),
            is_bookmarked: false,
            metadata,
            created_at: now(),
        };

        self.db
            .create_message(&row)
            .await
            .map_err(|e| AppError::service(ErrorCode::MessageCreateError, e))?;

        tracing::debug!("Message {} appended to session {}", row.id, session_id);
        validated(row, ErrorCode::MessageValidationError)
    }

    /// Newest first. `cursor` continues after the given message.
    pub async fn list_messages(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        query: MessageListQuery,
    ) -> Result<MessagePage, AppError> {
        validate::message_list_query(&query).map_err(|e| {
            AppError::invalid(ErrorCode::InvalidRequest, "Invalid query parameters", e)
        })?;

        self.find_session_row(user_id, session_id).await?;

        let session_id = session_id.to_string();
        let limit = query.limit();

        // An unknown cursor is ignored rather than rejected
        let older_than = match query.cursor {
            Some(cursor) => self
                .db
                .get_message_position(&session_id, &cursor.to_string())
                .await
                .map_err(|e| AppError::service(ErrorCode::MessageFetchError, e))?,
            None => None,
        };

        let filter = MessageFilter {
            older_than,
            before_date: query.before_date.map(format_timestamp),
        };

        let total = self
            .db
            .count_messages(&session_id, &filter)
            .await
            .map_err(|e| AppError::service(ErrorCode::MessageFetchError, e))?;
        let rows = self
            .db
            .list_messages(&session_id, &filter, limit)
            .await
            .map_err(|e| AppError::service(ErrorCode::MessageFetchError, e))?;

        let has_more = rows.len() == limit as usize;
        let data: Vec<Message> = keep_valid(rows, "message");
        let cursor = data.last().map(|m| m.id);

        Ok(Page {
            data,
            pagination: CursorPagination {
                total,
                limit,
                cursor,
                has_more,
            },
        })
    }

    pub async fn toggle_bookmark(&self, user_id: Uuid, message_id: Uuid) -> Result<Message, AppError> {
        let message_id = message_id.to_string();

        let owner = self
            .db
            .get_message_owner(&message_id)
            .await
            .map_err(|e| AppError::service(ErrorCode::MessageFetchError, e))?
            .ok_or(AppError::NotFound(ErrorCode::MessageNotFound))?;

        if owner != user_id.to_string() {
            tracing::warn!("User {} tried to bookmark message {} they do not own", user_id, message_id);
            return Err(AppError::Forbidden(ErrorCode::MessageUnauthorized));
        }

        let row = self
            .db
            .toggle_bookmark(&message_id)
            .await
            .map_err(|e| AppError::service(ErrorCode::MessageUpdateError, e))?
            .ok_or(AppError::NotFound(ErrorCode::MessageNotFound))?;

        validated(row, ErrorCode::MessageValidationError)
    }

    async fn find_session_row(&self, user_id: Uuid, session_id: Uuid) -> Result<SessionRow, AppError> {
        self.db
            .get_session(&session_id.to_string(), &user_id.to_string())
            .await
            .map_err(|e| AppError::service(ErrorCode::SessionFetchError, e))?
            .ok_or(AppError::NotFound(ErrorCode::SessionNotFound))
    }
}

/// Map rows to API types, dropping (and logging) the ones that fail validation
fn keep_valid<R, T>(rows: Vec<R>, entity: &str) -> Vec<T>
where
    T: TryFrom<R, Error = RowError>,
{
    rows.into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Skipping invalid {} row: {}", entity, e);
                None
            }
        })
        .collect()
}

fn validated<R, T>(row: R, code: ErrorCode) -> Result<T, AppError>
where
    T: TryFrom<R, Error = RowError>,
{
    T::try_from(row).map_err(|e| AppError::service(code, e))
}

#[cfg(test)]
mod tests;
