use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use shared::{Category, Message, Profile, Session};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Stored timestamps are fixed-width so that text order is time order
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn now() -> String {
    format_timestamp(Utc::now())
}

#[derive(Debug, Clone, FromRow)]
pub struct CategoryRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: String,
    pub color: String,
    pub initial_questions: String,
    pub is_custom: bool,
    pub user_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub counselor_id: Option<String>,
    pub title: String,
    pub status: String,
    pub initial_responses: String,
    pub metadata: String,
    pub summary: Option<String>,
    pub thumbnail: Option<String>,
    pub created_at: String,
    pub last_activity_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub sender_id: String,
    pub content: String,
    pub message_type: String,
    pub is_bookmarked: bool,
    pub metadata: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: String,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub updated_at: String,
}

/// A stored row that does not satisfy the API schema
#[derive(Debug, Error)]
pub enum RowError {
    #[error("column {column}: invalid uuid '{value}'")]
    Uuid { column: &'static str, value: String },

    #[error("column {column}: invalid timestamp '{value}'")]
    Timestamp { column: &'static str, value: String },

    #[error("column {column}: {reason}")]
    Value { column: &'static str, reason: String },

    #[error("column {column}: invalid json: {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

fn parse_uuid(column: &'static str, value: &str) -> Result<Uuid, RowError> {
    Uuid::parse_str(value).map_err(|_| RowError::Uuid {
        column,
        value: value.to_string(),
    })
}

fn parse_optional_uuid(column: &'static str, value: Option<&str>) -> Result<Option<Uuid>, RowError> {
    value.map(|v| parse_uuid(column, v)).transpose()
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, RowError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|_| RowError::Timestamp {
            column,
            value: value.to_string(),
        })
}

fn parse_json<T: DeserializeOwned>(column: &'static str, value: &str) -> Result<T, RowError> {
    serde_json::from_str(value).map_err(|source| RowError::Json { column, source })
}

impl TryFrom<CategoryRow> for Category {
    type Error = RowError;

    fn try_from(row: CategoryRow) -> Result<Self, Self::Error> {
        Ok(Category {
            id: parse_uuid("id", &row.id)?,
            initial_questions: parse_json("initial_questions", &row.initial_questions)?,
            user_id: parse_optional_uuid("user_id", row.user_id.as_deref())?,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            name: row.name,
            description: row.description,
            icon: row.icon,
            color: row.color,
            is_custom: row.is_custom,
        })
    }
}

impl TryFrom<SessionRow> for Session {
    type Error = RowError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: parse_uuid("id", &row.id)?,
            user_id: parse_uuid("user_id", &row.user_id)?,
            category_id: parse_uuid("category_id", &row.category_id)?,
            counselor_id: parse_optional_uuid("counselor_id", row.counselor_id.as_deref())?,
            status: row.status.parse().map_err(|reason| RowError::Value {
                column: "status",
                reason,
            })?,
            initial_responses: parse_json("initial_responses", &row.initial_responses)?,
            metadata: parse_json("metadata", &row.metadata)?,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            last_activity_at: parse_timestamp("last_activity_at", &row.last_activity_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
            title: row.title,
            summary: row.summary,
            thumbnail: row.thumbnail,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = RowError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: parse_uuid("id", &row.id)?,
            session_id: parse_uuid("session_id", &row.session_id)?,
            sender_id: parse_uuid("sender_id", &row.sender_id)?,
            message_type: row.message_type.parse().map_err(|reason| RowError::Value {
                column: "message_type",
                reason,
            })?,
            metadata: row
                .metadata
                .as_deref()
                .map(|raw| parse_json("metadata", raw))
                .transpose()?,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            content: row.content,
            is_bookmarked: row.is_bookmarked,
        })
    }
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RowError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Profile {
            id: parse_uuid("id", &row.id)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
            nickname: row.nickname,
            avatar_url: row.avatar_url,
        })
    }
}
