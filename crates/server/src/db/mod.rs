use anyhow::Result;
use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    QueryBuilder, Sqlite, SqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod models;
mod seed;

pub use models::*;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CATEGORY_COLUMNS: &str =
    "id, name, description, icon, color, initial_questions, is_custom, user_id, created_at";
const SESSION_COLUMNS: &str = "id, user_id, category_id, counselor_id, title, status, \
     initial_responses, metadata, summary, thumbnail, created_at, last_activity_at, updated_at";
const MESSAGE_COLUMNS: &str =
    "id, session_id, sender_id, content, message_type, is_bookmarked, metadata, created_at";

/// Filters for listing a user's sessions
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<String>,
    pub category_id: Option<String>,
}

/// Filters for listing a session's messages, newest first
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// (created_at, id) of the cursor message; only older messages match
    pub older_than: Option<(String, String)>,
    pub before_date: Option<String>,
}

/// Fields of a session that may change after creation
#[derive(Debug, Clone, Default)]
pub struct SessionChanges {
    pub title: Option<String>,
    pub status: Option<String>,
    pub summary: Option<String>,
    pub thumbnail: Option<String>,
    /// Top-level keys replace the stored ones
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        // Ensure the directory of a file database exists
        if let Some(parent) = sqlite_file_path(url).and_then(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Writers wait for the lock instead of failing with SQLITE_BUSY
        let options = SqliteConnectOptions::from_str(url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Single-connection in-memory database, migrated and seeded
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS counseling_categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT,
                icon TEXT NOT NULL DEFAULT 'MessageCircle',
                color TEXT NOT NULL DEFAULT '#3B82F6',
                initial_questions TEXT NOT NULL DEFAULT '[]',
                is_custom INTEGER NOT NULL DEFAULT 0,
                user_id TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS counseling_sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                category_id TEXT NOT NULL REFERENCES counseling_categories(id),
                counselor_id TEXT,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                initial_responses TEXT NOT NULL DEFAULT '{}',
                metadata TEXT NOT NULL DEFAULT '{}',
                summary TEXT,
                thumbnail TEXT,
                created_at TEXT NOT NULL,
                last_activity_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS counseling_messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES counseling_sessions(id),
                sender_id TEXT NOT NULL,
                content TEXT NOT NULL,
                message_type TEXT NOT NULL DEFAULT 'text',
                is_bookmarked INTEGER NOT NULL DEFAULT 0,
                metadata TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                nickname TEXT NOT NULL DEFAULT '',
                avatar_url TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_user_activity \
             ON counseling_sessions (user_id, last_activity_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session_created \
             ON counseling_messages (session_id, created_at DESC, id DESC)",
        )
        .execute(&self.pool)
        .await?;

        self.seed_default_categories().await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    async fn seed_default_categories(&self) -> Result<()> {
        let created_at = now();
        for category in seed::default_categories()? {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO counseling_categories
                    (id, name, description, icon, color, initial_questions, is_custom, user_id, created_at)
                VALUES (?, ?, ?, ?, ?, ?, 0, NULL, ?)
                "#,
            )
            .bind(category.id)
            .bind(category.name)
            .bind(category.description)
            .bind(category.icon)
            .bind(category.color)
            .bind(category.initial_questions)
            .bind(&created_at)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    // Category operations
    pub async fn list_default_categories(&self) -> Result<Vec<CategoryRow>> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {} FROM counseling_categories WHERE is_custom = 0 ORDER BY name",
            CATEGORY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_custom_categories(&self, user_id: &str) -> Result<Vec<CategoryRow>> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {} FROM counseling_categories WHERE is_custom = 1 AND user_id = ? ORDER BY name",
            CATEGORY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_category(&self, id: &str) -> Result<Option<CategoryRow>> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {} FROM counseling_categories WHERE id = ?",
            CATEGORY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create_category(&self, category: &CategoryRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO counseling_categories
                (id, name, description, icon, color, initial_questions, is_custom, user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.icon)
        .bind(&category.color)
        .bind(&category.initial_questions)
        .bind(category.is_custom)
        .bind(&category.user_id)
        .bind(&category.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // Session operations
    pub async fn create_session(&self, session: &SessionRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO counseling_sessions
                (id, user_id, category_id, counselor_id, title, status, initial_responses,
                 metadata, summary, thumbnail, created_at, last_activity_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.category_id)
        .bind(&session.counselor_id)
        .bind(&session.title)
        .bind(&session.status)
        .bind(&session.initial_responses)
        .bind(&session.metadata)
        .bind(&session.summary)
        .bind(&session.thumbnail)
        .bind(&session.created_at)
        .bind(&session.last_activity_at)
        .bind(&session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_session(&self, id: &str, user_id: &str) -> Result<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM counseling_sessions WHERE id = ? AND user_id = ?",
            SESSION_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// One page of a user's sessions, most recently active first
    pub async fn list_sessions(
        &self,
        user_id: &str,
        filter: &SessionFilter,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SessionRow>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM counseling_sessions", SESSION_COLUMNS));
        push_session_filter(&mut query, user_id, filter);
        query
            .push(" ORDER BY last_activity_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(offset));

        let rows = query
            .build_query_as::<SessionRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count_sessions(&self, user_id: &str, filter: &SessionFilter) -> Result<u64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM counseling_sessions");
        push_session_filter(&mut query, user_id, filter);

        let (count,): (i64,) = query.build_query_as().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    /// Every session of a user in creation order
    pub async fn get_sessions_for_user(&self, user_id: &str) -> Result<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM counseling_sessions WHERE user_id = ? ORDER BY created_at ASC, id ASC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Apply `changes` to a session the user owns; `None` if there is no such session
    pub async fn update_session(
        &self,
        id: &str,
        user_id: &str,
        changes: &SessionChanges,
    ) -> Result<Option<SessionRow>> {
        let mut tx = self.pool.begin().await?;
        let updated_at = now();

        // Write first so the transaction holds the write lock before the
        // metadata is read and merged
        let current: Option<(String,)> = sqlx::query_as(
            "UPDATE counseling_sessions SET updated_at = ? WHERE id = ? AND user_id = ? RETURNING metadata",
        )
        .bind(&updated_at)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((stored_metadata,)) = current else {
            return Ok(None);
        };

        let metadata = match &changes.metadata {
            Some(patch) => Some(merge_metadata(&stored_metadata, patch)?),
            None => None,
        };

        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            UPDATE counseling_sessions SET
                title = COALESCE(?, title),
                status = COALESCE(?, status),
                summary = COALESCE(?, summary),
                thumbnail = COALESCE(?, thumbnail),
                metadata = COALESCE(?, metadata)
            WHERE id = ? AND user_id = ?
            RETURNING {}
            "#,
            SESSION_COLUMNS
        ))
        .bind(&changes.title)
        .bind(&changes.status)
        .bind(&changes.summary)
        .bind(&changes.thumbnail)
        .bind(&metadata)
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    /// Soft delete. Returns false when the user has no such session.
    pub async fn archive_session(&self, id: &str, user_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE counseling_sessions SET
                updated_at = CASE WHEN status = 'archived' THEN updated_at ELSE ? END,
                status = 'archived'
            WHERE id = ? AND user_id = ?
            "#,
        )
        .bind(now())
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // Message operations

    /// Append a message and bump the session's message count and activity time
    pub async fn create_message(&self, message: &MessageRow) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO counseling_messages
                (id, session_id, sender_id, content, message_type, is_bookmarked, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.session_id)
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(&message.message_type)
        .bind(message.is_bookmarked)
        .bind(&message.metadata)
        .bind(&message.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE counseling_sessions SET
                metadata = json_set(
                    metadata,
                    '$.messageCount',
                    COALESCE(json_extract(metadata, '$.messageCount'), 0) + 1
                ),
                last_activity_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&message.created_at)
        .bind(&message.session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// (created_at, id) of a message inside the given session
    pub async fn get_message_position(
        &self,
        session_id: &str,
        message_id: &str,
    ) -> Result<Option<(String, String)>> {
        let position = sqlx::query_as::<_, (String, String)>(
            "SELECT created_at, id FROM counseling_messages WHERE id = ? AND session_id = ?",
        )
        .bind(message_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(position)
    }

    pub async fn list_messages(
        &self,
        session_id: &str,
        filter: &MessageFilter,
        limit: u32,
    ) -> Result<Vec<MessageRow>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM counseling_messages", MESSAGE_COLUMNS));
        push_message_filter(&mut query, session_id, filter);
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit));

        let rows = query
            .build_query_as::<MessageRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn count_messages(&self, session_id: &str, filter: &MessageFilter) -> Result<u64> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM counseling_messages");
        push_message_filter(&mut query, session_id, filter);

        let (count,): (i64,) = query.build_query_as().fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    /// Owner of the session a message belongs to
    pub async fn get_message_owner(&self, message_id: &str) -> Result<Option<String>> {
        let owner = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT s.user_id FROM counseling_messages m
            JOIN counseling_sessions s ON s.id = m.session_id
            WHERE m.id = ?
            "#,
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(owner.map(|(user_id,)| user_id))
    }

    pub async fn toggle_bookmark(&self, message_id: &str) -> Result<Option<MessageRow>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "UPDATE counseling_messages SET is_bookmarked = NOT is_bookmarked WHERE id = ? RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    // Profile operations
    pub async fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, nickname, avatar_url, updated_at FROM profiles WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Insert an empty profile unless one exists, then return the stored row
    pub async fn init_profile(&self, user_id: &str) -> Result<ProfileRow> {
        sqlx::query("INSERT OR IGNORE INTO profiles (id, nickname, updated_at) VALUES (?, '', ?)")
            .bind(user_id)
            .bind(now())
            .execute(&self.pool)
            .await?;

        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, nickname, avatar_url, updated_at FROM profiles WHERE id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_profile(
        &self,
        user_id: &str,
        nickname: &str,
        avatar_url: Option<&str>,
    ) -> Result<ProfileRow> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles (id, nickname, avatar_url, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                nickname = excluded.nickname,
                avatar_url = excluded.avatar_url,
                updated_at = excluded.updated_at
            RETURNING id, nickname, avatar_url, updated_at
            "#,
        )
        .bind(user_id)
        .bind(nickname)
        .bind(avatar_url)
        .bind(now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}

fn push_session_filter(query: &mut QueryBuilder<'_, Sqlite>, user_id: &str, filter: &SessionFilter) {
    query.push(" WHERE user_id = ").push_bind(user_id.to_string());
    if let Some(status) = &filter.status {
        query.push(" AND status = ").push_bind(status.clone());
    }
    if let Some(category_id) = &filter.category_id {
        query.push(" AND category_id = ").push_bind(category_id.clone());
    }
}

fn push_message_filter(query: &mut QueryBuilder<'_, Sqlite>, session_id: &str, filter: &MessageFilter) {
    query.push(" WHERE session_id = ").push_bind(session_id.to_string());
    if let Some((created_at, id)) = &filter.older_than {
        query
            .push(" AND (created_at < ")
            .push_bind(created_at.clone())
            .push(" OR (created_at = ")
            .push_bind(created_at.clone())
            .push(" AND id < ")
            .push_bind(id.clone())
            .push("))");
    }
    if let Some(before) = &filter.before_date {
        query.push(" AND created_at < ").push_bind(before.clone());
    }
}

/// Shallow merge of `patch` into the stored metadata object
fn merge_metadata(stored: &str, patch: &Map<String, Value>) -> Result<String> {
    let mut merged = match serde_json::from_str::<Value>(stored) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    Ok(serde_json::to_string(&Value::Object(merged))?)
}

/// Filesystem path of a `sqlite:` URL, if it names a file
fn sqlite_file_path(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_path_from_url() {
        assert_eq!(
            sqlite_file_path("sqlite:./data/bemore.db?mode=rwc"),
            Some(Path::new("./data/bemore.db"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/db"), None);
    }

    #[test]
    fn metadata_merge_is_shallow() {
        let mut patch = Map::new();
        patch.insert("tags".to_string(), json!(["night"]));
        patch.insert("extra".to_string(), json!({ "b": 2 }));

        let merged = merge_metadata(r#"{"messageCount":4,"extra":{"a":1}}"#, &patch).unwrap();
        let merged: Value = serde_json::from_str(&merged).unwrap();
        assert_eq!(
            merged,
            json!({ "messageCount": 4, "tags": ["night"], "extra": { "b": 2 } })
        );
    }

    #[tokio::test]
    async fn migrations_are_idempotent_and_seed_defaults() {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        let defaults = db.list_default_categories().await.unwrap();
        assert!(!defaults.is_empty());
        let mut names: Vec<_> = defaults.iter().map(|c| c.name.clone()).collect();
        let sorted = {
            let mut n = names.clone();
            n.sort();
            n
        };
        assert_eq!(names, sorted);
        names.dedup();
        assert_eq!(names.len(), defaults.len());
    }
}
