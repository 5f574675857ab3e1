use std::time::Duration;

use shared::{
    CreateCategoryRequest, CreateMessageRequest, CreateSessionRequest, ErrorCode,
    MessageListQuery, MessageType, SessionListQuery, SessionMetadata, SessionStatus,
    UpdateSessionRequest,
};
use uuid::Uuid;

use super::CounselingService;
use crate::db::{now, Database, MessageRow};
use crate::error::AppError;

/// Seeded "Career" category
const CAREER: &str = "5b0e7c1a-3f0e-4a52-9a51-0c6a1f7d0001";
/// Seeded "Goals" category
const GOALS: &str = "5b0e7c1a-3f0e-4a52-9a51-0c6a1f7d0003";

fn category_id(id: &str) -> Uuid {
    Uuid::parse_str(id).unwrap()
}

fn new_session(category: &str, title: &str) -> CreateSessionRequest {
    CreateSessionRequest {
        category_id: category_id(category),
        title: title.to_string(),
        initial_responses: Default::default(),
    }
}

fn text(content: &str) -> CreateMessageRequest {
    CreateMessageRequest {
        content: content.to_string(),
        message_type: MessageType::Text,
        metadata: None,
    }
}

fn code_of(err: AppError) -> ErrorCode {
    err.code()
}

// Keeps stored timestamps strictly increasing between writes
async fn tick() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}

#[tokio::test]
async fn test_new_session_is_active_with_zero_messages() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let user = Uuid::new_v4();

    let session = service
        .create_session(user, new_session(CAREER, "Burnout"))
        .await
        .unwrap();

    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.metadata.message_count, Some(0));
    assert_eq!(session.user_id, user);
    assert_eq!(session.created_at, session.last_activity_at);
    assert!(session.initial_responses.is_empty());
}

#[tokio::test]
async fn test_session_requires_visible_category() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let err = service
        .create_session(alice, CreateSessionRequest {
            category_id: Uuid::new_v4(),
            title: "Nowhere".to_string(),
            initial_responses: Default::default(),
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::CategoryNotFound);

    let custom = service
        .create_category(bob, CreateCategoryRequest {
            name: "Bob's corner".to_string(),
            description: None,
            icon: None,
            color: None,
            initial_questions: Vec::new(),
        })
        .await
        .unwrap();

    let err = service
        .create_session(alice, CreateSessionRequest {
            category_id: custom.id,
            title: "Borrowed".to_string(),
            initial_responses: Default::default(),
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::CategoryNotFound);
}

#[tokio::test]
async fn test_categories_split_default_and_custom() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let created = service
        .create_category(alice, CreateCategoryRequest {
            name: "Night thoughts".to_string(),
            description: Some("Things that keep me up".to_string()),
            icon: None,
            color: None,
            initial_questions: Vec::new(),
        })
        .await
        .unwrap();
    assert!(created.is_custom);
    assert_eq!(created.icon, "MessageCircle");
    assert_eq!(created.color, "#3B82F6");
    assert_eq!(created.user_id, Some(alice));

    let alice_view = service.list_categories(alice).await.unwrap();
    assert!(alice_view.default_categories.iter().all(|c| !c.is_custom));
    assert_eq!(alice_view.custom_categories.len(), 1);

    let bob_view = service.list_categories(bob).await.unwrap();
    assert!(bob_view.custom_categories.is_empty());
    assert_eq!(bob_view.default_categories, alice_view.default_categories);

    assert_eq!(service.get_category(alice, created.id).await.unwrap(), created);
    let err = service.get_category(bob, created.id).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::CategoryNotFound);
}

#[tokio::test]
async fn test_invalid_category_is_rejected() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);

    let err = service
        .create_category(Uuid::new_v4(), CreateCategoryRequest {
            name: "Colors".to_string(),
            description: None,
            icon: None,
            color: Some("red".to_string()),
            initial_questions: Vec::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::CategoryValidationError);
}

#[tokio::test]
async fn test_list_sessions_filters_and_paginates() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let user = Uuid::new_v4();

    let mut ids = Vec::new();
    for i in 0..5 {
        let category = if i % 2 == 0 { CAREER } else { GOALS };
        let session = service
            .create_session(user, new_session(category, &format!("s{}", i)))
            .await
            .unwrap();
        ids.push(session.id);
        tick().await;
    }
    // Someone else's session never shows up
    service
        .create_session(Uuid::new_v4(), new_session(CAREER, "other"))
        .await
        .unwrap();

    let page = service
        .list_sessions(user, SessionListQuery {
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.pagination.total, 5);
    assert!(page.pagination.has_more);
    // Most recently active first
    assert_eq!(page.data.iter().map(|s| s.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);

    let last = service
        .list_sessions(user, SessionListQuery {
            limit: Some(2),
            offset: Some(4),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(last.data.len(), 1);
    assert_eq!(last.data[0].id, ids[0]);
    assert!(!last.pagination.has_more);

    let careers = service
        .list_sessions(user, SessionListQuery {
            category_id: Some(category_id(CAREER)),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(careers.pagination.total, 3);
    assert_eq!(careers.pagination.limit, 20);

    let err = service
        .list_sessions(user, SessionListQuery {
            limit: Some(500),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn test_archive_is_idempotent_and_leaves_active_list() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let user = Uuid::new_v4();

    let session = service
        .create_session(user, new_session(CAREER, "Quit?"))
        .await
        .unwrap();

    assert!(service.delete_session(user, session.id).await.unwrap().success);
    let archived = service.get_session(user, session.id).await.unwrap();
    assert!(service.delete_session(user, session.id).await.unwrap().success);
    let again = service.get_session(user, session.id).await.unwrap();

    assert_eq!(again.status, SessionStatus::Archived);
    assert_eq!(again.updated_at, archived.updated_at);

    let active = service
        .list_sessions(user, SessionListQuery {
            status: Some(SessionStatus::Active),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(active.data.is_empty());
    assert_eq!(active.pagination.total, 0);

    let err = service.delete_session(Uuid::new_v4(), session.id).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::SessionNotFound);
}

#[tokio::test]
async fn test_update_merges_metadata() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let user = Uuid::new_v4();

    let session = service
        .create_session(user, new_session(GOALS, "Run a marathon"))
        .await
        .unwrap();
    service.create_message(user, session.id, text("week one")).await.unwrap();

    let mut metadata = SessionMetadata {
        tags: Some(vec!["running".to_string()]),
        ..Default::default()
    };
    metadata.extra.insert("mood".to_string(), serde_json::json!("hopeful"));

    let updated = service
        .update_session(user, session.id, UpdateSessionRequest {
            status: Some(SessionStatus::Paused),
            summary: Some("Training plan drafted".to_string()),
            metadata: Some(metadata),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(updated.title, "Run a marathon");
    assert_eq!(updated.status, SessionStatus::Paused);
    assert_eq!(updated.summary.as_deref(), Some("Training plan drafted"));
    assert_eq!(updated.metadata.message_count, Some(1));
    assert_eq!(updated.metadata.tags, Some(vec!["running".to_string()]));
    assert_eq!(updated.metadata.extra["mood"], "hopeful");
    assert!(updated.updated_at >= session.updated_at);

    let err = service
        .update_session(Uuid::new_v4(), session.id, UpdateSessionRequest::default())
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::SessionNotFound);

    let err = service
        .update_session(user, session.id, UpdateSessionRequest {
            thumbnail: Some("not-a-url".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::SessionValidationError);
}

#[tokio::test]
async fn test_message_bumps_session_activity() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let user = Uuid::new_v4();

    let session = service
        .create_session(user, new_session(CAREER, "Interview"))
        .await
        .unwrap();
    tick().await;

    let message = service
        .create_message(user, session.id, text("I have an interview tomorrow"))
        .await
        .unwrap();
    assert_eq!(message.sender_id, user);
    assert_eq!(message.message_type, MessageType::Text);
    assert!(!message.is_bookmarked);

    let reloaded = service.get_session(user, session.id).await.unwrap();
    assert_eq!(reloaded.metadata.message_count, Some(1));
    assert_eq!(reloaded.last_activity_at, message.created_at);
    assert!(reloaded.last_activity_at > session.last_activity_at);

    let err = service
        .create_message(Uuid::new_v4(), session.id, text("intruder"))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::SessionNotFound);

    let err = service
        .create_message(user, session.id, text(""))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::MessageValidationError);
}

#[tokio::test]
async fn test_message_cursor_pagination() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let user = Uuid::new_v4();

    let session = service
        .create_session(user, new_session(CAREER, "Long talk"))
        .await
        .unwrap();

    let mut sent = Vec::new();
    for i in 0..5 {
        let message = service
            .create_message(user, session.id, text(&format!("m{}", i)))
            .await
            .unwrap();
        sent.push(message.id);
        tick().await;
    }

    let first = service
        .list_messages(user, session.id, MessageListQuery {
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.data.iter().map(|m| m.id).collect::<Vec<_>>(), vec![sent[4], sent[3]]);
    assert_eq!(first.pagination.total, 5);
    assert_eq!(first.pagination.cursor, Some(sent[3]));
    assert!(first.pagination.has_more);

    let second = service
        .list_messages(user, session.id, MessageListQuery {
            limit: Some(2),
            cursor: first.pagination.cursor,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second.data.iter().map(|m| m.id).collect::<Vec<_>>(), vec![sent[2], sent[1]]);
    assert_eq!(second.pagination.total, 3);

    let third = service
        .list_messages(user, session.id, MessageListQuery {
            limit: Some(2),
            cursor: second.pagination.cursor,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(third.data.len(), 1);
    assert_eq!(third.pagination.cursor, Some(sent[0]));
    assert!(!third.pagination.has_more);

    // An unknown cursor is ignored
    let unknown = service
        .list_messages(user, session.id, MessageListQuery {
            cursor: Some(Uuid::new_v4()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(unknown.data.len(), 5);
    assert_eq!(unknown.pagination.limit, 50);
    assert!(!unknown.pagination.has_more);

    let err = service
        .list_messages(Uuid::new_v4(), session.id, MessageListQuery::default())
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::SessionNotFound);
}

#[tokio::test]
async fn test_message_before_date() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let user = Uuid::new_v4();

    let session = service
        .create_session(user, new_session(GOALS, "Habits"))
        .await
        .unwrap();
    let early = service.create_message(user, session.id, text("early")).await.unwrap();
    tick().await;
    let late = service.create_message(user, session.id, text("late")).await.unwrap();

    let page = service
        .list_messages(user, session.id, MessageListQuery {
            before_date: Some(late.created_at),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, early.id);
    assert_eq!(page.pagination.total, 1);
}

#[tokio::test]
async fn test_bookmark_toggle_and_ownership() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let (owner, stranger) = (Uuid::new_v4(), Uuid::new_v4());

    let session = service
        .create_session(owner, new_session(CAREER, "Keepers"))
        .await
        .unwrap();
    let message = service
        .create_message(owner, session.id, text("remember this"))
        .await
        .unwrap();

    let on = service.toggle_bookmark(owner, message.id).await.unwrap();
    assert!(on.is_bookmarked);
    let off = service.toggle_bookmark(owner, message.id).await.unwrap();
    assert!(!off.is_bookmarked);
    assert_eq!(off.content, message.content);

    let err = service.toggle_bookmark(stranger, message.id).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::MessageUnauthorized);

    let err = service.toggle_bookmark(owner, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::MessageNotFound);
}

#[tokio::test]
async fn test_stats_aggregate_user_sessions() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let user = Uuid::new_v4();

    let empty = service.session_stats(user).await.unwrap();
    assert_eq!(empty.total_sessions, 0);
    assert!(empty.most_active_category.is_none());

    let a = service.create_session(user, new_session(GOALS, "a")).await.unwrap();
    tick().await;
    let b = service.create_session(user, new_session(CAREER, "b")).await.unwrap();
    tick().await;
    let c = service.create_session(user, new_session(CAREER, "c")).await.unwrap();
    tick().await;

    for _ in 0..3 {
        service.create_message(user, a.id, text("hi")).await.unwrap();
    }
    service
        .update_session(user, b.id, UpdateSessionRequest {
            status: Some(SessionStatus::Completed),
            ..Default::default()
        })
        .await
        .unwrap();

    let stats = service.session_stats(user).await.unwrap();
    assert_eq!(stats.total_sessions, 3);
    assert_eq!(stats.active_sessions, 2);
    assert_eq!(stats.completed_sessions, 1);
    assert_eq!(stats.total_messages, 3);
    assert_eq!(stats.avg_messages_per_session, 1.0);

    let top = stats.most_active_category.unwrap();
    assert_eq!(top.id, category_id(CAREER));
    assert_eq!(top.name, "Career");
    assert_eq!(top.session_count, 2);

    // `a` got the latest message, so it leads the recent activity
    let recent: Vec<_> = stats.recent_activity.iter().map(|r| r.session_id).collect();
    assert_eq!(recent, vec![a.id, c.id, b.id]);
}

#[tokio::test]
async fn test_cursor_pages_through_shared_timestamps() {
    let db = Database::in_memory().await.unwrap();
    let service = CounselingService::new(&db);
    let user = Uuid::new_v4();

    let session = service
        .create_session(user, new_session(CAREER, "Burst"))
        .await
        .unwrap();

    // Five messages written within the same microsecond
    let created_at = now();
    let mut expected = Vec::new();
    for i in 0..5 {
        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.to_string(),
            sender_id: user.to_string(),
            content: format!("burst {}", i),
            message_type: MessageType::Text.to_string(),
            is_bookmarked: false,
            metadata: None,
            created_at: created_at.clone(),
        };
        db.create_message(&row).await.unwrap();
        expected.push(Uuid::parse_str(&row.id).unwrap());
    }
    // Ties are broken by id, descending
    expected.sort();
    expected.reverse();

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = service
            .list_messages(user, session.id, MessageListQuery {
                limit: Some(2),
                cursor,
                ..Default::default()
            })
            .await
            .unwrap();
        seen.extend(page.data.iter().map(|m| m.id));
        if !page.pagination.has_more {
            break;
        }
        cursor = page.pagination.cursor;
    }

    assert_eq!(seen, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_updates_survive_concurrent_appends() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("bemore.db").display());
    let db = Database::new(&url, 5).await.unwrap();
    db.run_migrations().await.unwrap();

    let (owner, neighbor) = (Uuid::new_v4(), Uuid::new_v4());
    let service = CounselingService::new(&db);
    let session = service
        .create_session(owner, new_session(CAREER, "Busy"))
        .await
        .unwrap();
    let other = service
        .create_session(neighbor, new_session(GOALS, "Next door"))
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let update_db = db.clone();
        tasks.push(tokio::spawn(async move {
            let metadata = SessionMetadata {
                tags: Some(vec![format!("tag-{}", i)]),
                ..Default::default()
            };
            CounselingService::new(&update_db)
                .update_session(owner, session.id, UpdateSessionRequest {
                    metadata: Some(metadata),
                    ..Default::default()
                })
                .await
                .map(|_| ())
        }));

        // Appends land in both the updated session and another user's session
        let (user, target) = if i % 2 == 0 {
            (owner, session.id)
        } else {
            (neighbor, other.id)
        };
        let append_db = db.clone();
        tasks.push(tokio::spawn(async move {
            CounselingService::new(&append_db)
                .create_message(user, target, text("concurrent"))
                .await
                .map(|_| ())
        }));
    }

    for task in tasks {
        let result = task.await.unwrap();
        assert!(result.is_ok(), "{:?}", result.err().map(code_of));
    }

    let reloaded = service.get_session(owner, session.id).await.unwrap();
    assert_eq!(reloaded.metadata.message_count, Some(10));
    assert_eq!(reloaded.metadata.tags.map(|t| t.len()), Some(1));
    let neighbor_session = service.get_session(neighbor, other.id).await.unwrap();
    assert_eq!(neighbor_session.metadata.message_count, Some(10));
}
