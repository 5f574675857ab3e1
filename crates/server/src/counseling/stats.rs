//! Aggregation behind `GET /counseling/sessions/stats`

use shared::{RecentActivity, Session, SessionStats, SessionStatus};
use uuid::Uuid;

const RECENT_ACTIVITY_LEN: usize = 5;

/// Counts, averages and recent activity over all of a user's sessions.
/// `most_active_category` is left empty; it needs a category lookup.
pub fn summarize(sessions: &[Session]) -> SessionStats {
    let total_sessions = sessions.len() as u64;
    let count_status =
        |status: SessionStatus| sessions.iter().filter(|s| s.status == status).count() as u64;

    let total_messages: u64 = sessions
        .iter()
        .map(|s| u64::from(s.metadata.message_count.unwrap_or(0)))
        .sum();

    let avg_messages_per_session = if total_sessions > 0 {
        total_messages as f64 / total_sessions as f64
    } else {
        0.0
    };

    let mut by_activity: Vec<&Session> = sessions.iter().collect();
    // Stable sort keeps input order for equal timestamps
    by_activity.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));

    let recent_activity = by_activity
        .into_iter()
        .take(RECENT_ACTIVITY_LEN)
        .map(|s| RecentActivity {
            session_id: s.id,
            session_title: s.title.clone(),
            last_activity_at: s.last_activity_at,
        })
        .collect();

    SessionStats {
        total_sessions,
        active_sessions: count_status(SessionStatus::Active),
        completed_sessions: count_status(SessionStatus::Completed),
        total_messages,
        avg_messages_per_session,
        most_active_category: None,
        recent_activity,
    }
}

/// Category with the most sessions. Ties go to the category seen first.
pub fn top_category(sessions: &[Session]) -> Option<(Uuid, u64)> {
    let mut counts: Vec<(Uuid, u64)> = Vec::new();
    for session in sessions {
        match counts.iter_mut().find(|(id, _)| *id == session.category_id) {
            Some((_, count)) => *count += 1,
            None => counts.push((session.category_id, 1)),
        }
    }

    let mut best: Option<(Uuid, u64)> = None;
    for (id, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((id, count));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use shared::SessionMetadata;

    fn session(category_id: Uuid, status: SessionStatus, messages: Option<u32>, minutes: i64) -> Session {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            category_id,
            counselor_id: None,
            title: format!("session at +{}m", minutes),
            status,
            initial_responses: Default::default(),
            metadata: SessionMetadata {
                message_count: messages,
                ..Default::default()
            },
            summary: None,
            thumbnail: None,
            created_at: base,
            last_activity_at: base + Duration::minutes(minutes),
            updated_at: base,
        }
    }

    #[test]
    fn empty_history() {
        let stats = summarize(&[]);
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.avg_messages_per_session, 0.0);
        assert!(stats.recent_activity.is_empty());
        assert_eq!(top_category(&[]), None);
    }

    #[test]
    fn counts_and_average() {
        let cat = Uuid::new_v4();
        let sessions = vec![
            session(cat, SessionStatus::Active, Some(4), 0),
            session(cat, SessionStatus::Completed, Some(2), 1),
            session(cat, SessionStatus::Archived, None, 2),
            session(cat, SessionStatus::Active, Some(0), 3),
        ];
        let stats = summarize(&sessions);
        assert_eq!(stats.total_sessions, 4);
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.completed_sessions, 1);
        assert_eq!(stats.total_messages, 6);
        assert_eq!(stats.avg_messages_per_session, 1.5);
    }

    #[test]
    fn recent_activity_is_newest_five() {
        let cat = Uuid::new_v4();
        let sessions: Vec<_> = [10, 70, 30, 50, 20, 60, 40]
            .into_iter()
            .map(|m| session(cat, SessionStatus::Active, None, m))
            .collect();

        let recent = summarize(&sessions).recent_activity;
        let titles: Vec<_> = recent.iter().map(|r| r.session_title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "session at +70m",
                "session at +60m",
                "session at +50m",
                "session at +40m",
                "session at +30m"
            ]
        );
    }

    #[test]
    fn top_category_prefers_first_seen_on_tie() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let sessions = vec![
            session(b, SessionStatus::Active, None, 0),
            session(a, SessionStatus::Active, None, 1),
            session(a, SessionStatus::Active, None, 2),
            session(b, SessionStatus::Active, None, 3),
            session(c, SessionStatus::Active, None, 4),
        ];
        assert_eq!(top_category(&sessions), Some((b, 2)));

        let sessions = vec![
            session(c, SessionStatus::Active, None, 0),
            session(a, SessionStatus::Active, None, 1),
            session(a, SessionStatus::Active, None, 2),
        ];
        assert_eq!(top_category(&sessions), Some((a, 2)));
    }
}
