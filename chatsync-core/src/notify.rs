//! Transient user-facing notices.
//!
//! Notices are dismissed after a fixed time to live. The session schedules
//! the expiry; this type only keeps the list.

use std::time::Duration;

use chrono::{DateTime, Utc};

pub type NoticeId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub level: NoticeLevel,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.text)
    }
}

#[derive(Debug)]
pub struct Notifications {
    active: Vec<Notice>,
    next_id: NoticeId,
    /// Highest id handed out by `unseen`
    seen: NoticeId,
    ttl: Duration,
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            active: Vec::new(),
            next_id: 1,
            seen: 0,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn push(&mut self, level: NoticeLevel, text: impl Into<String>) -> NoticeId {
        let id = self.next_id;
        self.next_id += 1;
        let notice = Notice {
            id,
            level,
            text: text.into(),
            created_at: Utc::now(),
        };
        match level {
            NoticeLevel::Info => tracing::info!(notice_id = id, "{}", notice.text),
            NoticeLevel::Error => tracing::warn!(notice_id = id, "{}", notice.text),
        }
        self.active.push(notice);
        id
    }

    /// Remove a notice. Returns false if it was already gone.
    pub fn dismiss(&mut self, id: NoticeId) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        before != self.active.len()
    }

    pub fn active(&self) -> &[Notice] {
        &self.active
    }

    /// Active notices raised since the last call.
    pub fn unseen(&mut self) -> Vec<Notice> {
        let seen = self.seen;
        let fresh: Vec<Notice> = self
            .active
            .iter()
            .filter(|n| n.id > seen)
            .cloned()
            .collect();
        self.seen = self.next_id - 1;
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_dismiss() {
        let mut notes = Notifications::new(Duration::from_secs(4));
        let a = notes.push(NoticeLevel::Info, "Uploaded a.pdf");
        let b = notes.push(NoticeLevel::Error, "Failed to send message");
        assert_eq!(notes.active().len(), 2);

        assert!(notes.dismiss(a));
        assert!(!notes.dismiss(a));
        assert_eq!(notes.active()[0].id, b);
        assert_eq!(notes.active()[0].level, NoticeLevel::Error);
    }

    #[test]
    fn test_unseen_reports_each_notice_once() {
        let mut notes = Notifications::new(Duration::from_secs(4));
        notes.push(NoticeLevel::Info, "one");
        assert_eq!(notes.unseen().len(), 1);
        assert!(notes.unseen().is_empty());

        notes.push(NoticeLevel::Error, "two");
        let fresh = notes.unseen();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].to_string(), "[error] two");
    }
}
