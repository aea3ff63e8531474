//! Notifications - Transient Toasts with Ring Buffer
//!
//! Every failure or confirmation becomes a toast. Toasts are visible for a
//! short TTL; the log keeps the most recent ones for later inspection.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::constants::{NOTIFICATION_LOG_CAPACITY, TOAST_TTL_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

impl ToastKind {
    pub fn label(&self) -> &'static str {
        match self {
            ToastKind::Success => "OK",
            ToastKind::Error => "ERROR",
        }
    }
}

/// A single toast
#[derive(Debug, Clone)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: Arc<str>,
    pub created_at: DateTime<Utc>,
}

impl Toast {
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < Duration::milliseconds(TOAST_TTL_MS)
    }
}

/// Toast log using a ring buffer
#[derive(Debug)]
pub struct Notifications {
    entries: VecDeque<Toast>,
    capacity: usize,
    next_id: u64,
    /// Highest id handed out by [`Notifications::take_unseen`]
    seen: u64,
}

impl Notifications {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
            seen: 0,
        }
    }

    pub fn push(&mut self, kind: ToastKind, message: impl Into<Arc<str>>, now: DateTime<Utc>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.capacity == 0 {
            return id;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Toast {
            id,
            kind,
            message: message.into(),
            created_at: now,
        });
        id
    }

    pub fn success(&mut self, message: impl Into<Arc<str>>, now: DateTime<Utc>) -> u64 {
        self.push(ToastKind::Success, message, now)
    }

    pub fn error(&mut self, message: impl Into<Arc<str>>, now: DateTime<Utc>) -> u64 {
        let message = message.into();
        tracing::warn!(%message, "error toast");
        self.push(ToastKind::Error, message, now)
    }

    /// Toasts still within their TTL
    pub fn visible(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Toast> {
        self.entries.iter().filter(move |t| t.is_visible(now))
    }

    /// Toasts pushed since the previous call
    pub fn take_unseen(&mut self) -> Vec<Toast> {
        let seen = self.seen;
        let unseen: Vec<Toast> = self.entries.iter().filter(|t| t.id > seen).cloned().collect();
        if let Some(last) = unseen.last() {
            self.seen = last.id;
        }
        unseen
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(NOTIFICATION_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_expires_after_ttl() {
        let now = Utc::now();
        let mut log = Notifications::default();
        log.error("Failed to fetch technicians", now);

        assert_eq!(log.visible(now + Duration::milliseconds(2_999)).count(), 1);
        assert_eq!(log.visible(now + Duration::milliseconds(3_000)).count(), 0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let now = Utc::now();
        let mut log = Notifications::new(2);
        log.success("one", now);
        log.success("two", now);
        log.success("three", now);

        let messages: Vec<_> = log.visible(now).map(|t| t.message.to_string()).collect();
        assert_eq!(messages, vec!["two", "three"]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_take_unseen() {
        let now = Utc::now();
        let mut log = Notifications::default();
        log.success("a", now);
        assert_eq!(log.take_unseen().len(), 1);
        assert!(log.take_unseen().is_empty());
        log.error("b", now);
        let unseen = log.take_unseen();
        assert_eq!(unseen.len(), 1);
        assert_eq!(unseen[0].kind, ToastKind::Error);
    }
}
