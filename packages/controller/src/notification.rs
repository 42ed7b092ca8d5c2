//! Dismissible, auto-expiring user notifications.

use chrono::{DateTime, TimeDelta, Utc};
use strum_macros::{AsRefStr, Display};

/// Default lifetime of a notification.
pub const DEFAULT_TTL_SECS: i64 = 6;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum NotificationLevel {
    /// Informational.
    Info,
    /// Something degraded but the session continues normally.
    Warning,
    /// A user-initiated operation failed.
    Error,
}

/// One notice shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Unique within the session.
    pub id: u64,
    /// Severity.
    pub level: NotificationLevel,
    /// User-facing text.
    pub message: String,
    /// When it was raised.
    pub raised_at: DateTime<Utc>,
    /// How long it stays active unless dismissed.
    pub ttl: TimeDelta,
}

impl Notification {
    /// Whether the notification has outlived its ttl at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.raised_at + self.ttl
    }
}

/// Holds the active notifications.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    ttl: TimeDelta,
    next_id: u64,
    active: Vec<Notification>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(DEFAULT_TTL_SECS))
    }
}

impl NotificationCenter {
    /// Creates an empty center whose notifications live for `ttl`.
    #[must_use]
    pub const fn new(ttl: TimeDelta) -> Self {
        Self {
            ttl,
            next_id: 0,
            active: Vec::new(),
        }
    }

    /// Raises a notification at `now` and returns its id.
    pub fn raise(
        &mut self,
        level: NotificationLevel,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> u64 {
        self.next_id += 1;
        let notification = Notification {
            id: self.next_id,
            level,
            message: message.into(),
            raised_at: now,
            ttl: self.ttl,
        };

        match level {
            NotificationLevel::Info => log::info!("{}", notification.message),
            NotificationLevel::Warning | NotificationLevel::Error => {
                log::warn!("{}", notification.message);
            }
        }

        self.active.push(notification);
        self.next_id
    }

    /// Removes a notification. Returns whether it was active.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        self.active.len() != before
    }

    /// Drops every notification that has expired at `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.active.retain(|n| !n.is_expired(now));
    }

    /// Active notifications, oldest first.
    #[must_use]
    pub fn active(&self) -> &[Notification] {
        &self.active
    }
}
