//! The session record and the rules deriving its status from wall-clock time.
//!
//! `status` is a cache of `expires_at > now`. It is recomputed whenever a
//! session is rebuilt from storage and double-checked on every `is_active`.

use crate::error::{Result, SessionError};
use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a window ending at `expires_at`, as seen at `now`.
/// A window ending exactly at `now` is already expired.
pub fn derive_status(expires_at: NaiveDateTime, now: NaiveDateTime) -> SessionStatus {
    if expires_at > now {
        SessionStatus::Active
    } else {
        SessionStatus::Expired
    }
}

/// Current local wall-clock time
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// End of a window of `duration` starting at `start`, or an error if the
/// result does not fit in a timestamp
pub fn expiry_after(start: NaiveDateTime, duration: Duration) -> Result<NaiveDateTime> {
    start.checked_add_signed(duration).ok_or_else(|| {
        SessionError::Configuration(format!(
            "session duration of {} hours is too large",
            duration.num_hours()
        ))
    })
}

/// A time-boxed usage window. Transitions produce new values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Session {
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub status: SessionStatus,
}

impl Session {
    /// A session that was just started against a verified Claude CLI.
    ///
    /// The status is asserted rather than derived, and the timestamps are not
    /// checked: an `expires_at` already in the past still yields `Active`.
    /// `is_active` catches that case because it re-checks the expiry.
    pub fn create_active(created_at: NaiveDateTime, expires_at: NaiveDateTime) -> Self {
        Self {
            created_at,
            expires_at,
            status: SessionStatus::Active,
        }
    }

    /// Rebuild a session from stored timestamps, deriving status from the local clock
    pub fn from_persisted(created_at: NaiveDateTime, expires_at: NaiveDateTime) -> Self {
        Self::from_persisted_at(created_at, expires_at, local_now())
    }

    /// Rebuild a session from stored timestamps, deriving status against `now`
    pub fn from_persisted_at(
        created_at: NaiveDateTime,
        expires_at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            created_at,
            expires_at,
            status: derive_status(expires_at, now),
        }
    }

    #[allow(dead_code)] // Wall-clock form; the manager passes its own clock
    pub fn is_active(&self) -> bool {
        self.is_active_at(local_now())
    }

    /// True only if the cached status says active and the expiry is still ahead of `now`
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        self.status == SessionStatus::Active && self.expires_at > now
    }

    #[allow(dead_code)] // Wall-clock form; the manager passes its own clock
    pub fn is_expired(&self) -> bool {
        !self.is_active()
    }

    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        !self.is_active_at(now)
    }

    /// Extend a live session to `now + duration`, keeping its creation time.
    /// Expired sessions cannot be refreshed, only re-activated.
    pub fn refresh_at(&self, now: NaiveDateTime, duration: Duration) -> Result<Self> {
        if self.is_expired_at(now) {
            return Err(SessionError::Expired(
                "session has expired and cannot be refreshed".to_string(),
            ));
        }
        Ok(Self::create_active(self.created_at, expiry_after(now, duration)?))
    }

    /// Time left before expiry, never negative
    pub fn remaining_at(&self, now: NaiveDateTime) -> Duration {
        (self.expires_at - now).max(Duration::zero())
    }

    /// Percentage of the window already consumed, 0..=100
    pub fn progress_at(&self, now: NaiveDateTime) -> u8 {
        let total = (self.expires_at - self.created_at).num_seconds();
        let remaining = self.remaining_at(now).num_seconds();
        if total <= 0 {
            return if remaining > 0 { 0 } else { 100 };
        }
        let consumed = 1.0 - (remaining as f64 / total as f64);
        (consumed * 100.0).round().clamp(0.0, 100.0) as u8
    }
}
