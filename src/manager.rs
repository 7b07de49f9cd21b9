//! Session lifecycle: activation against the Claude CLI, status reads with
//! write-back, refresh and deletion.

use crate::clock::Clock;
use crate::client::ToolClient;
use crate::error::{Result, SessionError};
use crate::session::{expiry_after, Session};
use crate::storage::SessionStore;

/// Prompt sent to the Claude CLI to open a usage window
pub const HANDSHAKE_MESSAGE: &str = "Hello, Claude!";

pub struct SessionManager<S, C, K> {
    store: S,
    client: C,
    clock: K,
    duration: chrono::Duration,
}

impl<S, C, K> SessionManager<S, C, K>
where
    S: SessionStore,
    C: ToolClient,
    K: Clock,
{
    pub fn new(store: S, client: C, clock: K, duration: chrono::Duration) -> Self {
        Self {
            store,
            client,
            clock,
            duration,
        }
    }

    /// Probe the CLI, send the handshake, then persist a fresh active session.
    /// Nothing is written unless both calls succeed.
    pub fn activate_session(&self) -> Result<Session> {
        if !self.client.probe() {
            tracing::warn!("Claude CLI probe failed");
            return Err(SessionError::ToolUnavailable);
        }

        let reply = self.client.send(HANDSHAKE_MESSAGE).map_err(|e| {
            tracing::warn!(error = %e, "handshake failed");
            SessionError::Tool(format!("could not activate session: {}", e))
        })?;
        tracing::debug!(reply = reply.result().unwrap_or_default(), "handshake accepted");

        let created_at = self.clock.now();
        let expires_at = expiry_after(created_at, self.duration)?;
        let session = Session::create_active(created_at, expires_at);
        self.store.save(&session)?;

        tracing::info!(expires_at = %session.expires_at, "session activated");
        Ok(session)
    }

    /// The stored session with its status re-derived, or `None`
    pub fn get_current_session(&self) -> Result<Option<Session>> {
        let now = self.clock.now();
        Ok(self
            .store
            .load()?
            .map(|s| Session::from_persisted_at(s.created_at, s.expires_at, now)))
    }

    /// The current session, re-derived and written back so the stored status
    /// matches the clock
    pub fn get_session_info(&self) -> Result<Session> {
        let session = self
            .store
            .load()?
            .ok_or_else(|| SessionError::NotFound("No active session.".to_string()))?;

        let updated =
            Session::from_persisted_at(session.created_at, session.expires_at, self.clock.now());
        if updated.status != session.status {
            tracing::info!(from = %session.status, to = %updated.status, "session status corrected");
        }
        self.store.save(&updated)?;
        Ok(updated)
    }

    /// Read-only check; does not write back
    pub fn is_session_active(&self) -> Result<bool> {
        let now = self.clock.now();
        Ok(self
            .get_current_session()?
            .is_some_and(|s| s.is_active_at(now)))
    }

    /// Extend a live session by the configured duration from now
    pub fn refresh_session(&self) -> Result<Session> {
        let now = self.clock.now();
        let current = self
            .get_current_session()?
            .ok_or_else(|| SessionError::NotFound("No session to refresh.".to_string()))?;

        let refreshed = current.refresh_at(now, self.duration)?;
        self.store.save(&refreshed)?;

        tracing::info!(expires_at = %refreshed.expires_at, "session refreshed");
        Ok(refreshed)
    }

    /// Deleting when nothing is stored is not an error
    pub fn delete_session(&self) -> Result<()> {
        let existed = self.store.exists();
        self.store.delete()?;
        if existed {
            tracing::info!("session deleted");
        } else {
            tracing::debug!("no session to delete");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::parse_response;
    use crate::client::ToolResponse;
    use crate::config::OutputFormat;
    use crate::session::SessionStatus;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use std::cell::{Cell, RefCell};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    struct FixedClock(Cell<NaiveDateTime>);

    impl FixedClock {
        fn at(hour: u32) -> Self {
            Self(Cell::new(at(hour)))
        }
    }

    impl Clock for &FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0.get()
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        record: RefCell<Option<Session>>,
        saves: Cell<usize>,
        fail_load: bool,
    }

    impl MemoryStore {
        fn with(session: Session) -> Self {
            Self {
                record: RefCell::new(Some(session)),
                ..Self::default()
            }
        }
    }

    impl SessionStore for &MemoryStore {
        fn save(&self, session: &Session) -> Result<()> {
            self.saves.set(self.saves.get() + 1);
            *self.record.borrow_mut() = Some(session.clone());
            Ok(())
        }

        fn load(&self) -> Result<Option<Session>> {
            if self.fail_load {
                return Err(SessionError::Storage("disk on fire".to_string()));
            }
            Ok(self.record.borrow().clone())
        }

        fn exists(&self) -> bool {
            self.record.borrow().is_some()
        }

        fn delete(&self) -> Result<()> {
            *self.record.borrow_mut() = None;
            Ok(())
        }
    }

    struct MockClient {
        reachable: bool,
        reply: &'static str,
        sent: RefCell<Vec<String>>,
    }

    impl MockClient {
        fn ok() -> Self {
            Self {
                reachable: true,
                reply: r#"{"is_error": false, "result": "Hi"}"#,
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl ToolClient for &MockClient {
        fn probe(&self) -> bool {
            self.reachable
        }

        fn send(&self, message: &str) -> Result<ToolResponse> {
            self.sent.borrow_mut().push(message.to_string());
            parse_response(self.reply, OutputFormat::Json)
        }
    }

    fn manager<'a>(
        store: &'a MemoryStore,
        client: &'a MockClient,
        clock: &'a FixedClock,
    ) -> SessionManager<&'a MemoryStore, &'a MockClient, &'a FixedClock> {
        SessionManager::new(store, client, clock, Duration::hours(5))
    }

    #[test]
    fn test_activate_saves_once() {
        let (store, client, clock) = (MemoryStore::default(), MockClient::ok(), FixedClock::at(12));
        let session = manager(&store, &client, &clock).activate_session().unwrap();

        assert_eq!(session.created_at, at(12));
        assert_eq!(session.expires_at, at(17));
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(store.saves.get(), 1);
        assert_eq!(store.record.borrow().as_ref(), Some(&session));
        assert_eq!(*client.sent.borrow(), vec![HANDSHAKE_MESSAGE.to_string()]);
    }

    #[test]
    fn test_activate_probe_failure_writes_nothing() {
        let store = MemoryStore::default();
        let client = MockClient {
            reachable: false,
            ..MockClient::ok()
        };
        let clock = FixedClock::at(12);
        let err = manager(&store, &client, &clock)
            .activate_session()
            .unwrap_err();

        assert!(matches!(err, SessionError::ToolUnavailable));
        assert_eq!(store.saves.get(), 0);
        assert!(client.sent.borrow().is_empty());
    }

    #[test]
    fn test_activate_handshake_failure_writes_nothing() {
        let previous = Session::create_active(at(1), at(6));
        let store = MemoryStore::with(previous.clone());
        let client = MockClient {
            reply: r#"{"is_error": true, "result": "rate limited"}"#,
            ..MockClient::ok()
        };
        let clock = FixedClock::at(12);
        let err = manager(&store, &client, &clock)
            .activate_session()
            .unwrap_err();

        assert!(matches!(err, SessionError::Tool(_)));
        assert!(err.to_string().starts_with("could not activate session"));
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(store.saves.get(), 0);
        assert_eq!(store.record.borrow().as_ref(), Some(&previous));
    }

    #[test]
    fn test_activate_with_oversized_duration_writes_nothing() {
        let (store, client, clock) = (MemoryStore::default(), MockClient::ok(), FixedClock::at(12));
        let mgr = SessionManager::new(&store, &client, &clock, Duration::hours(10_000_000_000));
        let err = mgr.activate_session().unwrap_err();
        assert!(matches!(err, SessionError::Configuration(_)));
        assert_eq!(store.saves.get(), 0);
    }

    #[test]
    fn test_activate_overwrites_expired_session() {
        let store = MemoryStore::with(Session::from_persisted_at(at(1), at(6), at(12)));
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        manager(&store, &client, &clock).activate_session().unwrap();
        let stored = store.record.borrow().clone().unwrap();
        assert_eq!(stored.created_at, at(12));
        assert_eq!(stored.status, SessionStatus::Active);
    }

    #[test]
    fn test_is_session_active() {
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));

        let empty = MemoryStore::default();
        assert!(!manager(&empty, &client, &clock).is_session_active().unwrap());

        let live = MemoryStore::with(Session::create_active(at(11), at(16)));
        assert!(manager(&live, &client, &clock).is_session_active().unwrap());

        let expired = MemoryStore::with(Session::create_active(at(6), at(11)));
        assert!(!manager(&expired, &client, &clock).is_session_active().unwrap());

        // read-only
        assert_eq!(live.saves.get() + expired.saves.get(), 0);
    }

    #[test]
    fn test_session_info_writes_back_derived_status() {
        let store = MemoryStore::with(Session::create_active(at(11), at(16)));
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        let mgr = manager(&store, &client, &clock);

        let info = mgr.get_session_info().unwrap();
        assert_eq!(info.status, SessionStatus::Active);

        clock.0.set(at(17));
        let info = mgr.get_session_info().unwrap();
        assert_eq!(info.status, SessionStatus::Expired);
        assert_eq!(info.created_at, at(11));
        assert_eq!(info.expires_at, at(16));
        assert_eq!(
            store.record.borrow().as_ref().map(|s| s.status),
            Some(SessionStatus::Expired)
        );
        assert_eq!(store.saves.get(), 2);
    }

    #[test]
    fn test_session_info_is_idempotent() {
        let store = MemoryStore::with(Session::create_active(at(11), at(16)));
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        let mgr = manager(&store, &client, &clock);
        assert_eq!(mgr.get_session_info().unwrap(), mgr.get_session_info().unwrap());
    }

    #[test]
    fn test_session_info_not_found() {
        let store = MemoryStore::default();
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        let err = manager(&store, &client, &clock)
            .get_session_info()
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
        assert_eq!(store.saves.get(), 0);
    }

    #[test]
    fn test_storage_failure_propagates() {
        let store = MemoryStore {
            fail_load: true,
            ..MemoryStore::default()
        };
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        let mgr = manager(&store, &client, &clock);
        assert!(matches!(
            mgr.get_current_session().unwrap_err(),
            SessionError::Storage(_)
        ));
        assert!(matches!(
            mgr.is_session_active().unwrap_err(),
            SessionError::Storage(_)
        ));
    }

    #[test]
    fn test_current_session_rederives_stale_status() {
        let stale = Session {
            created_at: at(6),
            expires_at: at(11),
            status: SessionStatus::Active,
        };
        let store = MemoryStore::with(stale);
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        let current = manager(&store, &client, &clock)
            .get_current_session()
            .unwrap()
            .unwrap();
        assert_eq!(current.status, SessionStatus::Expired);
        assert_eq!(store.saves.get(), 0);
    }

    #[test]
    fn test_refresh_active_session() {
        let store = MemoryStore::with(Session::create_active(at(8), at(13)));
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        let refreshed = manager(&store, &client, &clock).refresh_session().unwrap();
        assert_eq!(refreshed.created_at, at(8));
        assert_eq!(refreshed.expires_at, at(17));
        assert_eq!(store.record.borrow().as_ref(), Some(&refreshed));
    }

    #[test]
    fn test_refresh_expired_leaves_record_unchanged() {
        let original = Session::create_active(at(6), at(11));
        let store = MemoryStore::with(original.clone());
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        let err = manager(&store, &client, &clock)
            .refresh_session()
            .unwrap_err();
        assert!(matches!(err, SessionError::Expired(_)));
        assert_eq!(store.saves.get(), 0);
        assert_eq!(store.record.borrow().as_ref(), Some(&original));
    }

    #[test]
    fn test_refresh_missing_session() {
        let store = MemoryStore::default();
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        let err = manager(&store, &client, &clock)
            .refresh_session()
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = MemoryStore::with(Session::create_active(at(11), at(16)));
        let (client, clock) = (MockClient::ok(), FixedClock::at(12));
        let mgr = manager(&store, &client, &clock);
        mgr.delete_session().unwrap();
        mgr.delete_session().unwrap();
        assert!(mgr.get_current_session().unwrap().is_none());
    }
}
