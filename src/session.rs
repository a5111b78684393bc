// ============================================================================
// SESSION - Auth client seam, local session issuer and the refresh poller
// ============================================================================

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How often the refresh poller reads the session lifetime.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no active session")]
    NoSession,
    #[error("display name must not be empty")]
    EmptyName,
    #[error("session refresh rejected: {0}")]
    RefreshRejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub is_guest: bool,
}

impl User {
    pub fn guest() -> Self {
        Self {
            id: format!("guest-{}", Uuid::new_v4()),
            display_name: "Guest".to_string(),
            is_guest: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Seconds until expiry at `now`; negative once expired, `None` when unknown.
    pub fn expires_in_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|at| (at - now).num_seconds())
    }
}

/// The two session operations the application depends on.
pub trait AuthClient {
    /// Seconds until the current token expires, `None` without a known expiry.
    fn expires_in_seconds(&self) -> Option<i64>;

    fn refresh_session(&mut self) -> Result<Session, AuthError>;
}

/// Issues and refreshes sessions in-process with a fixed token lifetime.
pub struct LocalAuthClient {
    lifetime: chrono::Duration,
    session: Option<Session>,
}

impl LocalAuthClient {
    pub fn new(lifetime_minutes: u32) -> Self {
        Self {
            lifetime: chrono::Duration::minutes(lifetime_minutes as i64),
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn issue(&mut self, user: User) -> Session {
        let session = Session {
            user,
            access_token: Uuid::new_v4().to_string(),
            expires_at: Some(Utc::now() + self.lifetime),
        };
        self.session = Some(session.clone());
        session
    }

    /// Start a session for a named account.
    pub fn sign_in(&mut self, display_name: &str) -> Result<Session, AuthError> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(AuthError::EmptyName);
        }
        let user = User {
            id: format!("user-{}", name.to_lowercase().replace(char::is_whitespace, "-")),
            display_name: name.to_string(),
            is_guest: false,
        };
        info!("Signed in as {}", user.display_name);
        Ok(self.issue(user))
    }

    /// Start a session for an existing (possibly restored) user.
    pub fn resume(&mut self, user: User) -> Session {
        debug!("Resuming session for {}", user.id);
        self.issue(user)
    }

    pub fn sign_out(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Signed out {}", session.user.display_name);
        }
    }
}

impl AuthClient for LocalAuthClient {
    fn expires_in_seconds(&self) -> Option<i64> {
        self.session.as_ref().and_then(|s| s.expires_in_at(Utc::now()))
    }

    fn refresh_session(&mut self) -> Result<Session, AuthError> {
        let user = self
            .session
            .as_ref()
            .map(|s| s.user.clone())
            .ok_or(AuthError::NoSession)?;
        Ok(self.issue(user))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    NotDue,
    Refreshed,
    Failed,
}

/// Whether a token with `remaining` seconds left should be refreshed.
///
/// An unknown expiry means there is no session to refresh.
pub fn should_refresh(remaining: Option<i64>, threshold_secs: i64) -> bool {
    matches!(remaining, Some(secs) if secs <= threshold_secs)
}

/// Fixed-interval refresh poller, ticked from the UI event loop.
///
/// Reacts at most one interval late to an approaching expiry.
#[derive(Debug)]
pub struct AutoRefresh {
    threshold_secs: i64,
    interval: Duration,
    next_poll: Instant,
    running: bool,
}

/// Begin polling; the first check happens one interval from now.
pub fn start_auto_refresh(before_expiry_minutes: u32) -> AutoRefresh {
    AutoRefresh::with_interval(before_expiry_minutes, POLL_INTERVAL, Instant::now())
}

impl AutoRefresh {
    pub fn with_interval(before_expiry_minutes: u32, interval: Duration, now: Instant) -> Self {
        debug!(
            "Session auto-refresh started ({} min before expiry, every {:?})",
            before_expiry_minutes, interval
        );
        Self {
            threshold_secs: before_expiry_minutes as i64 * 60,
            interval,
            next_poll: now + interval,
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn stop(&mut self) {
        if self.running {
            debug!("Session auto-refresh stopped");
        }
        self.running = false;
    }

    /// Run a poll if one is due at `now`. Refresh errors are logged, not returned.
    pub fn tick(&mut self, now: Instant, client: &mut dyn AuthClient) -> RefreshOutcome {
        if !self.running || now < self.next_poll {
            return RefreshOutcome::NotDue;
        }
        self.next_poll = now + self.interval;

        let remaining = client.expires_in_seconds();
        if !should_refresh(remaining, self.threshold_secs) {
            return RefreshOutcome::NotDue;
        }

        match client.refresh_session() {
            Ok(session) => {
                info!("Session refreshed, expires at {:?}", session.expires_at);
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                RefreshOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeClient {
        remaining: Option<i64>,
        fail: bool,
        refreshes: usize,
    }

    impl AuthClient for FakeClient {
        fn expires_in_seconds(&self) -> Option<i64> {
            self.remaining
        }

        fn refresh_session(&mut self) -> Result<Session, AuthError> {
            self.refreshes += 1;
            if self.fail {
                return Err(AuthError::RefreshRejected("offline".to_string()));
            }
            self.remaining = Some(3600);
            Ok(Session {
                user: User::guest(),
                access_token: "t".to_string(),
                expires_at: None,
            })
        }
    }

    fn client(remaining: Option<i64>, fail: bool) -> FakeClient {
        FakeClient { remaining, fail, refreshes: 0 }
    }

    #[test]
    fn test_should_refresh() {
        assert!(should_refresh(Some(300), 300));
        assert!(should_refresh(Some(-5), 300));
        assert!(!should_refresh(Some(301), 300));
        assert!(!should_refresh(None, 300));
    }

    #[test]
    fn test_tick_waits_for_interval() {
        let start = Instant::now();
        let mut poller = AutoRefresh::with_interval(5, Duration::from_secs(60), start);
        let mut fake = client(Some(10), false);

        assert_eq!(poller.tick(start, &mut fake), RefreshOutcome::NotDue);
        assert_eq!(poller.tick(start + Duration::from_secs(59), &mut fake), RefreshOutcome::NotDue);
        assert_eq!(poller.tick(start + Duration::from_secs(60), &mut fake), RefreshOutcome::Refreshed);
        assert_eq!(fake.refreshes, 1);
        // Token now has an hour left.
        assert_eq!(poller.tick(start + Duration::from_secs(120), &mut fake), RefreshOutcome::NotDue);
        assert_eq!(fake.refreshes, 1);
    }

    #[test]
    fn test_unknown_expiry_never_refreshes() {
        let start = Instant::now();
        let mut poller = AutoRefresh::with_interval(5, Duration::from_secs(1), start);
        let mut fake = client(None, false);
        for i in 1..5 {
            assert_eq!(poller.tick(start + Duration::from_secs(i), &mut fake), RefreshOutcome::NotDue);
        }
        assert_eq!(fake.refreshes, 0);
    }

    #[test]
    fn test_failures_keep_polling() {
        let start = Instant::now();
        let mut poller = AutoRefresh::with_interval(5, Duration::from_secs(1), start);
        let mut fake = client(Some(0), true);
        assert_eq!(poller.tick(start + Duration::from_secs(1), &mut fake), RefreshOutcome::Failed);
        assert_eq!(poller.tick(start + Duration::from_secs(2), &mut fake), RefreshOutcome::Failed);
        assert!(poller.is_running());
        assert_eq!(fake.refreshes, 2);
    }

    #[test]
    fn test_stop_cancels_polling() {
        let start = Instant::now();
        let mut poller = AutoRefresh::with_interval(5, Duration::from_secs(1), start);
        let mut fake = client(Some(0), false);
        poller.stop();
        assert_eq!(poller.tick(start + Duration::from_secs(10), &mut fake), RefreshOutcome::NotDue);
        assert_eq!(fake.refreshes, 0);
    }

    #[test]
    fn test_local_client_lifecycle() {
        let mut auth = LocalAuthClient::new(60);
        assert_eq!(auth.expires_in_seconds(), None);
        assert!(matches!(auth.refresh_session(), Err(AuthError::NoSession)));
        assert!(matches!(auth.sign_in("   "), Err(AuthError::EmptyName)));

        let first = auth.sign_in("Aki Tanaka").unwrap();
        assert_eq!(first.user.id, "user-aki-tanaka");
        let remaining = auth.expires_in_seconds().unwrap();
        assert!(remaining > 3500 && remaining <= 3600);

        let refreshed = auth.refresh_session().unwrap();
        assert_eq!(refreshed.user, first.user);
        assert_ne!(refreshed.access_token, first.access_token);

        auth.sign_out();
        assert!(auth.session().is_none());
    }
}
