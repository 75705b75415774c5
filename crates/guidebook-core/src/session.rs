//! Admin session
//!
//! A session exists only after a successful login and carries the bearer
//! secret for privileged calls. It ends on `logout()` or as soon as the
//! backend rejects the secret; the server still checks every call.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    LoggedOut,
    /// The backend answered 401 to a privileged call
    Rejected,
}

struct SessionInner {
    secret: String,
    created_at: DateTime<Utc>,
    state: RwLock<SessionState>,
}

/// Authenticated admin session; clones share one lifecycle
#[derive(Clone)]
pub struct AdminSession {
    inner: Arc<SessionInner>,
}

impl AdminSession {
    /// Only the API client creates sessions, after the backend accepted `secret`
    pub(crate) fn new(secret: String) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                secret,
                created_at: Utc::now(),
                state: RwLock::new(SessionState::Active),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    /// End the session; calling it again is a no-op
    pub fn logout(&self) {
        let mut state = self.inner.state.write();
        if *state == SessionState::Active {
            *state = SessionState::LoggedOut;
            info!("Admin session logged out");
        }
    }

    pub(crate) fn reject(&self) {
        let mut state = self.inner.state.write();
        if *state == SessionState::Active {
            *state = SessionState::Rejected;
            info!("Admin session rejected by backend");
        }
    }

    /// Bearer secret, only while the session is active
    pub(crate) fn bearer(&self) -> Option<&str> {
        self.is_active().then_some(self.inner.secret.as_str())
    }
}

impl fmt::Debug for AdminSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSession")
            .field("secret", &"<redacted>")
            .field("created_at", &self.inner.created_at)
            .field("state", &self.state())
            .finish()
    }
}
