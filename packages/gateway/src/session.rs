//! Client-side authentication state.
//!
//! A [`Session`] is created once and shared as `Arc<Session>` between the
//! gateway and anything else that needs the current user. Logging out
//! through any handle (explicitly, or by the gateway on a 401) is visible
//! to every holder, and subscribers are notified through a
//! [`tokio::sync::watch`] channel.

use std::sync::{PoisonError, RwLock};

use tokio::sync::watch;

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// User id.
    pub id: i64,
    /// Login name.
    pub username: String,
}

#[derive(Debug, Default)]
struct Credentials {
    token: Option<String>,
    user: Option<SessionUser>,
}

/// Shared authentication state.
#[derive(Debug)]
pub struct Session {
    credentials: RwLock<Credentials>,
    authenticated: watch::Sender<bool>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// An empty, logged-out session.
    #[must_use]
    pub fn new() -> Self {
        let (authenticated, _) = watch::channel(false);
        Self {
            credentials: RwLock::new(Credentials::default()),
            authenticated,
        }
    }

    /// A session already holding `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>, user: Option<SessionUser>) -> Self {
        let session = Self::new();
        session.log_in(token, user);
        session
    }

    /// Stores a new token (and optionally the user it belongs to).
    pub fn log_in(&self, token: impl Into<String>, user: Option<SessionUser>) {
        {
            let mut creds = self
                .credentials
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            creds.token = Some(token.into());
            creds.user = user;
        }
        self.authenticated.send_replace(true);
    }

    /// Clears the token and user. Idempotent.
    pub fn log_out(&self) {
        let had_token = {
            let mut creds = self
                .credentials
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let had_token = creds.token.is_some();
            *creds = Credentials::default();
            had_token
        };
        if had_token {
            log::info!("Session cleared");
        }
        self.authenticated.send_replace(false);
    }

    /// Current bearer token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .token
            .clone()
    }

    /// Current user, if known.
    #[must_use]
    pub fn user(&self) -> Option<SessionUser> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .user
            .clone()
    }

    /// Whether a token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        *self.authenticated.borrow()
    }

    /// Receiver that observes log-in / log-out transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }
}
