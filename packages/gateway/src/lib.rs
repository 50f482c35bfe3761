#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Authenticated REST gateway for the CitySecure backend.
//!
//! Every request goes through [`Gateway`], which:
//!
//! - attaches the bearer token held by the injected [`Session`];
//! - on HTTP 401 logs the session out (for every holder of the same
//!   `Arc<Session>`) and returns [`ApiError::Unauthorized`];
//! - maps any other non-success response onto the [`ApiError`] taxonomy
//!   using the backend's error envelope (see [`envelope`]).
//!
//! The gateway never retries. Callers that need idempotent behaviour (the
//! dispatch workflow's find-or-create steps) implement it themselves.

pub mod client;
pub mod envelope;
pub mod session;

use thiserror::Error;

pub use client::Gateway;
pub use envelope::{ErrorEnvelope, FieldError, Notification};
pub use session::{Session, SessionUser};

/// Errors from backend calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend rejected one or more fields.
    #[error("Validation failed: {}", envelope::describe_fields(errors))]
    Validation {
        /// HTTP status (400 or 422).
        status: u16,
        /// General message accompanying the field errors, if any.
        message: Option<String>,
        /// Field-qualified errors.
        errors: Vec<FieldError>,
    },

    /// HTTP 409: the record already exists.
    #[error("Conflict: {}", envelope.summary())]
    Conflict {
        /// Machine-readable duplicate code, when the backend sends one.
        code: Option<String>,
        /// Full error body.
        envelope: ErrorEnvelope,
    },

    /// HTTP 404.
    #[error("Not found: {}", envelope.summary())]
    NotFound {
        /// Full error body. Some endpoints put useful data here (e.g. the
        /// configured shift windows when no shift is active).
        envelope: ErrorEnvelope,
    },

    /// HTTP 401. The session has already been cleared.
    #[error("Session expired or invalid; logged out")]
    Unauthorized,

    /// Any other non-success status.
    #[error("HTTP {status}: {}", envelope.summary())]
    Http {
        /// Status code.
        status: u16,
        /// Parsed error body.
        envelope: ErrorEnvelope,
    },

    /// No response was received (connection refused, timeout, DNS...).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A success response could not be decoded into the expected type.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decoding failure.
        message: String,
    },
}

impl ApiError {
    /// Whether this is a 409 duplicate.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether this is a 404.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status code carried by the error, if the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. } | Self::Http { status, .. } => Some(*status),
            Self::Conflict { .. } => Some(409),
            Self::NotFound { .. } => Some(404),
            Self::Unauthorized => Some(401),
            Self::Network(_) | Self::Decode { .. } => None,
        }
    }

    /// User-facing notifications for this error: one per field error, or a
    /// single general notification.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        envelope::notifications_for(self)
    }
}
