#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident registration, listings and catalog lookups.

pub mod backend;
pub mod filter;
pub mod registration;

use citysecure_gateway::{ApiError, FieldError, Notification, envelope};
use thiserror::Error;

pub use backend::IncidentBackend;
pub use filter::{IncidentFilter, IncidentPage};
pub use registration::{AddressChoice, Registration, RegistrationForm, register_incident};

/// Errors from registering or listing incidents.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The form failed client-side validation.
    #[error("Invalid incident: {}", envelope::describe_fields(.0))]
    Invalid(Vec<FieldError>),

    /// The listing filter is inconsistent.
    #[error("Invalid filter: {message}")]
    InvalidFilter {
        /// What is wrong with it.
        message: String,
    },

    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl RegistrationError {
    /// One notification per invalid field, or the backend error's
    /// notifications.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        match self {
            Self::Invalid(errors) => {
                let mut out: Vec<Notification> = Vec::with_capacity(errors.len());
                for notification in errors.iter().map(Notification::from) {
                    if !out.contains(&notification) {
                        out.push(notification);
                    }
                }
                out
            }
            Self::InvalidFilter { message } => vec![Notification {
                field: None,
                message: message.clone(),
            }],
            Self::Api(e) => e.notifications(),
        }
    }
}

/// Lists incidents after checking the filter.
///
/// # Errors
///
/// * [`RegistrationError::InvalidFilter`] for an inverted date range
/// * [`RegistrationError::Api`] if the request fails
pub async fn list_incidents(
    backend: &dyn IncidentBackend,
    filter: &IncidentFilter,
) -> Result<IncidentPage, RegistrationError> {
    filter.validate()?;
    let page = backend.list_incidents(filter).await?;
    log::debug!(
        "Listed {} incidents (page {}, total {:?})",
        page.items.len(),
        page.page,
        page.total
    );
    Ok(page)
}

#[cfg(test)]
mod tests {
    use citysecure_gateway::ErrorEnvelope;

    use super::*;

    #[test]
    fn duplicate_field_errors_collapse() {
        let err = RegistrationError::Invalid(vec![
            FieldError::new("sector_id", "Select a sector"),
            FieldError::new("sector_id", "Select a sector"),
        ]);
        assert_eq!(err.notifications().len(), 1);
        assert_eq!(err.notifications()[0].field.as_deref(), Some("sector_id"));
    }

    #[test]
    fn invalid_display_lists_fields() {
        let err = RegistrationError::Invalid(vec![
            FieldError::new("sector_id", "Select a sector"),
            FieldError::new("prioridad", "Select a priority"),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid incident: sector_id: Select a sector; prioridad: Select a priority"
        );
    }

    #[test]
    fn api_errors_use_gateway_notifications() {
        let err = RegistrationError::from(ApiError::Http {
            status: 500,
            envelope: ErrorEnvelope::with_message("Database unavailable"),
        });
        let notifications = err.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].message, "Database unavailable");
    }
}
