//! Backend error envelope parsing and user-facing notifications.
//!
//! The backend reports errors as
//!
//! ```json
//! {
//!   "message": "...",
//!   "error": "...",
//!   "code": "DUPLICATE_ENTRY",
//!   "errors": [{ "field": "sector_id", "message": "required" }],
//!   "data": { ... }
//! }
//! ```
//!
//! where every member is optional and field errors may name the field as
//! `field`, `path` or `param` and the text as `message` or `msg`.
//! Parsing never fails: a body that is not JSON becomes the `message`.

use serde::Serialize;

use crate::ApiError;

/// Fallback text when the backend gave nothing usable.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

const MAX_RAW_MESSAGE_LEN: usize = 300;

/// A single field-qualified validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name, when the backend identified one.
    pub field: Option<String>,
    /// Error text.
    pub message: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Parsed error body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorEnvelope {
    pub message: Option<String>,
    pub error: Option<String>,
    pub code: Option<String>,
    pub errors: Vec<FieldError>,
    pub data: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    /// Envelope holding only a message.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Parses a response body.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => Self::from_value(&value),
            Err(_) => {
                let text = body.trim();
                if text.is_empty() {
                    Self::default()
                } else {
                    Self::with_message(truncate(text, MAX_RAW_MESSAGE_LEN))
                }
            }
        }
    }

    /// Extracts the envelope from an already parsed JSON value.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        let Some(obj) = value.as_object() else {
            return value
                .as_str()
                .map_or_else(Self::default, Self::with_message);
        };

        let text = |key: &str| {
            obj.get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let errors = obj
            .get("errors")
            .and_then(serde_json::Value::as_array)
            .map(|items| items.iter().filter_map(parse_field_error).collect())
            .unwrap_or_default();

        Self {
            message: text("message"),
            error: text("error"),
            code: text("code"),
            errors,
            data: obj.get("data").filter(|v| !v.is_null()).cloned(),
        }
    }

    /// One-line description: `message`, then `error`, then the field errors.
    #[must_use]
    pub fn summary(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .or_else(|| (!self.errors.is_empty()).then(|| describe_fields(&self.errors)))
            .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
    }
}

fn parse_field_error(item: &serde_json::Value) -> Option<FieldError> {
    if let Some(text) = item.as_str() {
        return Some(FieldError {
            field: None,
            message: text.to_string(),
        });
    }

    let obj = item.as_object()?;
    let pick = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(serde_json::Value::as_str))
            .map(String::from)
    };

    let field = pick(&["field", "path", "param"]).filter(|f| !f.is_empty());
    let message = pick(&["message", "msg"]).unwrap_or_else(|| "invalid value".to_string());

    Some(FieldError { field, message })
}

/// Joins field errors for log lines and `Display` output.
#[must_use]
pub fn describe_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{cut}...")
}

/// A user-facing message derived from an [`ApiError`].
///
/// Front-ends show one notification each (staggered toasts, or rows in an
/// error panel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Field the message refers to, if any.
    pub field: Option<String>,
    /// Text to show.
    pub message: String,
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<&FieldError> for Notification {
    fn from(error: &FieldError) -> Self {
        Self {
            field: error.field.clone(),
            message: error.message.clone(),
        }
    }
}

fn general(message: impl Into<String>) -> Vec<Notification> {
    vec![Notification {
        field: None,
        message: message.into(),
    }]
}

fn from_fields(errors: &[FieldError]) -> Vec<Notification> {
    let mut out: Vec<Notification> = Vec::with_capacity(errors.len());
    for error in errors {
        let notification = Notification::from(error);
        if !out.contains(&notification) {
            out.push(notification);
        }
    }
    out
}

pub(crate) fn notifications_for(error: &ApiError) -> Vec<Notification> {
    match error {
        ApiError::Validation {
            errors, message, ..
        } => {
            if errors.is_empty() {
                general(message.as_deref().unwrap_or(GENERIC_ERROR_MESSAGE))
            } else {
                from_fields(errors)
            }
        }
        ApiError::Conflict { envelope, .. }
        | ApiError::NotFound { envelope }
        | ApiError::Http { envelope, .. } => {
            if envelope.errors.is_empty() {
                general(envelope.summary())
            } else {
                from_fields(&envelope.errors)
            }
        }
        ApiError::Unauthorized => general("Your session has expired. Please log in again."),
        ApiError::Network(_) => general("Could not reach the server. Check your connection."),
        ApiError::Decode { .. } => general(GENERIC_ERROR_MESSAGE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field_error_yields_single_notification() {
        let envelope = ErrorEnvelope::from_body(
            r#"{"errors":[{"field":"estado_novedad_id","message":"required"}]}"#,
        );
        let error = ApiError::Validation {
            status: 400,
            message: envelope.message.clone(),
            errors: envelope.errors,
        };

        let notifications = error.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].field.as_deref(), Some("estado_novedad_id"));
        assert_eq!(notifications[0].to_string(), "estado_novedad_id: required");
    }

    #[test]
    fn accepts_path_param_and_msg_spellings() {
        let envelope = ErrorEnvelope::from_body(
            r#"{"message":"Invalid data","errors":[
                {"path":"sector_id","msg":"must be an integer"},
                {"param":"prioridad","message":"invalid"},
                "descripcion too short"
            ]}"#,
        );
        assert_eq!(envelope.message.as_deref(), Some("Invalid data"));
        assert_eq!(
            envelope.errors,
            vec![
                FieldError::new("sector_id", "must be an integer"),
                FieldError::new("prioridad", "invalid"),
                FieldError {
                    field: None,
                    message: "descripcion too short".to_string()
                },
            ]
        );
    }

    #[test]
    fn duplicate_field_errors_are_collapsed() {
        let error = ApiError::Validation {
            status: 422,
            message: None,
            errors: vec![
                FieldError::new("sector_id", "required"),
                FieldError::new("sector_id", "required"),
                FieldError::new("turno", "required"),
            ],
        };
        assert_eq!(error.notifications().len(), 2);
    }

    #[test]
    fn summary_falls_back_in_order() {
        assert_eq!(
            ErrorEnvelope::from_body(r#"{"error":"Turno duplicado"}"#).summary(),
            "Turno duplicado"
        );
        assert_eq!(ErrorEnvelope::from_body("").summary(), GENERIC_ERROR_MESSAGE);
        assert_eq!(
            ErrorEnvelope::from_body("<html>Bad Gateway</html>").summary(),
            "<html>Bad Gateway</html>"
        );
    }

    #[test]
    fn keeps_code_and_data() {
        let envelope = ErrorEnvelope::from_body(
            r#"{"message":"exists","code":"DUPLICATE_ENTRY","data":{"id":5}}"#,
        );
        assert_eq!(envelope.code.as_deref(), Some("DUPLICATE_ENTRY"));
        assert_eq!(envelope.data, Some(serde_json::json!({ "id": 5 })));
    }

    #[test]
    fn unauthorized_has_general_notification() {
        let notifications = ApiError::Unauthorized.notifications();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].field.is_none());
    }
}
