//! HTTP client for the CitySecure REST API.

use std::sync::Arc;
use std::time::Duration;

use citysecure_config::ApiConfig;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{ApiError, ErrorEnvelope, Session};

/// Authenticated client bound to one backend and one [`Session`].
#[derive(Debug, Clone)]
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl Gateway {
    /// Creates a gateway for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the HTTP client cannot be built
    /// (e.g. the TLS backend fails to initialise).
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        session: Arc<Session>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    /// Creates a gateway from configuration. A configured token is loaded
    /// into `session`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn from_config(config: &ApiConfig, session: Arc<Session>) -> Result<Self, ApiError> {
        if let Some(token) = &config.token {
            session.log_in(token.clone(), None);
        }
        Self::new(config.base_url.clone(), config.timeout(), session)
    }

    /// The base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        log::debug!("{method} {url}");
        let builder = self.client.request(method, url);
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// `GET path` decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.execute(self.request(Method::GET, path)).await?;
        decode_body(&body)
    }

    /// `GET path?query` decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let body = self
            .execute(self.request(Method::GET, path).query(query))
            .await?;
        decode_body(&body)
    }

    /// `GET path` decoded as a list. See [`decode_list`] for the accepted
    /// shapes.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-success status, or a
    /// body without a list.
    pub async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        decode_list(self.get(path).await?)
    }

    /// `GET path?query` decoded as a list.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-success status, or a
    /// body without a list.
    pub async fn list_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        decode_list(self.get_with_query(path, query).await?)
    }

    /// `POST path` with a JSON body, decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn post<B, T>(&self, path: &str, payload: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self
            .execute(self.request(Method::POST, path).json(payload))
            .await?;
        decode_body(&body)
    }

    /// `PUT path` with a JSON body, decoded as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn put<B, T>(&self, path: &str, payload: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = self
            .execute(self.request(Method::PUT, path).json(payload))
            .await?;
        decode_body(&body)
    }

    /// `DELETE path`. The response body is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or non-success status.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    /// Sends the request and returns the body of a successful response.
    async fn execute(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            log::debug!("  -> {status} ({} bytes)", body.len());
            return Ok(body);
        }

        Err(self.failure(status, &body))
    }

    /// Maps a non-success response to an [`ApiError`], logging the session
    /// out on 401.
    fn failure(&self, status: StatusCode, body: &str) -> ApiError {
        let error = classify(status, body);
        match &error {
            ApiError::Unauthorized => {
                log::warn!("Backend answered 401; logging out");
                self.session.log_out();
            }
            ApiError::Conflict { .. } | ApiError::NotFound { .. } => {
                log::debug!("  -> {status}: {error}");
            }
            _ => log::warn!("  -> {status}: {error}"),
        }
        error
    }
}

/// Maps a non-success status and body onto the [`ApiError`] taxonomy.
#[must_use]
pub fn classify(status: StatusCode, body: &str) -> ApiError {
    if status == StatusCode::UNAUTHORIZED {
        return ApiError::Unauthorized;
    }

    let envelope = ErrorEnvelope::from_body(body);

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound { envelope },
        StatusCode::CONFLICT => ApiError::Conflict {
            code: envelope.code.clone(),
            envelope,
        },
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
            if !envelope.errors.is_empty() =>
        {
            ApiError::Validation {
                status: status.as_u16(),
                message: envelope.message.or(envelope.error),
                errors: envelope.errors,
            }
        }
        _ => ApiError::Http {
            status: status.as_u16(),
            envelope,
        },
    }
}

/// Decodes a success body, unwrapping the `{ "success": .., "data": .. }`
/// wrapper when present.
///
/// # Errors
///
/// Returns [`ApiError::Decode`] if the body is not JSON or does not match
/// `T`.
pub fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let value: serde_json::Value = if body.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(body).map_err(|e| ApiError::Decode {
            message: format!("response is not JSON: {e}"),
        })?
    };

    let value = match value {
        serde_json::Value::Object(mut obj) if obj.contains_key("data") => obj
            .remove("data")
            .unwrap_or(serde_json::Value::Null),
        other => other,
    };

    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        message: e.to_string(),
    })
}

/// Keys checked first when a listing arrives as an object.
const LIST_KEYS: [&str; 3] = ["items", "rows", "results"];

/// Decodes a listing (after the `data` wrapper is removed): a bare array,
/// `null`, or an object holding the rows under `items`, `rows`, `results`
/// or, failing those, the first array member (e.g. `{ "sectores": [..],
/// "pagination": {..} }`).
///
/// # Errors
///
/// Returns [`ApiError::Decode`] if no list can be found or a row does not
/// decode as `T`.
pub fn decode_list<T: DeserializeOwned>(body: serde_json::Value) -> Result<Vec<T>, ApiError> {
    let rows = match body {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Array(rows) => rows,
        serde_json::Value::Object(mut obj) => {
            let keyed = LIST_KEYS
                .iter()
                .find_map(|key| match obj.remove(*key) {
                    Some(serde_json::Value::Array(rows)) => Some(rows),
                    _ => None,
                });
            match keyed {
                Some(rows) => rows,
                None => obj
                    .into_values()
                    .find_map(|value| match value {
                        serde_json::Value::Array(rows) => Some(rows),
                        _ => None,
                    })
                    .ok_or_else(|| ApiError::Decode {
                        message: "response has no list".to_string(),
                    })?,
            }
        }
        other => {
            return Err(ApiError::Decode {
                message: format!("expected a list, got {other}"),
            });
        }
    };

    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| ApiError::Decode {
            message: e.to_string(),
        })
}
