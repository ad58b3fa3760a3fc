//! Typed client for the AppsPark REST backend.
//!
//! Every request goes through [`ApiClient::execute`], which attaches the bearer
//! token held by the [`Session`], turns a `401` on an authenticated call into a
//! forced logout, and guards against bodies that are not the expected JSON.

use crate::config::Config;
use crate::error::ClientError;
use crate::session::Session;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod endpoints;
pub mod models;

/// Whether a request may carry the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Auth {
    Bearer,
    Anonymous,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        session: Arc<Session>,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Client(err.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn from_config(config: &Config, session: Arc<Session>) -> Result<Self, ClientError> {
        Self::new(config.base_url(), config.request_timeout(), session)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    /// Sends `builder` and decodes a JSON body of type `T`.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        auth: Auth,
    ) -> Result<T, ClientError> {
        let (status, body) = self.send(builder, auth).await?;
        decode(status, &body)
    }

    /// Sends `builder` and returns the raw status and body, after the shared
    /// 401 and error-status handling.
    pub(crate) async fn send(
        &self,
        builder: RequestBuilder,
        auth: Auth,
    ) -> Result<(StatusCode, String), ClientError> {
        let token = match auth {
            Auth::Bearer => self.session.token(),
            Auth::Anonymous => None,
        };
        let builder = match &token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        };

        let response = builder.send().await.map_err(|err| {
            warn!(error = %err, "Request failed before a response arrived");
            ClientError::Network(err)
        })?;
        let status = response.status();
        let url = response.url().path().to_string();
        let body = response.text().await?;
        debug!(status = status.as_u16(), path = %url, "Response received");

        if status == StatusCode::UNAUTHORIZED
            && let Some(token) = &token
            && self.session.expire(token)
        {
            return Err(ClientError::SessionExpired);
        }
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }
        Ok((status, body))
    }
}

/// Parses a successful body, reporting the status rather than a parser panic
/// or a bare serde message when the body is not what we expected.
pub(crate) fn decode<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<T, ClientError> {
    serde_json::from_str(body).map_err(|err| {
        warn!(status = status.as_u16(), error = %err, "Malformed response body");
        ClientError::Malformed {
            status: status.as_u16(),
        }
    })
}

/// Picks the backend's own explanation out of an error body when it has one.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let from_body = parsed.as_ref().and_then(|value| {
        ["detail", "error", "message"]
            .iter()
            .find_map(|key| match value.get(*key) {
                Some(serde_json::Value::String(text)) if !text.trim().is_empty() => {
                    Some(text.clone())
                }
                Some(other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
                    Some(other.to_string())
                }
                _ => None,
            })
    });
    from_body.unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Lot;

    #[test]
    fn error_message_prefers_detail_field() {
        let message = error_message(
            StatusCode::NOT_FOUND,
            r#"{"detail": "Estacionamiento no encontrado"}"#,
        );
        assert_eq!(message, "Estacionamiento no encontrado");
    }

    #[test]
    fn error_message_falls_back_to_error_field_then_status() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error": "No se pudo leer la imagen"}"#),
            "No se pudo leer la imagen"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            "HTTP 502"
        );
        assert_eq!(error_message(StatusCode::INTERNAL_SERVER_ERROR, ""), "HTTP 500");
    }

    #[test]
    fn error_message_keeps_structured_validation_detail() {
        let message = error_message(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "email"], "msg": "field required"}]}"#,
        );
        assert!(message.contains("field required"));
    }

    #[test]
    fn decode_reports_status_for_malformed_body() {
        let result: Result<Lot, ClientError> = decode(StatusCode::OK, "not json");
        assert!(matches!(result, Err(ClientError::Malformed { status: 200 })));

        let empty: Result<Vec<Lot>, ClientError> = decode(StatusCode::OK, "");
        assert!(matches!(empty, Err(ClientError::Malformed { status: 200 })));
    }
}
