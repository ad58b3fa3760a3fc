use crate::forms::ValidationErrors;
use crate::routes::Route;
use crate::session::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("unexpected response from server (HTTP {status})")]
    Malformed { status: u16 },
    #[error("session expired")]
    SessionExpired,
    #[error("not authenticated")]
    NotAuthenticated,
    /// The route guard turned the signed-in user away; no request was sent.
    #[error("{0} is only available to lot owners")]
    Forbidden(Route),
    #[error("invalid form: {0}")]
    Validation(ValidationErrors),
    #[error("session storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("failed to build http client: {0}")]
    Client(String),
    #[error("view state lock poisoned")]
    StateLock,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } | ClientError::Malformed { status } => Some(*status),
            ClientError::SessionExpired => Some(401),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
