use axum::{http::StatusCode, response::IntoResponse};
use log::warn;
use thiserror::Error;

pub type ApplicationResult<T> = Result<T, ApplicationError>;

#[derive(Debug, Error)]
pub struct ApplicationError {
    #[source]
    pub source: anyhow::Error,
    pub kind: ErrorKind,
}

impl std::fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, strum_macros::Display)]
pub enum ErrorKind {
    #[strum(to_string = "Handler failed!")]
    Handler,
    #[strum(to_string = "Handler panicked or was cancelled!")]
    Aborted,
}

impl ApplicationError {
    pub fn handler(source: anyhow::Error) -> Self {
        Self {
            source,
            kind: ErrorKind::Handler,
        }
    }
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> axum::response::Response {
        warn!("{}", self.kind);
        warn!("{:#}", self.source);

        (StatusCode::INTERNAL_SERVER_ERROR, self.kind.to_string()).into_response()
    }
}

impl From<tokio::task::JoinError> for ApplicationError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self {
            source: value.into(),
            kind: ErrorKind::Aborted,
        }
    }
}
