use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kernel::ErrorReply;
use thiserror::Error;

use crate::domain::StoredResource;

/// Failures of the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource '{0}' already exists")]
    Conflict(String),
    #[error("resource '{0}' not found")]
    NotFound(String),
    #[error("database is busy: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Internal(String),
}

/// Failures of the filesystem mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the resource service and mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("resource '{0}' already exists")]
    Conflict(String),
    #[error("resource '{0}' not found")]
    NotFound(String),
    #[error("{op} failed, retry later: {detail}")]
    Unavailable { op: &'static str, detail: String },
    /// The row was committed but the mirror file could not be rewritten.
    #[error("resource '{}' updated but its mirror is stale: {reason}", .resource.name)]
    Inconsistent {
        resource: Box<StoredResource>,
        reason: String,
    },
    #[error("{op} failed: {detail}")]
    Internal { op: &'static str, detail: String },
}

impl ResourceError {
    pub(crate) fn from_store(op: &'static str, e: StoreError) -> Self {
        match e {
            StoreError::Conflict(name) => Self::Conflict(name),
            StoreError::NotFound(name) => Self::NotFound(name),
            StoreError::Unavailable(detail) => Self::Unavailable { op, detail },
            StoreError::Internal(detail) => Self::Internal { op, detail },
        }
    }

    pub(crate) fn from_mirror(op: &'static str, e: MirrorError) -> Self {
        match e {
            MirrorError::InvalidName { name, reason } => Self::InvalidName { name, reason },
            MirrorError::Io(e) => Self::Unavailable {
                op,
                detail: e.to_string(),
            },
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidName { .. } => "invalid_name",
            Self::InvalidContent(_) => "invalid_content",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Unavailable { .. } => "unavailable",
            Self::Inconsistent { .. } => "inconsistent",
            Self::Internal { .. } => "internal",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidName { .. } | Self::InvalidContent(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Inconsistent { .. } => StatusCode::OK,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Malformed or incomplete request bodies are reported like any other bad content.
impl From<JsonRejection> for ResourceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidContent(rejection.body_text())
    }
}

impl IntoResponse for ResourceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = match self {
            Self::Inconsistent { resource, reason } => {
                return crate::reply::with_warning(*resource, reason).into_response();
            }
            Self::Internal { .. } => {
                tracing::error!("{self}");
                "internal server error".to_owned()
            }
            Self::Unavailable { .. } => {
                tracing::warn!("{self}");
                self.to_string()
            }
            _ => self.to_string(),
        };
        let reply = ErrorReply {
            error: kind.to_owned(),
            message,
        };
        (status, Json(reply)).into_response()
    }
}
