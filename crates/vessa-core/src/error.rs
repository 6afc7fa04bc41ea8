//! Unified error type for the Vessa console.
//!
//! Every crate maps its failures into [`AppError`] so that the gateway,
//! the sync layer and the front-ends share one vocabulary. Transport
//! failures carry the HTTP status when one was received.

use std::fmt;
use thiserror::Error;

/// Error category used across the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The gateway could not be reached (no response at all).
    Network,
    /// The gateway answered with a 4xx/5xx status not covered below.
    Http,
    /// The request exceeded its deadline.
    Timeout,
    /// The gateway rejected the bearer token (401). The session is over.
    Authentication,
    /// The caller is authenticated but not allowed to do this (403).
    Authorization,
    /// Local input was malformed and nothing was sent.
    Validation,
    /// The record does not exist locally or remotely.
    NotFound,
    /// The requested state transition is not allowed.
    Conflict,
    /// The gateway throttled the caller (429).
    RateLimit,
    /// A payload could not be encoded or decoded.
    Serialization,
    /// Configuration could not be loaded.
    Configuration,
    /// Some items of a batch operation failed.
    PartialFailure,
    /// The operation was cancelled before it completed.
    Cancelled,
    /// The gateway does not offer the requested endpoint.
    NotImplemented,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "NETWORK"),
            Self::Http => write!(f, "HTTP"),
            Self::Timeout => write!(f, "TIMEOUT"),
            Self::Authentication => write!(f, "AUTHENTICATION"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::PartialFailure => write!(f, "PARTIAL_FAILURE"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::NotImplemented => write!(f, "NOT_IMPLEMENTED"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The error returned by every fallible operation in the workspace.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// HTTP status code, when the gateway answered.
    pub status: Option<u16>,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            source: Some(Box::new(source)),
        }
    }

    /// Map an HTTP error status onto the matching kind.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            405 | 501 => ErrorKind::NotImplemented,
            408 | 504 => ErrorKind::Timeout,
            409 => ErrorKind::Conflict,
            422 => ErrorKind::Validation,
            429 => ErrorKind::RateLimit,
            _ => ErrorKind::Http,
        };
        Self {
            kind,
            message: message.into(),
            status: Some(status),
            source: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn partial_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PartialFailure, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// HTTP status code, if the gateway answered.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether retrying the same call later may succeed.
    ///
    /// Network failures, timeouts, throttling and 5xx answers are
    /// transient. Everything else needs a different request.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::RateLimit => true,
            ErrorKind::Http => self.status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            status: self.status,
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
