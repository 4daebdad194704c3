// lib.rs - AnarQ voting client core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod backend;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod format;
pub mod home;
pub mod model;
pub mod region;
pub mod session;
pub mod vote_dialog;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{AppConfig, StartupConfig};
pub use event::Event;
pub use model::{Model, ViewModel};
pub use crux_core::{render::Render, App as CruxApp};

/// Number of cases the backend returns per page.
pub const PAGE_SIZE: usize = 25;
/// Value of the eligibility `result` field that grants case creation.
pub const SUCCESS_SENTINEL: &str = "SUCCESS";
pub const DEFAULT_HOME_REGION: &str = "norge";
pub const NOTICE_DURATION_MS: u64 = 5_000;
pub const MAX_NOTICES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    Configuration,
    Storage,
    Serialization,
    Deserialization,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Configuration => "CONFIG_ERROR",
            Self::Storage => "STORAGE_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            408 => Self::Timeout,
            409 => Self::Conflict,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Builds an error from a non-success HTTP response. The server's own
    /// `message` field is kept verbatim when the body carries one.
    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&[u8]>) -> Self {
        let message = body
            .and_then(|b| serde_json::from_slice::<ApiErrorResponse>(b).ok())
            .and_then(ApiErrorResponse::into_message)
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self::new(ErrorKind::from_status(status), message)
            .with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// `{"message": ..}`, or the same nested under `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<Box<ApiErrorResponse>>,
}

impl ApiErrorResponse {
    fn into_message(self) -> Option<String> {
        self.message
            .filter(|m| !m.is_empty())
            .or_else(|| self.error.and_then(|inner| inner.into_message()))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_is_kept_verbatim() {
        let err = AppError::from_http_status(400, Some(&br#"{"message":"Case is closed"}"#[..]));
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.message, "Case is closed");
        assert_eq!(err.context.get("http_status").map(String::as_str), Some("400"));
    }

    #[test]
    fn nested_server_message_is_found() {
        let err = AppError::from_http_status(500, Some(&br#"{"error":{"message":"x"}}"#[..]));
        assert_eq!(err.message, "x");
    }

    #[test]
    fn missing_message_falls_back_to_status() {
        let err = AppError::from_http_status(503, Some(&b"<html>down</html>"[..]));
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.message, "HTTP error: 503");

        let err = AppError::from_http_status(401, None);
        assert_eq!(err.code(), "AUTH_ERROR");
    }

    #[test]
    fn display_includes_code_and_internal() {
        let err = AppError::new(ErrorKind::Storage, "could not save").with_internal("kv offline");
        assert_eq!(err.to_string(), "[STORAGE_ERROR] could not save (internal: kv offline)");
    }
}
