//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the HTTP boundary and the
//! service modules, along with the HTTP status mapping.
//!
//! Token-validation failures (`Unauthenticated`) and policy rejections (`Denied`)
//! deliberately map to the same outward status and constant body; the internal
//! code/message is for logs only and is never echoed to the client on those paths.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Validation { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Credentials { code: String, message: String },
    Unauthenticated { code: String, message: String },
    Denied { code: String, message: String },
    Upload { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Credentials { code, .. }
            | AppError::Unauthenticated { code, .. }
            | AppError::Denied { code, .. }
            | AppError::Upload { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Credentials { message, .. }
            | AppError::Unauthenticated { message, .. }
            | AppError::Denied { message, .. }
            | AppError::Upload { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn credentials<S: Into<String>>(code: S, msg: S) -> Self { AppError::Credentials { code: code.into(), message: msg.into() } }
    pub fn unauthenticated<S: Into<String>>(code: S, msg: S) -> Self { AppError::Unauthenticated { code: code.into(), message: msg.into() } }
    pub fn denied<S: Into<String>>(code: S, msg: S) -> Self { AppError::Denied { code: code.into(), message: msg.into() } }
    pub fn upload<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upload { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// True for the variants that collapse to one indistinct client rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AppError::Unauthenticated { .. } | AppError::Denied { .. })
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Credentials { .. } => 401,
            // Collapsed: token failures and policy denials are indistinguishable.
            AppError::Unauthenticated { .. } | AppError::Denied { .. } => 401,
            AppError::Upload { .. } => 502,
            AppError::Io { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}
