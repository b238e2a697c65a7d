//! Error catalog: maps internal error codes to what clients see.

use axum::http::StatusCode;
use std::collections::HashMap;

/// Internal error kinds a handler can attach to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UncaughtException,
    InvalidRequestBody,
    UserAlreadyExists,
    UserNotFound,
    /// Reserved for an authentication middleware.
    UserNotPresent,
}

/// Public rendering of one error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrDef {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: &'static str,
}

/// Rendering used for codes the catalog doesn't know.
pub const FALLBACK: ErrDef = ErrDef {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    code: "0",
    message: "Something went wrong",
};

/// Immutable code → definition table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ErrorCatalog {
    defs: HashMap<ErrorCode, ErrDef>,
}

impl ErrorCatalog {
    /// The catalog the server runs with.
    pub fn standard() -> Self {
        Self::default()
            .with(
                ErrorCode::UncaughtException,
                StatusCode::INTERNAL_SERVER_ERROR,
                "1",
                "Oops! Something went wrong. Please try later",
            )
            .with(
                ErrorCode::InvalidRequestBody,
                StatusCode::UNPROCESSABLE_ENTITY,
                "2",
                "Request not valid",
            )
            .with(
                ErrorCode::UserAlreadyExists,
                StatusCode::UNPROCESSABLE_ENTITY,
                "3",
                "User already exists",
            )
            .with(
                ErrorCode::UserNotFound,
                StatusCode::NOT_FOUND,
                "4",
                "User not found",
            )
            .with(
                ErrorCode::UserNotPresent,
                StatusCode::UNAUTHORIZED,
                "201",
                "User not present",
            )
    }

    pub fn with(
        mut self,
        code: ErrorCode,
        status: StatusCode,
        public_code: &'static str,
        message: &'static str,
    ) -> Self {
        self.defs.insert(
            code,
            ErrDef {
                status,
                code: public_code,
                message,
            },
        );
        self
    }

    pub fn get(&self, code: ErrorCode) -> Option<&ErrDef> {
        self.defs.get(&code)
    }

    /// Definition for `code`, or [`FALLBACK`].
    pub fn resolve(&self, code: ErrorCode) -> ErrDef {
        self.get(code).copied().unwrap_or(FALLBACK)
    }
}
