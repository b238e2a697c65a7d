//! Handler errors and the middleware that renders them.
//!
//! Handlers never build error bodies. They return a [`HandlerError`], which travels
//! in the response extensions until [`render_errors`] maps it through the catalog.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request, State,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::api::rest::dto::ErrorBody;
use crate::domain::repo::RepoError;
use crate::errors::{ErrorCatalog, ErrorCode};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code:?}: {}", .detail.as_deref().unwrap_or("-"))]
pub struct HandlerError {
    pub code: ErrorCode,
    /// Internal cause; logged, never sent to the client.
    pub detail: Option<String>,
}

impl HandlerError {
    pub fn new(code: ErrorCode) -> Self {
        Self { code, detail: None }
    }

    pub fn with_detail(mut self, detail: impl std::fmt::Display) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn invalid(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidRequestBody).with_detail(detail)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        // Status is a placeholder until render_errors rewrites the response
        let mut res = StatusCode::INTERNAL_SERVER_ERROR.into_response();
        res.extensions_mut().insert(self);
        res
    }
}

impl From<RepoError> for HandlerError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::DuplicateMobile { .. } => {
                Self::new(ErrorCode::UserAlreadyExists).with_detail(e)
            }
            RepoError::Database(_) => Self::new(ErrorCode::UncaughtException).with_detail(e),
        }
    }
}

impl From<validator::ValidationErrors> for HandlerError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::invalid(e)
    }
}

macro_rules! rejection_is_invalid_body {
    ($($rejection:ty),+) => {
        $(
            impl From<$rejection> for HandlerError {
                fn from(r: $rejection) -> Self {
                    Self::invalid(r.body_text())
                }
            }
        )+
    };
}

rejection_is_invalid_body!(JsonRejection, PathRejection, QueryRejection);

/// Replace a response carrying a [`HandlerError`] with the catalog's envelope.
pub async fn render_errors(
    State(catalog): State<Arc<ErrorCatalog>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let Some(err) = res.extensions_mut().remove::<HandlerError>() else {
        return res;
    };

    let def = catalog.resolve(err.code);
    let detail = err.detail.as_deref().unwrap_or_default();
    if def.status.is_server_error() {
        error!(code = ?err.code, status = def.status.as_u16(), detail, "request failed");
    } else {
        warn!(code = ?err.code, status = def.status.as_u16(), detail, "request rejected");
    }

    let body = ErrorBody {
        success: false,
        code: def.code.to_owned(),
        message: def.message.to_owned(),
    };
    (def.status, Json(body)).into_response()
}
