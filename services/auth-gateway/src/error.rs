//! Callback errors
//!
//! Every failure of the callback is terminal for that exchange and reaches
//! the browser as a plain-text 500. Nothing is retried and no token is
//! installed.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("no '{param}' in request: {url}")]
    Missing { param: &'static str, url: String },

    #[error("multiple '{param}' in request: {url}")]
    Duplicate { param: &'static str, url: String },

    #[error("invalid '{param}' in request: {url}")]
    Invalid { param: &'static str, url: String },

    #[error(transparent)]
    Exchange(#[from] bungie_auth::Error),
}

impl CallbackError {
    /// Label for the `token_exchanges_total` outcome.
    pub fn kind(&self) -> &'static str {
        match self {
            CallbackError::Missing { .. }
            | CallbackError::Duplicate { .. }
            | CallbackError::Invalid { .. } => "malformed_callback",
            CallbackError::Exchange(e) => e.kind(),
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}
