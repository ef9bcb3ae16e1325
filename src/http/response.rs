//! RPC error translation.
//!
//! # Responsibilities
//! - Map RPC status codes to HTTP status codes through a fixed table
//! - Render every failure as the JSON error envelope
//! - Log each translated failure
//!
//! # Design Decisions
//! - Successful responses never pass through here
//! - Untyped errors collapse to the sentinel envelope and HTTP 500
//! - `errDetail` is omitted when there is no status message

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tonic::{Code, Status};

use crate::config::schema::DEFAULT_ERRCODE;
use crate::error::BoxError;

/// Message used when an error carries no usable message.
pub const UNKNOWN_MESSAGE: &str = "Unknown";

/// The JSON error envelope returned by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub errcode: i64,
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(
        rename = "errDetail",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub err_detail: String,
}

/// Failure returned by a gateway handler.
#[derive(Debug)]
pub enum CallError {
    /// RPC-level error carrying a status code.
    Status(Status),
    /// Anything without a status code.
    Untyped(BoxError),
}

impl From<Status> for CallError {
    fn from(status: Status) -> Self {
        CallError::Status(status)
    }
}

impl From<BoxError> for CallError {
    fn from(err: BoxError) -> Self {
        CallError::Untyped(err)
    }
}

/// Map an RPC status code to its HTTP status.
pub fn http_status_from_code(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Renders handler failures as error envelopes.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTranslator {
    errcode: i64,
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_ERRCODE)
    }
}

impl ErrorTranslator {
    pub fn new(errcode: i64) -> Self {
        Self { errcode }
    }

    /// Envelope for a status, without the HTTP framing.
    pub fn envelope(&self, status: &Status) -> ErrorEnvelope {
        let mut envelope = ErrorEnvelope {
            errcode: self.errcode,
            message: UNKNOWN_MESSAGE.to_string(),
            data: serde_json::Value::Null,
            err_detail: String::new(),
        };
        if !status.message().is_empty() {
            envelope.message = status.message().to_string();
            envelope.err_detail = status.message().to_string();
        }
        envelope
    }

    /// Translate any handler failure into a response.
    pub fn translate(&self, err: &CallError) -> Response {
        match err {
            CallError::Status(status) => self.translate_status(status),
            CallError::Untyped(cause) => {
                tracing::error!(error = %cause, "Gateway handler failed without a status");
                let envelope = ErrorEnvelope {
                    errcode: self.errcode,
                    message: UNKNOWN_MESSAGE.to_string(),
                    data: serde_json::Value::Null,
                    err_detail: String::new(),
                };
                render(StatusCode::INTERNAL_SERVER_ERROR, &envelope)
            }
        }
    }

    pub fn translate_status(&self, status: &Status) -> Response {
        self.respond(http_status_from_code(status.code()), status)
    }

    /// Envelope for `status`, sent with an explicit HTTP status.
    pub fn respond(&self, http_status: StatusCode, status: &Status) -> Response {
        tracing::error!(
            code = ?status.code(),
            http_status = http_status.as_u16(),
            message = %status.message(),
            "Gateway request failed"
        );
        render(http_status, &self.envelope(status))
    }
}

fn render(status: StatusCode, envelope: &ErrorEnvelope) -> Response {
    match serde_json::to_vec(envelope) {
        Ok(body) => (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode error envelope");
            status.into_response()
        }
    }
}
