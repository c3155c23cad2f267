// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error handling module
//!
//! This module provides the closed taxonomy of errors an operation can produce,
//! the registration errors that abort startup, and the [`ErrorHandler`] seam
//! every operation funnels its failures through.

use axum::{
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};
use utoipa::openapi::{Components, Response as ResponseSpec};

use crate::{param::Location, problem::APPLICATION_PROBLEM_JSON};

/// Boxed error used for causes that come from outside the framework
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for handlers, interceptors and readers
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure an operation can report while serving a request
#[derive(Error, Debug)]
pub enum Error {
    /// The request was malformed; rendered as 400
    #[error("bad request: {0}")]
    BadRequest(#[from] BadRequest),

    /// The request carried credentials that were rejected; rendered as 401
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] Unauthorized),

    /// An error value whose author embedded a problem detail
    #[error(transparent)]
    Problem(EmbeddedProblem),

    /// An error that knows how to render its own response
    #[error("{0}")]
    Custom(Box<dyn RenderError>),

    /// A handler or interceptor panicked
    #[error("operation panicked: {0}")]
    Panic(String),

    /// Any other failure; rendered as 500
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Malformed request causes
#[derive(Error, Debug)]
pub enum BadRequest {
    /// The `Content-Type` header did not match the adapter's media type
    #[error("invalid content type {found:?}, expected {expected}")]
    InvalidContentType {
        /// Media type the adapter accepts
        expected: &'static str,
        /// Value of the header, if any
        found: Option<String>,
    },

    /// A required parameter was absent or empty
    #[error("missing required {location} parameter `{name}`")]
    MissingRequiredParameter {
        /// Parameter name
        name: String,
        /// Parameter location
        location: Location,
    },

    /// No value of a parameter matched its declared pattern
    #[error("invalid value for {location} parameter `{name}`")]
    InvalidParameterValue {
        /// Parameter name
        name: String,
        /// Parameter location
        location: Location,
    },

    /// The bearer token could not be extracted
    #[error(transparent)]
    InvalidJwt(InvalidJwt),

    /// The request body could not be decoded
    #[error("malformed request body: {0}")]
    MalformedBody(#[source] BoxError),
}

/// Credential rejection causes
#[derive(Error, Debug)]
pub enum Unauthorized {
    /// The bearer token was present but the verifier rejected it
    #[error(transparent)]
    InvalidJwt(InvalidJwt),

    /// The handler denied access for its own reasons
    #[error("access denied: {0}")]
    Denied(#[source] BoxError),
}

/// Why a bearer token was not accepted
#[derive(Error, Debug)]
pub enum InvalidJwt {
    /// No value for the authorization header
    #[error("authorization header is missing")]
    MissingHeader,

    /// The header value does not start with `Bearer `
    #[error("authorization header does not use the Bearer scheme")]
    MissingBearerPrefix,

    /// `Bearer ` was followed by nothing
    #[error("bearer token is empty")]
    EmptyToken,

    /// The verifier returned an error
    #[error("bearer token rejected: {cause}")]
    Rejected {
        /// Verifier failure
        cause: anyhow::Error,
    },
}

/// Error values able to write their own response
pub trait RenderError: std::error::Error + Send + Sync + 'static {
    /// Build the response sent to the client
    fn render(&self) -> Response;
}

/// A serialized error value carrying an embedded problem detail
#[derive(Debug)]
pub struct EmbeddedProblem {
    status: StatusCode,
    body: serde_json::Value,
    source: BoxError,
}

impl EmbeddedProblem {
    /// Status code carried by the embedded problem detail
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Full serialized error value, extension members included
    pub fn body(&self) -> &serde_json::Value {
        &self.body
    }

    pub(crate) fn into_response(self) -> Response {
        problem_json_response(self.status, &self.body)
    }
}

impl std::fmt::Display for EmbeddedProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.source.fmt(f)
    }
}

impl std::error::Error for EmbeddedProblem {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl Error {
    /// Wrap an error value that embeds a [`ProblemDetail`](crate::problem::ProblemDetail)
    ///
    /// The value is serialized in full so extension members reach the client.
    /// An invalid `status` is sent as 500, in the body as well as on the response.
    pub fn problem<P>(problem: P) -> Self
    where
        P: crate::problem::HasProblemDetail,
    {
        let declared = problem.problem_detail().status;

        match serde_json::to_value(&problem) {
            Ok(mut body) => {
                let status = match StatusCode::from_u16(declared) {
                    Ok(status) => status,
                    Err(_) => {
                        warn!(status = declared, "invalid problem status, sending 500");
                        let status = StatusCode::INTERNAL_SERVER_ERROR;
                        if let Some(members) = body.as_object_mut() {
                            members.insert("status".to_string(), status.as_u16().into());
                        }
                        status
                    }
                };
                Self::Problem(EmbeddedProblem {
                    status,
                    body,
                    source: Box::new(problem),
                })
            }
            Err(e) => Self::Internal(anyhow::Error::new(e).context(problem.to_string())),
        }
    }

    /// Wrap an error that renders its own response
    pub fn custom<E: RenderError>(error: E) -> Self {
        Self::Custom(Box::new(error))
    }

    /// Shorthand for a handler-side authorization failure
    pub fn denied<E: Into<BoxError>>(reason: E) -> Self {
        Self::Unauthorized(Unauthorized::Denied(reason.into()))
    }

    /// HTTP status this error maps to
    ///
    /// Custom errors are rendered to find out.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Problem(problem) => problem.status,
            Self::Custom(custom) => custom.render().status(),
            Self::Panic(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response the error renders by itself, if it can
    ///
    /// Framework errors render their status with an empty body, embedded problems
    /// render as `application/problem+json`. Panics and internal errors have no
    /// response of their own.
    pub fn self_response(self) -> Option<Response> {
        match self {
            Self::BadRequest(_) => Some(StatusCode::BAD_REQUEST.into_response()),
            Self::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED.into_response()),
            Self::Problem(problem) => Some(problem.into_response()),
            Self::Custom(custom) => Some(custom.render()),
            Self::Panic(_) | Self::Internal(_) => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        self.self_response()
            .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

/// Serialize a problem body with the `application/problem+json` media type
pub(crate) fn problem_json_response(status: StatusCode, body: &serde_json::Value) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = (status, bytes).into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(APPLICATION_PROBLEM_JSON),
            );
            response
        }
        Err(e) => {
            error!(error = %e, "failed to serialize problem detail");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Turns an operation failure into the response sent to the client
///
/// Every error an operation produces, including recovered panics, is passed to
/// exactly one error handler.
pub trait ErrorHandler: Send + Sync + 'static {
    /// Log and render the error
    fn handle_error(&self, error: Error) -> Response;

    /// Error responses this handler adds to every operation's `OpenAPI` entry
    fn error_responses(&self, _components: &mut Components) -> Vec<(StatusCode, ResponseSpec)> {
        Vec::new()
    }
}

impl<F> ErrorHandler for F
where
    F: Fn(Error) -> Response + Send + Sync + 'static,
{
    fn handle_error(&self, error: Error) -> Response {
        self(error)
    }
}

/// Handler used when an operation does not install its own
///
/// Logs at ERROR, then lets the error render itself or answers 500 with no body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle_error(&self, error: Error) -> Response {
        error!(error = %error, "operation failed");
        error.into_response()
    }
}

/// Errors raised while assembling operations; these abort startup
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// The same method and path were registered twice
    #[error("operation {method} {path} is already registered")]
    DuplicateOperation {
        /// HTTP method
        method: Method,
        /// Rendered path
        path: String,
    },

    /// A path names the same parameter more than once
    #[error("path {path} declares parameter `{name}` more than once")]
    DuplicatePathParameter {
        /// Rendered path
        path: String,
        /// Parameter name
        name: String,
    },

    /// A parameter was declared twice in the same location
    #[error("{location} parameter `{name}` is declared more than once")]
    DuplicateParameter {
        /// Parameter name
        name: String,
        /// Parameter location
        location: Location,
    },

    /// A path parameter was declared that the path does not contain
    #[error("path {path} has no parameter named `{name}`")]
    UnknownPathParameter {
        /// Rendered path
        path: String,
        /// Parameter name
        name: String,
    },

    /// A regular expression did not compile
    #[error("parameter `{name}` has an invalid pattern: {source}")]
    InvalidPattern {
        /// Parameter name
        name: String,
        /// Compilation failure
        source: regex::Error,
    },

    /// The security scheme cannot be enforced by the runtime
    #[error("security scheme `{name}` is not supported")]
    UnsupportedSecurityScheme {
        /// Scheme name
        name: String,
    },

    /// A scheme name was reused for a different definition
    #[error("security scheme `{name}` is already registered with a different definition")]
    ConflictingSecurityScheme {
        /// Scheme name
        name: String,
    },

    /// A security scheme was attached to a parameter location it cannot describe
    #[error("security scheme `{name}` cannot be declared on a {location} parameter")]
    MisplacedSecurityScheme {
        /// Scheme name
        name: String,
        /// Parameter location
        location: Location,
    },

    /// The method has no `OpenAPI` equivalent
    #[error("method {method} cannot be described in an OpenAPI document")]
    UnsupportedMethod {
        /// HTTP method
        method: Method,
    },

    /// The path is served by the framework itself
    #[error("path {path} is reserved")]
    ReservedPath {
        /// Rendered path
        path: String,
    },
}
