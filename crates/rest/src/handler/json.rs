// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! JSON content adapter
//!
//! Requests must carry exactly `Content-Type: application/json`; a charset
//! parameter is rejected. Responses are written without a charset.

use std::future::Future;

use axum::{
    body::Bytes,
    extract::{FromRequest, Request, rejection::BytesRejection},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use utoipa::{
    ToSchema,
    openapi::{Components, request_body::RequestBody, response::Responses},
};

use super::{
    Consume, Handler, Produce, ReadRequest, WriteResponse, content_type_is, ok_response,
    request_body, schema_of,
};
use crate::{
    context::Context,
    error::{BadRequest, Error, Result},
};

/// JSON media type
pub const APPLICATION_JSON: &str = "application/json";

const MAX_JSON_PAYLOAD_SIZE: usize = 1024 * 1024; // 1MB limit

/// Why a JSON body was rejected
#[derive(Error, Debug)]
pub enum JsonBodyError {
    /// The body could not be read from the connection
    #[error("failed to read request body: {0}")]
    Read(#[from] BytesRejection),

    /// The body exceeds the payload limit
    #[error("request body too large: {size} bytes (max: {max} bytes)")]
    TooLarge {
        /// Received size
        size: usize,
        /// Allowed size
        max: usize,
    },

    /// Nothing was sent
    #[error("request body is empty, expected valid JSON")]
    Empty,

    /// The body is not valid JSON
    #[error("invalid JSON syntax at line {line}, column {column}: {hint}")]
    Syntax {
        /// Line of the error
        line: usize,
        /// Column of the error
        column: usize,
        /// What to look for
        hint: &'static str,
    },

    /// Valid JSON that does not fit the expected type
    #[error("JSON data validation failed: {0}")]
    Data(#[source] serde_json::Error),

    /// The body ends mid-value
    #[error("unexpected end of JSON input, request appears to be truncated")]
    Truncated,
}

impl From<serde_json::Error> for JsonBodyError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_eof() {
            Self::Truncated
        } else if err.is_syntax() {
            Self::Syntax {
                line: err.line(),
                column: err.column(),
                hint: syntax_hint(&err),
            }
        } else {
            Self::Data(err)
        }
    }
}

fn syntax_hint(err: &serde_json::Error) -> &'static str {
    let err_msg = err.to_string();

    if err_msg.contains("expected ','") || err_msg.contains("trailing comma") {
        "check for missing or extra commas between object properties or array elements"
    } else if err_msg.contains("expected '}'") {
        "check for missing closing brace '}' for JSON object"
    } else if err_msg.contains("expected ']'") {
        "check for missing closing bracket ']' for JSON array"
    } else if err_msg.contains("control character") {
        "JSON contains invalid control characters that must be escaped"
    } else if err_msg.contains("expected value") {
        "expected a valid JSON value (string, number, boolean, null, object, or array)"
    } else {
        "check JSON formatting and structure"
    }
}

impl From<JsonBodyError> for Error {
    fn from(err: JsonBodyError) -> Self {
        BadRequest::MalformedBody(Box::new(err)).into()
    }
}

/// JSON decoded request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonRequest<T>(pub T);

impl<T> JsonRequest<T>
where
    T: DeserializeOwned,
{
    async fn decode(req: Request) -> Result<T, JsonBodyError> {
        let bytes = Bytes::from_request(req, &()).await?;

        if bytes.len() > MAX_JSON_PAYLOAD_SIZE {
            return Err(JsonBodyError::TooLarge {
                size: bytes.len(),
                max: MAX_JSON_PAYLOAD_SIZE,
            });
        }
        if bytes.is_empty() {
            return Err(JsonBodyError::Empty);
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl<T> ReadRequest for JsonRequest<T>
where
    T: DeserializeOwned + ToSchema + Send + 'static,
{
    async fn read(req: Request) -> Result<Self> {
        content_type_is(&req, APPLICATION_JSON)?;
        Ok(Self(Self::decode(req).await?))
    }

    fn request_body(components: &mut Components) -> Option<RequestBody> {
        Some(request_body(APPLICATION_JSON, schema_of::<T>(components)))
    }
}

/// JSON encoded 200 response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse<T>(pub T);

impl<T> WriteResponse for JsonResponse<T>
where
    T: Serialize + ToSchema + Send + 'static,
{
    fn write(self) -> Result<Response> {
        let body = serde_json::to_vec(&self.0)
            .map_err(|e| anyhow::Error::new(e).context("failed to encode JSON response"))?;
        Ok((
            [(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON))],
            body,
        )
            .into_response())
    }

    fn responses(components: &mut Components) -> Responses {
        ok_response(APPLICATION_JSON, schema_of::<T>(components))
    }
}

/// See [`consume_json`]
#[derive(Debug, Clone)]
pub struct ConsumeJson<H>(H);

impl<H, Req, Resp> Handler<JsonRequest<Req>, Resp> for ConsumeJson<H>
where
    H: Handler<Req, Resp>,
{
    fn handle(
        &self,
        ctx: Context,
        req: JsonRequest<Req>,
    ) -> impl Future<Output = Result<Resp>> + Send {
        self.0.handle(ctx, req.0)
    }
}

/// See [`return_json`]
#[derive(Debug, Clone)]
pub struct ReturnJson<H>(H);

impl<H, Req, Resp> Handler<Req, JsonResponse<Resp>> for ReturnJson<H>
where
    H: Handler<Req, Resp>,
{
    fn handle(
        &self,
        ctx: Context,
        req: Req,
    ) -> impl Future<Output = Result<JsonResponse<Resp>>> + Send {
        let fut = self.0.handle(ctx, req);
        async move { fut.await.map(JsonResponse) }
    }
}

/// Read the request body as JSON before calling `handler`
pub fn consume_json<H, Req, Resp>(handler: H) -> ConsumeJson<H>
where
    H: Handler<Req, Resp>,
{
    ConsumeJson(handler)
}

/// Write the handler's response as JSON
pub fn return_json<H, Req, Resp>(handler: H) -> ReturnJson<H>
where
    H: Handler<Req, Resp>,
{
    ReturnJson(handler)
}

/// JSON in, JSON out
pub fn handle_json<H, Req, Resp>(handler: H) -> ConsumeJson<ReturnJson<H>>
where
    H: Handler<Req, Resp>,
{
    ConsumeJson(ReturnJson(handler))
}

/// No body in, JSON out
pub fn produce_json<F, Fut, Resp>(producer: F) -> ReturnJson<Produce<F>>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send,
{
    ReturnJson(super::produce(producer))
}

/// JSON in, empty 200 out
pub fn consume_only_json<F, Fut, Req>(consumer: F) -> ConsumeJson<Consume<F>>
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    ConsumeJson(super::consume(consumer))
}
