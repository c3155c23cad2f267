// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Typed handler contract
//!
//! A [`Handler`] maps a typed request value to a typed response value. The
//! request type knows how to read itself from an HTTP request ([`ReadRequest`])
//! and the response type how to write itself ([`WriteResponse`]); both also
//! describe themselves for the `OpenAPI` document. Content adapters in the
//! submodules provide those types per media type, plus factories that wrap plain
//! handlers into them.

pub mod form;
pub mod html;
pub mod json;
pub mod multipart;
pub mod proto;

use std::{future::Future, marker::PhantomData};

use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use utoipa::{
    ToSchema,
    openapi::{
        Components, RefOr, Required,
        content::ContentBuilder,
        request_body::{RequestBody, RequestBodyBuilder},
        response::{ResponseBuilder, Responses, ResponsesBuilder},
        schema::Schema,
    },
};

use crate::{context::Context, error::Result, interceptor::Endpoint};

/// Business logic of one operation
///
/// Implemented for every `Fn(Context, Req) -> impl Future<Output = Result<Resp>>`,
/// so plain `async fn`s are handlers.
pub trait Handler<Req, Resp>: Send + Sync + 'static {
    /// Serve one request
    fn handle(&self, ctx: Context, req: Req) -> impl Future<Output = Result<Resp>> + Send;
}

impl<F, Fut, Req, Resp> Handler<Req, Resp> for F
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send,
{
    fn handle(&self, ctx: Context, req: Req) -> impl Future<Output = Result<Resp>> + Send {
        self(ctx, req)
    }
}

/// A request value read from the HTTP request
pub trait ReadRequest: Sized + Send + 'static {
    /// Decode the request; the body is consumed and dropped on every path
    fn read(req: Request) -> impl Future<Output = Result<Self>> + Send;

    /// Request body entry for the document, `None` when there is no body
    fn request_body(components: &mut Components) -> Option<RequestBody>;
}

/// A response value written to the client
pub trait WriteResponse: Send + 'static {
    /// Encode the value into a response
    fn write(self) -> Result<Response>;

    /// Responses entry for the document
    fn responses(components: &mut Components) -> Responses;
}

/// Request without a body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyRequest;

impl ReadRequest for EmptyRequest {
    async fn read(_req: Request) -> Result<Self> {
        Ok(Self)
    }

    fn request_body(_components: &mut Components) -> Option<RequestBody> {
        None
    }
}

/// 200 without a body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyResponse;

impl WriteResponse for EmptyResponse {
    fn write(self) -> Result<Response> {
        Ok(StatusCode::OK.into_response())
    }

    fn responses(_components: &mut Components) -> Responses {
        ResponsesBuilder::new()
            .response("200", ResponseBuilder::new().description("OK").build())
            .build()
    }
}

/// Handler taking only the context, see [`json::produce_json`]
#[derive(Debug, Clone)]
pub struct Produce<F>(F);

impl<F, Fut, Resp> Handler<EmptyRequest, Resp> for Produce<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send,
{
    fn handle(
        &self,
        ctx: Context,
        _req: EmptyRequest,
    ) -> impl Future<Output = Result<Resp>> + Send {
        (self.0)(ctx)
    }
}

/// Handler returning nothing, see [`json::consume_only_json`]
#[derive(Debug, Clone)]
pub struct Consume<F>(F);

impl<F, Fut, Req> Handler<Req, EmptyResponse> for Consume<F>
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
    Req: Send + 'static,
{
    fn handle(
        &self,
        ctx: Context,
        req: Req,
    ) -> impl Future<Output = Result<EmptyResponse>> + Send {
        let fut = (self.0)(ctx, req);
        async move { fut.await.map(|()| EmptyResponse) }
    }
}

/// Wrap a producer: no request body in
pub fn produce<F, Fut, Resp>(producer: F) -> Produce<F>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send,
{
    Produce(producer)
}

/// Wrap a consumer: empty 200 out
pub fn consume<F, Fut, Req>(consumer: F) -> Consume<F>
where
    F: Fn(Context, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    Consume(consumer)
}

/// Terminal endpoint: reads the request, runs the handler, writes the response
pub(crate) struct TypedEndpoint<H, Req, Resp> {
    handler: H,
    types: PhantomData<fn(Req) -> Resp>,
}

impl<H, Req, Resp> TypedEndpoint<H, Req, Resp> {
    pub(crate) fn new(handler: H) -> Self {
        Self {
            handler,
            types: PhantomData,
        }
    }
}

impl<H, Req, Resp> Endpoint for TypedEndpoint<H, Req, Resp>
where
    H: Handler<Req, Resp>,
    Req: ReadRequest,
    Resp: WriteResponse,
{
    fn call(&self, req: Request) -> BoxFuture<'_, Result<Response>> {
        Box::pin(async move {
            let ctx = Context::new(req.extensions().clone());
            let value = Req::read(req).await?;
            self.handler.handle(ctx, value).await?.write()
        })
    }
}

/// Inline schema of `T`, registering the named schemas it references
pub(crate) fn schema_of<T: ToSchema>(components: &mut Components) -> RefOr<Schema> {
    let mut nested = Vec::new();
    T::schemas(&mut nested);
    for (name, schema) in nested {
        components.schemas.entry(name).or_insert(schema);
    }
    T::schema()
}

/// Required request body with one media type
pub(crate) fn request_body(media_type: &str, schema: RefOr<Schema>) -> RequestBody {
    RequestBodyBuilder::new()
        .content(media_type, ContentBuilder::new().schema(Some(schema)).build())
        .required(Some(Required::True))
        .build()
}

/// `200` response with one media type
pub(crate) fn ok_response(media_type: &str, schema: RefOr<Schema>) -> Responses {
    ResponsesBuilder::new()
        .response(
            "200",
            ResponseBuilder::new()
                .description("OK")
                .content(media_type, ContentBuilder::new().schema(Some(schema)).build())
                .build(),
        )
        .build()
}

/// Whether the request's `Content-Type` is exactly `expected`
pub(crate) fn content_type_is(req: &Request, expected: &'static str) -> Result<()> {
    let found = req
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    if found.as_deref() == Some(expected) {
        Ok(())
    } else {
        Err(crate::error::BadRequest::InvalidContentType { expected, found }.into())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;
    use crate::error::{BadRequest, Error};

    async fn greet(ctx: Context, _req: EmptyRequest) -> Result<EmptyResponse> {
        assert!(ctx.cancellation().is_none());
        Ok(EmptyResponse)
    }

    #[tokio::test]
    async fn endpoint_runs_handler() {
        let endpoint = TypedEndpoint::new(greet);
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = endpoint.call(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn produce_and_consume() {
        let producer = produce(|_ctx: Context| async { Ok::<_, Error>(42_u32) });
        assert_eq!(
            producer
                .handle(Context::default(), EmptyRequest)
                .await
                .unwrap(),
            42
        );

        let consumer = consume(|_ctx: Context, n: u32| async move {
            if n > 10 {
                Ok(())
            } else {
                Err(Error::from(BadRequest::MalformedBody("too small".into())))
            }
        });
        assert!(consumer.handle(Context::default(), 11).await.is_ok());
        assert!(consumer.handle(Context::default(), 1).await.is_err());
    }

    #[test]
    fn content_type_must_match_exactly() {
        let req = |value: &str| {
            Request::builder()
                .header("content-type", value)
                .body(Body::empty())
                .unwrap()
        };

        assert!(content_type_is(&req("application/json"), "application/json").is_ok());
        assert!(matches!(
            content_type_is(&req("application/json; charset=utf-8"), "application/json"),
            Err(Error::BadRequest(BadRequest::InvalidContentType { .. }))
        ));

        let missing = Request::builder().body(Body::empty()).unwrap();
        assert!(content_type_is(&missing, "application/json").is_err());
    }

    #[test]
    fn empty_types_document_themselves() {
        let mut components = Components::new();
        assert!(EmptyRequest::request_body(&mut components).is_none());

        let responses = serde_json::to_value(EmptyResponse::responses(&mut components)).unwrap();
        assert_eq!(responses["200"]["description"], "OK");
        assert!(responses["200"].get("content").is_none());
    }
}
