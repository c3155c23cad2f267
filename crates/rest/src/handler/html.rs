// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! HTML content adapter
//!
//! Handler responses are rendered through a `minijinja` template with HTML
//! auto-escaping forced on, whatever the template's name.

use std::{future::Future, marker::PhantomData, sync::Arc};

use axum::{
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use minijinja::{AutoEscape, Environment};
use serde::Serialize;
use utoipa::{
    PartialSchema,
    openapi::{Components, response::Responses},
};

use super::{Handler, Produce, WriteResponse, ok_response};
use crate::{context::Context, error::Result};

/// HTML media type, as written on responses
pub const TEXT_HTML: &str = "text/html; charset=utf-8";

const TEXT_HTML_DOCUMENTED: &str = "text/html";

/// A compiled template
#[derive(Debug, Clone)]
pub struct HtmlTemplate {
    env: Arc<Environment<'static>>,
    name: &'static str,
}

impl HtmlTemplate {
    /// Compile `source`; syntax errors are reported here, not per request
    pub fn new(name: &'static str, source: &'static str) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env.add_template(name, source)?;
        Ok(Self {
            env: Arc::new(env),
            name,
        })
    }

    /// Render `value` as the template context
    pub fn render<T: Serialize>(&self, value: &T) -> Result<String, minijinja::Error> {
        self.env.get_template(self.name)?.render(value)
    }
}

/// Rendered HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlResponse(pub String);

impl WriteResponse for HtmlResponse {
    fn write(self) -> Result<Response> {
        Ok((
            [(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML))],
            self.0,
        )
            .into_response())
    }

    fn responses(_components: &mut Components) -> Responses {
        ok_response(TEXT_HTML_DOCUMENTED, String::schema())
    }
}

/// See [`return_html`]
#[derive(Debug, Clone)]
pub struct ReturnHtml<H, Resp> {
    handler: H,
    template: HtmlTemplate,
    resp: PhantomData<fn() -> Resp>,
}

impl<H, Resp> ReturnHtml<H, Resp> {
    fn new(handler: H, template: HtmlTemplate) -> Self {
        Self {
            handler,
            template,
            resp: PhantomData,
        }
    }
}

impl<H, Req, Resp> Handler<Req, HtmlResponse> for ReturnHtml<H, Resp>
where
    H: Handler<Req, Resp>,
    Resp: Serialize + Send + 'static,
{
    fn handle(&self, ctx: Context, req: Req) -> impl Future<Output = Result<HtmlResponse>> + Send {
        let fut = self.handler.handle(ctx, req);
        async move {
            let value = fut.await?;
            let page = self
                .template
                .render(&value)
                .map_err(|e| anyhow::Error::new(e).context("failed to render template"))?;
            Ok(HtmlResponse(page))
        }
    }
}

/// Render the handler's response through `template`
pub fn return_html<H, Req, Resp>(handler: H, template: HtmlTemplate) -> ReturnHtml<H, Resp>
where
    H: Handler<Req, Resp>,
    Resp: Serialize + Send + 'static,
{
    ReturnHtml::new(handler, template)
}

/// No body in, rendered page out
pub fn produce_html<F, Fut, Resp>(
    producer: F,
    template: HtmlTemplate,
) -> ReturnHtml<Produce<F>, Resp>
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send,
    Resp: Serialize + Send + 'static,
{
    ReturnHtml::new(super::produce(producer), template)
}
