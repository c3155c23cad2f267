// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Operation assembler
//!
//! An [`Operation`] pairs a method and [`Path`] with a typed handler, the
//! parameters it declares and the interceptors it installs. Registering it
//! documents it in the [`ApiDocument`] and compiles the interceptor chain that
//! serves it. The chain runs parameter injections first, then validators, then
//! authenticators, then the operation's own interceptors.

use std::{
    collections::{BTreeSet, HashSet},
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Instant,
};

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{Instrument, debug, error, info_span};
use utoipa::openapi::{
    Components,
    path::OperationBuilder,
    request_body::RequestBody,
    response::Responses,
    security::SecurityRequirement,
};

use crate::{
    error::{DefaultErrorHandler, ErrorHandler, RegistrationError},
    handler::{Handler, ReadRequest, TypedEndpoint, WriteResponse},
    interceptor::{Endpoint, Interceptor, Next, run_recovering},
    metrics,
    openapi::ApiDocument,
    param::{Location, Param},
    path::Path,
};

/// One method and path registration
pub struct Operation {
    method: Method,
    path: Path,
    params: Vec<Param>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    operation_id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    endpoint: Arc<dyn Endpoint>,
    request_body: fn(&mut Components) -> Option<RequestBody>,
    responses: fn(&mut Components) -> Responses,
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("method", &self.method)
            .field("path", &self.path.render())
            .field("params", &self.params)
            .field("interceptors", &self.interceptors.len())
            .field("operation_id", &self.operation_id)
            .finish_non_exhaustive()
    }
}

impl Operation {
    /// Serve `handler` at `method` and `path`
    pub fn new<H, Req, Resp>(method: Method, path: Path, handler: H) -> Self
    where
        H: Handler<Req, Resp>,
        Req: ReadRequest,
        Resp: WriteResponse,
    {
        Self {
            method,
            path,
            params: Vec::new(),
            interceptors: Vec::new(),
            error_handler: None,
            operation_id: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            endpoint: Arc::new(TypedEndpoint::<H, Req, Resp>::new(handler)),
            request_body: Req::request_body,
            responses: Resp::responses,
        }
    }

    /// `GET` operation
    pub fn get<H, Req, Resp>(path: Path, handler: H) -> Self
    where
        H: Handler<Req, Resp>,
        Req: ReadRequest,
        Resp: WriteResponse,
    {
        Self::new(Method::GET, path, handler)
    }

    /// `POST` operation
    pub fn post<H, Req, Resp>(path: Path, handler: H) -> Self
    where
        H: Handler<Req, Resp>,
        Req: ReadRequest,
        Resp: WriteResponse,
    {
        Self::new(Method::POST, path, handler)
    }

    /// `PUT` operation
    pub fn put<H, Req, Resp>(path: Path, handler: H) -> Self
    where
        H: Handler<Req, Resp>,
        Req: ReadRequest,
        Resp: WriteResponse,
    {
        Self::new(Method::PUT, path, handler)
    }

    /// `DELETE` operation
    pub fn delete<H, Req, Resp>(path: Path, handler: H) -> Self
    where
        H: Handler<Req, Resp>,
        Req: ReadRequest,
        Resp: WriteResponse,
    {
        Self::new(Method::DELETE, path, handler)
    }

    /// Declare a header, query or cookie parameter
    ///
    /// Path parameters are normally declared on the [`Path`]; declaring one here
    /// as well is a duplicate.
    #[must_use]
    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Install an interceptor after every parameter interceptor
    #[must_use]
    pub fn intercept(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Replace the default error handler
    #[must_use]
    pub fn on_error(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Set the `operationId`; derived from method and path otherwise
    #[must_use]
    pub fn operation_id(mut self, id: &str) -> Self {
        self.operation_id = Some(id.to_string());
        self
    }

    /// Set the summary
    #[must_use]
    pub fn summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    /// Set the description
    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Add a tag
    #[must_use]
    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Use `handler` unless the operation installed its own
    pub(crate) fn or_error_handler(mut self, handler: &Arc<dyn ErrorHandler>) -> Self {
        if self.error_handler.is_none() {
            self.error_handler = Some(Arc::clone(handler));
        }
        self
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Rendered path template
    pub fn rendered_path(&self) -> String {
        self.path.render()
    }

    /// Document the operation and build its chain
    pub(crate) fn compile(
        self,
        document: &mut ApiDocument,
    ) -> Result<CompiledOperation, RegistrationError> {
        self.path.validate()?;
        let rendered = self.path.render();

        let mut seen = HashSet::new();
        for param in self.path.params() {
            seen.insert((Location::Path, param.name().to_string()));
        }
        for param in &self.params {
            if param.location() == Location::Path && !self.path.has_param(param.name()) {
                return Err(RegistrationError::UnknownPathParameter {
                    path: rendered,
                    name: param.name().to_string(),
                });
            }
            if !seen.insert(param_key(param)) {
                return Err(RegistrationError::DuplicateParameter {
                    name: param.name().to_string(),
                    location: param.location(),
                });
            }
        }

        let mut descriptors = Vec::new();
        let mut injections: Vec<Arc<dyn Interceptor>> = Vec::new();
        let mut validators = Vec::new();
        let mut authenticators = Vec::new();
        let mut schemes = BTreeSet::new();

        for param in self.path.params().chain(self.params.iter()) {
            let compiled = param.compile()?;
            if let Some((name, scheme)) = param.security() {
                document.add_security_scheme(name, scheme.to_openapi(name)?)?;
                schemes.insert(name.to_string());
            }
            descriptors.push(compiled.descriptor);
            injections.extend(compiled.injection);
            validators.extend(compiled.validators);
            authenticators.extend(compiled.authenticators);
        }

        let chain: Vec<Arc<dyn Interceptor>> = injections
            .into_iter()
            .chain(validators)
            .chain(authenticators)
            .chain(self.interceptors)
            .collect();

        let error_handler = self
            .error_handler
            .unwrap_or_else(|| Arc::new(DefaultErrorHandler));

        let components = document.components_mut();
        let request_body = (self.request_body)(components);
        let mut responses = (self.responses)(components);
        for (status, response) in error_handler.error_responses(components) {
            responses
                .responses
                .entry(status.as_str().to_string())
                .or_insert(response.into());
        }

        let operation_id = self
            .operation_id
            .unwrap_or_else(|| default_operation_id(&self.method, &self.path));

        let mut spec = OperationBuilder::new()
            .operation_id(Some(operation_id))
            .summary(self.summary)
            .description(self.description)
            .request_body(request_body)
            .responses(responses);
        if !descriptors.is_empty() {
            spec = spec.parameters(Some(descriptors));
        }
        if !self.tags.is_empty() {
            spec = spec.tags(Some(self.tags));
        }
        if !schemes.is_empty() {
            spec = spec.securities(Some(
                schemes
                    .into_iter()
                    .map(|name| SecurityRequirement::new(name, Vec::<String>::new())),
            ));
        }

        document.add_operation(&self.method, &rendered, spec.build())?;
        debug!(method = %self.method, path = %rendered, interceptors = chain.len(), "operation registered");

        Ok(CompiledOperation {
            method: self.method,
            path: rendered,
            chain: chain.into(),
            endpoint: self.endpoint,
            error_handler,
        })
    }
}

fn param_key(param: &Param) -> (Location, String) {
    match param.location() {
        Location::Header => (Location::Header, param.name().to_ascii_lowercase()),
        location => (location, param.name().to_string()),
    }
}

/// `get /pets/{id}` becomes `getPetsById`
fn default_operation_id(method: &Method, path: &Path) -> String {
    let mut id = method.as_str().to_ascii_lowercase();
    for element in path.render().split('/').filter(|s| !s.is_empty()) {
        let (prefix, word) = match element.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => ("By", name),
            None => ("", element),
        };
        id.push_str(prefix);
        for piece in word.split(|c: char| !c.is_ascii_alphanumeric()) {
            let mut chars = piece.chars();
            if let Some(first) = chars.next() {
                id.push(first.to_ascii_uppercase());
                id.push_str(chars.as_str());
            }
        }
    }
    id
}

/// Registered operation, immutable while serving
pub(crate) struct CompiledOperation {
    method: Method,
    path: String,
    chain: Arc<[Arc<dyn Interceptor>]>,
    endpoint: Arc<dyn Endpoint>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl CompiledOperation {
    pub(crate) fn method(&self) -> &Method {
        &self.method
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Run the chain; whatever happens, a response comes out
    pub(crate) async fn serve(self: Arc<Self>, req: Request) -> Response {
        let span = info_span!("operation", method = %self.method, path = %self.path);
        async move {
            let started = Instant::now();
            let next = Next::new(Arc::clone(&self.chain), Arc::clone(&self.endpoint));

            let response = match run_recovering(next, req).await {
                Ok(response) => response,
                Err(err) => self.render_error(err),
            };

            metrics::observe_operation(
                self.method.as_str(),
                &self.path,
                response.status(),
                started.elapsed().as_secs_f64(),
            );
            response
        }
        .instrument(span)
        .await
    }

    fn render_error(&self, err: crate::error::Error) -> Response {
        std::panic::catch_unwind(AssertUnwindSafe(|| self.error_handler.handle_error(err)))
            .unwrap_or_else(|_| {
                error!("error handler panicked");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            })
    }
}
