// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Api assembly
//!
//! An [`Api`] collects registered operations into an `axum` router and an
//! `OpenAPI` document, and serves the framework endpoints next to them.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Router,
    body::Bytes,
    extract::Request,
    handler::Handler as AxumHandler,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter, any, get, on},
};
use tracing::{error, info};
use utoipa::openapi::OpenApi;

use crate::{
    error::{ErrorHandler, RegistrationError},
    health::{self, Always, Monitor},
    metrics::metrics_handler,
    openapi::ApiDocument,
    operation::Operation,
};

/// Path of the served `OpenAPI` document
pub const OPENAPI_PATH: &str = "/openapi.json";
/// Readiness probe path
pub const READINESS_PATH: &str = "/health/readiness";
/// Liveness probe path
pub const LIVENESS_PATH: &str = "/health/liveness";
/// Prometheus export path
pub const METRICS_PATH: &str = "/metrics";

const RESERVED_PATHS: [&str; 4] = [OPENAPI_PATH, READINESS_PATH, LIVENESS_PATH, METRICS_PATH];

/// A set of operations served together
pub struct Api {
    document: ApiDocument,
    routes: BTreeMap<String, MethodRouter>,
    readiness: Arc<dyn Monitor>,
    liveness: Arc<dyn Monitor>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    not_found: Option<MethodRouter>,
    method_not_allowed: Option<MethodRouter>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("paths", &self.routes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Api {
    /// Empty api documented under `title` and `version`
    pub fn new(title: &str, version: &str) -> Self {
        Self {
            document: ApiDocument::new(title, version),
            routes: BTreeMap::new(),
            readiness: Arc::new(Always),
            liveness: Arc::new(Always),
            error_handler: None,
            not_found: None,
            method_not_allowed: None,
        }
    }

    /// Document and route `operation`
    ///
    /// Fails, leaving the api unchanged, when the operation conflicts with one
    /// already registered or declares something the runtime cannot enforce.
    pub fn register(&mut self, operation: Operation) -> Result<(), RegistrationError> {
        let path = operation.rendered_path();
        if RESERVED_PATHS.contains(&path.as_str()) {
            return Err(RegistrationError::ReservedPath { path });
        }
        let filter = MethodFilter::try_from(operation.method().clone()).map_err(|_| {
            RegistrationError::UnsupportedMethod {
                method: operation.method().clone(),
            }
        })?;

        let operation = match &self.error_handler {
            Some(handler) => operation.or_error_handler(handler),
            None => operation,
        };

        // Compile against a copy so a failed registration leaves no trace.
        let mut document = self.document.clone();
        let compiled = Arc::new(operation.compile(&mut document)?);
        self.document = document;

        info!(method = %compiled.method(), path = %compiled.path(), "registered operation");

        let serve = move |req: Request| {
            let compiled = Arc::clone(&compiled);
            async move { compiled.serve(req).await }
        };
        let route = match self.routes.remove(&path) {
            Some(existing) => existing.on(filter, serve),
            None => on(filter, serve),
        };
        self.routes.insert(path, route);
        Ok(())
    }

    /// Builder form of [`Api::register`]
    pub fn with(mut self, operation: Operation) -> Result<Self, RegistrationError> {
        self.register(operation)?;
        Ok(self)
    }

    /// Error handler for operations registered from now on without their own
    #[must_use]
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Monitor answering `GET /health/readiness`
    #[must_use]
    pub fn readiness(mut self, monitor: impl Monitor) -> Self {
        self.readiness = Arc::new(monitor);
        self
    }

    /// Monitor answering `GET /health/liveness`
    #[must_use]
    pub fn liveness(mut self, monitor: impl Monitor) -> Self {
        self.liveness = Arc::new(monitor);
        self
    }

    /// Response for paths no operation matches, 404 by default
    #[must_use]
    pub fn not_found<H, T>(mut self, handler: H) -> Self
    where
        H: AxumHandler<T, ()>,
        T: 'static,
    {
        self.not_found = Some(any(handler));
        self
    }

    /// Response for known paths requested with another method, 405 by default
    #[must_use]
    pub fn method_not_allowed<H, T>(mut self, handler: H) -> Self
    where
        H: AxumHandler<T, ()>,
        T: 'static,
    {
        self.method_not_allowed = Some(any(handler));
        self
    }

    /// The document as registered so far
    pub fn document(&self) -> &OpenApi {
        self.document.openapi()
    }

    /// Freeze the document and build the router
    pub fn into_router(self) -> Router {
        let document = serialize_document(&self.document.freeze());
        let readiness = self.readiness;
        let liveness = self.liveness;

        let framework = [
            (
                OPENAPI_PATH,
                get(move || {
                    let document = document.clone();
                    async move { document_response(document) }
                }),
            ),
            (
                READINESS_PATH,
                get(move || {
                    let monitor = Arc::clone(&readiness);
                    async move { health::probe(monitor.as_ref()).await }
                }),
            ),
            (
                LIVENESS_PATH,
                get(move || {
                    let monitor = Arc::clone(&liveness);
                    async move { health::probe(monitor.as_ref()).await }
                }),
            ),
            (METRICS_PATH, get(metrics_handler)),
        ];

        let mut router = Router::new();
        let routes = self
            .routes
            .into_iter()
            .chain(framework.into_iter().map(|(path, route)| (path.to_string(), route)));
        for (path, route) in routes {
            let route = match &self.method_not_allowed {
                Some(fallback) => route.fallback_service(fallback.clone()),
                None => route,
            };
            router = router.route(&path, route);
        }

        match self.not_found {
            Some(fallback) => router.fallback_service(fallback),
            None => router.fallback(|| async { StatusCode::NOT_FOUND }),
        }
    }
}

fn serialize_document(openapi: &OpenApi) -> Option<Bytes> {
    serde_json::to_vec(openapi)
        .inspect_err(|e| error!(error = %e, "failed to serialize OpenAPI document"))
        .ok()
        .map(Bytes::from)
}

fn document_response(document: Option<Bytes>) -> Response {
    match document {
        Some(bytes) => (
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            bytes,
        )
            .into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
