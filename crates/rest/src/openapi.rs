// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `OpenAPI` document assembly
//!
//! The document only grows while operations are registered, from a single
//! thread. [`ApiDocument::freeze`] snapshots it before the router serves.

use std::{collections::HashSet, sync::Arc};

use axum::http::Method;
use utoipa::openapi::{
    Components, Info, OpenApi, OpenApiBuilder, Paths,
    path::{HttpMethod, Operation as OperationSpec},
    security::SecurityScheme as SchemeSpec,
};

use crate::error::RegistrationError;

/// `OpenAPI` document under construction
#[derive(Debug, Clone)]
pub struct ApiDocument {
    openapi: OpenApi,
    operations: HashSet<(Method, String)>,
}

impl ApiDocument {
    /// Empty document with its `info` block
    pub fn new(title: &str, version: &str) -> Self {
        Self {
            openapi: OpenApiBuilder::new()
                .info(Info::new(title, version))
                .paths(Paths::new())
                .components(Some(Components::new()))
                .build(),
            operations: HashSet::new(),
        }
    }

    /// Add an operation under `path`; each method and path pair is accepted once
    pub fn add_operation(
        &mut self,
        method: &Method,
        path: &str,
        operation: OperationSpec,
    ) -> Result<(), RegistrationError> {
        let http_method = http_method(method)?;
        if !self.operations.insert((method.clone(), path.to_string())) {
            return Err(RegistrationError::DuplicateOperation {
                method: method.clone(),
                path: path.to_string(),
            });
        }

        self.openapi
            .paths
            .add_path_operation(path, vec![http_method], operation);
        Ok(())
    }

    /// Whether `method` and `path` are already documented
    pub fn has_operation(&self, method: &Method, path: &str) -> bool {
        self.operations.contains(&(method.clone(), path.to_string()))
    }

    /// Register a security scheme by name
    ///
    /// Registering an identical definition again is a no-op.
    pub fn add_security_scheme(
        &mut self,
        name: &str,
        scheme: SchemeSpec,
    ) -> Result<(), RegistrationError> {
        let components = self.components_mut();
        if let Some(existing) = components.security_schemes.get(name) {
            if same_definition(existing, &scheme) {
                return Ok(());
            }
            return Err(RegistrationError::ConflictingSecurityScheme {
                name: name.to_string(),
            });
        }

        components.add_security_scheme(name, scheme);
        Ok(())
    }

    /// Components shared by every operation
    pub fn components_mut(&mut self) -> &mut Components {
        self.openapi.components.get_or_insert_with(Components::new)
    }

    /// Current state of the document
    pub fn openapi(&self) -> &OpenApi {
        &self.openapi
    }

    /// Immutable snapshot served at `/openapi.json`
    pub fn freeze(self) -> Arc<OpenApi> {
        Arc::new(self.openapi)
    }
}

fn same_definition(left: &SchemeSpec, right: &SchemeSpec) -> bool {
    match (serde_json::to_value(left), serde_json::to_value(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

/// `OpenAPI` path item key for `method`
pub(crate) fn http_method(method: &Method) -> Result<HttpMethod, RegistrationError> {
    Ok(match *method {
        Method::GET => HttpMethod::Get,
        Method::POST => HttpMethod::Post,
        Method::PUT => HttpMethod::Put,
        Method::DELETE => HttpMethod::Delete,
        Method::PATCH => HttpMethod::Patch,
        Method::HEAD => HttpMethod::Head,
        Method::OPTIONS => HttpMethod::Options,
        Method::TRACE => HttpMethod::Trace,
        _ => {
            return Err(RegistrationError::UnsupportedMethod {
                method: method.clone(),
            });
        }
    })
}
