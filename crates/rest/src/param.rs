// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Parameter model
//!
//! A [`Param`] declaration produces an `OpenAPI` parameter descriptor and the
//! interceptors that extract and validate its value at request time. Extracted
//! values are stored in a typed [`Params`] container in the request extensions.

use std::{collections::HashMap, fmt, sync::Arc};

use axum::{
    extract::{FromRequestParts, RawPathParams, Request},
    http::{HeaderMap, header, request::Parts},
    response::Response,
};
use futures::future::BoxFuture;
use regex::Regex;
use tracing::debug;
use url::Url;
use utoipa::openapi::{
    RefOr, Required,
    path::{Parameter, ParameterBuilder, ParameterIn},
    schema::{ObjectBuilder, Schema, Type},
};

use crate::{
    error::{BadRequest, RegistrationError, Result},
    interceptor::{Interceptor, Next},
    security::{BearerAuth, JwtVerifier, OAuthFlow, SecurityScheme},
};

/// Where a parameter travels in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// `Cookie` header entry
    Cookie,
    /// Request header
    Header,
    /// Query string
    Query,
    /// Path placeholder
    Path,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cookie => "cookie",
            Self::Header => "header",
            Self::Query => "query",
            Self::Path => "path",
        })
    }
}

impl From<Location> for ParameterIn {
    fn from(location: Location) -> Self {
        match location {
            Location::Cookie => Self::Cookie,
            Location::Header => Self::Header,
            Location::Query => Self::Query,
            Location::Path => Self::Path,
        }
    }
}

/// A cookie sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value, surrounding quotes removed
    pub value: String,
}

/// Raw values extracted for one parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Every cookie sent under the name
    Cookies(Vec<Cookie>),
    /// Every header line with the name
    Headers(Vec<String>),
    /// The matched path segment
    Path(String),
    /// Every query value with the name
    Query(Vec<String>),
}

impl ParamValue {
    /// Whether nothing usable was sent
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Cookies(cookies) => cookies.is_empty(),
            Self::Headers(values) | Self::Query(values) => values.is_empty(),
            Self::Path(value) => value.is_empty(),
        }
    }

    /// Values as strings, cookie values for cookies
    pub fn strings(&self) -> Vec<&str> {
        match self {
            Self::Cookies(cookies) => cookies.iter().map(|c| c.value.as_str()).collect(),
            Self::Headers(values) | Self::Query(values) => {
                values.iter().map(String::as_str).collect()
            }
            Self::Path(value) => vec![value.as_str()],
        }
    }
}

/// Injected parameter values of one request
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<(Location, String), ParamValue>,
}

impl Params {
    fn key(location: Location, name: &str) -> (Location, String) {
        match location {
            Location::Header => (location, name.to_ascii_lowercase()),
            _ => (location, name.to_string()),
        }
    }

    /// Value injected for a parameter
    pub fn get(&self, location: Location, name: &str) -> Option<&ParamValue> {
        self.values.get(&Self::key(location, name))
    }

    /// Store a value, replacing any previous one
    pub fn insert(&mut self, location: Location, name: &str, value: ParamValue) {
        self.values.insert(Self::key(location, name), value);
    }

    /// Number of injected parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was injected
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Declaration of a cookie, header, query or path parameter
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    location: Location,
    required: bool,
    pattern: Option<String>,
    description: Option<String>,
    security: Option<(String, SecurityScheme)>,
}

impl Param {
    fn new(name: &str, location: Location) -> Self {
        Self {
            name: name.to_string(),
            location,
            required: false,
            pattern: None,
            description: None,
            security: None,
        }
    }

    /// Cookie parameter
    pub fn cookie(name: &str) -> Self {
        Self::new(name, Location::Cookie)
    }

    /// Header parameter
    pub fn header(name: &str) -> Self {
        Self::new(name, Location::Header)
    }

    /// Query parameter
    pub fn query(name: &str) -> Self {
        Self::new(name, Location::Query)
    }

    /// Path parameter; always required
    pub fn path(name: &str) -> Self {
        Self::new(name, Location::Path).required()
    }

    /// Reject requests where the parameter is absent or empty
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Reject requests where no value matches `pattern`
    #[must_use]
    pub fn regex(mut self, pattern: &str) -> Self {
        self.pattern = Some(pattern.to_string());
        self
    }

    /// Human readable description for the document
    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    fn secured_by(mut self, scheme_name: &str, scheme: SecurityScheme) -> Self {
        self.security = Some((scheme_name.to_string(), scheme));
        self
    }

    /// The parameter carries an API key
    #[must_use]
    pub fn api_key(self, scheme_name: &str) -> Self {
        let scheme = SecurityScheme::ApiKey {
            location: self.location,
            name: self.name.clone(),
        };
        self.secured_by(scheme_name, scheme)
    }

    /// The parameter carries HTTP basic credentials
    #[must_use]
    pub fn basic_auth(self, scheme_name: &str) -> Self {
        self.secured_by(scheme_name, SecurityScheme::Basic)
    }

    /// The parameter carries a bearer JWT checked by `verifier`
    #[must_use]
    pub fn jwt_auth(self, scheme_name: &str, verifier: impl JwtVerifier) -> Self {
        self.secured_by(scheme_name, SecurityScheme::BearerJwt(Arc::new(verifier)))
    }

    /// The parameter carries an `OAuth2` access token
    #[must_use]
    pub fn oauth2(self, scheme_name: &str, flows: Vec<OAuthFlow>) -> Self {
        self.secured_by(scheme_name, SecurityScheme::OAuth2(flows))
    }

    /// The parameter carries an `OpenID Connect` token
    #[must_use]
    pub fn openid_connect(self, scheme_name: &str, discovery_url: Url) -> Self {
        self.secured_by(scheme_name, SecurityScheme::OpenIdConnect(discovery_url))
    }

    /// The operation requires client certificates
    #[must_use]
    pub fn mutual_tls(self, scheme_name: &str) -> Self {
        self.secured_by(scheme_name, SecurityScheme::MutualTls)
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter location
    pub fn location(&self) -> Location {
        self.location
    }

    /// Whether the parameter is required
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Declared pattern
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    /// Declared security scheme and its name
    pub fn security(&self) -> Option<(&str, &SecurityScheme)> {
        self.security
            .as_ref()
            .map(|(name, scheme)| (name.as_str(), scheme))
    }

    fn descriptor(&self) -> Parameter {
        let schema = ObjectBuilder::new()
            .schema_type(Type::String)
            .pattern(self.pattern.clone())
            .build();

        ParameterBuilder::new()
            .name(&self.name)
            .parameter_in(self.location.into())
            .required(if self.required {
                Required::True
            } else {
                Required::False
            })
            .description(self.description.clone())
            .schema(Some(RefOr::T(Schema::Object(schema))))
            .build()
    }

    /// Build the descriptor and interceptors for this declaration
    pub(crate) fn compile(&self) -> Result<CompiledParam, RegistrationError> {
        let mut compiled = CompiledParam::new(self);

        if self.required {
            compiled.validate(Arc::new(RequireParam {
                location: self.location,
                name: self.name.clone(),
            }));
        }

        if let Some(pattern) = &self.pattern {
            let regex = Regex::new(pattern).map_err(|source| RegistrationError::InvalidPattern {
                name: self.name.clone(),
                source,
            })?;
            compiled.validate(Arc::new(MatchPattern {
                location: self.location,
                name: self.name.clone(),
                regex,
            }));
        }

        if let Some((scheme_name, scheme)) = &self.security {
            match scheme {
                SecurityScheme::BearerJwt(verifier) => {
                    if self.location != Location::Header {
                        return Err(RegistrationError::MisplacedSecurityScheme {
                            name: scheme_name.clone(),
                            location: self.location,
                        });
                    }
                    compiled.authenticate(Arc::new(BearerAuth::new(
                        &self.name,
                        Arc::clone(verifier),
                    )));
                }
                SecurityScheme::MutualTls => {
                    return Err(RegistrationError::UnsupportedSecurityScheme {
                        name: scheme_name.clone(),
                    });
                }
                _ => {}
            }
        }

        // Handlers read every declared parameter from the context, validated or not.
        compiled.inject();
        Ok(compiled)
    }
}

/// Artefacts of one parameter declaration
pub(crate) struct CompiledParam {
    pub(crate) descriptor: Parameter,
    pub(crate) injection: Option<Arc<dyn Interceptor>>,
    pub(crate) validators: Vec<Arc<dyn Interceptor>>,
    pub(crate) authenticators: Vec<Arc<dyn Interceptor>>,
    location: Location,
    name: String,
}

impl CompiledParam {
    fn new(param: &Param) -> Self {
        Self {
            descriptor: param.descriptor(),
            injection: None,
            validators: Vec::new(),
            authenticators: Vec::new(),
            location: param.location,
            name: param.name.clone(),
        }
    }

    /// Register the injection interceptor once
    fn inject(&mut self) {
        if self.injection.is_none() {
            self.injection = Some(Arc::new(Inject {
                location: self.location,
                name: self.name.clone(),
            }));
        }
    }

    fn validate(&mut self, validator: Arc<dyn Interceptor>) {
        self.inject();
        self.validators.push(validator);
    }

    fn authenticate(&mut self, authenticator: Arc<dyn Interceptor>) {
        self.inject();
        self.authenticators.push(authenticator);
    }
}

/// Copies a parameter's raw values into the request's [`Params`]
struct Inject {
    location: Location,
    name: String,
}

impl Inject {
    async fn extract(&self, parts: &mut Parts) -> Option<ParamValue> {
        let value = match self.location {
            Location::Cookie => ParamValue::Cookies(read_cookies(&parts.headers, &self.name)),
            Location::Header => ParamValue::Headers(
                parts
                    .headers
                    .get_all(self.name.as_str())
                    .iter()
                    .filter_map(|value| value.to_str().ok())
                    .map(str::to_string)
                    .collect(),
            ),
            Location::Query => ParamValue::Query(
                parts
                    .uri
                    .query()
                    .map(|query| {
                        url::form_urlencoded::parse(query.as_bytes())
                            .filter(|(key, _)| key == self.name.as_str())
                            .map(|(_, value)| value.into_owned())
                            .collect()
                    })
                    .unwrap_or_default(),
            ),
            Location::Path => {
                let raw = RawPathParams::from_request_parts(parts, &()).await.ok()?;
                let value = raw
                    .iter()
                    .find(|(key, _)| *key == self.name)
                    .map(|(_, value)| value.to_string())?;
                ParamValue::Path(value)
            }
        };

        (!value.is_empty()).then_some(value)
    }
}

impl Interceptor for Inject {
    fn intercept(&self, req: Request, next: Next) -> BoxFuture<'_, Result<Response>> {
        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            if let Some(value) = self.extract(&mut parts).await {
                let mut params = parts.extensions.remove::<Params>().unwrap_or_default();
                params.insert(self.location, &self.name, value);
                parts.extensions.insert(params);
            }
            next.run(Request::from_parts(parts, body)).await
        })
    }
}

fn read_cookies(headers: &HeaderMap, name: &str) -> Vec<Cookie> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| Cookie {
                name: name.to_string(),
                value: value.trim().trim_matches('"').to_string(),
            })
        })
        .collect()
}

fn injected<'a>(req: &'a Request, location: Location, name: &str) -> Option<&'a ParamValue> {
    req.extensions().get::<Params>()?.get(location, name)
}

struct RequireParam {
    location: Location,
    name: String,
}

impl Interceptor for RequireParam {
    fn intercept(&self, req: Request, next: Next) -> BoxFuture<'_, Result<Response>> {
        Box::pin(async move {
            let present =
                injected(&req, self.location, &self.name).is_some_and(|value| !value.is_empty());
            if !present {
                debug!(location = %self.location, name = %self.name, "required parameter missing");
                return Err(BadRequest::MissingRequiredParameter {
                    name: self.name.clone(),
                    location: self.location,
                }
                .into());
            }
            next.run(req).await
        })
    }
}

struct MatchPattern {
    location: Location,
    name: String,
    regex: Regex,
}

impl Interceptor for MatchPattern {
    fn intercept(&self, req: Request, next: Next) -> BoxFuture<'_, Result<Response>> {
        Box::pin(async move {
            // Absent values are the required check's concern.
            if let Some(value) = injected(&req, self.location, &self.name)
                && !value.strings().iter().any(|s| self.regex.is_match(s))
            {
                debug!(location = %self.location, name = %self.name, "parameter does not match pattern");
                return Err(BadRequest::InvalidParameterValue {
                    name: self.name.clone(),
                    location: self.location,
                }
                .into());
            }
            next.run(req).await
        })
    }
}
