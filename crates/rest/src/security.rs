// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Security schemes
//!
//! Every scheme contributes a named `OpenAPI` security component. Only bearer JWT
//! installs a runtime check; the rest rely on `required` and `regex` validation
//! of the parameter they are declared on.

use std::{collections::BTreeMap, future::Future, sync::Arc};

use axum::{extract::Request, response::Response};
use futures::future::BoxFuture;
use tracing::debug;
use url::Url;
use utoipa::openapi::security::{
    ApiKey, ApiKeyValue, AuthorizationCode, ClientCredentials, Flow, Http, HttpAuthScheme,
    HttpBuilder, Implicit, OAuth2, OpenIdConnect, Password, Scopes,
    SecurityScheme as SchemeSpec,
};

use crate::{
    context::Context,
    error::{BadRequest, Error, InvalidJwt, RegistrationError, Result, Unauthorized},
    interceptor::{Interceptor, Next},
    param::{Location, ParamValue, Params},
};

const BEARER_PREFIX: &str = "Bearer ";

/// Checks a bearer token and returns the context handlers will see
pub trait JwtVerifier: Send + Sync + 'static {
    /// Verify `token`; on success the returned context replaces the request's
    fn verify(&self, ctx: Context, token: String) -> BoxFuture<'_, anyhow::Result<Context>>;
}

/// Verifier built from an async closure
pub struct FnVerifier<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnVerifier<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnVerifier").finish_non_exhaustive()
    }
}

/// Build a verifier from `async fn(Context, String) -> anyhow::Result<Context>`
pub fn verifier_fn<F, Fut>(f: F) -> FnVerifier<F>
where
    F: Fn(Context, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Context>> + Send + 'static,
{
    FnVerifier { f }
}

impl<F, Fut> JwtVerifier for FnVerifier<F>
where
    F: Fn(Context, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Context>> + Send + 'static,
{
    fn verify(&self, ctx: Context, token: String) -> BoxFuture<'_, anyhow::Result<Context>> {
        Box::pin((self.f)(ctx, token))
    }
}

/// One `OAuth2` flow with its scopes (scope name to description)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthFlow {
    /// Implicit grant
    Implicit {
        /// Authorization endpoint
        authorization_url: Url,
        /// Available scopes
        scopes: BTreeMap<String, String>,
    },
    /// Resource owner password grant
    Password {
        /// Token endpoint
        token_url: Url,
        /// Available scopes
        scopes: BTreeMap<String, String>,
    },
    /// Client credentials grant
    ClientCredentials {
        /// Token endpoint
        token_url: Url,
        /// Available scopes
        scopes: BTreeMap<String, String>,
    },
    /// Authorization code grant
    AuthorizationCode {
        /// Authorization endpoint
        authorization_url: Url,
        /// Token endpoint
        token_url: Url,
        /// Available scopes
        scopes: BTreeMap<String, String>,
    },
}

impl OAuthFlow {
    fn to_openapi(&self) -> Flow {
        let scopes = |scopes: &BTreeMap<String, String>| {
            Scopes::from_iter(scopes.iter().map(|(k, v)| (k.clone(), v.clone())))
        };

        match self {
            Self::Implicit {
                authorization_url,
                scopes: s,
            } => Flow::Implicit(Implicit::new(authorization_url.as_str(), scopes(s))),
            Self::Password {
                token_url,
                scopes: s,
            } => Flow::Password(Password::new(token_url.as_str(), scopes(s))),
            Self::ClientCredentials {
                token_url,
                scopes: s,
            } => Flow::ClientCredentials(ClientCredentials::new(token_url.as_str(), scopes(s))),
            Self::AuthorizationCode {
                authorization_url,
                token_url,
                scopes: s,
            } => Flow::AuthorizationCode(AuthorizationCode::new(
                authorization_url.as_str(),
                token_url.as_str(),
                scopes(s),
            )),
        }
    }
}

/// How clients authenticate against an operation
#[derive(Clone)]
pub enum SecurityScheme {
    /// Key carried by the parameter the scheme is declared on
    ApiKey {
        /// Where the key travels
        location: Location,
        /// Parameter carrying the key
        name: String,
    },
    /// HTTP basic authentication
    Basic,
    /// `Authorization: Bearer <jwt>` checked by a verifier
    BearerJwt(Arc<dyn JwtVerifier>),
    /// `OAuth2` with the given flows
    OAuth2(Vec<OAuthFlow>),
    /// `OpenID Connect` discovery
    OpenIdConnect(Url),
    /// Client certificates; declared only, cannot be registered
    MutualTls,
}

impl std::fmt::Debug for SecurityScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey { location, name } => f
                .debug_struct("ApiKey")
                .field("location", location)
                .field("name", name)
                .finish(),
            Self::Basic => f.write_str("Basic"),
            Self::BearerJwt(_) => f.write_str("BearerJwt"),
            Self::OAuth2(flows) => f.debug_tuple("OAuth2").field(flows).finish(),
            Self::OpenIdConnect(url) => f.debug_tuple("OpenIdConnect").field(url).finish(),
            Self::MutualTls => f.write_str("MutualTls"),
        }
    }
}

impl SecurityScheme {
    /// `OpenAPI` component for this scheme, registered under `name`
    pub fn to_openapi(&self, name: &str) -> Result<SchemeSpec, RegistrationError> {
        let scheme = match self {
            Self::ApiKey {
                location,
                name: key,
            } => {
                let value = ApiKeyValue::new(key);
                SchemeSpec::ApiKey(match location {
                    Location::Header => ApiKey::Header(value),
                    Location::Query => ApiKey::Query(value),
                    Location::Cookie => ApiKey::Cookie(value),
                    Location::Path => {
                        return Err(RegistrationError::MisplacedSecurityScheme {
                            name: name.to_string(),
                            location: *location,
                        });
                    }
                })
            }
            Self::Basic => SchemeSpec::Http(Http::new(HttpAuthScheme::Basic)),
            Self::BearerJwt(_) => SchemeSpec::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
            Self::OAuth2(flows) => {
                SchemeSpec::OAuth2(OAuth2::new(flows.iter().map(OAuthFlow::to_openapi)))
            }
            Self::OpenIdConnect(url) => SchemeSpec::OpenIdConnect(OpenIdConnect::new(url.as_str())),
            Self::MutualTls => {
                return Err(RegistrationError::UnsupportedSecurityScheme {
                    name: name.to_string(),
                });
            }
        };
        Ok(scheme)
    }
}

/// Runtime check behind [`SecurityScheme::BearerJwt`]
pub(crate) struct BearerAuth {
    header: String,
    verifier: Arc<dyn JwtVerifier>,
}

impl BearerAuth {
    pub(crate) fn new(header: &str, verifier: Arc<dyn JwtVerifier>) -> Self {
        Self {
            header: header.to_string(),
            verifier,
        }
    }

    fn token(&self, req: &Request) -> Result<String, InvalidJwt> {
        let value = req
            .extensions()
            .get::<Params>()
            .and_then(|params| params.get(Location::Header, &self.header))
            .and_then(|value| match value {
                ParamValue::Headers(values) => values.first(),
                _ => None,
            })
            .ok_or(InvalidJwt::MissingHeader)?;

        bearer_token(value).map(str::to_string)
    }
}

/// Token following the case-sensitive `Bearer ` prefix
fn bearer_token(value: &str) -> Result<&str, InvalidJwt> {
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(InvalidJwt::MissingBearerPrefix)?;
    if token.is_empty() {
        return Err(InvalidJwt::EmptyToken);
    }
    Ok(token)
}

impl Interceptor for BearerAuth {
    fn intercept(&self, req: Request, next: Next) -> BoxFuture<'_, Result<Response>> {
        Box::pin(async move {
            let token = self.token(&req).map_err(|cause| {
                debug!(header = %self.header, error = %cause, "bearer token not extracted");
                Error::from(BadRequest::InvalidJwt(cause))
            })?;

            let (mut parts, body) = req.into_parts();
            let ctx = Context::new(std::mem::take(&mut parts.extensions));
            let ctx = self.verifier.verify(ctx, token).await.map_err(|cause| {
                debug!(header = %self.header, error = %cause, "bearer token rejected");
                Unauthorized::InvalidJwt(InvalidJwt::Rejected { cause })
            })?;
            parts.extensions = ctx.into_extensions();

            next.run(Request::from_parts(parts, body)).await
        })
    }
}
