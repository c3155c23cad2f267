// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Interceptor chain
//!
//! Interceptors run strictly in order before the terminal endpoint. The first one
//! registered is the outermost. Returning an error instead of calling
//! [`Next::run`] halts the chain; nothing after it runs, and the error reaches the
//! operation's error handler.

use std::{any::Any, future::Future, panic::AssertUnwindSafe, sync::Arc};

use axum::{extract::Request, response::Response};
use futures::{FutureExt, future::BoxFuture};

use crate::error::{Error, Result};

/// Request transformation installed on an operation
pub trait Interceptor: Send + Sync + 'static {
    /// Inspect or rewrite the request, then either call `next` or fail
    fn intercept(&self, req: Request, next: Next) -> BoxFuture<'_, Result<Response>>;
}

/// Terminal step of a chain: reads the body and invokes the typed handler
pub(crate) trait Endpoint: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture<'_, Result<Response>>;
}

/// Remainder of the chain after the current interceptor
#[derive(Clone)]
pub struct Next {
    chain: Arc<[Arc<dyn Interceptor>]>,
    position: usize,
    endpoint: Arc<dyn Endpoint>,
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("position", &self.position)
            .field("remaining", &self.chain.len().saturating_sub(self.position))
            .finish_non_exhaustive()
    }
}

impl Next {
    pub(crate) fn new(chain: Arc<[Arc<dyn Interceptor>]>, endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            chain,
            position: 0,
            endpoint,
        }
    }

    /// Run the rest of the chain
    pub async fn run(self, req: Request) -> Result<Response> {
        let Self {
            chain,
            position,
            endpoint,
        } = self;

        match chain.get(position).cloned() {
            Some(interceptor) => {
                let next = Self {
                    chain,
                    position: position + 1,
                    endpoint,
                };
                interceptor.intercept(req, next).await
            }
            None => endpoint.call(req).await,
        }
    }
}

/// Interceptor built from an async closure
pub struct FnInterceptor<F> {
    f: F,
}

impl<F> std::fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnInterceptor").finish_non_exhaustive()
    }
}

/// Build an interceptor from `async fn(Request, Next) -> Result<Response>`
///
/// ```ignore
/// let tag = interceptor_fn(|mut req: Request, next: Next| async move {
///     req.extensions_mut().insert(Tenant("acme"));
///     next.run(req).await
/// });
/// ```
pub fn interceptor_fn<F, Fut>(f: F) -> FnInterceptor<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    FnInterceptor { f }
}

impl<F, Fut> Interceptor for FnInterceptor<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response>> + Send + 'static,
{
    fn intercept(&self, req: Request, next: Next) -> BoxFuture<'_, Result<Response>> {
        Box::pin((self.f)(req, next))
    }
}

/// Run a chain behind a panic barrier
///
/// A panic anywhere below is turned into [`Error::Panic`] carrying the panic
/// message, so it is handled exactly like a returned error.
pub(crate) async fn run_recovering(next: Next, req: Request) -> Result<Response> {
    AssertUnwindSafe(next.run(req))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(Error::Panic(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use axum::{body::Body, http::StatusCode, response::IntoResponse};

    use super::*;
    use crate::error::{BadRequest, Unauthorized};

    struct Reply;

    impl Endpoint for Reply {
        fn call(&self, _req: Request) -> BoxFuture<'_, Result<Response>> {
            Box::pin(async { Ok(StatusCode::OK.into_response()) })
        }
    }

    struct Explode;

    impl Endpoint for Explode {
        fn call(&self, _req: Request) -> BoxFuture<'_, Result<Response>> {
            Box::pin(async { panic!("handler exploded") })
        }
    }

    struct Record {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Interceptor for Record {
        fn intercept(&self, req: Request, next: Next) -> BoxFuture<'_, Result<Response>> {
            Box::pin(async move {
                self.log.lock().unwrap().push(self.label);
                next.run(req).await
            })
        }
    }

    fn request() -> Request {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn runs_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain: Arc<[Arc<dyn Interceptor>]> = Arc::new([
            Arc::new(Record {
                label: "first",
                log: Arc::clone(&log),
            }) as Arc<dyn Interceptor>,
            Arc::new(Record {
                label: "second",
                log: Arc::clone(&log),
            }),
        ]);

        let response = Next::new(chain, Arc::new(Reply))
            .run(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn error_short_circuits() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reject = interceptor_fn(|_req: Request, _next: Next| async {
            Err::<Response, _>(Error::from(Unauthorized::Denied("nope".into())))
        });
        let chain: Arc<[Arc<dyn Interceptor>]> = Arc::new([
            Arc::new(reject) as Arc<dyn Interceptor>,
            Arc::new(Record {
                label: "never",
                log: Arc::clone(&log),
            }),
        ]);

        let result = Next::new(chain, Arc::new(Explode)).run(request()).await;
        assert!(matches!(result, Err(Error::Unauthorized(_))));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn interceptors_can_rewrite_requests() {
        #[derive(Clone)]
        struct Tenant(&'static str);

        struct RequireTenant;

        impl Endpoint for RequireTenant {
            fn call(&self, req: Request) -> BoxFuture<'_, Result<Response>> {
                Box::pin(async move {
                    match req.extensions().get::<Tenant>() {
                        Some(Tenant("acme")) => Ok(StatusCode::OK.into_response()),
                        _ => Err(Error::from(BadRequest::MalformedBody("no tenant".into()))),
                    }
                })
            }
        }

        let tag = interceptor_fn(|mut req: Request, next: Next| async move {
            req.extensions_mut().insert(Tenant("acme"));
            next.run(req).await
        });
        let chain: Arc<[Arc<dyn Interceptor>]> = Arc::new([Arc::new(tag) as Arc<dyn Interceptor>]);

        let response = Next::new(chain, Arc::new(RequireTenant))
            .run(request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn panics_become_errors() {
        let chain: Arc<[Arc<dyn Interceptor>]> = Arc::from(Vec::new());
        let result = run_recovering(Next::new(chain, Arc::new(Explode)), request()).await;
        match result {
            Err(Error::Panic(message)) => assert_eq!(message, "handler exploded"),
            other => panic!("expected a recovered panic, got {other:?}"),
        }
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&"owned".to_string()), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic payload");
    }
}
