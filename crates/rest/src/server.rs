// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Server implementation module
//!
//! This module provides the server that hosts an [`Api`], including lifecycle
//! management, the HTTP middleware stack, and coordinated graceful shutdown
//! using `CancellationToken`.

use std::{net::SocketAddr, time::Duration};

use axum::{Extension, Router, extract::Request, http::HeaderName};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, warn};

use crate::{api::Api, config::ServerConfig};

// Server constants
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_FORCE_SHUTDOWN_TIMEOUT_SECONDS: u64 = 5;

/// Server lifecycle errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration validation errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Operation registration errors
    #[error("Registration error: {0}")]
    Registration(#[from] crate::error::RegistrationError),

    /// Network binding errors
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        /// Socket address that failed to bind
        address: SocketAddr,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server startup errors
    #[error("Server startup failed: {source}")]
    Startup {
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Server shutdown errors
    #[error("Server shutdown failed: {source}")]
    Shutdown {
        /// Underlying IO error
        source: std::io::Error,
    },
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

/// Configuration for server shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time to wait for graceful shutdown before forcing termination
    pub graceful_timeout: Duration,
    /// Maximum time to wait for all tasks to complete after graceful shutdown
    pub force_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            graceful_timeout: Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS),
            force_timeout: Duration::from_secs(DEFAULT_FORCE_SHUTDOWN_TIMEOUT_SECONDS),
        }
    }
}

/// Hosts one [`Api`]
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: ServerConfig,
    /// Application router with middleware
    router: Router,
    /// Cancellation token for coordinated shutdown
    cancellation_token: CancellationToken,
    /// Configuration for coordinated shutdown
    graceful_shutdown_config: ShutdownConfig,
}

impl Server {
    /// Create new server instance serving `api`
    ///
    /// The document is frozen here; operations cannot be added afterwards.
    pub fn new(config: ServerConfig, api: Api, graceful_shutdown_config: ShutdownConfig) -> Self {
        let cancellation_token = CancellationToken::new();
        let router = Self::create_router(&config, api, cancellation_token.child_token());

        Self {
            config,
            router,
            cancellation_token,
            graceful_shutdown_config,
        }
    }

    /// Wrap the api's router with the middleware stack
    fn create_router(config: &ServerConfig, api: Api, token: CancellationToken) -> Router {
        let timeout_duration = config.timeout_seconds.value();

        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http().make_span_with(|req: &Request| {
                    if let Some(request_id) = req.headers().get(REQUEST_ID_HEADER) {
                        info_span!("http_request", method = %req.method(), uri = %req.uri(), ?request_id)
                    } else {
                        error!("failed to extract id from request");
                        info_span!("http_request", method = %req.method(), uri = %req.uri(), request_id = "unknown")
                    }
                }),
            )
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
            .layer(TimeoutLayer::new(timeout_duration))
            .layer(Extension(token));

        api.into_router().layer(middleware)
    }

    /// Run the server with coordinated graceful shutdown
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address,
    /// or `ServerError::Startup` if the server fails to start.
    pub async fn run(self) -> ServerResult<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        info!(
            address = %actual_addr,
            environment = %self.config.environment,
            title = %self.config.openapi.title,
            "server starting",
        );

        let cancellation_token = self.cancellation_token.clone();
        let shutdown_token = cancellation_token.clone();
        tokio::spawn(async move {
            info!("spawning the graceful shutdown task");
            Self::shutdown_signal_handler(shutdown_token).await;
        });

        let graceful_timeout = self.graceful_shutdown_config.graceful_timeout;
        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                cancellation_token.cancelled().await;
                info!("shutdown requested, draining connections");
            })
            .into_future();

        let server_result = tokio::select! {
            result = serve => result,
            () = Self::drain_deadline(self.cancellation_token.clone(), graceful_timeout) => {
                warn!(timeout = ?graceful_timeout, "graceful shutdown timed out, dropping connections");
                Ok(())
            }
        };

        if let Err(e) = server_result {
            error!(error = ?e, "Server error during shutdown");
            Err(ServerError::Shutdown { source: e })
        } else {
            info!("server shut down gracefully");
            Ok(())
        }
    }

    /// Resolves `timeout` after cancellation
    async fn drain_deadline(token: CancellationToken, timeout: Duration) {
        token.cancelled().await;
        tokio::time::sleep(timeout).await;
    }

    /// Handle shutdown signals and trigger coordinated cancellation
    ///
    /// This function listens for SIGINT (Ctrl+C) and SIGTERM signals,
    /// and cancels the provided cancellation token when received.
    async fn shutdown_signal_handler(cancellation_token: CancellationToken) {
        let signal_received = async {
            #[cfg(unix)]
            #[allow(clippy::expect_used)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let mut sigterm =
                    signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
                let mut sigint =
                    signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

                tokio::select! {
                    _ = sigterm.recv() => {
                        warn!("Received SIGTERM signal, initiating coordinated shutdown");
                        "SIGTERM"
                    },
                    _ = sigint.recv() => {
                        warn!("Received SIGINT signal, initiating coordinated shutdown");
                        "SIGINT"
                    },
                }
            }

            #[cfg(not(unix))]
            #[allow(clippy::expect_used)]
            {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to install CTRL+C signal handler");
                warn!("Received CTRL+C signal, initiating coordinated shutdown");
                "CTRL+C"
            }
        };

        tokio::select! {
            signal_name = signal_received => {
                warn!("Shutdown signal {} received, cancelling all operations...", signal_name);
                cancellation_token.cancel();
            },
            () = cancellation_token.cancelled() => {
                warn!("Cancellation token already cancelled, shutdown signal handler exiting");
            }
        }
    }

    /// Returns a clone of the cancellation token for coordinated shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Initiates graceful shutdown by cancelling the server's cancellation token
    pub fn shutdown(&self) {
        info!("programmatic shutdown requested");
        self.cancellation_token.cancel();
    }

    /// Run server for testing, returns the bound address
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if unable to bind to the configured address.
    pub async fn run_for_testing(self) -> ServerResult<(SocketAddr, CancellationToken)> {
        let addr = self.config.socket_addr();

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                address: addr,
                source,
            })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Startup { source })?;

        let token = self.cancellation_token.clone();
        let task = token.child_token();
        tokio::spawn(async move {
            let _ = axum::serve(listener, self.router)
                .with_graceful_shutdown(async move { task.cancelled().await })
                .await;
        });

        Ok((actual_addr, token))
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The router with middleware, for in-process tests
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Environment;

    #[tokio::test]
    async fn server_creation() {
        let config = ServerConfig::for_testing();
        let server = Server::new(config, Api::new("test", "0.0.1"), ShutdownConfig::default());
        assert_eq!(server.config().environment, Environment::Testing);
        assert!(!server.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn programmatic_shutdown() {
        let config = ServerConfig::for_testing();
        let server = Server::new(config, Api::new("test", "0.0.1"), ShutdownConfig::default());

        assert!(!server.cancellation_token().is_cancelled());

        server.shutdown();

        assert!(server.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn shutdown_config_default() {
        let config = ShutdownConfig::default();
        assert_eq!(
            config.graceful_timeout,
            Duration::from_secs(DEFAULT_GRACEFUL_SHUTDOWN_TIMEOUT_SECONDS)
        );
        assert_eq!(
            config.force_timeout,
            Duration::from_secs(DEFAULT_FORCE_SHUTDOWN_TIMEOUT_SECONDS)
        );
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let server = Server::new(
            ServerConfig::for_testing(),
            Api::new("test", "0.0.1"),
            ShutdownConfig::default(),
        );
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health/liveness")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }
}
