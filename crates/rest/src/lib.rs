// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! `OpenAPI` 3 driven HTTP services
//!
//! Operations are declared once and both documented and served from that
//! declaration. A request to an operation flows through parameter injection,
//! validation and authentication interceptors into a typed handler, and every
//! failure on the way is rendered by one error handler.
//!
//! # Module Structure
//!
//! - [`path`]: URL templates with typed placeholders
//! - [`param`]: Parameter declarations, injection and validation
//! - [`security`]: Security schemes and bearer token verification
//! - [`handler`]: Typed handler contract and per media type adapters
//! - [`interceptor`]: Interceptor chain with panic isolation
//! - [`operation`]: Operation assembly
//! - [`api`]: Router, served document and framework endpoints
//! - [`error`] and [`problem`]: Error taxonomy and RFC 7807 rendering
//! - [`health`]: Readiness and liveness monitors
//! - [`config`] and [`server`]: Configuration loading and server lifecycle
//! - [`metrics`]: Prometheus operation metrics
//!
//! # Example
//!
//! ```ignore
//! async fn echo(_ctx: Context, pet: Pet) -> rest::Result<Pet> {
//!     Ok(pet)
//! }
//!
//! let api = Api::new("pets", "1.0.0")
//!     .with(Operation::post(Path::base("/echo"), handle_json(echo)))?;
//! Server::new(ServerConfig::from_env()?, api, ShutdownConfig::default())
//!     .run()
//!     .await?;
//! ```

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod health;
pub mod interceptor;
pub mod metrics;
pub mod openapi;
pub mod operation;
pub mod param;
pub mod path;
pub mod problem;
pub mod security;
pub mod server;

pub use api::Api;
pub use config::{Environment, ServerConfig};
pub use context::Context;
pub use error::{Error, RegistrationError, Result};
pub use operation::Operation;
pub use param::Param;
pub use path::Path;
pub use problem::{HasProblemDetail, ProblemDetail, ProblemDetailsHandler};
pub use server::{Server, ServerError, ServerResult, ShutdownConfig};
