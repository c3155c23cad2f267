// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Pet store server

use std::sync::Arc;

use anyhow::{Context as _, Result};
use pet_store::{JwtKeys, PetService};
use rest::{Server, ServerConfig, ShutdownConfig, health::Binary};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const JWT_SECRET_VAR: &str = "PET_STORE_JWT_SECRET";

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pet store");

    let config = ServerConfig::from_env()?;
    let secret = std::env::var(JWT_SECRET_VAR)
        .with_context(|| format!("{JWT_SECRET_VAR} must be set"))?;

    let service = Arc::new(PetService::new(
        JwtKeys::new(secret.as_bytes()),
        config.problem_type_base.clone(),
    ));
    let ready = Binary::new(true);
    let api = pet_store::api(&service, &config.openapi)?.readiness(ready.clone());

    let server = Server::new(config, api, ShutdownConfig::default());

    // Stop advertising readiness as soon as shutdown begins
    let shutdown = server.cancellation_token();
    tokio::spawn(async move {
        shutdown.cancelled().await;
        ready.mark_unhealthy();
    });

    // NOTE: the `#[tokio::main]` task does not run a worker future, we must spawn
    tokio::spawn(async move { server.run().await }).await??;

    Ok(())
}
