// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Health monitors backing `/health/readiness` and `/health/liveness`

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};

/// Source of a health verdict
pub trait Monitor: Send + Sync + 'static {
    /// Whether the service is healthy right now
    fn healthy(&self) -> BoxFuture<'_, bool>;
}

/// Always healthy; the default for both probes
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl Monitor for Always {
    fn healthy(&self) -> BoxFuture<'_, bool> {
        futures::future::ready(true).boxed()
    }
}

/// Monitor flipped by the application
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct Binary {
    healthy: Arc<AtomicBool>,
}

impl Binary {
    /// Monitor starting in the given state
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy: Arc::new(AtomicBool::new(healthy)),
        }
    }

    /// Report healthy from now on
    pub fn mark_healthy(&self) {
        self.healthy.store(true, Ordering::Release);
    }

    /// Report unhealthy from now on
    pub fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::Release);
    }
}

impl Default for Binary {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Monitor for Binary {
    fn healthy(&self) -> BoxFuture<'_, bool> {
        futures::future::ready(self.healthy.load(Ordering::Acquire)).boxed()
    }
}

/// Healthy when both monitors are
#[derive(Debug, Clone)]
pub struct And<A, B>(pub A, pub B);

impl<A: Monitor, B: Monitor> Monitor for And<A, B> {
    fn healthy(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.0.healthy().await && self.1.healthy().await })
    }
}

/// Healthy when either monitor is
#[derive(Debug, Clone)]
pub struct Or<A, B>(pub A, pub B);

impl<A: Monitor, B: Monitor> Monitor for Or<A, B> {
    fn healthy(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move { self.0.healthy().await || self.1.healthy().await })
    }
}

/// Body of a probe response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving
    Up,
    /// Not serving
    Down,
}

#[derive(Serialize)]
struct ProbeBody {
    status: HealthStatus,
}

/// Answer a probe: 200 when healthy, 503 otherwise
pub(crate) async fn probe(monitor: &dyn Monitor) -> Response {
    let (code, status) = if monitor.healthy().await {
        (StatusCode::OK, HealthStatus::Up)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, HealthStatus::Down)
    };
    (code, Json(ProbeBody { status })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn binary_toggles_probe() {
        let monitor = Binary::default();
        let response = probe(&monitor).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, serde_json::json!({"status": "up"}));

        let shared = monitor.clone();
        shared.mark_unhealthy();
        let response = probe(&monitor).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body(response).await, serde_json::json!({"status": "down"}));

        shared.mark_healthy();
        assert_eq!(probe(&monitor).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn combinators() {
        let up = Binary::new(true);
        let down = Binary::new(false);

        assert!(!And(up.clone(), down.clone()).healthy().await);
        assert!(And(up.clone(), Always).healthy().await);
        assert!(Or(up.clone(), down.clone()).healthy().await);
        assert!(!Or(down.clone(), Binary::new(false)).healthy().await);
    }
}
