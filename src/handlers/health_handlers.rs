//! Liveness and readiness probes.

use crate::services::document_service::DocumentService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::BTreeMap, fmt::Display};
use tracing::warn;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Debug, Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn from_result<E: Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                error: None,
            },
            Err(err) => Self {
                ok: false,
                error: Some(err.to_string()),
            },
        }
    }
}

/// `GET /healthz`: always 200, no I/O.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// `GET /readyz`
///
/// Pings the record store and round-trips a marker file through the blob
/// directory. 200 when both succeed, 503 otherwise.
pub async fn readyz(State(service): State<DocumentService>) -> impl IntoResponse {
    let (records, blobs) = tokio::join!(service.records().ping(), service.blobs().probe());

    let checks = BTreeMap::from([
        ("record_store", CheckStatus::from_result(records)),
        ("blob_store", CheckStatus::from_result(blobs)),
    ]);

    if checks.values().all(|check| check.ok) {
        let body = ReadyResponse {
            status: "ok",
            checks,
        };
        return (StatusCode::OK, Json(body));
    }

    warn!(?checks, "readiness check failed");
    let body = ReadyResponse {
        status: "error",
        checks,
    };
    (StatusCode::SERVICE_UNAVAILABLE, Json(body))
}
