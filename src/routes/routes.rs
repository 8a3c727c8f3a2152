//! Defines routes for the document API.
//!
//! ## Structure
//! - `POST   /api/documents/upload` — multipart upload (field `document`)
//! - `GET    /api/documents`        — list documents, newest first
//! - `GET    /api/documents/{id}`   — download a document
//! - `DELETE /api/documents/{id}`   — delete a document
//! - `GET    /healthz`, `/readyz`   — probes

use crate::{
    handlers::{
        document_handlers::{
            delete_document, download_document, list_documents, upload_document,
        },
        health_handlers::{healthz, readyz},
    },
    services::document_service::DocumentService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. Handlers share a `DocumentService` as state.
///
/// The request body limit is lifted on the upload route; the ingestion
/// pipeline enforces its own streaming cap instead.
pub fn routes() -> Router<DocumentService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/api/documents/upload",
            post(upload_document).layer(DefaultBodyLimit::disable()),
        )
        .route("/api/documents", get(list_documents))
        .route(
            "/api/documents/{id}",
            get(download_document).delete(delete_document),
        )
}
