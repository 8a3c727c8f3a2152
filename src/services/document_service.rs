//! src/services/document_service.rs
//!
//! DocumentService — the upload pipeline plus the list, download and delete
//! paths, built on [`RecordStore`] for metadata and [`BlobStore`] for bytes.
//!
//! An upload moves through
//! `Received -> TypeChecked -> Stored -> Verified -> Recorded`. Every step
//! can fail, and the steps after a blob exists remove that blob before
//! returning so no orphan outlives a failed upload.

use crate::{
    models::document::{Document, NewDocument},
    services::{
        blob_store::{BlobRemoval, BlobStore, BlobWriteError},
        content_verifier, filename,
        record_store::RecordStore,
    },
};
use bytes::Bytes;
use futures::Stream;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs::File;
use tracing::{debug, error, info, warn};

/// Default upload cap: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("No file uploaded")]
    NoFileProvided,
    #[error("Only PDF files are allowed (declared content type `{0}`)")]
    UnsupportedMediaType(String),
    #[error("File too large. Maximum size is {limit} bytes")]
    FileTooLarge { limit: u64 },
    #[error("Uploaded file is not a valid PDF")]
    NotAPdf,
    #[error("Upload was interrupted: {0}")]
    UploadInterrupted(#[source] io::Error),
    #[error("record store error: {0}")]
    RecordStore(#[source] sqlx::Error),
    #[error("blob store error: {0}")]
    BlobStore(#[source] io::Error),
    #[error("document {0} not found")]
    DocumentNotFound(i64),
    #[error("file for document {0} is missing from storage")]
    BlobMissing(i64),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// What the client declared about the uploaded file part.
#[derive(Debug, Clone, Default)]
pub struct IncomingUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// An opened blob ready to be streamed back to the client.
#[derive(Debug)]
pub struct DocumentDownload {
    pub document: Document,
    pub file: File,
    pub size_bytes: u64,
}

/// DocumentService owns the two stores and the upload size cap.
///
/// Both stores are injected at startup; clones share the same pool.
#[derive(Clone)]
pub struct DocumentService {
    records: RecordStore,
    blobs: BlobStore,
    max_upload_bytes: u64,
}

impl DocumentService {
    pub fn new(records: RecordStore, blobs: BlobStore, max_upload_bytes: u64) -> Self {
        Self {
            records,
            blobs,
            max_upload_bytes,
        }
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Run an upload through the ingestion pipeline.
    ///
    /// - Rejects a declared content type other than `application/pdf`
    ///   before any byte is written.
    /// - Streams the body to a salted storage key, aborting past the cap.
    /// - Checks the stored bytes for the PDF header.
    /// - Records the row; if that fails the blob is removed again.
    pub async fn ingest<S>(&self, upload: IncomingUpload, stream: S) -> DocumentResult<Document>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        if !content_verifier::is_declared_pdf(upload.content_type.as_deref()) {
            let declared = upload
                .content_type
                .unwrap_or_else(|| "unspecified".to_string());
            warn!(content_type = %declared, "rejected upload with non-PDF content type");
            return Err(DocumentError::UnsupportedMediaType(declared));
        }

        let raw_name = upload.file_name.as_deref().unwrap_or_default();
        let sanitized = filename::sanitize_filename(raw_name);
        let storage_key = filename::unique_storage_key(&sanitized);
        let display_name = match filename::normalize_display_name(raw_name) {
            name if name.is_empty() => sanitized,
            name => name,
        };

        let blob = match self
            .blobs
            .write_capped(&storage_key, stream, self.max_upload_bytes)
            .await
        {
            Ok(blob) => blob,
            Err(BlobWriteError::TooLarge { limit }) => {
                warn!(storage_key = %storage_key, limit, "rejected oversized upload");
                return Err(DocumentError::FileTooLarge { limit });
            }
            Err(BlobWriteError::Stream(err)) => {
                warn!(storage_key = %storage_key, error = %err, "upload body failed mid-stream");
                return Err(DocumentError::UploadInterrupted(err));
            }
            Err(BlobWriteError::Io(err)) => {
                error!(storage_key = %storage_key, error = %err, "failed to store upload");
                return Err(DocumentError::BlobStore(err));
            }
        };

        if !content_verifier::has_pdf_header(&blob.location).await {
            warn!(storage_key = %storage_key, "rejected upload without PDF header");
            self.discard_blob(&blob.location, "verification failed").await;
            return Err(DocumentError::NotAPdf);
        }

        let new_document = NewDocument {
            storage_key,
            display_name,
            blob_location: blob.location.to_string_lossy().into_owned(),
            size_bytes: i64::try_from(blob.size_bytes).unwrap_or(i64::MAX),
        };

        match self.records.insert(&new_document).await {
            Ok(document) => {
                info!(
                    document_id = document.id,
                    storage_key = %document.filename,
                    size_bytes = document.filesize,
                    "document uploaded"
                );
                Ok(document)
            }
            Err(err) => {
                error!(
                    storage_key = %new_document.storage_key,
                    error = %err,
                    "failed to record upload"
                );
                self.discard_blob(&blob.location, "record insert failed")
                    .await;
                Err(DocumentError::RecordStore(err))
            }
        }
    }

    /// Compensating delete for a blob whose upload did not complete.
    /// Failure is logged and the orphan left in place.
    async fn discard_blob(&self, location: &Path, reason: &str) {
        if let Err(err) = self.blobs.delete(location).await {
            error!(
                path = %location.display(),
                reason,
                error = %err,
                "failed to remove blob; orphan left in storage"
            );
        }
    }

    /// Every document, newest first.
    pub async fn list(&self) -> DocumentResult<Vec<Document>> {
        self.records.list().await.map_err(DocumentError::RecordStore)
    }

    pub async fn find(&self, id: i64) -> DocumentResult<Document> {
        self.records
            .fetch(id)
            .await
            .map_err(DocumentError::RecordStore)?
            .ok_or(DocumentError::DocumentNotFound(id))
    }

    /// Look up a document and open its blob.
    ///
    /// A row whose blob is gone is reported as `BlobMissing`, not repaired.
    pub async fn open_download(&self, id: i64) -> DocumentResult<DocumentDownload> {
        let document = self.find(id).await?;
        let location = PathBuf::from(&document.filepath);

        match self.blobs.open(&location).await {
            Ok((file, size_bytes)) => Ok(DocumentDownload {
                document,
                file,
                size_bytes,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    document_id = id,
                    path = %location.display(),
                    "document row exists but its file is missing"
                );
                Err(DocumentError::BlobMissing(id))
            }
            Err(err) => Err(DocumentError::BlobStore(err)),
        }
    }

    /// Delete a document: the blob best-effort, then the row.
    ///
    /// The row is authoritative. A blob that is already gone or cannot be
    /// removed does not stop the row from being deleted.
    pub async fn delete(&self, id: i64) -> DocumentResult<Document> {
        let document = self.find(id).await?;
        let location = Path::new(&document.filepath);

        match self.blobs.delete(location).await {
            Ok(BlobRemoval::Removed) => {}
            Ok(BlobRemoval::AlreadyAbsent) => {
                debug!(document_id = id, "blob was already absent");
            }
            Err(err) => {
                error!(
                    document_id = id,
                    path = %location.display(),
                    error = %err,
                    "failed to remove blob; deleting record anyway"
                );
            }
        }

        let deleted = self
            .records
            .delete(id)
            .await
            .map_err(DocumentError::RecordStore)?;
        if !deleted {
            // Removed concurrently between lookup and delete.
            return Err(DocumentError::DocumentNotFound(id));
        }

        info!(document_id = id, storage_key = %document.filename, "document deleted");
        Ok(document)
    }
}
