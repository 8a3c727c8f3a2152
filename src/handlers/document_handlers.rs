//! HTTP handlers for document upload, listing, download and deletion.
//! Upload bodies are streamed straight into the pipeline and downloads are
//! streamed from disk, so neither is buffered in memory.

use crate::{
    errors::AppError,
    models::document::Document,
    services::document_service::{DocumentError, DocumentService, IncomingUpload},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Serialize;
use std::io;
use tokio_util::io::ReaderStream;

/// Multipart field carrying the PDF.
pub const DOCUMENT_FIELD: &str = "document";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: i64,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    pub filesize: i64,
    pub message: String,
}

impl From<Document> for UploadResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename,
            original_filename: doc.original_filename,
            filesize: doc.filesize,
            message: "File uploaded successfully".into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// `POST /api/documents/upload` — multipart upload of one PDF.
///
/// The first file part named `document` is ingested; other parts are
/// skipped. A part with an empty filename is what a browser sends when no
/// file was picked, so it does not count. A request without such a part is
/// rejected.
pub async fn upload_document(
    State(service): State<DocumentService>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(DOCUMENT_FIELD) || field.file_name().is_none_or(str::is_empty) {
            continue;
        }

        let upload = IncomingUpload {
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
        };
        let stream = field.map(|chunk| chunk.map_err(io::Error::other));

        let document = service.ingest(upload, stream).await?;
        return Ok((StatusCode::CREATED, Json(UploadResponse::from(document))));
    }

    Err(DocumentError::NoFileProvided.into())
}

/// `GET /api/documents` — all documents, newest first.
pub async fn list_documents(
    State(service): State<DocumentService>,
) -> Result<Json<Vec<Document>>, AppError> {
    Ok(Json(service.list().await?))
}

/// `GET /api/documents/{id}` — stream the PDF back under its display name.
pub async fn download_document(
    State(service): State<DocumentService>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let download = service.open_download(id).await?;
    let body = Body::from_stream(ReaderStream::new(download.file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_download_headers(
        response.headers_mut(),
        download.document.display_name(),
        download.size_bytes,
    );

    Ok(response)
}

/// `DELETE /api/documents/{id}`
pub async fn delete_document(
    State(service): State<DocumentService>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    service.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "Document deleted successfully".into(),
    }))
}

fn set_download_headers(headers: &mut HeaderMap, display_name: &str, size_bytes: u64) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size_bytes));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(display_name))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987
/// `filename*` carrying the exact UTF-8 name.
fn content_disposition(display_name: &str) -> String {
    let fallback: String = display_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(display_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_names_pass_through() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
    }

    #[test]
    fn unicode_names_get_encoded_parameter() {
        let value = content_disposition("Résumé (final).pdf");
        assert!(value.contains("filename=\"R_sum_ (final).pdf\""));
        assert!(value.contains("filename*=UTF-8''R%C3%A9sum%C3%A9%20%28final%29.pdf"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn quotes_cannot_break_out_of_the_parameter() {
        let value = content_disposition("a\"b\\c.pdf");
        assert!(value.starts_with("attachment; filename=\"a_b_c.pdf\";"));
    }
}
