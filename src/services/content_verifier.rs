//! PDF content checks.
//!
//! The declared content type is only a cheap pre-filter. The authoritative
//! check reads the first bytes of the stored blob and compares them to the
//! PDF magic bytes.

use std::path::Path;
use tokio::{fs::File, io::AsyncReadExt};
use tracing::debug;

/// Leading bytes of every PDF file.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// MIME type uploads must declare.
pub const PDF_MIME: &str = "application/pdf";

/// Return true if the client-declared content type is `application/pdf`.
///
/// Parameters (`; charset=...`) are ignored and the comparison is
/// case-insensitive.
pub fn is_declared_pdf(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .is_some_and(|mime| mime.eq_ignore_ascii_case(PDF_MIME))
}

/// Return true if the file at `path` starts with [`PDF_MAGIC`].
///
/// Any I/O failure, including a file shorter than four bytes, counts as a
/// failed verification.
pub async fn has_pdf_header(path: &Path) -> bool {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "cannot open blob for verification");
            return false;
        }
    };

    let mut header = [0u8; 4];
    match file.read_exact(&mut header).await {
        Ok(_) => &header == PDF_MAGIC,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "cannot read blob header");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    #[tokio::test]
    async fn accepts_pdf_header() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ok.pdf", b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n").await;
        assert!(has_pdf_header(&path).await);
    }

    #[tokio::test]
    async fn accepts_bare_magic() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bare.pdf", b"%PDF").await;
        assert!(has_pdf_header(&path).await);
    }

    #[tokio::test]
    async fn rejects_other_content() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "fake.pdf", b"\x89PNG\r\n\x1a\n").await;
        assert!(!has_pdf_header(&path).await);
    }

    #[tokio::test]
    async fn short_or_missing_files_fail_verification() {
        let dir = TempDir::new().unwrap();
        let short = write(&dir, "short.pdf", b"%PD").await;
        let empty = write(&dir, "empty.pdf", b"").await;
        assert!(!has_pdf_header(&short).await);
        assert!(!has_pdf_header(&empty).await);
        assert!(!has_pdf_header(&dir.path().join("missing.pdf")).await);
    }

    #[test]
    fn declared_type_prefilter() {
        assert!(is_declared_pdf(Some("application/pdf")));
        assert!(is_declared_pdf(Some("Application/PDF; charset=binary")));
        assert!(!is_declared_pdf(Some("application/octet-stream")));
        assert!(!is_declared_pdf(Some("text/plain")));
        assert!(!is_declared_pdf(None));
    }
}
