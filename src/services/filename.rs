//! Filename handling for uploaded documents.
//!
//! Two names are derived from the client-declared filename:
//! - a *display name*: Unicode-normalized, control characters removed,
//!   otherwise exactly what the user sent;
//! - a *storage key*: a sanitized, bounded `.pdf` name prefixed with a
//!   millisecond timestamp and a random salt, used as the on-disk file name.

use chrono::Utc;
use unicode_normalization::UnicodeNormalization;

/// Maximum number of characters kept from the sanitized base name.
pub const MAX_FILENAME_CHARS: usize = 200;

/// Base name used when nothing survives sanitization.
pub const FALLBACK_BASE_NAME: &str = "document";

/// Most filesystems cap a single path component at 255 bytes.
pub const MAX_STORAGE_KEY_BYTES: usize = 255;

const PDF_EXTENSION: &str = ".pdf";

/// Normalize a client-declared filename for display.
///
/// Applies NFC, drops ASCII control characters and trims surrounding
/// whitespace. Path separators and other filesystem-significant characters
/// are kept; this name is never used to address the blob store.
pub fn normalize_display_name(raw: &str) -> String {
    let normalized: String = raw.nfc().filter(|c| !c.is_ascii_control()).collect();
    normalized.trim().to_string()
}

/// Turn an arbitrary client filename into a safe `.pdf` file name.
///
/// The result is NFC-normalized, free of control characters, path
/// separators and traversal sequences, has single internal spaces, does not
/// start with `.` or whitespace, holds at most [`MAX_FILENAME_CHARS`]
/// characters before the extension and always ends in `.pdf`.
pub fn sanitize_filename(raw: &str) -> String {
    let normalized: String = raw.nfc().filter(|c| !c.is_ascii_control()).collect();
    let collapsed = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

    let options = sanitize_filename::Options {
        truncate: false,
        windows: true,
        replacement: "_",
    };
    let mut cleaned = sanitize_filename::sanitize_with_options(collapsed, options);
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }

    let visible = cleaned.trim_start_matches(is_dot_or_space);
    let truncated: String = visible.chars().take(MAX_FILENAME_CHARS).collect();
    let mut name = truncated.trim_end_matches(is_dot_or_space).to_string();
    if name.is_empty() {
        name = FALLBACK_BASE_NAME.to_string();
    }

    if !has_pdf_extension(&name) {
        name.push_str(PDF_EXTENSION);
    }
    name
}

fn is_dot_or_space(c: char) -> bool {
    c == '.' || c.is_whitespace()
}

/// Case-insensitive check for a trailing `.pdf`.
pub fn has_pdf_extension(name: &str) -> bool {
    name.len() >= PDF_EXTENSION.len()
        && name
            .get(name.len() - PDF_EXTENSION.len()..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION))
}

/// Derive a storage key of the form `{millis}-{salt}-{sanitized}`.
///
/// The salt carries 48 random bits, so keys minted in the same millisecond
/// do not collide in practice. Keys are never checked against the store.
/// When a long multi-byte name would push the key past
/// [`MAX_STORAGE_KEY_BYTES`], the name's stem is shortened on a character
/// boundary and the extension kept.
pub fn unique_storage_key(sanitized: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let salt = rand::random::<u64>() >> 16;
    let prefix = format!("{millis}-{salt:012x}-");
    let budget = MAX_STORAGE_KEY_BYTES.saturating_sub(prefix.len());
    format!("{prefix}{}", fit_to_bytes(sanitized, budget))
}

fn fit_to_bytes(name: &str, budget: usize) -> String {
    if name.len() <= budget {
        return name.to_string();
    }

    let (stem, ext) = if has_pdf_extension(name) {
        name.split_at(name.len() - PDF_EXTENSION.len())
    } else {
        (name, "")
    };
    let stem_budget = budget.saturating_sub(ext.len());

    let mut end = 0;
    for (idx, ch) in stem.char_indices() {
        if idx + ch.len_utf8() > stem_budget {
            break;
        }
        end = idx + ch.len_utf8();
    }

    let stem = stem[..end].trim_end_matches(is_dot_or_space);
    if stem.is_empty() {
        format!("{FALLBACK_BASE_NAME}{ext}")
    } else {
        format!("{stem}{ext}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_safe(name: &str) {
        assert!(has_pdf_extension(name), "{name:?} lacks .pdf");
        let first = name.chars().next().unwrap();
        assert!(first != '.' && !first.is_whitespace(), "{name:?} starts badly");
        assert!(!name.chars().any(|c| c.is_ascii_control()), "{name:?}");
        assert!(!name.contains('/') && !name.contains('\\'), "{name:?}");
        assert!(!name.contains(".."), "{name:?}");
        assert!(name.chars().count() <= MAX_FILENAME_CHARS + PDF_EXTENSION.len());
    }

    #[test]
    fn keeps_ordinary_pdf_names() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("Annual Report.PDF"), "Annual Report.PDF");
    }

    #[test]
    fn appends_missing_extension() {
        assert_eq!(sanitize_filename("notes.txt"), "notes.txt.pdf");
        assert_eq!(sanitize_filename("scan"), "scan.pdf");
    }

    #[test]
    fn empty_input_uses_fallback() {
        assert_eq!(sanitize_filename(""), "document.pdf");
        assert_eq!(sanitize_filename("   \t\n"), "document.pdf");
        assert_eq!(sanitize_filename("\u{0}\u{1f}\u{7f}"), "document.pdf");
    }

    #[test]
    fn strips_path_traversal_and_separators() {
        for raw in [
            "../../etc/passwd",
            "..\\..\\windows\\system32.pdf",
            "/absolute/path/file.pdf",
            "a/../b.pdf",
            "....pdf",
        ] {
            assert_safe(&sanitize_filename(raw));
        }
    }

    #[test]
    fn removes_leading_dots_and_whitespace() {
        assert_eq!(sanitize_filename(".hidden.pdf"), "hidden.pdf");
        assert_eq!(sanitize_filename("   spaced.pdf"), "spaced.pdf");
        assert_safe(&sanitize_filename(". . .pdf"));
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(sanitize_filename("a   b \t c.pdf"), "a b c.pdf");
    }

    #[test]
    fn drops_control_characters() {
        assert_eq!(sanitize_filename("inv\u{0}oi\u{7}ce.pdf"), "invoice.pdf");
    }

    #[test]
    fn truncates_long_names() {
        let long = "x".repeat(500);
        let name = sanitize_filename(&long);
        assert_eq!(name.chars().count(), MAX_FILENAME_CHARS + PDF_EXTENSION.len());
        assert_safe(&name);
    }

    #[test]
    fn normalizes_to_nfc() {
        let decomposed = "Re\u{301}sume\u{301}.pdf";
        assert_eq!(sanitize_filename(decomposed), "R\u{e9}sum\u{e9}.pdf");
        assert_eq!(normalize_display_name(decomposed), "R\u{e9}sum\u{e9}.pdf");
    }

    #[test]
    fn display_name_keeps_user_characters() {
        assert_eq!(
            normalize_display_name("  Résumé (final).pdf \n"),
            "Résumé (final).pdf"
        );
        assert_eq!(normalize_display_name("a/b.pdf"), "a/b.pdf");
    }

    #[test]
    fn sanitized_output_is_always_safe() {
        for raw in [
            "",
            ".",
            "..",
            " . ",
            "CON",
            "name.with.dots",
            "tab\tinside.pdf",
            "<>:\"|?*.pdf",
            "日本語のファイル",
            "trailing dot.",
        ] {
            assert_safe(&sanitize_filename(raw));
        }
    }

    #[test]
    fn storage_key_has_timestamp_salt_and_name() {
        let key = unique_storage_key("report.pdf");
        let mut parts = key.splitn(3, '-');
        let millis = parts.next().unwrap();
        let salt = parts.next().unwrap();
        let name = parts.next().unwrap();

        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(salt.len(), 12);
        assert!(salt.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(name, "report.pdf");
    }

    #[test]
    fn storage_keys_differ_for_the_same_name() {
        let keys: std::collections::HashSet<_> =
            (0..256).map(|_| unique_storage_key("same.pdf")).collect();
        assert_eq!(keys.len(), 256);
    }

    #[test]
    fn storage_key_respects_byte_limit() {
        let sanitized = sanitize_filename(&"é".repeat(300));
        let key = unique_storage_key(&sanitized);
        assert!(key.len() <= MAX_STORAGE_KEY_BYTES);
        assert!(has_pdf_extension(&key));
    }
}
