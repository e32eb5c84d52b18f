//! Filename validation and sanitization
//!
//! Filenames double as record keys in the metadata index and as path
//! components on disk, so they are validated on upload and sanitized before
//! anything touches the filesystem.

use crate::constants::ALLOWED_EXTENSIONS;

/// Whether a filename is acceptable as-is: has an allowed extension and
/// contains only characters that are safe as a single path component.
pub fn is_safe_filename(name: &str) -> bool {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return false;
    };
    if stem.is_empty() {
        return false;
    }
    if !ALLOWED_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
    {
        return false;
    }
    name.chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | ',' | '-' | '.' | ' '))
}

/// Collapse every run of characters outside `[A-Za-z0-9_\-. ]` into a single
/// underscore. Path separators and traversal sequences cannot survive this.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_bad_run = false;
    for c in name.chars() {
        if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ' ') {
            out.push(c);
            in_bad_run = false;
        } else if !in_bad_run {
            out.push('_');
            in_bad_run = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_allowed_extensions() {
        assert!(is_safe_filename("report.pdf"));
        assert!(is_safe_filename("draft v2.docx"));
        assert!(is_safe_filename("bundle.ZIP"));
        assert!(is_safe_filename("notes, final.pdf"));
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(!is_safe_filename("report"));
        assert!(!is_safe_filename(".pdf"));
        assert!(!is_safe_filename("script.exe"));
        assert!(!is_safe_filename("../../etc/passwd.pdf"));
        assert!(!is_safe_filename("a/b.pdf"));
        assert!(!is_safe_filename("quote\".pdf"));
    }

    #[test]
    fn test_sanitize_collapses_runs() {
        assert_eq!(sanitize_filename("a/../b.pdf"), "a_.._b.pdf");
        assert_eq!(sanitize_filename("weird<<>>name.docx"), "weird_name.docx");
        assert_eq!(sanitize_filename("clean-name_1.zip"), "clean-name_1.zip");
    }

    #[test]
    fn test_sanitize_strips_separators() {
        let s = sanitize_filename("..\\..\\boot.ini");
        assert!(!s.contains('\\'));
        assert!(!s.contains('/'));
    }
}
