//! Error types for the wp2latex library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Wp2LatexError`] is **fatal**: the conversion cannot proceed at all
//!   (missing export file, malformed XML, media archive not a directory,
//!   output not writable). Returned as `Err(Wp2LatexError)` from the
//!   top-level `convert*` functions.
//!
//! * [`FigureError`] is **non-fatal**: a single image reference or gallery
//!   entry could not be turned into a figure. The marker is dropped from
//!   the output, the error is stored in [`crate::output::PostResult`] and
//!   the rest of the post (and the document) is rendered as usual.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the wp2latex library.
///
/// Reference-level failures use [`FigureError`] and are stored in
/// [`crate::output::PostResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Wp2LatexError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Export file was not found at the given path.
    #[error("WordPress export not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The export is not well-formed XML.
    #[error("Malformed WordPress export at byte {position}: {detail}")]
    MalformedXml { position: u64, detail: String },

    /// The XML parsed, but it has no `<channel>` and cannot be a WXR file.
    #[error("Not a WordPress export: no <channel> element found")]
    NotAnExport,

    /// The configured media archive is missing or not a directory.
    #[error("Media archive '{path}' does not exist or is not a directory")]
    MediaArchiveMissing { path: PathBuf },

    // ── Download errors ───────────────────────────────────────────────────
    /// The HTTP client could not be constructed.
    #[error("Failed to set up attachment download: {0}")]
    DownloadSetup(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output LaTeX file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A non-fatal error for a single image reference or gallery entry.
///
/// Stored in [`crate::output::PostResult::warnings`]. The offending marker
/// is removed from the body; every other figure in the post is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum FigureError {
    /// The marker matched but carries no usable `src` attribute.
    #[error("Image marker without a source URL: {marker}")]
    MalformedMarker { marker: String },

    /// No file in the media archive matches the URL's file name.
    #[error("No file named '{file_name}' in the media archive (from {url})")]
    Unresolved { url: String, file_name: String },

    /// The file vanished or could not be opened.
    #[error("Image file not found: '{path}'")]
    ImageNotFound { path: PathBuf },

    /// Neither the header reader nor the JPEG fallback produced dimensions.
    #[error("Could not read dimensions of '{path}': {detail}")]
    ProbeFailed { path: PathBuf, detail: String },

    /// A gallery shortcode lists an ID that is not an attachment.
    #[error("Gallery ID {id} does not match any attachment")]
    UnknownAttachment { id: String },

    /// Images were found but no media archive is configured.
    #[error("Gallery ignored: no media archive configured")]
    NoMediaArchive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_display() {
        let e = FigureError::Unresolved {
            url: "http://assets.example/img/a.jpg".into(),
            file_name: "a.jpg".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("a.jpg"), "got: {msg}");
        assert!(msg.contains("http://assets.example/img/a.jpg"));
    }

    #[test]
    fn malformed_xml_display() {
        let e = Wp2LatexError::MalformedXml {
            position: 42,
            detail: "unexpected end".into(),
        };
        assert!(e.to_string().contains("byte 42"));
    }

    #[test]
    fn unknown_attachment_display() {
        let e = FigureError::UnknownAttachment { id: "17".into() };
        assert!(e.to_string().contains("17"));
    }

    #[test]
    fn figure_error_serialises() {
        let e = FigureError::ImageNotFound {
            path: PathBuf::from("/tmp/missing.png"),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("ImageNotFound"));
    }
}
