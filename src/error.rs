//! Error types for carbonfill library.

use std::io;
use thiserror::Error;

/// Result type alias for carbonfill operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading data, expanding a template
/// or writing the finished report.
///
/// Nothing raised inside template expansion itself is fatal: backend
/// failures there are logged and the affected section is omitted. These
/// variants surface from the edges (input data, package I/O).
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The office package is not a readable zip archive.
    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A package part is not well-formed XML.
    #[error("XML parsing error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The package is a valid archive but lacks required parts.
    #[error("Invalid document package: {0}")]
    Package(String),

    /// Input data failed structural validation.
    #[error("Invalid report data: {0}")]
    InvalidData(String),

    /// Input data or a model dump could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A chart could not be rasterized.
    #[error("Chart rendering error: {0}")]
    Chart(String),

    /// Error during rendering (JSON dump, table construction).
    #[error("Rendering error: {0}")]
    Render(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Chart(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Package("missing word/document.xml".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid document package: missing word/document.xml"
        );

        let err = Error::InvalidData("no ORG root".to_string());
        assert_eq!(err.to_string(), "Invalid report data: no ORG root");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "template.docx");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
