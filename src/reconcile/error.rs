use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Error type covering the different failure cases that can occur while a
/// reconciliation run loads, matches, rewrites, or saves workbooks.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when the workbook package cannot be opened as a ZIP archive.
    #[error("workbook archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Raised when a package part contains malformed XML.
    #[error("workbook XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Raised when an XML attribute inside a package part is malformed.
    #[error("workbook XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Raised when the local geocoding base cannot be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a run configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when geocoding is requested but the template lacks the columns
    /// it reads from and writes to.
    #[error("required columns not found in header row: {}", missing.join(", "))]
    MissingGeoColumns { missing: Vec<String> },

    /// Raised by geocoding resolvers when a batch lookup fails.
    #[error("geocoder error: {0}")]
    Geocoder(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
