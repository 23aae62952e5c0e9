//! Error types for the price reshaping pipeline.
//!
//! - [`CsvError`] - reading and decoding the survey export
//! - [`CatalogError`] - item category registry problems
//! - [`SchemaError`] - required source columns missing from the export
//! - [`ReshapeError`] - failures of the wide-to-long reshape itself
//! - [`SinkError`] - writing normalized records out
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP layer
//!
//! Conversions are `From` based so `?` works across boundaries.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors while reading the survey export.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode the bytes with the detected encoding.
    #[error("Failed to decode content: {0}")]
    EncodingError(String),

    /// Malformed CSV content.
    #[error("Line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// Input is not CSV (e.g. an XLSX workbook).
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
}

impl CsvError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        CsvError::ParseError {
            line,
            message: message.into(),
        }
    }
}

// =============================================================================
// Catalog Errors
// =============================================================================

/// Errors from the item category registry.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two categories share a code.
    #[error("Duplicate item code {0}")]
    DuplicateCode(u32),

    /// Two categories share a name.
    #[error("Duplicate item name '{0}'")]
    DuplicateName(String),

    /// Code 0 is reserved for unmatched tokens.
    #[error("Item '{0}' must have a code of at least 1")]
    ReservedCode(String),

    /// Category name is blank.
    #[error("Item with code {0} has an empty name")]
    EmptyName(u32),

    /// IO error.
    #[error("Catalog IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Catalog JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Schema Errors
// =============================================================================

/// Required columns are absent from the export header.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Missing required column(s): {}", .missing.join(", "))]
pub struct SchemaError {
    /// Every missing column, in schema order.
    pub missing: Vec<String>,
}

// =============================================================================
// Reshape Errors
// =============================================================================

/// Errors that abort a reshape. Per-row anomalies are never errors.
#[derive(Debug, Error)]
pub enum ReshapeError {
    /// The export lacks required columns.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// An item filter names a category the catalog does not know.
    #[error("Unknown item '{0}' in item filter")]
    UnknownItem(String),

    /// The progress callback asked to stop.
    #[error("Reshape cancelled after {processed} rows")]
    Cancelled { processed: usize },
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors while serializing normalized records.
#[derive(Debug, Error)]
pub enum SinkError {
    /// CSV writer error.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("Write error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Writer produced invalid UTF-8.
    #[error("Output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::reshape::pipeline::process_file`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Catalog error.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Reshape error.
    #[error("Reshape error: {0}")]
    Reshape(#[from] ReshapeError),

    /// Output error.
    #[error("Output error: {0}")]
    Sink(#[from] SinkError),
}

impl From<SchemaError> for PipelineError {
    fn from(err: SchemaError) -> Self {
        PipelineError::Reshape(ReshapeError::Schema(err))
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type for reshape operations.
pub type ReshapeResult<T> = Result<T, ReshapeError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
