//! # pricereshape - commodity price survey reshaping
//!
//! Turns a wide survey export (one row per submission, one column group per
//! commodity) into a long table with one row per submission and reported item.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV export │────▶│   Parser    │────▶│   Reshape   │────▶│  CSV / JSON │
//! │  (any enc.) │     │  (auto-enc) │     │  (catalog)  │     │   (sorted)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pricereshape::{process_file, to_csv_string, PipelineOptions};
//! use std::path::Path;
//!
//! let output = process_file(Path::new("survey.csv"), &PipelineOptions::default())?;
//! print!("{}", to_csv_string(&output.records)?);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Input rows and normalized output rows
//! - [`catalog`] - Item categories and their columns
//! - [`schema`] - Required source columns
//! - [`parser`] - CSV parsing with auto-detection
//! - [`reshape`] - Expansion, resolution, ordering and the pipeline
//! - [`sink`] - CSV and JSON output
//! - [`api`] - HTTP API server and log streaming

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod catalog;
pub mod schema;

// Parsing
pub mod parser;

// Reshaping
pub mod reshape;

// Output
pub mod sink;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CatalogError, CsvError, PipelineError, ReshapeError, SchemaError, ServerError, SinkError,
};

// =============================================================================
// Re-exports - Models and configuration
// =============================================================================

pub use catalog::{Catalog, ItemCategory};
pub use models::{NormalizedRecord, RawRecord, OUTPUT_COLUMNS};
pub use schema::SourceSchema;

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv,
    parse_csv_file, parse_csv_file_auto, ParseResult,
};

// =============================================================================
// Re-exports - Reshape
// =============================================================================

pub use reshape::{
    reshape, separate_rows, IdOrdering, ReshapeOptions, ReshapeOutcome, ReshapeStats, Reshaper,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use reshape::pipeline::{
    process_bytes, process_file, process_records, CsvInfo, PipelineOptions, PipelineOutput,
};

// =============================================================================
// Re-exports - Output
// =============================================================================

pub use sink::{render, to_csv_string, to_json_string, write_csv, OutputFormat};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CsvMetadata, ResponseMetadata, UploadResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
