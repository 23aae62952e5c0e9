//! REST API types.
//!
//! Records are returned with the same keys as the CSV output headers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::NormalizedRecord;
use crate::reshape::pipeline::{format_delimiter, PipelineOutput};
use crate::reshape::{IdOrdering, ReshapeOptions, ReshapeStats};

/// Response sent after an upload is reshaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready" when every item became a row, "warning" when some were dropped
    pub status: String,

    pub records: Vec<NormalizedRecord>,

    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_records: usize,
    pub csv_info: CsvMetadata,
    pub stats: ReshapeStats,
    pub ordering: IdOrdering,
    pub processed_at: DateTime<Utc>,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Query string accepted by the upload and download endpoints.
///
/// `item` is a comma-separated list of category names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReshapeQuery {
    pub dedup: bool,
    pub skip_incomplete: bool,
    pub item: Option<String>,
    pub delimiter: Option<char>,
}

impl ReshapeQuery {
    pub fn reshape_options(&self) -> ReshapeOptions {
        ReshapeOptions {
            dedup: self.dedup,
            skip_incomplete: self.skip_incomplete,
            items: self
                .item
                .as_deref()
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

impl From<PipelineOutput> for UploadResponse {
    fn from(output: PipelineOutput) -> Self {
        let status = if output.stats.dropped() == 0 && output.stats.incomplete_rows == 0 {
            "ready"
        } else {
            "warning"
        };

        UploadResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            metadata: ResponseMetadata {
                total_records: output.records.len(),
                csv_info: CsvMetadata {
                    encoding: output.csv_info.encoding,
                    delimiter: format_delimiter(output.csv_info.delimiter),
                    row_count: output.csv_info.row_count,
                    columns: output.csv_info.headers,
                },
                stats: output.stats,
                ordering: output.ordering,
                processed_at: Utc::now(),
            },
            records: output.records,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "records": [],
        "metadata": {
            "totalRecords": 0,
            "processedAt": Utc::now(),
        }
    })
}
