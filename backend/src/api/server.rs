//! HTTP server for the reshape API.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                               |
//! |--------|-------------------|-------------------------------------------|
//! | GET    | `/health`         | Health check                              |
//! | POST   | `/api/upload`     | Upload a survey export, get JSON records  |
//! | POST   | `/api/download`   | Upload a survey export, get the CSV file  |
//! | GET    | `/api/logs`       | SSE stream for real-time logs             |
//!
//! Upload endpoints take the file in the multipart field `file` and accept the
//! query parameters `dedup`, `skip_incomplete`, `item` and `delimiter`.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, ReshapeQuery, UploadResponse};
use crate::error::{CsvError, PipelineError, ReshapeError, ServerError, ServerResult};
use crate::reshape::pipeline::{process_bytes, PipelineOptions, PipelineOutput};
use crate::sink::{to_csv_string, OutputFormat};

/// File name of the CSV attachment.
pub const DOWNLOAD_FILE_NAME: &str = "processed_prices.csv";

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

type ApiError = (StatusCode, Json<Value>);

/// Build the application router.
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/download", post(download))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 pricereshape server running on http://localhost:{}", port);
    println!("   POST /api/upload   - Upload survey CSV, JSON records");
    println!("   POST /api/download - Upload survey CSV, CSV file");
    println!("   GET  /api/logs     - SSE log stream");
    println!("   GET  /health       - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "pricereshape",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "download": "POST /api/download",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn upload(
    Query(query): Query<ReshapeQuery>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let output = reshape_upload(query, multipart).await.map_err(reject)?;
    Ok(Json(UploadResponse::from(output)))
}

async fn download(
    Query(query): Query<ReshapeQuery>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let output = reshape_upload(query, multipart).await.map_err(reject)?;
    let body = to_csv_string(&output.records)
        .map_err(|e| reject(ServerError::Internal(e.to_string())))?;

    Ok((
        [
            (header::CONTENT_TYPE, OutputFormat::Csv.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\""),
            ),
        ],
        body,
    ))
}

async fn reshape_upload(query: ReshapeQuery, multipart: Multipart) -> ServerResult<PipelineOutput> {
    let (file_name, bytes) = read_file_field(multipart).await?;

    log_info(format!(
        "📄 New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let options = PipelineOptions {
        delimiter: query.delimiter,
        catalog_path: None,
        reshape: query.reshape_options(),
    };

    tokio::task::spawn_blocking(move || process_bytes(&bytes, &options))
        .await
        .map_err(|e| ServerError::Internal(format!("reshape task failed: {e}")))?
        .map_err(ServerError::from)
}

async fn read_file_field(mut multipart: Multipart) -> ServerResult<(Option<String>, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {e}")))?;
            return Ok((file_name, bytes.to_vec()));
        }
    }

    Err(ServerError::BadRequest("No file provided".to_string()))
}

/// HTTP status for a failed request.
pub fn error_status(err: &ServerError) -> StatusCode {
    match err {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServerError::Pipeline(err) => match err {
            PipelineError::Reshape(ReshapeError::Schema(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Reshape(ReshapeError::UnknownItem(_)) => StatusCode::BAD_REQUEST,
            PipelineError::Reshape(ReshapeError::Cancelled { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            PipelineError::Csv(CsvError::IoError(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::Csv(_) => StatusCode::BAD_REQUEST,
            PipelineError::Catalog(_) | PipelineError::Sink(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        },
    }
}

fn reject(err: ServerError) -> ApiError {
    log_error(err.to_string());
    (error_status(&err), Json(error_response(&err.to_string())))
}
