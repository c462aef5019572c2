use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{debug, error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::api::{
    ColumnsResponse, FilesResponse, PartitionRequest, PartitionResponse, UploadResponse,
};
use crate::config::ServerConfig;
use crate::dataset::{Dataset, DatasetError};
use crate::partition::{PartitionError, PartitionJob, PartitionReport};
use crate::storage::{StorageError, UploadStore};

pub struct AppState {
    store: UploadStore,
}

impl AppState {
    pub fn new(store: UploadStore) -> Self {
        AppState { store }
    }
}

#[derive(Deserialize)]
struct ColumnsQuery {
    file: Option<String>,
}

#[derive(Error, Debug)]
enum JobError {
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let store = UploadStore::open(&config.upload_dir)?;
    info!("Storing uploads in {}", store.dir().display());

    let app = router(Arc::new(AppState::new(store)), &config);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/upload", post(upload_file))
        .route("/files", get(list_files))
        .route("/columns", get(list_columns))
        .route("/partition", post(start_partition))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Json<UploadResponse> {
    let mut upload: Option<(String, Bytes)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed upload: {}", e);
                return upload_failed("Unable to upload file.");
            }
        };

        if field.name() != Some("file") {
            debug!("Ignoring form field {:?}", field.name());
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((file_name, bytes)),
            Err(e) => {
                warn!("Failed to read uploaded file {}: {}", file_name, e);
                return upload_failed("Unable to upload file.");
            }
        }
    }

    // Browsers send an empty file part when no file was chosen.
    let Some((file_name, bytes)) = upload.filter(|(name, _)| !name.is_empty()) else {
        return upload_failed("Unable to upload file.");
    };

    match state.store.save(&file_name, &bytes) {
        Ok(stored) => {
            info!("Stored upload {} ({} bytes)", stored, bytes.len());
            Json(UploadResponse {
                success: true,
                message: format!("File uploaded successfully: {}", stored),
            })
        }
        Err(StorageError::InvalidName(name)) => {
            warn!("Rejected upload name {:?}", name);
            upload_failed("Unable to create the file for writing.")
        }
        Err(e) => {
            error!("Failed to store {}: {}", file_name, e);
            upload_failed("Unable to save the file.")
        }
    }
}

fn upload_failed(message: &str) -> Json<UploadResponse> {
    Json(UploadResponse {
        success: false,
        message: message.to_string(),
    })
}

async fn list_files(State(state): State<Arc<AppState>>) -> Response {
    match state.store.list() {
        Ok(files) => Json(FilesResponse { files }).into_response(),
        Err(e) => {
            error!("Failed to list uploads: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Unable to read uploaded files directory.",
            )
                .into_response()
        }
    }
}

async fn list_columns(
    Query(params): Query<ColumnsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let file = params.file.unwrap_or_default();
    if file.is_empty() {
        return (StatusCode::BAD_REQUEST, "File name is required.").into_response();
    }

    match state.store.columns(&file) {
        Ok(columns) => Json(ColumnsResponse { columns }).into_response(),
        Err(
            e @ (StorageError::InvalidName(_) | StorageError::NotFound(_) | StorageError::Io(_)),
        ) => {
            warn!("Cannot open {}: {}", file, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Unable to open the file.").into_response()
        }
        Err(e) => {
            warn!("Cannot read columns of {}: {}", file, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Unable to read file columns.").into_response()
        }
    }
}

async fn start_partition(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: PartitionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!("Rejected partition body: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid request body.").into_response();
        }
    };

    info!(
        "Partitioning {} into {} groups by {:?}",
        request.file, request.num_groups, request.columns
    );

    let store = state.store.clone();
    let outcome =
        tokio::task::spawn_blocking(move || partition_stored_file(&store, &request)).await;

    let response = match outcome {
        Ok(Ok(report)) => {
            info!(
                "Partitioning finished: {} groups, balanced = {}",
                report.groups.len(),
                report.balanced
            );
            PartitionResponse::completed(report.log)
        }
        Ok(Err(e)) => {
            warn!("Partitioning failed: {}", e);
            PartitionResponse::failed(format!("Error executing partitioning: {}", e))
        }
        Err(e) => {
            error!("Partitioning task panicked: {}", e);
            PartitionResponse::failed(format!("Error executing partitioning: {}", e))
        }
    };

    Json(response).into_response()
}

fn partition_stored_file(
    store: &UploadStore,
    request: &PartitionRequest,
) -> Result<PartitionReport, JobError> {
    let job = PartitionJob::new(&request.file, request.num_groups, &request.columns)?;
    let path = store.resolve(&request.file)?;
    let dataset = Dataset::from_path(path)?;
    Ok(job.run(&dataset)?)
}
