//! HTTP server.
//!
//! | Route | Method | Body | Response |
//! |---|---|---|---|
//! | `/` | GET | | The single-page UI |
//! | `/api/process` | POST | multipart: `image`, `operations`*, `params` | [`ImageResult`] |
//! | `/api/batch` | POST | multipart: `images`*, `operations`*, `params` | [`BatchResult`] |
//! | `/health` | GET | | `{"status": "ok", "version": …}` |
//!
//! Errors come back as `{"error": "<message>"}` with a status that says
//! whose fault it was. Image work runs on the blocking pool so the async
//! workers stay responsive.

use crate::config::AppConfig;
use crate::imaging::{BackendError, ImageBackend, RustBackend};
use crate::pipeline::{self, BatchResult, ImageResult, PipelineError, Upload};
use crate::request::{ProcessRequest, RequestError};
use crate::ui;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::{Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Backend shared by every request.
pub type SharedBackend = Arc<dyn ImageBackend + Send + Sync>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid bind address {addr:?}: {source}")]
    Bind {
        addr: String,
        source: std::net::AddrParseError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors a handler can answer with.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing file field {0:?}")]
    MissingFile(&'static str),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Processing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile(_) | Self::Request(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(err) => match err {
                PipelineError::NoFiles | PipelineError::EmptyUpload(_) => StatusCode::BAD_REQUEST,
                PipelineError::TooLarge { .. } | PipelineError::TooManyFiles { .. } => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                PipelineError::Backend(BackendError::Decode(_)) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PipelineError::Backend(BackendError::InvalidParameter(_)) => {
                    StatusCode::BAD_REQUEST
                }
                PipelineError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Multipart(err) => err.status(),
            Self::Join(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: SharedBackend,
}

impl AppState {
    pub fn new(config: AppConfig, backend: SharedBackend) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }
}

/// Build the router with all routes and layers.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.body_limit();
    let enable_cors = state.config.server.enable_cors;

    let mut app = Router::new()
        .route("/", get(handle_index))
        .route("/api/process", post(handle_process))
        .route("/api/batch", post(handle_batch))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(Any),
        );
    }

    app
}

/// Bind and serve until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), ServerError> {
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .map_err(|source| ServerError::Bind {
            addr: config.server.bind.clone(),
            source,
        })?;

    let state = AppState::new(config, Arc::new(RustBackend::new()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "imagedesk listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutting down");
}

/// Multipart fields relevant to both processing endpoints.
#[derive(Debug, Default)]
struct Form {
    files: Vec<Upload>,
    operations: Vec<String>,
    params: Option<String>,
}

async fn read_form(mut multipart: Multipart, file_field: &str) -> Result<Form, ApiError> {
    let mut form = Form::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let data = field.bytes().await?;
            form.files.push(Upload::new(file_name, data.to_vec()));
        } else if name == "operations" {
            form.operations.push(field.text().await?);
        } else if name == "params" {
            form.params = Some(field.text().await?);
        } else {
            debug!(field = %name, "ignoring multipart field");
        }
    }
    Ok(form)
}

async fn handle_index(State(state): State<AppState>) -> Html<String> {
    Html(ui::render_page(&state.config.defaults).into_string())
}

async fn handle_process(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImageResult>, ApiError> {
    let form = read_form(multipart, "image").await?;
    let request = ProcessRequest::from_parts(
        &form.operations,
        form.params.as_deref(),
        &state.config.defaults,
    )?;
    let upload = form
        .files
        .into_iter()
        .next()
        .ok_or(ApiError::MissingFile("image"))?;

    let result = tokio::task::spawn_blocking(move || {
        pipeline::process_image(
            state.backend.as_ref(),
            &upload,
            &request,
            &state.config.limits,
        )
    })
    .await??;
    Ok(Json(result))
}

async fn handle_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BatchResult>, ApiError> {
    let form = read_form(multipart, "images").await?;
    let request = ProcessRequest::from_parts(
        &form.operations,
        form.params.as_deref(),
        &state.config.defaults,
    )?;
    let uploads = form.files;

    let result = tokio::task::spawn_blocking(move || {
        pipeline::batch_process_images(
            state.backend.as_ref(),
            &uploads,
            &request,
            &state.config.limits,
        )
    })
    .await??;
    Ok(Json(result))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: crate::version_string(),
    })
}
