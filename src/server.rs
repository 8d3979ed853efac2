//! HTTP surface of the service.
//!
//! | Route                 | Behavior                                           |
//! |-----------------------|----------------------------------------------------|
//! | `POST /render-scene`  | render the JSON request, answer JSON or PNG        |
//! | `GET /render-scene`   | render the defaults unlit, answer PNG              |
//! | `GET /health`         | liveness probe                                     |
//! | anything else         | static files from [`ServerConfig::static_dir`]     |

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::backend::{GraphicsBackend, create_backend};
use crate::config::{OutputFormat, ServerConfig};
use crate::encode::encode_base64;
use crate::error::{RenderError, RenderResult};
use crate::pipeline::{RenderedImage, render_image};
use crate::renderer::StartTime;
use crate::request::{RenderParams, RenderRequest};
use crate::scene::SceneOptions;

/// Shared, read-only state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn GraphicsBackend>,
    pub config: Arc<ServerConfig>,
    pub start: StartTime,
}

impl AppState {
    /// State with the backend selected by `config.backend`.
    pub fn new(config: ServerConfig) -> Self {
        let backend = create_backend(config.backend);
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: ServerConfig, backend: Arc<dyn GraphicsBackend>) -> Self {
        Self {
            backend,
            config: Arc::new(config),
            start: StartTime::now(),
        }
    }
}

/// Body of a successful JSON response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResponse {
    #[serde(rename = "imageData")]
    pub image_data: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Default, Deserialize)]
struct FormatQuery {
    format: Option<String>,
}

pub fn app(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);
    Router::new()
        .route("/render-scene", post(render_scene).get(render_default))
        .route("/health", get(health))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// A failed request, shaped for the response format the caller asked for.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
    format: OutputFormat,
}

impl ApiError {
    fn bad_request(message: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            format,
        }
    }

    /// Logs `err` and maps it to its client-facing message.
    fn from_render(err: RenderError, format: OutputFormat) -> Self {
        tracing::error!(error = %err, "render request failed");
        match err {
            RenderError::InvalidRequest(detail) => {
                Self::bad_request(format!("Invalid render request: {detail}"), format)
            }
            RenderError::Encode(_) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Error encoding image".to_string(),
                format,
            },
            RenderError::Context(_) | RenderError::Render(_) | RenderError::Readback(_) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Error rendering scene".to_string(),
                format,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.format {
            OutputFormat::Json => (
                self.status,
                Json(ErrorResponse {
                    error: self.message,
                }),
            )
                .into_response(),
            OutputFormat::Png => (
                self.status,
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                self.message,
            )
                .into_response(),
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn render_scene(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let format = match query.format.as_deref() {
        None => state.config.output,
        Some(value) => OutputFormat::from_query(value).ok_or_else(|| {
            ApiError::bad_request(
                format!("Invalid render request: unknown format {value:?}"),
                state.config.output,
            )
        })?,
    };

    let request = parse_request(&body).map_err(|err| ApiError::from_render(err, format))?;
    let params = request
        .resolve(state.config.max_dimension, state.start.elapsed_ms())
        .map_err(|err| ApiError::from_render(err, format))?;

    let image = render_blocking(&state, params, state.config.scene_options())
        .await
        .map_err(|err| ApiError::from_render(err, format))?;

    Ok(match format {
        OutputFormat::Json => Json(RenderResponse {
            image_data: encode_base64(&image.png),
        })
        .into_response(),
        OutputFormat::Png => png_response(image),
    })
}

async fn render_default(State(state): State<AppState>) -> Result<Response, ApiError> {
    let params = RenderParams::defaults(state.start.elapsed_ms());
    let image = render_blocking(&state, params, SceneOptions::unlit())
        .await
        .map_err(|err| ApiError::from_render(err, OutputFormat::Png))?;
    Ok(png_response(image))
}

/// Empty bodies mean "all defaults".
fn parse_request(body: &Bytes) -> RenderResult<RenderRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RenderRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| RenderError::invalid_request(format!("invalid JSON body: {err}")))
}

/// Runs the pipeline on the blocking pool; a panicked render is a render error.
async fn render_blocking(
    state: &AppState,
    params: RenderParams,
    options: SceneOptions,
) -> RenderResult<RenderedImage> {
    let backend = Arc::clone(&state.backend);
    tokio::task::spawn_blocking(move || render_image(backend.as_ref(), &params, options))
        .await
        .map_err(|err| RenderError::render(format!("render task failed: {err}")))?
}

fn png_response(image: RenderedImage) -> Response {
    ([(CONTENT_TYPE, "image/png")], image.png).into_response()
}
