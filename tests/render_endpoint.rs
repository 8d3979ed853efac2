use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use base64::Engine as _;
use futures::future::join_all;
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;

use cubeshot::{
    AppState, BackendKind, GraphicsBackend, OffscreenSurface, OutputFormat, RenderError,
    RenderResponse, RenderResult, ServerConfig, app,
};

fn cpu_config() -> ServerConfig {
    ServerConfig::new()
        .backend(BackendKind::Cpu)
        .static_dir(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("public"))
}

fn cpu_app(config: ServerConfig) -> Router {
    app(AppState::new(config))
}

async fn send(app: Router, method: Method, uri: &str, body: Body) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .expect("request should build");
    app.oneshot(request).await.expect("request should complete")
}

async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let bytes = serde_json::to_vec(&body).expect("json encoding should succeed");
    send(app, Method::POST, uri, Body::from(bytes)).await
}

async fn read_body_bytes(response: Response) -> axum::body::Bytes {
    response
        .into_body()
        .collect()
        .await
        .expect("response body should collect")
        .to_bytes()
}

fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn decode_png(bytes: &[u8]) -> image::RgbaImage {
    image::load_from_memory(bytes)
        .expect("response should be a decodable image")
        .to_rgba8()
}

async fn decode_envelope(response: Response) -> image::RgbaImage {
    let bytes = read_body_bytes(response).await;
    let envelope: RenderResponse =
        serde_json::from_slice(&bytes).expect("response should decode as JSON");
    let png = base64::engine::general_purpose::STANDARD
        .decode(envelope.image_data)
        .expect("imageData should be base64");
    decode_png(&png)
}

async fn error_message(response: Response) -> String {
    let bytes = read_body_bytes(response).await;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).expect("error should decode as JSON");
    value["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn post_returns_base64_png_envelope() {
    let response = post_json(cpu_app(cpu_config()), "/render-scene", json!({"time": 500})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(content_type(&response).starts_with("application/json"));

    let image = decode_envelope(response).await;
    assert_eq!(image.dimensions(), (256, 256));
}

#[tokio::test]
async fn empty_body_renders_defaults() {
    let response = send(
        cpu_app(cpu_config()),
        Method::POST,
        "/render-scene",
        Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(decode_envelope(response).await.dimensions(), (256, 256));
}

#[tokio::test]
async fn aspect_scales_width_only() {
    let response = post_json(
        cpu_app(cpu_config()),
        "/render-scene",
        json!({"aspect": 2, "size": {"X": 128}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(decode_envelope(response).await.dimensions(), (256, 128));
}

#[tokio::test]
async fn sub_pixel_size_renders_a_single_pixel() {
    let response = post_json(
        cpu_app(cpu_config()),
        "/render-scene",
        json!({"size": {"X": 0.4}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(decode_envelope(response).await.dimensions(), (1, 1));
}

#[tokio::test]
async fn format_query_selects_raw_png() {
    let response = post_json(
        cpu_app(cpu_config()),
        "/render-scene?format=png",
        json!({"size": {"X": 64}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/png");
    let image = decode_png(&read_body_bytes(response).await);
    assert_eq!(image.dimensions(), (64, 64));
}

#[tokio::test]
async fn configured_png_output_applies_to_post() {
    let config = cpu_config().output(OutputFormat::Png);
    let response = post_json(cpu_app(config.clone()), "/render-scene", json!({})).await;
    assert_eq!(content_type(&response), "image/png");

    let response = post_json(cpu_app(config), "/render-scene?format=json", json!({})).await;
    assert!(content_type(&response).starts_with("application/json"));
}

#[tokio::test]
async fn get_renders_unlit_default_cube() {
    let response = send(
        cpu_app(cpu_config()),
        Method::GET,
        "/render-scene",
        Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(content_type(&response), "image/png");

    let image = decode_png(&read_body_bytes(response).await);
    assert_eq!(image.dimensions(), (256, 256));
    assert_eq!(image.get_pixel(128, 128).0, [0x80, 0x00, 0x80, 0xff]);
    assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
}

#[tokio::test]
async fn white_request_stays_neutral_under_lights() {
    let response = post_json(
        cpu_app(cpu_config()),
        "/render-scene",
        json!({"time": 0, "color": {"X": 1, "Y": 1, "Z": 1, "W": 1}, "size": {"X": 64}}),
    )
    .await;
    let image = decode_envelope(response).await;
    let [r, g, b, a] = image.get_pixel(32, 32).0;
    assert_eq!((r, a), (g, 255));
    assert_eq!(g, b);
    assert!(r > 0);
}

#[tokio::test]
async fn malformed_body_is_a_json_400() {
    let response = send(
        cpu_app(cpu_config()),
        Method::POST,
        "/render-scene",
        Body::from("{\"time\": 12,"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        error_message(response)
            .await
            .starts_with("Invalid render request:")
    );
}

#[tokio::test]
async fn out_of_range_parameters_are_rejected() {
    let app = cpu_app(cpu_config().max_dimension(512));
    for body in [
        json!({"fov": 180}),
        json!({"fov": -1}),
        json!({"aspect": -2}),
        json!({"size": {"X": -10}}),
        json!({"size": {"X": 400}, "aspect": 2}),
    ] {
        let response = post_json(app.clone(), "/render-scene", body.clone()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn unknown_format_is_rejected() {
    let response = post_json(cpu_app(cpu_config()), "/render-scene?format=gif", json!({})).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

struct BrokenBackend;

impl GraphicsBackend for BrokenBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn create_surface(&self, _width: u32, _height: u32) -> RenderResult<Box<dyn OffscreenSurface>> {
        Err(RenderError::context("no gpu adapter available"))
    }
}

fn broken_app(output: OutputFormat) -> Router {
    app(AppState::with_backend(
        cpu_config().output(output),
        Arc::new(BrokenBackend),
    ))
}

#[tokio::test]
async fn backend_failure_is_a_500_json_error() {
    let response = post_json(broken_app(OutputFormat::Json), "/render-scene", json!({})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_message(response).await, "Error rendering scene");
}

#[tokio::test]
async fn backend_failure_is_plain_text_in_png_mode() {
    let response = post_json(broken_app(OutputFormat::Png), "/render-scene", json!({})).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(content_type(&response).starts_with("text/plain"));
    let body = read_body_bytes(response).await;
    assert_eq!(&body[..], b"Error rendering scene");

    let response = send(
        broken_app(OutputFormat::Json),
        Method::GET,
        "/render-scene",
        Body::empty(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(content_type(&response).starts_with("text/plain"));
}

#[tokio::test]
async fn concurrent_requests_get_their_own_images() {
    let app = cpu_app(cpu_config().lights(false));
    let colors = [
        ([1.0, 0.0, 0.0], [255, 0, 0, 255]),
        ([0.0, 1.0, 0.0], [0, 255, 0, 255]),
        ([0.0, 0.0, 1.0], [0, 0, 255, 255]),
    ];

    let futures = (0..10u32).map(|i| {
        let app = app.clone();
        let size = 32 + i * 8;
        let ([x, y, z], expected) = colors[i as usize % colors.len()];
        async move {
            let body = json!({
                "time": i * 100,
                "color": {"X": x, "Y": y, "Z": z, "W": 1},
                "size": {"X": size},
            });
            let response = post_json(app, "/render-scene", body).await;
            (size, expected, response)
        }
    });

    for (size, expected, response) in join_all(futures).await {
        assert_eq!(response.status(), StatusCode::OK);
        let image = decode_envelope(response).await;
        assert_eq!(image.dimensions(), (size, size));
        assert_eq!(image.get_pixel(size / 2, size / 2).0, expected);
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let response = send(cpu_app(cpu_config()), Method::GET, "/health", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&read_body_bytes(response).await[..], b"ok");
}

#[tokio::test]
async fn browser_bundle_is_served() {
    let response = send(cpu_app(cpu_config()), Method::GET, "/script.js", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_body_bytes(response).await;
    assert!(std::str::from_utf8(&body).unwrap().contains("render-scene"));

    let response = send(cpu_app(cpu_config()), Method::GET, "/", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
}
