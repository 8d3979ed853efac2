//! # Cubeshot
//!
//! **A headless HTTP service that renders a rotating cube and returns a PNG.**
//!
//! Each request builds a one-cube scene (perspective camera, optional spot
//! and ambient light), rotates the cube by the requested animation time,
//! rasterizes it into an offscreen surface and hands the frame back either
//! as raw PNG bytes or as base64 inside a JSON envelope.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cubeshot::{AppState, BackendKind, ServerConfig, app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::new().backend(BackendKind::Cpu).port(3002);
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()?).await?;
//!     axum::serve(listener, app(AppState::new(config))).await?;
//!     Ok(())
//! }
//! ```
//!
//! Rendering without HTTP goes through [`render_image`]:
//!
//! ```
//! use cubeshot::{BackendKind, RenderParams, SceneOptions, create_backend, render_image};
//!
//! let backend = create_backend(BackendKind::Cpu);
//! let image = render_image(backend.as_ref(), &RenderParams::defaults(0.0), SceneOptions::unlit())
//!     .unwrap();
//! assert_eq!((image.width, image.height), (256, 256));
//! ```
//!
//! ## Backends
//!
//! - **GPU**: headless wgpu device, shared across requests and created on
//!   first use.
//! - **CPU**: software rasterizer with GL-style bottom-up rows; needs no
//!   adapter, so it also backs the test suite.

mod backend;
mod camera;
mod color;
mod config;
mod cpu;
mod encode;
mod error;
mod gpu;
mod mesh;
mod mesh_pass;
mod pipeline;
mod pixels;
mod raster;
mod renderer;
mod request;
mod scene;
mod server;

pub use backend::{BackendKind, Capabilities, GraphicsBackend, OffscreenSurface, create_backend};
pub use camera::{DEFAULT_FOV_DEGREES, PerspectiveCamera};
pub use color::{Color, linear_to_srgb, srgb_to_linear};
pub use config::{DEFAULT_MAX_DIMENSION, DEFAULT_PORT, OutputFormat, ServerConfig};
pub use cpu::CpuBackend;
pub use encode::{encode_base64, encode_png};
pub use error::{RenderError, RenderResult};
pub use gpu::{GpuBackend, GpuContext};
pub use mesh::{MeshData, Transform, Vertex3d};
pub use pipeline::{RenderedImage, render_image};
pub use pixels::{FrameBuffer, ImageBuffer, RowOrder, extract, flip_rows};
pub use renderer::{ROTATION_RATE_X, ROTATION_RATE_Y, StartTime, animate, render_frame};
pub use request::{ColorInput, DEFAULT_COLOR_HEX, DEFAULT_SIZE, RenderParams, RenderRequest, SizeInput};
pub use scene::{Scene, SceneOptions, build_scene};
pub use server::{AppState, RenderResponse, app};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec3, Vec4};
