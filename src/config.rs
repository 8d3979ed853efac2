//! Server configuration.
//!
//! [`ServerConfig`] doubles as the command-line interface of the `cubeshot`
//! binary (via `clap`) and as a plain builder for embedding the router in
//! tests or other programs:
//!
//! ```
//! use cubeshot::{BackendKind, OutputFormat, ServerConfig};
//!
//! let config = ServerConfig::new()
//!     .backend(BackendKind::Cpu)
//!     .output(OutputFormat::Png)
//!     .shadows(true);
//! assert_eq!(config.port, 3002);
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::backend::BackendKind;
use crate::scene::SceneOptions;

/// Default port of the render service.
pub const DEFAULT_PORT: u16 = 3002;

/// Largest width or height a request may resolve to unless overridden.
pub const DEFAULT_MAX_DIMENSION: u32 = 4096;

/// How a successful `POST /render-scene` response carries the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `{"imageData": "<base64 PNG>"}`
    #[default]
    Json,
    /// Raw bytes with `Content-Type: image/png`.
    Png,
}

impl OutputFormat {
    /// Parses the `format` query parameter; unknown values yield `None`.
    pub fn from_query(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

#[derive(Parser, Clone, Debug)]
#[command(name = "cubeshot", version, about = "Render a rotating cube over HTTP")]
pub struct ServerConfig {
    /// Interface to bind.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Graphics backend used to rasterize frames.
    #[arg(long, value_enum, default_value_t = BackendKind::Gpu)]
    pub backend: BackendKind,

    /// Response shape for `POST /render-scene`.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Render the cube unlit (no spot or ambient light).
    #[arg(long)]
    pub no_lights: bool,

    /// Enable shadow mapping for the spot light.
    #[arg(long)]
    pub shadows: bool,

    /// Directory holding the browser bundle served at `/`.
    #[arg(long, default_value = "public")]
    pub static_dir: PathBuf,

    /// Upper bound for the resolved image width and height.
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION)]
    pub max_dimension: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            backend: BackendKind::Gpu,
            output: OutputFormat::Json,
            no_lights: false,
            shadows: false,
            static_dir: PathBuf::from("public"),
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn output(mut self, output: OutputFormat) -> Self {
        self.output = output;
        self
    }

    pub fn lights(mut self, enabled: bool) -> Self {
        self.no_lights = !enabled;
        self
    }

    pub fn shadows(mut self, enabled: bool) -> Self {
        self.shadows = enabled;
        self
    }

    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    pub fn max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }

    /// Scene options applied to `POST` renders.
    pub fn scene_options(&self) -> SceneOptions {
        SceneOptions {
            lights: !self.no_lights,
            shadows: self.shadows,
        }
    }

    /// Parses `host:port` into a socket address.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|err| anyhow::anyhow!("invalid listen address {addr}: {err}"))
    }
}
