//! Graphics context provider.
//!
//! A [`GraphicsBackend`] hands out request-scoped [`OffscreenSurface`]s. Each
//! surface owns its render target, depth buffer and readback storage, and
//! releases them when dropped, so no GPU memory outlives the request that
//! allocated it.

use std::sync::Arc;

use clap::ValueEnum;

use crate::error::RenderResult;
use crate::pixels::FrameBuffer;
use crate::scene::Scene;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Headless wgpu device.
    Gpu,
    /// Software rasterizer.
    Cpu,
}

/// Optional features a surface may lack. Missing features reduce fidelity
/// but never abort a render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Half-float color targets can be rendered to.
    pub half_float: bool,
    /// Half-float textures can be sampled with linear filtering.
    pub half_float_linear: bool,
    /// Depth textures can be sampled in shaders.
    pub depth_texture: bool,
    /// The surface renders shadow maps for shadow-casting lights.
    pub shadow_maps: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        half_float: true,
        half_float_linear: true,
        depth_texture: true,
        shadow_maps: true,
    };

    /// Whether the surface can honor a shadow-mapped scene.
    pub fn supports_shadows(&self) -> bool {
        self.depth_texture && self.shadow_maps
    }
}

/// An offscreen rasterization surface of fixed size.
pub trait OffscreenSurface: Send {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn capabilities(&self) -> Capabilities;

    /// Clears the surface and rasterizes the scene once.
    fn render(&mut self, scene: &Scene) -> RenderResult<()>;

    /// Reads back `width * height * 4` RGBA8 bytes.
    fn read_pixels(&mut self) -> RenderResult<FrameBuffer>;
}

/// Creates offscreen surfaces. Shared across requests.
pub trait GraphicsBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Acquires a surface for one request. Context creation failures are
    /// reported as [`RenderError::Context`](crate::RenderError::Context).
    fn create_surface(&self, width: u32, height: u32) -> RenderResult<Box<dyn OffscreenSurface>>;
}

/// Instantiates the backend selected in the configuration.
///
/// The GPU backend defers device creation to the first surface request, so
/// this never fails even on machines without an adapter.
pub fn create_backend(kind: BackendKind) -> Arc<dyn GraphicsBackend> {
    match kind {
        BackendKind::Gpu => Arc::new(crate::gpu::GpuBackend::new()),
        BackendKind::Cpu => Arc::new(crate::cpu::CpuBackend::new()),
    }
}
