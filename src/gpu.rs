//! Headless GPU backend.
//!
//! [`GpuContext`] holds the wgpu device and queue without any window or
//! presentation surface. It is created lazily by [`GpuBackend`] on the first
//! render and then shared by every request; each request renders into its
//! own [`GpuSurface`], whose textures and buffers are destroyed when it is
//! dropped.
//!
//! Rendering targets an sRGB color texture, so readback bytes are already
//! display-encoded. Texture row 0 is the top of the image, which makes the
//! readback [`RowOrder::TopDown`].

use std::sync::{Arc, Mutex};

use crate::backend::{BackendKind, Capabilities, GraphicsBackend, OffscreenSurface};
use crate::error::{RenderError, RenderResult};
use crate::mesh_pass::{COLOR_FORMAT, DEPTH_FORMAT, MeshFrame, MeshPass};
use crate::pixels::{BYTES_PER_PIXEL, FrameBuffer, RowOrder};
use crate::scene::Scene;

/// Device, queue and the pipelines built for it.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub capabilities: Capabilities,
    mesh_pass: MeshPass,
}

impl GpuContext {
    /// Picks an adapter, opens a device and probes optional features.
    pub fn new_headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| match e {
            wgpu::RequestAdapterError::NotFound { .. } => {
                RenderError::context("no gpu adapter available")
            }
            other => RenderError::context(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Cubeshot Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(|e| RenderError::context(format!("wgpu request_device failed: {e:?}")))?;

        let capabilities = probe_capabilities(&adapter);
        let adapter_info = adapter.get_info();
        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            ?capabilities,
            "gpu context created"
        );

        let mesh_pass = MeshPass::new(&device);

        Ok(Self {
            device,
            queue,
            capabilities,
            mesh_pass,
        })
    }

    pub fn max_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

fn probe_capabilities(adapter: &wgpu::Adapter) -> Capabilities {
    let half = adapter.get_texture_format_features(wgpu::TextureFormat::Rgba16Float);
    let depth = adapter.get_texture_format_features(DEPTH_FORMAT);
    Capabilities {
        half_float: half
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
        half_float_linear: half
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE),
        depth_texture: depth
            .allowed_usages
            .contains(wgpu::TextureUsages::TEXTURE_BINDING),
        // The mesh shader has no shadow sampling stage.
        shadow_maps: false,
    }
}

/// Rounds `value` up to a multiple of `alignment` (a power of two).
fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

/// Bytes per readback row, padded to wgpu's copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    align_to(
        width * BYTES_PER_PIXEL as u32,
        wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
    )
}

/// Backend that renders with wgpu.
#[derive(Default)]
pub struct GpuBackend {
    context: Mutex<Option<Arc<GpuContext>>>,
}

impl GpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared context, creating it on first use. A failed
    /// creation is retried by the next call.
    pub fn context(&self) -> RenderResult<Arc<GpuContext>> {
        let mut slot = self
            .context
            .lock()
            .map_err(|_| RenderError::context("gpu context lock poisoned"))?;
        if let Some(context) = slot.as_ref() {
            return Ok(Arc::clone(context));
        }
        let context = Arc::new(GpuContext::new_headless()?);
        *slot = Some(Arc::clone(&context));
        Ok(context)
    }
}

impl GraphicsBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn create_surface(&self, width: u32, height: u32) -> RenderResult<Box<dyn OffscreenSurface>> {
        let context = self.context()?;
        Ok(Box::new(GpuSurface::new(context, width, height)?))
    }
}

/// Offscreen color and depth targets plus the readback buffer of one render.
pub struct GpuSurface {
    context: Arc<GpuContext>,
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    frame: Option<MeshFrame>,
}

impl GpuSurface {
    pub fn new(context: Arc<GpuContext>, width: u32, height: u32) -> RenderResult<Self> {
        let limit = context.max_dimension();
        if width == 0 || height == 0 || width > limit || height > limit {
            return Err(RenderError::context(format!(
                "cannot create a {width}x{height} surface (device limit {limit})"
            )));
        }

        let device = &context.device;
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Color"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Depth"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let padded_bytes_per_row = padded_bytes_per_row(width);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Offscreen Readback"),
            size: padded_bytes_per_row as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            context,
            width,
            height,
            padded_bytes_per_row,
            color,
            color_view,
            depth,
            depth_view,
            readback,
            frame: None,
        })
    }
}

impl OffscreenSurface for GpuSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn capabilities(&self) -> Capabilities {
        self.context.capabilities
    }

    fn render(&mut self, scene: &Scene) -> RenderResult<()> {
        let context = Arc::clone(&self.context);
        let (device, queue) = (&context.device, &context.queue);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let frame = self
            .frame
            .get_or_insert_with(|| context.mesh_pass.create_frame(device, queue, &scene.mesh));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Offscreen Render Encoder"),
        });
        context.mesh_pass.draw(
            queue,
            &mut encoder,
            frame,
            &self.color_view,
            &self.depth_view,
            scene,
        );

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::render(err.to_string()));
        }
        Ok(())
    }

    fn read_pixels(&mut self) -> RenderResult<FrameBuffer> {
        let device = &self.context.device;
        let buffer_slice = self.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| RenderError::readback(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| RenderError::readback("readback channel closed"))?
            .map_err(|e| RenderError::readback(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        let padded_row_bytes = self.padded_bytes_per_row as usize;
        let mut data = Vec::with_capacity(row_bytes * self.height as usize);
        for row in 0..self.height as usize {
            let start = row * padded_row_bytes;
            data.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        self.readback.unmap();

        FrameBuffer::new(self.width, self.height, RowOrder::TopDown, data)
    }
}

impl Drop for GpuSurface {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.destroy();
        }
        self.color.destroy();
        self.depth.destroy();
        self.readback.destroy();
    }
}
