//! One render request from parameters to PNG bytes.
//!
//! Stages run in a fixed order: build the scene, create a surface, check
//! its capabilities, render a frame, read the pixels back, flip them into
//! image order and encode. The surface lives only inside [`render_image`],
//! so its resources are released before encoding starts.

use std::time::Instant;

use tracing::{debug, warn};

use crate::backend::{Capabilities, GraphicsBackend};
use crate::encode::encode_png;
use crate::error::{RenderError, RenderResult};
use crate::pixels::extract;
use crate::renderer::render_frame;
use crate::request::RenderParams;
use crate::scene::{Scene, SceneOptions, build_scene};

/// An encoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// Logs missing optional features and turns off what the surface cannot do.
///
/// Returns `true` when shadows had to be dropped from the scene.
pub fn apply_capabilities(scene: &mut Scene, capabilities: Capabilities) -> bool {
    if !capabilities.half_float {
        warn!("half-float render targets are unsupported");
    }
    if !capabilities.half_float_linear {
        warn!("linear filtering of half-float textures is unsupported");
    }
    if !capabilities.depth_texture {
        warn!("depth textures are unsupported");
    }

    if scene.shadows && !capabilities.supports_shadows() {
        warn!("shadow maps are unsupported by this backend, rendering without shadows");
        scene.shadows = false;
        return true;
    }
    false
}

#[tracing::instrument(
    skip_all,
    fields(
        backend = ?backend.kind(),
        width = params.width,
        height = params.height,
        time_ms = params.time_ms,
    )
)]
pub fn render_image(
    backend: &dyn GraphicsBackend,
    params: &RenderParams,
    options: SceneOptions,
) -> RenderResult<RenderedImage> {
    let started = Instant::now();
    let mut scene = build_scene(params, options);

    let frame = {
        let mut surface = backend.create_surface(params.width, params.height)?;
        debug!(
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "surface created"
        );

        apply_capabilities(&mut scene, surface.capabilities());
        render_frame(surface.as_mut(), &mut scene, params.time_ms)?;
        debug!(
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "frame rendered"
        );

        surface.read_pixels()?
    };

    if (frame.width, frame.height) != (params.width, params.height) {
        return Err(RenderError::readback(format!(
            "surface returned {}x{}, expected {}x{}",
            frame.width, frame.height, params.width, params.height
        )));
    }

    let image = extract(&frame);
    let png = encode_png(&image)?;
    debug!(
        bytes = png.len(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "frame encoded"
    );

    Ok(RenderedImage {
        width: image.width,
        height: image.height,
        png,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, OffscreenSurface};
    use crate::cpu::CpuBackend;
    use crate::pixels::FrameBuffer;

    #[test]
    fn renders_requested_dimensions() {
        let params = RenderParams {
            width: 48,
            height: 24,
            ..RenderParams::defaults(100.0)
        };
        let image = render_image(&CpuBackend::new(), &params, SceneOptions::default()).unwrap();
        assert_eq!((image.width, image.height), (48, 24));

        let decoded = image::load_from_memory(&image.png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (48, 24));
    }

    #[test]
    fn missing_shadow_support_disables_shadows() {
        let options = SceneOptions {
            lights: true,
            shadows: true,
        };
        let mut scene = build_scene(&RenderParams::defaults(0.0), options);
        let caps = Capabilities {
            shadow_maps: false,
            ..Capabilities::ALL
        };
        assert!(apply_capabilities(&mut scene, caps));
        assert!(!scene.shadows);

        let mut scene = build_scene(&RenderParams::defaults(0.0), options);
        assert!(!apply_capabilities(&mut scene, Capabilities::ALL));
        assert!(scene.shadows);
    }

    struct ShortReadback;

    struct ShortSurface;

    impl OffscreenSurface for ShortSurface {
        fn width(&self) -> u32 {
            4
        }

        fn height(&self) -> u32 {
            4
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::ALL
        }

        fn render(&mut self, _scene: &Scene) -> RenderResult<()> {
            Ok(())
        }

        fn read_pixels(&mut self) -> RenderResult<FrameBuffer> {
            FrameBuffer::new(2, 2, crate::pixels::RowOrder::TopDown, vec![0; 16])
        }
    }

    impl GraphicsBackend for ShortReadback {
        fn kind(&self) -> BackendKind {
            BackendKind::Cpu
        }

        fn create_surface(
            &self,
            _width: u32,
            _height: u32,
        ) -> RenderResult<Box<dyn OffscreenSurface>> {
            Ok(Box::new(ShortSurface))
        }
    }

    #[test]
    fn mismatched_readback_is_an_error() {
        let params = RenderParams {
            width: 4,
            height: 4,
            ..RenderParams::defaults(0.0)
        };
        let err = render_image(&ShortReadback, &params, SceneOptions::unlit()).unwrap_err();
        assert!(matches!(err, RenderError::Readback(_)));
    }
}
