//! Per-frame animation and the single rasterization pass.

use std::time::Instant;

use crate::backend::OffscreenSurface;
use crate::error::RenderResult;
use crate::scene::Scene;

/// Radians of X rotation per millisecond of animation time.
pub const ROTATION_RATE_X: f64 = 0.001;
/// Radians of Y rotation per millisecond of animation time.
pub const ROTATION_RATE_Y: f64 = 0.0005;

/// Process start, captured once and read by every request that omits `time`.
#[derive(Clone, Copy, Debug)]
pub struct StartTime(Instant);

impl StartTime {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.0.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for StartTime {
    fn default() -> Self {
        Self::now()
    }
}

/// Sets the cube rotation for `time_ms` milliseconds of animation.
pub fn animate(scene: &mut Scene, time_ms: f64) {
    let x = (time_ms * ROTATION_RATE_X) as f32;
    let y = (time_ms * ROTATION_RATE_Y) as f32;
    scene.transform = scene.transform.euler_xyz(x, y, 0.0);
}

/// Animates the scene and issues exactly one pass into `surface`.
pub fn render_frame(
    surface: &mut dyn OffscreenSurface,
    scene: &mut Scene,
    time_ms: f64,
) -> RenderResult<()> {
    animate(scene, time_ms);
    surface.render(scene)
}
