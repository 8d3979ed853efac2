//! Software rendering backend.
//!
//! [`CpuSurface`] rasterizes the scene with the routines in [`crate::raster`]
//! and shades each fragment with the same lighting model as the GPU shader:
//! ambient plus a Lambertian spot light, optionally attenuated by a shadow
//! map. Readback is bottom-up, like a GL framebuffer.

use glam::{Mat4, Vec3, Vec4};

use crate::backend::{BackendKind, Capabilities, GraphicsBackend, OffscreenSurface};
use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::mesh::{MeshData, Vertex3d};
use crate::pixels::{FrameBuffer, RowOrder};
use crate::raster::{CullMode, RasterTarget, rasterize_triangle};
use crate::scene::{Scene, SpotLight};

/// Depth offset that keeps lit faces from shadowing themselves.
const SHADOW_BIAS: f32 = 1e-3;

#[derive(Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl GraphicsBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn create_surface(&self, width: u32, height: u32) -> RenderResult<Box<dyn OffscreenSurface>> {
        if width == 0 || height == 0 {
            return Err(RenderError::context(format!(
                "cannot create a {width}x{height} surface"
            )));
        }
        Ok(Box::new(CpuSurface {
            target: RasterTarget::new(width, height),
        }))
    }
}

pub struct CpuSurface {
    target: RasterTarget,
}

impl OffscreenSurface for CpuSurface {
    fn width(&self) -> u32 {
        self.target.width()
    }

    fn height(&self) -> u32 {
        self.target.height()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn render(&mut self, scene: &Scene) -> RenderResult<()> {
        let (width, height) = (self.target.width(), self.target.height());
        self.target.clear(scene.clear_color.to_srgb8());

        let shadow_map = match scene.spot_light {
            Some(light) if scene.wants_shadow_map() => {
                Some(ShadowMap::render(&scene.mesh, scene.transform.matrix(), &light))
            }
            _ => None,
        };

        let model = scene.transform.matrix();
        let normal_matrix = scene.transform.normal_matrix();
        let view_proj = scene.camera.view_projection();

        for tri in scene.mesh.triangles() {
            let world = tri.map(|v| model.transform_point3(Vec3::from(v.position)));
            let normals = tri.map(|v| normal_matrix.transform_vector3(Vec3::from(v.normal)));
            let clip = world.map(|p| view_proj * p.extend(1.0));

            let target = &mut self.target;
            rasterize_triangle(width, height, clip, CullMode::Back, |frag| {
                if !target.depth_test(frag.x, frag.y, frag.depth) {
                    return;
                }
                let [a, b, c] = frag.weights;
                let position = world[0] * a + world[1] * b + world[2] * c;
                let normal = (normals[0] * a + normals[1] * b + normals[2] * c).normalize_or_zero();
                let color = shade(scene, position, normal, shadow_map.as_ref());
                target.put(frag.x, frag.y, color.to_srgb8());
            });
        }

        Ok(())
    }

    fn read_pixels(&mut self) -> RenderResult<FrameBuffer> {
        FrameBuffer::new(
            self.target.width(),
            self.target.height(),
            RowOrder::BottomUp,
            self.target.color().to_vec(),
        )
    }
}

/// Outgoing linear color of a surface point.
pub(crate) fn shade(
    scene: &Scene,
    position: Vec3,
    normal: Vec3,
    shadow_map: Option<&ShadowMap>,
) -> Color {
    let material = &scene.material;
    if !material.lit {
        return Color::rgb(material.color.r, material.color.g, material.color.b);
    }

    let mut irradiance = scene
        .ambient_light
        .map_or(Color::rgb(0.0, 0.0, 0.0), |ambient| ambient.radiance());

    if let Some(spot) = scene.spot_light {
        let to_light = (spot.position - position).normalize_or_zero();
        let n_dot_l = normal.dot(to_light).max(0.0);
        let cone = spot.cone_attenuation(position - spot.position);
        let visibility = shadow_map.map_or(1.0, |map| map.visibility(position));
        irradiance = irradiance.add(spot.radiance().scaled(n_dot_l * cone * visibility));
    }

    let lit = material.color.modulate(irradiance);
    Color::rgb(lit.r, lit.g, lit.b)
}

/// Depth of the scene as seen from a spot light.
pub(crate) struct ShadowMap {
    size: u32,
    view_proj: Mat4,
    depth: Vec<f32>,
}

impl ShadowMap {
    pub(crate) fn render(mesh: &MeshData, model: Mat4, light: &SpotLight) -> Self {
        let size = light.shadow_map_size.max(1);
        let view_proj = light.shadow_camera().view_projection();
        let mut depth = vec![1.0_f32; size as usize * size as usize];

        for tri in mesh.triangles() {
            let clip = tri.map(|v: &Vertex3d| view_proj * model * Vec3::from(v.position).extend(1.0));
            rasterize_triangle(size, size, clip, CullMode::None, |frag| {
                let i = frag.y as usize * size as usize + frag.x as usize;
                if frag.depth < depth[i] {
                    depth[i] = frag.depth;
                }
            });
        }

        Self {
            size,
            view_proj,
            depth,
        }
    }

    /// Fraction of a 3x3 texel neighbourhood that sees `position` lit.
    pub(crate) fn visibility(&self, position: Vec3) -> f32 {
        let clip: Vec4 = self.view_proj * position.extend(1.0);
        if clip.w <= 0.0 {
            return 1.0;
        }
        let ndc = clip.truncate() / clip.w;
        if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || ndc.z > 1.0 {
            return 1.0;
        }

        let size = self.size as i64;
        let cx = ((ndc.x * 0.5 + 0.5) * self.size as f32).floor() as i64;
        let cy = ((ndc.y * 0.5 + 0.5) * self.size as f32).floor() as i64;

        let mut lit = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (x, y) = (cx + dx, cy + dy);
                if x < 0 || y < 0 || x >= size || y >= size {
                    lit += 1;
                    continue;
                }
                let stored = self.depth[(y * size + x) as usize];
                if ndc.z - SHADOW_BIAS <= stored {
                    lit += 1;
                }
            }
        }
        lit as f32 / 9.0
    }
}
