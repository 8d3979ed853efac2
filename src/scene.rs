//! Scene construction.
//!
//! A [`Scene`] is the transient aggregate a single request renders: one cube,
//! its material, the optional lights, and the camera. It is built from
//! [`RenderParams`] by [`build_scene`] and dropped when the request ends.

use std::f32::consts::FRAC_PI_3;

use glam::Vec3;

use crate::camera::PerspectiveCamera;
use crate::color::Color;
use crate::mesh::{MeshData, Transform};
use crate::request::RenderParams;

/// sRGB hex of the ambient light.
pub const AMBIENT_LIGHT_HEX: u32 = 0x404040;

/// Edge length of the spot light's square shadow map.
pub const SHADOW_MAP_SIZE: u32 = 1024;

/// Which optional scene features a render uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneOptions {
    /// Add the spot and ambient lights and shade the cube. When off the cube
    /// is drawn in its flat material color.
    pub lights: bool,
    /// Let the spot light cast shadows.
    pub shadows: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            lights: true,
            shadows: false,
        }
    }
}

impl SceneOptions {
    /// Options of the parameterless `GET` render.
    pub fn unlit() -> Self {
        Self {
            lights: false,
            shadows: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Linear-space albedo.
    pub color: Color,
    /// Shade with the scene lights; when `false` the color is emitted as is.
    pub lit: bool,
    pub casts_shadow: bool,
}

/// A cone light aimed at a target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub target: Vec3,
    pub color: Color,
    pub intensity: f32,
    /// Half-angle of the cone in radians.
    pub angle: f32,
    /// Fraction of the cone that fades out at the edge, in `[0, 1]`.
    pub penumbra: f32,
    pub casts_shadow: bool,
    pub shadow_map_size: u32,
}

impl SpotLight {
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Cosines of the outer and inner cone edges.
    pub fn cone_cosines(&self) -> (f32, f32) {
        let outer = self.angle.cos();
        let inner = (self.angle * (1.0 - self.penumbra)).cos();
        (outer, inner)
    }

    /// Radiance multiplier of the cone for a direction from the light.
    pub fn cone_attenuation(&self, to_point: Vec3) -> f32 {
        let (outer, inner) = self.cone_cosines();
        let cos = self.direction().dot(to_point.normalize_or_zero());
        if inner - outer <= f32::EPSILON {
            return if cos >= outer { 1.0 } else { 0.0 };
        }
        let t = ((cos - outer) / (inner - outer)).clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }

    /// Camera looking down the cone, used to render the shadow map.
    pub fn shadow_camera(&self) -> PerspectiveCamera {
        // look_at degenerates when the view direction is parallel to up.
        let up = if self.direction().cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        PerspectiveCamera::new()
            .at(self.position.x, self.position.y, self.position.z)
            .looking_at(self.target)
            .with_up(up)
            .with_fov((self.angle * 2.0).to_degrees())
            .with_aspect(1.0)
            .with_clip(0.5, 500.0)
    }

    /// Light radiance reaching the surface before the `N·L` term.
    pub fn radiance(&self) -> Color {
        self.color.scaled(self.intensity)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

impl AmbientLight {
    pub fn radiance(&self) -> Color {
        self.color.scaled(self.intensity)
    }
}

/// Everything one frame needs.
#[derive(Clone, Debug)]
pub struct Scene {
    pub mesh: MeshData,
    pub transform: Transform,
    pub material: Material,
    pub spot_light: Option<SpotLight>,
    pub ambient_light: Option<AmbientLight>,
    pub camera: PerspectiveCamera,
    /// Whether shadow-casting lights render a shadow map.
    pub shadows: bool,
    pub clear_color: Color,
}

impl Scene {
    /// `true` when a shadow map has to be rendered for this frame.
    pub fn wants_shadow_map(&self) -> bool {
        self.shadows
            && self.material.lit
            && self.material.casts_shadow
            && self.spot_light.is_some_and(|light| light.casts_shadow)
    }
}

/// Builds the single-cube scene for one render.
pub fn build_scene(params: &RenderParams, options: SceneOptions) -> Scene {
    let camera = PerspectiveCamera::new()
        .at(0.0, 0.0, 5.0)
        .looking_at(Vec3::ZERO)
        .with_fov(params.fov_degrees)
        .with_aspect(params.width as f32 / params.height as f32)
        .with_clip(0.1, 1000.0);

    let (spot_light, ambient_light) = if options.lights {
        (
            Some(SpotLight {
                position: Vec3::new(5.0, 5.0, 5.0),
                target: Vec3::ZERO,
                color: Color::WHITE,
                intensity: 1.0,
                angle: FRAC_PI_3,
                penumbra: 0.0,
                casts_shadow: true,
                shadow_map_size: SHADOW_MAP_SIZE,
            }),
            Some(AmbientLight {
                color: Color::from_srgb_hex(AMBIENT_LIGHT_HEX),
                intensity: 1.0,
            }),
        )
    } else {
        (None, None)
    };

    Scene {
        mesh: MeshData::cube(),
        transform: Transform::new(),
        material: Material {
            color: params.color,
            lit: options.lights,
            casts_shadow: true,
        },
        spot_light,
        ambient_light,
        camera,
        shadows: options.shadows && options.lights,
        clear_color: Color::BLACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lit_scene_has_spot_and_ambient() {
        let scene = build_scene(&RenderParams::defaults(0.0), SceneOptions::default());
        let spot = scene.spot_light.expect("spot light");
        assert_eq!(spot.position, Vec3::new(5.0, 5.0, 5.0));
        assert!(spot.casts_shadow);
        assert!(scene.ambient_light.is_some());
        assert!(scene.material.lit);
        assert!(!scene.wants_shadow_map());
    }

    #[test]
    fn unlit_scene_has_no_lights() {
        let scene = build_scene(&RenderParams::defaults(0.0), SceneOptions::unlit());
        assert!(scene.spot_light.is_none());
        assert!(scene.ambient_light.is_none());
        assert!(!scene.material.lit);
    }

    #[test]
    fn shadows_need_lights() {
        let options = SceneOptions {
            lights: false,
            shadows: true,
        };
        let scene = build_scene(&RenderParams::defaults(0.0), options);
        assert!(!scene.wants_shadow_map());

        let options = SceneOptions {
            lights: true,
            shadows: true,
        };
        let scene = build_scene(&RenderParams::defaults(0.0), options);
        assert!(scene.wants_shadow_map());
    }

    #[test]
    fn camera_matches_params() {
        let mut params = RenderParams::defaults(0.0);
        params.width = 512;
        params.fov_degrees = 40.0;
        let scene = build_scene(&params, SceneOptions::default());
        assert_relative_eq!(scene.camera.aspect, 2.0);
        assert_eq!(scene.camera.fov, 40.0);
        assert_eq!(scene.camera.near, 0.1);
        assert_eq!(scene.camera.far, 1000.0);
        assert_eq!(scene.camera.position, Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn hard_edged_cone_is_a_step() {
        let scene = build_scene(&RenderParams::defaults(0.0), SceneOptions::default());
        let spot = scene.spot_light.unwrap();
        assert_eq!(spot.cone_attenuation(-spot.position), 1.0);
        assert_eq!(spot.cone_attenuation(Vec3::new(-1.0, 0.0, 1.0)), 0.0);
    }
}
