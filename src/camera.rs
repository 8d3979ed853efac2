use glam::{Mat4, Vec3};

/// Default vertical field of view in degrees.
pub const DEFAULT_FOV_DEGREES: f32 = 75.0;

/// A perspective camera for 3D scenes.
///
/// Provides position, look-at target, vertical field of view and clip planes.
/// Projection uses wgpu depth conventions (`[0, 1]` NDC depth, right-handed).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Width divided by height.
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: DEFAULT_FOV_DEGREES,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vec3::new(x, y, z);
        self
    }

    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    pub fn with_up(mut self, up: Vec3) -> Self {
        self.up = up;
        self
    }

    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees;
        self
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn origin_projects_to_screen_center() {
        let camera = PerspectiveCamera::new().with_aspect(2.0);
        let clip = camera.view_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn wider_aspect_squeezes_x() {
        let square = PerspectiveCamera::new();
        let wide = PerspectiveCamera::new().with_aspect(2.0);
        let p = glam::Vec4::new(1.0, 1.0, 0.0, 1.0);
        let a = square.view_projection() * p;
        let b = wide.view_projection() * p;
        assert_relative_eq!(b.x / b.w, (a.x / a.w) / 2.0, epsilon = 1e-6);
        assert_relative_eq!(b.y / b.w, a.y / a.w, epsilon = 1e-6);
    }

    #[test]
    fn points_behind_near_plane_have_negative_w() {
        let camera = PerspectiveCamera::new();
        let clip = camera.view_projection() * glam::Vec4::new(0.0, 0.0, 6.0, 1.0);
        assert!(clip.w < 0.0);
    }
}
