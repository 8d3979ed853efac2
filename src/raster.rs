//! Triangle rasterization for the software backend.
//!
//! Screen space follows GL conventions: pixel `(0, 0)` is the bottom-left
//! corner and rows are stored bottom-up, so a readback of [`RasterTarget`]
//! needs the same row flip as a GL framebuffer. Depth is NDC depth in
//! `[0, 1]`, smaller values closer to the camera.

use glam::{Vec2, Vec4};

/// Which triangle orientation to discard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullMode {
    None,
    /// Discard triangles that wind clockwise on screen.
    Back,
}

/// One covered pixel of a triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fragment {
    pub x: u32,
    /// Row counted from the bottom edge.
    pub y: u32,
    pub depth: f32,
    /// Perspective-correct barycentric weights of the three vertices.
    pub weights: [f32; 3],
}

/// Smallest clip-space `w` a vertex may have. Triangles reaching behind
/// this are dropped rather than clipped; the scenes rendered here keep all
/// geometry well in front of the camera.
const MIN_CLIP_W: f32 = 1e-5;

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Rasterizes one clip-space triangle into a `width` x `height` viewport,
/// calling `emit` for every covered pixel center.
pub fn rasterize_triangle(
    width: u32,
    height: u32,
    clip: [Vec4; 3],
    cull: CullMode,
    mut emit: impl FnMut(Fragment),
) {
    if width == 0 || height == 0 || clip.iter().any(|v| v.w <= MIN_CLIP_W) {
        return;
    }

    let inv_w = clip.map(|v| 1.0 / v.w);
    let ndc = [
        clip[0].truncate() * inv_w[0],
        clip[1].truncate() * inv_w[1],
        clip[2].truncate() * inv_w[2],
    ];
    let (w, h) = (width as f32, height as f32);
    let screen = ndc.map(|p| Vec2::new((p.x * 0.5 + 0.5) * w, (p.y * 0.5 + 0.5) * h));

    let area = edge(screen[0], screen[1], screen[2]);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    if cull == CullMode::Back && area < 0.0 {
        return;
    }

    let min = screen[0].min(screen[1]).min(screen[2]);
    let max = screen[0].max(screen[1]).max(screen[2]);
    let x0 = min.x.floor().max(0.0) as u32;
    let y0 = min.y.floor().max(0.0) as u32;
    let x1 = (max.x.ceil().min(w) as u32).min(width);
    let y1 = (max.y.ceil().min(h) as u32).min(height);

    for y in y0..y1 {
        for x in x0..x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let b0 = edge(screen[1], screen[2], p) / area;
            let b1 = edge(screen[2], screen[0], p) / area;
            let b2 = edge(screen[0], screen[1], p) / area;
            if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                continue;
            }

            let depth = b0 * ndc[0].z + b1 * ndc[1].z + b2 * ndc[2].z;
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }

            let p0 = b0 * inv_w[0];
            let p1 = b1 * inv_w[1];
            let p2 = b2 * inv_w[2];
            let sum = p0 + p1 + p2;

            emit(Fragment {
                x,
                y,
                depth,
                weights: [p0 / sum, p1 / sum, p2 / sum],
            });
        }
    }
}

/// Color and depth storage of the software surface.
#[derive(Clone, Debug)]
pub struct RasterTarget {
    width: u32,
    height: u32,
    color: Vec<u8>,
    depth: Vec<f32>,
}

impl RasterTarget {
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![0; pixels * 4],
            depth: vec![1.0; pixels],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self, rgba: [u8; 4]) {
        for px in self.color.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        self.depth.fill(1.0);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Passes when `depth` is nearer than the stored value, and stores it.
    pub fn depth_test(&mut self, x: u32, y: u32, depth: f32) -> bool {
        let i = self.index(x, y);
        if depth < self.depth[i] {
            self.depth[i] = depth;
            true
        } else {
            false
        }
    }

    pub fn put(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.index(x, y) * 4;
        self.color[i..i + 4].copy_from_slice(&rgba);
    }

    /// Bottom-up RGBA8 rows.
    pub fn color(&self) -> &[u8] {
        &self.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(width: u32, height: u32, clip: [Vec4; 3], cull: CullMode) -> Vec<Fragment> {
        let mut out = Vec::new();
        rasterize_triangle(width, height, clip, cull, |f| out.push(f));
        out
    }

    fn ccw_fullscreen(z: f32) -> [Vec4; 3] {
        [
            Vec4::new(-1.0, -1.0, z, 1.0),
            Vec4::new(3.0, -1.0, z, 1.0),
            Vec4::new(-1.0, 3.0, z, 1.0),
        ]
    }

    #[test]
    fn fullscreen_triangle_covers_every_pixel_once() {
        let frags = collect(8, 5, ccw_fullscreen(0.5), CullMode::Back);
        assert_eq!(frags.len(), 40);
        assert!(frags.iter().all(|f| (f.depth - 0.5).abs() < 1e-6));
    }

    #[test]
    fn clockwise_triangles_are_culled() {
        let [a, b, c] = ccw_fullscreen(0.5);
        assert!(collect(8, 8, [a, c, b], CullMode::Back).is_empty());
        assert_eq!(collect(8, 8, [a, c, b], CullMode::None).len(), 64);
    }

    #[test]
    fn positive_ndc_y_lands_in_upper_rows() {
        let tri = [
            Vec4::new(-1.0, 0.2, 0.5, 1.0),
            Vec4::new(1.0, 0.2, 0.5, 1.0),
            Vec4::new(0.0, 1.0, 0.5, 1.0),
        ];
        let frags = collect(10, 10, tri, CullMode::Back);
        assert!(!frags.is_empty());
        assert!(frags.iter().all(|f| f.y >= 6));
    }

    #[test]
    fn weights_are_perspective_correct() {
        // Same screen triangle, but the third vertex is twice as far away.
        let tri = [
            Vec4::new(-1.0, -1.0, 0.5, 1.0),
            Vec4::new(3.0, -1.0, 0.5, 1.0),
            Vec4::new(-2.0, 6.0, 1.0, 2.0),
        ];
        let frags = collect(4, 4, tri, CullMode::Back);
        for f in &frags {
            let sum: f32 = f.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        let center = frags.iter().find(|f| f.x == 1 && f.y == 1).unwrap();
        let screen_b2 = 0.1875_f32;
        assert!(center.weights[2] > 0.0 && center.weights[2] < screen_b2);
    }

    #[test]
    fn vertices_behind_the_camera_drop_the_triangle() {
        let mut tri = ccw_fullscreen(0.5);
        tri[1].w = -1.0;
        assert!(collect(8, 8, tri, CullMode::None).is_empty());
    }

    #[test]
    fn depth_test_keeps_nearest() {
        let mut target = RasterTarget::new(2, 2);
        assert!(target.depth_test(1, 0, 0.6));
        assert!(!target.depth_test(1, 0, 0.7));
        assert!(target.depth_test(1, 0, 0.2));
        target.clear([0, 0, 0, 255]);
        assert!(target.depth_test(1, 0, 0.9));
    }

    #[test]
    fn put_addresses_rows_from_the_bottom() {
        let mut target = RasterTarget::new(3, 2);
        target.clear([0, 0, 0, 255]);
        target.put(2, 1, [9, 8, 7, 6]);
        assert_eq!(&target.color()[20..24], &[9, 8, 7, 6]);
    }
}
