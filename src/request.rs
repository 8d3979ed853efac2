//! The JSON request body of `/render-scene` and its resolution into concrete
//! render parameters.
//!
//! Field names follow the client that drives the service: top-level keys are
//! lower case, vector components are single upper-case letters.
//!
//! ```
//! use cubeshot::RenderRequest;
//!
//! let request: RenderRequest = serde_json::from_str(
//!     r#"{"time": 1500, "color": {"X": 1, "Y": 0.5, "Z": 0, "W": 1}, "aspect": 2, "size": {"X": 128}}"#,
//! ).unwrap();
//! let params = request.resolve(4096, 0.0).unwrap();
//! assert_eq!((params.width, params.height), (256, 128));
//! assert_eq!(params.time_ms, 1500.0);
//! ```

use serde::Deserialize;

use crate::camera::DEFAULT_FOV_DEGREES;
use crate::color::Color;
use crate::error::{RenderError, RenderResult};

/// Edge length used when the request has no `size`.
pub const DEFAULT_SIZE: u32 = 256;

/// sRGB hex of the cube when the request has no `color`.
pub const DEFAULT_COLOR_HEX: u32 = 0x800080;

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct ColorInput {
    #[serde(rename = "X", default)]
    pub x: f64,
    #[serde(rename = "Y", default)]
    pub y: f64,
    #[serde(rename = "Z", default)]
    pub z: f64,
    /// Intensity multiplier applied to all three channels.
    #[serde(rename = "W", default = "one")]
    pub w: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct SizeInput {
    #[serde(rename = "X", default)]
    pub x: Option<f64>,
}

fn one() -> f64 {
    1.0
}

/// Body of a `POST /render-scene` call. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RenderRequest {
    /// Animation time in milliseconds.
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub color: Option<ColorInput>,
    /// Vertical field of view in degrees.
    #[serde(default)]
    pub fov: Option<f64>,
    /// Width-to-height ratio of the output image.
    #[serde(default)]
    pub aspect: Option<f64>,
    #[serde(default)]
    pub size: Option<SizeInput>,
}

/// Fully resolved parameters of one render.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderParams {
    pub width: u32,
    pub height: u32,
    /// Linear-space material color.
    pub color: Color,
    pub fov_degrees: f32,
    /// Milliseconds of animation applied to the cube rotation.
    pub time_ms: f64,
}

impl RenderParams {
    /// Parameters of the parameterless `GET` render at the given time.
    pub fn defaults(time_ms: f64) -> Self {
        Self {
            width: DEFAULT_SIZE,
            height: DEFAULT_SIZE,
            color: Color::from_srgb_hex(DEFAULT_COLOR_HEX),
            fov_degrees: DEFAULT_FOV_DEGREES,
            time_ms,
        }
    }
}

impl RenderRequest {
    /// Resolves the request against the defaults.
    ///
    /// `elapsed_ms` is the animation time used when the request has no
    /// `time`. Zero or absent `size`, `fov` and `aspect` fall back to their
    /// defaults; the image height always equals the size and only the width
    /// is scaled by `aspect`. Sizes that round to zero pixels become one.
    ///
    /// `time` is the exception to the zero rule: an explicit `0` renders the
    /// unrotated cube and only an absent `time` uses `elapsed_ms`.
    pub fn resolve(&self, max_dimension: u32, elapsed_ms: f64) -> RenderResult<RenderParams> {
        let size = match self.size.and_then(|s| s.x) {
            Some(x) if x < 0.0 => {
                return Err(RenderError::invalid_request(format!(
                    "size must not be negative, got {x}"
                )));
            }
            Some(x) if x > 0.0 => x.round().max(1.0),
            _ => DEFAULT_SIZE as f64,
        };

        let width = match self.aspect {
            Some(aspect) if aspect < 0.0 => {
                return Err(RenderError::invalid_request(format!(
                    "aspect must not be negative, got {aspect}"
                )));
            }
            Some(aspect) if aspect > 0.0 => (size * aspect).round().max(1.0),
            _ => size,
        };
        let height = size;

        let max = max_dimension as f64;
        if width > max || height > max {
            return Err(RenderError::invalid_request(format!(
                "resolved image {width}x{height} exceeds the {max_dimension}px limit"
            )));
        }

        let fov_degrees = match self.fov {
            Some(fov) if fov < 0.0 || fov >= 180.0 => {
                return Err(RenderError::invalid_request(format!(
                    "fov must be between 0 and 180 degrees, got {fov}"
                )));
            }
            Some(fov) if fov > 0.0 => fov as f32,
            _ => DEFAULT_FOV_DEGREES,
        };

        let color = match self.color {
            Some(c) => Color::from_srgb(c.x as f32, c.y as f32, c.z as f32).scaled(c.w as f32),
            None => Color::from_srgb_hex(DEFAULT_COLOR_HEX),
        };

        Ok(RenderParams {
            width: width as u32,
            height: height as u32,
            color,
            fov_degrees,
            time_ms: self.time.unwrap_or(elapsed_ms),
        })
    }
}
