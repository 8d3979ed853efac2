//! Error taxonomy for the render pipeline.
//!
//! Every stage of a request (scene preparation, surface creation, rendering,
//! readback, encoding) reports failures through [`RenderError`]. The HTTP
//! layer maps each variant to a status code and a client-facing message; the
//! detailed text is only logged server-side.

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The request carried parameters that cannot be rendered.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The offscreen graphics context could not be created.
    #[error("graphics context error: {0}")]
    Context(String),

    /// The rasterization pass could not be issued.
    #[error("render error: {0}")]
    Render(String),

    /// Pixel data could not be read back from the surface.
    #[error("readback error: {0}")]
    Readback(String),

    /// The frame could not be serialized as PNG.
    #[error("encode error: {0}")]
    Encode(#[from] image::ImageError),
}

impl RenderError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn readback(msg: impl Into<String>) -> Self {
        Self::Readback(msg.into())
    }

    /// Returns `true` when the failure was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }
}
