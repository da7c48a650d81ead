// error.rs — 查看器错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    /// Malformed or zero-sized input, reported before any GPU allocation.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The offscreen target could not be allocated or rendered into.
    #[error("render target error: {0}")]
    RenderTarget(String),

    #[error("unsupported cubemap layout for a {width}x{height} image")]
    UnsupportedFormat { width: u32, height: u32 },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("GPU initialization failed: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, ViewError>;
