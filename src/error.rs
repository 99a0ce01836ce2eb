use std::time::Duration;

use crate::image::PixelLayout;

/// Fatal pipeline errors. Transient encoder backpressure (EAGAIN) is retried
/// internally and never reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The encoder requires even, non-zero dimensions.
    #[error("frame dimensions {width}x{height} must be even and non-zero")]
    OddGeometry { width: u32, height: u32 },

    #[error("no pixel format descriptor for source layout {0:?}")]
    BadSourceLayout(PixelLayout),

    #[error(
        "frame geometry changed after configuration: {from_width}x{from_height} -> {to_width}x{to_height}"
    )]
    GeometryChanged {
        from_width: u32,
        from_height: u32,
        to_width: u32,
        to_height: u32,
    },

    #[error("image stride {stride} smaller than row size {row}")]
    BadStride { stride: usize, row: usize },

    #[error("image buffer too small: need {need} bytes, have {have}")]
    ShortBuffer { need: usize, have: usize },

    #[error("encoder codec not found: {0}")]
    CodecNotFound(String),

    #[error("failed to open encoder: {0}")]
    Open(#[source] ffmpeg_next::Error),

    #[error("failed to allocate working frame: {0}")]
    Allocation(#[source] ffmpeg_next::Error),

    /// The encoder refused input past the configured submit deadline.
    #[error("encoder stalled, refused input for {waited:?}")]
    Stalled { waited: Duration },

    #[error("encode failed: {0}")]
    Encode(#[source] ffmpeg_next::Error),
}

/// Decode-side wire format violations. A malformed envelope is rejected as a
/// whole, never partially applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("envelope truncated reading {field}: {need} more bytes required")]
    Truncated { field: &'static str, need: usize },

    #[error("negative {field}: {value}")]
    NegativeLength { field: &'static str, value: i32 },

    #[error("{0} trailing bytes after envelope")]
    TrailingBytes(usize),
}
