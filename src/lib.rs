//! Encodes raw RGB frames into an H.265 bitstream and frames each compressed
//! packet into a flat, self-describing envelope for a message-passing
//! transport. The encoder itself is FFmpeg; this crate owns the lazy
//! configuration, format conversion, submit/drain protocol and the wire
//! format.

/// Registers FFmpeg components. Call once at startup before encoding.
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

pub mod convert;
pub mod envelope;
pub mod error;
pub mod image;
pub mod packet;
pub mod pipeline;
pub mod session;
pub mod task;
