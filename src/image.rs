use bytes::Bytes;

use crate::error::EncodeError;

/// Packed 3-byte source pixel layouts accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb24,
    Bgr24,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        3
    }

    pub(crate) fn to_av(self) -> ffmpeg_next::format::Pixel {
        match self {
            PixelLayout::Rgb24 => ffmpeg_next::format::Pixel::RGB24,
            PixelLayout::Bgr24 => ffmpeg_next::format::Pixel::BGR24,
        }
    }
}

/// One uncompressed input frame, row-major with optional row padding.
/// Immutable once built; the pipeline borrows it for a single publish call.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    /// Bytes per row, including any padding.
    pub stride: usize,
    pub data: Bytes,
}

impl RawImage {
    /// A tightly packed image (stride == width * bytes-per-pixel).
    pub fn packed(width: u32, height: u32, layout: PixelLayout, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            layout,
            stride: width as usize * layout.bytes_per_pixel(),
            data: data.into(),
        }
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    /// The buffer must cover every row at the declared stride.
    pub(crate) fn validate(&self) -> Result<(), EncodeError> {
        let row = self.row_bytes();
        if self.stride < row {
            return Err(EncodeError::BadStride {
                stride: self.stride,
                row,
            });
        }
        let need = match self.height as usize {
            0 => 0,
            h => (h - 1) * self.stride + row,
        };
        if self.data.len() < need {
            return Err(EncodeError::ShortBuffer {
                need,
                have: self.data.len(),
            });
        }
        Ok(())
    }
}
