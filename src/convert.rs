use ffmpeg_next::{format::Pixel, frame, software::scaling};

use crate::{error::EncodeError, image::RawImage};

/// Row alignment imposed by the encoder's memory model.
const FRAME_ALIGN: i32 = 32;

/// Allocates a frame with `FRAME_ALIGN`-byte row alignment, surfacing
/// allocation failure instead of discarding the `av_frame_get_buffer` result
/// like `frame::Video::new` does.
pub(crate) fn alloc_frame(
    format: Pixel,
    width: u32,
    height: u32,
) -> Result<frame::Video, EncodeError> {
    let mut frame = frame::Video::empty();
    unsafe {
        let ptr = frame.as_mut_ptr();
        (*ptr).format = Into::<ffmpeg_next::ffi::AVPixelFormat>::into(format) as i32;
        (*ptr).width = width as i32;
        (*ptr).height = height as i32;
        let ret = ffmpeg_next::ffi::av_frame_get_buffer(ptr, FRAME_ALIGN);
        if ret < 0 {
            return Err(EncodeError::Allocation(ffmpeg_next::Error::from(ret)));
        }
    }
    Ok(frame)
}

/// Scale/format stage between the source layout and the encoder layout.
///
/// Stateful only in that the scaling context and the two working frames are
/// cached for the geometry they were built for; `matches` guards reuse.
pub struct FormatConverter {
    context: scaling::Context,
    src_width: u32,
    src_height: u32,
    src_format: Pixel,
    /// Aligned copy of the source; the caller's buffer carries no alignment
    /// guarantee.
    aligned: frame::Video,
    /// Encoder-layout frame at the configured encode geometry.
    converted: frame::Video,
}

impl FormatConverter {
    pub fn new(
        src_width: u32,
        src_height: u32,
        src_format: Pixel,
        dst_width: u32,
        dst_height: u32,
        dst_format: Pixel,
    ) -> Result<Self, EncodeError> {
        let context = scaling::Context::get(
            src_format,
            src_width,
            src_height,
            dst_format,
            dst_width,
            dst_height,
            scaling::flag::Flags::empty(),
        )
        .map_err(EncodeError::Open)?;
        let aligned = alloc_frame(src_format, src_width, src_height)?;
        let converted = alloc_frame(dst_format, dst_width, dst_height)?;
        Ok(Self {
            context,
            src_width,
            src_height,
            src_format,
            aligned,
            converted,
        })
    }

    pub fn matches(&self, width: u32, height: u32, format: Pixel) -> bool {
        self.src_width == width && self.src_height == height && self.src_format == format
    }

    /// Copies the unaligned source rows into the aligned working frame, then
    /// scales/converts into the encoder-layout frame and returns it.
    pub fn run(&mut self, image: &RawImage) -> Result<&mut frame::Video, EncodeError> {
        let row = image.row_bytes();
        let dst_stride = self.aligned.stride(0);
        {
            let dst = self.aligned.data_mut(0);
            for y in 0..image.height as usize {
                let src = &image.data[y * image.stride..y * image.stride + row];
                dst[y * dst_stride..y * dst_stride + row].copy_from_slice(src);
            }
        }
        let Self {
            context,
            aligned,
            converted,
            ..
        } = self;
        context.run(aligned, converted).map_err(EncodeError::Encode)?;
        Ok(&mut self.converted)
    }
}

unsafe impl Send for FormatConverter {}
