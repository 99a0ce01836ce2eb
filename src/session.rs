use std::time::{Duration, Instant};

use ffmpeg_next::{Dictionary, Rational, format::Pixel};

use crate::{
    convert::FormatConverter, error::EncodeError, image::RawImage, packet::EncodedPacket,
};

/// Encoder configuration, applied exactly once when the first frame's
/// geometry is known. Defaults mirror realtime H.265 publishing: the
/// ultrafast preset and a high crf keep the first packet close to the first
/// frame.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Encoder name; `None` resolves any HEVC encoder by codec id.
    pub codec: Option<String>,
    pub encode_format: Pixel,
    pub frame_rate: Rational,
    /// Key (intra) frame interval, in frames.
    pub keyframe_interval: u32,
    /// Look-ahead B-frame budget.
    pub max_b_frames: usize,
    /// Reference frames available to P-frames.
    pub refs: i32,
    /// Speed/quality tier.
    pub preset: String,
    /// Constant rate factor, 0..=51; lower means higher quality.
    pub crf: u32,
    pub threads: i32,
    /// Budget for retrying a submit the encoder is not yet ready to accept.
    pub submit_deadline: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        let fps = 30;
        Self {
            codec: None,
            encode_format: Pixel::YUV420P,
            frame_rate: Rational(fps, 1),
            keyframe_interval: (fps * 2) as u32,
            max_b_frames: 3,
            refs: 3,
            preset: "ultrafast".to_string(),
            crf: 35,
            threads: 5,
            submit_deadline: Duration::from_secs(2),
        }
    }
}

struct Configured {
    encoder: ffmpeg_next::codec::encoder::Video,
    converter: FormatConverter,
    time_base: Rational,
    width: u32,
    height: u32,
    /// Next presentation timestamp, post-incremented per submitted frame.
    frame_count: i64,
}

/// Owns the encoder state for one pipeline. Lazily configured from the first
/// frame's geometry; configuration is immutable afterwards and re-entering it
/// is a no-op.
pub struct EncoderSession {
    settings: Settings,
    configured: Option<Configured>,
}

impl EncoderSession {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            configured: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured.is_some()
    }

    /// Configured encode geometry, once the first frame has been seen.
    pub fn geometry(&self) -> Option<(u32, u32)> {
        self.configured.as_ref().map(|c| (c.width, c.height))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn frames_submitted(&self) -> i64 {
        self.configured.as_ref().map_or(0, |c| c.frame_count)
    }

    /// Encodes one frame, draining every packet the encoder can currently
    /// produce into `sink` before returning. Configures the session on first
    /// use; a configuration failure leaves it unconfigured so a later frame
    /// with valid geometry may retry.
    pub fn encode(
        &mut self,
        image: &RawImage,
        sink: &mut dyn FnMut(EncodedPacket),
    ) -> Result<(), EncodeError> {
        image.validate()?;
        let deadline = self.settings.submit_deadline;

        let cfg = match &mut self.configured {
            Some(cfg) => {
                if !cfg
                    .converter
                    .matches(image.width, image.height, image.layout.to_av())
                {
                    return Err(EncodeError::GeometryChanged {
                        from_width: cfg.width,
                        from_height: cfg.height,
                        to_width: image.width,
                        to_height: image.height,
                    });
                }
                cfg
            }
            configured => configured.insert(Self::open(&self.settings, image)?),
        };
        let Configured {
            encoder,
            converter,
            time_base,
            frame_count,
            ..
        } = cfg;

        let frame = converter.run(image)?;
        frame.set_pts(Some(*frame_count));
        *frame_count += 1;

        // On EAGAIN the encoder's output queue is full: drain it, then resend
        // the same frame. The retry is bounded so a stuck encoder surfaces as
        // an error instead of spinning forever.
        let started = Instant::now();
        loop {
            match encoder.send_frame(frame) {
                Ok(()) => break,
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    Self::drain(encoder, *time_base, sink)?;
                    if started.elapsed() >= deadline {
                        return Err(EncodeError::Stalled {
                            waited: started.elapsed(),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(e) => return Err(EncodeError::Encode(e)),
            }
        }

        Self::drain(encoder, *time_base, sink)
    }

    /// Flushes the encoder: sends end-of-stream and drains the remaining
    /// packets. No-op on an unconfigured session.
    pub fn finish(&mut self, sink: &mut dyn FnMut(EncodedPacket)) -> Result<(), EncodeError> {
        let Some(cfg) = self.configured.as_mut() else {
            return Ok(());
        };
        match cfg.encoder.send_eof() {
            Ok(()) => {}
            // Already flushed.
            Err(ffmpeg_next::Error::Eof) => {}
            Err(e) => return Err(EncodeError::Encode(e)),
        }
        Self::drain(&mut cfg.encoder, cfg.time_base, sink)
    }

    fn open(settings: &Settings, image: &RawImage) -> Result<Configured, EncodeError> {
        if image.width == 0 || image.height == 0 || image.width % 2 != 0 || image.height % 2 != 0 {
            return Err(EncodeError::OddGeometry {
                width: image.width,
                height: image.height,
            });
        }

        let src_format = image.layout.to_av();
        let desc = unsafe { ffmpeg_next::ffi::av_pix_fmt_desc_get(src_format.into()) };
        if desc.is_null() {
            return Err(EncodeError::BadSourceLayout(image.layout));
        }
        // PixelLayout only admits packed 3-byte layouts; the resolved
        // descriptor must agree.
        debug_assert_eq!(unsafe { ffmpeg_next::ffi::av_get_bits_per_pixel(desc) }, 24);

        let codec = match settings.codec {
            Some(ref name) => ffmpeg_next::encoder::find_by_name(name)
                .ok_or_else(|| EncodeError::CodecNotFound(name.clone()))?,
            None => ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::HEVC)
                .ok_or_else(|| EncodeError::CodecNotFound("hevc".to_string()))?,
        };

        let context = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = context.encoder().video().map_err(EncodeError::Open)?;
        encoder.set_width(image.width);
        encoder.set_height(image.height);
        encoder.set_format(settings.encode_format);
        encoder.set_frame_rate(Some(settings.frame_rate));
        encoder.set_time_base(settings.frame_rate.invert());
        encoder.set_gop(settings.keyframe_interval);
        encoder.set_max_b_frames(settings.max_b_frames);
        unsafe {
            let ptr = encoder.as_mut_ptr();
            (*ptr).refs = settings.refs;
            (*ptr).thread_count = settings.threads;
        }

        let mut opts = Dictionary::new();
        opts.set("preset", &settings.preset);
        opts.set("crf", &settings.crf.to_string());

        let encoder = encoder.open_with(opts).map_err(EncodeError::Open)?;
        let time_base: Rational = unsafe { (*encoder.0.as_ptr()).time_base.into() };

        let converter = FormatConverter::new(
            image.width,
            image.height,
            src_format,
            image.width,
            image.height,
            settings.encode_format,
        )?;

        log::info!(
            "encoder configured: {} {}x{} {:?} <- {:?}",
            codec.name(),
            image.width,
            image.height,
            settings.encode_format,
            src_format,
        );

        Ok(Configured {
            encoder,
            converter,
            time_base,
            width: image.width,
            height: image.height,
            frame_count: 0,
        })
    }

    /// Drains packets until the encoder reports none available; each one runs
    /// the timestamp-rescale step and is handed to the sink in emission order.
    fn drain(
        encoder: &mut ffmpeg_next::codec::encoder::Video,
        time_base: Rational,
        sink: &mut dyn FnMut(EncodedPacket),
    ) -> Result<(), EncodeError> {
        loop {
            let mut packet = ffmpeg_next::codec::packet::Packet::empty();
            match encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    // Input and output timebases are identical today; the
                    // step stays so the contract holds if they diverge.
                    // Unset timestamps pass through untouched.
                    packet.rescale_ts(time_base, time_base);
                    sink(EncodedPacket::from_av(&packet));
                }
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    return Ok(());
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(()),
                Err(e) => return Err(EncodeError::Encode(e)),
            }
        }
    }
}
