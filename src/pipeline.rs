use std::sync::Mutex;

use bytes::Bytes;

use crate::{
    error::EncodeError,
    image::RawImage,
    session::{EncoderSession, Settings},
};

/// Per-frame orchestrator: convert, encode, drain, serialize, emit, all under
/// one lock so at most one frame is in flight even with concurrent callers.
pub struct Pipeline {
    session: Mutex<EncoderSession>,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self {
            session: Mutex::new(EncoderSession::new(settings)),
        }
    }

    /// Encodes `image` and hands every resulting envelope to `publish_fn` in
    /// encoder emission order. Returns the number of envelopes emitted; zero
    /// is normal while the encoder buffers look-ahead frames.
    pub fn publish<F>(&self, image: &RawImage, mut publish_fn: F) -> Result<usize, EncodeError>
    where
        F: FnMut(Bytes),
    {
        let mut session = self.lock();
        let mut emitted = 0usize;
        session.encode(image, &mut |packet| {
            publish_fn(packet.to_envelope());
            emitted += 1;
        })?;
        Ok(emitted)
    }

    /// Flushes buffered packets out of the encoder at end of stream.
    pub fn finish<F>(&self, mut publish_fn: F) -> Result<usize, EncodeError>
    where
        F: FnMut(Bytes),
    {
        let mut session = self.lock();
        let mut emitted = 0usize;
        session.finish(&mut |packet| {
            publish_fn(packet.to_envelope());
            emitted += 1;
        })?;
        Ok(emitted)
    }

    pub fn is_configured(&self) -> bool {
        self.lock().is_configured()
    }

    pub fn geometry(&self) -> Option<(u32, u32)> {
        self.lock().geometry()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EncoderSession> {
        // A poisoned lock means a panic mid-encode; the session still reports
        // coherent errors on the next call.
        self.session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
