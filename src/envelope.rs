//! Binary envelope for one encoded packet.
//!
//! Native byte order, fixed-width integers, strict field order:
//! capacity:i32, buffer bytes, payload_size:i32, payload bytes, pts:i64,
//! dts:i64, stream_index:i32, flags:i32, side_data_count:i32, then per
//! side-data entry {size:i32, kind:i32, bytes}, duration:i64, pos:i64.
//! A receiver must decode in exactly this order to interoperate.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::EnvelopeError,
    packet::{EncodedPacket, SideData},
};

impl EncodedPacket {
    /// Exact serialized length; the destination buffer is sized to this
    /// before any write.
    pub fn encoded_len(&self) -> usize {
        let mut len = 4 + self.buffer.len()    // capacity + buffer bytes
            + 4 + self.payload.len()           // payload size + payload bytes
            + 8 + 8                            // pts, dts
            + 4 + 4                            // stream_index, flags
            + 4                                // side data count
            + 8 + 8; // duration, pos
        for sd in &self.side_data {
            len += 4 + 4 + sd.data.len();
        }
        len
    }

    /// Serializes into a flat envelope. Deterministic, pure in the packet's
    /// fields.
    pub fn to_envelope(&self) -> Bytes {
        let total = self.encoded_len();
        let mut buf = BytesMut::with_capacity(total);
        buf.put_i32_ne(self.buffer.len() as i32);
        buf.put_slice(&self.buffer);
        buf.put_i32_ne(self.payload.len() as i32);
        buf.put_slice(&self.payload);
        buf.put_i64_ne(self.pts);
        buf.put_i64_ne(self.dts);
        buf.put_i32_ne(self.stream_index);
        buf.put_i32_ne(self.flags);
        buf.put_i32_ne(self.side_data.len() as i32);
        for sd in &self.side_data {
            buf.put_i32_ne(sd.data.len() as i32);
            buf.put_i32_ne(sd.kind);
            buf.put_slice(&sd.data);
        }
        buf.put_i64_ne(self.duration);
        buf.put_i64_ne(self.pos);
        debug_assert_eq!(buf.len(), total);
        buf.freeze()
    }

    /// Parses an envelope, strictly in field order with exact widths. A
    /// truncated or malformed envelope is rejected whole.
    pub fn from_envelope(envelope: &[u8]) -> Result<Self, EnvelopeError> {
        let mut r = Reader { buf: envelope };
        let capacity = r.length("buffer capacity")?;
        let buffer = r.bytes("buffer", capacity)?;
        let payload_size = r.length("payload size")?;
        let payload = r.bytes("payload", payload_size)?;
        let pts = r.i64("pts")?;
        let dts = r.i64("dts")?;
        let stream_index = r.i32("stream index")?;
        let flags = r.i32("flags")?;
        let count = r.length("side data count")?;
        let mut side_data = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let size = r.length("side data size")?;
            let kind = r.i32("side data type")?;
            let data = r.bytes("side data", size)?;
            side_data.push(SideData { kind, data });
        }
        let duration = r.i64("duration")?;
        let pos = r.i64("pos")?;
        if !r.buf.is_empty() {
            return Err(EnvelopeError::TrailingBytes(r.buf.len()));
        }
        Ok(Self {
            buffer,
            payload,
            pts,
            dts,
            stream_index,
            flags,
            side_data,
            duration,
            pos,
        })
    }
}

/// Bounds-checked cursor over envelope bytes.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], EnvelopeError> {
        if self.buf.len() < n {
            return Err(EnvelopeError::Truncated {
                field,
                need: n - self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, EnvelopeError> {
        let raw = self.take(field, 4)?;
        let mut b = [0u8; 4];
        b.copy_from_slice(raw);
        Ok(i32::from_ne_bytes(b))
    }

    fn i64(&mut self, field: &'static str) -> Result<i64, EnvelopeError> {
        let raw = self.take(field, 8)?;
        let mut b = [0u8; 8];
        b.copy_from_slice(raw);
        Ok(i64::from_ne_bytes(b))
    }

    /// A length field; negative values are malformed.
    fn length(&mut self, field: &'static str) -> Result<usize, EnvelopeError> {
        let value = self.i32(field)?;
        if value < 0 {
            return Err(EnvelopeError::NegativeLength { field, value });
        }
        Ok(value as usize)
    }

    fn bytes(&mut self, field: &'static str, n: usize) -> Result<Bytes, EnvelopeError> {
        Ok(Bytes::copy_from_slice(self.take(field, n)?))
    }
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod envelope_test;
