use bytes::Bytes;
use ffmpeg_next::ffi;
use ffmpeg_next::packet::Ref;

/// Sentinel for an unset pts/dts; passes the rescale step untouched and goes
/// on the wire as-is.
pub const NO_TIMESTAMP: i64 = ffi::AV_NOPTS_VALUE;

/// Type-tagged auxiliary blob attached to a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideData {
    pub kind: i32,
    pub data: Bytes,
}

/// One compressed output unit, detached from the encoder-owned storage so it
/// outlives the drain loop iteration that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPacket {
    /// Full contents of the encoder-owned buffer; its capacity may exceed the
    /// logical payload (FFmpeg pads packet buffers).
    pub buffer: Bytes,
    /// Logical packet payload.
    pub payload: Bytes,
    pub pts: i64,
    pub dts: i64,
    pub stream_index: i32,
    pub flags: i32,
    /// Ordered as the encoder emitted them; may be empty.
    pub side_data: Vec<SideData>,
    pub duration: i64,
    /// Byte offset marker, -1 when unknown.
    pub pos: i64,
}

impl EncodedPacket {
    pub fn is_key(&self) -> bool {
        self.flags & ffi::AV_PKT_FLAG_KEY as i32 != 0
    }

    /// Copies every field out of an encoder-owned packet. The payload carries
    /// the dereferenced packet bytes; see DESIGN.md on the pointer-copy
    /// question.
    pub(crate) fn from_av(packet: &ffmpeg_next::codec::packet::Packet) -> Self {
        let av = unsafe { &*packet.as_ptr() };
        let buffer = if av.buf.is_null() {
            Bytes::new()
        } else {
            let buf = unsafe { &*av.buf };
            if buf.data.is_null() || buf.size == 0 {
                Bytes::new()
            } else {
                Bytes::copy_from_slice(unsafe { std::slice::from_raw_parts(buf.data, buf.size) })
            }
        };
        let payload = packet.data().map(Bytes::copy_from_slice).unwrap_or_default();

        let elems = av.side_data_elems.max(0) as usize;
        let mut side_data = Vec::with_capacity(elems);
        for i in 0..elems {
            let sd = unsafe { &*av.side_data.add(i) };
            let data = if sd.data.is_null() || sd.size == 0 {
                Bytes::new()
            } else {
                Bytes::copy_from_slice(unsafe { std::slice::from_raw_parts(sd.data, sd.size) })
            };
            side_data.push(SideData {
                kind: sd.type_ as i32,
                data,
            });
        }

        Self {
            buffer,
            payload,
            pts: av.pts,
            dts: av.dts,
            stream_index: av.stream_index,
            flags: av.flags,
            side_data,
            duration: av.duration,
            pos: av.pos,
        }
    }
}
