use bytes::Bytes;

use crate::{
    error::EnvelopeError,
    packet::{EncodedPacket, NO_TIMESTAMP, SideData},
};

fn sample_packet() -> EncodedPacket {
    EncodedPacket {
        buffer: Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8]),
        payload: Bytes::from_static(&[1, 2, 3, 4, 5]),
        pts: 42,
        dts: 40,
        stream_index: 0,
        flags: 1,
        side_data: vec![],
        duration: 3000,
        pos: -1,
    }
}

#[test]
fn envelope_length_matches_formula() {
    let mut packet = sample_packet();
    packet.side_data = vec![
        SideData {
            kind: 1,
            data: Bytes::from_static(&[0; 4]),
        },
        SideData {
            kind: 2,
            data: Bytes::from_static(&[0; 16]),
        },
    ];
    // 4 + capacity + 4 + payload + 8 + 8 + 4 + 4 + 4 + sum(4 + 4 + size) + 8 + 8
    let expected = 4 + packet.buffer.len()
        + 4
        + packet.payload.len()
        + 8
        + 8
        + 4
        + 4
        + 4
        + (4 + 4 + 4)
        + (4 + 4 + 16)
        + 8
        + 8;
    assert_eq!(packet.encoded_len(), expected);
    assert_eq!(packet.to_envelope().len(), expected);
}

#[test]
fn round_trip_without_side_data() {
    let packet = sample_packet();
    let envelope = packet.to_envelope();
    let decoded = EncodedPacket::from_envelope(&envelope).unwrap();
    assert_eq!(decoded, packet);
    assert!(decoded.side_data.is_empty());
}

#[test]
fn round_trip_with_side_data_sizes_4_16_0() {
    let mut packet = sample_packet();
    packet.side_data = vec![
        SideData {
            kind: 7,
            data: Bytes::from_static(&[9, 8, 7, 6]),
        },
        SideData {
            kind: 3,
            data: Bytes::from(vec![0xAB; 16]),
        },
        SideData {
            kind: 0,
            data: Bytes::new(),
        },
    ];
    let decoded = EncodedPacket::from_envelope(&packet.to_envelope()).unwrap();
    assert_eq!(decoded.side_data.len(), 3);
    assert_eq!(decoded, packet);
}

#[test]
fn payload_may_be_shorter_than_buffer_capacity() {
    let packet = sample_packet();
    assert!(packet.payload.len() < packet.buffer.len());
    let decoded = EncodedPacket::from_envelope(&packet.to_envelope()).unwrap();
    assert_eq!(decoded.buffer.len(), 8);
    assert_eq!(decoded.payload.len(), 5);
}

#[test]
fn unset_timestamps_survive() {
    let mut packet = sample_packet();
    packet.pts = NO_TIMESTAMP;
    packet.dts = NO_TIMESTAMP;
    let decoded = EncodedPacket::from_envelope(&packet.to_envelope()).unwrap();
    assert_eq!(decoded.pts, NO_TIMESTAMP);
    assert_eq!(decoded.dts, NO_TIMESTAMP);
}

#[test]
fn keyframe_flag_round_trips() {
    let packet = sample_packet();
    assert!(packet.is_key());
    let decoded = EncodedPacket::from_envelope(&packet.to_envelope()).unwrap();
    assert!(decoded.is_key());
}

#[test]
fn truncated_envelope_is_rejected() {
    let envelope = sample_packet().to_envelope();
    for cut in [0, 3, 4, envelope.len() / 2, envelope.len() - 1] {
        let err = EncodedPacket::from_envelope(&envelope[..cut]).unwrap_err();
        assert!(
            matches!(err, EnvelopeError::Truncated { .. }),
            "cut at {}: {:?}",
            cut,
            err
        );
    }
}

#[test]
fn negative_length_is_rejected() {
    let mut envelope = sample_packet().to_envelope().to_vec();
    envelope[..4].copy_from_slice(&(-1i32).to_ne_bytes());
    let err = EncodedPacket::from_envelope(&envelope).unwrap_err();
    assert!(matches!(
        err,
        EnvelopeError::NegativeLength { value: -1, .. }
    ));
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut envelope = sample_packet().to_envelope().to_vec();
    envelope.push(0);
    let err = EncodedPacket::from_envelope(&envelope).unwrap_err();
    assert_eq!(err, EnvelopeError::TrailingBytes(1));
}
