use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::byte_order::{decode_f64, decode_u32, encode_f64, encode_u32};
use crate::error::{RecordError, Result};

/// Fixed header: sequence (4) + presentation time (8) + NAL length width (1).
pub const HEADER_SIZE: usize = 13;

/// Number of parameter sets carried by every record.
pub const PARAMETER_SET_COUNT: usize = 3;

const LENGTH_FIELD_SIZE: usize = 4;

/// Which of the three parameter sets a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSetKind {
    Video,
    Sequence,
    Picture,
}

impl ParameterSetKind {
    /// All kinds in wire order.
    pub const ALL: [ParameterSetKind; PARAMETER_SET_COUNT] = [
        ParameterSetKind::Video,
        ParameterSetKind::Sequence,
        ParameterSetKind::Picture,
    ];

    /// Short codec-style name (`VPS`, `SPS`, `PPS`).
    pub fn short_name(self) -> &'static str {
        match self {
            ParameterSetKind::Video => "VPS",
            ParameterSetKind::Sequence => "SPS",
            ParameterSetKind::Picture => "PPS",
        }
    }
}

impl fmt::Display for ParameterSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// The three decoder configuration blobs, in their fixed positional order.
///
/// The arity is part of the wire contract: consumers rely on the video,
/// sequence and picture sets appearing exactly once, in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSets {
    pub video: Bytes,
    pub sequence: Bytes,
    pub picture: Bytes,
}

impl ParameterSets {
    /// Create a parameter-set triple.
    pub fn new(
        video: impl Into<Bytes>,
        sequence: impl Into<Bytes>,
        picture: impl Into<Bytes>,
    ) -> Self {
        Self {
            video: video.into(),
            sequence: sequence.into(),
            picture: picture.into(),
        }
    }

    /// Borrow one parameter set by kind.
    pub fn get(&self, kind: ParameterSetKind) -> &Bytes {
        match kind {
            ParameterSetKind::Video => &self.video,
            ParameterSetKind::Sequence => &self.sequence,
            ParameterSetKind::Picture => &self.picture,
        }
    }

    /// Iterate `(kind, bytes)` in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (ParameterSetKind, &Bytes)> {
        ParameterSetKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.get(kind)))
    }

    /// Combined size of the three sets, excluding their length fields.
    pub fn total_len(&self) -> usize {
        self.video.len() + self.sequence.len() + self.picture.len()
    }
}

/// One encoded video frame plus the metadata needed to decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// Per-session counter starting at 1; used only for gap detection.
    pub sequence_number: u32,
    /// Presentation time in seconds.
    pub presentation_time: f64,
    /// Width in bytes (1, 2 or 4) of the NAL unit length prefixes.
    pub nal_unit_header_length: u8,
    pub parameter_sets: ParameterSets,
    /// One compressed access unit.
    pub payload: Bytes,
}

impl FrameRecord {
    /// Create a new frame record.
    pub fn new(
        sequence_number: u32,
        presentation_time: f64,
        nal_unit_header_length: u8,
        parameter_sets: ParameterSets,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            sequence_number,
            presentation_time,
            nal_unit_header_length,
            parameter_sets,
            payload: payload.into(),
        }
    }

    /// Serialized size of this record.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE
            + PARAMETER_SET_COUNT * LENGTH_FIELD_SIZE
            + self.parameter_sets.total_len()
            + self.payload.len()
    }

    /// Encode the record into a new buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut dst)?;
        Ok(dst.freeze())
    }

    /// Append the encoded record to `dst`.
    ///
    /// Wire format:
    /// ```text
    /// ┌─────────┬──────────┬────────┬─────────────┬─────────────┬─────────────┬───────────┐
    /// │ Seq     │ PTS      │ NALLen │ VPSLen VPS  │ SPSLen SPS  │ PPSLen PPS  │ Payload   │
    /// │ (4B BE) │ (8B BE)  │ (1B)   │ (4B BE) ... │ (4B BE) ... │ (4B BE) ... │ (rest)    │
    /// └─────────┴──────────┴────────┴─────────────┴─────────────┴─────────────┴───────────┘
    /// ```
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        for (kind, set) in self.parameter_sets.iter() {
            if u32::try_from(set.len()).is_err() {
                return Err(RecordError::ParameterSetTooLarge {
                    kind,
                    size: set.len(),
                });
            }
        }

        dst.reserve(self.encoded_len());
        dst.put_slice(&encode_u32(self.sequence_number));
        dst.put_slice(&encode_f64(self.presentation_time));
        dst.put_u8(self.nal_unit_header_length);
        for (_, set) in self.parameter_sets.iter() {
            dst.put_slice(&encode_u32(set.len() as u32));
            dst.put_slice(set);
        }
        dst.put_slice(&self.payload);
        Ok(())
    }

    /// Decode a record from one complete message body.
    ///
    /// Parameter sets and payload are zero-copy slices of `src`.
    pub fn decode(src: Bytes) -> Result<Self> {
        if src.len() < HEADER_SIZE {
            return Err(RecordError::HeaderTooShort {
                len: src.len(),
                min: HEADER_SIZE,
            });
        }

        let sequence_number = decode_u32(&src[0..4])?;
        let presentation_time = decode_f64(&src[4..12])?;
        let nal_unit_header_length = src[12];

        let mut offset = HEADER_SIZE;
        let video = read_parameter_set(&src, &mut offset, ParameterSetKind::Video)?;
        let sequence = read_parameter_set(&src, &mut offset, ParameterSetKind::Sequence)?;
        let picture = read_parameter_set(&src, &mut offset, ParameterSetKind::Picture)?;
        let payload = src.slice(offset..);

        Ok(Self {
            sequence_number,
            presentation_time,
            nal_unit_header_length,
            parameter_sets: ParameterSets {
                video,
                sequence,
                picture,
            },
            payload,
        })
    }
}

fn read_parameter_set(src: &Bytes, offset: &mut usize, kind: ParameterSetKind) -> Result<Bytes> {
    let declared = decode_u32(&src[*offset..])? as usize;
    let start = *offset + LENGTH_FIELD_SIZE;
    let remaining = src.len() - start;
    if declared > remaining {
        return Err(RecordError::ParameterSetOverrun {
            kind,
            declared,
            remaining,
        });
    }
    *offset = start + declared;
    Ok(src.slice(start..*offset))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample() -> FrameRecord {
        FrameRecord::new(
            1,
            0.0,
            4,
            ParameterSets::new(vec![0xAA], vec![0xBB, 0xBB], Vec::new()),
            vec![0x01, 0x02, 0x03],
        )
    }

    #[test]
    fn encodes_reference_layout() {
        let wire = sample().encode().unwrap();
        let expected: &[u8] = &[
            0x00, 0x00, 0x00, 0x01, // seq
            0, 0, 0, 0, 0, 0, 0, 0, // pts
            0x04, // nal length width
            0x00, 0x00, 0x00, 0x01, 0xAA, // vps
            0x00, 0x00, 0x00, 0x02, 0xBB, 0xBB, // sps
            0x00, 0x00, 0x00, 0x00, // pps
            0x01, 0x02, 0x03, // payload
        ];
        assert_eq!(wire.as_ref(), expected);
        assert_eq!(wire.len(), sample().encoded_len());
    }

    #[test]
    fn reference_layout_decodes_back() {
        let wire = sample().encode().unwrap();
        assert_eq!(FrameRecord::decode(wire).unwrap(), sample());
    }

    #[test]
    fn empty_parts_roundtrip() {
        let record = FrameRecord::new(7, 12.5, 2, ParameterSets::default(), Bytes::new());
        let wire = record.encode().unwrap();
        assert_eq!(wire.len(), HEADER_SIZE + 12);

        let decoded = FrameRecord::decode(wire).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn encode_into_appends() {
        let mut dst = BytesMut::from(&b"prefix"[..]);
        sample().encode_into(&mut dst).unwrap();
        assert_eq!(&dst[..6], b"prefix");
        assert_eq!(
            FrameRecord::decode(dst.freeze().slice(6..)).unwrap(),
            sample()
        );
    }

    #[test]
    fn rejects_short_header() {
        for len in 0..HEADER_SIZE {
            let err = FrameRecord::decode(Bytes::from(vec![0u8; len])).unwrap_err();
            assert_eq!(err, RecordError::HeaderTooShort { len, min: HEADER_SIZE });
            assert!(err.is_malformed());
        }
    }

    #[test]
    fn rejects_missing_length_field() {
        // Header only: the VPS length field is absent.
        let err = FrameRecord::decode(Bytes::from(vec![0u8; HEADER_SIZE + 2])).unwrap_err();
        assert_eq!(
            err,
            RecordError::TruncatedInput {
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn rejects_parameter_set_overrun() {
        let mut wire = BytesMut::from(sample().encode().unwrap().as_ref());
        // Declare a 255-byte SPS.
        wire[18..22].copy_from_slice(&encode_u32(255));
        let err = FrameRecord::decode(wire.freeze()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::ParameterSetOverrun {
                kind: ParameterSetKind::Sequence,
                declared: 255,
                ..
            }
        ));
    }

    #[test]
    fn rejects_truncated_record() {
        let wire = sample().encode().unwrap();
        // Cutting inside the PPS length field.
        let err = FrameRecord::decode(wire.slice(..26)).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn huge_declared_length_does_not_overflow() {
        let mut wire = BytesMut::from(sample().encode().unwrap().as_ref());
        wire[13..17].copy_from_slice(&encode_u32(u32::MAX));
        let err = FrameRecord::decode(wire.freeze()).unwrap_err();
        assert!(matches!(
            err,
            RecordError::ParameterSetOverrun {
                kind: ParameterSetKind::Video,
                ..
            }
        ));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            seq in any::<u32>(),
            pts in -1.0e9f64..1.0e9,
            nal in any::<u8>(),
            vps in proptest::collection::vec(any::<u8>(), 0..64),
            sps in proptest::collection::vec(any::<u8>(), 0..64),
            pps in proptest::collection::vec(any::<u8>(), 0..64),
            payload in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let record = FrameRecord::new(seq, pts, nal, ParameterSets::new(vps, sps, pps), payload);
            let decoded = FrameRecord::decode(record.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded, record);
        }

        #[test]
        fn decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..96)) {
            let _ = FrameRecord::decode(Bytes::from(bytes));
        }
    }
}
