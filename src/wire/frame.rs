//! Outbound binary audio frame
//!
//! Layout:
//!
//! ```text
//! offset 0  : u16 big-endian   source type (microphone = 1)
//! offset 2  : u64 big-endian   capture timestamp, ms since epoch
//! offset 10 : N×2 bytes        little-endian i16 PCM samples
//! ```

use std::io::Cursor;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{Error, Result};

/// Source type identifier for microphone capture
pub const SOURCE_MICROPHONE: u16 = 1;

/// Byte length of the frame header
pub const FRAME_HEADER_LEN: usize = 10;

/// One batched block of captured audio, ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Capture source identifier
    pub source_type: u16,
    /// Timestamp at frame assembly, milliseconds since epoch
    pub timestamp_ms: u64,
    /// Whole samples only; concatenated capture segments
    pub payload: Vec<i16>,
}

impl OutboundFrame {
    /// Assemble a frame stamped with the current wall-clock time
    #[must_use]
    pub fn now(source_type: u16, payload: Vec<i16>) -> Self {
        #[allow(clippy::cast_sign_loss)]
        let timestamp_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        Self {
            source_type,
            timestamp_ms,
            payload,
        }
    }

    /// Encode to wire bytes
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(FRAME_HEADER_LEN + self.payload.len() * 2);
        // Writing to a Vec cannot fail
        let _ = bytes.write_u16::<BigEndian>(self.source_type);
        let _ = bytes.write_u64::<BigEndian>(self.timestamp_ms);
        for &sample in &self.payload {
            let _ = bytes.write_i16::<LittleEndian>(sample);
        }
        bytes
    }

    /// Decode from wire bytes
    ///
    /// # Errors
    ///
    /// Returns error on a short header or a payload that is not a whole
    /// number of samples
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(Error::Codec(format!(
                "frame shorter than header: {} bytes",
                bytes.len()
            )));
        }
        if (bytes.len() - FRAME_HEADER_LEN) % 2 != 0 {
            return Err(Error::Codec("frame payload has odd byte count".to_string()));
        }

        let mut cursor = Cursor::new(bytes);
        let source_type = cursor
            .read_u16::<BigEndian>()
            .map_err(|e| Error::Codec(e.to_string()))?;
        let timestamp_ms = cursor
            .read_u64::<BigEndian>()
            .map_err(|e| Error::Codec(e.to_string()))?;

        let mut payload = Vec::with_capacity((bytes.len() - FRAME_HEADER_LEN) / 2);
        while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
            payload.push(sample);
        }

        Ok(Self {
            source_type,
            timestamp_ms,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let frame = OutboundFrame {
            source_type: SOURCE_MICROPHONE,
            timestamp_ms: 1_726_000_000_123,
            payload: vec![0, 1, -1, 32767, -32768],
        };

        let decoded = OutboundFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn header_is_big_endian() {
        let frame = OutboundFrame {
            source_type: 1,
            timestamp_ms: 0x0102_0304_0506_0708,
            payload: Vec::new(),
        };

        let bytes = frame.encode();
        assert_eq!(bytes.len(), FRAME_HEADER_LEN);
        assert_eq!(&bytes[0..2], &[0x00, 0x01]);
        assert_eq!(&bytes[2..10], &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
    }

    #[test]
    fn payload_is_little_endian() {
        let frame = OutboundFrame {
            source_type: 1,
            timestamp_ms: 0,
            payload: vec![0x0102],
        };

        let bytes = frame.encode();
        assert_eq!(&bytes[10..], &[0x02, 0x01]);
    }

    #[test]
    fn short_frame_is_rejected() {
        assert!(OutboundFrame::decode(&[0x00, 0x01, 0x02]).is_err());
    }

    #[test]
    fn odd_payload_is_rejected() {
        let mut bytes = vec![0_u8; FRAME_HEADER_LEN];
        bytes.push(0xFF);
        assert!(OutboundFrame::decode(&bytes).is_err());
    }
}
