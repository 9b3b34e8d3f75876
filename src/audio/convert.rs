//! Float to 16-bit PCM conversion
//!
//! Runs on the capture callback, so everything here is allocation-once and
//! branch-light.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{Error, Result};

/// Convert one block of normalized float samples to signed 16-bit PCM
///
/// Each sample is clamped to [-1, 1] first. Negative values scale by 32768
/// and non-negative values by 32767, matching the asymmetric i16 range.
/// Output length equals input length. The device driver only lends the float
/// block, so this copies into a freshly owned segment that the caller then
/// moves downstream.
#[must_use]
pub fn float_to_pcm(block: &[f32]) -> Vec<i16> {
    block
        .iter()
        .map(|&sample| {
            let sample = sample.clamp(-1.0, 1.0);
            let scaled = if sample < 0.0 {
                sample * 32768.0
            } else {
                sample * 32767.0
            };
            #[allow(clippy::cast_possible_truncation)]
            let quantized = scaled as i16;
            quantized
        })
        .collect()
}

/// Decode little-endian 16-bit PCM bytes into samples
///
/// # Errors
///
/// Returns error if the byte count is not a whole number of samples
pub fn pcm_bytes_to_samples(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(Error::Codec(format!(
            "PCM payload has odd byte count: {}",
            bytes.len()
        )));
    }

    let mut cursor = Cursor::new(bytes);
    let mut samples = Vec::with_capacity(bytes.len() / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(sample);
    }
    Ok(samples)
}

/// Encode samples as little-endian 16-bit PCM bytes
#[must_use]
pub fn pcm_samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        // Writing to a Vec cannot fail
        let _ = bytes.write_i16::<LittleEndian>(sample);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_scale_to_full_range() {
        assert_eq!(float_to_pcm(&[1.0]), vec![32767]);
        assert_eq!(float_to_pcm(&[-1.0]), vec![-32768]);
        assert_eq!(float_to_pcm(&[0.0]), vec![0]);
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        assert_eq!(float_to_pcm(&[2.5]), vec![32767]);
        assert_eq!(float_to_pcm(&[-3.0]), vec![-32768]);
    }

    #[test]
    fn output_length_matches_input() {
        let block = vec![0.25_f32; 480];
        assert_eq!(float_to_pcm(&block).len(), 480);
    }

    #[test]
    fn pcm_bytes_round_trip() {
        let samples = vec![0_i16, 1, -1, 32767, -32768];
        let bytes = pcm_samples_to_bytes(&samples);
        assert_eq!(pcm_bytes_to_samples(&bytes).unwrap(), samples);
    }

    #[test]
    fn odd_byte_count_is_rejected() {
        assert!(pcm_bytes_to_samples(&[0x01, 0x02, 0x03]).is_err());
    }
}
