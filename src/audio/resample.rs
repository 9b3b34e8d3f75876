//! Offline sample-rate conversion using rubato
//!
//! Converts inbound synthesized speech from the provider rate to the local
//! output rate. Never invoked on a device callback; a fresh resampler is
//! built per call, sized to the whole buffer.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::{Error, Result};

/// Resample 16-bit PCM between two fixed sample rates
///
/// Equal rates return the input unchanged. Otherwise the samples are
/// normalized to float, rendered through a band-limited polynomial pass, and
/// requantized with clamping and round-to-nearest. Output length is exactly
/// `ceil(len * target_rate / source_rate)`; the rendered tail is truncated or
/// padded to hold that invariant, since the interpolator is not
/// sample-accurate at the edges.
///
/// # Errors
///
/// Returns error if the resampler cannot be constructed or the render fails
pub fn resample(samples: Vec<i16>, source_rate: u32, target_rate: u32) -> Result<Vec<i16>> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples);
    }

    let ratio = f64::from(target_rate) / f64::from(source_rate);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let expected_len = (samples.len() as f64 * ratio).ceil() as usize;

    let input: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();

    let mut resampler =
        FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, input.len(), 1)
            .map_err(|e| Error::Resample(format!("resampler init failed: {e}")))?;

    let mut rendered = resampler
        .process(&[input], None)
        .map_err(|e| Error::Resample(format!("render failed: {e}")))?
        .remove(0);

    // Hold the length invariant regardless of interpolator edge behavior
    let tail = rendered.last().copied().unwrap_or(0.0);
    rendered.resize(expected_len, tail);

    #[allow(clippy::cast_possible_truncation)]
    let output = rendered
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16)
        .collect();

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn sine(rate: u32, frequency: f32, count: usize) -> Vec<i16> {
        (0..count)
            .map(|i| {
                let t = i as f32 / rate as f32;
                ((2.0 * std::f32::consts::PI * frequency * t).sin() * 16000.0) as i16
            })
            .collect()
    }

    #[test]
    fn identity_when_rates_match() {
        let input = sine(24_000, 440.0, 1024);
        let output = resample(input.clone(), 24_000, 24_000).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn upsampling_doubles_length() {
        let input = sine(8_000, 200.0, 800);
        let output = resample(input, 8_000, 16_000).unwrap();
        assert_eq!(output.len(), 1600);
    }

    #[test]
    fn downsampling_halves_length_with_ceiling() {
        let input = sine(48_000, 440.0, 1001);
        let output = resample(input, 48_000, 24_000).unwrap();
        // ceil(1001 / 2)
        assert_eq!(output.len(), 501);
    }

    #[test]
    fn output_stays_in_amplitude_range() {
        let input = vec![32767_i16; 2400];
        let output = resample(input, 24_000, 48_000).unwrap();
        assert!(output.iter().all(|&s| (-32768..=32767).contains(&s)));
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(resample(Vec::new(), 24_000, 48_000).unwrap().is_empty());
    }
}
