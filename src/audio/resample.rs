// Format conversion for the mixing pipeline.
//
// Conversion is expressed as an ordered list of strategies tried in sequence.
// The FFT resampler gives the best quality but can reject a conversion; the
// linear interpolator accepts anything; raw copy is the terminal fallback that
// keeps the native format rather than aborting.

use anyhow::{Context, Result};
use tracing::warn;

use super::backend::NativeFormat;

/// A single way of converting audio between formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStrategy {
    /// Input already matches the target
    PassThrough,
    /// High-quality FFT resampler (rubato)
    RubatoFft,
    /// Linear interpolation, lower quality but accepts any rate pair
    Linear,
    /// Samples kept in their native format; target not reached
    RawCopy,
}

impl std::fmt::Display for ConversionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConversionStrategy::PassThrough => "pass-through",
            ConversionStrategy::RubatoFft => "fft",
            ConversionStrategy::Linear => "linear",
            ConversionStrategy::RawCopy => "raw-copy",
        };
        f.write_str(name)
    }
}

/// Result of running the conversion chain on one stream.
pub struct Converted {
    pub samples: Vec<i16>,
    /// Format the samples are actually in afterwards. Equals the target
    /// unless the chain fell through to `RawCopy`.
    pub format: NativeFormat,
    pub strategy: ConversionStrategy,
}

/// Default strategy order: high quality first, broad compatibility second.
const DEFAULT_CHAIN: &[ConversionStrategy] =
    &[ConversionStrategy::RubatoFft, ConversionStrategy::Linear];

/// Convert interleaved samples from `from` into `target`, degrading through
/// the default strategy chain. Never fails: if every resampler rejects the
/// conversion the samples come back untouched, tagged `RawCopy`.
pub fn convert_to(samples: &[i16], from: NativeFormat, target: NativeFormat) -> Converted {
    convert_with(samples, from, target, DEFAULT_CHAIN)
}

/// Like [`convert_to`] with an explicit strategy order.
pub fn convert_with(
    samples: &[i16],
    from: NativeFormat,
    target: NativeFormat,
    strategies: &[ConversionStrategy],
) -> Converted {
    if from.sample_rate == target.sample_rate && from.channels == target.channels {
        return Converted {
            samples: samples.to_vec(),
            format: target,
            strategy: ConversionStrategy::PassThrough,
        };
    }

    let adapted = adapt_channels(samples, from.channels, target.channels);

    for &strategy in strategies {
        let attempt = match strategy {
            ConversionStrategy::RubatoFft => resample_fft(
                &adapted,
                from.sample_rate,
                target.sample_rate,
                target.channels,
            ),
            ConversionStrategy::Linear => resample_linear(
                &adapted,
                from.sample_rate,
                target.sample_rate,
                target.channels,
            ),
            ConversionStrategy::PassThrough | ConversionStrategy::RawCopy => continue,
        };

        match attempt {
            Ok(resampled) => {
                return Converted {
                    samples: resampled,
                    format: target,
                    strategy,
                };
            }
            Err(e) => {
                warn!(
                    "{} resampler rejected {} -> {}: {}",
                    strategy, from, target, e
                );
            }
        }
    }

    Converted {
        samples: samples.to_vec(),
        format: from,
        strategy: ConversionStrategy::RawCopy,
    }
}

/// Adapt the channel count of interleaved samples. Downmix averages across
/// all input channels; upmix from mono duplicates; anything else goes through
/// mono first.
fn adapt_channels(samples: &[i16], from: u16, to: u16) -> Vec<i16> {
    if from == to {
        return samples.to_vec();
    }

    let mono: Vec<i16> = samples
        .chunks(from as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect();

    if to == 1 {
        return mono;
    }

    let mut out = Vec::with_capacity(mono.len() * to as usize);
    for sample in mono {
        for _ in 0..to {
            out.push(sample);
        }
    }
    out
}

/// Resample with rubato's FFT resampler, processing fixed-size chunks per
/// channel and zero-padding the tail chunk.
fn resample_fft(samples: &[i16], from_rate: u32, to_rate: u32, channels: u16) -> Result<Vec<i16>> {
    use rubato::{FftFixedIn, Resampler};

    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let channels = channels.max(1) as usize;

    // Deinterleave into per-channel f32 buffers
    let mut planes: Vec<Vec<f32>> = vec![Vec::new(); channels];
    for frame in samples.chunks(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            planes[ch].push(sample as f32 / 32768.0);
        }
    }
    let frames_in = planes[0].len();

    let mut resampler = FftFixedIn::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        1024, // chunk size
        2,    // sub-chunks
        channels,
    )
    .context("Failed to create resampler")?;

    let chunk_size = resampler.input_frames_max();
    let mut out_planes: Vec<Vec<f32>> = vec![Vec::new(); channels];

    let mut pos = 0;
    while pos < frames_in {
        let end = (pos + chunk_size).min(frames_in);
        let mut chunk: Vec<Vec<f32>> = planes
            .iter()
            .map(|plane| plane[pos..end].to_vec())
            .collect();
        for plane in &mut chunk {
            plane.resize(chunk_size, 0.0);
        }

        let result = resampler.process(&chunk, None).context("Resampling failed")?;
        for (ch, plane) in result.into_iter().enumerate() {
            out_planes[ch].extend_from_slice(&plane);
        }

        pos = end;
    }

    // Reinterleave and clamp back to i16
    let frames_out = out_planes[0].len();
    let mut out = Vec::with_capacity(frames_out * channels);
    for i in 0..frames_out {
        for plane in &out_planes {
            let scaled = (plane[i] * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32);
            out.push(scaled as i16);
        }
    }

    Ok(out)
}

/// Linear-interpolation resampler. Lower quality than the FFT path but has no
/// constraints on the rate pair.
fn resample_linear(
    samples: &[i16],
    from_rate: u32,
    to_rate: u32,
    channels: u16,
) -> Result<Vec<i16>> {
    if from_rate == 0 || to_rate == 0 {
        anyhow::bail!("sample rates must be nonzero");
    }
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let channels = channels.max(1) as usize;
    let frames_in = samples.len() / channels;
    if frames_in == 0 {
        return Ok(Vec::new());
    }

    let frames_out = (frames_in as u64 * to_rate as u64 / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;

    let mut out = Vec::with_capacity(frames_out * channels);
    for i in 0..frames_out {
        let pos = i as f64 * step;
        let base = pos as usize;
        let frac = pos - base as f64;
        let next = (base + 1).min(frames_in - 1);

        for ch in 0..channels {
            let a = samples[base * channels + ch] as f64;
            let b = samples[next * channels + ch] as f64;
            out.push((a + (b - a) * frac).round() as i16);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(rate: u32, channels: u16) -> NativeFormat {
        NativeFormat {
            sample_rate: rate,
            bits_per_sample: 16,
            channels,
        }
    }

    #[test]
    fn test_pass_through_when_formats_match() {
        let samples = vec![1, 2, 3, 4];
        let converted = convert_to(&samples, fmt(44100, 2), fmt(44100, 2));
        assert_eq!(converted.strategy, ConversionStrategy::PassThrough);
        assert_eq!(converted.samples, samples);
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let samples = vec![100, 200, -50, 50];
        let mono = adapt_channels(&samples, 2, 1);
        assert_eq!(mono, vec![150, 0]);
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        let samples = vec![7, -7];
        let stereo = adapt_channels(&samples, 1, 2);
        assert_eq!(stereo, vec![7, 7, -7, -7]);
    }

    #[test]
    fn test_linear_resample_halves_duration_in_samples() {
        let samples: Vec<i16> = (0..1000).map(|i| (i % 100) as i16).collect();
        let out = resample_linear(&samples, 32000, 16000, 1).unwrap();
        assert_eq!(out.len(), 500);
    }

    #[test]
    fn test_linear_resample_upsamples() {
        let samples = vec![0i16, 100, 200, 300];
        let out = resample_linear(&samples, 8000, 16000, 1).unwrap();
        assert_eq!(out.len(), 8);
        // Interpolated midpoints sit between their neighbors
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 50);
        assert_eq!(out[2], 100);
    }

    #[test]
    fn test_fallback_chain_reaches_linear() {
        // A chain starting after the FFT strategy behaves like a forced
        // FFT failure: linear output must still land in the target format.
        let samples: Vec<i16> = (0..4800).map(|i| (i % 64) as i16).collect();
        let converted = convert_with(
            &samples,
            fmt(48000, 1),
            fmt(16000, 1),
            &[ConversionStrategy::Linear],
        );
        assert_eq!(converted.strategy, ConversionStrategy::Linear);
        assert_eq!(converted.format, fmt(16000, 1));
        assert_eq!(converted.samples.len(), 1600);
    }

    #[test]
    fn test_empty_chain_falls_back_to_raw_copy() {
        let samples = vec![1, 2, 3, 4];
        let converted = convert_with(&samples, fmt(48000, 1), fmt(16000, 1), &[]);
        assert_eq!(converted.strategy, ConversionStrategy::RawCopy);
        assert_eq!(converted.format, fmt(48000, 1));
        assert_eq!(converted.samples, samples);
    }

    #[test]
    fn test_fft_resample_duration_ratio() {
        // 48k -> 16k on one second of audio should come out near 16000
        // frames; the FFT chunking may pad the tail with silence.
        let samples: Vec<i16> = (0..48000)
            .map(|i| ((i as f64 * 0.05).sin() * 10000.0) as i16)
            .collect();
        let out = resample_fft(&samples, 48000, 16000, 1).unwrap();
        assert!(
            out.len() >= 16000 && out.len() < 16000 + 2048,
            "unexpected output length {}",
            out.len()
        );
    }
}
