//! WAV framing and PCM format conversion.

use crate::error::{RelayError, Result};
use crate::pipeline::types::PcmFormat;
use std::io::{Cursor, Read};

/// Wraps headerless little-endian 16-bit PCM in a WAV container.
pub fn pcm_to_wav(pcm: &[u8], format: PcmFormat) -> Result<Vec<u8>> {
    if format.bits_per_sample != 16 {
        return Err(RelayError::Other(format!(
            "unsupported sample width: {} bits",
            format.bits_per_sample
        )));
    }

    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
    for pair in pcm.chunks_exact(2) {
        writer
            .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
            .map_err(wav_error)?;
    }
    writer.finalize().map_err(wav_error)?;
    Ok(cursor.into_inner())
}

fn wav_error(e: hound::Error) -> RelayError {
    RelayError::Other(format!("WAV encoding failed: {e}"))
}

/// Decoded WAV content as interleaved 16-bit samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedWav {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Reads a 16-bit integer WAV stream.
pub fn read_wav(reader: impl Read) -> Result<DecodedWav> {
    let mut wav_reader = hound::WavReader::new(reader)
        .map_err(|e| RelayError::Other(format!("Failed to parse WAV file: {e}")))?;

    let spec = wav_reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(RelayError::Other(format!(
            "unsupported WAV encoding: {} bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = wav_reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| RelayError::Other(format!("Failed to read WAV samples: {e}")))?;

    Ok(DecodedWav {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

impl DecodedWav {
    /// Converts to `target`'s rate and channel count.
    pub fn convert(&self, target: PcmFormat) -> Vec<i16> {
        let mono = to_mono(&self.samples, self.channels);
        let resampled = resample(&mono, self.sample_rate, target.sample_rate);
        from_mono(&resampled, target.channels)
    }
}

/// Averages interleaved channels into one.
fn to_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Duplicates a mono signal across `channels`.
fn from_mono(samples: &[i16], channels: u16) -> Vec<i16> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .iter()
        .flat_map(|&s| std::iter::repeat_n(s, channels))
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(samples.len() - 1);
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

/// Serializes samples as little-endian bytes.
pub fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Parses little-endian bytes into samples; a trailing odd byte is ignored.
pub fn le_bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wav_data(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_pcm_to_wav_header_describes_format() {
        let pcm = samples_to_le_bytes(&[1, -1, 2, -2]);
        let wav = pcm_to_wav(&pcm, PcmFormat::default()).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + pcm.len());

        let decoded = read_wav(Cursor::new(wav)).unwrap();
        assert_eq!(decoded.sample_rate, 48_000);
        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.samples, vec![1, -1, 2, -2]);
    }

    #[test]
    fn test_pcm_to_wav_rejects_other_widths() {
        let format = PcmFormat {
            bits_per_sample: 24,
            ..PcmFormat::default()
        };
        assert!(pcm_to_wav(&[0; 6], format).is_err());
    }

    #[test]
    fn test_read_wav_rejects_garbage() {
        assert!(read_wav(Cursor::new(b"not a wav".to_vec())).is_err());
    }

    #[test]
    fn test_stereo_downmix_to_mono() {
        let decoded = read_wav(Cursor::new(make_wav_data(16000, 2, &[100, 200, 300, 400]))).unwrap();
        let target = PcmFormat {
            sample_rate: 16000,
            channels: 1,
            bits_per_sample: 16,
        };
        assert_eq!(decoded.convert(target), vec![150, 350]);
    }

    #[test]
    fn test_mono_upmix_to_stereo() {
        let decoded = read_wav(Cursor::new(make_wav_data(48000, 1, &[5, 6]))).unwrap();
        assert_eq!(decoded.convert(PcmFormat::default()), vec![5, 5, 6, 6]);
    }

    #[test]
    fn test_resample_16k_to_48k_triples_length() {
        let decoded = read_wav(Cursor::new(make_wav_data(16000, 1, &vec![1000; 16000]))).unwrap();
        let converted = decoded.convert(PcmFormat::default());
        // 1 s at 48 kHz stereo.
        assert_eq!(converted.len(), 96_000);
        assert!(converted.iter().all(|&s| s == 1000));
    }

    #[test]
    fn test_byte_sample_conversion() {
        let bytes = samples_to_le_bytes(&[0x0102, -1]);
        assert_eq!(bytes, vec![0x02, 0x01, 0xff, 0xff]);
        assert_eq!(le_bytes_to_samples(&bytes), vec![0x0102, -1]);
        assert_eq!(le_bytes_to_samples(&[1, 0, 9]), vec![1]);
    }
}
