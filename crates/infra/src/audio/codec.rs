//! WAV codec backed by `hound`
//!
//! Reads 8 to 32 bit integer PCM and 32-bit float, always producing
//! `f32` samples in [-1, 1). Writes 32-bit float so rendered output is
//! never clipped or requantized on the way to disk.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use lofi_core::domain::audio::{AudioBuffer, AudioCodec, AudioError, Result, SampleRate};
use std::path::Path;
use tracing::{debug, info};

fn codec_error(path: &Path, err: impl std::fmt::Display) -> AudioError {
    AudioError::Codec(format!("{}: {}", path.display(), err))
}

/// WAV file reader/writer
#[derive(Debug, Clone, Copy, Default)]
pub struct WavCodec;

impl WavCodec {
    pub fn new() -> Self {
        Self
    }

    fn read_samples<R: std::io::Read>(reader: WavReader<R>, path: &Path) -> Result<Vec<f32>> {
        let spec = reader.spec();
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, bits @ 1..=32) => {
                let scale = 1.0 / (1u64 << (bits - 1)) as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| (f64::from(v) * scale) as f32))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| codec_error(path, e))
            }
            (SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| codec_error(path, e)),
            (format, bits) => Err(codec_error(
                path,
                format!("unsupported sample format {:?} at {} bits", format, bits),
            )),
        }
    }
}

impl AudioCodec for WavCodec {
    fn load(&self, path: &Path) -> Result<(AudioBuffer, SampleRate)> {
        let reader = WavReader::open(path).map_err(|e| codec_error(path, e))?;
        let spec = reader.spec();

        debug!(
            "Decoding {}: {} ch, {} Hz, {} bit {:?}",
            path.display(),
            spec.channels,
            spec.sample_rate,
            spec.bits_per_sample,
            spec.sample_format
        );

        let samples = Self::read_samples(reader, path)?;
        let buffer = AudioBuffer::from_interleaved(&samples, usize::from(spec.channels))?;
        let sample_rate = SampleRate::new(spec.sample_rate)?;

        info!(
            "Loaded {} ({} frames x {} channels at {})",
            path.display(),
            buffer.num_frames(),
            buffer.num_channels(),
            sample_rate
        );
        Ok((buffer, sample_rate))
    }

    fn save(&self, path: &Path, buffer: &AudioBuffer, sample_rate: SampleRate) -> Result<()> {
        let channels = u16::try_from(buffer.num_channels())
            .map_err(|_| codec_error(path, "too many channels for WAV"))?;

        let spec = WavSpec {
            channels,
            sample_rate: sample_rate.hz(),
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };

        let mut writer = WavWriter::create(path, spec).map_err(|e| codec_error(path, e))?;
        for sample in buffer.to_interleaved() {
            writer
                .write_sample(sample)
                .map_err(|e| codec_error(path, e))?;
        }
        writer.finalize().map_err(|e| codec_error(path, e))?;

        info!(
            "Wrote {} ({} frames x {} channels)",
            path.display(),
            buffer.num_frames(),
            buffer.num_channels()
        );
        Ok(())
    }
}
