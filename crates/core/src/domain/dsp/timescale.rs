//! Time-stretch and pitch-shift stages
//!
//! Both delegate the actual algorithm to the `TimeScale` capability in the
//! render context. Channels are processed on scoped worker threads and the
//! result is cut to the shortest channel, since an implementation may
//! round each channel's length differently.
//!
//! A panicking worker is reported as `AudioError::TimeScale` only when
//! panics unwind. The release profile sets `panic = "abort"`, so there a
//! panic in a `TimeScale` implementation ends the process instead.

use crate::domain::audio::{AudioBuffer, AudioError, Result, SampleRate, TimeScale};
use crate::domain::dsp::{Effect, RenderContext};
use tracing::trace;

/// Run `op` over every channel in parallel and rebuild an equal-length buffer
fn per_channel<F>(buffer: AudioBuffer, stage: &str, op: F) -> Result<AudioBuffer>
where
    F: Fn(&[f32]) -> Result<Vec<f32>> + Sync,
{
    let channels = buffer.into_channels();
    let op = &op;

    let joined = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = channels
            .iter()
            .map(|channel| scope.spawn(move |_| op(channel)))
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(AudioError::TimeScale(format!("{stage} worker panicked"))))
            })
            .collect::<Vec<_>>()
    })
    .map_err(|_| AudioError::TimeScale(format!("{stage} worker panicked")))?;

    let mut processed = joined.into_iter().collect::<Result<Vec<_>>>()?;

    let shortest = processed.iter().map(Vec::len).min().unwrap_or(0);
    for channel in &mut processed {
        channel.truncate(shortest);
    }

    trace!("{}: {} channels -> {} frames", stage, processed.len(), shortest);
    AudioBuffer::new(processed)
}

/// Change duration without changing pitch
///
/// `rate` above 1 speeds up (shorter output), below 1 slows down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStretch {
    rate: f32,
}

impl TimeStretch {
    pub fn new(rate: f32) -> Self {
        Self { rate }
    }

    pub fn apply(&self, buffer: AudioBuffer, time_scale: &dyn TimeScale) -> Result<AudioBuffer> {
        if self.rate == 1.0 {
            return Ok(buffer);
        }
        let rate = self.rate;
        per_channel(buffer, "time_stretch", |channel| time_scale.stretch(channel, rate))
    }
}

impl Effect for TimeStretch {
    fn process(&self, buffer: AudioBuffer, ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(buffer, ctx.time_scale)
    }

    fn is_bypassed(&self) -> bool {
        self.rate == 1.0
    }

    fn name(&self) -> &str {
        "time_stretch"
    }

    fn preserves_length(&self) -> bool {
        false
    }
}

/// Change pitch by `semitones` while keeping duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchShift {
    semitones: f32,
}

impl PitchShift {
    pub fn new(semitones: f32) -> Self {
        Self { semitones }
    }

    pub fn apply(
        &self,
        buffer: AudioBuffer,
        sample_rate: SampleRate,
        time_scale: &dyn TimeScale,
    ) -> Result<AudioBuffer> {
        if self.semitones == 0.0 {
            return Ok(buffer);
        }
        let semitones = self.semitones;
        per_channel(buffer, "pitch_shift", |channel| {
            time_scale.pitch_shift(channel, sample_rate, semitones)
        })
    }
}

impl Effect for PitchShift {
    fn process(&self, buffer: AudioBuffer, ctx: &mut RenderContext<'_>) -> Result<AudioBuffer> {
        self.apply(buffer, ctx.sample_rate, ctx.time_scale)
    }

    fn is_bypassed(&self) -> bool {
        self.semitones == 0.0
    }

    fn name(&self) -> &str {
        "pitch_shift"
    }

    // External implementations may not return the exact input length
    fn preserves_length(&self) -> bool {
        false
    }
}
