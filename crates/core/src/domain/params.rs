//! Effect parameter surface
//!
//! A `ParameterSet` is a loose name -> value map (it comes from presets,
//! TOML files and the command line), while `ParamKey` is the closed set
//! of names the pipeline understands, each with a default and a range.

use crate::domain::audio::{AudioError, Result, SampleRate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Corner frequency of the bass shelf (Hz)
pub const BASS_SHELF_FREQ: f32 = 200.0;

/// Every parameter the pipeline recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamKey {
    TimeStretch,
    PitchShift,
    HighpassHz,
    LowpassHz,
    BassDb,
    HighshelfDb,
    HighshelfFreq,
    Saturation,
    Compression,
    Bitcrush,
    WowFlutter,
    StereoWidth,
    Noise,
    Reverb,
    Limiter,
}

impl ParamKey {
    pub const ALL: [ParamKey; 15] = [
        ParamKey::TimeStretch,
        ParamKey::PitchShift,
        ParamKey::HighpassHz,
        ParamKey::LowpassHz,
        ParamKey::BassDb,
        ParamKey::HighshelfDb,
        ParamKey::HighshelfFreq,
        ParamKey::Saturation,
        ParamKey::Compression,
        ParamKey::Bitcrush,
        ParamKey::WowFlutter,
        ParamKey::StereoWidth,
        ParamKey::Noise,
        ParamKey::Reverb,
        ParamKey::Limiter,
    ];

    /// Key as it appears in presets and on the command line
    pub fn name(self) -> &'static str {
        match self {
            ParamKey::TimeStretch => "time_stretch",
            ParamKey::PitchShift => "pitch_shift",
            ParamKey::HighpassHz => "highpass_hz",
            ParamKey::LowpassHz => "lowpass_hz",
            ParamKey::BassDb => "bass_db",
            ParamKey::HighshelfDb => "highshelf_db",
            ParamKey::HighshelfFreq => "highshelf_freq",
            ParamKey::Saturation => "saturation",
            ParamKey::Compression => "compression",
            ParamKey::Bitcrush => "bitcrush",
            ParamKey::WowFlutter => "wow_flutter",
            ParamKey::StereoWidth => "stereo_width",
            ParamKey::Noise => "noise",
            ParamKey::Reverb => "reverb",
            ParamKey::Limiter => "limiter",
        }
    }

    /// Value used when the key is absent from a set
    pub fn default_value(self) -> f32 {
        match self {
            ParamKey::TimeStretch => 1.0,
            ParamKey::PitchShift => 0.0,
            ParamKey::HighpassHz => 30.0,
            ParamKey::LowpassHz => 14000.0,
            ParamKey::BassDb => 0.0,
            ParamKey::HighshelfDb => 0.0,
            ParamKey::HighshelfFreq => 10000.0,
            ParamKey::Saturation
            | ParamKey::Compression
            | ParamKey::Bitcrush
            | ParamKey::WowFlutter
            | ParamKey::Noise
            | ParamKey::Reverb => 0.0,
            ParamKey::StereoWidth => 1.0,
            ParamKey::Limiter => 0.95,
        }
    }

    /// Accepted values, before any sample-rate dependent check
    pub fn range(self) -> RangeInclusive<f32> {
        match self {
            ParamKey::TimeStretch => 0.25..=4.0,
            ParamKey::PitchShift => -24.0..=24.0,
            ParamKey::HighpassHz => 0.0..=100_000.0,
            ParamKey::LowpassHz | ParamKey::HighshelfFreq => 1.0..=100_000.0,
            ParamKey::BassDb | ParamKey::HighshelfDb => -24.0..=24.0,
            ParamKey::Saturation
            | ParamKey::Compression
            | ParamKey::Bitcrush
            | ParamKey::WowFlutter
            | ParamKey::Noise
            | ParamKey::Reverb => 0.0..=1.0,
            ParamKey::StereoWidth => 0.0..=2.0,
            ParamKey::Limiter => 0.0..=2.0,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            ParamKey::TimeStretch => "x",
            ParamKey::PitchShift => "semitones",
            ParamKey::HighpassHz | ParamKey::LowpassHz | ParamKey::HighshelfFreq => "Hz",
            ParamKey::BassDb | ParamKey::HighshelfDb => "dB",
            ParamKey::Limiter => "linear",
            _ => "amount",
        }
    }

    fn invalid(self, value: f32, reason: impl Into<String>) -> AudioError {
        AudioError::InvalidParameter {
            name: self.name().to_string(),
            value,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamKey {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self> {
        ParamKey::ALL
            .iter()
            .copied()
            .find(|key| key.name() == s)
            .ok_or_else(|| AudioError::InvalidParameter {
                name: s.to_string(),
                value: f32::NAN,
                reason: "unknown parameter".to_string(),
            })
    }
}

/// Name -> value map handed to one pipeline invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, f32>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    #[must_use]
    pub fn with(mut self, key: ParamKey, value: f32) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: ParamKey, value: f32) {
        self.values.insert(key.name().to_string(), value);
    }

    /// Insert by raw name; unknown names are kept but never read
    pub fn insert_raw(&mut self, name: impl Into<String>, value: f32) {
        self.values.insert(name.into(), value);
    }

    /// Value for `key`, or its default when absent
    pub fn get(&self, key: ParamKey) -> f32 {
        self.explicit(key).unwrap_or_else(|| key.default_value())
    }

    /// Value for `key` only if the set carries it
    pub fn explicit(&self, key: ParamKey) -> Option<f32> {
        self.values.get(key.name()).copied()
    }

    /// Overlay `other` on top of `self`
    pub fn merge(&mut self, other: &ParameterSet) {
        for (name, value) in &other.values {
            self.values.insert(name.clone(), *value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Names that match no `ParamKey`
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|name| name.parse::<ParamKey>().is_err())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse a `key=value` assignment as given on the command line
    pub fn parse_assignment(input: &str) -> Result<(ParamKey, f32)> {
        let (name, raw) = input.split_once('=').ok_or_else(|| AudioError::InvalidParameter {
            name: input.to_string(),
            value: f32::NAN,
            reason: "expected KEY=VALUE".to_string(),
        })?;

        let key: ParamKey = name.trim().parse()?;
        let value: f32 = raw
            .trim()
            .parse()
            .map_err(|_| key.invalid(f32::NAN, format!("'{}' is not a number", raw.trim())))?;

        Ok((key, value))
    }

    /// Reject values the stages cannot process at `sample_rate`
    ///
    /// Boundary values with a defined skip behavior (a zero amount, a
    /// low-pass at or above Nyquist) are accepted.
    pub fn validate(&self, sample_rate: SampleRate) -> Result<()> {
        for key in ParamKey::ALL {
            let value = self.get(key);
            if !value.is_finite() {
                return Err(key.invalid(value, "value must be finite"));
            }
            let range = key.range();
            if !range.contains(&value) {
                return Err(key.invalid(
                    value,
                    format!("expected {} to {}", range.start(), range.end()),
                ));
            }
        }

        let nyquist = sample_rate.nyquist();

        let highpass = self.get(ParamKey::HighpassHz);
        if highpass > 0.0 && highpass >= nyquist {
            return Err(ParamKey::HighpassHz.invalid(
                highpass,
                format!("cutoff must be below Nyquist ({nyquist} Hz)"),
            ));
        }

        let shelf_freq = self.get(ParamKey::HighshelfFreq);
        if self.get(ParamKey::HighshelfDb) != 0.0 && shelf_freq >= nyquist {
            return Err(ParamKey::HighshelfFreq.invalid(
                shelf_freq,
                format!("shelf frequency must be below Nyquist ({nyquist} Hz)"),
            ));
        }

        if self.get(ParamKey::BassDb) != 0.0 && BASS_SHELF_FREQ >= nyquist {
            return Err(ParamKey::BassDb.invalid(
                self.get(ParamKey::BassDb),
                format!("sample rate {sample_rate} too low for the {BASS_SHELF_FREQ} Hz shelf"),
            ));
        }

        Ok(())
    }
}

impl FromIterator<(ParamKey, f32)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (ParamKey, f32)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (key, value) in iter {
            set.set(key, value);
        }
        set
    }
}
