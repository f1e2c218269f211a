//! Lip-sync signal plumbing between the audio-analysis side and the
//! render-frame side.
//!
//! Audio analysis runs at its own cadence (driven by incoming PCM chunks),
//! the render loop at another. The two meet in [`cell::LipSyncCell`], a
//! single-slot latest-value cell: the writer overwrites, the reader polls
//! once per frame and degrades to silence when the writer stalls.

pub mod analyser;
pub mod cell;

pub use analyser::{spawn_analyser, AnalyserConfig, BandAnalyser};
pub use cell::LipSyncCell;

use serde::Serialize;
use std::time::Instant;

/// One frame of audio-derived lip-sync features.
///
/// All features are roughly in `[0, 1]`; `timestamp` is seconds on the
/// engine's monotonic clock (see [`EngineClock`]). A frame is only usable
/// while fresh: consumers must treat anything older than the configured
/// staleness threshold as "no audio signal".
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LipSyncFrame {
    /// RMS amplitude.
    pub volume: f32,
    /// Energy around 150 Hz (jaw open, vowels).
    pub low_band: f32,
    /// Energy around 800 Hz (tongue/lip shapes, vowel formant F1).
    pub mid_band: f32,
    /// Energy around 3 kHz (sibilants: s, t, f).
    pub high_band: f32,
    /// Voicing confidence (low+mid dominance).
    pub voiced: f32,
    /// Sudden-onset detector for bilabial releases (p, b).
    pub plosive: f32,
    /// High-band dominance over the voiced bands.
    pub sibilance: f32,
    /// Smoothed volume envelope.
    pub envelope: f32,
    /// Seconds on the engine clock at analysis time.
    pub timestamp: f64,
}

impl LipSyncFrame {
    /// A silent frame stamped at `timestamp`.
    pub fn silent(timestamp: f64) -> Self {
        Self {
            volume: 0.0,
            low_band: 0.0,
            mid_band: 0.0,
            high_band: 0.0,
            voiced: 0.0,
            plosive: 0.0,
            sibilance: 0.0,
            envelope: 0.0,
            timestamp,
        }
    }
}

/// Monotonic timebase shared by the analysis side and the render side.
///
/// Both sides stamp and compare times as `f64` seconds since the engine
/// epoch, so staleness checks never mix clock domains.
#[derive(Debug, Clone, Copy)]
pub struct EngineClock {
    epoch: Instant,
}

impl EngineClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Seconds elapsed since the engine epoch.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Convert an externally sampled [`Instant`] to engine seconds.
    pub fn seconds_at(&self, instant: Instant) -> f64 {
        instant.saturating_duration_since(self.epoch).as_secs_f64()
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        Self::new()
    }
}
