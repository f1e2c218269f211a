//! Frequency-band lip-sync analyser.
//!
//! Consumes mono PCM samples and emits [`LipSyncFrame`]s at roughly 60 Hz
//! (one per 400-sample block at 24 kHz). Band energies come from the
//! Goertzel algorithm at three target frequencies:
//!
//!   low  ~150 Hz  -> jaw open, vowels
//!   mid  ~800 Hz  -> vowel formant F1, tongue/lip shapes
//!   high ~3 kHz   -> sibilants (s, t, f)
//!
//! The derived features (envelope, voiced, sibilance, plosive) are cheap
//! heuristics over those bands, good enough to drive viseme morphs.

use super::{EngineClock, LipSyncCell, LipSyncFrame};
use crate::animation::smoothing::{clamp01, smooth};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// Samples per analysis block.
    pub frame_size: usize,
    /// PCM sample rate in Hz.
    pub sample_rate: f32,
    pub low_hz: f32,
    pub mid_hz: f32,
    pub high_hz: f32,
    /// RMS gain applied before capping volume at 1.0.
    pub volume_gain: f32,
    /// RMS gain applied when scaling band energies.
    pub band_gain: f32,
    /// Volume floor below which a block is reported as silence.
    pub noise_gate: f32,
    /// Envelope smoothing rates (per second).
    pub envelope_attack: f32,
    pub envelope_decay: f32,
    /// Gain on the volume rise that registers as a plosive onset.
    pub plosive_gain: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            frame_size: 400,
            sample_rate: 24_000.0,
            low_hz: 150.0,
            mid_hz: 800.0,
            high_hz: 3_000.0,
            volume_gain: 5.0,
            band_gain: 8.0,
            noise_gate: 0.015,
            envelope_attack: 12.0,
            envelope_decay: 4.0,
            plosive_gain: 6.0,
        }
    }
}

/// Streaming band analyser. Feed it PCM in chunks of any size; it emits
/// one frame per completed block.
pub struct BandAnalyser {
    config: AnalyserConfig,
    buffer: Vec<f32>,
    envelope: f32,
    prev_volume: f32,
}

impl BandAnalyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let capacity = config.frame_size;
        Self {
            config,
            buffer: Vec::with_capacity(capacity),
            envelope: 0.0,
            prev_volume: 0.0,
        }
    }

    /// Push samples; returns a frame for every completed block, each
    /// stamped with `now` (engine seconds).
    pub fn push(&mut self, samples: &[f32], now: f64) -> Vec<LipSyncFrame> {
        let mut frames = Vec::new();
        for &sample in samples {
            self.buffer.push(sample);
            if self.buffer.len() >= self.config.frame_size {
                frames.push(self.analyse(now));
                self.buffer.clear();
            }
        }
        frames
    }

    /// Drop buffered samples and smoothing state.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.envelope = 0.0;
        self.prev_volume = 0.0;
    }

    fn analyse(&mut self, now: f64) -> LipSyncFrame {
        let cfg = &self.config;
        let n = self.buffer.len();
        let block_secs = n as f32 / cfg.sample_rate;

        let sum_sq: f32 = self.buffer.iter().map(|s| s * s).sum();
        let rms = (sum_sq / n as f32).sqrt();
        let volume = (rms * cfg.volume_gain).min(1.0);

        if rms < cfg.noise_gate {
            self.envelope = smooth(self.envelope, 0.0, cfg.envelope_decay, block_secs);
            self.prev_volume = volume;
            return LipSyncFrame {
                envelope: self.envelope,
                ..LipSyncFrame::silent(now)
            };
        }

        let low_energy = goertzel_magnitude(&self.buffer, cfg.low_hz, cfg.sample_rate);
        let mid_energy = goertzel_magnitude(&self.buffer, cfg.mid_hz, cfg.sample_rate);
        let high_energy = goertzel_magnitude(&self.buffer, cfg.high_hz, cfg.sample_rate);

        // Normalize relative to the strongest band, scaled by loudness, so
        // quiet speech still produces proportionate mouth shapes.
        let max_energy = low_energy.max(mid_energy).max(high_energy).max(0.001);
        let scaled_vol = (rms * cfg.band_gain).min(1.0);
        let low_band = ((low_energy / max_energy) * scaled_vol).min(1.0);
        let mid_band = ((mid_energy / max_energy) * scaled_vol).min(1.0);
        let high_band = ((high_energy / max_energy) * scaled_vol).min(1.0);

        let attack_or_decay = if volume > self.envelope {
            cfg.envelope_attack
        } else {
            cfg.envelope_decay
        };
        self.envelope = smooth(self.envelope, volume, attack_or_decay, block_secs);

        let voiced = clamp01(low_band * 0.6 + mid_band * 0.5);
        let sibilance = clamp01((high_band - 0.4 * (low_band + mid_band)).max(0.0) * 1.4);
        let rise = (volume - self.prev_volume).max(0.0);
        let plosive = clamp01(rise * cfg.plosive_gain);
        self.prev_volume = volume;

        LipSyncFrame {
            volume,
            low_band,
            mid_band,
            high_band,
            voiced,
            plosive,
            sibilance,
            envelope: self.envelope,
            timestamp: now,
        }
    }
}

/// Goertzel magnitude for a single target frequency, normalized by block
/// length.
fn goertzel_magnitude(samples: &[f32], target_hz: f32, sample_rate: f32) -> f32 {
    let n = samples.len();
    let k = (target_hz * n as f32 / sample_rate).round();
    let w = 2.0 * std::f32::consts::PI * k / n as f32;
    let coeff = 2.0 * w.cos();

    let (mut s1, mut s2) = (0.0f32, 0.0f32);
    for &sample in samples {
        let s0 = sample + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }

    (s1 * s1 + s2 * s2 - coeff * s1 * s2).max(0.0).sqrt() / n as f32
}

/// Run a [`BandAnalyser`] as a background task, publishing every completed
/// frame into `cell`. The task ends when the PCM sender is dropped.
pub fn spawn_analyser(
    config: AnalyserConfig,
    mut pcm_rx: mpsc::Receiver<Vec<f32>>,
    cell: LipSyncCell,
    clock: EngineClock,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut analyser = BandAnalyser::new(config);
        while let Some(chunk) = pcm_rx.recv().await {
            for frame in analyser.push(&chunk, clock.now()) {
                cell.publish(frame);
            }
        }
        debug!("lip-sync analyser input closed, task exiting");
    })
}
