//! Per-frame facial solver.
//!
//! Combines the active expression preset, an autonomous idle layer (blink
//! cycle, eye saccades), and an optional live lip-sync frame into one
//! bounded morph channel map. Every channel is driven through asymmetric
//! attack/decay smoothing (quick to open, slower to relax), which is what
//! keeps mouth movement from looking robotic.

use super::morphs::{self, MorphChannel, MorphChannelMap, MorphDictionary};
use super::presets::{ExpressionCue, FacialSolverConfig};
use super::smoothing::{clamp01, random_range, smooth};
use crate::signal::LipSyncFrame;
use std::collections::HashMap;

/// Everything the solver needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FacialSignalFrame {
    /// Seconds since the previous frame.
    pub delta: f32,
    /// Seconds on the engine clock.
    pub time: f64,
    /// Whether assistant audio is currently being played back.
    pub is_audio_playing: bool,
    pub expression_cue: ExpressionCue,
    /// Latest analyser frame, if any. Staleness is enforced here, so a
    /// frozen upstream never leaves the mouth stuck mid-viseme.
    pub lip_sync: Option<LipSyncFrame>,
}

type RandomFn = Box<dyn FnMut() -> f32 + Send>;

/// Stateful per-model facial solver. One instance per avatar; `reset`
/// when the model (or session) changes.
pub struct FacialController {
    config: FacialSolverConfig,
    random: RandomFn,
    smoothed: [f32; MorphChannel::COUNT],

    blink_active: bool,
    blink_progress: f32,
    blink_clock: f32,
    next_blink_at: f32,

    saccade_clock: f32,
    next_saccade_at: f32,
    saccade_target_x: f32,
    saccade_target_y: f32,
    saccade_x: f32,
    saccade_y: f32,

    prev_volume: f32,
}

impl FacialController {
    pub fn new(config: FacialSolverConfig) -> Self {
        Self::with_random(config, Box::new(|| rand::random::<f32>()))
    }

    /// Construct with an injectable unit-random source, so blink and
    /// saccade timing are reproducible in tests.
    pub fn with_random(config: FacialSolverConfig, mut random: RandomFn) -> Self {
        let next_blink_at = random_range(
            config.blink_min_interval,
            config.blink_max_interval,
            &mut random,
        );
        let next_saccade_at = random_range(
            config.saccade_min_interval,
            config.saccade_max_interval,
            &mut random,
        );
        Self {
            config,
            random,
            smoothed: [0.0; MorphChannel::COUNT],
            blink_active: false,
            blink_progress: 0.0,
            blink_clock: 0.0,
            next_blink_at,
            saccade_clock: 0.0,
            next_saccade_at,
            saccade_target_x: 0.0,
            saccade_target_y: 0.0,
            saccade_x: 0.0,
            saccade_y: 0.0,
            prev_volume: 0.0,
        }
    }

    pub fn config(&self) -> &FacialSolverConfig {
        &self.config
    }

    /// Zero all smoothed state and restart the autonomous timers' phase.
    pub fn reset(&mut self) {
        self.smoothed = [0.0; MorphChannel::COUNT];
        self.blink_active = false;
        self.blink_progress = 0.0;
        self.blink_clock = 0.0;
        self.saccade_clock = 0.0;
        self.saccade_target_x = 0.0;
        self.saccade_target_y = 0.0;
        self.saccade_x = 0.0;
        self.saccade_y = 0.0;
        self.prev_volume = 0.0;
    }

    /// Solve one frame. Returns the smoothed, clamped canonical channel
    /// map, never raw instantaneous targets.
    pub fn solve(&mut self, frame: &FacialSignalFrame) -> MorphChannelMap {
        let mut targets: HashMap<MorphChannel, f32> =
            frame.expression_cue.preset().iter().copied().collect();

        self.update_blink(frame.delta, &mut targets);
        self.update_eye_saccades(frame.delta, &mut targets);

        let lip = frame
            .lip_sync
            .filter(|l| frame.time - l.timestamp < self.config.stale_threshold);

        if let Some(lip) = lip {
            self.apply_lip_sync(&lip, &mut targets);
        } else {
            // No usable signal: settle into a quiet silence pose. The
            // silence channel sits a little lower while audio is playing
            // so brief analyser gaps don't fully close the mouth.
            let sil = if frame.is_audio_playing { 0.2 } else { 0.45 };
            raise(&mut targets, MorphChannel::VisemeSil, sil);
            self.prev_volume = smooth(self.prev_volume, 0.0, self.config.decay_speed, frame.delta);
        }

        let mut solved = MorphChannelMap::with_capacity(MorphChannel::COUNT);
        for channel in MorphChannel::ALL {
            let target = clamp01(targets.get(&channel).copied().unwrap_or(0.0));
            let current = self.smoothed[channel as usize];
            let speed = if target > current {
                self.config.attack_speed
            } else {
                self.config.decay_speed
            };
            let next = clamp01(smooth(current, target, speed, frame.delta));
            self.smoothed[channel as usize] = next;
            solved.insert(channel, next);
        }
        solved
    }

    /// Resolve solved canonical channels against a model's own morph
    /// dictionary. Channels the model lacks are silently dropped.
    pub fn map_to_dictionary(
        &self,
        dictionary: &MorphDictionary,
        channels: &MorphChannelMap,
    ) -> HashMap<String, f32> {
        morphs::map_to_dictionary(dictionary, channels)
    }

    fn apply_lip_sync(&mut self, lip: &LipSyncFrame, targets: &mut HashMap<MorphChannel, f32>) {
        let cfg = &self.config;

        // Zero voiced/envelope means the analyser didn't provide them;
        // fall back to raw volume like the band-only analyser variant.
        let voiced = clamp01(if lip.voiced > 0.0 { lip.voiced } else { lip.volume });
        let envelope = clamp01(if lip.envelope > 0.0 { lip.envelope } else { lip.volume });
        let low = clamp01(lip.low_band);
        let mid = clamp01(lip.mid_band);
        let high = clamp01(lip.high_band);
        let plosive = clamp01(lip.plosive);
        let sibilance = clamp01(lip.sibilance);

        let jaw = clamp01(low * 0.5 + envelope * 0.35 + voiced * 0.2) * cfg.max_jaw;
        let aa = clamp01(mid * 0.45 + low * 0.22 + envelope * 0.15) * cfg.max_viseme;
        let o = clamp01(low * 0.45 + mid * 0.2 + envelope * 0.12) * cfg.max_viseme;
        let e = clamp01(mid * 0.38 + high * 0.2 + envelope * 0.08) * cfg.max_viseme;
        let u = clamp01(low * 0.32 + high * 0.1 + envelope * 0.06) * cfg.max_viseme * 0.9;
        let ff = clamp01(sibilance * 0.5 + high * 0.45) * cfg.max_viseme * 0.8;
        let th = clamp01(sibilance * 0.35 + high * 0.2 + envelope * 0.1) * cfg.max_viseme * 0.75;

        // A sharp drop from the previous frame's volume reads as a
        // bilabial closure, which the raw plosive detector can miss.
        let vol_drop = (self.prev_volume - lip.volume).max(0.0);
        let pp = clamp01(plosive * 0.85 + vol_drop * 2.4) * cfg.max_viseme;
        let sil = clamp01(1.0 - envelope * 1.45) * 0.55;

        targets.insert(MorphChannel::JawOpen, jaw);
        targets.insert(MorphChannel::VisemeAa, aa);
        targets.insert(MorphChannel::VisemeO, o);
        targets.insert(MorphChannel::VisemeE, e);
        targets.insert(MorphChannel::VisemeU, u);
        targets.insert(MorphChannel::VisemeFf, ff);
        targets.insert(MorphChannel::VisemeTh, th);
        targets.insert(MorphChannel::VisemePp, pp);
        targets.insert(MorphChannel::VisemeSil, sil);

        // A flat mouth while talking looks wrong regardless of cue.
        raise(targets, MorphChannel::MouthSmileLeft, 0.09);
        raise(targets, MorphChannel::MouthSmileRight, 0.09);

        raise(
            targets,
            MorphChannel::BrowInnerUp,
            volume_to_brow_raise(lip.volume),
        );

        self.prev_volume = lip.volume;
    }

    fn update_blink(&mut self, delta: f32, targets: &mut HashMap<MorphChannel, f32>) {
        self.blink_clock += delta;

        if !self.blink_active && self.blink_clock >= self.next_blink_at {
            self.blink_active = true;
            self.blink_progress = 0.0;
        }

        let mut blink_amount = 0.0;
        if self.blink_active {
            self.blink_progress += delta / self.config.blink_duration;
            if self.blink_progress >= 1.0 {
                self.blink_active = false;
                self.blink_progress = 0.0;
                self.blink_clock = 0.0;
                self.next_blink_at = random_range(
                    self.config.blink_min_interval,
                    self.config.blink_max_interval,
                    &mut self.random,
                );
            } else {
                blink_amount = (self.blink_progress * std::f32::consts::PI).sin();
            }
        }

        // Max-blend so presets can hold the lids low but never suppress a
        // blink entirely.
        raise(targets, MorphChannel::EyeBlinkLeft, blink_amount);
        raise(targets, MorphChannel::EyeBlinkRight, blink_amount);
    }

    fn update_eye_saccades(&mut self, delta: f32, targets: &mut HashMap<MorphChannel, f32>) {
        self.saccade_clock += delta;

        if self.saccade_clock >= self.next_saccade_at {
            self.saccade_clock = 0.0;
            self.next_saccade_at = random_range(
                self.config.saccade_min_interval,
                self.config.saccade_max_interval,
                &mut self.random,
            );
            self.saccade_target_x =
                ((self.random)() * 2.0 - 1.0) * self.config.saccade_max_amount;
            self.saccade_target_y =
                ((self.random)() * 2.0 - 1.0) * self.config.saccade_max_amount * 0.7;
        }

        let speed = self.config.saccade_responsiveness;
        self.saccade_x = smooth(self.saccade_x, self.saccade_target_x, speed, delta);
        self.saccade_y = smooth(self.saccade_y, self.saccade_target_y, speed, delta);

        let x = self.saccade_x;
        let y = self.saccade_y;

        targets.insert(MorphChannel::EyeLookOutLeft, if x < 0.0 { -x } else { 0.0 });
        targets.insert(MorphChannel::EyeLookOutRight, if x > 0.0 { x } else { 0.0 });
        targets.insert(MorphChannel::EyeLookInLeft, if x > 0.0 { x } else { 0.0 });
        targets.insert(MorphChannel::EyeLookInRight, if x < 0.0 { -x } else { 0.0 });

        targets.insert(MorphChannel::EyeLookUpLeft, if y > 0.0 { y } else { 0.0 });
        targets.insert(MorphChannel::EyeLookUpRight, if y > 0.0 { y } else { 0.0 });
        targets.insert(MorphChannel::EyeLookDownLeft, if y < 0.0 { -y } else { 0.0 });
        targets.insert(MorphChannel::EyeLookDownRight, if y < 0.0 { -y } else { 0.0 });
    }
}

/// Raise `channel` to at least `floor`, keeping any higher existing target.
fn raise(targets: &mut HashMap<MorphChannel, f32>, channel: MorphChannel, floor: f32) {
    let entry = targets.entry(channel).or_insert(0.0);
    if *entry < floor {
        *entry = floor;
    }
}

/// Subtle brow emphasis once speech volume crosses a threshold.
fn volume_to_brow_raise(volume: f32) -> f32 {
    if volume <= 0.25 {
        0.0
    } else {
        clamp01((volume - 0.25) * 0.35)
    }
}
