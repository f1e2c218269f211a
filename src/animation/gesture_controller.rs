//! Gesture state machine for body animation.
//!
//! Two looping states (`idle`, `talking`) driven by debounced audio
//! start/stop, plus four one-shot gestures that time out and return to
//! whichever looping state the audio flag says is right. All timing runs
//! off deadlines fired by the per-frame [`GestureController::update`]
//! call; arming a deadline always replaces the previous one of the same
//! kind, so late timer races cannot double-fire.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Skeletal animation states. `Idle`/`Talking` loop; the rest are
/// one-shot, time-boxed gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GestureState {
    Idle,
    Talking,
    Waving,
    Pointing,
    NodYes,
    Bow,
}

impl GestureState {
    /// Clip name in the avatar GLB.
    pub fn clip_name(&self) -> &'static str {
        match self {
            GestureState::Idle => "idle",
            GestureState::Talking => "talking",
            GestureState::Waving => "waving",
            GestureState::Pointing => "pointing",
            GestureState::NodYes => "nodYes",
            GestureState::Bow => "bow",
        }
    }

    pub fn is_looping(&self) -> bool {
        matches!(self, GestureState::Idle | GestureState::Talking)
    }

    pub fn is_one_shot(&self) -> bool {
        !self.is_looping()
    }
}

/// Discrete input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    AudioStart,
    AudioStop,
    Gesture {
        gesture: GestureState,
        /// Seconds before auto-return; falls back to the clip duration,
        /// then the static default.
        duration: Option<f32>,
    },
}

/// Options passed with every clip selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub looped: bool,
    pub duration: Option<f32>,
}

/// Seam to the rendering layer's skeletal mixer. The engine never touches
/// the scene graph; it only selects clips through this trait.
pub trait AnimationPlayer: Send {
    fn play(&mut self, clip: GestureState, options: PlayOptions);

    /// Runtime clip length, if the loaded model knows it.
    fn clip_duration(&self, _clip: GestureState) -> Option<f32> {
        None
    }

    /// Whether the loaded model carries this clip at all.
    fn has_clip(&self, _clip: GestureState) -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureTimings {
    /// Debounce before entering the full talking body animation, so a
    /// brief audio blip stays in idle ("talking-lite" suppression).
    pub talking_start_delay: f32,
    /// Debounce before leaving talking after audio stops, so short
    /// mid-sentence pauses don't flicker the body.
    pub audio_stop_delay: f32,
    pub waving_duration: f32,
    pub pointing_duration: f32,
    pub nod_yes_duration: f32,
    pub bow_duration: f32,
    /// Fallback for gestures with no configured or runtime duration.
    pub default_duration: f32,
}

impl Default for GestureTimings {
    fn default() -> Self {
        Self {
            talking_start_delay: 0.14,
            audio_stop_delay: 0.7,
            waving_duration: 2.5,
            pointing_duration: 2.0,
            nod_yes_duration: 1.5,
            bow_duration: 3.0,
            default_duration: 2.0,
        }
    }
}

impl GestureTimings {
    fn static_duration(&self, gesture: GestureState) -> f32 {
        match gesture {
            GestureState::Waving => self.waving_duration,
            GestureState::Pointing => self.pointing_duration,
            GestureState::NodYes => self.nod_yes_duration,
            GestureState::Bow => self.bow_duration,
            GestureState::Idle | GestureState::Talking => self.default_duration,
        }
    }
}

/// Interruption-aware gesture state machine. Owns the clip-selection
/// callback; one instance per avatar session.
pub struct GestureController {
    state: GestureState,
    audio_active: bool,
    talking_start_at: Option<Instant>,
    audio_stop_at: Option<Instant>,
    gesture_return_at: Option<Instant>,
    timings: GestureTimings,
    player: Box<dyn AnimationPlayer>,
    destroyed: bool,
}

impl GestureController {
    pub fn new(timings: GestureTimings, player: Box<dyn AnimationPlayer>) -> Self {
        Self {
            state: GestureState::Idle,
            audio_active: false,
            talking_start_at: None,
            audio_stop_at: None,
            gesture_return_at: None,
            timings,
            player,
            destroyed: false,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_audio_active(&self) -> bool {
        self.audio_active
    }

    /// Resolve the auto-return duration for a gesture: caller-supplied →
    /// runtime clip lookup → static default.
    pub fn resolved_duration(&self, gesture: GestureState, requested: Option<f32>) -> f32 {
        requested
            .filter(|d| *d > 0.0)
            .or_else(|| self.player.clip_duration(gesture).filter(|d| *d > 0.0))
            .unwrap_or_else(|| self.timings.static_duration(gesture))
    }

    /// Feed one event into the machine at time `now`.
    pub fn handle_event(&mut self, event: GestureEvent, now: Instant) {
        if self.destroyed {
            return;
        }
        match event {
            GestureEvent::AudioStart => self.on_audio_start(now),
            GestureEvent::AudioStop => self.on_audio_stop(now),
            GestureEvent::Gesture { gesture, duration } => {
                if gesture.is_one_shot() {
                    self.on_gesture(gesture, duration, now);
                }
            }
        }
    }

    /// Fire any due deadlines. Call once per rendered frame.
    pub fn update(&mut self, now: Instant) {
        if self.destroyed {
            return;
        }

        if self.talking_start_at.is_some_and(|at| now >= at) {
            self.talking_start_at = None;
            if self.audio_active && self.state == GestureState::Idle {
                self.transition_to(GestureState::Talking);
            }
        }

        if self.audio_stop_at.is_some_and(|at| now >= at) {
            self.audio_stop_at = None;
            // Only settle to idle if audio hasn't resumed meanwhile.
            if self.state == GestureState::Talking && !self.audio_active {
                self.transition_to(GestureState::Idle);
            }
        }

        if self.gesture_return_at.is_some_and(|at| now >= at) {
            self.gesture_return_at = None;
            let return_state = if self.audio_active {
                GestureState::Talking
            } else {
                GestureState::Idle
            };
            self.transition_to(return_state);
        }
    }

    /// Hard reset: cancel every pending deadline, force idle, and play
    /// the idle clip immediately. Used when the session disconnects.
    pub fn reset_to_idle(&mut self) {
        if self.destroyed {
            return;
        }
        self.clear_deadlines();
        self.audio_active = false;
        self.state = GestureState::Idle;
        self.play(GestureState::Idle);
    }

    /// Teardown: cancel all pending deadlines without forcing a state. No
    /// callback fires after this, even for deadlines already in flight.
    pub fn destroy(&mut self) {
        self.clear_deadlines();
        self.destroyed = true;
    }

    // ── Internal transitions ───────────────────────────────

    fn on_audio_start(&mut self, now: Instant) {
        self.audio_active = true;
        self.audio_stop_at = None;

        if self.state == GestureState::Talking {
            return;
        }
        if self.state.is_one_shot() {
            // Let the gesture finish; its return will route to talking.
            return;
        }
        if self.talking_start_at.is_none() {
            self.talking_start_at =
                Some(now + Duration::from_secs_f32(self.timings.talking_start_delay));
        }
    }

    fn on_audio_stop(&mut self, now: Instant) {
        self.audio_active = false;
        self.talking_start_at = None;
        self.audio_stop_at = Some(now + Duration::from_secs_f32(self.timings.audio_stop_delay));
    }

    fn on_gesture(&mut self, gesture: GestureState, duration: Option<f32>, now: Instant) {
        self.gesture_return_at = None;
        self.transition_to(gesture);

        let return_delay = self.resolved_duration(gesture, duration);
        self.gesture_return_at = Some(now + Duration::from_secs_f32(return_delay));
    }

    fn transition_to(&mut self, state: GestureState) {
        if self.state == state {
            // Re-entering the same state would restart the playing clip.
            return;
        }
        debug!(from = self.state.clip_name(), to = state.clip_name(), "gesture transition");
        self.state = state;
        self.play(state);
    }

    fn play(&mut self, state: GestureState) {
        if !self.player.has_clip(state) {
            warn!(clip = state.clip_name(), "animation clip missing from model, skipping playback");
            return;
        }
        self.player.play(
            state,
            PlayOptions {
                looped: state.is_looping(),
                duration: None,
            },
        );
    }

    fn clear_deadlines(&mut self) {
        self.talking_start_at = None;
        self.audio_stop_at = None;
        self.gesture_return_at = None;
    }
}
