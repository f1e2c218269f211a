//! Session director: routes conversation events into the animation core.
//!
//! The conversational AI connection is a black box that emits high-level
//! signals (connected, speech started/stopped, tool intents, session
//! end). The director translates each into an expression cue change, a
//! gesture request, or an audio event, and owns the per-frame drive of
//! queue → state machine → facial solver. All components are explicit
//! instances constructed here and torn down here; nothing is global.

use crate::animation::{
    AnimationPlayer, ExpressionCue, FacialController, FacialSignalFrame, GestureController,
    GestureEvent, GestureQueue, GestureRequest, GestureState, MorphChannelMap, MorphDictionary,
    QueueError,
};
use crate::config::EngineConfig;
use crate::signal::{EngineClock, LipSyncCell};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// High-level conversation events the surrounding application feeds in.
/// A tagged variant per event keeps the dispatch exhaustive at compile
/// time; adding a signal without handling it will not build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ConversationSignal {
    /// Live connection established; the visitor just walked up.
    Connected,
    /// Assistant audio playback began.
    AssistantSpeechStarted,
    /// Assistant audio playback drained.
    AssistantSpeechEnded,
    /// The visitor talked over the assistant; playback was cut.
    UserInterrupted,
    /// A tool call signalled a yes/confirmation intent.
    IntentConfirmed,
    /// A tool call routed the visitor somewhere (directions follow).
    VisitorRouted,
    /// The interaction is wrapping up (farewell tool call).
    InteractionEnded,
    /// The session/connection is gone; return to the resting pose.
    SessionClosed,
}

// Gesture priorities: farewells outrank routine beats so a bow is never
// starved by a queued wave.
const PRIORITY_GREETING: i32 = 3;
const PRIORITY_INTENT: i32 = 2;
const PRIORITY_FAREWELL: i32 = 4;

/// Owns the animation core for one kiosk session.
pub struct AvatarDirector {
    session_id: Uuid,
    clock: EngineClock,
    cue: ExpressionCue,
    audio_playing: bool,
    stale_threshold: f64,
    facial: FacialController,
    gestures: GestureController,
    queue: GestureQueue,
    lip_cell: LipSyncCell,
}

impl AvatarDirector {
    pub fn new(config: EngineConfig, player: Box<dyn AnimationPlayer>) -> Self {
        let session_id = Uuid::new_v4();
        info!(session = %session_id, "avatar session started");
        let stale_threshold = config.solver.stale_threshold;
        Self {
            session_id,
            clock: EngineClock::new(),
            cue: ExpressionCue::NeutralProfessional,
            audio_playing: false,
            stale_threshold,
            facial: FacialController::new(config.solver),
            gestures: GestureController::new(config.gestures, player),
            queue: GestureQueue::new(config.queue),
            lip_cell: LipSyncCell::new(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn expression_cue(&self) -> ExpressionCue {
        self.cue
    }

    pub fn gesture_state(&self) -> GestureState {
        self.gestures.state()
    }

    /// Handle for the audio-analysis side to publish lip-sync frames into.
    pub fn lip_sync_cell(&self) -> LipSyncCell {
        self.lip_cell.clone()
    }

    /// The session's monotonic timebase (shared with the analyser task).
    pub fn clock(&self) -> EngineClock {
        self.clock
    }

    /// Route one conversation signal, stamped with the current time.
    pub fn apply(&mut self, signal: ConversationSignal) {
        self.apply_at(signal, Instant::now());
    }

    /// Route one conversation signal at an explicit time (testing seam).
    pub fn apply_at(&mut self, signal: ConversationSignal, now: Instant) {
        debug!(session = %self.session_id, ?signal, "conversation signal");
        match signal {
            ConversationSignal::Connected => {
                self.cue = ExpressionCue::WelcomeWarm;
                self.request_gesture(GestureRequest::new(GestureState::Waving, PRIORITY_GREETING), now);
            }
            ConversationSignal::AssistantSpeechStarted => {
                self.cue = ExpressionCue::ExplainingConfident;
                self.audio_playing = true;
                self.gestures.handle_event(GestureEvent::AudioStart, now);
            }
            ConversationSignal::AssistantSpeechEnded => {
                self.cue = ExpressionCue::ListeningAttentive;
                self.audio_playing = false;
                self.gestures.handle_event(GestureEvent::AudioStop, now);
            }
            ConversationSignal::UserInterrupted => {
                // Immediate attentive pivot; anything still queued from the
                // abandoned turn is moot.
                self.cue = ExpressionCue::ListeningAttentive;
                self.audio_playing = false;
                self.queue.clear();
                self.gestures.handle_event(GestureEvent::AudioStop, now);
            }
            ConversationSignal::IntentConfirmed => {
                self.cue = ExpressionCue::ConfirmingYes;
                self.request_gesture(GestureRequest::new(GestureState::NodYes, PRIORITY_INTENT), now);
            }
            ConversationSignal::VisitorRouted => {
                self.request_gesture(GestureRequest::new(GestureState::Pointing, PRIORITY_INTENT), now);
            }
            ConversationSignal::InteractionEnded => {
                self.cue = ExpressionCue::GoodbyeFormal;
                self.request_gesture(
                    GestureRequest::new(GestureState::Bow, PRIORITY_FAREWELL).forced(),
                    now,
                );
            }
            ConversationSignal::SessionClosed => self.reset(),
        }
    }

    /// Advance one rendered frame: drain the gesture queue, fire due
    /// state-machine deadlines, and solve the face.
    pub fn frame(&mut self, delta: f32) -> MorphChannelMap {
        self.frame_at(delta, Instant::now())
    }

    /// Frame advance at an explicit time (testing seam).
    pub fn frame_at(&mut self, delta: f32, now: Instant) -> MorphChannelMap {
        self.queue.update(now, &mut self.gestures);
        self.gestures.update(now);

        let time = self.clock.seconds_at(now);
        let lip_sync = self.lip_cell.latest(time, self.stale_threshold);
        self.facial.solve(&FacialSignalFrame {
            delta,
            time,
            is_audio_playing: self.audio_playing,
            expression_cue: self.cue,
            lip_sync,
        })
    }

    /// Resolve solved channels against a loaded model's morph dictionary.
    pub fn map_to_dictionary(
        &self,
        dictionary: &MorphDictionary,
        channels: &MorphChannelMap,
    ) -> HashMap<String, f32> {
        self.facial.map_to_dictionary(dictionary, channels)
    }

    /// Session disconnect: drop queued gestures, force the body to idle,
    /// zero the face, and fall back to the resting cue.
    pub fn reset(&mut self) {
        info!(session = %self.session_id, "avatar session reset");
        self.cue = ExpressionCue::NeutralProfessional;
        self.audio_playing = false;
        self.queue.clear();
        self.gestures.reset_to_idle();
        self.facial.reset();
        self.lip_cell.clear();
    }

    /// Final teardown. No animation callback fires after this.
    pub fn shutdown(&mut self) {
        debug!(session = %self.session_id, "avatar session shutdown");
        self.gestures.destroy();
    }

    fn request_gesture(&mut self, request: GestureRequest, now: Instant) {
        match self.queue.enqueue(request, now) {
            Ok(()) => {}
            // Degraded conditions never surface to the visitor; a dropped
            // repeat gesture just means the avatar keeps its current pose.
            Err(QueueError::Cooldown { gesture, remaining }) => {
                debug!(
                    session = %self.session_id,
                    gesture = gesture.clip_name(),
                    remaining,
                    "gesture dropped, still cooling down"
                );
            }
            Err(err) => debug!(session = %self.session_id, %err, "gesture request rejected"),
        }
    }
}
