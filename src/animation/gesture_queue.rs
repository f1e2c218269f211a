//! Priority queue sitting above the gesture state machine.
//!
//! Tool calls can request several gestures in the same turn; this queue
//! serializes them so nothing stomps a clip mid-play. Higher priority
//! dequeues first, earlier requests win ties, and a per-gesture cooldown
//! rejects repeats unless forced. Dispatch is a busy-until gate: the next
//! gesture waits out the current one's resolved duration plus a small
//! drain buffer.

use super::gesture_controller::{GestureController, GestureEvent, GestureState};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// A gesture request as issued by the conversation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureRequest {
    pub gesture: GestureState,
    /// Optional explicit play duration in seconds.
    pub duration: Option<f32>,
    /// Higher dequeues first.
    pub priority: i32,
    /// Bypass the cooldown window.
    pub force: bool,
}

impl GestureRequest {
    pub fn new(gesture: GestureState, priority: i32) -> Self {
        Self {
            gesture,
            duration: None,
            priority,
            force: false,
        }
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum QueueError {
    #[error("gesture {gesture:?} is cooling down for another {remaining:.2}s")]
    Cooldown {
        gesture: GestureState,
        remaining: f32,
    },
    #[error("{0:?} is a looping state, not a queueable one-shot gesture")]
    NotOneShot(GestureState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Seconds each gesture stays on cooldown after dispatch.
    pub cooldowns: HashMap<GestureState, f32>,
    /// Slack added after a gesture's resolved duration before the next
    /// dispatch, covering the crossfade back to the looping state.
    pub drain_buffer: f32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        let cooldowns = [
            (GestureState::Waving, 1.8),
            (GestureState::Pointing, 1.5),
            (GestureState::NodYes, 1.2),
            (GestureState::Bow, 3.0),
        ]
        .into_iter()
        .collect();
        Self {
            cooldowns,
            drain_buffer: 0.25,
        }
    }
}

impl QueueConfig {
    fn cooldown(&self, gesture: GestureState) -> f32 {
        self.cooldowns.get(&gesture).copied().unwrap_or(0.0)
    }
}

/// Internal heap entry. Ordering: priority desc, creation asc, then
/// submission sequence for full determinism.
#[derive(Debug, Clone, Copy)]
struct QueuedGesture {
    gesture: GestureState,
    duration: Option<f32>,
    priority: i32,
    created_at: Instant,
    seq: u64,
}

impl PartialEq for QueuedGesture {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedGesture {}

impl PartialOrd for QueuedGesture {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedGesture {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// One-at-a-time gesture dispatcher with priority, cooldown, and a
/// busy-until gate.
pub struct GestureQueue {
    config: QueueConfig,
    pending: BinaryHeap<QueuedGesture>,
    last_dispatched: HashMap<GestureState, Instant>,
    busy_until: Option<Instant>,
    seq: u64,
}

impl GestureQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            pending: BinaryHeap::new(),
            last_dispatched: HashMap::new(),
            busy_until: None,
            seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Submit a gesture request. Rejection leaves the queue unchanged.
    pub fn enqueue(&mut self, request: GestureRequest, now: Instant) -> Result<(), QueueError> {
        if !request.gesture.is_one_shot() {
            return Err(QueueError::NotOneShot(request.gesture));
        }

        if !request.force {
            if let Some(&last) = self.last_dispatched.get(&request.gesture) {
                let cooldown = Duration::from_secs_f32(self.config.cooldown(request.gesture));
                let since = now.saturating_duration_since(last);
                if since < cooldown {
                    return Err(QueueError::Cooldown {
                        gesture: request.gesture,
                        remaining: (cooldown - since).as_secs_f32(),
                    });
                }
            }
        }

        self.seq += 1;
        self.pending.push(QueuedGesture {
            gesture: request.gesture,
            duration: request.duration,
            priority: request.priority,
            created_at: now,
            seq: self.seq,
        });
        Ok(())
    }

    /// Drain check; call once per rendered frame. Dispatches at most one
    /// gesture, and only once the previous one has fully played out.
    pub fn update(&mut self, now: Instant, controller: &mut GestureController) {
        if self.busy_until.is_some_and(|until| now < until) {
            return;
        }
        self.busy_until = None;

        let Some(next) = self.pending.pop() else {
            return;
        };

        let duration = controller.resolved_duration(next.gesture, next.duration);
        debug!(
            gesture = next.gesture.clip_name(),
            priority = next.priority,
            duration,
            "dispatching queued gesture"
        );
        controller.handle_event(
            GestureEvent::Gesture {
                gesture: next.gesture,
                duration: Some(duration),
            },
            now,
        );
        self.last_dispatched.insert(next.gesture, now);
        self.busy_until =
            Some(now + Duration::from_secs_f32(duration + self.config.drain_buffer));
    }

    /// Drop all pending requests (session teardown / interruption). The
    /// busy gate and cooldown history stay, so an in-flight gesture still
    /// finishes cleanly.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::gesture_controller::{AnimationPlayer, GestureTimings, PlayOptions};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingPlayer {
        plays: Arc<Mutex<Vec<GestureState>>>,
    }

    impl RecordingPlayer {
        fn played(&self) -> Vec<GestureState> {
            self.plays.lock().unwrap().clone()
        }
    }

    impl AnimationPlayer for RecordingPlayer {
        fn play(&mut self, clip: GestureState, _options: PlayOptions) {
            self.plays.lock().unwrap().push(clip);
        }
    }

    fn setup() -> (GestureQueue, GestureController, RecordingPlayer) {
        let player = RecordingPlayer::default();
        let controller = GestureController::new(GestureTimings::default(), Box::new(player.clone()));
        (GestureQueue::new(QueueConfig::default()), controller, player)
    }

    fn secs(s: f32) -> Duration {
        Duration::from_secs_f32(s)
    }

    #[test]
    fn higher_priority_dispatches_first() {
        let (mut queue, mut ctrl, player) = setup();
        let t0 = Instant::now();

        queue
            .enqueue(GestureRequest::new(GestureState::Waving, 1), t0)
            .unwrap();
        queue
            .enqueue(GestureRequest::new(GestureState::Pointing, 3), t0)
            .unwrap();

        queue.update(t0, &mut ctrl);
        assert_eq!(
            player.played(),
            vec![GestureState::Pointing],
            "priority 3 must beat priority 1 regardless of submission order"
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn equal_priority_falls_back_to_creation_order() {
        let (mut queue, mut ctrl, player) = setup();
        let t0 = Instant::now();

        queue
            .enqueue(GestureRequest::new(GestureState::Bow, 2), t0)
            .unwrap();
        queue
            .enqueue(GestureRequest::new(GestureState::NodYes, 2), t0 + secs(0.01))
            .unwrap();

        queue.update(t0 + secs(0.02), &mut ctrl);
        assert_eq!(player.played(), vec![GestureState::Bow], "earlier created_at wins the tie");
    }

    #[test]
    fn busy_gate_holds_the_next_gesture() {
        let (mut queue, mut ctrl, player) = setup();
        let t0 = Instant::now();

        queue
            .enqueue(GestureRequest::new(GestureState::Pointing, 3).with_duration(1.0), t0)
            .unwrap();
        queue
            .enqueue(GestureRequest::new(GestureState::Waving, 1), t0)
            .unwrap();

        queue.update(t0, &mut ctrl);
        assert_eq!(player.played(), vec![GestureState::Pointing]);

        // 1.0s duration + 0.25s drain buffer: still busy at 1.1s.
        queue.update(t0 + secs(1.1), &mut ctrl);
        ctrl.update(t0 + secs(1.1));
        assert!(
            !player.played().contains(&GestureState::Waving),
            "second gesture must wait out the busy gate, got {:?}",
            player.played()
        );

        queue.update(t0 + secs(1.3), &mut ctrl);
        assert!(
            player.played().contains(&GestureState::Waving),
            "second gesture dispatches once the gate opens"
        );
    }

    #[test]
    fn cooldown_rejects_repeats_unless_forced() {
        let (mut queue, mut ctrl, _player) = setup();
        let t0 = Instant::now();

        queue
            .enqueue(GestureRequest::new(GestureState::Waving, 1), t0)
            .unwrap();
        queue.update(t0, &mut ctrl);

        // Waving cooldown is 1.8s.
        let err = queue
            .enqueue(GestureRequest::new(GestureState::Waving, 1), t0 + secs(1.0))
            .unwrap_err();
        assert!(
            matches!(err, QueueError::Cooldown { gesture: GestureState::Waving, .. }),
            "expected cooldown rejection, got {:?}",
            err
        );
        assert!(queue.is_empty(), "rejected request must leave the queue unchanged");

        queue
            .enqueue(
                GestureRequest::new(GestureState::Waving, 1).forced(),
                t0 + secs(1.0),
            )
            .expect("force bypasses cooldown");
        assert_eq!(queue.len(), 1);

        queue
            .enqueue(GestureRequest::new(GestureState::Waving, 1), t0 + secs(2.0))
            .expect("cooldown expired");
    }

    #[test]
    fn looping_states_cannot_be_queued() {
        let (mut queue, _ctrl, _player) = setup();
        let err = queue
            .enqueue(GestureRequest::new(GestureState::Talking, 5), Instant::now())
            .unwrap_err();
        assert_eq!(err, QueueError::NotOneShot(GestureState::Talking));
    }

    #[test]
    fn clear_drops_pending_but_keeps_the_gate() {
        let (mut queue, mut ctrl, player) = setup();
        let t0 = Instant::now();

        queue
            .enqueue(GestureRequest::new(GestureState::Bow, 1).with_duration(2.0), t0)
            .unwrap();
        queue
            .enqueue(GestureRequest::new(GestureState::Waving, 1), t0)
            .unwrap();
        queue.update(t0, &mut ctrl);
        queue.clear();

        queue.update(t0 + secs(3.0), &mut ctrl);
        assert_eq!(
            player.played(),
            vec![GestureState::Bow],
            "cleared requests must never dispatch"
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn several_requests_eventually_all_play_in_priority_order() {
        let (mut queue, mut ctrl, player) = setup();
        let t0 = Instant::now();

        queue
            .enqueue(GestureRequest::new(GestureState::Waving, 1).with_duration(0.5), t0)
            .unwrap();
        queue
            .enqueue(GestureRequest::new(GestureState::Bow, 4).with_duration(0.5), t0)
            .unwrap();
        queue
            .enqueue(GestureRequest::new(GestureState::NodYes, 2).with_duration(0.5), t0)
            .unwrap();

        // Walk time forward in frame-ish steps; every request should play
        // exactly once, highest priority first.
        let mut dispatched = Vec::new();
        for step in 0..40 {
            let now = t0 + secs(step as f32 * 0.1);
            queue.update(now, &mut ctrl);
            ctrl.update(now);
            dispatched = player.played();
        }
        let gestures: Vec<GestureState> = dispatched
            .into_iter()
            .filter(|g| g.is_one_shot())
            .collect();
        assert_eq!(
            gestures,
            vec![GestureState::Bow, GestureState::NodYes, GestureState::Waving]
        );
    }
}
