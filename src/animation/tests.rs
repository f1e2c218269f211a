//! Cross-component and property tests for the animation core.
//!
//! The per-file unit tests pin individual behaviors; these exercise the
//! solver across random inputs and seeds (boundedness must hold for every
//! frame of every session) and run the queue → state machine → solver
//! stack together the way the render loop drives it.

use super::facial_controller::{FacialController, FacialSignalFrame};
use super::gesture_controller::{
    AnimationPlayer, GestureController, GestureEvent, GestureState, GestureTimings, PlayOptions,
};
use super::gesture_queue::{GestureQueue, GestureRequest, QueueConfig};
use super::morphs::MorphChannel;
use super::presets::{ExpressionCue, FacialSolverConfig};
use crate::signal::LipSyncFrame;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn seeded_random(seed: u64) -> Box<dyn FnMut() -> f32 + Send> {
    // Small xorshift; plenty for exercising timer phases.
    let mut state = seed.max(1);
    Box::new(move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % 10_000) as f32 / 10_000.0
    })
}

proptest! {
    #[test]
    fn solver_output_is_bounded_for_all_inputs(
        seed in 0u64..1_000,
        volume in 0.0f32..1.5,
        low in 0.0f32..1.5,
        mid in 0.0f32..1.5,
        high in 0.0f32..1.5,
        plosive in 0.0f32..1.5,
        sibilance in 0.0f32..1.5,
        delta in 0.001f32..0.1,
        cue_index in 0usize..7,
    ) {
        let mut solver = FacialController::with_random(
            FacialSolverConfig::default(),
            seeded_random(seed),
        );
        let cue = ExpressionCue::ALL[cue_index];

        let mut time = 0.0f64;
        for i in 0..50 {
            time += delta as f64;
            let lip = (i % 4 != 3).then(|| LipSyncFrame {
                volume,
                low_band: low,
                mid_band: mid,
                high_band: high,
                voiced: volume,
                plosive,
                sibilance,
                envelope: volume,
                timestamp: time,
            });
            let solved = solver.solve(&FacialSignalFrame {
                delta,
                time,
                is_audio_playing: lip.is_some(),
                expression_cue: cue,
                lip_sync: lip,
            });
            for (channel, value) in &solved {
                prop_assert!(
                    (0.0..=1.0).contains(value),
                    "{:?} escaped [0,1]: {}",
                    channel,
                    value
                );
            }
        }
    }
}

#[derive(Clone, Default)]
struct RecordingPlayer {
    plays: Arc<Mutex<Vec<(GestureState, bool)>>>,
}

impl AnimationPlayer for RecordingPlayer {
    fn play(&mut self, clip: GestureState, options: PlayOptions) {
        self.plays.lock().unwrap().push((clip, options.looped));
    }
}

/// Drive queue, state machine, and solver together like the render loop
/// does: a greeting wave queued while speech ramps up, then speech ends.
#[test]
fn full_stack_frame_loop_stays_consistent() {
    let player = RecordingPlayer::default();
    let mut controller =
        GestureController::new(GestureTimings::default(), Box::new(player.clone()));
    let mut queue = GestureQueue::new(QueueConfig::default());
    let mut solver = FacialController::with_random(FacialSolverConfig::default(), seeded_random(7));

    let t0 = Instant::now();
    queue
        .enqueue(GestureRequest::new(GestureState::Waving, 3).with_duration(1.0), t0)
        .unwrap();
    controller.handle_event(GestureEvent::AudioStart, t0);

    let delta = 1.0 / 60.0;
    for i in 0..240 {
        let now = t0 + Duration::from_secs_f32(i as f32 * delta);
        let time = i as f64 * delta as f64;
        queue.update(now, &mut controller);
        controller.update(now);

        if i == 120 {
            controller.handle_event(GestureEvent::AudioStop, now);
        }

        let speaking = controller.is_audio_active();
        let solved = solver.solve(&FacialSignalFrame {
            delta,
            time,
            is_audio_playing: speaking,
            expression_cue: ExpressionCue::ExplainingConfident,
            lip_sync: speaking.then(|| LipSyncFrame {
                volume: 0.5,
                low_band: 0.5,
                mid_band: 0.4,
                high_band: 0.2,
                voiced: 0.5,
                plosive: 0.1,
                sibilance: 0.1,
                envelope: 0.45,
                timestamp: time,
            }),
        });
        assert_eq!(solved.len(), MorphChannel::COUNT);
    }

    let plays = player.plays.lock().unwrap().clone();
    // Wave dispatches immediately, returns to talking (audio active),
    // and the stop debounce settles everything back to idle.
    assert_eq!(
        plays,
        vec![
            (GestureState::Waving, false),
            (GestureState::Talking, true),
            (GestureState::Idle, true),
        ]
    );
    assert_eq!(controller.state(), GestureState::Idle);
}
