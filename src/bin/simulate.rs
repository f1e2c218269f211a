//! Scripted kiosk session driver.
//!
//! Walks the full conversation arc (greeting, speech with live lip-sync,
//! confirmation, routing, farewell) against a logging animation player,
//! printing a morph summary after each phase. Feed it a mono WAV to use
//! real speech instead of the synthesized vowel tone:
//!
//!     simulate [path/to/speech.wav]

use anyhow::{Context, Result};
use concierge_engine::animation::{
    AnimationPlayer, GestureState, MorphChannel, MorphChannelMap, PlayOptions,
};
use concierge_engine::config::EngineConfig;
use concierge_engine::director::{AvatarDirector, ConversationSignal};
use concierge_engine::signal::BandAnalyser;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAME_DELTA: f32 = 1.0 / 60.0;

/// Player that logs clip selections instead of driving a mixer.
struct LoggingPlayer;

impl AnimationPlayer for LoggingPlayer {
    fn play(&mut self, clip: GestureState, options: PlayOptions) {
        info!(clip = clip.clip_name(), looped = options.looped, "play animation");
    }

    fn clip_duration(&self, clip: GestureState) -> Option<f32> {
        // Durations from the receptionist GLB export.
        match clip {
            GestureState::Waving => Some(2.4),
            GestureState::Pointing => Some(2.1),
            GestureState::NodYes => Some(1.4),
            GestureState::Bow => Some(2.9),
            GestureState::Idle | GestureState::Talking => None,
        }
    }
}

/// Voice source for the analyser: a loaded WAV or a synthesized vowel-ish
/// tone mixing a low fundamental with a formant band.
struct VoiceSource {
    samples: Vec<f32>,
    cursor: usize,
}

impl VoiceSource {
    fn from_wav(path: &str) -> Result<Self> {
        let mut reader =
            hound::WavReader::open(path).with_context(|| format!("opening {}", path))?;
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };
        info!(path, frames = samples.len(), rate = spec.sample_rate, "loaded voice wav");
        Ok(Self { samples, cursor: 0 })
    }

    fn synthesized(sample_rate: f32, seconds: f32) -> Self {
        let count = (sample_rate * seconds) as usize;
        let samples = (0..count)
            .map(|i| {
                let t = i as f32 / sample_rate;
                // Amplitude wobble fakes syllable rhythm.
                let syllable = (2.0 * std::f32::consts::PI * 4.0 * t).sin().abs();
                let fundamental = (2.0 * std::f32::consts::PI * 150.0 * t).sin();
                let formant = (2.0 * std::f32::consts::PI * 800.0 * t).sin();
                0.35 * syllable * (0.7 * fundamental + 0.3 * formant)
            })
            .collect();
        Self { samples, cursor: 0 }
    }

    fn next_chunk(&mut self, len: usize) -> &[f32] {
        let end = (self.cursor + len).min(self.samples.len());
        let chunk = &self.samples[self.cursor..end];
        self.cursor = end;
        chunk
    }
}

/// Simulation state shared across phases: the advancing clock, the
/// analyser feeding the director's lip-sync cell, and the voice samples.
struct Simulation {
    director: AvatarDirector,
    analyser: BandAnalyser,
    voice: VoiceSource,
    now: Instant,
    samples_per_frame: usize,
}

impl Simulation {
    fn signal(&mut self, signal: ConversationSignal) {
        self.director.apply_at(signal, self.now);
    }

    /// Advance `seconds` of simulated frames, optionally pumping voice
    /// samples through the analyser, and summarize the final frame.
    fn run_phase(&mut self, phase: &str, seconds: f32, speaking: bool) {
        let cell = self.director.lip_sync_cell();
        let clock = self.director.clock();
        let steps = (seconds / FRAME_DELTA).ceil() as u32;
        let mut solved = MorphChannelMap::new();
        for _ in 0..steps {
            self.now += Duration::from_secs_f32(FRAME_DELTA);
            if speaking {
                let chunk = self.voice.next_chunk(self.samples_per_frame).to_vec();
                for frame in self.analyser.push(&chunk, clock.seconds_at(self.now)) {
                    cell.publish(frame);
                }
            }
            solved = self.director.frame_at(FRAME_DELTA, self.now);
        }
        print_summary(phase, &self.director, &solved);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::default();
    let sample_rate = config.analyser.sample_rate;
    let voice = match std::env::args().nth(1) {
        Some(path) => VoiceSource::from_wav(&path)?,
        None => VoiceSource::synthesized(sample_rate, 6.0),
    };

    let mut sim = Simulation {
        analyser: BandAnalyser::new(config.analyser.clone()),
        director: AvatarDirector::new(config, Box::new(LoggingPlayer)),
        voice,
        now: Instant::now(),
        samples_per_frame: (sample_rate * FRAME_DELTA) as usize,
    };

    info!("visitor approaches the kiosk");
    sim.signal(ConversationSignal::Connected);
    sim.run_phase("greeting", 2.0, false);

    info!("assistant starts speaking");
    sim.signal(ConversationSignal::AssistantSpeechStarted);
    sim.run_phase("speaking", 2.5, true);

    info!("tool call confirms the visitor's meeting");
    sim.signal(ConversationSignal::IntentConfirmed);
    sim.run_phase("confirming", 2.0, true);

    info!("assistant stops speaking; visitor is routed");
    sim.signal(ConversationSignal::AssistantSpeechEnded);
    sim.signal(ConversationSignal::VisitorRouted);
    sim.run_phase("routing", 3.0, false);

    info!("interaction wraps up");
    sim.signal(ConversationSignal::InteractionEnded);
    sim.run_phase("farewell", 3.5, false);

    sim.signal(ConversationSignal::SessionClosed);
    sim.director.shutdown();
    info!("session closed");
    Ok(())
}

/// Print the strongest morph channels so a phase is inspectable at a
/// glance.
fn print_summary(phase: &str, director: &AvatarDirector, solved: &MorphChannelMap) {
    let mut channels: Vec<(MorphChannel, f32)> =
        solved.iter().map(|(c, v)| (*c, *v)).collect();
    channels.sort_by(|a, b| b.1.total_cmp(&a.1));
    let top: Vec<String> = channels
        .iter()
        .take(5)
        .filter(|(_, v)| *v > 0.005)
        .map(|(c, v)| format!("{}={:.3}", c.as_str(), v))
        .collect();
    info!(
        phase,
        cue = director.expression_cue().as_str(),
        gesture = director.gesture_state().clip_name(),
        morphs = %top.join(" "),
        "phase summary"
    );
}
