//! Expression cues, their baseline morph presets, and solver tuning.
//!
//! A cue biases the non-speech channels (smile, brow, cheek) the solver
//! approaches each frame; it never jumps the face, smoothing does the
//! transition. Preset values were hand-tuned against the receptionist rig
//! at conversational viewing distance.

use super::morphs::MorphChannel;
use serde::{Deserialize, Serialize};

/// High-level conversational expression state. Exactly one is active at a
/// time; the surrounding session sets it from conversation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionCue {
    NeutralProfessional,
    WelcomeWarm,
    ListeningAttentive,
    ExplainingConfident,
    ConfirmingYes,
    EmpathySoft,
    GoodbyeFormal,
}

impl ExpressionCue {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionCue::NeutralProfessional => "neutral_professional",
            ExpressionCue::WelcomeWarm => "welcome_warm",
            ExpressionCue::ListeningAttentive => "listening_attentive",
            ExpressionCue::ExplainingConfident => "explaining_confident",
            ExpressionCue::ConfirmingYes => "confirming_yes",
            ExpressionCue::EmpathySoft => "empathy_soft",
            ExpressionCue::GoodbyeFormal => "goodbye_formal",
        }
    }

    /// Baseline morph targets for this cue.
    pub fn preset(&self) -> &'static [(MorphChannel, f32)] {
        use MorphChannel::*;
        match self {
            ExpressionCue::NeutralProfessional => &[
                (MouthSmileLeft, 0.1),
                (MouthSmileRight, 0.1),
                (BrowInnerUp, 0.01),
            ],
            ExpressionCue::WelcomeWarm => &[
                (MouthSmileLeft, 0.24),
                (MouthSmileRight, 0.24),
                (BrowInnerUp, 0.08),
                (CheekSquintLeft, 0.05),
                (CheekSquintRight, 0.05),
            ],
            ExpressionCue::ListeningAttentive => &[
                (MouthSmileLeft, 0.12),
                (MouthSmileRight, 0.12),
                (BrowInnerUp, 0.1),
                (EyeWideLeft, 0.03),
                (EyeWideRight, 0.03),
            ],
            ExpressionCue::ExplainingConfident => &[
                (MouthSmileLeft, 0.14),
                (MouthSmileRight, 0.14),
                (BrowInnerUp, 0.04),
                (BrowDownLeft, 0.03),
                (BrowDownRight, 0.03),
            ],
            ExpressionCue::ConfirmingYes => &[
                (MouthSmileLeft, 0.2),
                (MouthSmileRight, 0.2),
                (BrowInnerUp, 0.06),
            ],
            ExpressionCue::EmpathySoft => &[
                (MouthSmileLeft, 0.08),
                (MouthSmileRight, 0.08),
                (BrowInnerUp, 0.12),
                (BrowDownLeft, 0.02),
                (BrowDownRight, 0.02),
            ],
            ExpressionCue::GoodbyeFormal => &[
                (MouthSmileLeft, 0.18),
                (MouthSmileRight, 0.18),
                (BrowInnerUp, 0.03),
            ],
        }
    }

    pub const ALL: [ExpressionCue; 7] = [
        ExpressionCue::NeutralProfessional,
        ExpressionCue::WelcomeWarm,
        ExpressionCue::ListeningAttentive,
        ExpressionCue::ExplainingConfident,
        ExpressionCue::ConfirmingYes,
        ExpressionCue::EmpathySoft,
        ExpressionCue::GoodbyeFormal,
    ];
}

impl Default for ExpressionCue {
    fn default() -> Self {
        ExpressionCue::NeutralProfessional
    }
}

/// Tuning constants for the facial solver.
///
/// The jaw and viseme ceilings are intentional: full-amplitude mouth
/// morphs read as shouting at kiosk distance, so conversational speech is
/// capped well below 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacialSolverConfig {
    /// Smoothing rate (per second) when a channel value is rising.
    pub attack_speed: f32,
    /// Smoothing rate when a channel value is falling.
    pub decay_speed: f32,
    /// Ceiling for `jawOpen`.
    pub max_jaw: f32,
    /// Ceiling for the viseme channels.
    pub max_viseme: f32,
    /// Seconds between autonomous blinks (uniform range).
    pub blink_min_interval: f32,
    pub blink_max_interval: f32,
    /// Duration of one blink.
    pub blink_duration: f32,
    /// Seconds between eye saccades (uniform range).
    pub saccade_min_interval: f32,
    pub saccade_max_interval: f32,
    /// Horizontal saccade amplitude; vertical is 0.7× this.
    pub saccade_max_amount: f32,
    /// Smoothing rate pulling the eyes toward the saccade target.
    pub saccade_responsiveness: f32,
    /// Seconds after which a lip-sync frame counts as stale.
    pub stale_threshold: f64,
}

impl Default for FacialSolverConfig {
    fn default() -> Self {
        Self {
            attack_speed: 16.0,
            decay_speed: 7.0,
            max_jaw: 0.38,
            max_viseme: 0.48,
            blink_min_interval: 2.8,
            blink_max_interval: 5.0,
            blink_duration: 0.12,
            saccade_min_interval: 1.3,
            saccade_max_interval: 2.8,
            saccade_max_amount: 0.08,
            saccade_responsiveness: 8.0,
            stale_threshold: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_value_is_bounded() {
        for cue in ExpressionCue::ALL {
            for (channel, value) in cue.preset() {
                assert!(
                    (0.0..=1.0).contains(value),
                    "{:?}/{:?} preset out of range: {}",
                    cue,
                    channel,
                    value
                );
            }
        }
    }

    #[test]
    fn welcome_smiles_harder_than_neutral() {
        let smile = |cue: ExpressionCue| {
            cue.preset()
                .iter()
                .find(|(c, _)| *c == MorphChannel::MouthSmileLeft)
                .map(|(_, v)| *v)
                .unwrap_or(0.0)
        };
        assert!(smile(ExpressionCue::WelcomeWarm) > smile(ExpressionCue::NeutralProfessional));
    }

    #[test]
    fn cue_serde_uses_snake_case_wire_names() {
        let json = serde_json::to_string(&ExpressionCue::WelcomeWarm).unwrap();
        assert_eq!(json, "\"welcome_warm\"");
        let cue: ExpressionCue = serde_json::from_str("\"empathy_soft\"").unwrap();
        assert_eq!(cue, ExpressionCue::EmpathySoft);
        for cue in ExpressionCue::ALL {
            assert_eq!(
                serde_json::to_string(&cue).unwrap(),
                format!("\"{}\"", cue.as_str())
            );
        }
    }
}
