//! Canonical morph channels and per-model alias resolution.
//!
//! The solver always speaks the canonical vocabulary below. Individual
//! avatar assets expose whatever subset and spelling they were exported
//! with, so canonical names go through an alias table against the model's
//! own morph dictionary; channels with no match are silently omitted.

use std::collections::HashMap;

/// A loaded model's morph-target name → influence-slot index.
pub type MorphDictionary = HashMap<String, usize>;

/// Solved morph intensities, keyed by canonical channel.
pub type MorphChannelMap = HashMap<MorphChannel, f32>;

/// Every morph channel the facial solver drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MorphChannel {
    EyeBlinkLeft,
    EyeBlinkRight,
    JawOpen,
    VisemeAa,
    VisemeE,
    VisemeO,
    VisemeU,
    VisemeFf,
    VisemeTh,
    VisemePp,
    VisemeSil,
    MouthSmileLeft,
    MouthSmileRight,
    BrowInnerUp,
    BrowDownLeft,
    BrowDownRight,
    CheekSquintLeft,
    CheekSquintRight,
    EyeWideLeft,
    EyeWideRight,
    EyeLookInLeft,
    EyeLookInRight,
    EyeLookOutLeft,
    EyeLookOutRight,
    EyeLookUpLeft,
    EyeLookUpRight,
    EyeLookDownLeft,
    EyeLookDownRight,
}

impl MorphChannel {
    pub const COUNT: usize = 28;

    /// All channels, in solver order. Indexed by `channel as usize`.
    pub const ALL: [MorphChannel; Self::COUNT] = [
        MorphChannel::EyeBlinkLeft,
        MorphChannel::EyeBlinkRight,
        MorphChannel::JawOpen,
        MorphChannel::VisemeAa,
        MorphChannel::VisemeE,
        MorphChannel::VisemeO,
        MorphChannel::VisemeU,
        MorphChannel::VisemeFf,
        MorphChannel::VisemeTh,
        MorphChannel::VisemePp,
        MorphChannel::VisemeSil,
        MorphChannel::MouthSmileLeft,
        MorphChannel::MouthSmileRight,
        MorphChannel::BrowInnerUp,
        MorphChannel::BrowDownLeft,
        MorphChannel::BrowDownRight,
        MorphChannel::CheekSquintLeft,
        MorphChannel::CheekSquintRight,
        MorphChannel::EyeWideLeft,
        MorphChannel::EyeWideRight,
        MorphChannel::EyeLookInLeft,
        MorphChannel::EyeLookInRight,
        MorphChannel::EyeLookOutLeft,
        MorphChannel::EyeLookOutRight,
        MorphChannel::EyeLookUpLeft,
        MorphChannel::EyeLookUpRight,
        MorphChannel::EyeLookDownLeft,
        MorphChannel::EyeLookDownRight,
    ];

    /// Canonical spelling (ARKit / Ready Player Me convention).
    pub fn as_str(&self) -> &'static str {
        match self {
            MorphChannel::EyeBlinkLeft => "eyeBlinkLeft",
            MorphChannel::EyeBlinkRight => "eyeBlinkRight",
            MorphChannel::JawOpen => "jawOpen",
            MorphChannel::VisemeAa => "viseme_aa",
            MorphChannel::VisemeE => "viseme_E",
            MorphChannel::VisemeO => "viseme_O",
            MorphChannel::VisemeU => "viseme_U",
            MorphChannel::VisemeFf => "viseme_FF",
            MorphChannel::VisemeTh => "viseme_TH",
            MorphChannel::VisemePp => "viseme_PP",
            MorphChannel::VisemeSil => "viseme_sil",
            MorphChannel::MouthSmileLeft => "mouthSmileLeft",
            MorphChannel::MouthSmileRight => "mouthSmileRight",
            MorphChannel::BrowInnerUp => "browInnerUp",
            MorphChannel::BrowDownLeft => "browDownLeft",
            MorphChannel::BrowDownRight => "browDownRight",
            MorphChannel::CheekSquintLeft => "cheekSquintLeft",
            MorphChannel::CheekSquintRight => "cheekSquintRight",
            MorphChannel::EyeWideLeft => "eyeWideLeft",
            MorphChannel::EyeWideRight => "eyeWideRight",
            MorphChannel::EyeLookInLeft => "eyeLookInLeft",
            MorphChannel::EyeLookInRight => "eyeLookInRight",
            MorphChannel::EyeLookOutLeft => "eyeLookOutLeft",
            MorphChannel::EyeLookOutRight => "eyeLookOutRight",
            MorphChannel::EyeLookUpLeft => "eyeLookUpLeft",
            MorphChannel::EyeLookUpRight => "eyeLookUpRight",
            MorphChannel::EyeLookDownLeft => "eyeLookDownLeft",
            MorphChannel::EyeLookDownRight => "eyeLookDownRight",
        }
    }

    /// Dictionary spellings to try, in preference order. First match wins.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            MorphChannel::EyeBlinkLeft => &["eyeBlinkLeft", "eyesClosed"],
            MorphChannel::EyeBlinkRight => &["eyeBlinkRight", "eyesClosed"],
            MorphChannel::JawOpen => &["jawOpen", "mouthOpen"],
            MorphChannel::VisemeAa => &["viseme_aa", "viseme_AA"],
            MorphChannel::VisemeFf => &["viseme_FF", "viseme_FV"],
            MorphChannel::VisemePp => &["viseme_PP", "viseme_MBP"],
            MorphChannel::MouthSmileLeft => &["mouthSmileLeft", "mouthSmile"],
            MorphChannel::MouthSmileRight => &["mouthSmileRight", "mouthSmile"],
            MorphChannel::VisemeE => &["viseme_E"],
            MorphChannel::VisemeO => &["viseme_O"],
            MorphChannel::VisemeU => &["viseme_U"],
            MorphChannel::VisemeTh => &["viseme_TH"],
            MorphChannel::VisemeSil => &["viseme_sil"],
            MorphChannel::BrowInnerUp => &["browInnerUp"],
            MorphChannel::BrowDownLeft => &["browDownLeft"],
            MorphChannel::BrowDownRight => &["browDownRight"],
            MorphChannel::CheekSquintLeft => &["cheekSquintLeft"],
            MorphChannel::CheekSquintRight => &["cheekSquintRight"],
            MorphChannel::EyeWideLeft => &["eyeWideLeft"],
            MorphChannel::EyeWideRight => &["eyeWideRight"],
            MorphChannel::EyeLookInLeft => &["eyeLookInLeft"],
            MorphChannel::EyeLookInRight => &["eyeLookInRight"],
            MorphChannel::EyeLookOutLeft => &["eyeLookOutLeft"],
            MorphChannel::EyeLookOutRight => &["eyeLookOutRight"],
            MorphChannel::EyeLookUpLeft => &["eyeLookUpLeft"],
            MorphChannel::EyeLookUpRight => &["eyeLookUpRight"],
            MorphChannel::EyeLookDownLeft => &["eyeLookDownLeft"],
            MorphChannel::EyeLookDownRight => &["eyeLookDownRight"],
        }
    }
}

/// Resolve a canonical channel against a model's morph dictionary.
/// Returns the first alias spelling the dictionary actually contains.
pub fn resolve_morph_alias<'a>(
    dictionary: &'a MorphDictionary,
    channel: MorphChannel,
) -> Option<&'a str> {
    channel
        .aliases()
        .iter()
        .find_map(|alias| dictionary.get_key_value(*alias).map(|(k, _)| k.as_str()))
}

/// Map solved canonical channels onto a model's own morph names. Channels
/// the model does not expose are dropped without complaint.
pub fn map_to_dictionary(
    dictionary: &MorphDictionary,
    channels: &MorphChannelMap,
) -> HashMap<String, f32> {
    let mut mapped = HashMap::with_capacity(channels.len());
    for (&channel, &value) in channels {
        if let Some(alias) = resolve_morph_alias(dictionary, channel) {
            mapped.insert(alias.to_string(), value);
        }
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary(entries: &[(&str, usize)]) -> MorphDictionary {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn resolves_uppercase_viseme_alias() {
        let dict = dictionary(&[("viseme_AA", 4), ("jawOpen", 1)]);
        assert_eq!(
            resolve_morph_alias(&dict, MorphChannel::VisemeAa),
            Some("viseme_AA")
        );
    }

    #[test]
    fn primary_spelling_wins_over_alias() {
        let dict = dictionary(&[("viseme_aa", 0), ("viseme_AA", 1)]);
        assert_eq!(
            resolve_morph_alias(&dict, MorphChannel::VisemeAa),
            Some("viseme_aa")
        );
    }

    #[test]
    fn missing_channel_resolves_to_none() {
        let dict = dictionary(&[("jawOpen", 1)]);
        assert_eq!(resolve_morph_alias(&dict, MorphChannel::VisemeTh), None);
    }

    #[test]
    fn map_drops_channels_the_model_lacks() {
        let dict = dictionary(&[("viseme_AA", 4), ("jawOpen", 1)]);
        let channels: MorphChannelMap = [
            (MorphChannel::VisemeAa, 0.6),
            (MorphChannel::JawOpen, 0.3),
            (MorphChannel::EyeBlinkLeft, 0.9),
        ]
        .into_iter()
        .collect();

        let mapped = map_to_dictionary(&dict, &channels);
        assert_eq!(mapped.len(), 2, "eyeBlinkLeft has no alias in this model");
        assert_eq!(mapped["viseme_AA"], 0.6);
        assert_eq!(mapped["jawOpen"], 0.3);
    }

    #[test]
    fn all_channels_have_consistent_primary_alias() {
        for channel in MorphChannel::ALL {
            assert_eq!(
                channel.aliases()[0],
                channel.as_str(),
                "first alias must be the canonical spelling for {:?}",
                channel
            );
        }
    }

    #[test]
    fn solver_order_matches_discriminants() {
        for (index, channel) in MorphChannel::ALL.iter().enumerate() {
            assert_eq!(*channel as usize, index);
        }
    }
}
