//! Concierge Engine: real-time facial animation and gesture sequencing
//! for a 3D kiosk receptionist avatar.
//!
//! The engine turns a live conversation feed (audio playback lifecycle,
//! frequency-band lip-sync frames, tool-call intents) into bounded morph
//! target values and skeletal clip selections, frame by frame. Rendering,
//! the conversational AI connection, and visitor persistence all live
//! outside this crate; the seams are [`animation::AnimationPlayer`],
//! [`signal::cell::LipSyncCell`], and [`director::ConversationSignal`].

pub mod animation;
pub mod config;
pub mod director;
pub mod signal;
