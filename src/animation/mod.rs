//! The frame-rate animation core: facial morph solving, the gesture state
//! machine, and the priority queue that feeds it.

pub mod facial_controller;
pub mod gesture_controller;
pub mod gesture_queue;
pub mod morphs;
pub mod presets;
pub mod smoothing;

#[cfg(test)]
mod tests;

pub use facial_controller::{FacialController, FacialSignalFrame};
pub use gesture_controller::{
    AnimationPlayer, GestureController, GestureEvent, GestureState, GestureTimings, PlayOptions,
};
pub use gesture_queue::{GestureQueue, GestureRequest, QueueConfig, QueueError};
pub use morphs::{
    map_to_dictionary, resolve_morph_alias, MorphChannel, MorphChannelMap, MorphDictionary,
};
pub use presets::{ExpressionCue, FacialSolverConfig};
