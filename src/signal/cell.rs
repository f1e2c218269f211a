//! Single-slot, timestamped, overwrite-on-write handoff cell.
//!
//! Only the most recent lip-sync frame matters, so this is a "latest
//! value" channel rather than a queue: publishing never waits on the
//! reader, and backpressure can never reach the audio side.

use super::LipSyncFrame;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared handle to the latest lip-sync frame.
///
/// Cloning is cheap; one clone lives with the analyser task, another with
/// the render-side director. Readers apply the staleness policy at read
/// time, so a stalled writer simply looks like silence.
#[derive(Clone)]
pub struct LipSyncCell {
    slot: Arc<watch::Sender<Option<LipSyncFrame>>>,
}

impl LipSyncCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    /// Overwrite the slot with a new frame.
    pub fn publish(&self, frame: LipSyncFrame) {
        self.slot.send_replace(Some(frame));
    }

    /// The most recent frame, if it is still fresh at `now` (engine
    /// seconds). Stale or absent frames read as `None`.
    pub fn latest(&self, now: f64, stale_after: f64) -> Option<LipSyncFrame> {
        let frame = (*self.slot.borrow())?;
        if now - frame.timestamp < stale_after {
            Some(frame)
        } else {
            None
        }
    }

    /// The most recent frame regardless of age.
    pub fn peek(&self) -> Option<LipSyncFrame> {
        *self.slot.borrow()
    }

    /// Empty the slot (session teardown).
    pub fn clear(&self) {
        self.slot.send_replace(None);
    }
}

impl Default for LipSyncCell {
    fn default() -> Self {
        Self::new()
    }
}
