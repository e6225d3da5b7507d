//! Controller state snapshot for persistence and network resync.
//!
//! The save-delegate part writes this blob through the external sync
//! provider, keyed by its own position; a loading peer caches the blob on
//! the first part it sees and merges it into the controller at attach time.

use super::assembly::AssemblyState;
use crate::grid::BoundingBox;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything a peer (or a save file) needs to resynchronize a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub state: AssemblyState,
    pub bounds: BoundingBox,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to encode controller snapshot: {0}")]
    Encode(serde_json::Error),

    #[error("failed to decode controller snapshot: {0}")]
    Decode(serde_json::Error),
}

impl ControllerSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        serde_json::to_vec(self).map_err(SyncError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SyncError> {
        serde_json::from_slice(bytes).map_err(SyncError::Decode)
    }
}
