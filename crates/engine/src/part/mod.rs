//! Parts: the grid cells a machine is made of.

pub mod hooks;

use crate::controller::ControllerId;
use crate::grid::BlockPos;
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Stable generation-checked handle for a part.
    pub struct PartId;
}

/// Arena holding every live part of one world.
///
/// "Part no longer exists" is a failed lookup here, never a dangling
/// reference -- handles held across a tick stay safe to probe.
pub type PartArena = SlotMap<PartId, Part>;

/// A single grid cell participating in a multiblock group.
///
/// Identity is the position: positions are unique within a world, and a
/// part moves only by being removed and re-added elsewhere.
#[derive(Debug, Clone)]
pub struct Part {
    pos: BlockPos,
    controller: Option<ControllerId>,
    visited: bool,
    save_delegate: bool,
    valid: bool,
    pending_snapshot: Option<Vec<u8>>,
}

impl Part {
    pub fn new(pos: BlockPos) -> Self {
        Self {
            pos,
            controller: None,
            visited: false,
            save_delegate: false,
            valid: true,
            pending_snapshot: None,
        }
    }

    pub const fn position(&self) -> BlockPos {
        self.pos
    }

    /// The owning controller, if attached.
    pub const fn controller(&self) -> Option<ControllerId> {
        self.controller
    }

    /// False once the backing cell has been destroyed. Handles observed
    /// later in the same tick see this instead of dangling data.
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Whether this part is its controller's elected save delegate.
    pub const fn is_save_delegate(&self) -> bool {
        self.save_delegate
    }

    /// Transient connectivity-sweep mark. Reset before each sweep.
    pub const fn is_visited(&self) -> bool {
        self.visited
    }

    /// Cache saved controller state on a freshly loaded part. It is merged
    /// into whichever controller the part first attaches to, then dropped.
    pub fn set_pending_snapshot(&mut self, blob: Vec<u8>) {
        self.pending_snapshot = Some(blob);
    }

    pub fn has_pending_snapshot(&self) -> bool {
        self.pending_snapshot.is_some()
    }

    pub(crate) fn take_pending_snapshot(&mut self) -> Option<Vec<u8>> {
        self.pending_snapshot.take()
    }

    pub(crate) fn set_controller(&mut self, controller: Option<ControllerId>) {
        self.controller = controller;
    }

    pub(crate) fn set_save_delegate(&mut self, save_delegate: bool) {
        self.save_delegate = save_delegate;
    }

    pub(crate) fn set_visited(&mut self, visited: bool) {
        self.visited = visited;
    }
}
