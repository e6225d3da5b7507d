//! Per-world bookkeeping of controllers needing post-tick attention.
//!
//! Controllers mark themselves dirty (changed this tick) or dead (emptied)
//! at any point during the tick; the sets are drained exactly once at
//! end-of-tick. There is deliberately no un-mark: a controller marked dead
//! stays dead for the remainder of the tick that killed it.
//!
//! One `Registry` per world, owned by the simulation context -- never a
//! process-wide static.

use crate::controller::ControllerId;
use dashmap::DashSet;

pub struct Registry {
    dirty: DashSet<ControllerId>,
    dead: DashSet<ControllerId>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            dirty: DashSet::new(),
            dead: DashSet::new(),
        }
    }

    /// Schedule `id` for the end-of-tick sweeps.
    pub fn mark_dirty(&self, id: ControllerId) {
        self.dirty.insert(id);
    }

    /// Schedule `id` for discard. Irrevocable within the tick.
    pub fn mark_dead(&self, id: ControllerId) {
        self.dead.insert(id);
    }

    pub fn is_dead(&self, id: ControllerId) -> bool {
        self.dead.contains(&id)
    }

    /// Drain the dirty set. A controller marked dirty between the collect
    /// and the remove is simply picked up by the next drain -- always safe.
    pub fn take_dirty(&self) -> Vec<ControllerId> {
        let drained: Vec<ControllerId> = self.dirty.iter().map(|entry| *entry).collect();
        for id in &drained {
            self.dirty.remove(id);
        }
        drained
    }

    /// Drain the dead set. Call after the dirty drain so sweeps never see a
    /// controller the same tick already discarded.
    pub fn take_dead(&self) -> Vec<ControllerId> {
        let drained: Vec<ControllerId> = self.dead.iter().map(|entry| *entry).collect();
        for id in &drained {
            self.dead.remove(id);
        }
        drained
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn dead_count(&self) -> usize {
        self.dead.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
