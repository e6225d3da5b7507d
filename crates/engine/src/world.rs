//! Per-world simulation context.
//!
//! Owns the part and controller arenas, the position index, and the
//! registry, and hosts the part-lifecycle orchestration: a loading part
//! joins (or bridges, merging) neighboring controllers; a removed part
//! detaches; once per tick the registry drains and the deferred sweeps run.
//!
//! All mutation happens on the tick thread (the engine's one concession to
//! parallelism is the read-only flood fill inside large sweeps).

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::controller::validate::WholenessValidator;
use crate::controller::{ControllerId, MultiblockController};
use crate::grid::{BlockPos, ChunkPos, GridProvider};
use crate::part::hooks::PartHooks;
use crate::part::{Part, PartArena, PartId};
use crate::registry::Registry;

/// Hard cap on sweep/re-attach rounds within one tick. Orphan re-homing can
/// dirty fresh controllers, so the drain repeats until quiet; the cap
/// bounds a pathological cascade.
const MAX_TICK_ROUNDS: usize = 64;

pub struct MultiblockWorld {
    parts: PartArena,
    controllers: SlotMap<ControllerId, MultiblockController>,
    index: HashMap<BlockPos, PartId>,
    registry: Registry,
}

impl MultiblockWorld {
    pub fn new() -> Self {
        Self {
            parts: PartArena::with_key(),
            controllers: SlotMap::with_key(),
            index: HashMap::new(),
            registry: Registry::new(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn parts(&self) -> &PartArena {
        &self.parts
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    pub fn part_at(&self, pos: BlockPos) -> Option<PartId> {
        self.index.get(&pos).copied()
    }

    pub fn controller(&self, id: ControllerId) -> Option<&MultiblockController> {
        self.controllers.get(id)
    }

    pub fn controller_mut(&mut self, id: ControllerId) -> Option<&mut MultiblockController> {
        self.controllers.get_mut(id)
    }

    pub fn controller_of(&self, part: PartId) -> Option<ControllerId> {
        self.parts.get(part).and_then(|entry| entry.controller())
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    // ── Part lifecycle ──────────────────────────────────────────────────

    /// A cell at `pos` became active.
    ///
    /// The new part joins the compatible neighboring controller, bridges
    /// (and thereby merges) several, or founds a fresh controller if it has
    /// none. `pending` is saved controller state read alongside the cell,
    /// merged at attach.
    pub fn part_loaded(
        &mut self,
        pos: BlockPos,
        pending: Option<Vec<u8>>,
        grid: &dyn GridProvider,
        hooks: &mut dyn PartHooks,
    ) -> PartId {
        if let Some(existing) = self.index.get(&pos).copied() {
            // Cell rebuilt in place: the stale occupant goes first.
            self.part_destroyed(existing, hooks);
        }

        let id = self.parts.insert(Part::new(pos));
        if let Some(blob) = pending {
            self.parts[id].set_pending_snapshot(blob);
        }
        self.index.insert(pos, id);
        self.attach_to_neighbors(id, pos, grid, hooks);
        id
    }

    /// A cell was deliberately removed from the world.
    pub fn part_destroyed(&mut self, id: PartId, hooks: &mut dyn PartHooks) {
        let Some(part) = self.parts.get_mut(id) else {
            return;
        };
        part.invalidate();
        let pos = part.position();
        let owner = part.controller();

        if let Some(controller) = owner.and_then(|c| self.controllers.get_mut(c)) {
            controller.detach_part(id, false, &mut self.parts, &self.registry, hooks);
        }

        if self.index.get(&pos) == Some(&id) {
            self.index.remove(&pos);
        }
        self.parts.remove(id);
    }

    /// A cell left memory with its chunk. The part stays valid in the world
    /// but detaches (pausing an assembled machine) and is dropped from the
    /// arena.
    pub fn part_unloaded(&mut self, id: PartId, hooks: &mut dyn PartHooks) {
        let Some(part) = self.parts.get(id) else {
            return;
        };
        let pos = part.position();
        let owner = part.controller();

        if let Some(controller) = owner.and_then(|c| self.controllers.get_mut(c)) {
            controller.detach_part(id, true, &mut self.parts, &self.registry, hooks);
        }

        if self.index.get(&pos) == Some(&id) {
            self.index.remove(&pos);
        }
        self.parts.remove(id);
    }

    /// Detach every part in the unloading chunk column.
    pub fn chunk_unloaded(&mut self, chunk: ChunkPos, hooks: &mut dyn PartHooks) {
        let unloading: Vec<PartId> = self
            .index
            .iter()
            .filter(|(pos, _)| pos.chunk() == chunk)
            .map(|(_, id)| *id)
            .collect();
        for id in unloading {
            self.part_unloaded(id, hooks);
        }
    }

    // ── Per-tick drain ──────────────────────────────────────────────────

    /// End-of-tick processing: run the deferred sweeps on every dirty
    /// controller, re-home orphans, repeat until quiet, then discard the
    /// dead.
    pub fn run_tick(
        &mut self,
        grid: &dyn GridProvider,
        validator: &mut dyn WholenessValidator,
        hooks: &mut dyn PartHooks,
    ) {
        let mut rounds = 0;
        loop {
            let dirty = self.registry.take_dirty();
            if dirty.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > MAX_TICK_ROUNDS {
                tracing::warn!(
                    "tick drain still busy after {} rounds; deferring {} controllers",
                    MAX_TICK_ROUNDS,
                    dirty.len()
                );
                for id in dirty {
                    self.registry.mark_dirty(id);
                }
                break;
            }

            let mut orphans: Vec<PartId> = Vec::new();
            for id in dirty {
                if self.registry.is_dead(id) {
                    continue;
                }
                let Some(controller) = self.controllers.get_mut(id) else {
                    continue;
                };
                orphans.extend(controller.check_for_disconnections(
                    &mut self.parts,
                    &self.registry,
                    hooks,
                ));
                if self.registry.is_dead(id) {
                    continue;
                }
                controller.recalculate_bounding_box();
                controller.check_if_whole(&mut self.parts, validator, hooks);
            }

            // Re-home orphans in ascending position order so every peer
            // rebuilds the same controllers.
            orphans.sort_by_key(|id| self.parts.get(*id).map(|part| part.position()));
            for id in orphans {
                let Some(part) = self.parts.get(id) else {
                    continue;
                };
                if !part.is_valid() || part.controller().is_some() {
                    continue;
                }
                let pos = part.position();
                self.attach_to_neighbors(id, pos, grid, hooks);
            }
        }

        for id in self.registry.take_dead() {
            if let Some(controller) = self.controllers.remove(id) {
                debug_assert!(controller.is_empty());
                tracing::debug!("controller {:?} discarded", id);
            }
        }
    }

    // ── Attachment ──────────────────────────────────────────────────────

    /// Join `part` to the controllers owning its neighbors: none founds a
    /// fresh controller; several means the part bridges them, and the
    /// dominant controller absorbs the rest before taking the part.
    fn attach_to_neighbors(
        &mut self,
        part: PartId,
        pos: BlockPos,
        grid: &dyn GridProvider,
        hooks: &mut dyn PartHooks,
    ) {
        let mut candidates: Vec<ControllerId> = Vec::new();
        for neighbor in pos.neighbors() {
            let owner = self
                .index
                .get(&neighbor)
                .and_then(|id| self.parts.get(*id))
                .and_then(|entry| entry.controller());
            if let Some(id) = owner {
                if !candidates.contains(&id) {
                    candidates.push(id);
                }
            }
        }

        if candidates.is_empty() {
            let id = self
                .controllers
                .insert_with_key(MultiblockController::new);
            tracing::debug!("new controller {:?} founded at {:?}", id, pos);
            self.controllers[id].attach_part(part, &mut self.parts, &self.registry, hooks);
            return;
        }

        let mut winner = candidates[0];
        for challenger in candidates[1..].iter().copied() {
            let Some([current, other]) = self.controllers.get_disjoint_mut([winner, challenger])
            else {
                continue;
            };
            if other.should_consume(current, &mut self.parts, grid) {
                winner = challenger;
            }
        }

        for loser in candidates.into_iter().filter(|id| *id != winner) {
            let Some([survivor, consumed]) = self.controllers.get_disjoint_mut([winner, loser])
            else {
                continue;
            };
            survivor.assimilate(consumed, &mut self.parts, &self.registry, hooks);
        }

        self.controllers[winner].attach_part(part, &mut self.parts, &self.registry, hooks);
    }
}

impl Default for MultiblockWorld {
    fn default() -> Self {
        Self::new()
    }
}
