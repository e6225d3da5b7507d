//! Controllers: one per connected group of parts.
//!
//! A controller owns the storage of its connected parts, the assembly state
//! machine, the elected reference part, and a cached bounding box. World
//! edits drive attach/detach; the per-tick sweeps (`check_for_disconnections`,
//! `check_if_whole`) run deferred, once per dirty controller, after all of
//! the tick's edits have been applied.

pub mod assembly;
pub mod reference;
pub mod storage;
pub mod sweep;
pub mod sync;
pub mod validate;

use std::cmp::Ordering;

use slotmap::new_key_type;

use crate::grid::{BlockPos, BoundingBox, GridProvider};
use crate::part::hooks::PartHooks;
use crate::part::{PartArena, PartId};
use crate::registry::Registry;

use assembly::AssemblyState;
use reference::ReferencePartTracker;
use storage::PartStorage;
use sync::{ControllerSnapshot, SyncError};
use validate::WholenessValidator;

new_key_type! {
    /// Stable generation-checked handle for a controller.
    pub struct ControllerId;
}

/// Subscriber notified when a controller's synced data changes.
///
/// Subscriptions live only while the machine is assembled: the list is
/// drained at the Assembled -> {Disassembled, Paused} boundary.
pub trait DataListener {
    fn on_data_updated(&mut self, controller: ControllerId);
}

/// Owner of one connected group of parts and its assembly lifecycle.
pub struct MultiblockController {
    id: ControllerId,
    connected: PartStorage,
    /// Parts removed since the last disconnection audit. Stashed only to
    /// arm the audit; a deliberately removed or unloaded part is gone and
    /// is never re-homed from here.
    detached: Vec<PartId>,
    state: AssemblyState,
    reference: ReferencePartTracker,
    needs_disconnect_check: bool,
    data_listeners: Vec<Box<dyn DataListener>>,
}

impl MultiblockController {
    pub fn new(id: ControllerId) -> Self {
        Self {
            id,
            connected: PartStorage::new(),
            detached: Vec::new(),
            state: AssemblyState::Disassembled,
            reference: ReferencePartTracker::new(),
            needs_disconnect_check: false,
            data_listeners: Vec::new(),
        }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// The connected-part storage (read-only; validators walk this).
    pub fn parts(&self) -> &PartStorage {
        &self.connected
    }

    pub fn part_count(&self) -> usize {
        self.connected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty()
    }

    pub fn reference_part(&self) -> Option<PartId> {
        self.reference.get()
    }

    pub fn reference_position(&self, parts: &PartArena) -> Option<BlockPos> {
        self.reference.position(parts)
    }

    /// The cached box. Call `recalculate_bounding_box` first if detaches may
    /// have shrunk it this tick (the registry drain does).
    pub fn bounding_box(&self) -> BoundingBox {
        self.connected.computed_bounds()
    }

    pub fn needs_disconnect_check(&self) -> bool {
        self.needs_disconnect_check
    }

    // ── Attach / detach ─────────────────────────────────────────────────

    /// Take ownership of `part`.
    ///
    /// Expands the cached bounding box (attach only grows it), offers the
    /// part for reference election, merges any pending snapshot the part
    /// carried from a save, and marks the controller dirty.
    pub fn attach_part(
        &mut self,
        part: PartId,
        parts: &mut PartArena,
        registry: &Registry,
        hooks: &mut dyn PartHooks,
    ) {
        let Some(entry) = parts.get_mut(part) else {
            tracing::warn!("attach of missing part {:?} ignored", part);
            return;
        };
        let pos = entry.position();
        entry.set_controller(Some(self.id));
        let pending = entry.take_pending_snapshot();

        if let Some(replaced) = self.connected.add_or_replace(pos, part) {
            // Cell rebuilt in place: the old occupant is disowned.
            if let Some(old) = parts.get_mut(replaced) {
                old.set_controller(None);
                old.set_save_delegate(false);
            }
            if self.reference.get() == Some(replaced) {
                self.reference.invalidate();
            }
        }
        hooks.on_attached(part, self.id);

        self.reference.accept(part, parts);

        if let Some(blob) = pending {
            if let Err(err) = self.deserialize_state(&blob) {
                tracing::warn!(
                    "controller {:?} dropped undecodable snapshot from part at {:?}: {}",
                    self.id,
                    pos,
                    err
                );
            }
        }

        registry.mark_dirty(self.id);
    }

    /// Release `part`.
    ///
    /// A chunk unload pauses an assembled machine first (temporary
    /// unavailability, not breakage). An emptied controller is marked dead
    /// immediately; otherwise the bounding box goes dirty, the part is
    /// stashed for the disconnection audit, and the controller goes dirty.
    pub fn detach_part(
        &mut self,
        part: PartId,
        is_chunk_unload: bool,
        parts: &mut PartArena,
        registry: &Registry,
        hooks: &mut dyn PartHooks,
    ) {
        if is_chunk_unload && self.state.is_assembled() {
            self.pause();
        }

        let pos = match parts.get(part) {
            Some(entry) => Some(entry.position()),
            None => self.connected.position_of(part),
        };
        let removed = match pos {
            Some(pos) => self.connected.remove(pos, part),
            None => false,
        };
        if removed {
            if let Some(entry) = parts.get_mut(part) {
                entry.set_controller(None);
                entry.set_save_delegate(false);
            }
            hooks.on_detached(part, self.id);
        }

        if self.reference.get() == Some(part) {
            // Re-elected lazily on next access.
            self.reference.invalidate();
        }

        if self.connected.is_empty() {
            self.connected.reset_bounds();
            registry.mark_dead(self.id);
            return;
        }

        self.detached.push(part);
        self.needs_disconnect_check = true;
        registry.mark_dirty(self.id);
    }

    // ── Merging ─────────────────────────────────────────────────────────

    /// Deterministic merge ordering: more connected parts wins; on a tie,
    /// the smaller reference position wins. An exact tie is a fault --
    /// both sides are audited against the grid and the comparison retried
    /// once; a persistent tie is a fatal consistency violation.
    pub fn should_consume(
        &mut self,
        other: &mut MultiblockController,
        parts: &mut PartArena,
        grid: &dyn GridProvider,
    ) -> bool {
        match self.rank_against(other) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => {
                // Identical rank between two live controllers means stale
                // bookkeeping somewhere; prune both sides and retry.
                tracing::warn!(
                    "controllers {:?} and {:?} tied at rank; auditing both",
                    self.id,
                    other.id
                );
                self.audit_parts(parts, grid);
                other.audit_parts(parts, grid);
                match self.rank_against(other) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => {
                        tracing::error!(
                            "controllers {:?} and {:?} still tied after audit ({} parts each)",
                            self.id,
                            other.id,
                            self.part_count()
                        );
                        panic!(
                            "two controllers with identical membership rank after audit: \
                             {:?} vs {:?}",
                            self.id, other.id
                        );
                    }
                }
            }
        }
    }

    /// Merge `other`'s parts into self, leaving it empty and dead.
    ///
    /// Precondition: self outranks `other` (see `should_consume`). Merging
    /// in the wrong direction is a programming error in the caller and
    /// panics rather than corrupting the component graph.
    pub fn assimilate(
        &mut self,
        other: &mut MultiblockController,
        parts: &mut PartArena,
        registry: &Registry,
        hooks: &mut dyn PartHooks,
    ) {
        if self.rank_against(other) != Ordering::Less {
            tracing::error!(
                "assimilation rank inverted: {:?} ({} parts) cannot consume {:?} ({} parts)",
                self.id,
                self.part_count(),
                other.id,
                other.part_count()
            );
            panic!(
                "assimilation rank inverted: {:?} cannot consume {:?}",
                self.id, other.id
            );
        }

        let migrated: Vec<PartId> = other.connected.ids().collect();
        self.connected.absorb(&mut other.connected);
        other.reference.invalidate();

        for id in &migrated {
            if let Some(part) = parts.get_mut(*id) {
                part.set_controller(Some(self.id));
            }
            hooks.on_assimilated(*id, self.id);
            self.reference.accept(*id, parts);
        }

        // Pending audit obligations follow the parts.
        self.detached.append(&mut other.detached);
        if other.needs_disconnect_check {
            self.needs_disconnect_check = true;
            other.needs_disconnect_check = false;
        }

        tracing::debug!(
            "controller {:?} assimilated {:?} ({} parts migrated)",
            self.id,
            other.id,
            migrated.len()
        );
        registry.mark_dead(other.id);
        registry.mark_dirty(self.id);
    }

    /// Merge rank: `Less` means self consumes `other`.
    fn rank_against(&self, other: &MultiblockController) -> Ordering {
        other
            .part_count()
            .cmp(&self.part_count())
            .then_with(|| match (self.connected.min_position(), other.connected.min_position()) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }

    /// Drop members whose backing cell is gone or unloaded. Returns the
    /// number pruned.
    pub fn audit_parts(&mut self, parts: &mut PartArena, grid: &dyn GridProvider) -> usize {
        let stale: Vec<(BlockPos, PartId)> = self
            .connected
            .iter()
            .filter(|(pos, id)| {
                let cell_dead = parts.get(*id).is_none_or(|part| !part.is_valid());
                cell_dead || grid.is_part_invalid_or_unloaded(*pos)
            })
            .collect();

        for (pos, id) in &stale {
            self.connected.remove(*pos, *id);
            if let Some(part) = parts.get_mut(*id) {
                part.set_controller(None);
                part.set_save_delegate(false);
            }
            if self.reference.get() == Some(*id) {
                self.reference.invalidate();
            }
        }
        if !stale.is_empty() {
            tracing::warn!(
                "controller {:?} audit pruned {} stale parts",
                self.id,
                stale.len()
            );
        }
        stale.len()
    }

    // ── Deferred sweeps ─────────────────────────────────────────────────

    /// Audit connectivity after detaches.
    ///
    /// No-op unless a detach armed the check. Re-elects the reference over
    /// the surviving members, then flood-fills from it; members the fill
    /// never reaches are disconnected. They are removed, disowned, reported
    /// via `on_orphaned`, and returned so the caller can re-home them. If
    /// no valid reference remains the controller is dead.
    pub fn check_for_disconnections(
        &mut self,
        parts: &mut PartArena,
        registry: &Registry,
        hooks: &mut dyn PartHooks,
    ) -> Vec<PartId> {
        if !self.needs_disconnect_check {
            return Vec::new();
        }
        self.needs_disconnect_check = false;

        self.reference.invalidate();
        let members: Vec<PartId> = self.connected.ids().collect();
        for id in &members {
            if let Some(part) = parts.get_mut(*id) {
                part.set_visited(false);
            }
        }
        self.reference.accept_all(members.iter().copied(), parts);

        let Some(reference) = self.reference.get() else {
            // Every member is invalid; nothing is left to anchor the machine.
            let remaining: Vec<(BlockPos, PartId)> = self.connected.iter().collect();
            for (pos, id) in remaining {
                self.connected.remove(pos, id);
                if let Some(part) = parts.get_mut(id) {
                    part.set_controller(None);
                    part.set_save_delegate(false);
                }
            }
            self.connected.reset_bounds();
            registry.mark_dead(self.id);
            return Vec::new();
        };

        let start = parts[reference].position();
        let reachable = sweep::connected_set(&self.connected, start);
        for pos in &reachable {
            if let Some(id) = self.connected.get(*pos) {
                if let Some(part) = parts.get_mut(id) {
                    part.set_visited(true);
                }
            }
        }

        let disconnected: Vec<(BlockPos, PartId)> = self
            .connected
            .iter()
            .filter(|(pos, _)| !reachable.contains(pos))
            .collect();
        let mut orphans = Vec::with_capacity(disconnected.len());
        for (pos, id) in disconnected {
            self.connected.remove(pos, id);
            let live = match parts.get_mut(id) {
                Some(part) => {
                    part.set_controller(None);
                    part.set_save_delegate(false);
                    part.is_valid()
                }
                None => false,
            };
            if live {
                hooks.on_orphaned(id, self.id);
                orphans.push(id);
            }
        }

        if !orphans.is_empty() {
            tracing::debug!(
                "controller {:?} split: {} parts disconnected from the reference",
                self.id,
                orphans.len()
            );
        }
        orphans
    }

    /// Ask the machine-type validator whether the parts form a whole
    /// machine, and transition accordingly.
    ///
    /// Not whole while assembled breaks the machine (pre/post hooks fire on
    /// every part). Whole while paused restores it (`on_restored`); whole
    /// while disassembled is a fresh assembly.
    pub fn check_if_whole(
        &mut self,
        parts: &mut PartArena,
        validator: &mut dyn WholenessValidator,
        hooks: &mut dyn PartHooks,
    ) {
        let whole = validator.is_machine_whole(self, parts);
        if whole {
            match self.state {
                AssemblyState::Assembled => {}
                AssemblyState::Paused => {
                    tracing::debug!("controller {:?} restored", self.id);
                    self.state.set_assembled();
                    for id in self.member_ids() {
                        hooks.on_restored(id);
                    }
                    self.notify_data_update();
                }
                AssemblyState::Disassembled => {
                    tracing::debug!("controller {:?} assembled", self.id);
                    let members = self.member_ids();
                    for id in &members {
                        hooks.on_pre_assembled(*id);
                    }
                    self.state.set_assembled();
                    for id in &members {
                        hooks.on_post_assembled(*id);
                    }
                    self.notify_data_update();
                }
            }
        } else if self.state.is_assembled() {
            tracing::debug!("controller {:?} broken", self.id);
            let members = self.member_ids();
            for id in &members {
                hooks.on_pre_broken(*id);
            }
            self.state.set_disassembled();
            for id in &members {
                hooks.on_post_broken(*id);
            }
            self.data_listeners.clear();
        }
        self.detached.clear();
    }

    /// Rebuild the cached bounding box if detaches dirtied it; else O(1).
    pub fn recalculate_bounding_box(&mut self) {
        if self.connected.bounds_dirty() {
            self.connected.bounding_box();
        }
    }

    // ── Sync ────────────────────────────────────────────────────────────

    pub fn serialize_state(&self) -> Result<Vec<u8>, SyncError> {
        ControllerSnapshot {
            state: self.state,
            bounds: self.connected.computed_bounds(),
        }
        .encode()
    }

    /// Adopt a remote snapshot wholesale. This is reconstruction of
    /// authoritative state, not a local transition, so it bypasses the
    /// transition discipline.
    pub fn deserialize_state(&mut self, bytes: &[u8]) -> Result<(), SyncError> {
        let snapshot = ControllerSnapshot::decode(bytes)?;
        self.state = snapshot.state;
        self.connected.set_bounds(snapshot.bounds);
        self.notify_data_update();
        Ok(())
    }

    // ── Data listeners ──────────────────────────────────────────────────

    pub fn subscribe(&mut self, listener: Box<dyn DataListener>) {
        self.data_listeners.push(listener);
    }

    pub fn notify_data_update(&mut self) {
        let id = self.id;
        for listener in &mut self.data_listeners {
            listener.on_data_updated(id);
        }
    }

    fn pause(&mut self) {
        tracing::debug!("controller {:?} paused (chunk unload)", self.id);
        self.state.set_paused();
        self.data_listeners.clear();
    }

    fn member_ids(&self) -> Vec<PartId> {
        self.connected.ids().collect()
    }
}
