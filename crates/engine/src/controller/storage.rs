use crate::grid::{BlockPos, BoundingBox};
use crate::part::PartId;
use std::collections::HashMap;

/// Position-indexed set of the parts belonging to one controller.
///
/// O(1) add/remove/contains, a 6-neighborhood probe for flood fill, and a
/// cached bounding box. Invariant: the box is the minimal box over every
/// member position, or it is flagged dirty, or the storage is empty and the
/// box is the EMPTY sentinel. Thread-unsafe by design -- all mutation
/// happens on the tick thread.
pub struct PartStorage {
    members: HashMap<BlockPos, PartId>,
    bounds: BoundingBox,
    bounds_dirty: bool,
}

impl PartStorage {
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
            bounds: BoundingBox::EMPTY,
            bounds_dirty: false,
        }
    }

    /// Insert a part, replacing (and returning) any previous occupant of the
    /// same position -- the cell-rebuilt-in-place case. Bounds only grow.
    pub fn add_or_replace(&mut self, pos: BlockPos, id: PartId) -> Option<PartId> {
        let previous = self.members.insert(pos, id);
        if previous.is_none() {
            self.bounds.expand(pos);
        }
        previous.filter(|prev| *prev != id)
    }

    /// Remove by identity: the entry goes away only if `pos` maps to exactly
    /// `id`. No-op (false) if absent. A removal may shrink the box, so the
    /// cache goes dirty.
    pub fn remove(&mut self, pos: BlockPos, id: PartId) -> bool {
        match self.members.get(&pos) {
            Some(current) if *current == id => {
                self.members.remove(&pos);
                if self.members.is_empty() {
                    self.bounds = BoundingBox::EMPTY;
                    self.bounds_dirty = false;
                } else {
                    self.bounds_dirty = true;
                }
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.members.contains_key(&pos)
    }

    pub fn get(&self, pos: BlockPos) -> Option<PartId> {
        self.members.get(&pos).copied()
    }

    /// Reverse lookup by handle. Linear -- only for fallback paths where the
    /// part's arena entry is already gone.
    pub fn position_of(&self, id: PartId) -> Option<BlockPos> {
        self.members
            .iter()
            .find(|(_, member)| **member == id)
            .map(|(pos, _)| *pos)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = BlockPos> + '_ {
        self.members.keys().copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = PartId> + '_ {
        self.members.values().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockPos, PartId)> + '_ {
        self.members.iter().map(|(pos, id)| (*pos, *id))
    }

    /// The smallest member position -- the rank tie-breaker for merges.
    pub fn min_position(&self) -> Option<BlockPos> {
        self.members.keys().min().copied()
    }

    /// Members at the six unit offsets around `pos`. Clears `out` first.
    /// Absence of a neighbor means "not connected here", not an error.
    pub fn neighbors(&self, pos: BlockPos, out: &mut Vec<PartId>) {
        out.clear();
        for neighbor in pos.neighbors() {
            if let Some(id) = self.members.get(&neighbor) {
                out.push(*id);
            }
        }
    }

    /// The cached box: O(1) when clean, full recompute when dirty.
    pub fn bounding_box(&mut self) -> BoundingBox {
        if self.bounds_dirty {
            self.bounds = BoundingBox::from_positions(self.positions());
            self.bounds_dirty = false;
        }
        self.bounds
    }

    /// Like `bounding_box` but without updating the cache.
    pub fn computed_bounds(&self) -> BoundingBox {
        if self.bounds_dirty {
            BoundingBox::from_positions(self.positions())
        } else {
            self.bounds
        }
    }

    pub fn bounds_dirty(&self) -> bool {
        self.bounds_dirty
    }

    pub(crate) fn set_bounds(&mut self, bounds: BoundingBox) {
        self.bounds = bounds;
        self.bounds_dirty = false;
    }

    pub(crate) fn reset_bounds(&mut self) {
        self.bounds = BoundingBox::EMPTY;
        self.bounds_dirty = false;
    }

    /// Merge `other`'s members into self, reusing the larger of the two
    /// containers (the smaller set folds into the bigger one).
    pub(crate) fn absorb(&mut self, other: &mut PartStorage) {
        if other.members.len() > self.members.len() {
            std::mem::swap(&mut self.members, &mut other.members);
            std::mem::swap(&mut self.bounds, &mut other.bounds);
            std::mem::swap(&mut self.bounds_dirty, &mut other.bounds_dirty);
        }
        for (pos, id) in other.members.drain() {
            self.members.insert(pos, id);
            self.bounds.expand(pos);
        }
        other.reset_bounds();
    }
}

impl Default for PartStorage {
    fn default() -> Self {
        Self::new()
    }
}
