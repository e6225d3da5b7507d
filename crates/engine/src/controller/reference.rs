use crate::grid::BlockPos;
use crate::part::{PartArena, PartId};

/// Deterministic leader election over a controller's parts.
///
/// Tracks the member with the lexicographically smallest position as the
/// reference (save delegate). Comparison, not insertion order, decides the
/// winner, so any visiting order over the same part set converges to the
/// same reference -- independent peers agree without coordination.
#[derive(Debug, Default)]
pub struct ReferencePartTracker {
    current: Option<PartId>,
}

impl ReferencePartTracker {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn get(&self) -> Option<PartId> {
        self.current
    }

    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn position(&self, parts: &PartArena) -> Option<BlockPos> {
        self.current
            .and_then(|id| parts.get(id))
            .map(|part| part.position())
    }

    /// Clear the tracked reference without touching save-delegate flags.
    /// Used when the caller will immediately re-accept a fresh part set.
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    /// Offer a candidate for leadership.
    ///
    /// Adopts it if nothing is tracked; replaces (demoting the old leader)
    /// if the candidate's position is smaller; otherwise clears the
    /// candidate's delegate flag and leaves the tracker unchanged. Invalid
    /// or destroyed candidates are ignored.
    pub fn accept(&mut self, candidate: PartId, parts: &mut PartArena) {
        let Some(part) = parts.get(candidate) else {
            return;
        };
        if !part.is_valid() {
            return;
        }
        let candidate_pos = part.position();

        let Some(current) = self.current else {
            parts[candidate].set_save_delegate(true);
            self.current = Some(candidate);
            return;
        };
        if current == candidate {
            return;
        }

        let current_pos = parts
            .get(current)
            .filter(|part| part.is_valid())
            .map(|part| part.position());
        match current_pos {
            Some(pos) if candidate_pos >= pos => {
                parts[candidate].set_save_delegate(false);
            }
            _ => {
                // Candidate wins, or the tracked leader went stale.
                if let Some(old) = parts.get_mut(current) {
                    old.set_save_delegate(false);
                }
                parts[candidate].set_save_delegate(true);
                self.current = Some(candidate);
            }
        }
    }

    /// Bulk re-election: invalidate, then fold `accept` over every id.
    pub fn accept_all(&mut self, ids: impl IntoIterator<Item = PartId>, parts: &mut PartArena) {
        self.invalidate();
        for id in ids {
            self.accept(id, parts);
        }
    }
}
