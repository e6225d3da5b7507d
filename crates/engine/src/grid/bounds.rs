use super::position::BlockPos;
use serde::{Deserialize, Serialize};

/// Inclusive axis-aligned bounding box over part positions.
///
/// `EMPTY` is the explicit zero-member sentinel: min above max on every
/// axis, so the first `expand` snaps both corners to the real position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl BoundingBox {
    pub const EMPTY: BoundingBox = BoundingBox {
        min: BlockPos::new(i64::MAX, i64::MAX, i64::MAX),
        max: BlockPos::new(i64::MIN, i64::MIN, i64::MIN),
    };

    pub const fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Grow the box to include `pos`.
    pub fn expand(&mut self, pos: BlockPos) {
        self.min.x = self.min.x.min(pos.x);
        self.min.y = self.min.y.min(pos.y);
        self.min.z = self.min.z.min(pos.z);
        self.max.x = self.max.x.max(pos.x);
        self.max.y = self.max.y.max(pos.y);
        self.max.z = self.max.z.max(pos.z);
    }

    pub const fn contains(&self, pos: BlockPos) -> bool {
        self.min.x <= pos.x
            && pos.x <= self.max.x
            && self.min.y <= pos.y
            && pos.y <= self.max.y
            && self.min.z <= pos.z
            && pos.z <= self.max.z
    }

    /// The minimal box containing every position in `iter` (EMPTY for none).
    pub fn from_positions(iter: impl IntoIterator<Item = BlockPos>) -> Self {
        let mut bounds = Self::EMPTY;
        for pos in iter {
            bounds.expand(pos);
        }
        bounds
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}
