//! Grid-side geometry and the boundary to the external world storage.
//!
//! The engine never reads grid contents itself. The single question it asks
//! the world is whether a position still has a live, loaded cell behind it,
//! used to prune stale bookkeeping during audits.

pub mod bounds;
pub mod position;

pub use bounds::BoundingBox;
pub use position::{BlockPos, ChunkPos};

/// The world-storage side of the boundary (chunk loading, persistence).
pub trait GridProvider {
    /// True if no live cell backs `pos`: the cell was destroyed, or its
    /// chunk is not currently loaded.
    fn is_part_invalid_or_unloaded(&self, pos: BlockPos) -> bool;
}
