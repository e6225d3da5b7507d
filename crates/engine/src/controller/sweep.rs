//! Flood-fill connectivity sweep over a controller's part storage.
//!
//! Provides both a sequential traversal and a parallel one (used for large
//! machines). Both produce the identical reachable set; only wall-clock
//! cost differs.

use super::storage::PartStorage;
use crate::grid::BlockPos;
use dashmap::DashSet;
use rayon::prelude::*;
use std::collections::HashSet;

/// Part count at or above which the sweep fans out across worker threads.
/// A 32x32x64 machine is where sequential traversal starts to dominate the
/// tick.
pub const PARALLEL_SWEEP_THRESHOLD: usize = 32 * 32 * 64;

/// Positions reachable from `start` through 6-connected membership.
///
/// Picks the traversal strategy by storage size.
pub fn connected_set(storage: &PartStorage, start: BlockPos) -> HashSet<BlockPos> {
    if storage.len() >= PARALLEL_SWEEP_THRESHOLD {
        sweep_parallel(storage, start)
    } else {
        sweep_sequential(storage, start)
    }
}

/// Single-threaded traversal. Terminates: every position is visited at most
/// once, bounded by member count.
pub fn sweep_sequential(storage: &PartStorage, start: BlockPos) -> HashSet<BlockPos> {
    let mut visited = HashSet::with_capacity(storage.len());
    if !storage.contains(start) {
        return visited;
    }
    visited.insert(start);

    let mut stack = vec![start];
    while let Some(pos) = stack.pop() {
        for neighbor in pos.neighbors() {
            if storage.contains(neighbor) && visited.insert(neighbor) {
                stack.push(neighbor);
            }
        }
    }
    visited
}

/// Parallel traversal: each present neighbor of `start` becomes an
/// independent frontier. `DashSet::insert` returning false is the
/// idempotent "already claimed" mark, so frontiers meeting in the middle
/// never revisit a position, and the final set matches the sequential one.
pub fn sweep_parallel(storage: &PartStorage, start: BlockPos) -> HashSet<BlockPos> {
    if !storage.contains(start) {
        return HashSet::new();
    }
    let visited: DashSet<BlockPos> = DashSet::with_capacity(storage.len());
    visited.insert(start);

    let seeds: Vec<BlockPos> = start
        .neighbors()
        .into_iter()
        .filter(|pos| storage.contains(*pos))
        .collect();

    seeds.into_par_iter().for_each(|seed| {
        if !visited.insert(seed) {
            return;
        }
        let mut stack = vec![seed];
        while let Some(pos) = stack.pop() {
            for neighbor in pos.neighbors() {
                if storage.contains(neighbor) && visited.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }
    });

    visited.into_iter().collect()
}
