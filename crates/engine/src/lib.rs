//! Game-agnostic multiblock machine engine.
//!
//! Tracks groups of spatially-adjacent parts (grid cells) that collectively
//! form a logical machine, and manages the controller governing each group
//! as parts are added, removed, merged, or split by world edits. The
//! structure is maintained incrementally -- no full recomputation per
//! change -- and stays correct when chunks holding parts unload.
//!
//! The engine knows nothing about what any machine *does*. Shape validation
//! ([`controller::validate::WholenessValidator`]), game-logic callbacks
//! ([`part::hooks::PartHooks`]), and world storage ([`grid::GridProvider`])
//! are all supplied by the concrete machine layer.

pub mod controller;
pub mod grid;
pub mod part;
pub mod registry;
pub mod world;

pub use controller::{ControllerId, DataListener, MultiblockController};
pub use grid::{BlockPos, BoundingBox, ChunkPos, GridProvider};
pub use part::{Part, PartArena, PartId};
pub use registry::Registry;
pub use world::MultiblockWorld;
