use super::PartId;
use crate::controller::ControllerId;

/// Game-logic callbacks fired by controllers at part-lifecycle points.
///
/// Implementations belong to the concrete machine type; every method
/// defaults to a no-op so machines override only what they need.
///
/// Assembly hooks fire for every connected part, pre hooks before the state
/// flips and post hooks after. `on_restored` replaces the assembled pair
/// when a paused machine comes back from a chunk reload.
pub trait PartHooks {
    fn on_attached(&mut self, _part: PartId, _controller: ControllerId) {}
    fn on_detached(&mut self, _part: PartId, _controller: ControllerId) {}

    /// The part was found disconnected from the reference during a sweep
    /// and removed; the caller will re-home it.
    fn on_orphaned(&mut self, _part: PartId, _controller: ControllerId) {}

    /// The part migrated into `_controller` during a merge.
    fn on_assimilated(&mut self, _part: PartId, _controller: ControllerId) {}

    fn on_pre_assembled(&mut self, _part: PartId) {}
    fn on_post_assembled(&mut self, _part: PartId) {}
    fn on_restored(&mut self, _part: PartId) {}
    fn on_pre_broken(&mut self, _part: PartId) {}
    fn on_post_broken(&mut self, _part: PartId) {}
}

/// Hook sink that ignores every callback.
pub struct NoHooks;

impl PartHooks for NoHooks {}
