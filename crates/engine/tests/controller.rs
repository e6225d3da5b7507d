//! Controller-level tests driven against raw arenas: attach/detach,
//! reference election, bounding boxes, merging, assembly transitions, and
//! snapshot sync. World-level orchestration lives in `lifecycle.rs`.

use std::cell::RefCell;
use std::rc::Rc;

use multiblock_engine::controller::validate::WholenessValidator;
use multiblock_engine::controller::{ControllerId, DataListener, MultiblockController};
use multiblock_engine::grid::{BlockPos, BoundingBox, GridProvider};
use multiblock_engine::part::hooks::{NoHooks, PartHooks};
use multiblock_engine::part::{Part, PartArena, PartId};
use multiblock_engine::registry::Registry;
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct AlwaysLoaded;

impl GridProvider for AlwaysLoaded {
    fn is_part_invalid_or_unloaded(&self, _pos: BlockPos) -> bool {
        false
    }
}

/// A validator with a fixed verdict.
struct FixedValidator {
    whole: bool,
    last_error: Option<(BlockPos, String)>,
}

impl FixedValidator {
    fn new(whole: bool) -> Self {
        Self {
            whole,
            last_error: None,
        }
    }
}

impl WholenessValidator for FixedValidator {
    fn is_machine_whole(&mut self, controller: &MultiblockController, _parts: &PartArena) -> bool {
        if !self.whole {
            if let Some(pos) = controller.parts().min_position() {
                self.set_last_error(pos, "machine is not whole".to_string());
            }
        }
        self.whole
    }

    fn set_last_error(&mut self, pos: BlockPos, message: String) {
        self.last_error = Some((pos, message));
    }
}

/// Records hook invocations in order.
#[derive(Default)]
struct RecordingHooks {
    events: Vec<&'static str>,
}

impl PartHooks for RecordingHooks {
    fn on_attached(&mut self, _part: PartId, _controller: ControllerId) {
        self.events.push("attached");
    }
    fn on_detached(&mut self, _part: PartId, _controller: ControllerId) {
        self.events.push("detached");
    }
    fn on_orphaned(&mut self, _part: PartId, _controller: ControllerId) {
        self.events.push("orphaned");
    }
    fn on_assimilated(&mut self, _part: PartId, _controller: ControllerId) {
        self.events.push("assimilated");
    }
    fn on_pre_assembled(&mut self, _part: PartId) {
        self.events.push("pre_assembled");
    }
    fn on_post_assembled(&mut self, _part: PartId) {
        self.events.push("post_assembled");
    }
    fn on_restored(&mut self, _part: PartId) {
        self.events.push("restored");
    }
    fn on_pre_broken(&mut self, _part: PartId) {
        self.events.push("pre_broken");
    }
    fn on_post_broken(&mut self, _part: PartId) {
        self.events.push("post_broken");
    }
}

/// Raw arenas plus a registry -- the pieces a `MultiblockWorld` would own.
struct Harness {
    controllers: SlotMap<ControllerId, MultiblockController>,
    parts: PartArena,
    registry: Registry,
}

impl Harness {
    fn new() -> Self {
        Self {
            controllers: SlotMap::with_key(),
            parts: PartArena::with_key(),
            registry: Registry::new(),
        }
    }

    fn new_controller(&mut self) -> ControllerId {
        self.controllers.insert_with_key(MultiblockController::new)
    }

    fn new_part(&mut self, x: i64, y: i64, z: i64) -> PartId {
        self.parts.insert(Part::new(BlockPos::new(x, y, z)))
    }

    fn attach(&mut self, controller: ControllerId, part: PartId) {
        self.controllers[controller].attach_part(part, &mut self.parts, &self.registry, &mut NoHooks);
    }

    fn detach(&mut self, controller: ControllerId, part: PartId, unload: bool) {
        self.controllers[controller].detach_part(
            part,
            unload,
            &mut self.parts,
            &self.registry,
            &mut NoHooks,
        );
    }

    fn delegate_count(&self) -> usize {
        self.parts.values().filter(|p| p.is_save_delegate()).count()
    }
}

// ---------------------------------------------------------------------------
// Reference election
// ---------------------------------------------------------------------------

#[test]
fn reference_is_smallest_position_in_any_attach_order() {
    let orders: [[usize; 5]; 4] = [
        [0, 1, 2, 3, 4],
        [4, 3, 2, 1, 0],
        [2, 0, 4, 1, 3],
        [1, 4, 0, 3, 2],
    ];

    for order in orders {
        let mut h = Harness::new();
        let c = h.new_controller();
        let parts: Vec<PartId> = (0..5).map(|x| h.new_part(x, 0, 0)).collect();
        for i in order {
            h.attach(c, parts[i]);
        }

        let reference = h.controllers[c].reference_part().expect("reference elected");
        assert_eq!(h.parts[reference].position(), BlockPos::new(0, 0, 0));
        assert_eq!(h.delegate_count(), 1);
        assert!(h.parts[reference].is_save_delegate());
    }
}

#[test]
fn line_attach_scenario() {
    // 5 parts in a line attached in scrambled order: reference is (0,0,0)
    // and the box spans the line exactly.
    let mut h = Harness::new();
    let c = h.new_controller();
    let parts: Vec<PartId> = (0..5).map(|x| h.new_part(x, 0, 0)).collect();
    for i in [3, 0, 4, 2, 1] {
        h.attach(c, parts[i]);
    }

    assert_eq!(h.controllers[c].part_count(), 5);
    assert_eq!(
        h.controllers[c].reference_position(&h.parts),
        Some(BlockPos::new(0, 0, 0))
    );
    let bounds = h.controllers[c].bounding_box();
    assert_eq!(bounds.min, BlockPos::new(0, 0, 0));
    assert_eq!(bounds.max, BlockPos::new(4, 0, 0));
}

#[test]
fn demoted_reference_loses_delegate_flag() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let high = h.new_part(9, 9, 9);
    let low = h.new_part(1, 1, 1);

    h.attach(c, high);
    assert!(h.parts[high].is_save_delegate());

    h.attach(c, low);
    assert!(!h.parts[high].is_save_delegate());
    assert!(h.parts[low].is_save_delegate());
    assert_eq!(h.delegate_count(), 1);
}

// ---------------------------------------------------------------------------
// Bounding boxes
// ---------------------------------------------------------------------------

#[test]
fn bounding_box_minimal_after_detach() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let parts: Vec<PartId> = (0..4).map(|x| h.new_part(x, 0, 0)).collect();
    for &p in &parts {
        h.attach(c, p);
    }

    // Removing the far end must shrink the box once recalculated.
    h.detach(c, parts[3], false);
    h.controllers[c].recalculate_bounding_box();

    let bounds = h.controllers[c].bounding_box();
    assert_eq!(bounds.min, BlockPos::new(0, 0, 0));
    assert_eq!(bounds.max, BlockPos::new(2, 0, 0));
    for x in 0..3 {
        assert!(bounds.contains(BlockPos::new(x, 0, 0)));
    }
}

#[test]
fn empty_controller_has_empty_sentinel_box() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let p = h.new_part(7, 7, 7);
    h.attach(c, p);
    h.detach(c, p, false);

    assert!(h.controllers[c].bounding_box().is_empty());
    assert_eq!(h.controllers[c].bounding_box(), BoundingBox::EMPTY);
}

// ---------------------------------------------------------------------------
// Detach bookkeeping
// ---------------------------------------------------------------------------

#[test]
fn detach_to_empty_marks_dead() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let p = h.new_part(0, 0, 0);
    h.attach(c, p);
    h.detach(c, p, false);

    assert!(h.controllers[c].is_empty());
    assert!(h.registry.is_dead(c));
}

#[test]
fn detaching_reference_invalidates_tracker() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let a = h.new_part(0, 0, 0);
    let b = h.new_part(1, 0, 0);
    h.attach(c, a);
    h.attach(c, b);

    h.detach(c, a, false);
    assert_eq!(h.controllers[c].reference_part(), None);

    // Lazy re-election happens on the next sweep.
    let orphans = h.controllers[c].check_for_disconnections(
        &mut h.parts,
        &h.registry,
        &mut NoHooks,
    );
    assert!(orphans.is_empty());
    assert_eq!(
        h.controllers[c].reference_position(&h.parts),
        Some(BlockPos::new(1, 0, 0))
    );
    assert_eq!(h.delegate_count(), 1);
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

#[test]
fn assimilate_merges_two_singletons() {
    // (5,5,5) consumes (5,5,6); the survivor has 2 parts and reference
    // (5,5,5).
    let mut h = Harness::new();
    let c1 = h.new_controller();
    let c2 = h.new_controller();
    let p1 = h.new_part(5, 5, 5);
    let p2 = h.new_part(5, 5, 6);
    h.attach(c1, p1);
    h.attach(c2, p2);

    let mut hooks = RecordingHooks::default();
    let [winner, loser] = h.controllers.get_disjoint_mut([c1, c2]).unwrap();
    assert!(winner.should_consume(loser, &mut h.parts, &AlwaysLoaded));
    winner.assimilate(loser, &mut h.parts, &h.registry, &mut hooks);

    assert_eq!(h.controllers[c1].part_count(), 2);
    assert_eq!(
        h.controllers[c1].reference_position(&h.parts),
        Some(BlockPos::new(5, 5, 5))
    );
    assert!(h.controllers[c2].is_empty());
    assert!(h.registry.is_dead(c2));
    assert_eq!(h.parts[p2].controller(), Some(c1));
    assert_eq!(hooks.events, vec!["assimilated"]);
    assert_eq!(h.delegate_count(), 1);
}

#[test]
fn more_parts_outranks_smaller_reference() {
    let mut h = Harness::new();
    let big = h.new_controller();
    let small = h.new_controller();
    // `small` has the smaller reference but fewer parts.
    let s = h.new_part(0, 0, 0);
    h.attach(small, s);
    for x in 10..12 {
        let p = h.new_part(x, 0, 0);
        h.attach(big, p);
    }

    let [b, s] = h.controllers.get_disjoint_mut([big, small]).unwrap();
    assert!(b.should_consume(s, &mut h.parts, &AlwaysLoaded));
    assert!(!s.should_consume(b, &mut h.parts, &AlwaysLoaded));
}

#[test]
#[should_panic(expected = "assimilation rank inverted")]
fn assimilate_in_wrong_direction_panics() {
    let mut h = Harness::new();
    let c1 = h.new_controller();
    let c2 = h.new_controller();
    let p1 = h.new_part(5, 5, 5);
    let p2 = h.new_part(5, 5, 6);
    h.attach(c1, p1);
    h.attach(c2, p2);

    // (5,5,6) is outranked by (5,5,5); consuming upward must be rejected.
    let [loser, winner] = h.controllers.get_disjoint_mut([c2, c1]).unwrap();
    loser.assimilate(winner, &mut h.parts, &h.registry, &mut NoHooks);
}

// ---------------------------------------------------------------------------
// Assembly transitions and hooks
// ---------------------------------------------------------------------------

#[test]
fn assemble_then_break_fires_hooks_in_order() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let p = h.new_part(0, 0, 0);
    h.attach(c, p);

    let mut hooks = RecordingHooks::default();
    let mut validator = FixedValidator::new(true);
    h.controllers[c].check_if_whole(&mut h.parts, &mut validator, &mut hooks);
    assert!(h.controllers[c].state().is_assembled());
    assert_eq!(hooks.events, vec!["pre_assembled", "post_assembled"]);

    let mut validator = FixedValidator::new(false);
    h.controllers[c].check_if_whole(&mut h.parts, &mut validator, &mut hooks);
    assert!(h.controllers[c].state().is_disassembled());
    assert_eq!(
        hooks.events,
        vec!["pre_assembled", "post_assembled", "pre_broken", "post_broken"]
    );
    assert!(validator.last_error.is_some());
}

#[test]
fn chunk_unload_pauses_then_restore() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let a = h.new_part(0, 0, 0);
    let b = h.new_part(1, 0, 0);
    h.attach(c, a);
    h.attach(c, b);

    let mut hooks = RecordingHooks::default();
    let mut validator = FixedValidator::new(true);
    h.controllers[c].check_if_whole(&mut h.parts, &mut validator, &mut hooks);
    assert!(h.controllers[c].state().is_assembled());

    // Chunk unload: pause, never break.
    hooks.events.clear();
    h.controllers[c].detach_part(b, true, &mut h.parts, &h.registry, &mut hooks);
    assert!(h.controllers[c].state().is_paused());
    assert_eq!(hooks.events, vec!["detached"]);

    // Whole again: a restore, not a fresh assembly.
    hooks.events.clear();
    h.controllers[c].check_if_whole(&mut h.parts, &mut validator, &mut hooks);
    assert!(h.controllers[c].state().is_assembled());
    assert_eq!(hooks.events, vec!["restored"]);
}

#[test]
fn deliberate_detach_does_not_pause() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let a = h.new_part(0, 0, 0);
    let b = h.new_part(1, 0, 0);
    h.attach(c, a);
    h.attach(c, b);

    let mut validator = FixedValidator::new(true);
    h.controllers[c].check_if_whole(&mut h.parts, &mut validator, &mut NoHooks);
    assert!(h.controllers[c].state().is_assembled());

    h.detach(c, b, false);
    // Still assembled until the wholeness check runs and decides.
    assert!(h.controllers[c].state().is_assembled());
}

// ---------------------------------------------------------------------------
// Snapshot sync
// ---------------------------------------------------------------------------

#[test]
fn snapshot_roundtrip() {
    let mut h = Harness::new();
    let c1 = h.new_controller();
    for x in 0..3 {
        let p = h.new_part(x, 0, 0);
        h.attach(c1, p);
    }
    let mut validator = FixedValidator::new(true);
    h.controllers[c1].check_if_whole(&mut h.parts, &mut validator, &mut NoHooks);

    let blob = h.controllers[c1].serialize_state().unwrap();

    let c2 = h.new_controller();
    h.controllers[c2].deserialize_state(&blob).unwrap();
    assert!(h.controllers[c2].state().is_assembled());
    assert_eq!(
        h.controllers[c2].bounding_box(),
        h.controllers[c1].bounding_box()
    );
}

#[test]
fn corrupt_snapshot_is_an_error() {
    let mut h = Harness::new();
    let c = h.new_controller();
    assert!(h.controllers[c].deserialize_state(b"not json").is_err());
}

#[test]
fn pending_snapshot_merges_on_attach() {
    let mut h = Harness::new();
    let source = h.new_controller();
    let sp = h.new_part(0, 0, 0);
    h.attach(source, sp);
    let mut validator = FixedValidator::new(true);
    h.controllers[source].check_if_whole(&mut h.parts, &mut validator, &mut NoHooks);
    let blob = h.controllers[source].serialize_state().unwrap();

    // A freshly loaded part carries the saved blob into its controller.
    let target = h.new_controller();
    let tp = h.new_part(9, 0, 0);
    h.parts[tp].set_pending_snapshot(blob);
    h.attach(target, tp);

    assert!(h.controllers[target].state().is_assembled());
    assert!(!h.parts[tp].has_pending_snapshot());
}

#[test]
fn undecodable_pending_snapshot_is_dropped() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let p = h.new_part(0, 0, 0);
    h.parts[p].set_pending_snapshot(b"garbage".to_vec());
    h.attach(c, p);

    // The attach survives; the blob is gone; state is untouched.
    assert_eq!(h.controllers[c].part_count(), 1);
    assert!(!h.parts[p].has_pending_snapshot());
    assert!(h.controllers[c].state().is_disassembled());
}

// ---------------------------------------------------------------------------
// Data listeners
// ---------------------------------------------------------------------------

struct CountingListener(Rc<RefCell<usize>>);

impl DataListener for CountingListener {
    fn on_data_updated(&mut self, _controller: ControllerId) {
        *self.0.borrow_mut() += 1;
    }
}

#[test]
fn data_listeners_drain_at_break() {
    let mut h = Harness::new();
    let c = h.new_controller();
    let p = h.new_part(0, 0, 0);
    h.attach(c, p);

    let mut validator = FixedValidator::new(true);
    h.controllers[c].check_if_whole(&mut h.parts, &mut validator, &mut NoHooks);

    let count = Rc::new(RefCell::new(0usize));
    h.controllers[c].subscribe(Box::new(CountingListener(Rc::clone(&count))));
    h.controllers[c].notify_data_update();
    assert_eq!(*count.borrow(), 1);

    // Breaking the machine drops the subscription.
    let mut validator = FixedValidator::new(false);
    h.controllers[c].check_if_whole(&mut h.parts, &mut validator, &mut NoHooks);
    h.controllers[c].notify_data_update();
    assert_eq!(*count.borrow(), 1);
}
