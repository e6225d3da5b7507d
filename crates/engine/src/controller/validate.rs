use super::MultiblockController;
use crate::grid::BlockPos;
use crate::part::PartArena;

/// Machine-shape predicate, supplied per machine type.
///
/// The engine owns the seam; the game supplies the rule. Validation
/// failures are reported through the error sink and drive a disassemble
/// transition -- they never abort an operation.
pub trait WholenessValidator {
    /// Decide whether the controller's parts form a legally shaped machine.
    ///
    /// Implementations report the reason for a rejection via
    /// `set_last_error` on themselves before returning false.
    fn is_machine_whole(&mut self, controller: &MultiblockController, parts: &PartArena) -> bool;

    /// Record why validation failed, anchored at the offending position.
    fn set_last_error(&mut self, pos: BlockPos, message: String);
}
