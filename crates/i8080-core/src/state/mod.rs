//! Processor-visible state primitives.

/// Register file, flag bits and operand selectors.
pub mod registers;
/// Execution state machine.
pub mod run_state;

pub use registers::{
    Condition, FlagSet, Operand, Register, RegisterFile, RegisterPair, StackPair, FLAGS_ACTIVE_MASK,
    FLAGS_RESET, FLAG_AC, FLAG_CY, FLAG_FIXED_ONE, FLAG_P, FLAG_S, FLAG_Z,
};
pub use run_state::RunState;
