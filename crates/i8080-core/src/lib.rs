//! Instruction-level Intel 8080 CPU core.
//!
//! [`Cpu`] owns its register file, control state and a [`Bus`]. The bundled
//! [`MemoryBus`] maps a program region at address 0 followed by a working
//! region; everything above faults. Each [`Cpu::execute_one`] call runs one
//! instruction, accepts one interrupt or idles one halted cycle, and is
//! precise: a faulting step changes nothing.

/// Memory bus contract, region map and the two-region bus.
pub mod memory;
pub use memory::{
    read_u16_le, write_u16_le, Bus, BusConfig, MemoryBus, MemoryMap, MemoryRegion,
    RegionDescriptor, ADDRESS_SPACE_BYTES, DEFAULT_PROGRAM_REGION_BYTES,
    DEFAULT_WORKING_REGION_BYTES,
};

/// Public host-facing API contract and integration types.
pub mod api;
pub use api::{
    CoreConfig, CoreSnapshot, CoreState, NullPorts, NullTrace, PortIo, RunBoundary, RunOutcome,
    SnapshotVersion, StepOutcome, TraceEvent, TraceSink,
};

/// Register file, flags and run state.
pub mod state;
pub use state::{
    Condition, FlagSet, Operand, Register, RegisterFile, RegisterPair, RunState, StackPair,
    FLAGS_ACTIVE_MASK, FLAGS_RESET, FLAG_AC, FLAG_CY, FLAG_FIXED_ONE, FLAG_P, FLAG_S, FLAG_Z,
};

/// Total opcode table.
pub mod encoding;
pub use encoding::{
    descriptor, AluOp, OpcodeDescriptor, Operation, RotateOp, OPCODE_TABLE, UNDOCUMENTED_OPCODES,
};

/// Instruction fetch and decode.
pub mod decoder;
pub use decoder::{DecodedInstruction, Decoder, Immediate};

/// Intel-syntax disassembler.
pub mod disasm;
pub use disasm::{disassemble_one, disassemble_range, DisassemblyRow};

/// Bus and step fault taxonomy.
pub mod fault;
pub use fault::{AccessKind, BusFault, MemoryMapError, StepFault, StepPhase};

/// Per-opcode cycle costs.
pub mod timing;
pub use timing::{
    cycle_cost, CONDITIONAL_TAKEN_EXTRA_CYCLES, CYCLE_COST_TABLE, HALT_IDLE_CYCLES,
    INTERRUPT_ACK_CYCLES,
};

/// Instruction execution pipeline.
pub mod execute;
pub use execute::{commit_execution, execute_instruction, step_one, ExecuteState};

/// The processor bound to its bus.
pub mod cpu;
pub use cpu::Cpu;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use serde_json as _;
