//! Public host-facing API contracts for embedding the processor core.

use crate::state::{RegisterFile, RunState};
use crate::{BusConfig, BusFault};

/// Top-level configuration for a core instance and its bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Memory bus layout and write policy.
    pub bus: BusConfig,
    /// When set, `EI` takes effect only after the following instruction retires.
    pub delayed_interrupt_enable: bool,
}

/// Complete processor-visible state apart from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreState {
    /// Register file including `PC`, `SP` and flags.
    pub regs: RegisterFile,
    /// Running or halted.
    pub run_state: RunState,
    /// Interrupt-enable flip-flop.
    pub interrupts_enabled: bool,
    /// Latched interrupt request and its vector address.
    pub pending_interrupt: Option<u16>,
    /// `EI` executed; interrupts become enabled once the next instruction retires.
    pub enable_interrupts_after_next: bool,
    /// Cycles consumed since power-on or reset.
    pub cycles: u64,
}

impl CoreState {
    /// Applies power-on semantics: registers zeroed, `PC = 0`, interrupts
    /// disabled and nothing pending, not halted, cycle counter cleared.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns `true` when a pending interrupt would be accepted at the next step.
    #[must_use]
    pub const fn interrupt_serviceable(&self) -> bool {
        self.interrupts_enabled && self.pending_interrupt.is_some()
    }
}

/// Port I/O hook invoked by `IN` and `OUT`.
pub trait PortIo {
    /// Reads a byte from `port`.
    fn port_in(&mut self, port: u8) -> u8;

    /// Writes `value` to `port`.
    fn port_out(&mut self, port: u8, value: u8);
}

/// Ports that read as zero and discard writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullPorts;

impl PortIo for NullPorts {
    fn port_in(&mut self, _port: u8) -> u8 {
        0
    }

    fn port_out(&mut self, _port: u8, _value: u8) {}
}

impl PortIo for () {
    fn port_in(&mut self, _port: u8) -> u8 {
        0
    }

    fn port_out(&mut self, _port: u8, _value: u8) {}
}

/// Result of one successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepOutcome {
    /// An instruction retired.
    Retired {
        /// Opcode byte of the retired instruction.
        opcode: u8,
        /// Cycles consumed, including the taken-branch surcharge.
        cycles: u8,
    },
    /// The core is halted and idled for one step.
    Halted {
        /// Idle cycles consumed.
        cycles: u8,
    },
    /// A pending interrupt was accepted.
    InterruptAccepted {
        /// Address control was transferred to.
        vector: u16,
        /// Acknowledge cycles consumed.
        cycles: u8,
    },
}

impl StepOutcome {
    /// Cycles consumed by the step.
    #[must_use]
    pub const fn cycles(self) -> u8 {
        match self {
            Self::Retired { cycles, .. }
            | Self::Halted { cycles }
            | Self::InterruptAccepted { cycles, .. } => cycles,
        }
    }
}

/// Stop condition for [`Cpu::run`](crate::Cpu::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunBoundary {
    /// Stop once a step leaves the core halted with nothing serviceable pending.
    Halted,
    /// Stop once `PC` equals the address after a step.
    ProgramCounter(u16),
    /// Stop once at least this many cycles have elapsed during the run.
    Cycles(u64),
}

/// Aggregated outcome from running steps until a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Steps taken during this run.
    pub steps: u64,
    /// Cycles consumed during this run.
    pub cycles: u64,
    /// Outcome of the last step.
    pub final_step: StepOutcome,
}

/// Stable snapshot wire-version identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u16)]
pub enum SnapshotVersion {
    /// Initial schema revision.
    V1 = 1,
}

impl SnapshotVersion {
    /// Converts a wire value to a known snapshot version.
    #[must_use]
    pub const fn from_u16(version: u16) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            _ => None,
        }
    }
}

/// Versioned copy of the core state for save/restore and replay fixtures.
///
/// Memory is owned by the bus and is not part of the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreSnapshot {
    /// Snapshot schema version.
    pub version: SnapshotVersion,
    /// Core state at capture time.
    pub state: CoreState,
}

/// Trace events, emitted in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceEvent {
    /// An instruction was fetched and is about to execute.
    InstructionStart {
        /// Address of the opcode.
        pc: u16,
        /// Opcode byte.
        opcode: u8,
    },
    /// The instruction at `pc` retired.
    InstructionRetired {
        /// Address of the opcode.
        pc: u16,
        /// Cycles consumed.
        cycles: u8,
    },
    /// A memory byte was written.
    MemoryWrite {
        /// Target address.
        addr: u16,
        /// Byte written.
        value: u8,
    },
    /// `OUT` wrote to a port.
    PortWrite {
        /// Port number.
        port: u8,
        /// Byte written.
        value: u8,
    },
    /// An interrupt was accepted.
    InterruptAccepted {
        /// Vector address.
        vector: u16,
        /// `PC` pushed as the return address.
        return_pc: u16,
    },
    /// A step faulted and was discarded.
    Fault {
        /// `PC` at the start of the step.
        pc: u16,
        /// Underlying bus fault.
        fault: BusFault,
    },
}

/// Receiver for trace events. Sinks never influence execution.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: TraceEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NullTrace;

impl TraceSink for NullTrace {
    fn on_event(&mut self, _event: TraceEvent) {}
}

impl TraceSink for Vec<TraceEvent> {
    fn on_event(&mut self, event: TraceEvent) {
        self.push(event);
    }
}
