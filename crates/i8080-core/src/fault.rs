use thiserror::Error;

/// Kind of bus access that produced a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AccessKind {
    /// Byte read.
    Read,
    /// Byte write.
    Write,
}

/// Stable fault taxonomy for memory-bus accesses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BusFault {
    /// Address lies outside both the program and the working region.
    #[error("{kind:?} access to unmapped address {addr:#06x}")]
    OutOfRangeAccess {
        /// Faulting address.
        addr: u16,
        /// Whether the access was a read or a write.
        kind: AccessKind,
    },
    /// Write into the program region while write-enable is off.
    #[error("write to read-only program region at {addr:#06x}")]
    WriteToReadOnlyRegion {
        /// Faulting address.
        addr: u16,
    },
}

impl BusFault {
    /// Stable numeric code for this fault kind.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::OutOfRangeAccess { .. } => 0x01,
            Self::WriteToReadOnlyRegion { .. } => 0x02,
        }
    }

    /// Address the faulting access targeted.
    #[must_use]
    pub const fn addr(self) -> u16 {
        match self {
            Self::OutOfRangeAccess { addr, .. } | Self::WriteToReadOnlyRegion { addr } => addr,
        }
    }

    /// Access direction that faulted.
    #[must_use]
    pub const fn access_kind(self) -> AccessKind {
        match self {
            Self::OutOfRangeAccess { kind, .. } => kind,
            Self::WriteToReadOnlyRegion { .. } => AccessKind::Write,
        }
    }
}

/// Pipeline stage of a step during which a bus fault was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum StepPhase {
    /// Opcode or operand-byte fetch.
    Fetch,
    /// Memory access performed by the instruction itself.
    Execute,
    /// Return-address push while accepting an interrupt.
    InterruptEntry,
}

/// A step that could not complete. Nothing was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[error("step at pc {pc:#06x} faulted during {phase:?}")]
pub struct StepFault {
    /// Program counter at the start of the failing step.
    pub pc: u16,
    /// Stage that raised the fault.
    pub phase: StepPhase,
    /// Underlying bus fault.
    #[source]
    pub cause: BusFault,
}

/// Memory-map construction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum MemoryMapError {
    /// Program and working regions together exceed the 64 KiB address space.
    #[error(
        "program region ({program} bytes) and working region ({working} bytes) exceed the 64 KiB address space"
    )]
    RegionOverflow {
        /// Program region size in bytes.
        program: usize,
        /// Working region size in bytes.
        working: usize,
    },
    /// The working region must hold at least one byte.
    #[error("working region cannot be empty")]
    EmptyWorkingRegion,
}
