//! Instruction fetch and decode.
//!
//! The opcode byte selects a descriptor from [`OPCODE_TABLE`](crate::encoding::OPCODE_TABLE);
//! operand bytes are then fetched only up to the instruction's length, so a
//! one-byte instruction in the last mapped byte never touches unmapped memory.

use crate::encoding::{descriptor, OpcodeDescriptor, Operation};
use crate::memory::Bus;
use crate::BusFault;

/// Inline operand bytes following the opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Immediate {
    /// One-byte instruction.
    None,
    /// `d8` or port number.
    Byte(u8),
    /// `d16` or `a16`, assembled little-endian.
    Word(u16),
}

/// One fetched and decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Address of the opcode byte.
    pub pc: u16,
    /// Static description of the opcode.
    pub descriptor: &'static OpcodeDescriptor,
    /// Inline operand bytes.
    pub immediate: Immediate,
}

impl DecodedInstruction {
    /// Opcode byte.
    #[must_use]
    pub const fn opcode(&self) -> u8 {
        self.descriptor.opcode
    }

    /// Decoded operation.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.descriptor.operation
    }

    /// Length in bytes.
    #[must_use]
    pub const fn length(&self) -> u8 {
        self.descriptor.length
    }

    /// Address of the following instruction (wrapping).
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn next_pc(&self) -> u16 {
        self.pc.wrapping_add(self.descriptor.length as u16)
    }

    /// The `d8` operand, or zero for instructions without one.
    #[must_use]
    pub const fn byte(&self) -> u8 {
        match self.immediate {
            Immediate::Byte(value) => value,
            #[allow(clippy::cast_possible_truncation)]
            Immediate::Word(value) => value as u8,
            Immediate::None => 0,
        }
    }

    /// The `d16`/`a16` operand, or zero for instructions without one.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn word(&self) -> u16 {
        match self.immediate {
            Immediate::Word(value) => value,
            Immediate::Byte(value) => value as u16,
            Immediate::None => 0,
        }
    }

    /// Raw instruction bytes, opcode first.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        match self.immediate {
            Immediate::None => vec![self.opcode()],
            Immediate::Byte(value) => vec![self.opcode(), value],
            Immediate::Word(value) => {
                let [lo, hi] = value.to_le_bytes();
                vec![self.opcode(), lo, hi]
            }
        }
    }
}

/// Stateless instruction decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder;

impl Decoder {
    /// Fetches and decodes the instruction at `pc`.
    ///
    /// Operand addresses wrap at `0xFFFF`.
    ///
    /// # Errors
    ///
    /// Returns the [`BusFault`] of the first byte that could not be read.
    pub fn decode<B: Bus + ?Sized>(bus: &B, pc: u16) -> Result<DecodedInstruction, BusFault> {
        let opcode = bus.read(pc)?;
        let descriptor = descriptor(opcode);
        let immediate = match descriptor.length {
            1 => Immediate::None,
            2 => Immediate::Byte(bus.read(pc.wrapping_add(1))?),
            _ => {
                let lo = bus.read(pc.wrapping_add(1))?;
                let hi = bus.read(pc.wrapping_add(2))?;
                Immediate::Word(u16::from_le_bytes([lo, hi]))
            }
        };

        Ok(DecodedInstruction {
            pc,
            descriptor,
            immediate,
        })
    }
}
