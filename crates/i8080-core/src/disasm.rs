//! Instruction disassembly in Intel syntax.

use std::fmt;

use crate::decoder::{DecodedInstruction, Decoder};
use crate::encoding::Operation;
use crate::memory::Bus;
use crate::BusFault;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisassemblyRow {
    /// Address of the opcode byte.
    pub addr_start: u16,
    /// Length in bytes (1..=3).
    pub len_bytes: u8,
    /// Raw instruction bytes, opcode first.
    pub bytes: Vec<u8>,
    /// Mnemonic (`MOV`, `JNZ`, `*NOP`, ...).
    pub mnemonic: String,
    /// Comma-separated operands, empty when there are none.
    pub operands: String,
    /// Whether the opcode is undocumented.
    pub is_undocumented: bool,
}

impl DisassemblyRow {
    /// Builds a row from an already decoded instruction.
    #[must_use]
    pub fn from_decoded(instr: &DecodedInstruction) -> Self {
        let operation = instr.operation();
        Self {
            addr_start: instr.pc,
            len_bytes: instr.length(),
            bytes: instr.bytes(),
            mnemonic: operation.mnemonic().to_owned(),
            operands: format_operands(operation, instr),
            is_undocumented: matches!(operation, Operation::Undocumented),
        }
    }

    /// Instruction text without address or bytes, e.g. `MVI A,0x3E`.
    #[must_use]
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands)
        }
    }
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self
            .bytes
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "{:04X}  {bytes:<8}  {}", self.addr_start, self.text())
    }
}

fn format_operands(operation: Operation, instr: &DecodedInstruction) -> String {
    let byte = format!("0x{:02X}", instr.byte());
    let word = format!("0x{:04X}", instr.word());

    match operation {
        Operation::Move { dst, src } => format!("{},{}", dst.name(), src.name()),
        Operation::MoveImmediate { dst } => format!("{},{byte}", dst.name()),
        Operation::LoadPairImmediate { pair } => format!("{},{word}", pair.name()),
        Operation::StoreAccumulatorIndirect { pair }
        | Operation::LoadAccumulatorIndirect { pair }
        | Operation::IncrementPair { pair }
        | Operation::DecrementPair { pair }
        | Operation::AddPairToHl { pair } => pair.name().to_owned(),
        Operation::Increment { operand }
        | Operation::Decrement { operand }
        | Operation::Alu { src: operand, .. } => operand.name().to_owned(),
        Operation::Push { pair } | Operation::Pop { pair } => pair.name().to_owned(),
        Operation::StoreHlDirect
        | Operation::LoadHlDirect
        | Operation::StoreAccumulatorDirect
        | Operation::LoadAccumulatorDirect
        | Operation::Jump { .. }
        | Operation::Call { .. } => word,
        Operation::AluImmediate { .. } | Operation::Input | Operation::Output => byte,
        Operation::Restart { number } => number.to_string(),
        _ => String::new(),
    }
}

/// Disassembles the instruction at `addr`.
///
/// # Errors
///
/// Returns the [`BusFault`] of the first byte that could not be read.
pub fn disassemble_one<B: Bus + ?Sized>(bus: &B, addr: u16) -> Result<DisassemblyRow, BusFault> {
    let instr = Decoder::decode(bus, addr)?;
    Ok(DisassemblyRow::from_decoded(&instr))
}

/// Disassembles up to `count` consecutive instructions from `start`.
///
/// Stops early at the first instruction that cannot be fully read.
#[must_use]
pub fn disassemble_range<B: Bus + ?Sized>(bus: &B, start: u16, count: usize) -> Vec<DisassemblyRow> {
    let mut rows = Vec::with_capacity(count);
    let mut addr = start;

    for _ in 0..count {
        let Ok(row) = disassemble_one(bus, addr) else {
            break;
        };
        addr = addr.wrapping_add(u16::from(row.len_bytes));
        rows.push(row);
    }

    rows
}
