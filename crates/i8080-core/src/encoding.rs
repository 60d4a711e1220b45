//! Total opcode table: every byte value maps to exactly one instruction descriptor.

use crate::state::{Condition, FlagSet, Operand, RegisterPair, StackPair};
use crate::timing::{cycle_cost, CONDITIONAL_TAKEN_EXTRA_CYCLES};

/// Accumulator ALU operation selected by bits 5..3 of the ALU group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum AluOp {
    Add,
    AddWithCarry,
    Sub,
    SubWithBorrow,
    And,
    Xor,
    Or,
    Compare,
}

impl AluOp {
    /// Decodes a 3-bit ALU selector.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Add,
            1 => Self::AddWithCarry,
            2 => Self::Sub,
            3 => Self::SubWithBorrow,
            4 => Self::And,
            5 => Self::Xor,
            6 => Self::Or,
            _ => Self::Compare,
        }
    }

    const fn register_mnemonic(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::AddWithCarry => "ADC",
            Self::Sub => "SUB",
            Self::SubWithBorrow => "SBB",
            Self::And => "ANA",
            Self::Xor => "XRA",
            Self::Or => "ORA",
            Self::Compare => "CMP",
        }
    }

    const fn immediate_mnemonic(self) -> &'static str {
        match self {
            Self::Add => "ADI",
            Self::AddWithCarry => "ACI",
            Self::Sub => "SUI",
            Self::SubWithBorrow => "SBI",
            Self::And => "ANI",
            Self::Xor => "XRI",
            Self::Or => "ORI",
            Self::Compare => "CPI",
        }
    }
}

/// Accumulator rotate selected by bits 4..3 of the rotate group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RotateOp {
    /// Rotate left; bit 7 goes to bit 0 and carry.
    Left,
    /// Rotate right; bit 0 goes to bit 7 and carry.
    Right,
    /// Rotate left through carry.
    LeftThroughCarry,
    /// Rotate right through carry.
    RightThroughCarry,
}

/// Instruction family with its decoded operand selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operation {
    /// `NOP`.
    Nop,
    /// Undocumented opcode, executed as a one-byte no-op.
    Undocumented,
    /// `MOV dst,src`.
    Move {
        /// Destination.
        dst: Operand,
        /// Source.
        src: Operand,
    },
    /// `MVI dst,d8`.
    MoveImmediate {
        /// Destination.
        dst: Operand,
    },
    /// `LXI rp,d16`.
    LoadPairImmediate {
        /// Target pair.
        pair: RegisterPair,
    },
    /// `STAX rp`: store `A` at the address in `BC` or `DE`.
    StoreAccumulatorIndirect {
        /// Address pair.
        pair: RegisterPair,
    },
    /// `LDAX rp`: load `A` from the address in `BC` or `DE`.
    LoadAccumulatorIndirect {
        /// Address pair.
        pair: RegisterPair,
    },
    /// `SHLD a16`.
    StoreHlDirect,
    /// `LHLD a16`.
    LoadHlDirect,
    /// `STA a16`.
    StoreAccumulatorDirect,
    /// `LDA a16`.
    LoadAccumulatorDirect,
    /// `INR r`.
    Increment {
        /// Operand incremented in place.
        operand: Operand,
    },
    /// `DCR r`.
    Decrement {
        /// Operand decremented in place.
        operand: Operand,
    },
    /// `INX rp`.
    IncrementPair {
        /// Pair incremented in place.
        pair: RegisterPair,
    },
    /// `DCX rp`.
    DecrementPair {
        /// Pair decremented in place.
        pair: RegisterPair,
    },
    /// `DAD rp`: `HL += rp`.
    AddPairToHl {
        /// Pair added into `HL`.
        pair: RegisterPair,
    },
    /// `DAA`.
    DecimalAdjust,
    /// ALU group with register or memory source.
    Alu {
        /// ALU operation.
        op: AluOp,
        /// Source operand.
        src: Operand,
    },
    /// ALU group with immediate source.
    AluImmediate {
        /// ALU operation.
        op: AluOp,
    },
    /// `RLC`, `RRC`, `RAL`, `RAR`.
    Rotate(RotateOp),
    /// `CMA`.
    ComplementAccumulator,
    /// `STC`.
    SetCarry,
    /// `CMC`.
    ComplementCarry,
    /// `JMP` / `Jcc`.
    Jump {
        /// Condition, `None` for the unconditional form.
        condition: Option<Condition>,
    },
    /// `CALL` / `Ccc`.
    Call {
        /// Condition, `None` for the unconditional form.
        condition: Option<Condition>,
    },
    /// `RET` / `Rcc`.
    Return {
        /// Condition, `None` for the unconditional form.
        condition: Option<Condition>,
    },
    /// `RST n`: call to `n * 8`.
    Restart {
        /// Restart number `0..=7`.
        number: u8,
    },
    /// `PUSH rp`.
    Push {
        /// Pair pushed.
        pair: StackPair,
    },
    /// `POP rp`.
    Pop {
        /// Pair popped.
        pair: StackPair,
    },
    /// `XTHL`.
    ExchangeStackTop,
    /// `XCHG`.
    ExchangeDeHl,
    /// `PCHL`.
    LoadPcFromHl,
    /// `SPHL`.
    LoadSpFromHl,
    /// `IN port`.
    Input,
    /// `OUT port`.
    Output,
    /// `EI`.
    EnableInterrupts,
    /// `DI`.
    DisableInterrupts,
    /// `HLT`.
    Halt,
}

impl Operation {
    /// Decodes the operation encoded by `opcode`. Total over all byte values.
    #[must_use]
    pub const fn decode(opcode: u8) -> Self {
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let p = y >> 1;
        let q = y & 0x01;

        match opcode >> 6 {
            0 => match z {
                0 => {
                    if y == 0 {
                        Self::Nop
                    } else {
                        Self::Undocumented
                    }
                }
                1 => {
                    if q == 0 {
                        Self::LoadPairImmediate {
                            pair: RegisterPair::from_u2(p),
                        }
                    } else {
                        Self::AddPairToHl {
                            pair: RegisterPair::from_u2(p),
                        }
                    }
                }
                2 => match (p, q) {
                    (0 | 1, 0) => Self::StoreAccumulatorIndirect {
                        pair: RegisterPair::from_u2(p),
                    },
                    (0 | 1, _) => Self::LoadAccumulatorIndirect {
                        pair: RegisterPair::from_u2(p),
                    },
                    (2, 0) => Self::StoreHlDirect,
                    (2, _) => Self::LoadHlDirect,
                    (_, 0) => Self::StoreAccumulatorDirect,
                    _ => Self::LoadAccumulatorDirect,
                },
                3 => {
                    if q == 0 {
                        Self::IncrementPair {
                            pair: RegisterPair::from_u2(p),
                        }
                    } else {
                        Self::DecrementPair {
                            pair: RegisterPair::from_u2(p),
                        }
                    }
                }
                4 => Self::Increment {
                    operand: Operand::from_u3(y),
                },
                5 => Self::Decrement {
                    operand: Operand::from_u3(y),
                },
                6 => Self::MoveImmediate {
                    dst: Operand::from_u3(y),
                },
                _ => match y {
                    0 => Self::Rotate(RotateOp::Left),
                    1 => Self::Rotate(RotateOp::Right),
                    2 => Self::Rotate(RotateOp::LeftThroughCarry),
                    3 => Self::Rotate(RotateOp::RightThroughCarry),
                    4 => Self::DecimalAdjust,
                    5 => Self::ComplementAccumulator,
                    6 => Self::SetCarry,
                    _ => Self::ComplementCarry,
                },
            },
            1 => {
                if opcode == 0x76 {
                    Self::Halt
                } else {
                    Self::Move {
                        dst: Operand::from_u3(y),
                        src: Operand::from_u3(z),
                    }
                }
            }
            2 => Self::Alu {
                op: AluOp::from_u3(y),
                src: Operand::from_u3(z),
            },
            _ => match z {
                0 => Self::Return {
                    condition: Some(Condition::from_u3(y)),
                },
                1 => match (q, p) {
                    (0, _) => Self::Pop {
                        pair: StackPair::from_u2(p),
                    },
                    (_, 0) => Self::Return { condition: None },
                    (_, 1) => Self::Undocumented,
                    (_, 2) => Self::LoadPcFromHl,
                    _ => Self::LoadSpFromHl,
                },
                2 => Self::Jump {
                    condition: Some(Condition::from_u3(y)),
                },
                3 => match y {
                    0 => Self::Jump { condition: None },
                    1 => Self::Undocumented,
                    2 => Self::Output,
                    3 => Self::Input,
                    4 => Self::ExchangeStackTop,
                    5 => Self::ExchangeDeHl,
                    6 => Self::DisableInterrupts,
                    _ => Self::EnableInterrupts,
                },
                4 => Self::Call {
                    condition: Some(Condition::from_u3(y)),
                },
                5 => match (q, p) {
                    (0, _) => Self::Push {
                        pair: StackPair::from_u2(p),
                    },
                    (_, 0) => Self::Call { condition: None },
                    _ => Self::Undocumented,
                },
                6 => Self::AluImmediate {
                    op: AluOp::from_u3(y),
                },
                _ => Self::Restart { number: y },
            },
        }
    }

    /// Instruction length in bytes, opcode included.
    #[must_use]
    pub const fn length(self) -> u8 {
        match self {
            Self::LoadPairImmediate { .. }
            | Self::StoreHlDirect
            | Self::LoadHlDirect
            | Self::StoreAccumulatorDirect
            | Self::LoadAccumulatorDirect
            | Self::Jump { .. }
            | Self::Call { .. } => 3,
            Self::MoveImmediate { .. }
            | Self::AluImmediate { .. }
            | Self::Input
            | Self::Output => 2,
            _ => 1,
        }
    }

    /// Flags this operation writes. All others are left untouched.
    #[must_use]
    pub const fn flags_written(self) -> FlagSet {
        match self {
            Self::Increment { .. } | Self::Decrement { .. } => FlagSet::ZSPAC,
            Self::Alu { .. }
            | Self::AluImmediate { .. }
            | Self::DecimalAdjust
            | Self::Pop {
                pair: StackPair::PSW,
            } => FlagSet::ALL,
            Self::AddPairToHl { .. } | Self::Rotate(_) | Self::SetCarry | Self::ComplementCarry => {
                FlagSet::CY
            }
            _ => FlagSet::NONE,
        }
    }

    /// Returns `true` when the operation sets `PC` itself instead of falling through.
    #[must_use]
    pub const fn transfers_control(self) -> bool {
        matches!(
            self,
            Self::Jump { .. }
                | Self::Call { .. }
                | Self::Return { .. }
                | Self::Restart { .. }
                | Self::LoadPcFromHl
        )
    }

    /// Intel mnemonic without operands.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Undocumented => "*NOP",
            Self::Move { .. } => "MOV",
            Self::MoveImmediate { .. } => "MVI",
            Self::LoadPairImmediate { .. } => "LXI",
            Self::StoreAccumulatorIndirect { .. } => "STAX",
            Self::LoadAccumulatorIndirect { .. } => "LDAX",
            Self::StoreHlDirect => "SHLD",
            Self::LoadHlDirect => "LHLD",
            Self::StoreAccumulatorDirect => "STA",
            Self::LoadAccumulatorDirect => "LDA",
            Self::Increment { .. } => "INR",
            Self::Decrement { .. } => "DCR",
            Self::IncrementPair { .. } => "INX",
            Self::DecrementPair { .. } => "DCX",
            Self::AddPairToHl { .. } => "DAD",
            Self::DecimalAdjust => "DAA",
            Self::Alu { op, .. } => op.register_mnemonic(),
            Self::AluImmediate { op } => op.immediate_mnemonic(),
            Self::Rotate(RotateOp::Left) => "RLC",
            Self::Rotate(RotateOp::Right) => "RRC",
            Self::Rotate(RotateOp::LeftThroughCarry) => "RAL",
            Self::Rotate(RotateOp::RightThroughCarry) => "RAR",
            Self::ComplementAccumulator => "CMA",
            Self::SetCarry => "STC",
            Self::ComplementCarry => "CMC",
            Self::Jump { condition } => conditional_mnemonic('J', condition),
            Self::Call { condition } => conditional_mnemonic('C', condition),
            Self::Return { condition } => conditional_mnemonic('R', condition),
            Self::Restart { .. } => "RST",
            Self::Push { .. } => "PUSH",
            Self::Pop { .. } => "POP",
            Self::ExchangeStackTop => "XTHL",
            Self::ExchangeDeHl => "XCHG",
            Self::LoadPcFromHl => "PCHL",
            Self::LoadSpFromHl => "SPHL",
            Self::Input => "IN",
            Self::Output => "OUT",
            Self::EnableInterrupts => "EI",
            Self::DisableInterrupts => "DI",
            Self::Halt => "HLT",
        }
    }
}

const fn conditional_mnemonic(prefix: char, condition: Option<Condition>) -> &'static str {
    let Some(condition) = condition else {
        return match prefix {
            'J' => "JMP",
            'C' => "CALL",
            _ => "RET",
        };
    };
    match (prefix, condition) {
        ('J', Condition::NotZero) => "JNZ",
        ('J', Condition::Zero) => "JZ",
        ('J', Condition::NoCarry) => "JNC",
        ('J', Condition::Carry) => "JC",
        ('J', Condition::ParityOdd) => "JPO",
        ('J', Condition::ParityEven) => "JPE",
        ('J', Condition::Plus) => "JP",
        ('J', Condition::Minus) => "JM",
        ('C', Condition::NotZero) => "CNZ",
        ('C', Condition::Zero) => "CZ",
        ('C', Condition::NoCarry) => "CNC",
        ('C', Condition::Carry) => "CC",
        ('C', Condition::ParityOdd) => "CPO",
        ('C', Condition::ParityEven) => "CPE",
        ('C', Condition::Plus) => "CP",
        ('C', Condition::Minus) => "CM",
        (_, Condition::NotZero) => "RNZ",
        (_, Condition::Zero) => "RZ",
        (_, Condition::NoCarry) => "RNC",
        (_, Condition::Carry) => "RC",
        (_, Condition::ParityOdd) => "RPO",
        (_, Condition::ParityEven) => "RPE",
        (_, Condition::Plus) => "RP",
        (_, Condition::Minus) => "RM",
    }
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeDescriptor {
    /// Opcode byte.
    pub opcode: u8,
    /// Decoded family and operand selectors.
    pub operation: Operation,
    /// Instruction length in bytes (1..=3).
    pub length: u8,
    /// Cycle cost; for conditional calls and returns, the cost when not taken.
    pub cycles: u8,
    /// Cycle cost when a conditional call or return is taken; equals `cycles` otherwise.
    pub cycles_taken: u8,
    /// Flags the instruction writes.
    pub flags: FlagSet,
}

impl OpcodeDescriptor {
    /// Builds the descriptor for `opcode`.
    #[must_use]
    pub const fn for_opcode(opcode: u8) -> Self {
        let operation = Operation::decode(opcode);
        let cycles = cycle_cost(opcode);
        let cycles_taken = match operation {
            Operation::Call {
                condition: Some(_),
            }
            | Operation::Return {
                condition: Some(_),
            } => cycles + CONDITIONAL_TAKEN_EXTRA_CYCLES,
            _ => cycles,
        };

        Self {
            opcode,
            operation,
            length: operation.length(),
            cycles,
            cycles_taken,
            flags: operation.flags_written(),
        }
    }

    /// Intel mnemonic without operands.
    #[must_use]
    pub const fn mnemonic(&self) -> &'static str {
        self.operation.mnemonic()
    }
}

/// Descriptor for every opcode byte, indexed by opcode.
pub static OPCODE_TABLE: [OpcodeDescriptor; 256] = build_table();

const fn build_table() -> [OpcodeDescriptor; 256] {
    let mut table = [OpcodeDescriptor::for_opcode(0); 256];
    let mut index = 0;
    while index < table.len() {
        #[allow(clippy::cast_possible_truncation)]
        let opcode = index as u8;
        table[index] = OpcodeDescriptor::for_opcode(opcode);
        index += 1;
    }
    table
}

/// Looks up the descriptor for `opcode`.
#[must_use]
pub fn descriptor(opcode: u8) -> &'static OpcodeDescriptor {
    &OPCODE_TABLE[usize::from(opcode)]
}

/// Opcodes the 8080 documents no instruction for.
pub const UNDOCUMENTED_OPCODES: [u8; 12] = [
    0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38, 0xCB, 0xD9, 0xDD, 0xED, 0xFD,
];
