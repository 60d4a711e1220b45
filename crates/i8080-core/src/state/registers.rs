/// `FLAGS` bit for carry/borrow out of bit 7 (bit 15 for `DAD`).
pub const FLAG_CY: u8 = 1 << 0;
/// `FLAGS` bit fixed at 1.
pub const FLAG_FIXED_ONE: u8 = 1 << 1;
/// `FLAGS` bit for even parity of the result.
pub const FLAG_P: u8 = 1 << 2;
/// `FLAGS` bit for carry out of bit 3.
pub const FLAG_AC: u8 = 1 << 4;
/// `FLAGS` bit for zero result.
pub const FLAG_Z: u8 = 1 << 6;
/// `FLAGS` bit for bit 7 of the result.
pub const FLAG_S: u8 = 1 << 7;
/// Mask of the five architecturally meaningful flag bits.
pub const FLAGS_ACTIVE_MASK: u8 = FLAG_S | FLAG_Z | FLAG_AC | FLAG_P | FLAG_CY;
/// Flag register value after power-on.
pub const FLAGS_RESET: u8 = FLAG_FIXED_ONE;

/// Set of flags an instruction writes, as a `FLAGS` bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FlagSet(u8);

impl FlagSet {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Carry only (rotates, `DAD`, `STC`, `CMC`).
    pub const CY: Self = Self(FLAG_CY);
    /// Everything but carry (`INR`, `DCR`).
    pub const ZSPAC: Self = Self(FLAG_Z | FLAG_S | FLAG_P | FLAG_AC);
    /// All five flags (ALU group, `DAA`).
    pub const ALL: Self = Self(FLAGS_ACTIVE_MASK);

    /// Bit mask of the flags in this set.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` when `flag` is a member.
    #[must_use]
    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    /// Returns `true` for the empty set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// 8-bit register as selected by the 3-bit `DDD`/`SSS` opcode fields.
///
/// Field value 6 selects memory through `HL` and is modelled by [`Operand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Register {
    B = 0,
    C = 1,
    D = 2,
    E = 3,
    H = 4,
    L = 5,
    A = 7,
}

impl Register {
    /// All registers in encoding order.
    pub const ALL: [Self; 7] = [Self::B, Self::C, Self::D, Self::E, Self::H, Self::L, Self::A];

    /// Assembler name of the register.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::H => "H",
            Self::L => "L",
            Self::A => "A",
        }
    }
}

/// Register-or-memory operand selected by a 3-bit opcode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Operand {
    /// An 8-bit register.
    Register(Register),
    /// The byte addressed by `HL` (`M`).
    Memory,
}

impl Operand {
    /// Decodes a 3-bit operand field.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Register(Register::B),
            1 => Self::Register(Register::C),
            2 => Self::Register(Register::D),
            3 => Self::Register(Register::E),
            4 => Self::Register(Register::H),
            5 => Self::Register(Register::L),
            6 => Self::Memory,
            _ => Self::Register(Register::A),
        }
    }

    /// Assembler name of the operand.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Register(reg) => reg.name(),
            Self::Memory => "M",
        }
    }
}

/// 16-bit register pair selected by the `RP` field of data instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum RegisterPair {
    BC,
    DE,
    HL,
    SP,
}

impl RegisterPair {
    /// Decodes a 2-bit `RP` field.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::BC,
            1 => Self::DE,
            2 => Self::HL,
            _ => Self::SP,
        }
    }

    /// Assembler name of the pair (`B`, `D`, `H`, `SP`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BC => "B",
            Self::DE => "D",
            Self::HL => "H",
            Self::SP => "SP",
        }
    }
}

/// Register pair selected by the `RP` field of `PUSH`/`POP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum StackPair {
    BC,
    DE,
    HL,
    /// Accumulator (high byte) and flags (low byte).
    PSW,
}

impl StackPair {
    /// Decodes a 2-bit `RP` field.
    #[must_use]
    pub const fn from_u2(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::BC,
            1 => Self::DE,
            2 => Self::HL,
            _ => Self::PSW,
        }
    }

    /// Assembler name of the pair.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BC => "B",
            Self::DE => "D",
            Self::HL => "H",
            Self::PSW => "PSW",
        }
    }
}

/// Branch condition encoded in the `CCC` field of conditional jumps, calls and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Condition {
    /// Zero flag clear.
    NotZero,
    /// Zero flag set.
    Zero,
    /// Carry flag clear.
    NoCarry,
    /// Carry flag set.
    Carry,
    /// Parity flag clear (odd).
    ParityOdd,
    /// Parity flag set (even).
    ParityEven,
    /// Sign flag clear.
    Plus,
    /// Sign flag set.
    Minus,
}

impl Condition {
    /// Decodes a 3-bit `CCC` field.
    #[must_use]
    pub const fn from_u3(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::NotZero,
            1 => Self::Zero,
            2 => Self::NoCarry,
            3 => Self::Carry,
            4 => Self::ParityOdd,
            5 => Self::ParityEven,
            6 => Self::Plus,
            _ => Self::Minus,
        }
    }

    /// Mnemonic suffix (`NZ`, `Z`, `NC`, `C`, `PO`, `PE`, `P`, `M`).
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::NotZero => "NZ",
            Self::Zero => "Z",
            Self::NoCarry => "NC",
            Self::Carry => "C",
            Self::ParityOdd => "PO",
            Self::ParityEven => "PE",
            Self::Plus => "P",
            Self::Minus => "M",
        }
    }

    /// Evaluates the condition against a flag register value.
    #[must_use]
    pub const fn holds(self, flags: u8) -> bool {
        match self {
            Self::NotZero => flags & FLAG_Z == 0,
            Self::Zero => flags & FLAG_Z != 0,
            Self::NoCarry => flags & FLAG_CY == 0,
            Self::Carry => flags & FLAG_CY != 0,
            Self::ParityOdd => flags & FLAG_P == 0,
            Self::ParityEven => flags & FLAG_P != 0,
            Self::Plus => flags & FLAG_S == 0,
            Self::Minus => flags & FLAG_S != 0,
        }
    }
}

/// Processor-visible register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    a: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    h: u8,
    l: u8,
    flags: u8,
    sp: u16,
    pc: u16,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            a: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            flags: FLAGS_RESET,
            sp: 0,
            pc: 0,
        }
    }
}

impl RegisterFile {
    /// Reads an 8-bit register.
    #[must_use]
    pub const fn get(&self, reg: Register) -> u8 {
        match reg {
            Register::A => self.a,
            Register::B => self.b,
            Register::C => self.c,
            Register::D => self.d,
            Register::E => self.e,
            Register::H => self.h,
            Register::L => self.l,
        }
    }

    /// Writes an 8-bit register.
    pub const fn set(&mut self, reg: Register, value: u8) {
        match reg {
            Register::A => self.a = value,
            Register::B => self.b = value,
            Register::C => self.c = value,
            Register::D => self.d = value,
            Register::E => self.e = value,
            Register::H => self.h = value,
            Register::L => self.l = value,
        }
    }

    /// Reads a register pair; the first-named register is the high byte.
    #[must_use]
    pub const fn pair(&self, pair: RegisterPair) -> u16 {
        match pair {
            RegisterPair::BC => u16::from_be_bytes([self.b, self.c]),
            RegisterPair::DE => u16::from_be_bytes([self.d, self.e]),
            RegisterPair::HL => u16::from_be_bytes([self.h, self.l]),
            RegisterPair::SP => self.sp,
        }
    }

    /// Writes a register pair; the first-named register takes the high byte.
    pub const fn set_pair(&mut self, pair: RegisterPair, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        match pair {
            RegisterPair::BC => {
                self.b = hi;
                self.c = lo;
            }
            RegisterPair::DE => {
                self.d = hi;
                self.e = lo;
            }
            RegisterPair::HL => {
                self.h = hi;
                self.l = lo;
            }
            RegisterPair::SP => self.sp = value,
        }
    }

    /// Reads a `PUSH`/`POP` pair; `PSW` is `A` high, flags low.
    #[must_use]
    pub const fn stack_pair(&self, pair: StackPair) -> u16 {
        match pair {
            StackPair::BC => self.pair(RegisterPair::BC),
            StackPair::DE => self.pair(RegisterPair::DE),
            StackPair::HL => self.pair(RegisterPair::HL),
            StackPair::PSW => u16::from_be_bytes([self.a, self.flags]),
        }
    }

    /// Writes a `PUSH`/`POP` pair. The flag byte of `PSW` is normalised.
    pub const fn set_stack_pair(&mut self, pair: StackPair, value: u16) {
        match pair {
            StackPair::BC => self.set_pair(RegisterPair::BC, value),
            StackPair::DE => self.set_pair(RegisterPair::DE, value),
            StackPair::HL => self.set_pair(RegisterPair::HL, value),
            StackPair::PSW => {
                let [a, flags] = value.to_be_bytes();
                self.a = a;
                self.set_flags(flags);
            }
        }
    }

    /// Reads the accumulator.
    #[must_use]
    pub const fn a(&self) -> u8 {
        self.a
    }

    /// Writes the accumulator.
    pub const fn set_a(&mut self, value: u8) {
        self.a = value;
    }

    /// Reads the `PC` register.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.pc
    }

    /// Writes the `PC` register.
    pub const fn set_pc(&mut self, value: u16) {
        self.pc = value;
    }

    /// Reads the `SP` register.
    #[must_use]
    pub const fn sp(&self) -> u16 {
        self.sp
    }

    /// Writes the `SP` register.
    pub const fn set_sp(&mut self, value: u16) {
        self.sp = value;
    }

    /// Reads the flag register.
    #[must_use]
    pub const fn flags(&self) -> u8 {
        self.flags
    }

    /// Writes the flag register; bits 1, 3 and 5 are forced to 1, 0, 0.
    pub const fn set_flags(&mut self, value: u8) {
        self.flags = (value & FLAGS_ACTIVE_MASK) | FLAG_FIXED_ONE;
    }

    /// Returns `true` when a specific flag bit is set.
    #[must_use]
    pub const fn flag_is_set(&self, flag: u8) -> bool {
        (self.flags & flag) != 0
    }

    /// Sets or clears one active flag bit.
    pub const fn set_flag(&mut self, flag: u8, enabled: bool) {
        if enabled {
            self.flags |= flag & FLAGS_ACTIVE_MASK;
        } else {
            self.flags &= !(flag & FLAGS_ACTIVE_MASK);
        }
    }

    /// Replaces the flags in `set` with the corresponding bits of `computed`.
    pub const fn merge_flags(&mut self, set: FlagSet, computed: u8) {
        let mask = set.bits() & FLAGS_ACTIVE_MASK;
        self.flags = (self.flags & !mask) | (computed & mask) | FLAG_FIXED_ONE;
    }
}
