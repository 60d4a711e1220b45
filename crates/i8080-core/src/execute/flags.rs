//! Flag-register update descriptors and result-derived flag bits.

use crate::state::{FlagSet, RegisterFile, FLAG_P, FLAG_S, FLAG_Z};

/// Flag bits computed by an instruction, restricted to the set it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagsUpdate {
    /// Flags the instruction writes.
    pub set: FlagSet,
    /// Computed values for the flags in `set`; other bits are ignored.
    pub bits: u8,
}

impl FlagsUpdate {
    /// Leaves the flag register untouched.
    pub const NONE: Self = Self {
        set: FlagSet::NONE,
        bits: 0,
    };

    /// Creates an update writing `bits` into the flags of `set`.
    #[must_use]
    pub const fn new(set: FlagSet, bits: u8) -> Self {
        Self { set, bits }
    }

    /// Merges the update into a register file.
    pub const fn apply(self, regs: &mut RegisterFile) {
        if !self.set.is_empty() {
            regs.merge_flags(self.set, self.bits);
        }
    }
}

/// Returns `true` when `value` has an even number of set bits.
#[must_use]
pub const fn parity_even(value: u8) -> bool {
    value.count_ones() % 2 == 0
}

/// Zero, sign and parity bits for an 8-bit result.
#[must_use]
pub const fn zsp(value: u8) -> u8 {
    let mut bits = value & FLAG_S;
    if value == 0 {
        bits |= FLAG_Z;
    }
    if parity_even(value) {
        bits |= FLAG_P;
    }
    bits
}
