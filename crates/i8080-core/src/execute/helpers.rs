//! 8-bit and 16-bit arithmetic with 8080 flag semantics.

use super::flags::zsp;
use crate::encoding::{AluOp, RotateOp};
use crate::state::{FLAG_AC, FLAG_CY};

/// Result byte and the flag bits it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    /// Computed byte.
    pub value: u8,
    /// Computed flag bits (`S`, `Z`, `AC`, `P`, `CY` as applicable).
    pub flags: u8,
}

const fn flag_if(condition: bool, flag: u8) -> u8 {
    if condition {
        flag
    } else {
        0
    }
}

/// `a + b + carry_in`.
#[must_use]
pub const fn add(a: u8, b: u8, carry_in: bool) -> AluResult {
    let carry = carry_in as u16;
    let sum = a as u16 + b as u16 + carry;
    let half = (a & 0x0F) as u16 + (b & 0x0F) as u16 + carry;
    let value = sum as u8;

    AluResult {
        value,
        flags: zsp(value) | flag_if(half > 0x0F, FLAG_AC) | flag_if(sum > 0xFF, FLAG_CY),
    }
}

/// `a - b - borrow_in`, computed as `a + !b + !borrow_in`.
///
/// `AC` is the carry out of bit 3 of that addition; `CY` is the borrow.
#[must_use]
pub const fn sub(a: u8, b: u8, borrow_in: bool) -> AluResult {
    let carry = !borrow_in as u16;
    let sum = a as u16 + (!b) as u16 + carry;
    let half = (a & 0x0F) as u16 + (!b & 0x0F) as u16 + carry;
    let value = sum as u8;

    AluResult {
        value,
        flags: zsp(value) | flag_if(half > 0x0F, FLAG_AC) | flag_if(sum <= 0xFF, FLAG_CY),
    }
}

/// Runs an accumulator ALU operation. For [`AluOp::Compare`] the returned
/// value is the discarded difference.
#[must_use]
pub const fn alu(op: AluOp, a: u8, b: u8, carry: bool) -> AluResult {
    match op {
        AluOp::Add => add(a, b, false),
        AluOp::AddWithCarry => add(a, b, carry),
        AluOp::Sub | AluOp::Compare => sub(a, b, false),
        AluOp::SubWithBorrow => sub(a, b, carry),
        AluOp::And => {
            let value = a & b;
            AluResult {
                value,
                flags: zsp(value) | flag_if((a | b) & 0x08 != 0, FLAG_AC),
            }
        }
        AluOp::Xor => {
            let value = a ^ b;
            AluResult {
                value,
                flags: zsp(value),
            }
        }
        AluOp::Or => {
            let value = a | b;
            AluResult {
                value,
                flags: zsp(value),
            }
        }
    }
}

/// `INR`: `CY` is not produced.
#[must_use]
pub const fn increment(value: u8) -> AluResult {
    let value = value.wrapping_add(1);
    AluResult {
        value,
        flags: zsp(value) | flag_if(value & 0x0F == 0, FLAG_AC),
    }
}

/// `DCR`: `CY` is not produced.
#[must_use]
pub const fn decrement(value: u8) -> AluResult {
    let value = value.wrapping_sub(1);
    AluResult {
        value,
        flags: zsp(value) | flag_if(value & 0x0F != 0x0F, FLAG_AC),
    }
}

/// `DAA`: decimal-adjusts the accumulator from its value and the current
/// `AC`/`CY` flags. Carry is set or kept, never cleared.
#[must_use]
pub const fn decimal_adjust(a: u8, aux_carry: bool, carry: bool) -> AluResult {
    let low = a & 0x0F;
    let high = a >> 4;

    let mut correction = 0u8;
    let mut carry_out = carry;
    if aux_carry || low > 9 {
        correction |= 0x06;
    }
    if carry || high > 9 || (high >= 9 && low > 9) {
        correction |= 0x60;
        carry_out = true;
    }

    let result = add(a, correction, false);
    AluResult {
        value: result.value,
        flags: (result.flags & !FLAG_CY) | flag_if(carry_out, FLAG_CY),
    }
}

/// Rotates the accumulator. Returns the new value and the new carry.
#[must_use]
pub const fn rotate(op: RotateOp, a: u8, carry: bool) -> (u8, bool) {
    match op {
        RotateOp::Left => (a.rotate_left(1), a & 0x80 != 0),
        RotateOp::Right => (a.rotate_right(1), a & 0x01 != 0),
        RotateOp::LeftThroughCarry => ((a << 1) | carry as u8, a & 0x80 != 0),
        RotateOp::RightThroughCarry => ((a >> 1) | ((carry as u8) << 7), a & 0x01 != 0),
    }
}

/// `DAD`: 16-bit add with carry out of bit 15.
#[must_use]
pub const fn add_pair(hl: u16, value: u16) -> (u16, bool) {
    hl.overflowing_add(value)
}
