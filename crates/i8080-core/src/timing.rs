/// Machine-state count per opcode, from the 8080 data sheet.
///
/// Conditional calls and returns list the cost when the condition fails; see
/// [`CONDITIONAL_TAKEN_EXTRA_CYCLES`]. Undocumented opcodes cost the same as `NOP`.
pub const CYCLE_COST_TABLE: [u8; 256] = [
    4, 10, 7, 5, 5, 5, 7, 4, 4, 10, 7, 5, 5, 5, 7, 4, // 0x00
    4, 10, 7, 5, 5, 5, 7, 4, 4, 10, 7, 5, 5, 5, 7, 4, // 0x10
    4, 10, 16, 5, 5, 5, 7, 4, 4, 10, 16, 5, 5, 5, 7, 4, // 0x20
    4, 10, 13, 5, 10, 10, 10, 4, 4, 10, 13, 5, 5, 5, 7, 4, // 0x30
    5, 5, 5, 5, 5, 5, 7, 5, 5, 5, 5, 5, 5, 5, 7, 5, // 0x40
    5, 5, 5, 5, 5, 5, 7, 5, 5, 5, 5, 5, 5, 5, 7, 5, // 0x50
    5, 5, 5, 5, 5, 5, 7, 5, 5, 5, 5, 5, 5, 5, 7, 5, // 0x60
    7, 7, 7, 7, 7, 7, 7, 7, 5, 5, 5, 5, 5, 5, 7, 5, // 0x70
    4, 4, 4, 4, 4, 4, 7, 4, 4, 4, 4, 4, 4, 4, 7, 4, // 0x80
    4, 4, 4, 4, 4, 4, 7, 4, 4, 4, 4, 4, 4, 4, 7, 4, // 0x90
    4, 4, 4, 4, 4, 4, 7, 4, 4, 4, 4, 4, 4, 4, 7, 4, // 0xA0
    4, 4, 4, 4, 4, 4, 7, 4, 4, 4, 4, 4, 4, 4, 7, 4, // 0xB0
    5, 10, 10, 10, 11, 11, 7, 11, 5, 10, 10, 4, 11, 17, 7, 11, // 0xC0
    5, 10, 10, 10, 11, 11, 7, 11, 5, 4, 10, 10, 11, 4, 7, 11, // 0xD0
    5, 10, 10, 18, 11, 11, 7, 11, 5, 5, 10, 4, 11, 4, 7, 11, // 0xE0
    5, 10, 10, 4, 11, 11, 7, 11, 5, 5, 10, 4, 11, 4, 7, 11, // 0xF0
];

/// Extra states a conditional call or return spends when its condition holds.
pub const CONDITIONAL_TAKEN_EXTRA_CYCLES: u8 = 6;

/// Cost of accepting an interrupt (the implied restart).
pub const INTERRUPT_ACK_CYCLES: u8 = 11;

/// Cost of one idle step while halted.
pub const HALT_IDLE_CYCLES: u8 = 1;

/// Returns the base cycle cost of `opcode`.
#[must_use]
pub const fn cycle_cost(opcode: u8) -> u8 {
    CYCLE_COST_TABLE[opcode as usize]
}
