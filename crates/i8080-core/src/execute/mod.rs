//! Instruction execution pipeline.
//!
//! A step runs in two phases:
//! 1. `execute_instruction` reads operands and memory, computes results on a
//!    copy of the register file and collects memory and port writes.
//! 2. `commit_execution` validates every pending memory write, then applies
//!    writes, port output, registers, control state and cycles.
//!
//! A bus fault in either phase leaves the core and memory as they were
//! before the step.

#![allow(
    clippy::pedantic,
    clippy::nursery,
    clippy::similar_names,
    unknown_lints,
    missing_docs
)]

mod flags;
mod helpers;

pub use flags::{parity_even, zsp, FlagsUpdate};
pub use helpers::{
    add, add_pair, alu, decimal_adjust, decrement, increment, rotate, sub, AluResult,
};

use crate::api::{CoreConfig, CoreState, PortIo, StepOutcome, TraceEvent, TraceSink};
use crate::decoder::{DecodedInstruction, Decoder};
use crate::encoding::{AluOp, Operation};
use crate::memory::Bus;
use crate::state::{
    Condition, Operand, Register, RegisterFile, RegisterPair, RunState, FLAG_AC, FLAG_CY,
};
use crate::timing::{HALT_IDLE_CYCLES, INTERRUPT_ACK_CYCLES};
use crate::{BusFault, StepFault, StepPhase};

/// Most memory bytes a single instruction writes.
pub const MAX_PENDING_WRITES: usize = 2;

/// A memory byte waiting for commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    /// Target address.
    pub addr: u16,
    /// Byte to store.
    pub value: u8,
}

/// Side effects accumulated while executing one instruction.
/// Nothing here is visible until [`commit_execution`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteState {
    /// Register file after the instruction, `PC` included.
    pub regs: RegisterFile,
    /// Memory writes in program order.
    pub writes: [Option<PendingWrite>; MAX_PENDING_WRITES],
    /// `OUT` port and value.
    pub port_write: Option<(u8, u8)>,
    /// `EI` (`Some(true)`) or `DI` (`Some(false)`).
    pub interrupt_enable: Option<bool>,
    /// `HLT` retired.
    pub halt: bool,
    /// Cycles consumed.
    pub cycles: u8,
}

impl ExecuteState {
    /// Starts from the current registers and the instruction's base cost.
    #[must_use]
    pub const fn new(regs: RegisterFile, cycles: u8) -> Self {
        Self {
            regs,
            writes: [None; MAX_PENDING_WRITES],
            port_write: None,
            interrupt_enable: None,
            halt: false,
            cycles,
        }
    }

    fn push_write(&mut self, addr: u16, value: u8) {
        let slot = self.writes.iter_mut().find(|slot| slot.is_none());
        debug_assert!(
            slot.is_some(),
            "more than {MAX_PENDING_WRITES} memory writes queued in one step"
        );
        if let Some(slot) = slot {
            *slot = Some(PendingWrite { addr, value });
        }
    }

    /// Queues a stack push: high byte at `SP-1`, low byte at `SP-2`.
    fn push_word(&mut self, value: u16) {
        let sp = self.regs.sp();
        let [hi, lo] = value.to_be_bytes();
        self.push_write(sp.wrapping_sub(1), hi);
        self.push_write(sp.wrapping_sub(2), lo);
        self.regs.set_sp(sp.wrapping_sub(2));
    }

    fn pop_word<B: Bus + ?Sized>(&mut self, bus: &B) -> Result<u16, BusFault> {
        let sp = self.regs.sp();
        let lo = bus.read(sp)?;
        let hi = bus.read(sp.wrapping_add(1))?;
        self.regs.set_sp(sp.wrapping_add(2));
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn read_operand<B: Bus + ?Sized>(&self, bus: &B, operand: Operand) -> Result<u8, BusFault> {
        match operand {
            Operand::Register(reg) => Ok(self.regs.get(reg)),
            Operand::Memory => bus.read(self.regs.pair(RegisterPair::HL)),
        }
    }

    fn write_operand(&mut self, operand: Operand, value: u8) {
        match operand {
            Operand::Register(reg) => self.regs.set(reg, value),
            Operand::Memory => self.push_write(self.regs.pair(RegisterPair::HL), value),
        }
    }

    fn condition_holds(&self, condition: Option<Condition>) -> bool {
        match condition {
            Some(condition) => condition.holds(self.regs.flags()),
            None => true,
        }
    }

    fn set_carry(&mut self, instr: &DecodedInstruction, carry: bool) {
        let bits = if carry { FLAG_CY } else { 0 };
        FlagsUpdate::new(instr.descriptor.flags, bits).apply(&mut self.regs);
    }
}

/// Executes one decoded instruction against a copy of `regs`.
///
/// Memory is only read here; writes and port output are queued in the
/// returned state. `IN` calls the port hook immediately, since it has no
/// later point of failure.
///
/// # Errors
///
/// Returns the [`BusFault`] of the first failing memory read.
pub fn execute_instruction<B: Bus + ?Sized>(
    instr: &DecodedInstruction,
    regs: &RegisterFile,
    bus: &B,
    ports: &mut dyn PortIo,
) -> Result<ExecuteState, BusFault> {
    let descriptor = instr.descriptor;
    let mut exec = ExecuteState::new(*regs, descriptor.cycles);
    exec.regs.set_pc(instr.next_pc());

    match instr.operation() {
        Operation::Nop | Operation::Undocumented => {}
        Operation::Move { dst, src } => {
            let value = exec.read_operand(bus, src)?;
            exec.write_operand(dst, value);
        }
        Operation::MoveImmediate { dst } => exec.write_operand(dst, instr.byte()),
        Operation::LoadPairImmediate { pair } => exec.regs.set_pair(pair, instr.word()),
        Operation::StoreAccumulatorIndirect { pair } => {
            exec.push_write(exec.regs.pair(pair), exec.regs.a());
        }
        Operation::LoadAccumulatorIndirect { pair } => {
            let value = bus.read(exec.regs.pair(pair))?;
            exec.regs.set_a(value);
        }
        Operation::StoreHlDirect => {
            let addr = instr.word();
            exec.push_write(addr, exec.regs.get(Register::L));
            exec.push_write(addr.wrapping_add(1), exec.regs.get(Register::H));
        }
        Operation::LoadHlDirect => {
            let addr = instr.word();
            let lo = bus.read(addr)?;
            let hi = bus.read(addr.wrapping_add(1))?;
            exec.regs.set_pair(RegisterPair::HL, u16::from_le_bytes([lo, hi]));
        }
        Operation::StoreAccumulatorDirect => exec.push_write(instr.word(), exec.regs.a()),
        Operation::LoadAccumulatorDirect => {
            let value = bus.read(instr.word())?;
            exec.regs.set_a(value);
        }
        Operation::Increment { operand } => {
            let result = increment(exec.read_operand(bus, operand)?);
            exec.write_operand(operand, result.value);
            FlagsUpdate::new(descriptor.flags, result.flags).apply(&mut exec.regs);
        }
        Operation::Decrement { operand } => {
            let result = decrement(exec.read_operand(bus, operand)?);
            exec.write_operand(operand, result.value);
            FlagsUpdate::new(descriptor.flags, result.flags).apply(&mut exec.regs);
        }
        Operation::IncrementPair { pair } => {
            let value = exec.regs.pair(pair).wrapping_add(1);
            exec.regs.set_pair(pair, value);
        }
        Operation::DecrementPair { pair } => {
            let value = exec.regs.pair(pair).wrapping_sub(1);
            exec.regs.set_pair(pair, value);
        }
        Operation::AddPairToHl { pair } => {
            let (value, carry) = add_pair(exec.regs.pair(RegisterPair::HL), exec.regs.pair(pair));
            exec.regs.set_pair(RegisterPair::HL, value);
            exec.set_carry(instr, carry);
        }
        Operation::DecimalAdjust => {
            let result = decimal_adjust(
                exec.regs.a(),
                exec.regs.flag_is_set(FLAG_AC),
                exec.regs.flag_is_set(FLAG_CY),
            );
            exec.regs.set_a(result.value);
            FlagsUpdate::new(descriptor.flags, result.flags).apply(&mut exec.regs);
        }
        Operation::Alu { op, src } => {
            let value = exec.read_operand(bus, src)?;
            execute_alu(&mut exec, instr, op, value);
        }
        Operation::AluImmediate { op } => execute_alu(&mut exec, instr, op, instr.byte()),
        Operation::Rotate(op) => {
            let (value, carry) = rotate(op, exec.regs.a(), exec.regs.flag_is_set(FLAG_CY));
            exec.regs.set_a(value);
            exec.set_carry(instr, carry);
        }
        Operation::ComplementAccumulator => exec.regs.set_a(!exec.regs.a()),
        Operation::SetCarry => exec.set_carry(instr, true),
        Operation::ComplementCarry => {
            let carry = exec.regs.flag_is_set(FLAG_CY);
            exec.set_carry(instr, !carry);
        }
        Operation::Jump { condition } => {
            if exec.condition_holds(condition) {
                exec.regs.set_pc(instr.word());
            }
        }
        Operation::Call { condition } => {
            if exec.condition_holds(condition) {
                exec.push_word(instr.next_pc());
                exec.regs.set_pc(instr.word());
                exec.cycles = descriptor.cycles_taken;
            }
        }
        Operation::Return { condition } => {
            if exec.condition_holds(condition) {
                let target = exec.pop_word(bus)?;
                exec.regs.set_pc(target);
                exec.cycles = descriptor.cycles_taken;
            }
        }
        Operation::Restart { number } => {
            exec.push_word(instr.next_pc());
            exec.regs.set_pc(u16::from(number) * 8);
        }
        Operation::Push { pair } => exec.push_word(exec.regs.stack_pair(pair)),
        Operation::Pop { pair } => {
            let value = exec.pop_word(bus)?;
            exec.regs.set_stack_pair(pair, value);
        }
        Operation::ExchangeStackTop => {
            let sp = exec.regs.sp();
            let lo = bus.read(sp)?;
            let hi = bus.read(sp.wrapping_add(1))?;
            exec.push_write(sp, exec.regs.get(Register::L));
            exec.push_write(sp.wrapping_add(1), exec.regs.get(Register::H));
            exec.regs.set_pair(RegisterPair::HL, u16::from_le_bytes([lo, hi]));
        }
        Operation::ExchangeDeHl => {
            let de = exec.regs.pair(RegisterPair::DE);
            let hl = exec.regs.pair(RegisterPair::HL);
            exec.regs.set_pair(RegisterPair::DE, hl);
            exec.regs.set_pair(RegisterPair::HL, de);
        }
        Operation::LoadPcFromHl => exec.regs.set_pc(exec.regs.pair(RegisterPair::HL)),
        Operation::LoadSpFromHl => exec.regs.set_sp(exec.regs.pair(RegisterPair::HL)),
        Operation::Input => {
            let value = ports.port_in(instr.byte());
            exec.regs.set_a(value);
        }
        Operation::Output => exec.port_write = Some((instr.byte(), exec.regs.a())),
        Operation::EnableInterrupts => exec.interrupt_enable = Some(true),
        Operation::DisableInterrupts => exec.interrupt_enable = Some(false),
        Operation::Halt => exec.halt = true,
    }

    Ok(exec)
}

fn execute_alu(exec: &mut ExecuteState, instr: &DecodedInstruction, op: AluOp, value: u8) {
    let result = alu(op, exec.regs.a(), value, exec.regs.flag_is_set(FLAG_CY));
    if op != AluOp::Compare {
        exec.regs.set_a(result.value);
    }
    FlagsUpdate::new(instr.descriptor.flags, result.flags).apply(&mut exec.regs);
}

/// Applies the side effects collected by [`execute_instruction`].
///
/// All pending writes are validated before the first one lands, so a fault
/// here leaves memory and `state` untouched.
///
/// # Errors
///
/// Returns the [`BusFault`] of the first pending write the bus rejects.
pub fn commit_execution<B: Bus + ?Sized>(
    state: &mut CoreState,
    bus: &mut B,
    ports: &mut dyn PortIo,
    trace: &mut dyn TraceSink,
    config: &CoreConfig,
    exec: &ExecuteState,
) -> Result<(), BusFault> {
    for write in exec.writes.iter().flatten() {
        bus.validate_write(write.addr)?;
    }
    for write in exec.writes.iter().flatten() {
        bus.write(write.addr, write.value)?;
        trace.on_event(TraceEvent::MemoryWrite {
            addr: write.addr,
            value: write.value,
        });
    }

    if let Some((port, value)) = exec.port_write {
        ports.port_out(port, value);
        trace.on_event(TraceEvent::PortWrite { port, value });
    }

    state.regs = exec.regs;
    match exec.interrupt_enable {
        Some(true) if config.delayed_interrupt_enable => state.enable_interrupts_after_next = true,
        Some(true) => state.interrupts_enabled = true,
        Some(false) => {
            state.interrupts_enabled = false;
            state.enable_interrupts_after_next = false;
        }
        None => {}
    }
    if exec.halt {
        state.run_state = RunState::Halted;
    }
    state.cycles = state.cycles.wrapping_add(u64::from(exec.cycles));

    Ok(())
}

/// Runs one step: interrupt entry, a halted idle cycle, or one instruction.
///
/// # Errors
///
/// Returns a [`StepFault`] when a bus access fails. The step is discarded:
/// `state` and memory are unchanged, and a pending interrupt stays pending.
pub fn step_one<B: Bus + ?Sized>(
    state: &mut CoreState,
    bus: &mut B,
    ports: &mut dyn PortIo,
    trace: &mut dyn TraceSink,
    config: &CoreConfig,
) -> Result<StepOutcome, StepFault> {
    let pc = state.regs.pc();

    if let (true, Some(vector)) = (state.interrupts_enabled, state.pending_interrupt) {
        return accept_interrupt(state, bus, trace, vector)
            .map_err(|cause| discard_step(trace, pc, StepPhase::InterruptEntry, cause));
    }

    if state.run_state.is_halted() {
        state.cycles = state.cycles.wrapping_add(u64::from(HALT_IDLE_CYCLES));
        return Ok(StepOutcome::Halted {
            cycles: HALT_IDLE_CYCLES,
        });
    }

    let instr = Decoder::decode(&*bus, pc)
        .map_err(|cause| discard_step(trace, pc, StepPhase::Fetch, cause))?;
    trace.on_event(TraceEvent::InstructionStart {
        pc,
        opcode: instr.opcode(),
    });

    let enable_was_delayed = state.enable_interrupts_after_next;
    let exec = execute_instruction(&instr, &state.regs, &*bus, ports)
        .map_err(|cause| discard_step(trace, pc, StepPhase::Execute, cause))?;
    commit_execution(state, bus, ports, trace, config, &exec)
        .map_err(|cause| discard_step(trace, pc, StepPhase::Execute, cause))?;

    if enable_was_delayed && state.enable_interrupts_after_next {
        state.enable_interrupts_after_next = false;
        state.interrupts_enabled = true;
    }

    trace.on_event(TraceEvent::InstructionRetired {
        pc,
        cycles: exec.cycles,
    });
    Ok(StepOutcome::Retired {
        opcode: instr.opcode(),
        cycles: exec.cycles,
    })
}

fn discard_step(
    trace: &mut dyn TraceSink,
    pc: u16,
    phase: StepPhase,
    cause: BusFault,
) -> StepFault {
    trace.on_event(TraceEvent::Fault { pc, fault: cause });
    StepFault { pc, phase, cause }
}

/// Pushes `PC`, jumps to `vector` and clears the request. Leaves the core
/// untouched when either stack byte cannot be written.
fn accept_interrupt<B: Bus + ?Sized>(
    state: &mut CoreState,
    bus: &mut B,
    trace: &mut dyn TraceSink,
    vector: u16,
) -> Result<StepOutcome, BusFault> {
    let return_pc = state.regs.pc();
    let mut exec = ExecuteState::new(state.regs, INTERRUPT_ACK_CYCLES);
    exec.push_word(return_pc);

    for write in exec.writes.iter().flatten() {
        bus.validate_write(write.addr)?;
    }
    for write in exec.writes.iter().flatten() {
        bus.write(write.addr, write.value)?;
        trace.on_event(TraceEvent::MemoryWrite {
            addr: write.addr,
            value: write.value,
        });
    }

    exec.regs.set_pc(vector);
    state.regs = exec.regs;
    state.pending_interrupt = None;
    state.interrupts_enabled = false;
    state.enable_interrupts_after_next = false;
    state.run_state = RunState::Running;
    state.cycles = state.cycles.wrapping_add(u64::from(INTERRUPT_ACK_CYCLES));

    trace.on_event(TraceEvent::InterruptAccepted { vector, return_pc });
    Ok(StepOutcome::InterruptAccepted {
        vector,
        cycles: INTERRUPT_ACK_CYCLES,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{NullPorts, NullTrace};
    use crate::state::{StackPair, FLAG_P, FLAG_S, FLAG_Z};
    use crate::{AccessKind, MemoryBus};

    const STACK_TOP: u16 = 0x2400;

    fn bus_with(origin: u16, code: &[u8]) -> MemoryBus {
        let mut bus = MemoryBus::default();
        bus.load(origin, code).expect("code fits the default map");
        bus
    }

    fn state_at(pc: u16) -> CoreState {
        let mut state = CoreState::default();
        state.regs.set_pc(pc);
        state.regs.set_sp(STACK_TOP);
        state
    }

    fn step(state: &mut CoreState, bus: &mut MemoryBus) -> Result<StepOutcome, StepFault> {
        step_one(state, bus, &mut NullPorts, &mut NullTrace, &CoreConfig::default())
    }

    struct RecordingPorts {
        input: u8,
        written: Vec<(u8, u8)>,
    }

    impl PortIo for RecordingPorts {
        fn port_in(&mut self, _port: u8) -> u8 {
            self.input
        }

        fn port_out(&mut self, port: u8, value: u8) {
            self.written.push((port, value));
        }
    }

    #[test]
    fn nop_advances_pc_and_cycles_only() {
        let mut bus = bus_with(0, &[0x00]);
        let mut state = state_at(0);
        let before = state;

        let outcome = step(&mut state, &mut bus).expect("mapped");

        assert_eq!(outcome, StepOutcome::Retired { opcode: 0, cycles: 4 });
        assert_eq!(state.regs.pc(), 1);
        assert_eq!(state.cycles, 4);
        state.regs.set_pc(0);
        state.cycles = 0;
        assert_eq!(state, before);
    }

    #[test]
    fn mov_to_memory_goes_through_hl() {
        // LXI H,0x2100 ; MVI A,0x5A ; MOV M,A ; MOV B,M
        let mut bus = bus_with(0, &[0x21, 0x00, 0x21, 0x3E, 0x5A, 0x77, 0x46]);
        let mut state = state_at(0);
        for _ in 0..4 {
            step(&mut state, &mut bus).expect("mapped");
        }
        assert_eq!(bus.read(0x2100), Ok(0x5A));
        assert_eq!(state.regs.get(Register::B), 0x5A);
        assert_eq!(state.regs.pc(), 7);
    }

    #[test]
    fn add_immediate_sets_aux_carry() {
        let mut bus = bus_with(0, &[0xC6, 0x01]);
        let mut state = state_at(0);
        state.regs.set_a(0x0F);

        step(&mut state, &mut bus).expect("mapped");

        assert_eq!(state.regs.a(), 0x10);
        assert!(state.regs.flag_is_set(FLAG_AC));
        assert!(!state.regs.flag_is_set(FLAG_CY));
        assert!(!state.regs.flag_is_set(FLAG_Z));
    }

    #[test]
    fn compare_leaves_accumulator() {
        let mut bus = bus_with(0, &[0xFE, 0x40]);
        let mut state = state_at(0);
        state.regs.set_a(0x40);

        step(&mut state, &mut bus).expect("mapped");

        assert_eq!(state.regs.a(), 0x40);
        assert!(state.regs.flag_is_set(FLAG_Z));
        assert!(state.regs.flag_is_set(FLAG_P));
    }

    #[test]
    fn increment_keeps_carry() {
        let mut bus = bus_with(0, &[0x3C]);
        let mut state = state_at(0);
        state.regs.set_a(0xFF);
        state.regs.set_flag(FLAG_CY, true);

        step(&mut state, &mut bus).expect("mapped");

        assert_eq!(state.regs.a(), 0x00);
        assert!(state.regs.flag_is_set(FLAG_Z));
        assert!(!state.regs.flag_is_set(FLAG_S));
        assert!(state.regs.flag_is_set(FLAG_AC));
        assert!(state.regs.flag_is_set(FLAG_CY));
    }

    #[test]
    fn dad_only_touches_carry() {
        let mut bus = bus_with(0, &[0x29]);
        let mut state = state_at(0);
        state.regs.set_pair(RegisterPair::HL, 0x8001);
        state.regs.set_flag(FLAG_Z, true);

        step(&mut state, &mut bus).expect("mapped");

        assert_eq!(state.regs.pair(RegisterPair::HL), 0x0002);
        assert!(state.regs.flag_is_set(FLAG_CY));
        assert!(state.regs.flag_is_set(FLAG_Z));
    }

    #[test]
    fn conditional_call_costs_more_when_taken() {
        // CNZ 0x0010 twice: once with Z clear, once with Z set.
        let mut bus = bus_with(0, &[0xC4, 0x10, 0x00]);
        let mut state = state_at(0);

        let taken = step(&mut state, &mut bus).expect("mapped");
        assert_eq!(taken.cycles(), 17);
        assert_eq!(state.regs.pc(), 0x0010);
        assert_eq!(state.regs.sp(), STACK_TOP - 2);
        assert_eq!(bus.read(STACK_TOP - 2), Ok(0x03));

        let mut state = state_at(0);
        state.regs.set_flag(FLAG_Z, true);
        let skipped = step(&mut state, &mut bus).expect("mapped");
        assert_eq!(skipped.cycles(), 11);
        assert_eq!(state.regs.pc(), 3);
        assert_eq!(state.regs.sp(), STACK_TOP);
    }

    #[test]
    fn call_then_return_round_trips() {
        let mut bus = bus_with(0, &[0xCD, 0x10, 0x00]);
        bus.load(0x0010, &[0xC9]).expect("mapped");
        let mut state = state_at(0);

        step(&mut state, &mut bus).expect("call");
        let ret = step(&mut state, &mut bus).expect("ret");

        assert_eq!(ret.cycles(), 10);
        assert_eq!(state.regs.pc(), 3);
        assert_eq!(state.regs.sp(), STACK_TOP);
    }

    #[test]
    fn restart_pushes_next_pc() {
        let mut bus = bus_with(0x0100, &[0xFF]);
        let mut state = state_at(0x0100);

        step(&mut state, &mut bus).expect("mapped");

        assert_eq!(state.regs.pc(), 0x0038);
        assert_eq!(bus.read(STACK_TOP - 1), Ok(0x01));
        assert_eq!(bus.read(STACK_TOP - 2), Ok(0x01));
    }

    #[test]
    fn xthl_swaps_with_stack_top() {
        let mut bus = bus_with(0, &[0xE3]);
        bus.load(STACK_TOP, &[0x34, 0x12]).expect("mapped");
        let mut state = state_at(0);
        state.regs.set_pair(RegisterPair::HL, 0xBEEF);

        step(&mut state, &mut bus).expect("mapped");

        assert_eq!(state.regs.pair(RegisterPair::HL), 0x1234);
        assert_eq!(bus.read(STACK_TOP), Ok(0xEF));
        assert_eq!(bus.read(STACK_TOP + 1), Ok(0xBE));
    }

    #[test]
    fn pop_psw_normalises_flags() {
        let mut bus = bus_with(0, &[0xF1]);
        bus.load(STACK_TOP, &[0xFF, 0xAB]).expect("mapped");
        let mut state = state_at(0);

        step(&mut state, &mut bus).expect("mapped");

        assert_eq!(state.regs.a(), 0xAB);
        assert_eq!(state.regs.flags(), 0xD7);
        assert_eq!(state.regs.stack_pair(StackPair::PSW), 0xABD7);
    }

    #[test]
    fn port_io_uses_operand_byte() {
        // IN 0x10 ; OUT 0x20
        let mut bus = bus_with(0, &[0xDB, 0x10, 0xD3, 0x20]);
        let mut state = state_at(0);
        let mut ports = RecordingPorts {
            input: 0x77,
            written: Vec::new(),
        };
        let config = CoreConfig::default();

        step_one(&mut state, &mut bus, &mut ports, &mut NullTrace, &config).expect("in");
        step_one(&mut state, &mut bus, &mut ports, &mut NullTrace, &config).expect("out");

        assert_eq!(state.regs.a(), 0x77);
        assert_eq!(ports.written, vec![(0x20, 0x77)]);
    }

    #[test]
    fn halt_idles_one_cycle_without_moving_pc() {
        let mut bus = bus_with(0, &[0x76]);
        let mut state = state_at(0);

        step(&mut state, &mut bus).expect("hlt");
        assert_eq!(state.run_state, RunState::Halted);
        assert_eq!(state.regs.pc(), 1);

        let idle = step(&mut state, &mut bus).expect("idle");
        assert_eq!(idle, StepOutcome::Halted { cycles: 1 });
        assert_eq!(state.regs.pc(), 1);
        assert_eq!(state.cycles, 8);
    }

    #[test]
    fn halted_core_with_disabled_interrupts_stays_halted() {
        let mut bus = bus_with(0, &[0x76]);
        let mut state = state_at(0);
        step(&mut state, &mut bus).expect("hlt");
        state.pending_interrupt = Some(0x0038);

        let idle = step(&mut state, &mut bus).expect("idle");

        assert_eq!(idle, StepOutcome::Halted { cycles: 1 });
        assert_eq!(state.pending_interrupt, Some(0x0038));
    }

    #[test]
    fn interrupt_wakes_halted_core() {
        let mut bus = bus_with(0, &[0xFB, 0x76]);
        let mut state = state_at(0);
        step(&mut state, &mut bus).expect("ei");
        step(&mut state, &mut bus).expect("hlt");
        state.pending_interrupt = Some(0x0038);

        let outcome = step(&mut state, &mut bus).expect("interrupt entry");

        assert_eq!(
            outcome,
            StepOutcome::InterruptAccepted {
                vector: 0x0038,
                cycles: 11
            }
        );
        assert_eq!(state.run_state, RunState::Running);
        assert_eq!(state.regs.pc(), 0x0038);
        assert!(!state.interrupts_enabled);
        assert_eq!(state.pending_interrupt, None);
        assert_eq!(bus.read(STACK_TOP - 1), Ok(0x00));
        assert_eq!(bus.read(STACK_TOP - 2), Ok(0x02));
    }

    #[test]
    fn delayed_ei_waits_one_instruction() {
        let mut bus = bus_with(0, &[0xFB, 0x00, 0x00]);
        let mut state = state_at(0);
        let config = CoreConfig {
            delayed_interrupt_enable: true,
            ..CoreConfig::default()
        };
        let mut run = |state: &mut CoreState| {
            step_one(state, &mut bus, &mut NullPorts, &mut NullTrace, &config).expect("mapped")
        };

        run(&mut state);
        assert!(!state.interrupts_enabled);
        state.pending_interrupt = Some(0x0008);

        let after_next = run(&mut state);
        assert!(matches!(after_next, StepOutcome::Retired { opcode: 0x00, .. }));
        assert!(state.interrupts_enabled);

        let entry = run(&mut state);
        assert!(matches!(entry, StepOutcome::InterruptAccepted { vector: 0x0008, .. }));
    }

    #[test]
    fn di_cancels_delayed_ei() {
        let mut bus = bus_with(0, &[0xFB, 0xF3, 0x00]);
        let mut state = state_at(0);
        let config = CoreConfig {
            delayed_interrupt_enable: true,
            ..CoreConfig::default()
        };
        for _ in 0..3 {
            step_one(&mut state, &mut bus, &mut NullPorts, &mut NullTrace, &config)
                .expect("mapped");
        }
        assert!(!state.interrupts_enabled);
        assert!(!state.enable_interrupts_after_next);
    }

    #[test]
    fn faulting_push_commits_nothing() {
        // SP at 0x2001: the high byte lands in RAM, the low byte in protected ROM.
        let mut bus = bus_with(0, &[0xC5]);
        let mut state = state_at(0);
        state.regs.set_sp(0x2001);
        state.regs.set_pair(RegisterPair::BC, 0x1234);
        let before = state;

        let fault = step(&mut state, &mut bus).expect_err("low byte targets ROM");

        assert_eq!(
            fault,
            StepFault {
                pc: 0,
                phase: StepPhase::Execute,
                cause: BusFault::WriteToReadOnlyRegion { addr: 0x1FFF },
            }
        );
        assert_eq!(state, before);
        assert_eq!(bus.read(0x2000), Ok(0x00));
    }

    #[test]
    fn fetch_from_unmapped_memory_faults() {
        let mut bus = MemoryBus::default();
        let mut state = state_at(0x4000);

        let fault = step(&mut state, &mut bus).expect_err("unmapped");

        assert_eq!(fault.phase, StepPhase::Fetch);
        assert_eq!(
            fault.cause,
            BusFault::OutOfRangeAccess {
                addr: 0x4000,
                kind: AccessKind::Read,
            }
        );
        assert_eq!(state.cycles, 0);
    }

    #[test]
    fn interrupt_entry_fault_keeps_request_pending() {
        let mut bus = MemoryBus::default();
        let mut state = state_at(0);
        state.regs.set_sp(0x0010);
        state.interrupts_enabled = true;
        state.pending_interrupt = Some(0x0038);
        let before = state;

        let fault = step(&mut state, &mut bus).expect_err("stack in ROM");

        assert_eq!(fault.phase, StepPhase::InterruptEntry);
        assert_eq!(state, before);
    }

    #[test]
    fn trace_reports_commit_order() {
        let mut bus = bus_with(0, &[0xC5]);
        let mut state = state_at(0);
        state.regs.set_pair(RegisterPair::BC, 0x1234);
        let mut events: Vec<TraceEvent> = Vec::new();

        step_one(
            &mut state,
            &mut bus,
            &mut NullPorts,
            &mut events,
            &CoreConfig::default(),
        )
        .expect("mapped");

        assert_eq!(
            events,
            vec![
                TraceEvent::InstructionStart { pc: 0, opcode: 0xC5 },
                TraceEvent::MemoryWrite {
                    addr: STACK_TOP - 1,
                    value: 0x12
                },
                TraceEvent::MemoryWrite {
                    addr: STACK_TOP - 2,
                    value: 0x34
                },
                TraceEvent::InstructionRetired { pc: 0, cycles: 11 },
            ]
        );
    }

    #[test]
    fn two_queued_writes_fill_the_pending_slots() {
        let mut exec = ExecuteState::new(RegisterFile::default(), 4);
        exec.push_write(0x2000, 0x01);
        exec.push_write(0x2001, 0x02);

        assert_eq!(
            exec.writes,
            [
                Some(PendingWrite { addr: 0x2000, value: 0x01 }),
                Some(PendingWrite { addr: 0x2001, value: 0x02 }),
            ]
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "memory writes queued in one step")]
    fn queueing_past_the_pending_slots_is_caught() {
        let mut exec = ExecuteState::new(RegisterFile::default(), 4);
        exec.push_write(0x2000, 0x01);
        exec.push_write(0x2001, 0x02);
        exec.push_write(0x2002, 0x03);
    }
}
