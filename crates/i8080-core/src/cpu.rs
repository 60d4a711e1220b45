//! The processor: core state bound to the bus it executes against.

use crate::api::{
    CoreConfig, CoreSnapshot, CoreState, NullTrace, PortIo, RunBoundary, RunOutcome,
    SnapshotVersion, StepOutcome, TraceSink,
};
use crate::execute::step_one;
use crate::memory::{Bus, MemoryBus};
use crate::state::{Register, RegisterFile, RunState};
use crate::{MemoryMapError, StepFault};

/// An 8080 core that owns its bus.
///
/// Independent instances share nothing, so any number can run side by side.
#[derive(Debug, Clone)]
pub struct Cpu<B: Bus = MemoryBus> {
    state: CoreState,
    config: CoreConfig,
    bus: B,
}

impl Cpu<MemoryBus> {
    /// Builds a [`MemoryBus`] holding `image` and a core in power-on state.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryMapError`] when the image leaves no room for the working region.
    pub fn from_image(image: &[u8]) -> Result<Self, MemoryMapError> {
        Ok(Self::new(MemoryBus::new(image)?))
    }

    /// Builds bus and core from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryMapError`] when the configured regions do not fit the address space.
    pub fn with_config(image: Option<&[u8]>, config: &CoreConfig) -> Result<Self, MemoryMapError> {
        let bus = MemoryBus::with_config(image, &config.bus)?;
        Ok(Self::with_bus_and_config(bus, *config))
    }
}

impl<B: Bus> Cpu<B> {
    /// Binds a power-on core to `bus` with default configuration.
    #[must_use]
    pub fn new(bus: B) -> Self {
        Self::with_bus_and_config(bus, CoreConfig::default())
    }

    /// Binds a power-on core to `bus`.
    #[must_use]
    pub fn with_bus_and_config(bus: B, config: CoreConfig) -> Self {
        Self {
            state: CoreState::default(),
            config,
            bus,
        }
    }

    /// Executes one step with no trace sink.
    ///
    /// # Errors
    ///
    /// Returns a [`StepFault`] on a bus fault; the core is left as it was.
    pub fn execute_one(&mut self, ports: &mut dyn PortIo) -> Result<StepOutcome, StepFault> {
        self.execute_one_traced(ports, &mut NullTrace)
    }

    /// Executes one step, reporting events to `trace`.
    ///
    /// # Errors
    ///
    /// Returns a [`StepFault`] on a bus fault; the core is left as it was.
    pub fn execute_one_traced(
        &mut self,
        ports: &mut dyn PortIo,
        trace: &mut dyn TraceSink,
    ) -> Result<StepOutcome, StepFault> {
        step_one(&mut self.state, &mut self.bus, ports, trace, &self.config)
    }

    /// Steps until `boundary` is reached.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first [`StepFault`].
    pub fn run(
        &mut self,
        ports: &mut dyn PortIo,
        boundary: RunBoundary,
    ) -> Result<RunOutcome, StepFault> {
        self.run_traced(ports, &mut NullTrace, boundary)
    }

    /// Steps until `boundary` is reached, reporting events to `trace`.
    ///
    /// At least one step is always taken.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first [`StepFault`].
    pub fn run_traced(
        &mut self,
        ports: &mut dyn PortIo,
        trace: &mut dyn TraceSink,
        boundary: RunBoundary,
    ) -> Result<RunOutcome, StepFault> {
        let mut steps = 0u64;
        let mut cycles = 0u64;

        loop {
            let final_step = self.execute_one_traced(ports, trace)?;
            steps += 1;
            cycles += u64::from(final_step.cycles());

            let reached = match boundary {
                RunBoundary::Halted => {
                    self.state.run_state.is_halted() && !self.state.interrupt_serviceable()
                }
                RunBoundary::ProgramCounter(addr) => self.state.regs.pc() == addr,
                RunBoundary::Cycles(budget) => cycles >= budget,
            };
            if reached {
                return Ok(RunOutcome {
                    steps,
                    cycles,
                    final_step,
                });
            }
        }
    }

    /// Restores power-on state for registers and control; memory is kept.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Latches an interrupt request for `vector`. A later request replaces
    /// an earlier one that has not been serviced yet.
    pub const fn request_interrupt(&mut self, vector: u16) {
        self.state.pending_interrupt = Some(vector);
    }

    /// Requests an interrupt through restart `number` (vector `number * 8`).
    pub fn request_restart(&mut self, number: u8) {
        self.request_interrupt(u16::from(number & 0x07) * 8);
    }

    /// Vector of the latched interrupt request, if any.
    #[must_use]
    pub const fn pending_interrupt(&self) -> Option<u16> {
        self.state.pending_interrupt
    }

    /// Captures the core state.
    #[must_use]
    pub const fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            version: SnapshotVersion::V1,
            state: self.state,
        }
    }

    /// Replaces the core state with a snapshot's. Flag bits 1, 3 and 5 are
    /// re-normalised.
    pub const fn restore(&mut self, snapshot: &CoreSnapshot) {
        self.state = snapshot.state;
        let flags = self.state.regs.flags();
        self.state.regs.set_flags(flags);
    }

    /// Full core state.
    #[must_use]
    pub const fn state(&self) -> &CoreState {
        &self.state
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Register file.
    #[must_use]
    pub const fn registers(&self) -> &RegisterFile {
        &self.state.regs
    }

    /// Reads one 8-bit register.
    #[must_use]
    pub const fn register(&self, reg: Register) -> u8 {
        self.state.regs.get(reg)
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> u16 {
        self.state.regs.pc()
    }

    /// Stack pointer.
    #[must_use]
    pub const fn sp(&self) -> u16 {
        self.state.regs.sp()
    }

    /// Flag register.
    #[must_use]
    pub const fn flags(&self) -> u8 {
        self.state.regs.flags()
    }

    /// Cycles consumed since power-on or reset.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.state.cycles
    }

    /// Returns `true` while halted.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        matches!(self.state.run_state, RunState::Halted)
    }

    /// Interrupt-enable flip-flop.
    #[must_use]
    pub const fn interrupts_enabled(&self) -> bool {
        self.state.interrupts_enabled
    }

    /// Mutable register file, for drivers and test fixtures that preset state.
    pub const fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.state.regs
    }

    /// The bus.
    #[must_use]
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable bus access between steps.
    pub const fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Releases the bus.
    #[must_use]
    pub fn into_bus(self) -> B {
        self.bus
    }
}
