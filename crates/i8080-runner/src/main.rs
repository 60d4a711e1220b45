//! Reference driver loop for the i8080 core.

use std::env;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use i8080_core::{
    disassemble_one, BusConfig, CoreConfig, Cpu, DisassemblyRow, NullPorts, RegisterFile,
    StepFault, StepOutcome, TraceEvent, TraceSink, FLAG_AC, FLAG_CY, FLAG_P, FLAG_S, FLAG_Z,
};
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: i8080-run <image> [options]

Loads a raw program image at address 0 and runs it until the core halts
with no serviceable interrupt, or until a chosen boundary is reached.

Options:
  --until <addr>        Stop when PC reaches <addr>
  --cycles <n>          Stop once <n> cycles have been consumed
  --irq-period <n>      Request an interrupt every <n> cycles
  --irq-vector <addr>   Vector for periodic interrupts (default: 0x0038)
  --working <bytes>     Working region size (default: 8192)
  --writable-program    Allow stores into the program region
  --delayed-ei          EI takes effect after the following instruction
  --trace               Print each instruction and memory effect to stderr
  -h, --help            Show this help message

Numbers accept decimal or a 0x prefix.

Examples:
  i8080-run program.bin
  i8080-run program.bin --until 0x0100 --trace
  i8080-run invaders.rom --cycles 2000000 --irq-period 16667 --irq-vector 0x0010
";

const DEFAULT_IRQ_VECTOR: u16 = 0x0038;

#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    image: PathBuf,
    until: Option<u16>,
    cycles: Option<u64>,
    irq_period: Option<u64>,
    irq_vector: u16,
    working_bytes: Option<usize>,
    writable_program: bool,
    delayed_ei: bool,
    trace: bool,
}

#[derive(Debug)]
enum ParseResult {
    Run(RunArgs),
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Halted,
    ReachedAddress(u16),
    CycleBudget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunSummary {
    reason: StopReason,
    steps: u64,
    cycles: u64,
    interrupts: u64,
}

fn parse_number(text: &str) -> Result<u64, String> {
    let parsed = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")).map_or_else(
        || text.parse::<u64>(),
        |hex| u64::from_str_radix(hex, 16),
    );
    parsed.map_err(|_| format!("invalid number: {text}"))
}

fn parse_address(text: &str) -> Result<u16, String> {
    let value = parse_number(text)?;
    u16::try_from(value).map_err(|_| format!("address out of range: {text}"))
}

fn option_value(
    flag: &str,
    args: &mut impl Iterator<Item = OsString>,
) -> Result<String, String> {
    args.next()
        .map(|value| value.to_string_lossy().to_string())
        .ok_or_else(|| format!("missing value for {flag}"))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut image: Option<PathBuf> = None;
    let mut parsed = RunArgs {
        image: PathBuf::new(),
        until: None,
        cycles: None,
        irq_period: None,
        irq_vector: DEFAULT_IRQ_VECTOR,
        working_bytes: None,
        writable_program: false,
        delayed_ei: false,
        trace: false,
    };

    while let Some(arg) = args.next() {
        let flag = arg.to_string_lossy().to_string();
        match flag.as_str() {
            "-h" | "--help" => return Ok(ParseResult::Help),
            "--until" => parsed.until = Some(parse_address(&option_value(&flag, &mut args)?)?),
            "--cycles" => parsed.cycles = Some(parse_number(&option_value(&flag, &mut args)?)?),
            "--irq-period" => {
                let period = parse_number(&option_value(&flag, &mut args)?)?;
                if period == 0 {
                    return Err("--irq-period must be greater than zero".to_string());
                }
                parsed.irq_period = Some(period);
            }
            "--irq-vector" => {
                parsed.irq_vector = parse_address(&option_value(&flag, &mut args)?)?;
            }
            "--working" => {
                let bytes = parse_number(&option_value(&flag, &mut args)?)?;
                let bytes = usize::try_from(bytes).map_err(|_| "working size too large")?;
                parsed.working_bytes = Some(bytes);
            }
            "--writable-program" => parsed.writable_program = true,
            "--delayed-ei" => parsed.delayed_ei = true,
            "--trace" => parsed.trace = true,
            other if other.starts_with('-') => return Err(format!("unknown option: {other}")),
            _ => {
                if image.is_some() {
                    return Err("multiple image paths provided".to_string());
                }
                image = Some(PathBuf::from(arg));
            }
        }
    }

    parsed.image = image.ok_or_else(|| "missing image path".to_string())?;
    Ok(ParseResult::Run(parsed))
}

impl RunArgs {
    fn core_config(&self) -> CoreConfig {
        let defaults = BusConfig::default();
        CoreConfig {
            bus: BusConfig {
                working_region_bytes: self.working_bytes.unwrap_or(defaults.working_region_bytes),
                program_write_enable: self.writable_program,
                ..defaults
            },
            delayed_interrupt_enable: self.delayed_ei,
        }
    }
}

/// Prints instructions and their side effects to stderr.
///
/// The row for the next instruction is staged by the driver before each
/// step, since the bus is not reachable from inside the step.
#[derive(Default)]
struct StderrTrace {
    staged: Option<DisassemblyRow>,
}

impl TraceSink for StderrTrace {
    fn on_event(&mut self, event: TraceEvent) {
        match event {
            TraceEvent::InstructionStart { .. } => {
                if let Some(row) = self.staged.take() {
                    eprintln!("{row}");
                }
            }
            TraceEvent::InstructionRetired { .. } => {}
            TraceEvent::MemoryWrite { addr, value } => {
                eprintln!("      [{addr:04X}] <- {value:02X}");
            }
            TraceEvent::PortWrite { port, value } => {
                eprintln!("      port {port:02X} <- {value:02X}");
            }
            TraceEvent::InterruptAccepted { vector, return_pc } => {
                eprintln!("---- interrupt -> {vector:04X} (return {return_pc:04X})");
            }
            TraceEvent::Fault { pc, fault } => {
                eprintln!("---- fault at {pc:04X}: {fault}");
            }
        }
    }
}

fn drive(
    cpu: &mut Cpu,
    args: &RunArgs,
    trace: &mut StderrTrace,
) -> Result<RunSummary, StepFault> {
    let mut summary = RunSummary {
        reason: StopReason::Halted,
        steps: 0,
        cycles: 0,
        interrupts: 0,
    };
    let mut since_irq = 0u64;

    loop {
        if let Some(period) = args.irq_period {
            if since_irq >= period {
                since_irq -= period;
                cpu.request_interrupt(args.irq_vector);
            }
        }

        if args.trace {
            trace.staged = disassemble_one(cpu.bus(), cpu.pc()).ok();
        }
        let outcome = cpu.execute_one_traced(&mut NullPorts, trace)?;
        let cycles = u64::from(outcome.cycles());
        summary.steps += 1;
        summary.cycles += cycles;
        since_irq += cycles;
        if matches!(outcome, StepOutcome::InterruptAccepted { .. }) {
            summary.interrupts += 1;
        }

        if args.until == Some(cpu.pc()) {
            summary.reason = StopReason::ReachedAddress(cpu.pc());
            return Ok(summary);
        }
        if args.cycles.is_some_and(|budget| summary.cycles >= budget) {
            summary.reason = StopReason::CycleBudget;
            return Ok(summary);
        }
        let wakeable = args.irq_period.is_some() && cpu.interrupts_enabled();
        if cpu.is_halted() && !wakeable && !cpu.state().interrupt_serviceable() {
            summary.reason = StopReason::Halted;
            return Ok(summary);
        }
    }
}

fn flag_string(flags: u8) -> String {
    [
        (FLAG_S, 'S'),
        (FLAG_Z, 'Z'),
        (FLAG_AC, 'A'),
        (FLAG_P, 'P'),
        (FLAG_CY, 'C'),
    ]
    .iter()
    .map(|&(mask, name)| if flags & mask == 0 { '-' } else { name })
    .collect()
}

fn format_registers(regs: &RegisterFile) -> String {
    use i8080_core::Register;

    let mut line = String::new();
    for reg in Register::ALL {
        let _ = write!(line, "{}={:02X} ", reg.name(), regs.get(reg));
    }
    let _ = write!(
        line,
        "SP={:04X} PC={:04X} F={:02X} [{}]",
        regs.sp(),
        regs.pc(),
        regs.flags(),
        flag_string(regs.flags())
    );
    line
}

fn report(cpu: &Cpu, summary: &RunSummary) {
    let reason = match summary.reason {
        StopReason::Halted => "halted".to_string(),
        StopReason::ReachedAddress(addr) => format!("reached 0x{addr:04X}"),
        StopReason::CycleBudget => "cycle budget exhausted".to_string(),
    };
    println!(
        "{reason} after {} steps, {} cycles, {} interrupts",
        summary.steps, summary.cycles, summary.interrupts
    );
    println!("{}", format_registers(cpu.registers()));
}

fn run(args: &RunArgs) -> Result<(), i32> {
    let image = match fs::read(&args.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", args.image.display());
            return Err(1);
        }
    };

    let mut cpu = match Cpu::with_config(Some(&image), &args.core_config()) {
        Ok(cpu) => cpu,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };

    let mut trace = StderrTrace::default();
    match drive(&mut cpu, args, &mut trace) {
        Ok(summary) => {
            report(&cpu, &summary);
            Ok(())
        }
        Err(fault) => {
            eprintln!("error: {fault}");
            println!("{}", format_registers(cpu.registers()));
            Err(2)
        }
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Run(args)) => match run(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use i8080_core::{MemoryBus, RegisterPair};

    fn args_of(list: &[&str]) -> Result<ParseResult, String> {
        parse_args(list.iter().map(OsString::from))
    }

    fn run_args(list: &[&str]) -> RunArgs {
        match args_of(list).expect("valid args should parse") {
            ParseResult::Run(args) => args,
            ParseResult::Help => panic!("unexpected help"),
        }
    }

    #[test]
    fn parses_full_option_set() {
        let args = run_args(&[
            "rom.bin",
            "--until",
            "0x0100",
            "--cycles",
            "5000",
            "--irq-period",
            "0x400",
            "--irq-vector",
            "16",
            "--working",
            "1024",
            "--writable-program",
            "--delayed-ei",
            "--trace",
        ]);

        assert_eq!(
            args,
            RunArgs {
                image: PathBuf::from("rom.bin"),
                until: Some(0x0100),
                cycles: Some(5000),
                irq_period: Some(0x400),
                irq_vector: 0x0010,
                working_bytes: Some(1024),
                writable_program: true,
                delayed_ei: true,
                trace: true,
            }
        );
    }

    #[test]
    fn defaults_without_options() {
        let args = run_args(&["rom.bin"]);
        assert_eq!(args.irq_vector, DEFAULT_IRQ_VECTOR);
        assert_eq!(args.core_config(), CoreConfig::default());
    }

    #[test]
    fn parses_help_flag() {
        assert!(matches!(args_of(&["-h"]), Ok(ParseResult::Help)));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(args_of(&[]).expect_err("no image").contains("missing image"));
        assert!(args_of(&["a", "b"]).expect_err("two images").contains("multiple"));
        assert!(args_of(&["a", "--bogus"]).expect_err("bad flag").contains("unknown option"));
        assert!(args_of(&["a", "--until"]).expect_err("no value").contains("missing value"));
        assert!(args_of(&["a", "--until", "0x10000"])
            .expect_err("too wide")
            .contains("out of range"));
        assert!(args_of(&["a", "--cycles", "lots"])
            .expect_err("not a number")
            .contains("invalid number"));
        assert!(args_of(&["a", "--irq-period", "0"]).is_err());
    }

    #[test]
    fn flag_string_marks_set_flags() {
        assert_eq!(flag_string(0x02), "-----");
        assert_eq!(flag_string(FLAG_Z | FLAG_P | 0x02), "-Z-P-");
        assert_eq!(flag_string(0xD7), "SZAPC");
    }

    #[test]
    fn register_line_lists_every_register() {
        let mut regs = RegisterFile::default();
        regs.set_pair(RegisterPair::HL, 0xBEEF);
        regs.set_sp(0x2400);
        let line = format_registers(&regs);
        assert!(line.starts_with("B=00 C=00 D=00 E=00 H=BE L=EF A=00 "));
        assert!(line.ends_with("SP=2400 PC=0000 F=02 [-----]"));
    }

    #[test]
    fn drive_stops_when_halted() {
        let mut cpu = Cpu::new(MemoryBus::new(&[0x3E, 0x07, 0x76]).expect("valid image"));
        let args = run_args(&["rom.bin"]);

        let summary = drive(&mut cpu, &args, &mut StderrTrace::default()).expect("mapped");

        assert_eq!(summary.reason, StopReason::Halted);
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.cycles, 14);
    }

    #[test]
    fn periodic_interrupts_wake_a_halted_core() {
        // 0000: LXI SP,0x2400 ; EI ; HLT ; JMP 0x0004
        // 0008: INR B ; EI ; RET
        let mut image = vec![0x31, 0x00, 0x24, 0xFB, 0x76, 0xC3, 0x04, 0x00];
        image.extend_from_slice(&[0x04, 0xFB, 0xC9]);
        let mut cpu = Cpu::new(MemoryBus::new(&image).expect("valid image"));
        let args = run_args(&[
            "rom.bin",
            "--irq-period",
            "100",
            "--irq-vector",
            "8",
            "--cycles",
            "1000",
        ]);

        let summary = drive(&mut cpu, &args, &mut StderrTrace::default()).expect("mapped");

        assert_eq!(summary.reason, StopReason::CycleBudget);
        assert!(summary.interrupts >= 5);
        // The budget may run out between an interrupt entry and its INR B.
        let serviced = u64::from(cpu.registers().get(i8080_core::Register::B));
        assert!(serviced == summary.interrupts || serviced + 1 == summary.interrupts);
    }
}
