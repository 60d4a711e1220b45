#![no_main]

use i8080_core::{
    disassemble_one, BusConfig, CoreConfig, Cpu, Decoder, NullPorts, PortIo, RunBoundary,
};
use libfuzzer_sys::fuzz_target;

struct EchoPorts;

impl PortIo for EchoPorts {
    fn port_in(&mut self, port: u8) -> u8 {
        port
    }

    fn port_out(&mut self, _port: u8, _value: u8) {}
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let working = usize::from(u16::from_le_bytes([data[0], data[1]]));
    let flags = data[2];
    let image = &data[3..];

    let config = CoreConfig {
        bus: BusConfig {
            working_region_bytes: working,
            program_write_enable: flags & 0x01 != 0,
            ..BusConfig::default()
        },
        delayed_interrupt_enable: flags & 0x02 != 0,
    };
    let Ok(mut cpu) = Cpu::with_config(Some(image), &config) else {
        return;
    };

    for addr in 0..image.len().min(16) {
        let Ok(addr) = u16::try_from(addr) else {
            break;
        };
        let _ = Decoder::decode(cpu.bus(), addr);
        let _ = disassemble_one(cpu.bus(), addr);
    }

    if flags & 0x04 != 0 {
        cpu.request_restart(flags >> 5);
    }
    let _ = cpu.run(&mut EchoPorts, RunBoundary::Cycles(4096));
    let _ = cpu.execute_one(&mut NullPorts);
});
