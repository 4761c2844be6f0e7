//! # Lynxtask Demo
//!
//! Boots two tasks on a simulated Lynx and lets the timer interleave them.
//!
//! | Task | Entry   | Behavior                                   |
//! |------|---------|--------------------------------------------|
//! | 0    | `$0200` | writes `A` to the output port, forever     |
//! | 1    | `$0300` | writes `B` to the output port, forever     |
//!
//! Neither task ever yields; the output shows runs of `A` and `B` whose
//! length is set by the timer period. Set `LYNXTASK_LOG=trace` to see every
//! switch.

use log::{LevelFilter, Log, Metadata, Record};

use lynxtask::arch::bus::{Bus, Ram};
use lynxtask::arch::opcode as op;
use lynxtask::config::KernelConfig;
use lynxtask::kernel::Kernel;

/// Byte-wide output port; every write lands in the transcript.
const OUTPUT_PORT: u16 = 0xFDA0;

const TASK_A: u16 = 0x0200;
const TASK_B: u16 = 0x0300;

/// RAM with one write-only output port mapped in.
struct LynxBus {
    ram: Ram,
    transcript: String,
}

impl Bus for LynxBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.ram.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        if addr == OUTPUT_PORT {
            self.transcript.push(value as char);
        } else {
            self.ram.write(addr, value);
        }
    }
}

struct StdoutLogger;

impl Log for StdoutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            println!("[{:>5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StdoutLogger = StdoutLogger;

/// `LDA #marker ; STA OUTPUT_PORT ; JMP origin`
fn writer_task(origin: u16, marker: u8) -> [u8; 8] {
    [
        op::LDA_IMM,
        marker,
        op::STA_ABS,
        OUTPUT_PORT as u8,
        (OUTPUT_PORT >> 8) as u8,
        op::JMP_ABS,
        origin as u8,
        (origin >> 8) as u8,
    ]
}

fn main() -> Result<(), lynxtask::Error> {
    let level = std::env::var("LYNXTASK_LOG")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(LevelFilter::Info);
    if let Err(err) = log::set_logger(&LOGGER).map(|()| log::set_max_level(level)) {
        eprintln!("logging disabled: {}", err);
    }

    let mut ram = Ram::new();
    ram.load(TASK_A, &writer_task(TASK_A, b'A'));
    ram.load(TASK_B, &writer_task(TASK_B, b'B'));
    let bus = LynxBus {
        ram,
        transcript: String::new(),
    };

    let config = KernelConfig {
        timer_period: 30,
        ..KernelConfig::default()
    };
    let mut kernel: Kernel<LynxBus> = Kernel::new(bus, config)?;
    kernel.create_task(TASK_A)?;
    kernel.create_task(TASK_B)?;
    kernel.start(0)?;

    let switches = kernel.run(600)?;

    println!("{} switches", switches);
    for line in kernel.bus().transcript.as_bytes().chunks(60) {
        println!("{}", String::from_utf8_lossy(line));
    }
    Ok(())
}
