use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use wren_cpu::{Cpu, Device};
use wren_isa::{flag, Register, PROGRAM_BASE};

/// Assembler and emulator for the wren 16-bit computer
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Assemble a source file into a flat binary image
    Assemble {
        /// Assembly source
        input: PathBuf,
        /// Output image
        output: PathBuf,
    },
    /// Load a binary image at 0x0100 and run it to halt
    Run {
        /// Binary image
        image: PathBuf,
    },
    /// Run a binary image, dumping registers before and after
    Debug {
        /// Binary image
        image: PathBuf,
    },
    /// Single-step a binary image, printing per-cycle state
    Trace {
        /// Binary image
        image: PathBuf,
    },
    /// Assemble a source file and immediately run it
    AsmRun {
        /// Assembly source
        source: PathBuf,
    },
    /// Assemble a source file, then run with register dumps
    AsmDebug {
        /// Assembly source
        source: PathBuf,
    },
}

/// Console device wired to the host streams
///
/// Output is flushed after every byte so program output interleaves
/// deterministically with anything else the host prints.
struct HostConsole;

impl Device for HostConsole {
    fn input(&mut self) -> u8 {
        let mut buf = [0u8; 1];
        match std::io::stdin().lock().read(&mut buf) {
            Ok(0) | Err(_) => 0, // end of input reads as 0
            Ok(_) => buf[0],
        }
    }

    fn output(&mut self, byte: u8) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(&[byte]);
        let _ = out.flush();
    }
}

fn main() -> Result<()> {
    let env = env_logger::Env::default()
        .filter_or("WREN_LOG", "info")
        .write_style_or("WREN_LOG_STYLE", "always");
    env_logger::init_from_env(env);

    let args = Args::parse();
    match args.cmd {
        Cmd::Assemble { input, output } => cmd_assemble(&input, &output),
        Cmd::Run { image } => cmd_run(&image, false),
        Cmd::Debug { image } => cmd_run(&image, true),
        Cmd::Trace { image } => cmd_trace(&image),
        Cmd::AsmRun { source } => cmd_asm_run(&source, false),
        Cmd::AsmDebug { source } => cmd_asm_run(&source, true),
    }
}

fn assemble_file(path: &Path) -> Result<Vec<u8>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {path:?}"))?;
    info!("assembling {path:?}");
    let image = wren_asm::assemble(&source)?;
    info!("assembled {} bytes", image.len());
    Ok(image)
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    let mut f = std::fs::File::open(path)
        .with_context(|| format!("failed to open {path:?}"))?;
    let mut image = vec![];
    f.read_to_end(&mut image).context("failed to read file")?;
    Ok(image)
}

fn boot(image: &[u8]) -> Result<Cpu> {
    let mut cpu = Cpu::new();
    cpu.load_program(image, PROGRAM_BASE)?;
    Ok(cpu)
}

fn cmd_assemble(input: &Path, output: &Path) -> Result<()> {
    let image = assemble_file(input)?;
    std::fs::write(output, &image)
        .with_context(|| format!("failed to write {output:?}"))?;
    info!("wrote {output:?}");
    Ok(())
}

fn cmd_run(path: &Path, debug: bool) -> Result<()> {
    let image = read_image(path)?;
    exec(&image, debug)
}

fn cmd_asm_run(path: &Path, debug: bool) -> Result<()> {
    let image = assemble_file(path)?;
    exec(&image, debug)
}

fn exec(image: &[u8], debug: bool) -> Result<()> {
    let mut cpu = boot(image)?;
    if debug {
        dump_registers(&cpu);
    }
    let result = cpu.run(&mut HostConsole);
    if debug {
        dump_registers(&cpu);
        info!("program halted after {} cycles", cpu.cycles());
    }
    result?;
    Ok(())
}

fn cmd_trace(path: &Path) -> Result<()> {
    let image = read_image(path)?;
    let mut cpu = boot(&image)?;
    let mut console = HostConsole;
    while !cpu.halted() {
        println!(
            "CYC={:10} PC={:04X} A={:04X} B={:04X} C={:04X} D={:04X}",
            cpu.cycles(),
            cpu.reg(Register::Pc),
            cpu.reg(Register::A),
            cpu.reg(Register::B),
            cpu.reg(Register::C),
            cpu.reg(Register::D),
        );
        cpu.step(&mut console)?;
    }
    println!("total cycles: {}", cpu.cycles());
    Ok(())
}

fn dump_registers(cpu: &Cpu) {
    println!("=== registers ===");
    for r in [Register::A, Register::B, Register::C, Register::D] {
        println!("{}:  {:#06X} ({})", r.name(), cpu.reg(r), cpu.reg(r));
    }
    println!("SP: {:#06X}", cpu.reg(Register::Sp));
    println!("PC: {:#06X}", cpu.reg(Register::Pc));
    println!(
        "FLAGS: [{}{}{}{}] ({:#04X})",
        if cpu.flag(flag::Z) { 'Z' } else { '-' },
        if cpu.flag(flag::C) { 'C' } else { '-' },
        if cpu.flag(flag::N) { 'N' } else { '-' },
        if cpu.flag(flag::O) { 'O' } else { '-' },
        cpu.flags(),
    );
    println!("cycles: {}", cpu.cycles());
}
