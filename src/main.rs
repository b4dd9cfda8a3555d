//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run a `.ls8` program image
//! - `ls8-emu disasm <program>` - Disassemble a program image

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator for the LS-8 8-bit register machine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 image to execute
        program: String,
        /// Maximum number of cycles to run (default: 10000)
        #[arg(short, long, default_value = "10000")]
        max_cycles: u64,
        /// Show a trace line before every instruction
        #[arg(short, long)]
        trace: bool,
        /// Dump the final machine state as JSON
        #[arg(long)]
        dump_state: bool,
    },
    /// Disassemble a program image to readable text
    Disasm {
        /// Path to the .ls8 image
        program: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            program,
            max_cycles,
            trace,
            dump_state,
        } => {
            run_program(&program, max_cycles, trace, dump_state);
        }
        Commands::Disasm { program } => {
            disassemble_file(&program);
        }
    }
}

fn run_program(path: &str, max_cycles: u64, trace: bool, dump_state: bool) {
    use ls8::{load_image, Cpu};

    let image = match load_image(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("failed to load {}: {}", path, e);
            std::process::exit(1);
        }
    };

    if image.is_empty() {
        eprintln!("no instructions to execute in {}", path);
        std::process::exit(1);
    }

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&image.bytes) {
        eprintln!("failed to load program: {}", e);
        std::process::exit(1);
    }

    let mut cycles = 0u64;
    while cpu.is_running() && cycles < max_cycles {
        if trace {
            eprintln!("{}", cpu.trace());
        }

        let pc = cpu.pc;
        if let Err(e) = cpu.step() {
            for line in cpu.take_output() {
                println!("{}", line);
            }
            eprintln!("CPU error at PC={}: {}", pc, e);
            std::process::exit(1);
        }

        // Stream PRN output as it appears
        for line in cpu.take_output() {
            println!("{}", line);
        }

        cycles += 1;
    }

    if cycles >= max_cycles && cpu.is_running() {
        eprintln!(
            "reached max cycles limit ({}), use --max-cycles to increase",
            max_cycles
        );
        std::process::exit(1);
    }

    if dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("failed to serialize machine state: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn disassemble_file(path: &str) {
    use ls8::{disassemble, load_image};

    let image = match load_image(path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("failed to load {}: {}", path, e);
            std::process::exit(1);
        }
    };

    print!("{}", disassemble(&image.bytes));
}
