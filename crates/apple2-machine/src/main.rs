//! Apple II-class machine CLI: runs a BASIC program file against a real
//! [`Machine`], or drops into an interactive line-at-a-time prompt when no
//! program is given.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use apple2_machine::{Machine, MachineIoPort};
use basic_interp::Interpreter;
use basic_lang::{parse_immediate, parse_program, Statement};

struct CliArgs {
    program_path: Option<PathBuf>,
    rom_path: Option<PathBuf>,
    seed: Option<u64>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        program_path: None,
        rom_path: None,
        seed: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--program" => {
                i += 1;
                cli.program_path = args.get(i).map(PathBuf::from);
            }
            "--rom" => {
                i += 1;
                cli.rom_path = args.get(i).map(PathBuf::from);
            }
            "--seed" => {
                i += 1;
                cli.seed = args.get(i).and_then(|s| s.parse().ok());
            }
            "--help" | "-h" => {
                eprintln!("Usage: apple2-machine [OPTIONS]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --program <file>   Run a BASIC program file and exit");
                eprintln!("  --rom <file>       Load a system ROM image ($D000-$FFFF)");
                eprintln!("  --seed <n>         Seed RND for reproducible runs");
                eprintln!();
                eprintln!("With no --program, reads numbered or immediate BASIC lines from stdin.");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(3);
            }
        }
        i += 1;
    }

    cli
}

/// Exit codes, per the machine's documented CLI contract: 0 success, 1
/// BASIC runtime error, 2 lexer/parser error, 3 machine configuration
/// error, 64+ internal error.
mod exit_code {
    pub const RUNTIME_ERROR: i32 = 1;
    pub const PARSE_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
}

fn build_machine(cli: &CliArgs) -> Machine {
    let mut machine = Machine::new();
    if let Some(path) = &cli.rom_path {
        match fs::read(path) {
            Ok(bytes) => {
                if let Err(e) = machine.load_system_rom(&bytes) {
                    eprintln!("ROM load error: {e}");
                    process::exit(exit_code::CONFIG_ERROR);
                }
            }
            Err(e) => {
                eprintln!("Failed to read ROM file {}: {e}", path.display());
                process::exit(exit_code::CONFIG_ERROR);
            }
        }
    }
    machine.reset();
    machine
}

/// Runs a whole program file to completion. A line that never parsed is a
/// load-time configuration problem for a script invocation (there is no
/// prompt to fix it at), so unlike the interactive path this checks for
/// `Statement::Unparsed` up front rather than waiting for the interpreter
/// to trip over it mid-run.
fn run_program(cli: &CliArgs, source: &str) -> ! {
    let lines = parse_program(source);
    for line in &lines {
        for statement in &line.statements {
            if let Statement::Unparsed(message) = statement {
                eprintln!("?SYNTAX ERROR IN {}: {message}", line.number);
                process::exit(exit_code::PARSE_ERROR);
            }
        }
    }

    let mut interpreter = Interpreter::from_lines(lines);
    if let Some(seed) = cli.seed {
        interpreter.seed_rng(seed);
    }

    let mut machine = build_machine(cli);
    let mut io = MachineIoPort::new(&mut machine);
    match interpreter.run(&mut io) {
        Ok(()) => process::exit(0),
        Err(err) => {
            println!("{err}");
            process::exit(exit_code::RUNTIME_ERROR);
        }
    }
}

/// Interactive mode: a numbered line (`10 PRINT X`) is stored into the
/// program without running it, matching a real Applesoft prompt; anything
/// else is parsed as an immediate statement and executed at once against
/// the program and variables already in memory.
fn run_repl(cli: &CliArgs) -> ! {
    let mut interpreter = Interpreter::from_lines(Vec::new());
    if let Some(seed) = cli.seed {
        interpreter.seed_rng(seed);
    }
    let mut machine = build_machine(cli);

    loop {
        print!("] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => process::exit(0),
            Ok(_) => {}
            Err(_) => process::exit(0),
        }
        let input = input.trim_end_matches(['\n', '\r']);
        if input.trim().is_empty() {
            continue;
        }

        let starts_with_digit = input.trim_start().starts_with(|c: char| c.is_ascii_digit());

        if starts_with_digit {
            match basic_lang::parse_line(input) {
                Ok(line) => interpreter.set_line(line),
                Err(e) => println!("{e}"),
            }
            continue;
        }

        match parse_immediate(input, 0) {
            Ok(statements) => {
                let mut io_port = MachineIoPort::new(&mut machine);
                if let Err(e) = interpreter.run_immediate(&statements, &mut io_port) {
                    println!("{e}");
                }
            }
            Err(e) => println!("{e}"),
        }
    }
}

fn main() {
    let cli = parse_args();

    let source = match &cli.program_path {
        Some(path) => match fs::read_to_string(path) {
            Ok(s) => Some(s),
            Err(e) => {
                eprintln!("Failed to read program file {}: {e}", path.display());
                process::exit(exit_code::CONFIG_ERROR);
            }
        },
        None => None,
    };

    match source {
        Some(source) => run_program(&cli, &source),
        None => run_repl(&cli),
    }
}
