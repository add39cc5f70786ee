//! The front end for the Pascal-lite compiler and interpreter.
//!
//! Compiles the source, and if there are no errors, runs it. The exit
//! status is the total error count.

use ansi_term::Colour::Red;
use pascal_lite::mach::{Compiler, Machine};
use std::io::Read;
use std::process::exit;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn help(prog_name: &str) {
    eprintln!("Usage: {}: [options] [filename]", prog_name);
    eprintln!("Where options is zero or more of the following:");
    eprintln!("-?        Print this message and exit.");
    eprintln!("-help     Same as -?");
    eprintln!("-verbose  Set verbose mode.");
    eprintln!("-v        Same as -verbose.");
    eprintln!("-version  Print the program version.");
    eprintln!("-V        Same as -version.");
    eprintln!();
    eprintln!("filename  The name of the source file, or '-' or '' for standard input.");
}

struct Options {
    input_file: String,
    verbose: bool,
}

enum Parsed {
    Run(Options),
    /// Stop before compiling: 0 after printing usage, 1 on a command
    /// line error.
    Exit(i32),
}

fn parse_commandline(prog_name: &str, args: &[String]) -> Parsed {
    let mut options = Options {
        input_file: "-".to_string(),
        verbose: false,
    };
    for arg in args {
        if arg.is_empty() {
            continue;
        } else if arg == "-" {
            options.input_file = arg.clone();
        } else if arg == "-help" {
            help(prog_name);
            return Parsed::Exit(0);
        } else if arg == "-verbose" {
            options.verbose = true;
        } else if arg == "-version" {
            println!("{}: version: {}", prog_name, VERSION);
        } else if let Some(flags) = arg.strip_prefix('-') {
            for flag in flags.chars() {
                match flag {
                    '?' => {
                        help(prog_name);
                        return Parsed::Exit(0);
                    }
                    'v' => options.verbose = true,
                    'V' => println!("{}: version: {}", prog_name, VERSION),
                    other => {
                        eprintln!("{}: unknown command line parameter: -{}", prog_name, other);
                        return Parsed::Exit(1);
                    }
                }
            }
        } else {
            options.input_file = arg.clone();
        }
    }
    Parsed::Run(options)
}

fn read_source(input_file: &str) -> std::io::Result<String> {
    let mut source = String::new();
    if input_file == "-" {
        std::io::stdin().read_to_string(&mut source)?;
    } else {
        source = std::fs::read_to_string(input_file)?;
    }
    Ok(source)
}

fn main() {
    let mut args = std::env::args();
    let prog_name = args.next().unwrap_or_else(|| "p".to_string());
    let args: Vec<String> = args.collect();

    let options = match parse_commandline(&prog_name, &args) {
        Parsed::Run(options) => options,
        Parsed::Exit(code) => exit(code),
    };

    let source = match read_source(&options.input_file) {
        Ok(source) => source,
        Err(error) => {
            eprintln!(
                "{}: {}: cannot read '{}': {}",
                prog_name,
                Red.bold().paint("error"),
                options.input_file,
                error
            );
            exit(1);
        }
    };

    let program = match Compiler::compile(&source, options.verbose) {
        Ok(program) => program,
        Err(errors) => {
            for error in &errors {
                eprintln!("{}: {}: {}", prog_name, Red.bold().paint("error"), error);
            }
            exit(errors.len() as i32);
        }
    };

    if options.verbose {
        if options.input_file == "-" {
            println!(
                "{}: loading program from standard input, and starting P...",
                prog_name
            );
        } else {
            println!(
                "{}: loading program '{}', and starting P...",
                prog_name, options.input_file
            );
        }
    }

    let mut machine = Machine::default();
    machine.set_trace(options.verbose);
    let mut stdout = std::io::stdout();
    let status = match machine.run(&program, &mut stdout) {
        Ok(()) => 0,
        Err(fault) => {
            eprintln!(
                "{}: {}: {}!",
                prog_name,
                Red.bold().paint("runtime error"),
                fault
            );
            1
        }
    };

    if options.verbose {
        println!(
            "{}: Ending P after {} machine cycles",
            prog_name,
            machine.cycles()
        );
    }
    exit(status);
}
