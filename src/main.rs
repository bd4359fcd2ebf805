// tamarin - A small scripting language with a bytecode compiler and stack VM
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use tamarin_parser::Parser;
use tamarin_vm::{Compiler, SymbolTable, VM, Value};

const PROMPT: &str = ">> ";

fn main() {
    let args: Vec<String> = env::args().collect();

    // Handle --version flag
    if args.len() == 2 && (args[1] == "--version" || args[1] == "-v") {
        println!("Tamarin v0.1.0");
        return;
    }

    // If files provided, run them; otherwise start the REPL
    if args.len() > 1 {
        run_files(&args[1..]);
    } else {
        run_repl();
    }
}

/// Compile and run a sequence of source files
fn run_files(files: &[String]) {
    for file_path in files {
        if let Err(e) = run_file(file_path) {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

/// Compile and run a single source file
fn run_file(file_path: &str) -> Result<(), String> {
    let path = Path::new(file_path);

    match path.extension().and_then(|e| e.to_str()) {
        Some("tam") => {}
        Some(ext) => {
            return Err(format!(
                "Error: unsupported file extension '.{}' for '{}'",
                ext, file_path
            ));
        }
        None => {
            return Err(format!(
                "Error: file '{}' has no extension (expected .tam)",
                file_path
            ));
        }
    }

    let source =
        fs::read_to_string(path).map_err(|e| format!("Error reading '{}': {}", file_path, e))?;

    let bytecode = tamarin_vm::compile(&source)
        .map_err(|e| format!("Error in '{}': {}", file_path, e))?;
    tamarin_vm::run(bytecode)
        .map(|_| ())
        .map_err(|e| format!("Error in '{}': {}", file_path, e))
}

/// Run the interactive REPL. Definitions persist across lines: the symbol
/// table, constants pool and globals array are threaded through every
/// compile/run cycle.
fn run_repl() {
    println!("Tamarin v0.1.0");

    let mut symbols = SymbolTable::new();
    for (index, builtin) in tamarin_vm::BUILTINS.iter().enumerate() {
        symbols.define_builtin(index, builtin.name);
    }
    let mut constants: Vec<Value> = Vec::new();
    let mut globals: Vec<Value> = Vec::new();

    loop {
        print!("{}", PROMPT);
        if io::stdout().flush().is_err() {
            break;
        }

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let line = input.trim();
                if line.is_empty() {
                    continue;
                }

                let program = match Parser::parse_source(line) {
                    Ok(program) => program,
                    Err(errors) => {
                        println!("Woops! Parser errors:");
                        for error in &errors {
                            println!("\t{}", error);
                        }
                        continue;
                    }
                };

                let mut compiler = Compiler::with_state(
                    std::mem::take(&mut symbols),
                    std::mem::take(&mut constants),
                );
                if let Err(e) = compiler.compile(&program) {
                    (symbols, constants) = compiler.into_state();
                    println!("Compilation error:\n {}", e);
                    continue;
                }
                let bytecode = compiler.bytecode();
                (symbols, constants) = compiler.into_state();

                let mut vm = VM::with_globals(bytecode, std::mem::take(&mut globals));
                match vm.run() {
                    Ok(()) => {
                        let residue = vm.last_popped();
                        globals = vm.into_globals();
                        println!("{}", residue);
                    }
                    Err(e) => {
                        globals = vm.into_globals();
                        println!("Bytecode execution error:\n {}", e);
                    }
                }
            }
            Err(e) => {
                eprintln!("Read error: {}", e);
                break;
            }
        }
    }
}
