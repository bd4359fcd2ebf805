// tamarin-vm - Bytecode compiler and virtual machine for the Tamarin programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # tamarin-vm
//!
//! Bytecode compiler and stack-based virtual machine for Tamarin.
//! Source code is compiled to packed byte instructions plus a constants
//! pool, then executed by a frame-based VM with closures.
//!
//! The one-shot pipeline is [`compile`] followed by [`run`]; a REPL keeps
//! state across cycles with [`Compiler::with_state`] and
//! [`VM::with_globals`].

pub mod builtins;
pub mod code;
pub mod compiler;
pub mod opcode;
pub mod value;
pub mod vm;

use std::fmt;

use tamarin_parser::{ParseError, Parser};

pub use builtins::BUILTINS;
pub use code::{Instructions, make, read_operands};
pub use compiler::symbols::{Symbol, SymbolScope, SymbolTable};
pub use compiler::{Bytecode, CompileError, Compiler};
pub use opcode::{Definition, Opcode};
pub use value::{Builtin, Closure, CompiledFn, HashKey, HashKind, MapPair, Value};
pub use vm::{GLOBALS_SIZE, MAX_FRAMES, RuntimeError, STACK_SIZE, VM};

/// Why a source string failed to become bytecode.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileErrors {
    /// The parser rejected the input. Every recorded message is kept.
    Parse(Vec<ParseError>),
    /// The compiler rejected the program. The first failure is reported.
    Compile(CompileError),
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileErrors::Parse(errors) => {
                write!(f, "parser errors:")?;
                for error in errors {
                    write!(f, "\n\t{}", error)?;
                }
                Ok(())
            }
            CompileErrors::Compile(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for CompileErrors {}

/// Compile a source string into bytecode with a fresh compiler.
pub fn compile(source: &str) -> Result<Bytecode, CompileErrors> {
    let program = Parser::parse_source(source).map_err(CompileErrors::Parse)?;

    let mut compiler = Compiler::new();
    compiler
        .compile(&program)
        .map_err(CompileErrors::Compile)?;
    Ok(compiler.bytecode())
}

/// Run bytecode on a fresh VM and return the residual value: the last
/// value popped off the stack.
pub fn run(bytecode: Bytecode) -> Result<Value, RuntimeError> {
    let mut vm = VM::new(bytecode);
    vm.run()?;
    Ok(vm.last_popped())
}
