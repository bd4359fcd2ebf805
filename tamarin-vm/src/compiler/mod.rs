// tamarin-vm - Bytecode compiler and virtual machine for the Tamarin programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode compiler: transforms the Tamarin AST to bytecode.
//!
//! The compiler keeps a stack of compilation scopes, one per function body
//! being compiled, with a parallel chain of symbol tables. Jumps are
//! emitted with placeholder targets and patched once the destination
//! offset is known.

pub mod symbols;

use std::fmt;

use tamarin_parser::ast::{Block, Expr, Ident, Program, Stmt};

use crate::builtins::BUILTINS;
use crate::code::{self, Instructions};
use crate::opcode::Opcode;
use crate::value::Value;

use symbols::{Symbol, SymbolScope, SymbolTable};

/// Error during compilation. The first failure aborts the compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A name that no scope defines.
    UndefinedVariable(String),
    /// An operator with no opcode mapping.
    UnknownOperator(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UndefinedVariable(name) => write!(f, "undefined variable {}", name),
            CompileError::UnknownOperator(op) => write!(f, "unknown operator {}", op),
        }
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// The compiler's output: instructions for the main scope plus the shared
/// constants pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

/// The opcode and offset of an instruction already in the buffer.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Per-function emission state.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
    previous: Option<EmittedInstruction>,
}

/// Compiles a `Program` into `Bytecode`.
pub struct Compiler {
    constants: Vec<Value>,
    symbols: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    /// Create a compiler with a fresh global scope. The builtin registry is
    /// pre-defined in wire order.
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbols.define_builtin(index, builtin.name);
        }
        Compiler::with_state(symbols, Vec::new())
    }

    /// Create a compiler that continues from an earlier session's symbol
    /// table and constants (REPL reuse).
    pub fn with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
        Compiler {
            constants,
            symbols,
            scopes: vec![CompilationScope::default()],
        }
    }

    /// Tear down into the pieces a REPL carries across lines. If a
    /// compile error left the compiler inside a function scope, unwind to
    /// the global table.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        let mut symbols = self.symbols;
        while let Some(outer) = symbols.take_outer() {
            symbols = outer;
        }
        (symbols, self.constants)
    }

    /// Compile a program into the main scope.
    pub fn compile(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.statements {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    /// The bytecode produced so far: the main scope's instructions and the
    /// constants pool.
    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scopes[0].instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Let { name, value, .. } => {
                self.compile_expr(value)?;
                let symbol = self.symbols.define(&name.name);
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index]),
                    _ => self.emit(Opcode::SetLocal, &[symbol.index]),
                };
            }
            Stmt::Return { value, .. } => {
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                }
                self.emit(Opcode::ReturnValue, &[]);
            }
            Stmt::Expr { value, .. } => {
                self.compile_expr(value)?;
                self.emit(Opcode::Pop, &[]);
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.statements {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Int { value, .. } => {
                let index = self.add_constant(Value::Integer(*value));
                self.emit(Opcode::Constant, &[index]);
            }
            Expr::Str { value, .. } => {
                let index = self.add_constant(Value::Str(value.clone()));
                self.emit(Opcode::Constant, &[index]);
            }
            Expr::Bool { value, .. } => {
                if *value {
                    self.emit(Opcode::True, &[]);
                } else {
                    self.emit(Opcode::False, &[]);
                }
            }
            Expr::Ident(ident) => {
                let symbol = self
                    .symbols
                    .resolve(&ident.name)
                    .ok_or_else(|| CompileError::UndefinedVariable(ident.name.clone()))?;
                self.load_symbol(&symbol);
            }
            Expr::Prefix {
                operator, right, ..
            } => {
                self.compile_expr(right)?;
                match operator.as_str() {
                    "!" => self.emit(Opcode::Bang, &[]),
                    "-" => self.emit(Opcode::Minus, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }
            Expr::Infix {
                operator,
                left,
                right,
                ..
            } => self.compile_infix(operator, left, right)?,
            Expr::If {
                condition,
                consequence,
                alternative,
                ..
            } => self.compile_if(condition, consequence, alternative.as_ref())?,
            Expr::Array { elements, .. } => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()]);
            }
            Expr::Map { pairs, .. } => {
                // Key order is the textual form of the keys, not source
                // order, so compiling the same program twice is
                // byte-identical.
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| key.to_string());

                for (key, value) in sorted {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit(Opcode::Map, &[pairs.len() * 2]);
            }
            Expr::Index { left, index, .. } => {
                self.compile_expr(left)?;
                self.compile_expr(index)?;
                self.emit(Opcode::Index, &[]);
            }
            Expr::Function {
                name,
                parameters,
                body,
                ..
            } => self.compile_function(name, parameters, body)?,
            Expr::Call {
                function,
                arguments,
                ..
            } => {
                self.compile_expr(function)?;
                for argument in arguments {
                    self.compile_expr(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()]);
            }
        }
        Ok(())
    }

    fn compile_infix(&mut self, operator: &str, left: &Expr, right: &Expr) -> Result<()> {
        // There is no less-than opcode: `a < b` compiles its operands in
        // reverse and reuses OpGreaterThan.
        if operator == "<" {
            self.compile_expr(right)?;
            self.compile_expr(left)?;
            self.emit(Opcode::GreaterThan, &[]);
            return Ok(());
        }

        self.compile_expr(left)?;
        self.compile_expr(right)?;

        match operator {
            "+" => self.emit(Opcode::Add, &[]),
            "-" => self.emit(Opcode::Sub, &[]),
            "*" => self.emit(Opcode::Mul, &[]),
            "/" => self.emit(Opcode::Div, &[]),
            ">" => self.emit(Opcode::GreaterThan, &[]),
            "==" => self.emit(Opcode::Equal, &[]),
            "!=" => self.emit(Opcode::NotEqual, &[]),
            other => return Err(CompileError::UnknownOperator(other.to_string())),
        };
        Ok(())
    }

    /// An `if` is an expression: each path leaves exactly one value on the
    /// stack, with Null standing in for a missing else branch.
    fn compile_if(
        &mut self,
        condition: &Expr,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> Result<()> {
        self.compile_expr(condition)?;

        // Placeholder target, patched below.
        let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[9999]);

        self.compile_block(consequence)?;
        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_pop();
        }

        let jump = self.emit(Opcode::Jump, &[9999]);

        let after_consequence = self.current_scope().instructions.len();
        self.change_operand(jump_not_truthy, after_consequence);

        match alternative {
            None => {
                self.emit(Opcode::Null, &[]);
            }
            Some(block) => {
                self.compile_block(block)?;
                if self.last_instruction_is(Opcode::Pop) {
                    self.remove_last_pop();
                }
            }
        }

        let after_alternative = self.current_scope().instructions.len();
        self.change_operand(jump, after_alternative);
        Ok(())
    }

    fn compile_function(
        &mut self,
        name: &str,
        parameters: &[Ident],
        body: &Block,
    ) -> Result<()> {
        self.enter_scope();

        if !name.is_empty() {
            self.symbols.define_function_name(name);
        }
        for parameter in parameters {
            self.symbols.define(&parameter.name);
        }

        self.compile_block(body)?;

        // An expression body returns its value; an empty or statement-only
        // body returns null.
        if self.last_instruction_is(Opcode::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[]);
        }

        let free_symbols = self.symbols.free_symbols().to_vec();
        let locals_count = self.symbols.num_definitions();
        let instructions = self.leave_scope();

        // Push each captured value so OpClosure can collect them.
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let func = Value::compiled_fn(instructions, locals_count, parameters.len());
        let index = self.add_constant(func);
        self.emit(Opcode::Closure, &[index, free_symbols.len()]);
        Ok(())
    }

    /// Emit the load instruction matching a resolved symbol's scope.
    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[]),
        };
    }

    // ========================================================================
    // Emission
    // ========================================================================

    /// Add a value to the constants pool and return its index.
    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Encode and append an instruction to the active scope, returning the
    /// offset it was placed at.
    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        let instruction = code::make(op, operands);
        let position = self.current_scope_mut().instructions.push(&instruction);

        let scope = self.current_scope_mut();
        scope.previous = scope.last;
        scope.last = Some(EmittedInstruction {
            opcode: op,
            position,
        });
        position
    }

    fn last_instruction_is(&self, op: Opcode) -> bool {
        self.current_scope()
            .last
            .is_some_and(|last| last.opcode == op)
    }

    /// Drop the trailing OpPop (used when an `if` branch must leave its
    /// value on the stack).
    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        let last = scope.last.expect("no instruction to remove");
        scope.instructions.truncate(last.position);
        scope.last = scope.previous;
    }

    /// Rewrite the trailing OpPop of a function body into OpReturnValue.
    fn replace_last_pop_with_return(&mut self) {
        let scope = self.current_scope_mut();
        let last = scope.last.as_mut().expect("no instruction to replace");
        let position = last.position;
        last.opcode = Opcode::ReturnValue;

        let instruction = code::make(Opcode::ReturnValue, &[]);
        self.current_scope_mut()
            .instructions
            .replace(position, &instruction);
    }

    /// Re-encode the instruction at `position` with a new operand. Only
    /// used to patch jump targets, so the opcode stays the same.
    fn change_operand(&mut self, position: usize, operand: usize) {
        let scope = self.current_scope_mut();
        let op = Opcode::from_byte(scope.instructions.as_bytes()[position])
            .expect("patching a non-instruction offset");
        let instruction = code::make(op, &[operand]);
        scope.instructions.replace(position, &instruction);
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("no active compilation scope")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("no active compilation scope")
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        let outer = std::mem::take(&mut self.symbols);
        self.symbols = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("no scope to leave");
        self.symbols = self
            .symbols
            .take_outer()
            .expect("left the global symbol table");
        scope.instructions
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}
