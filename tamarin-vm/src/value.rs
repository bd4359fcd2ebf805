// tamarin-vm - Bytecode compiler and virtual machine for the Tamarin programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime values.
//!
//! Values are a closed tagged union. Arrays and maps are backed by `im`
//! persistent collections, so cloning a value is cheap and builtins can
//! hand out modified copies without touching their input.

use std::fmt;
use std::rc::Rc;

use im::{HashMap, Vector};

use crate::code::Instructions;

/// A builtin function. Arity and type violations are reported as
/// `Value::Error` results rather than runtime errors, so user programs can
/// observe them. `None` means the builtin produced nothing; the VM pushes
/// `Null` in its place.
pub type BuiltinFn = fn(args: &[Value]) -> Option<Value>;

/// A host function exposed to Tamarin programs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// A function compiled to bytecode, before closure creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFn {
    pub instructions: Instructions,
    /// Slots to reserve on the stack: parameters plus let bindings.
    pub locals_count: usize,
    pub params_count: usize,
}

/// A compiled function together with the free variables it captured.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub func: Rc<CompiledFn>,
    pub free: Vec<Value>,
}

/// A key/value pair stored in a map. The original key is kept so the map
/// can be displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct MapPair {
    pub key: Value,
    pub value: Value,
}

/// A Tamarin runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Str(String),
    Null,
    /// Wraps the operand of a `return` while it unwinds an evaluator.
    Return(Box<Value>),
    /// An error produced inside the user's program (by a builtin).
    Error(String),
    Array(Vector<Value>),
    Map(HashMap<HashKey, MapPair>),
    CompiledFn(Rc<CompiledFn>),
    Closure(Rc<Closure>),
    Builtin(Builtin),
}

impl Value {
    /// Construct a compiled function value.
    pub fn compiled_fn(
        instructions: Instructions,
        locals_count: usize,
        params_count: usize,
    ) -> Value {
        Value::CompiledFn(Rc::new(CompiledFn {
            instructions,
            locals_count,
            params_count,
        }))
    }

    /// Construct an error value.
    pub fn error(message: impl Into<String>) -> Value {
        Value::Error(message.into())
    }

    /// The uppercase type tag used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Str(_) => "STRING",
            Value::Null => "NULL",
            Value::Return(_) => "RETURN_VALUE",
            Value::Error(_) => "ERROR",
            Value::Array(_) => "ARRAY",
            Value::Map(_) => "MAP",
            Value::CompiledFn(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
        }
    }

    /// Everything is truthy except `false` and `null`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false) | Value::Null)
    }

    /// The hash key for this value, or `None` if the value cannot be used
    /// as a map key. Only integers, booleans and strings are hashable.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Value::Integer(n) => Some(HashKey {
                kind: HashKind::Integer,
                value: *n as u64,
            }),
            Value::Boolean(b) => Some(HashKey {
                kind: HashKind::Boolean,
                value: *b as u64,
            }),
            Value::Str(s) => Some(HashKey {
                kind: HashKind::Str,
                value: fnv1a(s.as_bytes()),
            }),
            _ => None,
        }
    }

    /// The display form shown by the REPL and by `print`.
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Str(s) => f.write_str(s),
            Value::Null => f.write_str("null"),
            Value::Return(inner) => write!(f, "{}", inner),
            Value::Error(message) => write!(f, "ERROR: {}", message),
            Value::Array(elements) => {
                let rendered: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Value::Map(pairs) => {
                let rendered: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Value::CompiledFn(func) => write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func)),
            Value::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Value::Builtin(_) => f.write_str("builtin function"),
        }
    }
}

/// The tag half of a hash key. Distinct value types never collide because
/// their tags differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashKind {
    Integer,
    Boolean,
    Str,
}

/// A hashable value reduced to `(type tag, u64)`. Equal values have equal
/// hash keys; the string half is FNV-1a over the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HashKey {
    pub kind: HashKind,
    pub value: u64,
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}
