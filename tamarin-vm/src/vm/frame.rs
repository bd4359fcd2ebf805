// tamarin-vm - Bytecode compiler and virtual machine for the Tamarin programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call frames for the VM.

use std::rc::Rc;

use crate::code::Instructions;
use crate::value::Closure;

/// A call frame on the VM's frame stack.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The closure being executed.
    pub closure: Rc<Closure>,

    /// Instruction pointer. Starts at -1 and is pre-incremented before
    /// each fetch, so it always names the instruction being executed.
    pub ip: i64,

    /// Index of the first local slot on the value stack. Arguments occupy
    /// the first `params_count` slots.
    pub base_pointer: usize,
}

impl Frame {
    /// Create a frame about to start executing `closure`.
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Frame {
            closure,
            ip: -1,
            base_pointer,
        }
    }

    /// The instructions this frame executes.
    pub fn instructions(&self) -> &Instructions {
        &self.closure.func.instructions
    }
}
