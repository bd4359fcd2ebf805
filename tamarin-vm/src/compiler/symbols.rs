// tamarin-vm - Bytecode compiler and virtual machine for the Tamarin programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexically scoped symbol tables.
//!
//! One table per scope, chained outward. Resolution walks the chain; a
//! local resolved through an inner table is converted into a free symbol
//! of that table, which is how the compiler learns what a closure must
//! capture. Globals and builtins are never reclassified.

use std::collections::HashMap;

/// Where a resolved name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
    Builtin,
    /// Captured from an enclosing non-global scope.
    Free,
    /// The name of the function currently being compiled.
    Function,
}

/// A resolved name: its scope and the slot index within that scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// A single scope's definitions, chained to the enclosing scope.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    num_definitions: usize,
    /// Symbols captured from enclosing scopes, in order of first use.
    /// Each entry is the *original* symbol as seen by the enclosing table.
    free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// Create a global (outermost) table.
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Create a table for a scope nested inside `outer`.
    pub fn enclosed(outer: SymbolTable) -> Self {
        SymbolTable {
            outer: Some(Box::new(outer)),
            ..SymbolTable::default()
        }
    }

    /// Detach and return the enclosing table, if any.
    pub fn take_outer(&mut self) -> Option<SymbolTable> {
        self.outer.take().map(|boxed| *boxed)
    }

    /// Number of indexed definitions in this table (parameters and lets;
    /// builtins and function names do not count).
    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }

    /// The symbols this scope captures, in first-use order.
    pub fn free_symbols(&self) -> &[Symbol] {
        &self.free_symbols
    }

    /// Define a name in this table. Global scope when outermost, local
    /// otherwise; the index is the next slot.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };
        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Define a builtin at its registry position. Does not consume a slot.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Define the name of the function whose body this table belongs to,
    /// so the body can refer to itself. Does not consume a slot.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Record `original` as captured by this scope and return the Free
    /// symbol standing in for it here.
    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Resolve a name, walking outward. Globals and builtins resolve as
    /// themselves at any depth; anything else found in an enclosing table
    /// becomes a Free symbol of this one.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }

        let symbol = self.outer.as_mut()?.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
            _ => Some(self.define_free(symbol)),
        }
    }
}
