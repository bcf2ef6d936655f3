//! Compiled expression types.
//!
//! This module defines the `CompiledExpr` type, which represents a node that
//! has been compiled into a closure, and `CompiledProgram`, the compiled root
//! together with the number of `temp` slots it needs.

use crate::error::runtime::RuntimeError;
use crate::eval::env::Environment;
use crate::eval::finish;
use crate::eval::scope::{Scope, Unwind};
use crate::value::Value;

/// A compiled node represented as a dynamically-dispatched closure.
///
/// The closure takes the scope of the running evaluation, which owns the
/// `temp` slots and the overlay layers and borrows the environment. Control
/// flow that leaves the node (`break`, `continue`, `return`) is reported as an
/// [`Unwind`].
pub(crate) type CompiledExpr = Box<dyn Fn(&mut Scope<'_>) -> Result<Value, Unwind> + Send + Sync>;

/// Boxes a closure as a [`CompiledExpr`].
pub(crate) fn compiled<F>(f: F) -> CompiledExpr
where
    F: Fn(&mut Scope<'_>) -> Result<Value, Unwind> + Send + Sync + 'static,
{
    Box::new(f)
}

/// A compiled root, ready to be evaluated against an environment.
pub(crate) struct CompiledProgram {
    body: CompiledExpr,
    slot_count: usize,
}

impl CompiledProgram {
    pub fn new(body: CompiledExpr, slot_count: usize) -> Self {
        Self { body, slot_count }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Runs the program with fresh `temp` slots.
    pub fn run(&self, env: &mut dyn Environment) -> Result<Value, RuntimeError> {
        let mut scope = Scope::new(env, self.slot_count);
        finish((self.body)(&mut scope))
    }
}

impl std::fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledProgram")
            .field("slot_count", &self.slot_count)
            .finish_non_exhaustive()
    }
}
