//! Closure-based compiler for MoLang.
//!
//! This module lowers a parsed [`Node`](crate::ast::Node) tree into a tree of
//! boxed closures. Every node becomes one closure that receives the
//! per-evaluation [`Scope`](crate::eval::scope::Scope) and returns the node's
//! value, so dispatch on the node kind happens once at compile time instead of
//! on every evaluation.
//!
//! ## Design
//!
//! - Constant subtrees are evaluated once by the tree-walking interpreter and
//!   embedded as values (see [`ConstantFolder`]).
//! - Branches and loop bodies run inside a scoped overlay; their writes are
//!   committed only when the branch is taken or the iteration completes.
//! - Loops with a constant iteration count below 128 are unrolled
//!   into one closure per iteration.
//! - `temp` variables are resolved to expression-local slots while compiling,
//!   tracked by a [`CompileContext`](context::CompileContext) that lives for a
//!   single compile pass.
//!
//! The resulting [`CompiledProgram`](compiled::CompiledProgram) is immutable
//! and can be evaluated from many threads at once.

mod compile;
pub(crate) mod compiled;
mod constant_fold;
mod context;
#[cfg(test)]
mod test_compiler;

pub(crate) use compile::Compiler;
pub(crate) use constant_fold::ConstantFolder;
