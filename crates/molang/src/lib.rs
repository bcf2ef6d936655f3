//! `molang` compiles [MoLang](https://learn.microsoft.com/en-us/minecraft/creator/reference/content/molangreference/)
//! expressions into reusable, thread-safe [`Expression`]s.
//!
//! ## Examples
//!
//! ```rust
//! use molang::{Runtime, Value};
//!
//! let expression = molang::compile("v.speed * 2 + math.abs(-1)", 12).unwrap();
//!
//! let mut runtime = Runtime::new();
//! runtime.set_variable("speed", Value::Float(1.5));
//!
//! assert_eq!(expression.evaluate(&mut runtime), Ok(Value::Float(4.0)));
//!
//! // Constant programs are evaluated once at compile time
//! let expression = molang::compile("math.pow(2, 4)", 12).unwrap();
//! assert!(expression.is_constant());
//!
//! // Parse code into a tree
//! let root = molang::parse("v.x ? 1 : 0", molang::GrammarVersion::LATEST).unwrap();
//! assert_eq!(root.to_string(), "return variable.x ? 1.0 : 0.0");
//! ```
mod ast;
mod compiler;
mod engine;
mod error;
mod eval;
mod expression;
mod lexer;
mod math;
mod value;
mod version;

use error::InnerError;

pub use ast::node::{BinaryOp as AstBinaryOp, Node as AstNode, UnaryOp as AstUnaryOp, Variable};
pub use ast::parser::Parser as AstParser;
pub use engine::{CompilerFlag, CompilerFlags, Engine};
pub use error::Error;
pub use error::runtime::RuntimeError;
pub use error::syntax::SyntaxError;
pub use eval::Interpreter;
pub use eval::env::{EmptyEnvironment, Environment, NativeFunction, Runtime};
pub use expression::{CompiledExpression, Expression};
pub use lexer::token::{Token, TokenKind};
pub use math::MathOperation;
pub use value::Value;
pub use version::GrammarVersion;

/// Compiles `source` with the registered grammar `version`, using the shared
/// default [`Engine`].
#[allow(clippy::result_large_err)]
pub fn compile(source: &str, version: u32) -> Result<Expression, Error> {
    let version =
        GrammarVersion::get(version).map_err(|e| Error::from_error(source, InnerError::Syntax(e)))?;
    Engine::global(CompilerFlags::default()).compile_version(source, version)
}

#[allow(clippy::result_large_err)]
pub fn parse(source: &str, version: GrammarVersion) -> Result<AstNode, Error> {
    ast::parse(source, version).map_err(|e| Error::from_error(source, InnerError::Syntax(e)))
}

#[allow(clippy::result_large_err)]
pub fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    lexer::tokenize(source).map_err(|e| Error::from_error(source, InnerError::Syntax(e.into())))
}
