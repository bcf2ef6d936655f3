pub mod node;
pub mod parser;

use crate::{error::syntax::SyntaxError, lexer, version::GrammarVersion};

pub use node::{BinaryOp, Node, UnaryOp, Variable};
pub use parser::Parser;

/// Tokenizes and parses `source` into a tree whose root always yields a value.
pub fn parse(source: &str, version: GrammarVersion) -> Result<Node, SyntaxError> {
    let tokens = lexer::tokenize(source)?;
    Parser::new(&tokens, version).parse()
}
