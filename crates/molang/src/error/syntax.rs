use smol_str::SmolStr;
use thiserror::Error;

/// Compile-time failures. Offsets are source byte positions just past the
/// offending token.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("Unexpected character `{character}` at {offset}")]
    UnexpectedCharacter { offset: usize, character: char },
    #[error("Unexpected token `{token}`")]
    UnexpectedToken { offset: usize, token: SmolStr },
    #[error("Unexpected end of input")]
    UnexpectedEOFDetected { offset: usize },
    #[error("Expected `{expected}` but got `{}`", if .found.is_empty() { "EOF" } else { .found.as_str() })]
    Expected {
        offset: usize,
        expected: &'static str,
        found: SmolStr,
    },
    #[error("Invalid number `{text}`")]
    InvalidNumber { offset: usize, text: SmolStr },
    #[error("Unknown math function: {name}")]
    UnknownMathFunction { offset: usize, name: SmolStr },
    #[error("Expected {expected} parameters for math.{name}, got {actual}")]
    MathArity {
        offset: usize,
        name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Cannot get value of math function math.{name}")]
    MathValue { offset: usize, name: &'static str },
    #[error("Cannot assign to `{target}`")]
    InvalidAssignmentTarget { offset: usize, target: SmolStr },
    #[error("Trailing statement after return")]
    TrailingStatement { offset: usize },
    #[error("`{keyword}` is only allowed inside a loop")]
    OutsideLoop { offset: usize, keyword: &'static str },
    #[error("Array literals are not supported in grammar version {version}")]
    ArraysUnsupported { offset: usize, version: u32 },
    #[error("Unsupported MoLang version {0}")]
    UnsupportedVersion(u32),
}

impl SyntaxError {
    #[cold]
    pub fn offset(&self) -> Option<usize> {
        match self {
            SyntaxError::UnexpectedCharacter { offset, .. }
            | SyntaxError::UnexpectedToken { offset, .. }
            | SyntaxError::UnexpectedEOFDetected { offset }
            | SyntaxError::Expected { offset, .. }
            | SyntaxError::InvalidNumber { offset, .. }
            | SyntaxError::UnknownMathFunction { offset, .. }
            | SyntaxError::MathArity { offset, .. }
            | SyntaxError::MathValue { offset, .. }
            | SyntaxError::InvalidAssignmentTarget { offset, .. }
            | SyntaxError::TrailingStatement { offset }
            | SyntaxError::OutsideLoop { offset, .. }
            | SyntaxError::ArraysUnsupported { offset, .. } => Some(*offset),
            SyntaxError::UnsupportedVersion(_) => None,
        }
    }
}
