pub mod runtime;
pub mod syntax;

use miette::{Diagnostic, SourceOffset, SourceSpan};

use runtime::RuntimeError;
use syntax::SyntaxError;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Debug, Clone, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The source code related to the error.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: InnerError) -> Self {
        let source_code = source_code.into();
        let offset = match &cause {
            InnerError::Syntax(err) => err.offset(),
            InnerError::Runtime(_) => None,
        };

        // Offsets point just past the offending token; step back onto it.
        let location = match offset {
            Some(offset) if !source_code.is_empty() => {
                let start = offset.saturating_sub(1).min(source_code.len() - 1);
                SourceSpan::new(SourceOffset::from(start), 1)
            }
            _ => SourceSpan::new(SourceOffset::from(0), 0),
        };

        Self {
            cause,
            source_code,
            location,
        }
    }

    pub fn syntax(&self) -> Option<&SyntaxError> {
        match &self.cause {
            InnerError::Syntax(err) => Some(err),
            InnerError::Runtime(_) => None,
        }
    }

    pub fn runtime(&self) -> Option<&RuntimeError> {
        match &self.cause {
            InnerError::Runtime(err) => Some(err),
            InnerError::Syntax(_) => None,
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let c = match &self.cause {
            InnerError::Syntax(err) => match err {
                SyntaxError::UnexpectedCharacter { .. } => "SyntaxError::UnexpectedCharacter",
                SyntaxError::UnexpectedToken { .. } => "SyntaxError::UnexpectedToken",
                SyntaxError::UnexpectedEOFDetected { .. } => "SyntaxError::UnexpectedEOFDetected",
                SyntaxError::Expected { .. } => "SyntaxError::Expected",
                SyntaxError::InvalidNumber { .. } => "SyntaxError::InvalidNumber",
                SyntaxError::UnknownMathFunction { .. } => "SyntaxError::UnknownMathFunction",
                SyntaxError::MathArity { .. } => "SyntaxError::MathArity",
                SyntaxError::MathValue { .. } => "SyntaxError::MathValue",
                SyntaxError::InvalidAssignmentTarget { .. } => {
                    "SyntaxError::InvalidAssignmentTarget"
                }
                SyntaxError::TrailingStatement { .. } => "SyntaxError::TrailingStatement",
                SyntaxError::OutsideLoop { .. } => "SyntaxError::OutsideLoop",
                SyntaxError::ArraysUnsupported { .. } => "SyntaxError::ArraysUnsupported",
                SyntaxError::UnsupportedVersion(_) => "SyntaxError::UnsupportedVersion",
            },
            InnerError::Runtime(err) => match err {
                RuntimeError::NotAnArray(_) => "RuntimeError::NotAnArray",
                RuntimeError::EmptyArray => "RuntimeError::EmptyArray",
                RuntimeError::UnknownFunction(_) => "RuntimeError::UnknownFunction",
                RuntimeError::MissingParameter { .. } => "RuntimeError::MissingParameter",
                RuntimeError::ReadOnly(_) => "RuntimeError::ReadOnly",
                RuntimeError::UnexpectedControlFlow(_) => "RuntimeError::UnexpectedControlFlow",
                RuntimeError::Host(_) => "RuntimeError::Host",
            },
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Syntax(SyntaxError::UnexpectedCharacter { .. }) => {
                Some("Remove the character or wrap text in quotes.".to_string())
            }
            InnerError::Syntax(SyntaxError::UnexpectedToken { .. }) => {
                Some("Check for syntax errors or misplaced tokens.".to_string())
            }
            InnerError::Syntax(SyntaxError::UnexpectedEOFDetected { .. }) => Some(
                "Input ended unexpectedly. Check for missing operands or closing brackets."
                    .to_string(),
            ),
            InnerError::Syntax(SyntaxError::Expected { expected, .. }) => {
                Some(format!("Insert the missing `{expected}`."))
            }
            InnerError::Syntax(SyntaxError::UnknownMathFunction { name, .. }) => {
                Some(format!("`math.{name}` does not exist. Check the function name."))
            }
            InnerError::Syntax(SyntaxError::MathArity { name, expected, .. }) => {
                Some(format!("math.{name} takes exactly {expected} arguments."))
            }
            InnerError::Syntax(SyntaxError::MathValue { name, .. }) => {
                Some(format!("Call it with arguments: math.{name}(...)."))
            }
            InnerError::Syntax(SyntaxError::InvalidAssignmentTarget { .. }) => {
                Some("Only variables such as `v.name` can be assigned.".to_string())
            }
            InnerError::Syntax(SyntaxError::TrailingStatement { .. }) => {
                Some("Statements after `return` are never executed. Remove them.".to_string())
            }
            InnerError::Syntax(SyntaxError::OutsideLoop { keyword, .. }) => {
                Some(format!("Move `{keyword}` into the body of a `loop`."))
            }
            InnerError::Syntax(SyntaxError::UnsupportedVersion(_)) => {
                Some("Use a registered grammar version such as 12.".to_string())
            }
            InnerError::Runtime(RuntimeError::EmptyArray) => {
                Some("Check that the array has at least one element.".to_string())
            }
            InnerError::Runtime(RuntimeError::MissingParameter {
                expected, actual, ..
            }) => Some(format!(
                "Invalid number of arguments: expected {expected}, got {actual}."
            )),
            _ => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}
