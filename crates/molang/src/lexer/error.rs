use thiserror::Error;

use crate::error::syntax::SyntaxError;

#[derive(Error, Debug, PartialEq)]
pub enum LexerError {
    #[error("Unexpected character `{character}`")]
    UnexpectedCharacter { offset: usize, character: char },
    #[error("Unexpected EOF detected")]
    UnexpectedEOFDetected(usize),
}

impl From<LexerError> for SyntaxError {
    fn from(err: LexerError) -> Self {
        match err {
            LexerError::UnexpectedCharacter { offset, character } => {
                SyntaxError::UnexpectedCharacter { offset, character }
            }
            LexerError::UnexpectedEOFDetected(offset) => SyntaxError::UnexpectedEOFDetected { offset },
        }
    }
}
