use thiserror::Error;

type FunctionName = String;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Cannot index a value of type {0}")]
    NotAnArray(&'static str),
    #[error("Cannot index an empty array")]
    EmptyArray,
    #[error("\"{0}\" is not defined")]
    UnknownFunction(FunctionName),
    #[error("Invalid number of arguments in \"{function}\", expected {expected}, got {actual}")]
    MissingParameter {
        function: FunctionName,
        expected: usize,
        actual: usize,
    },
    #[error("Cannot assign to read-only variable \"{0}\"")]
    ReadOnly(String),
    #[error("Unexpected {0} outside of a loop")]
    UnexpectedControlFlow(&'static str),
    #[error("{0}")]
    Host(String),
}

impl RuntimeError {
    /// Builds an error raised by an embedding environment.
    pub fn host(message: impl Into<String>) -> Self {
        RuntimeError::Host(message.into())
    }
}
