//! Script execution error types

use std::fmt;

/// Script execution result type
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Script execution error
#[derive(Debug, Clone)]
pub enum ScriptError {
    /// Script compilation/parsing error
    CompilationError {
        /// Error message
        message: String,
        /// Line number if available
        line: Option<usize>,
        /// Column number if available
        column: Option<usize>,
    },

    /// Script runtime error, including uncaught guest `throw`s
    RuntimeError {
        /// Error message
        message: String,
        /// Script line where error occurred
        line: Option<usize>,
    },

    /// Execution context could not be set up
    InitializationError {
        /// Error message
        message: String,
    },

    /// A crypto helper primitive rejected its inputs
    CryptoError {
        /// Error message
        message: String,
    },
}

impl ScriptError {
    /// Create a compilation error
    pub fn compilation<S: Into<String>>(message: S) -> Self {
        Self::CompilationError {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a runtime error
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::RuntimeError {
            message: message.into(),
            line: None,
        }
    }

    /// Create an initialization error
    pub fn initialization<S: Into<String>>(message: S) -> Self {
        Self::InitializationError {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::CryptoError {
            message: message.into(),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompilationError {
                message,
                line,
                column,
            } => {
                write!(f, "Script compilation error: {}", message)?;
                if let Some(line) = line {
                    write!(f, " at line {}", line)?;
                    if let Some(col) = column {
                        write!(f, ", column {}", col)?;
                    }
                }
                Ok(())
            }
            Self::RuntimeError { message, line } => {
                write!(f, "Script runtime error: {}", message)?;
                if let Some(line) = line {
                    write!(f, " at line {}", line)?;
                }
                Ok(())
            }
            Self::InitializationError { message } => {
                write!(f, "Sandbox initialization error: {}", message)
            }
            Self::CryptoError { message } => {
                write!(f, "Crypto error: {}", message)
            }
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<rhai::ParseError> for ScriptError {
    fn from(err: rhai::ParseError) -> Self {
        let pos = err.1;
        Self::CompilationError {
            message: err.to_string(),
            line: pos.line(),
            column: pos.position(),
        }
    }
}

impl From<Box<rhai::EvalAltResult>> for ScriptError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        let pos = err.position();
        Self::RuntimeError {
            message: err.to_string(),
            line: pos.line(),
        }
    }
}

impl From<ScriptError> for relay_core::Error {
    fn from(err: ScriptError) -> Self {
        Self::Script(err.to_string())
    }
}
