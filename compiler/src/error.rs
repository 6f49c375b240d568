use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error at line {line}, column {column}: {msg}")]
    SyntaxError {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Name resolution error at line {line}, column {column}: {msg}")]
    NameResolution {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Invalid annotation at line {line}, column {column}: {msg}")]
    InvalidAnnotation {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Unsupported layout at line {line}, column {column}: {msg}")]
    Layout {
        msg:    String,
        line:   usize,
        column: usize,
    },
}

impl IdlError {
    /// Source location of the error, if it has one.
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            IdlError::Io(_) => None,
            IdlError::SyntaxError { line, column, .. }
            | IdlError::NameResolution { line, column, .. }
            | IdlError::InvalidAnnotation { line, column, .. }
            | IdlError::Layout { line, column, .. } => Some((*line, *column)),
        }
    }
}
