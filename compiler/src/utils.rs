use crate::error::IdlError;

/// JSON-quotes a name for use in diagnostics.
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

pub fn error(msg: &str, line: usize, column: usize) -> IdlError {
    IdlError::SyntaxError {
        msg: msg.to_string(),
        line,
        column,
    }
}

pub fn name_error(msg: String, line: usize, column: usize) -> IdlError {
    IdlError::NameResolution { msg, line, column }
}
