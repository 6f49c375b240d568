use regex::Regex;
use lazy_static::lazy_static;
use crate::utils::{quote, error};
use crate::error::IdlError;

lazy_static! {
    pub static ref TOKEN_REGEX:   Regex = Regex::new(
        r#"(0[xX][0-9a-fA-F]+\b|-?\d+\b|"(?:[^"\\\n]|\\.)*"|->|[{}():,?@]|\b[A-Za-z_][A-Za-z0-9_]*\b|//[^\n]*|\s+)"#
    ).unwrap();
    pub static ref WHITESPACE_RX: Regex = Regex::new(r"^(//.*|\s+)$").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text:   String,
    pub line:   usize,
    pub column: usize,
}

/// Splits IDL source into tokens. Comments and whitespace are dropped; the
/// returned vector always ends with an empty EOF token.
pub fn tokenize(text: &str) -> Result<Vec<Token>, IdlError> {
    let mut tokens = Vec::new();
    let mut position = Position { line: 1, column: 1 };
    let mut last_end = 0;

    for mat in TOKEN_REGEX.find_iter(text) {
        // Anything the regex skipped over is not part of the language
        if mat.start() > last_end {
            return Err(unexpected(&text[last_end..mat.start()], position));
        }

        let part = mat.as_str();
        if !WHITESPACE_RX.is_match(part) {
            tokens.push(Token {
                text:   part.to_string(),
                line:   position.line,
                column: position.column,
            });
        }

        position.advance(part);
        last_end = mat.end();
    }

    if last_end != text.len() {
        return Err(unexpected(&text[last_end..], position));
    }

    // EOF
    tokens.push(Token {
        text:   String::new(),
        line:   position.line,
        column: position.column,
    });
    Ok(tokens)
}

#[derive(Debug, Clone, Copy)]
struct Position {
    line:   usize,
    column: usize,
}

impl Position {
    /// Moves past `part`. Columns count bytes from 1.
    fn advance(&mut self, part: &str) {
        match part.rfind('\n') {
            Some(last_newline) => {
                self.line += part.matches('\n').count();
                self.column = part.len() - last_newline;
            }
            None => self.column += part.len(),
        }
    }
}

fn unexpected(text: &str, at: Position) -> IdlError {
    error(&format!("Unexpected text {}", quote(text)), at.line, at.column)
}
