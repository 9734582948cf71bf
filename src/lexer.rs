use crate::error::{AsmError, Location, Result};

/// Token classes of a Redcode line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Punct,
}

/// A token with its byte offset into the line it was scanned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub line: usize,
}

impl Token {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn location(&self) -> Location {
        Location::new(self.line, self.start + 1)
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    /// Case-insensitive keyword match for identifiers.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(word)
    }
}

pub fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

pub fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

const TWO_CHAR_OPS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
const ONE_CHAR_OPS: &[u8] = b",.:()+-*/%#$@<>{}=!&|";

/// Split one comment-free source line into tokens.
pub fn tokenize(text: &str, line: usize) -> Result<Vec<Token>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let kind = if is_ident_start(c) {
            while pos < bytes.len() && is_ident_char(bytes[pos]) {
                pos += 1;
            }
            TokenKind::Ident
        } else if c.is_ascii_digit() {
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            TokenKind::Number
        } else if pos + 1 < bytes.len()
            && TWO_CHAR_OPS
                .iter()
                .any(|op| op.as_bytes() == &bytes[pos..pos + 2])
        {
            pos += 2;
            TokenKind::Punct
        } else if ONE_CHAR_OPS.contains(&c) {
            pos += 1;
            TokenKind::Punct
        } else {
            let ch = text[pos..].chars().next().unwrap_or('?');
            return Err(AsmError::syntax(
                format!("unexpected character '{ch}'"),
                Location::new(line, pos + 1),
            ));
        };

        tokens.push(Token {
            kind,
            text: text[start..pos].to_string(),
            start,
            line,
        });
    }

    Ok(tokens)
}
