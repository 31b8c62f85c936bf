//! Minimal SQL tokenizer.
//!
//! Only distinguishes what the bounder needs: bare words, integer/decimal
//! numbers, string literals, quoted identifiers, comments, whitespace,
//! parentheses and statement terminators. Every token borrows its exact source
//! text, so concatenating all token texts reproduces the input byte for byte.

#![allow(missing_docs)]

use std::iter::Peekable;
use std::str::CharIndices;

use crate::core::errors::{Result, TpmsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Number,
    StringLiteral,
    QuotedIdent,
    LineComment,
    BlockComment,
    Whitespace,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of `text` in the tokenized input.
    pub start: usize,
}

impl Token<'_> {
    /// Whitespace and comments.
    #[must_use]
    pub const fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    #[must_use]
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(keyword)
    }

    /// Number token made only of ASCII digits.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        self.kind == TokenKind::Number && self.text.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Tokenize `input`. Fails only on an unterminated literal, quoted identifier or block comment.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        let kind = match ch {
            c if c.is_whitespace() => {
                eat_while(&mut chars, char::is_whitespace);
                TokenKind::Whitespace
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '-' if next_is(&mut chars, '-') => {
                eat_while(&mut chars, |c| c != '\n');
                TokenKind::LineComment
            }
            '/' if next_is(&mut chars, '*') => {
                chars.next();
                eat_block_comment(&mut chars, input, start)?;
                TokenKind::BlockComment
            }
            '\'' => {
                eat_quoted(&mut chars, '\'', input, start, "string literal")?;
                TokenKind::StringLiteral
            }
            '"' => {
                eat_quoted(&mut chars, '"', input, start, "quoted identifier")?;
                TokenKind::QuotedIdent
            }
            '`' => {
                eat_quoted(&mut chars, '`', input, start, "quoted identifier")?;
                TokenKind::QuotedIdent
            }
            '[' => {
                eat_quoted(&mut chars, ']', input, start, "bracketed identifier")?;
                TokenKind::QuotedIdent
            }
            c if c.is_ascii_digit() => {
                eat_number(&mut chars);
                TokenKind::Number
            }
            c if c.is_alphabetic() || c == '_' => {
                eat_while(&mut chars, |c| c.is_alphanumeric() || c == '_' || c == '$');
                TokenKind::Word
            }
            _ => TokenKind::Other,
        };
        let end = chars.peek().map_or(input.len(), |(idx, _)| *idx);
        tokens.push(Token {
            kind,
            text: &input[start..end],
            start,
        });
    }

    Ok(tokens)
}

fn next_is(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    chars.peek().is_some_and(|(_, c)| *c == expected)
}

fn eat_while(chars: &mut Peekable<CharIndices<'_>>, pred: impl Fn(char) -> bool) {
    while chars.peek().is_some_and(|(_, c)| pred(*c)) {
        chars.next();
    }
}

fn eat_number(chars: &mut Peekable<CharIndices<'_>>) {
    eat_while(chars, |c| c.is_ascii_digit());
    if next_is(chars, '.') {
        chars.next();
        eat_while(chars, |c| c.is_ascii_digit());
    }
    if chars.peek().is_some_and(|(_, c)| matches!(c, 'e' | 'E')) {
        chars.next();
        if chars.peek().is_some_and(|(_, c)| matches!(c, '+' | '-')) {
            chars.next();
        }
        eat_while(chars, |c| c.is_ascii_digit());
    }
}

/// Consume through the closing `close`; a doubled closer is an escaped closer.
fn eat_quoted(
    chars: &mut Peekable<CharIndices<'_>>,
    close: char,
    input: &str,
    start: usize,
    what: &str,
) -> Result<()> {
    while let Some((_, c)) = chars.next() {
        if c == close {
            if next_is(chars, close) {
                chars.next();
                continue;
            }
            return Ok(());
        }
    }
    Err(unterminated(input, start, what))
}

fn eat_block_comment(
    chars: &mut Peekable<CharIndices<'_>>,
    input: &str,
    start: usize,
) -> Result<()> {
    while let Some((_, c)) = chars.next() {
        if c == '*' && next_is(chars, '/') {
            chars.next();
            return Ok(());
        }
    }
    Err(unterminated(input, start, "block comment"))
}

fn unterminated(input: &str, start: usize, what: &str) -> TpmsError {
    let snippet: String = input[start..].chars().take(24).collect();
    TpmsError::NotAReadQuery {
        reason: format!("unterminated {what} at byte {start}: {snippet}"),
    }
}
