#![allow(clippy::module_inception)]

//! A rule-driven tokenizer engine.
//!
//! A [`Grammar`](grammar::grammar::Grammar) is an immutable table of named
//! states, each an ordered list of regular-expression rules. A lexer run keeps
//! a stack of active states and a cursor; at every step the first rule of the
//! top state that matches at the cursor decides what is emitted and how the
//! stack changes. Input that no rule matches is consumed one character at a
//! time as [`TokenKind::Error`](lexer::tokens::TokenKind::Error), so every run
//! over finite text terminates and covers the whole input.

use serde::Serialize;

pub mod config;
pub mod errors;
pub mod grammar;
pub mod lexer;
pub mod loader;
pub mod macros;

extern crate regex;

pub use errors::errors::{ConfigurationError, ErrorImpl};
pub use grammar::grammar::{Grammar, GrammarBuilder};
pub use lexer::lexer::{tokenize, Lexer};
pub use lexer::tokens::{Token, TokenKind};

/// Half-open byte range into the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Finds the line containing `position`: returns the 1-based line number, the
/// line text (with its terminator) and the byte column within that line.
pub fn line_at_offset(source: &str, position: usize) -> Option<(usize, &str, usize)> {
    if position > source.len() {
        return None;
    }

    let mut start = 0;
    let mut line_number = 1;

    for line in source.split_inclusive('\n') {
        let end = start + line.len();

        if (start..end).contains(&position) {
            return Some((line_number, line, position - start));
        }

        start = end;
        line_number += 1;
    }

    // Position is the end of input.
    match source.split_inclusive('\n').last() {
        Some(last) if !last.ends_with('\n') => Some((line_number - 1, last, last.len())),
        _ => Some((line_number, "", 0)),
    }
}
