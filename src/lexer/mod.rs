//! Lexical analysis driven by a grammar.
//!
//! This module contains the dispatcher that turns text into tokens using
//! the rules of a [`Grammar`](crate::grammar::grammar::Grammar). It handles:
//!
//! - Ordered, first-match rule selection anchored at the cursor
//! - The per-run state stack (push, pop, goto)
//! - Recursive tokenization of captured sub-spans
//! - One-character fallback when nothing matches, so every run terminates
//! - The lazy token stream, optional coalescing and skipped-span reporting

pub mod lexer;
pub mod tokens;
