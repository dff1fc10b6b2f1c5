//! Rule tables and their construction.
//!
//! A grammar is assembled with [`GrammarBuilder`](grammar::GrammarBuilder):
//!
//! - States are ordered lists of [`Rule`](rule::Rule)s, tried first to last
//! - `mixin` inlines another state's rules at that point, resolved once at
//!   build time with cycle detection
//! - Actions emit a fixed kind, skip, split capture groups, look words up in
//!   lazily built [`WordSet`](words::WordSet)s, or run a callback
//! - State operations push, pop or replace the top of the state stack
//!
//! Building validates the table structurally (root present, unique states,
//! every referenced state declared, no zero-length rule that cannot change
//! state) and compiles every pattern.

pub mod grammar;
pub mod rule;
pub mod words;

#[cfg(test)]
mod tests;
