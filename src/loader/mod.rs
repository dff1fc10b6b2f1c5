//! Declarative rule tables.
//!
//! Grammars can be written as JSON instead of Rust code. A table looks like:
//!
//! ```json
//! {
//!   "name": "ini",
//!   "words": { "booleans": ["true", "false"] },
//!   "states": {
//!     "root": [
//!       { "pattern": "\\s+", "skip": true },
//!       { "pattern": ";.*", "token": "Comment.Single" },
//!       { "pattern": "\\[", "token": "Punctuation", "push": "section" },
//!       { "mixin": "value" }
//!     ],
//!     "section": [
//!       { "pattern": "[^\\]]+", "token": "Name.Namespace" },
//!       { "pattern": "\\]", "token": "Punctuation", "pop": true }
//!     ],
//!     "value": [
//!       { "pattern": "(\\w+)(\\s*)(=)", "groups": ["Name.Attribute", "@skip", "Operator"] },
//!       { "pattern": "\\w+", "lookup": { "sets": [["booleans", "Keyword.Constant"]], "default": "Text" } }
//!     ]
//!   }
//! }
//! ```
//!
//! A rule's `flags` string takes `i` (case-insensitive), `s` (`.` matches
//! `\n`) and `l` (`^`/`$` only match at the ends of the text instead of at
//! every line). States keep their document order; a state or word set
//! declared twice is an error.
//!
//! Every table goes through [`GrammarBuilder`](crate::grammar::grammar::GrammarBuilder),
//! so it is validated exactly like a grammar written in Rust.

pub mod loader;
