//! Error types for grammar defects.
//!
//! The engine never fails on input text; the only error it surfaces is a
//! [`ConfigurationError`](errors::ConfigurationError), raised when a rule table
//! is malformed. It carries:
//!
//! - The error variant ([`ErrorImpl`](errors::ErrorImpl))
//! - The grammar, state, rule index and input offset where it was found
//! - A human-readable tip for the table author

pub mod errors;
