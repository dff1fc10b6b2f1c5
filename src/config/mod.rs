//! Engine and command-line settings.
//!
//! `defaults/statelex.default.toml` is embedded into the crate so the
//! documented defaults and runtime behavior stay in sync. Applications layer
//! user files, environment variables and explicit overrides on top via
//! [`Loader`](config::Loader).

pub mod config;
