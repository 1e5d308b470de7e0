//! Configuration loader and schema types.
//!
//! This module exposes the settings schema that drives tool discovery,
//! timeouts, encoding and cover lookup, plus helpers to load it from disk.

mod load;
mod schema;

pub use load::resolve_config_path;
pub use schema::*;

#[cfg(test)]
mod tests;
