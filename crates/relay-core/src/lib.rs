//! # Relay Core
//!
//! Core types and error handling for the Relay API client.
//!
//! This crate provides the foundational abstractions shared across the
//! client:
//! - Environment variables and the two-tier environment snapshot
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod envs;
pub mod error;

pub use envs::{Envs, Variable};
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::envs::{Envs, Variable};
    pub use crate::error::{Error, Result};
}
