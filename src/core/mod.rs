//! Core utilities and common types for the MX host.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
