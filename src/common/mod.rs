//! Shared infrastructure for the crate.

mod error;

pub use error::{Error, Result};
