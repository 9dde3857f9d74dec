//! Shared types for the Revolut client workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
