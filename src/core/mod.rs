//! Core infrastructure module.
//!
//! - [`types`]: scalar aliases and configuration enumerations
//! - [`constants`]: defaults and numeric tolerances
//! - [`error`]: the crate-wide error type

pub mod constants;
pub mod error;
pub mod types;

pub use constants::*;
pub use error::{LightGBMError, Result};
pub use types::*;
