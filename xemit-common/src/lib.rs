//! xemit - Common Types and Errors
//! 
//! This crate contains the handle types and error definitions shared by
//! the IR library and the command-line driver.

pub mod error;
pub mod types;

pub use error::{EmitError, Result, ValidationError, ValidationRule};
pub use types::*;
