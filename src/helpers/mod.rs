//! Helper Utilities
//!
//! Platform directories and at-rest encryption used across the console.

mod fs;
mod string;

pub use fs::*;
pub use string::*;
