//! Console surface: argument parsing, one-shot commands and the live map.

pub mod cli;
pub mod commands;
pub mod live_map;
pub mod render;

pub use cli::{Command, USAGE, parse};
pub use commands::{Console, run};
