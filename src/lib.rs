//! Dispatch Console Library
//!
//! Administrative console for a field-technician dispatch backend: account
//! and job management over REST, and a live map reconciled from REST
//! snapshots and Socket.IO push events.

pub mod app;
pub mod constants;
pub mod domain;
pub mod error;
pub mod helpers;
pub mod services;
pub mod state;
pub mod utils;

pub use error::{Error, Result};
