//! Socket.IO push channel
//!
//! A small Socket.IO v5 client over the Engine.IO v4 WebSocket transport,
//! covering what the live map needs: root namespace, JSON events and
//! heartbeats.

mod client;
mod packet;

pub use client::*;
pub use packet::*;
