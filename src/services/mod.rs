//! Service Layer
//!
//! Talks to the dispatch backend and turns push traffic into
//! [`ServiceEvent`]s for the state layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ServiceHub                              │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────────────┐    │
//! │  │  ApiClient  │  │ EventClient │  │    Supervisor    │    │
//! │  │   (REST)    │  │ (Socket.IO) │  │ (state/backoff)  │    │
//! │  └─────────────┘  └─────────────┘  └──────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼ ServiceEvent
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      State Layer                             │
//! │                 (LiveMapState, etc.)                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod api;
mod events;
mod hub;
mod session;
mod socket;
mod supervisor;

pub use api::*;
pub use events::*;
pub use hub::*;
pub use session::*;
pub use socket::*;
pub use supervisor::*;
