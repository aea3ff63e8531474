//! State - Console State Modules
//!
//! Plain owned state applied serially by the console loop. Services produce
//! events and results; these modules fold them into what the console shows.

pub mod auth_state;
pub mod data_state;
pub mod live_map;
pub mod notifications;

pub use auth_state::AuthState;
pub use data_state::{DashboardStats, DataState, JobsPage};
pub use live_map::{LiveMapEffect, LiveMapState};
pub use notifications::{Notifications, Toast, ToastKind};
