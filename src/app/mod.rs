//! Application state and background tasks

pub mod state;
pub mod tasks;

pub use state::AppState;
