//! Leaderboard and game state persistence

pub mod records;
pub mod state_file;
pub mod supabase;

pub use records::RecordStore;
pub use supabase::{SupabaseClient, SupabaseError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Supabase: {0}")]
    Supabase(#[from] SupabaseError),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bad state format: {0}")]
    Format(#[from] serde_json::Error),
}
