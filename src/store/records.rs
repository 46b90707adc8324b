//! Leaderboard of players who left the game

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

use crate::game::PlayerRecord;

use super::supabase::SupabaseClient;
use super::StoreError;

const RECORDS_TABLE: &str = "retired_players";

/// Largest page a single leaderboard read may return
pub const MAX_PAGE_SIZE: usize = 100;

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub name: String,
    pub score: u64,
    pub play_time_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(record: PlayerRecord, recorded_at: DateTime<Utc>) -> Self {
        Self {
            name: record.name,
            score: record.score,
            play_time_ms: record.play_time_ms,
            recorded_at,
        }
    }
}

/// Best score first, then shorter play time, then name
fn leaderboard_order(a: &StoredRecord, b: &StoredRecord) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.play_time_ms.cmp(&b.play_time_ms))
        .then_with(|| a.name.cmp(&b.name))
}

#[derive(Clone)]
enum Backend {
    Memory(Arc<RwLock<Vec<StoredRecord>>>),
    Supabase(SupabaseClient),
}

/// Leaderboard storage, in memory or in a Supabase table
#[derive(Clone)]
pub struct RecordStore {
    backend: Backend,
}

impl RecordStore {
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::default()),
        }
    }

    pub fn supabase(client: SupabaseClient) -> Self {
        Self {
            backend: Backend::Supabase(client),
        }
    }

    pub async fn save(&self, records: &[PlayerRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let rows: Vec<StoredRecord> = records
            .iter()
            .cloned()
            .map(|r| StoredRecord::new(r, now))
            .collect();

        match &self.backend {
            Backend::Memory(rows_store) => {
                rows_store.write().extend(rows);
                Ok(())
            }
            Backend::Supabase(client) => Ok(client.insert_many(RECORDS_TABLE, &rows).await?),
        }
    }

    /// Page of the leaderboard; `max_items` is capped at [`MAX_PAGE_SIZE`]
    pub async fn top(&self, start: usize, max_items: usize) -> Result<Vec<StoredRecord>, StoreError> {
        let limit = max_items.min(MAX_PAGE_SIZE);

        match &self.backend {
            Backend::Memory(rows_store) => {
                let mut rows = rows_store.read().clone();
                rows.sort_by(leaderboard_order);
                Ok(rows.into_iter().skip(start).take(limit).collect())
            }
            Backend::Supabase(client) => {
                let query = format!(
                    "select=name,score,play_time_ms,recorded_at&order=score.desc,play_time_ms.asc,name.asc&offset={}&limit={}",
                    start, limit
                );
                Ok(client.get(RECORDS_TABLE, &query).await?)
            }
        }
    }
}
