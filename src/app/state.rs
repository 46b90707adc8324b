//! Application state shared across routes

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::config::Config;
use crate::game::{Game, GameError, PlayerRecord};
use crate::store::{RecordStore, SupabaseClient};
use crate::util::rate_limit::JoinLimiter;

/// Batches of leaderboard records waiting to be written
pub type RecordReceiver = mpsc::UnboundedReceiver<Vec<PlayerRecord>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: Arc<Game>,
    pub records: RecordStore,
    pub join_limiter: JoinLimiter,
    record_tx: mpsc::UnboundedSender<Vec<PlayerRecord>>,
}

impl AppState {
    /// State plus the receiving end of the leaderboard channel, to be drained by the writer task
    pub fn new(config: Config, game: Game) -> (Self, RecordReceiver) {
        let records = match (&config.supabase_url, &config.supabase_service_role_key) {
            (Some(url), Some(key)) => RecordStore::supabase(SupabaseClient::new(url, key)),
            _ => RecordStore::in_memory(),
        };
        Self::with_records(config, game, records)
    }

    pub fn with_records(config: Config, game: Game, records: RecordStore) -> (Self, RecordReceiver) {
        let (record_tx, record_rx) = mpsc::unbounded_channel();
        let state = Self {
            config: Arc::new(config),
            game: Arc::new(game),
            records,
            join_limiter: JoinLimiter::default(),
            record_tx,
        };
        (state, record_rx)
    }

    /// Clients may drive the clock only when the server does not tick by itself
    pub fn manual_ticks(&self) -> bool {
        self.config.tick_period.is_none()
    }

    /// Advances every session and hands retired players to the leaderboard
    pub fn tick(&self, elapsed: Duration) {
        let outcome = self.game.tick(elapsed);
        for (session_id, err) in &outcome.failures {
            error!(session_id = %session_id, error = %err, "Session left out of tick");
        }
        self.publish_records(outcome.records);
    }

    /// Removes the player behind the token and records its result
    pub fn leave(&self, token: &str) -> Result<PlayerRecord, GameError> {
        let record = self.game.leave(token)?;
        self.publish_records(vec![record.clone()]);
        Ok(record)
    }

    fn publish_records(&self, records: Vec<PlayerRecord>) {
        if records.is_empty() {
            return;
        }
        if self.record_tx.send(records).is_err() {
            warn!("Leaderboard writer is gone, dropping records");
        }
    }
}
