//! Background tasks: ticker, autosave and leaderboard writer

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::Game;
use crate::store::{state_file, RecordStore, StoreError};
use crate::util::time::millis;

use super::state::{AppState, RecordReceiver};

/// Ticks the game every `period` with the real elapsed time until shutdown
pub async fn run_ticker(state: AppState, period: Duration, mut shutdown: watch::Receiver<bool>) {
    info!(period_ms = millis(period), "Ticker started");

    let mut tick_interval = interval(period);
    tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    tick_interval.tick().await;
    let mut last = Instant::now();

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        let now = Instant::now();
        state.tick(now - last);
        last = now;
    }

    info!("Ticker stopped");
}

/// Saves the game state every `period` until shutdown
pub async fn run_autosave(
    game: Arc<Game>,
    path: PathBuf,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut save_interval = interval(period);
    save_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    save_interval.tick().await;

    loop {
        tokio::select! {
            _ = save_interval.tick() => {}
            _ = shutdown.changed() => break,
        }
        if let Err(e) = save_state(&game, &path).await {
            warn!(path = %path.display(), error = %e, "Autosave failed");
        }
    }
}

/// Writes leaderboard batches until every sender is dropped. Failures are logged and the batch is lost.
pub async fn run_record_writer(records: RecordStore, mut rx: RecordReceiver) {
    while let Some(batch) = rx.recv().await {
        match records.save(&batch).await {
            Ok(()) => debug!(count = batch.len(), "Leaderboard records saved"),
            Err(e) => warn!(count = batch.len(), error = %e, "Failed to save leaderboard records"),
        }
    }
    debug!("Leaderboard writer stopped");
}

pub async fn save_state(game: &Game, path: &Path) -> Result<(), StoreError> {
    let snapshot = game.snapshot();
    state_file::save(path, &snapshot).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::map::tests::corner_map;
    use crate::game::{GameSettings, MapId, SessionSettings};

    fn quick_retirement() -> GameSettings {
        GameSettings {
            session: SessionSettings {
                retirement_time: Duration::from_millis(10),
                ..SessionSettings::default()
            },
            ..GameSettings::default()
        }
    }

    #[tokio::test]
    async fn test_retired_players_reach_the_leaderboard() {
        let game = Game::with_seed(vec![corner_map()], quick_retirement(), 1);
        let records = RecordStore::in_memory();
        let (state, rx) = AppState::with_records(Config::for_tests(None), game, records.clone());
        let writer = tokio::spawn(run_record_writer(records.clone(), rx));

        state.game.join(&MapId::new("corner"), "sleepy".to_string()).unwrap();
        state.tick(Duration::from_millis(50));
        drop(state);
        writer.await.unwrap();

        let top = records.top(0, 10).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].name, "sleepy");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_advances_game_until_shutdown() {
        let game = Game::with_seed(vec![corner_map()], quick_retirement(), 1);
        let (state, _rx) = AppState::with_records(
            Config::for_tests(Some(Duration::from_millis(20))),
            game,
            RecordStore::in_memory(),
        );
        state.game.join(&MapId::new("corner"), "a".to_string()).unwrap();
        assert_eq!(state.game.player_count(), 1);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ticker = tokio::spawn(run_ticker(state.clone(), Duration::from_millis(20), shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.game.player_count(), 0);

        shutdown_tx.send(true).unwrap();
        ticker.await.unwrap();
    }

    #[tokio::test]
    async fn test_save_state_writes_snapshot() {
        let dir = std::env::temp_dir().join(format!("loot_server-tasks-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");

        let game = Arc::new(Game::with_seed(vec![corner_map()], GameSettings::default(), 1));
        game.join(&MapId::new("corner"), "a".to_string()).unwrap();
        save_state(&game, &path).await.unwrap();

        let loaded = state_file::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded.sessions.len(), 1);
        std::fs::remove_dir_all(dir).unwrap();
    }
}
