//! Registry of live sessions and player tokens

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::ids::PlayerId;
use super::map::{Map, MapId};
use super::player::MoveIntent;
use super::session::{PlayerRecord, Session, SessionError, SessionId, SessionSettings};
use super::snapshot::{GameSnapshot, SessionSnapshot};

/// Opaque player credential: 128 random bits as 32 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Token(Arc<str>);

impl Token {
    pub const LEN: usize = 32;

    /// Accepts only well-formed tokens
    pub fn parse(s: &str) -> Option<Token> {
        (s.len() == Self::LEN && s.bytes().all(|b| b.is_ascii_hexdigit())).then(|| Token::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0.to_string()
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a token's player lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerRef {
    pub session_id: SessionId,
    pub player_id: PlayerId,
}

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Debug, Clone)]
pub struct GameSettings {
    pub session: SessionSettings,
    pub max_sessions_per_map: usize,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            max_sessions_per_map: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub token: Token,
    pub player_id: PlayerId,
    pub session_id: SessionId,
}

/// Result of ticking every session
#[derive(Debug, Default)]
pub struct GameTick {
    /// Players retired for idling, ready for the leaderboard
    pub records: Vec<PlayerRecord>,
    /// Sessions whose tick was aborted
    pub failures: Vec<(SessionId, GameError)>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("map {0} not found")]
    MapNotFound(MapId),

    #[error("unknown token")]
    UnknownToken,

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("no session capacity left on map {0}")]
    NoSessionCapacity(MapId),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// State that must change under a single writer: session allocation and token issuance
struct Allocator {
    sessions_by_map: HashMap<MapId, Vec<SessionId>>,
    rng: ChaCha8Rng,
}

/// All maps, sessions and tokens of the server.
///
/// Lock order is allocator, then session, then the token index. A session lock is never
/// held while taking the allocator, and ticks take only their own session's lock.
/// Tokens are added and revoked under the lock of the session that owns the player, so a
/// freed player id is never handed out while a stale token still points at it.
pub struct Game {
    maps: Vec<Arc<Map>>,
    settings: GameSettings,
    sessions: DashMap<SessionId, SessionHandle>,
    tokens: DashMap<Token, PlayerRef>,
    allocator: Mutex<Allocator>,
}

impl Game {
    pub fn new(maps: Vec<Map>, settings: GameSettings) -> Self {
        Self::with_rng(maps, settings, ChaCha8Rng::from_entropy())
    }

    /// Game with reproducible sessions and tokens
    #[cfg(test)]
    pub fn with_seed(maps: Vec<Map>, settings: GameSettings, seed: u64) -> Self {
        Self::with_rng(maps, settings, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(maps: Vec<Map>, settings: GameSettings, rng: ChaCha8Rng) -> Self {
        Self {
            maps: maps.into_iter().map(Arc::new).collect(),
            settings,
            sessions: DashMap::new(),
            tokens: DashMap::new(),
            allocator: Mutex::new(Allocator {
                sessions_by_map: HashMap::new(),
                rng,
            }),
        }
    }

    pub fn maps(&self) -> &[Arc<Map>] {
        &self.maps
    }

    pub fn find_map(&self, id: &MapId) -> Option<&Arc<Map>> {
        self.maps.iter().find(|m| m.id() == id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn player_count(&self) -> usize {
        self.tokens.len()
    }

    /// Adds a named player to a session on the map, creating the session if needed
    pub fn join(&self, map_id: &MapId, name: String) -> Result<JoinOutcome, GameError> {
        let map = self
            .find_map(map_id)
            .ok_or_else(|| GameError::MapNotFound(map_id.clone()))?
            .clone();

        let mut allocator = self.allocator.lock();
        let (session_id, handle) = self.allocate_session_locked(&mut allocator, &map)?;
        let token = self.issue_token_locked(&mut allocator);
        let mut session = handle.lock();
        let player_id = session.add_player(name.clone(), token.clone())?;
        self.tokens.insert(
            token.clone(),
            PlayerRef {
                session_id,
                player_id,
            },
        );
        drop(session);
        drop(allocator);

        info!(
            map_id = %map_id,
            session_id = %session_id,
            player_id = %player_id,
            name = %name,
            "Player joined"
        );

        Ok(JoinOutcome {
            token,
            player_id,
            session_id,
        })
    }

    /// Session on the map with a free player slot, creating one when all are full
    fn allocate_session_locked(
        &self,
        allocator: &mut Allocator,
        map: &Arc<Map>,
    ) -> Result<(SessionId, SessionHandle), GameError> {
        let existing = allocator
            .sessions_by_map
            .get(map.id())
            .map(Vec::as_slice)
            .unwrap_or_default();

        for id in existing {
            if let Some(handle) = self.sessions.get(id).map(|h| h.value().clone()) {
                if handle.lock().has_capacity() {
                    return Ok((*id, handle));
                }
            }
        }

        if existing.len() >= self.settings.max_sessions_per_map {
            return Err(GameError::NoSessionCapacity(map.id().clone()));
        }

        let id = SessionId::new();
        let seed = allocator.rng.gen();
        let handle = Arc::new(Mutex::new(Session::new(
            id,
            map.clone(),
            self.settings.session.clone(),
            seed,
        )));
        self.sessions.insert(id, handle.clone());
        allocator
            .sessions_by_map
            .entry(map.id().clone())
            .or_default()
            .push(id);

        info!(map_id = %map.id(), session_id = %id, "Session created");
        Ok((id, handle))
    }

    /// Fresh token not held by any player
    fn issue_token_locked(&self, allocator: &mut Allocator) -> Token {
        loop {
            let bytes: [u8; 16] = allocator.rng.gen();
            let token = Token::from(hex::encode(bytes));
            if !self.tokens.contains_key(&token) {
                return token;
            }
        }
    }

    /// Looks up the player behind a token
    pub fn find_player(&self, token: &str) -> Result<PlayerRef, GameError> {
        self.tokens
            .get(token)
            .map(|r| *r.value())
            .ok_or(GameError::UnknownToken)
    }

    fn session(&self, id: SessionId) -> Result<SessionHandle, GameError> {
        self.sessions
            .get(&id)
            .map(|h| h.value().clone())
            .ok_or(GameError::SessionNotFound(id))
    }

    pub fn set_move_intent(&self, token: &str, intent: MoveIntent) -> Result<(), GameError> {
        let player = self.find_player(token)?;
        let handle = self.session(player.session_id)?;
        let result = handle.lock().set_move_intent(player.player_id, intent);
        result.map_err(revoked_player)
    }

    /// Removes the player and invalidates its token
    pub fn leave(&self, token: &str) -> Result<PlayerRecord, GameError> {
        let (_, player) = self.tokens.remove(token).ok_or(GameError::UnknownToken)?;
        let handle = self.session(player.session_id)?;
        let removed = handle.lock().remove_player(player.player_id);
        let removed = removed.map_err(revoked_player)?;

        info!(
            session_id = %player.session_id,
            player_id = %player.player_id,
            score = removed.score(),
            "Player left"
        );
        Ok(PlayerRecord::from(&removed))
    }

    /// Ticks every session. A failing session is reported and does not stop the others.
    pub fn tick(&self, elapsed: Duration) -> GameTick {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|e| *e.key()).collect();
        ids.sort();

        let mut outcome = GameTick::default();
        for id in ids {
            match self.tick_session(id, elapsed) {
                Ok(records) => outcome.records.extend(records),
                Err(e) => outcome.failures.push((id, e)),
            }
        }
        outcome
    }

    /// Ticks one session and revokes the tokens of the players it retired
    pub fn tick_session(&self, id: SessionId, elapsed: Duration) -> Result<Vec<PlayerRecord>, GameError> {
        let handle = self.session(id)?;
        let mut session = handle.lock();
        let report = session.tick(elapsed).map_err(|e| {
            error!(session_id = %id, error = %e, "Session tick aborted");
            e
        })?;
        for retired in &report.retired {
            self.tokens.remove(&retired.token);
        }
        drop(session);

        let mut records = Vec::with_capacity(report.retired.len());
        for retired in report.retired {
            info!(
                session_id = %id,
                player_id = %retired.id,
                score = retired.record.score,
                "Player retired"
            );
            records.push(retired.record);
        }
        Ok(records)
    }

    pub fn session_snapshot(&self, id: SessionId) -> Result<SessionSnapshot, GameError> {
        let handle = self.session(id)?;
        let snapshot = handle.lock().snapshot();
        Ok(snapshot)
    }

    /// The token's player together with a consistent copy of its session
    pub fn player_view(&self, token: &str) -> Result<(PlayerRef, SessionSnapshot), GameError> {
        let player = self.find_player(token)?;
        let snapshot = self.session_snapshot(player.session_id)?;
        if !snapshot
            .players
            .iter()
            .any(|p| p.id == player.player_id && p.token.as_str() == token)
        {
            return Err(GameError::UnknownToken);
        }
        Ok((player, snapshot))
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let mut sessions: Vec<SessionSnapshot> = self
            .sessions
            .iter()
            .map(|e| e.value().lock().snapshot())
            .collect();
        sessions.sort_by_key(|s| s.id);
        GameSnapshot {
            saved_at: chrono::Utc::now(),
            sessions,
        }
    }

    /// Replaces every session with the saved ones. Nothing changes if the snapshot is invalid.
    pub fn restore(&self, snapshot: GameSnapshot) -> Result<(), GameError> {
        let mut allocator = self.allocator.lock();

        let mut sessions = Vec::with_capacity(snapshot.sessions.len());
        let mut tokens: HashMap<Token, PlayerRef> = HashMap::new();
        let mut by_map: HashMap<MapId, Vec<SessionId>> = HashMap::new();
        let mut seen = HashSet::new();

        for saved in snapshot.sessions {
            if !seen.insert(saved.id) {
                return Err(SessionError::InvalidSnapshot(format!("duplicate session {}", saved.id)).into());
            }
            let map = self
                .find_map(&saved.map_id)
                .ok_or_else(|| GameError::MapNotFound(saved.map_id.clone()))?
                .clone();
            for player in &saved.players {
                let previous = tokens.insert(
                    player.token.clone(),
                    PlayerRef {
                        session_id: saved.id,
                        player_id: player.id,
                    },
                );
                if previous.is_some() {
                    return Err(SessionError::InvalidSnapshot(format!(
                        "token of player {} is used twice",
                        player.id
                    ))
                    .into());
                }
            }
            by_map.entry(map.id().clone()).or_default().push(saved.id);
            let seed = allocator.rng.gen();
            let session = Session::from_snapshot(saved, map, self.settings.session.clone(), seed)?;
            sessions.push(session);
        }

        self.sessions.clear();
        self.tokens.clear();
        for session in sessions {
            self.sessions.insert(session.id(), Arc::new(Mutex::new(session)));
        }
        for (token, player) in tokens {
            self.tokens.insert(token, player);
        }
        allocator.sessions_by_map = by_map;

        info!(
            sessions = self.sessions.len(),
            players = self.tokens.len(),
            "Game state restored"
        );
        Ok(())
    }
}

/// A token looked up just before its player left no longer names anyone
fn revoked_player(err: SessionError) -> GameError {
    match err {
        SessionError::PlayerNotFound(_) => GameError::UnknownToken,
        other => GameError::Session(other),
    }
}
