//! One session of gameplay on one map and its authoritative tick

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use super::collision::{
    find_collision_events, CollisionEvent, CollisionKind, Mover, Target, LOOT_RADIUS,
    OFFICE_RADIUS, PLAYER_RADIUS,
};
use super::ids::{IdPool, IdPoolError, LootId, PlayerId};
use super::loot_gen::LootGenerator;
use super::map::Map;
use super::player::{Bag, BagError, Loot, MoveIntent, Player};
use super::registry::Token;
use super::snapshot::{LootSnapshot, PlayerSnapshot, SessionSnapshot};
use crate::util::time::millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Per-session tunables taken from the game config
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_players: u32,
    pub retirement_time: Duration,
    pub randomize_spawn_points: bool,
    pub loot_period: Duration,
    pub loot_probability: f64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_players: 32,
            retirement_time: Duration::from_secs(60),
            randomize_spawn_points: false,
            loot_period: Duration::from_secs(5),
            loot_probability: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session is full")]
    SessionFull,

    #[error("player {0} is not in this session")]
    PlayerNotFound(PlayerId),

    #[error("no free loot id")]
    LootIdsExhausted,

    #[error(transparent)]
    Bag(#[from] BagError),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<IdPoolError> for SessionError {
    fn from(err: IdPoolError) -> Self {
        SessionError::Invariant(err.to_string())
    }
}

/// Leaderboard entry for a player leaving the game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub score: u64,
    pub play_time_ms: u64,
}

impl From<&Player> for PlayerRecord {
    fn from(player: &Player) -> Self {
        Self {
            name: player.name().to_string(),
            score: player.score(),
            play_time_ms: millis(player.play_time()),
        }
    }
}

/// Player removed by the tick for idling too long
#[derive(Debug, Clone)]
pub struct RetiredPlayer {
    pub id: PlayerId,
    pub token: Token,
    pub record: PlayerRecord,
}

/// What happened during one tick
#[derive(Debug, Default)]
pub struct TickReport {
    /// Detected collisions in resolution order
    pub events: Vec<CollisionEvent>,
    pub gathered: usize,
    pub returned_value: u64,
    pub spawned: usize,
    pub retired: Vec<RetiredPlayer>,
}

pub struct Session {
    id: SessionId,
    map: Arc<Map>,
    settings: SessionSettings,
    players: BTreeMap<PlayerId, Player>,
    loot: BTreeMap<LootId, Loot>,
    player_ids: IdPool,
    loot_ids: IdPool,
    loot_gen: LootGenerator,
    rng: ChaCha8Rng,
}

impl Session {
    pub fn new(id: SessionId, map: Arc<Map>, settings: SessionSettings, seed: u64) -> Self {
        let loot_capacity = loot_id_capacity(settings.max_players, map.bag_capacity());
        let loot_gen = LootGenerator::new(settings.loot_period, settings.loot_probability);
        Self {
            id,
            player_ids: IdPool::new(settings.max_players),
            loot_ids: IdPool::new(loot_capacity),
            map,
            settings,
            players: BTreeMap::new(),
            loot: BTreeMap::new(),
            loot_gen,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Replaces the loot generator, e.g. with one using a different random source
    #[cfg(test)]
    pub fn with_loot_generator(mut self, loot_gen: LootGenerator) -> Self {
        self.loot_gen = loot_gen;
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    #[cfg(test)]
    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    #[cfg(test)]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.player_ids.has_free()
    }

    pub fn loot(&self) -> impl Iterator<Item = &Loot> {
        self.loot.values()
    }

    pub fn loot_count(&self) -> usize {
        self.loot.len()
    }

    pub fn add_player(&mut self, name: String, token: Token) -> Result<PlayerId, SessionError> {
        let id = PlayerId(self.player_ids.allocate().ok_or(SessionError::SessionFull)?);
        let position = if self.settings.randomize_spawn_points {
            self.map.random_point(&mut self.rng)
        } else {
            self.map.spawn_point()
        };

        let player = Player::new(id, name, token, position, self.map.bag_capacity());
        if self.players.insert(id, player).is_some() {
            return Err(self.invariant(format!("player id {id} allocated twice")));
        }
        Ok(id)
    }

    /// Removes a player, freeing its id and the ids of the loot it carried
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Player, SessionError> {
        let player = self
            .players
            .remove(&id)
            .ok_or(SessionError::PlayerNotFound(id))?;
        self.player_ids.release(id.0)?;
        for item in player.bag().items() {
            self.loot_ids.release(item.id.0)?;
        }
        Ok(player)
    }

    pub fn set_move_intent(&mut self, id: PlayerId, intent: MoveIntent) -> Result<(), SessionError> {
        let speed = self.map.speed();
        let player = self
            .players
            .get_mut(&id)
            .ok_or(SessionError::PlayerNotFound(id))?;
        player.set_move_intent(intent, speed);
        Ok(())
    }

    /// Advances the session by `elapsed`.
    ///
    /// Steps run in a fixed order: plan clamped moves, detect collisions, resolve them in
    /// time order, commit moves, retire idle players, spawn loot.
    pub fn tick(&mut self, elapsed: Duration) -> Result<TickReport, SessionError> {
        let mut report = TickReport::default();

        self.plan_moves(elapsed);

        let events = self.detect_collisions();
        for event in &events {
            self.resolve(event, &mut report)?;
        }
        report.events = events;

        for player in self.players.values_mut() {
            let moved = player.commit_move();
            player.record_tick(elapsed, moved);
        }

        report.retired = self.retire_idle_players()?;
        report.spawned = self.spawn_loot(elapsed)?;

        debug!(
            session_id = %self.id,
            events = report.events.len(),
            gathered = report.gathered,
            returned_value = report.returned_value,
            spawned = report.spawned,
            retired = report.retired.len(),
            "Session tick"
        );
        Ok(report)
    }

    fn plan_moves(&mut self, elapsed: Duration) {
        let dt = elapsed.as_secs_f64();
        let map = &self.map;

        for player in self.players.values_mut() {
            let from = player.position();
            if !player.is_moving() {
                player.set_future_position(from);
                continue;
            }

            let wanted = from + player.velocity() * dt;
            let reached = map.clamp_move(from, wanted);
            if reached != wanted {
                player.stop();
            }
            player.set_future_position(reached);
        }
    }

    fn detect_collisions(&self) -> Vec<CollisionEvent> {
        let movers: Vec<Mover> = self
            .players
            .values()
            .filter_map(|p| {
                p.future_position().map(|end| Mover {
                    player: p.id(),
                    start: p.position(),
                    end,
                    radius: PLAYER_RADIUS,
                })
            })
            .collect();

        let targets: Vec<Target> = self
            .loot
            .values()
            .map(|l| Target::loot(l.id, l.position, LOOT_RADIUS))
            .chain(
                self.map
                    .offices()
                    .iter()
                    .enumerate()
                    .map(|(i, o)| Target::office(i, o.position, OFFICE_RADIUS)),
            )
            .collect();

        find_collision_events(&movers, &targets)
    }

    /// Applies one event, checking its preconditions against the current state
    fn resolve(&mut self, event: &CollisionEvent, report: &mut TickReport) -> Result<(), SessionError> {
        let Some(player) = self.players.get_mut(&event.player) else {
            return Err(self.invariant(format!("event for unknown player {}", event.player)));
        };

        match event.kind {
            CollisionKind::Gathering(loot_id) => {
                if player.bag().is_full() {
                    return Ok(());
                }
                let Some(loot) = self.loot.remove(&loot_id) else {
                    return Ok(());
                };
                if !player.add_loot(loot) {
                    return Err(self.invariant(format!("bag refused loot {loot_id} with free space")));
                }
                report.gathered += 1;
            }
            CollisionKind::Return(_) => {
                let (items, delta) = player.return_all_to_office();
                for item in items {
                    self.loot_ids.release(item.id.0)?;
                }
                report.returned_value += delta;
            }
        }
        Ok(())
    }

    /// Players idle for longer than the retirement time; reaching it exactly is not enough
    fn retire_idle_players(&mut self) -> Result<Vec<RetiredPlayer>, SessionError> {
        let idle: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.idle_time() > self.settings.retirement_time)
            .map(Player::id)
            .collect();

        let mut retired = Vec::with_capacity(idle.len());
        for id in idle {
            let player = self.remove_player(id)?;
            retired.push(RetiredPlayer {
                id,
                token: player.token().clone(),
                record: PlayerRecord::from(&player),
            });
        }
        Ok(retired)
    }

    fn spawn_loot(&mut self, elapsed: Duration) -> Result<usize, SessionError> {
        let (loot_count, looter_count) = (self.loot_count(), self.player_count());
        let count = self.loot_gen.generate(elapsed, loot_count, looter_count);

        for spawned in 0..count {
            match self.spawn_one() {
                Ok(_) => {}
                Err(SessionError::LootIdsExhausted) => {
                    debug!(session_id = %self.id, "Loot id space exhausted, skipping spawn");
                    return Ok(spawned);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    fn spawn_one(&mut self) -> Result<LootId, SessionError> {
        let id = LootId(self.loot_ids.allocate().ok_or(SessionError::LootIdsExhausted)?);
        let type_index = self.map.random_loot_type(&mut self.rng);
        let position = self.map.random_point(&mut self.rng);
        let value = self
            .map
            .loot_value(type_index)
            .ok_or_else(|| SessionError::Invariant(format!("loot type {type_index} out of range")))?;

        let loot = Loot {
            id,
            type_index,
            value,
            position,
        };
        if self.loot.insert(id, loot).is_some() {
            return Err(self.invariant(format!("loot id {id} allocated twice")));
        }
        Ok(id)
    }

    /// Puts loot on the map without claiming its id
    #[cfg(test)]
    pub(crate) fn insert_untracked_loot(&mut self, loot: Loot) {
        self.loot.insert(loot.id, loot);
    }

    fn invariant(&self, message: String) -> SessionError {
        error!(session_id = %self.id, "{}", message);
        SessionError::Invariant(message)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            map_id: self.map.id().clone(),
            players: self
                .players()
                .map(|p| PlayerSnapshot {
                    id: p.id(),
                    name: p.name().to_string(),
                    token: p.token().clone(),
                    position: p.position(),
                    velocity: p.velocity(),
                    direction: p.direction(),
                    bag: p.bag().items().iter().map(LootSnapshot::from).collect(),
                    score: p.score(),
                    idle_time_ms: millis(p.idle_time()),
                    play_time_ms: millis(p.play_time()),
                })
                .collect(),
            loot: self.loot().map(LootSnapshot::from).collect(),
            time_without_loot_ms: millis(self.loot_gen.time_without_loot()),
        }
    }

    /// Rebuilds a session exactly as saved, without running any simulation step
    pub fn from_snapshot(
        snapshot: SessionSnapshot,
        map: Arc<Map>,
        settings: SessionSettings,
        seed: u64,
    ) -> Result<Self, SessionError> {
        if snapshot.map_id != *map.id() {
            return Err(SessionError::InvalidSnapshot(format!(
                "snapshot for map {} restored onto map {}",
                snapshot.map_id,
                map.id()
            )));
        }

        let mut session = Session::new(snapshot.id, map, settings, seed);
        let bad = |e: IdPoolError| SessionError::InvalidSnapshot(e.to_string());

        for saved in snapshot.players {
            session.player_ids.claim(saved.id.0).map_err(bad)?;
            let mut bag = Bag::new(session.map.bag_capacity());
            for item in &saved.bag {
                session.loot_ids.claim(item.id.0).map_err(bad)?;
                if !bag.add(session.restore_loot(item)?) {
                    return Err(SessionError::InvalidSnapshot(format!(
                        "bag of player {} exceeds capacity {}",
                        saved.id,
                        bag.capacity()
                    )));
                }
            }
            let player = Player::restore(
                saved.id,
                saved.name,
                saved.token,
                saved.position,
                saved.velocity,
                saved.direction,
                bag,
                saved.score,
                Duration::from_millis(saved.idle_time_ms),
                Duration::from_millis(saved.play_time_ms),
            );
            session.players.insert(saved.id, player);
        }

        for item in &snapshot.loot {
            session.loot_ids.claim(item.id.0).map_err(bad)?;
            let loot = session.restore_loot(item)?;
            session.loot.insert(loot.id, loot);
        }

        session
            .loot_gen
            .set_time_without_loot(Duration::from_millis(snapshot.time_without_loot_ms));
        Ok(session)
    }

    fn restore_loot(&self, saved: &LootSnapshot) -> Result<Loot, SessionError> {
        let value = self.map.loot_value(saved.type_index).ok_or_else(|| {
            SessionError::InvalidSnapshot(format!("unknown loot type {}", saved.type_index))
        })?;
        Ok(Loot {
            id: saved.id,
            type_index: saved.type_index,
            value,
            position: saved.position,
        })
    }
}

/// Loot id space: room for a full bag per player on top of the loot lying on the map
fn loot_id_capacity(max_players: u32, bag_capacity: usize) -> u32 {
    let cap = bag_capacity as u32;
    max_players.saturating_mul((cap.saturating_mul(cap)).max(cap + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::geom::{Point2, Vec2};
    use crate::game::map::tests::{corner_map, loot_type};
    use crate::game::map::{MapId, Office, Road};
    use crate::game::player::Direction;

    fn settings() -> SessionSettings {
        SessionSettings {
            max_players: 4,
            retirement_time: Duration::from_secs(10),
            randomize_spawn_points: false,
            loot_period: Duration::from_secs(1),
            loot_probability: 0.5,
        }
    }

    fn token(n: u8) -> Token {
        Token::from(format!("{:032x}", n).as_str())
    }

    fn secs(v: f64) -> Duration {
        Duration::from_secs_f64(v)
    }

    /// Session that never spawns loot on its own
    fn quiet_session(map: Map) -> Session {
        Session::new(SessionId::new(), Arc::new(map), settings(), 1).with_loot_generator(
            LootGenerator::with_random(Duration::from_secs(1), 0.5, Box::new(|| 0.0)),
        )
    }

    fn place_loot(session: &mut Session, x: f64, y: f64, type_index: usize) -> LootId {
        let id = LootId(session.loot_ids.allocate().unwrap());
        let value = session.map.loot_value(type_index).unwrap();
        session.loot.insert(
            id,
            Loot {
                id,
                type_index,
                value,
                position: Point2::new(x, y),
            },
        );
        id
    }

    fn teleport(session: &mut Session, id: PlayerId, x: f64, y: f64) {
        let p = session.players.get(&id).unwrap().clone();
        let restored = Player::restore(
            id,
            p.name().to_string(),
            p.token().clone(),
            Point2::new(x, y),
            p.velocity(),
            p.direction(),
            p.bag().clone(),
            p.score(),
            p.idle_time(),
            p.play_time(),
        );
        session.players.insert(id, restored);
    }

    #[test]
    fn test_players_spawn_at_first_road_start() {
        let mut session = quiet_session(corner_map());
        let id = session.add_player("Rex".to_string(), token(1)).unwrap();
        assert_eq!(id, PlayerId(0));
        assert_eq!(session.player(id).unwrap().position(), Point2::new(0.0, 0.0));
    }

    #[test]
    fn test_session_capacity_and_id_reuse() {
        let mut session = quiet_session(corner_map());
        for n in 0..4 {
            session.add_player(format!("p{n}"), token(n)).unwrap();
        }
        assert!(!session.has_capacity());
        assert_eq!(
            session.add_player("late".to_string(), token(9)),
            Err(SessionError::SessionFull)
        );
        session.remove_player(PlayerId(1)).unwrap();
        assert_eq!(session.add_player("late".to_string(), token(9)), Ok(PlayerId(1)));
        assert_eq!(
            session.remove_player(PlayerId(7)).unwrap_err(),
            SessionError::PlayerNotFound(PlayerId(7))
        );
    }

    #[test]
    fn test_movement_along_road() {
        let mut session = quiet_session(corner_map());
        let id = session.add_player("Rex".to_string(), token(1)).unwrap();
        session
            .set_move_intent(id, MoveIntent::Go(Direction::East))
            .unwrap();
        session.tick(secs(2.5)).unwrap();

        let p = session.player(id).unwrap();
        assert_eq!(p.position(), Point2::new(2.5, 0.0));
        assert_eq!(p.velocity(), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn test_hitting_road_edge_stops_player() {
        let mut session = quiet_session(corner_map());
        let id = session.add_player("Rex".to_string(), token(1)).unwrap();
        session
            .set_move_intent(id, MoveIntent::Go(Direction::North))
            .unwrap();
        session.tick(secs(3.0)).unwrap();

        let p = session.player(id).unwrap();
        assert!((p.position().y + 0.4).abs() < 1e-9);
        assert!(!p.is_moving());
        assert_eq!(p.direction(), Direction::North);
    }

    #[test]
    fn test_gather_then_return_in_one_tick() {
        let mut session = quiet_session(corner_map());
        let id = session.add_player("Rex".to_string(), token(1)).unwrap();
        teleport(&mut session, id, 10.0, 2.0);
        let loot_id = place_loot(&mut session, 10.0, 5.0, 1);

        session
            .set_move_intent(id, MoveIntent::Go(Direction::South))
            .unwrap();
        let report = session.tick(secs(9.0)).unwrap();

        assert_eq!(report.gathered, 1);
        assert_eq!(report.returned_value, 30);
        let p = session.player(id).unwrap();
        assert_eq!(p.score(), 30);
        assert!(p.bag().is_empty());
        assert_eq!(session.loot_count(), 0);
        // The returned item's id is free again
        assert_eq!(session.loot_ids.allocate(), Some(loot_id.0));
    }

    #[test]
    fn test_full_bag_returns_exact_value() {
        let mut session = quiet_session(corner_map());
        let id = session.add_player("Rex".to_string(), token(1)).unwrap();
        place_loot(&mut session, 2.0, 0.0, 0);
        place_loot(&mut session, 4.0, 0.0, 1);
        place_loot(&mut session, 6.0, 0.0, 1);
        place_loot(&mut session, 8.0, 0.0, 0);

        session
            .set_move_intent(id, MoveIntent::Go(Direction::East))
            .unwrap();
        session.tick(secs(10.0)).unwrap();

        let p = session.player(id).unwrap();
        assert!(p.bag().is_full());
        assert_eq!(p.loot_total_value(), 70);
        // The fourth item stays on the map
        assert_eq!(session.loot_count(), 1);

        session
            .set_move_intent(id, MoveIntent::Go(Direction::South))
            .unwrap();
        session.tick(secs(11.0)).unwrap();

        let p = session.player(id).unwrap();
        assert_eq!(p.score(), 70);
        assert!(p.bag().is_empty());
        assert_eq!(p.loot_total_value(), 0);
    }

    #[test]
    fn test_earlier_player_wins_contested_loot() {
        let map = Map::new(
            MapId::new("line"),
            "Line".to_string(),
            vec![Road::horizontal(Point2::new(0.0, 0.0), 20.0)],
            vec![],
            vec![],
            vec![loot_type("coin", 5)],
            1.0,
            2,
        )
        .unwrap();
        let mut session = quiet_session(map);
        let near = session.add_player("near".to_string(), token(1)).unwrap();
        let far = session.add_player("far".to_string(), token(2)).unwrap();
        teleport(&mut session, near, 9.0, 0.0);
        teleport(&mut session, far, 1.0, 0.0);
        place_loot(&mut session, 10.0, 0.0, 0);

        session
            .set_move_intent(near, MoveIntent::Go(Direction::East))
            .unwrap();
        session
            .set_move_intent(far, MoveIntent::Go(Direction::East))
            .unwrap();
        let report = session.tick(secs(10.0)).unwrap();

        assert_eq!(report.events.len(), 2);
        assert_eq!(report.gathered, 1);
        assert_eq!(session.player(near).unwrap().bag().len(), 1);
        assert_eq!(session.player(far).unwrap().bag().len(), 0);
    }

    #[test]
    fn test_idle_players_retire() {
        let mut session = quiet_session(corner_map());
        let idle = session.add_player("idle".to_string(), token(1)).unwrap();
        let busy = session.add_player("busy".to_string(), token(2)).unwrap();
        session
            .set_move_intent(busy, MoveIntent::Go(Direction::East))
            .unwrap();

        let report = session.tick(secs(6.0)).unwrap();
        assert!(report.retired.is_empty());
        // Idle for exactly the retirement time
        let report = session.tick(secs(4.0)).unwrap();
        assert!(report.retired.is_empty());
        let report = session.tick(secs(0.5)).unwrap();

        assert_eq!(report.retired.len(), 1);
        assert_eq!(report.retired[0].id, idle);
        assert_eq!(report.retired[0].token, token(1));
        assert_eq!(
            report.retired[0].record,
            PlayerRecord {
                name: "idle".to_string(),
                score: 0,
                play_time_ms: 10_500,
            }
        );
        assert!(session.player(idle).is_none());
        assert!(session.player(busy).is_some());
    }

    #[test]
    fn test_spawn_fills_shortage_with_default_source() {
        let mut session = Session::new(SessionId::new(), Arc::new(corner_map()), settings(), 3);
        session.add_player("a".to_string(), token(1)).unwrap();
        session.add_player("b".to_string(), token(2)).unwrap();

        let report = session.tick(secs(1.0)).unwrap();
        // p = 1 - 0.5^1 = 0.5 of a shortage of 2
        assert_eq!(report.spawned, 1);
        let report = session.tick(secs(1.0)).unwrap();
        assert_eq!(report.spawned, 1);
        let report = session.tick(secs(1.0)).unwrap();
        assert_eq!(report.spawned, 0);

        for loot in session.loot() {
            assert!(session.map().is_walkable(loot.position));
            assert!(loot.type_index < session.map().loot_types().len());
        }
    }

    #[test]
    fn test_spawn_stops_when_loot_ids_run_out() {
        let mut session = Session::new(SessionId::new(), Arc::new(corner_map()), settings(), 3)
            .with_loot_generator(LootGenerator::new(Duration::from_millis(1), 1.0));
        for n in 0..4 {
            session.add_player(format!("p{n}"), token(n)).unwrap();
        }
        while session.loot_ids.has_free() {
            session.loot_ids.allocate();
        }
        let report = session.tick(secs(1.0)).unwrap();
        assert_eq!(report.spawned, 0);
    }

    #[test]
    fn test_office_without_loot_scores_nothing() {
        let mut map_offices = corner_map().offices().to_vec();
        map_offices.push(Office {
            id: "o1".to_string(),
            position: Point2::new(5.0, 0.0),
            offset: (0, 0),
        });
        let base = corner_map();
        let map = Map::new(
            base.id().clone(),
            base.name().to_string(),
            base.roads().to_vec(),
            vec![],
            map_offices,
            base.loot_types().to_vec(),
            1.0,
            3,
        )
        .unwrap();
        let mut session = quiet_session(map);
        let id = session.add_player("Rex".to_string(), token(1)).unwrap();
        session
            .set_move_intent(id, MoveIntent::Go(Direction::East))
            .unwrap();
        let report = session.tick(secs(8.0)).unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].kind, CollisionKind::Return(1));
        assert_eq!(session.player(id).unwrap().score(), 0);
    }

    #[test]
    fn test_snapshot_restores_state() {
        let mut session = quiet_session(corner_map());
        let id = session.add_player("Rex".to_string(), token(1)).unwrap();
        place_loot(&mut session, 3.0, 0.0, 1);
        place_loot(&mut session, 10.0, 7.0, 0);
        session
            .set_move_intent(id, MoveIntent::Go(Direction::East))
            .unwrap();
        session.tick(secs(4.0)).unwrap();

        let snapshot = session.snapshot();
        let restored =
            Session::from_snapshot(snapshot.clone(), session.map().clone(), settings(), 9).unwrap();

        let p = restored.player(id).unwrap();
        assert_eq!(p.position(), Point2::new(4.0, 0.0));
        assert_eq!(p.bag().len(), 1);
        assert_eq!(p.loot_total_value(), 30);
        assert_eq!(p.token(), &token(1));
        assert_eq!(restored.loot_count(), 1);
        assert_eq!(restored.snapshot(), snapshot);
    }

    #[test]
    fn test_snapshot_with_duplicate_ids_is_rejected() {
        let mut session = quiet_session(corner_map());
        session.add_player("Rex".to_string(), token(1)).unwrap();
        let mut snapshot = session.snapshot();
        let dup = snapshot.players[0].clone();
        snapshot.players.push(dup);

        let err = Session::from_snapshot(snapshot, session.map().clone(), settings(), 1);
        assert!(matches!(err, Err(SessionError::InvalidSnapshot(_))));
    }
}
