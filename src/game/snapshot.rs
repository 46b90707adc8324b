//! Serializable copies of session state for save/restore and state queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geom::{Point2, Vec2};
use super::ids::{LootId, PlayerId};
use super::map::MapId;
use super::player::{Direction, Loot};
use super::registry::Token;
use super::session::SessionId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootSnapshot {
    pub id: LootId,
    pub type_index: usize,
    pub position: Point2,
}

impl From<&Loot> for LootSnapshot {
    fn from(loot: &Loot) -> Self {
        Self {
            id: loot.id,
            type_index: loot.type_index,
            position: loot.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub token: Token,
    pub position: Point2,
    pub velocity: Vec2,
    pub direction: Direction,
    /// Bag contents in slot order
    pub bag: Vec<LootSnapshot>,
    pub score: u64,
    pub idle_time_ms: u64,
    pub play_time_ms: u64,
}

/// Consistent copy of one session taken between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub map_id: MapId,
    pub players: Vec<PlayerSnapshot>,
    /// Loot lying on the map
    pub loot: Vec<LootSnapshot>,
    pub time_without_loot_ms: u64,
}

/// Every session of the game, as written to the state file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub saved_at: DateTime<Utc>,
    pub sessions: Vec<SessionSnapshot>,
}
