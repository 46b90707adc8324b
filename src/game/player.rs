//! Player state and the bounded loot bag

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use super::geom::{Point2, Vec2};
use super::ids::{LootId, PlayerId};
use super::registry::Token;

/// Facing direction. The y axis grows downward, so `North` is `-y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "U")]
    North,
    #[serde(rename = "D")]
    South,
    #[serde(rename = "L")]
    West,
    #[serde(rename = "R")]
    East,
}

impl Direction {
    /// Velocity of the given magnitude pointing this way
    pub fn velocity(self, speed: f64) -> Vec2 {
        match self {
            Direction::North => Vec2::new(0.0, -speed),
            Direction::South => Vec2::new(0.0, speed),
            Direction::West => Vec2::new(-speed, 0.0),
            Direction::East => Vec2::new(speed, 0.0),
        }
    }
}

/// Requested movement: a direction, or stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveIntent {
    Go(Direction),
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid move direction: {0:?}")]
pub struct InvalidMove(pub String);

impl FromStr for MoveIntent {
    type Err = InvalidMove;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "U" => Ok(MoveIntent::Go(Direction::North)),
            "D" => Ok(MoveIntent::Go(Direction::South)),
            "L" => Ok(MoveIntent::Go(Direction::West)),
            "R" => Ok(MoveIntent::Go(Direction::East)),
            "" => Ok(MoveIntent::Stop),
            other => Err(InvalidMove(other.to_string())),
        }
    }
}

/// A loot item. It lives either on the map or in exactly one bag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Loot {
    pub id: LootId,
    pub type_index: usize,
    pub value: u64,
    pub position: Point2,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BagError {
    #[error("bag slot {slot} is out of range (bag holds {len})")]
    SlotOutOfRange { slot: usize, len: usize },
}

/// Bounded ordered bag of loot.
///
/// Slots are dense: removing a slot shifts every later item down by one, so slot indices
/// must not be reused across removals.
#[derive(Debug, Clone, PartialEq)]
pub struct Bag {
    capacity: usize,
    items: Vec<Loot>,
}

impl Bag {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn items(&self) -> &[Loot] {
        &self.items
    }

    /// Puts the item into the next free slot; `false` (and no change) when full
    pub fn add(&mut self, loot: Loot) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.push(loot);
        true
    }

    pub fn remove(&mut self, slot: usize) -> Result<(), BagError> {
        self.take(slot).map(|_| ())
    }

    /// Removes and hands back the item in `slot`
    pub fn take(&mut self, slot: usize) -> Result<Loot, BagError> {
        if slot >= self.items.len() {
            return Err(BagError::SlotOutOfRange {
                slot,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(slot))
    }

    pub fn drain(&mut self) -> Vec<Loot> {
        std::mem::take(&mut self.items)
    }

    pub fn total_value(&self) -> u64 {
        self.items.iter().map(|l| l.value).sum()
    }
}

/// A player inside a session
#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    name: String,
    token: Token,
    position: Point2,
    future_position: Option<Point2>,
    velocity: Vec2,
    direction: Direction,
    bag: Bag,
    score: u64,
    idle_time: Duration,
    play_time: Duration,
}

impl Player {
    pub fn new(id: PlayerId, name: String, token: Token, position: Point2, bag_capacity: usize) -> Self {
        Self {
            id,
            name,
            token,
            position,
            future_position: None,
            velocity: Vec2::ZERO,
            direction: Direction::default(),
            bag: Bag::new(bag_capacity),
            score: 0,
            idle_time: Duration::ZERO,
            play_time: Duration::ZERO,
        }
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn position(&self) -> Point2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn bag(&self) -> &Bag {
        &self.bag
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn idle_time(&self) -> Duration {
        self.idle_time
    }

    pub fn play_time(&self) -> Duration {
        self.play_time
    }

    pub fn is_moving(&self) -> bool {
        !self.velocity.is_zero()
    }

    /// Applies a move intent at the given speed. Any intent counts as activity.
    pub fn set_move_intent(&mut self, intent: MoveIntent, speed: f64) {
        match intent {
            MoveIntent::Go(direction) => {
                self.direction = direction;
                self.velocity = direction.velocity(speed);
            }
            MoveIntent::Stop => self.velocity = Vec2::ZERO,
        }
        self.idle_time = Duration::ZERO;
    }

    pub fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
    }

    pub fn add_loot(&mut self, loot: Loot) -> bool {
        self.bag.add(loot)
    }

    // Single-slot bag edits; the tick only ever empties whole bags at an office
    #[allow(dead_code)]
    pub fn remove_loot(&mut self, slot: usize) -> Result<(), BagError> {
        self.bag.remove(slot)
    }

    #[allow(dead_code)]
    pub fn return_loot(&mut self, slot: usize) -> Result<Loot, BagError> {
        self.bag.take(slot)
    }

    /// Empties the bag into the score; returns the returned items and the score gained
    pub fn return_all_to_office(&mut self) -> (Vec<Loot>, u64) {
        if self.bag.is_empty() {
            return (Vec::new(), 0);
        }
        let delta = self.loot_total_value();
        let items = self.bag.drain();
        self.score += delta;
        (items, delta)
    }

    pub fn loot_total_value(&self) -> u64 {
        self.bag.total_value()
    }

    pub(crate) fn future_position(&self) -> Option<Point2> {
        self.future_position
    }

    pub(crate) fn set_future_position(&mut self, position: Point2) {
        self.future_position = Some(position);
    }

    /// Moves to the planned position and reports whether the position changed
    pub(crate) fn commit_move(&mut self) -> bool {
        match self.future_position.take() {
            Some(next) if next != self.position => {
                self.position = next;
                true
            }
            _ => false,
        }
    }

    /// Advances play and idle clocks after a committed tick
    pub(crate) fn record_tick(&mut self, elapsed: Duration, moved: bool) {
        self.play_time += elapsed;
        if moved || self.is_moving() {
            self.idle_time = Duration::ZERO;
        } else {
            self.idle_time += elapsed;
        }
    }

    /// Rebuilds a saved player as-is
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        id: PlayerId,
        name: String,
        token: Token,
        position: Point2,
        velocity: Vec2,
        direction: Direction,
        bag: Bag,
        score: u64,
        idle_time: Duration,
        play_time: Duration,
    ) -> Self {
        Self {
            id,
            name,
            token,
            position,
            future_position: None,
            velocity,
            direction,
            bag,
            score,
            idle_time,
            play_time,
        }
    }
}
