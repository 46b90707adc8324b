//! Sweep collision detection between moving players and static points

use std::cmp::Ordering;

use super::geom::Point2;
use super::ids::{LootId, PlayerId};

/// Collision radius of a player
pub const PLAYER_RADIUS: f64 = 0.3;
/// Collision radius of a loot item
pub const LOOT_RADIUS: f64 = 0.0;
/// Collision radius of an office
pub const OFFICE_RADIUS: f64 = 0.25;

/// Closest approach of a moving point to a static one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approach {
    /// Squared distance from the target to the movement line
    pub sq_distance: f64,
    /// Fraction of the movement at which the approach happens
    pub proj_ratio: f64,
}

impl Approach {
    /// Both the timing and the distance conditions hold for the given combined radius
    pub fn is_collision(&self, combined_radius: f64) -> bool {
        (0.0..=1.0).contains(&self.proj_ratio)
            && self.sq_distance <= combined_radius * combined_radius
    }
}

/// Closest approach of a mover travelling `a -> b` to the point `c`. Requires `a != b`.
pub fn closest_approach(a: Point2, b: Point2, c: Point2) -> Approach {
    debug_assert!(a != b, "zero-length movement");

    let v = b - a;
    let u = c - a;
    let u_dot_v = u.dot(v);
    let v_len2 = v.sq_len();

    Approach {
        sq_distance: u.sq_len() - (u_dot_v * u_dot_v) / v_len2,
        proj_ratio: u_dot_v / v_len2,
    }
}

/// Player movement planned for the current tick
#[derive(Debug, Clone, Copy)]
pub struct Mover {
    pub player: PlayerId,
    pub start: Point2,
    pub end: Point2,
    pub radius: f64,
}

/// What a collision is with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CollisionKind {
    Gathering(LootId),
    /// Office index within the map
    Return(usize),
}

/// A static point a mover can hit
#[derive(Debug, Clone, Copy)]
pub struct Target {
    pub kind: CollisionKind,
    pub position: Point2,
    pub radius: f64,
}

impl Target {
    pub fn loot(id: LootId, position: Point2, radius: f64) -> Self {
        Self {
            kind: CollisionKind::Gathering(id),
            position,
            radius,
        }
    }

    pub fn office(index: usize, position: Point2, radius: f64) -> Self {
        Self {
            kind: CollisionKind::Return(index),
            position,
            radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub player: PlayerId,
    pub kind: CollisionKind,
    pub sq_distance: f64,
    /// Time of approach within the tick, in `[0, 1]`
    pub time: f64,
}

/// All mover/target collisions of one tick, in ascending time.
///
/// Movers that stay in place are skipped. Ties in time are broken by player id and then by
/// target (loot before offices, ascending id), so the order is fully determined by the input.
pub fn find_collision_events(movers: &[Mover], targets: &[Target]) -> Vec<CollisionEvent> {
    let mut events = Vec::new();

    for mover in movers.iter().filter(|m| m.start != m.end) {
        for target in targets {
            let approach = closest_approach(mover.start, mover.end, target.position);
            if approach.is_collision(mover.radius + target.radius) {
                events.push(CollisionEvent {
                    player: mover.player,
                    kind: target.kind,
                    sq_distance: approach.sq_distance,
                    time: approach.proj_ratio,
                });
            }
        }
    }

    events.sort_by(|a, b| {
        a.time
            .partial_cmp(&b.time)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.player.cmp(&b.player))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    events
}
