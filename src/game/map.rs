//! Static map data and the walkable area formed by roads

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::geom::Point2;

/// Half of the road width around its centerline
pub const ROAD_HALF_WIDTH: f64 = 0.4;

/// Map identifier as given in the game config
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub String);

impl MapId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Axis-aligned rectangle, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Point2,
    pub max: Point2,
}

impl Rect {
    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Straight horizontal or vertical road
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Road {
    start: Point2,
    end: Point2,
}

impl Road {
    pub fn horizontal(start: Point2, end_x: f64) -> Self {
        Self {
            start,
            end: Point2::new(end_x, start.y),
        }
    }

    pub fn vertical(start: Point2, end_y: f64) -> Self {
        Self {
            start,
            end: Point2::new(start.x, end_y),
        }
    }

    pub fn start(&self) -> Point2 {
        self.start
    }

    pub fn end(&self) -> Point2 {
        self.end
    }

    pub fn is_horizontal(&self) -> bool {
        self.start.y == self.end.y
    }

    /// Navigable rectangle around the centerline
    pub fn bounds(&self) -> Rect {
        Rect {
            min: Point2::new(
                self.start.x.min(self.end.x) - ROAD_HALF_WIDTH,
                self.start.y.min(self.end.y) - ROAD_HALF_WIDTH,
            ),
            max: Point2::new(
                self.start.x.max(self.end.x) + ROAD_HALF_WIDTH,
                self.start.y.max(self.end.y) + ROAD_HALF_WIDTH,
            ),
        }
    }

    pub fn contains(&self, p: Point2) -> bool {
        self.bounds().contains(p)
    }

    /// Point on the centerline, `t` in `[0, 1]` from start to end
    pub fn point_at(&self, t: f64) -> Point2 {
        Point2::new(
            self.start.x + (self.end.x - self.start.x) * t,
            self.start.y + (self.end.y - self.start.y) * t,
        )
    }
}

/// Render-only building footprint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

/// Return point where players hand in their bags
#[derive(Debug, Clone, PartialEq)]
pub struct Office {
    pub id: String,
    pub position: Point2,
    /// Render offset of the office sprite
    pub offset: (i64, i64),
}

/// Kind of collectible loot
#[derive(Debug, Clone, PartialEq)]
pub struct LootType {
    pub name: String,
    pub value: u64,
    pub weight: f64,
    /// Render fields the server does not interpret, echoed back to clients
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Map validation errors
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("map has no roads")]
    NoRoads,

    #[error("map has no loot types")]
    NoLootTypes,

    #[error("loot type weights must be positive and finite")]
    InvalidLootWeights,

    #[error("speed must be non-negative and finite, got {0}")]
    InvalidSpeed(f64),

    #[error("bag capacity must be at least 1")]
    ZeroBagCapacity,
}

/// Immutable map shared by every session playing on it
#[derive(Debug, Clone)]
pub struct Map {
    id: MapId,
    name: String,
    roads: Vec<Road>,
    buildings: Vec<Building>,
    offices: Vec<Office>,
    loot_types: Vec<LootType>,
    loot_type_dist: WeightedIndex<f64>,
    speed: f64,
    bag_capacity: usize,
}

impl Map {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: MapId,
        name: String,
        roads: Vec<Road>,
        buildings: Vec<Building>,
        offices: Vec<Office>,
        loot_types: Vec<LootType>,
        speed: f64,
        bag_capacity: usize,
    ) -> Result<Self, MapError> {
        if roads.is_empty() {
            return Err(MapError::NoRoads);
        }
        if loot_types.is_empty() {
            return Err(MapError::NoLootTypes);
        }
        if !speed.is_finite() || speed < 0.0 {
            return Err(MapError::InvalidSpeed(speed));
        }
        if bag_capacity == 0 {
            return Err(MapError::ZeroBagCapacity);
        }
        if loot_types
            .iter()
            .any(|t| !t.weight.is_finite() || t.weight <= 0.0)
        {
            return Err(MapError::InvalidLootWeights);
        }
        let loot_type_dist = WeightedIndex::new(loot_types.iter().map(|t| t.weight))
            .map_err(|_| MapError::InvalidLootWeights)?;

        Ok(Self {
            id,
            name,
            roads,
            buildings,
            offices,
            loot_types,
            loot_type_dist,
            speed,
            bag_capacity,
        })
    }

    pub fn id(&self) -> &MapId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn offices(&self) -> &[Office] {
        &self.offices
    }

    pub fn loot_types(&self) -> &[LootType] {
        &self.loot_types
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn bag_capacity(&self) -> usize {
        self.bag_capacity
    }

    pub fn loot_value(&self, type_index: usize) -> Option<u64> {
        self.loot_types.get(type_index).map(|t| t.value)
    }

    pub fn is_walkable(&self, p: Point2) -> bool {
        self.roads.iter().any(|r| r.contains(p))
    }

    /// Start of the first road, the default spawn point
    pub fn spawn_point(&self) -> Point2 {
        self.roads[0].start()
    }

    /// Uniform point on the centerline of a uniformly chosen road
    pub fn random_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Point2 {
        let road = &self.roads[rng.gen_range(0..self.roads.len())];
        road.point_at(rng.gen_range(0.0..=1.0))
    }

    /// Loot type index drawn by weight
    pub fn random_loot_type<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.loot_type_dist.sample(rng)
    }

    /// Clamp a straight move so it never leaves the union of road rectangles.
    ///
    /// Axis-aligned moves walk the union of the road intervals lying on the movement line,
    /// starting from the interval holding `from`; touching or overlapping intervals chain,
    /// so crossing roads extend the range. The result is the farthest reachable point up to
    /// `to`. A move that is not axis-aligned is all or nothing. A start outside every road
    /// cannot move at all.
    pub fn clamp_move(&self, from: Point2, to: Point2) -> Point2 {
        if !self.is_walkable(from) {
            return from;
        }

        if from.y == to.y {
            let intervals: Vec<(f64, f64)> = self
                .roads
                .iter()
                .map(Road::bounds)
                .filter(|b| from.y >= b.min.y && from.y <= b.max.y)
                .map(|b| (b.min.x, b.max.x))
                .collect();
            Point2::new(reach_along(&intervals, from.x, to.x), from.y)
        } else if from.x == to.x {
            let intervals: Vec<(f64, f64)> = self
                .roads
                .iter()
                .map(Road::bounds)
                .filter(|b| from.x >= b.min.x && from.x <= b.max.x)
                .map(|b| (b.min.y, b.max.y))
                .collect();
            Point2::new(from.x, reach_along(&intervals, from.y, to.y))
        } else if self.is_walkable(to) {
            to
        } else {
            from
        }
    }
}

/// Farthest coordinate reachable from `from` toward `to` across chained closed intervals
fn reach_along(intervals: &[(f64, f64)], from: f64, to: f64) -> f64 {
    if to > from {
        let mut reach = from;
        loop {
            let next = intervals
                .iter()
                .filter(|(lo, hi)| *lo <= reach && *hi > reach)
                .map(|(_, hi)| *hi)
                .fold(reach, f64::max);
            if next <= reach || next >= to {
                reach = next;
                break;
            }
            reach = next;
        }
        reach.min(to)
    } else {
        let mut reach = from;
        loop {
            let next = intervals
                .iter()
                .filter(|(lo, hi)| *hi >= reach && *lo < reach)
                .map(|(lo, _)| *lo)
                .fold(reach, f64::min);
            if next >= reach || next <= to {
                reach = next;
                break;
            }
            reach = next;
        }
        reach.max(to)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const EPS: f64 = 1e-9;

    pub(crate) fn loot_type(name: &str, value: u64) -> LootType {
        LootType {
            name: name.to_string(),
            value,
            weight: 1.0,
            extra: serde_json::Map::new(),
        }
    }

    /// Horizontal road (0,0)-(10,0), vertical road (10,0)-(10,10), office at (10,10)
    pub(crate) fn corner_map() -> Map {
        Map::new(
            MapId::new("corner"),
            "Corner".to_string(),
            vec![
                Road::horizontal(Point2::new(0.0, 0.0), 10.0),
                Road::vertical(Point2::new(10.0, 0.0), 10.0),
            ],
            vec![Building { x: 2, y: 2, w: 5, h: 5 }],
            vec![Office {
                id: "o0".to_string(),
                position: Point2::new(10.0, 10.0),
                offset: (5, 0),
            }],
            vec![loot_type("key", 10), loot_type("wallet", 30)],
            1.0,
            3,
        )
        .expect("valid map")
    }

    fn assert_point(actual: Point2, x: f64, y: f64) {
        assert!(
            (actual.x - x).abs() < EPS && (actual.y - y).abs() < EPS,
            "expected ({x}, {y}), got {actual:?}"
        );
    }

    #[test]
    fn test_road_bounds() {
        let road = Road::vertical(Point2::new(3.0, 5.0), 1.0);
        let b = road.bounds();
        assert_point(b.min, 2.6, 0.6);
        assert_point(b.max, 3.4, 5.4);
        assert!(!road.is_horizontal());
        assert!(road.contains(Point2::new(3.4, 1.0)));
        assert!(!road.contains(Point2::new(3.41, 1.0)));
    }

    #[test]
    fn test_move_inside_road_is_unchanged() {
        let map = corner_map();
        let to = map.clamp_move(Point2::new(1.0, 0.0), Point2::new(4.5, 0.0));
        assert_point(to, 4.5, 0.0);
    }

    #[test]
    fn test_move_along_road_stops_at_road_end() {
        let map = corner_map();
        let to = map.clamp_move(Point2::new(1.0, 0.0), Point2::new(-5.0, 0.0));
        assert_point(to, -0.4, 0.0);
    }

    #[test]
    fn test_move_across_road_stops_at_half_width() {
        let map = corner_map();
        let to = map.clamp_move(Point2::new(5.0, 0.0), Point2::new(5.0, 3.0));
        assert_point(to, 5.0, 0.4);
        let to = map.clamp_move(Point2::new(5.0, 0.1), Point2::new(5.0, -3.0));
        assert_point(to, 5.0, -0.4);
    }

    #[test]
    fn test_crossing_road_extends_range() {
        let map = corner_map();
        // Standing on the junction, moving down follows the vertical road
        let to = map.clamp_move(Point2::new(10.0, 0.0), Point2::new(10.0, 25.0));
        assert_point(to, 10.0, 10.4);
        // Within the junction square but off the vertical centerline
        let to = map.clamp_move(Point2::new(9.8, 0.2), Point2::new(9.8, 4.0));
        assert_point(to, 9.8, 4.0);
    }

    #[test]
    fn test_chained_roads_along_same_line() {
        let map = Map::new(
            MapId::new("line"),
            "Line".to_string(),
            vec![
                Road::horizontal(Point2::new(0.0, 0.0), 5.0),
                Road::horizontal(Point2::new(5.0, 0.0), 12.0),
                Road::horizontal(Point2::new(20.0, 0.0), 30.0),
            ],
            vec![],
            vec![],
            vec![loot_type("key", 1)],
            1.0,
            1,
        )
        .expect("valid map");
        let to = map.clamp_move(Point2::new(1.0, 0.0), Point2::new(25.0, 0.0));
        assert_point(to, 12.4, 0.0);
        let to = map.clamp_move(Point2::new(11.0, 0.0), Point2::new(-9.0, 0.0));
        assert_point(to, -0.4, 0.0);
    }

    #[test]
    fn test_clamped_result_is_walkable() {
        let map = corner_map();
        let starts = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 5.0),
            Point2::new(9.7, 0.3),
            Point2::new(10.3, 9.9),
        ];
        let targets = [(50.0, 0.0), (-50.0, 0.0), (0.0, 50.0), (0.0, -50.0)];
        for from in starts {
            for (dx, dy) in targets {
                let to = map.clamp_move(from, Point2::new(from.x + dx, from.y + dy));
                assert!(map.is_walkable(to), "{from:?} + ({dx}, {dy}) left the roads: {to:?}");
            }
        }
    }

    #[test]
    fn test_off_road_start_does_not_move() {
        let map = corner_map();
        let from = Point2::new(5.0, 5.0);
        assert_eq!(map.clamp_move(from, Point2::new(6.0, 5.0)), from);
    }

    #[test]
    fn test_random_point_is_on_a_road() {
        let map = corner_map();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(map.is_walkable(map.random_point(&mut rng)));
            assert!(map.random_loot_type(&mut rng) < map.loot_types().len());
        }
    }

    #[test]
    fn test_invalid_maps_are_rejected() {
        let err = Map::new(
            MapId::new("empty"),
            String::new(),
            vec![],
            vec![],
            vec![],
            vec![loot_type("key", 1)],
            1.0,
            1,
        );
        assert!(matches!(err, Err(MapError::NoRoads)));

        let mut bad = loot_type("key", 1);
        bad.weight = 0.0;
        let err = Map::new(
            MapId::new("weights"),
            String::new(),
            vec![Road::horizontal(Point2::new(0.0, 0.0), 1.0)],
            vec![],
            vec![],
            vec![bad],
            1.0,
            1,
        );
        assert!(matches!(err, Err(MapError::InvalidLootWeights)));
    }
}
