//! Game config file: maps and gameplay defaults

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::game::map::{Building, LootType, Map, MapId, Office, Road};
use crate::game::{GameSettings, Point2, SessionSettings};

use super::ConfigError;

const DEFAULT_SPEED: f64 = 1.0;
const DEFAULT_BAG_CAPACITY: usize = 3;
const DEFAULT_MAX_PLAYERS: u32 = 32;
const DEFAULT_MAX_SESSIONS: usize = 16;
const DEFAULT_RETIREMENT_SECS: f64 = 60.0;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameConfigFile {
    default_speed: Option<f64>,
    default_bag_capacity: Option<usize>,
    max_players_per_session: Option<u32>,
    max_sessions_per_map: Option<usize>,
    /// Seconds
    retirement_time: Option<f64>,
    loot_generator_config: LootGeneratorConfig,
    maps: Vec<MapConfig>,
}

#[derive(Debug, Deserialize)]
struct LootGeneratorConfig {
    /// Seconds
    period: f64,
    probability: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapConfig {
    id: String,
    name: String,
    speed: Option<f64>,
    bag_capacity: Option<usize>,
    roads: Vec<RoadConfig>,
    #[serde(default)]
    buildings: Vec<Building>,
    #[serde(default)]
    offices: Vec<OfficeConfig>,
    loot_types: Vec<LootTypeConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoadConfig {
    Horizontal { x0: i64, y0: i64, x1: i64 },
    Vertical { x0: i64, y0: i64, y1: i64 },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficeConfig {
    id: String,
    x: i64,
    y: i64,
    #[serde(default)]
    offset_x: i64,
    #[serde(default)]
    offset_y: i64,
}

#[derive(Debug, Deserialize)]
struct LootTypeConfig {
    #[serde(default)]
    name: String,
    value: u64,
    weight: Option<f64>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Everything the game needs from the config file
#[derive(Debug)]
pub struct GameConfig {
    pub maps: Vec<Map>,
    pub settings: GameSettings,
}

/// Read and validate the game config file
pub fn load(path: &Path, randomize_spawn_points: bool) -> Result<GameConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text, randomize_spawn_points)
}

pub fn parse(json: &str, randomize_spawn_points: bool) -> Result<GameConfig, ConfigError> {
    let file: GameConfigFile = serde_json::from_str(json)?;

    let loot = &file.loot_generator_config;
    if !(loot.period.is_finite() && loot.period > 0.0) {
        return Err(ConfigError::Game(format!("loot period must be positive, got {}", loot.period)));
    }
    if !(0.0..=1.0).contains(&loot.probability) {
        return Err(ConfigError::Game(format!(
            "loot probability must be within [0, 1], got {}",
            loot.probability
        )));
    }
    let retirement = file.retirement_time.unwrap_or(DEFAULT_RETIREMENT_SECS);
    if !(retirement.is_finite() && retirement >= 0.0) {
        return Err(ConfigError::Game(format!("invalid retirement time {retirement}")));
    }
    let retirement_time = seconds("retirementTime", retirement)?;
    let loot_period = seconds("lootGeneratorConfig.period", loot.period)?;
    let max_players = file.max_players_per_session.unwrap_or(DEFAULT_MAX_PLAYERS);
    if max_players == 0 {
        return Err(ConfigError::Game("maxPlayersPerSession must be at least 1".to_string()));
    }
    if file.maps.is_empty() {
        return Err(ConfigError::Game("no maps configured".to_string()));
    }

    let default_speed = file.default_speed.unwrap_or(DEFAULT_SPEED);
    let default_bag_capacity = file.default_bag_capacity.unwrap_or(DEFAULT_BAG_CAPACITY);

    let mut seen = HashSet::new();
    let mut maps = Vec::with_capacity(file.maps.len());
    for map in file.maps {
        if !seen.insert(map.id.clone()) {
            return Err(ConfigError::DuplicateMap(map.id));
        }
        maps.push(build_map(map, default_speed, default_bag_capacity)?);
    }

    Ok(GameConfig {
        maps,
        settings: GameSettings {
            session: SessionSettings {
                max_players,
                retirement_time,
                randomize_spawn_points,
                loot_period,
                loot_probability: loot.probability,
            },
            max_sessions_per_map: file.max_sessions_per_map.unwrap_or(DEFAULT_MAX_SESSIONS),
        },
    })
}

/// Seconds from the config file as a duration; values past `Duration::MAX` are rejected
fn seconds(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ConfigError::Game(format!("{field} of {secs} seconds is out of range")))
}

fn build_map(config: MapConfig, default_speed: f64, default_bag_capacity: usize) -> Result<Map, ConfigError> {
    let roads = config
        .roads
        .into_iter()
        .map(|road| match road {
            RoadConfig::Horizontal { x0, y0, x1 } => {
                Road::horizontal(Point2::new(x0 as f64, y0 as f64), x1 as f64)
            }
            RoadConfig::Vertical { x0, y0, y1 } => {
                Road::vertical(Point2::new(x0 as f64, y0 as f64), y1 as f64)
            }
        })
        .collect();

    let offices = config
        .offices
        .into_iter()
        .map(|o| Office {
            id: o.id,
            position: Point2::new(o.x as f64, o.y as f64),
            offset: (o.offset_x, o.offset_y),
        })
        .collect();

    let loot_types = config
        .loot_types
        .into_iter()
        .map(|t| LootType {
            name: t.name,
            value: t.value,
            weight: t.weight.unwrap_or(1.0),
            extra: t.extra,
        })
        .collect();

    Map::new(
        MapId::new(config.id.clone()),
        config.name,
        roads,
        config.buildings,
        offices,
        loot_types,
        config.speed.unwrap_or(default_speed),
        config.bag_capacity.unwrap_or(default_bag_capacity),
    )
    .map_err(|source| ConfigError::Map {
        map_id: config.id,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::MapError;

    const CONFIG: &str = r#"{
        "defaultSpeed": 3.0,
        "retirementTime": 15.5,
        "lootGeneratorConfig": { "period": 5.0, "probability": 0.5 },
        "maps": [
            {
                "id": "map1",
                "name": "Map 1",
                "bagCapacity": 5,
                "roads": [ { "x0": 0, "y0": 0, "x1": 40 }, { "x0": 40, "y0": 0, "y1": 30 } ],
                "buildings": [ { "x": 5, "y": 5, "w": 30, "h": 20 } ],
                "offices": [ { "id": "o0", "x": 40, "y": 30, "offsetX": 5, "offsetY": 0 } ],
                "lootTypes": [
                    { "name": "key", "file": "assets/key.obj", "type": "obj", "scale": 0.03, "value": 10 },
                    { "name": "wallet", "value": 30, "weight": 3 }
                ]
            },
            {
                "id": "town",
                "name": "Town",
                "speed": 1.5,
                "roads": [ { "x0": 0, "y0": 0, "y1": 10 } ],
                "lootTypes": [ { "name": "coin", "value": 1 } ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config = parse(CONFIG, true).unwrap();
        assert_eq!(config.maps.len(), 2);

        let map = &config.maps[0];
        assert_eq!(map.id(), &MapId::new("map1"));
        assert_eq!(map.speed(), 3.0);
        assert_eq!(map.bag_capacity(), 5);
        assert_eq!(map.roads().len(), 2);
        assert!(map.roads()[0].is_horizontal());
        assert_eq!(map.roads()[1].end(), Point2::new(40.0, 30.0));
        assert_eq!(map.offices()[0].offset, (5, 0));
        assert_eq!(map.loot_types()[0].extra["file"], "assets/key.obj");
        assert_eq!(map.loot_types()[1].weight, 3.0);

        let town = &config.maps[1];
        assert_eq!(town.speed(), 1.5);
        assert_eq!(town.bag_capacity(), DEFAULT_BAG_CAPACITY);
        assert!(town.offices().is_empty());

        let session = &config.settings.session;
        assert_eq!(session.retirement_time, Duration::from_millis(15_500));
        assert_eq!(session.loot_period, Duration::from_secs(5));
        assert!(session.randomize_spawn_points);
        assert_eq!(session.max_players, DEFAULT_MAX_PLAYERS);
    }

    #[test]
    fn test_duplicate_map_ids_are_rejected() {
        let json = r#"{
            "lootGeneratorConfig": { "period": 1.0, "probability": 1.0 },
            "maps": [
                { "id": "a", "name": "A", "roads": [ { "x0": 0, "y0": 0, "x1": 1 } ], "lootTypes": [ { "value": 1 } ] },
                { "id": "a", "name": "B", "roads": [ { "x0": 0, "y0": 0, "x1": 1 } ], "lootTypes": [ { "value": 1 } ] }
            ]
        }"#;
        assert!(matches!(parse(json, false), Err(ConfigError::DuplicateMap(id)) if id == "a"));
    }

    #[test]
    fn test_map_without_roads_is_rejected() {
        let json = r#"{
            "lootGeneratorConfig": { "period": 1.0, "probability": 1.0 },
            "maps": [ { "id": "a", "name": "A", "roads": [], "lootTypes": [ { "value": 1 } ] } ]
        }"#;
        assert!(matches!(
            parse(json, false),
            Err(ConfigError::Map { source: MapError::NoRoads, .. })
        ));
    }

    #[test]
    fn test_bad_loot_probability_is_rejected() {
        let json = r#"{
            "lootGeneratorConfig": { "period": 1.0, "probability": 1.5 },
            "maps": [ { "id": "a", "name": "A", "roads": [ { "x0": 0, "y0": 0, "x1": 1 } ], "lootTypes": [ { "value": 1 } ] } ]
        }"#;
        assert!(matches!(parse(json, false), Err(ConfigError::Game(_))));
        assert!(matches!(parse("{", false), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_huge_durations_are_rejected() {
        let config = |retirement: &str, period: &str| {
            format!(
                r#"{{
                    "retirementTime": {retirement},
                    "lootGeneratorConfig": {{ "period": {period}, "probability": 0.5 }},
                    "maps": [ {{ "id": "a", "name": "A", "roads": [ {{ "x0": 0, "y0": 0, "x1": 1 }} ], "lootTypes": [ {{ "value": 1 }} ] }} ]
                }}"#
            )
        };

        assert!(matches!(parse(&config("1e300", "5.0"), false), Err(ConfigError::Game(_))));
        assert!(matches!(parse(&config("60", "1e300"), false), Err(ConfigError::Game(_))));
        assert!(parse(&config("60", "5.0"), false).is_ok());
    }
}
