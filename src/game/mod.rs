//! Game simulation modules

pub mod collision;
pub mod geom;
pub mod ids;
pub mod loot_gen;
pub mod map;
pub mod player;
pub mod registry;
pub mod session;
pub mod snapshot;

pub use geom::Point2;
pub use map::MapId;
pub use player::MoveIntent;
pub use registry::{Game, GameError, GameSettings, Token};
pub use session::{PlayerRecord, SessionSettings};
pub use snapshot::{GameSnapshot, SessionSnapshot};
