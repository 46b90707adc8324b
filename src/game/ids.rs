//! Small integer identifiers and the bounded pools that hand them out

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Player identifier, unique within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

/// Loot identifier, unique within a session while the item exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LootId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pool of ids in `0..capacity`; the lowest free id is always handed out first
#[derive(Debug, Clone)]
pub struct IdPool {
    capacity: u32,
    free: BTreeSet<u32>,
}

/// Id bookkeeping failures. Both indicate a simulator bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdPoolError {
    #[error("id {0} is out of range")]
    OutOfRange(u32),

    #[error("id {0} is already taken")]
    AlreadyTaken(u32),

    #[error("id {0} is not taken")]
    NotTaken(u32),
}

impl IdPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            free: (0..capacity).collect(),
        }
    }

    pub fn has_free(&self) -> bool {
        !self.free.is_empty()
    }

    /// Take the lowest free id, `None` when exhausted
    pub fn allocate(&mut self) -> Option<u32> {
        self.free.pop_first()
    }

    /// Take a specific id, used when rebuilding a session from a snapshot
    pub fn claim(&mut self, id: u32) -> Result<(), IdPoolError> {
        if id >= self.capacity {
            return Err(IdPoolError::OutOfRange(id));
        }
        if !self.free.remove(&id) {
            return Err(IdPoolError::AlreadyTaken(id));
        }
        Ok(())
    }

    pub fn release(&mut self, id: u32) -> Result<(), IdPoolError> {
        if id >= self.capacity {
            return Err(IdPoolError::OutOfRange(id));
        }
        if !self.free.insert(id) {
            return Err(IdPoolError::NotTaken(id));
        }
        Ok(())
    }
}
