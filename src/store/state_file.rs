//! Game state persisted to a JSON file between runs

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::game::GameSnapshot;

use super::StoreError;

/// Writes to a sibling temp file first so a crash never leaves a half-written state file
pub async fn save(path: &Path, snapshot: &GameSnapshot) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(snapshot)?;
    let tmp = temp_path(path);

    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;

    debug!(
        path = %path.display(),
        sessions = snapshot.sessions.len(),
        bytes = json.len(),
        "Game state saved"
    );
    Ok(())
}

/// `None` when no state was saved yet
pub async fn load(path: &Path) -> Result<Option<GameSnapshot>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No saved game state");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let snapshot = serde_json::from_slice(&bytes)?;
    Ok(Some(snapshot))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
