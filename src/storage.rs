use crate::errors::AppError;
use crate::models::RoomLog;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::error;
use uuid::Uuid;

pub fn room_path(dir: &Path, id: Uuid) -> PathBuf {
    dir.join(format!("{id}.json"))
}

pub async fn load_room(dir: &Path, id: Uuid) -> RoomLog {
    let path = room_path(dir, id);
    match fs::read(&path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(log) => log,
            Err(err) => {
                error!(path = %path.display(), "failed to parse room log: {err}");
                RoomLog::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => RoomLog::default(),
        Err(err) => {
            error!(path = %path.display(), "failed to read room log: {err}");
            RoomLog::default()
        }
    }
}

pub async fn persist_room(dir: &Path, id: Uuid, log: &RoomLog) -> Result<(), AppError> {
    let payload = serde_json::to_vec_pretty(log).map_err(AppError::internal)?;
    fs::create_dir_all(dir).await?;
    fs::write(room_path(dir, id), payload).await?;
    Ok(())
}
