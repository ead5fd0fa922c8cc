use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::Position;
use crate::traits::CheckpointStore;

/// Checkpoint kept as the decimal text of the next position in a file.
///
/// Saves go through a sibling temporary file and a rename, so an interrupted
/// write never leaves a truncated checkpoint behind.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    path: PathBuf,
}

impl ProgressTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("checkpoint"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn parse_position(content: &str) -> Option<Position> {
    content.trim().parse::<u32>().ok().and_then(Position::new)
}

impl CheckpointStore for ProgressTracker {
    async fn load(&self) -> Result<Position, AppError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    path = %self.path.display(),
                    "No checkpoint yet, starting from the first item"
                );
                return Ok(Position::FIRST);
            }
            Err(e) => return Err(AppError::checkpoint(&self.path, e.to_string())),
        };

        let position = parse_position(&content).ok_or_else(|| {
            AppError::checkpoint(
                &self.path,
                format!("expected a positive integer, found {:?}", content.trim()),
            )
        })?;
        tracing::info!(path = %self.path.display(), %position, "Loaded checkpoint");
        Ok(position)
    }

    async fn save(&self, position: Position) -> Result<(), AppError> {
        let staging = self.staging_path();
        tokio::fs::write(&staging, position.to_string())
            .await
            .map_err(|e| AppError::checkpoint(&staging, e.to_string()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| AppError::checkpoint(&self.path, e.to_string()))?;
        tracing::debug!(%position, "Saved checkpoint");
        Ok(())
    }
}
