//! Session artifact and resumption cache persistence.
//!
//! # Atomic Writes
//!
//! Both documents are written to a temp file in the target directory and
//! renamed into place, so a failed write never leaves a truncated
//! `cache.json` behind. Each write is attempted twice before giving up.

use std::io::Write;
use std::path::{Path, PathBuf};

use match_recorder_protocol::{artifact_file_name, ResumptionCache, CACHE_FILE_NAME};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::error::{RecorderError, Result};
use crate::machine::CompletedSession;

const WRITE_ATTEMPTS: usize = 2;

/// Outcome of one flush. Failures are already logged by the time this is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub artifact: Option<PathBuf>,
    pub cache_saved: bool,
}

#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    port: u16,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            dir: dir.into(),
            port,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }

    pub fn artifact_path(&self, tag: Option<&str>, game_id: u64) -> PathBuf {
        self.dir.join(artifact_file_name(tag, game_id))
    }

    /// Writes `<tag><gameID>.json`, then the resumption cache.
    pub fn flush(&self, session: &CompletedSession, tag: Option<&str>) -> FlushReport {
        let path = self.artifact_path(tag, session.game_id);
        let artifact = match self.write_artifact(&path, session) {
            Ok(()) => {
                info!(
                    game_id = session.game_id,
                    samples = session.artifact.card_positions.len(),
                    path = %path.display(),
                    "Session written"
                );
                Some(path)
            }
            Err(err) => {
                error!(game_id = session.game_id, error = %err, "Session artifact lost");
                None
            }
        };

        FlushReport {
            artifact,
            cache_saved: self.save_cache(session.game_id),
        }
    }

    /// Overwrites `cache.json` with `{gameID, port}`.
    pub fn save_cache(&self, game_id: u64) -> bool {
        let cache = ResumptionCache {
            game_id,
            port: self.port,
        };
        let path = self.cache_path();
        match write_json_with_retry(&path, &cache, |path, source| RecorderError::CacheWrite {
            path,
            source,
        }) {
            Ok(()) => {
                info!(game_id, port = self.port, "Resumption cache saved");
                true
            }
            Err(err) => {
                error!(
                    game_id,
                    port = self.port,
                    error = %err,
                    "Resumption cache lost; game numbering will not survive a restart"
                );
                false
            }
        }
    }

    fn write_artifact(&self, path: &Path, session: &CompletedSession) -> Result<()> {
        write_json_with_retry(path, &session.artifact, |path, source| {
            RecorderError::ArtifactWrite { path, source }
        })
    }
}

fn write_json_with_retry<T, F>(path: &Path, value: &T, on_io: F) -> Result<()>
where
    T: Serialize,
    F: Fn(PathBuf, std::io::Error) -> RecorderError,
{
    let payload = serde_json::to_vec(value).map_err(|source| RecorderError::Json {
        context: format!("serialize {}", path.display()),
        source,
    })?;

    let mut attempt = 1;
    loop {
        match write_atomic(path, &payload) {
            Ok(()) => return Ok(()),
            Err(err) if attempt < WRITE_ATTEMPTS => {
                warn!(path = %path.display(), attempt, error = %err, "Write failed, retrying");
                attempt += 1;
            }
            Err(err) => return Err(on_io(path.to_path_buf(), err)),
        }
    }
}

fn write_atomic(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = NamedTempFile::new_in(parent)?;
    temp_file.write_all(payload)?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Reads `cache.json` from `dir`. A missing file is `None`; a corrupt one is an error.
pub fn load_resumption_cache(dir: &Path) -> Result<Option<ResumptionCache>> {
    let path = dir.join(CACHE_FILE_NAME);
    let data = match fs_err::read(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(RecorderError::CacheRead { path, source }),
    };

    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| RecorderError::CacheMalformed { path, source })
}
