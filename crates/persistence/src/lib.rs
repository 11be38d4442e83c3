//! Durable storage of the node's head state.
//!
//! One JSON document in one file, replaced atomically on every save:
//! write to a temp file, fsync, rename over the previous state, fsync the
//! directory. A crash at any point leaves either the old or the new state,
//! never a torn file.
//!
//! Since the head state is a pure function of the input history, persisting
//! the state after each transition is sufficient; no event log is needed.
//! `load ∘ save` is the identity for every serializable state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the state file inside the persistence directory.
const STATE_FILE: &str = "head-state.json";

/// Errors from the state store. All of them are fatal to the node: a party
/// that cannot durably record its state risks signing divergent snapshots.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Atomic single-document store.
pub struct StateStore<T> {
    dir: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> StateStore<T> {
    /// Open (and create if needed) the persistence directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            _marker: PhantomData,
        })
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir.join(format!("{STATE_FILE}.tmp"))
    }

    /// Read the last persisted state, or `None` if nothing was ever saved.
    pub fn load(&self) -> Result<Option<T>, StoreError> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let value = serde_json::from_slice(&data)
            .map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(Some(value))
    }

    /// Atomically replace the persisted state.
    ///
    /// Write-to-temp + fsync + rename, then fsync the directory so the
    /// rename itself is durable.
    pub fn save(&self, value: &T) -> Result<(), StoreError> {
        let tmp_path = self.tmp_path();
        let state_path = self.state_path();

        let data = serde_json::to_vec(value).map_err(|source| StoreError::Corrupt {
            path: state_path.clone(),
            source,
        })?;

        let io_err = |path: &PathBuf| {
            let path = path.clone();
            move |source| StoreError::Io { path, source }
        };

        let mut file = File::create(&tmp_path).map_err(io_err(&tmp_path))?;
        file.write_all(&data).map_err(io_err(&tmp_path))?;
        file.sync_all().map_err(io_err(&tmp_path))?;

        fs::rename(&tmp_path, &state_path).map_err(io_err(&state_path))?;

        #[cfg(unix)]
        {
            if let Ok(dir) = File::open(&self.dir) {
                let _ = dir.sync_all();
            }
        }

        debug!(path = %state_path.display(), bytes = data.len(), "Persisted state");
        Ok(())
    }
}
