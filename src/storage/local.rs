// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable key-value storage for client state.
//!
//! Each key maps to one file under the state directory. Writes go through a
//! temporary file and a rename so a crash never leaves a half-written value.

use crate::error::AppError;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// Key-value storage backed by a directory (or memory, for tests).
#[derive(Clone)]
pub struct LocalStorage {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Dir(PathBuf),
    Memory(Arc<Mutex<HashMap<String, String>>>),
}

impl LocalStorage {
    /// Open storage rooted at `dir`, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        tracing::debug!(path = %dir.display(), "Opened local storage");
        Ok(Self {
            backend: Backend::Dir(dir),
        })
    }

    /// Storage that lives only as long as this value (and its clones).
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    /// Read a value; a missing key is `Ok(None)`.
    pub fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        match &self.backend {
            Backend::Dir(dir) => match std::fs::read_to_string(dir.join(key)) {
                Ok(value) => Ok(Some(value)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(AppError::Storage(format!("Failed to read {}: {}", key, e))),
            },
            Backend::Memory(map) => Ok(lock(map).get(key).cloned()),
        }
    }

    /// Write a value, replacing any previous one.
    pub fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Dir(dir) => {
                let write_err = |e: std::io::Error| {
                    AppError::Storage(format!("Failed to write {}: {}", key, e))
                };
                // Each writer gets its own temp file in the same directory
                let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
                tmp.write_all(value.as_bytes()).map_err(write_err)?;
                tmp.persist(dir.join(key))
                    .map_err(|e| write_err(e.error))?;
                Ok(())
            }
            Backend::Memory(map) => {
                lock(map).insert(key.to_string(), value.to_string());
                Ok(())
            }
        }
    }

    /// Delete a value; removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Dir(dir) => match std::fs::remove_file(dir.join(key)) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(AppError::Storage(format!("Failed to remove {}: {}", key, e))),
            },
            Backend::Memory(map) => {
                lock(map).remove(key);
                Ok(())
            }
        }
    }
}

fn lock(map: &Mutex<HashMap<String, String>>) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
    // A poisoned map still holds consistent strings
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
