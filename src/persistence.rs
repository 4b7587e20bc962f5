//! JSON-file backed collections.
//!
//! Each collection lives in its own pretty-printed JSON document. Loading a
//! missing document first writes the empty collection, so a fresh data
//! directory heals itself on first start. Unreadable or corrupt documents are
//! logged and treated as empty rather than stopping the process.
//!
//! Saves overwrite the document in place. A crash in the middle of a write
//! can leave a truncated file behind, which the next `load` reports and
//! replaces with an empty collection.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct JsonCollection<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCollection<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the collection, initializing the document if it does not exist.
    /// Never fails: errors degrade to an empty collection.
    pub fn load(&self) -> T {
        if !self.path.exists() {
            info!("Initializing empty collection at {}", self.path.display());
            if let Err(e) = self.save(&T::default()) {
                error!("Failed to initialize {}: {e}", self.path.display());
                return T::default();
            }
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to read {}: {e}", self.path.display());
                return T::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => {
                debug!("Loaded {}", self.path.display());
                value
            }
            Err(e) => {
                error!("Failed to parse {}: {e}, treating as empty", self.path.display());
                T::default()
            }
        }
    }

    /// Overwrite the document with `value`.
    pub fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::io("failed to create data dir", parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(value)?;
        fs::write(&self.path, json)
            .map_err(|e| Error::io("failed to write collection", &self.path, e))
    }
}
