//! Directory of rendered audio artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::messages::ARTIFACT_EXTENSION;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| Error::io("failed to create audio dir", &root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(Error::invalid(format!("bad artifact name: {name:?}")));
        }
        Ok(self.root.join(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    pub fn write(&self, name: &str, audio: &[u8]) -> Result<PathBuf> {
        let path = self.path(name)?;
        fs::write(&path, audio).map_err(|e| Error::io("failed to write artifact", &path, e))?;
        debug!("Wrote {} bytes to {}", audio.len(), path.display());
        Ok(path)
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        fs::remove_file(&path).map_err(|e| Error::io("failed to delete artifact", &path, e))?;
        debug!("Deleted {}", path.display());
        Ok(())
    }

    /// Names of all artifacts currently on disk, sorted.
    pub fn list(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) => {
                warn!("Failed to list {}: {e}", self.root.display());
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                let is_artifact = Path::new(&name)
                    .extension()
                    .is_some_and(|ext| ext == ARTIFACT_EXTENSION);
                is_artifact.then_some(name)
            })
            .collect();
        names.sort();
        names
    }

    /// Delete every artifact except `keep`. Returns how many were removed.
    ///
    /// Run at startup so files left behind by an interrupted reclamation do
    /// not accumulate.
    pub fn sweep_except(&self, keep: Option<&str>) -> usize {
        let mut removed = 0;
        for name in self.list() {
            if Some(name.as_str()) == keep {
                continue;
            }
            match self.remove(&name) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to sweep stale artifact: {e}"),
            }
        }
        if removed > 0 {
            info!("Swept {removed} stale artifact(s) from {}", self.root.display());
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_names_that_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        assert!(store.path("../messages.json").is_err());
        assert!(store.path("a/b.mp3").is_err());
        assert!(store.path("").is_err());
        assert!(store.write("..", b"x").is_err());
    }

    #[test]
    fn remove_missing_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        assert!(matches!(store.remove("gone.mp3"), Err(Error::Io { .. })));
    }

    #[test]
    fn sweep_keeps_only_the_named_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        store.write("a.mp3", b"a").unwrap();
        store.write("b.mp3", b"b").unwrap();
        store.write("c.mp3", b"c").unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        assert_eq!(store.sweep_except(Some("b.mp3")), 2);
        assert_eq!(store.list(), vec!["b.mp3".to_string()]);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn sweep_without_keep_empties_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        store.write("a.mp3", b"a").unwrap();

        assert_eq!(store.sweep_except(None), 1);
        assert!(store.list().is_empty());
    }
}
