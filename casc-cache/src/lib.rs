//! On-disk caching for CASC builds.
//!
//! The cache root holds one directory per build under `builds/`, an
//! external listfile under `listfile/`, and the persisted TACT key ring at
//! `tact.json`. Build directories pair every stored blob with a SHA-1
//! entry in `integrity.json`; a blob that no longer matches its digest is
//! treated as absent, never as an error.

pub mod build_cache;
pub mod error;

pub use build_cache::BuildCache;
pub use error::{Error, Result};

use std::path::{Path, PathBuf};

/// Cache-root directory layout.
#[derive(Debug, Clone)]
pub struct CascDirs {
    root: PathBuf,
}

impl CascDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default cache root under the user's home directory.
    pub fn default_root() -> Result<Self> {
        let home = dirs::home_dir().ok_or(Error::NoHomeDirectory)?;
        Ok(Self::new(home.join(".casc-extract").join("casc")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-build cache directories live here.
    pub fn builds_dir(&self) -> PathBuf {
        self.root.join("builds")
    }

    /// Directory for the externally maintained listfile.
    pub fn listfile_dir(&self) -> PathBuf {
        self.root.join("listfile")
    }

    pub fn listfile_path(&self) -> PathBuf {
        self.listfile_dir().join("listfile.txt")
    }

    /// Persisted TACT key ring.
    pub fn tact_keys_path(&self) -> PathBuf {
        self.root.join("tact.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let dirs = CascDirs::new("/tmp/cache");
        assert_eq!(dirs.builds_dir(), PathBuf::from("/tmp/cache/builds"));
        assert_eq!(
            dirs.listfile_path(),
            PathBuf::from("/tmp/cache/listfile/listfile.txt")
        );
        assert_eq!(dirs.tact_keys_path(), PathBuf::from("/tmp/cache/tact.json"));
    }
}
