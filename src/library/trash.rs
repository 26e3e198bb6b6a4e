//! Deleted images are moved into a trash directory instead of being unlinked.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

pub struct Trash {
    dir: PathBuf,
}

impl Trash {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Move `path` into the trash and return where it landed.
    pub fn move_in(&self, path: &Path) -> Result<PathBuf> {
        if !path.is_file() {
            anyhow::bail!("No such image: {:?}", path);
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create trash directory: {:?}", self.dir))?;

        let dst = self.free_name(path);
        if let Err(e) = fs::rename(path, &dst) {
            // Rename fails across filesystems; fall back to copying.
            debug!("Rename failed ({}), copying {:?} to {:?}", e, path, dst);
            fs::copy(path, &dst)
                .with_context(|| format!("Failed to copy {:?} to the trash", path))?;
            fs::remove_file(path).with_context(|| format!("Failed to delete {:?}", path))?;
        }
        debug!(?path, ?dst, "Moved to trash");
        Ok(dst)
    }

    /// `dir/name`, or `dir/stem-<hash>.ext` if that is taken.
    fn free_name(&self, path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let dst = self.dir.join(&name);
        if !dst.exists() {
            return dst;
        }

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let tag = xxh3_64(format!("{}:{}", path.display(), nanos).as_bytes()) as u32;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name);
        match path.extension() {
            Some(ext) => self
                .dir
                .join(format!("{stem}-{tag:08x}.{}", ext.to_string_lossy())),
            None => self.dir.join(format!("{stem}-{tag:08x}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_move_in_keeps_name() {
        let photos = tempdir().unwrap();
        let data = tempdir().unwrap();
        let path = photos.path().join("a.jpg");
        fs::write(&path, b"first").unwrap();

        let trash = Trash::new(data.path().join("trash"));
        let dst = trash.move_in(&path).unwrap();

        assert!(!path.exists());
        assert_eq!(dst, data.path().join("trash").join("a.jpg"));
        assert_eq!(fs::read(&dst).unwrap(), b"first");
    }

    #[test]
    fn test_name_clash_gets_suffix() {
        let photos = tempdir().unwrap();
        let data = tempdir().unwrap();
        let trash = Trash::new(data.path());
        let path = photos.path().join("a.jpg");

        fs::write(&path, b"first").unwrap();
        let first = trash.move_in(&path).unwrap();
        fs::write(&path, b"second").unwrap();
        let second = trash.move_in(&path).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.extension().unwrap(), "jpg");
        assert_eq!(fs::read(&first).unwrap(), b"first");
        assert_eq!(fs::read(&second).unwrap(), b"second");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let data = tempdir().unwrap();
        let trash = Trash::new(data.path());
        assert!(trash.move_in(&data.path().join("nope.png")).is_err());
    }
}
