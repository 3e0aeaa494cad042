//! Writing generated files into the configuration directory

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Replace `path` with `contents` without exposing a partial file
///
/// The text goes to a temporary sibling first, which is renamed over the
/// target.
pub async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("Failed to replace {}", path.display()));
    }
    debug!(path = %path.display(), bytes = contents.len(), "Wrote configuration file");
    Ok(())
}

/// Remove the file of a resource that is being deleted; a missing file is fine
pub async fn remove_stale(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!(path = %path.display(), "Removed configuration of deleted resource");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data1.res");
        write_atomic(&path, "first\n").await.unwrap();
        write_atomic(&path, "second\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
        assert!(!dir.path().join("data1.res.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("data1.res");
        assert!(write_atomic(&path, "x").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.res");
        std::fs::write(&path, "x").unwrap();

        assert!(remove_stale(&path).await.unwrap());
        assert!(!path.exists());
        assert!(!remove_stale(&path).await.unwrap());
    }

    #[test]
    fn test_tmp_path() {
        assert_eq!(
            tmp_path(Path::new("/var/lib/blockrepl.d/data1.res")),
            PathBuf::from("/var/lib/blockrepl.d/data1.res.tmp")
        );
    }
}
