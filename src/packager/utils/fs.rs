//! File system utilities for bundle assembly.
//!
//! Provides copy operations with automatic parent-directory creation,
//! symlink preservation and idempotent removal. Recursive copies run on the
//! blocking thread pool.

use crate::error::{PackagerError, Result};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Removes the directory and its contents if it exists.
pub async fn remove_dir_all(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()), // Idempotent
        Err(e) => Err(e.into()),
    }
}

/// Creates all of the directories of the specified path, erasing it first if
/// specified.
pub async fn create_dir_all(path: &Path, erase: bool) -> Result<()> {
    if erase {
        remove_dir_all(path).await?;
    }
    Ok(fs::create_dir_all(path).await?)
}

/// Returns true when the directory exists and contains at least one entry.
pub async fn dir_is_populated(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(path).await?;
    Ok(entries.next_entry().await?.is_some())
}

/// Makes a symbolic link to a directory.
#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(unix)]
fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.exists() {
        return Err(PackagerError::Anyhow(anyhow::anyhow!(
            "{from:?} does not exist"
        )));
    }
    if !from.is_file() {
        return Err(PackagerError::Anyhow(anyhow::anyhow!(
            "{from:?} is not a file"
        )));
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir).await?;
    }
    fs::copy(from, to).await?;
    Ok(())
}

/// Recursively copies a directory, preserving symlinks.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    copy_dir_filtered(from, to, |_| true).await
}

/// Recursively copies a directory, skipping entries for which `keep` returns
/// false. The predicate receives each entry's path relative to `from`; a
/// skipped directory is not descended into.
///
/// Creates any parent directories of the destination path as necessary and
/// preserves symlinks.
pub async fn copy_dir_filtered(
    from: &Path,
    to: &Path,
    keep: impl Fn(&Path) -> bool + Send + 'static,
) -> Result<()> {
    if !from.exists() {
        return Err(PackagerError::Anyhow(anyhow::anyhow!(
            "{from:?} does not exist"
        )));
    }
    if !from.is_dir() {
        return Err(PackagerError::Anyhow(anyhow::anyhow!(
            "{from:?} is not a directory"
        )));
    }

    // Clone paths for move into blocking closure
    let from = from.to_path_buf();
    let to = to.to_path_buf();

    // Offload blocking traversal to the dedicated thread pool
    tokio::task::spawn_blocking(move || -> Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut walker = walkdir::WalkDir::new(&from).into_iter();
        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| PackagerError::Anyhow(e.into()))?;
            debug_assert!(entry.path().starts_with(&from));
            let rel_path: PathBuf = entry
                .path()
                .strip_prefix(&from)
                .map_err(|e| PackagerError::Anyhow(e.into()))?
                .to_path_buf();

            if !rel_path.as_os_str().is_empty() && !keep(&rel_path) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            let dest_path = to.join(&rel_path);
            if entry.file_type().is_symlink() {
                let target = std::fs::read_link(entry.path())?;
                if entry.path().is_dir() {
                    symlink_dir(&target, &dest_path)?;
                } else {
                    symlink_file(&target, &dest_path)?;
                }
            } else if entry.file_type().is_dir() {
                std::fs::create_dir_all(dest_path)?;
            } else {
                std::fs::copy(entry.path(), dest_path)?;
            }
        }

        Ok(())
    })
    .await
    .map_err(|e| PackagerError::Anyhow(anyhow::anyhow!("directory copy task panicked: {e}")))?
}
