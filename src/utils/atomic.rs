//! Atomic file operations
//!
//! Snapshot files are replaced with the write-temp-then-rename pattern:
//!
//! 1. Write to a temporary file (.tmp)
//! 2. Call sync_all() to flush to disk
//! 3. Optionally move the current file aside as a backup
//! 4. Rename temp file to final path (atomic on most filesystems)
//!
//! A reader therefore sees either the old or the new version, never a
//! partially written file.

use std::io;
use std::path::Path;

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Atomically replace `path` with `content`
pub async fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> io::Result<()> {
    atomic_write_with_backup(path, content, None::<&Path>).await
}

/// Atomically replace `path`, keeping its previous version at `backup`
pub async fn atomic_write_with_backup<P, B>(path: P, content: &[u8], backup: Option<B>) -> io::Result<()>
where
    P: AsRef<Path>,
    B: AsRef<Path>,
{
    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    {
        let mut file = File::create(&temp_path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
    }

    if let Some(backup) = backup {
        match fs::rename(path, backup.as_ref()).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    fs::rename(&temp_path, path).await
}

/// Read a file, mapping "not found" to `None`
pub async fn read_optional<P: AsRef<Path>>(path: P) -> io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
