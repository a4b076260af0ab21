//! Whole-file reads and atomic whole-file replacement.

use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Atomic write using temp file + rename.
///
/// The temp file lives next to the target so the rename never crosses a
/// filesystem. The target is either fully replaced or left untouched.
pub(crate) async fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
    let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

    if let Err(e) = fs::write(&temp_path, content).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    Ok(())
}

/// Read a whole file. A missing file reads as empty.
pub(crate) async fn read_existing(path: &Path) -> Result<String, std::io::Error> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}
