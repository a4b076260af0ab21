//! The local identity token, generated once and never changed.

use kws_types::error::{KwsError, KwsResult};
use std::path::Path;
use tracing::info;

/// Read the identity from `path`.
pub fn load_identity(path: &Path) -> KwsResult<String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(KwsError::Identity(format!(
                "no identity at {}, run `kws init` first",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    let identity = contents.trim();
    if identity.is_empty() {
        return Err(KwsError::Identity(format!(
            "identity file {} is empty",
            path.display()
        )));
    }
    Ok(identity.to_string())
}

/// Return the identity at `path`, generating a new one if none exists.
///
/// The flag is true when a new identity was written.
pub fn ensure_identity(path: &Path) -> KwsResult<(String, bool)> {
    if path.exists() {
        return load_identity(path).map(|identity| (identity, false));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let identity = uuid::Uuid::new_v4().to_string();
    std::fs::write(path, &identity)?;
    info!(path = %path.display(), "Generated new identity");
    Ok((identity, true))
}
