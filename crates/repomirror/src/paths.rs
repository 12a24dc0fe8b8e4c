//! Mapping of repository names to working-copy locations.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SyncError};

/// Resolves the working-copy path for `name` under `base_dir`.
///
/// The path is always `base_dir/name`. Names must be a single normal path
/// component so that each repository gets exactly one direct subdirectory.
pub fn resolve(base_dir: &Path, name: &str) -> Result<PathBuf> {
    validate_name(name)?;
    Ok(base_dir.join(name))
}

/// Whether something exists at `path` right now. Never cached.
pub fn exists(path: &Path) -> bool {
    path.exists()
}

fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| SyncError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.trim().is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("name must not contain path separators"));
    }
    if name.contains('\0') {
        return Err(invalid("name must not contain NUL bytes"));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid("name must be a single directory name")),
    }
}
