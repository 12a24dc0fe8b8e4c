//! Repository identities and their local working copies.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::paths;

/// A repository as reported by the remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRef {
    /// Unique per account; also the local directory name.
    pub name: String,
    /// Clone endpoint (ssh or https).
    pub remote_url: String,
}

impl RepositoryRef {
    pub fn new(name: impl Into<String>, remote_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remote_url: remote_url.into(),
        }
    }

    /// A reference for an already-cloned repository whose remote URL is not
    /// needed (every operation except clone).
    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name, String::new())
    }
}

/// A repository bound to its location under a base directory.
///
/// Built fresh for every operation; presence is queried on demand.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    reference: RepositoryRef,
    local_path: PathBuf,
}

impl LocalRepository {
    pub fn new(base_dir: &Path, reference: &RepositoryRef) -> Result<Self> {
        let local_path = paths::resolve(base_dir, &reference.name)?;
        Ok(Self {
            reference: reference.clone(),
            local_path,
        })
    }

    pub fn reference(&self) -> &RepositoryRef {
        &self.reference
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Checks the filesystem now; the answer is not remembered.
    pub fn is_present(&self) -> bool {
        paths::exists(&self.local_path)
    }
}
