//! Sequencing of version-control operations over local working copies.
//!
//! Every public operation:
//! - resolves the working copy from the configured base directory,
//! - takes the per-path lock for the duration of the call,
//! - checks presence fresh from the filesystem,
//! - runs the tool and returns structured results or a step-tagged error.

pub mod locks;
pub mod sync;
pub mod types;

pub use locks::PathLocks;
pub use sync::{SyncOrchestrator, NOTHING_TO_COMMIT_MARKERS};
pub use types::*;
