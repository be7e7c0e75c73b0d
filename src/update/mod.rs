//! Update module - Pin image digests and write back the files that changed.
//!
//! An update runs in two passes. The selection pass mutates the loaded,
//! label-filtered objects and records which files hold changes. The write
//! pass reloads each of those files in full, splices in the changed objects
//! and rewrites the file. Files without changes are never opened for writing.

mod select;
mod write;


pub use select::*;
pub use write::*;

use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::error::Result;

/// Runs both passes for `config` and returns the files that were rewritten.
pub fn run(config: &Config) -> Result<Vec<PathBuf>> {
    let changes = select_changes(config.loader().visit(), &config.update)?;
    if changes.is_empty() {
        info!("no manifests needed updating");
        return Ok(Vec::new());
    }
    info!(files = changes.len(), "writing updated manifests");
    write_changes(changes)
}
