//! Run configuration.

use std::path::PathBuf;

use crate::image::ImageTarget;
use crate::loader::Loader;
use crate::selector::Selector;

/// UpdateConfig controls which objects the selection pass marks as changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateConfig {
    /// Image to pin. With no target nothing is mutated.
    pub target: Option<ImageTarget>,
    /// Rewrite every selected workload even if none of its images changed.
    pub force: bool,
}

/// Config is everything one invocation needs.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub paths: Vec<PathBuf>,
    pub selector: Selector,
    pub update: UpdateConfig,
}

impl Config {
    /// Returns a loader over the configured paths, filtered by the selector.
    pub fn loader(&self) -> Loader {
        Loader::new()
            .paths(self.paths.iter().cloned())
            .selector(self.selector.clone())
    }
}
