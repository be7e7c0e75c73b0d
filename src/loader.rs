//! Manifest discovery and loading.
//!
//! [`Loader`] expands the given paths into manifest files and decodes them
//! lazily, one file at a time, yielding the objects that pass the label
//! selector in file order.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::manifest::{self, ManifestObject};
use crate::selector::Selector;

/// Extensions of files picked up while walking a directory.
pub const MANIFEST_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Loader collects the paths and selector for one load.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    paths: Vec<PathBuf>,
    selector: Selector,
}

impl Loader {
    pub fn new() -> Self {
        Loader::default()
    }

    /// Adds a file or directory. Directories are walked recursively.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    pub fn paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Restricts the load to objects whose labels match `selector`.
    pub fn selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }

    /// Returns a lazy iterator over the matching objects.
    ///
    /// The iterator stops after yielding the first error.
    pub fn visit(&self) -> Visitor {
        if !self.selector.is_empty() {
            debug!(selector = %self.selector, "filtering objects by label");
        }
        Visitor {
            roots: self.paths.clone().into_iter(),
            walk: None,
            objects: Vec::new().into_iter(),
            selector: self.selector.clone(),
            seen: HashSet::new(),
            failed: false,
        }
    }

    /// Loads every matching object.
    pub fn load(&self) -> Result<Vec<ManifestObject>> {
        self.visit().collect()
    }
}

/// Visitor is the iterator returned by [`Loader::visit`].
pub struct Visitor {
    roots: std::vec::IntoIter<PathBuf>,
    walk: Option<walkdir::IntoIter>,
    objects: std::vec::IntoIter<ManifestObject>,
    selector: Selector,
    /// Canonical paths of the files already yielded.
    seen: HashSet<PathBuf>,
    failed: bool,
}

impl Visitor {
    /// Returns the next file to read, skipping files that were already
    /// reached through another path argument.
    fn next_file(&mut self) -> Option<Result<PathBuf>> {
        loop {
            let path = match self.next_path()? {
                Ok(path) => path,
                Err(e) => return Some(Err(e)),
            };
            let canonical = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if self.seen.insert(canonical) {
                return Some(Ok(path));
            }
            debug!(file = %path.display(), "skipping file listed more than once");
        }
    }

    fn next_path(&mut self) -> Option<Result<PathBuf>> {
        loop {
            if let Some(walk) = &mut self.walk {
                match walk.next() {
                    Some(Ok(entry)) => {
                        if entry.file_type().is_file() && has_manifest_extension(entry.path()) {
                            return Some(Ok(entry.into_path()));
                        }
                        continue;
                    }
                    Some(Err(source)) => {
                        let path = source.path().map(Path::to_path_buf).unwrap_or_default();
                        return Some(Err(Error::Walk { path, source }));
                    }
                    None => self.walk = None,
                }
            }

            let root = self.roots.next()?;
            match fs::metadata(&root) {
                Ok(meta) if meta.is_dir() => {
                    debug!(dir = %root.display(), "walking directory");
                    self.walk = Some(WalkDir::new(&root).sort_by_file_name().into_iter());
                }
                Ok(_) => return Some(Ok(root)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Some(Err(Error::NotFound { path: root }))
                }
                Err(e) => return Some(Err(Error::io(&root, e))),
            }
        }
    }
}

impl Iterator for Visitor {
    type Item = Result<ManifestObject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            for object in self.objects.by_ref() {
                if self.selector.matches(&object.labels) {
                    return Some(Ok(object));
                }
            }

            let loaded = self.next_file()?.and_then(|path| {
                debug!(file = %path.display(), "reading manifests");
                manifest::read_file(&path)
            });
            match loaded {
                Ok(objects) => self.objects = objects.into_iter(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn has_manifest_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
}
