//! Merge-and-write pass: splice changed objects back into their files.

use std::collections::{HashMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use super::ChangeSet;
use crate::error::{Error, FileFailure, Result};
use crate::loader::Loader;
use crate::manifest::{self, ManifestObject, ObjectKey};

/// Replaces the objects of `all` that have a changed counterpart.
///
/// Objects are matched by [`ObjectKey`]. When a file holds several objects
/// with the same key, the changed ones are applied in order. Returns the keys
/// of changed objects that found no place in `all`.
pub fn merge_objects(
    all: Vec<ManifestObject>,
    changed: Vec<ManifestObject>,
) -> std::result::Result<Vec<ManifestObject>, Vec<ObjectKey>> {
    let mut pending: HashMap<ObjectKey, VecDeque<ManifestObject>> = HashMap::new();
    for object in changed {
        pending.entry(object.key.clone()).or_default().push_back(object);
    }

    let merged = all
        .into_iter()
        .map(|object| {
            pending
                .get_mut(&object.key)
                .and_then(VecDeque::pop_front)
                .unwrap_or(object)
        })
        .collect();

    let mut missing: Vec<ObjectKey> = pending
        .into_values()
        .flatten()
        .map(|object| object.key)
        .collect();
    if missing.is_empty() {
        Ok(merged)
    } else {
        missing.sort();
        Err(missing)
    }
}

/// Rewrites one file with its changed objects spliced in.
///
/// The file is reloaded without a selector so objects that were filtered out
/// of the selection pass are written back too.
pub fn write_file(path: &Path, changed: Vec<ManifestObject>) -> Result<()> {
    let all = Loader::new().path(path).load()?;
    let merged = merge_objects(all, changed).map_err(|missing| Error::Unmerged {
        path: path.to_path_buf(),
        missing: missing.iter().map(ToString::to_string).collect(),
    })?;
    let content = manifest::encode_objects(&merged)?;

    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Writes every file in the change set.
///
/// Each file is handled on its own: a failure is recorded and the remaining
/// files are still written. Returns the written paths, or
/// [`Error::WriteFailed`] listing every file that could not be written.
pub fn write_changes(changes: ChangeSet) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let mut failures = Vec::new();
    for (path, changed) in changes {
        let count = changed.len();
        match write_file(&path, changed) {
            Ok(()) => {
                info!(file = %path.display(), objects = count, "updated manifest file");
                written.push(path);
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "failed to update manifest file");
                failures.push(FileFailure { path, error: e });
            }
        }
    }

    if failures.is_empty() {
        Ok(written)
    } else {
        Err(Error::WriteFailed { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::decode_documents;
    use crate::value::from_yaml_documents;

    fn objects(yaml: &str) -> Vec<ManifestObject> {
        decode_documents(Path::new("a.yaml"), from_yaml_documents(yaml).unwrap()).unwrap()
    }

    fn config_map(name: &str, data: &str) -> String {
        format!("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {name}\ndata:\n  value: {data}\n---\n")
    }

    fn data(objects: &[ManifestObject]) -> Vec<&str> {
        objects
            .iter()
            .map(|o| o.body.lookup_str(&["data", "value"]).unwrap())
            .collect()
    }

    #[test]
    fn test_merge_replaces_by_identity() {
        let all = objects(&[config_map("a", "old"), config_map("b", "old"), config_map("c", "old")].concat());
        let changed = objects(&[config_map("c", "new"), config_map("a", "new")].concat());

        let merged = merge_objects(all, changed).unwrap();
        assert_eq!(data(&merged), vec!["new", "old", "new"]);
    }

    #[test]
    fn test_merge_duplicate_keys_in_order() {
        let all = objects(&[config_map("a", "first"), config_map("a", "second")].concat());
        let changed = objects(&[config_map("a", "x"), config_map("a", "y")].concat());

        let merged = merge_objects(all, changed).unwrap();
        assert_eq!(data(&merged), vec!["x", "y"]);
    }

    #[test]
    fn test_merge_compares_kind_and_namespace() {
        let all = objects(&[
            config_map("a", "old"),
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: other\ndata:\n  value: old\n".to_string(),
        ]
        .concat());
        let changed = objects(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: other\ndata:\n  value: new\n",
        );

        let merged = merge_objects(all, changed).unwrap();
        assert_eq!(data(&merged), vec!["old", "new"]);
    }

    #[test]
    fn test_merge_reports_missing_objects() {
        let all = objects(&config_map("a", "old"));
        let changed = objects(&config_map("gone", "new"));

        let missing = merge_objects(all, changed).unwrap_err();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "gone");
    }
}
