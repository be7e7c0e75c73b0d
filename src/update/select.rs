//! Selection pass: mutate loaded objects and collect the files that changed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

use crate::config::UpdateConfig;
use crate::error::Result;
use crate::image::update_container_images;
use crate::manifest::{scheme, ManifestObject};

/// Applies the update to one object.
///
/// Returns true if the object must be written back: one of its images
/// changed, or it is a workload and `force` is set.
pub fn update_object(object: &mut ManifestObject, config: &UpdateConfig) -> bool {
    let Some(workload) = scheme::workload(object.type_meta()) else {
        return false;
    };
    let changed = match (&config.target, workload.containers_mut(&mut object.body)) {
        (Some(target), Some(containers)) => update_container_images(containers, target),
        _ => false,
    };
    changed || config.force
}

/// FileGroup holds the selected objects of one file in document order.
#[derive(Debug, Default)]
pub struct FileGroup {
    objects: Vec<ManifestObject>,
    changed: Vec<bool>,
}

impl FileGroup {
    fn push(&mut self, object: ManifestObject, changed: bool) {
        self.objects.push(object);
        self.changed.push(changed);
    }

    pub fn has_changes(&self) -> bool {
        self.changed.iter().any(|c| *c)
    }

    /// Consumes the group, keeping only the changed objects.
    fn into_changed(self) -> Vec<ManifestObject> {
        self.objects
            .into_iter()
            .zip(self.changed)
            .filter_map(|(object, changed)| changed.then_some(object))
            .collect()
    }
}

/// ChangeSet maps each file with at least one changed object to those
/// objects, in the order they appear in the file.
#[derive(Debug, Default)]
pub struct ChangeSet {
    files: BTreeMap<PathBuf, Vec<ManifestObject>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of files with changes.
    pub fn len(&self) -> usize {
        self.files.len()
    }

}

impl IntoIterator for ChangeSet {
    type Item = (PathBuf, Vec<ManifestObject>);
    type IntoIter = std::collections::btree_map::IntoIter<PathBuf, Vec<ManifestObject>>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// Runs the selection pass over `objects`.
///
/// The first error from the source aborts the pass; nothing has been written
/// at that point.
pub fn select_changes<I>(objects: I, config: &UpdateConfig) -> Result<ChangeSet>
where
    I: IntoIterator<Item = Result<ManifestObject>>,
{
    let mut groups: BTreeMap<PathBuf, FileGroup> = BTreeMap::new();
    for object in objects {
        let mut object = object?;
        let changed = update_object(&mut object, config);
        debug!(object = %object.key, file = %object.source.display(), changed, "selected object");
        groups
            .entry(object.source.clone())
            .or_default()
            .push(object, changed);
    }

    let files = groups
        .into_iter()
        .filter(|(_, group)| group.has_changes())
        .map(|(path, group)| (path, group.into_changed()))
        .collect();
    Ok(ChangeSet { files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::image::ImageTarget;
    use crate::manifest::decode_documents;
    use crate::value::from_yaml_documents;
    use std::path::Path;

    fn objects(file: &str, yaml: &str) -> Vec<ManifestObject> {
        decode_documents(Path::new(file), from_yaml_documents(yaml).unwrap()).unwrap()
    }

    fn workload(kind: &str, api_version: &str, name: &str, image: &str) -> String {
        format!(
            "apiVersion: {api_version}\nkind: {kind}\nmetadata:\n  name: {name}\nspec:\n  template:\n    spec:\n      containers:\n      - name: main\n        image: {image}\n---\n"
        )
    }

    fn config(repository: &str, digest: &str) -> UpdateConfig {
        UpdateConfig {
            target: Some(ImageTarget::new(repository, digest)),
            force: false,
        }
    }

    #[test]
    fn test_update_object_dispatches_on_kind() {
        let cfg = config("repo/x", "bbb");
        let mut objs = objects(
            "a.yaml",
            &[
                workload("Deployment", "apps/v1", "d", "repo/x:1"),
                workload("Job", "batch/v1", "j", "repo/x:1"),
                workload("StatefulSet", "apps/v1", "s", "repo/x:1"),
            ]
            .concat(),
        );
        let changed: Vec<bool> = objs.iter_mut().map(|o| update_object(o, &cfg)).collect();
        assert_eq!(changed, vec![true, true, false]);
        assert_eq!(
            objs[2].body.lookup(&["spec", "template", "spec", "containers"]).unwrap().as_list().unwrap()[0]
                .lookup_str(&["image"]),
            Some("repo/x:1")
        );
    }

    #[test]
    fn test_force_marks_workloads_only() {
        let cfg = UpdateConfig {
            target: None,
            force: true,
        };
        let mut objs = objects(
            "a.yaml",
            &format!(
                "{}apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n",
                workload("Deployment", "apps/v1", "d", "repo/x:1")
            ),
        );
        assert!(update_object(&mut objs[0], &cfg));
        assert!(!update_object(&mut objs[1], &cfg));
    }

    #[test]
    fn test_change_set_keeps_only_changed_files_and_objects() {
        let mut all = objects(
            "a.yaml",
            &[
                workload("Deployment", "apps/v1", "one", "repo/x:1"),
                workload("Deployment", "apps/v1", "two", "repo/y:1"),
                workload("Job", "batch/v1", "three", "repo/x@sha256:aaa"),
            ]
            .concat(),
        );
        all.extend(objects("b.yaml", &workload("Deployment", "apps/v1", "four", "repo/y:1")));

        let changes = select_changes(all.into_iter().map(Ok), &config("repo/x", "bbb")).unwrap();
        let files: BTreeMap<_, _> = changes.into_iter().collect();
        assert_eq!(files.len(), 1);
        let names: Vec<_> = files[Path::new("a.yaml")].iter().map(|o| o.key.name.as_str()).collect();
        assert_eq!(names, vec!["one", "three"]);
    }

    #[test]
    fn test_source_error_aborts() {
        let good = objects("a.yaml", &workload("Deployment", "apps/v1", "d", "repo/x:1"));
        let source = good
            .into_iter()
            .map(Ok)
            .chain(std::iter::once(Err(Error::NotFound {
                path: PathBuf::from("missing.yaml"),
            })));
        let err = select_changes(source, &config("repo/x", "bbb")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
