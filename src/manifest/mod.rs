//! Manifest module - Decoded Kubernetes objects and their identity.
//!
//! A [`ManifestObject`] keeps the full document tree of one resource along
//! with the file it came from, so it can be written back without losing
//! fields this crate never looks at.

pub mod scheme;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::value::{self, Value};

/// Namespace assigned to namespaced objects that do not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// TypeMeta is the apiVersion/kind discriminator of an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeMeta {
    pub api_version: String,
    pub kind: String,
}

impl TypeMeta {
    pub fn new(api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        TypeMeta {
            api_version: api_version.into(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for TypeMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version, self.kind)
    }
}

/// ObjectKey identifies an object within a file: type, namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub type_meta: TypeMeta,
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{} {}", self.type_meta, self.name)
        } else {
            write!(f, "{} {}/{}", self.type_meta, self.namespace, self.name)
        }
    }
}

/// ManifestObject is one decoded resource and where it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestObject {
    pub source: PathBuf,
    pub key: ObjectKey,
    pub labels: BTreeMap<String, String>,
    pub body: Value,
}

impl ManifestObject {
    /// Decodes one document. `index` is the document's position in the file
    /// and is only used in error messages.
    pub fn decode(source: &Path, index: usize, body: Value) -> Result<ManifestObject> {
        let map = body.as_map().ok_or_else(|| {
            Error::decode(
                source,
                index,
                format!("expected an object, got {}", body.type_name()),
            )
        })?;

        let field = |name: &str| -> Result<String> {
            match map.get(name) {
                Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
                None | Some(Value::Null) | Some(Value::String(_)) => Err(Error::decode(
                    source,
                    index,
                    format!("Object '{}' is missing", name),
                )),
                Some(other) => Err(Error::decode(
                    source,
                    index,
                    format!("'{}' must be a string, got {}", name, other.type_name()),
                )),
            }
        };
        let type_meta = TypeMeta::new(field("apiVersion")?, field("kind")?);

        let info = scheme::lookup(&type_meta).ok_or_else(|| Error::UnknownKind {
            path: source.to_path_buf(),
            api_version: type_meta.api_version.clone(),
            kind: type_meta.kind.clone(),
        })?;

        let name = body
            .lookup_str(&["metadata", "name"])
            .unwrap_or_default()
            .to_string();
        let namespace = match body.lookup_str(&["metadata", "namespace"]) {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ if info.namespaced => DEFAULT_NAMESPACE.to_string(),
            _ => String::new(),
        };
        let labels = decode_labels(source, index, &body)?;

        Ok(ManifestObject {
            source: source.to_path_buf(),
            key: ObjectKey {
                type_meta,
                namespace,
                name,
            },
            labels,
            body,
        })
    }

    pub fn type_meta(&self) -> &TypeMeta {
        &self.key.type_meta
    }

}

fn decode_labels(source: &Path, index: usize, body: &Value) -> Result<BTreeMap<String, String>> {
    let labels = match body.lookup(&["metadata", "labels"]) {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Map(labels)) => labels,
        Some(other) => {
            return Err(Error::decode(
                source,
                index,
                format!("metadata.labels must be a map, got {}", other.type_name()),
            ))
        }
    };
    labels
        .fields
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => Ok((k.clone(), s.clone())),
            other => Err(Error::decode(
                source,
                index,
                format!("label {:?} must be a string, got {}", k, other.type_name()),
            )),
        })
        .collect()
}

/// Returns true for documents of a `*List` kind that carry an `items` sequence.
fn is_list(doc: &Value) -> bool {
    doc.lookup_str(&["kind"])
        .is_some_and(|kind| kind.ends_with("List"))
        && doc.lookup(&["items"]).and_then(Value::as_list).is_some()
}

/// Decodes the documents of one file, in order, flattening lists.
///
/// Empty documents are skipped.
pub fn decode_documents(source: &Path, docs: Vec<Value>) -> Result<Vec<ManifestObject>> {
    let mut objects = Vec::with_capacity(docs.len());
    for (index, doc) in docs.into_iter().enumerate() {
        flatten_into(source, index, doc, &mut objects)?;
    }
    Ok(objects)
}

fn flatten_into(
    source: &Path,
    index: usize,
    doc: Value,
    out: &mut Vec<ManifestObject>,
) -> Result<()> {
    if doc.is_null() {
        return Ok(());
    }
    if is_list(&doc) {
        let Value::Map(mut list) = doc else {
            return Ok(());
        };
        if let Some(Value::List(items)) = list.fields.remove("items") {
            for item in items {
                flatten_into(source, index, item, out)?;
            }
        }
        return Ok(());
    }
    out.push(ManifestObject::decode(source, index, doc)?);
    Ok(())
}

/// Reads and decodes every object in a manifest file.
///
/// Files ending in `.json` hold a single JSON document; anything else is read
/// as a YAML stream.
pub fn read_file(path: &Path) -> Result<Vec<ManifestObject>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let docs = if is_json(path) {
        vec![value::from_json(&content).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?]
    } else {
        value::from_yaml_documents(&content).map_err(|source| Error::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };
    decode_documents(path, docs)
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Encodes objects as a YAML stream, each document preceded by a `---` line.
pub fn encode_objects<'a>(objects: impl IntoIterator<Item = &'a ManifestObject>) -> Result<String> {
    let mut out = String::new();
    for object in objects {
        let doc = value::to_yaml(&object.body).map_err(|source| Error::Encode {
            object: object.key.to_string(),
            source,
        })?;
        out.push_str("---\n");
        out.push_str(&doc);
    }
    Ok(out)
}
