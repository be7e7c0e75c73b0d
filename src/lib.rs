//! # bulkube
//!
//! Pin container images to a digest across a tree of Kubernetes manifests.
//!
//! Every Deployment and Job whose containers use the target repository, by
//! tag or by an older digest, is rewritten to `repository@sha256:digest`.
//! Only files holding a changed object are rewritten, and they are written
//! back whole, including objects a label selector left out.
//!
//! ## Modules
//!
//! - [`value`] - In-memory representation of YAML/JSON documents
//! - [`manifest`] - Decoded objects, their identity and the registered kinds
//! - [`selector`] - Label selector parsing and matching
//! - [`loader`] - Discovery and lazy decoding of manifest files
//! - [`image`] - Image reference matching and rewriting
//! - [`update`] - The selection and write passes

pub mod config;
pub mod error;
pub mod image;
pub mod loader;
pub mod manifest;
pub mod selector;
pub mod update;
pub mod value;

pub use config::{Config, UpdateConfig};
pub use error::{Error, Result};
pub use image::ImageTarget;
pub use loader::Loader;
pub use manifest::{ManifestObject, ObjectKey, TypeMeta};
pub use selector::Selector;
pub use update::{run, ChangeSet};
pub use value::Value;
