//! Image reference matching and rewriting.

use std::fmt;
use tracing::debug;

use crate::value::Value;

const DIGEST_SEPARATOR: &str = "@sha256:";

/// ImageTarget is the repository to pin and the digest to pin it to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTarget {
    pub repository: String,
    pub digest: String,
}

impl ImageTarget {
    pub fn new(repository: impl Into<String>, digest: impl Into<String>) -> Self {
        ImageTarget {
            repository: repository.into(),
            digest: digest.into(),
        }
    }

    /// Builds a target from the `-image` and `-sha` flag values.
    ///
    /// An image of the form `repo@sha256:digest` supplies both parts and
    /// takes precedence over `sha`. Returns `None` if either part ends up
    /// empty.
    pub fn from_flags(image: &str, sha: &str) -> Option<ImageTarget> {
        let (repository, digest) = match image.split(DIGEST_SEPARATOR).collect::<Vec<_>>()[..] {
            [repository, digest] => (repository, digest),
            _ => (image, sha),
        };
        if repository.is_empty() || digest.is_empty() {
            return None;
        }
        Some(ImageTarget::new(repository, digest))
    }

    /// Returns true if `image` refers to this repository by tag or by digest.
    ///
    /// This is a plain prefix test on `repository:` and `repository@sha256`,
    /// not a reference parse. Any tag and any existing digest match, and so
    /// does a registry host named like the repository (`foo` matches
    /// `foo:5000/bar:1`).
    pub fn matches(&self, image: &str) -> bool {
        match image.strip_prefix(self.repository.as_str()) {
            Some(rest) => rest.starts_with(':') || rest.starts_with("@sha256"),
            None => false,
        }
    }

    /// Returns the pinned reference, `repository@sha256:digest`.
    pub fn pinned(&self) -> String {
        format!("{}{}{}", self.repository, DIGEST_SEPARATOR, self.digest)
    }
}

impl fmt::Display for ImageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pinned())
    }
}

/// Rewrites every container in `containers` whose image matches `target`.
///
/// Returns true only if at least one image string actually changed.
/// Containers already pinned to the target digest are rewritten to the same
/// value and do not count, so a second run with the same target reports no
/// changes and leaves every file untouched.
pub fn update_container_images(containers: &mut [Value], target: &ImageTarget) -> bool {
    let pinned = target.pinned();
    let mut changed = false;
    for container in containers.iter_mut() {
        let Some(Value::String(image)) = container.as_map_mut().and_then(|c| c.get_mut("image"))
        else {
            continue;
        };
        if !target.matches(image) {
            continue;
        }
        if *image != pinned {
            debug!(from = %image, to = %pinned, "pinning container image");
            changed = true;
        }
        *image = pinned.clone();
    }
    changed
}
