//! Error types shared by the loader and the update passes.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::selector::SelectorError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error represents any failure while discovering, decoding or rewriting manifests.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("the path {path:?} does not exist")]
    NotFound { path: PathBuf },

    #[error("walking {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{}: failed to parse YAML: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{}: failed to parse JSON: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: document {index}: {message}", .path.display())]
    Decode {
        path: PathBuf,
        index: usize,
        message: String,
    },

    #[error("{}: no kind {kind:?} is registered for version {api_version:?}", .path.display())]
    UnknownKind {
        path: PathBuf,
        api_version: String,
        kind: String,
    },

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("failed to encode {object}: {source}")]
    Encode {
        object: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{}: {} updated object(s) are no longer present in the file: {}", .path.display(), .missing.len(), .missing.join(", "))]
    Unmerged { path: PathBuf, missing: Vec<String> },

    #[error("failed to write {} file(s):{}", .failures.len(), FailureList(.failures))]
    WriteFailed { failures: Vec<FileFailure> },
}

impl Error {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn decode(path: &Path, index: usize, message: impl Into<String>) -> Self {
        Error::Decode {
            path: path.to_path_buf(),
            index,
            message: message.into(),
        }
    }
}

/// FileFailure pairs a manifest file with the error that stopped it from being written.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

struct FailureList<'a>(&'a [FileFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for failure in self.0 {
            write!(f, "\n  {}", failure.error)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_failed_lists_every_file() {
        let err = Error::WriteFailed {
            failures: vec![
                FileFailure {
                    path: PathBuf::from("a.yaml"),
                    error: Error::NotFound {
                        path: PathBuf::from("a.yaml"),
                    },
                },
                FileFailure {
                    path: PathBuf::from("b.yaml"),
                    error: Error::decode(Path::new("b.yaml"), 2, "missing kind"),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "failed to write 2 file(s):\n  the path \"a.yaml\" does not exist\n  b.yaml: document 2: missing kind"
        );
    }

    #[test]
    fn test_unmerged_message() {
        let err = Error::Unmerged {
            path: PathBuf::from("deploy.yaml"),
            missing: vec!["apps/v1, Kind=Deployment default/web".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "deploy.yaml: 1 updated object(s) are no longer present in the file: apps/v1, Kind=Deployment default/web"
        );
    }
}
