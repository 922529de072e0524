//! File store root.
//!
//! All uploaded and downloaded names resolve to a flat file directly inside
//! the store root. Names that could escape it are rejected.

use std::path::{Path, PathBuf};

use parley_proto::ProtocolError;

/// Directory that holds every transferable file.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Store rooted at `root`. The directory is not created.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `name` inside the store.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidFilename` if the name is empty, `.` or `..`,
    ///   or contains a path separator or NUL
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ProtocolError> {
        validate_filename(name)?;
        Ok(self.root.join(name))
    }
}

/// Check that `name` is a single path component.
pub fn validate_filename(name: &str) -> Result<(), ProtocolError> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name == "." || name == ".." {
        "relative path component"
    } else if name.contains(['/', '\\']) {
        "contains a path separator"
    } else if name.contains('\0') {
        "contains NUL"
    } else {
        return Ok(());
    };

    Err(ProtocolError::InvalidFilename { name: name.to_string(), reason })
}
