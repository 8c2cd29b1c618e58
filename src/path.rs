use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result};

/// An absolute path in the filesystem, split into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePath {
    /// Components of a path not including separators (the `/` character).
    /// Empty for the root directory.
    pub components: Vec<FilePathComponent>,
}

impl FilePath {
    /// Parses an absolute path. Repeated slashes collapse, and a trailing
    /// slash is ignored.
    ///
    /// An empty string is treated as a missing path.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidArgument);
        }
        if !s.starts_with('/') {
            return Err(Error::NotAbsolute);
        }

        let components = s.split('/').filter_map(FilePathComponent::new).collect();
        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

/// A component of a file path. Notably, this cannot include the `/` character,
/// and is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePathComponent(String);

impl FilePathComponent {
    fn new(s: &str) -> Option<Self> {
        if s.is_empty() || s.contains('/') {
            None
        } else {
            Some(Self(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for FilePathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
