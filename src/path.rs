use crate::error::{DfsUtilError, Result};

use std::fmt::{Display, Formatter};

/// An absolute, normalized path inside a filesystem.
///
/// Paths are built from strings such as `/data/logs`, `data/logs` (taken
/// from the root) or `udfs://namenode:42000/data/logs` (scheme and authority
/// are dropped). Empty components and `.` are skipped, `..` removes the
/// previous component but never climbs above the root.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DfsPath {
    components: Vec<String>,
}

impl DfsPath {
    pub fn new(path: &str) -> Result<Self> {
        let path = strip_scheme(path)?;

        let mut components: Vec<String> = Vec::new();
        for part in path.split('/') {
            match part {
                "" | "." => continue,
                ".." => {
                    components.pop();
                }
                part => {
                    if part.contains('\0') {
                        return Err(DfsUtilError::InvalidPath(format!(
                            "'{}' contains a NUL character",
                            path
                        )));
                    }
                    components.push(part.to_owned());
                }
            }
        }

        Ok(Self { components })
    }

    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The final component, empty for the root directory.
    pub fn name(&self) -> &str {
        self.components.last().map(String::as_str).unwrap_or("")
    }

    /// The parent directory, `None` for the root.
    pub fn parent(&self) -> Option<DfsPath> {
        if self.is_root() {
            return None;
        }
        let components = self.components[..self.components.len() - 1].to_vec();
        Some(Self { components })
    }

    pub fn join(&self, child: &str) -> Result<DfsPath> {
        let child = DfsPath::new(child)?;
        let mut components = self.components.clone();
        components.extend(child.components);
        Ok(Self { components })
    }

    /// Appends a single, already valid component.
    pub(crate) fn child(&self, name: &str) -> DfsPath {
        let mut components = self.components.clone();
        components.push(name.to_owned());
        Self { components }
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    /// Whether `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: &DfsPath) -> bool {
        self.components.starts_with(&other.components)
    }
}

fn strip_scheme(path: &str) -> Result<&str> {
    match path.find("://") {
        Some(idx) => {
            let scheme = &path[..idx];
            if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+')
            {
                return Err(DfsUtilError::InvalidPath(format!(
                    "'{}' has an invalid scheme",
                    path
                )));
            }
            let rest = &path[idx + 3..];
            Ok(rest.find('/').map_or("", |start| &rest[start..]))
        }
        None => Ok(path),
    }
}

impl Display for DfsPath {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DfsPath {
    type Err = DfsUtilError;

    fn from_str(path: &str) -> Result<Self> {
        DfsPath::new(path)
    }
}
