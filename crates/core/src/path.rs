//! Command-line path parsing
//!
//! Remote locations are written `alias[/bucket[/object]]`. Anything that
//! looks like a filesystem path is local.

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// An S3 location under a configured alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    pub alias: String,
    pub bucket: Option<String>,
    pub object: Option<String>,
}

impl RemotePath {
    pub fn new(alias: impl Into<String>, bucket: Option<&str>, object: Option<&str>) -> Self {
        Self {
            alias: alias.into(),
            bucket: bucket.map(str::to_string),
            object: object.map(str::to_string),
        }
    }

    /// Bucket name, or an error naming the path if there is none
    pub fn require_bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| Error::InvalidPath(format!("'{self}' does not name a bucket")))
    }

    /// Bucket and object name, or an error naming the path
    pub fn require_object(&self) -> Result<(&str, &str)> {
        let bucket = self.require_bucket()?;
        let object = self
            .object
            .as_deref()
            .ok_or_else(|| Error::InvalidPath(format!("'{self}' does not name an object")))?;
        Ok((bucket, object))
    }

    /// Whether the object part ends with `/`, i.e. is a prefix
    pub fn is_prefix(&self) -> bool {
        self.object.as_deref().is_none_or(|o| o.ends_with('/'))
    }

    /// Same location with `name` appended to the object part
    pub fn join(&self, name: &str) -> Self {
        let object = match self.object.as_deref() {
            None | Some("") => name.to_string(),
            Some(base) if base.ends_with('/') => format!("{base}{name}"),
            Some(base) => format!("{base}/{name}"),
        };
        Self {
            alias: self.alias.clone(),
            bucket: self.bucket.clone(),
            object: Some(object),
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias)?;
        if let Some(bucket) = &self.bucket {
            write!(f, "/{bucket}")?;
        }
        if let Some(object) = &self.object {
            write!(f, "/{object}")?;
        }
        Ok(())
    }
}

/// Either side of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(RemotePath),
}

/// Classify `path` as a local file or a remote location.
///
/// Absolute paths, `./` and `../` paths, `-` and single components
/// containing a dot are local. Everything else must be `alias[/bucket[/object]]`.
pub fn parse_path(path: &str) -> Result<Location> {
    if path.is_empty() {
        return Err(Error::InvalidPath("Path cannot be empty".into()));
    }

    let looks_local = path == "-"
        || path.starts_with('/')
        || path.starts_with("./")
        || path.starts_with("../")
        || path.contains('\\')
        || (!path.contains('/') && path.contains('.'));
    if looks_local {
        return Ok(Location::Local(PathBuf::from(path)));
    }

    parse_remote(path).map(Location::Remote)
}

/// Parse `alias[/bucket[/object]]`
pub fn parse_remote(path: &str) -> Result<RemotePath> {
    let mut parts = path.splitn(3, '/');
    let alias = parts.next().unwrap_or_default();
    if !is_valid_alias_name(alias) {
        return Err(Error::InvalidPath(format!(
            "'{path}' does not start with a valid alias name"
        )));
    }

    let bucket = parts.next().filter(|b| !b.is_empty());
    let object = parts.next().filter(|o| !o.is_empty());
    if bucket.is_none() && object.is_some() {
        return Err(Error::InvalidPath(format!("'{path}' has an empty bucket name")));
    }

    Ok(RemotePath::new(alias, bucket, object))
}

fn is_valid_alias_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
