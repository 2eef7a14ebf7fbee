//! Include resolution
//!
//! The preprocessor never touches the file system itself; `#include` goes
//! through an [`IncludeResolver`] supplied by the host.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("cannot find include file '{0}'")]
    NotFound(String),

    #[error("cannot read include file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Supplies the text of `#include`d files.
pub trait IncludeResolver {
    /// Read `file_path` as written in the directive, relative to the
    /// directory of the including file.
    fn read_file(&self, base_path: &str, file_path: &str) -> Result<String, IncludeError>;

    /// The path `read_file` would load, with `/` separators. Two includes
    /// that resolve to the same path are the same file for `#pragma once`.
    fn resolve_path(&self, base_path: &str, file_path: &str) -> String {
        join_path(base_path, file_path)
    }
}

/// Directory of `file_path` once joined onto `base_path`; the base path of
/// everything the included file includes in turn.
pub fn include_base_path(base_path: &str, file_path: &str) -> String {
    let joined = join_path(base_path, file_path);
    match joined.rfind('/') {
        Some(slash) => joined[..slash].to_string(),
        None => String::new(),
    }
}

/// `file_path` relative to `base_path`, with `/` separators.
pub(crate) fn join_path(base_path: &str, file_path: &str) -> String {
    let file_path = file_path.replace('\\', "/");
    if base_path.is_empty() || file_path.starts_with('/') {
        file_path
    } else {
        format!("{}/{}", base_path.trim_end_matches(['/', '\\']), file_path)
    }
}

/// Reads includes from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemIncludeResolver;

impl IncludeResolver for FileSystemIncludeResolver {
    fn read_file(&self, base_path: &str, file_path: &str) -> Result<String, IncludeError> {
        let path = Path::new(base_path).join(file_path);
        fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => IncludeError::NotFound(file_path.to_string()),
            _ => IncludeError::Io { path, source },
        })
    }
}

/// Serves includes from a map of path to text.
///
/// Lookups try the path joined onto the base path first, then the path as
/// written.
#[derive(Debug, Clone, Default)]
pub struct MemoryIncludeResolver {
    files: FxHashMap<String, String>,
}

impl MemoryIncludeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl IncludeResolver for MemoryIncludeResolver {
    fn read_file(&self, base_path: &str, file_path: &str) -> Result<String, IncludeError> {
        self.files
            .get(&self.resolve_path(base_path, file_path))
            .cloned()
            .ok_or_else(|| IncludeError::NotFound(file_path.to_string()))
    }

    fn resolve_path(&self, base_path: &str, file_path: &str) -> String {
        let joined = join_path(base_path, file_path);
        if !self.files.contains_key(&joined) && self.files.contains_key(file_path) {
            return file_path.to_string();
        }
        joined
    }
}
