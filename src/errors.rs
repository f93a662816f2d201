// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the tag engine
//!
//! Every fallible engine operation returns [`TagError`]. Each error maps to one
//! member of the closed [`ErrorKind`] enumeration so callers can branch on the
//! category without matching on message text.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Closed set of error categories reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    General,
    Invalid,
    NotFound,
    NoMore,
    TooBig,
    Already,
    BadState,
    MemAlloc,
    EncodeConv,
    FileNotFound,
    FileTooBig,
    Modified,
    Unsorted,
    FileNotOpen,
    LineTooBig,
    BufferTooShort,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::General => "general failure",
            ErrorKind::Invalid => "invalid input",
            ErrorKind::NotFound => "not found",
            ErrorKind::NoMore => "no more data",
            ErrorKind::TooBig => "value too big",
            ErrorKind::Already => "already done",
            ErrorKind::BadState => "bad state",
            ErrorKind::MemAlloc => "allocation failure",
            ErrorKind::EncodeConv => "encoding conversion failure",
            ErrorKind::FileNotFound => "file not found",
            ErrorKind::FileTooBig => "file too big",
            ErrorKind::Modified => "file modified externally",
            ErrorKind::Unsorted => "unsorted tags file",
            ErrorKind::FileNotOpen => "file not open",
            ErrorKind::LineTooBig => "line too big",
            ErrorKind::BufferTooShort => "buffer too short",
        };
        f.write_str(name)
    }
}

/// Engine error with enough context to report the offending file or offset
#[derive(Debug, Error)]
pub enum TagError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file not found: '{0}'")]
    FileNotFound(PathBuf),

    #[error("file is not open")]
    FileNotOpen,

    #[error("file '{0}' was modified externally")]
    Modified(PathBuf),

    #[error("tags file '{0}' is not sorted")]
    Unsorted(PathBuf),

    #[error("line at offset {offset} does not fit in {limit} bytes")]
    LineTooBig { offset: u64, limit: usize },

    #[error("file '{path}' is too big ({size} bytes)")]
    FileTooBig { path: PathBuf, size: u64 },

    #[error("failed to allocate {0} bytes")]
    MemAlloc(usize),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("value too big: {0}")]
    TooBig(String),

    #[error("bad state: {0}")]
    BadState(String),

    #[error("{0}")]
    General(String),
}

impl TagError {
    /// Wrap an I/O error with the path it occurred on.
    ///
    /// A missing file becomes [`TagError::FileNotFound`] so callers do not have
    /// to inspect the source error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            return TagError::FileNotFound(path);
        }
        TagError::Io { path, source }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TagError::Io { .. } | TagError::General(_) => ErrorKind::General,
            TagError::FileNotFound(_) => ErrorKind::FileNotFound,
            TagError::FileNotOpen => ErrorKind::FileNotOpen,
            TagError::Modified(_) => ErrorKind::Modified,
            TagError::Unsorted(_) => ErrorKind::Unsorted,
            TagError::LineTooBig { .. } => ErrorKind::LineTooBig,
            TagError::FileTooBig { .. } => ErrorKind::FileTooBig,
            TagError::MemAlloc(_) => ErrorKind::MemAlloc,
            TagError::NotFound(_) => ErrorKind::NotFound,
            TagError::Invalid(_) => ErrorKind::Invalid,
            TagError::TooBig(_) => ErrorKind::TooBig,
            TagError::BadState(_) => ErrorKind::BadState,
        }
    }
}

pub type Result<T> = std::result::Result<T, TagError>;

/// Helper functions for creating helpful error messages
pub mod suggestions {
    use std::path::Path;

    /// Get suggestion for a missing tags file
    pub fn tags_not_found_suggestion(name: &str, start: &Path) -> String {
        format!(
            "No '{}' file found in '{}' or any parent directory\n\n\
             Generate one with ctags:\n\
             $ ctags -R --fields=+n .\n\n\
             Or point at an existing file:\n\
             $ tagseek --tags /path/to/tags lookup NAME",
            name,
            start.display()
        )
    }

    /// Get suggestion for an unsorted tags file
    pub fn unsorted_suggestion(path: &Path) -> String {
        format!(
            "Tags file '{}' declares itself unsorted (!_TAG_FILE_SORTED 0)\n\n\
             Binary search needs a sorted file. Regenerate it with:\n\
             $ ctags -R --sort=yes .\n\
             Or for case-insensitive lookups:\n\
             $ ctags -R --sort=foldcase .",
            path.display()
        )
    }

    /// Get suggestion for no results
    pub fn no_results_suggestion(tag: &str) -> String {
        format!(
            "No tags found for '{}'\n\n\
             Try:\n\
             - Prefix matching: tagseek lookup --prefix {}\n\
             - Regenerating the tags file if the source changed",
            tag, tag
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_file_not_found() {
        let err = TagError::io("/nope/tags", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(err.to_string().contains("/nope/tags"));
    }

    #[test]
    fn other_io_errors_stay_general() {
        let err = TagError::io("tags", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.kind(), ErrorKind::General);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::LineTooBig).unwrap();
        assert_eq!(json, "\"line_too_big\"");
    }
}
