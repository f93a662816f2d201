// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tags file lookup
//!
//! - [`file`]: page-descriptor index and binary search over a sorted tags file
//! - [`iterator`]: walks the lines matching a tag from the range the index finds
//! - [`line`]: splits a tag line into its fields
//! - [`list`]: collects matching records and relocates them in source files

pub mod file;
pub mod iterator;
pub mod line;
pub mod list;

pub use file::{IndexOptions, TagFile, TagRange};
pub use iterator::{distinct_tags, TagIterator};
pub use line::{TagKind, TagLineProps};
pub use list::{
    extend_over_extension, leading_word_len, read_lines, BufferLineSource, FileLineSource,
    LineSource, TagList, TagRecord,
};

use serde::Serialize;
use std::cmp::Ordering;

/// Key ordering of a tags file, fixed when the file is opened
///
/// ctags folds case to upper case when it sorts with `--sort=foldcase`, so
/// `_` orders after letters in both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagOrder {
    #[default]
    CaseSensitive,
    CaseInsensitive,
}

impl TagOrder {
    /// Order implied by the value of `!_TAG_FILE_SORTED`. `None` for 0
    /// (unsorted).
    pub fn from_sorted_flag(value: u32) -> Option<Self> {
        match value {
            0 => None,
            2 => Some(TagOrder::CaseInsensitive),
            _ => Some(TagOrder::CaseSensitive),
        }
    }

    pub fn is_case_insensitive(self) -> bool {
        self == TagOrder::CaseInsensitive
    }

    /// Lexicographic comparison, a proper prefix ordering first
    pub fn compare(self, a: &[u8], b: &[u8]) -> Ordering {
        match self {
            TagOrder::CaseSensitive => a.cmp(b),
            TagOrder::CaseInsensitive => a
                .iter()
                .map(u8::to_ascii_uppercase)
                .cmp(b.iter().map(u8::to_ascii_uppercase)),
        }
    }

    pub fn eq(self, a: &[u8], b: &[u8]) -> bool {
        a.len() == b.len() && self.compare(a, b) == Ordering::Equal
    }

    /// Position of the first occurrence of `needle` in `haystack`
    pub fn find(self, haystack: &[u8], needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || needle.len() > haystack.len() {
            return None;
        }
        haystack
            .windows(needle.len())
            .position(|w| self.eq(w, needle))
    }
}
