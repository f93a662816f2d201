// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command implementations

pub mod complete;
pub mod info;
pub mod locate;
pub mod lookup;
pub mod range;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use tagseek::config::{find_tags_file, Config};
use tagseek::errors::suggestions::{tags_not_found_suggestion, unsorted_suggestion};
use tagseek::errors::TagError;
use tagseek::tags::{
    extend_over_extension, leading_word_len, TagFile, TagKind, TagList, TagRecord,
};

/// Pick the tags file: `--tags`, then the configured name searched for from
/// the current directory upward.
pub fn resolve_tags_file(explicit: Option<&Path>, config: &Config) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("Tags file not found: {}", path.display());
        }
        return Ok(path.to_path_buf());
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    find_tags_file(&cwd, &config.tags_file)
        .ok_or_else(|| anyhow!(tags_not_found_suggestion(&config.tags_file, &cwd)))
}

/// Split off a `NAME:LINE` or `NAME(LINE)` line hint
pub fn split_query(query: &str) -> (&str, Option<u32>) {
    match TagList::parse_line_hint(query) {
        Some((name, line)) => (name, Some(line)),
        None => (query, None),
    }
}

/// A tag query as typed on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagQuery<'a> {
    text: &'a str,
    tag_len: usize,
    /// Line number given with the tag
    pub line_hint: Option<u32>,
}

impl<'a> TagQuery<'a> {
    /// Without `word` the whole query (minus a line hint) is the tag. With
    /// it the query is text at the cursor and the tag is its leading word.
    pub fn parse(query: &'a str, word: bool) -> Result<Self> {
        if word {
            let tag_len = leading_word_len(query.as_bytes());
            if tag_len == 0 {
                bail!("No identifier at the start of: {}", query);
            }
            return Ok(Self {
                text: query,
                tag_len,
                line_hint: None,
            });
        }
        let (name, line_hint) = split_query(query);
        Ok(Self {
            text: name,
            tag_len: name.len(),
            line_hint,
        })
    }

    pub fn tag(&self) -> &'a str {
        &self.text[..self.tag_len]
    }

    /// The tag extended over a `.ext` that follows it in the text
    pub fn with_extension(&self) -> Option<Self> {
        let end = extend_over_extension(self.text.as_bytes(), self.tag_len)?;
        Some(Self {
            tag_len: end,
            ..*self
        })
    }
}

/// Records for `query` from `tags_path`.
///
/// With no match, the tag extended over a following file extension is tried,
/// then the global tags file.
pub fn populate_list(
    tags_path: &Path,
    global_tags: Option<&Path>,
    query: &TagQuery<'_>,
    prefix: bool,
    max_items: usize,
    config: &Config,
) -> Result<(TagList, String)> {
    let mut list = TagList::new()
        .with_options(config.index_options())
        .with_window_size(config.window_size());
    let mut index = TagFile::open(tags_path, config.index_options()).map_err(explain)?;

    let mut tag = query.tag();
    list.create(tag, tags_path, Some(&mut index), prefix, max_items)
        .map_err(explain)?;

    if list.is_empty() {
        if let Some(extended) = query.with_extension() {
            tag = extended.tag();
            tracing::debug!(tag, "retrying with file extension");
            list.create(tag, tags_path, Some(&mut index), prefix, max_items)
                .map_err(explain)?;
        }
    }

    if list.is_empty() {
        if let Some(global) = global_tags.filter(|g| *g != tags_path) {
            tracing::debug!(tag, global = %global.display(), "retrying in global tags file");
            list.create(tag, global, None, prefix, max_items)
                .map_err(explain)
                .with_context(|| format!("Failed to search {}", global.display()))?;
        }
    }

    Ok((list, tag.to_string()))
}

/// Turn engine errors into messages for the terminal
pub fn explain(err: TagError) -> anyhow::Error {
    match err {
        TagError::Unsorted(path) => anyhow!(unsorted_suggestion(&path)),
        other => other.into(),
    }
}

/// One tag record for JSON output
#[derive(Debug, Serialize)]
pub struct RecordResult {
    pub tag: String,
    pub file: String,
    pub ex_cmd: String,
    pub kind: TagKind,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ext_fields: String,
}

impl From<&TagRecord<'_>> for RecordResult {
    fn from(record: &TagRecord<'_>) -> Self {
        let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
        Self {
            tag: text(record.tag),
            file: text(record.file_name),
            ex_cmd: text(record.ex_cmd),
            kind: record.kind,
            kind_text: text(record.kind_text),
            line: record.declared_line(),
            ext_fields: text(record.ext_fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_line_hints() {
        assert_eq!(split_query("main.c:10"), ("main.c", Some(10)));
        assert_eq!(split_query("main"), ("main", None));
        assert_eq!(split_query("std::vector"), ("std::vector", None));
    }

    #[test]
    fn word_queries() {
        let query = TagQuery::parse("main.c:10", false).expect("parse");
        assert_eq!(query.tag(), "main.c");
        assert_eq!(query.line_hint, Some(10));
        assert!(query.with_extension().is_none());

        let query = TagQuery::parse("util.h\"", true).expect("parse");
        assert_eq!(query.tag(), "util");
        assert_eq!(query.with_extension().expect("ext").tag(), "util.h");
        assert!(TagQuery::parse("(x)", true).is_err());
    }
}
