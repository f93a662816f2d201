// SPDX-License-Identifier: MIT OR Apache-2.0

//! Iteration over the lines of one tag

use std::cmp::Ordering;

use super::file::{TagFile, TagRange};
use super::line::TagLineProps;
use super::TagOrder;
use crate::errors::{Result, TagError};
use crate::reader::{ReaderWindow, ScanStep};

/// Window size used when `init` is given 0, and the configured default
pub const DEFAULT_WINDOW_SIZE: usize = 128 * 1024;

// Header lines such as `!_TAG_FILE_SORTED` are never records
const PSEUDO_TAG_PREFIX: &[u8] = b"!_";

/// Yields the lines whose tag matches a query, in file order
///
/// The scan starts at the range [`TagFile::lookup`] returns, skips lines
/// that sort before the query and stops at the first line that sorts after
/// it.
pub struct TagIterator<'a> {
    window: Option<ReaderWindow<'a>>,
    tag: Vec<u8>,
    order: TagOrder,
    prefix_match: bool,
    first_line: bool,
    on_line: bool,
    done: bool,
    line_count: usize,
}

impl<'a> TagIterator<'a> {
    pub fn new(prefix_match: bool) -> Self {
        Self {
            window: None,
            tag: Vec::new(),
            order: TagOrder::CaseSensitive,
            prefix_match,
            first_line: false,
            on_line: false,
            done: true,
            line_count: 0,
        }
    }

    /// Look `tag` up in `index` and position the iterator at the start of
    /// its range. The index stays borrowed until the iterator is dropped.
    pub fn init(
        &mut self,
        index: &'a mut TagFile,
        tag: impl AsRef<[u8]>,
        window_size: usize,
    ) -> Result<TagRange> {
        self.release();
        let tag = tag.as_ref();
        let range = index.lookup(tag)?;

        let index: &'a TagFile = index;
        let window_size = if window_size == 0 {
            DEFAULT_WINDOW_SIZE
        } else {
            window_size
        };
        let window = ReaderWindow::init(index.reader(), range.start, window_size)?
            .with_max_line_size(index.options().max_line_size);

        self.window = Some(window);
        self.tag = tag.to_vec();
        self.order = index.order();
        // A range starting mid-file starts mid-line
        self.first_line = range.start != 0;
        self.on_line = false;
        self.done = false;
        self.line_count = 0;
        Ok(range)
    }

    /// Drop the window. Further calls return no lines.
    pub fn release(&mut self) {
        if let Some(mut window) = self.window.take() {
            window.release();
        }
        self.on_line = false;
        self.done = true;
    }

    /// Lines returned so far
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Advance to the next matching line
    pub fn next_line(&mut self) -> Result<Option<&[u8]>> {
        self.on_line = false;
        if self.done {
            return Ok(None);
        }

        loop {
            let Some(window) = self.window.as_mut() else {
                return Err(TagError::BadState("iterator was not initialised".to_string()));
            };
            let step = if self.first_line {
                self.first_line = false;
                window.find_first_full_line(true)?
            } else {
                window.find_next_full_line(true)?
            };
            match step {
                ScanStep::Line if window.tag().starts_with(PSEUDO_TAG_PREFIX) => continue,
                ScanStep::Line => {}
                ScanStep::TooBig => continue,
                ScanStep::End => {
                    self.done = true;
                    return Ok(None);
                }
            }

            match classify(self.order, self.prefix_match, &self.tag, window.tag()) {
                Ordering::Less => continue,
                Ordering::Equal => break,
                Ordering::Greater => {
                    self.done = true;
                    return Ok(None);
                }
            }
        }

        self.on_line = true;
        self.line_count += 1;
        Ok(self.window.as_ref().map(ReaderWindow::line))
    }

    /// Fields of the current line
    pub fn line_props(&self) -> Result<TagLineProps<'_>> {
        let window = self
            .window
            .as_ref()
            .filter(|_| self.on_line)
            .ok_or_else(|| TagError::BadState("no current tag line".to_string()))?;
        TagLineProps::parse(window.line(), window.tag_size())
    }

    /// Advance and split the next matching line
    pub fn next_line_props(&mut self) -> Result<Option<TagLineProps<'_>>> {
        if self.next_line()?.is_none() {
            return Ok(None);
        }
        self.line_props().map(Some)
    }
}

/// Distinct tag names starting with `prefix`, in file order, at most `max`
pub fn distinct_tags(
    index: &mut TagFile,
    prefix: impl AsRef<[u8]>,
    window_size: usize,
    max: usize,
) -> Result<Vec<Vec<u8>>> {
    let order = index.order();
    let mut iter = TagIterator::new(true);
    iter.init(index, prefix, window_size)?;

    let mut names: Vec<Vec<u8>> = Vec::new();
    while names.len() < max {
        let Some(line) = iter.next_line()? else {
            break;
        };
        let Some(tab) = line.iter().position(|&b| b == b'\t') else {
            continue;
        };
        let tag = &line[..tab];
        // Equal names are adjacent, though foldcase files may interleave
        // spellings that differ only in case
        let seen = names
            .iter()
            .rev()
            .take_while(|name| order.eq(name.as_slice(), tag))
            .any(|name| name.as_slice() == tag);
        if !seen {
            names.push(tag.to_vec());
        }
    }
    Ok(names)
}

// Where a line with tag `key` falls relative to `query`: before (skip),
// equal (yield) or after (stop).
fn classify(order: TagOrder, prefix_match: bool, query: &[u8], key: &[u8]) -> Ordering {
    if key.len() >= query.len() {
        match order.compare(&key[..query.len()], query) {
            Ordering::Equal if key.len() > query.len() && !prefix_match => Ordering::Greater,
            res => res,
        }
    } else {
        match order.compare(key, &query[..key.len()]) {
            Ordering::Equal => Ordering::Less,
            res => res,
        }
    }
}
