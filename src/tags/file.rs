// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tag file index
//!
//! A [`TagFile`] never reads the whole tags file. It keeps an AVL tree of
//! page descriptors, each naming a byte range of the file and the tag of the
//! first full line inside it. [`TagFile::lookup`] binary searches the file by
//! reading pages in the gap between the two descriptors that bracket the
//! query, caching every page it reads, so later lookups mostly hit the tree.

use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use super::TagOrder;
use crate::arena::{Arena, ArenaStr};
use crate::avl::{AvlTree, Location, NodeId};
use crate::errors::{Result, TagError};
use crate::reader::window::DEFAULT_MAX_LINE_SIZE;
use crate::reader::{self, FileReader, ReaderKind, ReaderWindow, ScanStep};

pub const DEFAULT_PAGE_SIZE: usize = 8 * 1024;

const SORTED_FLAG: &[u8] = b"!_TAG_FILE_SORTED";
const HEADER_WINDOW: usize = 1024;
const HEADER_LINES: usize = 5;
const KEY_ARENA_PAGE: usize = 4 * 1024;

/// Tuning for a [`TagFile`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Bytes read per binary search step
    pub page_size: usize,
    /// Longest line the index and iterators will grow a window for
    pub max_line_size: usize,
    pub reader: ReaderKind,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_line_size: DEFAULT_MAX_LINE_SIZE,
            reader: ReaderKind::Mapped,
        }
    }
}

/// Byte range of the tags file where the lines of a tag start
///
/// Matching lines begin inside the range; the last of them may run past its
/// end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TagRange {
    pub start: u64,
    pub size: u64,
}

impl TagRange {
    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

#[derive(Debug)]
struct PageDesc {
    offset: u64,
    size: u64,
    /// Offset of the first full line, whose tag is `key`
    key_offset: usize,
    key: ArenaStr,
}

impl PageDesc {
    fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Lazily indexed, externally sorted tags file
pub struct TagFile {
    path: PathBuf,
    reader: Box<dyn FileReader>,
    descs: AvlTree<PageDesc>,
    keys: Arena,
    order: TagOrder,
    sorted: bool,
    pseudo_tags: Vec<(String, String)>,
    options: IndexOptions,
}

impl std::fmt::Debug for TagFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagFile")
            .field("path", &self.path)
            .field("order", &self.order)
            .field("sorted", &self.sorted)
            .field("descriptors", &self.descs.len())
            .finish()
    }
}

impl TagFile {
    /// Open a tags file and read its `!_TAG_FILE_SORTED` header.
    ///
    /// A file declared unsorted opens fine; every lookup on it then fails
    /// with [`TagError::Unsorted`].
    pub fn open(path: impl AsRef<Path>, options: IndexOptions) -> Result<Self> {
        let path = path.as_ref();
        if options.page_size == 0 {
            return Err(TagError::Invalid("page size must be positive".to_string()));
        }

        let mut reader = reader::create(options.reader);
        reader.open(path, true)?;

        let mut file = Self {
            path: path.to_path_buf(),
            reader,
            descs: AvlTree::new(),
            keys: Arena::new(KEY_ARENA_PAGE),
            order: TagOrder::CaseSensitive,
            sorted: true,
            pseudo_tags: Vec::new(),
            options,
        };
        file.read_header()?;

        tracing::debug!(
            path = %path.display(),
            size = file.reader.file_size(),
            order = ?file.order,
            sorted = file.sorted,
            "tags file opened"
        );
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn order(&self) -> TagOrder {
        self.order
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.order.is_case_insensitive()
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    pub fn reader(&self) -> &dyn FileReader {
        self.reader.as_ref()
    }

    pub fn file_size(&self) -> u64 {
        self.reader.file_size()
    }

    /// Number of cached page descriptors
    pub fn descriptor_count(&self) -> usize {
        self.descs.len()
    }

    /// Bytes held by cached descriptor keys
    pub fn key_bytes(&self) -> usize {
        self.keys.allocated_bytes()
    }

    /// `!`-prefixed header lines seen while opening, as name and value
    pub fn pseudo_tags(&self) -> &[(String, String)] {
        &self.pseudo_tags
    }

    /// Forget every cached descriptor
    pub fn reset(&mut self) {
        self.descs.clear();
        self.keys.reset();
    }

    /// Close the file handle, keeping the cache. Lookups fail until
    /// [`TagFile::reopen_file`].
    pub fn close_file(&mut self) {
        self.reader.close();
    }

    /// Reopen the file. If it changed since it was indexed the cache is
    /// dropped and the header read again.
    pub fn reopen_file(&mut self) -> Result<()> {
        self.reader.close();
        self.reader.reopen()?;
        if let Err(TagError::Modified(_)) = self.reader.unmodified() {
            tracing::debug!(path = %self.path.display(), "tags file changed, dropping index");
            self.reset();
            self.reader.ack_new_time();
            self.read_header()?;
        }
        Ok(())
    }

    /// Find the range of the file where lines with tag `tag` start.
    ///
    /// Returns an empty range at offset 0 when `tag` sorts before every tag
    /// in the file. A range is returned for absent tags too; it brackets the
    /// place the tag would be.
    pub fn lookup(&mut self, tag: impl AsRef<[u8]>) -> Result<TagRange> {
        let tag = tag.as_ref();
        if !self.reader.is_open() {
            return Err(TagError::FileNotOpen);
        }
        if !self.sorted {
            return Err(self.unsorted());
        }

        // Binary search on the gap between D1 (key <= tag) and D2 (key > tag)
        let (found, loc) = self.find(tag);
        let mut d1 = found.or_else(|| self.descs.prev_of_lookup(&loc));
        let mut gap_base = d1.map_or(0, |id| self.descs[id].end());
        let d2 = match d1 {
            Some(id) => self.descs.next(id),
            None => self.descs.first(),
        };
        let mut gap_end = d2.map_or(self.reader.file_size(), |id| self.descs[id].offset);
        if gap_end < gap_base {
            return Err(self.unsorted());
        }

        let page = self.options.page_size as u64;
        while gap_end > gap_base {
            let pages = (gap_end - gap_base).div_ceil(page);
            let mid_offset = gap_base + (pages / 2) * page;
            let mid = self.add_page(mid_offset, gap_end, d1)?;

            let desc = &self.descs[mid];
            if self.order.compare(self.keys.get(desc.key), tag) != Ordering::Greater {
                if desc.end() <= gap_base || desc.end() > gap_end {
                    return Err(self.unsorted());
                }
                d1 = Some(mid);
                gap_base = desc.end();
            } else {
                if desc.offset < gap_base || desc.offset >= gap_end {
                    return Err(self.unsorted());
                }
                gap_end = desc.offset;
            }
        }

        let Some(d1) = d1 else {
            tracing::trace!(tag = %String::from_utf8_lossy(tag), "tag sorts before the first line");
            return Ok(TagRange::default());
        };

        let range = if self.order.eq(self.keys.get(self.descs[d1].key), tag) {
            // The tag opens D1; earlier pages may hold it too
            let first = self.grow_desc_backward(d1)?;
            let start = self.descs[first].offset;
            TagRange {
                start,
                size: gap_base - start,
            }
        } else {
            let desc = &self.descs[d1];
            TagRange {
                start: desc.offset,
                size: desc.size,
            }
        };

        tracing::debug!(
            tag = %String::from_utf8_lossy(tag),
            start = range.start,
            size = range.size,
            descriptors = self.descs.len(),
            "lookup"
        );
        Ok(range)
    }

    fn unsorted(&self) -> TagError {
        TagError::Unsorted(self.path.clone())
    }

    fn find(&self, key: &[u8]) -> (Option<NodeId>, Location) {
        let order = self.order;
        let keys = &self.keys;
        self.descs
            .lookup(key, |desc: &PageDesc, key: &[u8]| order.compare(keys.get(desc.key), key))
    }

    fn read_header(&mut self) -> Result<()> {
        self.order = TagOrder::CaseSensitive;
        self.sorted = true;

        let mut window = ReaderWindow::init(self.reader.as_ref(), 0, HEADER_WINDOW)?;
        let mut pseudo_tags = Vec::new();
        let mut flag = None;

        for _ in 0..HEADER_LINES {
            if window.find_next_full_line(false)? != ScanStep::Line {
                break;
            }
            let tag = window.tag();
            if !tag.starts_with(b"!") {
                if tag.is_empty() {
                    continue;
                }
                break;
            }

            let value = &window.line()[tag.len() + 1..];
            if tag == SORTED_FLAG && flag.is_none() {
                flag = read_flag_value(value);
            }
            let value_end = value.iter().position(|&b| b == b'\t').unwrap_or(value.len());
            pseudo_tags.push((
                String::from_utf8_lossy(tag).into_owned(),
                String::from_utf8_lossy(&value[..value_end]).into_owned(),
            ));
        }
        drop(window);

        if let Some(value) = flag {
            match TagOrder::from_sorted_flag(value) {
                Some(order) => self.order = order,
                None => self.sorted = false,
            }
        }
        self.pseudo_tags = pseudo_tags;
        Ok(())
    }

    // Index the page at `offset`, which lies in a gap ending at `ceiling`.
    // `floor` is the descriptor right before the gap; backward growth never
    // crosses its end. Returns the descriptor now covering the page.
    fn add_page(&mut self, offset: u64, ceiling: u64, floor: Option<NodeId>) -> Result<NodeId> {
        let page = self.options.page_size as u64;
        let max_line = self.options.max_line_size;
        let floor_end = floor.map_or(0, |id| self.descs[id].end());

        let mut offset = offset;
        let mut region = page.min(ceiling - offset);

        let (key, key_offset) = loop {
            let mut window = ReaderWindow::init(self.reader.as_ref(), offset, region as usize)?
                .with_max_line_size(max_line);

            if offset == 0 {
                match window.find_next_full_line(true)? {
                    ScanStep::Line => break (self.keys.alloc(window.tag())?, 0),
                    ScanStep::TooBig => {
                        return Err(TagError::LineTooBig {
                            offset: 0,
                            limit: max_line,
                        })
                    }
                    ScanStep::End => {
                        return Err(TagError::Invalid(format!(
                            "'{}' holds no tag lines",
                            self.path.display()
                        )))
                    }
                }
            }

            if window.find_first_full_line(false)? == ScanStep::Line {
                let key_offset = (window.line_offset() - offset) as usize;
                break (self.keys.alloc(window.tag())?, key_offset);
            }
            drop(window);

            // No line ends inside the region: grow it backward
            if let Some(prev) = floor.filter(|_| offset <= floor_end) {
                let end = offset + region;
                let desc = &mut self.descs[prev];
                desc.size = desc.size.max(end - desc.offset);
                tracing::debug!(offset, end, "page without full line absorbed by previous descriptor");
                return Ok(prev);
            }
            let start = offset.saturating_sub(page).max(floor_end);
            region += offset - start;
            offset = start;
            tracing::trace!(offset, region, "growing page backward");
        };

        let (found, loc) = {
            let order = self.order;
            let keys = &self.keys;
            self.descs.lookup(keys.get(key), |desc: &PageDesc, k: &[u8]| {
                order.compare(keys.get(desc.key), k)
            })
        };

        let end = offset + region;
        if let Some(existing) = found {
            self.keys.undo(key);
            let desc = &mut self.descs[existing];
            if desc.offset < offset {
                desc.size = desc.size.max(end - desc.offset);
            } else {
                let old_end = desc.end();
                desc.offset = offset;
                desc.size = old_end.max(end) - offset;
                desc.key_offset = key_offset;
            }
            tracing::trace!(offset = desc.offset, size = desc.size, "page merged into equal-key descriptor");
            return Ok(existing);
        }

        if let Err(err) = self.check_order(&loc, offset, end) {
            self.keys.undo(key);
            return Err(err);
        }

        let id = self.descs.insert(
            &loc,
            PageDesc {
                offset,
                size: region,
                key_offset,
                key,
            },
        );
        tracing::trace!(
            offset,
            size = region,
            key = %String::from_utf8_lossy(self.keys.get(key)),
            "descriptor added"
        );
        Ok(id)
    }

    // Key order and file order of neighbouring descriptors must agree.
    fn check_order(&self, loc: &Location, offset: u64, end: u64) -> Result<()> {
        if let Some(prev) = self.descs.prev_of_lookup(loc) {
            if self.descs[prev].end() > offset {
                return Err(self.unsorted());
            }
        }
        if let Some(next) = self.descs.next_of_lookup(loc) {
            if end > self.descs[next].offset {
                return Err(self.unsorted());
            }
        }
        Ok(())
    }

    // Index the pages before `d1`, whose key equals the query, until a page
    // with a smaller key, the previous descriptor or the start of file is
    // reached. Returns the descriptor the tag's range starts at.
    fn grow_desc_backward(&mut self, d1: NodeId) -> Result<NodeId> {
        let mut offset = self.descs[d1].offset;
        if offset == 0 {
            return Ok(d1);
        }

        let page = self.options.page_size as u64;
        let prev = self.descs.prev(d1);
        let floor_end = prev.map_or(0, |id| self.descs[id].end());

        while offset > floor_end {
            let start = offset.saturating_sub(page).max(floor_end);
            let id = self.add_page(start, offset, prev)?;
            let desc = &self.descs[id];
            if desc.end() <= offset {
                return Ok(id);
            }
            offset = desc.offset;
        }
        Ok(prev.unwrap_or(d1))
    }

    #[cfg(test)]
    fn descriptors(&self) -> Vec<(u64, u64, usize, Vec<u8>)> {
        self.descs
            .iter()
            .map(|(_, d)| (d.offset, d.size, d.key_offset, self.keys.get(d.key).to_vec()))
            .collect()
    }
}

// Integer after the pseudo-tag name, skipping leading blanks
fn read_flag_value(value: &[u8]) -> Option<u32> {
    let start = value.iter().position(|&b| b != b' ' && b != b'\t')?;
    let digits = value[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    value[start..start + digits]
        .iter()
        .try_fold(0u32, |acc, &b| acc.checked_mul(10)?.checked_add(u32::from(b - b'0')))
}
