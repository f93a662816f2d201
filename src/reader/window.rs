// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line scanner over a bounded window of a file
//!
//! A [`ReaderWindow`] holds one byte range of a file (mapped or copied) and
//! steps through it line by line, recording where the tag field of each line
//! ends. When a line runs past the end of the window the window can slide
//! forward to the start of that line and, if the line is longer than the
//! whole window, grow up to a configured limit.

use super::{alloc_page_buffer, FileReader, MappedView};
use crate::errors::{Result, TagError};

/// Longest line the window grows to hold before giving up on it
pub const DEFAULT_MAX_LINE_SIZE: usize = 16 * 1024 * 1024;

/// Outcome of one scan step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// A complete line is current
    Line,
    /// A line longer than the growth limit was skipped
    TooBig,
    /// No further line in reach
    End,
}

#[derive(Debug)]
enum WindowData {
    Empty,
    Mapped(MappedView),
    Owned(Vec<u8>),
    Released,
}

/// Sliding window of file bytes with a current line
pub struct ReaderWindow<'r> {
    reader: &'r dyn FileReader,
    data: WindowData,
    /// File offset of the first byte of the window
    offset: u64,
    /// Valid bytes in the window
    size: usize,
    line_offset: usize,
    next_line_offset: usize,
    line_size: usize,
    tag_size: Option<usize>,
    max_line_size: usize,
}

fn is_eol(byte: u8) -> bool {
    byte == b'\n' || byte == b'\r'
}

impl<'r> ReaderWindow<'r> {
    /// Acquire `[offset, offset + size)` of the reader's file.
    ///
    /// The range is clipped at end of file; a range that lies entirely past
    /// the end yields an empty window whose first scan returns
    /// [`ScanStep::End`].
    pub fn init(reader: &'r dyn FileReader, offset: u64, size: usize) -> Result<Self> {
        let mut window = Self {
            reader,
            data: WindowData::Empty,
            offset,
            size: 0,
            line_offset: 0,
            next_line_offset: 0,
            line_size: 0,
            tag_size: None,
            max_line_size: DEFAULT_MAX_LINE_SIZE.max(size),
        };
        window.fill(offset, size)?;
        Ok(window)
    }

    pub fn with_max_line_size(mut self, max: usize) -> Self {
        self.max_line_size = max.max(self.size);
        self
    }

    /// Drop the mapped or owned bytes; further scans fail.
    pub fn release(&mut self) {
        self.data = WindowData::Released;
        self.size = 0;
    }

    /// File offset of the window start
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// File offset of the current line
    pub fn line_offset(&self) -> u64 {
        self.offset + self.line_offset as u64
    }

    /// Current line without its end-of-line bytes
    pub fn line(&self) -> &[u8] {
        &self.bytes()[self.line_offset..self.line_offset + self.line_size]
    }

    /// Text before the first tab of the current line, empty without a tab
    pub fn tag(&self) -> &[u8] {
        let len = self.tag_size.unwrap_or(0);
        &self.bytes()[self.line_offset..self.line_offset + len]
    }

    /// Length of the tag field, `None` when the line has no tab
    pub fn tag_size(&self) -> Option<usize> {
        self.tag_size
    }

    /// Skip the (possibly partial) line at the window start, then move to the
    /// next full line.
    pub fn find_first_full_line(&mut self, slide: bool) -> Result<ScanStep> {
        self.next_line_offset = 0;
        match self.find_next_full_line(slide)? {
            ScanStep::End => Ok(ScanStep::End),
            ScanStep::Line | ScanStep::TooBig => self.find_next_full_line(slide),
        }
    }

    /// Advance to the next complete line.
    ///
    /// Without `slide` the scan stops at the window end. With it the window
    /// is moved forward (and grown for lines longer than the window) until a
    /// line is complete or the file ends.
    pub fn find_next_full_line(&mut self, slide: bool) -> Result<ScanStep> {
        if matches!(self.data, WindowData::Released) {
            return Err(TagError::BadState("scan on a released window".to_string()));
        }
        let mut too_big = false;

        loop {
            self.tag_size = None;
            self.line_size = 0;
            self.line_offset = self.next_line_offset;

            let at_eof = self.offset + self.size as u64 >= self.reader.file_size();
            let (end, tag_size, eol_len) = self.scan_line(at_eof);
            self.tag_size = tag_size;

            if let Some(eol_len) = eol_len {
                self.next_line_offset = end + eol_len;
                return Ok(self.finish_line(end, too_big));
            }
            if end == self.size && at_eof {
                if end > self.line_offset || too_big {
                    self.next_line_offset = end;
                    return Ok(self.finish_line(end, too_big));
                }
                return Ok(ScanStep::End);
            }
            if !slide {
                return Ok(ScanStep::End);
            }

            let mut size = self.size;
            if self.line_offset > 0 {
                self.offset += self.line_offset as u64;
            } else if self.size < self.max_line_size {
                size = (self.size * 2).min(self.max_line_size);
                tracing::debug!(
                    offset = self.offset,
                    from = self.size,
                    to = size,
                    "growing window for long line"
                );
            } else {
                too_big = true;
                self.offset += end as u64;
                tracing::debug!(
                    offset = self.offset,
                    limit = self.max_line_size,
                    "skipping line longer than window limit"
                );
            }

            self.line_offset = 0;
            self.next_line_offset = 0;
            self.line_size = 0;
            self.tag_size = None;
            if !self.fill(self.offset, size)? {
                return Ok(if too_big { ScanStep::TooBig } else { ScanStep::End });
            }
        }
    }

    // Scan from `line_offset`. Returns the EOL position (or window end), the
    // tag size, and the EOL length when a complete terminator was found.
    fn scan_line(&self, at_eof: bool) -> (usize, Option<usize>, Option<usize>) {
        let buf = self.bytes();
        let mut tag_size = None;
        let mut i = self.line_offset;

        while i < self.size && !is_eol(buf[i]) {
            if buf[i] == b'\t' && tag_size.is_none() {
                tag_size = Some(i - self.line_offset);
            }
            i += 1;
        }

        if i == self.size {
            return (i, tag_size, None);
        }
        let eol_len = match buf[i] {
            b'\r' if i + 1 == self.size => {
                // "\r\n" may be split across windows
                if at_eof {
                    Some(1)
                } else {
                    None
                }
            }
            b'\r' if buf[i + 1] == b'\n' => Some(2),
            _ => Some(1),
        };
        (i, tag_size, eol_len)
    }

    fn finish_line(&mut self, end: usize, too_big: bool) -> ScanStep {
        if too_big {
            self.line_size = 0;
            self.tag_size = None;
            return ScanStep::TooBig;
        }
        self.line_size = end - self.line_offset;
        ScanStep::Line
    }

    // Load `[offset, offset + size)`, clipped at end of file. Returns false
    // when nothing is left to load.
    fn fill(&mut self, offset: u64, size: usize) -> Result<bool> {
        let file_size = self.reader.file_size();
        let size = if offset >= file_size {
            0
        } else {
            size.min((file_size - offset) as usize)
        };
        self.offset = offset;

        if size == 0 {
            self.data = WindowData::Empty;
            self.size = 0;
            return Ok(false);
        }

        if self.reader.map_supported() {
            // Unmap the old view before mapping the new one
            self.data = WindowData::Empty;
            self.data = WindowData::Mapped(self.reader.map(offset, size)?);
        } else {
            let mut buf = match std::mem::replace(&mut self.data, WindowData::Empty) {
                WindowData::Owned(buf) if buf.capacity() >= size => buf,
                _ => alloc_page_buffer(size)?,
            };
            buf.resize(size, 0);
            self.reader.read(offset, &mut buf)?;
            self.data = WindowData::Owned(buf);
        }
        self.size = size;
        Ok(true)
    }

    fn bytes(&self) -> &[u8] {
        match &self.data {
            WindowData::Mapped(view) => view.as_slice(),
            WindowData::Owned(buf) => &buf[..self.size],
            WindowData::Empty | WindowData::Released => &[],
        }
    }
}
