// SPDX-License-Identifier: MIT OR Apache-2.0

//! File reader abstraction
//!
//! [`FileReader`] hides how bytes come off disk. Two backends exist:
//! [`MmapReader`] maps byte ranges with memmap2, [`BufferedReader`] copies
//! them into page-sized buffers with plain reads. Which one is used is picked
//! once, at construction, through [`ReaderKind`].
//!
//! Both backends remember the file's modification time when it is opened and
//! again on every [`FileReader::reopen`], so the tag index can tell when the
//! file was rewritten underneath it.

pub mod window;

pub use window::{ReaderWindow, ScanStep};

use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::{Result, TagError};

const FALLBACK_PAGE_SIZE: usize = 4096;

/// Size of a virtual memory page
pub fn system_page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf only reads a configuration value.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            return size as usize;
        }
    }
    FALLBACK_PAGE_SIZE
}

/// Alignment required for the file offset of a mapping
pub fn allocation_granularity() -> usize {
    if cfg!(windows) {
        64 * 1024
    } else {
        system_page_size()
    }
}

/// Allocate a zeroed read buffer of `size` bytes backed by whole pages
pub fn alloc_page_buffer(size: usize) -> Result<Vec<u8>> {
    let page = system_page_size();
    let capacity = size.div_ceil(page).max(1) * page;
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity)
        .map_err(|_| TagError::MemAlloc(capacity))?;
    buf.resize(size, 0);
    Ok(buf)
}

/// Read-only view of a mapped byte range
///
/// The mapping itself starts at a granularity-aligned offset; the view skips
/// the alignment padding. Dropping the view unmaps it.
#[derive(Debug)]
pub struct MappedView {
    map: Mmap,
    pad: usize,
    len: usize,
}

impl MappedView {
    pub fn as_slice(&self) -> &[u8] {
        &self.map[self.pad..self.pad + self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderKind {
    #[default]
    Mapped,
    Buffered,
}

/// Create an unopened reader of the given kind
pub fn create(kind: ReaderKind) -> Box<dyn FileReader> {
    match kind {
        ReaderKind::Mapped => Box::new(MmapReader::new()),
        ReaderKind::Buffered => Box::new(BufferedReader::new()),
    }
}

/// Random access to one file
pub trait FileReader {
    /// Open `path`. `random_access` hints that reads will jump around.
    fn open(&mut self, path: &Path, random_access: bool) -> Result<()>;

    /// Re-open the file opened last, refreshing its size and modification time
    fn reopen(&mut self) -> Result<()>;

    /// Close the handle. The path is kept for [`FileReader::reopen`].
    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn path(&self) -> Option<&Path>;

    /// Size of the file when it was last (re)opened
    fn file_size(&self) -> u64;

    /// Fill `buf` from `offset`. Short reads are errors.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Map `size` bytes starting at `offset`
    fn map(&self, offset: u64, size: usize) -> Result<MappedView>;

    /// Release a view returned by [`FileReader::map`]
    fn unmap(&self, view: MappedView) {
        drop(view);
    }

    fn map_supported(&self) -> bool;

    /// `Err(Modified)` when the file changed between open and the last reopen
    fn unmodified(&self) -> Result<()>;

    /// Accept the modification time seen on the last reopen as current
    fn ack_new_time(&mut self);
}

/// Handle and timestamps shared by both backends
#[derive(Debug, Default)]
struct OpenFile {
    path: Option<PathBuf>,
    file: Option<File>,
    size: u64,
    random_access: bool,
    open_time: Option<SystemTime>,
    reopen_time: Option<SystemTime>,
}

impl OpenFile {
    fn open(&mut self, path: &Path, random_access: bool) -> Result<()> {
        if self.file.is_some() {
            return Err(TagError::BadState(format!(
                "reader already open on '{}'",
                self.path.as_deref().unwrap_or(path).display()
            )));
        }
        self.path = Some(path.to_path_buf());
        self.random_access = random_access;
        if let Err(err) = self.reopen() {
            self.path = None;
            return Err(err);
        }
        self.open_time = self.reopen_time;
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| TagError::BadState("reader was never opened".to_string()))?;
        if self.file.is_some() {
            return Err(TagError::BadState(format!(
                "reader already open on '{}'",
                path.display()
            )));
        }

        let file = File::open(path).map_err(|e| TagError::io(path, e))?;
        let meta = file.metadata().map_err(|e| TagError::io(path, e))?;
        self.reopen_time = meta.modified().ok();
        self.size = meta.len();
        self.file = Some(file);
        tracing::trace!(path = %path.display(), size = self.size, "file opened");
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn handle(&self) -> Result<&File> {
        self.file.as_ref().ok_or(TagError::FileNotOpen)
    }

    fn path_or_empty(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut file = self.handle()?;
        let path = self.path_or_empty();
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| TagError::io(path, e))?;
        file.read_exact(buf).map_err(|e| TagError::io(path, e))
    }

    fn unmodified(&self) -> Result<()> {
        self.handle()?;
        if self.open_time == self.reopen_time {
            Ok(())
        } else {
            Err(TagError::Modified(self.path_or_empty().to_path_buf()))
        }
    }
}

/// Reader that maps the requested ranges
#[derive(Debug, Default)]
pub struct MmapReader {
    inner: OpenFile,
}

impl MmapReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileReader for MmapReader {
    fn open(&mut self, path: &Path, random_access: bool) -> Result<()> {
        self.inner.open(path, random_access)
    }

    fn reopen(&mut self) -> Result<()> {
        self.inner.reopen()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn is_open(&self) -> bool {
        self.inner.file.is_some()
    }

    fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    fn file_size(&self) -> u64 {
        self.inner.size
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.read(offset, buf)
    }

    fn map(&self, offset: u64, size: usize) -> Result<MappedView> {
        let file = self.inner.handle()?;
        let pad = (offset % allocation_granularity() as u64) as usize;
        // SAFETY: the mapping is read-only and never outlives the view. A
        // concurrent rewrite of the file is detected through the
        // modification time on reopen.
        let map = unsafe {
            MmapOptions::new()
                .offset(offset - pad as u64)
                .len(pad + size)
                .map(file)
        }
        .map_err(|e| TagError::io(self.inner.path_or_empty(), e))?;

        #[cfg(unix)]
        if self.inner.random_access {
            let _ = map.advise(memmap2::Advice::Random);
        }

        Ok(MappedView {
            map,
            pad,
            len: size,
        })
    }

    fn map_supported(&self) -> bool {
        true
    }

    fn unmodified(&self) -> Result<()> {
        self.inner.unmodified()
    }

    fn ack_new_time(&mut self) {
        self.inner.open_time = self.inner.reopen_time;
    }
}

/// Reader that copies ranges into owned buffers
#[derive(Debug, Default)]
pub struct BufferedReader {
    inner: OpenFile,
}

impl BufferedReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileReader for BufferedReader {
    fn open(&mut self, path: &Path, random_access: bool) -> Result<()> {
        self.inner.open(path, random_access)
    }

    fn reopen(&mut self) -> Result<()> {
        self.inner.reopen()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn is_open(&self) -> bool {
        self.inner.file.is_some()
    }

    fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    fn file_size(&self) -> u64 {
        self.inner.size
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.read(offset, buf)
    }

    fn map(&self, _offset: u64, _size: usize) -> Result<MappedView> {
        Err(TagError::BadState(
            "memory mapping is not supported by the buffered reader".to_string(),
        ))
    }

    fn map_supported(&self) -> bool {
        false
    }

    fn unmodified(&self) -> Result<()> {
        self.inner.unmodified()
    }

    fn ack_new_time(&mut self) {
        self.inner.open_time = self.inner.reopen_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_fixture(dir: &TempDir, content: &[u8]) -> PathBuf {
        let path = dir.path().join("data");
        fs::write(&path, content).expect("write fixture");
        path
    }

    #[test]
    fn both_backends_read_the_same_bytes() {
        let dir = TempDir::new().expect("tempdir");
        let content: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let path = write_fixture(&dir, &content);

        for kind in [ReaderKind::Mapped, ReaderKind::Buffered] {
            let mut reader = create(kind);
            reader.open(&path, true).expect("open");
            assert_eq!(reader.file_size(), content.len() as u64);

            let mut buf = vec![0u8; 100];
            reader.read(12_345, &mut buf).expect("read");
            assert_eq!(buf, &content[12_345..12_445]);
        }
    }

    #[test]
    fn map_at_unaligned_offset() {
        let dir = TempDir::new().expect("tempdir");
        let content: Vec<u8> = (0..100_000u32).map(|i| (i % 13) as u8).collect();
        let path = write_fixture(&dir, &content);

        let mut reader = MmapReader::new();
        reader.open(&path, false).expect("open");
        let view = reader.map(70_001, 999).expect("map");
        assert_eq!(view.as_slice(), &content[70_001..71_000]);
        reader.unmap(view);
    }

    #[test]
    fn buffered_reader_refuses_to_map() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_fixture(&dir, b"abc");
        let mut reader = BufferedReader::new();
        reader.open(&path, false).expect("open");
        assert!(!reader.map_supported());
        assert_eq!(reader.map(0, 3).unwrap_err().kind(), ErrorKind::BadState);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let mut reader = BufferedReader::new();
        let err = reader.open(&dir.path().join("nope"), false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(reader.path().is_none());
    }

    #[test]
    fn read_after_close_fails() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_fixture(&dir, b"abc");
        let mut reader = BufferedReader::new();
        reader.open(&path, false).expect("open");
        reader.close();
        let mut buf = [0u8; 1];
        assert_eq!(reader.read(0, &mut buf).unwrap_err().kind(), ErrorKind::FileNotOpen);
        reader.reopen().expect("reopen");
        reader.read(0, &mut buf).expect("read");
        assert_eq!(&buf, b"a");
    }

    #[test]
    fn reopen_detects_modification() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_fixture(&dir, b"first\n");
        let mut reader = MmapReader::new();
        reader.open(&path, false).expect("open");
        assert!(reader.unmodified().is_ok());

        reader.close();
        let file = fs::OpenOptions::new().write(true).open(&path).expect("open rw");
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .expect("set mtime");
        drop(file);

        reader.reopen().expect("reopen");
        assert_eq!(reader.unmodified().unwrap_err().kind(), ErrorKind::Modified);
        reader.ack_new_time();
        assert!(reader.unmodified().is_ok());
    }

    #[test]
    fn page_buffers_are_rounded_to_pages() {
        let buf = alloc_page_buffer(10).expect("alloc");
        assert_eq!(buf.len(), 10);
        assert!(buf.capacity() >= system_page_size());
    }
}
