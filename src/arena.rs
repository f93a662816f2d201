// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bump allocator for short-lived strings
//!
//! Strings are copied into fixed-size pages and addressed by small
//! [`ArenaStr`] handles. Nothing is freed individually: a query's worth of
//! allocations is dropped at once with [`Arena::reset`], or rolled back to a
//! [`Checkpoint`] when a group of related allocations fails halfway.

use crate::errors::{Result, TagError};

/// Handle to bytes stored in an [`Arena`]
///
/// Only meaningful for the arena that produced it, and only until that arena
/// is reset or rewound past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaStr {
    page: u32,
    offset: u32,
    len: u32,
}

impl ArenaStr {
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Arena position to rewind to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pages: usize,
    used: usize,
}

#[derive(Debug)]
pub struct Arena {
    pages: Vec<Vec<u8>>,
    page_size: usize,
}

impl Arena {
    /// Create an arena whose pages hold `page_size` bytes.
    ///
    /// Pages are at least one system page long.
    pub fn new(page_size: usize) -> Self {
        Self {
            pages: Vec::new(),
            page_size: page_size.max(crate::reader::system_page_size()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Bytes handed out since the last reset
    pub fn allocated_bytes(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// Release every allocation. The first page is kept for reuse.
    pub fn reset(&mut self) {
        self.pages.truncate(1);
        if let Some(page) = self.pages.first_mut() {
            page.clear();
        }
    }

    /// Copy `data` into the arena
    pub fn alloc(&mut self, data: &[u8]) -> Result<ArenaStr> {
        let len = u32::try_from(data.len())
            .map_err(|_| TagError::TooBig(format!("{} byte arena allocation", data.len())))?;

        let fits = self
            .pages
            .last()
            .is_some_and(|page| page.len() + data.len() <= page.capacity());
        if !fits {
            // Oversized strings get a page of their own
            let size = self.page_size.max(data.len());
            let mut page = Vec::new();
            page.try_reserve_exact(size)
                .map_err(|_| TagError::MemAlloc(size))?;
            self.pages.push(page);
        }

        let page_idx = self.pages.len() - 1;
        let page = &mut self.pages[page_idx];
        let offset = page.len();
        page.extend_from_slice(data);

        Ok(ArenaStr {
            page: page_idx as u32,
            offset: offset as u32,
            len,
        })
    }

    pub fn get(&self, handle: ArenaStr) -> &[u8] {
        let start = handle.offset as usize;
        &self.pages[handle.page as usize][start..start + handle.len as usize]
    }

    /// Undo `handle` if it is the most recent allocation.
    ///
    /// Returns false, leaving the arena untouched, otherwise.
    pub fn undo(&mut self, handle: ArenaStr) -> bool {
        let last = self.pages.len().wrapping_sub(1);
        if handle.page as usize != last {
            return false;
        }
        let page = &mut self.pages[last];
        if handle.offset as usize + handle.len as usize != page.len() {
            return false;
        }
        page.truncate(handle.offset as usize);
        if page.is_empty() && last > 0 {
            self.pages.pop();
        }
        true
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pages: self.pages.len(),
            used: self.pages.last().map_or(0, Vec::len),
        }
    }

    /// Drop every allocation made after `cp`
    pub fn rewind(&mut self, cp: Checkpoint) {
        self.pages.truncate(cp.pages);
        if let Some(page) = self.pages.last_mut() {
            page.truncate(cp.used);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_survive_page_rollover() {
        let mut arena = Arena::new(4096);
        let page = arena.page_size();
        let handles: Vec<ArenaStr> = (0..page)
            .map(|i| arena.alloc(format!("tag_{i}").as_bytes()).unwrap())
            .collect();
        assert!(arena.page_count() > 1);
        for (i, h) in handles.iter().enumerate() {
            assert_eq!(arena.get(*h), format!("tag_{i}").as_bytes());
        }
    }

    #[test]
    fn oversized_allocation_gets_own_page() {
        let mut arena = Arena::new(4096);
        let big = vec![b'x'; arena.page_size() * 3];
        let small = arena.alloc(b"abc").unwrap();
        let h = arena.alloc(&big).unwrap();
        assert_eq!(arena.get(h).len(), big.len());
        assert_eq!(arena.get(small), b"abc");
    }

    #[test]
    fn undo_only_rolls_back_last_allocation() {
        let mut arena = Arena::new(4096);
        let a = arena.alloc(b"first").unwrap();
        let b = arena.alloc(b"second").unwrap();
        assert!(!arena.undo(a));
        assert!(arena.undo(b));
        assert_eq!(arena.allocated_bytes(), 5);
        let c = arena.alloc(b"third").unwrap();
        assert_eq!(arena.get(a), b"first");
        assert_eq!(arena.get(c), b"third");
    }

    #[test]
    fn rewind_to_checkpoint() {
        let mut arena = Arena::new(4096);
        arena.alloc(b"keep").unwrap();
        let cp = arena.checkpoint();
        for _ in 0..2000 {
            arena.alloc(b"discard me").unwrap();
        }
        arena.rewind(cp);
        assert_eq!(arena.allocated_bytes(), 4);
        assert_eq!(arena.page_count(), 1);
    }

    #[test]
    fn reset_keeps_one_page() {
        let mut arena = Arena::new(4096);
        for _ in 0..5000 {
            arena.alloc(b"0123456789").unwrap();
        }
        arena.reset();
        assert_eq!(arena.allocated_bytes(), 0);
        assert_eq!(arena.page_count(), 1);
    }
}
