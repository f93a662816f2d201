// SPDX-License-Identifier: MIT OR Apache-2.0

//! tagseek - ctags file lookup library
//!
//! Shared modules for the tagseek CLI tool: the tag index engine and its
//! building blocks (AVL tree, arena, file readers), plus configuration and
//! output helpers.

pub mod arena;
pub mod avl;
pub mod config;
pub mod errors;
pub mod output;
pub mod reader;
pub mod tags;

pub use errors::{ErrorKind, Result, TagError};
pub use tags::{IndexOptions, TagFile, TagIterator, TagList, TagOrder, TagRange, TagRecord};
