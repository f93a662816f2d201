// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for tagseek
//!
//! Loads configuration from .tagseekrc.toml in current directory or ~/.config/tagseek/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::reader::window::DEFAULT_MAX_LINE_SIZE;
use crate::reader::ReaderKind;
use crate::tags::file::DEFAULT_PAGE_SIZE;
pub use crate::tags::iterator::DEFAULT_WINDOW_SIZE;
use crate::tags::list::DEFAULT_MAX_ITEMS;
use crate::tags::IndexOptions;

/// Default name of a tags file
pub const DEFAULT_TAGS_FILE: &str = "tags";

/// Output format for results (mirrored from cli for library use)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigOutputFormat {
    #[default]
    Text,
    Json,
}

/// Configuration loaded from .tagseekrc.toml or ~/.config/tagseek/config.toml
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tags file name searched for from the current directory upward
    pub tags_file: String,
    /// Tags file consulted when the local one has no match
    pub global_tags_file: Option<PathBuf>,
    /// Maximum number of records to collect
    pub max_results: Option<usize>,
    /// Match tags by prefix unless the command says otherwise
    pub prefix_match: bool,
    /// Bytes read per index page
    pub page_size: usize,
    /// Bytes per scan window
    pub window_size: usize,
    /// Longest line a window grows to hold
    pub max_line_size: usize,
    /// Map files instead of reading them into buffers
    pub use_mmap: bool,
    /// Default output format (text or json)
    pub default_format: Option<String>,
    /// Source lines shown before a located line
    pub peek_pre: usize,
    /// Source lines shown after a located line
    pub peek_post: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tags_file: DEFAULT_TAGS_FILE.to_string(),
            global_tags_file: None,
            max_results: None,
            prefix_match: false,
            page_size: DEFAULT_PAGE_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            max_line_size: DEFAULT_MAX_LINE_SIZE,
            use_mmap: true,
            default_format: None,
            peek_pre: 0,
            peek_post: 0,
        }
    }
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .tagseekrc.toml in current directory
    /// 2. ~/.config/tagseek/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(".tagseekrc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("tagseek").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Parse one config file; `None` when it is missing or malformed
    pub fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Get output format from config, parsing the string to ConfigOutputFormat
    pub fn output_format(&self) -> Option<ConfigOutputFormat> {
        self.default_format.as_ref().and_then(|s| match s.to_lowercase().as_str() {
            "json" => Some(ConfigOutputFormat::Json),
            "text" => Some(ConfigOutputFormat::Text),
            _ => None,
        })
    }

    /// Merge CLI options with config (CLI wins)
    pub fn merge_max_results(&self, cli_value: Option<usize>) -> usize {
        cli_value.or(self.max_results).unwrap_or(DEFAULT_MAX_ITEMS)
    }

    pub fn reader_kind(&self) -> ReaderKind {
        if self.use_mmap {
            ReaderKind::Mapped
        } else {
            ReaderKind::Buffered
        }
    }

    /// Engine options; zero sizes fall back to the defaults
    pub fn index_options(&self) -> IndexOptions {
        let or_default = |value: usize, default: usize| if value == 0 { default } else { value };
        IndexOptions {
            page_size: or_default(self.page_size, DEFAULT_PAGE_SIZE),
            max_line_size: or_default(self.max_line_size, DEFAULT_MAX_LINE_SIZE),
            reader: self.reader_kind(),
        }
    }

    /// Context lines around a located line as (before, after); the CLI
    /// value applies to both sides
    pub fn merge_peek(&self, cli_context: Option<usize>) -> (usize, usize) {
        match cli_context {
            Some(n) => (n, n),
            None => (self.peek_pre, self.peek_post),
        }
    }

    pub fn window_size(&self) -> usize {
        if self.window_size == 0 {
            DEFAULT_WINDOW_SIZE
        } else {
            self.window_size
        }
    }
}

/// Find `name` in `start` (a file's directory, or a directory) or the
/// nearest ancestor that has one.
pub fn find_tags_file(start: &Path, name: &str) -> Option<PathBuf> {
    let first = if start.is_file() { start.parent()? } else { start };
    first
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
