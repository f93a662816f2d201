// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// tagseek - Fast lookups in ctags files
///
/// Binary searches a sorted tags file without loading it, caching what each
/// search step learns so repeated lookups touch little of the file.
#[derive(Parser, Debug)]
#[command(name = "tagseek")]
#[command(
    author,
    version,
    about,
    long_about = None,
    after_help = "Examples:\n  tagseek lookup main\n  tagseek lookup -p Parse --max 20\n  tagseek locate main.c:42\n  tagseek --tags build/tags info"
)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    /// Compact JSON output (no pretty formatting)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Tags file (default: nearest `tags` from the current directory up)
    #[arg(long, global = true, value_name = "FILE")]
    pub tags: Option<PathBuf>,

    /// Tags file to retry when the local one has no match
    #[arg(long = "global-tags", global = true, value_name = "FILE")]
    pub global_tags: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// How a query is matched against tag names
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct MatchArgs {
    /// Match every tag starting with TAG
    #[arg(short, long, conflicts_with = "no_prefix")]
    pub prefix: bool,

    /// Match TAG exactly even when the config enables prefix matching
    #[arg(long = "no-prefix")]
    pub no_prefix: bool,

    /// Treat TAG as text at the cursor: look up its leading word, then the
    /// word with a following `.ext` when the word alone has no match
    #[arg(short, long)]
    pub word: bool,
}

impl MatchArgs {
    /// Prefix mode after applying the config default
    pub fn prefix_mode(&self, config_default: bool) -> bool {
        if self.prefix {
            true
        } else if self.no_prefix {
            false
        } else {
            config_default
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the records of a tag
    #[command(visible_aliases = ["l"])]
    Lookup {
        /// Tag name, optionally with a line hint (`NAME:LINE`)
        tag: String,

        #[command(flatten)]
        matching: MatchArgs,

        /// Maximum number of records to return
        #[arg(short = 'm', long = "max")]
        max: Option<usize>,
    },

    /// Resolve a record to its source file and line
    #[command(visible_aliases = ["loc"])]
    Locate {
        /// Tag name, optionally with a line hint (`NAME:LINE`)
        tag: String,

        #[command(flatten)]
        matching: MatchArgs,

        /// Which record to locate (0-based)
        #[arg(short = 'n', long, default_value = "0")]
        index: usize,

        /// Source lines to show before and after the located line
        #[arg(short = 'C', long)]
        context: Option<usize>,
    },

    /// List the distinct tag names starting with PREFIX
    #[command(visible_aliases = ["c"])]
    Complete {
        /// Tag name prefix
        prefix: String,

        /// Maximum number of names to return
        #[arg(short = 'm', long = "max")]
        max: Option<usize>,
    },

    /// Print the byte range a lookup narrows TAG to
    Range {
        /// Tag name
        tag: String,
    },

    /// Print tags file properties
    Info,
}
