// SPDX-License-Identifier: MIT OR Apache-2.0

//! Show the byte range a lookup narrows a tag to

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::query::explain;
use tagseek::config::Config;
use tagseek::output::print_json;
use tagseek::tags::TagFile;

/// Range result for JSON output
#[derive(Debug, Serialize)]
struct RangeResult {
    tag: String,
    start: u64,
    size: u64,
    end: u64,
    file_size: u64,
    descriptors: usize,
    key_bytes: usize,
}

/// Run the range command
pub fn run(
    tags_path: &Path,
    tag: &str,
    config: &Config,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let mut index = TagFile::open(tags_path, config.index_options()).map_err(explain)?;
    let range = index.lookup(tag).map_err(explain)?;

    let result = RangeResult {
        tag: tag.to_string(),
        start: range.start,
        size: range.size,
        end: range.end(),
        file_size: index.file_size(),
        descriptors: index.descriptor_count(),
        key_bytes: index.key_bytes(),
    };

    match format {
        OutputFormat::Json => {
            print_json(&result, compact)?;
        }
        OutputFormat::Text => {
            println!(
                "{} {} starts in bytes {}..{} of {}",
                "🔍".cyan(),
                result.tag.yellow(),
                result.start.to_string().cyan(),
                result.end.to_string().cyan(),
                result.file_size
            );
            println!(
                "{} {} page descriptors cached ({} key bytes)",
                "ℹ".cyan(),
                result.descriptors,
                result.key_bytes
            );
        }
    }

    Ok(())
}
