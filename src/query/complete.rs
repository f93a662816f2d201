// SPDX-License-Identifier: MIT OR Apache-2.0

//! List tag names for completion

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::query::explain;
use tagseek::config::Config;
use tagseek::output::print_json;
use tagseek::tags::{distinct_tags, TagFile};

/// Run the complete command
pub fn run(
    tags_path: &Path,
    prefix: &str,
    max: usize,
    config: &Config,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let mut index = TagFile::open(tags_path, config.index_options()).map_err(explain)?;
    let names: Vec<String> = distinct_tags(&mut index, prefix, config.window_size(), max)
        .map_err(explain)?
        .iter()
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect();

    match format {
        OutputFormat::Json => {
            print_json(&names, compact)?;
        }
        OutputFormat::Text => {
            if names.is_empty() {
                println!("{} No tags start with: {}", "✗".red(), prefix.yellow());
                return Ok(());
            }
            for name in &names {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
