// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tags file properties

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::query::explain;
use tagseek::config::Config;
use tagseek::output::print_json;
use tagseek::tags::{TagFile, TagOrder};

#[derive(Debug, Serialize)]
struct PseudoTag {
    name: String,
    value: String,
}

/// Info result for JSON output
#[derive(Debug, Serialize)]
struct InfoResult {
    path: String,
    file_size: u64,
    sorted: bool,
    order: TagOrder,
    pseudo_tags: Vec<PseudoTag>,
}

/// Run the info command
pub fn run(tags_path: &Path, config: &Config, format: OutputFormat, compact: bool) -> Result<()> {
    let index = TagFile::open(tags_path, config.index_options()).map_err(explain)?;
    let result = InfoResult {
        path: index.path().display().to_string(),
        file_size: index.file_size(),
        sorted: index.is_sorted(),
        order: index.order(),
        pseudo_tags: index
            .pseudo_tags()
            .iter()
            .map(|(name, value)| PseudoTag {
                name: name.clone(),
                value: value.clone(),
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => {
            print_json(&result, compact)?;
        }
        OutputFormat::Text => {
            println!("{} {}", "📁".cyan(), result.path.cyan());
            println!("   size:   {} bytes", result.file_size);
            let sorted = if !result.sorted {
                "no".red().to_string()
            } else if index.is_case_insensitive() {
                "yes (case-insensitive)".green().to_string()
            } else {
                "yes".green().to_string()
            };
            println!("   sorted: {}", sorted);
            for tag in &result.pseudo_tags {
                println!("   {} {}", tag.name.dimmed(), tag.value);
            }
        }
    }

    Ok(())
}
