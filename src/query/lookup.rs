// SPDX-License-Identifier: MIT OR Apache-2.0

//! List the records of a tag

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::query::{populate_list, RecordResult, TagQuery};
use tagseek::config::Config;
use tagseek::output::print_json;

/// Run the lookup command
#[allow(clippy::too_many_arguments)]
pub fn run(
    tags_path: &Path,
    global_tags: Option<&Path>,
    query: &TagQuery<'_>,
    prefix: bool,
    max_results: usize,
    config: &Config,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let (list, name) = populate_list(tags_path, global_tags, query, prefix, max_results, config)?;
    let results: Vec<RecordResult> = list.iter().map(|r| RecordResult::from(&r)).collect();

    match format {
        OutputFormat::Json => {
            print_json(&results, compact)?;
        }
        OutputFormat::Text => {
            if results.is_empty() {
                println!("{} No tags found for: {}", "✗".red(), name.yellow());
                return Ok(());
            }

            let label = if prefix { "Tags starting with" } else { "Tags named" };
            println!("\n{} {}: {}\n", "🔍".cyan(), label, name.yellow());

            for record in &results {
                let kind_str = format!("[{}]", record.kind);
                let location = match record.line {
                    Some(line) => format!("{}:{}", record.file, line),
                    None => record.file.clone(),
                };
                println!(
                    "  {} {} {}  {}",
                    kind_str.blue(),
                    record.tag.green(),
                    location.cyan(),
                    record.ex_cmd.dimmed()
                );
            }

            if results.len() == max_results {
                println!(
                    "\n{} Showing the first {} records (use `-m` to increase)",
                    "ℹ".cyan(),
                    max_results.to_string().cyan()
                );
            }
        }
    }

    Ok(())
}
