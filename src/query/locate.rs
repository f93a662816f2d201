// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolve a tag record to a file and line

use anyhow::{bail, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::query::{populate_list, TagQuery};
use tagseek::config::Config;
use tagseek::output::print_json;
use tagseek::tags::{read_lines, FileLineSource, TagKind};

/// Location result for JSON output
#[derive(Debug, Serialize)]
struct LocateResult {
    tag: String,
    kind: TagKind,
    path: String,
    line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    context: Vec<ContextLine>,
}

/// A source line shown around the located one
#[derive(Debug, Serialize)]
struct ContextLine {
    line: u32,
    text: String,
}

/// Run the locate command
#[allow(clippy::too_many_arguments)]
pub fn run(
    tags_path: &Path,
    global_tags: Option<&Path>,
    query: &TagQuery<'_>,
    prefix: bool,
    index: usize,
    peek: (usize, usize),
    config: &Config,
    format: OutputFormat,
    compact: bool,
) -> Result<()> {
    let (mut list, name) = populate_list(
        tags_path,
        global_tags,
        query,
        prefix,
        index.saturating_add(1),
        config,
    )?;
    if let Some(line) = query.line_hint {
        list.set_line_hint(&name, line);
    }

    let Some(record) = list.get(index) else {
        if list.is_empty() {
            bail!("No tags found for: {}", name);
        }
        bail!("Tag {} has {} record(s), no record #{}", name, list.len(), index);
    };

    let (reader, path) = list.open_source_file(&record, config.reader_kind())?;
    let mut lines = FileLineSource::new(reader.as_ref());
    let line = list.find_line_number(&mut lines, &record)?;

    let (pre, post) = peek;
    let first = line.saturating_sub(pre as u32).max(1);
    let last = line.saturating_add(post as u32);
    let mut text = None;
    let mut context = Vec::new();
    for (number, bytes) in read_lines(&mut lines, first, last)? {
        let bytes = String::from_utf8_lossy(&bytes).into_owned();
        if number == line {
            text = Some(bytes);
        } else {
            context.push(ContextLine {
                line: number,
                text: bytes,
            });
        }
    }

    let result = LocateResult {
        tag: String::from_utf8_lossy(record.tag).into_owned(),
        kind: record.kind,
        path: path.display().to_string(),
        line,
        text,
        context,
    };

    match format {
        OutputFormat::Json => {
            print_json(&result, compact)?;
        }
        OutputFormat::Text => {
            let kind_str = format!("[{}]", result.kind);
            println!(
                "  {} {} {}:{}",
                kind_str.blue(),
                result.tag.green(),
                result.path.cyan(),
                result.line.to_string().yellow()
            );
            let (before, after): (Vec<_>, Vec<_>) =
                result.context.iter().partition(|c| c.line < line);
            for ctx in &before {
                println!("      {} {}", format!("{:4}", ctx.line).dimmed(), ctx.text.dimmed());
            }
            if let Some(text) = &result.text {
                println!("    {} {} {}", "➜".green(), format!("{:4}", line).dimmed(), text);
            }
            for ctx in &after {
                println!("      {} {}", format!("{:4}", ctx.line).dimmed(), ctx.text.dimmed());
            }
        }
    }

    Ok(())
}
