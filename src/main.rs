// SPDX-License-Identifier: MIT OR Apache-2.0

//! tagseek - Fast lookups in ctags files
//!
//! Binary searches sorted tags files through a cache of page descriptors and
//! relocates the records it finds in their source files.

mod cli;
mod query;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, OutputFormat};
use tagseek::config::{Config, ConfigOutputFormat};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TAGSEEK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load();

    let format = cli.format.unwrap_or(match config.output_format() {
        Some(ConfigOutputFormat::Json) => OutputFormat::Json,
        _ => OutputFormat::Text,
    });
    let compact = cli.compact;
    let global_tags = cli
        .global_tags
        .clone()
        .or_else(|| config.global_tags_file.clone());
    let tags = match query::resolve_tags_file(cli.tags.as_deref(), &config) {
        Ok(tags) => tags,
        // With no local tags file the global one is searched directly
        Err(err) => match &global_tags {
            Some(global) if global.is_file() => global.clone(),
            _ => return Err(err),
        },
    };
    let global_tags = global_tags.as_deref().filter(|global| global.is_file());

    match cli.command {
        Commands::Lookup { tag, matching, max } => {
            let query = query::TagQuery::parse(&tag, matching.word)?;
            let max_results = config.merge_max_results(max);
            let prefix = matching.prefix_mode(config.prefix_match);
            query::lookup::run(
                &tags,
                global_tags,
                &query,
                prefix,
                max_results,
                &config,
                format,
                compact,
            )?;
        }
        Commands::Locate {
            tag,
            matching,
            index,
            context,
        } => {
            let query = query::TagQuery::parse(&tag, matching.word)?;
            let prefix = matching.prefix_mode(config.prefix_match);
            let peek = config.merge_peek(context);
            query::locate::run(
                &tags,
                global_tags,
                &query,
                prefix,
                index,
                peek,
                &config,
                format,
                compact,
            )?;
        }
        Commands::Complete { prefix, max } => {
            let max = config.merge_max_results(max);
            query::complete::run(&tags, &prefix, max, &config, format, compact)?;
        }
        Commands::Range { tag } => {
            query::range::run(&tags, &tag, &config, format, compact)?;
        }
        Commands::Info => {
            query::info::run(&tags, &config, format, compact)?;
        }
    }

    Ok(())
}
