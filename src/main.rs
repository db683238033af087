use anyhow::{bail, Context, Result};
use clap::Parser;
use makegrind::cli::{Cli, Command};
use makegrind::critical_path::{critical_path, resolve_target};
use makegrind::graph::BuildGraph;
use makegrind::{callgrind, loader, reports};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Map -v count onto a tracing level, keeping RUST_LOG overrides usable
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

/// Discover, parse, and merge every input trace. Per-file failures are all
/// reported before the run aborts; merge warnings are logged and the run
/// continues.
fn load_graph(inputs: &[PathBuf]) -> Result<BuildGraph> {
    let files = loader::find_trace_files(inputs)?;
    info!("loading {} trace files", files.len());

    let outcome = loader::load_and_merge(&files);
    for failure in &outcome.failures {
        error!("{failure}");
    }
    if !outcome.failures.is_empty() {
        bail!(
            "failed to parse {} of {} trace files",
            outcome.failures.len(),
            files.len()
        );
    }
    for warning in &outcome.warnings {
        warn!("{warning}");
    }
    Ok(outcome.graph)
}

/// Render a report as YAML to stdout or a file
fn write_report<T: Serialize>(report: &T, output: Option<&Path>) -> Result<()> {
    let rendered = serde_yaml::to_string(report)?;
    match output {
        None => print!("{rendered}"),
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("writing report to {}", path.display()))?,
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let graph = load_graph(&args.input)?;

    match args.command {
        Command::Summary { output } => {
            info!("generating summary report");
            write_report(&reports::summary(&graph), output.as_deref())?;
        }
        Command::Paths {
            targets,
            children,
            output,
        } => {
            let report = if targets.is_empty() {
                info!("generating top path report");
                reports::top_path_report(&graph, children)?
            } else {
                info!("generating path report through {} waypoints", targets.len());
                let waypoints = targets
                    .iter()
                    .map(|filter| resolve_target(&graph, filter))
                    .collect::<makegrind::error::Result<Vec<_>>>()?;
                let path = critical_path(&graph, &waypoints)?;
                reports::path_report(&graph, &path, children)
            };
            write_report(&report, output.as_deref())?;
        }
        Command::Dirs {
            limit,
            prefix,
            output,
        } => {
            info!("generating directory report");
            let report = reports::dirs_report(&graph, limit, prefix.as_deref());
            write_report(&report, output.as_deref())?;
        }
        Command::Recipes { limit, output } => {
            info!("generating recipe report");
            let report = reports::recipes_report(&graph, limit);
            write_report(&report, output.as_deref())?;
        }
        Command::Callgrind { output } => {
            info!("generating callgrind file {}", output.display());
            let file = File::create(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let mut writer = BufWriter::new(file);
            callgrind::write_callgrind(&graph, &mut writer)?;
            writer.flush()?;
        }
    }

    Ok(())
}
