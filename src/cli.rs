//! CLI argument parsing for makegrind

use crate::critical_path::TargetFilter;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "makegrind")]
#[command(version)]
#[command(about = "Analyze build trace files generated by instrumented make builds", long_about = None)]
pub struct Cli {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to a build trace file or a directory to search within
    #[arg(short = 'i', long = "input", value_name = "PATH", global = true)]
    pub input: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a summary report
    Summary {
        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show the dependency path taking the most time
    Paths {
        /// Ensure the path passes through a target, formatted as
        /// TARGET[:MAKEFILE[:PID]]; may be given multiple times, in order
        #[arg(short = 't', long = "target", value_name = "SPEC", value_parser = parse_target_spec)]
        targets: Vec<TargetFilter>,

        /// Limit the number of children displayed for each node of the path
        #[arg(short, long, default_value_t = 10)]
        children: usize,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show stats on directories taking the most time
    Dirs {
        /// Limit output to the specified number of entries
        #[arg(short = 'n', long = "limit", default_value_t = 10)]
        limit: usize,

        /// Only include directories under the specified prefix
        #[arg(short, long)]
        prefix: Option<String>,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show stats on recipes taking the most time
    Recipes {
        /// Limit output to the specified number of entries
        #[arg(short = 'n', long = "limit", default_value_t = 10)]
        limit: usize,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Generate a callgrind-formatted file from the combined trace files
    Callgrind {
        /// Output file
        #[arg(short, long, value_name = "FILE", default_value = "callgrind.out.targets")]
        output: PathBuf,
    },
}

/// Parse a `TARGET[:MAKEFILE[:PID]]` specifier. Empty segments leave the
/// corresponding filter absent.
fn parse_target_spec(spec: &str) -> Result<TargetFilter, String> {
    let mut parts = spec.splitn(3, ':');
    let name = parts.next().filter(|s| !s.is_empty());
    let makefile = parts.next().filter(|s| !s.is_empty());
    let pid = match parts.next().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(
            raw.parse::<u32>()
                .map_err(|_| format!("invalid pid {raw:?} in target specifier"))?,
        ),
    };

    let filter = TargetFilter {
        name: name.map(str::to_string),
        makefile: makefile.map(str::to_string),
        pid,
    };
    if filter == TargetFilter::default() {
        return Err("empty target specifier".to_string());
    }
    Ok(filter)
}
