//! Trace file discovery and parallel load-and-merge
//!
//! Parsing fans out across input files (each file is independent, with no
//! shared state); the merge fold is strictly sequential and single-owner.
//! Once the fold completes the graph is immutable and may be read from any
//! number of threads.

use crate::error::{Error, Result};
use crate::graph::{BuildGraph, MergeWarning};
use crate::trace::parse_trace_file;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Outcome of loading a batch of trace files.
///
/// Per-file parse failures are collected rather than aborting the batch; the
/// caller decides whether to continue with the partial graph.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub graph: BuildGraph,
    pub warnings: Vec<MergeWarning>,
    pub failures: Vec<Error>,
}

/// Locate trace files. Explicit file paths pass through untouched;
/// directories are searched recursively for `build.*.json`. Empty input
/// means the current directory.
///
/// Fails with [`Error::NoTraceFiles`] when nothing matches, which callers
/// must keep distinct from per-file parse failures.
pub fn find_trace_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let inputs: Vec<PathBuf> = if inputs.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        inputs.to_vec()
    };

    let mut paths = Vec::new();
    for input in &inputs {
        debug!("checking {}", input.display());
        if input.is_file() {
            paths.push(input.clone());
        } else {
            for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() && is_trace_file(entry.path()) {
                    paths.push(entry.path().to_path_buf());
                }
            }
        }
    }

    paths.sort();
    paths.dedup();
    if paths.is_empty() {
        return Err(Error::NoTraceFiles {
            searched: inputs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    debug!("found {} trace files", paths.len());
    Ok(paths)
}

fn is_trace_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("build.") && name.ends_with(".json"))
}

/// Parse every file concurrently, then fold the fragments into one graph in
/// path order. Fragments are dropped as they are folded; nothing holds a
/// back-reference to them afterwards.
pub fn load_and_merge(paths: &[PathBuf]) -> LoadOutcome {
    let fragments: Vec<Result<BuildGraph>> =
        paths.par_iter().map(|path| parse_trace_file(path)).collect();

    let mut outcome = LoadOutcome::default();
    for fragment in fragments {
        match fragment {
            Ok(fragment) => {
                let warnings = outcome.graph.merge(fragment);
                outcome.warnings.extend(warnings);
            }
            Err(err) => outcome.failures.push(err),
        }
    }
    outcome
}
