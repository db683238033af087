//! Trace file parsing: one `build.PID.json` file into a graph fragment
//!
//! The on-disk schema is the external contract emitted by the instrumented
//! build tool and is validated here, at the boundary, rather than accessed ad
//! hoc downstream. A malformed file fails whole with [`Error::TraceFormat`]
//! naming the path; there is no partial recovery, so a corrupt file
//! contributes zero targets and is reported as a distinct failure.
//!
//! Parsing is a pure transformation of file contents; each file can be parsed
//! concurrently with no shared state (see [`crate::loader`]).

use crate::error::{Error, Result};
use crate::graph::{BuildGraph, Entry, Target, TargetId};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// One per-process trace file. `creator`/`argv`/`goals` are present only on
/// the top-level trace; recursive sub-makes emit targets alone.
#[derive(Debug, Deserialize)]
struct TraceFile {
    pid: u32,
    directory: String,
    creator: Option<String>,
    argv: Option<Vec<String>>,
    goals: Option<Vec<String>>,
    targets: Vec<TraceTarget>,
}

/// A single target observation
#[derive(Debug, Deserialize)]
struct TraceTarget {
    target: String,
    file: Option<String>,
    line: Option<u32>,
    /// Defaults to the trace file's directory
    directory: Option<String>,
    /// Wall-clock start/end, seconds
    start: f64,
    end: f64,
    /// Recipe duration in seconds; present only if the recipe actually ran
    recipe: Option<f64>,
    #[serde(default)]
    depends: Vec<DependRef>,
}

/// Reference to a direct dependency, resolved against the trace directory
#[derive(Debug, Deserialize)]
struct DependRef {
    target: String,
    file: Option<String>,
    directory: Option<String>,
}

/// Parse one trace file into a graph fragment covering the targets that
/// file's process observed.
pub fn parse_trace_file(path: &Path) -> Result<BuildGraph> {
    let bytes = fs::read(path).map_err(|err| Error::TraceFormat {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let trace: TraceFile = serde_json::from_slice(&bytes).map_err(|err| Error::TraceFormat {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    build_fragment(trace).map_err(|reason| Error::TraceFormat {
        path: path.to_path_buf(),
        reason,
    })
}

fn build_fragment(trace: TraceFile) -> std::result::Result<BuildGraph, String> {
    let mut fragment = BuildGraph::new();
    let mut stubs: Vec<TargetId> = Vec::new();

    for record in &trace.targets {
        let id = record_id(&trace, record);
        let target = build_target(&trace, record)?;
        stubs.extend(target.successors.iter().cloned());
        // Duplicate records within one file merge like any other overlap.
        fragment.insert(id, target);
    }

    // Dependency references without a record of their own become zero-time
    // placeholders so successor lookups always resolve after the merge.
    for id in stubs {
        fragment.insert_stub(id, trace.pid);
    }

    if let Some(creator) = &trace.creator {
        let goals = trace
            .goals
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(|name| goal_id(&trace, name))
            .collect();
        fragment.set_entry(Entry {
            creator: creator.clone(),
            argv: trace.argv.clone().unwrap_or_default(),
            goals,
        });
    }

    Ok(fragment)
}

fn record_id(trace: &TraceFile, record: &TraceTarget) -> TargetId {
    TargetId {
        directory: record
            .directory
            .clone()
            .unwrap_or_else(|| trace.directory.clone()),
        file: record.file.clone(),
        name: record.target.clone(),
    }
}

fn build_target(trace: &TraceFile, record: &TraceTarget) -> std::result::Result<Target, String> {
    if !record.start.is_finite() || !record.end.is_finite() {
        return Err(format!("target {:?}: non-finite timestamp", record.target));
    }
    if record.end < record.start {
        return Err(format!(
            "target {:?}: end timestamp {} precedes start {}",
            record.target, record.end, record.start
        ));
    }
    let elapsed = Duration::try_from_secs_f64(record.end - record.start).map_err(|_| {
        format!(
            "target {:?}: elapsed time {}s out of range",
            record.target,
            record.end - record.start
        )
    })?;

    let recipe = match record.recipe {
        None => None,
        Some(seconds) if !seconds.is_finite() || seconds < 0.0 => {
            return Err(format!(
                "target {:?}: invalid recipe duration {}",
                record.target, seconds
            ));
        }
        Some(seconds) => {
            let recipe = Duration::try_from_secs_f64(seconds).map_err(|_| {
                format!(
                    "target {:?}: invalid recipe duration {}",
                    record.target, seconds
                )
            })?;
            if recipe > elapsed {
                return Err(format!(
                    "target {:?}: recipe time {}s exceeds elapsed {}s",
                    record.target,
                    seconds,
                    elapsed.as_secs_f64()
                ));
            }
            Some(recipe)
        }
    };

    let successors = record
        .depends
        .iter()
        .map(|dep| TargetId {
            directory: dep
                .directory
                .clone()
                .unwrap_or_else(|| trace.directory.clone()),
            file: dep.file.clone(),
            name: dep.target.clone(),
        })
        .collect();

    Ok(Target {
        line: record.line,
        elapsed,
        recipe,
        successors,
        pids: vec![trace.pid],
    })
}

/// Resolve a goal name to the identity of the record defining it in this
/// trace, falling back to a file-less identity in the trace directory.
fn goal_id(trace: &TraceFile, name: &str) -> TargetId {
    trace
        .targets
        .iter()
        .find(|record| record.target == name)
        .map(|record| record_id(trace, record))
        .unwrap_or_else(|| TargetId {
            directory: trace.directory.clone(),
            file: None,
            name: name.to_string(),
        })
}
