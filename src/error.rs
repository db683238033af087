//! Error taxonomy for trace ingestion, target resolution, and path analysis
//!
//! Parse failures are collected per input file rather than aborting a batch;
//! resolution and path errors abort only the operation that requested them.

use crate::critical_path::TargetFilter;
use crate::graph::TargetId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the makegrind core
#[derive(Error, Debug)]
pub enum Error {
    /// A trace file could not be read or does not conform to the schema.
    /// Fatal for that file only; it contributes zero targets.
    #[error("{}: invalid trace file: {reason}", .path.display())]
    TraceFormat { path: PathBuf, reason: String },

    /// No target matches the supplied filters
    #[error("no target matches {filter}")]
    TargetNotFound { filter: TargetFilter },

    /// More than one target matches the supplied filters
    #[error("ambiguous target: {filter} matches {}", format_matches(.matches))]
    AmbiguousTarget {
        filter: TargetFilter,
        matches: Vec<TargetId>,
    },

    /// No successor chain connects two consecutive waypoints
    #[error("no dependency chain connects {from} to {to}")]
    DisconnectedWaypoint { from: TargetId, to: TargetId },

    /// A successor chain revisited a target; the graph is not acyclic
    #[error("dependency cycle detected at {at}")]
    GraphIntegrity { at: TargetId },

    /// File discovery found nothing to load
    #[error("unable to find build trace files in {searched}")]
    NoTraceFiles { searched: String },

    /// A path was requested over a graph with no targets
    #[error("build graph contains no targets")]
    EmptyGraph,
}

pub type Result<T> = std::result::Result<T, Error>;

fn format_matches(matches: &[TargetId]) -> String {
    let mut shown: Vec<String> = matches.iter().take(5).map(ToString::to_string).collect();
    if matches.len() > shown.len() {
        shown.push(format!("... ({} total)", matches.len()));
    }
    shown.join(", ")
}
