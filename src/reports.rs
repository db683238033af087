//! Read-only aggregation passes over the merged build graph
//!
//! Every report is a pure fold producing plain serializable data; the output
//! encoding is the caller's business. All orderings are descending by time
//! with ties broken by target identity, so a fixed graph and fixed parameters
//! always produce identical output.

use crate::critical_path::critical_path;
use crate::error::Result;
use crate::graph::{BuildGraph, Target, TargetId};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Overall statistics for the merged build
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    /// Total number of targets in the graph
    pub targets: usize,
    /// Targets whose recipe actually executed
    pub recipes_executed: usize,
    /// Sum of all recipe times, seconds
    pub total_recipe_time: f64,
    /// Wall time of the top-level target, seconds
    pub overall_elapsed: f64,
}

/// One node of a critical-path report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathNode {
    pub target: String,
    pub directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Wall time, seconds
    pub elapsed: f64,
    /// Recipe time, seconds; absent if the recipe never ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<f64>,
    /// Highest-time direct dependencies, for context
    pub children: Vec<PathChild>,
}

/// Abbreviated dependency entry shown under a path node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathChild {
    pub target: String,
    pub directory: String,
    pub elapsed: f64,
}

/// Per-directory time breakdown entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirEntry {
    pub directory: String,
    /// Summed wall time of the directory's targets, seconds
    pub elapsed: f64,
    pub targets: usize,
}

/// Per-recipe time breakdown entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeEntry {
    pub target: String,
    pub directory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Recipe time, seconds
    pub recipe: f64,
    /// Wall time, seconds
    pub elapsed: f64,
}

fn secs(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

/// Total target count, executed-recipe count, summed recipe time, and the
/// overall elapsed time of the top-level target.
pub fn summary(graph: &BuildGraph) -> SummaryReport {
    let mut recipes_executed = 0;
    let mut total_recipe_time = Duration::ZERO;
    for (_, target) in graph.iter() {
        if let Some(recipe) = target.recipe {
            recipes_executed += 1;
            total_recipe_time += recipe;
        }
    }
    SummaryReport {
        targets: graph.len(),
        recipes_executed,
        total_recipe_time: secs(total_recipe_time),
        overall_elapsed: secs(overall_elapsed(graph)),
    }
}

/// Elapsed time of the heaviest entry goal, falling back to the heaviest
/// root when no top-level trace was seen.
fn overall_elapsed(graph: &BuildGraph) -> Duration {
    let goal_elapsed = graph.entry().and_then(|entry| {
        entry
            .goals
            .iter()
            .filter_map(|goal| graph.get(goal))
            .map(|target| target.elapsed)
            .max()
    });
    match goal_elapsed {
        Some(elapsed) => elapsed,
        None => graph
            .roots()
            .into_iter()
            .filter_map(|id| graph.get(id))
            .map(|target| target.elapsed)
            .max()
            .unwrap_or_default(),
    }
}

/// Render a path as report nodes, each with up to `children` of its
/// highest-time dependencies for context.
pub fn path_report(graph: &BuildGraph, path: &[TargetId], children: usize) -> Vec<PathNode> {
    path.iter()
        .filter_map(|id| graph.get(id).map(|target| path_node(graph, id, target, children)))
        .collect()
}

/// Path report over the unconstrained critical path
pub fn top_path_report(graph: &BuildGraph, children: usize) -> Result<Vec<PathNode>> {
    let path = critical_path(graph, &[])?;
    Ok(path_report(graph, &path, children))
}

fn path_node(graph: &BuildGraph, id: &TargetId, target: &Target, children: usize) -> PathNode {
    let mut deps: Vec<&TargetId> = target
        .successors
        .iter()
        .filter(|successor| graph.contains(successor))
        .collect();
    deps.sort_by(|a, b| {
        let (a_elapsed, b_elapsed) = (child_elapsed(graph, a), child_elapsed(graph, b));
        b_elapsed.cmp(&a_elapsed).then_with(|| a.cmp(b))
    });

    PathNode {
        target: id.name.clone(),
        directory: id.directory.clone(),
        file: id.file.clone(),
        line: target.line,
        elapsed: secs(target.elapsed),
        recipe: target.recipe.map(secs),
        children: deps
            .into_iter()
            .take(children)
            .map(|dep| PathChild {
                target: dep.name.clone(),
                directory: dep.directory.clone(),
                elapsed: secs(child_elapsed(graph, dep)),
            })
            .collect(),
    }
}

fn child_elapsed(graph: &BuildGraph, id: &TargetId) -> Duration {
    graph.get(id).map(|target| target.elapsed).unwrap_or_default()
}

/// Group targets by directory and sum elapsed time per group, optionally
/// restricted to directories starting with `prefix`; top `count` by time.
pub fn dirs_report(graph: &BuildGraph, count: usize, prefix: Option<&str>) -> Vec<DirEntry> {
    let mut groups: BTreeMap<&str, (Duration, usize)> = BTreeMap::new();
    for (id, target) in graph.iter() {
        if let Some(prefix) = prefix {
            if !id.directory.starts_with(prefix) {
                continue;
            }
        }
        let group = groups.entry(id.directory.as_str()).or_default();
        group.0 += target.elapsed;
        group.1 += 1;
    }

    let mut entries: Vec<(&str, Duration, usize)> = groups
        .into_iter()
        .map(|(directory, (elapsed, targets))| (directory, elapsed, targets))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(count)
        .map(|(directory, elapsed, targets)| DirEntry {
            directory: directory.to_string(),
            elapsed: secs(elapsed),
            targets,
        })
        .collect()
}

/// Targets whose recipe executed, top `count` by recipe time
pub fn recipes_report(graph: &BuildGraph, count: usize) -> Vec<RecipeEntry> {
    let mut executed: Vec<(&TargetId, &Target, Duration)> = graph
        .iter()
        .filter_map(|(id, target)| target.recipe.map(|recipe| (id, target, recipe)))
        .collect();
    executed.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(b.0)));
    executed
        .into_iter()
        .take(count)
        .map(|(id, target, recipe)| RecipeEntry {
            target: id.name.clone(),
            directory: id.directory.clone(),
            file: id.file.clone(),
            recipe: secs(recipe),
            elapsed: secs(target.elapsed),
        })
        .collect()
}
