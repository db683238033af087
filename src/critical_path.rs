//! Critical path computation and target resolution over the merged graph
//!
//! The critical path is the dependency chain that dominates total build wall
//! time. At each node the walk descends into the successor with the greatest
//! elapsed time, a greedy longest-chain-by-node-weight approximation. A true
//! activity-on-node longest-path solve would need wall-clock start/end
//! timestamps on every target, which not all trace sources guarantee; the
//! greedy descent only needs cumulative durations.
//!
//! Waypoints constrain the path to visit caller-specified targets in order.
//! Between two fixed points the descent is restricted to nodes from which the
//! next waypoint is still reachable, so the greedy rule cannot walk away from
//! it and spuriously report disconnection.

use crate::error::{Error, Result};
use crate::graph::{BuildGraph, Target, TargetId};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::time::Duration;

/// Filters identifying a single target. Any subset may be supplied; an
/// absent filter matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    /// Target name
    pub name: Option<String>,
    /// Matches the target's directory or its defining makefile
    pub makefile: Option<String>,
    /// Restricts to targets contributed by a specific trace process
    pub pid: Option<u32>,
}

impl TargetFilter {
    fn matches(&self, id: &TargetId, target: &Target) -> bool {
        if let Some(name) = &self.name {
            if &id.name != name {
                return false;
            }
        }
        if let Some(makefile) = &self.makefile {
            let file_matches = id.file.as_deref() == Some(makefile.as_str());
            if &id.directory != makefile && !file_matches {
                return false;
            }
        }
        if let Some(pid) = self.pid {
            if !target.pids.contains(&pid) {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for TargetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("target={name}"));
        }
        if let Some(makefile) = &self.makefile {
            parts.push(format!("makefile={makefile}"));
        }
        if let Some(pid) = self.pid {
            parts.push(format!("pid={pid}"));
        }
        if parts.is_empty() {
            write!(f, "<any target>")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

/// Locate the unique target matching the supplied filters.
///
/// Fails with [`Error::AmbiguousTarget`] when more than one target matches
/// and [`Error::TargetNotFound`] when none do.
pub fn resolve_target(graph: &BuildGraph, filter: &TargetFilter) -> Result<TargetId> {
    let mut matches: Vec<TargetId> = graph
        .iter()
        .filter(|(id, target)| filter.matches(id, target))
        .map(|(id, _)| id.clone())
        .collect();

    match matches.len() {
        0 => Err(Error::TargetNotFound {
            filter: filter.clone(),
        }),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::AmbiguousTarget {
            filter: filter.clone(),
            matches,
        }),
    }
}

/// Compute the dependency chain dominating total build wall time.
///
/// With waypoints, the returned path visits each waypoint in the given order,
/// with greedy descent filling the segments before the first, between
/// consecutive, and after the last waypoint. Fails with
/// [`Error::DisconnectedWaypoint`] when no successor chain connects two
/// consecutive waypoints, and with [`Error::GraphIntegrity`] if the descent
/// revisits a target (the graph is not acyclic).
pub fn critical_path(graph: &BuildGraph, waypoints: &[TargetId]) -> Result<Vec<TargetId>> {
    if graph.is_empty() {
        return Err(Error::EmptyGraph);
    }

    let mut path: Vec<TargetId> = Vec::new();
    let mut visited: BTreeSet<TargetId> = BTreeSet::new();

    if waypoints.is_empty() {
        start_path(&mut path, &mut visited, start_target(graph)?);
        descend(graph, &mut path, &mut visited, None, None)?;
        return Ok(path);
    }

    for waypoint in waypoints {
        if !graph.contains(waypoint) {
            return Err(Error::TargetNotFound {
                filter: TargetFilter {
                    name: Some(waypoint.name.clone()),
                    makefile: Some(waypoint.directory.clone()),
                    pid: None,
                },
            });
        }
    }

    // Segment before the first waypoint: start from the heaviest entry goal
    // that can still reach it, or from the waypoint itself if none can.
    let first = &waypoints[0];
    let reach = reachable_to(graph, first);
    let head = candidate_heads(graph)
        .into_iter()
        .filter(|id| reach.contains(id))
        .max_by(|a, b| heavier(graph, a, b))
        .unwrap_or_else(|| first.clone());
    start_path(&mut path, &mut visited, head);
    descend(graph, &mut path, &mut visited, Some(&reach), Some(first))?;

    for pair in waypoints.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        if from == to {
            continue;
        }
        let reach = reachable_to(graph, to);
        if !reach.contains(from) {
            return Err(Error::DisconnectedWaypoint {
                from: from.clone(),
                to: to.clone(),
            });
        }
        descend(graph, &mut path, &mut visited, Some(&reach), Some(to))?;
    }

    // Segment after the last waypoint
    descend(graph, &mut path, &mut visited, None, None)?;
    Ok(path)
}

fn start_path(path: &mut Vec<TargetId>, visited: &mut BTreeSet<TargetId>, head: TargetId) {
    visited.insert(head.clone());
    path.push(head);
}

/// Greedy max-elapsed descent from the current end of `path`.
///
/// `within` restricts candidate successors; `stop` ends the walk at a
/// waypoint. With `within` set to the reverse-reachability set of `stop`,
/// every non-stop node in the set has at least one in-set successor, so the
/// walk terminates at `stop` on an acyclic graph.
fn descend(
    graph: &BuildGraph,
    path: &mut Vec<TargetId>,
    visited: &mut BTreeSet<TargetId>,
    within: Option<&BTreeSet<TargetId>>,
    stop: Option<&TargetId>,
) -> Result<()> {
    loop {
        let current = match path.last() {
            Some(current) => current.clone(),
            None => return Ok(()),
        };
        if stop == Some(&current) {
            return Ok(());
        }
        let Some(target) = graph.get(&current) else {
            return Ok(());
        };

        let next = target
            .successors
            .iter()
            .filter(|id| graph.contains(id))
            .filter(|id| within.map_or(true, |set| set.contains(*id)))
            .max_by(|a, b| heavier(graph, a, b));

        match next {
            None => return Ok(()),
            Some(next) => {
                if !visited.insert(next.clone()) {
                    return Err(Error::GraphIntegrity { at: next.clone() });
                }
                path.push(next.clone());
            }
        }
    }
}

/// Ordering by elapsed time, ties broken toward the smaller identity so the
/// maximum is deterministic.
fn heavier(graph: &BuildGraph, a: &TargetId, b: &TargetId) -> std::cmp::Ordering {
    weight(graph, a)
        .cmp(&weight(graph, b))
        .then_with(|| b.cmp(a))
}

fn weight(graph: &BuildGraph, id: &TargetId) -> Duration {
    graph.get(id).map(|target| target.elapsed).unwrap_or_default()
}

/// Starting points for descent: the Entry's goals when present, otherwise
/// targets with no incoming edges.
fn candidate_heads(graph: &BuildGraph) -> Vec<TargetId> {
    if let Some(entry) = graph.entry() {
        let goals: Vec<TargetId> = entry
            .goals
            .iter()
            .filter(|goal| graph.contains(goal))
            .cloned()
            .collect();
        if !goals.is_empty() {
            return goals;
        }
    }
    graph.roots().into_iter().cloned().collect()
}

fn start_target(graph: &BuildGraph) -> Result<TargetId> {
    let best = candidate_heads(graph)
        .into_iter()
        .max_by(|a, b| heavier(graph, a, b));
    match best {
        Some(id) => Ok(id),
        // No roots at all means every target is someone's successor, which
        // only happens on a cyclic graph; fall back to the heaviest target so
        // the descent's visited check can report the cycle.
        None => graph
            .iter()
            .map(|(id, _)| id.clone())
            .max_by(|a, b| heavier(graph, a, b))
            .ok_or(Error::EmptyGraph),
    }
}

/// All targets from which `goal` is reachable over successor edges,
/// including `goal` itself. One reverse breadth-first walk.
fn reachable_to(graph: &BuildGraph, goal: &TargetId) -> BTreeSet<TargetId> {
    let predecessors = graph.predecessors();
    let mut reach = BTreeSet::new();
    let mut queue = VecDeque::new();
    if graph.contains(goal) {
        reach.insert(goal.clone());
        queue.push_back(goal.clone());
    }
    while let Some(current) = queue.pop_front() {
        if let Some(preds) = predecessors.get(&current) {
            for pred in preds {
                if reach.insert((*pred).clone()) {
                    queue.push_back((*pred).clone());
                }
            }
        }
    }
    reach
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Entry;

    fn id(name: &str) -> TargetId {
        TargetId::new("/src", Some("Makefile"), name)
    }

    fn target(elapsed_ms: u64, successors: Vec<TargetId>) -> Target {
        Target {
            line: Some(1),
            elapsed: Duration::from_millis(elapsed_ms),
            recipe: None,
            successors,
            pids: vec![1],
        }
    }

    fn chain_graph() -> BuildGraph {
        // A(300) -> B(200) -> C(100)
        let mut graph = BuildGraph::new();
        graph.insert(id("A"), target(300, vec![id("B")]));
        graph.insert(id("B"), target(200, vec![id("C")]));
        graph.insert(id("C"), target(100, vec![]));
        graph.set_entry(Entry {
            creator: "remake".to_string(),
            argv: vec!["make".to_string()],
            goals: vec![id("A")],
        });
        graph
    }

    #[test]
    fn test_chain_critical_path() {
        let path = critical_path(&chain_graph(), &[]).unwrap();
        assert_eq!(path, vec![id("A"), id("B"), id("C")]);
    }

    #[test]
    fn test_descends_into_heaviest_successor() {
        let mut graph = BuildGraph::new();
        graph.insert(id("A"), target(300, vec![id("fast"), id("slow")]));
        graph.insert(id("fast"), target(50, vec![]));
        graph.insert(id("slow"), target(250, vec![]));
        let path = critical_path(&graph, &[]).unwrap();
        assert_eq!(path, vec![id("A"), id("slow")]);
    }

    #[test]
    fn test_tie_broken_by_identity() {
        let mut graph = BuildGraph::new();
        graph.insert(id("A"), target(300, vec![id("b"), id("a")]));
        graph.insert(id("a"), target(100, vec![]));
        graph.insert(id("b"), target(100, vec![]));
        let path = critical_path(&graph, &[]).unwrap();
        assert_eq!(path, vec![id("A"), id("a")]);
    }

    #[test]
    fn test_empty_graph_errors() {
        let err = critical_path(&BuildGraph::new(), &[]).unwrap_err();
        assert!(matches!(err, Error::EmptyGraph));
    }

    #[test]
    fn test_waypoint_redirects_path() {
        // A -> {big, small}; small -> leaf. Unconstrained descent goes to
        // big, a waypoint through small forces the other branch.
        let mut graph = BuildGraph::new();
        graph.insert(id("A"), target(300, vec![id("big"), id("small")]));
        graph.insert(id("big"), target(200, vec![]));
        graph.insert(id("small"), target(50, vec![id("leaf")]));
        graph.insert(id("leaf"), target(10, vec![]));
        graph.set_entry(Entry {
            creator: "remake".to_string(),
            argv: vec![],
            goals: vec![id("A")],
        });

        assert_eq!(
            critical_path(&graph, &[]).unwrap(),
            vec![id("A"), id("big")]
        );
        assert_eq!(
            critical_path(&graph, &[id("small")]).unwrap(),
            vec![id("A"), id("small"), id("leaf")]
        );
    }

    #[test]
    fn test_waypoints_in_order() {
        let graph = chain_graph();
        let path = critical_path(&graph, &[id("A"), id("C")]).unwrap();
        assert_eq!(path, vec![id("A"), id("B"), id("C")]);
    }

    #[test]
    fn test_disconnected_waypoints() {
        let mut graph = chain_graph();
        graph.insert(id("island"), target(10, vec![]));
        let err = critical_path(&graph, &[id("B"), id("island")]).unwrap_err();
        assert!(matches!(err, Error::DisconnectedWaypoint { .. }));
    }

    #[test]
    fn test_reversed_waypoints_disconnected() {
        let graph = chain_graph();
        let err = critical_path(&graph, &[id("C"), id("A")]).unwrap_err();
        assert!(matches!(err, Error::DisconnectedWaypoint { .. }));
    }

    #[test]
    fn test_unknown_waypoint_not_found() {
        let graph = chain_graph();
        let err = critical_path(&graph, &[id("ghost")]).unwrap_err();
        assert!(matches!(err, Error::TargetNotFound { .. }));
    }

    #[test]
    fn test_cycle_detected_instead_of_looping() {
        let mut graph = BuildGraph::new();
        graph.insert(id("A"), target(300, vec![id("B")]));
        graph.insert(id("B"), target(200, vec![id("A")]));
        let err = critical_path(&graph, &[]).unwrap_err();
        assert!(matches!(err, Error::GraphIntegrity { .. }));
    }

    #[test]
    fn test_resolve_by_name() {
        let graph = chain_graph();
        let filter = TargetFilter {
            name: Some("B".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_target(&graph, &filter).unwrap(), id("B"));
    }

    #[test]
    fn test_resolve_ambiguous_then_directory_disambiguates() {
        let mut graph = BuildGraph::new();
        graph.insert(
            TargetId::new("/src/a", Some("Makefile"), "all"),
            target(10, vec![]),
        );
        graph.insert(
            TargetId::new("/src/b", Some("Makefile"), "all"),
            target(20, vec![]),
        );

        let filter = TargetFilter {
            name: Some("all".to_string()),
            ..Default::default()
        };
        let err = resolve_target(&graph, &filter).unwrap_err();
        assert!(matches!(err, Error::AmbiguousTarget { .. }));

        let filter = TargetFilter {
            name: Some("all".to_string()),
            makefile: Some("/src/b".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_target(&graph, &filter).unwrap(),
            TargetId::new("/src/b", Some("Makefile"), "all")
        );
    }

    #[test]
    fn test_resolve_by_pid() {
        let mut graph = BuildGraph::new();
        let mut first = target(10, vec![]);
        first.pids = vec![100];
        let mut second = target(20, vec![]);
        second.pids = vec![200];
        graph.insert(TargetId::new("/src/a", Some("Makefile"), "all"), first);
        graph.insert(TargetId::new("/src/b", Some("Makefile"), "all"), second);

        let filter = TargetFilter {
            name: Some("all".to_string()),
            pid: Some(200),
            ..Default::default()
        };
        assert_eq!(
            resolve_target(&graph, &filter).unwrap(),
            TargetId::new("/src/b", Some("Makefile"), "all")
        );
    }

    #[test]
    fn test_resolve_none_matching() {
        let graph = chain_graph();
        let filter = TargetFilter {
            name: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_target(&graph, &filter).unwrap_err(),
            Error::TargetNotFound { .. }
        ));
    }
}
