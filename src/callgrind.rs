//! Callgrind-format export of the merged build graph
//!
//! Serializes the graph into the callgrind profile text format so external
//! visualizers (kcachegrind, qcachegrind) can browse the build. Two cost
//! events per target: wall time and recipe time, both in microseconds,
//! rounded to the nearest microsecond. Targets without a defining makefile
//! are excluded entirely, both as records and as call-edge endpoints, so the
//! export never contains anonymous placeholder nodes.

use crate::graph::{BuildGraph, Target, TargetId};
use std::io::{self, Write};
use std::time::Duration;

/// Write the graph as a callgrind profile to `out`.
pub fn write_callgrind<W: Write>(graph: &BuildGraph, out: &mut W) -> io::Result<()> {
    writeln!(out, "# callgrind format")?;
    writeln!(out, "version: 1")?;
    let (creator, argv) = match graph.entry() {
        Some(entry) => (entry.creator.as_str(), entry.argv.join(" ")),
        None => ("makegrind", String::new()),
    };
    writeln!(out, "creator: {creator}")?;
    writeln!(out, "cmd: {argv}")?;
    writeln!(out, "desc: Node: Targets")?;
    writeln!(out, "positions: line")?;
    writeln!(out, "event: Wt : Wall Time")?;
    writeln!(out, "event: Rt : Recipe Time")?;
    writeln!(out, "events: Wt Rt")?;

    for (id, target) in graph.iter() {
        let Some(file) = &id.file else {
            continue;
        };

        writeln!(out)?;
        writeln!(out, "ob={}", id.directory)?;
        writeln!(out, "fl={file}")?;
        writeln!(out, "fn={}", id.name)?;
        let line = target.line.unwrap_or(0);
        match target.recipe {
            Some(recipe) => writeln!(
                out,
                "{line} {} {}",
                micros(target.elapsed),
                micros(recipe)
            )?,
            None => writeln!(out, "{line} {}", micros(target.elapsed))?,
        }

        for dep in &target.successors {
            let Some((dep_file, dep_target)) = edge_endpoint(graph, dep) else {
                continue;
            };
            writeln!(out, "cob={}", dep.directory)?;
            writeln!(out, "cfi={dep_file}")?;
            writeln!(out, "cfn={}", dep.name)?;
            writeln!(out, "calls=1 {}", dep_target.line.unwrap_or(0))?;
            writeln!(out, "{line} {}", micros(dep_target.elapsed))?;
        }
    }
    Ok(())
}

/// A dependency qualifies as a call edge only if it resolves in the graph
/// and has a defining makefile of its own.
fn edge_endpoint<'a>(
    graph: &'a BuildGraph,
    dep: &'a TargetId,
) -> Option<(&'a str, &'a Target)> {
    let target = graph.get(dep)?;
    let file = dep.file.as_deref()?;
    Some((file, target))
}

/// Microseconds, rounded to nearest rather than truncated
fn micros(duration: Duration) -> u64 {
    (duration.as_secs_f64() * 1_000_000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Entry, Target};

    fn id(name: &str) -> TargetId {
        TargetId::new("/src", Some("Makefile"), name)
    }

    fn graph_with_edge() -> BuildGraph {
        let mut graph = BuildGraph::new();
        graph.insert(
            id("all"),
            Target {
                line: Some(3),
                elapsed: Duration::from_secs_f64(1.5),
                recipe: Some(Duration::from_secs_f64(0.25)),
                successors: vec![id("lib"), TargetId::new("/src", None::<&str>, "phony")],
                pids: vec![1],
            },
        );
        graph.insert(
            id("lib"),
            Target {
                line: Some(9),
                elapsed: Duration::from_secs_f64(0.5),
                recipe: None,
                successors: vec![],
                pids: vec![1],
            },
        );
        graph.insert(
            TargetId::new("/src", None::<&str>, "phony"),
            Target {
                line: None,
                elapsed: Duration::from_secs_f64(0.1),
                recipe: None,
                successors: vec![],
                pids: vec![1],
            },
        );
        graph.set_entry(Entry {
            creator: "remake 4.3".to_string(),
            argv: vec!["make".to_string(), "all".to_string()],
            goals: vec![id("all")],
        });
        graph
    }

    fn render(graph: &BuildGraph) -> String {
        let mut out = Vec::new();
        write_callgrind(graph, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_fields() {
        let text = render(&graph_with_edge());
        assert!(text.contains("version: 1\n"));
        assert!(text.contains("creator: remake 4.3\n"));
        assert!(text.contains("cmd: make all\n"));
        assert!(text.contains("positions: line\n"));
        assert!(text.contains("event: Wt : Wall Time\n"));
        assert!(text.contains("event: Rt : Recipe Time\n"));
        assert!(text.contains("events: Wt Rt\n"));
    }

    #[test]
    fn test_cost_lines_rounded_microseconds() {
        let text = render(&graph_with_edge());
        // all: wall 1.5s, recipe 0.25s
        assert!(text.contains("fn=all\n3 1500000 250000\n"));
        // lib never ran its recipe: single cost value
        assert!(text.contains("fn=lib\n9 500000\n"));
    }

    #[test]
    fn test_call_edge_references_callee_cost() {
        let text = render(&graph_with_edge());
        assert!(text.contains("cob=/src\ncfi=Makefile\ncfn=lib\ncalls=1 9\n3 500000\n"));
    }

    #[test]
    fn test_fileless_targets_excluded_everywhere() {
        let text = render(&graph_with_edge());
        assert!(!text.contains("fn=phony"));
        assert!(!text.contains("cfn=phony"));
    }

    #[test]
    fn test_rounding_not_truncation() {
        let mut graph = BuildGraph::new();
        graph.insert(
            id("x"),
            Target {
                line: Some(1),
                // 1.9 microseconds rounds up to 2
                elapsed: Duration::from_nanos(1900),
                recipe: None,
                successors: vec![],
                pids: vec![1],
            },
        );
        let text = render(&graph);
        assert!(text.contains("fn=x\n1 2\n"));
    }

    #[test]
    fn test_no_entry_uses_fallback_header() {
        let mut graph = BuildGraph::new();
        graph.insert(
            id("x"),
            Target {
                line: Some(1),
                elapsed: Duration::from_secs(1),
                recipe: None,
                successors: vec![],
                pids: vec![1],
            },
        );
        let text = render(&graph);
        assert!(text.contains("creator: makegrind\n"));
    }
}
