//! Unified build dependency graph and multi-trace merge semantics
//!
//! Each trace file parses into a fragment (itself a [`BuildGraph`]) covering
//! the subset of targets one build process observed. Fragments are folded into
//! a single canonical graph keyed by target identity; the fold reconciles
//! overlapping observations of the same target recorded by different,
//! possibly concurrent, sub-processes of a recursive build.
//!
//! Merge rules per target:
//! - successor edges are the union of both sides, deduplicated by identity
//! - a fragment that actually timed the recipe beats one that only saw the
//!   target as an up-to-date dependency
//! - two executed observations with different timings keep the most recently
//!   merged value and emit a [`MergeWarning`]
//!
//! The fold is commutative and associative up to first-seen Entry metadata
//! and warning emission order.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Identity key for a build target: `(directory, file, name)`.
///
/// `file` is the makefile that defines the rule and may be absent for phony
/// or pattern targets. Two observations with the same key refer to the same
/// real-world target and are merged, never duplicated. The derived `Ord` is
/// the deterministic tiebreak used by every report.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TargetId {
    /// Working directory of the make process that built the target
    pub directory: String,
    /// Makefile defining the rule, if any
    pub file: Option<String>,
    /// Target name as written in the makefile
    pub name: String,
}

impl TargetId {
    pub fn new(
        directory: impl Into<String>,
        file: Option<impl Into<String>>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            file: file.map(Into::into),
            name: name.into(),
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} ({}/{})", self.name, self.directory, file),
            None => write!(f, "{} ({})", self.name, self.directory),
        }
    }
}

/// A build graph node: timing plus direct dependency edges.
///
/// `recipe` is `Some` exactly when the target's recipe actually ran, which
/// encodes the `recipe_executed` flag and keeps "recipe time defined only
/// when executed" impossible to violate. Invariant: `recipe <= elapsed`,
/// enforced at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Line in the makefile where the rule is defined
    pub line: Option<u32>,
    /// Cumulative wall-clock time spent building the target
    pub elapsed: Duration,
    /// Wall-clock time spent in the recipe, if it executed
    pub recipe: Option<Duration>,
    /// Direct build-time dependencies, in observation order, deduplicated
    pub successors: Vec<TargetId>,
    /// Trace processes that contributed observations of this target
    pub pids: Vec<u32>,
}

impl Target {
    pub fn recipe_executed(&self) -> bool {
        self.recipe.is_some()
    }
}

/// Metadata describing the top-level invocation that produced the trace set.
///
/// Exactly one entry per merged graph, set by the first fragment that defines
/// it; recursive sub-builds do not carry independent top-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub creator: String,
    pub argv: Vec<String>,
    /// Top-level goal targets, the starting points for critical-path descent
    pub goals: Vec<TargetId>,
}

/// Timing disagreement between two executed observations of one target.
///
/// Non-fatal: the merge keeps the incoming value and proceeds. Surfaced to
/// the caller so nothing is silently swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeWarning {
    pub target: TargetId,
    pub previous_elapsed: Duration,
    pub previous_recipe: Option<Duration>,
    pub incoming_elapsed: Duration,
    pub incoming_recipe: Option<Duration>,
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflicting timings for {}: {:?} (recipe {:?}) replaced by {:?} (recipe {:?})",
            self.target,
            self.previous_elapsed,
            self.previous_recipe,
            self.incoming_elapsed,
            self.incoming_recipe,
        )
    }
}

/// The canonical merged build graph.
///
/// Sole owner of its targets; successor references are lookups into the same
/// graph's map. Build-once, read-many: after the merge fold completes the
/// graph is never mutated again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildGraph {
    targets: BTreeMap<TargetId, Target>,
    entry: Option<Entry>,
}

impl BuildGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, id: &TargetId) -> Option<&Target> {
        self.targets.get(id)
    }

    pub fn contains(&self, id: &TargetId) -> bool {
        self.targets.contains_key(id)
    }

    /// Iterate targets in identity order (deterministic)
    pub fn iter(&self) -> impl Iterator<Item = (&TargetId, &Target)> {
        self.targets.iter()
    }

    pub fn entry(&self) -> Option<&Entry> {
        self.entry.as_ref()
    }

    /// Set top-level invocation metadata. First-seen wins.
    pub fn set_entry(&mut self, entry: Entry) {
        if self.entry.is_none() {
            self.entry = Some(entry);
        }
    }

    /// Insert a target observation, merging with any existing observation of
    /// the same identity. Returns a warning when two executed observations
    /// disagree on timing.
    pub fn insert(&mut self, id: TargetId, incoming: Target) -> Option<MergeWarning> {
        match self.targets.get_mut(&id) {
            None => {
                self.targets.insert(id, incoming);
                None
            }
            Some(existing) => Self::merge_target(&id, existing, incoming),
        }
    }

    /// Insert a target only if absent, without touching an existing record.
    /// Used for dependency references that carry no timing of their own.
    pub fn insert_stub(&mut self, id: TargetId, pid: u32) {
        self.targets.entry(id).or_insert_with(|| Target {
            line: None,
            elapsed: Duration::ZERO,
            recipe: None,
            successors: Vec::new(),
            pids: vec![pid],
        });
    }

    /// Fold another fragment into this graph.
    ///
    /// Entry metadata is first-seen-wins; target records merge per the rules
    /// in the module docs. Returned warnings use "most recently merged wins"
    /// semantics: the incoming fragment's values replace the accumulator's.
    pub fn merge(&mut self, fragment: BuildGraph) -> Vec<MergeWarning> {
        let mut warnings = Vec::new();
        for (id, target) in fragment.targets {
            if let Some(warning) = self.insert(id, target) {
                warnings.push(warning);
            }
        }
        if let Some(entry) = fragment.entry {
            self.set_entry(entry);
        }
        warnings
    }

    fn merge_target(id: &TargetId, existing: &mut Target, incoming: Target) -> Option<MergeWarning> {
        // Edge union, deduplicated by identity, first-seen order preserved.
        for successor in incoming.successors {
            if !existing.successors.contains(&successor) {
                existing.successors.push(successor);
            }
        }
        for pid in incoming.pids {
            if !existing.pids.contains(&pid) {
                existing.pids.push(pid);
            }
        }
        if existing.line.is_none() {
            existing.line = incoming.line;
        }

        match (existing.recipe.is_some(), incoming.recipe.is_some()) {
            // An executed observation is strictly stronger evidence than a
            // dependency reference that never ran the recipe.
            (false, true) => {
                existing.elapsed = incoming.elapsed;
                existing.recipe = incoming.recipe;
                None
            }
            (true, false) => None,
            // Neither side ran the recipe: keep the larger observed wall
            // time, which is order-independent.
            (false, false) => {
                existing.elapsed = existing.elapsed.max(incoming.elapsed);
                None
            }
            (true, true) => {
                if existing.elapsed == incoming.elapsed && existing.recipe == incoming.recipe {
                    return None;
                }
                let warning = MergeWarning {
                    target: id.clone(),
                    previous_elapsed: existing.elapsed,
                    previous_recipe: existing.recipe,
                    incoming_elapsed: incoming.elapsed,
                    incoming_recipe: incoming.recipe,
                };
                existing.elapsed = incoming.elapsed;
                existing.recipe = incoming.recipe;
                Some(warning)
            }
        }
    }

    /// Targets that never appear as a successor of any other target.
    ///
    /// Fallback roots for graphs merged without top-level Entry metadata.
    pub fn roots(&self) -> Vec<&TargetId> {
        let mut is_successor: BTreeMap<&TargetId, bool> =
            self.targets.keys().map(|id| (id, false)).collect();
        for target in self.targets.values() {
            for successor in &target.successors {
                if let Some(flag) = is_successor.get_mut(successor) {
                    *flag = true;
                }
            }
        }
        is_successor
            .into_iter()
            .filter_map(|(id, seen)| (!seen).then_some(id))
            .collect()
    }

    /// Map each target to the targets that depend on it
    pub fn predecessors(&self) -> BTreeMap<&TargetId, Vec<&TargetId>> {
        let mut predecessors: BTreeMap<&TargetId, Vec<&TargetId>> = BTreeMap::new();
        for (id, target) in &self.targets {
            for successor in &target.successors {
                predecessors.entry(successor).or_default().push(id);
            }
        }
        predecessors
    }
}
