//! Makegrind - build trace analysis for instrumented make builds
//!
//! This library ingests per-process `build.*.json` trace files emitted by an
//! instrumented make, merges them into one dependency graph annotated with
//! timing data, and answers analytical questions over that graph: summary
//! statistics, the critical dependency path, per-directory and per-recipe
//! breakdowns, and callgrind export for external profile visualizers.

pub mod callgrind;
pub mod cli;
pub mod critical_path;
pub mod error;
pub mod graph;
pub mod loader;
pub mod reports;
pub mod trace;
