use grasp_core::{Configuration, GraspSolution, ProblemSpec, ShapeFamily};
use serde::Serialize;

use crate::bench::FamilyScore;

/// `solve --json` output: the problem as given, as committed (disturbance clamped, COM derived), and
/// its solution.
#[derive(Debug, Serialize)]
pub struct SolveReport<'a> {
    pub version: &'a str,
    pub family: ShapeFamily,
    pub problem: &'a ProblemSpec,
    pub configuration: &'a Configuration,
    pub solution: &'a GraspSolution,
}

#[derive(Debug, Serialize)]
pub struct BenchReport<'a> {
    pub version: &'a str,
    pub seed: u64,
    pub families: &'a [FamilyScore],
    pub total: u32,
}
