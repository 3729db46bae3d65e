//! Plain-text dump of a solved grasp, for plotting: the sampled perimeter, then each applied force
//! as its contact point with normal and tangential components, then the center of mass and the
//! residual. Every vector is written as `x y` with 5 decimals.

use std::{f64::consts::TAU, fs, path::Path};

use anyhow::{Context, Result};
use grasp_core::{fmt::Fmt, Force, GraspSolution, ShapeModel, R2};

/// `P  fn·N  ft·T  N` for a force applied at `force.t`.
fn force_line(shape: &ShapeModel, force: &Force) -> String {
    let p = shape.position(force.t);
    let n = shape.normal(force.t);
    let t = shape.tangent(force.t);
    let normal: R2<f64> = n * force.normal;
    let tangential: R2<f64> = t * force.tangential;
    format!("{} {} {} {}", p.s(5), normal.s(5), tangential.s(5), n.s(5))
}

pub fn render(shape: &ShapeModel, solution: &GraspSolution, samples: usize) -> String {
    let mut lines = Vec::with_capacity(samples + 7);
    lines.push(samples.to_string());
    for i in 0..samples {
        let t = i as f64 * TAU / samples as f64;
        lines.push(format!("{:.5} {}", t, shape.position(t).s(5)));
    }
    lines.push(format!("{:.5}", shape.friction()));
    lines.push(force_line(shape, &shape.disturbance()));
    for force in &solution.forces {
        lines.push(force_line(shape, force));
    }
    lines.push(shape.center_of_mass().s(5));
    lines.push(solution.equilibrium.force.s(5));
    lines.push(format!("{:.5}", solution.equilibrium.moment));
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn write(path: &Path, shape: &ShapeModel, solution: &GraspSolution, samples: usize) -> Result<()> {
    fs::write(path, render(shape, solution, samples))
        .with_context(|| format!("Failed to write trace file {}", path.display()))
}
