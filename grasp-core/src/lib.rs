pub mod geometry;
pub mod math;
pub mod optimization;

pub use geometry::centroid;
pub use geometry::perimeter;
pub use geometry::r2;
pub use geometry::shape;

pub use optimization::augmented_lagrangian;
pub use optimization::grasp;
pub use optimization::nlp;

pub use math::trig;

pub mod dual;
pub mod equilibrium;
pub mod error;
pub mod fmt;
pub mod force;
pub mod sampler;

pub use augmented_lagrangian::{AugmentedLagrangian, SolverConfig};
pub use centroid::{CentroidIntegrator, GaussKronrod, Quadrature};
pub use dual::Dual;
pub use equilibrium::{net_force_and_moment, Equilibrium};
pub use error::{ConfigError, ShapeFamilyError, SolveError};
pub use force::Force;
pub use grasp::{GraspConfig, GraspOptimizer, GraspProblem, GraspSolution};
pub use nlp::{Nlp, NlpSolver, Status, Termination};
pub use r2::R2;
pub use sampler::{ProblemSampler, ProblemSpec, ShapeFamily};
pub use shape::{Configuration, ShapeModel};

/// Parse a log level string into LevelFilter.
pub fn parse_log_level(level: Option<&str>) -> log::LevelFilter {
    match level {
        Some("error") => log::LevelFilter::Error,
        Some("warn") => log::LevelFilter::Warn,
        Some("info") | Some("") | None => log::LevelFilter::Info,
        Some("debug") => log::LevelFilter::Debug,
        Some("trace") => log::LevelFilter::Trace,
        Some(level) => panic!("invalid log level: {}", level),
    }
}
