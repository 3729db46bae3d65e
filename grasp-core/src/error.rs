#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Expected {expected} perimeter coefficients, got {actual}")]
    CoefficientCount { expected: usize, actual: usize },

    #[error("Friction coefficient {0} outside [0, 1]")]
    Friction(f64),

    #[error("Non-finite {0}")]
    NonFinite(&'static str),
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error("Problem is locally infeasible (constraint violation {violation:.3e})")]
    Infeasible { violation: f64 },

    #[error("No convergence after {iterations} iterations (constraint violation {violation:.3e})")]
    MaxIterations { iterations: usize, violation: f64 },

    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Invalid problem: {0}")]
    InvalidProblem(String),
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ShapeFamilyError {
    #[error("Unrecognized shape family {0:?} (expected \"circle\" or \"patch\")")]
    Unrecognized(String),
}
