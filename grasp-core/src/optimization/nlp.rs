use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Bound magnitudes at or beyond this are treated as infinite.
pub const INFINITE_BOUND: f64 = 1e19;

/// Box bounds on the variables (`x_l ≤ x ≤ x_u`) and on the constraint values (`g_l ≤ g(x) ≤ g_u`).
/// Equal lower and upper constraint bounds make an equality row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x_l: Vec<f64>,
    pub x_u: Vec<f64>,
    pub g_l: Vec<f64>,
    pub g_u: Vec<f64>,
}

impl Bounds {
    pub fn is_finite_bound(b: f64) -> bool {
        b.abs() < INFINITE_BOUND
    }
}

/// A smooth nonlinear program `min f(x)` subject to [`Bounds`], queried through callbacks:
/// the solver owns the iteration, the problem only evaluates.
pub trait Nlp {
    /// Number of variables `n` and constraints `m`.
    fn dimensions(&self) -> (usize, usize);
    fn bounds(&self) -> Bounds;
    fn starting_point(&self) -> Vec<f64>;
    fn objective(&self, x: &[f64]) -> f64;
    fn gradient(&self, x: &[f64]) -> Vec<f64>;
    fn constraints(&self, x: &[f64]) -> Vec<f64>;
    /// Dense `m × n` Jacobian of [`Nlp::constraints`].
    fn jacobian(&self, x: &[f64]) -> DMatrix<f64>;
    /// Receives the final iterate, whatever the outcome.
    fn finalize(&mut self, status: Status, x: &[f64], objective: f64);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Success,
    Infeasible,
    MaxIterationsExceeded,
    NumericalError,
    InvalidProblem,
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Termination {
    pub status: Status,
    pub iterations: usize,
    pub objective: f64,
    /// Max-norm constraint violation at the final iterate.
    pub violation: f64,
}

/// A solver for [`Nlp`]s. Blocks until it converges, gives up, or hits its iteration cap.
pub trait NlpSolver {
    fn optimize(&self, nlp: &mut dyn Nlp) -> Termination;
}

/// Check that an [`Nlp`]'s reported dimensions agree with its bounds and starting point.
pub fn validate(nlp: &dyn Nlp) -> Result<(), String> {
    let (n, m) = nlp.dimensions();
    let Bounds { x_l, x_u, g_l, g_u } = nlp.bounds();
    let x0 = nlp.starting_point();
    if x_l.len() != n || x_u.len() != n || x0.len() != n {
        return Err(format!(
            "{} variables, but {} lower bounds, {} upper bounds, {} starting values",
            n, x_l.len(), x_u.len(), x0.len(),
        ));
    }
    if g_l.len() != m || g_u.len() != m {
        return Err(format!("{} constraints, but {} lower bounds and {} upper bounds", m, g_l.len(), g_u.len()));
    }
    if let Some(i) = (0..n).find(|&i| x_l[i] > x_u[i]) {
        return Err(format!("variable {}: lower bound {} above upper bound {}", i, x_l[i], x_u[i]));
    }
    if let Some(i) = (0..m).find(|&i| g_l[i] > g_u[i]) {
        return Err(format!("constraint {}: lower bound {} above upper bound {}", i, g_l[i], g_u[i]));
    }
    if x0.iter().any(|x| !x.is_finite()) {
        return Err(format!("non-finite starting point {:?}", x0));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// `min (x0 - 1)² + (x1 - 2)²` s.t. `x0 + x1 = 1` (equality) and `x0 ≤ 0.2`, `x1 ≥ 0` (bounds).
    /// Optimum: the bound `x0 ≤ 0.2` is inactive, so `x = (0, 1)`.
    pub struct Quadratic {
        pub x_final: Option<Vec<f64>>,
        pub status: Option<Status>,
    }

    impl Quadratic {
        pub fn new() -> Self {
            Quadratic { x_final: None, status: None }
        }
    }

    impl Nlp for Quadratic {
        fn dimensions(&self) -> (usize, usize) {
            (2, 1)
        }
        fn bounds(&self) -> Bounds {
            Bounds { x_l: vec![-2e19, 0.], x_u: vec![0.2, 2e19], g_l: vec![1.], g_u: vec![1.] }
        }
        fn starting_point(&self) -> Vec<f64> {
            vec![0., 0.]
        }
        fn objective(&self, x: &[f64]) -> f64 {
            (x[0] - 1.).powi(2) + (x[1] - 2.).powi(2)
        }
        fn gradient(&self, x: &[f64]) -> Vec<f64> {
            vec![2. * (x[0] - 1.), 2. * (x[1] - 2.)]
        }
        fn constraints(&self, x: &[f64]) -> Vec<f64> {
            vec![x[0] + x[1]]
        }
        fn jacobian(&self, _x: &[f64]) -> DMatrix<f64> {
            DMatrix::from_row_slice(1, 2, &[1., 1.])
        }
        fn finalize(&mut self, status: Status, x: &[f64], _objective: f64) {
            self.status = Some(status);
            self.x_final = Some(x.to_vec());
        }
    }

    #[test]
    fn validates_dimensions() {
        assert_eq!(validate(&Quadratic::new()), Ok(()));
    }
}
