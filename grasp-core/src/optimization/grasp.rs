use std::f64::consts::PI;

use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    dual::Dual,
    equilibrium::{net_force_and_moment, wrench, Equilibrium},
    error::SolveError,
    force::Force,
    math::Scalar,
    optimization::{
        augmented_lagrangian::{AugmentedLagrangian, SolverConfig},
        derivative_test::{check_first_order, DualNlp},
        nlp::{Bounds, Nlp, NlpSolver, Status},
    },
    shape::ShapeModel,
};

/// `x = [t0, fn0, ft0, t1, fn1, ft1]`
pub const NUM_VARIABLES: usize = 6;
/// Net force (2), net moment (1), and two friction-cone halves per contact (4).
pub const NUM_CONSTRAINTS: usize = 7;
const NUM_EQUALITIES: usize = 3;
const UNBOUNDED: f64 = 2e19;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraspConfig {
    /// Lower bound on each contact's normal force: contacts push, never pull.
    pub fn_min: f64,
    /// Initial contacts sit at `t_d + π ± initial_spread`, opposite the disturbance.
    pub initial_spread: f64,
    /// Compare the analytic gradient and Jacobian with dual-number derivatives before solving.
    pub derivative_test: bool,
    /// Relative error above which the derivative test reports an entry.
    pub derivative_test_tol: f64,
    pub solver: SolverConfig,
}

impl Default for GraspConfig {
    fn default() -> Self {
        Self {
            fn_min: 1e-3,
            initial_spread: 0.2,
            derivative_test: false,
            derivative_test_tol: 1e-4,
            solver: SolverConfig::default(),
        }
    }
}

pub fn forces<D: Clone>(x: &[D]) -> [Force<D>; 2] {
    [
        Force::new(x[0].clone(), x[1].clone(), x[2].clone()),
        Force::new(x[3].clone(), x[4].clone(), x[5].clone()),
    ]
}

/// The grasp as a nonlinear program: minimize `Σ fn² + ft²` over both contacts, subject to zero net
/// force and moment (with the disturbance) and `|ft| ≤ μ·fn` at each contact.
pub struct GraspProblem<'a> {
    shape: &'a ShapeModel,
    config: &'a GraspConfig,
    result: Option<(Status, Vec<f64>, f64)>,
}

impl<'a> GraspProblem<'a> {
    pub fn new(shape: &'a ShapeModel, config: &'a GraspConfig) -> Self {
        GraspProblem { shape, config, result: None }
    }

    fn friction_rows<D: Scalar>(&self, x: &[D]) -> [D; 4] {
        let mu = self.shape.friction();
        let [c0, c1] = forces(x);
        [
            c0.tangential.clone() - c0.normal.clone() * mu,
            -c0.tangential - c0.normal * mu,
            c1.tangential.clone() - c1.normal.clone() * mu,
            -c1.tangential - c1.normal * mu,
        ]
    }

    /// Minimum-norm contact forces balancing the disturbance at contact parameters `ts`, clipped into
    /// `fn ≥ fn_min` and the friction cone.
    pub fn balancing_forces(&self, ts: [f64; 2]) -> [Force; 2] {
        let shape = self.shape;
        let mu = shape.friction();
        let com = shape.center_of_mass();
        let mut a = DMatrix::<f64>::zeros(NUM_EQUALITIES, 4);
        for (i, &t) in ts.iter().enumerate() {
            let arm = shape.position(t) - com;
            for (j, direction) in [shape.normal(t), shape.tangent(t)].into_iter().enumerate() {
                let col = 2 * i + j;
                a[(0, col)] = direction.x;
                a[(1, col)] = direction.y;
                a[(2, col)] = arm.cross(&direction);
            }
        }
        let disturbance = wrench(shape, &shape.disturbance());
        let rhs = -DVector::from_column_slice(&[disturbance.force.x, disturbance.force.y, disturbance.moment]);
        let components = match a.pseudo_inverse(1e-12) {
            Ok(pinv) => pinv * rhs,
            Err(e) => {
                debug!("Wrench matrix pseudo-inverse failed ({}), starting from fn_min", e);
                DVector::zeros(4)
            }
        };
        let clip = |t: f64, normal: f64, tangential: f64| {
            let normal = if normal.is_finite() { normal.max(self.config.fn_min) } else { self.config.fn_min };
            let limit = mu * normal;
            let tangential = if tangential.is_finite() { tangential.clamp(-limit, limit) } else { 0. };
            Force::new(t, normal, tangential)
        };
        [
            clip(ts[0], components[0], components[1]),
            clip(ts[1], components[2], components[3]),
        ]
    }

    pub fn residual(&self, x: &[f64]) -> Equilibrium {
        net_force_and_moment(self.shape, &forces(x))
    }
}

impl Nlp for GraspProblem<'_> {
    fn dimensions(&self) -> (usize, usize) {
        (NUM_VARIABLES, NUM_CONSTRAINTS)
    }

    fn bounds(&self) -> Bounds {
        let fn_min = self.config.fn_min;
        let mut g_l = vec![0.; NUM_EQUALITIES];
        g_l.extend([-UNBOUNDED; 4]);
        Bounds {
            x_l: vec![-UNBOUNDED, fn_min, -UNBOUNDED, -UNBOUNDED, fn_min, -UNBOUNDED],
            x_u: vec![UNBOUNDED; NUM_VARIABLES],
            g_l,
            g_u: vec![0.; NUM_CONSTRAINTS],
        }
    }

    fn starting_point(&self) -> Vec<f64> {
        let t_d = self.shape.disturbance().t;
        let spread = self.config.initial_spread;
        let [c0, c1] = self.balancing_forces([t_d + PI + spread, t_d + PI - spread]);
        vec![c0.t, c0.normal, c0.tangential, c1.t, c1.normal, c1.tangential]
    }

    fn objective(&self, x: &[f64]) -> f64 {
        [1, 2, 4, 5].iter().map(|&i| x[i] * x[i]).sum()
    }

    fn gradient(&self, x: &[f64]) -> Vec<f64> {
        vec![0., 2. * x[1], 2. * x[2], 0., 2. * x[4], 2. * x[5]]
    }

    fn constraints(&self, x: &[f64]) -> Vec<f64> {
        let Equilibrium { force, moment } = self.residual(x);
        let mut g = vec![force.x, force.y, moment];
        g.extend(self.friction_rows(x));
        g
    }

    fn jacobian(&self, x: &[f64]) -> DMatrix<f64> {
        let shape = self.shape;
        let com = shape.center_of_mass();
        let mu = shape.friction();
        let mut jac = DMatrix::<f64>::zeros(NUM_CONSTRAINTS, NUM_VARIABLES);
        for (i, force) in forces(x).iter().enumerate() {
            let Force { t, normal: fn_, tangential: ft } = *force;
            let arm = shape.position(t) - com;
            let (n, tan) = (shape.normal(t), shape.tangent(t));
            let (dn, dtan) = (shape.normal_derivative(t), shape.tangent_derivative(t));
            let f = n * fn_ + tan * ft;
            let df = dn * fn_ + dtan * ft;
            let base = 3 * i;
            // ∂/∂t: the contact point slides along the perimeter, so both the force direction and
            // the lever arm (whose derivative is the tangent) move
            jac[(0, base)] = df.x;
            jac[(1, base)] = df.y;
            jac[(2, base)] = tan.cross(&f) + arm.cross(&df);
            // ∂/∂fn
            jac[(0, base + 1)] = n.x;
            jac[(1, base + 1)] = n.y;
            jac[(2, base + 1)] = arm.cross(&n);
            // ∂/∂ft
            jac[(0, base + 2)] = tan.x;
            jac[(1, base + 2)] = tan.y;
            jac[(2, base + 2)] = arm.cross(&tan);
            // friction rows: ±ft - μ·fn ≤ 0
            let row = NUM_EQUALITIES + 2 * i;
            jac[(row, base + 1)] = -mu;
            jac[(row, base + 2)] = 1.;
            jac[(row + 1, base + 1)] = -mu;
            jac[(row + 1, base + 2)] = -1.;
        }
        jac
    }

    fn finalize(&mut self, status: Status, x: &[f64], objective: f64) {
        debug!("finalize: {:?}, x {:?}, objective {}", status, x, objective);
        self.result = Some((status, x.to_vec(), objective));
    }
}

impl DualNlp for GraspProblem<'_> {
    fn objective_dual(&self, x: &[Dual]) -> Dual {
        [1, 2, 4, 5].iter().map(|&i| x[i].clone() * x[i].clone()).sum()
    }

    fn constraints_dual(&self, x: &[Dual]) -> Vec<Dual> {
        let Equilibrium { force, moment } = net_force_and_moment(self.shape, &forces(x));
        let mut g = vec![force.x, force.y, moment];
        g.extend(self.friction_rows(x));
        g
    }
}

/// A solved grasp: two contact forces (`t` wrapped into `[0, 2π)`) with the residual they leave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraspSolution {
    pub forces: [Force; 2],
    pub objective: f64,
    pub iterations: usize,
    pub equilibrium: Equilibrium,
    pub friction_satisfied: bool,
}

/// Drives an [`NlpSolver`] over a [`GraspProblem`].
#[derive(Clone, Debug)]
pub struct GraspOptimizer<S: NlpSolver = AugmentedLagrangian> {
    pub config: GraspConfig,
    pub solver: S,
}

impl GraspOptimizer {
    pub fn new(config: GraspConfig) -> Self {
        let solver = AugmentedLagrangian::new(config.solver.clone());
        GraspOptimizer { config, solver }
    }
}

impl Default for GraspOptimizer {
    fn default() -> Self {
        GraspOptimizer::new(GraspConfig::default())
    }
}

impl<S: NlpSolver> GraspOptimizer<S> {
    pub fn with_solver(config: GraspConfig, solver: S) -> Self {
        GraspOptimizer { config, solver }
    }

    /// Solve for two contact forces balancing `shape`'s disturbance. Forces are only returned when
    /// the solver reports success.
    pub fn solve(&self, shape: &ShapeModel) -> Result<GraspSolution, SolveError> {
        let fn_min = self.config.fn_min;
        if !(fn_min > 0. && fn_min.is_finite()) {
            return Err(SolveError::InvalidProblem(format!("fn_min must be positive and finite, got {}", fn_min)));
        }
        let mut problem = GraspProblem::new(shape, &self.config);
        if self.config.derivative_test {
            check_first_order(&problem, &problem.starting_point(), self.config.derivative_test_tol);
        }
        let termination = self.solver.optimize(&mut problem);
        let (status, x, objective) = match problem.result.take() {
            Some(result) => result,
            None => return Err(SolveError::Numerical("solver returned without a final iterate".to_string())),
        };
        if status != termination.status {
            return Err(SolveError::Numerical(format!(
                "solver returned {:?} but finalized with {:?}", termination.status, status,
            )));
        }
        match status {
            Status::Success => {}
            Status::Infeasible => return Err(SolveError::Infeasible { violation: termination.violation }),
            Status::MaxIterationsExceeded => return Err(SolveError::MaxIterations {
                iterations: termination.iterations,
                violation: termination.violation,
            }),
            Status::NumericalError => return Err(SolveError::Numerical(format!(
                "stopped at {:?} (constraint violation {:.3e})", x, termination.violation,
            ))),
            Status::InvalidProblem => return Err(SolveError::InvalidProblem(format!(
                "{} variables / {} constraints rejected by the solver", NUM_VARIABLES, NUM_CONSTRAINTS,
            ))),
        }
        if x.len() != NUM_VARIABLES || x.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::Numerical(format!("non-finite solution {:?}", x)));
        }
        let [c0, c1] = forces(&x);
        let forces = [c0.wrapped(), c1.wrapped()];
        let equilibrium = net_force_and_moment(shape, &forces);
        let friction_satisfied = shape.all_friction_satisfied(&forces);
        if !friction_satisfied {
            warn!("Solution violates the friction cone: {}, {}", forces[0], forces[1]);
        }
        info!(
            "Solved in {} iterations: objective {:.6}, {}, {}, residual {}",
            termination.iterations, objective, forces[0], forces[1], equilibrium,
        );
        Ok(GraspSolution { forces, objective, iterations: termination.iterations, equilibrium, friction_satisfied })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use test_log::test;

    use super::*;
    use crate::{
        optimization::nlp::Termination,
        sampler::{ProblemSampler, ShapeFamily},
    };

    fn patch() -> ShapeModel {
        ShapeModel::configured(&[0.25, -0.15, 0.1, -0.3], 0.8, Force::new(1., 0.6, 0.2)).unwrap()
    }

    #[test]
    fn analytic_derivatives_match_duals() {
        let shape = patch();
        let config = GraspConfig::default();
        let problem = GraspProblem::new(&shape, &config);
        for x in [
            problem.starting_point(),
            vec![0.3, 0.5, -0.1, 2.2, 0.2, 0.05],
            vec![-4., 1.1, 0.4, 9., 0.7, -0.3],
        ] {
            let report = check_first_order(&problem, &x, 1e-8);
            assert!(report.passed(), "{:?}", report.mismatches);
            assert_eq!(report.checked, NUM_VARIABLES * (1 + NUM_CONSTRAINTS));
        }
    }

    #[test]
    fn layout() {
        let shape = patch();
        let config = GraspConfig::default();
        let problem = GraspProblem::new(&shape, &config);
        let x = vec![0.3, 0.5, -0.1, 2.2, 0.2, 0.05];
        let g = problem.constraints(&x);
        assert_eq!(g.len(), NUM_CONSTRAINTS);
        assert_abs_diff_eq!(g[3], -0.1 - 0.8 * 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(g[4], 0.1 - 0.8 * 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(g[5], 0.05 - 0.8 * 0.2, epsilon = 1e-15);
        assert_abs_diff_eq!(g[6], -0.05 - 0.8 * 0.2, epsilon = 1e-15);
        assert_abs_diff_eq!(problem.objective(&x), 0.25 + 0.01 + 0.04 + 0.0025, epsilon = 1e-15);
        let bounds = problem.bounds();
        assert_eq!(bounds.x_l[1], 1e-3);
        assert_eq!(bounds.g_l[..3], [0.; 3]);
        assert!(bounds.g_l[3..].iter().all(|&l| l <= -1e19));
    }

    #[test]
    fn circle_warm_start_balances() {
        let shape = ShapeModel::configured(&[0.; 4], 0.6, Force::new(0.7, 0.9, 0.)).unwrap();
        let config = GraspConfig::default();
        let problem = GraspProblem::new(&shape, &config);
        let x = problem.starting_point();
        let residual = problem.residual(&x);
        assert!(residual.balanced(1e-6), "{}", residual);
        assert!(shape.all_friction_satisfied(&forces(&x)));
    }

    #[test]
    fn solves_circle() {
        let shape = ShapeModel::configured(&[0.; 4], 0.6, Force::new(0.7, 0.9, 0.)).unwrap();
        let solution = GraspOptimizer::default().solve(&shape).unwrap();
        assert!(solution.equilibrium.balanced(1e-3), "{}", solution.equilibrium);
        assert!(solution.friction_satisfied);
        // effort is bounded below by |F_d|² / 2
        assert_abs_diff_eq!(solution.objective, 0.9 * 0.9 / 2., epsilon = 1e-4);
        for force in &solution.forces {
            assert!((0. ..std::f64::consts::TAU).contains(&force.t));
            assert!(force.normal >= 1e-3);
        }
    }

    #[test]
    fn circle_acceptance() {
        let optimizer = GraspOptimizer::default();
        let mut passed = 0;
        for seed in 0..100 {
            let shape = ProblemSampler::new(seed).sample(ShapeFamily::Circle).build().unwrap();
            if let Ok(solution) = optimizer.solve(&shape) {
                if solution.equilibrium.balanced(0.01) && solution.friction_satisfied {
                    passed += 1;
                }
            }
        }
        assert!(passed >= 90, "{} / 100 circle problems solved", passed);
    }

    #[test]
    fn patch_successes_are_physical() {
        let optimizer = GraspOptimizer::default();
        let mut solved = 0;
        for seed in 0..20 {
            let shape = ProblemSampler::new(1000 + seed).sample(ShapeFamily::Patch).build().unwrap();
            if let Ok(solution) = optimizer.solve(&shape) {
                solved += 1;
                assert!(solution.equilibrium.balanced(0.01), "seed {}: {}", seed, solution.equilibrium);
                // friction rows hold to within the acceptable constraint violation
                for force in &solution.forces {
                    assert!(force.tangential.abs() <= shape.friction() * force.normal + 1e-3);
                }
            }
        }
        assert!(solved > 0);
    }

    /// Reports whatever status it was built with, leaving the starting point as the final iterate.
    struct Fixed(Status);

    impl NlpSolver for Fixed {
        fn optimize(&self, nlp: &mut dyn Nlp) -> Termination {
            let x = nlp.starting_point();
            let objective = nlp.objective(&x);
            nlp.finalize(self.0, &x, objective);
            Termination { status: self.0, iterations: 7, objective, violation: 0.5 }
        }
    }

    #[test]
    fn failures_carry_no_forces() {
        let shape = patch();
        let solve = |status| GraspOptimizer::with_solver(GraspConfig::default(), Fixed(status)).solve(&shape);
        assert_eq!(solve(Status::Infeasible), Err(SolveError::Infeasible { violation: 0.5 }));
        assert_eq!(solve(Status::MaxIterationsExceeded), Err(SolveError::MaxIterations { iterations: 7, violation: 0.5 }));
        assert!(matches!(solve(Status::NumericalError), Err(SolveError::Numerical(_))));
        assert!(matches!(solve(Status::InvalidProblem), Err(SolveError::InvalidProblem(_))));
        let solution = solve(Status::Success).unwrap();
        assert_eq!(solution.iterations, 7);
    }

    /// Finalizes with one status and reports another.
    struct Inconsistent;

    impl NlpSolver for Inconsistent {
        fn optimize(&self, nlp: &mut dyn Nlp) -> Termination {
            let x = nlp.starting_point();
            let objective = nlp.objective(&x);
            nlp.finalize(Status::Success, &x, objective);
            Termination { status: Status::MaxIterationsExceeded, iterations: 3, objective, violation: 0. }
        }
    }

    #[test]
    fn inconsistent_status_is_numerical_error() {
        let solved = GraspOptimizer::with_solver(GraspConfig::default(), Inconsistent).solve(&patch());
        assert!(matches!(solved, Err(SolveError::Numerical(_))), "{:?}", solved);
    }

    #[test]
    fn non_positive_fn_min_is_rejected() {
        for fn_min in [0., -1., f64::NAN, f64::INFINITY] {
            let config = GraspConfig { fn_min, ..GraspConfig::default() };
            let solved = GraspOptimizer::with_solver(config, Fixed(Status::Success)).solve(&patch());
            assert!(matches!(solved, Err(SolveError::InvalidProblem(_))), "fn_min {}: {:?}", fn_min, solved);
        }
    }

    #[test]
    fn derivative_test_runs_before_solve() {
        let config = GraspConfig { derivative_test: true, ..GraspConfig::default() };
        let solution = GraspOptimizer::with_solver(config, Fixed(Status::Success)).solve(&patch()).unwrap();
        assert_eq!(solution.iterations, 7);
    }
}
