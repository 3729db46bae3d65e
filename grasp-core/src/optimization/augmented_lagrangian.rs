use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::optimization::{
    lbfgs::{self, minimize_box},
    nlp::{self, Bounds, Nlp, NlpSolver, Status, Termination},
};

/// Tuning for [`AugmentedLagrangian`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Convergence tolerance on both the (scaled) projected Lagrangian gradient and the
    /// constraint violation.
    pub tol: f64,
    /// Largest constraint violation still accepted from a stalled solve.
    pub constr_viol_tol: f64,
    /// Largest projected Lagrangian gradient still accepted from a stalled solve.
    pub acceptable_tol: f64,
    /// Cap on outer (multiplier update) iterations.
    pub max_iter: usize,
    /// Cap on L-BFGS iterations per subproblem.
    pub max_inner_iter: usize,
    pub lbfgs_memory: usize,
    pub rho_init: f64,
    pub rho_max: f64,
    pub rho_growth: f64,
    /// The penalty grows unless the violation shrinks below this fraction of the previous one.
    pub sufficient_decrease: f64,
    /// Subproblem tolerance at the first outer iteration; shrinks tenfold per iteration down to `tol`.
    pub inner_tol_init: f64,
    /// Least-squares multiplier estimates larger than this are discarded in favor of zeros.
    pub mult_init_max: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tol: 1e-6,
            constr_viol_tol: 1e-3,
            acceptable_tol: 1e-4,
            max_iter: 1000,
            max_inner_iter: 500,
            lbfgs_memory: 8,
            rho_init: 10.,
            rho_max: 1e10,
            rho_growth: 10.,
            sufficient_decrease: 0.25,
            inner_tol_init: 1e-2,
            mult_init_max: 1e3,
        }
    }
}

/// Stalled subproblems tolerated in a row before giving up.
const MAX_STALLS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Kind {
    /// `g = target`
    Equality(f64),
    /// `g ≥ bound`, as `h = bound - g ≤ 0`
    Lower(f64),
    /// `g ≤ bound`, as `h = g - bound ≤ 0`
    Upper(f64),
}

/// One scalar constraint derived from a row of the NLP's constraint bounds.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Row {
    index: usize,
    kind: Kind,
}

impl Row {
    fn rows(bounds: &Bounds) -> Vec<Row> {
        let mut rows = vec![];
        for (index, (&l, &u)) in bounds.g_l.iter().zip(&bounds.g_u).enumerate() {
            if l == u {
                rows.push(Row { index, kind: Kind::Equality(l) });
                continue;
            }
            if Bounds::is_finite_bound(l) {
                rows.push(Row { index, kind: Kind::Lower(l) });
            }
            if Bounds::is_finite_bound(u) {
                rows.push(Row { index, kind: Kind::Upper(u) });
            }
        }
        rows
    }

    fn is_equality(&self) -> bool {
        matches!(self.kind, Kind::Equality(_))
    }

    /// `c` for equalities, `h` for inequalities.
    fn residual(&self, g: &[f64]) -> f64 {
        let g = g[self.index];
        match self.kind {
            Kind::Equality(target) => g - target,
            Kind::Lower(bound) => bound - g,
            Kind::Upper(bound) => g - bound,
        }
    }

    /// Sign applied to the Jacobian row.
    fn sign(&self) -> f64 {
        match self.kind {
            Kind::Lower(_) => -1.,
            _ => 1.,
        }
    }
}

/// Powell–Hestenes–Rockafellar augmented Lagrangian method. Each outer iteration minimizes
///
/// `f(x) + Σ_eq (λ c + ρ/2 c²) + Σ_ineq (max(0, λ + ρ h)² - λ²) / 2ρ`
///
/// over the variable bounds with projected L-BFGS, then updates the multipliers (`λ += ρ c`,
/// `λ = max(0, λ + ρ h)`) and, when the violation did not shrink enough, the penalty `ρ`.
#[derive(Clone, Debug, Default)]
pub struct AugmentedLagrangian {
    pub config: SolverConfig,
}

struct Subproblem<'a> {
    nlp: &'a dyn Nlp,
    rows: &'a [Row],
    multipliers: &'a [f64],
    rho: f64,
}

impl Subproblem<'_> {
    /// Effective multiplier of each row at `g`: the gradient weight of its constraint.
    fn weights(&self, g: &[f64]) -> Vec<f64> {
        self.rows.iter().zip(self.multipliers).map(|(row, &lambda)| {
            let r = row.residual(g);
            if row.is_equality() {
                lambda + self.rho * r
            } else {
                (lambda + self.rho * r).max(0.)
            }
        }).collect()
    }

    fn value(&self, x: &[f64], g: &[f64]) -> f64 {
        let penalty: f64 = self.rows.iter().zip(self.multipliers).map(|(row, &lambda)| {
            let r = row.residual(g);
            if row.is_equality() {
                lambda * r + 0.5 * self.rho * r * r
            } else {
                ((lambda + self.rho * r).max(0.).powi(2) - lambda * lambda) / (2. * self.rho)
            }
        }).sum();
        self.nlp.objective(x) + penalty
    }

    fn evaluate(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let g = self.nlp.constraints(x);
        let value = self.value(x, &g);
        let gradient = lagrangian_gradient(self.nlp, self.rows, x, &self.weights(&g));
        (value, gradient)
    }
}

/// `∇f + Σ w_i ∇r_i`.
fn lagrangian_gradient(nlp: &dyn Nlp, rows: &[Row], x: &[f64], weights: &[f64]) -> Vec<f64> {
    let mut gradient = nlp.gradient(x);
    let jacobian = nlp.jacobian(x);
    for (row, &w) in rows.iter().zip(weights) {
        if w == 0. {
            continue;
        }
        let w = w * row.sign();
        for (j, grad) in gradient.iter_mut().enumerate() {
            *grad += w * jacobian[(row.index, j)];
        }
    }
    gradient
}

fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0., |m, x| m.max(x.abs()))
}

fn finite_or(bound: f64, infinity: f64) -> f64 {
    if Bounds::is_finite_bound(bound) { bound } else { infinity }
}

impl AugmentedLagrangian {
    pub fn new(config: SolverConfig) -> Self {
        AugmentedLagrangian { config }
    }

    /// Least-squares equality multipliers: `argmin |∇f + J_eqᵀ λ|`, discarded if too large.
    fn initial_multipliers(&self, nlp: &dyn Nlp, rows: &[Row], x: &[f64]) -> Vec<f64> {
        let mut multipliers = vec![0.; rows.len()];
        let equalities: Vec<usize> = (0..rows.len()).filter(|&k| rows[k].is_equality()).collect();
        if equalities.is_empty() {
            return multipliers;
        }
        let jacobian = nlp.jacobian(x);
        let n = x.len();
        let jt = DMatrix::from_fn(n, equalities.len(), |j, k| jacobian[(rows[equalities[k]].index, j)]);
        let rhs = -DVector::from_vec(nlp.gradient(x));
        let estimate = match jt.pseudo_inverse(1e-12) {
            Ok(pinv) => pinv * rhs,
            Err(e) => {
                debug!("Multiplier initialization skipped: {}", e);
                return multipliers;
            }
        };
        if estimate.iter().any(|l| !l.is_finite() || l.abs() > self.config.mult_init_max) {
            debug!("Discarding least-squares multipliers {:?}", estimate.as_slice());
            return multipliers;
        }
        for (&k, &lambda) in equalities.iter().zip(estimate.iter()) {
            multipliers[k] = lambda;
        }
        multipliers
    }

    /// Complementarity-aware violation: `|c|` for equalities, `|min(-h, λ/ρ)|` for inequalities.
    fn violation(rows: &[Row], g: &[f64], multipliers: &[f64], rho: f64) -> f64 {
        rows.iter().zip(multipliers).fold(0., |m, (row, &lambda)| {
            let r = row.residual(g);
            let v = if row.is_equality() { r.abs() } else { (-r).min(lambda / rho).abs() };
            m.max(v)
        })
    }

    /// Plain max-norm infeasibility, as reported in [`Termination::violation`].
    fn infeasibility(rows: &[Row], g: &[f64]) -> f64 {
        rows.iter().fold(0., |m, row| {
            let r = row.residual(g);
            m.max(if row.is_equality() { r.abs() } else { r.max(0.) })
        })
    }

    fn terminate(nlp: &mut dyn Nlp, status: Status, iterations: usize, x: &[f64], rows: &[Row]) -> Termination {
        let objective = nlp.objective(x);
        let violation = Self::infeasibility(rows, &nlp.constraints(x));
        nlp.finalize(status, x, objective);
        Termination { status, iterations, objective, violation }
    }
}

impl NlpSolver for AugmentedLagrangian {
    fn optimize(&self, nlp: &mut dyn Nlp) -> Termination {
        let config = &self.config;
        if let Err(e) = nlp::validate(nlp) {
            warn!("Invalid problem: {}", e);
            let x = nlp.starting_point();
            nlp.finalize(Status::InvalidProblem, &x, f64::NAN);
            return Termination { status: Status::InvalidProblem, iterations: 0, objective: f64::NAN, violation: f64::NAN };
        }
        let bounds = nlp.bounds();
        let lower: Vec<f64> = bounds.x_l.iter().map(|&l| finite_or(l, f64::NEG_INFINITY)).collect();
        let upper: Vec<f64> = bounds.x_u.iter().map(|&u| finite_or(u, f64::INFINITY)).collect();
        let rows = Row::rows(&bounds);
        let mut x = lbfgs::project(&nlp.starting_point(), &lower, &upper);
        let mut multipliers = self.initial_multipliers(nlp, &rows, &x);
        let mut rho = config.rho_init;
        let mut prev_violation = f64::INFINITY;
        let mut stalls = 0;
        let mut inner_iterations = 0;
        for k in 0..config.max_iter {
            let inner_tol = (config.inner_tol_init * 0.1f64.powi(k as i32)).max(config.tol);
            let sub = Subproblem { nlp, rows: &rows, multipliers: &multipliers, rho };
            let min = minimize_box(
                &|x| sub.evaluate(x),
                &x,
                &lower,
                &upper,
                inner_tol,
                config.max_inner_iter,
                config.lbfgs_memory,
            );
            inner_iterations += min.iterations;
            if !min.value.is_finite() || min.x.iter().any(|x| !x.is_finite()) {
                warn!("Non-finite subproblem result at iteration {}: value {}", k, min.value);
                return Self::terminate(nlp, Status::NumericalError, k + 1, &x, &rows);
            }
            x = min.x;
            let g = nlp.constraints(&x);
            let violation = Self::violation(&rows, &g, &multipliers, rho);
            multipliers = sub.weights(&g);
            let gradient = lagrangian_gradient(nlp, &rows, &x, &multipliers);
            let dual_inf = inf_norm(&lbfgs::projected_gradient(&x, &gradient, &lower, &upper));
            // Large multipliers loosen the stationarity test, as in interior-point codes' `s_d`
            let mean_multiplier = multipliers.iter().map(|l| l.abs()).sum::<f64>() / multipliers.len().max(1) as f64;
            let dual_scale = (mean_multiplier / 100.).max(1.);
            debug!(
                "iteration {}: f {:.6e}, violation {:.3e}, dual {:.3e}, rho {:.1e}, inner {} ({}{})",
                k, nlp.objective(&x), violation, dual_inf, rho, min.iterations,
                if min.converged { "converged" } else { "unconverged" }, if min.stalled { ", stalled" } else { "" },
            );
            if dual_inf <= config.tol * dual_scale && violation <= config.tol {
                info!("Converged after {} iterations ({} inner)", k + 1, inner_iterations);
                return Self::terminate(nlp, Status::Success, k + 1, &x, &rows);
            }
            if min.stalled {
                if violation <= config.constr_viol_tol && dual_inf <= config.acceptable_tol * dual_scale {
                    info!("Solved to acceptable level after {} iterations (violation {:.3e}, dual {:.3e})", k + 1, violation, dual_inf);
                    return Self::terminate(nlp, Status::Success, k + 1, &x, &rows);
                }
                stalls += 1;
                if stalls >= MAX_STALLS {
                    warn!("Line search stalled {} times in a row (violation {:.3e}, dual {:.3e})", stalls, violation, dual_inf);
                    return Self::terminate(nlp, Status::NumericalError, k + 1, &x, &rows);
                }
            } else {
                stalls = 0;
            }
            if violation > config.sufficient_decrease * prev_violation {
                if rho >= config.rho_max {
                    if violation > config.constr_viol_tol {
                        info!("Penalty saturated at {:.1e} with violation {:.3e}: infeasible", rho, violation);
                        return Self::terminate(nlp, Status::Infeasible, k + 1, &x, &rows);
                    }
                } else {
                    rho = (rho * config.rho_growth).min(config.rho_max);
                }
            }
            prev_violation = violation;
        }
        info!("Hit iteration cap {} ({} inner)", config.max_iter, inner_iterations);
        Self::terminate(nlp, Status::MaxIterationsExceeded, config.max_iter, &x, &rows)
    }
}
