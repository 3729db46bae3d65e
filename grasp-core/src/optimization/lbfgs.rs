//! Bound-constrained minimization with a limited-memory BFGS direction and a projected backtracking
//! line search.

use std::collections::VecDeque;

use itertools::izip;
use log::trace;

/// Armijo sufficient-decrease constant.
const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 40;

/// The `m` most recent curvature pairs `(s, y, 1 / s·y)`.
#[derive(Clone, Debug)]
pub struct Lbfgs {
    memory: usize,
    pairs: VecDeque<(Vec<f64>, Vec<f64>, f64)>,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0., |m, x| m.max(x.abs()))
}

impl Lbfgs {
    pub fn new(memory: usize) -> Self {
        Lbfgs { memory, pairs: VecDeque::with_capacity(memory) }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn reset(&mut self) {
        self.pairs.clear();
    }

    /// Store a step `s` and gradient change `y`; skipped (returning `false`) unless `s·y > 0`, which
    /// keeps the implied Hessian approximation positive definite.
    pub fn push(&mut self, s: Vec<f64>, y: Vec<f64>) -> bool {
        let sy = dot(&s, &y);
        if !(sy > f64::EPSILON * dot(&s, &s).sqrt() * dot(&y, &y).sqrt()) {
            return false;
        }
        if self.pairs.len() == self.memory {
            self.pairs.pop_front();
        }
        self.pairs.push_back((s, y, 1. / sy));
        true
    }

    /// Quasi-Newton direction `-H·g` over the coordinates flagged `free`; fixed coordinates get 0.
    pub fn direction(&self, g: &[f64], free: &[bool]) -> Vec<f64> {
        let mask = |v: &[f64]| -> Vec<f64> { izip!(v, free).map(|(v, &f)| if f { *v } else { 0. }).collect() };
        let mut q = mask(g);
        let mut alphas = Vec::with_capacity(self.pairs.len());
        for (s, y, rho) in self.pairs.iter().rev() {
            let (s, y) = (mask(s), mask(y));
            let alpha = rho * dot(&s, &q);
            for (q, y) in q.iter_mut().zip(&y) {
                *q -= alpha * y;
            }
            alphas.push(alpha);
        }
        let gamma = match self.pairs.back() {
            Some((s, y, _)) => {
                let (s, y) = (mask(s), mask(y));
                let yy = dot(&y, &y);
                if yy > 0. { dot(&s, &y) / yy } else { 1. }
            }
            None => 1.,
        };
        let mut r: Vec<f64> = q.iter().map(|q| gamma * q).collect();
        for ((s, y, rho), alpha) in self.pairs.iter().zip(alphas.iter().rev()) {
            let (s, y) = (mask(s), mask(y));
            let beta = rho * dot(&y, &r);
            for (r, s) in r.iter_mut().zip(&s) {
                *r += s * (alpha - beta);
            }
        }
        r.iter().map(|r| -r).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoxMinimum {
    pub x: Vec<f64>,
    pub value: f64,
    /// Inf-norm of the projected gradient at `x`.
    pub projected_gradient: f64,
    pub iterations: usize,
    pub converged: bool,
    /// The line search could not decrease the objective even along steepest descent.
    pub stalled: bool,
}

pub fn project(x: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    izip!(x, lower, upper).map(|(x, l, u)| x.max(*l).min(*u)).collect()
}

/// `x - P(x - g)`: zero exactly at first-order stationary points of the box-constrained problem.
pub fn projected_gradient(x: &[f64], g: &[f64], lower: &[f64], upper: &[f64]) -> Vec<f64> {
    izip!(x, g, lower, upper).map(|(x, g, l, u)| x - (x - g).max(*l).min(*u)).collect()
}

/// Minimize `f` over `lower ≤ x ≤ upper` from `x0`, until the projected gradient's inf-norm drops to
/// `tol` or `max_iter` iterations pass. `f` returns the value and gradient.
pub fn minimize_box(
    f: &dyn Fn(&[f64]) -> (f64, Vec<f64>),
    x0: &[f64],
    lower: &[f64],
    upper: &[f64],
    tol: f64,
    max_iter: usize,
    memory: usize,
) -> BoxMinimum {
    let mut lbfgs = Lbfgs::new(memory);
    let mut x = project(x0, lower, upper);
    let (mut value, mut g) = f(&x);
    let mut iterations = 0;
    let mut stalled = false;
    loop {
        let pg = inf_norm(&projected_gradient(&x, &g, lower, upper));
        if pg <= tol || iterations >= max_iter || stalled || !value.is_finite() {
            trace!("minimize_box: {} iterations, value {:e}, projected gradient {:e}", iterations, value, pg);
            return BoxMinimum { x, value, projected_gradient: pg, iterations, converged: pg <= tol, stalled };
        }
        iterations += 1;
        // Coordinates pinned at a bound by a gradient pushing outward stay put this iteration
        let free: Vec<bool> = izip!(&x, &g, lower, upper)
            .map(|(x, g, l, u)| !((x <= l && *g > 0.) || (x >= u && *g < 0.)))
            .collect();
        let mut d = lbfgs.direction(&g, &free);
        if !(dot(&d, &g) < 0.) {
            lbfgs.reset();
            d = lbfgs.direction(&g, &free);
        }
        let steepest = lbfgs.is_empty();
        let mut step = if steepest { 1f64.min(1. / inf_norm(&d)) } else { 1. };
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate: Vec<f64> = project(
                &izip!(&x, &d).map(|(x, d)| x + step * d).collect::<Vec<_>>(),
                lower,
                upper,
            );
            let decrease = dot(&g, &izip!(&candidate, &x).map(|(c, x)| c - x).collect::<Vec<_>>());
            let (cv, cg) = f(&candidate);
            if cv.is_finite() && decrease < 0. && cv <= value + ARMIJO * decrease {
                accepted = Some((candidate, cv, cg));
                break;
            }
            step *= 0.5;
        }
        match accepted {
            Some((xn, vn, gn)) => {
                let s = izip!(&xn, &x).map(|(a, b)| a - b).collect();
                let y = izip!(&gn, &g).map(|(a, b)| a - b).collect();
                lbfgs.push(s, y);
                x = xn;
                value = vn;
                g = gn;
            }
            None if steepest => stalled = true,
            None => lbfgs.reset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use test_log::test;

    use super::*;

    fn rosenbrock(x: &[f64]) -> (f64, Vec<f64>) {
        let (a, b) = (x[0], x[1]);
        let value = (1. - a).powi(2) + 100. * (b - a * a).powi(2);
        let grad = vec![-2. * (1. - a) - 400. * a * (b - a * a), 200. * (b - a * a)];
        (value, grad)
    }

    const INF: f64 = f64::INFINITY;

    #[test]
    fn unconstrained_rosenbrock() {
        let min = minimize_box(&rosenbrock, &[-1.2, 1.], &[-INF, -INF], &[INF, INF], 1e-7, 1000, 8);
        assert!(min.converged, "{:?}", min);
        assert_abs_diff_eq!(min.x[0], 1., epsilon = 1e-5);
        assert_abs_diff_eq!(min.x[1], 1., epsilon = 1e-5);
    }

    #[test]
    fn active_bound() {
        // the unconstrained minimum (1, 1) is cut off by x1 ≤ 0.5; the constrained one sits on it
        let min = minimize_box(&rosenbrock, &[0., 0.], &[-INF, -INF], &[INF, 0.5], 1e-7, 1000, 8);
        assert!(min.converged, "{:?}", min);
        assert_eq!(min.x[1], 0.5);
        // ∂f/∂x0 = 0 on the boundary
        assert_abs_diff_eq!(rosenbrock(&min.x).1[0], 0., epsilon = 1e-6);
    }

    #[test]
    fn start_outside_box_is_projected() {
        let f = |x: &[f64]| ((x[0] - 3.).powi(2), vec![2. * (x[0] - 3.)]);
        let min = minimize_box(&f, &[10.], &[-1.], &[1.], 1e-10, 100, 4);
        assert_eq!(min.x, vec![1.]);
        assert!(min.converged);
        assert_eq!(min.projected_gradient, 0.);
    }

    #[test]
    fn rejects_non_positive_curvature() {
        let mut lbfgs = Lbfgs::new(2);
        assert!(!lbfgs.push(vec![1., 0.], vec![-1., 0.]));
        assert!(lbfgs.push(vec![1., 0.], vec![2., 0.]));
        assert!(lbfgs.push(vec![0., 1.], vec![0., 4.]));
        assert!(lbfgs.push(vec![1., 1.], vec![1., 1.]));
        assert_eq!(lbfgs.len(), 2);
    }

    #[test]
    fn recovers_diagonal_newton_step() {
        // f = x0² + 2 x1²: after two exact pairs the direction is the Newton step
        let mut lbfgs = Lbfgs::new(4);
        lbfgs.push(vec![1., 0.], vec![2., 0.]);
        lbfgs.push(vec![0., 1.], vec![0., 4.]);
        let d = lbfgs.direction(&[2., 4.], &[true, true]);
        assert_abs_diff_eq!(d[0], -1., epsilon = 1e-12);
        assert_abs_diff_eq!(d[1], -1., epsilon = 1e-12);
        let d = lbfgs.direction(&[2., 4.], &[true, false]);
        assert_eq!(d[1], 0.);
    }
}
