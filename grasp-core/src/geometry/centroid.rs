use std::{collections::BinaryHeap, f64::consts::TAU};

use log::{debug, warn};
use ordered_float::OrderedFloat;

use crate::{geometry::perimeter::Perimeter, r2::R2};

pub const COM_ABS_TOL: f64 = 1e-4;
pub const COM_REL_TOL: f64 = 1e-3;

/// Result of a definite integral: value and estimated absolute error.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quadrature {
    pub value: f64,
    pub error: f64,
    pub evaluations: usize,
}

/// Evaluates `∫ f` over `[lower, upper]` to within `max(abs_tol, rel_tol · |value|)`.
pub trait CentroidIntegrator {
    fn integrate(&self, f: &dyn Fn(f64) -> f64, lower: f64, upper: f64, abs_tol: f64, rel_tol: f64) -> Quadrature;
}

/// 15-point Kronrod abscissae (positive half, descending); odd indices are the 7-point Gauss nodes.
const XGK: [f64; 8] = [
    0.991455371120812639206854697526329,
    0.949107912342758524526189684047851,
    0.864864423359769072789712788640926,
    0.741531185599394439863864773280788,
    0.586087235467691130294144845693013,
    0.405845151377397166906606412076961,
    0.207784955007898467600689403773245,
    0.000000000000000000000000000000000,
];

const WGK: [f64; 8] = [
    0.022935322010529224963732008058970,
    0.063092092629978553290700663189204,
    0.104790010322250183839876322541518,
    0.140653259715525918745189590510238,
    0.169004726639267902826583426598550,
    0.190350578064785409913256402421014,
    0.204432940075298892414161999234649,
    0.209482141084727828012999174891714,
];

const WG: [f64; 4] = [
    0.129484966168869693270611432679082,
    0.279705391489276667901467771423780,
    0.381830050505118944950369775488975,
    0.417959183673469387755102040816327,
];

/// Globally adaptive Gauss–Kronrod (7/15) quadrature: repeatedly bisects the segment with the
/// largest error estimate until the summed estimate meets the tolerance.
#[derive(Clone, Debug)]
pub struct GaussKronrod {
    pub max_segments: usize,
}

impl Default for GaussKronrod {
    fn default() -> Self {
        GaussKronrod { max_segments: 10_000 }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Segment {
    error: OrderedFloat<f64>,
    lower: OrderedFloat<f64>,
    upper: OrderedFloat<f64>,
    value: OrderedFloat<f64>,
}

impl Segment {
    fn new(f: &dyn Fn(f64) -> f64, lower: f64, upper: f64) -> Segment {
        let (value, error) = GaussKronrod::rule(f, lower, upper);
        Segment {
            error: OrderedFloat(error),
            lower: OrderedFloat(lower),
            upper: OrderedFloat(upper),
            value: OrderedFloat(value),
        }
    }
}

impl GaussKronrod {
    /// One application of the 15-point rule: `(K15 estimate, |K15 - G7|)`.
    pub fn rule(f: &dyn Fn(f64) -> f64, lower: f64, upper: f64) -> (f64, f64) {
        let center = 0.5 * (lower + upper);
        let half = 0.5 * (upper - lower);
        let fc = f(center);
        let mut gauss = fc * WG[3];
        let mut kronrod = fc * WGK[7];
        for (j, (&x, &wk)) in XGK.iter().zip(WGK.iter()).take(7).enumerate() {
            let dx = half * x;
            let pair = f(center - dx) + f(center + dx);
            kronrod += wk * pair;
            if j % 2 == 1 {
                gauss += WG[j / 2] * pair;
            }
        }
        (kronrod * half, ((kronrod - gauss) * half).abs())
    }
}

impl CentroidIntegrator for GaussKronrod {
    fn integrate(&self, f: &dyn Fn(f64) -> f64, lower: f64, upper: f64, abs_tol: f64, rel_tol: f64) -> Quadrature {
        let first = Segment::new(f, lower, upper);
        let mut value = first.value.0;
        let mut error = first.error.0;
        let mut heap = BinaryHeap::from([first]);
        let target = |value: f64| abs_tol.max(rel_tol * value.abs());
        while error > target(value) && heap.len() < self.max_segments {
            let Some(worst) = heap.pop() else { break };
            let mid = 0.5 * (worst.lower.0 + worst.upper.0);
            let left = Segment::new(f, worst.lower.0, mid);
            let right = Segment::new(f, mid, worst.upper.0);
            value += left.value.0 + right.value.0 - worst.value.0;
            error += left.error.0 + right.error.0 - worst.error.0;
            heap.push(left);
            heap.push(right);
        }
        // Re-sum to shed the drift of the incremental updates
        let value: f64 = heap.iter().map(|s| s.value.0).sum();
        let error: f64 = heap.iter().map(|s| s.error.0).sum();
        let segments = heap.len();
        if error > target(value) {
            warn!("Quadrature over [{}, {}] missed tolerance: error {:.3e} after {} segments", lower, upper, error, segments);
        }
        Quadrature { value, error, evaluations: 15 * (2 * segments - 1) }
    }
}

/// Center of mass of the region bounded by `perimeter`:
/// `(∫ r² cos t / 3, ∫ r² sin t / 3) / ∫ r / 2`, each over one revolution.
pub fn center_of_mass(perimeter: &Perimeter, integrator: &dyn CentroidIntegrator) -> R2<f64> {
    let integrate = |f: &dyn Fn(f64) -> f64| integrator.integrate(f, 0., TAU, COM_ABS_TOL, COM_REL_TOL);
    let mass = integrate(&|t| perimeter.radius(t) / 2.);
    let com_x = integrate(&|t| {
        let r = perimeter.radius(t);
        r * r * t.cos() / 3.
    });
    let com_y = integrate(&|t| {
        let r = perimeter.radius(t);
        r * r * t.sin() / 3.
    });
    debug!(
        "center_of_mass: mass {:.6} (±{:.1e}), x {:.6} (±{:.1e}), y {:.6} (±{:.1e})",
        mass.value, mass.error, com_x.value, com_x.error, com_y.value, com_y.error,
    );
    let com = R2 { x: com_x.value / mass.value, y: com_y.value / mass.value };
    assert!(com.is_finite(), "Non-finite center of mass {:?} for {:?}", com, perimeter);
    com
}
