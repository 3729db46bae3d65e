//! The object's boundary: a unit circle with one Gaussian bump per quadrant.
//!
//! The radius at perimeter parameter `t` is `r(t) = 1 + c_q · exp(-((t - t_q) / s_q)²)`, where `q` is
//! the quadrant containing `t`, `t_q` its center angle and `s_q` its half-width. Everything here is
//! generic over [`Scalar`], so the same code yields values (`f64`) or exact derivatives (`Dual`).

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

use serde::{Deserialize, Serialize};

use crate::{math::Scalar, r2::R2};

pub const NUM_QUADRANTS: usize = 4;

/// Center angle of each quadrant's bump.
pub const QUADRANT_CENTERS: [f64; NUM_QUADRANTS] = [FRAC_PI_4, 3. * FRAC_PI_4, 5. * FRAC_PI_4, 7. * FRAC_PI_4];

/// Half-width of each quadrant's bump.
pub const HALF_WIDTHS: [f64; NUM_QUADRANTS] = [0.2; NUM_QUADRANTS];

/// Wrap `t` into `[0, 2π)`.
pub fn wrap_angle(t: f64) -> f64 {
    let mut tw = t % TAU;
    if tw < 0. {
        tw += TAU;
    }
    // `-ε + 2π` rounds up to 2π
    if tw >= TAU {
        tw = 0.;
    }
    tw
}

/// Wrap a (possibly dual) parameter, shifting by a constant multiple of 2π so derivatives carry over.
pub fn wrap<D: Scalar>(t: D) -> D {
    let re = t.re();
    let shift = re - wrap_angle(re);
    if shift == 0. { t } else { t - shift }
}

/// Quadrant index in `[0, 3]` containing `t`.
pub fn quadrant(t: f64) -> usize {
    (wrap_angle(t) / FRAC_PI_2).floor() as usize % NUM_QUADRANTS
}

/// Radius at a perimeter parameter, with the quadrant it came from and the bump-normalized offset
/// `(t - t_q) / s_q`.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeFactor<D> {
    pub r: D,
    pub quadrant: usize,
    pub offset: D,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Perimeter {
    pub coefficients: [f64; NUM_QUADRANTS],
}

impl Perimeter {
    pub fn new(coefficients: [f64; NUM_QUADRANTS]) -> Self {
        Perimeter { coefficients }
    }

    pub fn circle() -> Self {
        Perimeter::new([0.; NUM_QUADRANTS])
    }

    pub fn shape_factor<D: Scalar>(&self, t: D) -> ShapeFactor<D> {
        let t = wrap(t);
        let q = quadrant(t.re());
        let offset = (t - QUADRANT_CENTERS[q]) / HALF_WIDTHS[q];
        let r = (-(offset.clone() * offset.clone())).exp() * self.coefficients[q] + 1.;
        assert!(
            !r.re().is_nan() && !offset.re().is_nan(),
            "NaN shape factor at quadrant {}: r={:?}, offset={:?}", q, r, offset,
        );
        ShapeFactor { r, quadrant: q, offset }
    }

    pub fn radius<D: Scalar>(&self, t: D) -> D {
        self.shape_factor(t).r
    }

    /// `P(t) = r(t) · (cos t, sin t)`.
    pub fn position<D: Scalar>(&self, t: D) -> R2<D> {
        let t = wrap(t);
        let ShapeFactor { r, .. } = self.shape_factor(t.clone());
        let p = R2 { x: r.clone() * t.cos(), y: r * t.sin() };
        check_finite("position", &p);
        p
    }

    /// `dP/dt`, from `dr/dt = (r - 1) · (-2 · offset / s_q)`.
    pub fn velocity<D: Scalar>(&self, t: D) -> R2<D> {
        let t = wrap(t);
        let ShapeFactor { r, quadrant: q, offset } = self.shape_factor(t.clone());
        let s = HALF_WIDTHS[q];
        let (cos, sin) = (t.cos(), t.sin());
        let dr = (r.clone() - 1.) * (offset * (-2. / s));
        let v = R2 {
            x: dr.clone() * cos.clone() - r.clone() * sin.clone(),
            y: dr * sin + r * cos,
        };
        check_finite("velocity", &v);
        v
    }

    /// `d²P/dt² = r'' · u + 2 r' · u' - r · u`, with `u = (cos t, sin t)` and
    /// `r'' = (r - 1) · (4 offset² / s_q² - 2 / s_q²)`.
    pub fn acceleration<D: Scalar>(&self, t: D) -> R2<D> {
        let t = wrap(t);
        let ShapeFactor { r, quadrant: q, offset } = self.shape_factor(t.clone());
        let s = HALF_WIDTHS[q];
        let (cos, sin) = (t.cos(), t.sin());
        let bump = r.clone() - 1.;
        let dr = bump.clone() * (offset.clone() * (-2. / s));
        let d2r = bump.clone() * (offset.clone() * offset * (4. / (s * s))) + bump * (-2. / (s * s));
        let a = R2 {
            x: d2r.clone() * cos.clone() - dr.clone() * sin.clone() * 2. - r.clone() * cos.clone(),
            y: d2r * sin.clone() + dr * cos * 2. - r * sin,
        };
        check_finite("acceleration", &a);
        a
    }
}

fn check_finite<D: Scalar>(what: &str, p: &R2<D>) {
    assert!(!p.x.re().is_nan() && !p.y.re().is_nan(), "NaN {}: {:?}", what, p);
}
