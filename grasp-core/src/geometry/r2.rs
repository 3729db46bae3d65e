use std::{ops::{Add, Mul, Neg, Sub}, fmt::{Display, Formatter, self}};

use approx::{AbsDiffEq, RelativeEq};
use derive_more::{Add, Neg, Sub};
use serde::{Deserialize, Serialize};

use crate::dual::Dual;

#[derive(Debug, Copy, Clone, PartialEq, Add, Sub, Neg, Serialize, Deserialize)]
pub struct R2<D> {
    pub x: D,
    pub y: D,
}

impl<D: Display> Display for R2<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

impl<D: Clone + Add<Output = D> + Mul<Output = D>> R2<D> {
    pub fn dot(&self, o: &R2<D>) -> D {
        self.x.clone() * o.x.clone() + self.y.clone() * o.y.clone()
    }
}

impl<D: Clone + Sub<Output = D> + Mul<Output = D>> R2<D> {
    /// z-component of the planar cross product `self × o`.
    pub fn cross(&self, o: &R2<D>) -> D {
        self.x.clone() * o.y.clone() - self.y.clone() * o.x.clone()
    }
}

impl<D: Clone + Neg<Output = D>> R2<D> {
    /// Counter-clockwise quarter turn: `(x, y) ↦ (-y, x)`.
    pub fn rot90(&self) -> R2<D> {
        R2 { x: -self.y.clone(), y: self.x.clone() }
    }
}

impl<D: Add<f64, Output = D>> R2<D> {
    pub fn translate(self, o: R2<f64>) -> R2<D> {
        R2 { x: self.x + o.x, y: self.y + o.y }
    }
}

impl R2<f64> {
    pub fn zero() -> Self {
        R2 { x: 0., y: 0. }
    }
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl R2<Dual> {
    pub fn v(&self) -> R2<f64> {
        R2 { x: self.x.v(), y: self.y.v() }
    }
}

impl<D: Mul<D, Output = D> + Clone> Mul<D> for R2<D> {
    type Output = Self;
    fn mul(self, rhs: D) -> Self::Output {
        R2 {
            x: self.x * rhs.clone(),
            y: self.y * rhs,
        }
    }
}

impl AbsDiffEq for R2<f64> {
    type Epsilon = f64;
    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }
    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.x.abs_diff_eq(&other.x, epsilon) && self.y.abs_diff_eq(&other.y, epsilon)
    }
}

impl RelativeEq for R2<f64> {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }
    fn relative_eq(&self, other: &Self, epsilon: Self::Epsilon, max_relative: Self::Epsilon) -> bool {
        self.x.relative_eq(&other.x, epsilon, max_relative) && self.y.relative_eq(&other.y, epsilon, max_relative)
    }
}
