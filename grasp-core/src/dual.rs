use std::{fmt::{Debug, Display}, iter::Sum, ops::{Add, Deref, Div, Mul, Neg, Sub}};

use nalgebra::{Dyn, Matrix, U1};
use num_dual::{Derivative, DualDVec64};

use crate::fmt::Fmt;

/// Forward-mode dual number carrying a dense gradient of length `.1`.
///
/// Geometry and equilibrium code is generic over its scalar, so evaluating it on `Dual`s seeded
/// with one-hot gradients yields exact first derivatives (used by the derivative test and by the
/// geometry tests).
#[derive(Clone, PartialEq)]
pub struct Dual(
    pub DualDVec64,
    pub usize
);

impl Dual {
    pub fn new(v: f64, d: Vec<f64>) -> Self {
        let n = d.len();
        Dual(
            DualDVec64::new(v, Derivative::some(Matrix::from(d))),
            n
        )
    }
    pub fn scalar(v: f64, n: usize) -> Self {
        Dual::new(v, vec![0.; n])
    }
    /// Independent variable `idx` of `n`: value `v`, unit gradient along `idx`.
    pub fn variable(v: f64, idx: usize, n: usize) -> Self {
        let mut d = vec![0.; n];
        d[idx] = 1.;
        Dual::new(v, d)
    }
    /// Seed every coordinate of `xs` as its own independent variable.
    pub fn variables(xs: &[f64]) -> Vec<Self> {
        let n = xs.len();
        xs.iter().enumerate().map(|(idx, &x)| Dual::variable(x, idx, n)).collect()
    }
    pub fn v(&self) -> f64 {
        self.0.re
    }
    pub fn d(&self) -> Vec<f64> {
        let d = self.0.clone();
        let eps = d.eps;
        let unwrapped = eps.unwrap_generic(Dyn(self.1), U1);
        let sliced = unwrapped.as_slice();
        sliced.to_vec()
    }
}

impl Deref for Dual {
    type Target = DualDVec64;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Dual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.s(3))
    }
}

impl Debug for Dual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dual::new({:?}, vec!{:?})", self.v(), self.d())
    }
}

impl Add for Dual {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        assert_eq!(self.1, rhs.1);
        Dual(self.0 + rhs.0, self.1)
    }
}

impl Add<f64> for Dual {
    type Output = Self;
    fn add(self, rhs: f64) -> Self::Output {
        Dual(self.0 + rhs, self.1)
    }
}

impl Sub for Dual {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        assert_eq!(self.1, rhs.1);
        Dual(self.0 - rhs.0, self.1)
    }
}

impl Sub<f64> for Dual {
    type Output = Self;
    fn sub(self, rhs: f64) -> Self::Output {
        Dual(self.0 - rhs, self.1)
    }
}

impl Mul for Dual {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        assert_eq!(self.1, rhs.1);
        Dual(self.0 * rhs.0, self.1)
    }
}

impl Mul<f64> for Dual {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Dual(self.0 * rhs, self.1)
    }
}

impl Div<f64> for Dual {
    type Output = Self;
    fn div(self, rhs: f64) -> Self::Output {
        Dual(self.0 / rhs, self.1)
    }
}

impl Neg for Dual {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Dual(-self.0, self.1)
    }
}

impl Sum for Dual {
    fn sum<I: Iterator<Item = Dual>>(iter: I) -> Self {
        iter.reduce(|a, b| a + b).unwrap_or_else(|| Dual::scalar(0., 0))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use super::*;
    use crate::math::trig::Trig;
    use test_log::test;

    #[test]
    fn variable_is_one_hot() {
        let x = Dual::variable(2.5, 1, 3);
        assert_eq!(x.v(), 2.5);
        assert_eq!(x.d(), vec![0., 1., 0.]);
    }

    #[test]
    fn product_rule() {
        // d/dx (x * y) = y, d/dy (x * y) = x
        let [x, y]: [Dual; 2] = Dual::variables(&[2., 3.]).try_into().unwrap();
        let p = x * y;
        assert_eq!(p.v(), 6.);
        assert_eq!(p.d(), vec![3., 2.]);
    }

    #[test]
    fn scalar_ops() {
        let x = Dual::new(6., vec![2., 4.]);
        let y = (x.clone() / 2. + 1.) * 3. - 1.;
        assert_eq!(y.v(), 11.);
        assert_eq!(y.d(), vec![3., 6.]);
        assert_eq!((-x).d(), vec![-2., -4.]);
    }

    #[test]
    fn gaussian_bump() {
        // d/dx exp(-x²) = -2x exp(-x²)
        let x = Dual::variable(0.7, 0, 1);
        let g = (-(x.clone() * x)).exp();
        let expected = (-0.49f64).exp();
        assert_relative_eq!(g.v(), expected, epsilon = 1e-15);
        assert_relative_eq!(g.d()[0], -1.4 * expected, epsilon = 1e-15);
    }

    #[test]
    fn sum_of_variables() {
        let total: Dual = Dual::variables(&[1., 2., 3.]).into_iter().sum();
        assert_eq!(total.v(), 6.);
        assert_eq!(total.d(), vec![1., 1., 1.]);
    }
}
