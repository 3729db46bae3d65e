use nalgebra::ComplexField;

use crate::dual::Dual;

/// Transcendental functions needed to evaluate the perimeter, for both plain and dual scalars.
pub trait Trig {
    fn sin(&self) -> Self;
    fn cos(&self) -> Self;
    fn exp(&self) -> Self;
}

impl Trig for Dual {
    fn sin(&self) -> Dual {
        Dual(self.0.clone().sin(), self.1)
    }
    fn cos(&self) -> Dual {
        Dual(self.0.clone().cos(), self.1)
    }
    fn exp(&self) -> Dual {
        Dual(self.0.clone().exp(), self.1)
    }
}

impl Trig for f64 {
    fn sin(&self) -> f64 {
        f64::sin(*self)
    }
    fn cos(&self) -> f64 {
        f64::cos(*self)
    }
    fn exp(&self) -> f64 {
        f64::exp(*self)
    }
}
