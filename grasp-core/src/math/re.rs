use crate::dual::Dual;

/// Real part of a scalar: the value a branch (quadrant selection, angle wrapping) is decided on.
pub trait Re {
    fn re(&self) -> f64;
}

impl Re for f64 {
    fn re(&self) -> f64 {
        *self
    }
}

impl Re for Dual {
    fn re(&self) -> f64 {
        self.v()
    }
}
