use std::{fmt::{self, Display, Formatter}, ops::Add};

use serde::{Deserialize, Serialize};

use crate::{force::Force, math::Scalar, r2::R2, shape::ShapeModel};

/// Net force and net moment (about the center of mass) of a set of forces applied to the perimeter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Equilibrium<D = f64> {
    pub force: R2<D>,
    pub moment: D,
}

impl<D: Scalar> Add for Equilibrium<D> {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Equilibrium { force: self.force + o.force, moment: self.moment + o.moment }
    }
}

impl<D: Scalar> Equilibrium<D> {
    /// Add a constant (non-differentiated) contribution.
    pub fn offset(self, o: &Equilibrium<f64>) -> Equilibrium<D> {
        Equilibrium { force: self.force.translate(o.force), moment: self.moment + o.moment }
    }
}

impl Equilibrium {
    /// Whether both residuals are strictly below `tol`.
    pub fn balanced(&self, tol: f64) -> bool {
        self.force.norm() < tol && self.moment.abs() < tol
    }
}

impl Display for Equilibrium {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "F = {} {}, M = {}", self.force.x, self.force.y, self.moment)
    }
}

/// Force and moment contributed by one force: `f = fn·N(t) + ft·T(t)` applied at `P(t)`, with
/// moment `(P(t) - com) × f`.
pub fn wrench<D: Scalar>(shape: &ShapeModel, force: &Force<D>) -> Equilibrium<D> {
    let normal = shape.normal(force.t.clone());
    let tangent = shape.tangent(force.t.clone());
    let f = normal * force.normal.clone() + tangent * force.tangential.clone();
    let arm = shape.position(force.t.clone()).translate(-shape.center_of_mass());
    let moment = arm.cross(&f);
    Equilibrium { force: f, moment }
}

/// Net force and moment of the disturbance plus two contact forces; zero when the grasp balances
/// the disturbance. Generic so the residual can be differentiated with dual numbers.
pub fn net_force_and_moment<D: Scalar>(shape: &ShapeModel, contacts: &[Force<D>; 2]) -> Equilibrium<D> {
    let disturbance = wrench(shape, &shape.disturbance());
    let [c0, c1] = contacts;
    (wrench(shape, c0) + wrench(shape, c1)).offset(&disturbance)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use test_log::test;

    use super::*;
    use crate::dual::Dual;

    fn circle(disturbance: Force) -> ShapeModel {
        ShapeModel::configured(&[0.; 4], 0.8, disturbance).unwrap()
    }

    #[test]
    fn zero_forces_and_disturbance() {
        let shape = circle(Force::new(1.3, 0., 0.));
        let zero = Force::new(0.4, 0., 0.);
        let net = net_force_and_moment(&shape, &[zero, zero]);
        assert_eq!(net.force, R2::zero());
        assert_eq!(net.moment, 0.);
        assert!(net.balanced(1e-12));
    }

    #[test]
    fn opposite_pushes_balance() {
        // disturbance pushes in at t=0, each contact pushes with half the force from the far side
        let shape = circle(Force::new(0., 1., 0.));
        let c = Force::new(PI, 0.5, 0.);
        let net = net_force_and_moment(&shape, &[c, c]);
        assert_abs_diff_eq!(net.force, R2::zero(), epsilon = 1e-12);
        assert_abs_diff_eq!(net.moment, 0., epsilon = 1e-4);
    }

    #[test]
    fn tangential_force_on_circle_spins_it() {
        let shape = circle(Force::new(0., 0., 0.));
        let w = wrench(&shape, &Force::new(FRAC_PI_2, 0., 1.));
        // tangent at π/2 is (-1, 0); arm (0, 1) × (-1, 0) = 1
        assert_abs_diff_eq!(w.force, R2 { x: -1., y: 0. }, epsilon = 1e-12);
        assert_abs_diff_eq!(w.moment, 1., epsilon = 1e-4);
        // a normal push through the center has no moment
        let w = wrench(&shape, &Force::new(1., 1., 0.));
        assert_abs_diff_eq!(w.moment, 0., epsilon = 1e-4);
    }

    #[test]
    fn dual_matches_f64() {
        let shape = ShapeModel::configured(&[0.2, -0.1, 0.3, 0.05], 0.6, Force::new(5., 0.7, 0.2)).unwrap();
        let c0 = Force::new(1.9, 0.4, -0.1);
        let c1 = Force::new(2.8, 0.3, 0.15);
        let net = net_force_and_moment(&shape, &[c0, c1]);
        let xs = Dual::variables(&[c0.t, c0.normal, c0.tangential, c1.t, c1.normal, c1.tangential]);
        let d0 = Force::new(xs[0].clone(), xs[1].clone(), xs[2].clone());
        let d1 = Force::new(xs[3].clone(), xs[4].clone(), xs[5].clone());
        let dual = net_force_and_moment(&shape, &[d0, d1]);
        assert_relative_eq!(dual.force.v(), net.force, epsilon = 1e-14);
        assert_relative_eq!(dual.moment.v(), net.moment, epsilon = 1e-14);
        // ∂F/∂fn0 = N(t0)
        let n0 = shape.normal(c0.t);
        assert_relative_eq!(dual.force.x.d()[1], n0.x, epsilon = 1e-14);
        assert_relative_eq!(dual.force.y.d()[1], n0.y, epsilon = 1e-14);
    }
}
