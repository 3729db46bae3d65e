use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    force::Force,
    geometry::{
        centroid::{center_of_mass, CentroidIntegrator, GaussKronrod},
        perimeter::{Perimeter, ShapeFactor, NUM_QUADRANTS},
    },
    math::Scalar,
    r2::R2,
};

/// A committed, validated problem: perimeter, friction coefficient, disturbance force (already
/// clamped into the friction cone) and the center of mass derived from the perimeter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub perimeter: Perimeter,
    pub friction: f64,
    pub disturbance: Force,
    pub com: R2<f64>,
}

/// The object being grasped. Starts unconfigured; [`ShapeModel::configure`] validates its inputs
/// and swaps in a whole new [`Configuration`], so a reader never sees a half-applied one.
#[derive(Clone, Debug, Default)]
pub struct ShapeModel {
    committed: Option<Configuration>,
}

impl ShapeModel {
    pub fn new() -> Self {
        ShapeModel::default()
    }

    pub fn configured(
        coefficients: &[f64],
        friction: f64,
        disturbance: Force,
    ) -> Result<Self, ConfigError> {
        let mut model = ShapeModel::new();
        model.configure(coefficients, friction, disturbance)?;
        Ok(model)
    }

    pub fn configure(
        &mut self,
        coefficients: &[f64],
        friction: f64,
        disturbance: Force,
    ) -> Result<(), ConfigError> {
        self.configure_with(coefficients, friction, disturbance, &GaussKronrod::default())
    }

    /// Validate, clamp the disturbance's tangential component into the friction cone, recompute the
    /// center of mass, then commit. On error the previous configuration (if any) stays in place.
    pub fn configure_with(
        &mut self,
        coefficients: &[f64],
        friction: f64,
        disturbance: Force,
        integrator: &dyn CentroidIntegrator,
    ) -> Result<(), ConfigError> {
        let coefficients: [f64; NUM_QUADRANTS] = coefficients.try_into().map_err(|_| {
            ConfigError::CoefficientCount { expected: NUM_QUADRANTS, actual: coefficients.len() }
        })?;
        if !(0. ..=1.).contains(&friction) {
            return Err(ConfigError::Friction(friction));
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::NonFinite("perimeter coefficient"));
        }
        if !disturbance.is_finite() {
            return Err(ConfigError::NonFinite("disturbance force"));
        }
        let limit = friction * disturbance.normal.abs();
        let tangential = disturbance.tangential.clamp(-limit, limit);
        if tangential != disturbance.tangential {
            debug!("Clamped disturbance ft {} to {}", disturbance.tangential, tangential);
        }
        let disturbance = Force { tangential, ..disturbance };
        let perimeter = Perimeter::new(coefficients);
        let com = center_of_mass(&perimeter, integrator);
        debug!("Configured shape {:?}, friction {:.4}, disturbance {}, COM {}", coefficients, friction, disturbance, com);
        self.committed = Some(Configuration { perimeter, friction, disturbance, com });
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.committed.is_some()
    }

    /// The committed configuration. Panics when unconfigured: every query below requires one.
    pub fn configuration(&self) -> &Configuration {
        match &self.committed {
            Some(configuration) => configuration,
            None => panic!("ShapeModel queried before a successful configure()"),
        }
    }

    pub fn perimeter(&self) -> &Perimeter {
        &self.configuration().perimeter
    }
    pub fn friction(&self) -> f64 {
        self.configuration().friction
    }
    pub fn disturbance(&self) -> Force {
        self.configuration().disturbance
    }
    pub fn center_of_mass(&self) -> R2<f64> {
        self.configuration().com
    }

    pub fn shape_factor<D: Scalar>(&self, t: D) -> ShapeFactor<D> {
        self.perimeter().shape_factor(t)
    }
    pub fn quadrant(&self, t: f64) -> usize {
        self.shape_factor(t).quadrant
    }
    pub fn position<D: Scalar>(&self, t: D) -> R2<D> {
        self.perimeter().position(t)
    }
    pub fn velocity<D: Scalar>(&self, t: D) -> R2<D> {
        self.perimeter().velocity(t)
    }
    pub fn acceleration<D: Scalar>(&self, t: D) -> R2<D> {
        self.perimeter().acceleration(t)
    }
    /// `dP/dt`; not normalized.
    pub fn tangent<D: Scalar>(&self, t: D) -> R2<D> {
        self.velocity(t)
    }
    pub fn tangent_derivative<D: Scalar>(&self, t: D) -> R2<D> {
        self.acceleration(t)
    }
    /// Tangent rotated a quarter turn counter-clockwise, which points into the object.
    pub fn normal<D: Scalar>(&self, t: D) -> R2<D> {
        self.tangent(t).rot90()
    }
    pub fn normal_derivative<D: Scalar>(&self, t: D) -> R2<D> {
        self.tangent_derivative(t).rot90()
    }

    /// Coulomb check `|ft| ≤ μ·|fn|`, boundary inclusive.
    pub fn friction_satisfied(&self, force: &Force) -> bool {
        force.tangential.abs() <= self.friction() * force.normal.abs()
    }

    pub fn all_friction_satisfied(&self, forces: &[Force]) -> bool {
        forces.iter().all(|force| self.friction_satisfied(force))
    }
}
