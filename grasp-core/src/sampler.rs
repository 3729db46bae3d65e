use std::{f64::consts::TAU, fmt::{self, Display, Formatter}, str::FromStr};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{error::{ConfigError, ShapeFamilyError}, force::Force, geometry::perimeter::NUM_QUADRANTS, shape::ShapeModel};

/// Bump coefficients are drawn from `[-COEFFICIENT_RANGE, COEFFICIENT_RANGE]`.
pub const COEFFICIENT_RANGE: f64 = 0.3;
pub const FRICTION_RANGE: (f64, f64) = (0.5, 1.);
pub const DISTURBANCE_FN_RANGE: (f64, f64) = (0.1, 1.);

/// Inputs to [`ShapeModel::configure`], as sampled or loaded from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProblemSpec {
    pub coefficients: Vec<f64>,
    pub friction: f64,
    pub disturbance: Force,
}

impl ProblemSpec {
    pub fn build(&self) -> Result<ShapeModel, ConfigError> {
        ShapeModel::configured(&self.coefficients, self.friction, self.disturbance)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeFamily {
    /// Plain unit circle; the disturbance has no tangential component.
    Circle,
    /// Sampled bumps, used as drawn.
    Patch,
}

impl ShapeFamily {
    pub const ALL: [ShapeFamily; 2] = [ShapeFamily::Circle, ShapeFamily::Patch];

    /// Restrict a sampled problem to this family.
    pub fn apply(&self, spec: ProblemSpec) -> ProblemSpec {
        match self {
            ShapeFamily::Circle => ProblemSpec {
                coefficients: vec![0.; spec.coefficients.len()],
                disturbance: Force { tangential: 0., ..spec.disturbance },
                ..spec
            },
            ShapeFamily::Patch => spec,
        }
    }
}

impl Display for ShapeFamily {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ShapeFamily::Circle => write!(f, "circle"),
            ShapeFamily::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for ShapeFamily {
    type Err = ShapeFamilyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "circle" => Ok(ShapeFamily::Circle),
            "patch" => Ok(ShapeFamily::Patch),
            _ => Err(ShapeFamilyError::Unrecognized(s.to_string())),
        }
    }
}

/// Random grasp problems. Each sampler owns its generator, so concurrent trials never share state
/// and a seed reproduces a problem exactly.
#[derive(Clone, Debug)]
pub struct ProblemSampler {
    rng: StdRng,
}

impl ProblemSampler {
    pub fn new(seed: u64) -> Self {
        ProblemSampler { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn from_entropy() -> Self {
        ProblemSampler { rng: StdRng::from_entropy() }
    }

    /// Draw coefficients in `[-0.3, 0.3]`, friction in `[0.5, 1]`, and a disturbance with `fn` in
    /// `[0.1, 1]`, `ft` within its friction cone and `t` in `[0, 2π)`.
    pub fn sample_spec(&mut self) -> ProblemSpec {
        let rng = &mut self.rng;
        let coefficients = (0..NUM_QUADRANTS).map(|_| rng.gen_range(-COEFFICIENT_RANGE..=COEFFICIENT_RANGE)).collect();
        let friction = rng.gen_range(FRICTION_RANGE.0..=FRICTION_RANGE.1);
        let normal = rng.gen_range(DISTURBANCE_FN_RANGE.0..=DISTURBANCE_FN_RANGE.1);
        let limit = friction * normal;
        let tangential = rng.gen_range(-limit..=limit);
        let t = rng.gen_range(0. ..TAU);
        ProblemSpec { coefficients, friction, disturbance: Force::new(t, normal, tangential) }
    }

    pub fn sample(&mut self, family: ShapeFamily) -> ProblemSpec {
        family.apply(self.sample_spec())
    }

    /// A configured [`ShapeModel`] for a fresh sample. Sampled inputs always pass validation, so a
    /// rejection here is a sampler bug.
    pub fn sample_model(&mut self, family: ShapeFamily) -> ShapeModel {
        let spec = self.sample(family);
        match spec.build() {
            Ok(model) => model,
            Err(e) => panic!("Sampled problem {:?} rejected: {}", spec, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn seeded_is_reproducible() {
        let a = ProblemSampler::new(7).sample(ShapeFamily::Patch);
        let b = ProblemSampler::new(7).sample(ShapeFamily::Patch);
        assert_eq!(a, b);
        assert_ne!(a, ProblemSampler::new(8).sample(ShapeFamily::Patch));
    }

    #[test]
    fn samples_configure_within_ranges() {
        let mut sampler = ProblemSampler::new(42);
        for _ in 0..200 {
            let spec = sampler.sample(ShapeFamily::Patch);
            assert!(spec.coefficients.iter().all(|c| c.abs() <= 0.3));
            assert!((0.5..=1.).contains(&spec.friction));
            let shape = spec.build().unwrap();
            assert!(shape.is_configured());
            let d = shape.disturbance();
            assert!((0.1..=1.).contains(&d.normal));
            assert!((0. ..TAU).contains(&d.t));
            assert!(shape.friction_satisfied(&d));
        }
    }

    #[test]
    fn sampled_models_are_configured() {
        let mut sampler = ProblemSampler::new(11);
        for family in ShapeFamily::ALL {
            for _ in 0..50 {
                let model = sampler.sample_model(family);
                assert!(model.is_configured());
                assert!(model.friction_satisfied(&model.disturbance()));
            }
        }
        let model = ProblemSampler::new(5).sample_model(ShapeFamily::Patch);
        let spec = ProblemSampler::new(5).sample(ShapeFamily::Patch);
        assert_eq!(model.perimeter().coefficients.to_vec(), spec.coefficients);
        assert_eq!(model.friction(), spec.friction);
    }

    #[test]
    fn circle_family() {
        let mut sampler = ProblemSampler::new(3);
        for _ in 0..20 {
            let spec = sampler.sample(ShapeFamily::Circle);
            assert_eq!(spec.coefficients, vec![0.; 4]);
            assert_eq!(spec.disturbance.tangential, 0.);
            assert!(spec.build().unwrap().center_of_mass().norm() < 1e-4);
        }
    }

    #[test]
    fn family_names() {
        assert_eq!("circle".parse(), Ok(ShapeFamily::Circle));
        assert_eq!("Patch".parse(), Ok(ShapeFamily::Patch));
        assert_eq!("blob".parse::<ShapeFamily>(), Err(ShapeFamilyError::Unrecognized("blob".to_string())));
        assert_eq!(ShapeFamily::Circle.to_string(), "circle");
    }

    #[test]
    fn spec_json() {
        let spec = ProblemSpec {
            coefficients: vec![0.1, 0., -0.2, 0.3],
            friction: 0.75,
            disturbance: Force::new(1.5, 0.5, -0.1),
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, r#"{"coefficients":[0.1,0.0,-0.2,0.3],"friction":0.75,"disturbance":{"t":1.5,"fn":0.5,"ft":-0.1}}"#);
        assert_eq!(serde_json::from_str::<ProblemSpec>(&json).unwrap(), spec);
    }
}
