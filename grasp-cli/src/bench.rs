//! Batch scoring: solve many seeded problems per shape family (in parallel) and grade the share
//! that balance the disturbance without slipping.

use std::fmt::{self, Display, Formatter};

use grasp_core::{GraspConfig, GraspOptimizer, ProblemSampler, ShapeFamily};
use log::{debug, info};
use rayon::prelude::*;
use serde::Serialize;

/// Residual bound for both `|F|` and `|M|`.
pub const EQUILIBRIUM_TOL: f64 = 0.01;
/// Points per criterion, before the boost.
pub const MAX_POINTS: u32 = 4;

/// Pass rate at or above which a family's points double; circles can never reach theirs.
pub fn boost(family: ShapeFamily) -> f64 {
    match family {
        ShapeFamily::Circle => 1.1,
        ShapeFamily::Patch => 0.98,
    }
}

/// `ceil(max_points · pass_rate)`, doubled once the pass rate reaches `boost`.
pub fn assign_score(failures: usize, trials: usize, max_points: u32, boost: f64) -> u32 {
    if trials == 0 {
        return 0;
    }
    let rate = 1. - failures as f64 / trials as f64;
    let score = (max_points as f64 * rate).ceil() as u32;
    if rate >= boost { 2 * score } else { score }
}

/// One seeded run. A failed solve has no residual and fails every criterion.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trial {
    pub run: usize,
    pub family: ShapeFamily,
    pub force: Option<f64>,
    pub moment: Option<f64>,
    pub slipping: bool,
    pub error: Option<String>,
}

impl Trial {
    pub fn force_ok(&self) -> bool {
        self.force.map_or(false, |f| f <= EQUILIBRIUM_TOL)
    }
    pub fn moment_ok(&self) -> bool {
        self.moment.map_or(false, |m| m <= EQUILIBRIUM_TOL)
    }
    pub fn grip_ok(&self) -> bool {
        self.error.is_none() && !self.slipping
    }
}

impl Display for Trial {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "--- Run #{} ({}): ", self.run, self.family)?;
        if let Some(error) = &self.error {
            return write!(f, "⚠ solve failed: {}", error);
        }
        let mut ok = true;
        if let Some(force) = self.force.filter(|_| !self.force_ok()) {
            write!(f, "⚠ |F| = {} > {}; ", force, EQUILIBRIUM_TOL)?;
            ok = false;
        }
        if let Some(moment) = self.moment.filter(|_| !self.moment_ok()) {
            write!(f, "⚠ |M| = {} > {}; ", moment, EQUILIBRIUM_TOL)?;
            ok = false;
        }
        if self.slipping {
            write!(f, "⚠ slippage detected!; ")?;
            ok = false;
        }
        if ok {
            write!(f, "✔")?;
        }
        Ok(())
    }
}

pub fn run_trial(optimizer: &GraspOptimizer, family: ShapeFamily, seed: u64, run: usize) -> Trial {
    let shape = ProblemSampler::new(seed.wrapping_add(run as u64)).sample_model(family);
    debug!("Run #{} ({}): {:?}", run, family, shape.configuration());
    match optimizer.solve(&shape) {
        Ok(solution) => Trial {
            run,
            family,
            force: Some(solution.equilibrium.force.norm()),
            moment: Some(solution.equilibrium.moment.abs()),
            slipping: !solution.friction_satisfied,
            error: None,
        },
        Err(error) => Trial { run, family, force: None, moment: None, slipping: false, error: Some(error.to_string()) },
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Criterion {
    pub passed: usize,
    pub points: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FamilyScore {
    pub family: ShapeFamily,
    pub trials: Vec<Trial>,
    pub force: Criterion,
    pub moment: Criterion,
    pub grip: Criterion,
}

impl FamilyScore {
    pub fn new(family: ShapeFamily, trials: Vec<Trial>) -> Self {
        let n = trials.len();
        let criterion = |ok: &dyn Fn(&Trial) -> bool| {
            let passed = trials.iter().filter(|t| ok(t)).count();
            Criterion { passed, points: assign_score(n - passed, n, MAX_POINTS, boost(family)) }
        };
        let force = criterion(&Trial::force_ok);
        let moment = criterion(&Trial::moment_ok);
        let grip = criterion(&Trial::grip_ok);
        FamilyScore { family, trials, force, moment, grip }
    }

    pub fn points(&self) -> u32 {
        self.force.points + self.moment.points + self.grip.points
    }

    pub fn summary(&self) -> Vec<String> {
        let n = self.trials.len();
        vec![
            format!("|F| < {} verified {} / {} ➡ {} points granted", EQUILIBRIUM_TOL, self.force.passed, n, self.force.points),
            format!("|M| < {} verified {} / {} ➡ {} points granted", EQUILIBRIUM_TOL, self.moment.passed, n, self.moment.points),
            format!("slippage checks successful {} / {} ➡ {} points granted", self.grip.passed, n, self.grip.points),
        ]
    }
}

/// Solve `trials` problems of `family` in parallel; trial `n` is sampled with seed `seed + n`.
/// Failures are counted per family, so patch points do not carry circle failures.
pub fn score_family(config: &GraspConfig, family: ShapeFamily, trials: usize, seed: u64) -> FamilyScore {
    let optimizer = GraspOptimizer::new(config.clone());
    let results: Vec<Trial> = (0..trials)
        .into_par_iter()
        .map(|run| run_trial(&optimizer, family, seed, run))
        .collect();
    let score = FamilyScore::new(family, results);
    info!("{}: {} points", family, score.points());
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoring() {
        assert_eq!(assign_score(0, 100, 4, 1.1), 4);
        assert_eq!(assign_score(0, 100, 4, 0.98), 8);
        assert_eq!(assign_score(1, 100, 4, 0.98), 8);
        assert_eq!(assign_score(3, 100, 4, 0.98), 4);
        assert_eq!(assign_score(30, 100, 4, 0.98), 3);
        assert_eq!(assign_score(100, 100, 4, 0.98), 0);
        assert_eq!(assign_score(0, 0, 4, 0.98), 0);
    }

    fn trial(force: f64, moment: f64, slipping: bool) -> Trial {
        Trial { run: 3, family: ShapeFamily::Patch, force: Some(force), moment: Some(moment), slipping, error: None }
    }

    #[test]
    fn report_lines() {
        assert_eq!(trial(0., 0.001, false).to_string(), "--- Run #3 (patch): ✔");
        assert_eq!(
            trial(0.5, 0.001, true).to_string(),
            "--- Run #3 (patch): ⚠ |F| = 0.5 > 0.01; ⚠ slippage detected!; ",
        );
        let failed = Trial { force: None, moment: None, error: Some("boom".to_string()), ..trial(0., 0., false) };
        assert_eq!(failed.to_string(), "--- Run #3 (patch): ⚠ solve failed: boom");
        assert!(!failed.force_ok() && !failed.moment_ok() && !failed.grip_ok());
    }

    #[test]
    fn family_score() {
        let trials = vec![trial(0., 0., false), trial(0.02, 0., false), trial(0., 0., true), trial(0., 0.5, false)];
        let score = FamilyScore::new(ShapeFamily::Circle, trials);
        assert_eq!(score.force, Criterion { passed: 3, points: 3 });
        assert_eq!(score.moment, Criterion { passed: 3, points: 3 });
        assert_eq!(score.grip, Criterion { passed: 3, points: 3 });
        assert_eq!(score.points(), 9);
        assert_eq!(score.summary()[2], "slippage checks successful 3 / 4 ➡ 3 points granted");
    }

    #[test]
    fn circles_mostly_pass() {
        let score = score_family(&GraspConfig::default(), ShapeFamily::Circle, 10, 0);
        assert_eq!(score.trials.len(), 10);
        assert!(score.trials.windows(2).all(|w| w[0].run + 1 == w[1].run));
        assert!(score.force.passed >= 8, "{:?}", score.force);
        assert!(score.moment.passed >= 8, "{:?}", score.moment);
        assert!(score.grip.passed >= 8, "{:?}", score.grip);
    }
}
