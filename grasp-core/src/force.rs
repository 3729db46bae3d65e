use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::geometry::perimeter::wrap_angle;

/// A force applied at perimeter parameter `t`, split into its component along the inward normal
/// (`fn`, positive pushes into the object) and along the tangent (`ft`, positive in the direction
/// of increasing `t`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Force<D = f64> {
    pub t: D,
    #[serde(rename = "fn")]
    pub normal: D,
    #[serde(rename = "ft")]
    pub tangential: D,
}

impl<D> Force<D> {
    pub fn new(t: D, normal: D, tangential: D) -> Self {
        Force { t, normal, tangential }
    }
}

impl Force {
    /// Same force with `t` wrapped into `[0, 2π)`.
    pub fn wrapped(&self) -> Force {
        Force { t: wrap_angle(self.t), ..*self }
    }

    pub fn is_finite(&self) -> bool {
        self.t.is_finite() && self.normal.is_finite() && self.tangential.is_finite()
    }
}

impl Display for Force {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Force {{ t: {:.4}, fn: {:.4}, ft: {:.4} }}", self.t, self.normal, self.tangential)
    }
}
