pub mod re;
pub mod trig;

use std::{fmt::Debug, ops::{Add, Div, Mul, Neg, Sub}};

use re::Re;
use trig::Trig;

/// Scalar accepted by the perimeter geometry and the equilibrium evaluator: `f64`, or `Dual` when
/// derivatives with respect to the inputs are wanted.
pub trait Scalar
: Clone
+ Debug
+ Re
+ Trig
+ Add<Output = Self>
+ Sub<Output = Self>
+ Mul<Output = Self>
+ Neg<Output = Self>
+ Add<f64, Output = Self>
+ Sub<f64, Output = Self>
+ Mul<f64, Output = Self>
+ Div<f64, Output = Self>
{}

impl<D
: Clone
+ Debug
+ Re
+ Trig
+ Add<Output = D>
+ Sub<Output = D>
+ Mul<Output = D>
+ Neg<Output = D>
+ Add<f64, Output = D>
+ Sub<f64, Output = D>
+ Mul<f64, Output = D>
+ Div<f64, Output = D>
> Scalar for D {}
