mod calculator;
mod linear;

pub use calculator::{ActionFeatureCalculator, RbfCalculator, TabularCalculator};
pub use linear::LinearFunction;

use crate::feature::FeatureList;

/// Anything addressed through a fixed number of features or weights
pub trait FeatureSpace {
    fn num_features(&self) -> usize;
}

/// Maps a state to its sparse feature activations
pub trait FeatureCalculator<S: ?Sized>: FeatureSpace {
    /// Write the active features of `state` into `features`, which is cleared first
    fn get_features(&self, state: &S, features: &mut FeatureList);
}

/// A value function that can be read and nudged state by state
pub trait StateValueFunction<S: ?Sized> {
    fn get_value(&self, state: &S) -> f64;

    /// Move the value of `state` by `delta`
    fn update_value(&mut self, state: &S, delta: f64);
}

/// A parametric function exposing its gradient with respect to its weights
pub trait GradientFunction<S: ?Sized> {
    fn num_weights(&self) -> usize;

    /// Write the gradient at `state` into `gradient`, keyed by weight index. `gradient` is cleared first.
    fn get_gradient(&self, state: &S, gradient: &mut FeatureList);

    /// Add `factor * gradient` to the weights
    fn update_weights(&mut self, gradient: &FeatureList, factor: f64);
}
