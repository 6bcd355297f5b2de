use std::cell::RefCell;

use crate::feature::{FeatureFunction, FeatureList};

use super::{FeatureCalculator, FeatureSpace, GradientFunction, StateValueFunction};

/// A linear approximator: the value of a state is the weighted sum of its active features
///
/// Since `∂V/∂w_i` is just the activation of feature `i`, the gradient of this function is its
/// feature list, which is what lets [`FeatureETraces`](crate::traces::FeatureETraces) skip the
/// gradient computation entirely.
///
/// ### Generics
/// - `C` - The [`FeatureCalculator`] turning states into feature lists
/// - `W` - Weight storage of the underlying [`FeatureFunction`], owned by default
#[derive(Debug, Clone)]
pub struct LinearFunction<C, W = Vec<f64>> {
    calculator: C,
    weights: FeatureFunction<W>,
    scratch: RefCell<FeatureList>,
}

impl<C: FeatureSpace> LinearFunction<C> {
    /// Constructs a function with one zero weight per feature of `calculator`
    pub fn new(calculator: C) -> Self {
        let weights = FeatureFunction::new(calculator.num_features());
        Self::from_parts(calculator, weights)
    }
}

impl<C, W> LinearFunction<C, W>
where
    C: FeatureSpace,
    W: AsRef<[f64]> + AsMut<[f64]>,
{
    /// **Panics** if the weight table and the calculator disagree on the number of features
    pub fn from_parts(calculator: C, weights: FeatureFunction<W>) -> Self {
        assert_eq!(
            calculator.num_features(),
            weights.num_features(),
            "calculator and weight table have the same number of features"
        );
        Self {
            calculator,
            weights,
            scratch: RefCell::new(FeatureList::new()),
        }
    }

    pub fn calculator(&self) -> &C {
        &self.calculator
    }

    pub fn weights(&self) -> &FeatureFunction<W> {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut FeatureFunction<W> {
        &mut self.weights
    }
}

impl<C, W> FeatureSpace for LinearFunction<C, W>
where
    C: FeatureSpace,
{
    fn num_features(&self) -> usize {
        self.calculator.num_features()
    }
}

impl<S, C, W> FeatureCalculator<S> for LinearFunction<C, W>
where
    S: ?Sized,
    C: FeatureCalculator<S>,
{
    fn get_features(&self, state: &S, features: &mut FeatureList) {
        self.calculator.get_features(state, features);
    }
}

impl<S, C, W> StateValueFunction<S> for LinearFunction<C, W>
where
    S: ?Sized,
    C: FeatureCalculator<S>,
    W: AsRef<[f64]> + AsMut<[f64]>,
{
    fn get_value(&self, state: &S) -> f64 {
        let mut features = self.scratch.borrow_mut();
        self.calculator.get_features(state, &mut features);
        self.weights.get_feature_list(&features)
    }

    fn update_value(&mut self, state: &S, delta: f64) {
        let features = self.scratch.get_mut();
        self.calculator.get_features(state, features);
        self.weights.update_feature_list(features, delta);
    }
}

impl<S, C, W> GradientFunction<S> for LinearFunction<C, W>
where
    S: ?Sized,
    C: FeatureCalculator<S>,
    W: AsRef<[f64]> + AsMut<[f64]>,
{
    fn num_weights(&self) -> usize {
        self.weights.num_features()
    }

    fn get_gradient(&self, state: &S, gradient: &mut FeatureList) {
        self.calculator.get_features(state, gradient);
    }

    fn update_weights(&mut self, gradient: &FeatureList, factor: f64) {
        self.weights.update_feature_list(gradient, factor);
    }
}
