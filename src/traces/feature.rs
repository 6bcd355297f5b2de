use crate::{
    feature::FeatureList,
    value::{FeatureCalculator, GradientFunction},
};

use super::{DecayingTraces, ETraceConfig, ETraces, GradientETraces};

/// Gradient traces for linear approximators
///
/// The gradient of a linear function with respect to its weights is the feature activation of the
/// state, so the traces are fed straight from the function's [`FeatureCalculator`] instead of
/// asking for a gradient.
#[derive(Debug, Clone)]
pub struct FeatureETraces {
    inner: GradientETraces,
    features: FeatureList,
}

impl FeatureETraces {
    /// **Panics** if `lambda` or `gamma` is not in the interval `[0,1]`
    pub fn new(config: ETraceConfig) -> Self {
        Self {
            inner: GradientETraces::new(config),
            features: FeatureList::new(),
        }
    }

    pub fn config(&self) -> &ETraceConfig {
        self.inner.config()
    }

    pub fn config_mut(&mut self) -> &mut ETraceConfig {
        self.inner.config_mut()
    }

    /// The stored traces keyed by feature index, largest magnitude first
    pub fn traces(&self) -> &FeatureList {
        self.inner.traces()
    }

    /// Merge an active feature set into the traces, see [`GradientETraces::add_gradient_etrace`]
    pub fn add_feature_list(&mut self, features: &FeatureList, factor: f64) {
        self.inner.add_gradient_etrace(features, factor);
    }
}

impl From<ETraceConfig> for FeatureETraces {
    fn from(config: ETraceConfig) -> Self {
        Self::new(config)
    }
}

impl DecayingTraces for FeatureETraces {
    fn reset_etraces(&mut self) {
        self.inner.reset_etraces();
    }

    fn update_etraces(&mut self, duration: u32) {
        self.inner.update_etraces(duration);
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<F, S> ETraces<F, S> for FeatureETraces
where
    F: FeatureCalculator<S> + GradientFunction<S> + ?Sized,
    S: ?Sized,
{
    fn add_etrace(&mut self, function: &F, state: &S, factor: f64) {
        function.get_features(state, &mut self.features);
        self.inner.add_gradient_etrace(&self.features, factor);
    }

    fn update_v_function(&self, function: &mut F, td: f64) {
        function.update_weights(self.inner.traces(), td);
    }
}
