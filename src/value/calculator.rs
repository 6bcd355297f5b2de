use crate::feature::FeatureList;

use super::{FeatureCalculator, FeatureSpace};

/// One feature per discrete state, active with factor `1.0`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabularCalculator {
    num_states: usize,
}

impl TabularCalculator {
    pub fn new(num_states: usize) -> Self {
        Self { num_states }
    }
}

impl FeatureSpace for TabularCalculator {
    fn num_features(&self) -> usize {
        self.num_states
    }
}

impl FeatureCalculator<usize> for TabularCalculator {
    fn get_features(&self, state: &usize, features: &mut FeatureList) {
        assert!(
            *state < self.num_states,
            "State {state} out of range for {} states",
            self.num_states
        );
        features.clear();
        features.set(*state, 1.0);
    }
}

/// Gaussian radial basis functions on an evenly spaced 1-D grid
///
/// Activations below the cut-off are left out of the feature list, so only the centres near the
/// state are active.
#[derive(Debug, Clone, PartialEq)]
pub struct RbfCalculator {
    centers: Vec<f64>,
    sigma: f64,
    min_activation: f64,
    normalized: bool,
}

impl RbfCalculator {
    /// Place `count` centres evenly on `[low, high]`, each with width `sigma`
    ///
    /// **Panics** if `count` is zero or `sigma` is not positive
    pub fn new(low: f64, high: f64, count: usize, sigma: f64) -> Self {
        assert!(count > 0, "An RBF grid needs at least one centre");
        assert!(sigma > 0.0, "Invalid value for `sigma`. Must be positive.");
        let centers = if count == 1 {
            vec![(low + high) / 2.0]
        } else {
            let step = (high - low) / (count - 1) as f64;
            (0..count).map(|i| low + i as f64 * step).collect()
        };
        Self {
            centers,
            sigma,
            min_activation: 1e-3,
            normalized: false,
        }
    }

    /// Drop activations below `min_activation` (default `1e-3`)
    pub fn with_min_activation(mut self, min_activation: f64) -> Self {
        self.min_activation = min_activation;
        self
    }

    /// Scale the active features so they sum to one
    pub fn normalized(mut self) -> Self {
        self.normalized = true;
        self
    }

    pub fn centers(&self) -> &[f64] {
        &self.centers
    }
}

impl FeatureSpace for RbfCalculator {
    fn num_features(&self) -> usize {
        self.centers.len()
    }
}

impl FeatureCalculator<f64> for RbfCalculator {
    fn get_features(&self, state: &f64, features: &mut FeatureList) {
        features.clear();
        let width = 2.0 * self.sigma * self.sigma;
        for (i, center) in self.centers.iter().enumerate() {
            let activation = (-(state - center).powi(2) / width).exp();
            if activation >= self.min_activation {
                features.set(i, activation);
            }
        }
        if self.normalized && !features.is_empty() {
            features.normalize();
        }
    }
}

/// Gives every action its own block of the inner calculator's features
///
/// The feature set of `(state, action)` is the inner feature set of `state` shifted by
/// `action * inner.num_features()`, so one weight table holds a separate linear function per action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionFeatureCalculator<C> {
    inner: C,
    num_actions: usize,
}

impl<C: FeatureSpace> ActionFeatureCalculator<C> {
    pub fn new(inner: C, num_actions: usize) -> Self {
        Self { inner, num_actions }
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: FeatureSpace> FeatureSpace for ActionFeatureCalculator<C> {
    fn num_features(&self) -> usize {
        self.inner.num_features() * self.num_actions
    }
}

impl<S, C> FeatureCalculator<(S, usize)> for ActionFeatureCalculator<C>
where
    C: FeatureCalculator<S>,
{
    fn get_features(&self, (state, action): &(S, usize), features: &mut FeatureList) {
        assert!(
            *action < self.num_actions,
            "Action {action} out of range for {} actions",
            self.num_actions
        );
        self.inner.get_features(state, features);
        features.add_index_offset(action * self.inner.num_features());
    }
}
