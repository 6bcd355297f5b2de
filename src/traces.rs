mod feature;
mod gradient;
mod state;

pub use feature::FeatureETraces;
pub use gradient::GradientETraces;
pub use state::StateETraces;

use crate::assert_interval;

/// Configuration shared by all eligibility trace engines
#[derive(Debug, Clone, PartialEq)]
pub struct ETraceConfig {
    /// Trace decay λ, in `[0, 1]`
    ///
    /// **Default**: `0.9`
    pub lambda: f64,
    /// Discount factor γ, in `[0, 1]`
    ///
    /// **Default**: `0.95`
    pub gamma: f64,
    /// Use replacing instead of accumulating traces
    ///
    /// **Default**: `true`
    pub replacing: bool,
    /// Entries whose magnitude decays below this value are dropped
    ///
    /// **Default**: `0.001`
    pub threshold: f64,
    /// Upper bound on the number of stored entries, the smallest ones are dropped first
    ///
    /// **Default**: `1000`
    pub max_list_size: usize,
}

impl Default for ETraceConfig {
    fn default() -> Self {
        Self {
            lambda: 0.9,
            gamma: 0.95,
            replacing: true,
            threshold: 0.001,
            max_list_size: 1000,
        }
    }
}

impl ETraceConfig {
    /// **Panics** if `lambda` or `gamma` is not in the interval `[0,1]`
    pub fn validate(&self) {
        assert_interval!(self.lambda, 0.0, 1.0);
        assert_interval!(self.gamma, 0.0, 1.0);
    }

    /// **Panics** if `lambda` is not in the interval `[0,1]`
    pub fn set_lambda(&mut self, lambda: f64) {
        assert_interval!(lambda, 0.0, 1.0);
        self.lambda = lambda;
    }

    /// **Panics** if `gamma` is not in the interval `[0,1]`
    pub fn set_gamma(&mut self, gamma: f64) {
        assert_interval!(gamma, 0.0, 1.0);
        self.gamma = gamma;
    }

    pub fn set_replacing(&mut self, replacing: bool) {
        self.replacing = replacing;
    }

    /// Multiplier applied to every trace after `duration` steps: `(λγ)^duration`
    pub fn decay_factor(&self, duration: u32) -> f64 {
        (self.lambda * self.gamma).powf(f64::from(duration))
    }
}

/// Storage-side half of an eligibility trace engine: decay, reset and size
///
/// Split from [`ETraces`] because none of these operations depend on the function or state type.
pub trait DecayingTraces {
    /// Drop all stored traces
    fn reset_etraces(&mut self);

    /// Decay every trace by `(λγ)^duration` and drop the ones that fall below the threshold
    fn update_etraces(&mut self, duration: u32);

    /// Number of stored traces
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An eligibility trace engine
///
/// Traces remember recently visited states (or their gradients) with a decaying weight, so a
/// temporal difference error can be propagated back over the recent history in one step.
///
/// A learner drives an engine once per step:
/// 1. [`update_etraces`](DecayingTraces::update_etraces) decays the stored traces
/// 2. [`add_etrace`](ETraces::add_etrace) records the current state
/// 3. [`update_v_function`](ETraces::update_v_function) applies the TD error through the traces
///
/// and calls [`reset_etraces`](DecayingTraces::reset_etraces) at episode boundaries.
///
/// ### Generics
/// - `F` - The function the traces write into
/// - `S` - The state type
pub trait ETraces<F: ?Sized, S: ?Sized>: DecayingTraces {
    /// Record `state` with weight `factor`, merging with an existing trace of the same state or weight
    fn add_etrace(&mut self, function: &F, state: &S, factor: f64);

    /// Apply `td * trace` to `function` for every stored trace
    fn update_v_function(&self, function: &mut F, td: f64);
}

/// Replacing-trace merge rule
///
/// With the same sign the larger magnitude is kept, with opposite signs the contributions offset
/// each other and are summed.
pub(crate) fn merge_replacing(existing: f64, incoming: f64) -> f64 {
    if existing * incoming > 0.0 {
        if incoming.abs() > existing.abs() {
            incoming
        } else {
            existing
        }
    } else {
        existing + incoming
    }
}
