use log::{debug, trace};

use crate::{
    feature::{FeatureList, SortMode},
    value::GradientFunction,
};

use super::{merge_replacing, DecayingTraces, ETraceConfig, ETraces};

/// Eligibility traces over the weights of a [`GradientFunction`]
///
/// The trace is a single sparse vector keyed by weight index that accumulates the gradients of
/// visited states. It is kept sorted by magnitude so that both threshold pruning and the capacity
/// limit only ever drop entries from the back.
#[derive(Debug, Clone)]
pub struct GradientETraces {
    config: ETraceConfig,
    traces: FeatureList,
    gradient: FeatureList,
}

impl GradientETraces {
    /// **Panics** if `lambda` or `gamma` is not in the interval `[0,1]`
    pub fn new(config: ETraceConfig) -> Self {
        config.validate();
        Self {
            config,
            traces: FeatureList::with_mode(0, SortMode::AbsFactor),
            gradient: FeatureList::new(),
        }
    }

    pub fn config(&self) -> &ETraceConfig {
        &self.config
    }

    /// Mutable access for learners that change λ or γ between episodes
    pub fn config_mut(&mut self) -> &mut ETraceConfig {
        &mut self.config
    }

    /// The stored traces, largest magnitude first
    pub fn traces(&self) -> &FeatureList {
        &self.traces
    }

    /// Merge `factor * gradient` into the traces
    ///
    /// Accumulating traces add the contribution. Replacing traces keep the larger magnitude when
    /// the signs agree and add otherwise.
    pub fn add_gradient_etrace(&mut self, gradient: &FeatureList, factor: f64) {
        for feature in gradient {
            let incoming = factor * feature.factor;
            if self.config.replacing {
                let existing = self.traces.factor(feature.index);
                let merged = merge_replacing(existing, incoming);
                if merged != existing {
                    self.traces.set(feature.index, merged);
                }
            } else {
                self.traces.update(feature.index, incoming);
            }
        }

        let excess = self.traces.len().saturating_sub(self.config.max_list_size);
        if excess > 0 {
            for _ in 0..excess {
                self.traces.pop_back();
            }
            trace!("Dropped {excess} gradient traces over capacity");
        }
    }

    /// Multiply every trace by `factor` and drop the ones below the threshold
    pub fn mult_etrace(&mut self, factor: f64) {
        self.traces.mult_factor(factor);
        let mut dropped = 0;
        while self
            .traces
            .back()
            .is_some_and(|feature| feature.factor.abs() < self.config.threshold)
        {
            self.traces.pop_back();
            dropped += 1;
        }
        if dropped > 0 {
            trace!("Dropped {dropped} gradient traces below threshold");
        }
    }
}

impl From<ETraceConfig> for GradientETraces {
    fn from(config: ETraceConfig) -> Self {
        Self::new(config)
    }
}

impl DecayingTraces for GradientETraces {
    fn reset_etraces(&mut self) {
        debug!("Resetting {} gradient traces", self.traces.len());
        self.traces.clear();
    }

    fn update_etraces(&mut self, duration: u32) {
        self.mult_etrace(self.config.decay_factor(duration));
    }

    fn len(&self) -> usize {
        self.traces.len()
    }
}

impl<F, S> ETraces<F, S> for GradientETraces
where
    F: GradientFunction<S> + ?Sized,
    S: ?Sized,
{
    fn add_etrace(&mut self, function: &F, state: &S, factor: f64) {
        let mut gradient = std::mem::take(&mut self.gradient);
        function.get_gradient(state, &mut gradient);
        self.add_gradient_etrace(&gradient, factor);
        self.gradient = gradient;
    }

    fn update_v_function(&self, function: &mut F, td: f64) {
        function.update_weights(&self.traces, td);
    }
}
