use std::collections::VecDeque;

use log::{debug, trace};

use crate::value::StateValueFunction;

use super::{merge_replacing, DecayingTraces, ETraceConfig, ETraces};

/// Eligibility traces that keep copies of the visited states
///
/// The most general engine: it only needs a [`StateValueFunction`], so it works for value
/// functions without weights or gradients, at the price of storing every state and updating the
/// function once per stored state.
///
/// States are kept newest first next to a parallel list of trace factors. With replacing traces a
/// revisited state merges into its existing entry instead of being stored twice.
#[derive(Debug, Clone)]
pub struct StateETraces<S> {
    config: ETraceConfig,
    states: VecDeque<S>,
    factors: VecDeque<f64>,
}

impl<S> StateETraces<S> {
    /// **Panics** if `lambda` or `gamma` is not in the interval `[0,1]`
    pub fn new(config: ETraceConfig) -> Self {
        config.validate();
        Self {
            config,
            states: VecDeque::new(),
            factors: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ETraceConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ETraceConfig {
        &mut self.config
    }

    /// Iterate over the stored states and their trace factors, newest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&S, f64)> + '_ {
        self.states.iter().zip(self.factors.iter().copied())
    }

    /// Get the trace factor stored for `state`, or `0.0` if the state is not in the history
    pub fn factor(&self, state: &S) -> f64
    where
        S: PartialEq,
    {
        self.position(state).map_or(0.0, |i| self.factors[i])
    }

    /// Record a copy of `state` with weight `factor`
    pub fn add_state_etrace(&mut self, state: &S, factor: f64)
    where
        S: Clone + PartialEq,
    {
        match self.position(state) {
            Some(i) if self.config.replacing => {
                self.factors[i] = merge_replacing(self.factors[i], factor);
            }
            _ => {
                self.states.push_front(state.clone());
                self.factors.push_front(factor);
            }
        }

        let mut dropped = 0;
        while self.states.len() > self.config.max_list_size {
            self.remove_smallest();
            dropped += 1;
        }
        if dropped > 0 {
            trace!("Dropped {dropped} state traces over capacity");
        }
    }

    /// Multiply every trace by `factor` and drop the ones below the threshold
    pub fn mult_etrace(&mut self, factor: f64) {
        let before = self.states.len();
        let mut kept = 0;
        for i in 0..before {
            self.factors[i] *= factor;
            if self.factors[i].abs() >= self.config.threshold {
                self.states.swap(kept, i);
                self.factors.swap(kept, i);
                kept += 1;
            }
        }
        self.states.truncate(kept);
        self.factors.truncate(kept);
        let dropped = before - kept;
        if dropped > 0 {
            trace!("Dropped {dropped} state traces below threshold");
        }
    }

    fn position(&self, state: &S) -> Option<usize>
    where
        S: PartialEq,
    {
        self.states.iter().position(|s| s == state)
    }

    fn remove_smallest(&mut self) {
        let smallest = self
            .factors
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
            .map(|(i, _)| i);
        if let Some(i) = smallest {
            self.states.remove(i);
            self.factors.remove(i);
        }
    }
}

impl<S> From<ETraceConfig> for StateETraces<S> {
    fn from(config: ETraceConfig) -> Self {
        Self::new(config)
    }
}

impl<S> DecayingTraces for StateETraces<S> {
    fn reset_etraces(&mut self) {
        debug!("Resetting {} state traces", self.states.len());
        self.states.clear();
        self.factors.clear();
    }

    fn update_etraces(&mut self, duration: u32) {
        self.mult_etrace(self.config.decay_factor(duration));
    }

    fn len(&self) -> usize {
        self.states.len()
    }
}

impl<F, S> ETraces<F, S> for StateETraces<S>
where
    F: StateValueFunction<S> + ?Sized,
    S: Clone + PartialEq,
{
    fn add_etrace(&mut self, _function: &F, state: &S, factor: f64) {
        self.add_state_etrace(state, factor);
    }

    fn update_v_function(&self, function: &mut F, td: f64) {
        for (state, factor) in self.iter() {
            function.update_value(state, td * factor);
        }
    }
}
