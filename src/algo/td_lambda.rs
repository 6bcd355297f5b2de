use log::debug;

use crate::{
    assert_interval,
    env::Environment,
    traces::{ETraceConfig, ETraces},
    value::StateValueFunction,
};

/// Configuration for the [`TdLambda`] learner
#[derive(Debug, Clone, PartialEq)]
pub struct TdLambdaConfig {
    /// Learning rate
    ///
    /// **Default**: `0.1`
    pub alpha: f64,
    /// Trace configuration, its `gamma` is also the discount factor of the TD error
    pub traces: ETraceConfig,
}

impl Default for TdLambdaConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            traces: ETraceConfig::default(),
        }
    }
}

/// Policy evaluation with TD(λ)
///
/// Learns the state values of a fixed policy by propagating every one-step TD error
/// `r + γV(s') - V(s)` back over the eligibility traces of the recently visited states.
///
/// ### Generics
/// - `F` - The [`StateValueFunction`] being learned
/// - `T` - The [`ETraces`] engine, picked to match what `F` supports
pub struct TdLambda<F, T> {
    function: F,
    traces: T,
    alpha: f64,   // learning rate
    gamma: f64,   // discount factor
    episode: u32, // current episode
}

impl<F, T> TdLambda<F, T> {
    /// **Panics** if `alpha`, `lambda` or `gamma` is not in the interval `[0,1]`
    pub fn new(function: F, config: TdLambdaConfig) -> Self
    where
        T: From<ETraceConfig>,
    {
        assert_interval!(config.alpha, 0.0, 1.0);
        let gamma = config.traces.gamma;
        Self {
            function,
            traces: T::from(config.traces),
            alpha: config.alpha,
            gamma,
            episode: 0,
        }
    }

    pub fn function(&self) -> &F {
        &self.function
    }

    pub fn traces(&self) -> &T {
        &self.traces
    }

    /// Number of finished episodes
    pub fn episode(&self) -> u32 {
        self.episode
    }

    pub fn into_function(self) -> F {
        self.function
    }

    /// Run one episode of `env`, choosing actions with `policy` and updating the value function
    /// after every step
    ///
    /// **Returns** the undiscounted sum of rewards of the episode
    pub fn go<E, P>(&mut self, env: &mut E, mut policy: P) -> f64
    where
        E: Environment,
        P: FnMut(&E::State) -> E::Action,
        F: StateValueFunction<E::State>,
        T: ETraces<F, E::State>,
    {
        self.traces.reset_etraces();
        let mut state = env.reset();
        let mut total = 0.0;
        let mut steps = 0u32;
        loop {
            let action = policy(&state);
            let (next_state, reward) = env.step(action);
            total += reward;
            steps += 1;

            let next_value = next_state
                .as_ref()
                .map_or(0.0, |next| self.function.get_value(next));
            let td = reward + self.gamma * next_value - self.function.get_value(&state);

            self.traces.update_etraces(1);
            self.traces.add_etrace(&self.function, &state, 1.0);
            self.traces
                .update_v_function(&mut self.function, self.alpha * td);

            match next_state {
                Some(next) => state = next,
                None => break,
            }
        }

        self.episode += 1;
        debug!(
            "Episode {} finished after {steps} steps with reward {total}",
            self.episode
        );
        total
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        traces::{FeatureETraces, StateETraces},
        value::{LinearFunction, TabularCalculator},
    };

    /// Deterministic chain `0 -> 1 -> 2 -> end` with reward `1.0` on the last transition
    struct Chain {
        position: usize,
    }

    impl Environment for Chain {
        type State = usize;
        type Action = ();

        fn step(&mut self, _action: ()) -> (Option<usize>, f64) {
            self.position += 1;
            if self.position == 3 {
                (None, 1.0)
            } else {
                (Some(self.position), 0.0)
            }
        }

        fn reset(&mut self) -> usize {
            self.position = 0;
            0
        }
    }

    fn config(alpha: f64, lambda: f64) -> TdLambdaConfig {
        TdLambdaConfig {
            alpha,
            traces: ETraceConfig {
                lambda,
                gamma: 1.0,
                ..Default::default()
            },
        }
    }

    #[test]
    fn monte_carlo_limit_credits_every_state() {
        let v = LinearFunction::new(TabularCalculator::new(3));
        let mut learner = TdLambda::<_, FeatureETraces>::new(v, config(1.0, 1.0));

        let reward = learner.go(&mut Chain { position: 0 }, |_| ());
        assert_eq!(reward, 1.0, "episode reward returned");
        assert_eq!(learner.episode(), 1, "episode counted");
        for s in 0..3usize {
            assert_eq!(learner.function().get_value(&s), 1.0, "state {s} credited");
        }
    }

    #[test]
    fn one_step_limit_only_updates_last_state() {
        let v = LinearFunction::new(TabularCalculator::new(3));
        let mut learner = TdLambda::<_, StateETraces<usize>>::new(v, config(0.5, 0.0));

        learner.go(&mut Chain { position: 0 }, |_| ());
        let values = (0..3usize)
            .map(|s| learner.function().get_value(&s))
            .collect::<Vec<_>>();
        assert_eq!(values, [0.0, 0.0, 0.5], "TD(0) moves only the final state");
    }

    #[test]
    fn converges_on_chain() {
        let v = LinearFunction::new(TabularCalculator::new(3));
        let mut learner = TdLambda::<_, FeatureETraces>::new(v, config(0.2, 0.5));
        for _ in 0..200 {
            learner.go(&mut Chain { position: 0 }, |_| ());
        }
        for s in 0..3usize {
            assert_relative_eq!(learner.function().get_value(&s), 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    #[should_panic(expected = "Invalid value for `config.alpha`")]
    fn alpha_validated() {
        let v = LinearFunction::new(TabularCalculator::new(3));
        let _ = TdLambda::<_, FeatureETraces>::new(v, config(1.5, 0.5));
    }
}
