/// An episodic environment a value function can be learned in
///
/// Episodes start with [`reset`](Environment::reset) and end when [`step`](Environment::step)
/// returns no next state.
pub trait Environment {
    /// A representation of the state of the environment to be passed to the learner
    type State;

    /// A representation of an action that can be taken to affect the environment
    type Action;

    /// Update the environment in response to an action, producing a new state and associated reward
    ///
    /// **Returns** `(next_state, reward)`, where `next_state` is `None` once the episode is over
    fn step(&mut self, action: Self::Action) -> (Option<Self::State>, f64);

    /// Reset the environment to an initial state
    ///
    /// **Returns** the state
    fn reset(&mut self) -> Self::State;
}
