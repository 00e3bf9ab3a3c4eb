/// Where a network sits in its forward / backward / update cycle.
///
/// ```text
/// Constructed -> Configured -> ForwardComplete -> LossComputed
///                                   ^                  |
///                                   |                  v
///                               Updated <------ BackpropComplete
/// ```
///
/// `forward` is allowed from every state. `calculate_loss` needs activations
/// cached from the current weights, `backprop` needs a freshly seeded output
/// error. Gradient bookkeeping (`reset`/`average`/`clip`) does not move the
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Constructed,
    Configured,
    ForwardComplete,
    LossComputed,
    BackpropComplete,
    Updated,
}

impl NetworkState {
    /// True when the cached activations were produced by the current weights.
    pub fn has_forward_cache(&self) -> bool {
        matches!(
            self,
            NetworkState::ForwardComplete
                | NetworkState::LossComputed
                | NetworkState::BackpropComplete
        )
    }
}
