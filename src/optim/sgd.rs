use crate::{error::Result, layers::dense::Layer};

pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate }
    }

    /// Applies one SGD update to a layer from its accumulated gradients:
    /// `W -= lr·dW_acc`, `b -= lr·db_acc`.
    pub fn step(&self, layer: &mut Layer) -> Result<()> {
        layer.apply_gradients(self.learning_rate)
    }
}
