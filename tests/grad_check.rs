//! Finite-difference check of the hand-derived backprop gradients.

use dense_ann::{Matrix, Network};
use rand::rngs::StdRng;
use rand::SeedableRng;

const EPSILON: f64 = 1e-5;
const TOLERANCE: f64 = 1e-6;

fn col(values: &[f64]) -> Matrix {
    Matrix::column(values).unwrap()
}

fn loss_at(net: &Network, input: &Matrix, target: &Matrix) -> f64 {
    let mut probe = net.clone();
    probe.forward(input).unwrap();
    probe.calculate_loss(target).unwrap()
}

fn assert_close(analytic: f64, numeric: f64, what: &str) {
    let scale = 1.0_f64.max(analytic.abs()).max(numeric.abs());
    assert!(
        (analytic - numeric).abs() <= TOLERANCE * scale,
        "{what}: analytic {analytic:.9}, numeric {numeric:.9}"
    );
}

/// Compares every accumulated weight and bias gradient of a single-sample
/// backprop against a central difference of the loss.
fn check_gradients(mut net: Network, input: &Matrix, target: &Matrix) {
    net.reset_gradients();
    net.forward(input).unwrap();
    net.calculate_loss(target).unwrap();
    net.backprop().unwrap();

    for layer in 0..net.num_layers() {
        let weights = net.weights(layer).unwrap().clone();
        for r in 0..weights.rows() {
            for c in 0..weights.cols() {
                let original = weights.get(r, c).unwrap();
                let mut probe = net.clone();

                let mut plus = weights.clone();
                plus.set(r, c, original + EPSILON).unwrap();
                probe.set_weights(layer, &plus).unwrap();
                let loss_plus = loss_at(&probe, input, target);

                let mut minus = weights.clone();
                minus.set(r, c, original - EPSILON).unwrap();
                probe.set_weights(layer, &minus).unwrap();
                let loss_minus = loss_at(&probe, input, target);

                let numeric = (loss_plus - loss_minus) / (2.0 * EPSILON);
                let analytic = net.weight_gradients(layer).unwrap().get(r, c).unwrap();
                assert_close(analytic, numeric, &format!("dW[{layer}][{r},{c}]"));
            }
        }

        let biases = net.biases(layer).unwrap().clone();
        for r in 0..biases.rows() {
            let original = biases.get(r, 0).unwrap();
            let mut probe = net.clone();

            let mut plus = biases.clone();
            plus.set(r, 0, original + EPSILON).unwrap();
            probe.set_biases(layer, &plus).unwrap();
            let loss_plus = loss_at(&probe, input, target);

            let mut minus = biases.clone();
            minus.set(r, 0, original - EPSILON).unwrap();
            probe.set_biases(layer, &minus).unwrap();
            let loss_minus = loss_at(&probe, input, target);

            let numeric = (loss_plus - loss_minus) / (2.0 * EPSILON);
            let analytic = net.bias_gradients(layer).unwrap().get(r, 0).unwrap();
            assert_close(analytic, numeric, &format!("db[{layer}][{r}]"));
        }
    }
}

fn network(sizes: &[usize], activations: &[&str], seed: u64) -> Network {
    Network::new(sizes, activations, &mut StdRng::seed_from_u64(seed)).unwrap()
}

#[test]
fn sigmoid_tanh_stack_with_mse() {
    let mut net = network(&[3, 4, 3, 2], &["sigmoid", "tanh", "linear"], 1);
    net.configure("SGD", "MSE", 0.1).unwrap();
    check_gradients(net, &col(&[0.5, -1.0, 0.25]), &col(&[0.3, -0.7]));
}

#[test]
fn relu_stack_with_mse() {
    let mut net = network(&[2, 5, 2], &["ReLU", "linear"], 2);
    net.configure("SGD", "MSE", 0.1).unwrap();
    check_gradients(net, &col(&[0.8, -0.3]), &col(&[1.0, 2.0]));
}

#[test]
fn softmax_output_with_cross_entropy() {
    let mut net = network(&[3, 4, 3], &["tanh", "softmax"], 3);
    net.configure("SGD", "Cross_Entropy", 0.1).unwrap();
    check_gradients(net, &col(&[0.2, 0.4, -0.6]), &col(&[0.0, 0.0, 1.0]));
}

#[test]
fn sigmoid_output_with_cross_entropy() {
    let mut net = network(&[2, 3, 2], &["tanh", "sigmoid"], 4);
    net.configure("SGD", "Cross_Entropy", 0.1).unwrap();
    check_gradients(net, &col(&[1.0, -0.5]), &col(&[1.0, 0.0]));
}

#[test]
fn hidden_softmax_uses_full_jacobian() {
    let mut net = network(&[3, 4, 2], &["softmax", "linear"], 5);
    net.configure("SGD", "MSE", 0.1).unwrap();
    check_gradients(net, &col(&[1.0, 0.5, -1.5]), &col(&[0.25, -0.5]));
}
