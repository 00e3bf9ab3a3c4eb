// Demo binary: fits a small ReLU network to y = [x0 + x1, x0 - x1].
// All neural network logic lives in the library (src/lib.rs and its modules).
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dense_ann::{Matrix, Network, Result, Sample};

fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    if let Err(e) = run() {
        eprintln!("dense-ann: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(2024);

    let mut make_set = |n: usize| -> Result<Vec<Sample>> {
        (0..n)
            .map(|_| -> Result<Sample> {
                let (a, b) = (rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
                Ok((Matrix::column(&[a, b])?, Matrix::column(&[a + b, a - b])?))
            })
            .collect()
    };
    let train_set = make_set(256)?;
    let eval_set = make_set(64)?;

    let mut network = Network::new(&[2, 16, 2], &["ReLU", "linear"], &mut rng)?;
    network.configure("SGD", "MSE", 0.05)?;

    let history = network.train_model(&train_set, &eval_set, 30, 8)?;
    if let Some(last) = history.last() {
        info!(train_loss = last.train_loss, eval_loss = ?last.eval_loss, "training finished");
    }

    let probe = Matrix::column(&[0.3, -0.2])?;
    let out = network.predict(&probe)?;
    info!(
        y0 = out.get(0, 0)?,
        y1 = out.get(1, 0)?,
        "prediction for [0.3, -0.2] (expected [0.1, 0.5])"
    );
    Ok(())
}
