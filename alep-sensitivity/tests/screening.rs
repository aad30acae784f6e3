//! Morris screening of analytical models, from sampling to indices.

use alep_sensitivity::io::{read_matrix, write_matrix};
use alep_sensitivity::{morris, Error, ModelRunner, MorrisIndices, ParameterSet, Result};
use approx::assert_relative_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// `y = 2 a - 0.5 c`, `b` has no effect
struct Linear;

impl ModelRunner for Linear {
    fn run(&self, params: &[f64]) -> Result<f64> {
        match params {
            [a, _b, c] => Ok(2.0 * a - 0.5 * c),
            _ => Err(Error::ModelError(format!("expected 3 values, got {}", params.len()))),
        }
    }
}

fn parameters() -> ParameterSet {
    let mut params = ParameterSet::new();
    params
        .add("a", 0.0, 10.0)
        .unwrap()
        .add("b", 1.0, 2.0)
        .unwrap()
        .add("c", 4.0, 0.0)
        .unwrap();
    params
}

#[test]
fn linear_effects_are_exact() {
    let params = parameters();
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let samples = morris::sample(&params, 8, 6, 3, &mut rng).unwrap();
    assert_eq!(samples.dim(), (4 * 8, 3));

    let rows: Vec<Vec<f64>> = samples.rows().into_iter().map(|r| r.to_vec()).collect();
    let outputs = Linear.run_batch(&rows);
    let indices = morris::analyze(&params, &samples, &outputs, 0.95, 200, &mut rng).unwrap();

    // effects are measured on the unit interval of each range
    assert_relative_eq!(indices.mu[0], 20.0, epsilon = 1e-9);
    assert_relative_eq!(indices.mu_star[0], 20.0, epsilon = 1e-9);
    assert_relative_eq!(indices.sigma[0], 0.0, epsilon = 1e-9);
    assert_relative_eq!(indices.mu_star[1], 0.0, epsilon = 1e-9);
    // c decreases along its inverted range, so its effect is positive
    assert_relative_eq!(indices.mu[2], 2.0, epsilon = 1e-9);
    assert_eq!(indices.ranking(), vec!["a", "c", "b"]);
}

#[test]
fn failed_evaluations_are_skipped() {
    let params = parameters();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let samples = morris::sample(&params, 4, 4, 2, &mut rng).unwrap();
    let mut rows: Vec<Vec<f64>> = samples.rows().into_iter().map(|r| r.to_vec()).collect();
    rows[1].pop();

    let outputs = Linear.run_batch(&rows);
    assert!(outputs[1].is_nan());
    assert_eq!(outputs.iter().filter(|v| v.is_nan()).count(), 1);

    let indices = morris::analyze(&params, &samples, &outputs, 0.95, 100, &mut rng).unwrap();
    assert_relative_eq!(indices.mu_star[0], 20.0, epsilon = 1e-9);
}

#[test]
fn workflow_through_files() {
    let tmp = tempfile::tempdir().unwrap();
    let params = parameters();
    params.write_range_file(tmp.path().join("ranges.txt")).unwrap();

    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let samples = morris::sample(&params, 3, 4, 2, &mut rng).unwrap();
    write_matrix(tmp.path().join("input.txt"), &samples).unwrap();

    let params = ParameterSet::read_range_file(tmp.path().join("ranges.txt")).unwrap();
    let samples = read_matrix(tmp.path().join("input.txt")).unwrap();
    let rows: Vec<Vec<f64>> = samples.rows().into_iter().map(|r| r.to_vec()).collect();
    let outputs = Linear.run_batch(&rows);
    let indices = morris::analyze(&params, &samples, &outputs, 0.9, 50, &mut rng).unwrap();

    let path = tmp.path().join("indices.json");
    indices.save(&path).unwrap();
    assert_eq!(MorrisIndices::load(&path).unwrap(), indices);
}
