use crate::Result;
use ndarray::Array1;
use rayon::prelude::*;
use tracing::{info, warn};

/// A model evaluated at points of a design.
///
/// Evaluations are independent and run in parallel, so implementations must be `Sync`.
pub trait ModelRunner: Sync {
    /// Scalar output of the model for one row of the design
    fn run(&self, params: &[f64]) -> Result<f64>;

    /// Evaluate every row in parallel.
    ///
    /// A failed evaluation is logged and yields `NaN`, leaving the other rows unaffected.
    fn run_batch(&self, param_sets: &[Vec<f64>]) -> Array1<f64> {
        info!(n_evaluations = param_sets.len(), "running model batch");
        param_sets
            .par_iter()
            .enumerate()
            .map(|(index, params)| match self.run(params) {
                Ok(output) => output,
                Err(error) => {
                    warn!(index, %error, "evaluation failed");
                    f64::NAN
                }
            })
            .collect::<Vec<f64>>()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Quadratic;

    impl ModelRunner for Quadratic {
        fn run(&self, params: &[f64]) -> Result<f64> {
            match params {
                [x] if *x >= 0.0 => Ok(x * x),
                _ => Err(Error::ModelError("negative input".to_string())),
            }
        }
    }

    #[test]
    fn test_failures_become_nan() {
        let outputs = Quadratic.run_batch(&[vec![2.0], vec![-1.0], vec![3.0]]);
        assert_eq!(outputs[0], 4.0);
        assert!(outputs[1].is_nan());
        assert_eq!(outputs[2], 9.0);
    }
}
