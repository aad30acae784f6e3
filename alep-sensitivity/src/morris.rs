//! Method of Morris (Morris, 1991)
//!
//! Each trajectory starts at a random point of a `num_levels` grid of the unit hypercube and
//! moves one parameter at a time by `delta = grid_jump / (num_levels - 1)`. A trajectory of
//! `k` parameters has `k + 1` points and yields one elementary effect per parameter.
//!
//! The indices are `mu` (mean effect), `mu_star` (mean absolute effect, ranks the influence
//! of the parameter) and `sigma` (spread of the effects, high for interactions and
//! non-linearities).

use crate::parameter_set::ParameterSet;
use crate::{Error, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

/// Draw `num_trajectories` Morris trajectories, scaled to the parameter ranges.
///
/// Returns a matrix of `(k + 1) * num_trajectories` rows and `k` columns.
pub fn sample<R: Rng + ?Sized>(
    params: &ParameterSet,
    num_trajectories: usize,
    num_levels: usize,
    grid_jump: usize,
    rng: &mut R,
) -> Result<Array2<f64>> {
    let k = params.len();
    if k == 0 {
        return Err(Error::SamplingError("No parameter to sample".to_string()));
    }
    if num_trajectories == 0 {
        return Err(Error::SamplingError(
            "At least one trajectory is required".to_string(),
        ));
    }
    if num_levels < 2 {
        return Err(Error::SamplingError(format!(
            "num_levels must be at least 2, got {}",
            num_levels
        )));
    }
    if grid_jump == 0 || grid_jump >= num_levels {
        return Err(Error::SamplingError(format!(
            "grid_jump must be in [1, {}], got {}",
            num_levels - 1,
            grid_jump
        )));
    }

    let step = 1.0 / (num_levels - 1) as f64;
    let delta = grid_jump as f64 * step;
    // Starting levels from which a jump stays inside the grid
    let num_start_levels = num_levels - grid_jump;

    let mut unit = Array2::zeros(((k + 1) * num_trajectories, k));
    let mut order: Vec<usize> = (0..k).collect();
    for trajectory in 0..num_trajectories {
        let mut point: Vec<f64> = (0..k)
            .map(|_| rng.gen_range(0..num_start_levels) as f64 * step)
            .collect();
        let directions: Vec<f64> = (0..k)
            .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
            .collect();
        for (x, direction) in point.iter_mut().zip(&directions) {
            if *direction < 0.0 {
                *x += delta;
            }
        }
        order.shuffle(rng);

        let first = trajectory * (k + 1);
        for (j, x) in point.iter().enumerate() {
            unit[[first, j]] = *x;
        }
        for (i, factor) in order.iter().enumerate() {
            point[*factor] += directions[*factor] * delta;
            for (j, x) in point.iter().enumerate() {
                unit[[first + i + 1, j]] = *x;
            }
        }
    }
    params.scale_samples(&unit)
}

/// Sensitivity indices of each parameter, in the order of the parameter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorrisIndices {
    pub names: Vec<String>,
    pub mu: Vec<f64>,
    pub mu_star: Vec<f64>,
    pub sigma: Vec<f64>,
    /// Half-width of the bootstrap confidence interval of `mu_star`
    pub mu_star_conf: Vec<f64>,
}

impl MorrisIndices {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(|e| Error::io(path, e))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let indices = serde_json::from_reader(BufReader::new(file))?;
        Ok(indices)
    }

    /// Parameter names sorted by decreasing `mu_star`
    pub fn ranking(&self) -> Vec<&str> {
        let mut ranked: Vec<(&str, f64)> = self
            .names
            .iter()
            .map(String::as_str)
            .zip(self.mu_star.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.into_iter().map(|(name, _)| name).collect()
    }
}

/// Compute the Morris indices from the samples of [`sample`] and the model outputs.
///
/// Effects involving a non-finite output are skipped with a warning.
pub fn analyze<R: Rng + ?Sized>(
    params: &ParameterSet,
    samples: &Array2<f64>,
    outputs: &Array1<f64>,
    conf_level: f64,
    num_resamples: usize,
    rng: &mut R,
) -> Result<MorrisIndices> {
    let k = params.len();
    if samples.nrows() != outputs.len() {
        return Err(Error::AnalysisError(format!(
            "{} samples for {} outputs",
            samples.nrows(),
            outputs.len()
        )));
    }
    if k == 0 || samples.nrows() % (k + 1) != 0 {
        return Err(Error::AnalysisError(format!(
            "{} samples is not a whole number of trajectories of {} parameters",
            samples.nrows(),
            k
        )));
    }
    if !(conf_level > 0.0 && conf_level < 1.0) {
        return Err(Error::AnalysisError(format!(
            "conf_level must be in (0, 1), got {}",
            conf_level
        )));
    }
    let unit = params.unscale_samples(samples)?;

    let mut effects: Vec<Vec<f64>> = vec![Vec::new(); k];
    let mut nb_skipped = 0;
    for trajectory in 0..samples.nrows() / (k + 1) {
        let first = trajectory * (k + 1);
        for i in first..first + k {
            let (factor, change) = changed_factor(&unit, i);
            if change == 0.0 {
                return Err(Error::AnalysisError(format!(
                    "Rows {} and {} are identical",
                    i,
                    i + 1
                )));
            }
            let effect = (outputs[i + 1] - outputs[i]) / change;
            if effect.is_finite() {
                effects[factor].push(effect);
            } else {
                nb_skipped += 1;
            }
        }
    }
    if nb_skipped > 0 {
        warn!(nb_skipped, "elementary effects with missing outputs");
    }

    let z = Normal::new(0.0, 1.0)
        .map_err(|e| Error::AnalysisError(e.to_string()))?
        .inverse_cdf(0.5 + conf_level / 2.0);

    let mut indices = MorrisIndices {
        names: params.names(),
        mu: Vec::with_capacity(k),
        mu_star: Vec::with_capacity(k),
        sigma: Vec::with_capacity(k),
        mu_star_conf: Vec::with_capacity(k),
    };
    for factor_effects in &effects {
        let absolute: Vec<f64> = factor_effects.iter().map(|e| e.abs()).collect();
        indices.mu.push(mean(factor_effects));
        indices.mu_star.push(mean(&absolute));
        indices.sigma.push(std_dev(factor_effects));
        indices
            .mu_star_conf
            .push(z * bootstrap_std(&absolute, num_resamples, rng));
    }
    Ok(indices)
}

/// Parameter that changes between row `i` and the next one, with the size of the change
fn changed_factor(unit: &Array2<f64>, i: usize) -> (usize, f64) {
    let mut factor = 0;
    let mut change: f64 = 0.0;
    for j in 0..unit.ncols() {
        let d = unit[[i + 1, j]] - unit[[i, j]];
        if d.abs() > change.abs() {
            factor = j;
            change = d;
        }
    }
    (factor, change)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Standard deviation of the mean of `values` over bootstrap resamples
fn bootstrap_std<R: Rng + ?Sized>(values: &[f64], num_resamples: usize, rng: &mut R) -> f64 {
    if values.is_empty() || num_resamples < 2 {
        return f64::NAN;
    }
    let means: Vec<f64> = (0..num_resamples)
        .map(|_| {
            let resample: Vec<f64> = (0..values.len())
                .map(|_| values[rng.gen_range(0..values.len())])
                .collect();
            mean(&resample)
        })
        .collect();
    std_dev(&means)
}
