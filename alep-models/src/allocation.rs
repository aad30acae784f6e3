//! Random allocation of groups of dispersal units

use alep_core::dispersal_unit::DispersalUnit;
use alep_core::fungus::{FloatValue, Fungus};
use rand::RngCore;
use rand_distr::{Binomial, Distribution};
use std::sync::Arc;

/// Number of successes among `n` trials of probability `p`
pub fn binomial(n: u64, p: FloatValue, rng: &mut dyn RngCore) -> u64 {
    if n == 0 || p <= 0.0 {
        return 0;
    }
    if p >= 1.0 {
        return n;
    }
    match Binomial::new(n, p) {
        Ok(distribution) => distribution.sample(rng),
        Err(_) => 0,
    }
}

/// Split `n` units between outcomes of probabilities `probabilities`.
///
/// Probabilities summing to less than one leave the remaining units unallocated.
pub fn multinomial(n: u64, probabilities: &[FloatValue], rng: &mut dyn RngCore) -> Vec<u64> {
    let mut remaining = n;
    let mut remaining_probability = 1.0;
    let mut counts = Vec::with_capacity(probabilities.len());
    for p in probabilities {
        let p = p.max(0.0);
        let conditional = if remaining_probability > 0.0 {
            (p / remaining_probability).min(1.0)
        } else {
            0.0
        };
        let count = binomial(remaining, conditional, rng);
        counts.push(count);
        remaining -= count;
        remaining_probability -= p;
    }
    counts
}

/// Probabilities proportional to `weights`, scaled to sum to `total`
pub fn proportional(weights: &[FloatValue], total: FloatValue) -> Vec<FloatValue> {
    let sum: FloatValue = weights.iter().map(|w| w.max(0.0)).sum();
    if sum <= 0.0 {
        return vec![0.0; weights.len()];
    }
    weights.iter().map(|w| w.max(0.0) / sum * total).collect()
}

/// Newly emitted dispersal units, grouped or not according to the fungus
pub fn emitted(fungus: &Arc<Fungus>, n: u64, position: Option<FloatValue>) -> Vec<DispersalUnit> {
    if n == 0 {
        return vec![];
    }
    if fungus.parameters.group_dus {
        vec![DispersalUnit::emitted(fungus.clone(), n, position)]
    } else {
        (0..n)
            .map(|_| DispersalUnit::emitted(fungus.clone(), 1, position))
            .collect()
    }
}
