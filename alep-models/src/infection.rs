use crate::allocation::binomial;
use alep_core::canopy::Organ;
use alep_core::dispersal_unit::DispersalUnit;
use alep_core::fungus::FloatValue;
use alep_core::models::InfectionControl;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Infection success of biotrophic fungi, which need living tissue.
///
/// Each unit of a group succeeds with probability `proba_inf * healthy_surface / area`.
/// With `age_infection`, the probability is further reduced by the senesced fraction of the
/// leaf.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BiotrophDUProbaModel {
    pub age_infection: bool,
}

impl BiotrophDUProbaModel {
    pub fn probability(&self, du: &DispersalUnit, leaf: &Organ) -> FloatValue {
        if leaf.area <= 0.0 {
            return 0.0;
        }
        let mut probability =
            du.fungus().parameters.proba_inf * leaf.healthy_surface / leaf.area;
        if self.age_infection {
            probability *= 1.0 - leaf.senesced_fraction();
        }
        probability.clamp(0.0, 1.0)
    }
}

impl InfectionControl for BiotrophDUProbaModel {
    fn successes(&self, du: &DispersalUnit, leaf: &Organ, rng: &mut dyn RngCore) -> u64 {
        binomial(du.nb_dispersal_units, self.probability(du, leaf), rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fungi::brown_rust;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn leaf(healthy: FloatValue, senesced: FloatValue) -> Organ {
        let mut leaf = Organ::leaf(1, 1, 1);
        leaf.area = 10.0;
        leaf.green_area = 10.0 - senesced;
        leaf.senesced_area = senesced;
        leaf.healthy_surface = healthy;
        leaf
    }

    #[test]
    fn probability_follows_healthy_surface() {
        let du = DispersalUnit::emitted(brown_rust(), 1, None);
        let model = BiotrophDUProbaModel::default();
        assert_relative_eq!(model.probability(&du, &leaf(5.0, 0.0)), 0.5);
        assert_eq!(model.probability(&du, &Organ::leaf(1, 1, 1)), 0.0);

        let aged = BiotrophDUProbaModel {
            age_infection: true,
        };
        assert_relative_eq!(aged.probability(&du, &leaf(5.0, 5.0)), 0.25);
    }

    #[test]
    fn fully_healthy_leaf_accepts_every_unit() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let du = DispersalUnit::emitted(brown_rust(), 20, None);
        let model = BiotrophDUProbaModel::default();
        assert_eq!(model.successes(&du, &leaf(10.0, 0.0), &mut rng), 20);
        assert_eq!(model.successes(&du, &leaf(0.0, 0.0), &mut rng), 0);
    }
}
