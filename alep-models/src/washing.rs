use crate::allocation::binomial;
use alep_core::canopy::Canopy;
use alep_core::dispersal_unit::DispersalUnit;
use alep_core::fungus::FloatValue;
use alep_core::models::WashingModel;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Washing of deposited dispersal units by rain (Rapilly & Jolivet, 1976).
///
/// The probability for a deposited unit to be washed off follows a saturating function of
/// the rain intensity on the leaf.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RapillyWashing {
    /// Rain intensity (mm/h) washing half of the deposits
    pub half_saturation: FloatValue,
}

impl Default for RapillyWashing {
    fn default() -> Self {
        Self {
            half_saturation: 4.0,
        }
    }
}

impl RapillyWashing {
    pub fn rate(&self, rain_intensity: FloatValue) -> FloatValue {
        if rain_intensity <= 0.0 {
            return 0.0;
        }
        (rain_intensity / (rain_intensity + self.half_saturation)).clamp(0.0, 1.0)
    }
}

impl WashingModel for RapillyWashing {
    fn compute_washing_rate(
        &self,
        canopy: &mut Canopy,
        global_rain_intensity: FloatValue,
        label: &str,
    ) {
        canopy.for_each_organ_mut(label, |_, organ| {
            let rain = if organ.microclimate.rain_intensity > 0.0 {
                organ.microclimate.rain_intensity
            } else {
                global_rain_intensity
            };
            organ.washing_rate = self.rate(rain);
        });
    }

    fn wash(&self, du: &mut DispersalUnit, washing_rate: FloatValue, rng: &mut dyn RngCore) {
        let washed = binomial(du.nb_dispersal_units, washing_rate, rng);
        du.nb_dispersal_units -= washed;
        if du.nb_dispersal_units == 0 {
            du.disable();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fungi::septoria;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn washing_rate_saturates() {
        let washing = RapillyWashing::default();
        assert_eq!(washing.rate(0.0), 0.0);
        assert_relative_eq!(washing.rate(4.0), 0.5);
        assert!(washing.rate(1000.0) < 1.0);
    }

    #[test]
    fn washed_groups_are_disabled() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let washing = RapillyWashing::default();
        let mut du = DispersalUnit::emitted(septoria(), 50, None);
        washing.wash(&mut du, 1.0, &mut rng);
        assert_eq!(du.nb_dispersal_units, 0);
        assert!(!du.is_active());

        let mut du = DispersalUnit::emitted(septoria(), 50, None);
        washing.wash(&mut du, 0.0, &mut rng);
        assert_eq!(du.nb_dispersal_units, 50);
        assert!(du.is_active());
    }
}
