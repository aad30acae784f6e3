//! Transport of emitted dispersal units to the organs they land on

use crate::allocation::{multinomial, proportional};
use crate::emission::interception;
use alep_core::canopy::{Canopy, VertexId};
use alep_core::dispersal_unit::DispersalUnit;
use alep_core::errors::{AlepError, AlepResult};
use alep_core::fungus::FloatValue;
use alep_core::models::{DispersalUnits, TransportModel};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Split a group between targets; groups of zero units are dropped
pub(crate) fn scatter(
    mut du: DispersalUnit,
    targets: &[VertexId],
    probabilities: &[FloatValue],
    deposits: &mut DispersalUnits,
    rng: &mut dyn RngCore,
) {
    let counts = multinomial(du.nb_dispersal_units, probabilities, rng);
    for (vid, count) in targets.iter().zip(counts) {
        if count > 0 {
            deposits.entry(*vid).or_default().push(du.split(count));
        }
    }
}

/// Every emitted unit lands on a leaf drawn uniformly among the emerged leaves
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomDispersal;

impl TransportModel for RandomDispersal {
    fn disperse(
        &self,
        canopy: &Canopy,
        emissions: DispersalUnits,
        label: &str,
        rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits> {
        let leaves = canopy.leaves(label);
        let mut deposits = DispersalUnits::new();
        if leaves.is_empty() {
            return Ok(deposits);
        }
        let probabilities = vec![1.0 / leaves.len() as FloatValue; leaves.len()];
        for du in emissions.into_values().flatten() {
            scatter(du, &leaves, &probabilities, &mut deposits, rng);
        }
        Ok(deposits)
    }
}

/// Rain splash transport.
///
/// Splashed droplets are intercepted by the canopy following Beer-Lambert. Intercepted units
/// land on the leaves with a weight proportional to leaf area that decays exponentially with
/// the vertical distance to the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplashTransport {
    /// Extinction coefficient of the canopy
    pub k: FloatValue,
    /// Vertical distance (cm) over which the splash weight decreases by a factor e
    pub decay_length: FloatValue,
}

impl Default for SplashTransport {
    fn default() -> Self {
        Self {
            k: 0.65,
            decay_length: 10.0,
        }
    }
}

impl SplashTransport {
    /// Landing probabilities on `leaves` of units splashed from `source_height`
    pub fn landing_probabilities(
        &self,
        canopy: &Canopy,
        leaves: &[VertexId],
        source_height: FloatValue,
    ) -> AlepResult<Vec<FloatValue>> {
        let mut weights = Vec::with_capacity(leaves.len());
        let mut total_area = 0.0;
        for vid in leaves {
            let leaf = canopy.node(*vid)?;
            total_area += leaf.area;
            let distance = (leaf.height - source_height).abs();
            weights.push(leaf.area * (-distance / self.decay_length).exp());
        }
        let intercepted = interception(self.k, total_area, canopy.domain_area);
        Ok(proportional(&weights, intercepted))
    }
}

impl TransportModel for SplashTransport {
    fn disperse(
        &self,
        canopy: &Canopy,
        emissions: DispersalUnits,
        label: &str,
        rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits> {
        if self.decay_length <= 0.0 {
            return Err(AlepError::invalid_parameter(
                "decay_length",
                "must be positive",
            ));
        }
        let leaves = canopy.leaves(label);
        let mut deposits = DispersalUnits::new();
        if leaves.is_empty() {
            return Ok(deposits);
        }
        for (source, dus) in emissions {
            let source_height = canopy.node(source)?.height;
            for du in dus {
                let height = du.position.unwrap_or(source_height);
                let probabilities = self.landing_probabilities(canopy, &leaves, height)?;
                scatter(du, &leaves, &probabilities, &mut deposits, rng);
            }
        }
        Ok(deposits)
    }
}

/// Transport through horizontal layers of the canopy.
///
/// Spores fall from the top of the canopy. Each layer of `layer_thickness` intercepts a
/// Beer-Lambert fraction of the spores reaching it, shared between its leaves in proportion
/// to their area. Spores crossing every layer are lost to the soil.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerTransport {
    pub k: FloatValue,
    /// Thickness of a layer (cm)
    pub layer_thickness: FloatValue,
}

impl Default for LayerTransport {
    fn default() -> Self {
        Self {
            k: 0.65,
            layer_thickness: 1.0,
        }
    }
}

impl LayerTransport {
    /// Leaves of each layer, from the top of the canopy down
    pub fn layers(&self, canopy: &Canopy, label: &str) -> AlepResult<Vec<Vec<VertexId>>> {
        if self.layer_thickness <= 0.0 {
            return Err(AlepError::invalid_parameter(
                "layer_thickness",
                "must be positive",
            ));
        }
        let top = canopy.max_height(label);
        let mut layers: Vec<Vec<VertexId>> = Vec::new();
        for vid in canopy.leaves(label) {
            let depth = ((top - canopy.node(vid)?.height) / self.layer_thickness).floor();
            let index = depth.max(0.0) as usize;
            if layers.len() <= index {
                layers.resize(index + 1, Vec::new());
            }
            layers[index].push(vid);
        }
        Ok(layers)
    }

    /// Deposit a group of units falling from the top of the canopy
    pub fn deposit_from_top(
        &self,
        canopy: &Canopy,
        layers: &[Vec<VertexId>],
        du: DispersalUnit,
        deposits: &mut DispersalUnits,
        rng: &mut dyn RngCore,
    ) -> AlepResult<()> {
        let mut remaining = du;
        for layer in layers.iter().filter(|l| !l.is_empty()) {
            if remaining.nb_dispersal_units == 0 {
                break;
            }
            let areas = layer
                .iter()
                .map(|vid| canopy.node(*vid).map(|leaf| leaf.area))
                .collect::<AlepResult<Vec<_>>>()?;
            let layer_area: FloatValue = areas.iter().sum();
            let intercepted = interception(self.k, layer_area, canopy.domain_area);
            let probabilities = proportional(&areas, intercepted);
            let counts = multinomial(remaining.nb_dispersal_units, &probabilities, rng);
            for (vid, count) in layer.iter().zip(counts) {
                if count > 0 {
                    deposits.entry(*vid).or_default().push(remaining.split(count));
                }
            }
        }
        Ok(())
    }
}

impl TransportModel for LayerTransport {
    fn disperse(
        &self,
        canopy: &Canopy,
        emissions: DispersalUnits,
        label: &str,
        rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits> {
        let layers = self.layers(canopy, label)?;
        let mut deposits = DispersalUnits::new();
        for du in emissions.into_values().flatten() {
            self.deposit_from_top(canopy, &layers, du, &mut deposits, rng)?;
        }
        Ok(deposits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fungi::septoria;
    use alep_core::canopy::{Organ, LEAF_LABEL};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Leaves of 10 cm² at 10, 20 and 30 cm on a 10 cm² domain
    fn canopy() -> (Canopy, Vec<VertexId>) {
        let mut canopy = Canopy::new(((0.0, 0.0), (0.01, 0.001)));
        let root = canopy.root();
        let leaves = (1..=3)
            .map(|rank| {
                let mut leaf = Organ::leaf(1, rank, 3);
                leaf.area = 10.0;
                leaf.green_area = 10.0;
                leaf.height = 10.0 * rank as f64;
                canopy.add_child(root, leaf).unwrap()
            })
            .collect();
        (canopy, leaves)
    }

    fn emissions(source: VertexId, n: u64) -> DispersalUnits {
        let mut emissions = DispersalUnits::new();
        emissions.insert(source, vec![DispersalUnit::emitted(septoria(), n, None)]);
        emissions
    }

    fn deposited(deposits: &DispersalUnits, vid: VertexId) -> u64 {
        deposits
            .get(&vid)
            .map(|dus| dus.iter().map(|du| du.nb_dispersal_units).sum())
            .unwrap_or(0)
    }

    #[test]
    fn random_dispersal_keeps_every_unit() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (canopy, leaves) = canopy();
        let deposits = RandomDispersal
            .disperse(&canopy, emissions(leaves[0], 300), LEAF_LABEL, &mut rng)
            .unwrap();
        let total: u64 = leaves.iter().map(|vid| deposited(&deposits, *vid)).sum();
        assert_eq!(total, 300);
    }

    #[test]
    fn splash_favours_close_leaves() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (canopy, leaves) = canopy();
        let deposits = SplashTransport::default()
            .disperse(&canopy, emissions(leaves[0], 10_000), LEAF_LABEL, &mut rng)
            .unwrap();
        let near = deposited(&deposits, leaves[0]);
        let far = deposited(&deposits, leaves[2]);
        assert!(near > far);
        let total: u64 = leaves.iter().map(|vid| deposited(&deposits, *vid)).sum();
        assert!(total <= 10_000);
    }

    #[test]
    fn layers_from_the_top() {
        let (canopy, leaves) = canopy();
        let transport = LayerTransport {
            layer_thickness: 15.0,
            ..Default::default()
        };
        let layers = transport.layers(&canopy, LEAF_LABEL).unwrap();
        assert_eq!(layers, vec![vec![leaves[2], leaves[1]], vec![leaves[0]]]);

        let invalid = LayerTransport {
            layer_thickness: 0.0,
            ..Default::default()
        };
        assert!(invalid.layers(&canopy, LEAF_LABEL).is_err());
    }

    #[test]
    fn upper_layers_intercept_first() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (canopy, leaves) = canopy();
        let deposits = LayerTransport::default()
            .disperse(&canopy, emissions(leaves[0], 10_000), LEAF_LABEL, &mut rng)
            .unwrap();
        assert!(deposited(&deposits, leaves[2]) > deposited(&deposits, leaves[0]));
    }
}
