//! Competition of lesions for the healthy surface of their leaf
//!
//! Controllers are tagged for serialisation so that the competition rule of brown rust can be
//! chosen in its configuration file:
//!
//! ```toml
//! growth_control = { type = "PriorityGrowthControl" }
//! ```

use alep_core::canopy::Canopy;
use alep_core::errors::AlepResult;
use alep_core::fungus::FloatValue;
use alep_core::models::GrowthControl;
use alep_core::protocol;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Every lesion gets an equal share of the healthy surface when demand exceeds it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoPriorityGrowthControl;

#[typetag::serde]
impl GrowthControl for NoPriorityGrowthControl {
    fn control(&self, canopy: &mut Canopy, label: &str) -> AlepResult<()> {
        protocol::growth_control(canopy, label)
    }
}

/// The oldest lesions are served first until the healthy surface runs out
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityGrowthControl;

#[typetag::serde]
impl GrowthControl for PriorityGrowthControl {
    fn control(&self, canopy: &mut Canopy, label: &str) -> AlepResult<()> {
        for vid in canopy.vertices_with_label(label) {
            let organ = canopy.node_mut(vid)?;
            let mut order: Vec<usize> = (0..organ.lesions.len()).collect();
            order.sort_by(|a, b| {
                organ.lesions[*b]
                    .age_dd()
                    .partial_cmp(&organ.lesions[*a].age_dd())
                    .unwrap_or(Ordering::Equal)
            });
            let mut available = organ.healthy_surface;
            for index in order {
                let lesion = &mut organ.lesions[index];
                let granted = lesion.growth_demand().min(available).max(0.0);
                available -= granted;
                lesion.control_growth(granted);
            }
            organ.refresh_healthy_surface();
        }
        Ok(())
    }
}

/// Competition for space assuming lesions are scattered at random on the leaf.
///
/// The demand of each lesion is scaled by the probability `exp(-lesion_surface / area)` that
/// the surface it would colonise is still free, then shared without priority.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoissonCompetition;

impl PoissonCompetition {
    pub fn free_fraction(lesion_surface: FloatValue, area: FloatValue) -> FloatValue {
        if area <= 0.0 {
            return 0.0;
        }
        (-lesion_surface / area).exp()
    }
}

#[typetag::serde]
impl GrowthControl for PoissonCompetition {
    fn control(&self, canopy: &mut Canopy, label: &str) -> AlepResult<()> {
        canopy.for_each_organ_mut(label, |_, organ| {
            let free = Self::free_fraction(organ.lesion_surface(), organ.area);
            for lesion in organ.lesions.iter_mut() {
                let scaled = lesion.growth_demand() * free;
                lesion.growth_control(scaled);
            }
        });
        protocol::growth_control(canopy, label)
    }
}
