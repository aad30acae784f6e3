//! Dispersal units: packets of spores travelling between lesions and leaves

use crate::canopy::Organ;
use crate::fungus::{FloatValue, Fungus};
use crate::lesion::Lesion;
use crate::models::InfectionControl;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DuStatus {
    /// Released by a lesion or an inoculum source, not yet landed
    Emitted,
    /// Landed on a leaf
    Deposited,
}

/// A group of `nb_dispersal_units` identical dispersal units
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispersalUnit {
    fungus: Arc<Fungus>,
    pub nb_spores: u64,
    pub nb_dispersal_units: u64,
    pub status: DuStatus,
    active: bool,
    /// Height of the emitting lesion or of the landing point (cm)
    pub position: Option<FloatValue>,
    /// Consecutive favourable hours accumulated on the leaf
    favourable_hours: FloatValue,
    /// Hours spent on the leaf since deposit
    age_hours: FloatValue,
}

impl DispersalUnit {
    pub fn new(
        fungus: Arc<Fungus>,
        nb_spores: u64,
        nb_dispersal_units: u64,
        status: DuStatus,
        position: Option<FloatValue>,
    ) -> Self {
        Self {
            fungus,
            nb_spores,
            nb_dispersal_units,
            status,
            active: true,
            position,
            favourable_hours: 0.0,
            age_hours: 0.0,
        }
    }

    /// A group of freshly emitted units
    pub fn emitted(
        fungus: Arc<Fungus>,
        nb_dispersal_units: u64,
        position: Option<FloatValue>,
    ) -> Self {
        let nb_spores = fungus.parameters.nb_spores_by_du;
        Self::new(fungus, nb_spores, nb_dispersal_units, DuStatus::Emitted, position)
    }

    pub fn fungus(&self) -> &Arc<Fungus> {
        &self.fungus
    }

    pub fn fungus_name(&self) -> &str {
        &self.fungus.name
    }

    pub fn is_active(&self) -> bool {
        self.active && self.nb_dispersal_units > 0
    }

    pub fn deposited(&mut self) {
        self.status = DuStatus::Deposited;
    }

    pub fn disable(&mut self) {
        self.active = false;
    }

    pub fn favourable_hours(&self) -> FloatValue {
        self.favourable_hours
    }

    /// Split `n` units off this group, keeping the rest here
    pub fn split(&mut self, n: u64) -> DispersalUnit {
        let n = n.min(self.nb_dispersal_units);
        self.nb_dispersal_units -= n;
        let mut part = self.clone();
        part.nb_dispersal_units = n;
        part
    }

    /// Try to infect the leaf over a time step.
    ///
    /// The hourly weather of the step is read from the leaf microclimate. Favourable hours
    /// accumulate until `wd_min` is reached, at which point `control` decides how many of the
    /// grouped units succeed. The whole group is consumed by the attempt and successful units
    /// become a single lesion cohort. An unfavourable hour resets the count, and units that
    /// outlive `1 / loss_rate` hours are disabled.
    pub fn infect(
        &mut self,
        dt: usize,
        leaf: &Organ,
        control: &dyn InfectionControl,
        rng: &mut dyn RngCore,
    ) -> Option<Lesion> {
        if !self.is_active() {
            return None;
        }
        let params = &self.fungus.parameters;
        let climate = &leaf.microclimate;
        let hours = dt.min(climate.temperature_sequence.len());
        let lifetime = params.du_lifetime();

        for hour in 0..hours {
            let temperature = climate.temperature_sequence[hour];
            let wet = climate.wetness_sequence.get(hour).copied().unwrap_or(false);
            let relative_humidity = climate
                .relative_humidity_sequence
                .get(hour)
                .copied()
                .unwrap_or(0.0);

            if params.is_favourable(temperature, wet, relative_humidity) {
                self.favourable_hours += 1.0;
            } else {
                self.favourable_hours = 0.0;
            }
            self.age_hours += 1.0;

            if self.favourable_hours >= params.wd_min.max(1.0) {
                let successes = control.successes(self, leaf, rng);
                self.disable();
                if successes == 0 {
                    return None;
                }
                return Some(Lesion::new(self.fungus.clone(), successes, self.position));
            }
            if self.age_hours >= lifetime {
                self.disable();
                return None;
            }
        }
        None
    }

    /// Two groups are duplicates when only their size differs
    pub fn is_duplicate_of(&self, other: &DispersalUnit) -> bool {
        self.fungus.name == other.fungus.name
            && self.nb_spores == other.nb_spores
            && self.status == other.status
            && self.active == other.active
            && self.favourable_hours == other.favourable_hours
            && self.age_hours == other.age_hours
    }

    pub fn merge(&mut self, other: DispersalUnit) {
        self.nb_dispersal_units += other.nb_dispersal_units;
    }
}
