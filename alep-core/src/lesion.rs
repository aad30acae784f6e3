//! Lesions: localised infection sites growing on a leaf
//!
//! A [`Lesion`] represents a cohort of `nb_lesions` identical lesions.
//! All surfaces and the spore stock are totals for the cohort, which lets identical
//! lesions be grouped without changing any aggregate.
//!
//! The lesion tissue is stored as rings. A ring is created at the end of incubation
//! (with surface `Smin`) and every time the lesion grows. Each ring ages in thermal time and
//! goes through the chlorotic, necrotic and sporulating states before being emptied.

use crate::canopy::Organ;
use crate::fungus::{FloatValue, Fungus, SporulationMode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const AGE_TOLERANCE: FloatValue = 1e-9;

/// Development stage of a lesion, ordered from youngest to oldest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LesionStatus {
    Incubating,
    Chlorotic,
    Necrotic,
    Sporulating,
    Empty,
    Dead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ring {
    age_dd: FloatValue,
    surface: FloatValue,
    sporulating_dd: FloatValue,
}

impl Ring {
    fn new(surface: FloatValue) -> Self {
        Self {
            age_dd: 0.0,
            surface,
            sporulating_dd: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesion {
    fungus: Arc<Fungus>,
    nb_lesions: u64,
    age_dd: FloatValue,
    incubating: bool,
    surface_inc: FloatValue,
    rings: Vec<Ring>,
    surface_empty: FloatValue,
    stock_spores: FloatValue,
    nb_rain_events: u32,
    growth_demand: FloatValue,
    is_active: bool,
    /// Height of the lesion in the canopy (cm), if known
    pub position: Option<FloatValue>,
}

impl Lesion {
    /// Create a cohort of newly infected lesions
    pub fn new(fungus: Arc<Fungus>, nb_lesions: u64, position: Option<FloatValue>) -> Self {
        let surface_inc = fungus.parameters.smin * nb_lesions as FloatValue;
        Self {
            fungus,
            nb_lesions,
            age_dd: 0.0,
            incubating: true,
            surface_inc,
            rings: vec![],
            surface_empty: 0.0,
            stock_spores: 0.0,
            nb_rain_events: 0,
            growth_demand: 0.0,
            is_active: true,
            position,
        }
    }

    pub fn fungus(&self) -> &Arc<Fungus> {
        &self.fungus
    }

    pub fn fungus_name(&self) -> &str {
        &self.fungus.name
    }

    pub fn nb_lesions(&self) -> u64 {
        self.nb_lesions
    }

    pub fn age_dd(&self) -> FloatValue {
        self.age_dd
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn stock_spores(&self) -> FloatValue {
        self.stock_spores
    }

    pub fn nb_rain_events(&self) -> u32 {
        self.nb_rain_events
    }

    /// Surface the lesion wants to add during the current step
    pub fn growth_demand(&self) -> FloatValue {
        self.growth_demand
    }

    fn chlorosis_end(&self) -> FloatValue {
        self.fungus.parameters.degree_days_to_necrosis
    }

    fn sporulation_start(&self) -> FloatValue {
        let p = &self.fungus.parameters;
        p.degree_days_to_necrosis + p.degree_days_to_sporulation
    }

    pub fn surface_inc(&self) -> FloatValue {
        self.surface_inc
    }

    pub fn surface_chlo(&self) -> FloatValue {
        let end = self.chlorosis_end();
        self.rings
            .iter()
            .filter(|r| r.age_dd < end)
            .map(|r| r.surface)
            .sum()
    }

    pub fn surface_nec(&self) -> FloatValue {
        let (start, end) = (self.chlorosis_end(), self.sporulation_start());
        self.rings
            .iter()
            .filter(|r| r.age_dd >= start && r.age_dd < end)
            .map(|r| r.surface)
            .sum()
    }

    pub fn surface_spo(&self) -> FloatValue {
        let start = self.sporulation_start();
        self.rings
            .iter()
            .filter(|r| r.age_dd >= start)
            .map(|r| r.surface)
            .sum()
    }

    pub fn surface_empty(&self) -> FloatValue {
        self.surface_empty
    }

    /// Total surface occupied by the cohort, incubating tissue included
    pub fn surface(&self) -> FloatValue {
        self.surface_inc
            + self.rings.iter().map(|r| r.surface).sum::<FloatValue>()
            + self.surface_empty
    }

    /// Surface with visible symptoms
    pub fn surface_visible(&self) -> FloatValue {
        self.surface() - self.surface_inc
    }

    pub fn is_sporulating(&self) -> bool {
        self.surface_spo() > 0.0
    }

    pub fn status(&self) -> LesionStatus {
        if self.incubating {
            return LesionStatus::Incubating;
        }
        if self.surface_spo() > 0.0 {
            LesionStatus::Sporulating
        } else if self.surface_nec() > 0.0 {
            LesionStatus::Necrotic
        } else if self.surface_chlo() > 0.0 {
            LesionStatus::Chlorotic
        } else if self.surface_empty > 0.0 {
            LesionStatus::Empty
        } else {
            LesionStatus::Dead
        }
    }

    /// A lesion is dead once it holds neither tissue nor spores
    pub fn is_dead(&self) -> bool {
        !self.incubating && self.surface() <= 0.0 && self.stock_spores <= 0.0
    }

    /// Update the lesion over a time step, given the state of the leaf it sits on.
    ///
    /// Thermal time is computed from the leaf's `temperature_sequence` with the fungus base
    /// temperature. The lesion ages, ends incubation, fills its spore stock and computes the
    /// growth demand that the growth controller will arbitrate.
    pub fn update(&mut self, _dt: usize, leaf: &Organ) {
        self.growth_demand = 0.0;
        let params = self.fungus.parameters.clone();
        let senescent = leaf.area > 0.0
            && leaf.senesced_fraction() >= params.age_physio_switch_senescence;

        if senescent && params.sporulation_mode == SporulationMode::Continuous {
            // Biotrophs stop on senescent tissue
            self.is_active = false;
        }
        if !self.is_active {
            return;
        }

        let dd = params.degree_days(&leaf.microclimate.temperature_sequence);
        self.age_dd += dd;

        for i in 0..self.rings.len() {
            self.age_ring(i, dd);
        }

        if self.incubating {
            if self.age_dd + AGE_TOLERANCE < params.degree_days_to_chlorosis {
                return;
            }
            let overflow = (self.age_dd - params.degree_days_to_chlorosis).max(0.0);
            self.incubating = false;
            self.rings.push(Ring::new(self.surface_inc));
            self.surface_inc = 0.0;
            let last = self.rings.len() - 1;
            self.age_ring(last, overflow);
        }

        self.empty_exhausted_rings();

        if !senescent {
            let nb = self.nb_lesions as FloatValue;
            let room = params.smax * nb - self.surface();
            self.growth_demand = (params.growth_rate * dd * nb).min(room).max(0.0);
        }
    }

    fn age_ring(&mut self, index: usize, dd: FloatValue) {
        let start = self.sporulation_start();
        let params = &self.fungus.parameters;
        let ring = &mut self.rings[index];
        let before = ring.age_dd;
        ring.age_dd += dd;
        if ring.age_dd < start {
            return;
        }
        match params.sporulation_mode {
            SporulationMode::RainTriggered => {
                if before < start {
                    self.stock_spores += ring.surface
                        * params.density_dus_emitted
                        * params.nb_spores_by_du as FloatValue;
                }
            }
            SporulationMode::Continuous => {
                let sporulating_time = ring.age_dd - before.max(start);
                let remaining = (params.sporulating_duration - ring.sporulating_dd).max(0.0);
                let productive = sporulating_time.min(remaining);
                self.stock_spores += ring.surface * params.production_rate * productive;
                ring.sporulating_dd += sporulating_time;
            }
        }
    }

    fn empty_exhausted_rings(&mut self) {
        let duration = self.fungus.parameters.sporulating_duration;
        let mut emptied = 0.0;
        self.rings.retain(|r| {
            if r.sporulating_dd >= duration {
                emptied += r.surface;
                false
            } else {
                true
            }
        });
        self.surface_empty += emptied;
    }

    /// Limit the growth demand to at most `reduce_up_to`
    pub fn growth_control(&mut self, reduce_up_to: FloatValue) {
        self.growth_demand = self.growth_demand.min(reduce_up_to.max(0.0));
    }

    /// Apply the growth granted by the growth controller.
    ///
    /// The lesion grows by `min(granted, growth_demand)` as a new ring and its demand is reset.
    pub fn control_growth(&mut self, granted: FloatValue) {
        let growth = granted.min(self.growth_demand).max(0.0);
        if growth > 0.0 {
            self.rings.push(Ring::new(growth));
        }
        self.growth_demand = 0.0;
    }

    /// Whether spores can currently be released from the lesion
    pub fn is_stock_available(&self, leaf: &Organ) -> bool {
        let params = &self.fungus.parameters;
        if self.stock_spores < params.nb_spores_by_du as FloatValue {
            return false;
        }
        let climate = &leaf.microclimate;
        climate.rain_intensity > 0.0
            || climate
                .relative_humidity_sequence
                .last()
                .is_some_and(|rh| *rh >= params.rh_min)
    }

    pub fn reduce_stock(&mut self, nb_spores_emitted: FloatValue) {
        self.stock_spores = (self.stock_spores - nb_spores_emitted).max(0.0);
    }

    /// Empty the part of the sporulating surface matching the share of the stock emitted
    pub fn update_empty_surface(
        &mut self,
        nb_spores_emitted: FloatValue,
        initial_stock: FloatValue,
    ) {
        if initial_stock <= 0.0 {
            return;
        }
        let fraction = (nb_spores_emitted / initial_stock).clamp(0.0, 1.0);
        self.empty_sporulating_fraction(fraction);
    }

    fn empty_sporulating_fraction(&mut self, fraction: FloatValue) {
        let start = self.sporulation_start();
        let mut emptied = 0.0;
        for ring in self.rings.iter_mut().filter(|r| r.age_dd >= start) {
            let amount = ring.surface * fraction;
            ring.surface -= amount;
            emptied += amount;
        }
        self.rings.retain(|r| r.surface > 0.0);
        self.surface_empty += emptied;
    }

    /// Register a rain event on a sporulating lesion.
    ///
    /// Only lesions releasing their spores by rain are affected. After
    /// `nb_rain_events_to_empty` events the whole sporulating surface is emptied and the stock
    /// lost.
    pub fn register_rain_event(&mut self) {
        let params = self.fungus.parameters.clone();
        if params.sporulation_mode != SporulationMode::RainTriggered || !self.is_sporulating() {
            return;
        }
        self.nb_rain_events += 1;
        if self.nb_rain_events >= params.nb_rain_events_to_empty {
            self.empty_sporulating_fraction(1.0);
            self.stock_spores = 0.0;
        } else if params.reduction_by_rain > 0.0 {
            let fraction = params.reduction_by_rain.clamp(0.0, 1.0);
            self.empty_sporulating_fraction(fraction);
            self.stock_spores *= 1.0 - fraction;
        }
    }

    /// Two cohorts are duplicates when only their size differs
    pub fn is_duplicate_of(&self, other: &Lesion) -> bool {
        self.fungus.name == other.fungus.name
            && self.incubating == other.incubating
            && self.is_active == other.is_active
            && self.nb_rain_events == other.nb_rain_events
            && (self.age_dd - other.age_dd).abs() < AGE_TOLERANCE
            && self.rings.len() == other.rings.len()
            && self
                .rings
                .iter()
                .zip(other.rings.iter())
                .all(|(a, b)| (a.age_dd - b.age_dd).abs() < AGE_TOLERANCE)
    }

    /// Merge a duplicate cohort into this one
    pub fn merge(&mut self, other: Lesion) {
        self.nb_lesions += other.nb_lesions;
        self.surface_inc += other.surface_inc;
        self.surface_empty += other.surface_empty;
        self.stock_spores += other.stock_spores;
        self.growth_demand += other.growth_demand;
        for (ring, other_ring) in self.rings.iter_mut().zip(other.rings) {
            ring.surface += other_ring.surface;
        }
    }
}
