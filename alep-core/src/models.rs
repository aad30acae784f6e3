//! Interfaces of the pluggable models driven by the disease protocol
//!
//! Each protocol step loops over the organs of the canopy and delegates the biology to one
//! of these traits. Implementations live in the `alep-models` crate.
//!
//! Randomness is passed as `&mut dyn RngCore` so that every trait stays object safe and
//! models can be chosen at runtime.

use crate::canopy::{Canopy, Organ, VertexId};
use crate::dispersal_unit::DispersalUnit;
use crate::errors::AlepResult;
use crate::fungus::FloatValue;
use crate::weather::WeatherWindow;
use rand::RngCore;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Dispersal units per organ, either emitted by its lesions or deposited on it
pub type DispersalUnits = BTreeMap<VertexId, Vec<DispersalUnit>>;

/// Positions a stock of inoculum on the canopy
pub trait InoculationModel: Debug {
    fn allocate(
        &self,
        canopy: &Canopy,
        stock: Vec<DispersalUnit>,
        label: &str,
        rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits>;
}

/// Decides how many dispersal units of a group succeed once infection conditions are met
pub trait InfectionControl: Debug {
    fn successes(&self, du: &DispersalUnit, leaf: &Organ, rng: &mut dyn RngCore) -> u64;
}

/// Arbitrates the growth demand of the lesions against the space left on each leaf.
///
/// Growth controllers are selected from configuration files, hence the tagged serialisation.
#[typetag::serde(tag = "type")]
pub trait GrowthControl: Debug + Send + Sync {
    /// Grant growth to the lesions of every organ matching `label` and refresh the healthy
    /// surface of these organs.
    fn control(&self, canopy: &mut Canopy, label: &str) -> AlepResult<()>;
}

/// Computes the dispersal units released by the lesions of a fungus
pub trait EmissionModel: Debug {
    /// Emitted dispersal units, keyed by emitting organ.
    ///
    /// Emitting lesions have their stock reduced accordingly.
    fn get_dispersal_units(
        &self,
        canopy: &mut Canopy,
        fungus_name: &str,
        label: &str,
        weather: &WeatherWindow,
    ) -> AlepResult<DispersalUnits>;
}

/// Moves emitted dispersal units to the organs they land on
pub trait TransportModel: Debug {
    /// Deposits keyed by target organ. Units that land nowhere are dropped.
    fn disperse(
        &self,
        canopy: &Canopy,
        emissions: DispersalUnits,
        label: &str,
        rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits>;
}

/// Removes deposited dispersal units by rain
pub trait WashingModel: Debug {
    /// Store a washing rate on every organ matching `label`
    fn compute_washing_rate(
        &self,
        canopy: &mut Canopy,
        global_rain_intensity: FloatValue,
        label: &str,
    );

    /// Inactivate (part of) a group of dispersal units given the washing rate of its leaf
    fn wash(&self, du: &mut DispersalUnit, washing_rate: FloatValue, rng: &mut dyn RngCore);
}

/// A source of inoculum outside the canopy (soil debris, air)
pub trait InoculumSource: Debug {
    fn emission(
        &self,
        canopy: &Canopy,
        weather: &WeatherWindow,
        rng: &mut dyn RngCore,
    ) -> Vec<DispersalUnit>;
}

/// Deposits the inoculum of an external source onto the canopy
pub trait ContaminationModel: Debug {
    fn contaminate(
        &self,
        canopy: &Canopy,
        dus: Vec<DispersalUnit>,
        weather: &WeatherWindow,
        label: &str,
        rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits>;
}
