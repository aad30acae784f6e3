//! Primary inoculum: initial inoculation and contamination from sources outside the canopy

use crate::allocation;
use crate::emission::{interception, rapilly_splash_dus};
use crate::transport::{scatter, LayerTransport, SplashTransport};
use alep_core::canopy::Canopy;
use alep_core::dispersal_unit::DispersalUnit;
use alep_core::errors::AlepResult;
use alep_core::fungus::{FloatValue, Fungus};
use alep_core::models::{ContaminationModel, DispersalUnits, InoculationModel, InoculumSource};
use alep_core::weather::WeatherWindow;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Spread a stock of dispersal units uniformly over the emerged leaves
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RandomInoculation;

impl InoculationModel for RandomInoculation {
    fn allocate(
        &self,
        canopy: &Canopy,
        stock: Vec<DispersalUnit>,
        label: &str,
        rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits> {
        let leaves = canopy.leaves(label);
        let mut deposits = DispersalUnits::new();
        if leaves.is_empty() {
            return Ok(deposits);
        }
        let probabilities = vec![1.0 / leaves.len() as FloatValue; leaves.len()];
        for du in stock {
            scatter(du, &leaves, &probabilities, &mut deposits, rng);
        }
        Ok(deposits)
    }
}

/// Septoria inoculum lying on the soil as infected debris.
///
/// Rain drops hitting the debris splash dispersal units up. The amount follows the same
/// Rapilly splash law as the emission by lesions, with the sporulating fraction of the soil
/// in place of the sporulating fraction of the leaves.
#[derive(Debug, Clone)]
pub struct SoilInoculum {
    pub fungus: Arc<Fungus>,
    /// Fraction of the soil surface covered by sporulating debris
    pub sporulating_fraction: FloatValue,
    /// Extinction coefficient of rain in the canopy
    pub k: FloatValue,
    pub label: String,
}

impl SoilInoculum {
    pub fn new(fungus: Arc<Fungus>, sporulating_fraction: FloatValue, label: &str) -> Self {
        Self {
            fungus,
            sporulating_fraction,
            k: 0.65,
            label: label.to_string(),
        }
    }
}

impl InoculumSource for SoilInoculum {
    fn emission(
        &self,
        canopy: &Canopy,
        weather: &WeatherWindow,
        _rng: &mut dyn RngCore,
    ) -> Vec<DispersalUnit> {
        let rain = weather.mean_rain();
        if rain <= 0.0 {
            return vec![];
        }
        let intercept = interception(
            self.k,
            canopy.total_leaf_area(&self.label),
            canopy.domain_area,
        );
        let nb_dus = rapilly_splash_dus(
            intercept,
            self.sporulating_fraction,
            rain,
            canopy.domain_area,
        )
        .floor() as u64;
        allocation::emitted(&self.fungus, nb_dus, Some(0.0))
    }
}

/// Deposits soil-borne units on the leaves by splash from the ground
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilContamination {
    pub splash: SplashTransport,
}

impl ContaminationModel for SoilContamination {
    fn contaminate(
        &self,
        canopy: &Canopy,
        dus: Vec<DispersalUnit>,
        _weather: &WeatherWindow,
        label: &str,
        rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits> {
        let leaves = canopy.leaves(label);
        let mut deposits = DispersalUnits::new();
        if leaves.is_empty() {
            return Ok(deposits);
        }
        let probabilities = self.splash.landing_probabilities(canopy, &leaves, 0.0)?;
        for du in dus {
            scatter(du, &leaves, &probabilities, &mut deposits, rng);
        }
        Ok(deposits)
    }
}

/// Airborne spores coming from outside the field, falling on the canopy through its layers.
///
/// Used both as the source of the spores and as the model depositing them.
#[derive(Debug, Clone)]
pub struct AirborneContamination {
    pub fungus: Arc<Fungus>,
    /// Dispersal units reaching the top of the canopy per m² of soil at each contamination
    pub density_dispersal_units: FloatValue,
    pub transport: LayerTransport,
}

impl AirborneContamination {
    pub fn new(
        fungus: Arc<Fungus>,
        density_dispersal_units: FloatValue,
        layer_thickness: FloatValue,
    ) -> Self {
        Self {
            fungus,
            density_dispersal_units,
            transport: LayerTransport {
                layer_thickness,
                ..Default::default()
            },
        }
    }
}

impl InoculumSource for AirborneContamination {
    fn emission(
        &self,
        canopy: &Canopy,
        _weather: &WeatherWindow,
        _rng: &mut dyn RngCore,
    ) -> Vec<DispersalUnit> {
        let nb_dus = (self.density_dispersal_units * canopy.domain_area)
            .round()
            .max(0.0) as u64;
        allocation::emitted(&self.fungus, nb_dus, None)
    }
}

impl ContaminationModel for AirborneContamination {
    fn contaminate(
        &self,
        canopy: &Canopy,
        dus: Vec<DispersalUnit>,
        _weather: &WeatherWindow,
        label: &str,
        rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits> {
        let layers = self.transport.layers(canopy, label)?;
        let mut deposits = DispersalUnits::new();
        for du in dus {
            self.transport
                .deposit_from_top(canopy, &layers, du, &mut deposits, rng)?;
        }
        Ok(deposits)
    }
}
