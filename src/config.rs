//! Configuration of the simulations, read from TOML files
//!
//! Every field has a default, so a configuration file only lists what differs:
//!
//! ```toml
//! year = 2004
//! variety = "Mercia"
//! competition = "simple"
//!
//! [fungus]
//! Smax = 0.5
//! ```

use alep_core::errors::{AlepError, AlepResult};
use alep_core::fungus::{FloatValue, Fungus};
use alep_core::models::GrowthControl;
use alep_core::weather::DATE_FORMAT;
use alep_models::growth_control::PoissonCompetition;
use alep_models::transport::SplashTransport;
use alep_models::washing::RapillyWashing;
use alep_models::wheat::{ScenarioScales, Variety, WheatParameters, WheatStand};
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Read a configuration from a TOML file
pub fn from_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> AlepResult<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| AlepError::io(path, e))?;
    toml::from_str(&content)
        .map_err(|e| AlepError::Config(format!("{}: {}", path.display(), e)))
}

/// Parameters shared by every simulated campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Harvest year; the crop is sown the year before
    pub year: i32,
    pub variety: Variety,
    /// Sowing day as `MM-DD`
    pub sowing_date: String,
    pub nplants: usize,
    /// Sectors per leaf
    pub nsect: usize,
    /// Thermal time between two growth iterations of the canopy
    pub canopy_delay_dday: FloatValue,
    /// Base temperature of the thermal time driving the canopy and the schedules
    pub t_base: FloatValue,
    /// Scales applied to the canopy of the `Custom` variety
    pub scales: ScenarioScales,
    /// Directory of the stored canopy reconstructions, none to grow the canopy every time
    pub wheat_dir: Option<PathBuf>,
    pub seed: u64,
    pub nreps: usize,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            year: 2013,
            variety: Variety::Tremie13,
            sowing_date: "10-29".to_string(),
            nplants: 15,
            nsect: 7,
            canopy_delay_dday: 20.0,
            t_base: 0.0,
            scales: ScenarioScales::default(),
            wheat_dir: None,
            seed: 0,
            nreps: 5,
        }
    }
}

impl CampaignConfig {
    pub fn start_date(&self) -> AlepResult<NaiveDateTime> {
        let date = format!("{}-{} 12:00:00", self.year - 1, self.sowing_date);
        NaiveDateTime::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| AlepError::Config(format!("invalid sowing date '{}': {}", date, e)))
    }

    pub fn end_date(&self) -> AlepResult<NaiveDateTime> {
        let date = format!("{}-07-30 00:00:00", self.year);
        NaiveDateTime::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| AlepError::Config(format!("invalid end date '{}': {}", date, e)))
    }

    pub fn wheat_stand(&self) -> WheatStand {
        let parameters = match self.variety {
            Variety::Custom => WheatParameters::custom(self.scales.clone()),
            variety => WheatParameters::for_variety(variety),
        };
        WheatStand::new(parameters, self.nplants, self.nsect)
    }

    /// Seed of a replicate, derived from the configured seed
    pub fn rep_seed(&self, rep: usize) -> u64 {
        self.seed.wrapping_add(rep as u64)
    }
}

/// Apply named parameter overrides to a fungus, rejecting unknown names
pub fn fungus_with_overrides(
    fungus: Arc<Fungus>,
    overrides: &BTreeMap<String, FloatValue>,
) -> AlepResult<Arc<Fungus>> {
    if overrides.is_empty() {
        return Ok(fungus);
    }
    let (fungus, unknown) = fungus
        .as_ref()
        .clone()
        .with_overrides(overrides.iter().map(|(k, v)| (k.as_str(), *v)));
    if let Some(name) = unknown.first() {
        return Err(AlepError::invalid_parameter(
            name.as_str(),
            format!("not a parameter of {}", fungus.name),
        ));
    }
    Ok(Arc::new(fungus))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeptoriaConfig {
    #[serde(flatten)]
    pub campaign: CampaignConfig,
    /// Thermal time between two updates of the lesions
    pub septo_delay_dday: FloatValue,
    /// Minimal rain (mm/h) for an hour to belong to a rain event
    pub rain_min: FloatValue,
    /// Hours between two records
    pub recording_delay: usize,
    /// Mean rain (mm/h) of an event above which splash dispersal happens
    pub dispersal_rain_threshold: FloatValue,
    /// Fraction of the soil covered by sporulating debris
    pub sporulating_fraction: FloatValue,
    /// `poisson` or `simple`
    pub competition: String,
    pub age_infection: bool,
    pub splash: SplashTransport,
    pub washing: RapillyWashing,
    /// Overrides of the septoria parameters, by name
    pub fungus: BTreeMap<String, FloatValue>,
}

impl Default for SeptoriaConfig {
    fn default() -> Self {
        Self {
            campaign: CampaignConfig::default(),
            septo_delay_dday: 10.0,
            rain_min: 0.2,
            recording_delay: 24,
            dispersal_rain_threshold: 0.2,
            sporulating_fraction: 5e-3,
            competition: "poisson".to_string(),
            age_infection: false,
            splash: SplashTransport::default(),
            washing: RapillyWashing::default(),
            fungus: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrownRustConfig {
    #[serde(flatten)]
    pub campaign: CampaignConfig,
    /// Thermal time between two updates of the lesions
    #[serde(rename = "TT_delay")]
    pub tt_delay: FloatValue,
    /// Hours between two dispersal events
    pub dispersal_delay: usize,
    /// Airborne dispersal units reaching the canopy per m² at each dispersal event
    pub density_dispersal_units: FloatValue,
    /// Thickness of the canopy layers intercepting spores (cm)
    pub layer_thickness: FloatValue,
    pub growth_control: Arc<dyn GrowthControl>,
    /// Overrides of the brown rust parameters, by name
    pub fungus: BTreeMap<String, FloatValue>,
}

impl Default for BrownRustConfig {
    fn default() -> Self {
        Self {
            campaign: CampaignConfig {
                sowing_date: "10-15".to_string(),
                ..Default::default()
            },
            tt_delay: 20.0,
            dispersal_delay: 24,
            density_dispersal_units: 150.0,
            layer_thickness: 1.0,
            growth_control: Arc::new(PoissonCompetition),
            fungus: BTreeMap::new(),
        }
    }
}

/// Settings of the Morris screening of the septoria model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MorrisConfig {
    pub num_trajectories: usize,
    pub num_levels: usize,
    pub grid_jump: usize,
    pub conf_level: FloatValue,
    pub num_resamples: usize,
    pub seed: u64,
    /// Directory receiving the recorders of the simulations, one sub-directory per variety
    pub output_dir: PathBuf,
    /// Base configuration of the simulations, before applying the samples
    pub septoria: SeptoriaConfig,
}

impl Default for MorrisConfig {
    fn default() -> Self {
        Self {
            num_trajectories: 10,
            num_levels: 10,
            grid_jump: 5,
            conf_level: 0.95,
            num_resamples: 1000,
            seed: 0,
            output_dir: PathBuf::from("morris"),
            septoria: SeptoriaConfig {
                campaign: CampaignConfig {
                    nplants: 30,
                    nsect: 7,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }
}
