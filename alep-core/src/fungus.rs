//! Fungus definitions shared by lesions and dispersal units
//!
//! A [`Fungus`] is a name plus a [`FungusParameters`] block.
//! Lesions and dispersal units hold an `Arc<Fungus>` so that every object
//! produced during a simulation refers to the same parameterisation.
//! Species-specific defaults live in the `alep-models` crate.

use serde::{Deserialize, Serialize};

pub type FloatValue = f64;

/// How a sporulating lesion builds its stock of spores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SporulationMode {
    /// Stock is filled once when tissue starts sporulating and is released by rain events
    /// (splash-dispersed pathogens such as septoria).
    RainTriggered,
    /// Stock is produced continuously by sporulating tissue while the lesion is active
    /// (airborne pathogens such as rusts and powdery mildews).
    Continuous,
}

/// Parameters of a fungus.
///
/// Surfaces are in cm², durations in degree days unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FungusParameters {
    /// Base temperature used to compute lesion thermal time (°C).
    pub basis_for_dday: FloatValue,

    // Infection
    /// Minimum temperature for infection (°C).
    pub temp_min: FloatValue,
    /// Maximum temperature for infection (°C).
    pub temp_max: FloatValue,
    /// Consecutive favourable hours needed by a dispersal unit to infect.
    /// A value of 0 means infection does not need leaf wetness, only humidity.
    pub wd_min: FloatValue,
    /// Minimum relative humidity (%) for humidity-driven infection and spore release.
    pub rh_min: FloatValue,
    /// Loss rate of deposited dispersal units (1/h); they are lost after `1 / loss_rate` hours.
    pub loss_rate: FloatValue,
    /// Probability of success of a dispersal unit landing on healthy tissue.
    pub proba_inf: FloatValue,

    // Lesion development
    /// Duration of incubation, before the first symptoms appear.
    pub degree_days_to_chlorosis: FloatValue,
    /// Time spent by a ring of tissue in the chlorotic state.
    pub degree_days_to_necrosis: FloatValue,
    /// Time spent by a ring of tissue in the necrotic state before sporulation.
    pub degree_days_to_sporulation: FloatValue,
    /// Surface of a lesion at the end of incubation.
    #[serde(rename = "Smin")]
    pub smin: FloatValue,
    /// Maximal surface of a lesion.
    #[serde(rename = "Smax")]
    pub smax: FloatValue,
    /// Radial growth rate of a lesion (cm² per degree day).
    pub growth_rate: FloatValue,
    /// Fraction of senescent leaf above which lesions stop developing.
    pub age_physio_switch_senescence: FloatValue,

    // Sporulation
    pub sporulation_mode: SporulationMode,
    /// Dispersal units produced per cm² of sporulating tissue (rain-triggered mode).
    pub density_dus_emitted: FloatValue,
    /// Spores produced per cm² of sporulating tissue per degree day (continuous mode).
    pub production_rate: FloatValue,
    /// Duration of sporulation of a ring before it empties (continuous mode).
    pub sporulating_duration: FloatValue,
    /// Number of rain events after which a lesion is emptied (rain-triggered mode).
    pub nb_rain_events_to_empty: u32,
    /// Fraction of the remaining sporulating surface emptied by each rain event.
    pub reduction_by_rain: FloatValue,
    /// Number of spores packed in a dispersal unit.
    pub nb_spores_by_du: u64,
    /// Whether identical dispersal units are handled as a single group.
    pub group_dus: bool,
}

impl Default for FungusParameters {
    fn default() -> Self {
        Self {
            basis_for_dday: 0.0,
            temp_min: 0.0,
            temp_max: 30.0,
            wd_min: 10.0,
            rh_min: 85.0,
            loss_rate: 1.0 / 120.0,
            proba_inf: 1.0,
            degree_days_to_chlorosis: 220.0,
            degree_days_to_necrosis: 110.0,
            degree_days_to_sporulation: 20.0,
            smin: 0.03,
            smax: 0.3,
            growth_rate: 0.0006,
            age_physio_switch_senescence: 0.5,
            sporulation_mode: SporulationMode::RainTriggered,
            density_dus_emitted: 1000.0,
            production_rate: 0.0,
            sporulating_duration: FloatValue::INFINITY,
            nb_rain_events_to_empty: 3,
            reduction_by_rain: 0.0,
            nb_spores_by_du: 10,
            group_dus: true,
        }
    }
}

impl FungusParameters {
    /// Set a parameter from its name.
    ///
    /// Names follow the serialised names (`Smin`, `Smax`, ...). Integer and boolean
    /// parameters are converted from the float value.
    ///
    /// Returns `false` if no parameter has that name.
    pub fn set(&mut self, name: &str, value: FloatValue) -> bool {
        match name {
            "basis_for_dday" => self.basis_for_dday = value,
            "temp_min" => self.temp_min = value,
            "temp_max" => self.temp_max = value,
            "wd_min" => self.wd_min = value,
            "rh_min" => self.rh_min = value,
            "loss_rate" => self.loss_rate = value,
            "proba_inf" => self.proba_inf = value,
            "degree_days_to_chlorosis" => self.degree_days_to_chlorosis = value,
            "degree_days_to_necrosis" => self.degree_days_to_necrosis = value,
            "degree_days_to_sporulation" => self.degree_days_to_sporulation = value,
            "Smin" | "smin" => self.smin = value,
            "Smax" | "smax" => self.smax = value,
            "growth_rate" => self.growth_rate = value,
            "age_physio_switch_senescence" => self.age_physio_switch_senescence = value,
            "density_dus_emitted" => self.density_dus_emitted = value,
            "production_rate" => self.production_rate = value,
            "sporulating_duration" => self.sporulating_duration = value,
            "nb_rain_events_to_empty" => {
                self.nb_rain_events_to_empty = value.max(0.0).round() as u32
            }
            "reduction_by_rain" => self.reduction_by_rain = value,
            "nb_spores_by_du" => self.nb_spores_by_du = value.max(1.0).round() as u64,
            "group_dus" => self.group_dus = value != 0.0,
            _ => return false,
        }
        true
    }

    /// Thermal time accumulated over a sequence of hourly temperatures.
    pub fn degree_days(&self, temperature_sequence: &[FloatValue]) -> FloatValue {
        temperature_sequence
            .iter()
            .map(|t| (t - self.basis_for_dday).max(0.0) / 24.0)
            .sum()
    }

    /// Whether an hour with the given conditions is favourable to infection.
    pub fn is_favourable(
        &self,
        temperature: FloatValue,
        wet: bool,
        relative_humidity: FloatValue,
    ) -> bool {
        let temperature_ok = temperature >= self.temp_min && temperature <= self.temp_max;
        if self.wd_min > 0.0 {
            temperature_ok && wet
        } else {
            temperature_ok && relative_humidity >= self.rh_min
        }
    }

    /// Lifetime of a deposited dispersal unit that never meets infection conditions (hours).
    pub fn du_lifetime(&self) -> FloatValue {
        if self.loss_rate > 0.0 {
            1.0 / self.loss_rate
        } else {
            FloatValue::INFINITY
        }
    }
}

/// A fungus, identified by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fungus {
    pub name: String,
    pub parameters: FungusParameters,
}

impl Fungus {
    pub fn new(name: impl Into<String>, parameters: FungusParameters) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// Override parameters by name, returning the names that were not recognised.
    pub fn with_overrides<'a, I>(mut self, overrides: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = (&'a str, FloatValue)>,
    {
        let mut unknown = Vec::new();
        for (name, value) in overrides {
            if !self.parameters.set(name, value) {
                unknown.push(name.to_string());
            }
        }
        (self, unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_by_name() {
        let mut parameters = FungusParameters::default();
        assert!(parameters.set("Smax", 0.5));
        assert!(parameters.set("degree_days_to_chlorosis", 150.0));
        assert!(parameters.set("nb_rain_events_to_empty", 4.4));
        assert!(!parameters.set("not_a_parameter", 1.0));

        assert_eq!(parameters.smax, 0.5);
        assert_eq!(parameters.degree_days_to_chlorosis, 150.0);
        assert_eq!(parameters.nb_rain_events_to_empty, 4);
    }

    #[test]
    fn overrides_report_unknown_names() {
        let (fungus, unknown) = Fungus::new("septoria", FungusParameters::default())
            .with_overrides([("Smin", 0.01), ("sporulating_fraction", 0.1)]);
        assert_eq!(fungus.parameters.smin, 0.01);
        assert_eq!(unknown, vec!["sporulating_fraction".to_string()]);
    }

    #[test]
    fn degree_days_use_base_temperature() {
        let parameters = FungusParameters {
            basis_for_dday: 5.0,
            ..Default::default()
        };
        let dd = parameters.degree_days(&[29.0, 29.0, 2.0]);
        assert_eq!(dd, 2.0);
    }

    #[test]
    fn humidity_driven_infection() {
        let parameters = FungusParameters {
            wd_min: 0.0,
            rh_min: 70.0,
            ..Default::default()
        };
        assert!(parameters.is_favourable(15.0, false, 80.0));
        assert!(!parameters.is_favourable(15.0, true, 50.0));
    }

    #[test]
    fn serialised_names() {
        let parameters: FungusParameters =
            serde_json::from_str(r#"{"Smin": 0.05, "growth_rate": 0.001}"#).unwrap();
        assert_eq!(parameters.smin, 0.05);
        assert_eq!(parameters.growth_rate, 0.001);
        assert_eq!(parameters.smax, FungusParameters::default().smax);
    }
}
