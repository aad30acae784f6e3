//! Parameterisations of the simulated fungi
//!
//! Each function returns the default parameters of a species. Individual values can be
//! overridden by name with [`Fungus::with_overrides`].

use alep_core::fungus::{Fungus, FungusParameters, SporulationMode};
use std::sync::Arc;

pub const SEPTORIA: &str = "septoria";
pub const BROWN_RUST: &str = "brown_rust";
pub const POWDERY_MILDEW: &str = "powdery_mildew";

/// Septoria tritici blotch (*Zymoseptoria tritici*), splash dispersed
pub fn septoria_parameters() -> FungusParameters {
    FungusParameters {
        basis_for_dday: -2.0,
        temp_min: 10.0,
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
        age_physio_switch_senescence: 0.01,
        sporulation_mode: SporulationMode::RainTriggered,
        density_dus_emitted: 1000.0,
        nb_rain_events_to_empty: 3,
        reduction_by_rain: 0.0,
        nb_spores_by_du: 10,
        group_dus: true,
        ..Default::default()
    }
}

/// Wheat brown rust (*Puccinia triticina*), wind dispersed
pub fn brown_rust_parameters() -> FungusParameters {
    FungusParameters {
        basis_for_dday: 0.0,
        temp_min: 10.0,
        temp_max: 35.0,
        wd_min: 6.0,
        rh_min: 85.0,
        loss_rate: 1.0 / 48.0,
        proba_inf: 1.0,
        degree_days_to_chlorosis: 70.0,
        degree_days_to_necrosis: 60.0,
        degree_days_to_sporulation: 0.0,
        smin: 0.003,
        smax: 0.2,
        growth_rate: 0.0003,
        age_physio_switch_senescence: 0.01,
        sporulation_mode: SporulationMode::Continuous,
        production_rate: 2000.0,
        sporulating_duration: 300.0,
        nb_spores_by_du: 1,
        group_dus: true,
        ..Default::default()
    }
}

/// Grapevine powdery mildew (*Erysiphe necator*), wind dispersed, infects without free water
pub fn powdery_mildew_parameters() -> FungusParameters {
    FungusParameters {
        basis_for_dday: 0.0,
        temp_min: 5.0,
        temp_max: 33.0,
        wd_min: 0.0,
        rh_min: 70.0,
        loss_rate: 1.0 / 24.0,
        proba_inf: 1.0,
        degree_days_to_chlorosis: 60.0,
        degree_days_to_necrosis: 40.0,
        degree_days_to_sporulation: 0.0,
        smin: 0.03,
        smax: 10.0,
        growth_rate: 0.006,
        age_physio_switch_senescence: 0.5,
        sporulation_mode: SporulationMode::Continuous,
        production_rate: 1000.0,
        sporulating_duration: 200.0,
        nb_spores_by_du: 1,
        group_dus: true,
        ..Default::default()
    }
}

pub fn septoria() -> Arc<Fungus> {
    Arc::new(Fungus::new(SEPTORIA, septoria_parameters()))
}

pub fn brown_rust() -> Arc<Fungus> {
    Arc::new(Fungus::new(BROWN_RUST, brown_rust_parameters()))
}

pub fn powdery_mildew() -> Arc<Fungus> {
    Arc::new(Fungus::new(POWDERY_MILDEW, powdery_mildew_parameters()))
}

/// Default parameters of a fungus from its name
pub fn parameters_by_name(name: &str) -> Option<FungusParameters> {
    match name {
        SEPTORIA => Some(septoria_parameters()),
        BROWN_RUST => Some(brown_rust_parameters()),
        POWDERY_MILDEW => Some(powdery_mildew_parameters()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sporulation_modes() {
        assert_eq!(
            septoria().parameters.sporulation_mode,
            SporulationMode::RainTriggered
        );
        assert_eq!(
            brown_rust().parameters.sporulation_mode,
            SporulationMode::Continuous
        );
        assert_eq!(powdery_mildew().parameters.wd_min, 0.0);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(parameters_by_name("septoria"), Some(septoria_parameters()));
        assert!(parameters_by_name("late_blight").is_none());
    }

    #[test]
    fn overrides_from_config() {
        let parameters: FungusParameters =
            toml::from_str("Smax = 0.5\ndegree_days_to_chlorosis = 150.0").unwrap();
        assert_eq!(parameters.smax, 0.5);
        // Fields absent from the file take the generic defaults
        assert_eq!(parameters.smin, FungusParameters::default().smin);
    }
}
