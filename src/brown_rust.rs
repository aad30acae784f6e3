//! Brown rust epidemics over a wheat campaign
//!
//! Brown rust spores are carried by the wind. Spores from outside the field reach the top of
//! the canopy every `dispersal_delay` hours and sporulating lesions release new spores at the
//! same pace, both falling through the canopy layer by layer.

use crate::config::{fungus_with_overrides, BrownRustConfig};
use crate::septoria::{output_filename, rep_archive, Campaign};
use alep_core::canopy::{Canopy, LEAF_LABEL};
use alep_core::errors::{AlepError, AlepResult};
use alep_core::fungus::FloatValue;
use alep_core::protocol;
use alep_core::recorder::{write_reps_csv, Recorder, SeverityMeasure};
use alep_core::time_control::{thermal_time_filter, time_filter, Schedule};
use alep_core::weather::Weather;
use alep_models::emission::BrownRustWindEmission;
use alep_models::fungi::{self, BROWN_RUST};
use alep_models::infection::BiotrophDUProbaModel;
use alep_models::inoculation::AirborneContamination;
use alep_models::wheat::{ScenarioScales, Variety, WheatArchive};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Hours between two records
const RECORDING_DELAY: usize = 24;

/// Simulate a brown rust epidemic over the campaign of `config`
pub fn annual_loop_rust(
    config: &BrownRustConfig,
    weather: &Weather,
    archive: Option<&WheatArchive>,
    seed: u64,
) -> AlepResult<(Canopy, Recorder)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut campaign = Campaign::new(&config.campaign, weather)?;
    let weather = campaign.weather.clone();

    let fungus = fungus_with_overrides(fungi::brown_rust(), &config.fungus)?;
    let contamination = AirborneContamination::new(
        fungus,
        config.density_dispersal_units,
        config.layer_thickness,
    );
    let infection_control = BiotrophDUProbaModel::default();
    let emitter = BrownRustWindEmission::default();

    let dispersal = time_filter(weather.len(), config.dispersal_delay)?;
    let rust = thermal_time_filter(&weather, weather.degree_day_model(), config.tt_delay)?;
    let recording = time_filter(weather.len(), RECORDING_DELAY)?;
    let canopy_filter = campaign.canopy_filter.clone();
    let schedules = Schedule::new(&canopy_filter, &weather)?
        .zip(Schedule::new(&dispersal, &weather)?)
        .zip(Schedule::new(&rust, &weather)?)
        .zip(Schedule::new(&recording, &weather)?);

    let mut recorder = Recorder::new(SeverityMeasure::Visible);
    let mut it_wheat = 0;
    for (((canopy_step, dispersal_step), rust_step), record_step) in schedules {
        let (canopy_step, dispersal_step, rust_step, record_step) =
            (canopy_step?, dispersal_step?, rust_step?, record_step?);

        if let Some(step) = canopy_step {
            it_wheat += 1;
            let degree_days = step.window.last_degree_days();
            campaign.grow(archive, it_wheat, degree_days)?;
            debug!(it_wheat, degree_days, "canopy growth");
        }
        let canopy = &mut campaign.canopy;

        if let Some(step) = &rust_step {
            let microclimate = step.window.microclimate();
            canopy.set_microclimate(LEAF_LABEL, &microclimate);
        }

        let dispersal_step =
            dispersal_step.filter(|_| !canopy.leaves(LEAF_LABEL).is_empty());
        if let Some(step) = &dispersal_step {
            protocol::external_contamination(
                canopy,
                &contamination,
                &contamination,
                &step.window,
                LEAF_LABEL,
                &mut rng,
            )?;
        }

        if let Some(step) = &rust_step {
            protocol::infect(canopy, step.dt, &infection_control, LEAF_LABEL, &mut rng)?;
            protocol::group_duplicates_in_cohort(canopy);
            protocol::update(canopy, step.dt, config.growth_control.as_ref(), LEAF_LABEL)?;
        }

        if let Some(step) = &dispersal_step {
            protocol::disperse(
                canopy,
                &emitter,
                &contamination.transport,
                BROWN_RUST,
                LEAF_LABEL,
                &step.window,
                &mut rng,
            )?;
        }

        if let Some(step) = record_step {
            if let Some(date) = step.window.last_date() {
                recorder.record(canopy, date, step.window.last_degree_days(), LEAF_LABEL)?;
                debug!(%date, "recorded");
            }
        }
    }

    recorder.post_treatment(config.campaign.variety.name());
    Ok((campaign.canopy, recorder))
}

/// Run replicates of the brown rust campaign in parallel and write their records to `output`
pub fn run_reps_rust(
    config: &BrownRustConfig,
    weather: &Weather,
    output: &Path,
) -> AlepResult<Vec<Recorder>> {
    info!(
        year = config.campaign.year,
        variety = %config.campaign.variety,
        nreps = config.campaign.nreps,
        "brown rust replicates"
    );
    let recorders = (0..config.campaign.nreps)
        .into_par_iter()
        .map(|rep| {
            let archive = rep_archive(&config.campaign, Some(rep));
            annual_loop_rust(
                config,
                weather,
                archive.as_ref(),
                config.campaign.rep_seed(rep),
            )
            .map(|(_, recorder)| recorder)
        })
        .collect::<AlepResult<Vec<_>>>()?;
    write_reps_csv(&recorders, output, true)?;
    Ok(recorders)
}

/// A canopy scenario: one scale applied to the reference canopy
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Scaled canopy parameter, `reference` for the unscaled canopy
    pub parameter: String,
    pub value: FloatValue,
}

impl Scenario {
    pub fn reference() -> Self {
        Self {
            parameter: "reference".to_string(),
            value: 1.0,
        }
    }

    pub fn suffix(&self) -> String {
        if self.parameter == "reference" {
            self.parameter.clone()
        } else {
            format!("{}_{}", self.parameter, self.value)
        }
    }
}

/// The reference followed by every `(parameter, value)` pair
pub fn scenarios(parameters: &[String], values: &[FloatValue]) -> Vec<Scenario> {
    std::iter::once(Scenario::reference())
        .chain(parameters.iter().flat_map(|parameter| {
            values.iter().map(move |value| Scenario {
                parameter: parameter.clone(),
                value: *value,
            })
        }))
        .collect()
}

/// Run the brown rust replicates of each canopy scenario.
///
/// Each scenario scales a single parameter of the `Custom` variety; its records are written to
/// `output_dir` under a name ending with the scenario.
pub fn explore_scenarios(
    base: &BrownRustConfig,
    weather: &Weather,
    parameters: &[String],
    values: &[FloatValue],
    output_dir: &Path,
) -> AlepResult<Vec<(Scenario, Vec<Recorder>)>> {
    std::fs::create_dir_all(output_dir).map_err(|e| AlepError::io(output_dir, e))?;
    let scenarios = scenarios(parameters, values);
    info!(n_scenarios = scenarios.len(), "exploring canopy scenarios");
    scenarios
        .into_par_iter()
        .map(|scenario| -> AlepResult<(Scenario, Vec<Recorder>)> {
            let mut config = base.clone();
            config.campaign.variety = Variety::Custom;
            config.campaign.scales =
                ScenarioScales::with_scale(&scenario.parameter, scenario.value)?;
            // stored canopies belong to the reference geometry
            config.campaign.wheat_dir = None;
            let output = output_dir.join(output_filename(
                BROWN_RUST,
                &config.campaign,
                config.density_dispersal_units,
                Some(&scenario.suffix()),
            ));
            let recorders = run_reps_rust(&config, weather, &output)?;
            Ok((scenario, recorders))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_comes_first() {
        let all = scenarios(
            &["scale_HS".to_string(), "scale_stemDim".to_string()],
            &[0.8, 1.2],
        );
        assert_eq!(all.len(), 5);
        assert_eq!(all[0], Scenario::reference());
        assert_eq!(all[0].suffix(), "reference");
        assert_eq!(all[4].suffix(), "scale_stemDim_1.2");
    }
}
