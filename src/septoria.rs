//! Septoria epidemics over a wheat campaign
//!
//! Septoria is splash dispersed: the epidemic starts from infected debris on the soil and
//! spreads upwards with each rain event. Four schedules drive the simulation:
//!
//! - the canopy grows every `canopy_delay_dday` degree days,
//! - contamination, dispersal and washing happen at the end of rain events,
//! - lesions develop every `septo_delay_dday` degree days and at the end of rain events,
//! - the state of the leaves is recorded every `recording_delay` hours.

use crate::config::{fungus_with_overrides, CampaignConfig, SeptoriaConfig};
use alep_core::canopy::{Canopy, LEAF_LABEL};
use alep_core::errors::{AlepError, AlepResult};
use alep_core::fungus::{FloatValue, Fungus};
use alep_core::models::GrowthControl;
use alep_core::protocol;
use alep_core::recorder::{write_reps_csv, Recorder, SeverityMeasure};
use alep_core::time_control::{
    rain_filter, septoria_filter_ddays, thermal_time_filter, time_filter, Schedule, TimeFilter,
};
use alep_core::weather::{DegreeDayModel, Weather};
use alep_models::emission::SeptoriaRainEmission;
use alep_models::fungi::{self, SEPTORIA};
use alep_models::growth_control::{PoissonCompetition, PriorityGrowthControl};
use alep_models::infection::BiotrophDUProbaModel;
use alep_models::inoculation::{SoilContamination, SoilInoculum};
use alep_models::transport::SplashTransport;
use alep_models::washing::RapillyWashing;
use alep_models::wheat::{WheatArchive, WheatStand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Growth controller from its name in configuration files
pub fn competition_model(name: &str) -> AlepResult<Arc<dyn GrowthControl>> {
    match name {
        "poisson" => Ok(Arc::new(PoissonCompetition)),
        "simple" => Ok(Arc::new(PriorityGrowthControl)),
        _ => Err(AlepError::Config(format!(
            "Unknown competition model '{}'",
            name
        ))),
    }
}

/// The models assembled into the septoria disease
#[derive(Debug)]
pub struct SeptoriaModels {
    pub fungus: Arc<Fungus>,
    pub inoculum: SoilInoculum,
    pub contaminator: SoilContamination,
    pub infection_control: BiotrophDUProbaModel,
    pub growth_control: Arc<dyn GrowthControl>,
    pub emitter: SeptoriaRainEmission,
    pub transporter: SplashTransport,
    pub washing: RapillyWashing,
}

pub fn septo_disease(config: &SeptoriaConfig) -> AlepResult<SeptoriaModels> {
    let fungus = fungus_with_overrides(fungi::septoria(), &config.fungus)?;
    Ok(SeptoriaModels {
        inoculum: SoilInoculum::new(fungus.clone(), config.sporulating_fraction, LEAF_LABEL),
        contaminator: SoilContamination {
            splash: config.splash.clone(),
        },
        infection_control: BiotrophDUProbaModel {
            age_infection: config.age_infection,
        },
        growth_control: competition_model(&config.competition)?,
        emitter: SeptoriaRainEmission::default(),
        transporter: config.splash.clone(),
        washing: config.washing.clone(),
        fungus,
    })
}

/// Canopy and weather of a campaign
#[derive(Debug)]
pub struct Campaign {
    pub weather: Weather,
    pub stand: WheatStand,
    pub canopy: Canopy,
    pub canopy_filter: TimeFilter,
}

impl Campaign {
    /// Restrict the weather to the campaign and build the initial canopy
    pub fn new(config: &CampaignConfig, weather: &Weather) -> AlepResult<Self> {
        let period = weather.between(config.start_date()?, config.end_date()?)?;
        let weather = Weather::from_records(
            period.records().to_vec(),
            DegreeDayModel::new(config.t_base),
        );
        let stand = config.wheat_stand();
        let canopy = stand.init_canopy()?;
        let canopy_filter = thermal_time_filter(
            &weather,
            weather.degree_day_model(),
            config.canopy_delay_dday,
        )?;
        Ok(Self {
            weather,
            stand,
            canopy,
            canopy_filter,
        })
    }

    /// Grow the canopy, through the archive when there is one
    pub fn grow(
        &mut self,
        archive: Option<&WheatArchive>,
        iteration: usize,
        degree_days: FloatValue,
    ) -> AlepResult<()> {
        match archive {
            Some(archive) => {
                archive.grow_canopy(&mut self.canopy, &self.stand, iteration, degree_days)
            }
            None => self.stand.grow(&mut self.canopy, degree_days),
        }
    }
}

/// Archive of the canopy of a replicate, when the configuration stores canopies
pub fn rep_archive(config: &CampaignConfig, rep: Option<usize>) -> Option<WheatArchive> {
    config.wheat_dir.as_ref().map(|root| {
        WheatArchive::new(WheatArchive::wheat_path(
            root,
            config.year,
            config.variety,
            config.nplants,
            config.nsect,
            rep,
        ))
    })
}

/// Name of the output file of a set of replicates
pub fn output_filename(
    fungus: &str,
    config: &CampaignConfig,
    inoculum: FloatValue,
    suffix: Option<&str>,
) -> PathBuf {
    let mut name = format!(
        "{}_{}_{}_{}pl_inoc{}",
        fungus,
        config.variety.name().to_lowercase(),
        config.year,
        config.nplants,
        inoculum
    );
    if let Some(suffix) = suffix {
        name.push('_');
        name.push_str(suffix);
    }
    PathBuf::from(format!("{}.csv", name))
}

/// Simulate a septoria epidemic over the campaign of `config`
pub fn annual_loop_septo(
    config: &SeptoriaConfig,
    weather: &Weather,
    archive: Option<&WheatArchive>,
    seed: u64,
) -> AlepResult<(Canopy, Recorder)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut campaign = Campaign::new(&config.campaign, weather)?;
    let models = septo_disease(config)?;
    let weather = campaign.weather.clone();

    let rain = rain_filter(&weather, config.rain_min);
    let septo = septoria_filter_ddays(&weather, config.septo_delay_dday, config.rain_min)?;
    let recording = time_filter(weather.len(), config.recording_delay)?;
    let canopy_filter = campaign.canopy_filter.clone();
    let schedules = Schedule::new(&canopy_filter, &weather)?
        .zip(Schedule::new(&rain, &weather)?)
        .zip(Schedule::new(&septo, &weather)?)
        .zip(Schedule::new(&recording, &weather)?);

    let mut recorder = Recorder::new(SeverityMeasure::Sporulating);
    let mut it_wheat = 0;
    for (((canopy_step, rain_step), septo_step), record_step) in schedules {
        let (canopy_step, rain_step, septo_step, record_step) =
            (canopy_step?, rain_step?, septo_step?, record_step?);

        if let Some(step) = canopy_step {
            it_wheat += 1;
            let degree_days = step.window.last_degree_days();
            campaign.grow(archive, it_wheat, degree_days)?;
            debug!(it_wheat, degree_days, "canopy growth");
        }
        let canopy = &mut campaign.canopy;

        if let Some(step) = &septo_step {
            canopy.for_each_organ_mut(LEAF_LABEL, |_, leaf| {
                step.window.apply_sequences(&mut leaf.microclimate)
            });
        }
        canopy.for_each_organ_mut(LEAF_LABEL, |_, leaf| match &rain_step {
            Some(step) => step.window.apply_rain(&mut leaf.microclimate),
            None => {
                leaf.microclimate.rain_intensity = 0.0;
                leaf.microclimate.rain_duration = 0.0;
            }
        });

        let splash = rain_step.as_ref().filter(|step| {
            step.window.mean_rain() > config.dispersal_rain_threshold
                && !canopy.leaves(LEAF_LABEL).is_empty()
        });
        if let Some(step) = splash {
            protocol::external_contamination(
                canopy,
                &models.inoculum,
                &models.contaminator,
                &step.window,
                LEAF_LABEL,
                &mut rng,
            )?;
        }

        if let Some(step) = &septo_step {
            protocol::infect(
                canopy,
                step.dt,
                &models.infection_control,
                LEAF_LABEL,
                &mut rng,
            )?;
            protocol::group_duplicates_in_cohort(canopy);
            protocol::update(canopy, step.dt, models.growth_control.as_ref(), LEAF_LABEL)?;
        }

        if let Some(step) = splash {
            protocol::wash(
                canopy,
                &models.washing,
                step.window.mean_rain(),
                LEAF_LABEL,
                &mut rng,
            )?;
            protocol::disperse(
                canopy,
                &models.emitter,
                &models.transporter,
                SEPTORIA,
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

/// Run replicates of the septoria campaign in parallel and write their records to `output`.
///
/// Replicates differ by their seed and by their stored canopy.
pub fn run_reps_septo(
    config: &SeptoriaConfig,
    weather: &Weather,
    output: &Path,
) -> AlepResult<Vec<Recorder>> {
    info!(
        year = config.campaign.year,
        variety = %config.campaign.variety,
        nreps = config.campaign.nreps,
        "septoria replicates"
    );
    let recorders = (0..config.campaign.nreps)
        .into_par_iter()
        .map(|rep| {
            let archive = rep_archive(&config.campaign, Some(rep));
            annual_loop_septo(
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
