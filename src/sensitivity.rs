//! Morris screening of the septoria model
//!
//! The experiment runs in three steps sharing a working directory:
//!
//! 1. [`generate_parameter_set`] writes the parameter ranges, the Morris samples and the full
//!    design repeating them for each year and variety.
//! 2. [`run_design`] simulates every row of the full design and stores one recorder per row.
//! 3. [`get_results_audpc`] extracts the output of the rows varying one qualitative parameter
//!    and [`morris_analysis`] computes the indices from them.

use crate::config::{MorrisConfig, SeptoriaConfig};
use crate::septoria::{annual_loop_septo, rep_archive};
use alep_core::recorder::Recorder;
use alep_core::weather::Weather;
use alep_models::wheat::Variety;
use alep_sensitivity::design::select;
use alep_sensitivity::io::{read_matrix, read_vector, write_matrix, write_vector};
use alep_sensitivity::{
    full_design, morris, Error, ModelRunner, MorrisIndices, ParameterSet, QualitativeParameter,
    Result,
};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const RANGE_FILE: &str = "param_range_SA.txt";
pub const SAMPLE_FILE: &str = "septo_morris_input.txt";
pub const FULL_SAMPLE_FILE: &str = "septo_morris_input_full.txt";

pub const YEAR: &str = "year";
pub const VARIETY: &str = "variety";

/// Leaves whose audpc makes the output of a simulation, numbered from the top
const OUTPUT_LEAVES: [usize; 3] = [1, 2, 3];

/// Ranges of the quantitative parameters.
///
/// `sporulating_fraction` belongs to the soil inoculum, the others to the fungus.
pub fn quantitative_parameters() -> Result<ParameterSet> {
    let mut params = ParameterSet::new();
    params
        .add("sporulating_fraction", 1e-3, 1e-2)?
        .add("degree_days_to_chlorosis", 120.0, 420.0)?
        .add("degree_days_to_necrosis", 20.0, 320.0)?
        .add("Smin", 1e-4, 0.99e-2)?
        .add("Smax", 1e-2, 1.0)?
        .add("growth_rate", 0.5e-2, 0.5e-4)?
        .add("age_physio_switch_senescence", 0.01, 1.0)?
        .add("density_dus_emitted", 1e3, 3e3)?
        .add("reduction_by_rain", 0.0, 1.0)?;
    Ok(params)
}

/// Harvest years and variety codes crossed with the samples
pub fn qualitative_parameters() -> Vec<QualitativeParameter> {
    vec![
        QualitativeParameter::new(YEAR, 2004.0, vec![1998.0, 2003.0, 2004.0]),
        QualitativeParameter::new(VARIETY, 1.0, vec![1.0, 2.0, 3.0, 4.0]),
    ]
}

/// File receiving the outputs of the rows where `parameter` equals `value`
pub fn output_file(parameter: &str, value: f64) -> String {
    format!("septo_morris_output_{}_{}.txt", parameter, value)
}

/// Write the range file, the Morris samples and the full design into `dir`
pub fn generate_parameter_set(dir: &Path, config: &MorrisConfig) -> Result<Array2<f64>> {
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let params = quantitative_parameters()?;
    params.write_range_file(dir.join(RANGE_FILE))?;

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let samples = morris::sample(
        &params,
        config.num_trajectories,
        config.num_levels,
        config.grid_jump,
        &mut rng,
    )?;
    write_matrix(dir.join(SAMPLE_FILE), &samples)?;

    let design = full_design(&samples, &qualitative_parameters());
    write_matrix(dir.join(FULL_SAMPLE_FILE), &design)?;
    info!(
        n_samples = samples.nrows(),
        n_simulations = design.nrows(),
        "parameter set generated"
    );
    Ok(design)
}

/// One row of the full design
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub i_sample: usize,
    /// Harvest year
    pub year: i32,
    pub variety: Variety,
    pub parameters: BTreeMap<String, f64>,
}

impl Sample {
    pub fn from_row(row: &[f64], names: &[String]) -> Result<Self> {
        let nb_qualitative = qualitative_parameters().len();
        if row.len() != 1 + nb_qualitative + names.len() {
            return Err(Error::InvalidParameter(format!(
                "Design row has {} values, expected {}",
                row.len(),
                1 + nb_qualitative + names.len()
            )));
        }
        let variety = Variety::from_code(row[2] as usize)
            .map_err(|e| Error::InvalidParameter(e.to_string()))?;
        Ok(Self {
            i_sample: row[0] as usize,
            year: row[1] as i32,
            variety,
            parameters: names
                .iter()
                .cloned()
                .zip(row[1 + nb_qualitative..].iter().copied())
                .collect(),
        })
    }

    /// The septoria configuration of this sample, built on `base`
    pub fn septoria_config(&self, base: &SeptoriaConfig) -> SeptoriaConfig {
        let mut config = base.clone();
        config.campaign.year = self.year;
        config.campaign.variety = self.variety;
        for (name, value) in &self.parameters {
            match name.as_str() {
                "sporulating_fraction" => config.sporulating_fraction = *value,
                _ => {
                    config.fungus.insert(name.clone(), *value);
                }
            }
        }
        config
    }
}

/// Recorder of a simulation of the experiment
pub fn recorder_path(output_dir: &Path, variety: Variety, i_sample: usize) -> PathBuf {
    output_dir
        .join(variety.name().to_lowercase())
        .join(format!("recorder_{}.bin", i_sample))
}

/// Mean normalised audpc of the three upper leaves, `NaN` if none was recorded
pub fn mean_audpc_f1_to_f3(recorder: &Recorder) -> f64 {
    let by_leaf = recorder.mean_audpc_by_leaf();
    let values: Vec<f64> = OUTPUT_LEAVES
        .iter()
        .filter_map(|leaf| by_leaf.get(leaf).copied())
        .collect();
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Simulates the rows of the full design and stores their recorders
pub struct SeptoriaMorrisRunner {
    pub config: MorrisConfig,
    /// Weather covering every year of the design
    pub weather: Weather,
    pub names: Vec<String>,
}

impl SeptoriaMorrisRunner {
    pub fn new(config: MorrisConfig, weather: Weather) -> Result<Self> {
        let names = quantitative_parameters()?.names();
        Ok(Self {
            config,
            weather,
            names,
        })
    }

    /// Simulate one sample and store its recorder
    pub fn annual_loop(&self, sample: &Sample) -> Result<Recorder> {
        let config = sample.septoria_config(&self.config.septoria);
        let archive = rep_archive(&config.campaign, None);
        let seed = self.config.seed.wrapping_add(sample.i_sample as u64);
        let (_, recorder) = annual_loop_septo(&config, &self.weather, archive.as_ref(), seed)
            .map_err(|e| Error::ModelError(format!("sample {}: {}", sample.i_sample, e)))?;

        let path = recorder_path(&self.config.output_dir, sample.variety, sample.i_sample);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        recorder
            .save(&path)
            .map_err(|e| Error::ModelError(e.to_string()))?;
        debug!(i_sample = sample.i_sample, path = %path.display(), "recorder stored");
        Ok(recorder)
    }
}

impl ModelRunner for SeptoriaMorrisRunner {
    fn run(&self, params: &[f64]) -> Result<f64> {
        let sample = Sample::from_row(params, &self.names)?;
        let recorder = self.annual_loop(&sample)?;
        Ok(mean_audpc_f1_to_f3(&recorder))
    }
}

/// Simulate every row of the full design found in `dir`
pub fn run_design(dir: &Path, runner: &SeptoriaMorrisRunner) -> Result<Array1<f64>> {
    let design = read_matrix(dir.join(FULL_SAMPLE_FILE))?;
    let rows: Vec<Vec<f64>> = design.rows().into_iter().map(|r| r.to_vec()).collect();
    let outputs = runner.run_batch(&rows);
    let failed = outputs.iter().filter(|v| v.is_nan()).count();
    info!(n_simulations = rows.len(), failed, "design simulated");
    Ok(outputs)
}

/// Outputs of the rows where `parameter` equals `value`, read from the stored recorders.
///
/// The outputs follow the order of the Morris samples and are written to
/// [`output_file`] in `dir`.
pub fn get_results_audpc(
    dir: &Path,
    config: &MorrisConfig,
    parameter: &str,
    value: f64,
) -> Result<Array1<f64>> {
    let qualitative = qualitative_parameters();
    let design = read_matrix(dir.join(FULL_SAMPLE_FILE))?;
    let i_samples = select(&design, &qualitative, parameter, value)?;

    let variety_code = if parameter == VARIETY {
        value
    } else {
        qualitative
            .iter()
            .find(|q| q.name == VARIETY)
            .map(|q| q.default)
            .unwrap_or(1.0)
    };
    let variety = Variety::from_code(variety_code as usize)
        .map_err(|e| Error::InvalidParameter(e.to_string()))?;

    let outputs = i_samples
        .iter()
        .map(|i_sample| {
            let path = recorder_path(&config.output_dir, variety, *i_sample);
            Recorder::load(&path)
                .map(|recorder| mean_audpc_f1_to_f3(&recorder))
                .map_err(|e| Error::AnalysisError(e.to_string()))
        })
        .collect::<Result<Vec<f64>>>()?;
    let outputs = Array1::from(outputs);
    write_vector(dir.join(output_file(parameter, value)), &outputs)?;
    Ok(outputs)
}

/// Morris indices of the outputs stored in `output`
pub fn morris_analysis(dir: &Path, config: &MorrisConfig, output: &str) -> Result<MorrisIndices> {
    let params = ParameterSet::read_range_file(dir.join(RANGE_FILE))?;
    let samples = read_matrix(dir.join(SAMPLE_FILE))?;
    let outputs = read_vector(dir.join(output))?;
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    morris::analyze(
        &params,
        &samples,
        &outputs,
        config.conf_level,
        config.num_resamples,
        &mut rng,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn sample_from_design_row() {
        let names = quantitative_parameters().unwrap().names();
        let mut row = vec![7.0, 2003.0, 2.0];
        row.extend([5e-3, 220.0, 120.0, 1e-3, 0.5, 1e-3, 0.5, 2e3, 0.5]);
        let sample = Sample::from_row(&row, &names).unwrap();
        assert_eq!(sample.i_sample, 7);
        assert_eq!(sample.year, 2003);
        assert_eq!(sample.variety, Variety::Rht3);

        let config = sample.septoria_config(&SeptoriaConfig::default());
        assert_eq!(config.sporulating_fraction, 5e-3);
        assert_eq!(config.campaign.year, 2003);
        assert_eq!(config.fungus["Smax"], 0.5);
        assert!(!config.fungus.contains_key("sporulating_fraction"));
        assert_eq!(config.fungus.len(), 8);

        assert!(Sample::from_row(&row[..5], &names).is_err());
        row[2] = 9.0;
        assert!(Sample::from_row(&row, &names).is_err());
    }

    #[test]
    fn design_files() {
        let tmp = tempfile::tempdir().unwrap();
        let config = MorrisConfig {
            num_trajectories: 2,
            num_levels: 4,
            grid_jump: 2,
            ..Default::default()
        };
        let design = generate_parameter_set(tmp.path(), &config).unwrap();
        // 10 rows per trajectory, each repeated for 2 years and 3 varieties
        assert_eq!(design.dim(), (2 * 10 * 6, 12));

        let params = ParameterSet::read_range_file(tmp.path().join(RANGE_FILE)).unwrap();
        assert_eq!(params.names(), quantitative_parameters().unwrap().names());
        assert_eq!(read_matrix(tmp.path().join(SAMPLE_FILE)).unwrap().dim(), (20, 9));
    }

    #[test]
    fn audpc_of_upper_leaves() {
        assert!(mean_audpc_f1_to_f3(&Recorder::default()).is_nan());
        let params = quantitative_parameters().unwrap();
        let growth_rate = params.get("growth_rate").unwrap();
        assert!(is_close!(growth_rate.scale(0.5), 0.5 * (0.5e-2 + 0.5e-4)));
        assert_eq!(
            recorder_path(Path::new("morris"), Variety::Tremie12, 4),
            PathBuf::from("morris/tremie12/recorder_4.bin")
        );
        assert_eq!(output_file(YEAR, 2004.0), "septo_morris_output_year_2004.txt");
    }
}
