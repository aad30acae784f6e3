//! Command line entry point of the epidemic simulations
//!
//! ```bash
//! alep septoria --weather weather.csv --config septoria.toml
//! alep morris-sample --config morris.toml --dir morris
//! alep morris-run --weather weather.csv --config morris.toml --dir morris
//! alep morris-analyze --config morris.toml --dir morris --parameter year --value 2004
//! ```

use alep::config::{from_file, BrownRustConfig, MorrisConfig, SeptoriaConfig};
use alep::septoria::output_filename;
use alep::sensitivity::{
    generate_parameter_set, get_results_audpc, morris_analysis, output_file, run_design,
    SeptoriaMorrisRunner,
};
use alep::{explore_scenarios, run_reps_rust, run_reps_septo};
use alep_core::weather::{DegreeDayModel, Weather};
use alep_models::fungi::{BROWN_RUST, SEPTORIA};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Simulation of septoria and brown rust epidemics on wheat
#[derive(Parser, Debug)]
#[command(name = "alep")]
#[command(about = "Simulate foliar fungal epidemics on a growing wheat canopy")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replicates of a septoria campaign
    Septoria {
        /// Hourly weather CSV covering the campaign
        #[arg(short, long)]
        weather: PathBuf,
        /// TOML configuration, defaults otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// CSV receiving the records of every replicate
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replicates of a brown rust campaign
    BrownRust {
        #[arg(short, long)]
        weather: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Brown rust campaigns on canopies with one scaled architectural parameter
    Scenarios {
        #[arg(short, long)]
        weather: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Comma-separated canopy scales, e.g. scale_HS,scale_stemDim
        #[arg(short, long, value_delimiter = ',')]
        parameters: Vec<String>,
        /// Comma-separated values given to each scale
        #[arg(long, value_delimiter = ',')]
        values: Vec<f64>,
        #[arg(long, default_value = "scenarios")]
        output_dir: PathBuf,
    },
    /// Write the parameter ranges, Morris samples and full design
    MorrisSample {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Working directory of the experiment
        #[arg(short, long)]
        dir: PathBuf,
    },
    /// Simulate every row of the full design
    MorrisRun {
        /// Hourly weather CSV covering every year of the design
        #[arg(short, long)]
        weather: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        dir: PathBuf,
    },
    /// Compute the Morris indices of the simulations varying one qualitative parameter
    MorrisAnalyze {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        dir: PathBuf,
        /// `year` or `variety`
        #[arg(short, long, default_value = "year")]
        parameter: String,
        #[arg(long, default_value_t = 2004.0)]
        value: f64,
    },
}

fn load_config<T: DeserializeOwned + Default>(
    path: Option<&Path>,
) -> Result<T, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(from_file(path)?),
        None => Ok(T::default()),
    }
}

fn load_weather(path: &Path) -> Result<Weather, Box<dyn std::error::Error>> {
    let weather = Weather::from_csv(path, DegreeDayModel::default())?;
    info!(path = %path.display(), hours = weather.len(), "weather loaded");
    Ok(weather)
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Septoria {
            weather,
            config,
            output,
        } => {
            let config: SeptoriaConfig = load_config(config.as_deref())?;
            let weather = load_weather(&weather)?;
            let output = output.unwrap_or_else(|| {
                output_filename(SEPTORIA, &config.campaign, config.sporulating_fraction, None)
            });
            run_reps_septo(&config, &weather, &output)?;
            info!(output = %output.display(), "septoria records written");
        }
        Command::BrownRust {
            weather,
            config,
            output,
        } => {
            let config: BrownRustConfig = load_config(config.as_deref())?;
            let weather = load_weather(&weather)?;
            let output = output.unwrap_or_else(|| {
                output_filename(
                    BROWN_RUST,
                    &config.campaign,
                    config.density_dispersal_units,
                    None,
                )
            });
            run_reps_rust(&config, &weather, &output)?;
            info!(output = %output.display(), "brown rust records written");
        }
        Command::Scenarios {
            weather,
            config,
            parameters,
            values,
            output_dir,
        } => {
            let config: BrownRustConfig = load_config(config.as_deref())?;
            let weather = load_weather(&weather)?;
            let results = explore_scenarios(&config, &weather, &parameters, &values, &output_dir)?;
            info!(
                n_scenarios = results.len(),
                output_dir = %output_dir.display(),
                "scenarios written"
            );
        }
        Command::MorrisSample { config, dir } => {
            let config: MorrisConfig = load_config(config.as_deref())?;
            generate_parameter_set(&dir, &config)?;
        }
        Command::MorrisRun {
            weather,
            config,
            dir,
        } => {
            let config: MorrisConfig = load_config(config.as_deref())?;
            let weather = load_weather(&weather)?;
            let runner = SeptoriaMorrisRunner::new(config, weather)?;
            run_design(&dir, &runner)?;
        }
        Command::MorrisAnalyze {
            config,
            dir,
            parameter,
            value,
        } => {
            let config: MorrisConfig = load_config(config.as_deref())?;
            get_results_audpc(&dir, &config, &parameter, value)?;
            let indices = morris_analysis(&dir, &config, &output_file(&parameter, value))?;
            let path = dir.join(format!("septo_morris_indices_{}_{}.json", parameter, value));
            indices.save(&path)?;
            info!(
                ranking = ?indices.ranking(),
                path = %path.display(),
                "Morris indices written"
            );
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
