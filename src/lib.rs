//! Epidemics of foliar fungi on a growing wheat canopy
//!
//! The simulation engine lives in `alep-core` and the biological models in `alep-models`.
//! This crate assembles them into yearly campaigns of septoria and brown rust, and screens
//! the septoria model with the Morris method of `alep-sensitivity`.

pub mod brown_rust;
pub mod config;
pub mod septoria;
pub mod sensitivity;

pub use brown_rust::{annual_loop_rust, explore_scenarios, run_reps_rust};
pub use config::{BrownRustConfig, CampaignConfig, MorrisConfig, SeptoriaConfig};
pub use septoria::{annual_loop_septo, run_reps_septo};
