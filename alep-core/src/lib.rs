//! Core of the alep epidemic simulation
//!
//! - `canopy`: the organ graph on which the disease develops
//! - `fungus`, `lesion`, `dispersal_unit`: the disease objects living on the canopy
//! - `models`: interfaces of the pluggable biological models
//! - `protocol`: the steps applied to the canopy at each time step
//! - `weather`, `time_control`: hourly weather and the scheduling of model calls
//! - `recorder`: disease variables recorded on each leaf

pub mod canopy;
pub mod dispersal_unit;
pub mod fungus;
pub mod lesion;
pub mod models;
pub mod persist;
pub mod protocol;
pub mod recorder;
pub mod time_control;
pub mod weather;

pub mod errors;
