//! Biological models plugged into the alep disease protocol
//!
//! Each module implements one of the traits of [`alep_core::models`] for the simulated fungi,
//! along with a simple wheat canopy to run them on.

pub mod allocation;
pub mod emission;
pub mod fungi;
pub mod growth_control;
pub mod infection;
pub mod inoculation;
pub mod transport;
pub mod washing;
pub mod wheat;
