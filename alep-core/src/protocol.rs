//! The disease protocol: the steps applied to the canopy at each time step
//!
//! Every step loops over the organs whose label starts with `label` and delegates the
//! biology to a pluggable model (see [`crate::models`]). A typical time step is
//!
//! ```text
//! external_contamination → infect → group_duplicates_in_cohort → update → disperse → wash
//! ```
//!
//! where `update` ends with the growth control of the lesions.

use crate::canopy::{Canopy, Organ};
use crate::dispersal_unit::DispersalUnit;
use crate::errors::AlepResult;
use crate::fungus::FloatValue;
use crate::lesion::Lesion;
use crate::models::{
    ContaminationModel, DispersalUnits, EmissionModel, GrowthControl, InfectionControl,
    InoculationModel, InoculumSource, TransportModel, WashingModel,
};
use crate::weather::WeatherWindow;
use rand::RngCore;
use tracing::debug;

/// Allocate a stock of inoculum on the canopy
pub fn initiate(
    canopy: &mut Canopy,
    stock: Vec<DispersalUnit>,
    inoculation_model: &dyn InoculationModel,
    label: &str,
    rng: &mut dyn RngCore,
) -> AlepResult<()> {
    let deposits = inoculation_model.allocate(canopy, stock, label, rng)?;
    let nb_deposited = deposit(canopy, deposits, label)?;
    debug!(nb_deposited, "initial inoculation");
    Ok(())
}

fn deposit(canopy: &mut Canopy, deposits: DispersalUnits, label: &str) -> AlepResult<usize> {
    let mut nb_deposited = 0;
    for (vid, dus) in deposits {
        let organ = canopy.node_mut(vid)?;
        if !organ.label.starts_with(label) {
            continue;
        }
        for mut du in dus {
            du.deposited();
            nb_deposited += du.nb_dispersal_units as usize;
            organ.dispersal_units.push(du);
        }
    }
    Ok(nb_deposited)
}

/// Every active dispersal unit tries to infect the organ it sits on.
///
/// Successful units become lesions. Units that are no longer active are removed.
pub fn infect(
    canopy: &mut Canopy,
    dt: usize,
    infection_control: &dyn InfectionControl,
    label: &str,
    rng: &mut dyn RngCore,
) -> AlepResult<()> {
    for vid in canopy.vertices_with_label(label) {
        let organ = canopy.node_mut(vid)?;
        let mut dus = std::mem::take(&mut organ.dispersal_units);
        let mut lesions = Vec::new();
        for du in dus.iter_mut().filter(|du| du.is_active()) {
            if let Some(lesion) = du.infect(dt, organ, infection_control, rng) {
                lesions.push(lesion);
            }
        }
        dus.retain(DispersalUnit::is_active);
        organ.dispersal_units = dus;
        organ.lesions.extend(lesions);
    }
    Ok(())
}

/// Update every lesion against its leaf, drop dead lesions, then allocate growth.
///
/// A leaf whose microclimate holds a rain event registers it on its lesions.
pub fn update(
    canopy: &mut Canopy,
    dt: usize,
    growth_control: &dyn GrowthControl,
    label: &str,
) -> AlepResult<()> {
    for vid in canopy.vertices_with_label(label) {
        let organ = canopy.node_mut(vid)?;
        let mut lesions = std::mem::take(&mut organ.lesions);
        let raining = organ.microclimate.rain_duration > 0.0;
        for lesion in lesions.iter_mut() {
            lesion.update(dt, organ);
            if raining {
                lesion.register_rain_event();
            }
        }
        lesions.retain(|l| !l.is_dead());
        organ.lesions = lesions;
    }
    growth_control.control(canopy, label)
}

/// Emit the dispersal units of the lesions of `fungus_name`, transport them and deposit them
/// on the organs matching `label`.
#[allow(clippy::too_many_arguments)]
pub fn disperse(
    canopy: &mut Canopy,
    emission_model: &dyn EmissionModel,
    transport_model: &dyn TransportModel,
    fungus_name: &str,
    label: &str,
    weather: &WeatherWindow,
    rng: &mut dyn RngCore,
) -> AlepResult<()> {
    let emissions = emission_model.get_dispersal_units(canopy, fungus_name, label, weather)?;
    let nb_emitted: u64 = emissions
        .values()
        .flatten()
        .map(|du| du.nb_dispersal_units)
        .sum();
    let deposits = transport_model.disperse(canopy, emissions, label, rng)?;
    let nb_deposited = deposit(canopy, deposits, label)?;
    debug!(fungus = fungus_name, nb_emitted, nb_deposited, "dispersal");
    Ok(())
}

/// Compute washing rates, then wash the deposited dispersal units accordingly
pub fn wash(
    canopy: &mut Canopy,
    washing_model: &dyn WashingModel,
    global_rain_intensity: FloatValue,
    label: &str,
    rng: &mut dyn RngCore,
) -> AlepResult<()> {
    washing_model.compute_washing_rate(canopy, global_rain_intensity, label);
    for vid in canopy.vertices_with_label(label) {
        let organ = canopy.node_mut(vid)?;
        let washing_rate = organ.washing_rate;
        for du in organ.dispersal_units.iter_mut() {
            washing_model.wash(du, washing_rate, rng);
        }
        organ.dispersal_units.retain(DispersalUnit::is_active);
    }
    Ok(())
}

/// Allocate growth without priority between lesions.
///
/// When the total demand of a leaf exceeds its healthy surface, every lesion is capped at an
/// equal share of that surface. The healthy surface is then updated.
pub fn growth_control(canopy: &mut Canopy, label: &str) -> AlepResult<()> {
    for vid in canopy.vertices_with_label(label) {
        let organ = canopy.node_mut(vid)?;
        share_healthy_surface(organ);
        for lesion in organ.lesions.iter_mut() {
            let demand = lesion.growth_demand();
            lesion.control_growth(demand);
        }
        organ.refresh_healthy_surface();
    }
    Ok(())
}

fn share_healthy_surface(organ: &mut Organ) {
    if organ.lesions.is_empty() {
        return;
    }
    let total_demand: FloatValue = organ.lesions.iter().map(|l| l.growth_demand()).sum();
    if total_demand > organ.healthy_surface {
        let by_lesion = organ.healthy_surface / organ.lesions.len() as FloatValue;
        for lesion in organ.lesions.iter_mut() {
            if by_lesion < lesion.growth_demand() {
                lesion.growth_control(by_lesion);
            }
        }
    }
}

/// Bring inoculum from an external source onto the canopy
pub fn external_contamination(
    canopy: &mut Canopy,
    source: &dyn InoculumSource,
    contamination_model: &dyn ContaminationModel,
    weather: &WeatherWindow,
    label: &str,
    rng: &mut dyn RngCore,
) -> AlepResult<()> {
    let dus = source.emission(canopy, weather, rng);
    if dus.is_empty() {
        return Ok(());
    }
    let deposits = contamination_model.contaminate(canopy, dus, weather, label, rng)?;
    let nb_deposited = deposit(canopy, deposits, label)?;
    debug!(nb_deposited, "external contamination");
    Ok(())
}

/// Merge identical lesion cohorts and identical groups of dispersal units on every organ.
///
/// Dispersal units are only grouped for fungi with `group_dus` set.
pub fn group_duplicates_in_cohort(canopy: &mut Canopy) {
    let vids: Vec<_> = canopy.vertices().collect();
    for vid in vids {
        if let Ok(organ) = canopy.node_mut(vid) {
            organ.lesions = merge_duplicates(
                std::mem::take(&mut organ.lesions),
                |a: &Lesion, b| a.is_duplicate_of(b),
                |a: &mut Lesion, b| a.merge(b),
            );
            organ.dispersal_units = merge_duplicates(
                std::mem::take(&mut organ.dispersal_units),
                |a: &DispersalUnit, b| a.fungus().parameters.group_dus && a.is_duplicate_of(b),
                |a: &mut DispersalUnit, b| a.merge(b),
            );
        }
    }
}

fn merge_duplicates<T, D, M>(items: Vec<T>, is_duplicate: D, merge: M) -> Vec<T>
where
    D: Fn(&T, &T) -> bool,
    M: Fn(&mut T, T),
{
    let mut merged: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match merged.iter_mut().find(|m| is_duplicate(m, &item)) {
            Some(existing) => merge(existing, item),
            None => merged.push(item),
        }
    }
    merged
}
