//! Full disease cycles run through the protocol with minimal models.
//!
//! These tests check the invariants that must hold whatever the biology:
//! - lesions only develop on the organs selected by label
//! - the healthy surface of a leaf stays within its area
//! - dispersal units travel from sporulating lesions to other leaves

use alep_core::canopy::{Canopy, Organ, OrganKind, VertexId, LEAF_LABEL};
use alep_core::dispersal_unit::DispersalUnit;
use alep_core::errors::AlepResult;
use alep_core::fungus::{FloatValue, Fungus, FungusParameters};
use alep_core::lesion::{Lesion, LesionStatus};
use alep_core::models::{
    DispersalUnits, EmissionModel, GrowthControl, InfectionControl, InoculationModel,
    TransportModel, WashingModel,
};
use alep_core::protocol;
use alep_core::weather::{constant_weather, WeatherWindow};
use chrono::NaiveDate;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug)]
struct ToFirstLeaf;

impl InoculationModel for ToFirstLeaf {
    fn allocate(
        &self,
        canopy: &Canopy,
        stock: Vec<DispersalUnit>,
        label: &str,
        _rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits> {
        let mut deposits = DispersalUnits::new();
        if let Some(vid) = canopy.leaves(label).first() {
            deposits.insert(*vid, stock);
        }
        Ok(deposits)
    }
}

#[derive(Debug)]
struct AllSucceed;

impl InfectionControl for AllSucceed {
    fn successes(&self, du: &DispersalUnit, _leaf: &Organ, _rng: &mut dyn RngCore) -> u64 {
        du.nb_dispersal_units
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EqualShares;

#[typetag::serde]
impl GrowthControl for EqualShares {
    fn control(&self, canopy: &mut Canopy, label: &str) -> AlepResult<()> {
        protocol::growth_control(canopy, label)
    }
}

/// Every lesion with an available stock releases all of it
#[derive(Debug)]
struct ReleaseStock;

impl EmissionModel for ReleaseStock {
    fn get_dispersal_units(
        &self,
        canopy: &mut Canopy,
        fungus_name: &str,
        label: &str,
        _weather: &WeatherWindow,
    ) -> AlepResult<DispersalUnits> {
        let mut emissions = DispersalUnits::new();
        for vid in canopy.vertices_with_label(label) {
            let leaf = canopy.node_mut(vid)?;
            let mut lesions = std::mem::take(&mut leaf.lesions);
            for lesion in lesions.iter_mut() {
                if lesion.fungus_name() != fungus_name || !lesion.is_stock_available(leaf) {
                    continue;
                }
                let nb_spores_by_du = lesion.fungus().parameters.nb_spores_by_du;
                let stock = lesion.stock_spores();
                let nb_dus = (stock / nb_spores_by_du as FloatValue) as u64;
                let emitted = (nb_dus * nb_spores_by_du) as FloatValue;
                lesion.reduce_stock(emitted);
                lesion.update_empty_surface(emitted, stock);
                emissions.entry(vid).or_insert_with(Vec::new).push(
                    DispersalUnit::emitted(lesion.fungus().clone(), nb_dus, lesion.position),
                );
            }
            leaf.lesions = lesions;
        }
        Ok(emissions)
    }
}

/// Emitted units are shared evenly between the leaves
#[derive(Debug)]
struct SpreadEvenly;

impl TransportModel for SpreadEvenly {
    fn disperse(
        &self,
        canopy: &Canopy,
        emissions: DispersalUnits,
        label: &str,
        _rng: &mut dyn RngCore,
    ) -> AlepResult<DispersalUnits> {
        let leaves = canopy.leaves(label);
        let mut deposits = DispersalUnits::new();
        for mut du in emissions.into_values().flatten() {
            let share = du.nb_dispersal_units / leaves.len() as u64;
            for vid in &leaves {
                deposits.entry(*vid).or_insert_with(Vec::new).push(du.split(share));
            }
        }
        Ok(deposits)
    }
}

#[derive(Debug)]
struct WashAll;

impl WashingModel for WashAll {
    fn compute_washing_rate(
        &self,
        canopy: &mut Canopy,
        global_rain_intensity: FloatValue,
        label: &str,
    ) {
        canopy.for_each_organ_mut(label, |_, leaf| {
            leaf.washing_rate = if global_rain_intensity > 0.0 { 1.0 } else { 0.0 };
        });
    }

    fn wash(&self, du: &mut DispersalUnit, washing_rate: FloatValue, _rng: &mut dyn RngCore) {
        if washing_rate >= 1.0 {
            du.disable();
        }
    }
}

fn fungus() -> Arc<Fungus> {
    Arc::new(Fungus::new(
        "septoria",
        FungusParameters {
            wd_min: 2.0,
            degree_days_to_chlorosis: 20.0,
            degree_days_to_necrosis: 10.0,
            degree_days_to_sporulation: 5.0,
            smin: 0.1,
            smax: 1.0,
            growth_rate: 0.01,
            density_dus_emitted: 10.0,
            nb_spores_by_du: 10,
            nb_rain_events_to_empty: 100,
            ..Default::default()
        },
    ))
}

fn canopy() -> (Canopy, Vec<VertexId>) {
    let mut canopy = Canopy::new(((0.0, 0.0), (1.0, 1.0)));
    let root = canopy.root();
    let plant = canopy
        .add_child(root, Organ::new("plant1", OrganKind::Plant))
        .unwrap();
    let axis = canopy
        .add_child(plant, Organ::new("MS", OrganKind::Axis))
        .unwrap();
    let leaves = (1..=3)
        .map(|rank| {
            let mut leaf = Organ::leaf(1, rank, 3);
            leaf.area = 10.0;
            leaf.green_area = 10.0;
            leaf.healthy_surface = 10.0;
            leaf.height = 10.0 * rank as f64;
            canopy.add_child(axis, leaf).unwrap()
        })
        .collect();
    (canopy, leaves)
}

#[test]
fn epidemic_spreads_between_leaves() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let (mut canopy, leaves) = canopy();
    let start = NaiveDate::from_ymd_opt(2013, 4, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let weather = constant_weather(start, 12 * 10, 24.0, 90.0, 1.0);

    let stock = vec![DispersalUnit::emitted(fungus(), 5, None)];
    protocol::initiate(&mut canopy, stock, &ToFirstLeaf, LEAF_LABEL, &mut rng).unwrap();
    assert_eq!(canopy.node(leaves[0]).unwrap().dispersal_units.len(), 1);

    for step in 0..10 {
        let window = weather.window(step * 12..(step + 1) * 12).unwrap();
        canopy.set_microclimate(LEAF_LABEL, &window.microclimate());

        protocol::infect(&mut canopy, 12, &AllSucceed, LEAF_LABEL, &mut rng).unwrap();
        protocol::group_duplicates_in_cohort(&mut canopy);
        protocol::update(&mut canopy, 12, &EqualShares, LEAF_LABEL).unwrap();
        protocol::disperse(
            &mut canopy,
            &ReleaseStock,
            &SpreadEvenly,
            "septoria",
            LEAF_LABEL,
            &window,
            &mut rng,
        )
        .unwrap();

        for (_, organ) in canopy.organs() {
            assert!(organ.healthy_surface <= organ.area);
            if organ.kind != OrganKind::Leaf {
                assert!(organ.lesions.is_empty());
                assert!(organ.dispersal_units.is_empty());
            }
        }
    }

    let first = canopy.node(leaves[0]).unwrap();
    assert!(first.lesions.iter().map(|l| l.nb_lesions()).sum::<u64>() >= 5);
    for vid in &leaves[1..] {
        assert!(!canopy.node(*vid).unwrap().lesions.is_empty());
    }
    let severities = canopy.severity_by_leaf(LEAF_LABEL);
    assert!(severities[&leaves[0]] > 0.0);
}

#[test]
fn washing_removes_deposits() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let (mut canopy, leaves) = canopy();
    let stock = vec![DispersalUnit::emitted(fungus(), 5, None)];
    protocol::initiate(&mut canopy, stock, &ToFirstLeaf, LEAF_LABEL, &mut rng).unwrap();

    protocol::wash(&mut canopy, &WashAll, 0.0, LEAF_LABEL, &mut rng).unwrap();
    assert_eq!(canopy.node(leaves[0]).unwrap().dispersal_units.len(), 1);

    protocol::wash(&mut canopy, &WashAll, 2.0, LEAF_LABEL, &mut rng).unwrap();
    assert!(canopy.node(leaves[0]).unwrap().dispersal_units.is_empty());
}

#[test]
fn deposits_on_unselected_organs_are_dropped() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let (mut canopy, leaves) = canopy();
    let stock = vec![DispersalUnit::emitted(fungus(), 5, None)];
    protocol::initiate(&mut canopy, stock, &ToFirstLeaf, "Stem", &mut rng).unwrap();
    assert!(canopy.node(leaves[0]).unwrap().dispersal_units.is_empty());
}

#[test]
fn canopy_snapshot_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let (mut canopy, leaves) = canopy();
    canopy.node_mut(leaves[1]).unwrap().dispersal_units =
        vec![DispersalUnit::emitted(fungus(), 3, Some(5.0))];

    let path = dir.path().join("canopy.bin");
    alep_core::persist::save(&canopy, &path).unwrap();
    let loaded: Canopy = alep_core::persist::load(&path).unwrap();
    assert_eq!(loaded.len(), canopy.len());
    let du = &loaded.node(leaves[1]).unwrap().dispersal_units[0];
    assert_eq!(du.nb_dispersal_units, 3);
    assert_eq!(du.fungus().name, "septoria");
}

#[test]
fn emptied_lesions_stay_on_their_leaf() {
    let mut parameters = fungus().parameters.clone();
    parameters.smax = parameters.smin;
    parameters.nb_rain_events_to_empty = 1;
    let fungus = Arc::new(Fungus::new("septoria", parameters));

    let (mut canopy, leaves) = canopy();
    canopy.node_mut(leaves[0]).unwrap().lesions = vec![Lesion::new(fungus, 1, None)];
    let start = NaiveDate::from_ymd_opt(2013, 4, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let rainy = constant_weather(start, 36, 24.0, 90.0, 1.0);
    let window = rainy.window(0..36).unwrap();
    canopy.set_microclimate(LEAF_LABEL, &window.microclimate());

    // sporulation starts after 35 degree days, and the rain of the same step empties the lesion
    protocol::update(&mut canopy, 36, &EqualShares, LEAF_LABEL).unwrap();
    for _ in 0..3 {
        protocol::update(&mut canopy, 36, &EqualShares, LEAF_LABEL).unwrap();
    }

    let leaf = canopy.node(leaves[0]).unwrap();
    assert_eq!(leaf.lesions.len(), 1);
    let lesion = &leaf.lesions[0];
    assert_eq!(lesion.status(), LesionStatus::Empty);
    assert_eq!(lesion.stock_spores(), 0.0);
    assert!(!lesion.is_dead());
    assert!((lesion.surface_empty() - 0.1).abs() < 1e-12);
    assert!((leaf.healthy_surface - 9.9).abs() < 1e-12);
    assert!(canopy.severity_by_leaf(LEAF_LABEL)[&leaves[0]] > 0.0);
}
