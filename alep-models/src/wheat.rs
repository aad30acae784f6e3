//! A simple wheat canopy growing with thermal time
//!
//! The canopy is a stand of plants with a single main stem. Each leaf of the main stem is
//! split into sectors that carry the disease. Leaves appear at regular thermal time
//! intervals (the phyllochron), expand linearly to their final size, stay green for their
//! lifespan and then senesce.
//!
//! Growing a canopy can be costly for large stands, so a [`WheatArchive`] stores the
//! geometry reached at each growth iteration and replays it in later simulations.

use alep_core::canopy::{Canopy, Domain, Organ, OrganKind, VertexId, LEAF_LABEL};
use alep_core::errors::{AlepError, AlepResult};
use alep_core::fungus::FloatValue;
use alep_core::persist;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variety {
    Mercia,
    Rht3,
    Tremie12,
    Tremie13,
    /// Tremie13 with scaled architectural parameters
    Custom,
}

impl Variety {
    /// Variety from its numeric code in experimental designs
    pub fn from_code(code: usize) -> AlepResult<Self> {
        match code {
            1 => Ok(Variety::Mercia),
            2 => Ok(Variety::Rht3),
            3 => Ok(Variety::Tremie12),
            4 => Ok(Variety::Tremie13),
            _ => Err(AlepError::invalid_parameter(
                "variety",
                format!("unknown variety code {}", code),
            )),
        }
    }

    pub fn code(&self) -> Option<usize> {
        match self {
            Variety::Mercia => Some(1),
            Variety::Rht3 => Some(2),
            Variety::Tremie12 => Some(3),
            Variety::Tremie13 => Some(4),
            Variety::Custom => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Variety::Mercia => "Mercia",
            Variety::Rht3 => "Rht3",
            Variety::Tremie12 => "Tremie12",
            Variety::Tremie13 => "Tremie13",
            Variety::Custom => "Custom",
        }
    }
}

impl fmt::Display for Variety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Variety {
    type Err = AlepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mercia" => Ok(Variety::Mercia),
            "rht3" => Ok(Variety::Rht3),
            "tremie12" => Ok(Variety::Tremie12),
            "tremie13" => Ok(Variety::Tremie13),
            "custom" => Ok(Variety::Custom),
            _ => Err(AlepError::invalid_parameter(
                "variety",
                format!("unknown variety '{}'", s),
            )),
        }
    }
}

/// Multiplicative changes applied to a reference canopy to explore architectural scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioScales {
    /// Speed of leaf appearance (haun stage)
    #[serde(rename = "scale_HS")]
    pub scale_hs: FloatValue,
    #[serde(rename = "scale_leafSenescence")]
    pub scale_leaf_senescence: FloatValue,
    #[serde(rename = "scale_stemDim")]
    pub scale_stem_dim: FloatValue,
    #[serde(rename = "scale_leafDim_length")]
    pub scale_leaf_dim_length: FloatValue,
    #[serde(rename = "scale_leafDim_width")]
    pub scale_leaf_dim_width: FloatValue,
    /// Speed of leaf expansion
    #[serde(rename = "scale_leafRate")]
    pub scale_leaf_rate: FloatValue,
}

impl Default for ScenarioScales {
    fn default() -> Self {
        Self {
            scale_hs: 1.0,
            scale_leaf_senescence: 1.0,
            scale_stem_dim: 1.0,
            scale_leaf_dim_length: 1.0,
            scale_leaf_dim_width: 1.0,
            scale_leaf_rate: 1.0,
        }
    }
}

impl ScenarioScales {
    /// Reference scales with a single parameter changed
    pub fn with_scale(name: &str, value: FloatValue) -> AlepResult<Self> {
        let mut scales = Self::default();
        match name {
            "reference" => {}
            "scale_HS" => scales.scale_hs = value,
            "scale_leafSenescence" => scales.scale_leaf_senescence = value,
            "scale_stemDim" => scales.scale_stem_dim = value,
            "scale_leafDim_length" => scales.scale_leaf_dim_length = value,
            "scale_leafDim_width" => scales.scale_leaf_dim_width = value,
            "scale_leafRate" => scales.scale_leaf_rate = value,
            _ => {
                return Err(AlepError::invalid_parameter(
                    name,
                    "not a canopy scenario parameter",
                ))
            }
        }
        Ok(scales)
    }
}

/// Architecture and development of the main stem of a variety
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheatParameters {
    /// Final number of leaves on the main stem
    pub nff: usize,
    /// Thermal time between the appearance of two leaves (°C.day)
    pub phyllochron: FloatValue,
    /// Thermal time between sowing and the appearance of the first leaf (°C.day)
    pub emergence_delay: FloatValue,
    /// Final area of the largest leaf (cm²)
    pub max_leaf_area: FloatValue,
    /// Relative decrease of the final area per leaf below the largest leaf
    pub area_decrease: FloatValue,
    /// Number from the top of the largest leaf
    pub largest_leaf: usize,
    /// Thermal time to reach the final leaf size (°C.day)
    pub expansion_duration: FloatValue,
    /// Thermal time a leaf stays fully green once expanded (°C.day)
    pub leaf_lifespan: FloatValue,
    /// Thermal time from the first senescent tissue to a fully dead leaf (°C.day)
    pub senescence_duration: FloatValue,
    /// Length of the internode below each leaf (cm)
    pub internode_length: FloatValue,
    pub scales: ScenarioScales,
}

impl Default for WheatParameters {
    fn default() -> Self {
        Self {
            nff: 12,
            phyllochron: 110.0,
            emergence_delay: 150.0,
            max_leaf_area: 30.0,
            area_decrease: 0.12,
            largest_leaf: 2,
            expansion_duration: 110.0,
            leaf_lifespan: 400.0,
            senescence_duration: 200.0,
            internode_length: 6.0,
            scales: ScenarioScales::default(),
        }
    }
}

impl WheatParameters {
    pub fn for_variety(variety: Variety) -> Self {
        let reference = Self::default();
        match variety {
            Variety::Mercia => reference,
            Variety::Rht3 => Self {
                nff: 11,
                max_leaf_area: 26.0,
                internode_length: 3.5,
                ..reference
            },
            Variety::Tremie12 => Self {
                nff: 13,
                phyllochron: 100.0,
                max_leaf_area: 35.0,
                leaf_lifespan: 380.0,
                ..reference
            },
            Variety::Tremie13 | Variety::Custom => Self {
                nff: 11,
                phyllochron: 115.0,
                max_leaf_area: 32.0,
                leaf_lifespan: 420.0,
                ..reference
            },
        }
    }

    /// Parameters of a custom canopy derived from Tremie13
    pub fn custom(scales: ScenarioScales) -> Self {
        Self {
            scales,
            ..Self::for_variety(Variety::Custom)
        }
    }

    /// Thermal time of appearance of the leaf of a given rank
    pub fn appearance(&self, rank: usize) -> FloatValue {
        self.emergence_delay + self.phyllochron * (rank as FloatValue - 1.0) / self.scales.scale_hs
    }

    /// Final area of the leaf of a given rank
    pub fn final_area(&self, rank: usize) -> FloatValue {
        let from_top = (self.nff + 1).saturating_sub(rank);
        let distance = from_top.abs_diff(self.largest_leaf) as FloatValue;
        let relative = (1.0 - self.area_decrease * distance).max(0.1);
        self.max_leaf_area
            * relative
            * self.scales.scale_leaf_dim_length
            * self.scales.scale_leaf_dim_width
    }

    /// Geometry of the leaf of a given rank at thermal time `degree_days`
    pub fn leaf_geometry(&self, rank: usize, degree_days: FloatValue) -> LeafGeometry {
        let appearance = self.appearance(rank);
        if degree_days < appearance {
            return LeafGeometry::default();
        }
        let expansion = self.expansion_duration / self.scales.scale_leaf_rate;
        let expanded = ((degree_days - appearance) / expansion).clamp(0.0, 1.0);
        let area = self.final_area(rank) * expanded;

        let senescence_start =
            appearance + expansion + self.leaf_lifespan * self.scales.scale_leaf_senescence;
        let senesced_fraction = if self.senescence_duration > 0.0 {
            ((degree_days - senescence_start) / self.senescence_duration).clamp(0.0, 1.0)
        } else if degree_days >= senescence_start {
            1.0
        } else {
            0.0
        };
        let senesced_area = area * senesced_fraction;

        // Stem elongation follows the appearance of the upper leaves
        let elongated = (0..rank)
            .map(|r| ((degree_days - self.appearance(r + 1)) / expansion).clamp(0.0, 1.0))
            .sum::<FloatValue>();
        LeafGeometry {
            area,
            green_area: area - senesced_area,
            senesced_area,
            height: elongated * self.internode_length * self.scales.scale_stem_dim,
        }
    }
}

/// Geometric state of a leaf sector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LeafGeometry {
    pub area: FloatValue,
    pub green_area: FloatValue,
    pub senesced_area: FloatValue,
    pub height: FloatValue,
}

impl LeafGeometry {
    fn apply(&self, organ: &mut Organ) {
        organ.area = self.area;
        organ.green_area = self.green_area;
        organ.senesced_area = self.senesced_area;
        organ.height = self.height;
        organ.refresh_healthy_surface();
    }
}

/// A stand of wheat plants on a square plot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WheatStand {
    pub parameters: WheatParameters,
    pub nplants: usize,
    /// Number of sectors per leaf
    pub nsect: usize,
    pub domain: Domain,
}

impl WheatStand {
    /// Plants per m² used to size the plot
    pub const PLANT_DENSITY: FloatValue = 250.0;

    pub fn new(parameters: WheatParameters, nplants: usize, nsect: usize) -> Self {
        let side = (nplants as FloatValue / Self::PLANT_DENSITY).sqrt();
        Self {
            parameters,
            nplants,
            nsect: nsect.max(1),
            domain: ((0.0, 0.0), (side, side)),
        }
    }

    pub fn for_variety(variety: Variety, nplants: usize, nsect: usize) -> Self {
        Self::new(WheatParameters::for_variety(variety), nplants, nsect)
    }

    /// Build the canopy graph, with every leaf not yet emerged
    pub fn init_canopy(&self) -> AlepResult<Canopy> {
        let mut canopy = Canopy::new(self.domain);
        let root = canopy.root();
        let nff = self.parameters.nff;
        for plant in 1..=self.nplants {
            let mut plant_organ = Organ::new(format!("plant{}", plant), OrganKind::Plant);
            plant_organ.plant = plant;
            let plant_vid = canopy.add_child(root, plant_organ)?;

            let mut axis = Organ::new("MS", OrganKind::Axis);
            axis.plant = plant;
            let axis_vid = canopy.add_child(plant_vid, axis)?;
            for rank in 1..=nff {
                for _ in 0..self.nsect {
                    canopy.add_child(axis_vid, Organ::leaf(plant, rank, nff))?;
                }
            }
        }
        Ok(canopy)
    }

    /// Update the geometry of every leaf sector to thermal time `degree_days`
    pub fn grow(&self, canopy: &mut Canopy, degree_days: FloatValue) -> AlepResult<()> {
        let nsect = self.nsect as FloatValue;
        canopy.for_each_organ_mut(LEAF_LABEL, |_, organ| {
            let mut geometry = self.parameters.leaf_geometry(organ.rank, degree_days);
            geometry.area /= nsect;
            geometry.green_area /= nsect;
            geometry.senesced_area /= nsect;
            geometry.apply(organ);
        });
        Ok(())
    }

    fn geometry(&self, canopy: &Canopy) -> AlepResult<Vec<(VertexId, LeafGeometry)>> {
        canopy
            .vertices_with_label(LEAF_LABEL)
            .into_iter()
            .map(|vid| {
                let organ = canopy.node(vid)?;
                Ok((
                    vid,
                    LeafGeometry {
                        area: organ.area,
                        green_area: organ.green_area,
                        senesced_area: organ.senesced_area,
                        height: organ.height,
                    },
                ))
            })
            .collect()
    }
}

/// Directory of canopy geometries, one file per growth iteration
#[derive(Debug, Clone)]
pub struct WheatArchive {
    dir: PathBuf,
}

impl WheatArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Archive of the reconstruction of a variety for a given year and stand size
    pub fn wheat_path(
        root: impl AsRef<Path>,
        year: i32,
        variety: Variety,
        nplants: usize,
        nsect: usize,
        rep: Option<usize>,
    ) -> PathBuf {
        let mut name = format!(
            "{}_{}_{}pl_{}sect",
            variety.name().to_lowercase(),
            year,
            nplants,
            nsect
        );
        if let Some(rep) = rep {
            name.push_str(&format!("_rep{}", rep));
        }
        root.as_ref().join(name)
    }

    /// One archive per replicate of a reconstruction
    pub fn replicates(
        root: impl AsRef<Path>,
        year: i32,
        variety: Variety,
        nplants: usize,
        nsect: usize,
        nreps: usize,
    ) -> Vec<Self> {
        (0..nreps)
            .map(|rep| {
                Self::new(Self::wheat_path(
                    root.as_ref(),
                    year,
                    variety,
                    nplants,
                    nsect,
                    Some(rep),
                ))
            })
            .collect()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn iteration_path(&self, iteration: usize) -> PathBuf {
        self.dir.join(format!("{:04}.bin", iteration))
    }

    /// Whether the geometry of a growth iteration has been stored
    pub fn contains(&self, iteration: usize) -> bool {
        self.iteration_path(iteration).exists()
    }

    /// Bring the canopy to the geometry of a growth iteration.
    ///
    /// The stored geometry is used when present, otherwise the stand is grown and the result
    /// stored. Lesions and dispersal units on the leaves are left untouched.
    pub fn grow_canopy(
        &self,
        canopy: &mut Canopy,
        stand: &WheatStand,
        iteration: usize,
        degree_days: FloatValue,
    ) -> AlepResult<()> {
        let path = self.iteration_path(iteration);
        if path.exists() {
            let geometry: Vec<(VertexId, LeafGeometry)> = persist::load(&path)?;
            for (vid, leaf) in geometry {
                leaf.apply(canopy.node_mut(vid)?);
            }
            debug!(iteration, "canopy loaded");
            return Ok(());
        }
        stand.grow(canopy, degree_days)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| AlepError::io(&self.dir, e))?;
        persist::save(&stand.geometry(canopy)?, &path)?;
        debug!(iteration, degree_days, "canopy grown");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn variety_codes() {
        assert_eq!(Variety::from_code(2).unwrap(), Variety::Rht3);
        assert!(Variety::from_code(5).is_err());
        assert_eq!("tremie13".parse::<Variety>().unwrap(), Variety::Tremie13);
        assert_eq!(Variety::Tremie12.code(), Some(3));
        assert!("durum".parse::<Variety>().is_err());
    }

    #[test]
    fn scenario_scales_from_config() {
        let scales: ScenarioScales =
            toml::from_str("scale_HS = 0.9\nscale_leafRate = 1.5").unwrap();
        assert_eq!(scales.scale_hs, 0.9);
        assert_eq!(scales.scale_leaf_rate, 1.5);
        assert_eq!(scales.scale_stem_dim, 1.0);

        assert_eq!(
            ScenarioScales::with_scale("scale_stemDim", 1.3)
                .unwrap()
                .scale_stem_dim,
            1.3
        );
        assert!(ScenarioScales::with_scale("tiller_probability", 0.8).is_err());
    }

    #[test]
    fn leaf_life_cycle() {
        let parameters = WheatParameters::default();
        let appearance = parameters.appearance(3);
        assert_eq!(parameters.leaf_geometry(3, appearance - 1.0).area, 0.0);

        let expanded = parameters.leaf_geometry(3, appearance + 200.0);
        assert_relative_eq!(expanded.area, parameters.final_area(3));
        assert_relative_eq!(expanded.green_area, expanded.area);

        let dead = parameters.leaf_geometry(3, appearance + 2000.0);
        assert_relative_eq!(dead.green_area, 0.0);
        assert_relative_eq!(dead.senesced_area, dead.area);
        assert!(expanded.height > parameters.leaf_geometry(3, appearance + 10.0).height);
    }

    #[test]
    fn upper_leaves_are_larger() {
        let parameters = WheatParameters::default();
        let nff = parameters.nff;
        assert!(parameters.final_area(nff - 1) > parameters.final_area(1));
        let wide = WheatParameters::custom(ScenarioScales {
            scale_leaf_dim_width: 1.2,
            ..Default::default()
        });
        let reference = WheatParameters::custom(ScenarioScales::default());
        assert_relative_eq!(wide.final_area(2) / reference.final_area(2), 1.2);
    }

    #[test]
    fn stand_structure() {
        let stand = WheatStand::for_variety(Variety::Mercia, 3, 2);
        let mut canopy = stand.init_canopy().unwrap();
        assert_eq!(canopy.vertices_with_label(LEAF_LABEL).len(), 3 * 12 * 2);
        assert!(canopy.leaves(LEAF_LABEL).is_empty());
        assert_relative_eq!(canopy.domain_area, 3.0 / WheatStand::PLANT_DENSITY);

        stand.grow(&mut canopy, 800.0).unwrap();
        assert!(!canopy.leaves(LEAF_LABEL).is_empty());
        let sector = canopy.node(canopy.leaves(LEAF_LABEL)[0]).unwrap();
        assert_relative_eq!(sector.healthy_surface, sector.area);
    }

    #[test]
    fn archive_replays_geometry() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = WheatArchive::wheat_path(tmp.path(), 2004, Variety::Mercia, 2, 1, Some(0));
        assert!(dir.ends_with("mercia_2004_2pl_1sect_rep0"));
        let archive = WheatArchive::new(dir);
        let stand = WheatStand::for_variety(Variety::Mercia, 2, 1);

        let mut grown = stand.init_canopy().unwrap();
        archive.grow_canopy(&mut grown, &stand, 1, 900.0).unwrap();
        assert!(archive.contains(1));

        // A different thermal time is ignored once the iteration is stored
        let mut replayed = stand.init_canopy().unwrap();
        archive.grow_canopy(&mut replayed, &stand, 1, 100.0).unwrap();
        assert_relative_eq!(
            replayed.total_leaf_area(LEAF_LABEL),
            grown.total_leaf_area(LEAF_LABEL)
        );
    }
}
