//! Canopy graph
//!
//! The canopy is a rooted directed graph of plant organs (stand → plant → axis → leaf).
//! Every organ carries the mutable properties read and written by the disease protocol:
//! geometry, microclimate, lesions and deposited dispersal units.
//!
//! Protocol steps select the organs they act on by label prefix, in the same way for every
//! step (see [`Canopy::vertices_with_label`]).

use crate::dispersal_unit::DispersalUnit;
use crate::errors::{AlepError, AlepResult};
use crate::fungus::FloatValue;
use crate::lesion::Lesion;
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use petgraph::Graph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of an organ in the canopy
pub type VertexId = NodeIndex;

/// Label prefix of the leaf organs targeted by the disease protocol
pub const LEAF_LABEL: &str = "LeafElement";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrganKind {
    Stand,
    Plant,
    Axis,
    Leaf,
}

/// Weather seen by an organ during the current time step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Microclimate {
    /// Hourly air temperature (°C)
    pub temperature_sequence: Vec<FloatValue>,
    /// Hourly leaf wetness
    pub wetness_sequence: Vec<bool>,
    /// Hourly relative humidity (%)
    pub relative_humidity_sequence: Vec<FloatValue>,
    /// Hourly thermal time increments (degree days)
    pub dd_sequence: Vec<FloatValue>,
    /// Mean rain intensity of the last rain event (mm/h)
    pub rain_intensity: FloatValue,
    /// Duration of the last rain event (h)
    pub rain_duration: FloatValue,
    /// Mean wind speed (m/s)
    pub wind_speed: FloatValue,
}

/// A plant organ and its properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organ {
    pub label: String,
    pub kind: OrganKind,
    /// Index of the plant the organ belongs to (0 for the stand)
    pub plant: usize,
    /// Leaf rank counted from the base of the axis (1 = first leaf), 0 for other organs
    pub rank: usize,
    /// Final number of leaves on the axis
    pub nff: usize,
    /// Total area (cm²)
    pub area: FloatValue,
    pub green_area: FloatValue,
    pub senesced_area: FloatValue,
    /// Height of the organ centre above the soil (cm)
    pub height: FloatValue,
    /// Green area not covered by lesions (cm²)
    pub healthy_surface: FloatValue,
    pub washing_rate: FloatValue,
    pub severity: FloatValue,
    pub color: Option<[u8; 3]>,
    pub microclimate: Microclimate,
    pub lesions: Vec<Lesion>,
    pub dispersal_units: Vec<DispersalUnit>,
}

impl Organ {
    pub fn new(label: impl Into<String>, kind: OrganKind) -> Self {
        Self {
            label: label.into(),
            kind,
            plant: 0,
            rank: 0,
            nff: 0,
            area: 0.0,
            green_area: 0.0,
            senesced_area: 0.0,
            height: 0.0,
            healthy_surface: 0.0,
            washing_rate: 0.0,
            severity: 0.0,
            color: None,
            microclimate: Microclimate::default(),
            lesions: vec![],
            dispersal_units: vec![],
        }
    }

    /// A leaf of a given rank on an axis of `nff` leaves
    pub fn leaf(plant: usize, rank: usize, nff: usize) -> Self {
        Self {
            plant,
            rank,
            nff,
            ..Self::new(LEAF_LABEL, OrganKind::Leaf)
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == OrganKind::Leaf
    }

    /// Leaf number counted from the top of the axis (1 = flag leaf)
    pub fn leaf_number_from_top(&self) -> usize {
        (self.nff + 1).saturating_sub(self.rank)
    }

    pub fn senesced_fraction(&self) -> FloatValue {
        if self.area > 0.0 {
            (self.senesced_area / self.area).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// A leaf that has emerged and has no green tissue left
    pub fn is_senescent(&self) -> bool {
        self.area > 0.0 && self.green_area <= 0.0
    }

    /// Total surface of the lesions of the organ
    pub fn lesion_surface(&self) -> FloatValue {
        self.lesions.iter().map(|l| l.surface()).sum()
    }

    /// Recompute the healthy surface from the lesion surfaces
    pub fn refresh_healthy_surface(&mut self) {
        self.healthy_surface = (self.area - self.lesion_surface()).max(0.0);
    }
}

/// Green-yellow-red colormap used to display severities
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Colormap {
    levels: usize,
}

impl Colormap {
    pub fn green_yellow_red(levels: usize) -> Self {
        Self {
            levels: levels.max(2),
        }
    }

    /// Color of a value normalised to [0, 1]
    pub fn color(&self, normalised: FloatValue) -> [u8; 3] {
        let steps = (self.levels - 1) as FloatValue;
        let x = (normalised.clamp(0.0, 1.0) * steps).round() / steps;
        if x <= 0.5 {
            [(x * 2.0 * 255.0).round() as u8, 255, 0]
        } else {
            [255, ((1.0 - x) * 2.0 * 255.0).round() as u8, 0]
        }
    }
}

/// Color of dead leaves when displaying severity
pub const SENESCENT_COLOR: [u8; 3] = [157, 72, 7];

/// Lower-left and upper-right corners of the simulated domain (m)
pub type Domain = ((FloatValue, FloatValue), (FloatValue, FloatValue));

/// Rooted graph of the organs of a canopy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canopy {
    graph: Graph<Organ, ()>,
    root: VertexId,
    /// Area of the soil covered by the simulated domain (m²)
    pub domain_area: FloatValue,
    pub domain: Domain,
}

impl Canopy {
    /// Create a canopy holding a single stand organ
    pub fn new(domain: Domain) -> Self {
        let ((x0, y0), (x1, y1)) = domain;
        let mut graph = Graph::new();
        let root = graph.add_node(Organ::new("stand", OrganKind::Stand));
        Self {
            graph,
            root,
            domain_area: ((x1 - x0) * (y1 - y0)).abs(),
            domain,
        }
    }

    pub fn root(&self) -> VertexId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn add_child(&mut self, parent: VertexId, organ: Organ) -> AlepResult<VertexId> {
        if self.graph.node_weight(parent).is_none() {
            return Err(AlepError::UnknownVertex(parent.index()));
        }
        let child = self.graph.add_node(organ);
        self.graph.add_edge(parent, child, ());
        Ok(child)
    }

    pub fn node(&self, vid: VertexId) -> AlepResult<&Organ> {
        self.graph
            .node_weight(vid)
            .ok_or(AlepError::UnknownVertex(vid.index()))
    }

    pub fn node_mut(&mut self, vid: VertexId) -> AlepResult<&mut Organ> {
        self.graph
            .node_weight_mut(vid)
            .ok_or(AlepError::UnknownVertex(vid.index()))
    }

    pub fn label(&self, vid: VertexId) -> AlepResult<&str> {
        self.node(vid).map(|organ| organ.label.as_str())
    }

    pub fn parent(&self, vid: VertexId) -> Option<VertexId> {
        self.graph
            .neighbors_directed(vid, Direction::Incoming)
            .next()
    }

    pub fn children(&self, vid: VertexId) -> Vec<VertexId> {
        let mut children: Vec<_> = self
            .graph
            .neighbors_directed(vid, Direction::Outgoing)
            .collect();
        children.sort();
        children
    }

    /// All vertices, in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.node_indices()
    }

    pub fn organs(&self) -> impl Iterator<Item = (VertexId, &Organ)> {
        self.graph
            .node_indices()
            .map(move |vid| (vid, &self.graph[vid]))
    }

    /// Vertices whose label starts with `label`
    pub fn vertices_with_label(&self, label: &str) -> Vec<VertexId> {
        self.graph
            .node_indices()
            .filter(|vid| self.graph[*vid].label.starts_with(label))
            .collect()
    }

    /// Leaves matching `label` that have emerged
    pub fn leaves(&self, label: &str) -> Vec<VertexId> {
        self.vertices_with_label(label)
            .into_iter()
            .filter(|vid| self.graph[*vid].area > 0.0)
            .collect()
    }

    pub fn total_leaf_area(&self, label: &str) -> FloatValue {
        self.vertices_with_label(label)
            .into_iter()
            .map(|vid| self.graph[vid].area)
            .sum()
    }

    pub fn total_green_area(&self, label: &str) -> FloatValue {
        self.vertices_with_label(label)
            .into_iter()
            .map(|vid| self.graph[vid].green_area)
            .sum()
    }

    /// Height of the highest organ matching `label`
    pub fn max_height(&self, label: &str) -> FloatValue {
        self.leaves(label)
            .into_iter()
            .map(|vid| self.graph[vid].height)
            .fold(0.0, FloatValue::max)
    }

    /// Set the same microclimate on every organ matching `label`
    pub fn set_microclimate(&mut self, label: &str, microclimate: &Microclimate) {
        for vid in self.vertices_with_label(label) {
            self.graph[vid].microclimate = microclimate.clone();
        }
    }

    /// Apply `f` to every organ matching `label`
    pub fn for_each_organ_mut<F>(&mut self, label: &str, mut f: F)
    where
        F: FnMut(VertexId, &mut Organ),
    {
        for vid in self.vertices_with_label(label) {
            f(vid, &mut self.graph[vid]);
        }
    }

    /// Severity (%) of each leaf matching `label`.
    ///
    /// Severity is the sporulating and emptied lesion surface relative to the leaf area.
    /// The value is also stored in the `severity` property of each leaf.
    pub fn severity_by_leaf(&mut self, label: &str) -> BTreeMap<VertexId, FloatValue> {
        let mut severities = BTreeMap::new();
        for vid in self.vertices_with_label(label) {
            let leaf = &mut self.graph[vid];
            let severity = if leaf.area > 0.0 {
                let diseased: FloatValue = leaf
                    .lesions
                    .iter()
                    .map(|l| l.surface_spo() + l.surface_empty())
                    .sum();
                (diseased * 100.0 / leaf.area).min(100.0)
            } else {
                0.0
            };
            leaf.severity = severity;
            severities.insert(vid, severity);
        }
        severities
    }

    /// Store a color on each organ of `values` according to `colormap`.
    ///
    /// Values are normalised by `vmax`. Senescent leaves are colored brown when
    /// `senescence` is set.
    pub fn apply_colormap(
        &mut self,
        values: &BTreeMap<VertexId, FloatValue>,
        colormap: Colormap,
        vmax: FloatValue,
        senescence: bool,
    ) -> AlepResult<()> {
        if vmax <= 0.0 {
            return Err(AlepError::invalid_parameter("vmax", "must be positive"));
        }
        for (vid, value) in values {
            let organ = self.node_mut(*vid)?;
            organ.color = if senescence && organ.is_senescent() {
                Some(SENESCENT_COLOR)
            } else {
                Some(colormap.color(value / vmax))
            };
        }
        Ok(())
    }

    /// Graphviz representation of the organ hierarchy
    pub fn as_dot(&self) -> String {
        let labels = self.graph.map(|_, organ| organ.label.clone(), |_, _| ());
        format!("{:?}", Dot::with_config(&labels, &[Config::EdgeNoLabel]))
    }
}
