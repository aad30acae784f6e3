//! Recording of disease variables on each leaf along a simulation
//!
//! The [`Recorder`] stores one [`LeafRecord`] per leaf per record date. After the simulation,
//! [`Recorder::post_treatment`] integrates the severity of each leaf over thermal time into an
//! audpc (area under the disease progress curve).

use crate::canopy::Canopy;
use crate::errors::{AlepError, AlepResult};
use crate::fungus::FloatValue;
use crate::persist;
use crate::weather::DATE_FORMAT;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// How the severity of a leaf is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeverityMeasure {
    /// Sporulating and emptied surface, as scored for septoria
    #[default]
    Sporulating,
    /// Every visible symptom, as scored for rusts
    Visible,
}

/// State of a leaf at a record date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafRecord {
    pub date: NaiveDateTime,
    pub degree_days: FloatValue,
    pub plant: usize,
    /// Leaf number from the top of the axis (1 = flag leaf)
    pub leaf: usize,
    pub area: FloatValue,
    pub green_area: FloatValue,
    pub senesced_area: FloatValue,
    pub height: FloatValue,
    pub healthy_surface: FloatValue,
    pub surface_inc: FloatValue,
    pub surface_chlo: FloatValue,
    pub surface_nec: FloatValue,
    pub surface_spo: FloatValue,
    pub surface_empty: FloatValue,
    pub nb_lesions: u64,
    pub nb_dus: u64,
    /// Diseased fraction of the leaf (%)
    pub severity: FloatValue,
    /// Necrotic fraction of the leaf, sporulating and emptied tissue included (%)
    pub necrosis_percentage: FloatValue,
}

impl LeafRecord {
    fn empty(date: NaiveDateTime, degree_days: FloatValue, plant: usize, leaf: usize) -> Self {
        Self {
            date,
            degree_days,
            plant,
            leaf,
            area: 0.0,
            green_area: 0.0,
            senesced_area: 0.0,
            height: 0.0,
            healthy_surface: 0.0,
            surface_inc: 0.0,
            surface_chlo: 0.0,
            surface_nec: 0.0,
            surface_spo: 0.0,
            surface_empty: 0.0,
            nb_lesions: 0,
            nb_dus: 0,
            severity: 0.0,
            necrosis_percentage: 0.0,
        }
    }

    pub fn surface_visible(&self) -> FloatValue {
        self.surface_chlo + self.surface_nec + self.surface_spo + self.surface_empty
    }

    fn percentage(&self, surface: FloatValue) -> FloatValue {
        if self.area > 0.0 {
            (surface * 100.0 / self.area).min(100.0)
        } else {
            0.0
        }
    }

    /// Name of the leaf counted from the top, e.g. `F1` for the flag leaf
    pub fn leaf_name(&self) -> String {
        format!("F{}", self.leaf)
    }
}

/// Area under the disease progress curve of a leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafAudpc {
    pub plant: usize,
    pub leaf: usize,
    pub audpc: FloatValue,
    /// Audpc relative to a leaf fully diseased from its emergence
    pub normalized_audpc: FloatValue,
}

/// A mean severity across plants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafSeverity {
    pub date: NaiveDateTime,
    pub degree_days: FloatValue,
    pub severity: FloatValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recorder {
    measure: SeverityMeasure,
    variety: Option<String>,
    records: Vec<LeafRecord>,
    audpc: Vec<LeafAudpc>,
}

const CSV_HEADER: &str = "date,degree_days,plant,leaf,area,green_area,senesced_area,height,\
healthy_surface,surface_inc,surface_chlo,surface_nec,surface_spo,surface_empty,nb_lesions,\
nb_dus,severity,necrosis_percentage,audpc,normalized_audpc,variety";

fn write_header<W: Write>(writer: &mut W, with_rep: bool) -> std::io::Result<()> {
    if with_rep {
        write!(writer, "rep,")?;
    }
    writeln!(writer, "{}", CSV_HEADER)
}

impl Recorder {
    pub fn new(measure: SeverityMeasure) -> Self {
        Self {
            measure,
            ..Default::default()
        }
    }

    pub fn records(&self) -> &[LeafRecord] {
        &self.records
    }

    pub fn audpc(&self) -> &[LeafAudpc] {
        &self.audpc
    }

    pub fn variety(&self) -> Option<&str> {
        self.variety.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record the state of every leaf matching `label`.
    ///
    /// Organs sharing a plant and a leaf rank are sectors of the same leaf and are summed into a
    /// single row. Height is the mean height of the sectors.
    pub fn record(
        &mut self,
        canopy: &Canopy,
        date: NaiveDateTime,
        degree_days: FloatValue,
        label: &str,
    ) -> AlepResult<()> {
        let mut leaves: BTreeMap<(usize, usize), (LeafRecord, usize)> = BTreeMap::new();
        for vid in canopy.vertices_with_label(label) {
            let organ = canopy.node(vid)?;
            let key = (organ.plant, organ.leaf_number_from_top());
            let (record, nb_sectors) = leaves.entry(key).or_insert_with(|| {
                (LeafRecord::empty(date, degree_days, key.0, key.1), 0)
            });
            *nb_sectors += 1;
            record.area += organ.area;
            record.green_area += organ.green_area;
            record.senesced_area += organ.senesced_area;
            record.height += organ.height;
            record.healthy_surface += organ.healthy_surface;
            for lesion in &organ.lesions {
                record.surface_inc += lesion.surface_inc();
                record.surface_chlo += lesion.surface_chlo();
                record.surface_nec += lesion.surface_nec();
                record.surface_spo += lesion.surface_spo();
                record.surface_empty += lesion.surface_empty();
                record.nb_lesions += lesion.nb_lesions();
            }
            record.nb_dus += organ
                .dispersal_units
                .iter()
                .map(|du| du.nb_dispersal_units)
                .sum::<u64>();
        }

        for (_, (mut record, nb_sectors)) in leaves {
            record.height /= nb_sectors as FloatValue;
            let diseased = match self.measure {
                SeverityMeasure::Sporulating => record.surface_spo + record.surface_empty,
                SeverityMeasure::Visible => record.surface_visible(),
            };
            record.severity = record.percentage(diseased);
            record.necrosis_percentage =
                record.percentage(record.surface_nec + record.surface_spo + record.surface_empty);
            self.records.push(record);
        }
        Ok(())
    }

    fn by_leaf(&self) -> BTreeMap<(usize, usize), Vec<&LeafRecord>> {
        let mut leaves: BTreeMap<(usize, usize), Vec<&LeafRecord>> = BTreeMap::new();
        for record in &self.records {
            leaves
                .entry((record.plant, record.leaf))
                .or_default()
                .push(record);
        }
        leaves
    }

    /// Compute the audpc of each leaf.
    ///
    /// The audpc is the trapezoidal integral of severity against degree days over the dates at
    /// which the leaf had emerged.
    pub fn post_treatment(&mut self, variety: &str) {
        let audpc = self
            .by_leaf()
            .into_iter()
            .map(|((plant, leaf), records)| {
                let emerged: Vec<_> = records.into_iter().filter(|r| r.area > 0.0).collect();
                let audpc: FloatValue = emerged
                    .windows(2)
                    .map(|w| {
                        (w[1].degree_days - w[0].degree_days) * (w[0].severity + w[1].severity)
                            / 2.0
                    })
                    .sum();
                let span = match (emerged.first(), emerged.last()) {
                    (Some(first), Some(last)) => last.degree_days - first.degree_days,
                    _ => 0.0,
                };
                let normalized_audpc = if span > 0.0 {
                    audpc / (100.0 * span)
                } else {
                    0.0
                };
                LeafAudpc {
                    plant,
                    leaf,
                    audpc,
                    normalized_audpc,
                }
            })
            .collect();
        self.audpc = audpc;
        self.variety = Some(variety.to_string());
    }

    /// Mean severity across plants, by leaf number and record date
    pub fn mean_by_leaf(&self) -> BTreeMap<usize, Vec<LeafSeverity>> {
        let mut sums: BTreeMap<(usize, NaiveDateTime), (FloatValue, FloatValue, usize)> =
            BTreeMap::new();
        for record in &self.records {
            let entry = sums
                .entry((record.leaf, record.date))
                .or_insert((record.degree_days, 0.0, 0));
            entry.1 += record.severity;
            entry.2 += 1;
        }
        let mut means: BTreeMap<usize, Vec<LeafSeverity>> = BTreeMap::new();
        for ((leaf, date), (degree_days, total, n)) in sums {
            means.entry(leaf).or_default().push(LeafSeverity {
                date,
                degree_days,
                severity: total / n as FloatValue,
            });
        }
        means
    }

    /// Mean normalised audpc across plants, by leaf number
    pub fn mean_audpc_by_leaf(&self) -> BTreeMap<usize, FloatValue> {
        let mut sums: BTreeMap<usize, (FloatValue, usize)> = BTreeMap::new();
        for audpc in &self.audpc {
            let entry = sums.entry(audpc.leaf).or_insert((0.0, 0));
            entry.0 += audpc.normalized_audpc;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(leaf, (total, n))| (leaf, total / n as FloatValue))
            .collect()
    }

    /// Write the records as CSV rows, optionally prefixed by a replicate number
    pub fn write_csv<W: Write>(
        &self,
        writer: &mut W,
        rep: Option<usize>,
        header: bool,
    ) -> std::io::Result<()> {
        if header {
            write_header(writer, rep.is_some())?;
        }
        let audpc: BTreeMap<(usize, usize), &LeafAudpc> =
            self.audpc.iter().map(|a| ((a.plant, a.leaf), a)).collect();
        let variety = self.variety.as_deref().unwrap_or("");
        for r in &self.records {
            if let Some(rep) = rep {
                write!(writer, "{},", rep)?;
            }
            let (leaf_audpc, normalized) = match audpc.get(&(r.plant, r.leaf)) {
                Some(a) => (a.audpc.to_string(), a.normalized_audpc.to_string()),
                None => (String::new(), String::new()),
            };
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                r.date.format(DATE_FORMAT),
                r.degree_days,
                r.plant,
                r.leaf_name(),
                r.area,
                r.green_area,
                r.senesced_area,
                r.height,
                r.healthy_surface,
                r.surface_inc,
                r.surface_chlo,
                r.surface_nec,
                r.surface_spo,
                r.surface_empty,
                r.nb_lesions,
                r.nb_dus,
                r.severity,
                r.necrosis_percentage,
                leaf_audpc,
                normalized,
                variety,
            )?;
        }
        Ok(())
    }

    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> AlepResult<()> {
        write_reps_csv(std::slice::from_ref(self), path, false)
    }

    /// Binary snapshot of the recorder, reloaded with [`Recorder::load`]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> AlepResult<()> {
        persist::save(self, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> AlepResult<Self> {
        persist::load(path)
    }
}

/// Write several recorders to a single CSV file.
///
/// With `with_rep` set, each row is prefixed by the index of its recorder.
pub fn write_reps_csv<P: AsRef<Path>>(
    recorders: &[Recorder],
    path: P,
    with_rep: bool,
) -> AlepResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| AlepError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for (i, recorder) in recorders.iter().enumerate() {
        let rep = with_rep.then_some(i);
        recorder
            .write_csv(&mut writer, rep, i == 0)
            .map_err(|e| AlepError::io(path, e))?;
    }
    if recorders.is_empty() {
        write_header(&mut writer, with_rep).map_err(|e| AlepError::io(path, e))?;
    }
    writer.flush().map_err(|e| AlepError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canopy::{Organ, LEAF_LABEL};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use is_close::is_close;

    fn date(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 5, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn recorder_with_severities(severities: &[(f64, f64)]) -> Recorder {
        let mut recorder = Recorder::new(SeverityMeasure::Sporulating);
        for (i, (dd, severity)) in severities.iter().enumerate() {
            recorder.records.push(LeafRecord {
                date: date(i as u32 + 1),
                degree_days: *dd,
                plant: 1,
                leaf: 1,
                area: 10.0,
                green_area: 10.0,
                senesced_area: 0.0,
                height: 50.0,
                healthy_surface: 10.0,
                surface_inc: 0.0,
                surface_chlo: 0.0,
                surface_nec: 0.0,
                surface_spo: 0.0,
                surface_empty: 0.0,
                nb_lesions: 0,
                nb_dus: 0,
                severity: *severity,
                necrosis_percentage: 0.0,
            });
        }
        recorder
    }

    #[test]
    fn audpc_is_a_trapezoid() {
        let mut recorder = recorder_with_severities(&[(0.0, 0.0), (10.0, 10.0), (20.0, 30.0)]);
        recorder.post_treatment("Mercia");
        let audpc = &recorder.audpc()[0];
        assert_relative_eq!(audpc.audpc, 50.0 + 200.0);
        assert_relative_eq!(audpc.normalized_audpc, 250.0 / 2000.0);
        assert_eq!(recorder.variety(), Some("Mercia"));
        assert_relative_eq!(recorder.mean_audpc_by_leaf()[&1], 0.125);
    }

    #[test]
    fn record_sums_leaf_sectors() {
        let mut canopy = Canopy::new(((0.0, 0.0), (1.0, 1.0)));
        let root = canopy.root();
        let mut leaf = Organ::leaf(2, 4, 4);
        leaf.area = 12.0;
        canopy.add_child(root, leaf).unwrap();
        canopy.add_child(root, Organ::leaf(2, 3, 4)).unwrap();
        let mut sector = Organ::leaf(2, 4, 4);
        sector.area = 8.0;
        canopy.add_child(root, sector).unwrap();

        let mut recorder = Recorder::new(SeverityMeasure::Visible);
        recorder.record(&canopy, date(1), 100.0, LEAF_LABEL).unwrap();
        assert_eq!(recorder.records().len(), 2);
        let record = &recorder.records()[0];
        assert_eq!(record.leaf_name(), "F1");
        assert_eq!(record.plant, 2);
        assert_eq!(record.area, 20.0);
        assert_eq!(record.severity, 0.0);
        assert_eq!(recorder.records()[1].leaf_name(), "F2");
    }

    #[test]
    fn mean_by_leaf() {
        let mut recorder = recorder_with_severities(&[(0.0, 10.0)]);
        let mut other = recorder.records[0].clone();
        other.plant = 2;
        other.severity = 30.0;
        recorder.records.push(other);
        let means = recorder.mean_by_leaf();
        assert_eq!(means[&1].len(), 1);
        assert!(is_close!(means[&1][0].severity, 20.0));
    }

    #[test]
    fn persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = recorder_with_severities(&[(0.0, 0.0), (10.0, 10.0)]);
        recorder.post_treatment("Tremie13");

        let path = dir.path().join("recorder.bin");
        recorder.save(&path).unwrap();
        let loaded = Recorder::load(&path).unwrap();
        assert_eq!(loaded.records(), recorder.records());
        assert_eq!(loaded.audpc(), recorder.audpc());

        let csv = dir.path().join("recorder.csv");
        write_reps_csv(&[recorder.clone(), recorder], &csv, true).unwrap();
        let text = std::fs::read_to_string(&csv).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("rep,date,degree_days"));
        assert!(lines[3].starts_with("1,2013-05-01 00:00:00,0,1,F1"));
        assert!(lines[4].ends_with(",Tremie13"));
    }

    #[test]
    fn empty_replicates_keep_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let with_rep = dir.path().join("with_rep.csv");
        write_reps_csv(&[], &with_rep, true).unwrap();
        let text = std::fs::read_to_string(&with_rep).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec![format!("rep,{}", CSV_HEADER)]);

        let without_rep = dir.path().join("without_rep.csv");
        write_reps_csv(&[], &without_rep, false).unwrap();
        let text = std::fs::read_to_string(&without_rep).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec![CSV_HEADER]);
    }

    #[test]
    fn load_missing_file() {
        let err = Recorder::load("/nonexistent/recorder.bin").unwrap_err();
        assert!(matches!(err, AlepError::Io { .. }));
    }
}
