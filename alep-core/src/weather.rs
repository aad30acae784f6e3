//! Hourly weather data
//!
//! Weather is read from a comma separated file with a header line. The required columns are
//! `date` (`%Y-%m-%d %H:%M:%S`), `temperature_air` (°C), `relative_humidity` (%) and `rain`
//! (mm/h). `wind_speed` (m/s) is optional and defaults to 0.
//!
//! Leaf wetness and cumulative thermal time are derived when the weather is built.

use crate::canopy::Microclimate;
use crate::errors::{AlepError, AlepResult};
use crate::fungus::FloatValue;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Relative humidity (%) above which leaves are considered wet
pub const WETNESS_RELATIVE_HUMIDITY: FloatValue = 85.0;

/// A single hourly weather record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub date: NaiveDateTime,
    pub temperature_air: FloatValue,
    pub relative_humidity: FloatValue,
    pub rain: FloatValue,
    pub wind_speed: FloatValue,
}

impl WeatherRecord {
    pub fn is_wet(&self) -> bool {
        self.rain > 0.0 || self.relative_humidity >= WETNESS_RELATIVE_HUMIDITY
    }
}

/// Linear degree day model with a base temperature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegreeDayModel {
    pub t_base: FloatValue,
}

impl Default for DegreeDayModel {
    fn default() -> Self {
        Self { t_base: 0.0 }
    }
}

impl DegreeDayModel {
    pub fn new(t_base: FloatValue) -> Self {
        Self { t_base }
    }

    /// Thermal time accumulated during one hour at `temperature`
    pub fn hourly(&self, temperature: FloatValue) -> FloatValue {
        (temperature - self.t_base).max(0.0) / 24.0
    }
}

const REQUIRED_COLUMNS: [&str; 4] = ["date", "temperature_air", "relative_humidity", "rain"];

/// An hourly weather series with its derived variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weather {
    records: Vec<WeatherRecord>,
    wetness: Vec<bool>,
    /// Cumulative degree days at the end of each hour
    degree_days: Vec<FloatValue>,
    model: DegreeDayModel,
}

impl Weather {
    pub fn from_records(records: Vec<WeatherRecord>, model: DegreeDayModel) -> Self {
        let wetness = records.iter().map(WeatherRecord::is_wet).collect();
        let degree_days = records
            .iter()
            .scan(0.0, |total, r| {
                *total += model.hourly(r.temperature_air);
                Some(*total)
            })
            .collect();
        Self {
            records,
            wetness,
            degree_days,
            model,
        }
    }

    pub fn from_csv(path: impl AsRef<Path>, model: DegreeDayModel) -> AlepResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| AlepError::io(path, e))?;
        Self::from_reader(BufReader::new(file), model)
    }

    pub fn from_reader<R: BufRead>(reader: R, model: DegreeDayModel) -> AlepResult<Self> {
        let mut lines = reader.lines().enumerate();
        let header = match lines.next() {
            Some((_, line)) => line.map_err(|e| AlepError::WeatherFormat {
                line: 1,
                message: e.to_string(),
            })?,
            None => {
                return Err(AlepError::WeatherFormat {
                    line: 1,
                    message: "empty weather file".to_string(),
                })
            }
        };
        let columns: Vec<String> = header.split(',').map(|c| c.trim().to_string()).collect();
        let position = |name: &str| columns.iter().position(|c| c == name);

        let mut indices = [0usize; 4];
        for (index, name) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
            *index =
                position(name).ok_or_else(|| AlepError::MissingWeatherColumn(name.to_string()))?;
        }
        let wind_index = position("wind_speed");

        let mut records = Vec::new();
        for (i, line) in lines {
            let line_number = i + 1;
            let line = line.map_err(|e| AlepError::WeatherFormat {
                line: line_number,
                message: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let field = |index: usize| {
                fields.get(index).copied().ok_or_else(|| AlepError::WeatherFormat {
                    line: line_number,
                    message: format!("expected {} fields, found {}", columns.len(), fields.len()),
                })
            };
            let number = |index: usize| -> AlepResult<FloatValue> {
                let value = field(index)?;
                value.parse().map_err(|_| AlepError::WeatherFormat {
                    line: line_number,
                    message: format!("invalid number '{}' in column '{}'", value, columns[index]),
                })
            };

            let date_field = field(indices[0])?;
            let date = NaiveDateTime::parse_from_str(date_field, DATE_FORMAT).map_err(|e| {
                AlepError::WeatherFormat {
                    line: line_number,
                    message: format!("invalid date '{}': {}", date_field, e),
                }
            })?;
            records.push(WeatherRecord {
                date,
                temperature_air: number(indices[1])?,
                relative_humidity: number(indices[2])?,
                rain: number(indices[3])?,
                wind_speed: match wind_index {
                    Some(index) => number(index)?,
                    None => 0.0,
                },
            });
        }
        Ok(Self::from_records(records, model))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn degree_day_model(&self) -> DegreeDayModel {
        self.model
    }

    pub fn wetness(&self) -> &[bool] {
        &self.wetness
    }

    /// Cumulative degree days at the end of each hour
    pub fn degree_days(&self) -> &[FloatValue] {
        &self.degree_days
    }

    /// Records dated within `[start, end]`, with thermal time restarted at `start`
    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> AlepResult<Self> {
        let records: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect();
        if records.is_empty() {
            return Err(AlepError::Error(format!(
                "No weather data between {} and {}",
                start, end
            )));
        }
        Ok(Self::from_records(records, self.model))
    }

    /// Weather over a range of hours
    pub fn window(&self, range: Range<usize>) -> AlepResult<WeatherWindow> {
        if range.start >= range.end || range.end > self.records.len() {
            return Err(AlepError::WeatherOutOfRange {
                start: range.start,
                end: range.end,
                len: self.records.len(),
            });
        }
        let previous_dd = if range.start == 0 {
            0.0
        } else {
            self.degree_days[range.start - 1]
        };
        let degree_days = self.degree_days[range.clone()].to_vec();
        let mut last = previous_dd;
        let dd_sequence = degree_days
            .iter()
            .map(|dd| {
                let increment = dd - last;
                last = *dd;
                increment
            })
            .collect();
        Ok(WeatherWindow {
            start: range.start,
            records: self.records[range.clone()].to_vec(),
            wetness: self.wetness[range].to_vec(),
            degree_days,
            dd_sequence,
        })
    }
}

/// Weather seen during a time step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherWindow {
    /// Index of the first hour in the full weather series
    pub start: usize,
    pub records: Vec<WeatherRecord>,
    pub wetness: Vec<bool>,
    /// Cumulative degree days since the start of the weather series
    pub degree_days: Vec<FloatValue>,
    /// Hourly degree day increments
    pub dd_sequence: Vec<FloatValue>,
}

impl WeatherWindow {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn temperature_sequence(&self) -> Vec<FloatValue> {
        self.records.iter().map(|r| r.temperature_air).collect()
    }

    pub fn relative_humidity_sequence(&self) -> Vec<FloatValue> {
        self.records.iter().map(|r| r.relative_humidity).collect()
    }

    pub fn rain_sequence(&self) -> Vec<FloatValue> {
        self.records.iter().map(|r| r.rain).collect()
    }

    pub fn mean_rain(&self) -> FloatValue {
        mean(self.records.iter().map(|r| r.rain))
    }

    pub fn total_rain(&self) -> FloatValue {
        self.records.iter().map(|r| r.rain).sum()
    }

    /// Number of hours in the window if any rain fell, 0 otherwise
    pub fn rain_duration(&self) -> FloatValue {
        if self.total_rain() > 0.0 {
            self.len() as FloatValue
        } else {
            0.0
        }
    }

    pub fn mean_wind_speed(&self) -> FloatValue {
        mean(self.records.iter().map(|r| r.wind_speed))
    }

    pub fn last_date(&self) -> Option<NaiveDateTime> {
        self.records.last().map(|r| r.date)
    }

    /// Cumulative degree days at the end of the window
    pub fn last_degree_days(&self) -> FloatValue {
        self.degree_days.last().copied().unwrap_or(0.0)
    }

    /// Set the hourly sequences of a microclimate from this window
    pub fn apply_sequences(&self, microclimate: &mut Microclimate) {
        microclimate.temperature_sequence = self.temperature_sequence();
        microclimate.wetness_sequence = self.wetness.clone();
        microclimate.relative_humidity_sequence = self.relative_humidity_sequence();
        microclimate.dd_sequence = self.dd_sequence.clone();
    }

    /// Set the rain and wind of a microclimate from this window
    pub fn apply_rain(&self, microclimate: &mut Microclimate) {
        microclimate.rain_intensity = self.mean_rain();
        microclimate.rain_duration = self.rain_duration();
        microclimate.wind_speed = self.mean_wind_speed();
    }

    /// A microclimate holding every variable of this window
    pub fn microclimate(&self) -> Microclimate {
        let mut microclimate = Microclimate::default();
        self.apply_sequences(&mut microclimate);
        self.apply_rain(&mut microclimate);
        microclimate
    }
}

fn mean(values: impl Iterator<Item = FloatValue>) -> FloatValue {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as FloatValue
    }
}

/// Hourly weather built from a constant pattern, mostly useful for tests and scenarios
pub fn constant_weather(
    start: NaiveDateTime,
    hours: usize,
    temperature_air: FloatValue,
    relative_humidity: FloatValue,
    rain: FloatValue,
) -> Weather {
    let records = (0..hours)
        .map(|h| WeatherRecord {
            date: start + chrono::Duration::hours(h as i64),
            temperature_air,
            relative_humidity,
            rain,
            wind_speed: 0.0,
        })
        .collect();
    Weather::from_records(records, DegreeDayModel::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CSV: &str = "date,temperature_air,relative_humidity,rain,wind_speed
2013-04-01 00:00:00,12.0,90.0,0.0,1.0
2013-04-01 01:00:00,24.0,60.0,1.5,3.0
2013-04-01 02:00:00,-2.0,70.0,0.0,2.0
";

    #[test]
    fn read_csv() {
        let weather = Weather::from_reader(CSV.as_bytes(), DegreeDayModel::default()).unwrap();
        assert_eq!(weather.len(), 3);
        assert_eq!(weather.wetness(), &[true, true, false]);
        assert_relative_eq!(weather.degree_days()[2], 1.5);
        assert_eq!(weather.records()[1].wind_speed, 3.0);
    }

    #[test]
    fn missing_column() {
        let csv = "date,temperature_air,rain\n2013-04-01 00:00:00,12.0,0.0\n";
        let err = Weather::from_reader(csv.as_bytes(), DegreeDayModel::default()).unwrap_err();
        assert!(matches!(err, AlepError::MissingWeatherColumn(c) if c == "relative_humidity"));
    }

    #[test]
    fn invalid_values_report_line() {
        let csv = "date,temperature_air,relative_humidity,rain\n2013-04-01 00:00:00,warm,80,0\n";
        let err = Weather::from_reader(csv.as_bytes(), DegreeDayModel::default()).unwrap_err();
        assert!(matches!(err, AlepError::WeatherFormat { line: 2, .. }));
    }

    #[test]
    fn window() {
        let weather = Weather::from_reader(CSV.as_bytes(), DegreeDayModel::default()).unwrap();
        let window = weather.window(1..3).unwrap();
        assert_eq!(window.len(), 2);
        assert_relative_eq!(window.mean_rain(), 0.75);
        assert_eq!(window.rain_duration(), 2.0);
        assert_relative_eq!(window.dd_sequence[0], 1.0);
        assert_relative_eq!(window.last_degree_days(), 1.5);

        let microclimate = window.microclimate();
        assert_eq!(microclimate.temperature_sequence, vec![24.0, -2.0]);
        assert_relative_eq!(microclimate.wind_speed, 2.5);

        assert!(weather.window(2..4).is_err());
        assert!(weather.window(1..1).is_err());
    }

    #[test]
    fn base_temperature() {
        let weather = Weather::from_reader(CSV.as_bytes(), DegreeDayModel::new(12.0)).unwrap();
        assert_relative_eq!(weather.degree_days()[2], 0.5);
    }
}
