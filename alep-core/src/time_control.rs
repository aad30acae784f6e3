//! Scheduling of model calls along the hourly weather sequence
//!
//! A [`TimeFilter`] holds, for each hour, either nothing or the window of hours the call made
//! at that hour covers. Windows end at the hour of the call (inclusive).
//! A [`Schedule`] walks a filter alongside the weather and yields a [`TimeStep`] for each
//! scheduled hour. Drivers zip several schedules to interleave models with different timings.

use crate::errors::{AlepError, AlepResult};
use crate::fungus::FloatValue;
use crate::weather::{DegreeDayModel, Weather, WeatherWindow};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeFilter {
    windows: Vec<Option<Range<usize>>>,
}

impl TimeFilter {
    /// Build a filter from event flags; each window runs from the hour after the previous event
    pub fn from_events(events: &[bool]) -> Self {
        let mut start = 0;
        let windows = events
            .iter()
            .enumerate()
            .map(|(hour, event)| {
                if *event {
                    let window = start..hour + 1;
                    start = hour + 1;
                    Some(window)
                } else {
                    None
                }
            })
            .collect();
        Self { windows }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn get(&self, hour: usize) -> Option<&Range<usize>> {
        self.windows.get(hour).and_then(|w| w.as_ref())
    }

    pub fn events(&self) -> Vec<bool> {
        self.windows.iter().map(Option::is_some).collect()
    }

    /// Number of scheduled hours
    pub fn count(&self) -> usize {
        self.windows.iter().filter(|w| w.is_some()).count()
    }

    /// Union of the events of two filters, with windows rebuilt between consecutive events
    pub fn union(&self, other: &TimeFilter) -> Self {
        let events: Vec<bool> = self
            .events()
            .into_iter()
            .zip(other.events())
            .map(|(a, b)| a || b)
            .collect();
        Self::from_events(&events)
    }
}

/// A call every `delay` hours
pub fn time_filter(len: usize, delay: usize) -> AlepResult<TimeFilter> {
    if delay == 0 {
        return Err(AlepError::invalid_parameter("delay", "must be at least one hour"));
    }
    let events: Vec<bool> = (0..len).map(|hour| (hour + 1) % delay == 0).collect();
    Ok(TimeFilter::from_events(&events))
}

/// A call every time `delay` degree days have accumulated since the previous call
pub fn thermal_time_filter(
    weather: &Weather,
    model: DegreeDayModel,
    delay: FloatValue,
) -> AlepResult<TimeFilter> {
    if delay <= 0.0 {
        return Err(AlepError::invalid_parameter("delay", "must be positive"));
    }
    let mut accumulated = 0.0;
    let events: Vec<bool> = weather
        .records()
        .iter()
        .map(|record| {
            accumulated += model.hourly(record.temperature_air);
            if accumulated >= delay {
                accumulated = 0.0;
                true
            } else {
                false
            }
        })
        .collect();
    Ok(TimeFilter::from_events(&events))
}

/// A call at the last hour of each rain event.
///
/// A rain event is a run of consecutive hours with at least `rain_min` mm of rain. The window
/// of each call is the event itself.
pub fn rain_filter(weather: &Weather, rain_min: FloatValue) -> TimeFilter {
    let records = weather.records();
    let raining: Vec<bool> = records.iter().map(|r| r.rain >= rain_min).collect();
    let mut windows = vec![None; records.len()];
    let mut start = None;
    for (hour, rain) in raining.iter().enumerate() {
        match (*rain, start) {
            (true, None) => start = Some(hour),
            (false, Some(s)) => {
                windows[hour - 1] = Some(s..hour);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        windows[records.len() - 1] = Some(s..records.len());
    }
    TimeFilter { windows }
}

/// Calls for septoria: every `delay` degree days and at the end of every rain event
pub fn septoria_filter_ddays(
    weather: &Weather,
    delay: FloatValue,
    rain_min: FloatValue,
) -> AlepResult<TimeFilter> {
    let thermal = thermal_time_filter(weather, weather.degree_day_model(), delay)?;
    Ok(thermal.union(&rain_filter(weather, rain_min)))
}

/// A scheduled call
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStep {
    /// Hour of the call
    pub index: usize,
    /// Number of hours covered by the call
    pub dt: usize,
    pub window: WeatherWindow,
}

/// Iterator over the hours of a weather series, yielding the scheduled calls of a filter
pub struct Schedule<'a> {
    filter: &'a TimeFilter,
    weather: &'a Weather,
    hour: usize,
}

impl<'a> Schedule<'a> {
    pub fn new(filter: &'a TimeFilter, weather: &'a Weather) -> AlepResult<Self> {
        if filter.len() != weather.len() {
            return Err(AlepError::Error(format!(
                "Time filter covers {} hours but the weather has {} records",
                filter.len(),
                weather.len()
            )));
        }
        Ok(Self {
            filter,
            weather,
            hour: 0,
        })
    }
}

impl Iterator for Schedule<'_> {
    type Item = AlepResult<Option<TimeStep>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.hour >= self.filter.len() {
            return None;
        }
        let hour = self.hour;
        self.hour += 1;
        let step = match self.filter.get(hour) {
            Some(range) => self.weather.window(range.clone()).map(|window| {
                Some(TimeStep {
                    index: hour,
                    dt: range.len(),
                    window,
                })
            }),
            None => Ok(None),
        };
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::{constant_weather, WeatherRecord};
    use chrono::NaiveDate;

    fn start() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn rainy_weather(rain: &[f64]) -> Weather {
        let records = rain
            .iter()
            .enumerate()
            .map(|(h, r)| WeatherRecord {
                date: start() + chrono::Duration::hours(h as i64),
                temperature_air: 12.0,
                relative_humidity: 80.0,
                rain: *r,
                wind_speed: 0.0,
            })
            .collect();
        Weather::from_records(records, DegreeDayModel::default())
    }

    #[test]
    fn every_n_hours() {
        let filter = time_filter(10, 4).unwrap();
        assert_eq!(filter.count(), 2);
        assert_eq!(filter.get(3), Some(&(0..4)));
        assert_eq!(filter.get(7), Some(&(4..8)));
        assert_eq!(filter.get(9), None);
        assert!(time_filter(10, 0).is_err());
    }

    #[test]
    fn thermal_time() {
        // 24°C is one degree day per hour
        let weather = constant_weather(start(), 10, 24.0, 50.0, 0.0);
        let filter = thermal_time_filter(&weather, DegreeDayModel::default(), 3.0).unwrap();
        assert_eq!(filter.count(), 3);
        assert_eq!(filter.get(2), Some(&(0..3)));
        assert_eq!(filter.get(8), Some(&(6..9)));
    }

    #[test]
    fn rain_events() {
        let weather = rainy_weather(&[0.0, 1.0, 2.0, 0.0, 0.1, 0.0, 0.5]);
        let filter = rain_filter(&weather, 0.2);
        assert_eq!(filter.count(), 2);
        assert_eq!(filter.get(2), Some(&(1..3)));
        assert_eq!(filter.get(6), Some(&(6..7)));
    }

    #[test]
    fn septoria_timing_merges_rain_and_thermal_time() {
        let weather = rainy_weather(&[0.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        // 12°C is half a degree day per hour
        let filter = septoria_filter_ddays(&weather, 1.5, 0.2).unwrap();
        assert_eq!(filter.get(1), Some(&(0..2)));
        assert_eq!(filter.get(2), Some(&(2..3)));
        assert_eq!(filter.get(5), Some(&(3..6)));
        assert_eq!(filter.count(), 3);
    }

    #[test]
    fn schedule() {
        let weather = constant_weather(start(), 6, 24.0, 50.0, 0.0);
        let filter = time_filter(6, 3).unwrap();
        let steps: Vec<_> = Schedule::new(&filter, &weather)
            .unwrap()
            .collect::<AlepResult<Vec<_>>>()
            .unwrap();
        assert_eq!(steps.len(), 6);
        assert!(steps[0].is_none());
        let step = steps[5].as_ref().unwrap();
        assert_eq!(step.dt, 3);
        assert_eq!(step.index, 5);
        assert_eq!(step.window.start, 3);

        let short = time_filter(4, 2).unwrap();
        assert!(Schedule::new(&short, &weather).is_err());
    }
}
