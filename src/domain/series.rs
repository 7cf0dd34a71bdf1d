// Series domain model - bounded per-sensor history of points
use super::sensor::{SensorKey, PLOTTED};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};

pub const MAX_POINTS: usize = 1200;

/// Readings at or below this magnitude are stored as gaps.
pub const SUPPRESS_THRESHOLD: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
    pub label: Option<String>,
}

impl Point {
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

/// Rounds to 3 decimals, halves to even.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round_ties_even() / 1000.0
}

#[derive(Debug, Clone)]
pub struct Series {
    points: VecDeque<Point>,
    capacity: usize,
}

impl Series {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn append(&mut self, time: DateTime<Utc>, raw: f64) {
        let point = if raw.abs() > SUPPRESS_THRESHOLD {
            let rounded = round3(raw);
            Point {
                time,
                value: Some(rounded),
                label: Some(rounded.to_string()),
            }
        } else {
            Point {
                time,
                value: None,
                label: None,
            }
        };
        let labelled = !point.is_empty();
        self.points.push_back(point);

        if labelled && self.points.len() > 1 {
            let previous = self.points.len() - 2;
            self.points[previous].label = None;
        }
    }

    /// Drops points from the front until the series fits its capacity.
    pub fn evict_overflow(&mut self) -> usize {
        let excess = self.points.len().saturating_sub(self.capacity);
        self.points.drain(..excess);
        excess
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&Point> {
        self.points.back()
    }
}

/// One series per plotted sensor, all advanced together once per tick.
#[derive(Debug, Clone)]
pub struct SeriesBuffer {
    series: BTreeMap<SensorKey, Series>,
}

impl SeriesBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_POINTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let series = PLOTTED
            .iter()
            .map(|profile| (profile.key, Series::new(capacity)))
            .collect();
        Self { series }
    }

    /// Appends to a single series. Non-plotted keys are ignored.
    pub fn append(&mut self, key: SensorKey, time: DateTime<Utc>, raw: f64) {
        if let Some(series) = self.series.get_mut(&key) {
            series.append(time, raw);
        }
    }

    pub fn evict_overflow(&mut self) -> usize {
        self.series.values_mut().map(Series::evict_overflow).sum()
    }

    pub fn get(&self, key: SensorKey) -> Option<&Series> {
        self.series.get(&key)
    }

    /// Value of the newest point; `None` when that point is suppressed or the series is empty.
    pub fn latest(&self, key: SensorKey) -> Option<f64> {
        self.series.get(&key)?.latest()?.value
    }

    pub fn points_in(
        &self,
        key: SensorKey,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<&Point> {
        match self.series.get(&key) {
            Some(series) => series
                .points()
                .filter(|p| p.time >= start && p.time <= end)
                .collect(),
            None => Vec::new(),
        }
    }
}

impl Default for SeriesBuffer {
    fn default() -> Self {
        Self::new()
    }
}
