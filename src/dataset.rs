//! Output document: runs, their location records, and the assembler that
//! stamps each simulated day.

use std::fmt;

use chrono::{Days, NaiveDate, NaiveTime};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{grains::Grain, spatial::Location};

/// Survey hours, inclusive.
pub const SURVEY_HOURS: std::ops::RangeInclusive<u32> = 7..=18;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub lat: f64,
    pub lon: f64,
    pub grains: Vec<Grain>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub operation_id: String,
    pub date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub time: NaiveTime,
    pub locations: Vec<LocationRecord>,
}

impl Run {
    pub fn grain_count(&self) -> usize {
        self.locations.iter().map(|loc| loc.grains.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeachDataset {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    #[error("day {day} produced {actual} grain sets for {expected} locations")]
    LengthMismatch {
        day: u32,
        expected: usize,
        actual: usize,
    },
    #[error("day {day} is past the last representable date")]
    DateOverflow { day: u32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("run {run} has {actual} locations, expected {expected}")]
    LocationCount {
        run: usize,
        expected: usize,
        actual: usize,
    },
    #[error("run {run} moved location {index}")]
    LocationMoved { run: usize, index: usize },
    #[error("run {run} location {index} holds a non-positive grain")]
    NonPositiveGrain { run: usize, index: usize },
}

impl BeachDataset {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            runs: Vec::new(),
        }
    }

    pub fn summary(&self) -> DatasetSummary {
        let runs = self.runs.len();
        let total_locations: usize = self.runs.iter().map(|run| run.locations.len()).sum();
        let total_grains: usize = self.runs.iter().map(Run::grain_count).sum();
        let avg_locations_per_run = if runs == 0 {
            0.0
        } else {
            total_locations as f64 / runs as f64
        };
        DatasetSummary {
            runs,
            total_locations,
            total_grains,
            avg_locations_per_run,
        }
    }

    /// Every run must list the same locations, at the same positions, with
    /// strictly positive grains.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let Some(first) = self.runs.first() else {
            return Ok(());
        };
        for (run_index, run) in self.runs.iter().enumerate() {
            if run.locations.len() != first.locations.len() {
                return Err(InvariantViolation::LocationCount {
                    run: run_index,
                    expected: first.locations.len(),
                    actual: run.locations.len(),
                });
            }
            for (index, (record, anchor)) in run.locations.iter().zip(&first.locations).enumerate() {
                if record.lat != anchor.lat || record.lon != anchor.lon {
                    return Err(InvariantViolation::LocationMoved {
                        run: run_index,
                        index,
                    });
                }
                if record
                    .grains
                    .iter()
                    .any(|grain| !(grain.diameter > 0.0 && grain.area > 0.0))
                {
                    return Err(InvariantViolation::NonPositiveGrain {
                        run: run_index,
                        index,
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub runs: usize,
    pub total_locations: usize,
    pub total_grains: usize,
    pub avg_locations_per_run: f64,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total runs: {}", self.runs)?;
        writeln!(f, "Total locations generated: {}", self.total_locations)?;
        writeln!(f, "Total grains generated: {}", self.total_grains)?;
        if self.runs > 0 {
            write!(
                f,
                "Average locations per run: {:.1}",
                self.avg_locations_per_run
            )?;
        }
        Ok(())
    }
}

pub struct RunAssembler {
    start_date: NaiveDate,
}

impl RunAssembler {
    pub fn new(start_date: NaiveDate) -> Self {
        Self { start_date }
    }

    pub fn run_date(&self, day: u32) -> Result<NaiveDate, AssemblyError> {
        self.start_date
            .checked_add_days(Days::new(u64::from(day)))
            .ok_or(AssemblyError::DateOverflow { day })
    }

    pub fn operation_id(date: NaiveDate) -> String {
        format!("run_{}", date.format("%Y%m%d"))
    }

    pub fn sample_time<R: Rng + ?Sized>(rng: &mut R) -> NaiveTime {
        let hour = rng.gen_range(SURVEY_HOURS);
        let minute = rng.gen_range(0..=59);
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
    }

    /// Zips the master list with the day's grain sets, index by index.
    pub fn assemble(
        &self,
        day: u32,
        time: NaiveTime,
        master: &[Location],
        grain_sets: Vec<Vec<Grain>>,
    ) -> Result<Run, AssemblyError> {
        if grain_sets.len() != master.len() {
            return Err(AssemblyError::LengthMismatch {
                day,
                expected: master.len(),
                actual: grain_sets.len(),
            });
        }
        let date = self.run_date(day)?;
        let locations = master
            .iter()
            .zip(grain_sets)
            .map(|(location, grains)| LocationRecord {
                lat: location.lat,
                lon: location.lon,
                grains,
            })
            .collect();
        Ok(Run {
            operation_id: Self::operation_id(date),
            date,
            time,
            locations,
        })
    }
}

mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
