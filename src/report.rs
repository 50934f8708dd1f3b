//! Species by hour-of-day activity table.
//!
//! Counts dataset rows per species and Eastern wall-clock hour of the capture
//! timestamp. Species are ordered by total count (descending, then name) and
//! hours nobody was heard in are left out.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Timelike;

use crate::domain::{DatasetRow, EASTERN};

/// One species' detections per hour
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub species: String,
    pub counts: [usize; 24],
}

impl ActivityRow {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Detection counts by species and hour
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityTable {
    rows: Vec<ActivityRow>,
}

impl ActivityTable {
    /// Tabulate `rows`, keeping species whose name contains `species_filter`
    /// (case-insensitive)
    pub fn from_rows(rows: &[DatasetRow], species_filter: Option<&str>) -> Self {
        let filter = species_filter.map(str::to_lowercase);
        let mut counts: BTreeMap<&str, [usize; 24]> = BTreeMap::new();

        for row in rows {
            if let Some(filter) = &filter {
                if !row.species.to_lowercase().contains(filter.as_str()) {
                    continue;
                }
            }
            let hour = row.timestamp.with_timezone(&EASTERN).hour() as usize;
            counts.entry(row.species.as_str()).or_insert([0; 24])[hour] += 1;
        }

        let mut rows: Vec<ActivityRow> = counts
            .into_iter()
            .map(|(species, counts)| ActivityRow {
                species: species.to_string(),
                counts,
            })
            .collect();

        // BTreeMap order already sorts names; the stable sort keeps it for ties
        rows.sort_by(|a, b| b.total().cmp(&a.total()));

        Self { rows }
    }

    pub fn rows(&self) -> &[ActivityRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Hours with at least one detection, in clock order
    pub fn active_hours(&self) -> Vec<usize> {
        (0..24)
            .filter(|&hour| self.rows.iter().any(|row| row.counts[hour] > 0))
            .collect()
    }
}

/// `0` → `12 AM`, `13` → `1 PM`
pub fn hour_label(hour: usize) -> String {
    let suffix = if hour >= 12 { "PM" } else { "AM" };
    let h = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{} {}", h, suffix)
}

impl fmt::Display for ActivityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rows.is_empty() {
            return writeln!(f, "No detections.");
        }

        let hours = self.active_hours();
        let name_width = self
            .rows
            .iter()
            .map(|row| row.species.chars().count())
            .max()
            .unwrap_or(0)
            .max("Species".len());

        write!(f, "{:<width$}", "Species", width = name_width)?;
        for &hour in &hours {
            write!(f, " {:>5}", hour_label(hour))?;
        }
        writeln!(f, " {:>6}", "Total")?;

        for row in &self.rows {
            write!(f, "{:<width$}", row.species, width = name_width)?;
            for &hour in &hours {
                write!(f, " {:>5}", row.counts[hour])?;
            }
            writeln!(f, " {:>6}", row.total())?;
        }

        Ok(())
    }
}
