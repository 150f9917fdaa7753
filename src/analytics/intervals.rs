//! Producer win intervals
//!
//! Computes, across every producer with at least two distinct winning years,
//! the gaps between consecutive wins, then reports every interval equal to
//! the global minimum and every interval equal to the global maximum.
//!
//! Producer names are recovered from the free-text `producers` field by
//! splitting on commas and on the word "and". The split is a heuristic: a
//! company such as "Above and Beyond Productions" is split in two.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{IntervalReport, MovieRecord, ProducerInterval};

/// Split a `producers` field into individual names
///
/// Separators are `,` and the standalone word `and`; fragments are trimmed
/// and empty ones discarded. Matching is case-sensitive.
pub fn split_producers(producers: &str) -> Vec<String> {
    static SEPARATOR_RE: OnceLock<Regex> = OnceLock::new();

    let re = SEPARATOR_RE
        .get_or_init(|| Regex::new(r",|\s+and\s+").expect("Invalid regex pattern"));

    re.split(producers)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Distinct winning years per producer, in ascending order
pub fn winning_years(records: &[MovieRecord]) -> BTreeMap<String, BTreeSet<i32>> {
    let mut years: BTreeMap<String, BTreeSet<i32>> = BTreeMap::new();

    for record in records.iter().filter(|r| r.winner) {
        for producer in split_producers(&record.producers) {
            years.entry(producer).or_default().insert(record.year);
        }
    }

    years
}

/// Every consecutive-win interval, ordered by producer then year
pub fn all_intervals(records: &[MovieRecord]) -> Vec<ProducerInterval> {
    winning_years(records)
        .into_iter()
        .flat_map(|(producer, years)| {
            let years: Vec<i32> = years.into_iter().collect();
            years
                .windows(2)
                .map(|pair| ProducerInterval::new(producer.clone(), pair[0], pair[1]))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Shortest and longest intervals, ties included
///
/// Returns empty lists when nobody has won twice.
pub fn compute_intervals(records: &[MovieRecord]) -> IntervalReport {
    let intervals = all_intervals(records);

    let (Some(min), Some(max)) = (
        intervals.iter().map(|i| i.interval).min(),
        intervals.iter().map(|i| i.interval).max(),
    ) else {
        return IntervalReport::default();
    };

    IntervalReport {
        min: intervals
            .iter()
            .filter(|i| i.interval == min)
            .cloned()
            .collect(),
        max: intervals
            .iter()
            .filter(|i| i.interval == max)
            .cloned()
            .collect(),
    }
}
