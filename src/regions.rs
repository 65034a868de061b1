//! Region and target lists.
//!
//! Regions are resolved through the input's index; targets are matched
//! while streaming. Both come from a comma-separated list
//! (`chr1`, `chr1:100`, `chr1:100-200`, `chr1:100-`) or a file of
//! `chrom[\tbeg[\tend]]` lines with 1-based inclusive coordinates.

use std::{
    collections::HashMap,
    io::{self, BufRead},
    path::PathBuf,
};

use noodles::core::{Position, Region};
use rust_lapper::{Interval, Lapper};
use thiserror::Error;

use crate::smart_reader::open_input;

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("failed to read the regions from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid region '{0}'")]
    Invalid(String),
    #[error("the region list is empty")]
    Empty,
}

/// A raw `-r/-R` or `-t/-T` argument.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegionSpec {
    pub list: String,
    pub is_file: bool,
}

impl RegionSpec {
    pub fn new(list: impl Into<String>, is_file: bool) -> Self {
        Self {
            list: list.into(),
            is_file,
        }
    }
}

/// A 1-based, inclusive interval on one contig.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenomicInterval {
    pub contig: String,
    pub start: u64,
    pub end: u64,
}

impl GenomicInterval {
    fn is_bounded(&self) -> bool {
        self.end != u64::MAX
    }

    pub fn to_region(&self) -> Result<Region, RegionError> {
        let invalid = || RegionError::Invalid(self.to_string());
        let position = |value: u64| {
            usize::try_from(value)
                .ok()
                .and_then(|v| Position::try_from(v).ok())
                .ok_or_else(invalid)
        };

        let start = position(self.start)?;
        if self.is_bounded() {
            let end = position(self.end)?;
            Ok(Region::new(self.contig.clone(), start..=end))
        } else {
            Ok(Region::new(self.contig.clone(), start..))
        }
    }
}

impl std::fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_bounded() {
            write!(f, "{}:{}-{}", self.contig, self.start, self.end)
        } else {
            write!(f, "{}:{}-", self.contig, self.start)
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegionList {
    intervals: Vec<GenomicInterval>,
}

impl RegionList {
    pub fn from_spec(spec: &RegionSpec) -> Result<Self, RegionError> {
        let intervals = if spec.is_file {
            read_file(&PathBuf::from(&spec.list))?
        } else {
            spec.list
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(parse_literal)
                .collect::<Result<Vec<_>, _>>()?
        };

        if intervals.is_empty() {
            return Err(RegionError::Empty);
        }

        Ok(Self { intervals })
    }

    pub fn intervals(&self) -> &[GenomicInterval] {
        &self.intervals
    }

    /// Sorted, non-overlapping intervals; contigs keep their first-seen order.
    pub fn merged(&self) -> Vec<GenomicInterval> {
        let mut contigs: Vec<&str> = Vec::new();
        let mut by_contig: HashMap<&str, Vec<(u64, u64)>> = HashMap::new();
        for interval in &self.intervals {
            let contig = interval.contig.as_str();
            if !by_contig.contains_key(contig) {
                contigs.push(contig);
            }
            by_contig
                .entry(contig)
                .or_default()
                .push((interval.start, interval.end));
        }

        let mut merged = Vec::new();
        for contig in contigs {
            let mut spans = by_contig.remove(contig).unwrap_or_default();
            spans.sort_unstable();

            let mut current: Option<(u64, u64)> = None;
            for (start, end) in spans {
                current = match current {
                    Some((s, e)) if start <= e.saturating_add(1) => Some((s, e.max(end))),
                    Some((s, e)) => {
                        merged.push(GenomicInterval {
                            contig: contig.to_string(),
                            start: s,
                            end: e,
                        });
                        Some((start, end))
                    }
                    None => Some((start, end)),
                };
            }
            if let Some((start, end)) = current {
                merged.push(GenomicInterval {
                    contig: contig.to_string(),
                    start,
                    end,
                });
            }
        }
        merged
    }
}

fn parse_position(raw: &str, item: &str) -> Result<u64, RegionError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|&p| p > 0)
        .ok_or_else(|| RegionError::Invalid(item.to_string()))
}

fn parse_literal(item: &str) -> Result<GenomicInterval, RegionError> {
    let (contig, range) = match item.rsplit_once(':') {
        Some((contig, range)) if range.starts_with(|c: char| c.is_ascii_digit()) => {
            (contig, Some(range))
        }
        _ => (item, None),
    };

    if contig.is_empty() {
        return Err(RegionError::Invalid(item.to_string()));
    }

    let (start, end) = match range {
        None => (1, u64::MAX),
        Some(range) => match range.split_once('-') {
            None => {
                let position = parse_position(range, item)?;
                (position, position)
            }
            Some((start, "")) => (parse_position(start, item)?, u64::MAX),
            Some((start, end)) => (parse_position(start, item)?, parse_position(end, item)?),
        },
    };

    if start > end {
        return Err(RegionError::Invalid(item.to_string()));
    }

    Ok(GenomicInterval {
        contig: contig.to_string(),
        start,
        end,
    })
}

fn read_file(path: &PathBuf) -> Result<Vec<GenomicInterval>, RegionError> {
    let to_error = |source: io::Error| RegionError::Io {
        path: path.clone(),
        source,
    };

    let reader = open_input(path).map_err(to_error)?;
    let mut intervals = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(to_error)?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let interval = match fields.as_slice() {
            [contig] => GenomicInterval {
                contig: contig.to_string(),
                start: 1,
                end: u64::MAX,
            },
            [contig, position] => {
                let position = parse_position(position, line)?;
                GenomicInterval {
                    contig: contig.to_string(),
                    start: position,
                    end: position,
                }
            }
            [contig, start, end, ..] => GenomicInterval {
                contig: contig.to_string(),
                start: parse_position(start, line)?,
                end: parse_position(end, line)?,
            },
            [] => continue,
        };
        intervals.push(interval);
    }
    Ok(intervals)
}

/// Streaming membership test for target lists.
#[derive(Debug)]
pub struct TargetFilter {
    by_contig: HashMap<String, Lapper<u64, ()>>,
}

impl TargetFilter {
    pub fn new(list: &RegionList) -> Self {
        let mut intervals: HashMap<String, Vec<Interval<u64, ()>>> = HashMap::new();
        for interval in list.intervals() {
            intervals
                .entry(interval.contig.clone())
                .or_default()
                .push(Interval {
                    start: interval.start,
                    stop: interval.end.saturating_add(1),
                    val: (),
                });
        }

        let by_contig = intervals
            .into_iter()
            .map(|(contig, intervals)| (contig, Lapper::new(intervals)))
            .collect();

        Self { by_contig }
    }

    /// Whether the 1-based inclusive span `start..=end` touches any target.
    pub fn overlaps(&self, contig: &str, start: u64, end: u64) -> bool {
        self.by_contig.get(contig).is_some_and(|lapper| {
            lapper
                .find(start, end.max(start).saturating_add(1))
                .next()
                .is_some()
        })
    }
}
