//! Sample list resolution.
//!
//! A sample specification is either an inline comma-separated list or a file
//! with one name per line. A leading `^` turns it into an exclusion list.
//! Unnegated lists define the output order; negated lists keep the source
//! order.

use std::{
    collections::HashSet,
    io::{self, BufRead},
    path::PathBuf,
};

use thiserror::Error;

use crate::smart_reader::open_input;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read sample file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("the sample list is empty")]
    Empty,
    #[error("sample name mismatch: sample #{position} ({name}) not found in the header")]
    NotFound { position: usize, name: String },
    #[error(
        "the number of samples does not match ({requested} requested, {resolved} resolved), perhaps some are present multiple times?"
    )]
    CountMismatch { requested: usize, resolved: usize },
    #[error("duplicate sample name: {0}")]
    Duplicate(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Polarity {
    Include,
    Exclude,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum SampleSource {
    Inline(String),
    File(PathBuf),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SampleSpec {
    source: SampleSource,
    polarity: Polarity,
}

impl SampleSpec {
    /// Parses a raw `-s`/`-S` argument. `-` means "no selection".
    pub fn parse(raw: &str, is_file: bool) -> Option<Self> {
        if raw == "-" || raw.is_empty() {
            return None;
        }

        let (polarity, body) = match raw.strip_prefix('^') {
            Some(rest) => (Polarity::Exclude, rest),
            None => (Polarity::Include, raw),
        };

        let source = if is_file {
            SampleSource::File(PathBuf::from(body))
        } else {
            SampleSource::Inline(body.to_string())
        };

        Some(Self { source, polarity })
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn is_negated(&self) -> bool {
        self.polarity == Polarity::Exclude
    }

    /// Sample names in the order given.
    pub fn names(&self) -> Result<Vec<String>, SampleError> {
        let names: Vec<String> = match &self.source {
            SampleSource::Inline(list) => list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect(),
            SampleSource::File(path) => read_names(path)?,
        };

        if names.is_empty() {
            return Err(SampleError::Empty);
        }

        Ok(names)
    }
}

fn read_names(path: &PathBuf) -> Result<Vec<String>, SampleError> {
    let to_error = |source: io::Error| SampleError::Io {
        path: path.clone(),
        source,
    };

    let reader = open_input(path).map_err(to_error)?;
    let mut names = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(to_error)?;
        let name = line.trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// The authoritative output samples and where each one lives in the source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SampleSelection {
    names: Vec<String>,
    columns: Vec<usize>,
}

impl SampleSelection {
    /// Every source sample, in source order.
    pub fn all(available: &[String]) -> Self {
        Self {
            names: available.to_vec(),
            columns: (0..available.len()).collect(),
        }
    }

    pub fn resolve(spec: Option<&SampleSpec>, available: &[String]) -> Result<Self, SampleError> {
        let Some(spec) = spec else {
            return Ok(Self::all(available));
        };

        let requested = spec.names()?;
        for (i, name) in requested.iter().enumerate() {
            if !available.contains(name) {
                return Err(SampleError::NotFound {
                    position: i + 1,
                    name: name.clone(),
                });
            }
        }

        match spec.polarity() {
            Polarity::Exclude => {
                let excluded: HashSet<&str> = requested.iter().map(String::as_str).collect();
                let (columns, names) = available
                    .iter()
                    .enumerate()
                    .filter(|(_, name)| !excluded.contains(name.as_str()))
                    .map(|(i, name)| (i, name.clone()))
                    .unzip();
                Ok(Self { names, columns })
            }
            Polarity::Include => {
                let distinct: HashSet<&str> = requested.iter().map(String::as_str).collect();
                if distinct.len() != requested.len() {
                    return Err(SampleError::CountMismatch {
                        requested: requested.len(),
                        resolved: distinct.len(),
                    });
                }

                let columns = requested
                    .iter()
                    .filter_map(|name| available.iter().position(|s| s == name))
                    .collect();
                Ok(Self {
                    names: requested,
                    columns,
                })
            }
        }
    }

    /// Names for a freshly built header, where no source exists to subset.
    pub fn from_names(names: Vec<String>) -> Result<Self, SampleError> {
        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(SampleError::Duplicate(name.clone()));
            }
        }

        Ok(Self {
            columns: (0..names.len()).collect(),
            names,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Source column for each output sample.
    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
