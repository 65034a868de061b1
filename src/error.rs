use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{
    filter::ExpressionError, genotype::CallError, reference::ReferenceError,
    regions::RegionError, samples::SampleError, tsv::ColumnsError,
};

/// Failure of a conversion run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Samples(#[from] SampleError),
    #[error("invalid filter expression: {0}")]
    Expression(#[from] ExpressionError),
    #[error("invalid column list: {0}")]
    Columns(#[from] ColumnsError),
    #[error("failed to read {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Regions(#[from] RegionError),
    #[error("failed to load reference {}: {source}", path.display())]
    Reference {
        path: PathBuf,
        #[source]
        source: ReferenceError,
    },
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("failed to write {}: {source}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConvertError {
    pub fn source_error(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Source {
            path: path.into(),
            source,
        }
    }

    pub fn sink_error(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Sink {
            path: path.into(),
            source,
        }
    }
}

/// A single record that cannot be converted and stops the run.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("error parsing the site {chromosome}:{position}: {source}")]
    Call {
        chromosome: String,
        position: u64,
        #[source]
        source: CallError,
    },
    #[error("reference lookup failed at {chromosome}:{position}: {source}")]
    Reference {
        chromosome: String,
        position: u64,
        #[source]
        source: ReferenceError,
    },
}
