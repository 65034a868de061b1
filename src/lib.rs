#![doc = include_str!("../README.md")]

pub mod alleles;
pub mod cli;
pub mod conversion;
pub mod error;
pub mod filter;
pub mod genotype;
pub mod gensample;
pub mod input;
pub mod output;
pub mod reference;
pub mod regions;
pub mod report;
pub mod samples;
pub mod smart_reader;
pub mod tsv;
pub mod tsv2vcf;

pub use conversion::{ConversionConfig, ConversionMode, ConversionSummary, run};
pub use error::{ConvertError, RecordError};
pub use gensample::GenSampleConfig;
pub use output::{OutputTargets, OutputType};
pub use reference::ReferenceGenome;
pub use tsv2vcf::TsvConfig;
