use std::path::PathBuf;

use serde::Serialize;

use crate::{
    error::ConvertError,
    genotype::GenotypeTally,
    gensample::{self, GenSampleConfig},
    samples::SampleSpec,
    tsv2vcf::{self, TsvConfig},
};

/// Conversion direction, fixed once configuration is complete.
#[derive(Debug, Clone)]
pub enum ConversionMode {
    /// VCF/BCF to a `.gen` + `.samples` pair.
    GenSample(GenSampleConfig),
    /// Ancestral-allele call table to VCF/BCF.
    TsvToVcf(TsvConfig),
}

impl ConversionMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::GenSample(_) => "gensample",
            Self::TsvToVcf(_) => "tsv2vcf",
        }
    }
}

/// Configuration required to drive a conversion.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Input file; `-` reads standard input.
    pub input: PathBuf,
    /// `-s`/`-S` sample list.
    pub samples: Option<SampleSpec>,
    pub mode: ConversionMode,
}

/// Record counts and genotype class tallies of one run.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize)]
pub struct ConversionSummary {
    pub total_records: usize,
    pub skipped_records: usize,
    pub hom_ref: usize,
    pub het_ref_alt: usize,
    pub hom_alt: usize,
    pub het_alt_alt: usize,
}

impl ConversionSummary {
    /// Adds the tallies of an accepted site.
    pub fn merge_tally(&mut self, tally: &GenotypeTally) {
        self.hom_ref += tally.hom_ref;
        self.het_ref_alt += tally.het_ref_alt;
        self.hom_alt += tally.hom_alt;
        self.het_alt_alt += tally.het_alt_alt;
    }

    pub fn written_records(&self) -> usize {
        self.total_records.saturating_sub(self.skipped_records)
    }
}

/// Runs the conversion described by `config`.
pub fn run(config: &ConversionConfig) -> Result<ConversionSummary, ConvertError> {
    tracing::info!(
        mode = config.mode.name(),
        input = %config.input.display(),
        "starting conversion"
    );

    match &config.mode {
        ConversionMode::GenSample(mode) => {
            gensample::run(&config.input, config.samples.as_ref(), mode)
        }
        ConversionMode::TsvToVcf(mode) => {
            tsv2vcf::run(&config.input, config.samples.as_ref(), mode)
        }
    }
}
