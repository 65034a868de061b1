//! VCF/BCF to gen/sample.
//!
//! Each biallelic-or-wider site becomes one `.gen` line: an identifier
//! column, the ID (or `chrom:pos`), the position, the reference and first
//! alternate allele, then one probability triplet per retained sample. The
//! `.samples` file lists the retained samples in the same order.

use std::{
    io::{self, Write},
    path::Path,
};

use noodles::vcf::variant::record_buf::RecordBuf;

use crate::{
    conversion::ConversionSummary,
    error::ConvertError,
    filter::{FilterGate, FilterLogic},
    genotype::{GenotypeTag, GenotypeTally, Triplet, call_from_value, triplet_from_pl},
    input::open_source,
    output::{GenotypeSink, OutputTargets, write_sample_file},
    regions::{RegionList, RegionSpec},
    samples::{SampleSelection, SampleSpec},
};

/// Options specific to the gen/sample direction.
#[derive(Clone, Debug, Default)]
pub struct GenSampleConfig {
    /// `<prefix>` or `<gen-file>,<sample-file>`.
    pub output: String,
    pub tag: GenotypeTag,
    pub filter: Option<String>,
    pub filter_logic: FilterLogic,
    pub regions: Option<RegionSpec>,
    pub targets: Option<RegionSpec>,
}

/// Renders sites as `.gen` lines for a fixed list of sample columns.
#[derive(Clone, Debug)]
pub struct GenLineEncoder {
    tag: GenotypeTag,
    columns: Vec<usize>,
}

impl GenLineEncoder {
    pub fn new(tag: GenotypeTag, selection: &SampleSelection) -> Self {
        Self {
            tag,
            columns: selection.columns().to_vec(),
        }
    }

    /// Writes the line for `record` to `out`. Returns `None`, writing
    /// nothing, for sites without an alternate allele; otherwise the genotype
    /// classes of the retained samples.
    pub fn encode<W: Write>(
        &self,
        record: &RecordBuf,
        out: &mut W,
    ) -> io::Result<Option<GenotypeTally>> {
        let Some(first_alt) = record.alternate_bases().as_ref().first() else {
            return Ok(None);
        };

        let chrom = record.reference_sequence_name();
        let position = record.variant_start().map(usize::from).unwrap_or_default();
        let reference = record.reference_bases();

        write!(out, "{chrom}:{position}_{reference}_{first_alt} ")?;
        let ids = record.ids().as_ref();
        if ids.is_empty() {
            write!(out, "{chrom}:{position}")?;
        } else {
            let joined: Vec<&str> = ids.iter().map(String::as_str).collect();
            out.write_all(joined.join(";").as_bytes())?;
        }
        write!(out, " {position} {reference} {first_alt}")?;

        let samples = record.samples();
        let genotypes = samples.select(GenotypeTag::Gt.key());
        let likelihoods = match self.tag {
            GenotypeTag::Pl => samples.select(GenotypeTag::Pl.key()),
            GenotypeTag::Gt => None,
        };

        let mut tally = GenotypeTally::default();
        for &column in &self.columns {
            let call = call_from_value(
                genotypes
                    .as_ref()
                    .and_then(|series| series.get(column))
                    .flatten(),
            );
            if let Some(class) = call.class() {
                tally.record(class);
            }

            let triplet = match self.tag {
                GenotypeTag::Gt => Triplet::from_call(call),
                GenotypeTag::Pl => triplet_from_pl(
                    likelihoods
                        .as_ref()
                        .and_then(|series| series.get(column))
                        .flatten(),
                ),
            };
            write!(out, " {triplet}")?;
        }
        out.write_all(b"\n")?;

        Ok(Some(tally))
    }
}

/// Streams `input` into the gen/sample pair described by `config`.
pub fn run(
    input: &Path,
    samples: Option<&SampleSpec>,
    config: &GenSampleConfig,
) -> Result<ConversionSummary, ConvertError> {
    let gate = FilterGate::compile(config.filter.as_deref(), config.filter_logic)?;
    let targets_out = OutputTargets::resolve(&config.output)?;
    let regions = config.regions.as_ref().map(RegionList::from_spec).transpose()?;
    let targets = config.targets.as_ref().map(RegionList::from_spec).transpose()?;

    tracing::info!(
        input = %input.display(),
        gen = %targets_out.genotype_path.display(),
        samples = %targets_out.sample_path.display(),
        tag = config.tag.key(),
        "converting to gen/sample"
    );

    let mut source = open_source(input, regions.as_ref(), targets.as_ref())?;

    let available: Vec<String> = source.header().sample_names().iter().cloned().collect();
    let selection = SampleSelection::resolve(samples, &available)?;
    tracing::debug!(samples = selection.len(), "resolved sample selection");

    write_sample_file(&targets_out.sample_path, selection.names())
        .map_err(|e| ConvertError::sink_error(&targets_out.sample_path, e))?;

    let gen_path = targets_out.genotype_path.as_path();
    let to_sink_error = |e| ConvertError::sink_error(gen_path, e);
    let mut sink = GenotypeSink::create(gen_path, targets_out.compressed).map_err(to_sink_error)?;

    let encoder = GenLineEncoder::new(config.tag, &selection);
    let mut summary = ConversionSummary::default();

    while let Some(result) = source.next_record() {
        let record = result.map_err(|e| ConvertError::source_error(input, e))?;
        summary.total_records += 1;

        if !gate.pass(&record) {
            tracing::debug!(
                chrom = record.reference_sequence_name(),
                position = record.variant_start().map(usize::from),
                "site filtered out"
            );
            summary.skipped_records += 1;
            continue;
        }

        match encoder.encode(&record, &mut sink).map_err(to_sink_error)? {
            Some(tally) => summary.merge_tally(&tally),
            None => {
                tracing::debug!(
                    chrom = record.reference_sequence_name(),
                    position = record.variant_start().map(usize::from),
                    "site has no alternate allele"
                );
                summary.skipped_records += 1;
            }
        }
    }

    sink.finish().map_err(to_sink_error)?;

    tracing::info!(
        total = summary.total_records,
        skipped = summary.skipped_records,
        "finished gen/sample conversion"
    );

    Ok(summary)
}
