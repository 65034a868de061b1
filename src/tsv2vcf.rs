//! Ancestral-allele call table to VCF/BCF.

use std::path::{Path, PathBuf};

use noodles::{
    core::Position,
    vcf::{
        self,
        header::{
            FileFormat,
            record::{
                key,
                value::{
                    Collection, Map,
                    map::{Contig, Format},
                },
            },
        },
        variant::{
            record::samples::keys::key as format_key,
            record_buf::{AlternateBases, Ids, RecordBuf, Samples, samples::Keys},
        },
    },
};
use time::{OffsetDateTime, macros::format_description};

use crate::{
    conversion::ConversionSummary,
    error::{ConvertError, RecordError},
    genotype::{DecodedSite, decode_site},
    output::{OutputType, VariantSink},
    reference::ReferenceGenome,
    samples::{SampleSelection, SampleSpec},
    smart_reader::open_input,
    tsv::{self, Columns, ParseError, ParseErrorKind, Row},
};

/// Options specific to the tsv direction.
#[derive(Clone, Debug)]
pub struct TsvConfig {
    /// Destination; `-` writes to standard output.
    pub output: PathBuf,
    pub output_type: OutputType,
    /// Column layout, `ID,CHROM,POS,AA` when absent.
    pub columns: Option<String>,
    pub reference: PathBuf,
    pub reference_index: Option<PathBuf>,
}

/// Streams the table at `input` into a VCF/BCF with one GT column per sample.
pub fn run(
    input: &Path,
    samples: Option<&SampleSpec>,
    config: &TsvConfig,
) -> Result<ConversionSummary, ConvertError> {
    let spec = samples.ok_or_else(|| {
        ConvertError::Configuration(String::from("missing the --samples option"))
    })?;
    if spec.is_negated() {
        return Err(ConvertError::Configuration(String::from(
            "sample exclusion is not supported when building a VCF from a table",
        )));
    }
    let selection = SampleSelection::from_names(spec.names()?)?;

    let columns = match config.columns.as_deref() {
        Some(raw) => Columns::parse(raw)?,
        None => Columns::default(),
    };

    tracing::info!(
        input = %input.display(),
        output = %config.output.display(),
        output_type = ?config.output_type,
        reference = %config.reference.display(),
        samples = selection.len(),
        "converting table to VCF"
    );

    let reference = ReferenceGenome::open(&config.reference, config.reference_index.as_deref())
        .map_err(|source| ConvertError::Reference {
            path: config.reference.clone(),
            source,
        })?;

    let header = build_header(&reference, selection.names())?;

    let reader = open_input(input).map_err(|e| ConvertError::source_error(input, e))?;
    let rows = tsv::Reader::new(reader, columns, selection.len());

    let to_sink_error = |e| ConvertError::sink_error(&config.output, e);
    let mut sink = VariantSink::create(&config.output, config.output_type).map_err(to_sink_error)?;
    sink.write_header(&header).map_err(to_sink_error)?;

    let mut summary = ConversionSummary::default();

    for result in rows {
        summary.total_records += 1;

        let row = match result {
            Ok(row) => row,
            Err(ParseError {
                kind: ParseErrorKind::Io(e),
                ..
            }) => return Err(ConvertError::source_error(input, e)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed row");
                summary.skipped_records += 1;
                continue;
            }
        };

        let Some(chromosome) = reference.resolve_contig_name(&row.chromosome) else {
            tracing::debug!(chrom = %row.chromosome, "contig not in the reference, skipping row");
            summary.skipped_records += 1;
            continue;
        };

        let base = reference
            .base(chromosome, row.position)
            .map_err(|source| RecordError::Reference {
                chromosome: row.chromosome.clone(),
                position: row.position,
                source,
            })?;

        let site = decode_site(base, row.calls.iter().map(String::as_str)).map_err(|source| {
            RecordError::Call {
                chromosome: row.chromosome.clone(),
                position: row.position,
                source,
            }
        })?;

        let Some(site) = site else {
            tracing::debug!(
                chrom = %row.chromosome,
                position = row.position,
                "unusable call, skipping row"
            );
            summary.skipped_records += 1;
            continue;
        };

        let record = build_record(chromosome, &row, &site)?;
        sink.write_record(&header, &record).map_err(to_sink_error)?;
        summary.merge_tally(&site.tally);
    }

    sink.finish().map_err(to_sink_error)?;

    tracing::info!(
        total = summary.total_records,
        skipped = summary.skipped_records,
        "finished table conversion"
    );

    Ok(summary)
}

fn build_record(
    chromosome: &str,
    row: &Row,
    site: &DecodedSite,
) -> Result<RecordBuf, ConvertError> {
    let position = usize::try_from(row.position)
        .ok()
        .and_then(|p| Position::try_from(p).ok())
        .ok_or_else(|| {
            ConvertError::Configuration(format!(
                "position {} on {} is out of range",
                row.position, row.chromosome
            ))
        })?;

    let keys: Keys = [String::from(format_key::GENOTYPE)].into_iter().collect();
    let values = site
        .calls
        .iter()
        .map(|call| vec![Some(call.to_genotype().into())])
        .collect();

    let mut builder = RecordBuf::builder()
        .set_reference_sequence_name(chromosome.to_string())
        .set_variant_start(position)
        .set_reference_bases(site.reference().to_string())
        .set_samples(Samples::new(keys, values));

    if let Some(id) = &row.id {
        let ids: Ids = [id.clone()].into_iter().collect();
        builder = builder.set_ids(ids);
    }

    if !site.alternates().is_empty() {
        builder = builder.set_alternate_bases(AlternateBases::from(site.alternates().to_vec()));
    }

    Ok(builder.build())
}

/// Header with one contig line per reference sequence, a GT FORMAT line and
/// the given samples.
pub fn build_header(
    reference: &ReferenceGenome,
    samples: &[String],
) -> Result<vcf::Header, ConvertError> {
    let mut builder = vcf::Header::builder().set_file_format(FileFormat::new(4, 3));

    for contig in reference.contigs() {
        let mut contig_map = Map::<Contig>::new();
        if let Ok(length) = usize::try_from(contig.length) {
            *contig_map.length_mut() = Some(length);
        }
        builder = builder.add_contig(contig.name.clone(), contig_map);
    }

    builder = builder.add_format(format_key::GENOTYPE, Map::<Format>::from(format_key::GENOTYPE));

    for name in samples {
        builder = builder.add_sample_name(name.clone());
    }

    let mut header = builder.build();

    insert_other_record(
        &mut header,
        "source",
        format!("vcfconvert {}", env!("CARGO_PKG_VERSION")),
    )?;
    insert_other_record(
        &mut header,
        "reference",
        format!("file://{}", reference.path().display()),
    )?;

    let date_format = format_description!("[year][month][day]");
    let today = OffsetDateTime::now_utc()
        .format(&date_format)
        .unwrap_or_else(|_| String::from("19700101"));
    insert_other_record(&mut header, "fileDate", today)?;

    Ok(header)
}

fn insert_other_record(
    header: &mut vcf::Header,
    key: &str,
    value: String,
) -> Result<(), ConvertError> {
    let key: key::Other = key
        .parse()
        .map_err(|e| ConvertError::Configuration(format!("invalid header key {key}: {e}")))?;
    header
        .other_records_mut()
        .insert(key, Collection::Unstructured(vec![value]));
    Ok(())
}
