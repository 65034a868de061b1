use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    conversion::{self, ConversionConfig, ConversionMode, ConversionSummary},
    error::ConvertError,
    filter::FilterLogic,
    genotype::GenotypeTag,
    gensample::GenSampleConfig,
    output::{OutputType, STDOUT},
    regions::RegionSpec,
    report::RunReport,
    samples::SampleSpec,
    tsv2vcf::TsvConfig,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Convert VCF/BCF to gen/sample, or an ancestral-allele table to VCF/BCF",
    long_about = None
)]
struct Cli {
    /// Input VCF/BCF, or the call table with --tsv2vcf (`-` for stdin)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Select sites for which the expression is true
    #[arg(short = 'i', long, value_name = "EXPR", conflicts_with = "exclude")]
    include: Option<String>,

    /// Exclude sites for which the expression is true
    #[arg(short = 'e', long, value_name = "EXPR")]
    exclude: Option<String>,

    /// Restrict to a comma-separated list of regions (requires an index)
    #[arg(short = 'r', long, value_name = "REGION", conflicts_with = "regions_file")]
    regions: Option<String>,

    /// Restrict to regions listed in a file
    #[arg(short = 'R', long, value_name = "FILE")]
    regions_file: Option<String>,

    /// Like --regions but streams rather than index-jumps
    #[arg(short = 't', long, value_name = "REGION", conflicts_with = "targets_file")]
    targets: Option<String>,

    /// Like --regions-file but streams rather than index-jumps
    #[arg(short = 'T', long, value_name = "FILE")]
    targets_file: Option<String>,

    /// Comma-separated list of samples; prefix with ^ to exclude
    #[arg(short = 's', long, value_name = "LIST", conflicts_with = "samples_file")]
    samples: Option<String>,

    /// File of sample names, one per line; prefix with ^ to exclude
    #[arg(short = 'S', long, value_name = "FILE")]
    samples_file: Option<String>,

    /// VCF/BCF output path for --tsv2vcf
    #[arg(short = 'o', long, value_name = "FILE", default_value = STDOUT)]
    output: PathBuf,

    /// VCF/BCF output type for --tsv2vcf
    #[arg(short = 'O', long, value_enum, default_value_t = OutputType::Vcf)]
    output_type: OutputType,

    /// Write gen/sample output: <prefix> or <gen-file>,<sample-file>
    #[arg(short = 'g', long, value_name = "SPEC", conflicts_with = "tsv2vcf")]
    gensample: Option<String>,

    /// FORMAT field feeding the gen probabilities: GT or PL
    #[arg(long, default_value = "GT")]
    tag: String,

    /// Convert an ancestral-allele call table to VCF/BCF
    #[arg(long)]
    tsv2vcf: bool,

    /// Columns of the call table
    #[arg(short = 'c', long, value_name = "LIST")]
    columns: Option<String>,

    /// Reference FASTA
    #[arg(short = 'f', long = "fasta-ref", value_name = "FILE")]
    fasta_ref: Option<PathBuf>,

    /// Explicit FASTA index (.fai) path
    #[arg(long, value_name = "FAI")]
    fai: Option<PathBuf>,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Logging verbosity (e.g. error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn sample_spec(&self) -> Option<SampleSpec> {
        match (&self.samples, &self.samples_file) {
            (Some(list), _) => SampleSpec::parse(list, false),
            (None, Some(file)) => SampleSpec::parse(file, true),
            (None, None) => None,
        }
    }

    fn region_spec(list: &Option<String>, file: &Option<String>) -> Option<RegionSpec> {
        match (list, file) {
            (Some(list), _) => Some(RegionSpec::new(list.as_str(), false)),
            (None, Some(file)) => Some(RegionSpec::new(file.as_str(), true)),
            (None, None) => None,
        }
    }

    fn into_config(self) -> Result<ConversionConfig> {
        let samples = self.sample_spec();

        let mode = if self.tsv2vcf {
            let Some(reference) = self.fasta_ref else {
                bail!(ConvertError::Configuration(String::from(
                    "missing the --fasta-ref option"
                )));
            };
            ConversionMode::TsvToVcf(TsvConfig {
                output: self.output,
                output_type: self.output_type,
                columns: self.columns,
                reference,
                reference_index: self.fai,
            })
        } else if let Some(output) = self.gensample {
            let tag: GenotypeTag = self
                .tag
                .parse()
                .map_err(|e| ConvertError::Configuration(format!("{e}")))?;
            let (filter, filter_logic) = match (self.include, self.exclude) {
                (Some(expr), _) => (Some(expr), FilterLogic::Include),
                (None, Some(expr)) => (Some(expr), FilterLogic::Exclude),
                (None, None) => (None, FilterLogic::Include),
            };
            ConversionMode::GenSample(GenSampleConfig {
                output,
                tag,
                filter,
                filter_logic,
                regions: Self::region_spec(&self.regions, &self.regions_file),
                targets: Self::region_spec(&self.targets, &self.targets_file),
            })
        } else {
            bail!("expected one of --gensample or --tsv2vcf");
        };

        Ok(ConversionConfig {
            input: self.input,
            samples,
            mode,
        })
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let report_path = cli.report.clone();
    let config = cli.into_config()?;

    let summary = conversion::run(&config)
        .with_context(|| format!("failed to convert {}", config.input.display()))?;
    print_summary(&summary);

    if let Some(path) = report_path {
        RunReport::new(&config, &summary)
            .write(&path)
            .with_context(|| format!("failed to write report {}", path.display()))?;
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
    Ok(())
}

fn print_summary(summary: &ConversionSummary) {
    eprintln!("Rows total: \t{}", summary.total_records);
    eprintln!("Rows skipped: \t{}", summary.skipped_records);
    eprintln!("Hom RR: \t{}", summary.hom_ref);
    eprintln!("Het RA: \t{}", summary.het_ref_alt);
    eprintln!("Hom AA: \t{}", summary.hom_alt);
    eprintln!("Het AA: \t{}", summary.het_alt_alt);
}
