use std::{
    fs,
    path::{Path, PathBuf},
};

use noodles::{bcf, vcf};
use tempfile::tempdir;
use vcfconvert::{
    ConversionConfig, ConversionMode, ConversionSummary, ConvertError, OutputType, RecordError,
    TsvConfig,
    genotype::CallError,
    samples::{SampleError, SampleSpec},
};

fn write_reference(dir: &Path) -> PathBuf {
    let path = dir.join("reference.fa");
    fs::write(&path, ">1\nACGTACGT\n>2\nTTTTGGGG\n").unwrap();
    path
}

fn write_table(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("calls.tsv");
    fs::write(&path, contents).unwrap();
    path
}

fn config(input: PathBuf, samples: &str, mode: TsvConfig) -> ConversionConfig {
    ConversionConfig {
        input,
        samples: SampleSpec::parse(samples, false),
        mode: ConversionMode::TsvToVcf(mode),
    }
}

fn tsv_mode(dir: &Path, output: &str, output_type: OutputType) -> TsvConfig {
    TsvConfig {
        output: dir.join(output),
        output_type,
        columns: None,
        reference: write_reference(dir),
        reference_index: None,
    }
}

fn data_lines(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(|line| line.split('\t').map(String::from).collect())
        .collect()
}

fn run(config: &ConversionConfig) -> Result<ConversionSummary, ConvertError> {
    vcfconvert::run(config)
}

#[test]
fn converts_table_to_vcf() {
    let dir = tempdir().unwrap();
    let input = write_table(
        dir.path(),
        "# ancestral calls\n\
         rs1\t1\t2\tCC\tCA\tAA\n\
         rs2\t1\t3\tGG\t--\tGT\n\
         rs3\t1\t4\tTT\tTT\tTT\n\
         rs4\t9\t1\tAA\tAA\tAA\n\
         rs5\t2\t5\tgg\tGA\tAT\n\
         rs6\t1\t5\tAA\n",
    );
    let config = config(input, "A,B,C", tsv_mode(dir.path(), "out.vcf", OutputType::Vcf));

    let summary = run(&config).unwrap();
    assert_eq!(summary.total_records, 6);
    assert_eq!(summary.skipped_records, 3);
    assert_eq!(summary.hom_ref, 1 + 3 + 1);
    assert_eq!(summary.het_ref_alt, 1 + 1);
    assert_eq!(summary.hom_alt, 1);
    assert_eq!(summary.het_alt_alt, 1);

    let header = fs::read_to_string(dir.path().join("out.vcf")).unwrap();
    assert!(header.contains("##contig=<ID=1,length=8>"));
    assert!(header.contains("##contig=<ID=2,length=8>"));
    assert!(header.contains("##FORMAT=<ID=GT"));
    assert!(header.contains("##source=vcfconvert"));
    assert!(header.contains("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tA\tB\tC"));

    let lines = data_lines(&dir.path().join("out.vcf"));
    assert_eq!(lines.len(), 3);

    assert_eq!(&lines[0][..6], &["1", "2", "rs1", "C", "A", "."]);
    assert_eq!(&lines[0][8..], &["GT", "0/0", "0/1", "1/1"]);

    assert_eq!(&lines[1][..5], &["1", "4", "rs3", "T", "."]);
    assert_eq!(&lines[1][9..], &["0/0", "0/0", "0/0"]);

    assert_eq!(&lines[2][..5], &["2", "5", "rs5", "G", "A,T"]);
    assert_eq!(&lines[2][9..], &["0/0", "0/1", "1/2"]);
}

#[test]
fn long_calls_abort_the_run() {
    let dir = tempdir().unwrap();
    let input = write_table(dir.path(), "rs1\t1\t2\tCCA\n");
    let config = config(input, "A", tsv_mode(dir.path(), "out.vcf", OutputType::Vcf));

    let err = run(&config).unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Record(RecordError::Call {
            source: CallError::UnsupportedCallLength(_),
            ..
        })
    ));
}

#[test]
fn positions_past_the_contig_end_abort_the_run() {
    let dir = tempdir().unwrap();
    let input = write_table(dir.path(), "rs1\t1\t20\tCC\n");
    let config = config(input, "A", tsv_mode(dir.path(), "out.vcf", OutputType::Vcf));

    assert!(matches!(
        run(&config),
        Err(ConvertError::Record(RecordError::Reference { .. }))
    ));
}

#[test]
fn duplicate_sample_names_are_rejected() {
    let dir = tempdir().unwrap();
    let input = write_table(dir.path(), "rs1\t1\t2\tCC\tCC\n");
    let config = config(input, "A,A", tsv_mode(dir.path(), "out.vcf", OutputType::Vcf));

    assert!(matches!(
        run(&config),
        Err(ConvertError::Samples(SampleError::Duplicate(_)))
    ));
}

#[test]
fn custom_columns_and_sample_file() {
    let dir = tempdir().unwrap();
    let samples = dir.path().join("samples.txt");
    fs::write(&samples, "X\nY\n").unwrap();
    let input = write_table(dir.path(), "1 6 skip CC GC rsA\n");

    let mut mode = tsv_mode(dir.path(), "out.vcf", OutputType::Vcf);
    mode.columns = Some(String::from("CHROM,POS,-,AA,ID"));
    let config = ConversionConfig {
        input,
        samples: SampleSpec::parse(&samples.display().to_string(), true),
        mode: ConversionMode::TsvToVcf(mode),
    };

    run(&config).unwrap();

    let lines = data_lines(&dir.path().join("out.vcf"));
    assert_eq!(lines.len(), 1);
    assert_eq!(&lines[0][..5], &["1", "6", "rsA", "C", "G"]);
    assert_eq!(&lines[0][9..], &["0/0", "1/0"]);
}

#[test]
fn compressed_bcf_output_is_readable() {
    let dir = tempdir().unwrap();
    let input = write_table(dir.path(), "rs1\t1\t2\tCC\tCA\nrs2\t2\t1\tTT\tTG\n");
    let config = config(input, "A,B", tsv_mode(dir.path(), "out.bcf", OutputType::CompressedBcf));

    run(&config).unwrap();

    let mut reader = bcf::io::reader::Builder::default()
        .build_from_path(dir.path().join("out.bcf"))
        .unwrap();
    let header = reader.read_header().unwrap();
    assert_eq!(header.sample_names().len(), 2);

    let records: Vec<_> = reader
        .record_bufs(&header)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].reference_sequence_name(), "2");
}

#[test]
fn compressed_vcf_output_is_readable() {
    let dir = tempdir().unwrap();
    let input = write_table(dir.path(), "rs1\t1\t2\tCC\tCA\n");
    let mode = tsv_mode(dir.path(), "out.vcf.gz", OutputType::CompressedVcf);
    let config = config(input, "A,B", mode);

    run(&config).unwrap();

    let mut reader = vcf::io::reader::Builder::default()
        .build_from_path(dir.path().join("out.vcf.gz"))
        .unwrap();
    let header = reader.read_header().unwrap();
    let records: Vec<_> = reader
        .record_bufs(&header)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].reference_bases(), "C");
}
