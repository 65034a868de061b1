use std::{
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use noodles::{bcf, bgzf, tabix, vcf};
use tempfile::tempdir;
use vcfconvert::{
    ConversionConfig, ConversionMode, ConversionSummary, ConvertError, GenSampleConfig,
    filter::FilterLogic,
    genotype::GenotypeTag,
    regions::RegionSpec,
    samples::{SampleError, SampleSpec},
    smart_reader::open_input,
};

const VCF: &str = "\
##fileformat=VCFv4.3
##contig=<ID=1,length=1000>
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Depth\">
##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">
##FORMAT=<ID=PL,Number=G,Type=Integer,Description=\"Phred-scaled genotype likelihoods\">
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3
1\t100\trs100\tA\tG\t50\tPASS\tDP=20\tGT:PL\t0/0:0,30,300\t0/1:30,0,300\t1/1:300,30,0
1\t200\t.\tC\t.\t40\tPASS\tDP=5\tGT:PL\t0/0:0,30,300\t0/0:0,30,300\t0/0:0,30,300
1\t300\t.\tT\tA,C\t10\tPASS\tDP=8\tGT:PL\t1/2:50,40,30,20,10,0\t./.:.\t0|1:0,0,0,10,10,10
";

const SITE_100: &str = "1:100_A_G rs100 100 A G 1 0 0 0 1 0 0 0 1";
const SITE_300: &str = "1:300_T_A 1:300 300 T A 0 0 1 0.33 0.33 0.33 0 1 0";

fn write_vcf(dir: &Path) -> PathBuf {
    let path = dir.join("input.vcf");
    fs::write(&path, VCF).unwrap();
    path
}

fn write_indexed_vcf(dir: &Path) -> PathBuf {
    let path = dir.join("input.vcf.gz");
    let mut writer = bgzf::io::Writer::new(fs::File::create(&path).unwrap());
    writer.write_all(VCF.as_bytes()).unwrap();
    writer.finish().unwrap();

    let index = vcf::fs::index(&path).unwrap();
    tabix::fs::write(dir.join("input.vcf.gz.tbi"), &index).unwrap();
    path
}

fn write_bcf(dir: &Path) -> PathBuf {
    let mut reader = vcf::io::Reader::new(VCF.as_bytes());
    let header = reader.read_header().unwrap();

    let path = dir.join("input.bcf");
    let mut writer = bcf::io::Writer::new(fs::File::create(&path).unwrap());
    writer.write_header(&header).unwrap();
    for result in reader.record_bufs(&header) {
        let record = result.unwrap();
        vcf::variant::io::Write::write_variant_record(&mut writer, &header, &record).unwrap();
    }
    writer.get_mut().try_finish().unwrap();
    path
}

fn read_text(path: &Path) -> io::Result<String> {
    let mut text = String::new();
    open_input(path)?.read_to_string(&mut text)?;
    Ok(text)
}

fn run(
    input: &Path,
    samples: Option<&str>,
    mode: GenSampleConfig,
) -> Result<ConversionSummary, ConvertError> {
    let config = ConversionConfig {
        input: input.to_path_buf(),
        samples: samples.and_then(|list| SampleSpec::parse(list, false)),
        mode: ConversionMode::GenSample(mode),
    };
    vcfconvert::run(&config)
}

fn gen_config(output: String) -> GenSampleConfig {
    GenSampleConfig {
        output,
        ..Default::default()
    }
}

#[test]
fn prefix_output_writes_compressed_gen_and_samples() {
    let dir = tempdir().unwrap();
    let input = write_vcf(dir.path());
    let prefix = dir.path().join("out");

    let summary = run(&input, None, gen_config(prefix.display().to_string())).unwrap();

    let gen_path = dir.path().join("out.gen.gz");
    let raw = fs::read(&gen_path).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b], "gen output should be BGZF compressed");

    let text = read_text(&gen_path).unwrap();
    assert_eq!(text, format!("{SITE_100}\n{SITE_300}\n"));

    let samples = fs::read_to_string(dir.path().join("out.samples")).unwrap();
    assert_eq!(
        samples,
        "ID_1 ID_2 missing\n0 0 0\nS1 S1 0\nS2 S2 0\nS3 S3 0\n"
    );

    assert_eq!(summary.total_records, 3);
    assert_eq!(summary.skipped_records, 1);
    assert_eq!(summary.hom_ref, 1);
    assert_eq!(summary.het_ref_alt, 2);
    assert_eq!(summary.hom_alt, 1);
    assert_eq!(summary.het_alt_alt, 1);
}

#[test]
fn explicit_pair_is_uncompressed_and_reordered() {
    let dir = tempdir().unwrap();
    let input = write_vcf(dir.path());
    let gen_path = dir.path().join("a.gen");
    let sample_path = dir.path().join("b.samples");
    let spec = format!("{},{}", gen_path.display(), sample_path.display());

    run(&input, Some("S3,S1"), gen_config(spec)).unwrap();

    let text = fs::read_to_string(&gen_path).unwrap();
    let first = text.lines().next().unwrap();
    assert_eq!(first, "1:100_A_G rs100 100 A G 0 0 1 1 0 0");

    let samples = fs::read_to_string(&sample_path).unwrap();
    assert_eq!(samples, "ID_1 ID_2 missing\n0 0 0\nS3 S3 0\nS1 S1 0\n");
}

#[test]
fn negated_selection_keeps_source_order() {
    let dir = tempdir().unwrap();
    let input = write_vcf(dir.path());
    let prefix = dir.path().join("neg");

    run(&input, Some("^S2"), gen_config(prefix.display().to_string())).unwrap();

    let samples = fs::read_to_string(dir.path().join("neg.samples")).unwrap();
    assert_eq!(samples, "ID_1 ID_2 missing\n0 0 0\nS1 S1 0\nS3 S3 0\n");

    let text = read_text(&dir.path().join("neg.gen.gz")).unwrap();
    assert!(text.starts_with("1:100_A_G rs100 100 A G 1 0 0 0 0 1\n"), "{text}");
}

#[test]
fn duplicate_samples_are_fatal() {
    let dir = tempdir().unwrap();
    let input = write_vcf(dir.path());
    let prefix = dir.path().join("dup");

    let err = run(&input, Some("S1,S2,S1"), gen_config(prefix.display().to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Samples(SampleError::CountMismatch { .. })
    ));
    assert!(!dir.path().join("dup.gen.gz").exists());
}

#[test]
fn unknown_sample_is_fatal() {
    let dir = tempdir().unwrap();
    let input = write_vcf(dir.path());

    let err = run(&input, Some("S1,S9"), gen_config(dir.path().join("x").display().to_string()))
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Samples(SampleError::NotFound { position: 2, .. })
    ));
}

#[test]
fn include_and_exclude_expressions() {
    let dir = tempdir().unwrap();
    let input = write_vcf(dir.path());

    let gen_path = dir.path().join("inc.gen");
    let summary = run(
        &input,
        None,
        GenSampleConfig {
            output: format!("{},{}", gen_path.display(), dir.path().join("inc.samples").display()),
            filter: Some(String::from("QUAL>=20")),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(fs::read_to_string(&gen_path).unwrap(), format!("{SITE_100}\n"));
    assert_eq!(summary.skipped_records, 2);

    let gen_path = dir.path().join("exc.gen");
    run(
        &input,
        None,
        GenSampleConfig {
            output: format!("{},{}", gen_path.display(), dir.path().join("exc.samples").display()),
            filter: Some(String::from("INFO/DP<10")),
            filter_logic: FilterLogic::Exclude,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(fs::read_to_string(&gen_path).unwrap(), format!("{SITE_100}\n"));
}

#[test]
fn pl_tag_emits_normalised_probabilities() {
    let dir = tempdir().unwrap();
    let input = write_vcf(dir.path());
    let gen_path = dir.path().join("pl.gen");

    run(
        &input,
        Some("S3"),
        GenSampleConfig {
            output: format!("{},{}", gen_path.display(), dir.path().join("pl.samples").display()),
            tag: GenotypeTag::Pl,
            ..Default::default()
        },
    )
    .unwrap();

    let text = fs::read_to_string(&gen_path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(" 0.000000 0.000999 0.999001"), "{}", lines[0]);
    assert!(lines[1].ends_with(" 0.333333 0.333333 0.333333"), "{}", lines[1]);
}

#[test]
fn bcf_input_matches_vcf_input() {
    let dir = tempdir().unwrap();
    let input = write_bcf(dir.path());
    let prefix = dir.path().join("bcf");

    run(&input, None, gen_config(prefix.display().to_string())).unwrap();

    let text = read_text(&dir.path().join("bcf.gen.gz")).unwrap();
    assert_eq!(text, format!("{SITE_100}\n{SITE_300}\n"));
}

#[test]
fn regions_use_the_index() {
    let dir = tempdir().unwrap();
    let input = write_indexed_vcf(dir.path());
    let prefix = dir.path().join("reg");

    let summary = run(
        &input,
        None,
        GenSampleConfig {
            output: prefix.display().to_string(),
            regions: Some(RegionSpec::new("1:150-350", false)),
            ..Default::default()
        },
    )
    .unwrap();

    let text = read_text(&dir.path().join("reg.gen.gz")).unwrap();
    assert_eq!(text, format!("{SITE_300}\n"));
    assert_eq!(summary.total_records, 2);
    assert_eq!(summary.skipped_records, 1);
}

#[test]
fn targets_filter_the_stream() {
    let dir = tempdir().unwrap();
    let input = write_vcf(dir.path());
    let targets = dir.path().join("targets.txt");
    fs::write(&targets, "1\t100\t100\n").unwrap();
    let prefix = dir.path().join("tgt");

    run(
        &input,
        None,
        GenSampleConfig {
            output: prefix.display().to_string(),
            targets: Some(RegionSpec::new(targets.display().to_string(), true)),
            ..Default::default()
        },
    )
    .unwrap();

    let text = read_text(&dir.path().join("tgt.gen.gz")).unwrap();
    assert_eq!(text, format!("{SITE_100}\n"));
}

#[test]
fn monomorphic_only_input_leaves_gen_empty() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("mono.vcf");
    let header_end = VCF.find("1\t100").unwrap();
    fs::write(
        &input,
        format!(
            "{}1\t200\t.\tC\t.\t40\tPASS\tDP=5\tGT:PL\t0/0:0,30,300\t0/0:0,30,300\t0/0:0,30,300\n",
            &VCF[..header_end]
        ),
    )
    .unwrap();

    let output = dir.path().join("mono").display().to_string();
    let summary = run(&input, None, gen_config(output)).unwrap();
    assert_eq!(read_text(&dir.path().join("mono.gen.gz")).unwrap(), "");
    assert_eq!(summary.total_records, 1);
    assert_eq!(summary.skipped_records, 1);
    assert_eq!(summary.hom_ref, 0);
}
