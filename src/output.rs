//! Output destinations: the gen/sample pair and VCF/BCF writers.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use noodles::{
    bcf, bgzf,
    vcf::{
        self,
        variant::{io::Write as VariantRecordWrite, record_buf::RecordBuf},
    },
};

use crate::error::ConvertError;

/// Path that stands for standard output.
pub const STDOUT: &str = "-";

/// Where the `.gen` and `.samples` files go.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputTargets {
    pub genotype_path: PathBuf,
    pub sample_path: PathBuf,
    pub compressed: bool,
}

impl OutputTargets {
    /// Resolves `<gen>,<samples>` or a bare `<prefix>`, which expands to
    /// `<prefix>.gen.gz` and `<prefix>.samples`.
    pub fn resolve(spec: &str) -> Result<Self, ConvertError> {
        let (genotype, sample) = match spec.split_once(',') {
            Some((genotype, sample)) => (genotype.to_string(), sample.to_string()),
            None => (format!("{spec}.gen.gz"), format!("{spec}.samples")),
        };

        if spec.is_empty() || genotype.is_empty() || sample.is_empty() {
            return Err(ConvertError::Configuration(format!(
                "could not parse the gen/sample output '{spec}': expected <prefix> or <gen-file>,<sample-file>"
            )));
        }

        let compressed = has_gz_suffix(&genotype);
        Ok(Self {
            genotype_path: PathBuf::from(genotype),
            sample_path: PathBuf::from(sample),
            compressed,
        })
    }
}

fn has_gz_suffix(path: &str) -> bool {
    path.len() >= 3
        && path
            .get(path.len() - 3..)
            .is_some_and(|suffix| suffix.eq_ignore_ascii_case(".gz"))
}

/// The `.gen` stream, BGZF compressed or plain.
pub enum GenotypeSink {
    Bgzf(bgzf::io::Writer<File>),
    Plain(BufWriter<File>),
}

impl GenotypeSink {
    pub fn create(path: &Path, compressed: bool) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(if compressed {
            Self::Bgzf(bgzf::io::Writer::new(file))
        } else {
            Self::Plain(BufWriter::new(file))
        })
    }

    /// Flushes buffered data and writes the BGZF end-of-file marker.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Bgzf(writer) => writer.finish().map(drop),
            Self::Plain(mut writer) => writer.flush(),
        }
    }
}

impl Write for GenotypeSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Bgzf(writer) => writer.write(buf),
            Self::Plain(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Bgzf(writer) => writer.flush(),
            Self::Plain(writer) => writer.flush(),
        }
    }
}

/// Writes a `.samples` file: two header lines then `name name 0` per sample.
pub fn write_sample_file(path: &Path, names: &[String]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(b"ID_1 ID_2 missing\n0 0 0\n")?;
    for name in names {
        writeln!(writer, "{name} {name} 0")?;
    }
    writer.flush()
}

/// VCF/BCF output type.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum)]
pub enum OutputType {
    /// Compressed BCF.
    #[value(name = "b")]
    CompressedBcf,
    /// Uncompressed BCF.
    #[value(name = "u")]
    UncompressedBcf,
    /// BGZF compressed VCF.
    #[value(name = "z")]
    CompressedVcf,
    /// Plain VCF.
    #[default]
    #[value(name = "v")]
    Vcf,
}

type Inner = Box<dyn Write>;

/// A VCF or BCF writer over a file or standard output.
pub enum VariantSink {
    Vcf(vcf::io::Writer<Inner>),
    CompressedVcf(vcf::io::Writer<bgzf::io::Writer<Inner>>),
    Bcf(bcf::io::Writer<bgzf::io::Writer<Inner>>),
    UncompressedBcf(bcf::io::Writer<Inner>),
}

impl VariantSink {
    pub fn create(path: &Path, output_type: OutputType) -> io::Result<Self> {
        let inner: Inner = if path == Path::new(STDOUT) {
            Box::new(BufWriter::new(io::stdout().lock()))
        } else {
            Box::new(BufWriter::new(File::create(path)?))
        };

        Ok(match output_type {
            OutputType::Vcf => Self::Vcf(vcf::io::Writer::new(inner)),
            OutputType::CompressedVcf => {
                Self::CompressedVcf(vcf::io::Writer::new(bgzf::io::Writer::new(inner)))
            }
            OutputType::CompressedBcf => Self::Bcf(bcf::io::Writer::new(inner)),
            OutputType::UncompressedBcf => Self::UncompressedBcf(bcf::io::Writer::from(inner)),
        })
    }

    pub fn write_header(&mut self, header: &vcf::Header) -> io::Result<()> {
        match self {
            Self::Vcf(writer) => writer.write_header(header),
            Self::CompressedVcf(writer) => writer.write_header(header),
            Self::Bcf(writer) => writer.write_header(header),
            Self::UncompressedBcf(writer) => writer.write_header(header),
        }
    }

    pub fn write_record(&mut self, header: &vcf::Header, record: &RecordBuf) -> io::Result<()> {
        match self {
            Self::Vcf(writer) => writer.write_variant_record(header, record),
            Self::CompressedVcf(writer) => writer.write_variant_record(header, record),
            Self::Bcf(writer) => writer.write_variant_record(header, record),
            Self::UncompressedBcf(writer) => writer.write_variant_record(header, record),
        }
    }

    /// Terminates BGZF streams and flushes everything to the destination.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Vcf(mut writer) => writer.get_mut().flush(),
            Self::UncompressedBcf(mut writer) => writer.get_mut().flush(),
            Self::CompressedVcf(writer) => writer.into_inner().finish()?.flush(),
            Self::Bcf(mut writer) => {
                writer.get_mut().try_finish()?;
                writer.get_mut().flush()
            }
        }
    }
}
