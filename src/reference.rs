//! Indexed FASTA lookups for the reference base of each tabular row.

use std::{
    collections::HashMap,
    fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::Utf8Error,
};

use lru::LruCache;
use noodles::{
    core::{Position, Region},
    fasta::{self, fai},
};
use parking_lot::Mutex;
use thiserror::Error;

const CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(64 * 1024) {
    Some(capacity) => capacity,
    None => NonZeroUsize::MIN,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceContig {
    pub name: String,
    pub length: u64,
}

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid UTF-8 contig name: {0}")]
    InvalidContigName(#[from] Utf8Error),
    #[error("the reference contains no sequences")]
    Empty,
    #[error("unknown contig: {query}")]
    UnknownContig { query: String },
    #[error("position {position} is outside contig {contig} of length {length}")]
    PositionOutOfBounds {
        contig: String,
        position: u64,
        length: u64,
    },
}

type FastaReader = fasta::io::IndexedReader<fasta::io::BufReader<fs::File>>;

pub struct ReferenceGenome {
    path: PathBuf,
    reader: Mutex<FastaReader>,
    contigs: Vec<ReferenceContig>,
    alias_to_index: HashMap<String, usize>,
    cache: Mutex<LruCache<(usize, u64), u8>>,
}

impl std::fmt::Debug for ReferenceGenome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceGenome")
            .field("path", &self.path)
            .field("contigs", &self.contigs.len())
            .finish()
    }
}

impl ReferenceGenome {
    /// Opens a FASTA file, reading `fai_path` (or `<path>.fai`) and building
    /// the index next to the FASTA when it does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P, fai_path: Option<&Path>) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let canonical = fs::canonicalize(path)?;

        let index_path = fai_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_index_path(&canonical));
        let index = if index_path.exists() {
            fai::fs::read(&index_path)?
        } else {
            tracing::info!(index = %index_path.display(), "building FASTA index");
            let index = fasta::fs::index(&canonical)?;
            fai::fs::write(&index_path, &index)?;
            index
        };

        let contigs = index
            .as_ref()
            .iter()
            .map(|record| -> Result<ReferenceContig, ReferenceError> {
                let name = std::str::from_utf8(record.name().as_ref())?.to_string();
                Ok(ReferenceContig {
                    name,
                    length: record.length(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if contigs.is_empty() {
            return Err(ReferenceError::Empty);
        }

        let reader = fasta::io::indexed_reader::Builder::default()
            .set_index(index)
            .build_from_path(&canonical)?;

        let alias_to_index = build_alias_map(&contigs);

        tracing::debug!(
            path = %canonical.display(),
            contigs = contigs.len(),
            "opened reference"
        );

        Ok(Self {
            path: canonical,
            reader: Mutex::new(reader),
            contigs,
            alias_to_index,
            cache: Mutex::new(LruCache::new(CACHE_CAPACITY)),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Sequences in FASTA order.
    pub fn contigs(&self) -> &[ReferenceContig] {
        self.contigs.as_slice()
    }

    /// The FASTA name for `query`. Exact names win; `chr` prefixes, case and
    /// `M`/`MT` spellings are tolerated otherwise.
    pub fn resolve_contig_name(&self, query: &str) -> Option<&str> {
        self.contig_index(query)
            .map(|idx| self.contigs[idx].name.as_str())
    }

    fn contig_index(&self, query: &str) -> Option<usize> {
        self.contigs
            .iter()
            .position(|contig| contig.name == query)
            .or_else(|| self.alias_to_index.get(&canonical_key(query)).copied())
    }

    /// Uppercased base at the 1-based `position`.
    pub fn base(&self, query: &str, position: u64) -> Result<u8, ReferenceError> {
        let idx = self
            .contig_index(query)
            .ok_or_else(|| ReferenceError::UnknownContig {
                query: query.to_string(),
            })?;
        let contig = &self.contigs[idx];

        let out_of_bounds = || ReferenceError::PositionOutOfBounds {
            contig: contig.name.clone(),
            position,
            length: contig.length,
        };

        if position == 0 || position > contig.length {
            return Err(out_of_bounds());
        }

        if let Some(base) = self.cache.lock().get(&(idx, position)).copied() {
            return Ok(base);
        }

        let start = usize::try_from(position)
            .ok()
            .and_then(|p| Position::try_from(p).ok())
            .ok_or_else(out_of_bounds)?;
        let region = Region::new(contig.name.clone(), start..=start);
        let record = self.reader.lock().query(&region)?;
        let base = record
            .sequence()
            .as_ref()
            .first()
            .copied()
            .unwrap_or(b'N')
            .to_ascii_uppercase();

        self.cache.lock().put((idx, position), base);
        Ok(base)
    }
}

fn default_index_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".fai");
    PathBuf::from(s)
}

fn canonical_key(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("chr")
        .or_else(|| trimmed.strip_prefix("CHR"))
        .unwrap_or(trimmed);
    let upper = trimmed.to_ascii_uppercase();
    match upper.as_str() {
        "M" => "MT".to_string(),
        _ => upper,
    }
}

fn build_alias_map(contigs: &[ReferenceContig]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, contig) in contigs.iter().enumerate() {
        map.entry(canonical_key(&contig.name)).or_insert(idx);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fasta(dir: &Path) -> PathBuf {
        let fasta_path = dir.join("ref.fa");
        let mut file = fs::File::create(&fasta_path).unwrap();
        writeln!(file, ">chr1 description").unwrap();
        writeln!(file, "acgt").unwrap();
        writeln!(file, "NNCC").unwrap();
        writeln!(file, ">chrM").unwrap();
        writeln!(file, "GATC").unwrap();
        fasta_path
    }

    #[test]
    fn fetches_uppercased_bases_and_builds_index() {
        let dir = tempfile::tempdir().unwrap();
        let fasta_path = write_fasta(dir.path());

        let reference = ReferenceGenome::open(&fasta_path, None).unwrap();
        assert!(dir.path().join("ref.fa.fai").exists());
        assert_eq!(reference.base("chr1", 2).unwrap(), b'C');
        assert_eq!(reference.base("chr1", 8).unwrap(), b'C');
        // second lookup comes from the cache
        assert_eq!(reference.base("chr1", 2).unwrap(), b'C');
    }

    #[test]
    fn lists_contigs_in_fasta_order() {
        let dir = tempfile::tempdir().unwrap();
        let reference = ReferenceGenome::open(write_fasta(dir.path()), None).unwrap();
        let contigs: Vec<_> = reference
            .contigs()
            .iter()
            .map(|c| (c.name.as_str(), c.length))
            .collect();
        assert_eq!(contigs, vec![("chr1", 8), ("chrM", 4)]);
    }

    #[test]
    fn resolves_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let reference = ReferenceGenome::open(write_fasta(dir.path()), None).unwrap();
        assert_eq!(reference.resolve_contig_name("1"), Some("chr1"));
        assert_eq!(reference.resolve_contig_name("MT"), Some("chrM"));
        assert_eq!(reference.resolve_contig_name("chr2"), None);
        assert_eq!(reference.base("M", 1).unwrap(), b'G');
    }

    #[test]
    fn rejects_out_of_range_positions() {
        let dir = tempfile::tempdir().unwrap();
        let reference = ReferenceGenome::open(write_fasta(dir.path()), None).unwrap();
        assert!(matches!(
            reference.base("chr1", 0),
            Err(ReferenceError::PositionOutOfBounds { .. })
        ));
        assert!(matches!(
            reference.base("chr1", 9),
            Err(ReferenceError::PositionOutOfBounds { length: 8, .. })
        ));
        assert!(matches!(
            reference.base("chr7", 1),
            Err(ReferenceError::UnknownContig { .. })
        ));
    }
}
