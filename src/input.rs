//! Variant sources: streaming VCF/BCF readers and index-driven region queries.

use std::{
    collections::{HashMap, VecDeque},
    io::{self, BufRead},
    path::Path,
};

use noodles::{
    bcf,
    core::Region,
    vcf::{self, variant::record_buf::RecordBuf},
};

use crate::{
    error::ConvertError,
    regions::{GenomicInterval, RegionList, TargetFilter},
    smart_reader::{STDIN, open_input},
};

const BCF_MAGIC: &[u8] = b"BCF";

/// A source of variant records in file order.
pub trait VariantSource {
    fn header(&self) -> &vcf::Header;

    fn next_record(&mut self) -> Option<io::Result<RecordBuf>>;
}

impl<T: VariantSource + ?Sized> VariantSource for Box<T> {
    fn header(&self) -> &vcf::Header {
        (**self).header()
    }

    fn next_record(&mut self) -> Option<io::Result<RecordBuf>> {
        (**self).next_record()
    }
}

/// 1-based inclusive span covered by the reference allele.
fn record_span(record: &RecordBuf) -> Option<(u64, u64)> {
    let start = record.variant_start().map(usize::from)? as u64;
    let len = record.reference_bases().len().max(1) as u64;
    Some((start, start + len - 1))
}

enum StreamReader {
    Vcf(vcf::io::Reader<Box<dyn BufRead + Send>>),
    Bcf(bcf::io::Reader<Box<dyn BufRead + Send>>),
}

/// Reads every record front to back, optionally keeping only those that
/// overlap a target list.
pub struct StreamingSource {
    reader: StreamReader,
    header: vcf::Header,
    targets: Option<TargetFilter>,
}

impl StreamingSource {
    /// Opens plain, gzip or BGZF compressed VCF, or BCF, detected from the
    /// leading bytes. `-` reads standard input.
    pub fn open(path: &Path, targets: Option<TargetFilter>) -> io::Result<Self> {
        let mut inner = open_input(path)?;
        let is_bcf = inner.fill_buf()?.starts_with(BCF_MAGIC);

        let (reader, header) = if is_bcf {
            let mut reader = bcf::io::Reader::from(inner);
            let header = reader.read_header()?;
            (StreamReader::Bcf(reader), header)
        } else {
            let mut reader = vcf::io::Reader::new(inner);
            let header = reader.read_header()?;
            (StreamReader::Vcf(reader), header)
        };

        tracing::debug!(
            path = %path.display(),
            format = if is_bcf { "bcf" } else { "vcf" },
            samples = header.sample_names().len(),
            "opened variant source"
        );

        Ok(Self {
            reader,
            header,
            targets,
        })
    }

    fn read_one(&mut self) -> io::Result<Option<RecordBuf>> {
        let mut record = RecordBuf::default();
        let n = match &mut self.reader {
            StreamReader::Vcf(reader) => reader.read_record_buf(&self.header, &mut record)?,
            StreamReader::Bcf(reader) => reader.read_record_buf(&self.header, &mut record)?,
        };
        Ok((n > 0).then_some(record))
    }

    fn is_targeted(&self, record: &RecordBuf) -> bool {
        let Some(targets) = &self.targets else {
            return true;
        };
        record_span(record).is_some_and(|(start, end)| {
            targets.overlaps(record.reference_sequence_name(), start, end)
        })
    }
}

impl VariantSource for StreamingSource {
    fn header(&self) -> &vcf::Header {
        &self.header
    }

    fn next_record(&mut self) -> Option<io::Result<RecordBuf>> {
        loop {
            match self.read_one() {
                Ok(Some(record)) => {
                    if self.is_targeted(&record) {
                        return Some(Ok(record));
                    }
                }
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Records taken from one index query before it is reissued further along
/// the region.
const PAGE_SIZE: usize = 1024;

fn record_start(record: &RecordBuf) -> Option<u64> {
    record.variant_start().map(|position| usize::from(position) as u64)
}

/// Resume point inside a region. Records starting before `start`, and the
/// first `seen_at_start` records starting at it, were already returned.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct PageCursor {
    start: u64,
    seen_at_start: usize,
}

impl PageCursor {
    fn advance(self, page: &[RecordBuf]) -> Self {
        let Some(last) = page.last().and_then(record_start) else {
            return self;
        };
        let at_last = page
            .iter()
            .rev()
            .take_while(|record| record_start(record) == Some(last))
            .count();

        Self {
            start: last,
            seen_at_start: if last == self.start {
                self.seen_at_start + at_last
            } else {
                at_last
            },
        }
    }
}

/// Takes up to [`PAGE_SIZE`] records of an index query, resuming after `cursor`.
fn read_page<I, R>(query: I, header: &vcf::Header, cursor: PageCursor) -> io::Result<Vec<RecordBuf>>
where
    I: IntoIterator<Item = io::Result<R>>,
    R: vcf::variant::Record,
{
    let mut page = Vec::new();
    let mut skipped_at_start = 0;

    for result in query {
        let record = result?;
        let record = RecordBuf::try_from_variant_record(header, &record)?;
        let start = record_start(&record).unwrap_or_default();

        if start < cursor.start {
            continue;
        }
        if start == cursor.start && skipped_at_start < cursor.seen_at_start {
            skipped_at_start += 1;
            continue;
        }

        page.push(record);
        if page.len() == PAGE_SIZE {
            break;
        }
    }

    Ok(page)
}

type PageQuery = Box<dyn FnMut(&Region, PageCursor) -> io::Result<Vec<RecordBuf>>>;

/// A merged region being paged through.
struct RegionPage {
    interval: GenomicInterval,
    cursor: PageCursor,
    /// End of the preceding region on the same contig.
    previous_end: Option<u64>,
}

/// Visits merged regions one at a time through the tabix/CSI index, holding
/// at most one page of records in memory.
pub struct IndexedSource {
    fetch: PageQuery,
    header: vcf::Header,
    regions: VecDeque<GenomicInterval>,
    current: Option<RegionPage>,
    buffered: VecDeque<RecordBuf>,
    last_end: HashMap<String, u64>,
    targets: Option<TargetFilter>,
}

impl IndexedSource {
    pub fn open(
        path: &Path,
        regions: &RegionList,
        targets: Option<TargetFilter>,
    ) -> io::Result<Self> {
        let is_bcf = {
            let mut head = open_input(path)?;
            head.fill_buf()?.starts_with(BCF_MAGIC)
        };

        let (fetch, header): (PageQuery, vcf::Header) = if is_bcf {
            let mut reader = bcf::io::indexed_reader::Builder::default().build_from_path(path)?;
            let header = reader.read_header()?;
            let query_header = header.clone();
            let fetch = move |region: &Region, cursor: PageCursor| -> io::Result<Vec<RecordBuf>> {
                read_page(reader.query(&query_header, region)?, &query_header, cursor)
            };
            (Box::new(fetch) as PageQuery, header)
        } else {
            let mut reader = vcf::io::indexed_reader::Builder::default().build_from_path(path)?;
            let header = reader.read_header()?;
            let query_header = header.clone();
            let fetch = move |region: &Region, cursor: PageCursor| -> io::Result<Vec<RecordBuf>> {
                read_page(reader.query(&query_header, region)?, &query_header, cursor)
            };
            (Box::new(fetch) as PageQuery, header)
        };

        let regions: VecDeque<_> = regions.merged().into();
        tracing::debug!(
            path = %path.display(),
            format = if is_bcf { "bcf" } else { "vcf" },
            regions = regions.len(),
            "opened indexed variant source"
        );

        Ok(Self {
            fetch,
            header,
            regions,
            current: None,
            buffered: VecDeque::new(),
            last_end: HashMap::new(),
            targets,
        })
    }

    fn next_region(&mut self) -> Option<RegionPage> {
        while let Some(interval) = self.regions.pop_front() {
            if !self.header.contigs().contains_key(interval.contig.as_str()) {
                tracing::warn!(
                    region = %interval,
                    "contig absent from the header, skipping region"
                );
                continue;
            }

            let previous_end = self.last_end.insert(interval.contig.clone(), interval.end);
            return Some(RegionPage {
                interval,
                cursor: PageCursor::default(),
                previous_end,
            });
        }
        None
    }

    fn fill(&mut self) -> io::Result<bool> {
        loop {
            let Some(current) = self.current.take().or_else(|| self.next_region()) else {
                return Ok(false);
            };

            // Later pages only need the part of the region from the cursor on.
            let window = GenomicInterval {
                contig: current.interval.contig.clone(),
                start: current.interval.start.max(current.cursor.start),
                end: current.interval.end,
            };
            let region: Region = window
                .to_region()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            let page = (self.fetch)(&region, current.cursor)?;
            let previous_end = current.previous_end;

            if page.len() == PAGE_SIZE {
                self.current = Some(RegionPage {
                    cursor: current.cursor.advance(&page),
                    ..current
                });
            }

            for record in page {
                let Some((start, end)) = record_span(&record) else {
                    continue;
                };
                // already returned by the preceding region on this contig
                if previous_end.is_some_and(|prev| start <= prev) {
                    continue;
                }
                if let Some(targets) = &self.targets
                    && !targets.overlaps(record.reference_sequence_name(), start, end)
                {
                    continue;
                }
                self.buffered.push_back(record);
            }

            if !self.buffered.is_empty() {
                return Ok(true);
            }
        }
    }
}

impl VariantSource for IndexedSource {
    fn header(&self) -> &vcf::Header {
        &self.header
    }

    fn next_record(&mut self) -> Option<io::Result<RecordBuf>> {
        if self.buffered.is_empty() {
            match self.fill() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
        self.buffered.pop_front().map(Ok)
    }
}

/// Opens `path` for reading, through the index when `regions` are given.
pub fn open_source(
    path: &Path,
    regions: Option<&RegionList>,
    targets: Option<&RegionList>,
) -> Result<Box<dyn VariantSource>, ConvertError> {
    let targets = targets.map(TargetFilter::new);
    let to_error = |e| ConvertError::source_error(path, e);

    match regions {
        Some(_) if path == Path::new(STDIN) => Err(ConvertError::Configuration(String::from(
            "regions require an indexed file; use targets to filter standard input",
        ))),
        Some(regions) => Ok(Box::new(
            IndexedSource::open(path, regions, targets).map_err(to_error)?,
        )),
        None => Ok(Box::new(
            StreamingSource::open(path, targets).map_err(to_error)?,
        )),
    }
}
