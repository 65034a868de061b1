use std::{
    io::{self, BufRead},
    num::ParseIntError,
};

use thiserror::Error;

/// Column layout used when none is given.
pub const DEFAULT_COLUMNS: &str = "ID,CHROM,POS,AA";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnRole {
    Id,
    Chrom,
    Pos,
    /// Ancestral-allele calls; spans one field per sample.
    Calls,
    Ignored,
}

impl ColumnRole {
    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "ID" => Self::Id,
            "CHROM" => Self::Chrom,
            "POS" => Self::Pos,
            "AA" => Self::Calls,
            _ => Self::Ignored,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColumnsError {
    #[error("expected {0} column")]
    Missing(&'static str),
    #[error("the {0} column is given more than once")]
    Repeated(&'static str),
}

/// Role of every leading field of a row.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Columns {
    roles: Vec<ColumnRole>,
}

impl Default for Columns {
    fn default() -> Self {
        Self {
            roles: vec![
                ColumnRole::Id,
                ColumnRole::Chrom,
                ColumnRole::Pos,
                ColumnRole::Calls,
            ],
        }
    }
}

impl Columns {
    /// Parses a comma-separated column list. Unknown names (and `-`) mark
    /// fields that are read and discarded.
    pub fn parse(spec: &str) -> Result<Self, ColumnsError> {
        let roles: Vec<ColumnRole> = spec.split(',').map(ColumnRole::from_name).collect();

        for (role, name) in [
            (ColumnRole::Chrom, "CHROM"),
            (ColumnRole::Pos, "POS"),
            (ColumnRole::Id, "ID"),
            (ColumnRole::Calls, "AA"),
        ] {
            match roles.iter().filter(|&&r| r == role).count() {
                0 => return Err(ColumnsError::Missing(name)),
                1 => {}
                _ => return Err(ColumnsError::Repeated(name)),
            }
        }

        Ok(Self { roles })
    }

    pub fn roles(&self) -> &[ColumnRole] {
        &self.roles
    }

    /// Fields needed per row for `samples` call columns.
    pub fn field_count(&self, samples: usize) -> usize {
        self.roles.len() - 1 + samples
    }
}

/// One parsed table row.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Row {
    pub id: Option<String>,
    pub chromosome: String,
    pub position: u64,
    pub calls: Vec<String>,
}

/// Iterator over the rows of a whitespace-delimited call table.
/// Lines starting with `#` are skipped.
pub struct Reader<R> {
    inner: R,
    columns: Columns,
    samples: usize,
    line: u64,
    buf: String,
}

impl<R> Reader<R>
where
    R: BufRead,
{
    pub fn new(inner: R, columns: Columns, samples: usize) -> Self {
        Self {
            inner,
            columns,
            samples,
            line: 0,
            buf: String::new(),
        }
    }

}

impl<R> Iterator for Reader<R>
where
    R: BufRead,
{
    type Item = Result<Row, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let trimmed = self.buf.trim_end_matches(&['\n', '\r'][..]);
                    if trimmed.trim().is_empty() || trimmed.starts_with('#') {
                        continue;
                    }

                    return Some(
                        parse_row(trimmed, &self.columns, self.samples).map_err(|kind| {
                            ParseError {
                                line: self.line,
                                raw: trimmed.to_string(),
                                kind,
                            }
                        }),
                    );
                }
                Err(e) => {
                    return Some(Err(ParseError {
                        line: self.line,
                        raw: String::new(),
                        kind: ParseErrorKind::Io(e),
                    }));
                }
            }
        }
    }
}

#[derive(Debug, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: u64,
    pub raw: String,
    #[source]
    pub kind: ParseErrorKind,
}

#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("I/O error")]
    Io(#[from] io::Error),
    #[error("expected {expected} whitespace-delimited fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("invalid position: {0}")]
    InvalidPosition(ParseIntError),
    #[error("positions are 1-based, found 0")]
    ZeroPosition,
}

fn parse_row(line: &str, columns: &Columns, samples: usize) -> Result<Row, ParseErrorKind> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let expected = columns.field_count(samples);
    if fields.len() < expected {
        return Err(ParseErrorKind::FieldCount {
            expected,
            found: fields.len(),
        });
    }

    let mut id = None;
    let mut chromosome = "";
    let mut position = 0;
    let mut calls = Vec::new();

    let mut cursor = 0;
    for role in columns.roles() {
        match role {
            ColumnRole::Calls => {
                calls = fields[cursor..cursor + samples]
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                cursor += samples;
                continue;
            }
            ColumnRole::Id => {
                let raw = fields[cursor];
                if raw != "." {
                    id = Some(raw.to_string());
                }
            }
            ColumnRole::Chrom => chromosome = fields[cursor],
            ColumnRole::Pos => {
                position = fields[cursor]
                    .parse::<u64>()
                    .map_err(ParseErrorKind::InvalidPosition)?;
                if position == 0 {
                    return Err(ParseErrorKind::ZeroPosition);
                }
            }
            ColumnRole::Ignored => {}
        }
        cursor += 1;
    }

    Ok(Row {
        id,
        chromosome: chromosome.to_string(),
        position,
        calls,
    })
}
