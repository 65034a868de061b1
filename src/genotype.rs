use std::{fmt, str::FromStr};

use noodles::vcf::variant::{
    record::samples::series::value::genotype::Phasing,
    record_buf::samples::sample::{
        Value,
        value::{
            Array,
            genotype::{Allele as GenotypeAllele, Genotype},
        },
    },
};
use thiserror::Error;

use crate::alleles::AlleleTable;

/// A diploid, unphased call. The second allele is absent for haploid calls.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GenotypeCall {
    pub first: Option<usize>,
    pub second: Option<usize>,
}

impl GenotypeCall {
    pub fn diploid(first: usize, second: usize) -> Self {
        Self {
            first: Some(first),
            second: Some(second),
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn from_alleles(alleles: &[GenotypeAllele]) -> Self {
        match alleles {
            [] => Self::missing(),
            [only] => Self {
                first: only.position(),
                second: None,
            },
            [first, second, ..] => Self {
                first: first.position(),
                second: second.position(),
            },
        }
    }

    /// Genotype class, when both alleles are called.
    pub fn class(&self) -> Option<GenotypeClass> {
        match (self.first, self.second) {
            (Some(a), Some(b)) => Some(GenotypeClass::classify(a, b)),
            _ => None,
        }
    }

    /// Builds an unphased diploid GT value; absent alleles are written as `.`.
    pub fn to_genotype(self) -> Genotype {
        let mut genotype = Genotype::default();
        {
            let alleles = genotype.as_mut();
            alleles.push(GenotypeAllele::new(self.first, Phasing::Unphased));
            alleles.push(GenotypeAllele::new(self.second, Phasing::Unphased));
        }
        genotype
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GenotypeClass {
    HomRef,
    HetRefAlt,
    HomAlt,
    HetAltAlt,
}

impl GenotypeClass {
    /// Classifies a call against the reference at index 0.
    pub fn classify(first: usize, second: usize) -> Self {
        match (first == 0, second == 0) {
            (true, true) => Self::HomRef,
            (true, false) | (false, true) => Self::HetRefAlt,
            (false, false) if first == second => Self::HomAlt,
            (false, false) => Self::HetAltAlt,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GenotypeTally {
    pub hom_ref: usize,
    pub het_ref_alt: usize,
    pub hom_alt: usize,
    pub het_alt_alt: usize,
}

impl GenotypeTally {
    pub fn record(&mut self, class: GenotypeClass) {
        match class {
            GenotypeClass::HomRef => self.hom_ref += 1,
            GenotypeClass::HetRefAlt => self.het_ref_alt += 1,
            GenotypeClass::HomAlt => self.hom_alt += 1,
            GenotypeClass::HetAltAlt => self.het_alt_alt += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.hom_ref + self.het_ref_alt + self.hom_alt + self.het_alt_alt
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum CallError {
    #[error("expected one or two characters, found '{0}'")]
    UnsupportedCallLength(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallOutcome {
    Called(GenotypeCall),
    /// Gap, insertion, deletion or no-call marker.
    Unusable,
}

/// Decodes one textual call such as `CA`, `T` or `--` into table indices.
pub fn decode_call(token: &str, table: &mut AlleleTable) -> Result<CallOutcome, CallError> {
    let bytes = token.as_bytes();
    if bytes.len() > 2 {
        return Err(CallError::UnsupportedCallLength(token.to_string()));
    }

    let Some(&first) = bytes.first() else {
        return Ok(CallOutcome::Unusable);
    };
    if matches!(first, b'-' | b'I' | b'D') {
        return Ok(CallOutcome::Unusable);
    }

    let a0 = table.index_of(first);
    let a1 = match bytes.get(1) {
        Some(&second) => table.index_of(second),
        None => a0,
    };

    Ok(CallOutcome::Called(GenotypeCall::diploid(
        usize::from(a0),
        usize::from(a1),
    )))
}

/// A fully decoded row: alleles to emit plus one call per sample, with
/// genotype indices pointing into `alleles`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedSite {
    pub alleles: Vec<String>,
    pub calls: Vec<GenotypeCall>,
    pub tally: GenotypeTally,
}

impl DecodedSite {
    pub fn reference(&self) -> &str {
        &self.alleles[0]
    }

    pub fn alternates(&self) -> &[String] {
        &self.alleles[1..]
    }
}

/// Decodes every sample's call at a site. Returns `Ok(None)` as soon as one
/// call is unusable, in which case nothing is tallied.
pub fn decode_site<'a, I>(reference: u8, tokens: I) -> Result<Option<DecodedSite>, CallError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut table = AlleleTable::new(reference);
    let mut raw = Vec::new();
    let mut tally = GenotypeTally::default();

    for token in tokens {
        match decode_call(token, &mut table)? {
            CallOutcome::Called(call) => {
                if let Some(class) = call.class() {
                    tally.record(class);
                }
                raw.push(call);
            }
            CallOutcome::Unusable => return Ok(None),
        }
    }

    let emitted = |index: Option<usize>| {
        index
            .and_then(|i| u8::try_from(i).ok())
            .and_then(|i| table.emitted_position(i))
    };
    let calls = raw
        .into_iter()
        .map(|call| GenotypeCall {
            first: emitted(call.first),
            second: emitted(call.second),
        })
        .collect();

    Ok(Some(DecodedSite {
        alleles: table.alleles(),
        calls,
        tally,
    }))
}

/// FORMAT field feeding the gen probabilities.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum GenotypeTag {
    #[default]
    Gt,
    Pl,
}

#[derive(Debug, Error, Eq, PartialEq)]
#[error("unsupported tag '{0}': expected GT or PL")]
pub struct UnknownTagError(pub String);

impl FromStr for GenotypeTag {
    type Err = UnknownTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GT" => Ok(Self::Gt),
            "PL" => Ok(Self::Pl),
            other => Err(UnknownTagError(other.to_string())),
        }
    }
}

impl GenotypeTag {
    pub fn key(self) -> &'static str {
        match self {
            Self::Gt => "GT",
            Self::Pl => "PL",
        }
    }
}

/// Three genotype probabilities (hom-ref, het, hom-alt) for one sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Triplet {
    HomRef,
    Het,
    HomAlt,
    Unknown,
    Likelihoods([f64; 3]),
}

impl Triplet {
    /// Calls carrying no reference allele are hom-alt.
    pub fn from_call(call: GenotypeCall) -> Self {
        match (call.first, call.second) {
            (Some(0), Some(0)) => Self::HomRef,
            (Some(0), Some(_)) | (Some(_), Some(0)) => Self::Het,
            (Some(_), Some(_)) => Self::HomAlt,
            _ => Self::Unknown,
        }
    }

    /// Converts phred-scaled likelihoods for RR, RA and AA into normalised
    /// probabilities.
    pub fn from_phred(pl: [i32; 3]) -> Self {
        let raw = pl.map(|value| 10f64.powf(-f64::from(value) / 10.0));
        let sum: f64 = raw.iter().sum();
        if sum > 0.0 && sum.is_finite() {
            Self::Likelihoods(raw.map(|p| p / sum))
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HomRef => f.write_str("1 0 0"),
            Self::Het => f.write_str("0 1 0"),
            Self::HomAlt => f.write_str("0 0 1"),
            Self::Unknown => f.write_str("0.33 0.33 0.33"),
            Self::Likelihoods([rr, ra, aa]) => write!(f, "{rr:.6} {ra:.6} {aa:.6}"),
        }
    }
}

/// Reads a call out of a sample's GT value.
pub fn call_from_value(value: Option<&Value>) -> GenotypeCall {
    match value {
        Some(Value::Genotype(genotype)) => GenotypeCall::from_alleles(genotype.as_ref()),
        Some(Value::String(text)) => text
            .parse::<Genotype>()
            .map(|genotype| GenotypeCall::from_alleles(genotype.as_ref()))
            .unwrap_or_default(),
        _ => GenotypeCall::missing(),
    }
}

/// Reads the first three PL values of a sample, if all are present.
pub fn triplet_from_pl(value: Option<&Value>) -> Triplet {
    let values: Vec<Option<i32>> = match value {
        Some(Value::Array(Array::Integer(values))) => values.iter().take(3).copied().collect(),
        _ => return Triplet::Unknown,
    };

    match values.as_slice() {
        [Some(rr), Some(ra), Some(aa)] => Triplet::from_phred([*rr, *ra, *aa]),
        _ => Triplet::Unknown,
    }
}
