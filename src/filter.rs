//! Site filtering.
//!
//! [`FilterGate`] turns an optional [`SitePredicate`] and an include/exclude
//! flag into a single pass/skip decision. [`Expression`] is the built-in
//! predicate, compiled from strings such as `QUAL>=30 && INFO/DP>10`.

use std::fmt;

use nom::{
    Finish, IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt},
    multi::many0,
    sequence::{delimited, pair, preceded},
};
use noodles::vcf::variant::{
    RecordBuf,
    record_buf::info::field::{Value as InfoValue, value::Array as InfoArray},
};
use thiserror::Error;

/// Whether matching sites are kept or dropped.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FilterLogic {
    #[default]
    Include,
    Exclude,
}

/// A boolean test over one site.
pub trait SitePredicate: fmt::Debug {
    fn evaluate(&self, record: &RecordBuf) -> bool;
}

#[derive(Debug, Default)]
pub struct FilterGate {
    predicate: Option<Box<dyn SitePredicate>>,
    logic: FilterLogic,
}

impl FilterGate {
    /// A gate without a predicate; every site passes.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn new(predicate: Box<dyn SitePredicate>, logic: FilterLogic) -> Self {
        Self {
            predicate: Some(predicate),
            logic,
        }
    }

    /// Compiles `expression` into a gate; `None` yields an open gate.
    pub fn compile(expression: Option<&str>, logic: FilterLogic) -> Result<Self, ExpressionError> {
        match expression {
            Some(expression) => Ok(Self::new(Box::new(Expression::parse(expression)?), logic)),
            None => Ok(Self::open()),
        }
    }

    pub fn pass(&self, record: &RecordBuf) -> bool {
        match &self.predicate {
            None => true,
            Some(predicate) => {
                let matched = predicate.evaluate(record);
                match self.logic {
                    FilterLogic::Include => matched,
                    FilterLogic::Exclude => !matched,
                }
            }
        }
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
#[error("could not parse filter expression '{expression}' near '{remaining}'")]
pub struct ExpressionError {
    pub expression: String,
    pub remaining: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operand {
    Qual,
    Pos,
    Chrom,
    Id,
    Ref,
    Alt,
    AltCount,
    Info(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Compare(Operand, Comparison, Literal),
    Present(Operand),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        all_consuming(ws(or_expression))(input)
            .finish()
            .map(|(_, expression)| expression)
            .map_err(|e| ExpressionError {
                expression: input.to_string(),
                remaining: e.input.to_string(),
            })
    }

    pub fn matches(&self, record: &RecordBuf) -> bool {
        match self {
            Self::Compare(operand, op, literal) => {
                compare(&FieldValue::of(operand, record), *op, literal)
            }
            Self::Present(operand) => {
                !matches!(FieldValue::of(operand, record), FieldValue::Missing)
            }
            Self::Not(inner) => !inner.matches(record),
            Self::And(a, b) => a.matches(record) && b.matches(record),
            Self::Or(a, b) => a.matches(record) || b.matches(record),
        }
    }
}

impl SitePredicate for Expression {
    fn evaluate(&self, record: &RecordBuf) -> bool {
        self.matches(record)
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn or_expression(input: &str) -> IResult<&str, Expression> {
    let (input, first) = and_expression(input)?;
    let (input, rest) = many0(preceded(ws(alt((tag("||"), tag("|")))), and_expression))(input)?;
    Ok((input, fold(first, rest, |a, b| Expression::Or(a, b))))
}

fn and_expression(input: &str) -> IResult<&str, Expression> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(preceded(ws(alt((tag("&&"), tag("&")))), term))(input)?;
    Ok((input, fold(first, rest, |a, b| Expression::And(a, b))))
}

fn fold<F>(first: Expression, rest: Vec<Expression>, combine: F) -> Expression
where
    F: Fn(Box<Expression>, Box<Expression>) -> Expression,
{
    rest.into_iter()
        .fold(first, |acc, next| combine(Box::new(acc), Box::new(next)))
}

fn term(input: &str) -> IResult<&str, Expression> {
    ws(alt((
        delimited(char('('), ws(or_expression), char(')')),
        map(preceded(char('!'), term), |inner| Expression::Not(Box::new(inner))),
        comparison,
    )))(input)
}

fn comparison(input: &str) -> IResult<&str, Expression> {
    let (input, operand) = operand(input)?;
    let (input, tail) = opt(pair(ws(comparison_operator), literal))(input)?;
    let expression = match tail {
        Some((op, literal)) => Expression::Compare(operand, op, literal),
        None => Expression::Present(operand),
    };
    Ok((input, expression))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.'))(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    map(identifier, |name: &str| {
        match name.to_ascii_uppercase().as_str() {
            "QUAL" => Operand::Qual,
            "POS" => Operand::Pos,
            "CHROM" => Operand::Chrom,
            "ID" => Operand::Id,
            "REF" => Operand::Ref,
            "ALT" => Operand::Alt,
            "N_ALT" => Operand::AltCount,
            _ => {
                let key = name
                    .strip_prefix("INFO/")
                    .or_else(|| name.strip_prefix("info/"))
                    .unwrap_or(name);
                Operand::Info(key.to_string())
            }
        }
    })(input)
}

fn comparison_operator(input: &str) -> IResult<&str, Comparison> {
    alt((
        map(tag("=="), |_| Comparison::Eq),
        map(tag("!="), |_| Comparison::Ne),
        map(tag("<="), |_| Comparison::Le),
        map(tag(">="), |_| Comparison::Ge),
        map(tag("<"), |_| Comparison::Lt),
        map(tag(">"), |_| Comparison::Gt),
        map(tag("="), |_| Comparison::Eq),
    ))(input)
}

fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(delimited(char('"'), opt(is_not("\"")), char('"')), |text: Option<&str>| {
            Literal::Text(text.unwrap_or_default().to_string())
        }),
        map(take_while1(is_bare_word_char), |word: &str| match word.parse::<f64>() {
            Ok(number) => Literal::Number(number),
            Err(_) => Literal::Text(word.to_string()),
        }),
    ))(input)
}

fn is_bare_word_char(c: char) -> bool {
    !c.is_whitespace() && !"()&|!\"".contains(c)
}

#[derive(Debug, PartialEq)]
enum FieldValue {
    Missing,
    Flag,
    Numbers(Vec<f64>),
    Texts(Vec<String>),
}

impl FieldValue {
    fn of(operand: &Operand, record: &RecordBuf) -> Self {
        match operand {
            Operand::Qual => record
                .quality_score()
                .map(|q| Self::Numbers(vec![f64::from(q)]))
                .unwrap_or(Self::Missing),
            Operand::Pos => record
                .variant_start()
                .map(|p| Self::Numbers(vec![usize::from(p) as f64]))
                .unwrap_or(Self::Missing),
            Operand::Chrom => Self::Texts(vec![record.reference_sequence_name().to_string()]),
            Operand::Id => texts(record.ids().as_ref().iter().cloned().collect()),
            Operand::Ref => Self::Texts(vec![record.reference_bases().to_string()]),
            Operand::Alt => texts(record.alternate_bases().as_ref().to_vec()),
            Operand::AltCount => {
                Self::Numbers(vec![record.alternate_bases().as_ref().len() as f64])
            }
            Operand::Info(key) => match record.info().as_ref().get(key.as_str()) {
                Some(Some(value)) => Self::from_info(value),
                _ => Self::Missing,
            },
        }
    }

    fn from_info(value: &InfoValue) -> Self {
        match value {
            InfoValue::Integer(n) => Self::Numbers(vec![f64::from(*n)]),
            InfoValue::Float(n) => Self::Numbers(vec![f64::from(*n)]),
            InfoValue::Flag => Self::Flag,
            InfoValue::Character(c) => Self::Texts(vec![c.to_string()]),
            InfoValue::String(s) => Self::Texts(vec![s.clone()]),
            InfoValue::Array(InfoArray::Integer(values)) => {
                numbers(values.iter().flatten().map(|&n| f64::from(n)).collect())
            }
            InfoValue::Array(InfoArray::Float(values)) => {
                numbers(values.iter().flatten().map(|&n| f64::from(n)).collect())
            }
            InfoValue::Array(InfoArray::Character(values)) => {
                texts(values.iter().flatten().map(char::to_string).collect())
            }
            InfoValue::Array(InfoArray::String(values)) => {
                texts(values.iter().flatten().cloned().collect())
            }
        }
    }
}

fn numbers(values: Vec<f64>) -> FieldValue {
    if values.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::Numbers(values)
    }
}

fn texts(values: Vec<String>) -> FieldValue {
    if values.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::Texts(values)
    }
}

fn holds<T: PartialOrd + ?Sized>(lhs: &T, op: Comparison, rhs: &T) -> bool {
    match op {
        Comparison::Eq => lhs == rhs,
        Comparison::Ne => lhs != rhs,
        Comparison::Lt => lhs < rhs,
        Comparison::Le => lhs <= rhs,
        Comparison::Gt => lhs > rhs,
        Comparison::Ge => lhs >= rhs,
    }
}

/// Multi-valued fields match when any value does; `!=` requires all to differ.
fn compare(value: &FieldValue, op: Comparison, literal: &Literal) -> bool {
    if op == Comparison::Ne {
        return !matches!(value, FieldValue::Missing)
            && !compare(value, Comparison::Eq, literal);
    }

    match (value, literal) {
        (FieldValue::Missing | FieldValue::Flag, _) => false,
        (FieldValue::Numbers(values), Literal::Number(rhs)) => {
            values.iter().any(|lhs| holds(lhs, op, rhs))
        }
        (FieldValue::Numbers(_), Literal::Text(_)) => false,
        (FieldValue::Texts(values), Literal::Text(rhs)) => {
            values.iter().any(|lhs| holds(lhs.as_str(), op, rhs.as_str()))
        }
        (FieldValue::Texts(values), Literal::Number(rhs)) => values
            .iter()
            .filter_map(|lhs| lhs.parse::<f64>().ok())
            .any(|lhs| holds(&lhs, op, rhs)),
    }
}
