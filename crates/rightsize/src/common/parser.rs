use std::fmt::{Debug, Display, Formatter};

use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::{char, one_of, satisfy, space0};
use nom::combinator::{all_consuming, map, map_res, opt, recognize};
use nom::multi::many0;
use nom::sequence::{pair, preceded, tuple};
use nom::{AsChar, IResult};

pub enum ParserError<I> {
    Custom(anyhow::Error),
    Nom(I, nom::error::ErrorKind),
}

impl<I: Debug> Debug for ParserError<I> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Custom(error) => f.write_fmt(format_args!("Semantic error at {error}")),
            Self::Nom(input, error) => f.write_fmt(format_args!(
                "Parser error at '{input:?}': expecting {error:?}"
            )),
        }
    }
}

impl<I> nom::error::ParseError<I> for ParserError<I> {
    fn from_error_kind(input: I, kind: nom::error::ErrorKind) -> Self {
        ParserError::Nom(input, kind)
    }

    fn append(_: I, _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I: Display, E: Into<anyhow::Error>> nom::error::FromExternalError<I, E> for ParserError<I> {
    fn from_external_error(input: I, _: nom::error::ErrorKind, error: E) -> Self {
        ParserError::Custom(anyhow::anyhow!("'{}': {}", input, error.into()))
    }
}

pub(crate) fn format_parse_error<I: Debug>(error: nom::Err<ParserError<I>>) -> anyhow::Error {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => anyhow::anyhow!("{:?}", e),
        _ => anyhow::anyhow!(error.to_string()),
    }
}

pub type NomResult<'a, Ret> = IResult<&'a str, Ret, ParserError<&'a str>>;

/// Runs the parser and fails if it does not consume the whole input.
pub fn consume_all<'a, O, F>(parser: F, input: &'a str) -> anyhow::Result<O>
where
    F: FnMut(&'a str) -> NomResult<'a, O>,
{
    all_consuming(parser)(input)
        .map(|(_, output)| output)
        .map_err(format_parse_error)
}

fn p_integer_string(input: &str) -> NomResult<String> {
    let parser = tuple((
        satisfy(|c| c.is_dec_digit()),
        many0(satisfy(|c| c.is_dec_digit() || c == '_')),
    ));
    map(parser, |(first, rest)| {
        let mut number = first.to_string();
        number.extend(rest.into_iter().filter(|c| c.is_dec_digit()));
        number
    })(input)
}

pub fn p_u32(input: &str) -> NomResult<u32> {
    map_res(p_integer_string, |number| number.parse::<u32>())(input)
}

fn p_decimal(input: &str) -> NomResult<f64> {
    let fraction = recognize(pair(
        char('.'),
        many0(satisfy(|c: char| c.is_dec_digit())),
    ));
    map_res(pair(p_integer_string, opt(fraction)), |(integer, fraction)| {
        format!("{integer}{}", fraction.unwrap_or_default()).parse::<f64>()
    })(input)
}

fn unit_multiplier(prefix: Option<char>) -> u64 {
    match prefix.map(|c| c.to_ascii_uppercase()) {
        Some('K') => 1 << 10,
        Some('M') => 1 << 20,
        Some('G') => 1 << 30,
        Some('T') => 1 << 40,
        _ => 1,
    }
}

/// Parses a size in bytes, e.g. `1024`, `512M`, `1.5 GiB` or `2TB`.
/// Unit prefixes are binary multiples.
fn p_size(input: &str) -> NomResult<u64> {
    let unit = pair(
        opt(one_of("kKmMgGtT")),
        opt(alt((tag_no_case("ib"), tag_no_case("b")))),
    );
    map_res(
        tuple((p_decimal, preceded(space0, unit))),
        |(value, (prefix, _))| {
            let bytes = (value * unit_multiplier(prefix) as f64).round();
            if bytes.is_finite() && bytes < u64::MAX as f64 {
                Ok(bytes as u64)
            } else {
                Err(anyhow::anyhow!("size is too large"))
            }
        },
    )(input)
}

pub fn parse_size(text: &str) -> anyhow::Result<u64> {
    consume_all(p_size, text.trim())
}
