//! Filter expressions using nom.
//!
//! Parses a compact textual form into a [`Query`].
//!
//! # Syntax Overview
//!
//! ```text
//! [envId=1][name~hur | name=null][price=1.5..9.99][^!name]
//! ──┬───── ─────────┬─────────── ───────┬──────── ───┬───
//!   │               │                   │            └── Sort (^ asc, ^! desc)
//!   │               │                   └── Range (inclusive)
//!   │               └── Disjunction (| between AND-groups joined by &)
//!   └── Cage (cages are AND'd)
//! ```
//!
//! | Operator     | Meaning                  |
//! |--------------|--------------------------|
//! | `=` / `!=`   | equals / not equals      |
//! | `~` / `!~`   | contains / not contains  |
//! | `>` `>=` `<` `<=` | open ranges         |
//! | `=a..b`      | between, both ends included |
//! | `:(a, b)` / `!:(a, b)` | in / not in    |
//!
//! Values are `null`, `true`/`false`, numbers, `'quoted strings'`,
//! `@2024-01-01T00:00:00Z` timestamps, or bare words (strings). A leading `!`
//! negates a whole cage: `![a=1 | b=2]`.

use chrono::{DateTime, Utc};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{map, map_res, not, opt, peek, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::ast::{Direction, Disjunction, Query, Restriction, Value};
use crate::error::ParseError;

enum Cage {
    Filter { groups: Vec<Vec<Restriction>>, negated: bool },
    Sort(String, Direction),
}

/// Parse a complete filter expression.
pub fn parse(input: &str) -> Result<Query, ParseError> {
    let input = input.trim();

    match parse_cages(input) {
        Ok(("", cages)) => Ok(build(cages)),
        Ok((remaining, _)) => Err(ParseError::new(
            input.len() - remaining.len(),
            format!("Unexpected trailing content: '{}'", remaining),
        )),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ParseError::new(
            input.len() - e.input.len(),
            format!("Parse failed: {:?}", e.code),
        )),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::new(input.len(), "Unexpected end of input")),
    }
}

fn build(cages: Vec<Cage>) -> Query {
    let mut query = Query::new();
    for cage in cages {
        match cage {
            Cage::Sort(field, direction) => query = query.order_by(field, direction),
            Cage::Filter { mut groups, negated: false } if groups.len() == 1 => {
                for restriction in groups.remove(0) {
                    query.push(restriction);
                }
            }
            Cage::Filter { groups, negated } => {
                let queries = groups
                    .into_iter()
                    .map(|group| group.into_iter().fold(Query::new(), Query::filter))
                    .collect();
                let disjunction = Disjunction::new(queries);
                query = query.disjunction(if negated { disjunction.not() } else { disjunction });
            }
        }
    }
    query
}

/// Parse all cages.
fn parse_cages(input: &str) -> IResult<&str, Vec<Cage>> {
    terminated(many0(preceded(multispace0, parse_cage)), multispace0)(input)
}

/// Parse a single cage, optionally negated: `[...]` or `![...]`.
fn parse_cage(input: &str) -> IResult<&str, Cage> {
    let (input, negated) = map(opt(char('!')), |bang| bang.is_some())(input)?;
    let (input, _) = char('[')(input)?;
    let (input, _) = multispace0(input)?;

    let (input, cage) = if negated {
        map(parse_groups, |groups| Cage::Filter { groups, negated: true })(input)?
    } else {
        alt((
            parse_sort,
            map(parse_groups, |groups| Cage::Filter { groups, negated: false }),
        ))(input)?
    };

    let (input, _) = multispace0(input)?;
    let (input, _) = char(']')(input)?;
    Ok((input, cage))
}

/// Parse sort cage [^col] or [^!col].
fn parse_sort(input: &str) -> IResult<&str, Cage> {
    let (input, _) = char('^')(input)?;
    let (input, desc) = opt(char('!'))(input)?;
    let (input, field) = parse_identifier(input)?;

    let direction = if desc.is_some() { Direction::Desc } else { Direction::Asc };
    Ok((input, Cage::Sort(field.to_string(), direction)))
}

/// AND-groups separated by `|`.
fn parse_groups(input: &str) -> IResult<&str, Vec<Vec<Restriction>>> {
    separated_list1(ws(char('|')), separated_list1(ws(char('&')), parse_condition))(input)
}

/// Parse a single condition.
fn parse_condition(input: &str) -> IResult<&str, Restriction> {
    let (input, field) = parse_identifier(input)?;
    let (input, _) = multispace0(input)?;

    alt((
        map(preceded(tag("!:"), parse_list), move |values| Restriction::not_in(field, values)),
        map(preceded(tag("!~"), parse_text), move |text| Restriction::contains(field, text).not()),
        map(preceded(tag("!="), parse_operand), move |operand| match operand {
            (value, None) => Restriction::ne(field, value),
            (lower, Some(upper)) => Restriction::between(field, lower, upper).not(),
        }),
        map(preceded(char(':'), parse_list), move |values| Restriction::is_in(field, values)),
        map(preceded(char('~'), parse_text), move |text| Restriction::contains(field, text)),
        map(preceded(tag(">="), parse_value), move |v| Restriction::greater_or_equal(field, v)),
        map(preceded(tag("<="), parse_value), move |v| Restriction::less_or_equal(field, v)),
        map(preceded(char('>'), parse_value), move |v| Restriction::greater(field, v)),
        map(preceded(char('<'), parse_value), move |v| Restriction::less(field, v)),
        map(preceded(char('='), parse_operand), move |operand| match operand {
            (value, None) => Restriction::eq(field, value),
            (lower, Some(upper)) => Restriction::between(field, lower, upper),
        }),
    ))(input)
}

/// A value, or an inclusive `lower..upper` range.
fn parse_operand(input: &str) -> IResult<&str, (Value, Option<Value>)> {
    pair(parse_value, opt(preceded(tag(".."), parse_value)))(input)
}

/// Parse `(v1, v2, ...)`.
fn parse_list(input: &str) -> IResult<&str, Vec<Value>> {
    delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), parse_value),
        preceded(multispace0, char(')')),
    )(input)
}

/// Parse a value.
fn parse_value(input: &str) -> IResult<&str, Value> {
    let (input, _) = multispace0(input)?;

    alt((
        value(Value::Null, keyword("null")),
        value(Value::Bool(true), keyword("true")),
        value(Value::Bool(false), keyword("false")),
        parse_timestamp,
        parse_number,
        map(parse_quoted_string, Value::String),
        map(parse_word, |s| Value::String(s.to_string())),
    ))(input)
}

/// Text operand of `~`: quoted string or bare word.
fn parse_text(input: &str) -> IResult<&str, String> {
    preceded(
        multispace0,
        alt((parse_quoted_string, map(parse_word, str::to_string))),
    )(input)
}

/// Parse a number (integer or float).
fn parse_number(input: &str) -> IResult<&str, Value> {
    let (rest, num_str) = recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1)))))(input)?;

    let parsed = if num_str.contains('.') {
        num_str.parse().ok().map(Value::Float)
    } else {
        num_str.parse().ok().map(Value::Int)
    };
    match parsed {
        Some(v) => Ok((rest, v)),
        None => Err(nom::Err::Error(NomError::new(input, ErrorKind::Digit))),
    }
}

/// Parse `@<rfc3339>` or `@'<rfc3339>'`.
fn parse_timestamp(input: &str) -> IResult<&str, Value> {
    let raw = alt((
        parse_quoted_string,
        map(take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | '+')), str::to_string),
    ));
    map_res(preceded(char('@'), raw), |s: String| {
        DateTime::parse_from_rfc3339(&s).map(|t| Value::Timestamp(t.with_timezone(&Utc)))
    })(input)
}

/// Parse a quoted string.
fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('\'')(input)?;
    let (input, content) = take_while(|c| c != '\'')(input)?;
    let (input, _) = char('\'')(input)?;

    Ok((input, content.to_string()))
}

/// Parse an identifier (field name).
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Bare word value.
fn parse_word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(peek(satisfy(|c: char| c.is_alphanumeric() || c == '_'))))
}

fn ws<'a, O>(inner: impl FnMut(&'a str) -> IResult<&'a str, O>) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(multispace0, inner, multispace0)
}
