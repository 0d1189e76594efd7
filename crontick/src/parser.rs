//! Crontab specification parsing.
//!
//! A [`Parser`] turns a textual specification into a [`Schedule`]. Which
//! fields the specification must carry is configurable through [`Fields`]:
//! the standard configuration reads the classic five-field crontab
//! (minute, hour, day-of-month, month, day-of-week) plus `@`-descriptors,
//! while custom configurations can add a seconds field for sub-minute
//! schedules or reduce the grammar for testing.
//!
//! Beyond the field grammar (`*`, `?`, numbers, names, ranges, steps and
//! lists) a specification may carry a `TZ=`/`CRON_TZ=` prefix pinning
//! evaluation to an IANA timezone, and, when descriptors are enabled,
//! one of `@yearly`, `@annually`, `@monthly`, `@weekly`, `@daily`,
//! `@midnight`, `@hourly` or `@every <duration>`.

use std::time::Duration;

use bitflags::bitflags;
use chrono_tz::Tz;

use crate::schedule::{CronSchedule, EverySchedule, Schedule, STAR_BIT};

bitflags! {
    /// Configuration for which specification fields a [`Parser`] recognizes,
    /// listed in the order they appear in a specification.
    ///
    /// The `*_OPTIONAL` variants accept the field when present and fill in
    /// its default when omitted. At most one optional field may be
    /// configured.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Fields: u16 {
        /// Seconds field, default 0.
        const SECOND = 1 << 0;
        /// Optional seconds field, default 0.
        const SECOND_OPTIONAL = 1 << 1;
        /// Minutes field, default 0.
        const MINUTE = 1 << 2;
        /// Hours field, default 0.
        const HOUR = 1 << 3;
        /// Day-of-month field, default `*`.
        const DOM = 1 << 4;
        /// Month field, default `*`.
        const MONTH = 1 << 5;
        /// Day-of-week field, default `*`.
        const DOW = 1 << 6;
        /// Optional day-of-week field, default `*`.
        const DOW_OPTIONAL = 1 << 7;
        /// Allow `@yearly`, `@every 5m`, and the other named descriptors.
        const DESCRIPTOR = 1 << 8;
    }
}

/// Inclusive value bounds for one specification field, with the named
/// aliases the field accepts.
struct Bounds {
    min: u32,
    max: u32,
    names: Option<&'static [(&'static str, u32)]>,
}

const SECONDS: Bounds = Bounds { min: 0, max: 59, names: None };
const MINUTES: Bounds = Bounds { min: 0, max: 59, names: None };
const HOURS: Bounds = Bounds { min: 0, max: 23, names: None };
const DOM: Bounds = Bounds { min: 1, max: 31, names: None };
const MONTHS: Bounds = Bounds {
    min: 1,
    max: 12,
    names: Some(&[
        ("jan", 1),
        ("feb", 2),
        ("mar", 3),
        ("apr", 4),
        ("may", 5),
        ("jun", 6),
        ("jul", 7),
        ("aug", 8),
        ("sep", 9),
        ("oct", 10),
        ("nov", 11),
        ("dec", 12),
    ]),
};
const DOW: Bounds = Bounds {
    min: 0,
    max: 6,
    names: Some(&[
        ("sun", 0),
        ("mon", 1),
        ("tue", 2),
        ("wed", 3),
        ("thu", 4),
        ("fri", 5),
        ("sat", 6),
    ]),
};

/// Specification fields in positional order, with the default used when a
/// field is not part of the parser's configuration.
const PLACES: [Fields; 6] = [
    Fields::SECOND,
    Fields::MINUTE,
    Fields::HOUR,
    Fields::DOM,
    Fields::MONTH,
    Fields::DOW,
];
const DEFAULTS: [&str; 6] = ["0", "0", "0", "*", "*", "*"];

/// Errors produced while parsing a specification.
///
/// The messages are the parser's diagnostics and are surfaced verbatim as
/// the cause of [`Error::Spec`](crate::error::Error::Spec).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty spec string")]
    EmptySpec,

    #[error("provided bad location {name}: {reason}")]
    BadLocation { name: String, reason: String },

    #[error("parser does not accept descriptors: {0}")]
    DescriptorsDisabled(String),

    #[error("unrecognized descriptor: {0}")]
    UnknownDescriptor(String),

    #[error("failed to parse duration {expr}: {reason}")]
    BadDuration { expr: String, reason: String },

    #[error("multiple optionals may not be configured")]
    MultipleOptionals,

    #[error("expected exactly {expected} fields, found {found}: [{fields}]")]
    FieldCount { expected: usize, found: usize, fields: String },

    #[error("expected {min} to {max} fields, found {found}: [{fields}]")]
    FieldCountRange { min: usize, max: usize, found: usize, fields: String },

    #[error("too many hyphens: {0}")]
    TooManyHyphens(String),

    #[error("too many slashes: {0}")]
    TooManySlashes(String),

    #[error("failed to parse int from {expr}: {reason}")]
    BadInt { expr: String, reason: String },

    #[error("negative number ({value}) not allowed: {expr}")]
    Negative { value: i64, expr: String },

    #[error("beginning of range ({start}) below minimum ({min}): {expr}")]
    RangeBelowMinimum { start: u32, min: u32, expr: String },

    #[error("end of range ({end}) above maximum ({max}): {expr}")]
    RangeAboveMaximum { end: u32, max: u32, expr: String },

    #[error("beginning of range ({start}) beyond end of range ({end}): {expr}")]
    RangeInverted { start: u32, end: u32, expr: String },

    #[error("step of range should be a positive number: {0}")]
    ZeroStep(String),
}

/// A crontab specification parser for a configured set of [`Fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parser {
    options: Fields,
}

impl Parser {
    /// Creates a parser recognizing exactly the given fields.
    pub fn new(options: Fields) -> Self {
        Self { options }
    }

    /// The standard crontab parser: minute, hour, day-of-month, month,
    /// day-of-week, and named descriptors. Seconds are not recognized.
    pub fn standard() -> Self {
        Self::new(
            Fields::MINUTE
                | Fields::HOUR
                | Fields::DOM
                | Fields::MONTH
                | Fields::DOW
                | Fields::DESCRIPTOR,
        )
    }

    /// The fields this parser recognizes.
    pub fn options(&self) -> Fields {
        self.options
    }

    /// Parses a specification into a [`Schedule`].
    pub fn parse(&self, spec: &str) -> Result<Schedule, ParseError> {
        if spec.is_empty() {
            return Err(ParseError::EmptySpec);
        }

        let mut spec = spec;
        let mut tz: Option<Tz> = None;
        if let Some(rest) = spec
            .strip_prefix("TZ=")
            .or_else(|| spec.strip_prefix("CRON_TZ="))
        {
            let Some((name, tail)) = rest.split_once(char::is_whitespace) else {
                return Err(ParseError::BadLocation {
                    name: rest.to_string(),
                    reason: "missing schedule after timezone".to_string(),
                });
            };
            tz = Some(name.parse::<Tz>().map_err(|reason| ParseError::BadLocation {
                name: name.to_string(),
                reason,
            })?);
            spec = tail.trim_start();
        }

        if spec.starts_with('@') {
            if !self.options.contains(Fields::DESCRIPTOR) {
                return Err(ParseError::DescriptorsDisabled(spec.to_string()));
            }
            return parse_descriptor(spec, tz);
        }

        let fields = normalize_fields(spec.split_whitespace().collect(), self.options)?;

        Ok(Schedule::Cron(CronSchedule {
            second: get_field(fields[0], &SECONDS)?,
            minute: get_field(fields[1], &MINUTES)?,
            hour: get_field(fields[2], &HOURS)?,
            dom: get_field(fields[3], &DOM)?,
            month: get_field(fields[4], &MONTHS)?,
            dow: get_field(fields[5], &DOW)?,
            tz,
        }))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::standard()
    }
}

/// Validates the field count against the configured set, fills a missing
/// optional field with its default, and expands fields outside the set to
/// their defaults so the result always covers all six positions.
fn normalize_fields(mut fields: Vec<&str>, options: Fields) -> Result<[&str; 6], ParseError> {
    let mut options = options;
    let mut optionals = 0;
    if options.contains(Fields::SECOND_OPTIONAL) {
        options |= Fields::SECOND;
        optionals += 1;
    }
    if options.contains(Fields::DOW_OPTIONAL) {
        options |= Fields::DOW;
        optionals += 1;
    }
    if optionals > 1 {
        return Err(ParseError::MultipleOptionals);
    }

    let max = PLACES.iter().filter(|place| options.contains(**place)).count();
    let min = max - optionals;
    let count = fields.len();
    if count < min || count > max {
        let joined = fields.join(" ");
        return Err(if min == max {
            ParseError::FieldCount { expected: min, found: count, fields: joined }
        } else {
            ParseError::FieldCountRange { min, max, found: count, fields: joined }
        });
    }
    if min < max && count == min {
        if options.contains(Fields::DOW_OPTIONAL) {
            fields.push(DEFAULTS[5]);
        } else {
            fields.insert(0, DEFAULTS[0]);
        }
    }

    let mut expanded = DEFAULTS;
    let mut provided = fields.into_iter();
    for (slot, place) in expanded.iter_mut().zip(PLACES.iter()) {
        if options.contains(*place) {
            if let Some(field) = provided.next() {
                *slot = field;
            }
        }
    }
    Ok(expanded)
}

/// Parses a comma-separated list of range expressions into a bitmask.
fn get_field(field: &str, bounds: &Bounds) -> Result<u64, ParseError> {
    let mut bits = 0;
    for expr in field.split(',') {
        bits |= get_range(expr, bounds)?;
    }
    Ok(bits)
}

/// Parses a single `number | number-number | * | ? [/ step]` expression.
fn get_range(expr: &str, bounds: &Bounds) -> Result<u64, ParseError> {
    let mut parts = expr.splitn(3, '/');
    let range = parts.next().unwrap_or_default();
    let step_part = parts.next();
    if parts.next().is_some() {
        return Err(ParseError::TooManySlashes(expr.to_string()));
    }

    let low_high: Vec<&str> = range.splitn(3, '-').collect();
    let mut extra = 0;
    let (start, mut end, single_value) = if low_high[0] == "*" || low_high[0] == "?" {
        extra = STAR_BIT;
        (bounds.min, bounds.max, true)
    } else {
        let start = parse_int_or_name(low_high[0], bounds.names)?;
        match low_high.len() {
            1 => (start, start, true),
            2 => (start, parse_int_or_name(low_high[1], bounds.names)?, false),
            _ => return Err(ParseError::TooManyHyphens(expr.to_string())),
        }
    };

    let step = match step_part {
        None => 1,
        Some(step) => {
            let step = parse_int(step)?;
            // "N/step" is shorthand for "N-max/step".
            if single_value {
                end = bounds.max;
            }
            if step > 1 {
                extra = 0;
            }
            step
        }
    };

    if start < bounds.min {
        return Err(ParseError::RangeBelowMinimum { start, min: bounds.min, expr: expr.to_string() });
    }
    if end > bounds.max {
        return Err(ParseError::RangeAboveMaximum { end, max: bounds.max, expr: expr.to_string() });
    }
    if start > end {
        return Err(ParseError::RangeInverted { start, end, expr: expr.to_string() });
    }
    if step == 0 {
        return Err(ParseError::ZeroStep(expr.to_string()));
    }

    Ok(get_bits(start, end, step) | extra)
}

fn parse_int_or_name(expr: &str, names: Option<&'static [(&'static str, u32)]>) -> Result<u32, ParseError> {
    if let Some(names) = names {
        if let Some((_, value)) = names.iter().find(|(name, _)| name.eq_ignore_ascii_case(expr)) {
            return Ok(*value);
        }
    }
    parse_int(expr)
}

fn parse_int(expr: &str) -> Result<u32, ParseError> {
    if let Some(stripped) = expr.strip_prefix('-') {
        if let Ok(value) = stripped.parse::<i64>() {
            return Err(ParseError::Negative { value: -value, expr: expr.to_string() });
        }
    }
    expr.parse::<u32>().map_err(|e| ParseError::BadInt {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Sets the bits from `min` through `max`, stepping by `step`.
fn get_bits(min: u32, max: u32, step: u32) -> u64 {
    if step == 1 {
        return (!0u64 >> (63 - max)) & (!0u64 << min);
    }
    let mut bits = 0;
    let mut value = min;
    while value <= max {
        bits |= 1 << value;
        value += step;
    }
    bits
}

/// Bitmask matching every value of a field, with the star bit set.
fn all(bounds: &Bounds) -> u64 {
    get_bits(bounds.min, bounds.max, 1) | STAR_BIT
}

/// Expands a `@descriptor` into its schedule.
fn parse_descriptor(spec: &str, tz: Option<Tz>) -> Result<Schedule, ParseError> {
    let cron = |second, minute, hour, dom, month, dow| {
        Schedule::Cron(CronSchedule { second, minute, hour, dom, month, dow, tz })
    };
    match spec {
        "@yearly" | "@annually" => Ok(cron(
            1 << SECONDS.min,
            1 << MINUTES.min,
            1 << HOURS.min,
            1 << DOM.min,
            1 << MONTHS.min,
            all(&DOW),
        )),
        "@monthly" => Ok(cron(
            1 << SECONDS.min,
            1 << MINUTES.min,
            1 << HOURS.min,
            1 << DOM.min,
            all(&MONTHS),
            all(&DOW),
        )),
        "@weekly" => Ok(cron(
            1 << SECONDS.min,
            1 << MINUTES.min,
            1 << HOURS.min,
            all(&DOM),
            all(&MONTHS),
            1 << DOW.min,
        )),
        "@daily" | "@midnight" => Ok(cron(
            1 << SECONDS.min,
            1 << MINUTES.min,
            1 << HOURS.min,
            all(&DOM),
            all(&MONTHS),
            all(&DOW),
        )),
        "@hourly" => Ok(cron(
            1 << SECONDS.min,
            1 << MINUTES.min,
            all(&HOURS),
            all(&DOM),
            all(&MONTHS),
            all(&DOW),
        )),
        _ => {
            if let Some(duration) = spec.strip_prefix("@every ") {
                let delay = parse_duration(duration).map_err(|reason| ParseError::BadDuration {
                    expr: duration.to_string(),
                    reason,
                })?;
                return Ok(Schedule::Every(EverySchedule::new(delay)));
            }
            Err(ParseError::UnknownDescriptor(spec.to_string()))
        }
    }
}

/// Parses durations of the form `90s`, `1h30m`, `500ms`: one or more
/// integer-and-unit segments with units `ns`, `us`, `ms`, `s`, `m`, `h`.
fn parse_duration(expr: &str) -> Result<Duration, String> {
    let mut rest = expr.trim();
    if rest.is_empty() {
        return Err("empty duration".to_string());
    }
    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in duration {expr}"))?;
        if digits == 0 {
            return Err(format!("invalid duration {expr}"));
        }
        let value: u128 = rest[..digits]
            .parse()
            .map_err(|_| format!("invalid duration {expr}"))?;
        rest = &rest[digits..];
        let (unit_nanos, unit_len) = if rest.starts_with("ns") {
            (1, 2)
        } else if rest.starts_with("us") {
            (1_000, 2)
        } else if rest.starts_with("ms") {
            (1_000_000, 2)
        } else if rest.starts_with('s') {
            (1_000_000_000, 1)
        } else if rest.starts_with('m') {
            (60_000_000_000, 1)
        } else if rest.starts_with('h') {
            (3_600_000_000_000, 1)
        } else {
            return Err(format!("unknown unit in duration {expr}"));
        };
        total_nanos += value * unit_nanos;
        rest = &rest[unit_len..];
    }
    Ok(Duration::from_nanos(u64::try_from(total_nanos).unwrap_or(u64::MAX)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cron(parser: &Parser, spec: &str) -> CronSchedule {
        match parser.parse(spec).expect("spec must parse") {
            Schedule::Cron(c) => c,
            other => panic!("expected a cron schedule, got {other:?}"),
        }
    }

    fn err(parser: &Parser, spec: &str) -> String {
        parser.parse(spec).expect_err("spec must not parse").to_string()
    }

    fn seconds_parser() -> Parser {
        Parser::new(
            Fields::SECOND
                | Fields::MINUTE
                | Fields::HOUR
                | Fields::DOM
                | Fields::MONTH
                | Fields::DOW
                | Fields::DESCRIPTOR,
        )
    }

    #[test]
    fn standard_spec_masks() {
        let schedule = cron(&Parser::standard(), "5 * * * *");
        assert_eq!(schedule.second, 1 << 0, "seconds default to 0");
        assert_eq!(schedule.minute, 1 << 5);
        assert_eq!(schedule.hour, all(&HOURS));
        assert_eq!(schedule.dom, all(&DOM));
        assert_eq!(schedule.month, all(&MONTHS));
        assert_eq!(schedule.dow, all(&DOW));
        assert_eq!(schedule.tz, None);
    }

    #[test]
    fn lists_ranges_and_steps() {
        let schedule = cron(&Parser::standard(), "1-3,5 */2 10-14/2 * *");
        assert_eq!(schedule.minute, 0b101110);
        assert_eq!(schedule.hour, get_bits(0, 23, 2), "*/2 drops the star bit");
        assert_eq!(schedule.dom, (1 << 10) | (1 << 12) | (1 << 14));
    }

    #[test]
    fn names_and_question_mark() {
        let schedule = cron(&Parser::standard(), "0 0 ? JAN-mar SUN");
        assert_eq!(schedule.dom, all(&DOM));
        assert_eq!(schedule.month, 0b1110);
        assert_eq!(schedule.dow, 1 << 0);
    }

    #[test]
    fn single_value_with_step_runs_to_max() {
        let schedule = cron(&seconds_parser(), "30/10 * * * * *");
        assert_eq!(schedule.second, (1 << 30) | (1 << 40) | (1 << 50));
    }

    #[test]
    fn minutes_only_parser_fills_defaults() {
        let parser = Parser::new(Fields::MINUTE);
        let schedule = cron(&parser, "30");
        assert_eq!(schedule.second, 1 << 0);
        assert_eq!(schedule.minute, 1 << 30);
        assert_eq!(schedule.hour, 1 << 0, "hours default to 0");
        assert_eq!(schedule.dom, all(&DOM));
    }

    #[test]
    fn optional_second_accepted_and_defaulted() {
        let parser = Parser::new(
            Fields::SECOND_OPTIONAL
                | Fields::MINUTE
                | Fields::HOUR
                | Fields::DOM
                | Fields::MONTH
                | Fields::DOW,
        );
        assert_eq!(cron(&parser, "15 30 * * * *").second, 1 << 15);
        assert_eq!(cron(&parser, "30 * * * *").second, 1 << 0);
        assert_eq!(cron(&parser, "30 * * * *").minute, 1 << 30);
        assert_eq!(
            err(&parser, "* * * *"),
            "expected 5 to 6 fields, found 4: [* * * *]"
        );
    }

    #[test]
    fn optional_dow_appends_star() {
        let parser = Parser::new(Fields::MINUTE | Fields::HOUR | Fields::DOM | Fields::MONTH | Fields::DOW_OPTIONAL);
        assert_eq!(cron(&parser, "30 8 1 1").dow, all(&DOW));
        assert_eq!(cron(&parser, "30 8 1 1 MON").dow, 1 << 1);
    }

    #[test]
    fn descriptor_equivalences() {
        let parser = Parser::standard();
        assert_eq!(parser.parse("@yearly"), seconds_parser().parse("0 0 0 1 1 *"));
        assert_eq!(parser.parse("@annually"), parser.parse("@yearly"));
        assert_eq!(parser.parse("@monthly"), seconds_parser().parse("0 0 0 1 * *"));
        assert_eq!(parser.parse("@weekly"), seconds_parser().parse("0 0 0 * * 0"));
        assert_eq!(parser.parse("@daily"), parser.parse("@midnight"));
        assert_eq!(parser.parse("@hourly"), seconds_parser().parse("0 0 * * * *"));
    }

    #[test]
    fn every_descriptor() {
        let parser = Parser::standard();
        match parser.parse("@every 1h30m").expect("spec must parse") {
            Schedule::Every(e) => assert_eq!(e.delay(), Duration::from_secs(5400)),
            other => panic!("expected an interval schedule, got {other:?}"),
        }
        match parser.parse("@every 500ms").expect("spec must parse") {
            Schedule::Every(e) => assert_eq!(e.delay(), Duration::from_secs(1)),
            other => panic!("expected an interval schedule, got {other:?}"),
        }
        assert!(err(&parser, "@every fast").starts_with("failed to parse duration fast"));
        assert!(err(&parser, "@every 90").contains("missing unit in duration 90"));
    }

    #[test]
    fn timezone_prefix() {
        let schedule = cron(&Parser::standard(), "TZ=America/New_York 30 4 * * *");
        assert_eq!(schedule.tz, Some("America/New_York".parse().expect("known timezone")));
        assert_eq!(schedule.minute, 1 << 30);

        let schedule = cron(&Parser::standard(), "CRON_TZ=UTC 30 4 * * *");
        assert_eq!(schedule.tz, Some(chrono_tz::UTC));

        assert!(err(&Parser::standard(), "TZ=Nowhere/Land * * * * *")
            .starts_with("provided bad location Nowhere/Land"));
    }

    #[test]
    fn diagnostics() {
        let std = Parser::standard();
        assert_eq!(err(&std, ""), "empty spec string");
        assert_eq!(err(&std, "invalid"), "expected exactly 5 fields, found 1: [invalid]");
        assert_eq!(err(&std, "* * * *"), "expected exactly 5 fields, found 4: [* * * *]");
        assert_eq!(err(&std, "* * * * * *"), "expected exactly 5 fields, found 6: [* * * * * *]");
        assert_eq!(err(&std, "1-2-3 * * * *"), "too many hyphens: 1-2-3");
        assert_eq!(err(&std, "*/2/3 * * * *"), "too many slashes: */2/3");
        assert_eq!(err(&std, "-5 * * * *"), "negative number (-5) not allowed: -5");
        assert_eq!(err(&std, "60 * * * *"), "end of range (60) above maximum (59): 60");
        assert_eq!(err(&std, "* * 0 * *"), "beginning of range (0) below minimum (1): 0");
        assert_eq!(err(&std, "5-2 * * * *"), "beginning of range (5) beyond end of range (2): 5-2");
        assert_eq!(err(&std, "*/0 * * * *"), "step of range should be a positive number: */0");
        assert_eq!(err(&std, "@reboot"), "unrecognized descriptor: @reboot");
        assert!(err(&std, "x * * * *").starts_with("failed to parse int from x"));

        let minutes_only = Parser::new(Fields::MINUTE);
        assert_eq!(err(&minutes_only, "100"), "end of range (100) above maximum (59): 100");
        assert_eq!(err(&minutes_only, "@yearly"), "parser does not accept descriptors: @yearly");

        let both_optionals = Parser::new(Fields::SECOND_OPTIONAL | Fields::MINUTE | Fields::DOW_OPTIONAL);
        assert_eq!(err(&both_optionals, "* *"), "multiple optionals may not be configured");
    }
}
