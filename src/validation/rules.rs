use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use time::{
    format_description::well_known::{Iso8601, Rfc3339},
    macros::format_description,
    Date, Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset,
};

use super::{ValidationErrors, ValidationResult};
use crate::transactions::repo_types::TransactionType;

pub(crate) const TYPE_INVALID: &str = "Transaction type must be either INCOME or EXPENSE";
pub(crate) const AMOUNT_REQUIRED: &str = "Amount is required";
pub(crate) const AMOUNT_NOT_NUMBER: &str = "Amount must be a number";
pub(crate) const AMOUNT_NOT_POSITIVE: &str = "Amount must be a positive number";
pub(crate) const AMOUNT_TOO_LARGE: &str = "Amount cannot exceed 999,999.99";
pub(crate) const AMOUNT_PRECISION: &str = "Amount cannot have more than 2 decimal places";
pub(crate) const DATE_REQUIRED: &str = "Date is required";
pub(crate) const DATE_INVALID: &str = "Invalid date format. Use YYYY-MM-DD or ISO 8601";
pub(crate) const DATE_TOO_FAR: &str = "Date cannot be more than 1 year in the future";
pub(crate) const DESCRIPTION_NOT_STRING: &str = "Description must be a string";
pub(crate) const DESCRIPTION_TOO_LONG: &str = "Description cannot exceed 500 characters";

const MAX_AMOUNT: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);
const MAX_DESCRIPTION_CHARS: usize = 500;

/// How a single transaction field is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rule {
    Kind,
    Amount,
    /// Calendar date, at most one year ahead.
    Date,
    /// Calendar date used as a list bound; blank means absent.
    BoundDate,
    Description,
}

pub(crate) struct FieldSpec {
    pub key: &'static str,
    pub rule: Rule,
    pub required: bool,
}

const fn field(key: &'static str, rule: Rule, required: bool) -> FieldSpec {
    FieldSpec {
        key,
        rule,
        required,
    }
}

pub(crate) const CREATE_TRANSACTION: &[FieldSpec] = &[
    field("type", Rule::Kind, true),
    field("amount", Rule::Amount, true),
    field("description", Rule::Description, false),
    field("date", Rule::Date, true),
];

pub(crate) const UPDATE_TRANSACTION: &[FieldSpec] = &[
    field("type", Rule::Kind, false),
    field("amount", Rule::Amount, false),
    field("description", Rule::Description, false),
    field("date", Rule::Date, false),
];

pub(crate) const TRANSACTION_FILTER: &[FieldSpec] = &[
    field("type", Rule::Kind, false),
    field("startDate", Rule::BoundDate, false),
    field("endDate", Rule::BoundDate, false),
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldValue {
    Kind(TransactionType),
    Amount(Decimal),
    Date(Date),
    Text(Option<String>),
}

/// Fields that were present and passed their rule, keyed by input name.
#[derive(Debug, Default)]
pub(crate) struct Parsed(Vec<(&'static str, FieldValue)>);

impl Parsed {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn kind(&self, key: &str) -> Option<TransactionType> {
        match self.get(key) {
            Some(FieldValue::Kind(k)) => Some(*k),
            _ => None,
        }
    }

    pub fn amount(&self, key: &str) -> Option<Decimal> {
        match self.get(key) {
            Some(FieldValue::Amount(a)) => Some(*a),
            _ => None,
        }
    }

    pub fn date(&self, key: &str) -> Option<Date> {
        match self.get(key) {
            Some(FieldValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    /// Outer `None`: field absent. Inner `None`: present but empty.
    pub fn text(&self, key: &str) -> Option<Option<String>> {
        match self.get(key) {
            Some(FieldValue::Text(t)) => Some(t.clone()),
            _ => None,
        }
    }
}

/// Runs every rule in `schema` against `input`, collecting all failures.
pub(crate) fn apply(schema: &[FieldSpec], input: &Value) -> ValidationResult<Parsed> {
    let empty = Map::new();
    let object = match input {
        Value::Object(map) => map,
        Value::Null => &empty,
        _ => return Err(ValidationErrors::single("input", "Expected an object")),
    };

    let mut errors = ValidationErrors::new();
    let mut parsed = Parsed::default();
    for spec in schema {
        match object.get(spec.key) {
            None => {
                if spec.required {
                    errors.push(spec.key, spec.rule.required_message());
                }
            }
            Some(raw) => match spec.rule.check(raw) {
                Ok(Some(value)) => parsed.0.push((spec.key, value)),
                Ok(None) => {}
                Err(messages) => {
                    for message in messages {
                        errors.push(spec.key, message);
                    }
                }
            },
        }
    }
    errors.finish(parsed)
}

impl Rule {
    fn required_message(&self) -> &'static str {
        match self {
            Rule::Kind => TYPE_INVALID,
            Rule::Amount => AMOUNT_REQUIRED,
            Rule::Date | Rule::BoundDate => DATE_REQUIRED,
            Rule::Description => DESCRIPTION_NOT_STRING,
        }
    }

    fn check(&self, raw: &Value) -> Result<Option<FieldValue>, Vec<&'static str>> {
        match self {
            Rule::Kind => raw
                .as_str()
                .and_then(TransactionType::parse)
                .map(|k| Some(FieldValue::Kind(k)))
                .ok_or_else(|| vec![TYPE_INVALID]),
            Rule::Amount => check_amount(raw).map(|a| Some(FieldValue::Amount(a))),
            Rule::Date => check_date(raw, OffsetDateTime::now_utc())
                .map(|d| Some(FieldValue::Date(d)))
                .map_err(|m| vec![m]),
            Rule::BoundDate => match raw {
                Value::Null => Ok(None),
                Value::String(s) if s.trim().is_empty() => Ok(None),
                Value::String(s) => parse_instant(s)
                    .map(|t| Some(FieldValue::Date(utc_date(t))))
                    .ok_or_else(|| vec![DATE_INVALID]),
                _ => Err(vec![DATE_INVALID]),
            },
            Rule::Description => match raw {
                Value::Null => Ok(Some(FieldValue::Text(None))),
                Value::String(s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        Ok(Some(FieldValue::Text(None)))
                    } else if trimmed.chars().count() > MAX_DESCRIPTION_CHARS {
                        Err(vec![DESCRIPTION_TOO_LONG])
                    } else {
                        Ok(Some(FieldValue::Text(Some(trimmed.to_string()))))
                    }
                }
                _ => Err(vec![DESCRIPTION_NOT_STRING]),
            },
        }
    }
}

pub(crate) fn check_amount(raw: &Value) -> Result<Decimal, Vec<&'static str>> {
    let Value::Number(number) = raw else {
        return Err(vec![AMOUNT_NOT_NUMBER]);
    };
    let text = number.to_string();
    let amount = match Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)) {
        Ok(amount) => amount,
        // Outside Decimal's range: only the sign matters.
        Err(_) => {
            let positive = number.as_f64().map_or(false, |f| f > 0.0);
            return Err(vec![if positive {
                AMOUNT_TOO_LARGE
            } else {
                AMOUNT_NOT_POSITIVE
            }]);
        }
    };

    let mut failures = Vec::new();
    if amount <= Decimal::ZERO {
        failures.push(AMOUNT_NOT_POSITIVE);
    }
    if amount > MAX_AMOUNT {
        failures.push(AMOUNT_TOO_LARGE);
    }
    if amount.normalize().scale() > 2 {
        failures.push(AMOUNT_PRECISION);
    }
    if failures.is_empty() {
        Ok(amount.normalize())
    } else {
        Err(failures)
    }
}

pub(crate) fn check_date(raw: &Value, now: OffsetDateTime) -> Result<Date, &'static str> {
    let text = match raw {
        Value::String(s) => s.trim(),
        Value::Null => return Err(DATE_REQUIRED),
        _ => return Err(DATE_INVALID),
    };
    if text.is_empty() {
        return Err(DATE_REQUIRED);
    }
    let instant = parse_instant(text).ok_or(DATE_INVALID)?;
    if instant > one_year_after(now) {
        return Err(DATE_TOO_FAR);
    }
    Ok(utc_date(instant))
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or an ISO 8601 date-time.
/// A date-time without an offset is read as UTC.
pub(crate) fn parse_instant(text: &str) -> Option<OffsetDateTime> {
    let day = format_description!("[year]-[month]-[day]");
    if let Ok(date) = Date::parse(text, &day) {
        return Some(date.midnight().assume_utc());
    }
    OffsetDateTime::parse(text, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(text, &Iso8601::DEFAULT))
        .or_else(|_| PrimitiveDateTime::parse(text, &Iso8601::DEFAULT).map(|t| t.assume_utc()))
        .ok()
}

fn utc_date(instant: OffsetDateTime) -> Date {
    instant.to_offset(UtcOffset::UTC).date()
}

fn one_year_after(now: OffsetDateTime) -> OffsetDateTime {
    let year = now.year() + 1;
    now.replace_year(year)
        // Feb 29 has no counterpart next year.
        .or_else(|_| now.replace_day(28).and_then(|d| d.replace_year(year)))
        .unwrap_or(now + Duration::days(365))
}

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Strips angle brackets and collapses whitespace; blank input becomes `None`.
pub fn sanitize_text(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    let stripped: String = raw.chars().filter(|c| *c != '<' && *c != '>').collect();
    let collapsed = WHITESPACE_RUN.replace_all(stripped.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}
