use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};
use rust_decimal::Decimal;

use super::fields::Field;
use super::table::{Table, Value};

/// Resolve a logical field to the physical column name present in `table`.
///
/// Aliases are tried in order and compared case-insensitively after trimming.
/// Returns `None` for an empty table or when no alias matches; callers treat
/// that as "field absent, use the default".
pub fn resolve<'t>(table: &'t Table, field: &Field) -> Option<&'t str> {
    column_index(table, field).map(|idx| table.columns()[idx].as_str())
}

/// Like [`resolve`], but returns the column position.
pub fn column_index(table: &Table, field: &Field) -> Option<usize> {
    if table.is_empty() {
        return None;
    }
    field.aliases.iter().find_map(|alias| {
        let wanted = alias.trim();
        table
            .columns()
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(wanted))
    })
}

/// First non-absent value of `field` in `table`.
///
/// Null, `NaN` and blank cells are skipped; `None` means the caller's
/// default applies.
pub fn first_value<'t>(table: &'t Table, field: &Field) -> Option<&'t Value> {
    let col = column_index(table, field)?;
    table
        .rows()
        .iter()
        .filter_map(|row| row.get(col))
        .find(|v| !v.is_null())
}

/// [`first_value`] passed through [`text_or_none`].
pub fn first_text(table: &Table, field: &Field) -> Option<String> {
    first_value(table, field).and_then(text_or_none)
}

/// [`first_text`] with a fallback.
pub fn first_text_or(table: &Table, field: &Field, default: &str) -> String {
    first_text(table, field).unwrap_or_else(|| default.to_string())
}

/// Numeric [`first_value`]; unparseable text counts as absent.
pub fn first_decimal(table: &Table, field: &Field) -> Option<Decimal> {
    first_value(table, field).and_then(Value::to_decimal)
}

/// One row of a table, read through logical fields.
#[derive(Debug, Clone, Copy)]
pub struct Row<'t> {
    table: &'t Table,
    cells: &'t [Value],
}

impl<'t> Row<'t> {
    /// The cell for `field`, unless the column is missing or the cell is absent.
    pub fn get(&self, field: &Field) -> Option<&'t Value> {
        let col = column_index(self.table, field)?;
        self.cells.get(col).filter(|v| !v.is_null())
    }

    pub fn text(&self, field: &Field) -> Option<String> {
        self.get(field).and_then(text_or_none)
    }

    pub fn text_or(&self, field: &Field, default: &str) -> String {
        self.text(field).unwrap_or_else(|| default.to_string())
    }

    pub fn decimal(&self, field: &Field) -> Option<Decimal> {
        self.get(field).and_then(Value::to_decimal)
    }

    pub fn cells(&self) -> &'t [Value] {
        self.cells
    }
}

/// Iterate the rows of `table` as [`Row`] views.
pub fn rows(table: &Table) -> impl Iterator<Item = Row<'_>> {
    table.rows().iter().map(move |cells| Row { table, cells })
}

/// Trimmed text of a cell, with blank and `nan` collapsed to `None`.
pub fn text_or_none(value: &Value) -> Option<String> {
    if matches!(value, Value::Null) {
        return None;
    }
    let text = value.to_string();
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(text.to_string())
    }
}

/// A date-like cell after permissive parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    Naive(NaiveDateTime),
    Offset(DateTime<FixedOffset>),
}

impl ParsedDate {
    /// ISO-8601 rendering (`2025-06-01T00:00:00`, offset kept when present).
    pub fn to_iso(&self) -> String {
        match self {
            Self::Naive(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Self::Offset(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, false),
        }
    }

    /// Calendar date part.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Naive(dt) => dt.date(),
            Self::Offset(dt) => dt.date_naive(),
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

// Day-first: "01/06/2025" is the 1st of June.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
];

/// Parse a date-like cell, day-first for ambiguous numeric forms.
pub fn parse_date(value: &Value) -> Option<ParsedDate> {
    match value {
        Value::Date(d) => Some(ParsedDate::Naive(d.and_time(NaiveTime::MIN))),
        Value::DateTime(dt) => Some(ParsedDate::Naive(*dt)),
        Value::Text(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<ParsedDate> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(ParsedDate::Offset(dt));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(ParsedDate::Offset(dt));
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ParsedDate::Naive(dt));
        }
    }
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(s, fmt)
            .ok()
            .map(|d| ParsedDate::Naive(d.and_time(NaiveTime::MIN)))
    })
}

/// ISO-8601 text for a date-like cell, or `default` when it cannot be parsed.
pub fn iso_date(value: &Value, default: Option<&str>) -> Option<String> {
    parse_date(value)
        .map(|d| d.to_iso())
        .or_else(|| default.map(str::to_string))
}
