use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use super::error::CxmlError;

/// A single cell read from a relational table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Exact numeric (SQL `numeric`, JSON numbers with a fraction).
    Decimal(Decimal),
    /// Binary float; `NaN` counts as null.
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    /// Null, `NaN`, blank text and the text `nan` are all "absent".
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Float(f) => f.is_nan(),
            Self::Text(s) => {
                let s = s.trim();
                s.is_empty() || s.eq_ignore_ascii_case("nan")
            }
            _ => false,
        }
    }

    /// Numeric view of the cell. Text is parsed; anything else yields `None`.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Int(i) => Some(Decimal::from(*i)),
            Self::Decimal(d) => Some(*d),
            Self::Float(f) if f.is_finite() => Decimal::try_from(*f).ok(),
            Self::Text(s) => {
                let s = s.trim();
                Decimal::from_str(s)
                    .or_else(|_| Decimal::from_scientific(s))
                    .ok()
            }
            _ => None,
        }
    }

    /// Integer view, accepting integral decimals and digit-only text.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Decimal(d) if d.fract().is_zero() => i64::try_from(d.trunc()).ok(),
            Self::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                let v = *f as i64;
                (v as f64 == *f).then_some(v)
            }
            Self::Text(s) => {
                let s = s.trim();
                if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
                    s.parse().ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{}", d.normalize()),
            Self::Float(v) if v.is_nan() => f.write_str("nan"),
            Self::Float(v) => match Decimal::try_from(*v) {
                Ok(d) => write!(f, "{}", d.normalize()),
                Err(_) => write!(f, "{v}"),
            },
            Self::Text(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Ok(d) = Decimal::from_str(&n.to_string()) {
                    Self::Decimal(d)
                } else {
                    n.as_f64().map_or(Self::Null, Self::Float)
                }
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

/// A whole-table snapshot: ordered column names and rows of cells.
///
/// Column names are trimmed on construction; lookups elsewhere are
/// case-insensitive, so the original casing is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// An empty table with the given columns.
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().trim().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from columns and rows. Short rows are padded with nulls,
    /// long rows are truncated.
    pub fn from_rows<S: AsRef<str>>(columns: &[S], rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Append a row.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Builder-style [`Table::push_row`].
    pub fn row(mut self, row: Vec<Value>) -> Self {
        self.push_row(row);
        self
    }

    /// Build a table from a JSON array of objects (e.g. the result of
    /// `json_agg`). Columns are the union of object keys in first-seen order.
    pub fn from_json_records(records: &serde_json::Value) -> Result<Self, CxmlError> {
        let items = match records {
            serde_json::Value::Null => return Ok(Self::default()),
            serde_json::Value::Array(items) => items,
            other => {
                return Err(CxmlError::Store(format!(
                    "expected a JSON array of records, got {}",
                    json_kind(other)
                )));
            }
        };

        let mut columns: Vec<String> = Vec::new();
        for item in items {
            let obj = item.as_object().ok_or_else(|| {
                CxmlError::Store(format!("expected a JSON object, got {}", json_kind(item)))
            })?;
            for key in obj.keys() {
                if !columns.iter().any(|c| c == key.trim()) {
                    columns.push(key.trim().to_string());
                }
            }
        }

        let mut table = Self::new(&columns);
        for item in items {
            if let Some(obj) = item.as_object() {
                let mut row = vec![Value::Null; columns.len()];
                for (key, value) in obj {
                    if let Some(idx) = columns.iter().position(|c| c == key.trim()) {
                        row[idx] = Value::from(value);
                    }
                }
                table.rows.push(row);
            }
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows (columns alone do not count).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column with exactly this (trimmed) name.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row`/`col`, if both exist.
    pub fn cell(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Keep only the rows matching `keep`.
    pub fn filter_rows(&self, mut keep: impl FnMut(&[Value]) -> bool) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
