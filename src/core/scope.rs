use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::CxmlError;
use super::fields::INVOICE_ID;
use super::resolve::{column_index, text_or_none};
use super::table::{Table, Value};

/// Invoice identifier.
///
/// All-digit identifiers are numeric so that `"4701265854"`, `4701265854`
/// and `4701265854.0` in different tables all name the same invoice.
/// Numeric identifiers sort before textual ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InvoiceId {
    Numeric(i64),
    Text(String),
}

impl InvoiceId {
    /// Parse a textual identifier. Blank input has no identifier.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("nan") {
            return None;
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse() {
                return Some(Self::Numeric(n));
            }
        }
        Some(Self::Text(s.to_string()))
    }

    /// Identifier held in a table cell.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.to_integer() {
            Some(n) => Some(Self::Numeric(n)),
            None => text_or_none(value).and_then(|s| Self::parse(&s)),
        }
    }

    /// Whether a cell holds this identifier.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Numeric(n) => value.to_integer() == Some(*n),
            Self::Text(s) => text_or_none(value).is_some_and(|v| v == *s),
        }
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for InvoiceId {
    fn from(n: i64) -> Self {
        Self::Numeric(n)
    }
}

impl From<&InvoiceId> for Value {
    fn from(id: &InvoiceId) -> Self {
        match id {
            InvoiceId::Numeric(n) => Value::Int(*n),
            InvoiceId::Text(s) => Value::Text(s.clone()),
        }
    }
}

/// Rows of `table` belonging to `id`.
///
/// A table that is empty or has no identifier column applies to every
/// invoice and is returned unchanged.
pub fn scope(table: &Table, id: &InvoiceId) -> Table {
    match column_index(table, &INVOICE_ID) {
        Some(col) => table.filter_rows(|row| row.get(col).is_some_and(|v| id.matches(v))),
        None => table.clone(),
    }
}

/// The seven tables of an invoice bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sheet {
    Envelope,
    Header,
    Partners,
    Items,
    Taxes,
    Summary,
    Extrinsics,
}

impl Sheet {
    pub const ALL: [Sheet; 7] = [
        Sheet::Envelope,
        Sheet::Header,
        Sheet::Partners,
        Sheet::Items,
        Sheet::Taxes,
        Sheet::Summary,
        Sheet::Extrinsics,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Envelope => "Envelope",
            Self::Header => "Header",
            Self::Partners => "Partners",
            Self::Items => "Items",
            Self::Taxes => "Taxes",
            Self::Summary => "Summary",
            Self::Extrinsics => "Extrinsics",
        }
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Seven named tables sharing an invoice-identifier column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceBundle {
    pub envelope: Table,
    pub header: Table,
    pub partners: Table,
    pub items: Table,
    pub taxes: Table,
    pub summary: Table,
    pub extrinsics: Table,
}

impl InvoiceBundle {
    pub fn table(&self, sheet: Sheet) -> &Table {
        match sheet {
            Sheet::Envelope => &self.envelope,
            Sheet::Header => &self.header,
            Sheet::Partners => &self.partners,
            Sheet::Items => &self.items,
            Sheet::Taxes => &self.taxes,
            Sheet::Summary => &self.summary,
            Sheet::Extrinsics => &self.extrinsics,
        }
    }

    pub fn table_mut(&mut self, sheet: Sheet) -> &mut Table {
        match sheet {
            Sheet::Envelope => &mut self.envelope,
            Sheet::Header => &mut self.header,
            Sheet::Partners => &mut self.partners,
            Sheet::Items => &mut self.items,
            Sheet::Taxes => &mut self.taxes,
            Sheet::Summary => &mut self.summary,
            Sheet::Extrinsics => &mut self.extrinsics,
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, sheet: Sheet, table: Table) -> Self {
        *self.table_mut(sheet) = table;
        self
    }

    /// Per-invoice sub-bundle: every table passed through [`scope`].
    pub fn scoped(&self, id: &InvoiceId) -> Self {
        let mut out = Self::default();
        for sheet in Sheet::ALL {
            *out.table_mut(sheet) = scope(self.table(sheet), id);
        }
        out
    }

    /// Whether any table resolves an invoice-identifier column.
    pub fn has_identifier_column(&self) -> bool {
        Sheet::ALL
            .iter()
            .any(|s| column_index(self.table(*s), &INVOICE_ID).is_some())
    }

    /// Check that every non-empty table carries an identifier column.
    ///
    /// Tables without one would otherwise be applied to every invoice.
    pub fn validate(&self) -> Result<(), CxmlError> {
        let missing: Vec<&str> = Sheet::ALL
            .iter()
            .filter(|s| {
                let t = self.table(**s);
                !t.is_empty() && column_index(t, &INVOICE_ID).is_none()
            })
            .map(|s| s.name())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CxmlError::Configuration(format!(
                "no invoice identifier column in: {}",
                missing.join(", ")
            )))
        }
    }

    /// Distinct invoice identifiers of the Header table, ascending.
    pub fn invoice_ids(&self) -> Result<Vec<InvoiceId>, CxmlError> {
        if self.header.is_empty() {
            return Ok(Vec::new());
        }
        let col = column_index(&self.header, &INVOICE_ID).ok_or_else(|| {
            CxmlError::Configuration("Header table has no invoice identifier column".into())
        })?;
        let ids: BTreeSet<InvoiceId> = self
            .header
            .rows()
            .iter()
            .filter_map(|row| row.get(col).and_then(InvoiceId::from_value))
            .collect();
        Ok(ids.into_iter().collect())
    }
}
