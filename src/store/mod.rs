//! Table sourcing and status write-back.
//!
//! [`TableSource`] hands the pipeline whole-table snapshots; [`StatusStore`]
//! records what happened to each submission. [`MemoryStore`] implements
//! both in process. With the `postgres` feature, [`PgStore`] does the same
//! against a relational database.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::{CxmlError, InvoiceId, Sheet, Table};

mod memory;
#[cfg(feature = "postgres")]
mod pg;

pub use memory::*;
#[cfg(feature = "postgres")]
pub use pg::*;

/// The allow-listed set of tables a source may be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTable {
    Envelope,
    Header,
    Partners,
    Items,
    Taxes,
    Summary,
    Extrinsics,
    /// One flattened row per invoice line, carrying the record status.
    Snapshot,
}

impl SourceTable {
    /// The bundle sheet this table fills, `None` for the snapshot.
    pub fn sheet(self) -> Option<Sheet> {
        match self {
            Self::Envelope => Some(Sheet::Envelope),
            Self::Header => Some(Sheet::Header),
            Self::Partners => Some(Sheet::Partners),
            Self::Items => Some(Sheet::Items),
            Self::Taxes => Some(Sheet::Taxes),
            Self::Summary => Some(Sheet::Summary),
            Self::Extrinsics => Some(Sheet::Extrinsics),
            Self::Snapshot => None,
        }
    }
}

impl From<Sheet> for SourceTable {
    fn from(sheet: Sheet) -> Self {
        match sheet {
            Sheet::Envelope => Self::Envelope,
            Sheet::Header => Self::Header,
            Sheet::Partners => Self::Partners,
            Sheet::Items => Self::Items,
            Sheet::Taxes => Self::Taxes,
            Sheet::Summary => Self::Summary,
            Sheet::Extrinsics => Self::Extrinsics,
        }
    }
}

/// Whole-table reads.
pub trait TableSource {
    /// Load every row of `table`. For [`SourceTable::Snapshot`] a source may
    /// already restrict the result to pending rows.
    fn load(&self, table: SourceTable) -> Result<Table, CxmlError>;
}

/// Status of an invoice's source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordStatus {
    Pending,
    Sent,
    Error,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row written to the exceptions table when the endpoint rejects an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub exception_type: String,
    pub trans_id: String,
    pub trans_version: i32,
    pub business_date: Option<NaiveDate>,
    /// Workflow status of the exception itself, not of the invoice.
    pub status: String,
    pub trade_date: Option<NaiveDate>,
    pub description: String,
    pub http_code: u16,
}

impl ExceptionRecord {
    pub const VALIDATION_TYPE: &'static str = "goodToPay_Validation";

    /// A fresh validation exception for a rejected submission.
    pub fn rejection(
        id: &InvoiceId,
        business_date: Option<NaiveDate>,
        description: impl Into<String>,
        http_code: u16,
    ) -> Self {
        Self {
            exception_type: Self::VALIDATION_TYPE.into(),
            trans_id: id.to_string(),
            trans_version: 1,
            business_date,
            status: "Pending".into(),
            trade_date: business_date,
            description: description.into(),
            http_code,
        }
    }
}

/// Status write-back.
pub trait StatusStore {
    /// Set the record status of every source row of `id`.
    fn set_record_status(&self, id: &InvoiceId, status: RecordStatus) -> Result<(), CxmlError>;

    fn insert_exception(&self, record: &ExceptionRecord) -> Result<(), CxmlError>;

    /// Insert the exception and mark the invoice [`RecordStatus::Error`].
    ///
    /// Stores that can do both atomically should override this.
    fn record_rejection(&self, id: &InvoiceId, record: &ExceptionRecord) -> Result<(), CxmlError> {
        self.insert_exception(record)?;
        self.set_record_status(id, RecordStatus::Error)
    }
}
