use chrono::NaiveDate;
use tracing::{info, warn};

use crate::core::fields::{INVOICE_ID, header};
use crate::core::{CxmlError, InvoiceId, Table, column_index, first_value, parse_date};
use crate::store::{ExceptionRecord, RecordStatus, StatusStore};
use crate::submit::ACCEPTED;

/// Outcome of writing back one submission result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Accepted; the source record is now [`RecordStatus::Sent`].
    Sent,
    /// Rejected; an exception was recorded and the source record is
    /// [`RecordStatus::Error`].
    Rejected { http_code: u16, description: String },
}

/// Record the endpoint's answer for one invoice.
///
/// Any status outside [`ACCEPTED`] is a rejection: the exception goes in
/// first, then the record is marked errored.
pub fn reconcile(
    store: &dyn StatusStore,
    id: &InvoiceId,
    business_date: Option<NaiveDate>,
    status_code: u16,
    description: &str,
) -> Result<Reconciliation, CxmlError> {
    if ACCEPTED.contains(&status_code) {
        store.set_record_status(id, RecordStatus::Sent)?;
        info!(invoice_id = %id, status = status_code, "invoice accepted");
        return Ok(Reconciliation::Sent);
    }

    let record = ExceptionRecord::rejection(id, business_date, description, status_code);
    store.record_rejection(id, &record)?;
    warn!(invoice_id = %id, status = status_code, %description, "invoice rejected");
    Ok(Reconciliation::Rejected {
        http_code: status_code,
        description: description.to_string(),
    })
}

/// [`reconcile`] with the identifier and business date taken from a
/// scoped Header table: the first row with a usable identifier names the
/// invoice, and its `invoice_date` (when parseable) is the business date.
pub fn reconcile_header(
    store: &dyn StatusStore,
    header_table: &Table,
    status_code: u16,
    description: &str,
) -> Result<Reconciliation, CxmlError> {
    let id = column_index(header_table, &INVOICE_ID)
        .and_then(|col| {
            header_table
                .rows()
                .iter()
                .find_map(|row| row.get(col).and_then(InvoiceId::from_value))
        })
        .ok_or_else(|| {
            CxmlError::Reconciliation("no usable invoice identifier to write back".into())
        })?;
    reconcile(
        store,
        &id,
        business_date(header_table),
        status_code,
        description,
    )
}

/// Date part of the Header's `invoice_date`, if it parses.
pub fn business_date(header_table: &Table) -> Option<NaiveDate> {
    first_value(header_table, &header::INVOICE_DATE)
        .and_then(parse_date)
        .map(|d| d.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::store::MemoryStore;

    fn header() -> Table {
        Table::new(&["InvoiceID", "invoiceDate"])
            .row(vec![Value::Null, Value::Null])
            .row(vec![Value::Int(4701265854), Value::from("2025-06-01")])
    }

    #[test]
    fn accepted_marks_sent() {
        let store = MemoryStore::new();
        let id = InvoiceId::Numeric(1);
        for code in ACCEPTED {
            assert_eq!(reconcile(&store, &id, None, code, "ok").unwrap(), Reconciliation::Sent);
        }
        assert_eq!(store.status(&id), Some(RecordStatus::Sent));
        assert!(store.exceptions().is_empty());
    }

    #[test]
    fn rejected_records_exception() {
        let store = MemoryStore::new();
        let out = reconcile_header(&store, &header(), 406, "DTD validation failed").unwrap();
        assert_eq!(
            out,
            Reconciliation::Rejected {
                http_code: 406,
                description: "DTD validation failed".into()
            }
        );
        let id = InvoiceId::Numeric(4701265854);
        assert_eq!(store.status(&id), Some(RecordStatus::Error));
        let exceptions = store.exceptions();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].http_code, 406);
        assert_eq!(exceptions[0].trans_id, "4701265854");
        assert_eq!(exceptions[0].business_date, NaiveDate::from_ymd_opt(2025, 6, 1));
    }

    #[test]
    fn missing_identifier_fails_fast() {
        let store = MemoryStore::new();
        let no_column = Table::new(&["invoiceDate"]).row(vec![Value::from("2025-06-01")]);
        let err = reconcile_header(&store, &no_column, 201, "").unwrap_err();
        assert!(matches!(err, CxmlError::Reconciliation(_)));

        let blank = Table::new(&["invoice_id"]).row(vec![Value::from(" nan ")]);
        assert!(reconcile_header(&store, &blank, 201, "").is_err());
        assert!(store.exceptions().is_empty());
    }

    #[test]
    fn unparseable_business_date_is_dropped() {
        let t = Table::new(&["invoice_date"]).row(vec![Value::from("someday")]);
        assert_eq!(business_date(&t), None);
    }
}
