use postgres::{Client, NoTls};
use tracing::debug;

use super::{ExceptionRecord, RecordStatus, SourceTable, StatusStore, TableSource};
use crate::core::{CxmlError, InvoiceId, Table, check_identifier};
use crate::pipeline::PipelineConfig;

const EXCEPTION_COLUMNS: &str =
    "exception_type, trans_id, trans_version, business_date, status, trade_date, description, http_code";

/// Postgres-backed [`TableSource`] and [`StatusStore`].
///
/// Each call opens its own connection and closes it before returning.
/// Table and column names come from [`PipelineConfig`] and are checked
/// against the identifier allow-list before they reach any query.
#[derive(Debug, Clone)]
pub struct PgStore {
    url: String,
    config: PipelineConfig,
}

fn store_err(e: postgres::Error) -> CxmlError {
    CxmlError::Store(e.to_string())
}

impl PgStore {
    pub fn new(config: &PipelineConfig) -> Result<Self, CxmlError> {
        config.validate()?;
        Ok(Self {
            url: config.database_url.clone(),
            config: config.clone(),
        })
    }

    fn with_client<T>(
        &self,
        f: impl FnOnce(&mut Client) -> Result<T, postgres::Error>,
    ) -> Result<T, CxmlError> {
        let mut client = Client::connect(&self.url, NoTls).map_err(store_err)?;
        let result = f(&mut client);
        let closed = client.close();
        let value = result.map_err(store_err)?;
        closed.map_err(store_err)?;
        Ok(value)
    }

    fn qualified(&self, table: &str) -> Result<String, CxmlError> {
        let name = format!("{}.{}", self.config.schema, table);
        check_identifier(&name)?;
        Ok(name)
    }

    /// `SELECT json_agg` over the whole table; the snapshot is restricted
    /// to rows whose status is blank or pending.
    pub fn load_query(&self, table: SourceTable) -> Result<String, CxmlError> {
        let name = self.qualified(self.config.tables.name(table))?;
        let filter = match table {
            SourceTable::Snapshot => {
                let status = check_identifier(&self.config.tables.status_column)?;
                format!(" WHERE {status} IS NULL OR upper({status}) = 'PENDING'")
            }
            _ => String::new(),
        };
        Ok(format!("SELECT json_agg(q) FROM (SELECT * FROM {name}{filter}) AS q"))
    }

    /// Update of the status column and `update_datetime`, keyed by id.
    pub fn status_query(&self) -> Result<String, CxmlError> {
        let name = self.qualified(&self.config.tables.snapshot)?;
        let status = check_identifier(&self.config.tables.status_column)?;
        let id = check_identifier(&self.config.tables.id_column)?;
        Ok(format!(
            "UPDATE {name} SET {status} = $1, update_datetime = NOW() WHERE {id}::text = $2"
        ))
    }

    /// Insert into the exceptions table. The record travels as JSON so the
    /// database coerces each field to its column type.
    pub fn exception_query(&self) -> Result<String, CxmlError> {
        let name = self.qualified(&self.config.tables.exceptions)?;
        Ok(format!(
            "INSERT INTO {name} ({EXCEPTION_COLUMNS}) \
             SELECT {EXCEPTION_COLUMNS} FROM json_populate_record(NULL::{name}, $1)"
        ))
    }
}

fn exception_json(record: &ExceptionRecord) -> Result<serde_json::Value, CxmlError> {
    serde_json::to_value(record)
        .map_err(|e| CxmlError::Store(format!("cannot encode exception record: {e}")))
}

impl TableSource for PgStore {
    fn load(&self, table: SourceTable) -> Result<Table, CxmlError> {
        let query = self.load_query(table)?;
        let json = self.with_client(|client| {
            let row = client.query_one(&query, &[])?;
            row.try_get::<_, Option<serde_json::Value>>(0)
        })?;
        let table_data = match json {
            Some(records) => Table::from_json_records(&records)?,
            None => Table::default(),
        };
        debug!(
            table = ?table,
            rows = table_data.len(),
            columns = table_data.columns().len(),
            "loaded table"
        );
        Ok(table_data)
    }
}

impl StatusStore for PgStore {
    fn set_record_status(&self, id: &InvoiceId, status: RecordStatus) -> Result<(), CxmlError> {
        let query = self.status_query()?;
        let id = id.to_string();
        let updated = self.with_client(|client| client.execute(&query, &[&status.as_str(), &id]))?;
        debug!(invoice_id = %id, %status, rows = updated, "record status written");
        Ok(())
    }

    fn insert_exception(&self, record: &ExceptionRecord) -> Result<(), CxmlError> {
        let query = self.exception_query()?;
        let json = exception_json(record)?;
        self.with_client(|client| client.execute(&query, &[&json]))?;
        Ok(())
    }

    /// Both writes in one transaction.
    fn record_rejection(&self, id: &InvoiceId, record: &ExceptionRecord) -> Result<(), CxmlError> {
        let insert = self.exception_query()?;
        let update = self.status_query()?;
        let json = exception_json(record)?;
        let id = id.to_string();
        self.with_client(|client| {
            let mut tx = client.transaction()?;
            tx.execute(&insert, &[&json])?;
            tx.execute(&update, &[&RecordStatus::Error.as_str(), &id])?;
            tx.commit()
        })
    }
}
