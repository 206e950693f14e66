use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{CxmlError, check_identifier};
use crate::cxml::DocumentDefaults;
use crate::store::SourceTable;

/// Where a batch reads its invoices from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Seven separate tables sharing an invoice-identifier column.
    #[default]
    Sheets,
    /// One flattened table, filtered to pending rows.
    Snapshot,
}

impl SourceMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sheets" => Some(Self::Sheets),
            "snapshot" => Some(Self::Snapshot),
            _ => None,
        }
    }
}

/// Physical table and column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub envelope: String,
    pub header: String,
    pub partners: String,
    pub items: String,
    pub taxes: String,
    pub summary: String,
    pub extrinsics: String,
    pub snapshot: String,
    pub exceptions: String,
    /// Record-status column of the snapshot table.
    pub status_column: String,
    /// Invoice-identifier column used for status write-back.
    pub id_column: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            envelope: "cxml_envelope".into(),
            header: "cxml_header".into(),
            partners: "cxml_partners".into(),
            items: "cxml_items".into(),
            taxes: "cxml_taxes".into(),
            summary: "cxml_summary".into(),
            extrinsics: "cxml_extrinsics".into(),
            snapshot: "good_to_pay".into(),
            exceptions: "examin_exception".into(),
            status_column: "record_status".into(),
            id_column: "invoice_id".into(),
        }
    }
}

impl TableNames {
    pub fn name(&self, table: SourceTable) -> &str {
        match table {
            SourceTable::Envelope => &self.envelope,
            SourceTable::Header => &self.header,
            SourceTable::Partners => &self.partners,
            SourceTable::Items => &self.items,
            SourceTable::Taxes => &self.taxes,
            SourceTable::Summary => &self.summary,
            SourceTable::Extrinsics => &self.extrinsics,
            SourceTable::Snapshot => &self.snapshot,
        }
    }

    /// Reject any name that is unsafe to interpolate into SQL.
    pub fn validate(&self) -> Result<(), CxmlError> {
        for name in [
            &self.envelope,
            &self.header,
            &self.partners,
            &self.items,
            &self.taxes,
            &self.summary,
            &self.extrinsics,
            &self.snapshot,
            &self.exceptions,
            &self.status_column,
            &self.id_column,
        ] {
            check_identifier(name)?;
        }
        Ok(())
    }
}

/// Everything a batch run needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub database_url: String,
    pub schema: String,
    pub tables: TableNames,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub source: SourceMode,
    /// When set, each serialized document is also written to
    /// `<output_dir>/<invoice_id>.xml`.
    pub output_dir: Option<PathBuf>,
    /// Fail the batch when a non-empty table has no identifier column.
    pub require_identifier_columns: bool,
    /// JSON file with the signature material.
    pub signature_file: Option<PathBuf>,
    pub document: DocumentDefaults,
}

const DEFAULT_DATABASE_URL: &str = "postgresql://localhost:5432/examin";
const DEFAULT_ENDPOINT: &str = "http://localhost:8000/cxml";

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            schema: "public".into(),
            tables: TableNames::default(),
            endpoint: DEFAULT_ENDPOINT.into(),
            timeout_secs: 60,
            source: SourceMode::Sheets,
            output_dir: None,
            require_identifier_columns: true,
            signature_file: None,
            document: DocumentDefaults::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `CXML_*` environment variables.
    pub fn from_env() -> Result<Self, CxmlError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Like [`PipelineConfig::from_env`], reading variables through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, CxmlError> {
        let mut config = Self::default();
        if let Some(url) = var("CXML_DATABASE_URL").or_else(|| var("DATABASE_URL")) {
            config.database_url = url;
        }
        if let Some(schema) = var("CXML_SCHEMA") {
            config.schema = schema;
        }
        if let Some(endpoint) = var("CXML_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(secs) = var("CXML_TIMEOUT_SECS") {
            config.timeout_secs = secs.trim().parse().map_err(|_| {
                CxmlError::Configuration(format!("CXML_TIMEOUT_SECS is not a number: {secs:?}"))
            })?;
        }
        if let Some(mode) = var("CXML_SOURCE") {
            config.source = SourceMode::parse(&mode).ok_or_else(|| {
                CxmlError::Configuration(format!(
                    "CXML_SOURCE must be sheets or snapshot: {mode:?}"
                ))
            })?;
        }
        if let Some(dir) = var("CXML_OUTPUT_DIR") {
            config.output_dir = Some(dir.into());
        }
        if let Some(path) = var("CXML_SIGNATURE_FILE") {
            config.signature_file = Some(path.into());
        }
        if let Some(url) = var("CXML_DTD_URL") {
            config.document.dtd_url = url;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, CxmlError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CxmlError::Configuration(format!("invalid pipeline config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CxmlError> {
        check_identifier(&self.schema)?;
        self.tables.validate()?;
        if self.timeout_secs == 0 {
            return Err(CxmlError::Configuration("timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
