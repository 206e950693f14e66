use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, info, info_span, warn};

use super::config::{PipelineConfig, SourceMode};
use super::reconcile::{Reconciliation, reconcile_header};
use crate::core::{CxmlError, InvoiceBundle, InvoiceId, Sheet, bundle_from_snapshot, pending_rows};
use crate::cxml::{Assembler, SignatureProvider, parse_status, serialize};
use crate::store::{SourceTable, StatusStore, TableSource};
use crate::submit::{SubmissionResponse, Transport, TransportError};

/// What happened to one invoice.
#[derive(Debug)]
pub enum InvoiceOutcome {
    Sent,
    /// The endpoint answered with a non-accept status.
    Rejected { http_code: u16, description: String },
    /// No HTTP status came back; nothing was written to the store.
    TransportFailed(TransportError),
    /// Assembly, serialization, or write-back failed.
    Failed(CxmlError),
}

#[derive(Debug)]
pub struct InvoiceReport {
    pub invoice_id: InvoiceId,
    pub payload_id: Option<String>,
    pub outcome: InvoiceOutcome,
}

/// Per-invoice results of a batch run, in processing order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub invoices: Vec<InvoiceReport>,
}

impl BatchReport {
    pub fn sent(&self) -> usize {
        self.count(|o| matches!(o, InvoiceOutcome::Sent))
    }

    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, InvoiceOutcome::Rejected { .. }))
    }

    /// Transport and processing failures together.
    pub fn failed(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                InvoiceOutcome::TransportFailed(_) | InvoiceOutcome::Failed(_)
            )
        })
    }

    pub fn get(&self, id: &InvoiceId) -> Option<&InvoiceReport> {
        self.invoices.iter().find(|r| &r.invoice_id == id)
    }

    fn count(&self, pred: impl Fn(&InvoiceOutcome) -> bool) -> usize {
        self.invoices.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Sequential batch: load, then for each invoice in ascending identifier
/// order scope, assemble, serialize, submit and reconcile.
///
/// A failing invoice is reported and skipped; only load-time failures
/// abort the run.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    source: &'a dyn TableSource,
    store: &'a dyn StatusStore,
    transport: &'a dyn Transport,
    signer: &'a dyn SignatureProvider,
    now: Option<DateTime<FixedOffset>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        source: &'a dyn TableSource,
        store: &'a dyn StatusStore,
        transport: &'a dyn Transport,
        signer: &'a dyn SignatureProvider,
    ) -> Self {
        Self {
            config,
            source,
            store,
            transport,
            signer,
            now: None,
        }
    }

    /// Pin the clock handed to the assembler.
    pub fn at(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }

    /// Read the configured source into one bundle covering every invoice.
    pub fn load_bundle(&self) -> Result<InvoiceBundle, CxmlError> {
        let bundle = match self.config.source {
            SourceMode::Sheets => {
                let mut bundle = InvoiceBundle::default();
                for sheet in Sheet::ALL {
                    *bundle.table_mut(sheet) = self.source.load(sheet.into())?;
                }
                bundle
            }
            SourceMode::Snapshot => {
                let flat = self.source.load(SourceTable::Snapshot)?;
                let pending = pending_rows(&flat, &self.config.tables.status_column);
                debug!(rows = flat.len(), pending = pending.len(), "snapshot loaded");
                bundle_from_snapshot(&pending)?
            }
        };
        if self.config.require_identifier_columns {
            bundle.validate()?;
        }
        Ok(bundle)
    }

    pub fn run(&self) -> Result<BatchReport, CxmlError> {
        let bundle = self.load_bundle()?;
        self.run_bundle(&bundle)
    }

    /// Process every invoice of an already loaded bundle.
    pub fn run_bundle(&self, bundle: &InvoiceBundle) -> Result<BatchReport, CxmlError> {
        let ids = bundle.invoice_ids()?;
        info!(invoices = ids.len(), endpoint = %self.transport.endpoint(), "starting batch");

        let mut report = BatchReport::default();
        for id in ids {
            report.invoices.push(self.process(&id, bundle));
        }
        info!(
            sent = report.sent(),
            rejected = report.rejected(),
            failed = report.failed(),
            "batch finished"
        );
        Ok(report)
    }

    /// Run one invoice through the whole chain. Failures land in the report.
    pub fn process(&self, id: &InvoiceId, bundle: &InvoiceBundle) -> InvoiceReport {
        let span = info_span!("invoice", id = %id);
        let _guard = span.enter();

        let scoped = bundle.scoped(id);
        let mut assembler = Assembler::new(&self.config.document, self.signer);
        if let Some(now) = self.now {
            assembler = assembler.at(now);
        }

        let report = |payload_id: Option<String>, outcome: InvoiceOutcome| InvoiceReport {
            invoice_id: id.clone(),
            payload_id,
            outcome,
        };

        let doc = match assembler.assemble(id, &scoped) {
            Ok(doc) => doc,
            Err(e) => {
                error!(invoice_id = %id, error = %e, "assembly failed");
                return report(None, InvoiceOutcome::Failed(e));
            }
        };
        let payload_id = Some(doc.payload_id.clone());
        let bytes = match serialize(&doc) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(invoice_id = %id, error = %e, "serialization failed");
                return report(payload_id, InvoiceOutcome::Failed(e));
            }
        };

        if let Some(dir) = &self.config.output_dir {
            match write_document(dir, id, &bytes) {
                Ok(path) => debug!(path = %path.display(), "document written"),
                Err(e) => warn!(
                    invoice_id = %id,
                    dir = %dir.display(),
                    error = %e,
                    "cannot write document"
                ),
            }
        }

        let response = match self.transport.submit(&bytes) {
            Ok(response) => response,
            Err(e) => {
                error!(
                    invoice_id = %id,
                    endpoint = %e.endpoint,
                    timeout_secs = e.timeout.as_secs(),
                    error = %e,
                    "submission failed"
                );
                return report(payload_id, InvoiceOutcome::TransportFailed(e));
            }
        };

        let description = describe(&response);
        let outcome = match reconcile_header(
            self.store,
            &scoped.header,
            response.status,
            &description,
        ) {
            Ok(Reconciliation::Sent) => InvoiceOutcome::Sent,
            Ok(Reconciliation::Rejected {
                http_code,
                description,
            }) => InvoiceOutcome::Rejected {
                http_code,
                description,
            },
            Err(e) => {
                error!(invoice_id = %id, error = %e, "status write-back failed");
                InvoiceOutcome::Failed(e)
            }
        };
        report(payload_id, outcome)
    }
}

const MAX_DESCRIPTION: usize = 500;

/// Reconciler description for a response: the cXML status message when
/// the body carries one, else the raw body (bounded), else the HTTP code.
fn describe(response: &SubmissionResponse) -> String {
    if let Ok(status) = parse_status(&response.body) {
        let text = status.description();
        if !text.trim().is_empty() {
            return text.trim().to_string();
        }
    }
    let body = response.body.trim();
    if body.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        body.chars().take(MAX_DESCRIPTION).collect()
    }
}

/// File name for an invoice: characters outside `[A-Za-z0-9_.-]` become `_`.
fn document_path(dir: &Path, id: &InvoiceId) -> PathBuf {
    let name: String = id
        .to_string()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{name}.xml"))
}

fn write_document(dir: &Path, id: &InvoiceId, bytes: &[u8]) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = document_path(dir, id);
    fs::write(&path, bytes)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::{Table, Value};
    use crate::cxml::StaticSignature;
    use crate::store::{MemoryStore, RecordStatus};

    fn response(status: u16, body: &str) -> SubmissionResponse {
        SubmissionResponse {
            status,
            body: body.into(),
        }
    }

    struct Accepting;

    impl Transport for Accepting {
        fn submit(&self, _body: &[u8]) -> Result<SubmissionResponse, TransportError> {
            Ok(response(201, ""))
        }

        fn endpoint(&self) -> &str {
            "http://accepting/cxml"
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }
    }

    #[test]
    fn write_back_needs_an_identifier_in_the_header() {
        let config = PipelineConfig::default();
        let store = MemoryStore::new();
        let signer = StaticSignature::default();
        let pipeline = Pipeline::new(&config, &store, &store, &Accepting, &signer);
        let id = InvoiceId::Numeric(7);

        // the items carry the id, so assembly works; the header does not
        let bundle = InvoiceBundle::default()
            .with(
                Sheet::Header,
                Table::new(&["invoice_date"]).row(vec![Value::from("2025-06-01")]),
            )
            .with(
                Sheet::Items,
                Table::new(&["invoice_id", "unit_price"])
                    .row(vec![Value::Int(7), Value::Int(5)]),
            );
        let report = pipeline.process(&id, &bundle);
        assert!(matches!(
            report.outcome,
            InvoiceOutcome::Failed(CxmlError::Reconciliation(_))
        ));
        assert_eq!(store.status(&id), None);

        let bundle = bundle.with(
            Sheet::Header,
            Table::new(&["invoice_id", "invoice_date"])
                .row(vec![Value::Int(7), Value::from("2025-06-01")]),
        );
        assert!(matches!(pipeline.process(&id, &bundle).outcome, InvoiceOutcome::Sent));
        assert_eq!(store.status(&id), Some(RecordStatus::Sent));
    }

    #[test]
    fn description_prefers_cxml_message() {
        let body = r#"<cXML><Response><Status code="406" text="Not Acceptable">Missing Header</Status></Response></cXML>"#;
        assert_eq!(describe(&response(406, body)), "Missing Header");
    }

    #[test]
    fn description_falls_back_to_body_then_code() {
        assert_eq!(describe(&response(502, "Bad Gateway")), "Bad Gateway");
        assert_eq!(describe(&response(500, "  ")), "HTTP 500");
        let long = "x".repeat(2000);
        assert_eq!(describe(&response(500, &long)).len(), MAX_DESCRIPTION);
    }

    #[test]
    fn document_names_are_path_safe() {
        let dir = Path::new("/out");
        assert_eq!(
            document_path(dir, &InvoiceId::Numeric(4701265854)),
            PathBuf::from("/out/4701265854.xml")
        );
        assert_eq!(
            document_path(dir, &InvoiceId::Text("../INV 7".into())),
            PathBuf::from("/out/.._INV_7.xml")
        );
    }
}
