//! Runs the whole batch against an in-memory store and a local endpoint
//! stand-in that rejects every invoice without a purchase order.

use std::time::Duration;

use chrono::Local;
use cxml_invoice::core::*;
use cxml_invoice::cxml::{SignatureMaterial, StaticSignature, parse_status, status_document};
use cxml_invoice::pipeline::{InvoiceOutcome, Pipeline, PipelineConfig, SourceMode};
use cxml_invoice::store::{MemoryStore, SourceTable};
use cxml_invoice::submit::{SubmissionResponse, Transport, TransportError};
use tracing_subscriber::EnvFilter;

struct LocalEndpoint;

impl Transport for LocalEndpoint {
    fn submit(&self, body: &[u8]) -> Result<SubmissionResponse, TransportError> {
        let text = String::from_utf8_lossy(body);
        let (status, label, message) = if text.contains(r#"orderID="""#) {
            (406, "Not Acceptable", "Missing purchase order reference")
        } else {
            (201, "Accepted", "Acknowledged")
        };
        let body = status_document(status, label, message, Local::now().fixed_offset())
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();
        Ok(SubmissionResponse { status, body })
    }

    fn endpoint(&self) -> &str {
        "local"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let snapshot = Table::from_json_records(&serde_json::json!([
        {"invoice_id": 1001, "invoice_date": "2025-06-01", "order_id": "PO-1", "line_no": 1,
         "quantity": 2, "unit_price": 50, "currency": "GBP", "tax_amount": 20,
         "taxable_amount": 100, "supplier_name": "ACME Ltd", "record_status": null},
        {"invoice_id": 1002, "invoice_date": "2025-06-02", "order_id": null, "line_no": 1,
         "quantity": 1, "unit_price": 10, "currency": "GBP", "tax_amount": 2,
         "taxable_amount": 10, "supplier_name": "ACME Ltd", "record_status": "PENDING"},
        {"invoice_id": 1003, "invoice_date": "2025-06-03", "order_id": "PO-3", "line_no": 1,
         "quantity": 1, "unit_price": 99, "currency": "GBP", "tax_amount": 19.8,
         "taxable_amount": 99, "supplier_name": "ACME Ltd", "record_status": "SENT"}
    ]))?;
    let store = MemoryStore::new().with(SourceTable::Snapshot, snapshot);

    let config = PipelineConfig {
        source: SourceMode::Snapshot,
        output_dir: Some(std::env::temp_dir().join("cxml-invoice-offline")),
        ..PipelineConfig::default()
    };
    let signer = StaticSignature(SignatureMaterial::default());
    let report = Pipeline::new(&config, &store, &store, &LocalEndpoint, &signer).run()?;

    for r in &report.invoices {
        match &r.outcome {
            InvoiceOutcome::Sent => println!("{}: sent", r.invoice_id),
            InvoiceOutcome::Rejected { http_code, description } => {
                println!("{}: rejected ({http_code}) {description}", r.invoice_id)
            }
            InvoiceOutcome::TransportFailed(e) => println!("{}: {e}", r.invoice_id),
            InvoiceOutcome::Failed(e) => println!("{}: {e}", r.invoice_id),
        }
    }
    for e in store.exceptions() {
        println!("exception: {} {} {}", e.trans_id, e.http_code, e.description);
    }

    // The acknowledgment format the endpoint speaks.
    let ack = status_document(201, "Accepted", "Acknowledged", Local::now().fixed_offset())?;
    let status = parse_status(std::str::from_utf8(&ack)?)?;
    println!("ack parses as {} {}", status.code, status.text);
    Ok(())
}
