use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use cxml_invoice::core::*;
use cxml_invoice::cxml::*;
use cxml_invoice::pipeline::*;
use cxml_invoice::store::*;
use cxml_invoice::submit::*;

fn now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2025-06-24T12:24:37+02:00").unwrap()
}

/// Answers from a script, one entry per submission, and keeps the bodies.
struct ScriptedTransport {
    script: RefCell<VecDeque<Result<SubmissionResponse, TransportError>>>,
    bodies: RefCell<Vec<String>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<SubmissionResponse, TransportError>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            bodies: RefCell::new(Vec::new()),
        }
    }

    fn answering(codes: &[u16]) -> Self {
        Self::new(codes.iter().map(|c| Ok(ack(*c))).collect())
    }
}

impl Transport for ScriptedTransport {
    fn submit(&self, body: &[u8]) -> Result<SubmissionResponse, TransportError> {
        self.bodies
            .borrow_mut()
            .push(String::from_utf8_lossy(body).into_owned());
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(ack(201)))
    }

    fn endpoint(&self) -> &str {
        "http://scripted/cxml"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

fn ack(code: u16) -> SubmissionResponse {
    let (text, message) = if code == 201 {
        ("Accepted", "Acknowledged")
    } else {
        ("Not Acceptable", "DTD validation failed")
    };
    let body = status_document(code, text, message, now()).unwrap();
    SubmissionResponse {
        status: code,
        body: String::from_utf8(body).unwrap(),
    }
}

fn timeout_error() -> TransportError {
    TransportError {
        kind: TransportErrorKind::Timeout,
        endpoint: "http://scripted/cxml".into(),
        timeout: Duration::from_secs(1),
        detail: "operation timed out".into(),
    }
}

fn sheets(ids: &[i64]) -> MemoryStore {
    let mut header = Table::new(&["invoice_id", "invoice_date"]);
    let mut items = Table::new(&["invoice_id", "quantity", "unit_price", "currency"]);
    let mut taxes = Table::new(&["invoice_id", "tax_amount", "taxable_amount"]);
    for id in ids {
        header.push_row(vec![Value::Int(*id), Value::from("2025-06-01")]);
        items.push_row(vec![
            Value::Int(*id),
            Value::Int(1),
            Value::Int(100),
            Value::from("GBP"),
        ]);
        taxes.push_row(vec![Value::Int(*id), Value::Int(20), Value::Int(100)]);
    }
    MemoryStore::new()
        .with(SourceTable::Header, header)
        .with(SourceTable::Items, items)
        .with(SourceTable::Taxes, taxes)
}

fn run(
    config: &PipelineConfig,
    store: &MemoryStore,
    transport: &ScriptedTransport,
    signer: &dyn SignatureProvider,
) -> BatchReport {
    Pipeline::new(config, store, store, transport, signer)
        .at(now())
        .run()
        .unwrap()
}

// --- Reconciliation outcomes ---

#[test]
fn accepted_submission_marks_sent() {
    let store = sheets(&[4701265854]);
    let transport = ScriptedTransport::answering(&[201]);
    let report = run(&PipelineConfig::default(), &store, &transport, &StaticSignature::default());

    assert_eq!(report.sent(), 1);
    let id = InvoiceId::Numeric(4701265854);
    assert_eq!(store.status(&id), Some(RecordStatus::Sent));
    assert!(store.exceptions().is_empty());
    assert!(report.get(&id).unwrap().payload_id.is_some());
}

#[test]
fn rejected_submission_records_exception() {
    let store = sheets(&[4701265854]);
    let transport = ScriptedTransport::answering(&[406]);
    let report = run(&PipelineConfig::default(), &store, &transport, &StaticSignature::default());

    assert_eq!(report.rejected(), 1);
    let id = InvoiceId::Numeric(4701265854);
    assert_eq!(store.status(&id), Some(RecordStatus::Error));
    let exceptions = store.exceptions();
    assert_eq!(exceptions.len(), 1);
    let e = &exceptions[0];
    assert_eq!(e.http_code, 406);
    assert_eq!(e.trans_id, "4701265854");
    assert_eq!(e.exception_type, "goodToPay_Validation");
    assert_eq!(e.description, "DTD validation failed");
    assert_eq!(e.business_date, NaiveDate::from_ymd_opt(2025, 6, 1));
}

// --- Batch behaviour ---

#[test]
fn invoices_are_processed_in_ascending_order() {
    let store = sheets(&[30, 10, 20]);
    let transport = ScriptedTransport::answering(&[201, 201, 201]);
    let report = run(&PipelineConfig::default(), &store, &transport, &StaticSignature::default());

    let order: Vec<String> = report.invoices.iter().map(|r| r.invoice_id.to_string()).collect();
    assert_eq!(order, ["10", "20", "30"]);
    let bodies = transport.bodies.borrow();
    assert!(bodies[0].contains(r#"invoiceID="10""#));
    assert!(bodies[2].contains(r#"invoiceID="30""#));
}

#[test]
fn transport_failure_does_not_stop_the_batch() {
    let store = sheets(&[1, 2]);
    let transport = ScriptedTransport::new(vec![Err(timeout_error()), Ok(ack(201))]);
    let report = run(&PipelineConfig::default(), &store, &transport, &StaticSignature::default());

    assert_eq!(report.failed(), 1);
    assert_eq!(report.sent(), 1);
    match &report.get(&InvoiceId::Numeric(1)).unwrap().outcome {
        InvoiceOutcome::TransportFailed(e) => assert_eq!(e.kind, TransportErrorKind::Timeout),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(store.status(&InvoiceId::Numeric(1)), None);
    assert_eq!(store.status(&InvoiceId::Numeric(2)), Some(RecordStatus::Sent));
}

/// Refuses to sign one payload.
struct PickySigner;

impl SignatureProvider for PickySigner {
    fn material(&self, ctx: &SignatureContext<'_>) -> Result<SignatureMaterial, CxmlError> {
        if ctx.payload_id == "bad" {
            Err(CxmlError::Signature("no key for payload".into()))
        } else {
            Ok(SignatureMaterial::default())
        }
    }
}

#[test]
fn assembly_failure_is_isolated_to_its_invoice() {
    let envelope = Table::new(&["invoice_id", "payload_id"])
        .row(vec![Value::Int(1), Value::from("bad")])
        .row(vec![Value::Int(2), Value::from("good")]);
    let store = sheets(&[1, 2]).with(SourceTable::Envelope, envelope);
    let transport = ScriptedTransport::answering(&[201]);
    let report = run(&PipelineConfig::default(), &store, &transport, &PickySigner);

    assert!(matches!(
        report.get(&InvoiceId::Numeric(1)).unwrap().outcome,
        InvoiceOutcome::Failed(CxmlError::Signature(_))
    ));
    assert!(matches!(
        report.get(&InvoiceId::Numeric(2)).unwrap().outcome,
        InvoiceOutcome::Sent
    ));
    assert_eq!(transport.bodies.borrow().len(), 1);
}

#[test]
fn overflowing_amounts_fail_only_their_invoice() {
    let mut store = sheets(&[2]);
    let mut items = Table::new(&["invoice_id", "quantity", "unit_price", "currency"]);
    items.push_row(vec![
        Value::Int(1),
        Value::from("1e20"),
        Value::from("1e20"),
        Value::from("GBP"),
    ]);
    items.push_row(vec![
        Value::Int(2),
        Value::Int(1),
        Value::Int(100),
        Value::from("GBP"),
    ]);
    let header = Table::new(&["invoice_id", "invoice_date"])
        .row(vec![Value::Int(1), Value::from("2025-06-01")])
        .row(vec![Value::Int(2), Value::from("2025-06-01")]);
    store.insert(SourceTable::Header, header);
    store.insert(SourceTable::Items, items);
    let transport = ScriptedTransport::answering(&[201]);
    let report = run(&PipelineConfig::default(), &store, &transport, &StaticSignature::default());

    assert!(matches!(
        report.get(&InvoiceId::Numeric(1)).unwrap().outcome,
        InvoiceOutcome::Failed(CxmlError::Amount(_))
    ));
    assert_eq!(store.status(&InvoiceId::Numeric(1)), None);
    assert_eq!(store.status(&InvoiceId::Numeric(2)), Some(RecordStatus::Sent));
    assert_eq!(transport.bodies.borrow().len(), 1);
}

// --- Loading ---

#[test]
fn strict_mode_rejects_tables_without_identifier() {
    let store = sheets(&[1]).with(
        SourceTable::Extrinsics,
        Table::new(&["name", "value"]).row(vec![Value::from("k"), Value::from("v")]),
    );
    let transport = ScriptedTransport::answering(&[]);
    let config = PipelineConfig::default();
    let err = Pipeline::new(&config, &store, &store, &transport, &StaticSignature::default())
        .run()
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(transport.bodies.borrow().is_empty());

    let lenient = PipelineConfig {
        require_identifier_columns: false,
        ..PipelineConfig::default()
    };
    let report = run(&lenient, &store, &transport, &StaticSignature::default());
    assert_eq!(report.sent(), 1);
    assert!(transport.bodies.borrow()[0].contains(r#"<Extrinsic name="k">v</Extrinsic>"#));
}

#[test]
fn snapshot_mode_submits_pending_rows_only() {
    let flat = Table::new(&[
        "invoice_id",
        "invoice_date",
        "quantity",
        "unit_price",
        "currency",
        "tax_amount",
        "taxable_amount",
        "record_status",
    ])
    .row(vec![
        Value::Int(7),
        Value::from("2025-06-01"),
        Value::Int(1),
        Value::Int(100),
        Value::from("GBP"),
        Value::Int(20),
        Value::Int(100),
        Value::from("PENDING"),
    ])
    .row(vec![
        Value::Int(8),
        Value::from("2025-06-01"),
        Value::Int(1),
        Value::Int(50),
        Value::from("GBP"),
        Value::Int(10),
        Value::Int(50),
        Value::from("SENT"),
    ]);
    let store = MemoryStore::new().with(SourceTable::Snapshot, flat);
    let transport = ScriptedTransport::answering(&[201]);
    let config = PipelineConfig {
        source: SourceMode::Snapshot,
        ..PipelineConfig::default()
    };
    let report = run(&config, &store, &transport, &StaticSignature::default());

    assert_eq!(report.invoices.len(), 1);
    assert_eq!(store.status(&InvoiceId::Numeric(7)), Some(RecordStatus::Sent));
    let body = &transport.bodies.borrow()[0];
    assert!(body.contains(r#"<Money currency="GBP">20</Money>"#));
}

#[test]
fn documents_are_written_to_the_output_dir() {
    let dir = std::env::temp_dir().join(format!("cxml-invoice-{}", std::process::id()));
    let store = sheets(&[4701265854]);
    let transport = ScriptedTransport::answering(&[201]);
    let config = PipelineConfig {
        output_dir: Some(dir.clone()),
        ..PipelineConfig::default()
    };
    run(&config, &store, &transport, &StaticSignature::default());

    let written = std::fs::read_to_string(dir.join("4701265854.xml")).unwrap();
    assert_eq!(written, transport.bodies.borrow()[0]);
    std::fs::remove_dir_all(&dir).unwrap();
}
