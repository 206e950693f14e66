use cxml_invoice::core::*;
use cxml_invoice::cxml::{Assembler, DocumentDefaults, SignatureMaterial, StaticSignature, serialize};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let id = InvoiceId::Numeric(4701265854);
    let envelope = Table::new(&[
        "invoice_id",
        "From_Credential_Domain",
        "From_Identity",
        "To_Credential1_Domain",
        "To_Credential1_Identity",
        "Sender_Credential_Domain",
        "Sender_Identity",
        "Sender_Shared_Secret",
    ])
    .row(vec![
        Value::from(&id),
        Value::from("NetworkID"),
        Value::from("AN01000000001"),
        Value::from("NetworkID"),
        Value::from("AN02000000002"),
        Value::from("NetworkID"),
        Value::from("AN01000000001"),
        Value::from("s3cret"),
    ]);
    let header = Table::new(&["InvoiceID", "invoiceDate", "order_id", "Comments"]).row(vec![
        Value::from(&id),
        Value::from("01/06/2025"),
        Value::from("PO-2025-0042"),
        Value::from("Monthly services"),
    ]);
    let partners = Table::new(&["invoice_id", "role", "name", "domain", "identifier"])
        .row(vec![
            Value::from(&id),
            Value::from("remitTo"),
            Value::from("ACME Ltd"),
            Value::from("supplierTaxID"),
            Value::from("GB123456789"),
        ])
        .row(vec![
            Value::from(&id),
            Value::from("soldTo"),
            Value::from("Buyer plc"),
            Value::Null,
            Value::Null,
        ]);
    let items = Table::new(&["invoice_id", "qty", "UnitPrice", "currency", "description"])
        .row(vec![
            Value::from(&id),
            Value::Int(1),
            Value::Int(60),
            Value::from("GBP"),
            Value::from("Consulting"),
        ])
        .row(vec![
            Value::from(&id),
            Value::Int(2),
            Value::Int(20),
            Value::from("GBP"),
            Value::from("Licences"),
        ]);
    let taxes = Table::new(&["invoice_id", "TaxAmount", "TaxableAmount", "category", "description"])
        .row(vec![
            Value::from(&id),
            Value::Int(20),
            Value::Int(100),
            Value::from("vat"),
            Value::from("VAT 20%"),
        ]);
    let extrinsics = Table::new(&["invoice_id", "name", "value"]).row(vec![
        Value::from(&id),
        Value::from("invoicePDF"),
        Value::from("https://example.com/invoices/4701265854.pdf"),
    ]);

    let bundle = InvoiceBundle::default()
        .with(Sheet::Envelope, envelope)
        .with(Sheet::Header, header)
        .with(Sheet::Partners, partners)
        .with(Sheet::Items, items)
        .with(Sheet::Taxes, taxes)
        .with(Sheet::Extrinsics, extrinsics);
    bundle.validate()?;

    let defaults = DocumentDefaults::default();
    let signer = StaticSignature(SignatureMaterial {
        signing_time: "2025-06-24T12:24:37Z".into(),
        ..SignatureMaterial::default()
    });
    let doc = Assembler::new(&defaults, &signer).assemble(&id, &bundle.scoped(&id))?;

    println!("{}", String::from_utf8(serialize(&doc)?)?);
    eprintln!("payloadID: {}", doc.payload_id);
    Ok(())
}
