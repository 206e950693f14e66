use chrono::DateTime;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use cxml_invoice::core::*;
use cxml_invoice::cxml::{
    Assembler, DocumentDefaults, SignatureMaterial, StaticSignature, parse_status, serialize,
    status_document,
};

fn invoice_bundle(invoices: i64, lines: i64) -> InvoiceBundle {
    let mut header = Table::new(&["invoice_id", "invoice_date", "order_id"]);
    let mut items = Table::new(&[
        "invoice_id",
        "line_no",
        "quantity",
        "unit_price",
        "currency",
        "description",
    ]);
    let mut taxes = Table::new(&["invoice_id", "tax_amount", "taxable_amount", "category"]);

    for id in 1..=invoices {
        header.push_row(vec![
            Value::Int(id),
            Value::from("01/06/2025"),
            Value::from(format!("PO-{id:05}")),
        ]);
        for line in 1..=lines {
            items.push_row(vec![
                Value::Int(id),
                Value::Int(line),
                Value::Int(2),
                Value::Decimal(dec!(9.99)),
                Value::from("GBP"),
                Value::from(format!("Item {line}")),
            ]);
        }
        taxes.push_row(vec![
            Value::Int(id),
            Value::Decimal(dec!(3.996) * rust_decimal::Decimal::from(lines)),
            Value::Decimal(dec!(19.98) * rust_decimal::Decimal::from(lines)),
            Value::from("vat"),
        ]);
    }

    InvoiceBundle::default()
        .with(Sheet::Header, header)
        .with(Sheet::Items, items)
        .with(Sheet::Taxes, taxes)
}

fn signer() -> StaticSignature {
    StaticSignature(SignatureMaterial {
        signature_value: "c2lnbmF0dXJl".into(),
        certificate: "Y2VydGlmaWNhdGU=".into(),
        signing_time: "2025-06-24T12:24:37Z".into(),
        ..SignatureMaterial::default()
    })
}

fn bench_scope(c: &mut Criterion) {
    let bundle = invoice_bundle(100, 10);
    let id = InvoiceId::Numeric(50);
    c.bench_function("scope_100_invoices", |b| {
        b.iter(|| black_box(bundle.scoped(black_box(&id))));
    });
}

fn bench_assemble(c: &mut Criterion) {
    let bundle = invoice_bundle(1, 10);
    let defaults = DocumentDefaults::default();
    let signer = signer();
    let now = DateTime::parse_from_rfc3339("2025-06-24T12:00:00+00:00").unwrap();
    let assembler = Assembler::new(&defaults, &signer).at(now);
    let id = InvoiceId::Numeric(1);

    c.bench_function("assemble_10_lines", |b| {
        b.iter(|| black_box(assembler.assemble(black_box(&id), black_box(&bundle))));
    });

    let doc = assembler.assemble(&id, &bundle).unwrap();
    c.bench_function("serialize_10_lines", |b| {
        b.iter(|| black_box(serialize(black_box(&doc))));
    });
}

fn bench_assemble_large(c: &mut Criterion) {
    let bundle = invoice_bundle(1, 1000);
    let defaults = DocumentDefaults::default();
    let signer = signer();
    let assembler = Assembler::new(&defaults, &signer);
    let id = InvoiceId::Numeric(1);

    c.bench_function("assemble_serialize_1000_lines", |b| {
        b.iter(|| {
            let doc = assembler.assemble(&id, &bundle).unwrap();
            black_box(serialize(&doc))
        });
    });
}

fn bench_batch_render(c: &mut Criterion) {
    let bundle = invoice_bundle(100, 3);
    let defaults = DocumentDefaults::default();
    let signer = signer();
    let assembler = Assembler::new(&defaults, &signer);

    c.bench_function("render_batch_100_invoices", |b| {
        b.iter(|| {
            for id in bundle.invoice_ids().unwrap() {
                let doc = assembler.assemble(&id, &bundle.scoped(&id)).unwrap();
                black_box(serialize(&doc).unwrap());
            }
        });
    });
}

fn bench_status_parse(c: &mut Criterion) {
    let now = DateTime::parse_from_rfc3339("2025-06-24T12:24:37+02:00").unwrap();
    let body = String::from_utf8(
        status_document(406, "Not Acceptable", "DTD validation failed", now).unwrap(),
    )
    .unwrap();
    c.bench_function("parse_status", |b| {
        b.iter(|| black_box(parse_status(black_box(&body))));
    });
}

criterion_group!(
    benches,
    bench_scope,
    bench_assemble,
    bench_assemble_large,
    bench_batch_render,
    bench_status_parse,
);
criterion_main!(benches);
