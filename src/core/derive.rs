//! Derived amounts and the flattened-snapshot split.
//!
//! The `good_to_pay` snapshot carries one row per invoice line with header,
//! party, tax and total columns repeated. [`bundle_from_snapshot`] reshapes
//! it into an [`InvoiceBundle`] the assembler understands, filling in net,
//! gross and rate where they can be computed.

use std::collections::HashMap;

use rust_decimal::Decimal;

use super::error::CxmlError;
use super::fields::{Field, INVOICE_ID, snapshot};
use super::resolve::{Row, column_index, rows, text_or_none};
use super::scope::{InvoiceBundle, InvoiceId};
use super::table::{Table, Value};

/// Net amount: explicit, else `gross - tax` (missing tax counts as zero).
///
/// `None` when nothing is known or the difference overflows.
pub fn derive_net(
    net: Option<Decimal>,
    gross: Option<Decimal>,
    tax: Option<Decimal>,
) -> Option<Decimal> {
    net.or_else(|| gross?.checked_sub(tax.unwrap_or_default()))
}

/// Gross amount: explicit, else `net + tax` (missing tax counts as zero).
///
/// `None` when nothing is known or the sum overflows.
pub fn derive_gross(
    gross: Option<Decimal>,
    net: Option<Decimal>,
    tax: Option<Decimal>,
) -> Option<Decimal> {
    gross.or_else(|| net?.checked_add(tax.unwrap_or_default()))
}

/// Percentage rate `tax / taxable * 100`, rounded to 4 places.
///
/// `None` when either operand is missing or the taxable amount is zero;
/// a rate is never invented.
pub fn derive_tax_rate(tax: Option<Decimal>, taxable: Option<Decimal>) -> Option<Decimal> {
    let (tax, taxable) = (tax?, taxable?);
    if taxable.is_zero() {
        return None;
    }
    tax.checked_div(taxable)
        .and_then(|q| q.checked_mul(Decimal::ONE_HUNDRED))
        .map(|r| r.round_dp(4).normalize())
}

/// Rows whose status column is blank or `PENDING` (case-insensitive).
///
/// A table without the status column is returned unchanged.
pub fn pending_rows(table: &Table, status_column: &str) -> Table {
    let Some(col) = table
        .columns()
        .iter()
        .position(|c| c.eq_ignore_ascii_case(status_column.trim()))
    else {
        return table.clone();
    };
    table.filter_rows(|row| match row.get(col).and_then(text_or_none) {
        None => true,
        Some(s) => s.eq_ignore_ascii_case("PENDING"),
    })
}

const HEADER_COLUMNS: [&str; 3] = ["invoice_id", "invoice_date", "order_id"];
const PARTNER_COLUMNS: [&str; 5] = ["invoice_id", "role", "name", "domain", "identifier"];
const ITEM_COLUMNS: [&str; 7] = [
    "invoice_id",
    "line_no",
    "quantity",
    "uom",
    "unit_price",
    "currency",
    "description",
];
const TAX_COLUMNS: [&str; 6] = [
    "invoice_id",
    "category",
    "rate",
    "tax_amount",
    "taxable_amount",
    "currency",
];
const SUMMARY_COLUMNS: [&str; 5] = ["invoice_id", "net_amount", "tax", "gross_amount", "currency"];

#[derive(Default)]
struct Totals {
    net: Option<Decimal>,
    gross: Option<Decimal>,
    tax: Option<Decimal>,
    /// Set once the running tax no longer fits; the total stays blank.
    tax_overflow: bool,
    currency: Option<String>,
}

fn opt<T: Into<Value>>(v: Option<T>) -> Value {
    v.map_or(Value::Null, Into::into)
}

fn cell(row: &Row<'_>, field: &Field) -> Value {
    row.get(field).cloned().unwrap_or(Value::Null)
}

/// Split a flattened snapshot into an invoice bundle.
///
/// Header and Partners get one row per invoice (first occurrence wins),
/// Items and Taxes one row per snapshot row, Summary one row per invoice
/// with the tax summed across lines. Rows without an identifier are skipped.
pub fn bundle_from_snapshot(flat: &Table) -> Result<InvoiceBundle, CxmlError> {
    if flat.is_empty() {
        return Ok(InvoiceBundle::default());
    }
    let id_col = column_index(flat, &INVOICE_ID).ok_or_else(|| {
        CxmlError::Configuration("snapshot table has no invoice identifier column".into())
    })?;

    let mut header = Table::new(&HEADER_COLUMNS);
    let mut partners = Table::new(&PARTNER_COLUMNS);
    let mut items = Table::new(&ITEM_COLUMNS);
    let mut taxes = Table::new(&TAX_COLUMNS);

    let mut order: Vec<InvoiceId> = Vec::new();
    let mut totals: HashMap<InvoiceId, Totals> = HashMap::new();

    for row in rows(flat) {
        let Some(id) = row.cells().get(id_col).and_then(InvoiceId::from_value) else {
            continue;
        };
        let id_value = Value::from(&id);
        let currency = row.text(&snapshot::CURRENCY);
        let tax = row.decimal(&snapshot::TAX_AMOUNT);
        let taxable = row.decimal(&snapshot::TAXABLE_AMOUNT);

        if !totals.contains_key(&id) {
            order.push(id.clone());
            header.push_row(vec![
                id_value.clone(),
                cell(&row, &snapshot::INVOICE_DATE),
                cell(&row, &snapshot::ORDER_ID),
            ]);
            let domain = opt(row.text(&snapshot::PARTY_DOMAIN));
            for (role, name, ident) in [
                ("from", &snapshot::SUPPLIER_NAME, &snapshot::SUPPLIER_ID),
                ("soldTo", &snapshot::BUYER_NAME, &snapshot::BUYER_ID),
            ] {
                let name = row.text(name);
                let ident = row.text(ident);
                if name.is_some() || ident.is_some() {
                    partners.push_row(vec![
                        id_value.clone(),
                        Value::from(role),
                        opt(name),
                        domain.clone(),
                        opt(ident),
                    ]);
                }
            }
            totals.insert(id.clone(), Totals::default());
        }

        items.push_row(vec![
            id_value.clone(),
            cell(&row, &snapshot::LINE_NO),
            cell(&row, &snapshot::QUANTITY),
            cell(&row, &snapshot::UOM),
            cell(&row, &snapshot::UNIT_PRICE),
            opt(currency.clone()),
            cell(&row, &snapshot::DESCRIPTION),
        ]);

        if tax.is_some() || taxable.is_some() {
            let rate = row
                .decimal(&snapshot::TAX_RATE)
                .or_else(|| derive_tax_rate(tax, taxable));
            taxes.push_row(vec![
                id_value.clone(),
                cell(&row, &snapshot::TAX_CATEGORY),
                opt(rate),
                opt(tax),
                opt(taxable),
                opt(currency.clone()),
            ]);
        }

        if let Some(t) = totals.get_mut(&id) {
            t.net = t.net.or(row.decimal(&snapshot::NET_AMOUNT));
            t.gross = t.gross.or(row.decimal(&snapshot::GROSS_AMOUNT));
            if let Some(tax) = tax.filter(|_| !t.tax_overflow) {
                t.tax = t.tax.unwrap_or_default().checked_add(tax);
                t.tax_overflow = t.tax.is_none();
            }
            if t.currency.is_none() {
                t.currency = currency;
            }
        }
    }

    let mut summary = Table::new(&SUMMARY_COLUMNS);
    for id in &order {
        let Some(t) = totals.remove(id) else { continue };
        let net = derive_net(t.net, t.gross, t.tax);
        let gross = derive_gross(t.gross, net, t.tax);
        summary.push_row(vec![Value::from(id), opt(net), opt(t.tax), opt(gross), opt(t.currency)]);
    }

    Ok(InvoiceBundle {
        header,
        partners,
        items,
        taxes,
        summary,
        ..InvoiceBundle::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn net_and_gross_derivation() {
        assert_eq!(derive_net(None, Some(dec!(100)), Some(dec!(20))), Some(dec!(80)));
        assert_eq!(derive_gross(None, Some(dec!(80)), Some(dec!(20))), Some(dec!(100)));
        assert_eq!(derive_net(Some(dec!(75)), Some(dec!(100)), Some(dec!(20))), Some(dec!(75)));
        assert_eq!(derive_net(None, None, Some(dec!(20))), None);
    }

    #[test]
    fn overflowing_derivations_stay_blank() {
        assert_eq!(derive_gross(None, Some(Decimal::MAX), Some(Decimal::MAX)), None);
        assert_eq!(derive_net(None, Some(Decimal::MIN), Some(Decimal::MAX)), None);
        let explicit = derive_net(Some(dec!(1)), Some(Decimal::MIN), Some(Decimal::MAX));
        assert_eq!(explicit, Some(dec!(1)));
    }

    #[test]
    fn rate_is_left_blank_without_a_base() {
        assert_eq!(derive_tax_rate(Some(dec!(20)), Some(dec!(80))), Some(dec!(25)));
        assert_eq!(derive_tax_rate(Some(dec!(20)), Some(dec!(0))), None);
        assert_eq!(derive_tax_rate(None, Some(dec!(80))), None);
        assert_eq!(derive_tax_rate(Some(dec!(1)), Some(dec!(3))), Some(dec!(33.3333)));
    }

    #[test]
    fn pending_filter() {
        let t = Table::from_rows(
            &["invoice_id", "Record_Status"],
            vec![
                vec![Value::Int(1), Value::Null],
                vec![Value::Int(2), Value::from("pending")],
                vec![Value::Int(3), Value::from("SENT")],
                vec![Value::Int(4), Value::from("ERROR")],
            ],
        );
        assert_eq!(pending_rows(&t, "record_status").len(), 2);
    }

    #[test]
    fn snapshot_split() {
        let flat = Table::from_rows(
            &[
                "invoice_id",
                "invoice_date",
                "line_no",
                "quantity",
                "unit_price",
                "currency",
                "tax_amount",
                "taxable_amount",
                "gross_amount",
                "supplier_name",
                "buyer_name",
            ],
            vec![
                vec![
                    Value::Int(7),
                    Value::from("2025-06-01"),
                    Value::Int(1),
                    Value::Int(1),
                    Value::Int(40),
                    Value::from("GBP"),
                    Value::Int(8),
                    Value::Int(40),
                    Value::Int(120),
                    Value::from("ACME"),
                    Value::from("Buyer Ltd"),
                ],
                vec![
                    Value::Int(7),
                    Value::from("2025-06-01"),
                    Value::Int(2),
                    Value::Int(2),
                    Value::Int(30),
                    Value::from("GBP"),
                    Value::Int(12),
                    Value::Int(0),
                    Value::Int(120),
                    Value::from("ACME"),
                    Value::from("Buyer Ltd"),
                ],
            ],
        );
        let bundle = bundle_from_snapshot(&flat).unwrap();
        assert_eq!(bundle.header.len(), 1);
        assert_eq!(bundle.partners.len(), 2);
        assert_eq!(bundle.items.len(), 2);
        assert_eq!(bundle.taxes.len(), 2);
        // second line has a zero base: rate stays blank
        assert_eq!(bundle.taxes.cell(0, 2), Some(&Value::Decimal(dec!(20))));
        assert_eq!(bundle.taxes.cell(1, 2), Some(&Value::Null));
        // tax 8 + 12 = 20, net = 120 - 20
        assert_eq!(bundle.summary.cell(0, 1), Some(&Value::Decimal(dec!(100))));
        assert_eq!(bundle.summary.cell(0, 2), Some(&Value::Decimal(dec!(20))));
        assert_eq!(bundle.summary.cell(0, 3), Some(&Value::Decimal(dec!(120))));
    }

    #[test]
    fn snapshot_without_identifier_fails() {
        let flat = Table::from_rows(&["amount"], vec![vec![Value::Int(1)]]);
        assert!(bundle_from_snapshot(&flat).unwrap_err().is_configuration());
    }
}
