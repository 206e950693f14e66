//! Reading `InvoiceDetailRequest` documents back into tables.
//!
//! Column names follow the spellings the column resolver already accepts
//! (`header_invoiceID`, `invoiceLineNumber`, `unitPrice`, `tax_total`, ...),
//! so parsed tables can be fed straight back into an [`InvoiceBundle`].
//!
//! [`InvoiceBundle`]: crate::core::InvoiceBundle

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::tree::{Element, Node};
use crate::core::{CxmlError, Table, Value};

/// Item columns, present even when the document has no lines.
pub const ITEM_COLUMNS: [&str; 17] = [
    "order_id",
    "invoiceLineNumber",
    "quantity",
    "unitOfMeasure",
    "unitPrice",
    "unitPrice_currency",
    "ref_lineNumber",
    "description",
    "subtotal",
    "subtotal_currency",
    "dist_accounting_id",
    "dist_accounting_name",
    "dist_accounting_desc",
    "dist_charge_amount",
    "dist_charge_currency",
    "dist_charge_alt_amount",
    "dist_charge_alt_currency",
];

/// The three flat views of one invoice document.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceTables {
    /// One row: envelope, request header, partners, extrinsics.
    pub header: Table,
    /// One row per `InvoiceDetailItem`, across every order.
    pub items: Table,
    /// One row, or no columns at all when the summary is missing.
    pub summary: Table,
}

/// Parse any XML document into an element tree.
///
/// The declaration, DOCTYPE, comments and processing instructions are
/// skipped; whitespace-only text is dropped.
pub fn parse_document(xml: &str) -> Result<Element, CxmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(start_element(e)?),
            Ok(Event::Empty(ref e)) => close(&mut stack, &mut root, start_element(e)?)?,
            Ok(Event::End(_)) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| CxmlError::Xml("unexpected closing tag".into()))?;
                close(&mut stack, &mut root, el)?;
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| CxmlError::Xml(format!("bad text: {e}")))?;
                push_text(&mut stack, text);
            }
            Ok(Event::CData(ref e)) => push_text(&mut stack, String::from_utf8_lossy(e)),
            Ok(Event::Eof) => break,
            Err(e) => return Err(CxmlError::Xml(format!("malformed document: {e}"))),
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(CxmlError::Xml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| CxmlError::Xml("document has no root element".into()))
}

fn start_element(e: &BytesStart<'_>) -> Result<Element, CxmlError> {
    let utf8 = |bytes: &[u8]| {
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| CxmlError::Xml(format!("non UTF-8 name: {e}")))
    };
    let mut el = Element::new(utf8(e.name().as_ref())?);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CxmlError::Xml(format!("bad attribute: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| CxmlError::Xml(format!("bad attribute value: {e}")))?;
        el.set_attr(utf8(attr.key.as_ref())?, value);
    }
    Ok(el)
}

fn close(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), CxmlError> {
    match stack.last_mut() {
        Some(parent) => parent.push(el),
        None if root.is_none() => *root = Some(el),
        None => return Err(CxmlError::Xml("more than one root element".into())),
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: Cow<'_, str>) {
    if let Some(top) = stack.last_mut() {
        top.children.push(Node::Text(text.into_owned()));
    }
}

/// Split a cXML `InvoiceDetailRequest` into header, item and summary tables.
///
/// Every cell is text; absent elements and attributes give empty strings,
/// which the resolver treats as absent.
pub fn parse_invoice(xml: &str) -> Result<InvoiceTables, CxmlError> {
    let root = parse_document(xml)?;
    if root.name != "cXML" {
        return Err(CxmlError::Xml(format!(
            "expected a cXML document, found <{}>",
            root.name
        )));
    }
    Ok(InvoiceTables {
        header: header_table(&root),
        items: items_table(&root),
        summary: summary_table(&root),
    })
}

/// Columns in insertion order; setting a name twice keeps the last value.
#[derive(Default)]
struct RowBuilder {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl RowBuilder {
    fn set(&mut self, column: impl Into<String>, value: String) {
        let column = column.into();
        match self.columns.iter().position(|c| *c == column) {
            Some(idx) => self.values[idx] = Value::Text(value),
            None => {
                self.columns.push(column);
                self.values.push(Value::Text(value));
            }
        }
    }

    fn into_table(self) -> Table {
        Table::new(&self.columns).row(self.values)
    }
}

fn text(el: Option<&Element>) -> String {
    el.map(|e| e.text_content().trim().to_string())
        .unwrap_or_default()
}

fn attr(el: Option<&Element>, name: &str) -> String {
    el.and_then(|e| e.get_attr(name))
        .unwrap_or_default()
        .to_string()
}

fn header_table(root: &Element) -> Table {
    let mut row = RowBuilder::default();
    for name in ["payloadID", "timestamp", "version"] {
        row.set(name, attr(Some(root), name));
    }

    if let Some(header) = root.find("Header") {
        if let Some(from) = header.find("From") {
            let cred = from.find("Credential");
            row.set("from_credential_domain", attr(cred, "domain"));
            row.set("from_identity", text(cred.and_then(|c| c.find("Identity"))));
            row.set(
                "from_correspondent_name",
                text(from.find_path("Correspondent/Contact/Name")),
            );
        }
        if let Some(to) = header.find("To") {
            for (i, cred) in to.children_named("Credential").enumerate() {
                let n = i + 1;
                row.set(format!("to_credential{n}_domain"), attr(Some(cred), "domain"));
                row.set(format!("to_credential{n}_identity"), text(cred.find("Identity")));
            }
        }
        if let Some(sender) = header.find("Sender") {
            let cred = sender.find("Credential");
            row.set("sender_credential_domain", attr(cred, "domain"));
            row.set("sender_identity", text(cred.and_then(|c| c.find("Identity"))));
            row.set(
                "sender_shared_secret",
                text(cred.and_then(|c| c.find("SharedSecret"))),
            );
            row.set("user_agent", text(sender.find("UserAgent")));
        }
    }

    let request = root.find("Request");
    if request.is_some() {
        row.set("request_id", attr(request, "Id"));
        row.set("request_deploymentMode", attr(request, "deploymentMode"));
    }

    if let Some(idr) = root.find_path("Request/InvoiceDetailRequest/InvoiceDetailRequestHeader") {
        for name in ["invoiceDate", "invoiceID", "invoiceOrigin", "operation", "purpose"] {
            row.set(format!("header_{name}"), attr(Some(idr), name));
        }
        for (i, partner) in idr.children_named("InvoicePartner").enumerate() {
            let n = i + 1;
            let contact = partner.find("Contact");
            row.set(format!("partner{n}_role"), attr(contact, "role"));
            row.set(format!("partner{n}_addressID"), attr(contact, "addressID"));
            row.set(format!("partner{n}_name"), text(contact.and_then(|c| c.find("Name"))));
            row.set(format!("partner{n}_email"), text(contact.and_then(|c| c.find("Email"))));
        }
        row.set(
            "paymentTerm_days",
            attr(idr.find("PaymentTerm"), "payInNumberOfDays"),
        );
        row.set("comments", text(idr.find("Comments")));
        for ext in idr.children_named("Extrinsic") {
            let name = attr(Some(ext), "name");
            let name = match name.trim() {
                "" => "unnamed",
                trimmed => trimmed,
            };
            // an attachment URL wins over plain content
            let url = text(ext.find_path("Attachment/URL"));
            let value = if url.is_empty() { text(Some(ext)) } else { url };
            row.set(format!("extrinsic_{name}"), value);
        }
    }
    row.into_table()
}

fn items_table(root: &Element) -> Table {
    let mut table = Table::new(&ITEM_COLUMNS);
    let Some(request) = root.find_path("Request/InvoiceDetailRequest") else {
        return table;
    };
    for order in request.children_named("InvoiceDetailOrder") {
        let order_id = attr(order.find_path("InvoiceDetailOrderInfo/OrderIDInfo"), "orderID");
        for item in order.children_named("InvoiceDetailItem") {
            let price = item.find_path("UnitPrice/Money");
            let subtotal = item.find_path("SubtotalAmount/Money");
            let segment = item.find_path("Distribution/Accounting/AccountingSegment");
            let charge = item.find_path("Distribution/Charge/Money");
            let cells = [
                order_id.clone(),
                attr(Some(item), "invoiceLineNumber"),
                attr(Some(item), "quantity"),
                text(item.find("UnitOfMeasure")),
                text(price),
                attr(price, "currency"),
                attr(item.find("InvoiceDetailItemReference"), "lineNumber"),
                text(item.find_path("InvoiceDetailItemReference/Description")),
                text(subtotal),
                attr(subtotal, "currency"),
                attr(segment, "id"),
                text(segment.and_then(|s| s.find("Name"))),
                text(segment.and_then(|s| s.find("Description"))),
                text(charge),
                attr(charge, "currency"),
                attr(charge, "alternateAmount"),
                attr(charge, "alternateCurrency"),
            ];
            table.push_row(cells.into_iter().map(Value::Text).collect());
        }
    }
    table
}

fn summary_table(root: &Element) -> Table {
    let Some(summary) = root.find_path("Request/InvoiceDetailRequest/InvoiceDetailSummary")
    else {
        return Table::default();
    };
    let mut row = RowBuilder::default();
    let money = |row: &mut RowBuilder, path: &str, amount: &str, currency: &str| {
        let m = summary.find_path(path);
        row.set(amount, text(m));
        row.set(currency, attr(m, "currency"));
    };

    money(&mut row, "SubtotalAmount/Money", "subtotal", "subtotal_currency");
    if let Some(tax) = summary.find("Tax") {
        let m = tax.find("Money");
        row.set("tax_total", text(m));
        row.set("tax_currency", attr(m, "currency"));
        row.set("tax_description", text(tax.find("Description")));
        if let Some(detail) = tax.find("TaxDetail") {
            row.set("tax_category", attr(Some(detail), "category"));
            row.set("tax_percentageRate", attr(Some(detail), "percentageRate"));
            let taxable = detail.find_path("TaxableAmount/Money");
            row.set("tax_taxable_amount", text(taxable));
            row.set("tax_taxable_currency", attr(taxable, "currency"));
            let amount = detail.find_path("TaxAmount/Money");
            row.set("tax_amount", text(amount));
            row.set("tax_amount_currency", attr(amount, "currency"));
        }
    }
    money(&mut row, "GrossAmount/Money", "gross_amount", "gross_currency");
    money(&mut row, "NetAmount/Money", "net_amount", "net_currency");
    row.into_table()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fields;
    use crate::core::{first_decimal, first_text, resolve, text_or_none};

    const INVOICE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE cXML SYSTEM "http://xml.cxml.org/schemas/cXML/1.2.045/InvoiceDetail.dtd">
<cXML payloadID="p-1@example" timestamp="2025-06-24T12:24:37+02:00" version="1.2.045">
  <Header>
    <From><Credential domain="NetworkID"><Identity>AN01</Identity></Credential></From>
    <To>
      <Credential domain="NetworkID"><Identity>AN02</Identity></Credential>
      <Credential domain="VendorID"><Identity>V-9</Identity></Credential>
    </To>
    <Sender>
      <Credential domain="NetworkID"><Identity>AN01</Identity><SharedSecret>s3</SharedSecret></Credential>
      <UserAgent>Supplier &amp; Co</UserAgent>
    </Sender>
  </Header>
  <Request Id="cXMLData" deploymentMode="production">
    <InvoiceDetailRequest>
      <InvoiceDetailRequestHeader invoiceDate="2025-06-01T00:00:00" invoiceID="INV-7"
          invoiceOrigin="supplier" operation="new" purpose="standard">
        <InvoicePartner><Contact role="soldTo" addressID="A1"><Name xml:lang="en">Buyer</Name></Contact></InvoicePartner>
        <PaymentTerm payInNumberOfDays="30"/>
        <Extrinsic name="buyerVatID">GB999</Extrinsic>
        <Extrinsic name="invoicePDF"><Attachment><URL>cid:inv.pdf</URL></Attachment></Extrinsic>
      </InvoiceDetailRequestHeader>
      <InvoiceDetailOrder>
        <InvoiceDetailOrderInfo><OrderIDInfo orderID="PO-1"/></InvoiceDetailOrderInfo>
        <InvoiceDetailItem invoiceLineNumber="1" quantity="2">
          <UnitOfMeasure>EA</UnitOfMeasure>
          <UnitPrice><Money currency="GBP">50</Money></UnitPrice>
          <InvoiceDetailItemReference lineNumber="10"><Description xml:lang="en"><![CDATA[Bolts <M8>]]></Description></InvoiceDetailItemReference>
          <SubtotalAmount><Money currency="GBP">100</Money></SubtotalAmount>
          <Distribution>
            <Accounting name="acct"><AccountingSegment id="4000"><Name>Parts</Name><Description>Spare parts</Description></AccountingSegment></Accounting>
            <Charge><Money currency="GBP" alternateAmount="116" alternateCurrency="EUR">100</Money></Charge>
          </Distribution>
        </InvoiceDetailItem>
      </InvoiceDetailOrder>
      <InvoiceDetailSummary>
        <SubtotalAmount><Money currency="GBP">100</Money></SubtotalAmount>
        <Tax>
          <Money currency="GBP">20</Money>
          <Description xml:lang="en">VAT</Description>
          <TaxDetail category="vat" percentageRate="20">
            <TaxableAmount><Money currency="GBP">100</Money></TaxableAmount>
            <TaxAmount><Money currency="GBP">20</Money></TaxAmount>
          </TaxDetail>
        </Tax>
        <GrossAmount><Money currency="GBP">120</Money></GrossAmount>
        <NetAmount><Money currency="GBP">100</Money></NetAmount>
      </InvoiceDetailSummary>
    </InvoiceDetailRequest>
  </Request>
</cXML>"#;

    fn column_names(t: &Table) -> Vec<&str> {
        t.columns().iter().map(String::as_str).collect()
    }

    #[test]
    fn header_row_flattens_envelope_and_request_header() {
        let t = parse_invoice(INVOICE).unwrap().header;
        assert_eq!(t.len(), 1);
        let get = |name: &str| {
            let col = t.column_position(name).unwrap();
            t.cell(0, col).and_then(text_or_none)
        };
        assert_eq!(get("payloadID").as_deref(), Some("p-1@example"));
        assert_eq!(get("to_credential2_identity").as_deref(), Some("V-9"));
        assert_eq!(get("sender_shared_secret").as_deref(), Some("s3"));
        assert_eq!(get("user_agent").as_deref(), Some("Supplier & Co"));
        assert_eq!(get("request_deploymentMode").as_deref(), Some("production"));
        assert_eq!(get("partner1_addressID").as_deref(), Some("A1"));
        assert_eq!(get("paymentTerm_days").as_deref(), Some("30"));
        assert_eq!(get("extrinsic_buyerVatID").as_deref(), Some("GB999"));
        assert_eq!(get("extrinsic_invoicePDF").as_deref(), Some("cid:inv.pdf"));
        assert_eq!(get("comments"), None);

        assert_eq!(resolve(&t, &fields::INVOICE_ID), Some("header_invoiceID"));
        assert_eq!(
            first_text(&t, &fields::header::INVOICE_ID).as_deref(),
            Some("INV-7")
        );
    }

    #[test]
    fn item_rows_carry_order_and_distribution() {
        let t = parse_invoice(INVOICE).unwrap().items;
        assert_eq!(column_names(&t), ITEM_COLUMNS);
        assert_eq!(t.len(), 1);
        assert_eq!(first_text(&t, &fields::header::ORDER_ID).as_deref(), Some("PO-1"));
        assert_eq!(
            first_text(&t, &fields::items::DESCRIPTION).as_deref(),
            Some("Bolts <M8>")
        );
        assert_eq!(first_decimal(&t, &fields::items::UNIT_PRICE), Some(50.into()));
        let col = t.column_position("dist_charge_alt_amount").unwrap();
        assert_eq!(t.cell(0, col), Some(&Value::from("116")));
    }

    #[test]
    fn summary_row_has_totals() {
        let t = parse_invoice(INVOICE).unwrap().summary;
        assert_eq!(first_decimal(&t, &fields::summary::TAX), Some(20.into()));
        assert_eq!(first_decimal(&t, &fields::summary::NET), Some(100.into()));
        assert_eq!(first_decimal(&t, &fields::summary::GROSS), Some(120.into()));
        let col = t.column_position("tax_percentageRate").unwrap();
        assert_eq!(t.cell(0, col), Some(&Value::from("20")));
    }

    #[test]
    fn missing_sections_give_empty_tables() {
        let tables = parse_invoice(r#"<cXML payloadID="x"><Header/></cXML>"#).unwrap();
        assert_eq!(tables.header.len(), 1);
        assert!(tables.items.is_empty());
        assert_eq!(column_names(&tables.items), ITEM_COLUMNS);
        assert!(tables.summary.columns().is_empty());
    }

    #[test]
    fn malformed_documents_are_errors() {
        for xml in ["", "<cXML>", "<cXML></Header>", "<a/><b/>", "<Invoice/>"] {
            assert!(matches!(parse_invoice(xml), Err(CxmlError::Xml(_))), "{xml:?}");
        }
    }
}
