use chrono::{DateTime, FixedOffset, Local, NaiveDate, SecondsFormat};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::signature::{SignatureContext, SignatureProvider, attach_signature};
use super::tree::Element;
use super::{DocumentDefaults, dtd_version};
use crate::core::fields;
use crate::core::{
    CxmlError, InvoiceBundle, InvoiceId, ParsedDate, Row, Table, Value, derive_gross, derive_net,
    derive_tax_rate, first_decimal, first_text, first_value, parse_date, rows, text_or_none,
};

/// An assembled invoice document, ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub root: Element,
    pub invoice_id: InvoiceId,
    pub payload_id: String,
    /// Business date of the invoice (the `invoiceDate` attribute's date).
    pub invoice_date: NaiveDate,
    pub dtd_url: String,
}

/// Builds cXML documents from scoped invoice bundles.
///
/// Sparse input never fails assembly: absent optional values take the
/// [`DocumentDefaults`] or drop their element. The only hard failure is a
/// bundle in which no table carries an invoice identifier column.
pub struct Assembler<'a> {
    defaults: &'a DocumentDefaults,
    signer: &'a dyn SignatureProvider,
    now: DateTime<FixedOffset>,
}

impl<'a> Assembler<'a> {
    pub fn new(defaults: &'a DocumentDefaults, signer: &'a dyn SignatureProvider) -> Self {
        Self {
            defaults,
            signer,
            now: Local::now().fixed_offset(),
        }
    }

    /// Pin the clock used for generated timestamps and payload ids.
    pub fn at(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = now;
        self
    }

    /// Assemble the document for `id` from a bundle already scoped to it.
    pub fn assemble(&self, id: &InvoiceId, bundle: &InvoiceBundle) -> Result<Document, CxmlError> {
        if !bundle.has_identifier_column() {
            return Err(CxmlError::MissingInvoiceIdentifier(format!(
                "invoice {id}: no table in the bundle has an invoice identifier column"
            )));
        }
        let d = self.defaults;
        let env = &bundle.envelope;

        let payload_id = first_text(env, &fields::envelope::PAYLOAD_ID)
            .unwrap_or_else(|| {
                format!(
                    "auto_{}.{:06}",
                    self.now.timestamp(),
                    self.now.timestamp_subsec_micros()
                )
            });
        let timestamp = first_value(env, &fields::envelope::TIMESTAMP)
            .and_then(|v| parse_date(v).map(|p| p.to_iso()).or_else(|| text_or_none(v)))
            .unwrap_or_else(|| self.now.to_rfc3339_opts(SecondsFormat::Secs, false));
        let version =
            first_text(env, &fields::envelope::VERSION).unwrap_or_else(|| d.version.clone());
        let signature_version = first_text(env, &fields::envelope::SIGNATURE_VERSION)
            .unwrap_or_else(|| d.signature_version.clone());

        if let Some(dtd) = dtd_version(&d.dtd_url) {
            if dtd != version {
                warn!(
                    invoice_id = %id,
                    version = %version,
                    dtd_url = %d.dtd_url,
                    "document version differs from the DTD version"
                );
            }
        }

        let mut root = Element::new("cXML")
            .attr("payloadID", payload_id.as_str())
            .attr("signatureVersion", signature_version.as_str())
            .attr("timestamp", timestamp)
            .attr("version", version);

        root.push(self.envelope_header(env));

        let (invoice_date, date_attr) = self.invoice_date(&bundle.header, id);
        let mut request = Element::new("InvoiceDetailRequest");
        request.push(self.request_header(id, bundle, &date_attr));

        let lines = self.items(&bundle.items)?;
        let totals = Totals::compute(bundle, &lines, d)?;
        request.push(self.order(bundle, lines, &totals, &date_attr));
        request.push(self.summary(&bundle.taxes, &totals));

        root.push(
            Element::new("Request")
                .attr(
                    "Id",
                    first_text(env, &fields::envelope::REQUEST_ID)
                        .unwrap_or_else(|| d.request_id.clone()),
                )
                .attr(
                    "deploymentMode",
                    first_text(env, &fields::envelope::DEPLOYMENT_MODE)
                        .unwrap_or_else(|| d.deployment_mode.clone()),
                )
                .child(request),
        );

        let ctx = SignatureContext {
            payload_id: &payload_id,
            signature_version: &signature_version,
        };
        let material = self.signer.material(&ctx)?;
        attach_signature(&mut root, &ctx, &material)?;

        debug!(invoice_id = %id, payload_id = %payload_id, "assembled document");
        Ok(Document {
            root,
            invoice_id: id.clone(),
            payload_id,
            invoice_date,
            dtd_url: d.dtd_url.clone(),
        })
    }

    fn envelope_header(&self, env: &Table) -> Element {
        let text = |f: &fields::Field| first_text(env, f);
        let mut header = Element::new("Header");

        let from_domain = text(&fields::envelope::FROM_DOMAIN);
        let from_identity = text(&fields::envelope::FROM_IDENTITY);
        let correspondent = text(&fields::envelope::FROM_CORRESPONDENT);
        if from_domain.is_some() || from_identity.is_some() || correspondent.is_some() {
            let mut from = Element::new("From");
            if from_domain.is_some() || from_identity.is_some() {
                from.push(credential(from_domain, from_identity));
                for (dom, ident) in [
                    (&fields::envelope::FROM_DOMAIN2, &fields::envelope::FROM_IDENTITY2),
                    (&fields::envelope::FROM_DOMAIN3, &fields::envelope::FROM_IDENTITY3),
                ] {
                    let (dom, ident) = (text(dom), text(ident));
                    if dom.is_some() || ident.is_some() {
                        from.push(credential(dom, ident));
                    }
                }
            }
            if let Some(name) = correspondent {
                let lang = text(&fields::envelope::PREFERRED_LANGUAGE)
                    .unwrap_or_else(|| self.defaults.language.clone());
                let mut contact = Element::new("Contact")
                    .attr("role", "correspondent")
                    .child(Element::new("Name").attr("xml:lang", lang.as_str()).text(name));
                if let Some(address) = postal_address(env) {
                    contact.push(address);
                }
                from.push(
                    Element::new("Correspondent")
                        .attr("preferredLanguage", lang)
                        .child(contact),
                );
            }
            header.push(from);
        }

        let to_creds: Vec<Element> = [
            (&fields::envelope::TO_DOMAIN1, &fields::envelope::TO_IDENTITY1),
            (&fields::envelope::TO_DOMAIN2, &fields::envelope::TO_IDENTITY2),
        ]
        .into_iter()
        .filter_map(|(dom, ident)| text(dom).map(|dom| credential(Some(dom), text(ident))))
        .collect();
        if !to_creds.is_empty() {
            let mut to = Element::new("To");
            to_creds.into_iter().for_each(|c| to.push(c));
            header.push(to);
        }

        let mut sender = Element::new("Sender");
        let s_domain = text(&fields::envelope::SENDER_DOMAIN);
        let s_identity = text(&fields::envelope::SENDER_IDENTITY);
        let s_secret = text(&fields::envelope::SENDER_SECRET);
        if s_domain.is_some() || s_identity.is_some() || s_secret.is_some() {
            let mut cred = credential(s_domain, s_identity);
            if let Some(secret) = s_secret {
                cred.add_text("SharedSecret", secret);
            }
            sender.push(cred);
        }
        sender.add_text(
            "UserAgent",
            text(&fields::envelope::USER_AGENT).unwrap_or_else(|| self.defaults.user_agent.clone()),
        );
        header.push(sender);
        header
    }

    /// Business date and `invoiceDate` attribute; today when absent or unparseable.
    fn invoice_date(&self, header: &Table, id: &InvoiceId) -> (NaiveDate, String) {
        let raw = first_value(header, &fields::header::INVOICE_DATE);
        let parsed = raw.and_then(parse_date);
        if let (Some(v), None) = (raw, parsed) {
            warn!(invoice_id = %id, value = %v, "unparseable invoice date; using today");
        }
        let parsed = parsed.unwrap_or_else(|| ParsedDate::Offset(self.now));
        (parsed.date(), parsed.to_iso())
    }

    fn request_header(&self, id: &InvoiceId, bundle: &InvoiceBundle, date_attr: &str) -> Element {
        let d = self.defaults;
        let hdr = &bundle.header;
        let text_or = |f: &fields::Field, default: &str| {
            first_text(hdr, f).unwrap_or_else(|| default.to_string())
        };

        let mut el = Element::new("InvoiceDetailRequestHeader")
            .attr("invoiceDate", date_attr)
            .attr("invoiceID", text_or(&fields::header::INVOICE_ID, &id.to_string()))
            .attr("invoiceOrigin", text_or(&fields::header::INVOICE_ORIGIN, &d.invoice_origin))
            .attr("operation", text_or(&fields::header::OPERATION, &d.operation))
            .attr("purpose", text_or(&fields::header::PURPOSE, &d.purpose))
            .child(Element::new("InvoiceDetailHeaderIndicator"));

        let tax_in_line = first_value(hdr, &fields::header::TAX_IN_LINE).is_some_and(truthy)
            || rows(&bundle.taxes).any(|r| {
                r.text(&fields::taxes::LEVEL)
                    .is_some_and(|l| l.eq_ignore_ascii_case("line"))
            });
        el.push(
            Element::new("InvoiceDetailLineIndicator")
                .attr_opt("isTaxInLine", tax_in_line.then_some("yes")),
        );

        for row in rows(&bundle.partners) {
            el.push(Element::new("InvoicePartner").child(self.partner_contact(&row)));
        }

        if let Some(comments) = first_text(hdr, &fields::header::COMMENTS) {
            el.add_text("Comments", comments);
        }

        for row in rows(&bundle.extrinsics) {
            let Some(name) = row.text(&fields::extrinsics::NAME) else {
                continue;
            };
            let value = row.text(&fields::extrinsics::VALUE);
            let mut ext = Element::new("Extrinsic").attr("name", name.as_str());
            if name == "invoicePDF" {
                let url = row.text(&fields::extrinsics::ATTACHMENT_URL).or(value);
                let url = Element::new("URL").text(url.unwrap_or_default());
                ext.push(Element::new("Attachment").child(url));
            } else if let Some(value) = value {
                ext = ext.text(value);
            }
            el.push(ext);
        }
        el
    }

    fn partner_contact(&self, row: &Row<'_>) -> Element {
        let lang = row
            .text(&fields::partners::LANG)
            .unwrap_or_else(|| self.defaults.language.clone());
        let mut contact = Element::new("Contact")
            .attr_opt("addressID", row.text(&fields::partners::ADDRESS_ID))
            .attr("role", row.text_or(&fields::partners::ROLE, ""))
            .child(
                Element::new("Name")
                    .attr("xml:lang", lang)
                    .text(row.text_or(&fields::partners::NAME, "")),
            );
        if let Some(email) = row.text(&fields::partners::EMAIL) {
            contact.add_text("Email", email);
        }
        let domain = row.text(&fields::partners::DOMAIN);
        let identifier = row.text(&fields::partners::IDENTIFIER);
        if domain.is_some() || identifier.is_some() {
            contact.push(
                Element::new("IdReference")
                    .attr("domain", domain.unwrap_or_default())
                    .attr("identifier", identifier.unwrap_or_default()),
            );
        }
        contact
    }

    fn items(&self, items: &Table) -> Result<Vec<Line>, CxmlError> {
        rows(items)
            .enumerate()
            .map(|(idx, row)| {
                let line_no = row
                    .text(&fields::items::LINE_NO)
                    .unwrap_or_else(|| (idx + 1).to_string());
                let quantity = row.decimal(&fields::items::QUANTITY).unwrap_or(Decimal::ONE);
                let price = row.decimal(&fields::items::UNIT_PRICE).unwrap_or_default();
                let price_currency = row.text(&fields::items::PRICE_CURRENCY);
                let subtotal_currency = row
                    .text(&fields::items::SUBTOTAL_CURRENCY)
                    .or_else(|| price_currency.clone());
                let subtotal = match row.decimal(&fields::items::SUBTOTAL) {
                    Some(subtotal) => subtotal,
                    None => quantity.checked_mul(price).ok_or_else(|| {
                        CxmlError::Amount(format!(
                            "line {line_no}: {quantity} x {price} overflows"
                        ))
                    })?,
                };
                Ok(Line {
                    line_no,
                    quantity,
                    uom: row
                        .text(&fields::items::UOM)
                        .unwrap_or_else(|| self.defaults.unit_of_measure.clone()),
                    price,
                    price_currency: price_currency.or_else(|| subtotal_currency.clone()),
                    subtotal,
                    subtotal_currency,
                    ref_line: row.text(&fields::items::REF_LINE),
                    description: row.text(&fields::items::DESCRIPTION),
                })
            })
            .collect()
    }

    fn order(
        &self,
        bundle: &InvoiceBundle,
        lines: Vec<Line>,
        totals: &Totals,
        date_attr: &str,
    ) -> Element {
        let order_id = first_text(&bundle.header, &fields::header::ORDER_ID).unwrap_or_default();
        let mut order = Element::new("InvoiceDetailOrder").child(
            Element::new("InvoiceDetailOrderInfo")
                .child(Element::new("OrderIDInfo").attr("orderID", order_id)),
        );

        let count = lines.len();
        for (idx, line) in lines.into_iter().enumerate() {
            let fallback = self.defaults.currency.as_deref();
            let mut item = Element::new("InvoiceDetailItem")
                .attr("invoiceLineNumber", line.line_no.as_str())
                .attr("quantity", amount(line.quantity))
                .child(Element::new("UnitOfMeasure").text(line.uom))
                .child(money("UnitPrice", line.price, line.price_currency.as_deref().or(fallback)));

            let mut reference = Element::new("InvoiceDetailItemReference")
                .attr("lineNumber", line.ref_line.unwrap_or_else(|| line.line_no.clone()));
            if let Some(desc) = line.description {
                reference.push(
                    Element::new("Description")
                        .attr("xml:lang", self.defaults.language.as_str())
                        .text(desc),
                );
            }
            item.push(reference);
            item.push(money(
                "SubtotalAmount",
                line.subtotal,
                line.subtotal_currency.as_deref().or(fallback),
            ));

            // Line-level tax rides on the last item, followed by its net amount.
            if idx + 1 == count && !bundle.taxes.is_empty() {
                item.push(self.tax_block(&bundle.taxes, totals, Some(date_attr)));
                item.push(money("NetAmount", totals.net, totals.currency.as_deref()));
            }
            order.push(item);
        }
        order
    }

    /// `Tax` element with one `TaxDetail` per tax row.
    fn tax_block(
        &self,
        taxes: &Table,
        totals: &Totals,
        tax_point_default: Option<&str>,
    ) -> Element {
        let d = self.defaults;
        let currency = totals.currency.as_deref();
        let mut tax = Element::new("Tax")
            .child(money_el(totals.tax, currency))
            .child(self.description(tax_description(taxes, d)));

        for row in rows(taxes) {
            let tax_amount = row.decimal(&fields::taxes::TAX_AMOUNT);
            let taxable = row.decimal(&fields::taxes::TAXABLE_AMOUNT);
            let rate = row
                .decimal(&fields::taxes::RATE)
                .or_else(|| derive_tax_rate(tax_amount, taxable))
                .map_or_else(|| "0".to_string(), amount);
            let tax_point = row
                .get(&fields::taxes::TAX_POINT_DATE)
                .and_then(parse_date)
                .map(|p| p.to_iso())
                .or_else(|| tax_point_default.map(str::to_string));
            let row_currency = row.text(&fields::taxes::CURRENCY);
            let row_currency = row_currency.as_deref().or(currency);

            let tax_money = money_el(tax_amount.unwrap_or_default(), row_currency)
                .attr_opt(
                    "alternateAmount",
                    row.decimal(&fields::taxes::ALTERNATE_AMOUNT).map(amount),
                )
                .attr_opt("alternateCurrency", row.text(&fields::taxes::ALTERNATE_CURRENCY));

            let mut detail = Element::new("TaxDetail")
                .attr("category", row.text_or(&fields::taxes::CATEGORY, &d.tax_category))
                .attr("percentageRate", rate)
                .attr_opt("taxPointDate", tax_point)
                .child(money("TaxableAmount", taxable.unwrap_or_default(), row_currency))
                .child(Element::new("TaxAmount").child(tax_money));
            if let Some(desc) = row.text(&fields::taxes::DESCRIPTION) {
                detail.push(self.description(desc));
            }
            tax.push(detail);
        }
        tax
    }

    fn summary(&self, taxes: &Table, totals: &Totals) -> Element {
        let d = self.defaults;
        let currency = totals.currency.as_deref();
        let rate = first_decimal(taxes, &fields::taxes::RATE)
            .or_else(|| derive_tax_rate(Some(totals.tax), Some(totals.taxable)))
            .map_or_else(|| "0".to_string(), amount);
        let category =
            first_text(taxes, &fields::taxes::CATEGORY).unwrap_or_else(|| d.tax_category.clone());

        let mut detail = Element::new("TaxDetail")
            .attr("category", category)
            .attr("percentageRate", rate)
            .child(money("TaxableAmount", totals.taxable, currency))
            .child(money("TaxAmount", totals.tax, currency));
        if let Some(desc) = first_text(taxes, &fields::taxes::DESCRIPTION) {
            detail.push(self.description(desc));
        }

        Element::new("InvoiceDetailSummary")
            .child(money("SubtotalAmount", totals.subtotal, currency))
            .child(
                Element::new("Tax")
                    .child(money_el(totals.tax, currency))
                    .child(self.description(tax_description(taxes, d)))
                    .child(detail),
            )
            .child(money("GrossAmount", totals.gross, currency))
            .child(money("NetAmount", totals.net, currency))
    }

    fn description(&self, text: String) -> Element {
        Element::new("Description")
            .attr("xml:lang", self.defaults.language.as_str())
            .text(text)
    }
}

/// One `Items` row after defaults.
struct Line {
    line_no: String,
    quantity: Decimal,
    uom: String,
    price: Decimal,
    price_currency: Option<String>,
    subtotal: Decimal,
    subtotal_currency: Option<String>,
    ref_line: Option<String>,
    description: Option<String>,
}

/// Invoice-level amounts, explicit where the Summary table has them.
struct Totals {
    subtotal: Decimal,
    tax: Decimal,
    taxable: Decimal,
    net: Decimal,
    gross: Decimal,
    currency: Option<String>,
}

impl Totals {
    fn compute(
        bundle: &InvoiceBundle,
        lines: &[Line],
        d: &DocumentDefaults,
    ) -> Result<Self, CxmlError> {
        let summ = &bundle.summary;
        let taxes = &bundle.taxes;

        let subtotal = match first_decimal(summ, &fields::summary::SUBTOTAL) {
            Some(subtotal) => subtotal,
            None => checked_sum(lines.iter().map(|l| l.subtotal), "subtotal")?,
        };
        let tax = match first_decimal(summ, &fields::summary::TAX) {
            Some(tax) => tax,
            None => checked_sum(
                rows(taxes).filter_map(|r| r.decimal(&fields::taxes::TAX_AMOUNT)),
                "tax",
            )?,
        };
        // Without any taxable column the whole subtotal is the base.
        let taxable = if has_taxable(taxes) {
            checked_sum(
                rows(taxes).filter_map(|r| r.decimal(&fields::taxes::TAXABLE_AMOUNT)),
                "taxable amount",
            )?
        } else {
            subtotal
        };
        let net_explicit = first_decimal(summ, &fields::summary::NET);
        let gross_explicit = first_decimal(summ, &fields::summary::GROSS);
        let net = match (net_explicit, gross_explicit) {
            (None, None) => subtotal,
            (net, gross) => derive_net(net, gross, Some(tax))
                .ok_or_else(|| CxmlError::Amount("net amount (gross - tax) overflows".into()))?,
        };
        let gross = derive_gross(gross_explicit, Some(net), Some(tax))
            .ok_or_else(|| CxmlError::Amount("gross amount (net + tax) overflows".into()))?;

        let currency = first_text(summ, &fields::summary::CURRENCY)
            .or_else(|| first_text(taxes, &fields::taxes::CURRENCY))
            .or_else(|| {
                lines
                    .iter()
                    .find_map(|l| l.subtotal_currency.clone().or_else(|| l.price_currency.clone()))
            })
            .or_else(|| d.currency.clone());

        Ok(Self {
            subtotal,
            tax,
            taxable,
            net,
            gross,
            currency,
        })
    }
}

fn checked_sum(
    amounts: impl IntoIterator<Item = Decimal>,
    what: &str,
) -> Result<Decimal, CxmlError> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or_else(|| CxmlError::Amount(format!("{what} total overflows")))
}

fn has_taxable(taxes: &Table) -> bool {
    rows(taxes).any(|r| r.get(&fields::taxes::TAXABLE_AMOUNT).is_some())
}

fn tax_description(taxes: &Table, d: &DocumentDefaults) -> String {
    first_text(taxes, &fields::taxes::DESCRIPTION)
        .or_else(|| first_text(taxes, &fields::taxes::CATEGORY))
        .unwrap_or_else(|| d.tax_category.clone())
}

fn credential(domain: Option<String>, identity: Option<String>) -> Element {
    Element::new("Credential")
        .attr("domain", domain.unwrap_or_default())
        .child(Element::new("Identity").text(identity.unwrap_or_default()))
}

fn postal_address(env: &Table) -> Option<Element> {
    let text = |f: &fields::Field| first_text(env, f);
    let street = text(&fields::envelope::STREET);
    let city = text(&fields::envelope::CITY);
    let postal = text(&fields::envelope::POSTAL_CODE);
    let country = text(&fields::envelope::COUNTRY);
    let iso = text(&fields::envelope::ISO_COUNTRY);
    if [&street, &city, &postal, &country, &iso]
        .iter()
        .all(|part| part.is_none())
    {
        return None;
    }
    let mut address = Element::new("PostalAddress");
    if let Some(street) = street {
        address.add_text("Street", street);
    }
    if let Some(city) = city {
        address.add_text("City", city);
    }
    if let Some(postal) = postal {
        address.add_text("PostalCode", postal);
    }
    if country.is_some() || iso.is_some() {
        address.push(
            Element::new("Country")
                .attr_opt("isoCountryCode", iso)
                .text(country.unwrap_or_default()),
        );
    }
    Some(address)
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Decimal(d) => !d.is_zero(),
        other => text_or_none(other).is_some_and(|s| {
            matches!(s.to_ascii_lowercase().as_str(), "yes" | "y" | "true" | "1" | "x")
        }),
    }
}

/// Decimal rendered without trailing zeros (`20.00` becomes `20`).
pub fn amount(d: Decimal) -> String {
    d.normalize().to_string()
}

fn money_el(value: Decimal, currency: Option<&str>) -> Element {
    Element::new("Money").attr_opt("currency", currency).text(amount(value))
}

/// `<wrapper><Money currency="..">value</Money></wrapper>`
fn money(wrapper: &str, value: Decimal, currency: Option<&str>) -> Element {
    Element::new(wrapper).child(money_el(value, currency))
}
