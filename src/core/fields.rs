//! Logical field names and the physical column spellings accepted for each.
//!
//! Aliases are tried in order; the first one present in a table wins.
//! Matching is case-insensitive and ignores surrounding whitespace, so the
//! lists only need to cover genuinely different spellings.

/// A logical field and its accepted column names, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

const fn field(name: &'static str, aliases: &'static [&'static str]) -> Field {
    Field { name, aliases }
}

/// The column every scoped table shares.
pub const INVOICE_ID: Field =
    field("invoice_id", &["invoice_id", "invoiceid", "header_invoiceid"]);

/// Envelope: payload metadata and From/To/Sender credentials.
pub mod envelope {
    use super::{Field, field};

    pub const PAYLOAD_ID: Field = field("payload_id", &["payloadid", "payload_id"]);
    pub const TIMESTAMP: Field = field("timestamp", &["timestamp"]);
    pub const VERSION: Field = field("version", &["version"]);
    pub const SIGNATURE_VERSION: Field =
        field("signature_version", &["signatureversion", "signature_version"]);

    pub const FROM_DOMAIN: Field = field("from_domain", &["from_credential_domain", "from_domain"]);
    pub const FROM_IDENTITY: Field = field("from_identity", &["from_identity"]);
    pub const FROM_DOMAIN2: Field = field("from_domain2", &["from_credential_domain2"]);
    pub const FROM_IDENTITY2: Field = field("from_identity2", &["from_identity2"]);
    pub const FROM_DOMAIN3: Field = field("from_domain3", &["from_credential_domain3"]);
    pub const FROM_IDENTITY3: Field = field("from_identity3", &["from_identity3"]);
    pub const FROM_CORRESPONDENT: Field =
        field("from_correspondent_name", &["from_correspondent_name"]);
    pub const PREFERRED_LANGUAGE: Field = field("preferred_language", &["preferred_language"]);
    pub const STREET: Field = field("street", &["street"]);
    pub const CITY: Field = field("city", &["city"]);
    pub const POSTAL_CODE: Field = field("postalcode", &["postalcode", "postal_code"]);
    pub const COUNTRY: Field = field("country", &["country"]);
    pub const ISO_COUNTRY: Field = field("isocountry", &["isocountry", "iso_country"]);

    pub const TO_DOMAIN1: Field = field("to_cred1_domain", &["to_credential1_domain"]);
    pub const TO_IDENTITY1: Field = field("to_cred1_identity", &["to_credential1_identity"]);
    pub const TO_DOMAIN2: Field = field("to_cred2_domain", &["to_credential2_domain"]);
    pub const TO_IDENTITY2: Field = field("to_cred2_identity", &["to_credential2_identity"]);

    pub const SENDER_DOMAIN: Field =
        field("sender_domain", &["sender_credential_domain", "sender_domain"]);
    pub const SENDER_IDENTITY: Field = field("sender_identity", &["sender_identity"]);
    pub const SENDER_SECRET: Field = field("sender_secret", &["sender_shared_secret"]);
    pub const USER_AGENT: Field = field("user_agent", &["user_agent"]);

    pub const REQUEST_ID: Field = field("request_id", &["request_id"]);
    pub const DEPLOYMENT_MODE: Field =
        field("deployment_mode", &["request_deploymentmode", "deploymentmode"]);
}

/// Header: one row per invoice.
pub mod header {
    use super::{Field, field};

    pub const INVOICE_ID: Field =
        field("invoice_id", &["invoiceid", "header_invoiceid", "invoice_id"]);
    pub const INVOICE_DATE: Field =
        field("invoice_date", &["header_invoicedate", "invoicedate", "invoice_date"]);
    pub const INVOICE_ORIGIN: Field =
        field("invoice_origin", &["header_invoiceorigin", "invoiceorigin"]);
    pub const OPERATION: Field = field("operation", &["header_operation", "operation"]);
    pub const PURPOSE: Field = field("purpose", &["header_purpose", "purpose"]);
    pub const COMMENTS: Field = field("comments", &["comments", "comentarios"]);
    pub const TAX_IN_LINE: Field = field("is_tax_in_line", &["istaxinline", "is_tax_in_line"]);
    pub const ORDER_ID: Field = field("order_id", &["order_id", "orderid", "po", "po_number"]);
}

/// Partners: one row per invoice partner.
pub mod partners {
    use super::{Field, field};

    pub const ROLE: Field = field("role", &["role", "partner_role"]);
    pub const ADDRESS_ID: Field = field("address_id", &["addressid", "address_id"]);
    pub const NAME: Field = field("name", &["name"]);
    pub const EMAIL: Field = field("email", &["email"]);
    pub const LANG: Field = field("lang", &["lang"]);
    pub const DOMAIN: Field = field("domain", &["domain"]);
    pub const IDENTIFIER: Field = field("identifier", &["identifier"]);
}

/// Items: one row per invoice line.
pub mod items {
    use super::{Field, field};

    pub const LINE_NO: Field =
        field("line_no", &["invoicelinenumber", "line", "line_no", "lineno"]);
    pub const QUANTITY: Field = field("quantity", &["quantity", "qty"]);
    pub const UOM: Field = field("uom", &["unitofmeasure", "uom"]);
    pub const UNIT_PRICE: Field = field("unit_price", &["unitprice", "unit_price", "price"]);
    pub const PRICE_CURRENCY: Field = field(
        "price_currency",
        &["unitprice_currency", "price_currency", "currency"],
    );
    pub const REF_LINE: Field = field(
        "ref_line",
        &["ref_linenumber", "ref_line", "reflinenumber", "line_ref", "line_refnumber"],
    );
    pub const DESCRIPTION: Field =
        field("description", &["description", "itemdescription", "desc"]);
    pub const SUBTOTAL: Field =
        field("subtotal", &["subtotal", "lineamount", "linetotal", "importe_linea"]);
    pub const SUBTOTAL_CURRENCY: Field = field(
        "subtotal_currency",
        &["subtotal_currency", "currency_subtotal", "currency"],
    );
}

/// Taxes: one row per tax detail.
pub mod taxes {
    use super::{Field, field};

    pub const LEVEL: Field = field("level", &["level"]);
    pub const CATEGORY: Field = field("category", &["category", "tax_category"]);
    pub const RATE: Field = field("rate", &["rate", "percentage", "percentagerate", "tax_rate"]);
    pub const TAX_AMOUNT: Field = field("tax_amount", &["taxamount", "tax_amount", "amount"]);
    pub const TAXABLE_AMOUNT: Field = field("taxable_amount", &["taxableamount", "taxable_amount"]);
    pub const CURRENCY: Field = field(
        "currency",
        &["taxamount_currency", "tax_amount_currency", "currency", "tax_currency"],
    );
    pub const ALTERNATE_AMOUNT: Field =
        field("alternate_amount", &["alternateamount", "alternate_amount"]);
    pub const ALTERNATE_CURRENCY: Field =
        field("alternate_currency", &["alternatecurrency", "alternate_currency"]);
    pub const DESCRIPTION: Field = field("description", &["description"]);
    pub const TAX_POINT_DATE: Field = field("tax_point_date", &["taxpointdate", "tax_point_date"]);
}

/// Summary: invoice totals.
pub mod summary {
    use super::{Field, field};

    pub const SUBTOTAL: Field =
        field("subtotal", &["subtotal_amount", "subtotal", "amount_subtotal"]);
    pub const TAX: Field = field("tax", &["tax_total", "tax", "amount_tax"]);
    pub const NET: Field = field("net", &["net_amount", "net"]);
    pub const GROSS: Field = field(
        "gross",
        &["grossamount", "gross_amount", "gross", "amount_gross"],
    );
    pub const CURRENCY: Field = field("currency", &["net_amount_currency", "currency"]);
}

/// Extrinsics: name/value pairs.
pub mod extrinsics {
    use super::{Field, field};

    pub const NAME: Field = field("name", &["name", "key"]);
    pub const VALUE: Field = field("value", &["value"]);
    pub const ATTACHMENT_URL: Field = field("attachment_url", &["attachment_url", "url"]);
}

/// Flattened snapshot (`good_to_pay`): one row per invoice line with
/// header, party, tax and total columns repeated.
pub mod snapshot {
    use super::{Field, field};

    pub const INVOICE_DATE: Field = field("invoice_date", &["invoice_date", "invoicedate"]);
    pub const ORDER_ID: Field = field("order_id", &["order_id", "orderid", "po_number"]);
    pub const LINE_NO: Field = field("line_no", &["line_no", "line", "invoicelinenumber"]);
    pub const DESCRIPTION: Field = field("description", &["description", "item_description"]);
    pub const QUANTITY: Field = field("quantity", &["quantity", "qty"]);
    pub const UOM: Field = field("uom", &["uom", "unitofmeasure"]);
    pub const UNIT_PRICE: Field = field("unit_price", &["unit_price", "unitprice", "price"]);
    pub const CURRENCY: Field = field("currency", &["currency", "currency_code"]);
    pub const TAX_AMOUNT: Field = field("tax_amount", &["tax_amount", "taxamount", "vat_amount"]);
    pub const TAXABLE_AMOUNT: Field =
        field("taxable_amount", &["taxable_amount", "taxableamount"]);
    pub const TAX_RATE: Field = field("tax_rate", &["tax_rate", "percentagerate", "vat_rate"]);
    pub const TAX_CATEGORY: Field = field("tax_category", &["tax_category", "category"]);
    pub const NET_AMOUNT: Field = field("net_amount", &["net_amount", "net"]);
    pub const GROSS_AMOUNT: Field =
        field("gross_amount", &["gross_amount", "grossamount", "gross"]);
    pub const SUPPLIER_NAME: Field = field("supplier_name", &["supplier_name", "vendor_name"]);
    pub const SUPPLIER_ID: Field = field("supplier_id", &["supplier_id", "vendor_id"]);
    pub const BUYER_NAME: Field = field("buyer_name", &["buyer_name", "customer_name"]);
    pub const BUYER_ID: Field = field("buyer_id", &["buyer_id", "customer_id"]);
    pub const PARTY_DOMAIN: Field = field("party_domain", &["party_domain", "id_domain"]);
}
