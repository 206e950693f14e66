//! cXML `InvoiceDetailRequest` assembly, parsing, signature block, and serialization.
//!
//! ```text
//! <!DOCTYPE cXML SYSTEM "http://xml.cxml.org/schemas/cXML/1.2.045/InvoiceDetail.dtd">
//! <cXML payloadID=".." signatureVersion="1.0" timestamp=".." version="1.2.045">
//!   <Header> From / To / Sender </Header>
//!   <Request Id="cXMLData" deploymentMode="test">
//!     <InvoiceDetailRequest>
//!       <InvoiceDetailRequestHeader/> <InvoiceDetailOrder/> <InvoiceDetailSummary/>
//!     </InvoiceDetailRequest>
//!   </Request>
//!   <ds:Signature/>
//! </cXML>
//! ```

mod assemble;
mod parse;
mod serialize;
pub mod signature;
mod status;
mod tree;

pub use assemble::*;
pub use parse::*;
pub use serialize::*;
pub use signature::{
    SignatureContext, SignatureMaterial, SignatureProvider, StaticSignature, attach_signature,
};
pub use status::*;
pub use tree::*;

use serde::{Deserialize, Serialize};

pub const DEFAULT_VERSION: &str = "1.2.045";
pub const DEFAULT_DTD_URL: &str = "http://xml.cxml.org/schemas/cXML/1.2.045/InvoiceDetail.dtd";

/// Document-level defaults applied when a table does not supply a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentDefaults {
    pub version: String,
    pub signature_version: String,
    pub dtd_url: String,
    pub user_agent: String,
    pub request_id: String,
    pub deployment_mode: String,
    pub invoice_origin: String,
    pub operation: String,
    pub purpose: String,
    pub unit_of_measure: String,
    pub tax_category: String,
    pub language: String,
    /// Fallback currency. No currency is invented when unset.
    pub currency: Option<String>,
}

impl Default for DocumentDefaults {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.into(),
            signature_version: "1.0".into(),
            dtd_url: DEFAULT_DTD_URL.into(),
            user_agent: "Notebook cXML Builder".into(),
            request_id: "cXMLData".into(),
            deployment_mode: "test".into(),
            invoice_origin: "supplier".into(),
            operation: "new".into(),
            purpose: "standard".into(),
            unit_of_measure: "EA".into(),
            tax_category: "SalesTax".into(),
            language: "en".into(),
            currency: None,
        }
    }
}

/// Version segment of a cXML DTD URL (`.../cXML/1.2.045/InvoiceDetail.dtd`).
pub fn dtd_version(url: &str) -> Option<&str> {
    url.split('/').find(|seg| {
        seg.contains('.')
            && seg.chars().next().is_some_and(|c| c.is_ascii_digit())
            && seg.chars().all(|c| c.is_ascii_digit() || c == '.')
    })
}
