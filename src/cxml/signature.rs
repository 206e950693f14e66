//! XML-DSig / XAdES signature block.
//!
//! The block has a fixed shape, described once as a [`Template`] and
//! instantiated by [`instantiate`]. Every digest, certificate, timestamp and
//! revocation blob comes from a [`SignatureProvider`] as an opaque string.
//! Nothing here computes a signature.

use std::path::Path;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::tree::Element;
use crate::core::CxmlError;

pub const NS_DS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const NS_XADES: &str = "http://uri.etsi.org/01903/v1.3.2#";

pub const SIGNATURE_ID: &str = "cXMLSignature";

const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

/// Opaque signature material, as produced by an external signer.
///
/// Field names match the JSON file accepted by [`SignatureMaterial::from_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureMaterial {
    pub signed_info_digest: String,
    pub data_digest: String,
    pub signed_properties_digest: String,
    pub signature_value: String,
    pub certificate: String,
    /// RFC 3339 signing time.
    pub signing_time: String,
    pub cert_digest: String,
    pub issuer_name: String,
    /// Decimal certificate serial number.
    pub issuer_serial: String,
    pub policy_id: String,
    pub policy_hash: String,
    pub policy_uri: String,
    pub validation_policy_id: String,
    pub validation_policy_qualifier: String,
    pub signature_timestamp: String,
    pub archive_timestamp: String,
    pub certificate_chain: Vec<String>,
    pub crls: Vec<String>,
    pub ocsp_responses: Vec<String>,
}

impl SignatureMaterial {
    /// Material must be a JSON object; absent keys stay empty.
    pub fn from_json(json: &str) -> Result<Self, CxmlError> {
        let invalid = |e: serde_json::Error| {
            CxmlError::Signature(format!("invalid signature material: {e}"))
        };
        let value: serde_json::Value = serde_json::from_str(json).map_err(invalid)?;
        if !value.is_object() {
            return Err(CxmlError::Signature(
                "signature material must be a JSON object".into(),
            ));
        }
        serde_json::from_value(value).map_err(invalid)
    }

    pub fn from_file(path: &Path) -> Result<Self, CxmlError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CxmlError::Signature(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Reject values that cannot sit in their slot.
    ///
    /// Only the shape is checked: a present signing time must be RFC 3339 and
    /// a present serial number must be decimal digits.
    pub fn validate(&self) -> Result<(), CxmlError> {
        if !self.signing_time.is_empty()
            && DateTime::parse_from_rfc3339(&self.signing_time).is_err()
        {
            return Err(CxmlError::Signature(format!(
                "signing time is not RFC 3339: {:?}",
                self.signing_time
            )));
        }
        if !self.issuer_serial.is_empty()
            && !self.issuer_serial.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(CxmlError::Signature(format!(
                "issuer serial is not a decimal number: {:?}",
                self.issuer_serial
            )));
        }
        Ok(())
    }

    /// Names of the scalar slots left empty.
    pub fn missing(&self) -> Vec<&'static str> {
        SCALAR_SLOTS
            .iter()
            .filter(|(slot, _)| self.scalar(*slot).is_empty())
            .map(|(_, name)| *name)
            .collect()
    }

    fn scalar(&self, slot: Slot) -> &str {
        match slot {
            Slot::SignedInfoDigest => &self.signed_info_digest,
            Slot::DataDigest => &self.data_digest,
            Slot::SignedPropertiesDigest => &self.signed_properties_digest,
            Slot::SignatureValue => &self.signature_value,
            Slot::Certificate => &self.certificate,
            Slot::SigningTime => &self.signing_time,
            Slot::CertDigest => &self.cert_digest,
            Slot::IssuerName => &self.issuer_name,
            Slot::IssuerSerial => &self.issuer_serial,
            Slot::PolicyId => &self.policy_id,
            Slot::PolicyHash => &self.policy_hash,
            Slot::PolicyUri => &self.policy_uri,
            Slot::ValidationPolicyId => &self.validation_policy_id,
            Slot::ValidationPolicyQualifier => &self.validation_policy_qualifier,
            Slot::SignatureTimeStamp => &self.signature_timestamp,
            Slot::ArchiveTimeStamp => &self.archive_timestamp,
            Slot::PayloadId | Slot::SignatureVersion => "",
        }
    }

    fn list(&self, slot: ListSlot) -> &[String] {
        match slot {
            ListSlot::CertificateChain => &self.certificate_chain,
            ListSlot::Crls => &self.crls,
            ListSlot::OcspResponses => &self.ocsp_responses,
        }
    }
}

const SCALAR_SLOTS: [(Slot, &str); 16] = [
    (Slot::SignedInfoDigest, "signed_info_digest"),
    (Slot::DataDigest, "data_digest"),
    (Slot::SignedPropertiesDigest, "signed_properties_digest"),
    (Slot::SignatureValue, "signature_value"),
    (Slot::Certificate, "certificate"),
    (Slot::SigningTime, "signing_time"),
    (Slot::CertDigest, "cert_digest"),
    (Slot::IssuerName, "issuer_name"),
    (Slot::IssuerSerial, "issuer_serial"),
    (Slot::PolicyId, "policy_id"),
    (Slot::PolicyHash, "policy_hash"),
    (Slot::PolicyUri, "policy_uri"),
    (Slot::ValidationPolicyId, "validation_policy_id"),
    (Slot::ValidationPolicyQualifier, "validation_policy_qualifier"),
    (Slot::SignatureTimeStamp, "signature_timestamp"),
    (Slot::ArchiveTimeStamp, "archive_timestamp"),
];

/// Supplies signature material for a document.
pub trait SignatureProvider {
    fn material(&self, ctx: &SignatureContext<'_>) -> Result<SignatureMaterial, CxmlError>;
}

/// The same pre-computed material for every document.
#[derive(Debug, Clone, Default)]
pub struct StaticSignature(pub SignatureMaterial);

impl SignatureProvider for StaticSignature {
    fn material(&self, _ctx: &SignatureContext<'_>) -> Result<SignatureMaterial, CxmlError> {
        Ok(self.0.clone())
    }
}

/// Document values the signature block repeats.
#[derive(Debug, Clone, Copy)]
pub struct SignatureContext<'a> {
    pub payload_id: &'a str,
    pub signature_version: &'a str,
}

/// A value taken from the material or the document context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    SignedInfoDigest,
    DataDigest,
    SignedPropertiesDigest,
    SignatureValue,
    Certificate,
    SigningTime,
    CertDigest,
    IssuerName,
    IssuerSerial,
    PolicyId,
    PolicyHash,
    PolicyUri,
    ValidationPolicyId,
    ValidationPolicyQualifier,
    SignatureTimeStamp,
    ArchiveTimeStamp,
    PayloadId,
    SignatureVersion,
}

/// A repeated value list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSlot {
    CertificateChain,
    Crls,
    OcspResponses,
}

#[derive(Debug, Clone, Copy)]
pub enum Attr {
    Fixed(&'static str, &'static str),
    Filled(&'static str, Slot),
}

#[derive(Debug, Clone, Copy)]
pub enum Body {
    Empty,
    Text(Slot),
    Children(&'static [Template]),
    /// One element named `.0` per list entry.
    Repeat(&'static str, ListSlot),
}

/// Element-name, attributes, and body of one template node.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub name: &'static str,
    pub attrs: &'static [Attr],
    pub body: Body,
}

const fn el(name: &'static str, attrs: &'static [Attr], body: Body) -> Template {
    Template { name, attrs, body }
}

const fn leaf(name: &'static str, slot: Slot) -> Template {
    el(name, &[], Body::Text(slot))
}

macro_rules! digest_method {
    ($algorithm:expr $(,)?) => {
        el("ds:DigestMethod", &[Attr::Fixed("Algorithm", $algorithm)], Body::Empty)
    };
}

macro_rules! reference {
    ($uri:expr, $digest:expr $(,)?) => {
        el(
            "ds:Reference",
            &[Attr::Fixed("URI", $uri)],
            Body::Children(&[digest_method!(SHA256), leaf("ds:DigestValue", $digest)]),
        )
    };
}

macro_rules! wrap {
    ($name:expr, $child:expr $(,)?) => {
        el($name, &[], Body::Children(&[$child]))
    };
}

macro_rules! encapsulated {
    ($name:expr, $slot:expr $(,)?) => {
        wrap!($name, leaf("xades:EncapsulatedTimeStamp", $slot))
    };
}

/// The complete `ds:Signature` subtree.
pub const SIGNATURE_TEMPLATE: Template = el(
    "ds:Signature",
    &[
        Attr::Fixed("Id", SIGNATURE_ID),
        Attr::Fixed("xmlns:ds", NS_DS),
        Attr::Fixed("xmlns:xades", NS_XADES),
    ],
    Body::Children(&[
        el(
            "ds:SignedInfo",
            &[],
            Body::Children(&[
                el("ds:CanonicalizationMethod", &[Attr::Fixed("Algorithm", C14N)], Body::Empty),
                el("ds:SignatureMethod", &[Attr::Fixed("Algorithm", RSA_SHA256)], Body::Empty),
                reference!("#cXMLSignedInfo", Slot::SignedInfoDigest),
                reference!("#cXMLData", Slot::DataDigest),
                reference!("#XAdESSignedProps", Slot::SignedPropertiesDigest),
            ]),
        ),
        leaf("ds:SignatureValue", Slot::SignatureValue),
        el(
            "ds:KeyInfo",
            &[Attr::Fixed("Id", "KeyInfoId")],
            Body::Children(&[wrap!("ds:X509Data", leaf("ds:X509Certificate", Slot::Certificate))]),
        ),
        wrap!(
            "ds:Object",
            el(
                "cXMLSignedInfo",
                &[
                    Attr::Fixed("Id", "cXMLSignedInfo"),
                    Attr::Filled("payloadID", Slot::PayloadId),
                    Attr::Filled("signatureVersion", Slot::SignatureVersion),
                ],
                Body::Empty,
            ),
        ),
        wrap!(
            "ds:Object",
            el(
                "Extrinsic",
                &[Attr::Fixed("name", "ValidationPolicyId")],
                Body::Children(&[el(
                    "xades:Identifier",
                    &[Attr::Fixed("Qualifier", "OIDAsURN")],
                    Body::Text(Slot::ValidationPolicyId),
                )]),
            ),
        ),
        wrap!(
            "ds:Object",
            el(
                "Extrinsic",
                &[Attr::Fixed("name", "ValidationPolicyQualifier")],
                Body::Children(&[leaf("xades:SPURI", Slot::ValidationPolicyQualifier)]),
            ),
        ),
        wrap!(
            "ds:Object",
            el(
                "xades:QualifyingProperties",
                &[
                    Attr::Fixed("Id", "QualifyingPropertiesId"),
                    Attr::Fixed("Target", "#cXMLSignature"),
                ],
                Body::Children(&[SIGNED_PROPERTIES, UNSIGNED_PROPERTIES]),
            ),
        ),
    ]),
);

const SIGNED_PROPERTIES: Template = el(
    "xades:SignedProperties",
    &[Attr::Fixed("Id", "XAdESSignedProps")],
    Body::Children(&[el(
        "xades:SignedSignatureProperties",
        &[],
        Body::Children(&[
            leaf("xades:SigningTime", Slot::SigningTime),
            wrap!(
                "xades:SigningCertificate",
                el(
                    "xades:Cert",
                    &[],
                    Body::Children(&[
                        el(
                            "xades:CertDigest",
                            &[],
                            Body::Children(&[
                                digest_method!(SHA256),
                                leaf("ds:DigestValue", Slot::CertDigest),
                            ]),
                        ),
                        el(
                            "xades:IssuerSerial",
                            &[],
                            Body::Children(&[
                                leaf("ds:X509IssuerName", Slot::IssuerName),
                                leaf("ds:X509SerialNumber", Slot::IssuerSerial),
                            ]),
                        ),
                    ]),
                ),
            ),
            wrap!(
                "xades:SignaturePolicyIdentifier",
                el(
                    "xades:SignaturePolicyId",
                    &[],
                    Body::Children(&[
                        wrap!(
                            "xades:SigPolicyId",
                            el(
                                "xades:Identifier",
                                &[Attr::Fixed("Qualifier", "OIDAsURN")],
                                Body::Text(Slot::PolicyId),
                            ),
                        ),
                        el(
                            "xades:SigPolicyHash",
                            &[],
                            Body::Children(&[
                                digest_method!(SHA1),
                                leaf("ds:DigestValue", Slot::PolicyHash),
                            ]),
                        ),
                        wrap!(
                            "xades:SigPolicyQualifiers",
                            wrap!("xades:SigPolicyQualifier", leaf("xades:SPURI", Slot::PolicyUri)),
                        ),
                    ]),
                ),
            ),
        ]),
    )]),
);

const UNSIGNED_PROPERTIES: Template = wrap!(
    "xades:UnsignedProperties",
    el(
        "xades:UnsignedSignatureProperties",
        &[],
        Body::Children(&[
            encapsulated!("xades:SignatureTimeStamp", Slot::SignatureTimeStamp),
            el(
                "xades:CertificateValues",
                &[],
                Body::Repeat("xades:EncapsulatedX509Certificate", ListSlot::CertificateChain),
            ),
            el(
                "xades:RevocationValues",
                &[],
                Body::Children(&[
                    el(
                        "xades:CRLValues",
                        &[],
                        Body::Repeat("xades:EncapsulatedCRLValue", ListSlot::Crls),
                    ),
                    el(
                        "xades:OCSPValues",
                        &[],
                        Body::Repeat("xades:EncapsulatedOCSPValue", ListSlot::OcspResponses),
                    ),
                ]),
            ),
            encapsulated!("xades:ArchiveTimeStamp", Slot::ArchiveTimeStamp),
        ]),
    ),
);

/// Build the element tree for `template`.
pub fn instantiate(
    template: &Template,
    ctx: &SignatureContext<'_>,
    material: &SignatureMaterial,
) -> Element {
    let fill = |slot: Slot| -> String {
        match slot {
            Slot::PayloadId => ctx.payload_id.to_string(),
            Slot::SignatureVersion => ctx.signature_version.to_string(),
            other => material.scalar(other).to_string(),
        }
    };

    let mut out = Element::new(template.name);
    for attr in template.attrs {
        match attr {
            Attr::Fixed(k, v) => out.set_attr(*k, *v),
            Attr::Filled(k, slot) => out.set_attr(*k, fill(*slot)),
        }
    }
    match template.body {
        Body::Empty => {}
        Body::Text(slot) => {
            let text = fill(slot);
            if !text.is_empty() {
                out = out.text(text);
            }
        }
        Body::Children(children) => {
            for child in children {
                out.push(instantiate(child, ctx, material));
            }
        }
        Body::Repeat(name, list) => {
            for value in material.list(list) {
                out.add_text(name, value.as_str());
            }
        }
    }
    out
}

/// Append the signature block to `root`.
///
/// Empty slots still produce their elements, so the block always has its
/// full shape; they are reported with a warning.
pub fn attach_signature(
    root: &mut Element,
    ctx: &SignatureContext<'_>,
    material: &SignatureMaterial,
) -> Result<(), CxmlError> {
    material.validate()?;
    let missing = material.missing();
    if !missing.is_empty() {
        warn!(
            payload_id = ctx.payload_id,
            missing = ?missing,
            "signature material incomplete; emitting empty placeholders"
        );
    }
    root.push(instantiate(&SIGNATURE_TEMPLATE, ctx, material));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> SignatureContext<'static> {
        SignatureContext {
            payload_id: "p-1@example",
            signature_version: "1.0",
        }
    }

    fn material() -> SignatureMaterial {
        SignatureMaterial {
            signed_info_digest: "d1".into(),
            data_digest: "d2".into(),
            signed_properties_digest: "d3".into(),
            signature_value: "sig".into(),
            certificate: "cert".into(),
            signing_time: "2025-06-24T12:24:37Z".into(),
            issuer_serial: "398850118330166149807158326000912326027321197577".into(),
            certificate_chain: vec!["c1".into(), "c2".into(), "c3".into()],
            crls: vec!["crl".into()],
            ..SignatureMaterial::default()
        }
    }

    #[test]
    fn signed_info_has_three_references_in_order() {
        let sig = instantiate(&SIGNATURE_TEMPLATE, &ctx(), &material());
        let uris: Vec<_> = sig
            .find("ds:SignedInfo")
            .unwrap()
            .children_named("ds:Reference")
            .filter_map(|r| r.get_attr("URI"))
            .collect();
        assert_eq!(uris, ["#cXMLSignedInfo", "#cXMLData", "#XAdESSignedProps"]);
        let digests: Vec<_> = sig
            .find("ds:SignedInfo")
            .unwrap()
            .children_named("ds:Reference")
            .map(|r| r.find("ds:DigestValue").unwrap().text_content())
            .collect();
        assert_eq!(digests, ["d1", "d2", "d3"]);
    }

    #[test]
    fn namespaces_declared_once_on_root() {
        let sig = instantiate(&SIGNATURE_TEMPLATE, &ctx(), &material());
        assert_eq!(sig.get_attr("xmlns:ds"), Some(NS_DS));
        assert_eq!(sig.get_attr("xmlns:xades"), Some(NS_XADES));

        fn count_ns(el: &Element) -> usize {
            el.attrs.iter().filter(|(k, _)| k.starts_with("xmlns:")).count()
                + el.elements().map(count_ns).sum::<usize>()
        }
        assert_eq!(count_ns(&sig), 2);
    }

    #[test]
    fn context_values_fill_signed_info_object() {
        let sig = instantiate(&SIGNATURE_TEMPLATE, &ctx(), &material());
        let info = sig.find_path("ds:Object/cXMLSignedInfo").unwrap();
        assert_eq!(info.get_attr("payloadID"), Some("p-1@example"));
        assert_eq!(info.get_attr("signatureVersion"), Some("1.0"));
    }

    #[test]
    fn repeated_certificates() {
        let sig = instantiate(&SIGNATURE_TEMPLATE, &ctx(), &material());
        let usp = sig
            .children_named("ds:Object")
            .find_map(|o| o.find("xades:QualifyingProperties"))
            .and_then(|q| q.find_path("xades:UnsignedProperties/xades:UnsignedSignatureProperties"))
            .unwrap();
        assert_eq!(
            usp.find("xades:CertificateValues").unwrap().elements().count(),
            3
        );
        assert_eq!(
            usp.find_path("xades:RevocationValues/xades:OCSPValues")
                .unwrap()
                .elements()
                .count(),
            0
        );
    }

    #[test]
    fn malformed_material_is_rejected() {
        let mut m = material();
        m.signing_time = "yesterday".into();
        assert!(m.validate().is_err());
        let mut m = material();
        m.issuer_serial = "0x1F".into();
        assert!(m.validate().is_err());
    }

    #[test]
    fn missing_slots_are_reported() {
        assert!(SignatureMaterial::default().missing().contains(&"signature_value"));
        assert!(!material().missing().contains(&"signature_value"));
    }

    #[test]
    fn material_from_json() {
        let m = SignatureMaterial::from_json(r#"{"signature_value": "abc", "crls": ["x"]}"#).unwrap();
        assert_eq!(m.signature_value, "abc");
        assert_eq!(m.crls, vec!["x".to_string()]);
    }

    #[test]
    fn material_must_be_an_object() {
        for json in ["[]", r#"["abc"]"#, "42", "null", "not json"] {
            assert!(SignatureMaterial::from_json(json).is_err(), "{json}");
        }
    }
}
