use chrono::{DateTime, FixedOffset, SecondsFormat};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::serialize::serialize_element;
use super::tree::Element;
use crate::core::CxmlError;

/// DTD referenced by acknowledgment documents.
pub const STATUS_DTD_URL: &str = "http://xml.cxml.org/schemas/cXML/1.2.045/cXML.dtd";

/// The `Response > Status` of a cXML acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CxmlStatus {
    pub code: u16,
    pub text: String,
    pub message: String,
}

impl CxmlStatus {
    /// Message if present, else the short text.
    pub fn description(&self) -> &str {
        if self.message.is_empty() {
            &self.text
        } else {
            &self.message
        }
    }
}

fn status_attrs(e: &BytesStart<'_>, status: &mut CxmlStatus) -> Result<(), CxmlError> {
    for attr in e.attributes().flatten() {
        let key = std::str::from_utf8(attr.key.as_ref()).unwrap_or("");
        let val = attr
            .unescape_value()
            .map_err(|e| CxmlError::Xml(format!("bad Status attribute: {e}")))?;
        match key {
            "code" => {
                status.code = val
                    .trim()
                    .parse()
                    .map_err(|_| CxmlError::Xml(format!("non-numeric Status code: {val:?}")))?;
            }
            "text" => status.text = val.to_string(),
            _ => {}
        }
    }
    Ok(())
}

/// Parse the first `Status` element of a cXML response body.
pub fn parse_status(body: &str) -> Result<CxmlStatus, CxmlError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut status = CxmlStatus {
        code: 0,
        text: String::new(),
        message: String::new(),
    };
    let mut found = false;
    let mut inside = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Status" => {
                status_attrs(e, &mut status)?;
                found = true;
                inside = true;
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"Status" => {
                status_attrs(e, &mut status)?;
                found = true;
                break;
            }
            Ok(Event::Text(ref e)) if inside => {
                let text = e
                    .unescape()
                    .map_err(|e| CxmlError::Xml(format!("bad Status text: {e}")))?;
                status.message.push_str(&text);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Status" => break,
            Ok(Event::Eof) => break,
            Err(e) => return Err(CxmlError::Xml(format!("malformed response: {e}"))),
            _ => {}
        }
    }

    if found {
        Ok(status)
    } else {
        Err(CxmlError::Xml("response has no Status element".into()))
    }
}

/// Build a cXML acknowledgment (`cXML > Response > Status`).
pub fn status_document(
    code: u16,
    text: &str,
    message: &str,
    now: DateTime<FixedOffset>,
) -> Result<Vec<u8>, CxmlError> {
    let root = Element::new("cXML")
        .attr(
            "payloadID",
            format!("{}.{}@cxml-invoice", now.timestamp_millis(), std::process::id()),
        )
        .attr("timestamp", now.to_rfc3339_opts(SecondsFormat::Secs, false))
        .child(
            Element::new("Response").child(
                Element::new("Status")
                    .attr("code", code.to_string())
                    .attr("text", text)
                    .text(message),
            ),
        );
    serialize_element(&root, STATUS_DTD_URL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-06-24T12:24:37+02:00").unwrap()
    }

    #[test]
    fn parses_acknowledgment() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE cXML SYSTEM "http://xml.cxml.org/schemas/cXML/1.2.045/cXML.dtd">
<cXML payloadID="1@x" timestamp="2025-06-24T12:24:37+02:00">
  <Response>
    <Status code="201" text="Accepted">Acknowledged</Status>
  </Response>
</cXML>"#;
        let status = parse_status(body).unwrap();
        assert_eq!(status.code, 201);
        assert_eq!(status.text, "Accepted");
        assert_eq!(status.description(), "Acknowledged");
    }

    #[test]
    fn empty_status_element() {
        let status = parse_status(r#"<cXML><Response><Status code="406" text="Not Acceptable"/></Response></cXML>"#)
            .unwrap();
        assert_eq!(status.code, 406);
        assert_eq!(status.description(), "Not Acceptable");
    }

    #[test]
    fn rejects_bodies_without_status() {
        assert!(parse_status("").is_err());
        assert!(parse_status("<html>502</html>").is_err());
        assert!(parse_status(r#"<Status code="abc"/>"#).is_err());
    }

    #[test]
    fn status_document_parses_back() {
        let bytes = status_document(406, "Not Acceptable", "DTD validation failed", now()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains(STATUS_DTD_URL));
        let status = parse_status(&text).unwrap();
        assert_eq!(status.code, 406);
        assert_eq!(status.message, "DTD validation failed");
    }
}
