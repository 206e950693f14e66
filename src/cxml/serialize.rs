use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

use super::assemble::Document;
use super::tree::{Element, Node};
use crate::core::CxmlError;

fn xml_io(e: std::io::Error) -> CxmlError {
    CxmlError::Xml(format!("XML write error: {e}"))
}

/// Indented writer emitting the declaration and the cXML DOCTYPE.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new(dtd_url: &str) -> Result<Self, CxmlError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        writer
            .write_event(Event::DocType(BytesText::from_escaped(format!(
                "cXML SYSTEM \"{dtd_url}\""
            ))))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }

    pub fn into_string(self) -> Result<String, CxmlError> {
        String::from_utf8(self.into_bytes())
            .map_err(|e| CxmlError::Xml(format!("XML UTF-8 error: {e}")))
    }

    /// Write `el` and its subtree. Childless elements are self-closed.
    pub fn element(&mut self, el: &Element) -> Result<&mut Self, CxmlError> {
        let mut start = BytesStart::new(el.name.as_str());
        for (k, v) in &el.attrs {
            start.push_attribute((k.as_str(), v.as_str()));
        }
        if el.children.is_empty() {
            self.writer.write_event(Event::Empty(start)).map_err(xml_io)?;
            return Ok(self);
        }
        self.writer.write_event(Event::Start(start)).map_err(xml_io)?;
        for child in &el.children {
            match child {
                Node::Element(e) => {
                    self.element(e)?;
                }
                Node::Text(t) => {
                    self.writer
                        .write_event(Event::Text(BytesText::new(t)))
                        .map_err(xml_io)?;
                }
            }
        }
        self.writer
            .write_event(Event::End(BytesEnd::new(el.name.as_str())))
            .map_err(xml_io)?;
        Ok(self)
    }
}

/// Render a document: declaration, DOCTYPE, then the element tree.
///
/// The tree is only read, so serializing the same document twice gives
/// identical bytes.
pub fn serialize(doc: &Document) -> Result<Vec<u8>, CxmlError> {
    serialize_element(&doc.root, &doc.dtd_url)
}

/// [`serialize`] for a bare tree.
pub fn serialize_element(root: &Element, dtd_url: &str) -> Result<Vec<u8>, CxmlError> {
    let mut w = XmlWriter::new(dtd_url)?;
    w.element(root)?;
    Ok(w.into_bytes())
}

/// The exact DOCTYPE line written for `dtd_url`.
pub fn doctype_line(dtd_url: &str) -> String {
    format!("<!DOCTYPE cXML SYSTEM \"{dtd_url}\">")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::new("cXML")
            .attr("payloadID", "p&1")
            .child(Element::new("Empty"))
            .child(Element::new("Money").attr("currency", "GBP").text("20 < 21"))
    }

    #[test]
    fn prolog_then_tree() {
        let bytes = serialize_element(&sample(), "http://x/InvoiceDetail.dtd").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert_eq!(lines.next(), Some(r#"<!DOCTYPE cXML SYSTEM "http://x/InvoiceDetail.dtd">"#));
        assert_eq!(lines.next(), Some(r#"<cXML payloadID="p&amp;1">"#));
        assert!(text.contains("<Empty/>"));
        assert!(text.contains(r#"<Money currency="GBP">20 &lt; 21</Money>"#));
        assert_eq!(text.matches("<?xml").count(), 1);
    }

    #[test]
    fn byte_identical_twice() {
        let a = serialize_element(&sample(), "u").unwrap();
        let b = serialize_element(&sample(), "u").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn doctype_line_matches_writer() {
        let text = String::from_utf8(serialize_element(&sample(), "http://d").unwrap()).unwrap();
        assert!(text.contains(&doctype_line("http://d")));
    }
}
