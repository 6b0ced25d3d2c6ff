//! Push-style XML event driver
//!
//! Reads a document with `quick-xml` and reports namespace-resolved
//! start/characters/end events to a [`ContentHandler`]. The handler is asked
//! whether to stop before every element, which is how a streaming session
//! cancels the parse.

use crate::error::{Error, Result};
use crate::namespaces::{NamespaceContext, NamespaceScopes, QName};
use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::BufRead;

/// Attributes of one element, in document order
pub type Attributes = IndexMap<QName, String>;

/// Receiver of parse events
pub trait ContentHandler {
    /// An element was opened
    fn start_element(
        &mut self,
        name: &QName,
        attributes: &Attributes,
        scopes: &NamespaceScopes,
    ) -> Result<()>;

    /// Character data inside the current element
    fn characters(&mut self, text: &str) -> Result<()>;

    /// The current element was closed
    fn end_element(&mut self, name: &QName) -> Result<()>;

    /// Consulted before each element; `true` ends the parse early
    fn should_stop(&self) -> bool {
        false
    }
}

/// How a parse ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The whole document was read
    Completed,
    /// The handler asked to stop
    Stopped,
}

/// Parse an XML document from a string
pub fn parse_str<H: ContentHandler>(xml: &str, handler: &mut H) -> Result<ParseOutcome> {
    parse(xml.as_bytes(), handler)
}

/// Parse an XML document, reporting events to `handler`
pub fn parse<R: BufRead, H: ContentHandler>(source: R, handler: &mut H) -> Result<ParseOutcome> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(true);

    let mut scopes = NamespaceScopes::new();
    let mut open: Vec<QName> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if handler.should_stop() {
                    return Ok(ParseOutcome::Stopped);
                }
                let (name, attributes) = open_element(&e, &mut scopes)?;
                handler.start_element(&name, &attributes, &scopes)?;
                open.push(name);
            }
            Ok(Event::Empty(e)) => {
                if handler.should_stop() {
                    return Ok(ParseOutcome::Stopped);
                }
                let (name, attributes) = open_element(&e, &mut scopes)?;
                handler.start_element(&name, &attributes, &scopes)?;
                handler.end_element(&name)?;
                scopes.pop();
            }
            Ok(Event::End(_)) => {
                if let Some(name) = open.pop() {
                    handler.end_element(&name)?;
                    scopes.pop();
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?;
                if !text.is_empty() {
                    handler.characters(&text)?;
                }
            }
            Ok(Event::CData(e)) => {
                let bytes = e.into_inner();
                handler.characters(&String::from_utf8_lossy(&bytes))?;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "Error parsing XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {} // Ignore comments, processing instructions, declarations
        }
        buf.clear();
    }

    if let Some(name) = open.last() {
        return Err(Error::Xml(format!("Unexpected end of document inside <{}>", name)));
    }

    Ok(ParseOutcome::Completed)
}

/// Push the element's namespace declarations and resolve its name and attributes
fn open_element(start: &BytesStart, scopes: &mut NamespaceScopes) -> Result<(QName, Attributes)> {
    let raw_name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
        .to_string();

    let mut declared = NamespaceContext::new();
    let mut raw_attributes = Vec::new();

    for attr_result in start.attributes() {
        let attr =
            attr_result.map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;

        let attr_name = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?
            .to_string();

        let attr_value = attr
            .unescape_value()
            .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
            .to_string();

        if attr_name == "xmlns" {
            declared.set_default_namespace(attr_value);
        } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
            declared.add_prefix(prefix, attr_value);
        } else {
            raw_attributes.push((attr_name, attr_value));
        }
    }

    scopes.push(declared);

    let name = scopes.resolve_element(&raw_name)?;
    let mut attributes = Attributes::with_capacity(raw_attributes.len());
    for (raw, value) in raw_attributes {
        attributes.insert(scopes.resolve_attribute(&raw)?, value);
    }

    Ok((name, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::GML_NAMESPACE;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        stop_after: Option<usize>,
        started: usize,
    }

    impl ContentHandler for Recorder {
        fn start_element(
            &mut self,
            name: &QName,
            attributes: &Attributes,
            _scopes: &NamespaceScopes,
        ) -> Result<()> {
            self.started += 1;
            let attrs: Vec<String> = attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            self.events.push(format!("start {} [{}]", name, attrs.join(",")));
            Ok(())
        }

        fn characters(&mut self, text: &str) -> Result<()> {
            self.events.push(format!("text {}", text));
            Ok(())
        }

        fn end_element(&mut self, name: &QName) -> Result<()> {
            self.events.push(format!("end {}", name));
            Ok(())
        }

        fn should_stop(&self) -> bool {
            self.stop_after.map_or(false, |n| self.started >= n)
        }
    }

    #[test]
    fn test_namespaced_events() {
        let xml = r#"<app:roads xmlns:app="http://example.com/app" xmlns:gml="http://www.opengis.net/gml">
            <gml:Point srsName="EPSG:4326"><gml:coordinates>1,2</gml:coordinates></gml:Point>
        </app:roads>"#;

        let mut recorder = Recorder::default();
        let outcome = parse_str(xml, &mut recorder).unwrap();
        assert_eq!(outcome, ParseOutcome::Completed);

        assert_eq!(recorder.events[0], "start {http://example.com/app}roads []");
        assert_eq!(
            recorder.events[1],
            format!("start {{{}}}Point [srsName=EPSG:4326]", GML_NAMESPACE)
        );
        assert_eq!(recorder.events[3], "text 1,2");
        assert_eq!(recorder.events.last().unwrap(), "end {http://example.com/app}roads");
    }

    #[test]
    fn test_empty_element_reports_start_and_end() {
        let mut recorder = Recorder::default();
        parse_str("<a><b x=\"1\"/></a>", &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec!["start a []", "start b [x=1]", "end b", "end a"]
        );
    }

    #[test]
    fn test_stop_before_element() {
        let mut recorder = Recorder {
            stop_after: Some(2),
            ..Default::default()
        };
        let outcome = parse_str("<a><b/><c/><d/></a>", &mut recorder).unwrap();
        assert_eq!(outcome, ParseOutcome::Stopped);
        assert_eq!(recorder.started, 2);
    }

    #[test]
    fn test_unknown_prefix_is_an_error() {
        let mut recorder = Recorder::default();
        assert!(parse_str("<x:a/>", &mut recorder).is_err());
    }

    #[test]
    fn test_truncated_document_is_an_error() {
        let mut recorder = Recorder::default();
        assert!(parse_str("<a><b>", &mut recorder).is_err());
    }
}
