//! Event-stream document surgery: removing `Signature` subtrees and
//! inserting the freshly assembled signature into the document root.

use quick_xml::events::{BytesEnd, Event};
use quick_xml::{Reader, Writer};
use std::io::{Cursor, Write as _};

use crate::dsig::{Error, Result};

/// Remove every element with local name `Signature` from the document.
///
/// This is the enveloped-signature transform. Removal is deliberately broad:
/// all matching elements anywhere in the tree go, not just a signature
/// scoped to the insertion point, so a re-signed document can never carry a
/// stale signature. Untouched content round-trips byte-exactly.
pub fn strip_signatures(xml: impl AsRef<str>) -> Result<String> {
    let mut reader = Reader::from_str(xml.as_ref());
    reader.config_mut().trim_text(false);

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut skip_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if skip_depth > 0 {
                    skip_depth += 1;
                } else if e.name().local_name().as_ref() == b"Signature" {
                    skip_depth = 1;
                } else {
                    writer.write_event(Event::Start(e))?;
                }
            }
            Ok(Event::End(e)) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                } else {
                    writer.write_event(Event::End(e))?;
                }
            }
            Ok(Event::Empty(e)) => {
                if skip_depth == 0 && e.name().local_name().as_ref() != b"Signature" {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(e) => {
                if skip_depth == 0 {
                    writer.write_event(e)?;
                }
            }
            Err(e) => return Err(Error::Xml(e.to_string())),
        }
        buf.clear();
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

/// Insert `fragment` as the last child of the document root element.
///
/// An empty-element root is expanded so the fragment has somewhere to live.
/// Fails with [`Error::Insertion`] when the document has no root element.
pub fn insert_into_root(xml: impl AsRef<str>, fragment: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml.as_ref());
    reader.config_mut().trim_text(false);

    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut inserted = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                writer.write_event(Event::Start(e))?;
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                if depth == 0 && !inserted {
                    writer.get_mut().write_all(fragment.as_bytes())?;
                    inserted = true;
                }
                writer.write_event(Event::End(e))?;
            }
            Ok(Event::Empty(e)) if depth == 0 && !inserted => {
                // Empty root element: expand it to hold the fragment
                let name = String::from_utf8(e.name().as_ref().to_vec())?;
                writer.write_event(Event::Start(e.borrow()))?;
                writer.get_mut().write_all(fragment.as_bytes())?;
                writer.write_event(Event::End(BytesEnd::new(name)))?;
                inserted = true;
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(Error::Xml(e.to_string())),
        }
        buf.clear();
    }

    if !inserted {
        return Err(Error::Insertion(
            "Document has no root element to attach the signature to".into(),
        ));
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_signature_subtree() {
        let xml = r#"<root><a>1</a><Signature><SignedInfo/></Signature></root>"#;
        let result = strip_signatures(xml).unwrap();
        assert_eq!(result, "<root><a>1</a></root>");
    }

    #[test]
    fn strip_removes_all_signatures() {
        let xml = r#"<root><Signature>a</Signature><x/><ds:Signature xmlns:ds="urn:d">b</ds:Signature></root>"#;
        let result = strip_signatures(xml).unwrap();
        assert_eq!(result, "<root><x/></root>");
    }

    #[test]
    fn strip_handles_nested_signature_elements() {
        let xml = "<root><Signature><Signature>inner</Signature>outer</Signature><keep>x</keep></root>";
        let result = strip_signatures(xml).unwrap();
        assert_eq!(result, "<root><keep>x</keep></root>");
    }

    #[test]
    fn strip_removes_empty_signature_element() {
        let result = strip_signatures("<root><Signature/><a>1</a></root>").unwrap();
        assert_eq!(result, "<root><a>1</a></root>");
    }

    #[test]
    fn strip_is_identity_without_signatures() {
        let xml = "<root>\n  <child attr=\"v\">hi</child>\n</root>";
        assert_eq!(strip_signatures(xml).unwrap(), xml);
    }

    #[test]
    fn insert_appends_as_last_child_of_root() {
        let result = insert_into_root("<root><a>1</a></root>", "<sig/>").unwrap();
        assert_eq!(result, "<root><a>1</a><sig/></root>");
    }

    #[test]
    fn insert_expands_empty_root() {
        let result = insert_into_root("<root/>", "<sig/>").unwrap();
        assert_eq!(result, "<root><sig/></root>");
    }

    #[test]
    fn insert_targets_root_not_nested_elements() {
        let result = insert_into_root("<root><a><b/></a></root>", "<sig/>").unwrap();
        assert_eq!(result, "<root><a><b/></a><sig/></root>");
    }

    #[test]
    fn insert_fails_without_root_element() {
        let err = insert_into_root("<!-- nothing here -->", "<sig/>").unwrap_err();
        assert!(matches!(err, Error::Insertion(_)));
    }
}
