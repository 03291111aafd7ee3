//! Exclusive XML Canonicalization (<http://www.w3.org/2001/10/xml-exc-c14n#>).
//!
//! Deterministic byte serialization of an XML node-set: structurally
//! equivalent documents produce identical output regardless of attribute
//! order, namespace-declaration placement or empty-element notation. The
//! exclusive variant emits a namespace declaration only where it is visibly
//! utilized, so enveloped content does not drag in ancestor namespace noise.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::str;

use crate::dsig::{Error, Result};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Canonicalize an XML fragment, returning the canonical form as a string.
///
/// `inclusive_prefixes` is the `InclusiveNamespaces` prefix list of the
/// exclusive algorithm; prefixes named there are rendered wherever they are
/// in scope even without visible utilization. Enveloped signing passes
/// `None` (an empty list).
///
/// The XML declaration, DOCTYPE and comments are dropped; CDATA sections
/// collapse to escaped text; empty-element tags expand to start/end pairs.
/// Fails with [`Error::Canonicalization`] when a prefix used by an element
/// or attribute has no in-scope declaration.
pub fn canonicalize(xml: impl AsRef<str>, inclusive_prefixes: Option<&[&str]>) -> Result<String> {
    let mut reader = Reader::from_str(xml.as_ref());
    reader.config_mut().trim_text(false);
    reader.config_mut().expand_empty_elements = true;

    let inclusive: BTreeSet<String> = inclusive_prefixes
        .unwrap_or_default()
        .iter()
        .map(|p| p.to_string())
        .collect();

    let mut out = String::with_capacity(xml.as_ref().len());
    let mut scopes = ScopeStack::new();
    // Character data outside the document element is not part of the
    // canonical form; document-level PIs get newline separators.
    let mut depth = 0usize;
    let mut root_seen = false;

    loop {
        match reader.read_event().map_err(|e| Error::Xml(e.to_string()))? {
            Event::Start(e) => {
                write_start_tag(&mut out, &e, &mut scopes, &inclusive)?;
                depth += 1;
                root_seen = true;
            }
            Event::End(e) => {
                out.push_str("</");
                out.push_str(str::from_utf8(e.name().as_ref())?);
                out.push('>');
                scopes.pop();
                depth = depth.saturating_sub(1);
            }
            Event::Text(e) if depth > 0 => {
                let content = e.xml_content().map_err(|e| Error::Xml(e.to_string()))?;
                let normalized = normalize_line_endings(content.as_bytes());
                escape_text_into(&mut out, &normalized)?;
            }
            Event::CData(e) if depth > 0 => {
                let raw = e.into_inner();
                let normalized = normalize_line_endings(&raw);
                escape_text_into(&mut out, &normalized)?;
            }
            Event::GeneralRef(e) if depth > 0 => {
                out.push('&');
                out.push_str(str::from_utf8(&e)?);
                out.push(';');
            }
            Event::PI(e) => {
                let target = str::from_utf8(e.target())
                    .map_err(|_| Error::Canonicalization("Malformed processing instruction".into()))?;
                let content = str::from_utf8(e.content())
                    .map_err(|_| Error::Canonicalization("Malformed processing instruction".into()))?;
                if depth == 0 && root_seen {
                    out.push('\n');
                }
                out.push_str("<?");
                out.push_str(target);
                if !content.is_empty() {
                    out.push(' ');
                    out.push_str(content);
                }
                out.push_str("?>");
                if depth == 0 && !root_seen {
                    out.push('\n');
                }
            }
            // Dropped from the canonical form
            Event::Decl(_) | Event::DocType(_) | Event::Comment(_) => {}
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

/// Namespace context of the subtree being serialized: the declarations in
/// scope at each depth and the subset already rendered by an ancestor.
struct ScopeStack {
    declared: Vec<BTreeMap<String, String>>,
    rendered: Vec<BTreeMap<String, String>>,
}

impl ScopeStack {
    fn new() -> Self {
        Self {
            declared: vec![BTreeMap::new()],
            rendered: vec![BTreeMap::new()],
        }
    }

    fn declared(&self) -> &BTreeMap<String, String> {
        self.declared.last().expect("root scope always present")
    }

    fn rendered(&self) -> &BTreeMap<String, String> {
        self.rendered.last().expect("root scope always present")
    }

    fn push(&mut self, declared: BTreeMap<String, String>, rendered: BTreeMap<String, String>) {
        self.declared.push(declared);
        self.rendered.push(rendered);
    }

    fn pop(&mut self) {
        self.declared.pop();
        self.rendered.pop();
    }
}

/// Split a qualified name into (prefix, local name); prefix is empty for
/// unprefixed names.
fn split_qname(name: &str) -> (&str, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", name),
    }
}

fn write_start_tag(
    out: &mut String,
    e: &BytesStart,
    scopes: &mut ScopeStack,
    inclusive: &BTreeSet<String>,
) -> Result<()> {
    let name = str::from_utf8(e.name().as_ref())?.to_string();

    // Partition attribute nodes into namespace declarations and real
    // attributes, building this element's declaration scope.
    let mut declared = scopes.declared().clone();
    let mut attrs: Vec<(String, String)> = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        let key = str::from_utf8(attr.key.as_ref())?.to_string();
        if key == "xmlns" || key.starts_with("xmlns:") {
            let prefix = key.strip_prefix("xmlns:").unwrap_or("").to_string();
            let uri = str::from_utf8(&attr.value)?.to_string();
            if uri.is_empty() {
                declared.remove(&prefix);
            } else {
                declared.insert(prefix, uri);
            }
        } else {
            let value = attr.unescape_value()?.into_owned();
            attrs.push((key, value));
        }
    }

    // Visibly utilized prefixes: the element's own prefix (or the default
    // namespace for an unprefixed name) and every attribute prefix.
    let mut utilized = BTreeSet::new();
    utilized.insert(split_qname(&name).0.to_string());
    for (key, _) in &attrs {
        let (prefix, _) = split_qname(key);
        if !prefix.is_empty() && prefix != "xml" {
            utilized.insert(prefix.to_string());
        }
    }
    for prefix in inclusive {
        if declared.contains_key(prefix) {
            utilized.insert(prefix.clone());
        }
    }

    // Declarations to render here: utilized, resolvable, and not already
    // rendered identically by an ancestor inside the canonicalized subtree.
    let mut render: Vec<(String, String)> = Vec::new();
    for prefix in &utilized {
        if prefix == "xml" {
            continue;
        }
        match declared.get(prefix) {
            Some(uri) => {
                let already = scopes.rendered().get(prefix) == Some(uri);
                if !already {
                    render.push((prefix.clone(), uri.clone()));
                }
            }
            None if prefix.is_empty() => {
                // Unprefixed name with no default namespace in scope: the
                // element is in no namespace. If an ancestor rendered a
                // default declaration, it must be undeclared here.
                if scopes.rendered().get("").is_some_and(|uri| !uri.is_empty()) {
                    render.push((String::new(), String::new()));
                }
            }
            None => {
                return Err(Error::Canonicalization(format!(
                    "No namespace declaration in scope for prefix '{prefix}'"
                )));
            }
        }
    }
    render.sort_by(|a, b| a.0.cmp(&b.0));

    // Real attributes sort by (namespace URI, local name)
    let mut resolved_attrs: Vec<(String, String, String, String)> = Vec::new();
    for (key, value) in &attrs {
        let (prefix, local) = split_qname(key);
        let uri = if prefix.is_empty() {
            String::new()
        } else if prefix == "xml" {
            XML_NS.to_string()
        } else {
            declared.get(prefix).cloned().ok_or_else(|| {
                Error::Canonicalization(format!(
                    "No namespace declaration in scope for prefix '{prefix}'"
                ))
            })?
        };
        resolved_attrs.push((uri, local.to_string(), key.clone(), value.clone()));
    }
    resolved_attrs.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

    out.push('<');
    out.push_str(&name);
    for (prefix, uri) in &render {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attr_into(out, uri);
        out.push('"');
    }
    for (_, _, key, value) in &resolved_attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        escape_attr_into(out, value);
        out.push('"');
    }
    out.push('>');

    let mut rendered = scopes.rendered().clone();
    rendered.extend(render);
    scopes.push(declared, rendered);
    Ok(())
}

/// Normalize CRLF and lone CR to LF as the canonical form requires
fn normalize_line_endings(text: &[u8]) -> Cow<'_, [u8]> {
    if !text.contains(&b'\r') {
        return Cow::Borrowed(text);
    }

    let mut result = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        if text[i] == b'\r' {
            result.push(b'\n');
            if i + 1 < text.len() && text[i + 1] == b'\n' {
                i += 2;
            } else {
                i += 1;
            }
        } else {
            result.push(text[i]);
            i += 1;
        }
    }
    Cow::Owned(result)
}

/// Escape a text node per the canonical form
fn escape_text_into(out: &mut String, v: &[u8]) -> Result<()> {
    for ch in str::from_utf8(v)?.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
    Ok(())
}

/// Escape an attribute value per the canonical form
fn escape_attr_into(out: &mut String, v: &str) {
    for ch in v.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_canonicalization() {
        let xml = r#"<root><child attr="value">text</child></root>"#;
        let result = canonicalize(xml, None).unwrap();
        assert_eq!(result, r#"<root><child attr="value">text</child></root>"#);
    }

    #[test]
    fn xml_declaration_dropped() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?><root>x</root>"#;
        assert_eq!(canonicalize(xml, None).unwrap(), "<root>x</root>");
    }

    #[test]
    fn empty_element_expanded() {
        assert_eq!(canonicalize("<a><b/></a>", None).unwrap(), "<a><b></b></a>");
    }

    #[test]
    fn attributes_sorted_within_namespace() {
        let xml = r#"<root b="2" a="1" c="3">x</root>"#;
        let result = canonicalize(xml, None).unwrap();
        assert_eq!(result, r#"<root a="1" b="2" c="3">x</root>"#);
    }

    #[test]
    fn unprefixed_attributes_sort_before_namespaced() {
        // Empty namespace URI sorts before any non-empty URI
        let xml = r#"<root xmlns:n="urn:a" n:z="1" b="2">x</root>"#;
        let result = canonicalize(xml, None).unwrap();
        assert_eq!(result, r#"<root xmlns:n="urn:a" b="2" n:z="1">x</root>"#);
    }

    #[test]
    fn namespace_not_duplicated_on_descendants() {
        let xml = r#"<root xmlns="http://example.com"><child>text</child></root>"#;
        let result = canonicalize(xml, None).unwrap();
        assert_eq!(result.matches(r#"xmlns="http://example.com""#).count(), 1);
    }

    #[test]
    fn unused_prefix_suppressed() {
        // Exclusive mode: 'a' is declared but never utilized, so it vanishes
        let xml = r#"<root xmlns:a="http://a.com"><child>text</child></root>"#;
        let result = canonicalize(xml, None).unwrap();
        assert_eq!(result, "<root><child>text</child></root>");
    }

    #[test]
    fn prefix_utilized_by_element_rendered() {
        let xml = r#"<root xmlns:a="http://a.com"><a:child>text</a:child></root>"#;
        let result = canonicalize(xml, None).unwrap();
        assert!(result.contains(r#"<a:child xmlns:a="http://a.com">"#));
    }

    #[test]
    fn prefix_utilized_by_attribute_rendered() {
        let xml = r#"<root xmlns:a="http://a.com"><child a:attr="v">text</child></root>"#;
        let result = canonicalize(xml, None).unwrap();
        assert!(result.contains(r#"<child xmlns:a="http://a.com" a:attr="v">"#));
    }

    #[test]
    fn inclusive_prefix_list_forces_rendering() {
        let xml = r#"<root xmlns:a="http://a.com" xmlns:b="http://b.com"><child>text</child></root>"#;
        let result = canonicalize(xml, Some(&["a"])).unwrap();
        assert!(result.contains(r#"xmlns:a="http://a.com""#));
        assert!(!result.contains("xmlns:b"));
    }

    #[test]
    fn undeclared_prefix_is_an_error() {
        let err = canonicalize("<p:root>x</p:root>", None).unwrap_err();
        assert!(matches!(err, Error::Canonicalization(_)));
    }

    #[test]
    fn line_endings_normalized() {
        assert_eq!(
            &*normalize_line_endings(b"hello\r\nworld\rtest"),
            b"hello\nworld\ntest"
        );
    }

    #[test]
    fn cdata_collapses_to_text() {
        let xml = "<root><![CDATA[a < b & c]]></root>";
        let result = canonicalize(xml, None).unwrap();
        assert_eq!(result, "<root>a &lt; b &amp; c</root>");
    }

    #[test]
    fn attribute_value_escaping() {
        let xml = r#"<root attr="&lt;&quot;&#x9;&#xA;&#xD;">text</root>"#;
        let result = canonicalize(xml, None).unwrap();
        assert!(result.contains("&lt;&quot;&#x9;&#xA;&#xD;"));
    }

    #[test]
    fn comments_dropped() {
        let xml = "<root><!-- hidden -->text</root>";
        assert_eq!(canonicalize(xml, None).unwrap(), "<root>text</root>");
    }

    #[test]
    fn idempotent() {
        let xml = r#"<?xml version="1.0"?>
<root xmlns="urn:t" xmlns:u="urn:u"  b="2" a="1"><u:child/><child>hi</child></root>"#;
        let once = canonicalize(xml, None).unwrap();
        let twice = canonicalize(&once, None).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn whitespace_outside_root_dropped() {
        let xml = "<?xml version=\"1.0\"?>\n<root>x</root>\n";
        assert_eq!(canonicalize(xml, None).unwrap(), "<root>x</root>");
    }

    #[test]
    fn document_level_pi_separated_by_newlines() {
        let xml = "<?first one?><root>x</root><?last?>";
        assert_eq!(
            canonicalize(xml, None).unwrap(),
            "<?first one?>\n<root>x</root>\n<?last?>"
        );
    }

    #[test]
    fn default_namespace_undeclared_when_ancestor_rendered_it() {
        let xml = r#"<root xmlns="urn:t"><child xmlns="">x</child></root>"#;
        let result = canonicalize(xml, None).unwrap();
        assert_eq!(
            result,
            r#"<root xmlns="urn:t"><child xmlns="">x</child></root>"#
        );
    }

    #[test]
    fn whitespace_between_elements_preserved() {
        let xml = "<root>\n  <child>hi</child>\n</root>";
        let result = canonicalize(xml, None).unwrap();
        assert_eq!(result, "<root>\n  <child>hi</child>\n</root>");
    }
}
