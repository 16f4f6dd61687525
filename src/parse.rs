use ahash::HashMap;
use tracing::{debug, trace};
use xmlparser::{ElementEnd, EntityDefinition, ExternalId, StrSpan, Token, Tokenizer};

use crate::encoding::encoding;
use crate::entity::{normalize_attribute, normalize_newlines, parse_entities};
use crate::error::Error;
use crate::name::QName;
use crate::namespace::{XMLNS_NAMESPACE, XML_NAMESPACE};
use crate::store::{DocumentProperties, Node, NodeKind, Store};

/// Options that control loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LoadOptions {
    /// Bookmark text that came from CDATA sections, so that a saver can
    /// write it as CDATA again.
    pub cdata_bookmarks: bool,
    pub strip_comments: bool,
    pub strip_processing_instructions: bool,
    /// Drop text that consists of whitespace only.
    pub strip_whitespace: bool,
}

struct PendingElement<'a> {
    prefix: &'a str,
    local: &'a str,
    attributes: Vec<(&'a str, &'a str, StrSpan<'a>)>,
}

struct DocumentBuilder<'o> {
    options: &'o LoadOptions,
    root: Node,
    current: Node,
    open: Vec<(String, String)>,
    scopes: Vec<HashMap<String, String>>,
    properties: DocumentProperties,
    has_properties: bool,
}

impl<'o> DocumentBuilder<'o> {
    fn new(store: &mut Store, options: &'o LoadOptions) -> Self {
        let root = store.new_root();
        DocumentBuilder {
            options,
            root,
            current: root,
            open: Vec::new(),
            scopes: Vec::new(),
            properties: DocumentProperties::default(),
            has_properties: false,
        }
    }

    fn namespace_for_prefix(&self, prefix: &str) -> Option<&str> {
        match prefix {
            "xml" => return Some(XML_NAMESPACE),
            "xmlns" => return Some(XMLNS_NAMESPACE),
            _ => {}
        }
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(prefix))
            .map(|uri| uri.as_str())
            .or(if prefix.is_empty() { Some("") } else { None })
    }

    fn resolve(
        &self,
        store: &mut Store,
        prefix: &str,
        local: &str,
        is_attribute: bool,
    ) -> Result<QName, Error> {
        if is_attribute && prefix.is_empty() {
            return Ok(store.qname(local));
        }
        let uri = self
            .namespace_for_prefix(prefix)
            .ok_or_else(|| Error::UnknownPrefix(prefix.to_string()))?
            .to_string();
        Ok(store.qname_ns(&uri, local, prefix))
    }

    fn attach(&self, store: &mut Store, node: Node) {
        self.current.get().append(node.get(), &mut store.arena);
    }

    fn element(&mut self, store: &mut Store, pending: PendingElement) -> Result<Node, Error> {
        let mut scope = HashMap::default();
        let mut values = Vec::with_capacity(pending.attributes.len());
        for (prefix, local, value) in &pending.attributes {
            let value = normalize_attribute(value.as_str()).into_owned();
            let value = parse_entities(&value)?.into_owned();
            if *prefix == "xmlns" {
                scope.insert(local.to_string(), value.clone());
            } else if prefix.is_empty() && *local == "xmlns" {
                scope.insert(String::new(), value.clone());
            }
            values.push(value);
        }
        self.scopes.push(scope);

        let name = self.resolve(store, pending.prefix, pending.local, false)?;
        let element = store.new_element(name);
        self.attach(store, element);
        self.current = element;
        for ((prefix, local, _), value) in pending.attributes.iter().zip(values) {
            let attribute = if *prefix == "xmlns" {
                store.new_xmlns(local, &value)
            } else if prefix.is_empty() && *local == "xmlns" {
                store.new_xmlns("", &value)
            } else {
                let name = self.resolve(store, prefix, local, true)?;
                store.new_attribute(name, &value)
            };
            self.attach(store, attribute);
        }
        self.open
            .push((pending.prefix.to_string(), pending.local.to_string()));
        Ok(element)
    }

    fn close(&mut self, store: &Store, prefix: &str, local: &str) -> Result<(), Error> {
        let Some((open_prefix, open_local)) = self.open.pop() else {
            return Err(Error::InvalidCloseTag(String::new(), display_name(prefix, local)));
        };
        if open_prefix != prefix || open_local != local {
            return Err(Error::InvalidCloseTag(
                display_name(&open_prefix, &open_local),
                display_name(prefix, local),
            ));
        }
        self.scopes.pop();
        self.current = store.parent(self.current).unwrap_or(self.root);
        Ok(())
    }

    fn text(&self, store: &mut Store, text: &str, cdata: bool) -> Result<(), Error> {
        if self.current == self.root && !cdata {
            // text outside the document element is whitespace only
            if !text.chars().all(crate::chars::is_xml_space) {
                return Err(Error::InvalidStructure("text outside of the document element"));
            }
            return Ok(());
        }
        if self.options.strip_whitespace && text.chars().all(crate::chars::is_xml_space) {
            return Ok(());
        }
        let text = normalize_newlines(text);
        let at = if cdata {
            store.append_text(self.current, &text)
        } else {
            let text = parse_entities(&text)?;
            store.append_text(self.current, &text)
        };
        if cdata && self.options.cdata_bookmarks && !text.is_empty() {
            store.mark_cdata(at);
        }
        Ok(())
    }

    fn leaf(&self, store: &mut Store, kind: NodeKind, target: &str, content: &str) {
        let node = match kind {
            NodeKind::Comment => store.new_comment(content),
            _ => store.new_processing_instruction(target, content),
        };
        self.attach(store, node);
    }
}

fn display_name(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

/// ## Loading
impl Store {
    /// Parse a string containing an XML document into a new tree. Returns
    /// its root.
    ///
    /// ```rust
    /// let mut store = xmlstore::Store::new();
    /// let root = store.parse("<p>Example</p>").unwrap();
    /// let p = store.document_element(root).unwrap();
    /// assert_eq!(store.text_content(p), "Example");
    /// ```
    pub fn parse(&mut self, xml: &str) -> Result<Node, Error> {
        self.parse_with_options(xml, &LoadOptions::default())
    }

    /// Parse with [`LoadOptions`].
    pub fn parse_with_options(&mut self, xml: &str, options: &LoadOptions) -> Result<Node, Error> {
        let mut builder = DocumentBuilder::new(self, options);
        let mut pending: Option<PendingElement> = None;

        for token in Tokenizer::from(xml) {
            match token? {
                Token::Declaration {
                    version,
                    encoding,
                    standalone,
                    ..
                } => {
                    builder.properties.version = Some(version.as_str().to_string());
                    builder.properties.encoding = encoding.map(|e| e.as_str().to_string());
                    builder.properties.standalone = standalone;
                    builder.has_properties = true;
                }
                Token::DtdStart {
                    name, external_id, ..
                }
                | Token::EmptyDtd {
                    name, external_id, ..
                } => {
                    builder.properties.doctype_name = Some(name.as_str().to_string());
                    match external_id {
                        Some(ExternalId::System(system)) => {
                            builder.properties.doctype_system_id = Some(system.as_str().to_string());
                        }
                        Some(ExternalId::Public(public, system)) => {
                            builder.properties.doctype_public_id = Some(public.as_str().to_string());
                            builder.properties.doctype_system_id = Some(system.as_str().to_string());
                        }
                        None => {}
                    }
                    builder.has_properties = true;
                }
                Token::EntityDeclaration {
                    name,
                    definition: EntityDefinition::EntityValue(_),
                    ..
                } => {
                    debug!(name = name.as_str(), "ignoring internal entity declaration");
                }
                Token::EntityDeclaration { .. } | Token::DtdEnd { .. } => {}
                Token::ElementStart { prefix, local, .. } => {
                    pending = Some(PendingElement {
                        prefix: prefix.as_str(),
                        local: local.as_str(),
                        attributes: Vec::new(),
                    });
                }
                Token::Attribute {
                    prefix,
                    local,
                    value,
                    ..
                } => {
                    if let Some(pending) = pending.as_mut() {
                        pending
                            .attributes
                            .push((prefix.as_str(), local.as_str(), value));
                    }
                }
                Token::ElementEnd { end, .. } => match end {
                    ElementEnd::Open => {
                        if let Some(element) = pending.take() {
                            builder.element(self, element)?;
                        }
                    }
                    ElementEnd::Empty => {
                        if let Some(element) = pending.take() {
                            let (prefix, local) = (element.prefix, element.local);
                            builder.element(self, element)?;
                            builder.close(self, prefix, local)?;
                        }
                    }
                    ElementEnd::Close(prefix, local) => {
                        builder.close(self, prefix.as_str(), local.as_str())?;
                    }
                },
                Token::Text { text } => builder.text(self, text.as_str(), false)?,
                Token::Cdata { text, .. } => builder.text(self, text.as_str(), true)?,
                Token::Comment { text, .. } => {
                    if !options.strip_comments {
                        builder.leaf(self, NodeKind::Comment, "", text.as_str());
                    }
                }
                Token::ProcessingInstruction {
                    target, content, ..
                } => {
                    if !options.strip_processing_instructions {
                        builder.leaf(
                            self,
                            NodeKind::ProcessingInstruction,
                            target.as_str(),
                            content.map_or("", |c| c.as_str()),
                        );
                    }
                }
            }
        }
        if !builder.open.is_empty() {
            return Err(Error::UnclosedTag);
        }
        if builder.has_properties {
            self.set_document_properties(builder.root, builder.properties);
        }
        self.bump_version(true);
        trace!("parsed document");
        Ok(builder.root)
    }

    /// Parse bytes, detecting their encoding from a byte order mark or the
    /// XML declaration.
    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Result<Node, Error> {
        self.parse_bytes_with_options(bytes, &LoadOptions::default())
    }

    pub fn parse_bytes_with_options(
        &mut self,
        bytes: &[u8],
        options: &LoadOptions,
    ) -> Result<Node, Error> {
        let encoding = encoding(bytes, None)?;
        let (xml, used, had_errors) = encoding.decode(bytes);
        if had_errors {
            debug!(encoding = used.name(), "malformed input replaced while decoding");
        }
        self.parse_with_options(&xml, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{Position, Run};

    #[test]
    fn test_namespaces_resolved() {
        let mut store = Store::new();
        let root = store
            .parse(r#"<p:a xmlns:p="urn:p" xmlns="urn:d" p:x="1" y="2"><b/></p:a>"#)
            .unwrap();
        let a = store.document_element(root).unwrap();
        assert_eq!(store.namespace_uri(a), "urn:p");
        let b = store.first_child(a).unwrap();
        assert_eq!(store.namespace_uri(b), "urn:d");
        let attributes: Vec<_> = store
            .attributes(a)
            .filter(|n| !store.is_xmlns(*n))
            .map(|n| (store.namespace_uri(n).to_string(), store.local_name(n).to_string()))
            .collect();
        assert_eq!(
            attributes,
            vec![
                ("urn:p".to_string(), "x".to_string()),
                (String::new(), "y".to_string())
            ]
        );
    }

    #[test]
    fn test_unknown_prefix() {
        let mut store = Store::new();
        assert!(matches!(
            store.parse("<p:a/>"),
            Err(Error::UnknownPrefix(prefix)) if prefix == "p"
        ));
    }

    #[test]
    fn test_mismatched_close_tag() {
        let mut store = Store::new();
        assert!(matches!(
            store.parse("<a></b>"),
            Err(Error::InvalidCloseTag(open, close)) if open == "a" && close == "b"
        ));
    }

    #[test]
    fn test_entities_and_references() {
        let mut store = Store::new();
        let root = store.parse("<a t='&lt;&#x41;'>x &amp; y&#10;</a>").unwrap();
        let a = store.document_element(root).unwrap();
        assert_eq!(store.text_content(a), "x & y\n");
        let t = store.add_name("t");
        assert_eq!(store.attribute_value(a, t).as_deref(), Some("<A"));
    }

    #[test]
    fn test_cdata_bookmark() {
        let mut store = Store::new();
        let options = LoadOptions {
            cdata_bookmarks: true,
            ..Default::default()
        };
        let root = store
            .parse_with_options("<a>x<![CDATA[<y>]]></a>", &options)
            .unwrap();
        let a = store.document_element(root).unwrap();
        assert_eq!(store.text_content(a), "x<y>");
        assert!(store.is_cdata(Position::in_run(a, Run::Value, 1)));
        assert!(!store.is_cdata(Position::in_run(a, Run::Value, 0)));
    }

    #[test]
    fn test_strip_options() {
        let mut store = Store::new();
        let options = LoadOptions {
            strip_comments: true,
            strip_processing_instructions: true,
            strip_whitespace: true,
            ..Default::default()
        };
        let root = store
            .parse_with_options("<a>\n  <!--c--><?pi?>\n  <b> x </b>\n</a>", &options)
            .unwrap();
        assert_eq!(store.to_string(root).unwrap(), "<a><b> x </b></a>");
    }

    #[test]
    fn test_document_properties() {
        let mut store = Store::new();
        let root = store
            .parse(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><!DOCTYPE a PUBLIC "-//p" "a.dtd"><a/>"#,
            )
            .unwrap();
        let properties = store.document_properties(root).unwrap();
        assert_eq!(properties.version.as_deref(), Some("1.0"));
        assert_eq!(properties.standalone, Some(true));
        assert_eq!(properties.doctype_name.as_deref(), Some("a"));
        assert_eq!(properties.doctype_public_id.as_deref(), Some("-//p"));
        assert_eq!(properties.doctype_system_id.as_deref(), Some("a.dtd"));
    }

    #[test]
    fn test_parse_bytes_latin1() {
        let mut store = Store::new();
        let mut bytes = b"<?xml version=\"1.0\" encoding=\"iso-8859-1\"?><a>".to_vec();
        bytes.push(0xe9);
        bytes.extend_from_slice(b"</a>");
        let root = store.parse_bytes(&bytes).unwrap();
        assert_eq!(store.text_content(root), "\u{e9}");
    }

    #[test]
    fn test_unclosed() {
        let mut store = Store::new();
        assert!(store.parse("<a><b></b>").is_err());
    }
}
