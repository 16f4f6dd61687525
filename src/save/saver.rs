use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::Error;
use crate::name::ExpandedName;
use crate::namespace::generated_prefixes;
use crate::store::{Node, Store};

use super::cursor::{create_save_cursor, SaveCursor, SaveKind};
use super::namespaces::NamespaceStack;
use super::options::SaveOptions;

/// An attribute as it is written: namespace declarations are left out and
/// duplicate names are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SavedAttribute {
    pub(crate) name: ExpandedName,
    pub(crate) value: String,
}

pub(crate) struct ElementStart<'a> {
    pub(crate) name: &'a ExpandedName,
    pub(crate) attributes: &'a [SavedAttribute],
    /// The element has neither children nor text.
    pub(crate) is_empty: bool,
}

/// What an emitter can look at while writing a token.
pub(crate) struct EmitContext<'a> {
    pub(crate) store: &'a Store,
    pub(crate) cursor: &'a dyn SaveCursor,
    pub(crate) namespaces: &'a NamespaceStack,
}

/// Receives the tokens of a save, with namespaces already resolved.
///
/// The declarations an element has to write are the mappings of the
/// innermost frame of [`EmitContext::namespaces`].
pub(crate) trait Emitter {
    /// Write the start of an element. Returns `true` when the element was
    /// written as empty, in which case no end follows.
    fn emit_element(&mut self, cx: &EmitContext, element: &ElementStart) -> Result<bool, Error>;

    fn emit_finish(&mut self, cx: &EmitContext) -> Result<(), Error>;

    fn emit_text(&mut self, cx: &EmitContext) -> Result<(), Error>;

    fn emit_comment(&mut self, cx: &EmitContext) -> Result<(), Error>;

    fn emit_procinst(&mut self, cx: &EmitContext) -> Result<(), Error>;

    fn emit_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), Error>;

    fn emit_start_doc(&mut self, cx: &EmitContext) -> Result<(), Error>;

    fn emit_end_doc(&mut self, cx: &EmitContext) -> Result<(), Error>;

    /// Called whenever the saver invents a binding.
    fn synthetic_namespace(&mut self, _prefix: &str, _uri: &str, _consider_default: bool) {}
}

/// Drives a save cursor, keeps namespace scope and feeds an [`Emitter`].
///
/// Each call to [`Saver::process`] handles one token. The store must not
/// change while a save is in progress.
pub(crate) struct Saver {
    cursor: Box<dyn SaveCursor>,
    namespaces: NamespaceStack,
    version: u64,
    done: bool,
    suggested_prefixes: BTreeMap<String, String>,
    use_default_namespace: bool,
    precomputed: Option<Vec<(String, String)>>,
    ancestor_namespaces: Option<Vec<(String, String)>>,
}

impl Saver {
    pub(crate) fn new(store: &Store, node: Node, options: &SaveOptions) -> Result<Self, Error> {
        let precomputed = if options.aggressive_namespaces {
            let mut scan_options = options.clone();
            scan_options.aggressive_namespaces = false;
            let mut scan = Saver::new(store, node, &scan_options)?;
            let mut collector = SynthNamespaceEmitter::default();
            while scan.process(store, &mut collector)? {}
            debug!(count = collector.namespaces.len(), "precomputed namespaces");
            Some(collector.namespaces)
        } else {
            None
        };

        let cursor = create_save_cursor(store, node, options);
        let ancestor_namespaces = Some(cursor.ancestor_namespaces().to_vec());
        Ok(Self {
            cursor,
            namespaces: NamespaceStack::new(&options.implicit_namespaces),
            version: store.version(),
            done: false,
            suggested_prefixes: options.suggested_prefixes.clone(),
            use_default_namespace: options.use_default_namespace,
            precomputed,
            ancestor_namespaces,
        })
    }

    fn context<'a>(&'a self, store: &'a Store) -> EmitContext<'a> {
        EmitContext {
            store,
            cursor: self.cursor.as_ref(),
            namespaces: &self.namespaces,
        }
    }

    /// Handle the next token. Returns `false` once the save is complete.
    pub(crate) fn process(
        &mut self,
        store: &Store,
        emitter: &mut dyn Emitter,
    ) -> Result<bool, Error> {
        if self.done {
            return Ok(false);
        }
        if self.version != store.version() {
            warn!("document changed during save");
            return Err(Error::DocumentChanged);
        }

        match self.cursor.kind(store) {
            SaveKind::Root => self.process_root(store, emitter)?,
            SaveKind::Element => self.process_element(store, emitter)?,
            SaveKind::EndElement => {
                emitter.emit_finish(&self.context(store))?;
                self.namespaces.pop_frame();
            }
            SaveKind::Text => emitter.emit_text(&self.context(store))?,
            SaveKind::Comment => {
                emitter.emit_comment(&self.context(store))?;
                self.cursor.to_end(store);
            }
            SaveKind::ProcessingInstruction => {
                emitter.emit_procinst(&self.context(store))?;
                self.cursor.to_end(store);
            }
            SaveKind::EndRoot => {
                emitter.emit_end_doc(&self.context(store))?;
                self.done = true;
                return Ok(true);
            }
            SaveKind::Attribute | SaveKind::EndLeaf => {}
        }

        self.cursor.next(store);
        Ok(true)
    }

    fn process_root(&mut self, store: &Store, emitter: &mut dyn Emitter) -> Result<(), Error> {
        let properties = self.cursor.document_properties(store);
        let system_id = properties.and_then(|p| p.doctype_system_id.clone());
        let public_id = properties.and_then(|p| p.doctype_public_id.clone());
        let mut doctype_name = properties.and_then(|p| p.doctype_name.clone());

        if system_id.is_some() || doctype_name.is_some() {
            if doctype_name.is_none() {
                doctype_name = self.first_element_name(store).map(|name| name.local);
            }
            if let Some(doctype_name) = doctype_name {
                let root_name = match self.cursor.name(store) {
                    Some(name) => Some(name),
                    None => self.first_element_name(store),
                };
                // a DOCTYPE naming another element than the one saved is
                // left out
                if root_name.map_or(false, |name| name.local == doctype_name) {
                    return emitter.emit_doctype(
                        &doctype_name,
                        public_id.as_deref(),
                        system_id.as_deref(),
                    );
                }
            }
        }

        emitter.emit_start_doc(&self.context(store))
    }

    fn first_element_name(&mut self, store: &Store) -> Option<ExpandedName> {
        self.cursor.push();
        let mut found = None;
        while self.cursor.next(store) {
            match self.cursor.kind(store) {
                SaveKind::Element => {
                    found = self.cursor.name(store);
                    break;
                }
                SaveKind::Comment | SaveKind::ProcessingInstruction => {
                    self.cursor.to_end(store)
                }
                SaveKind::EndElement | SaveKind::EndRoot => break,
                _ => {}
            }
        }
        self.cursor.pop();
        found
    }

    fn process_element(&mut self, store: &Store, emitter: &mut dyn Emitter) -> Result<(), Error> {
        let Some(name) = self.cursor.name(store) else {
            return Err(Error::UnexpectedKind(self.cursor.node()));
        };

        // an element without namespace forces the default namespace to be
        // empty
        let ensure_default_empty = name.namespace.is_empty();
        self.push_mappings(store, ensure_default_empty);

        self.ensure_mapping(
            emitter,
            &name.namespace,
            &name.prefix,
            !ensure_default_empty,
            false,
        );

        let mut attributes: Vec<SavedAttribute> = Vec::new();
        self.cursor.push();
        let mut more = self.cursor.to_first_attr(store);
        while more {
            let attribute = self.cursor.node();
            if !store.is_xmlns(attribute) {
                if let Some(attribute_name) = self.cursor.name(store) {
                    let duplicate = attributes.iter().any(|a| {
                        a.name.namespace == attribute_name.namespace
                            && a.name.local == attribute_name.local
                    });
                    if !duplicate {
                        self.ensure_mapping(
                            emitter,
                            &attribute_name.namespace,
                            &attribute_name.prefix,
                            false,
                            true,
                        );
                        attributes.push(SavedAttribute {
                            name: attribute_name,
                            value: store.text_content(attribute),
                        });
                    }
                }
            }
            more = self.cursor.to_next_attr(store);
        }
        self.cursor.pop();

        // precomputed namespaces all go on the first element
        if let Some(precomputed) = self.precomputed.take() {
            for (uri, prefix) in &precomputed {
                let consider_default = prefix.is_empty() && !ensure_default_empty;
                self.ensure_mapping(emitter, uri, prefix, consider_default, false);
            }
        }

        let is_empty = !self.cursor.has_children(store) && !self.cursor.has_text(store);
        let element = ElementStart {
            name: &name,
            attributes: &attributes,
            is_empty,
        };
        if emitter.emit_element(&self.context(store), &element)? {
            self.namespaces.pop_frame();
            self.cursor.to_end(store);
        }
        Ok(())
    }

    fn push_mappings(&mut self, store: &Store, ensure_default_empty: bool) {
        self.namespaces.push_frame();

        self.cursor.push();
        let mut more = self.cursor.to_first_attr(store);
        while more {
            let attribute = self.cursor.node();
            if store.is_xmlns(attribute) {
                self.namespaces.declare(
                    store.xmlns_prefix(attribute),
                    &store.xmlns_uri(attribute),
                    ensure_default_empty,
                );
            }
            more = self.cursor.to_next_attr(store);
        }
        self.cursor.pop();

        if let Some(ancestor_namespaces) = self.ancestor_namespaces.take() {
            for (prefix, uri) in &ancestor_namespaces {
                self.namespaces.declare(prefix, uri, ensure_default_empty);
            }
        }

        if ensure_default_empty
            && self
                .namespaces
                .uri_for_prefix("")
                .map_or(false, |uri| !uri.is_empty())
        {
            self.namespaces.add_mapping("", "");
        }
    }

    /// Make sure `uri` has a binding, inventing one if needed.
    ///
    /// Candidates are tried in order: `candidate`, the suggested prefix for
    /// `uri`, the default namespace (when `consider_default` and the options
    /// allow it) and finally generated prefixes.
    fn ensure_mapping(
        &mut self,
        emitter: &mut dyn Emitter,
        uri: &str,
        candidate: &str,
        consider_default: bool,
        must_have_prefix: bool,
    ) {
        if uri.is_empty() {
            return;
        }
        if let Some(prefix) = self.namespaces.prefix_for_uri(uri) {
            if !prefix.is_empty() || !must_have_prefix {
                return;
            }
        }

        let prefix = if !candidate.is_empty() && self.namespaces.is_free(candidate) {
            candidate.to_string()
        } else if let Some(suggested) = self
            .suggested_prefixes
            .get(uri)
            .filter(|p| self.namespaces.is_free(p))
        {
            suggested.clone()
        } else if consider_default && self.use_default_namespace && self.namespaces.is_free("") {
            String::new()
        } else {
            generated_prefixes()
                .find(|p| self.namespaces.is_free(p))
                .unwrap_or_default()
        };

        debug!(prefix = prefix.as_str(), uri, "declaring namespace");
        emitter.synthetic_namespace(&prefix, uri, consider_default);
        self.namespaces.add_mapping(&prefix, uri);
    }
}

/// The prefix `name` is written with.
///
/// The name's own prefix is kept when it is bound to the right namespace.
/// Attributes (`needs_prefix`) never use the default namespace.
pub(crate) fn resolved_prefix<'a>(
    namespaces: &'a NamespaceStack,
    name: &'a ExpandedName,
    needs_prefix: bool,
) -> Result<&'a str, Error> {
    if name.namespace.is_empty() {
        return Ok("");
    }
    let mut prefix = if namespaces.uri_for_prefix(&name.prefix) == Some(name.namespace.as_str()) {
        Some(name.prefix.as_str())
    } else {
        namespaces.prefix_for_uri(&name.namespace)
    };
    if needs_prefix && prefix == Some("") {
        prefix = namespaces.non_default_prefix(&name.namespace);
    }
    prefix.ok_or_else(|| Error::NoPrefixForNamespace(name.namespace.clone()))
}

/// `name` as written, `prefix:local` or just `local`.
pub(crate) fn prefixed_name(
    namespaces: &NamespaceStack,
    name: &ExpandedName,
    needs_prefix: bool,
) -> Result<String, Error> {
    let prefix = resolved_prefix(namespaces, name, needs_prefix)?;
    Ok(if prefix.is_empty() {
        name.local.clone()
    } else {
        format!("{}:{}", prefix, name.local)
    })
}

/// Records the bindings a save would invent, in first-seen order.
#[derive(Debug, Default)]
struct SynthNamespaceEmitter {
    namespaces: Vec<(String, String)>,
}

impl Emitter for SynthNamespaceEmitter {
    fn emit_element(&mut self, _cx: &EmitContext, _element: &ElementStart) -> Result<bool, Error> {
        Ok(false)
    }

    fn emit_finish(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }

    fn emit_text(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }

    fn emit_comment(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }

    fn emit_procinst(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }

    fn emit_doctype(
        &mut self,
        _name: &str,
        _public_id: Option<&str>,
        _system_id: Option<&str>,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn emit_start_doc(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }

    fn emit_end_doc(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }

    fn synthetic_namespace(&mut self, prefix: &str, uri: &str, consider_default: bool) {
        let prefix = if consider_default { "" } else { prefix };
        match self.namespaces.iter_mut().find(|(u, _)| u == uri) {
            Some(entry) => entry.1 = prefix.to_string(),
            None => self.namespaces.push((uri.to_string(), prefix.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precomputed_namespaces_in_order() {
        let mut store = Store::new();
        let root = store.new_root();
        let a_name = store.qname_ns("urn:a", "a", "");
        let b_name = store.qname_ns("urn:b", "b", "p");
        let a = store.new_element(a_name);
        let b = store.new_element(b_name);
        store.append_child(root, a).unwrap();
        store.append_child(a, b).unwrap();
        let c_name = store.qname_ns("urn:c", "c", "q");
        let c = store.new_attribute(c_name, "1");
        store.insert_attribute(b, c).unwrap();

        let mut saver = Saver::new(&store, root, &SaveOptions::default()).unwrap();
        let mut collector = SynthNamespaceEmitter::default();
        while saver.process(&store, &mut collector).unwrap() {}
        // element namespaces may become the default, attribute ones may not
        assert_eq!(
            collector.namespaces,
            vec![
                ("urn:a".to_string(), "".to_string()),
                ("urn:b".to_string(), "".to_string()),
                ("urn:c".to_string(), "q".to_string())
            ]
        );
    }

    #[test]
    fn test_resolved_prefix_for_attribute_avoids_default() {
        let mut namespaces = NamespaceStack::new(&BTreeMap::new());
        namespaces.push_frame();
        namespaces.add_mapping("p", "urn:x");
        namespaces.push_frame();
        namespaces.add_mapping("", "urn:x");
        let name = ExpandedName::new("urn:x", "n", "");
        assert_eq!(resolved_prefix(&namespaces, &name, false).unwrap(), "");
        assert_eq!(resolved_prefix(&namespaces, &name, true).unwrap(), "p");
        let unbound = ExpandedName::new("urn:y", "n", "");
        assert!(matches!(
            resolved_prefix(&namespaces, &unbound, false),
            Err(Error::NoPrefixForNamespace(_))
        ));
    }
}
