use tracing::debug;

use crate::namespace::{begins_with_xml, generated_prefixes, XMLNS_NAMESPACE, XML_NAMESPACE};
use crate::store::{Node, Store};

/// ## Namespace lookup
///
/// Namespace declarations are ordinary `xmlns` attributes. Lookups walk
/// from a node up through its ancestors; `xml` and `xmlns` are always
/// bound.
impl Store {
    /// The namespace URI `prefix` (empty for the default namespace) maps to
    /// at `node`.
    ///
    /// With `default_always_mapped`, an undeclared default namespace maps
    /// to the empty URI instead of `None`.
    pub fn namespace_for_prefix(
        &self,
        node: Node,
        prefix: &str,
        default_always_mapped: bool,
    ) -> Option<String> {
        match prefix {
            "xml" => return Some(XML_NAMESPACE.to_string()),
            "xmlns" => return Some(XMLNS_NAMESPACE.to_string()),
            _ => {}
        }
        match self.find_xmlns_for_prefix(node, prefix) {
            Some(decl) => Some(self.xmlns_uri(decl)),
            None if default_always_mapped && prefix.is_empty() => Some(String::new()),
            None => None,
        }
    }

    /// A prefix that maps to `uri` at `node`.
    ///
    /// An existing declaration is used when its prefix is not shadowed.
    /// Otherwise, with `create_if_missing`, a declaration is added to the
    /// nearest container, using `suggestion` when it is free. Returns `None`
    /// when no prefix is visible and none may be created.
    pub fn prefix_for_namespace(
        &mut self,
        node: Node,
        uri: &str,
        suggestion: Option<&str>,
        create_if_missing: bool,
    ) -> Option<String> {
        match uri {
            XML_NAMESPACE => return Some("xml".to_string()),
            XMLNS_NAMESPACE => return Some("xmlns".to_string()),
            _ => {}
        }
        let mut base = node;
        while !self.kind(base).is_container() {
            base = self.ensure_parent(base);
        }

        if uri.is_empty() {
            let default_is_empty = self
                .find_xmlns_for_prefix(base, "")
                .map_or(true, |decl| self.value_chars(decl).is_empty());
            if default_is_empty {
                return Some(String::new());
            }
            if !create_if_missing {
                return None;
            }
            self.declare_namespace(base, "", "");
            return Some(String::new());
        }

        for container in self.ancestors(base) {
            for decl in self.attributes(container).filter(|a| self.is_xmlns(*a)) {
                if self.value_chars(decl).iter().copied().eq(uri.chars())
                    && self.find_xmlns_for_prefix(base, self.xmlns_prefix(decl)) == Some(decl)
                {
                    return Some(self.xmlns_prefix(decl).to_string());
                }
            }
        }

        if !create_if_missing {
            return None;
        }
        let suggestion = suggestion.filter(|s| {
            !s.is_empty()
                && !begins_with_xml(s)
                && self.find_xmlns_for_prefix(base, s).is_none()
        });
        let prefix = match suggestion {
            Some(s) => s.to_string(),
            None => generated_prefixes()
                .find(|p| self.find_xmlns_for_prefix(base, p).is_none())
                .unwrap_or_default(),
        };
        self.declare_namespace(base, &prefix, uri);
        Some(prefix)
    }

    /// The closest `xmlns` attribute declaring `prefix`.
    pub(crate) fn find_xmlns_for_prefix(&self, node: Node, prefix: &str) -> Option<Node> {
        self.ancestors(node).find_map(|container| {
            self.attributes(container)
                .find(|a| self.is_xmlns(*a) && self.xmlns_prefix(*a) == prefix)
        })
    }

    fn declare_namespace(&mut self, container: Node, prefix: &str, uri: &str) {
        debug!(prefix, uri, "declaring namespace");
        let name = self.xmlns_qname(prefix);
        if let Err(err) = self.set_attribute(container, name, uri) {
            debug!(%err, "could not declare namespace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_for_prefix() {
        let mut store = Store::new();
        let root = store
            .parse(r#"<a xmlns:p="urn:p"><b xmlns:p="urn:q"><c/></b></a>"#)
            .unwrap();
        let a = store.document_element(root).unwrap();
        let b = store.first_child(a).unwrap();
        let c = store.first_child(b).unwrap();
        assert_eq!(store.namespace_for_prefix(c, "p", false).as_deref(), Some("urn:q"));
        assert_eq!(store.namespace_for_prefix(a, "p", false).as_deref(), Some("urn:p"));
        assert_eq!(store.namespace_for_prefix(c, "", false), None);
        assert_eq!(store.namespace_for_prefix(c, "", true).as_deref(), Some(""));
        assert_eq!(
            store.namespace_for_prefix(c, "xml", false).as_deref(),
            Some(XML_NAMESPACE)
        );
    }

    #[test]
    fn test_shadowed_prefix_is_not_reused() {
        let mut store = Store::new();
        let root = store
            .parse(r#"<a xmlns:p="urn:p"><b xmlns:p="urn:q"/></a>"#)
            .unwrap();
        let a = store.document_element(root).unwrap();
        let b = store.first_child(a).unwrap();
        assert_eq!(store.prefix_for_namespace(a, "urn:p", None, false).as_deref(), Some("p"));
        assert_eq!(store.prefix_for_namespace(b, "urn:p", None, false), None);
        let created = store.prefix_for_namespace(b, "urn:p", Some("p"), true);
        assert_eq!(created.as_deref(), Some("ns1"));
        assert_eq!(store.namespace_for_prefix(b, "ns1", false).as_deref(), Some("urn:p"));
    }

    #[test]
    fn test_no_namespace_needs_default_undeclared() {
        let mut store = Store::new();
        let root = store.parse(r#"<a xmlns="urn:d"><b/></a>"#).unwrap();
        let a = store.document_element(root).unwrap();
        let b = store.first_child(a).unwrap();
        assert_eq!(store.prefix_for_namespace(b, "", None, false), None);
        assert_eq!(store.prefix_for_namespace(b, "", None, true).as_deref(), Some(""));
        assert_eq!(store.namespace_for_prefix(b, "", false).as_deref(), Some(""));
        assert_eq!(store.attributes(b).count(), 1);
    }
}
