use std::collections::BTreeMap;

use ahash::{HashMap, HashMapExt};

use crate::namespace::{begins_with_xml, XML_NAMESPACE};

#[derive(Debug, Clone, PartialEq, Eq)]
struct MappedUri {
    uri: String,
    /// The empty default binding installed when the save started. It may
    /// be taken over by an invented default binding.
    initial: bool,
}

/// One binding change, with everything needed to undo it.
#[derive(Debug)]
struct Binding {
    prefix: String,
    uri: String,
    uri_prev_prefix: Option<String>,
    /// A URI that lost `prefix` through this binding, with the prefix it
    /// falls back to.
    renamed: Option<(String, Option<String>)>,
    prefix_prev_uri: Option<MappedUri>,
}

/// Namespace bindings in scope while saving.
///
/// Each element pushes a frame; the bindings recorded in a frame are the
/// declarations that element has to write. Popping a frame restores both
/// lookup directions exactly.
#[derive(Debug)]
pub(crate) struct NamespaceStack {
    frames: Vec<Vec<Binding>>,
    uri_map: HashMap<String, String>,
    prefix_map: HashMap<String, MappedUri>,
}

impl NamespaceStack {
    /// A stack with the base frame: `xml`, the implicit namespaces and, if
    /// those leave it unbound, the empty default namespace.
    pub(crate) fn new(implicit: &BTreeMap<String, String>) -> Self {
        let mut stack = Self {
            frames: vec![Vec::new()],
            uri_map: HashMap::new(),
            prefix_map: HashMap::new(),
        };
        stack.add_mapping("xml", XML_NAMESPACE);
        for (prefix, uri) in implicit {
            stack.add_mapping(prefix, uri);
        }
        if stack.uri_for_prefix("").is_none() {
            stack.bind("", "", true);
        }
        stack
    }

    pub(crate) fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub(crate) fn pop_frame(&mut self) {
        if self.frames.len() <= 1 {
            return;
        }
        let Some(frame) = self.frames.pop() else {
            return;
        };
        for binding in frame.into_iter().rev() {
            match binding.uri_prev_prefix {
                Some(prefix) => self.uri_map.insert(binding.uri, prefix),
                None => self.uri_map.remove(&binding.uri),
            };
            match binding.prefix_prev_uri {
                Some(mapped) => self.prefix_map.insert(binding.prefix, mapped),
                None => self.prefix_map.remove(&binding.prefix),
            };
            if let Some((uri, prefix)) = binding.renamed {
                match prefix {
                    Some(prefix) => self.uri_map.insert(uri, prefix),
                    None => self.uri_map.remove(&uri),
                };
            }
        }
    }

    /// The URI `prefix` is bound to.
    pub(crate) fn uri_for_prefix(&self, prefix: &str) -> Option<&str> {
        self.prefix_map.get(prefix).map(|m| m.uri.as_str())
    }

    /// The prefix `uri` is written with.
    pub(crate) fn prefix_for_uri(&self, uri: &str) -> Option<&str> {
        self.uri_map.get(uri).map(String::as_str)
    }

    /// A non-empty prefix bound to `uri`, for names that cannot use the
    /// default namespace.
    pub(crate) fn non_default_prefix(&self, uri: &str) -> Option<&str> {
        match self.prefix_for_uri(uri) {
            Some(prefix) if !prefix.is_empty() => return Some(prefix),
            _ => {}
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .map(|b| b.prefix.as_str())
            .find(|prefix| !prefix.is_empty() && self.uri_for_prefix(prefix) == Some(uri))
    }

    /// Whether a new binding may take `prefix`.
    pub(crate) fn is_free(&self, prefix: &str) -> bool {
        if begins_with_xml(prefix) {
            return false;
        }
        match self.prefix_map.get(prefix) {
            None => true,
            Some(mapped) => prefix.is_empty() && mapped.initial,
        }
    }

    /// Bindings made in the innermost frame, in order.
    pub(crate) fn frame_mappings(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.frames
            .last()
            .into_iter()
            .flat_map(|frame| frame.iter())
            .map(|b| (b.prefix.as_str(), b.uri.as_str()))
    }

    /// Take over a declaration found on the element being saved.
    ///
    /// Declarations binding a prefix to the empty URI are dropped, as is a
    /// non-empty default namespace when the element needs the default to be
    /// empty. A prefix is declared at most once per frame, and redundant
    /// declarations are skipped.
    pub(crate) fn declare(&mut self, prefix: &str, uri: &str, ensure_default_empty: bool) {
        if !(prefix.is_empty() || !uri.is_empty()) {
            return;
        }
        if ensure_default_empty && prefix.is_empty() && !uri.is_empty() {
            return;
        }
        if self.frame_mappings().any(|(p, _)| p == prefix) {
            return;
        }
        if self.uri_for_prefix(prefix) == Some(uri) {
            return;
        }
        self.add_mapping(prefix, uri);
    }

    pub(crate) fn add_mapping(&mut self, prefix: &str, uri: &str) {
        self.bind(prefix, uri, false);
    }

    fn bind(&mut self, prefix: &str, uri: &str, initial: bool) {
        // the URI currently holding `prefix` loses it, and falls back to the
        // most recent other prefix it had
        let rename_uri = self
            .uri_for_prefix(prefix)
            .filter(|current| *current != uri)
            .map(str::to_string);
        let renamed = rename_uri.map(|rename_uri| {
            let mut rename_prefix = None;
            for binding in self.frames.iter().rev().flat_map(|f| f.iter().rev()) {
                if binding.uri == rename_uri {
                    rename_prefix = binding.uri_prev_prefix.clone();
                    if rename_prefix.as_deref() != Some(prefix) {
                        break;
                    }
                }
            }
            (rename_uri, rename_prefix)
        });

        let binding = Binding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            uri_prev_prefix: self.uri_map.get(uri).cloned(),
            renamed: renamed
                .as_ref()
                .map(|(rename_uri, _)| (rename_uri.clone(), self.uri_map.get(rename_uri).cloned())),
            prefix_prev_uri: self.prefix_map.get(prefix).cloned(),
        };
        if let Some(frame) = self.frames.last_mut() {
            frame.push(binding);
        }

        self.uri_map.insert(uri.to_string(), prefix.to_string());
        self.prefix_map.insert(
            prefix.to_string(),
            MappedUri {
                uri: uri.to_string(),
                initial,
            },
        );
        if let Some((rename_uri, rename_prefix)) = renamed {
            match rename_prefix {
                Some(p) => self.uri_map.insert(rename_uri, p),
                None => self.uri_map.remove(&rename_uri),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> NamespaceStack {
        NamespaceStack::new(&BTreeMap::new())
    }

    #[test]
    fn test_base_frame() {
        let stack = stack();
        assert_eq!(stack.uri_for_prefix("xml"), Some(XML_NAMESPACE));
        assert_eq!(stack.uri_for_prefix(""), Some(""));
        assert!(stack.is_free(""));
        assert!(!stack.is_free("xml"));
        assert!(!stack.is_free("xmlfoo"));
        assert!(stack.is_free("a"));
    }

    #[test]
    fn test_pop_restores_bindings() {
        let mut stack = stack();
        stack.push_frame();
        stack.add_mapping("a", "urn:a");
        stack.push_frame();
        stack.add_mapping("a", "urn:b");
        assert_eq!(stack.uri_for_prefix("a"), Some("urn:b"));
        assert_eq!(stack.prefix_for_uri("urn:a"), None);
        stack.pop_frame();
        assert_eq!(stack.uri_for_prefix("a"), Some("urn:a"));
        assert_eq!(stack.prefix_for_uri("urn:a"), Some("a"));
        assert_eq!(stack.prefix_for_uri("urn:b"), None);
        stack.pop_frame();
        assert_eq!(stack.uri_for_prefix("a"), None);
        assert_eq!(stack.prefix_for_uri("urn:a"), None);
    }

    #[test]
    fn test_shadowed_uri_falls_back_to_older_prefix() {
        let mut stack = stack();
        stack.push_frame();
        stack.add_mapping("a", "urn:x");
        stack.push_frame();
        stack.add_mapping("b", "urn:x");
        assert_eq!(stack.prefix_for_uri("urn:x"), Some("b"));
        stack.push_frame();
        stack.add_mapping("b", "urn:y");
        // urn:x lost `b` and is written with `a` again
        assert_eq!(stack.prefix_for_uri("urn:x"), Some("a"));
        stack.pop_frame();
        assert_eq!(stack.prefix_for_uri("urn:x"), Some("b"));
        stack.pop_frame();
        assert_eq!(stack.prefix_for_uri("urn:x"), Some("a"));
    }

    #[test]
    fn test_declare_rules() {
        let mut stack = stack();
        stack.push_frame();
        stack.declare("p", "", false);
        stack.declare("", "urn:d", true);
        assert_eq!(stack.frame_mappings().count(), 0);
        stack.declare("p", "urn:p", false);
        stack.declare("p", "urn:q", false);
        assert_eq!(stack.frame_mappings().collect::<Vec<_>>(), vec![("p", "urn:p")]);
        stack.push_frame();
        stack.declare("p", "urn:p", false);
        assert_eq!(stack.frame_mappings().count(), 0);
    }

    #[test]
    fn test_initial_default_can_be_taken_over() {
        let mut stack = stack();
        stack.push_frame();
        stack.add_mapping("", "urn:d");
        assert!(!stack.is_free(""));
        stack.pop_frame();
        assert!(stack.is_free(""));
    }

    #[test]
    fn test_non_default_prefix() {
        let mut stack = stack();
        stack.push_frame();
        stack.add_mapping("p", "urn:x");
        stack.push_frame();
        stack.add_mapping("", "urn:x");
        assert_eq!(stack.prefix_for_uri("urn:x"), Some(""));
        assert_eq!(stack.non_default_prefix("urn:x"), Some("p"));
        assert_eq!(stack.non_default_prefix("urn:other"), None);
    }
}
