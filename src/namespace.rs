use std::fmt::{Display, Formatter};

use crate::idmap::{IdIndex, IdMap};

/// The namespace bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
/// The namespace of namespace declaration attributes.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
/// Namespace of the open fragment wrapper element.
pub const FRAGMENT_NAMESPACE: &str = "http://www.openuri.org/fragment";

/// Id uniquely identifying a namespace URI.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NamespaceId(u16);

impl IdIndex<NamespaceId> for NamespaceId {
    fn to_id(index: usize) -> NamespaceId {
        NamespaceId(index as u16)
    }

    fn from_id(id: NamespaceId) -> usize {
        id.0 as usize
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub(crate) struct Namespace(String);

impl Namespace {
    pub(crate) fn new(uri: &str) -> Self {
        Self(uri.to_string())
    }

    pub(crate) fn get(&self) -> &str {
        &self.0
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) type NamespaceLookup = IdMap<NamespaceId, Namespace>;

/// True when `s` starts with `xml` in any letter case. Such prefixes are
/// reserved and never chosen for synthesized bindings.
pub(crate) fn begins_with_xml(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some('x' | 'X'), Some('m' | 'M'), Some('l' | 'L'))
    )
}

/// Prefixes handed out when a binding has to be invented: `ns1`, `ns2`, ...
pub(crate) fn generated_prefixes() -> impl Iterator<Item = String> {
    (1..).map(|i| format!("ns{}", i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begins_with_xml() {
        assert!(begins_with_xml("xml"));
        assert!(begins_with_xml("XmLfoo"));
        assert!(!begins_with_xml("xm"));
        assert!(!begins_with_xml("ns1"));
    }

    #[test]
    fn test_generated_prefixes() {
        let prefixes: Vec<String> = generated_prefixes().take(3).collect();
        assert_eq!(prefixes, vec!["ns1", "ns2", "ns3"]);
    }
}
