use crate::idmap::{IdIndex, IdMap};
use crate::namespace::NamespaceId;
use crate::prefix::PrefixId;

/// Id of an interned (namespace, local name) pair.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct NameId(u16);

impl IdIndex<NameId> for NameId {
    fn to_id(index: usize) -> NameId {
        NameId(index as u16)
    }

    fn from_id(id: NameId) -> usize {
        id.0 as usize
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub(crate) struct Name {
    pub(crate) local: String,
    pub(crate) namespace_id: NamespaceId,
}

impl Name {
    pub(crate) fn new(local: &str, namespace_id: NamespaceId) -> Self {
        Self {
            local: local.to_string(),
            namespace_id,
        }
    }
}

pub(crate) type NameLookup = IdMap<NameId, Name>;

/// A qualified name as stored on a node: the expanded name plus the prefix
/// the node was created or parsed with.
///
/// The prefix is only a hint; the saver picks the prefix that is actually
/// written.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct QName {
    pub name: NameId,
    pub prefix: PrefixId,
}

impl QName {
    pub fn new(name: NameId, prefix: PrefixId) -> Self {
        Self { name, prefix }
    }
}

/// An owned expanded name, used where names come from configuration
/// rather than from a store.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpandedName {
    pub namespace: String,
    pub local: String,
    pub prefix: String,
}

impl ExpandedName {
    pub fn new(namespace: &str, local: &str, prefix: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            local: local.to_string(),
            prefix: prefix.to_string(),
        }
    }
}
