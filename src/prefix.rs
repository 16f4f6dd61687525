//! Interned namespace prefixes.
//!
//! A prefix stored with a name is only a hint: the saver writes it when it
//! is bound to the name's namespace at that point and otherwise picks
//! another one. The empty prefix is interned first.
use crate::idmap::{IdIndex, IdMap};

/// Id of an interned prefix, used as the prefix hint of a
/// [`QName`](crate::QName).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Ord, PartialOrd)]
pub struct PrefixId(u16);

impl IdIndex<PrefixId> for PrefixId {
    fn to_id(index: usize) -> PrefixId {
        PrefixId(index as u16)
    }

    fn from_id(id: PrefixId) -> usize {
        id.0 as usize
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub(crate) struct Prefix(String);

impl Prefix {
    pub(crate) fn new(prefix: &str) -> Self {
        Self(prefix.to_string())
    }

    pub(crate) fn get(&self) -> &str {
        &self.0
    }
}

pub(crate) type PrefixLookup = IdMap<PrefixId, Prefix>;

#[cfg(test)]
mod tests {
    use crate::Store;

    #[test]
    fn test_prefix_hint_interning() {
        let mut store = Store::new();
        let p = store.add_prefix("p");
        assert_eq!(store.add_prefix("p"), p);
        assert_ne!(p, store.empty_prefix());
        assert_eq!(store.prefix_str(p), "p");
        assert_eq!(store.prefix_str(store.empty_prefix()), "");
    }
}
