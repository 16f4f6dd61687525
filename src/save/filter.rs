use crate::name::ExpandedName;
use crate::store::{DocumentProperties, Node, Store};

use super::cursor::{SaveCursor, SaveKind};

/// Hides processing instructions with a given target.
pub(crate) struct FilterSaveCursor {
    inner: Box<dyn SaveCursor>,
    target: String,
}

impl FilterSaveCursor {
    pub(crate) fn new(inner: Box<dyn SaveCursor>, target: &str) -> Self {
        Self {
            inner,
            target: target.to_string(),
        }
    }

    fn is_filtered(&self, store: &Store) -> bool {
        self.inner.kind(store) == SaveKind::ProcessingInstruction
            && self
                .inner
                .name(store)
                .map_or(false, |name| name.local == self.target)
    }
}

impl SaveCursor for FilterSaveCursor {
    fn kind(&self, store: &Store) -> SaveKind {
        self.inner.kind(store)
    }

    fn name(&self, store: &Store) -> Option<ExpandedName> {
        self.inner.name(store)
    }

    fn node(&self) -> Node {
        self.inner.node()
    }

    fn next(&mut self, store: &Store) -> bool {
        if !self.inner.next(store) {
            return false;
        }
        while self.is_filtered(store) {
            self.inner.to_end(store);
            if !self.inner.next(store) {
                return false;
            }
        }
        true
    }

    fn to_end(&mut self, store: &Store) {
        self.inner.to_end(store)
    }

    fn to_first_attr(&mut self, store: &Store) -> bool {
        self.inner.to_first_attr(store)
    }

    fn to_next_attr(&mut self, store: &Store) -> bool {
        self.inner.to_next_attr(store)
    }

    fn push(&mut self) {
        self.inner.push()
    }

    fn pop(&mut self) {
        self.inner.pop()
    }

    fn chars<'a>(&'a self, store: &'a Store) -> &'a [char] {
        self.inner.chars(store)
    }

    fn is_text_cdata(&self, store: &Store) -> bool {
        self.inner.is_text_cdata(store)
    }

    fn ancestor_namespaces(&self) -> &[(String, String)] {
        self.inner.ancestor_namespaces()
    }

    fn document_properties<'s>(&self, store: &'s Store) -> Option<&'s DocumentProperties> {
        self.inner.document_properties(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::cursor::DocSaveCursor;

    #[test]
    fn test_skips_matching_target() {
        let mut store = Store::new();
        let root = store.parse("<a><?skip x?><?keep y?></a>").unwrap();
        let mut cursor = FilterSaveCursor::new(Box::new(DocSaveCursor::new(root)), "skip");
        assert!(cursor.next(&store));
        assert_eq!(cursor.kind(&store), SaveKind::Element);
        assert!(cursor.next(&store));
        assert_eq!(cursor.kind(&store), SaveKind::ProcessingInstruction);
        assert_eq!(cursor.name(&store).unwrap().local, "keep");
    }

    #[test]
    fn test_element_with_only_filtered_content_is_empty() {
        let mut store = Store::new();
        let root = store.parse("<a><?skip?></a>").unwrap();
        let mut cursor = FilterSaveCursor::new(Box::new(DocSaveCursor::new(root)), "skip");
        cursor.next(&store);
        assert!(!cursor.has_children(&store));
    }
}
