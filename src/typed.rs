use std::fmt::Debug;

use tracing::trace;

use crate::position::{Pos, Position, Run};
use crate::store::{Node, Store};

/// A typed value attached to a node.
///
/// The store never interprets typed values. It asks them for text when a
/// vacant node has to be materialized, tells them when the text they were
/// built from changes, and lets go of them when their node is moved.
pub trait TypedValue: Debug + Send {
    /// Produce the lexical form of this value.
    fn build_text(&self) -> String;

    /// The node text changed underneath this value.
    fn invalidate_text(&mut self) {}

    /// The node was spliced out or moved; the value is dropped after this.
    fn disconnect(&mut self) {}
}

/// ## Typed values
impl Store {
    /// Attach a typed value to `node`.
    ///
    /// When `vacant` is set, the current value text is discarded and will
    /// be rebuilt from [`TypedValue::build_text`] the next time the text is
    /// needed.
    pub fn set_typed_value(&mut self, node: Node, value: Box<dyn TypedValue>, vacant: bool) {
        self.ensure_occupancy(node);
        if vacant && self.cch_value(node) > 0 {
            let len = self.cch_value(node);
            self.remove_value_run(node, len);
        }
        let data = self.data_mut(node);
        if let Some(mut old) = data.typed.replace(value) {
            old.disconnect();
        }
        data.vacant = vacant;
        self.bump_version(true);
    }

    /// Access the typed value attached to `node`, if any.
    pub fn typed_value(&self, node: Node) -> Option<&dyn TypedValue> {
        self.data(node).typed.as_deref()
    }

    /// Whether the text of `node` still has to be built from its typed
    /// value.
    pub fn is_vacant(&self, node: Node) -> bool {
        self.data(node).vacant
    }

    /// Materialize the text of a vacant node.
    pub fn ensure_occupancy(&mut self, node: Node) {
        if !self.data(node).vacant {
            return;
        }
        self.data_mut(node).vacant = false;
        let text = self
            .data(node)
            .typed
            .as_ref()
            .map(|t| t.build_text())
            .unwrap_or_default();
        trace!(len = text.len(), "materializing vacant node");
        let chars: Vec<char> = text.chars().collect();
        self.insert_value_run(node, 0, &chars);
    }

    /// Materialize every vacant node in the subtree of `node`.
    pub fn ensure_occupancy_deep(&mut self, node: Node) {
        let vacant: Vec<Node> = self
            .subtree(node)
            .filter(|n| self.data(*n).vacant)
            .collect();
        for n in vacant {
            self.ensure_occupancy(n);
        }
    }

    /// Materialize the vacant text that `position` can point into: the
    /// node's own text for its value run and end of content, the parent's
    /// for an after run.
    pub(crate) fn ensure_occupancy_at(&mut self, position: Position) {
        match position.pos {
            Pos::InRun {
                run: Run::Value, ..
            }
            | Pos::EndOfContent => self.ensure_occupancy(position.node),
            Pos::InRun { run: Run::After, .. } => {
                if let Some(parent) = self.parent(position.node) {
                    self.ensure_occupancy(parent);
                }
            }
            Pos::Before => {
                if let Some(slot) = self.denormalize(position) {
                    self.ensure_occupancy_at(slot.position());
                }
            }
        }
    }

    pub(crate) fn invalidate_text(&mut self, node: Node) {
        if let Some(typed) = self.data_mut(node).typed.as_mut() {
            typed.invalidate_text();
        }
    }

    pub(crate) fn disconnect_typed(&mut self, node: Node) {
        if self.data(node).typed.is_none() {
            return;
        }
        self.ensure_occupancy(node);
        if let Some(mut typed) = self.data_mut(node).typed.take() {
            typed.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[derive(Debug)]
    struct Number {
        value: i64,
        invalidated: Arc<AtomicUsize>,
    }

    impl TypedValue for Number {
        fn build_text(&self) -> String {
            self.value.to_string()
        }

        fn invalidate_text(&mut self) {
            self.invalidated.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_vacant_node_materializes_on_demand() {
        let mut store = Store::new();
        let root = store.parse("<a>old</a>").unwrap();
        let a = store.document_element(root).unwrap();
        let invalidated = Arc::new(AtomicUsize::new(0));
        store.set_typed_value(
            a,
            Box::new(Number {
                value: 42,
                invalidated: invalidated.clone(),
            }),
            true,
        );
        assert!(store.is_vacant(a));
        assert_eq!(store.cch_value(a), 0);
        store.ensure_occupancy(a);
        assert!(!store.is_vacant(a));
        assert_eq!(store.text_content(a), "42");
        assert_eq!(invalidated.load(Ordering::SeqCst), 0);
    }

    fn vacant_number(store: &mut Store, value: i64) -> Node {
        let root = store.parse("<a>old</a>").unwrap();
        let a = store.document_element(root).unwrap();
        store.set_typed_value(
            a,
            Box::new(Number {
                value,
                invalidated: Arc::new(AtomicUsize::new(0)),
            }),
            true,
        );
        a
    }

    #[test]
    fn test_edits_on_vacant_node_see_built_text() {
        let mut store = Store::new();
        let a = vacant_number(&mut store, 42);
        let removed = store.remove_chars(Position::in_run(a, Run::Value, 0), 1);
        assert_eq!(removed, "4");
        assert_eq!(store.text_content(a), "2");

        let b = vacant_number(&mut store, 42);
        store.insert_chars(Position::in_run(b, Run::Value, 1), "X");
        assert_eq!(store.text_content(b), "4X2");
        assert_eq!(store.cch_value(b), 3);

        let c = vacant_number(&mut store, 123);
        let to = Position::end_of_content(c);
        store.move_chars(Position::in_run(c, Run::Value, 0), 1, to);
        assert_eq!(store.text_content(c), "231");
    }

    #[test]
    fn test_cursor_and_bookmark_on_vacant_node() {
        let mut store = Store::new();
        let a = vacant_number(&mut store, 42);
        let cursor = store.attach_cursor(Position::in_run(a, Run::Value, 1));
        assert!(!store.is_vacant(a));
        store.cursor_insert_chars(cursor, "-");
        assert_eq!(store.text_content(a), "4-2");

        let b = vacant_number(&mut store, 7);
        store.mark_cdata(Position::in_run(b, Run::Value, 0));
        assert!(!store.is_vacant(b));
        assert!(store.is_cdata(Position::in_run(b, Run::Value, 0)));
    }

    #[test]
    fn test_text_change_invalidates() {
        let mut store = Store::new();
        let root = store.parse("<a>1</a>").unwrap();
        let a = store.document_element(root).unwrap();
        let invalidated = Arc::new(AtomicUsize::new(0));
        store.set_typed_value(
            a,
            Box::new(Number {
                value: 1,
                invalidated: invalidated.clone(),
            }),
            false,
        );
        store.append_text(a, "2");
        assert_eq!(invalidated.load(Ordering::SeqCst), 1);
        assert_eq!(store.text_content(a), "12");
    }

    #[test]
    fn test_move_disconnects() {
        let mut store = Store::new();
        let root = store.parse("<a><b/></a>").unwrap();
        let a = store.document_element(root).unwrap();
        let b = store.first_child(a).unwrap();
        store.set_typed_value(
            b,
            Box::new(Number {
                value: 7,
                invalidated: Arc::new(AtomicUsize::new(0)),
            }),
            true,
        );
        store.remove_node(b).unwrap();
        assert!(store.typed_value(b).is_none());
        assert_eq!(store.text_content(b), "7");
    }
}
