use crate::name::QName;
use crate::store::{Node, NodeKind, Store};

/// ## Creation
///
/// New nodes are detached. Place them with
/// [`Store::append_child`], [`Store::insert_before`],
/// [`Store::insert_attribute`] or [`Store::move_node`].
impl Store {
    /// Create a new root: the top of a document or fragment.
    pub fn new_root(&mut self) -> Node {
        self.new_node(NodeKind::Root, None)
    }

    /// Create a new element.
    ///
    /// ```rust
    /// let mut store = xmlstore::Store::new();
    /// let name = store.qname("p");
    /// let p = store.new_element(name);
    /// store.append_text(p, "hello");
    /// assert_eq!(store.to_string(p).unwrap(), "<p>hello</p>");
    /// ```
    pub fn new_element(&mut self, name: QName) -> Node {
        self.new_node(NodeKind::Element, Some(name))
    }

    /// Create a new attribute with a value.
    pub fn new_attribute(&mut self, name: QName, value: &str) -> Node {
        let node = self.new_node(NodeKind::Attribute, Some(name));
        self.set_initial_value(node, value);
        node
    }

    /// Create a namespace declaration binding `prefix` (empty for the
    /// default namespace) to `uri`.
    pub fn new_xmlns(&mut self, prefix: &str, uri: &str) -> Node {
        let name = self.xmlns_qname(prefix);
        self.new_attribute(name, uri)
    }

    /// Create a new comment.
    pub fn new_comment(&mut self, text: &str) -> Node {
        let node = self.new_node(NodeKind::Comment, None);
        self.set_initial_value(node, text);
        node
    }

    /// Create a new processing instruction.
    pub fn new_processing_instruction(&mut self, target: &str, data: &str) -> Node {
        let name = self.qname(target);
        let node = self.new_node(NodeKind::ProcessingInstruction, Some(name));
        self.set_initial_value(node, data);
        node
    }

    fn set_initial_value(&mut self, node: Node, text: &str) {
        let chars: Vec<char> = text.chars().collect();
        let run = self.chars.alloc(&chars);
        let data = self.data_mut(node);
        debug_assert!(data.value.is_empty());
        data.value = run;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_nodes_are_detached() {
        let mut store = Store::new();
        let name = store.qname("a");
        let a = store.new_attribute(name, "v");
        assert_eq!(store.parent(a), None);
        assert_eq!(store.value_chars(a), &['v']);
        let pi = store.new_processing_instruction("target", "data");
        assert_eq!(store.target(pi), Some("target"));
        let decl = store.new_xmlns("p", "urn:p");
        assert!(store.is_xmlns(decl));
        assert_eq!(store.xmlns_prefix(decl), "p");
        assert_eq!(store.xmlns_uri(decl), "urn:p");
    }
}
