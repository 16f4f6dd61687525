use crate::name::QName;
use crate::position::Run;
use crate::store::{Node, NodeKind, Store};

/// ## Read-only access
///
/// Attributes are children of their element like any other node, but they
/// always come first. The public sibling and child accessors keep
/// attributes and content apart: [`Store::children`] never yields an
/// attribute and [`Store::attributes`] never yields content.
impl Store {
    /// The kind of a node.
    pub fn kind(&self, node: Node) -> NodeKind {
        self.data(node).kind
    }

    /// The qualified name of an element, attribute or processing instruction.
    pub fn node_name(&self, node: Node) -> Option<QName> {
        self.data(node).name
    }

    pub fn is_root(&self, node: Node) -> bool {
        self.kind(node) == NodeKind::Root
    }

    pub fn is_element(&self, node: Node) -> bool {
        self.kind(node) == NodeKind::Element
    }

    pub fn is_attribute(&self, node: Node) -> bool {
        self.kind(node) == NodeKind::Attribute
    }

    /// Whether `node` is a namespace declaration attribute.
    pub fn is_xmlns(&self, node: Node) -> bool {
        self.is_attribute(node)
            && self
                .node_name(node)
                .map_or(false, |q| self.name_namespace(q.name) == self.xmlns_namespace_id)
    }

    /// The prefix a namespace declaration binds; empty for `xmlns="..."`.
    pub fn xmlns_prefix(&self, node: Node) -> &str {
        match self.node_name(node) {
            Some(q) if self.is_xmlns(node) => {
                let local = self.local_name_str(q.name);
                if local == "xmlns" {
                    ""
                } else {
                    local
                }
            }
            _ => "",
        }
    }

    /// The namespace URI a namespace declaration binds.
    pub fn xmlns_uri(&self, node: Node) -> String {
        self.value_chars(node).iter().collect()
    }

    /// Check whether a node has been disposed.
    pub fn is_removed(&self, node: Node) -> bool {
        self.arena[node.get()].is_removed()
    }

    /// Get parent node. Attributes have their element as parent.
    ///
    /// Returns [`None`] for a root or a detached node.
    pub fn parent(&self, node: Node) -> Option<Node> {
        self.arena[node.get()].parent().map(Node::new)
    }

    pub(crate) fn first_raw_child(&self, node: Node) -> Option<Node> {
        self.arena[node.get()].first_child().map(Node::new)
    }

    pub(crate) fn last_raw_child(&self, node: Node) -> Option<Node> {
        self.arena[node.get()].last_child().map(Node::new)
    }

    pub(crate) fn next_raw_sibling(&self, node: Node) -> Option<Node> {
        self.arena[node.get()].next_sibling().map(Node::new)
    }

    pub(crate) fn previous_raw_sibling(&self, node: Node) -> Option<Node> {
        self.arena[node.get()].previous_sibling().map(Node::new)
    }

    /// First content (non-attribute) child.
    pub fn first_child(&self, node: Node) -> Option<Node> {
        match self.last_attribute(node) {
            Some(last_attr) => self.next_raw_sibling(last_attr),
            None => self.first_raw_child(node),
        }
    }

    /// Last content (non-attribute) child.
    pub fn last_child(&self, node: Node) -> Option<Node> {
        self.last_raw_child(node).filter(|n| !self.is_attribute(*n))
    }

    /// Next sibling of the same category: attributes only see attributes,
    /// content only sees content.
    pub fn next_sibling(&self, node: Node) -> Option<Node> {
        let next = self.next_raw_sibling(node)?;
        (self.is_attribute(next) == self.is_attribute(node)).then_some(next)
    }

    /// Previous sibling of the same category.
    pub fn previous_sibling(&self, node: Node) -> Option<Node> {
        let prev = self.previous_raw_sibling(node)?;
        (self.is_attribute(prev) == self.is_attribute(node)).then_some(prev)
    }

    /// Content children of a node in order.
    pub fn children(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        std::iter::successors(self.first_child(node), move |n| self.next_raw_sibling(*n))
    }

    /// Attributes of a node in order, including namespace declarations.
    pub fn attributes(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        std::iter::successors(self.first_attribute(node), move |n| self.next_sibling(*n))
    }

    pub fn first_attribute(&self, node: Node) -> Option<Node> {
        self.first_raw_child(node).filter(|n| self.is_attribute(*n))
    }

    /// The last attribute; it owns the container's leading text.
    pub fn last_attribute(&self, node: Node) -> Option<Node> {
        let mut attr = self.first_attribute(node)?;
        while let Some(next) = self.next_sibling(attr) {
            attr = next;
        }
        Some(attr)
    }

    /// Ancestors of a node, starting with the node itself.
    pub fn ancestors(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        node.get().ancestors(&self.arena).map(Node::new)
    }

    /// All nodes of the subtree in document order, attributes included,
    /// starting with `node`.
    pub fn subtree(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        node.get().descendants(&self.arena).map(Node::new)
    }

    /// Whether `node` lies in the subtree of `ancestor` (or is it).
    pub fn is_in_subtree(&self, node: Node, ancestor: Node) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// The topmost ancestor of a node.
    pub fn top(&self, node: Node) -> Node {
        self.ancestors(node).last().unwrap_or(node)
    }

    /// The single element child of a root, if the root holds exactly one.
    pub fn document_element(&self, root: Node) -> Option<Node> {
        let mut elements = self.children(root).filter(|n| self.is_element(*n));
        let first = elements.next()?;
        elements.next().is_none().then_some(first)
    }

    /// Whether a container has content children.
    pub fn has_children(&self, node: Node) -> bool {
        self.last_child(node).is_some()
    }

    /// Whether a container has leading text, that is text before its first
    /// content child or end.
    pub fn has_text(&self, node: Node) -> bool {
        if self.cch_value(node) > 0 {
            return true;
        }
        self.last_attribute(node)
            .map_or(false, |attr| self.cch_after(attr) > 0)
    }

    pub fn cch_value(&self, node: Node) -> usize {
        self.data(node).value.len()
    }

    pub fn cch_after(&self, node: Node) -> usize {
        self.data(node).after.len()
    }

    pub fn run_chars(&self, node: Node, run: Run) -> &[char] {
        let data = self.data(node);
        match run {
            Run::Value => self.chars.chars(&data.value),
            Run::After => self.chars.chars(&data.after),
        }
    }

    /// Characters of the value run.
    pub fn value_chars(&self, node: Node) -> &[char] {
        self.run_chars(node, Run::Value)
    }

    /// Characters of the after run.
    pub fn after_chars(&self, node: Node) -> &[char] {
        self.run_chars(node, Run::After)
    }

    /// Local name of the node, empty for nodes without a name.
    pub fn local_name(&self, node: Node) -> &str {
        self.node_name(node)
            .map_or("", |q| self.local_name_str(q.name))
    }

    /// Namespace URI of the node's name, empty for nodes without a name.
    pub fn namespace_uri(&self, node: Node) -> &str {
        self.node_name(node)
            .map_or("", |q| self.name_namespace_str(q.name))
    }

    /// Target of a processing instruction.
    pub fn target(&self, node: Node) -> Option<&str> {
        (self.kind(node) == NodeKind::ProcessingInstruction).then(|| self.local_name(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_skip_attributes() {
        let mut store = Store::new();
        let root = store.parse(r#"<a x="1" y="2"><b/><c/></a>"#).unwrap();
        let a = store.document_element(root).unwrap();
        let children: Vec<_> = store.children(a).map(|n| store.local_name(n)).collect();
        assert_eq!(children, vec!["b", "c"]);
        let attributes: Vec<_> = store.attributes(a).map(|n| store.local_name(n)).collect();
        assert_eq!(attributes, vec!["x", "y"]);
        let b = store.first_child(a).unwrap();
        assert_eq!(store.previous_sibling(b), None);
        let y = store.last_attribute(a).unwrap();
        assert_eq!(store.next_sibling(y), None);
    }

    #[test]
    fn test_xmlns_attributes() {
        let mut store = Store::new();
        let root = store
            .parse(r#"<a xmlns="urn:d" xmlns:p="urn:p"/>"#)
            .unwrap();
        let a = store.document_element(root).unwrap();
        let decls: Vec<_> = store
            .attributes(a)
            .filter(|n| store.is_xmlns(*n))
            .map(|n| (store.xmlns_prefix(n).to_string(), store.xmlns_uri(n)))
            .collect();
        assert_eq!(
            decls,
            vec![
                ("".to_string(), "urn:d".to_string()),
                ("p".to_string(), "urn:p".to_string())
            ]
        );
    }

    #[test]
    fn test_has_text() {
        let mut store = Store::new();
        let root = store.parse(r#"<r><a x="1">t</a><b>t</b><c><d/></c></r>"#).unwrap();
        let r = store.document_element(root).unwrap();
        let texts: Vec<_> = store.children(r).map(|n| store.has_text(n)).collect();
        assert_eq!(texts, vec![true, true, false]);
    }
}
