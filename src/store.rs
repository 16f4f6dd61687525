use ahash::HashMap;
use indextree::{Arena, NodeId};

use crate::bookmark::Bookmark;
use crate::chars::{CharStore, TextRun};
use crate::cursor::{CursorId, CursorRegistry};
use crate::name::{ExpandedName, Name, NameId, NameLookup, QName};
use crate::namespace::{Namespace, NamespaceId, NamespaceLookup, FRAGMENT_NAMESPACE, XMLNS_NAMESPACE};
use crate::prefix::{Prefix, PrefixId, PrefixLookup};
use crate::typed::TypedValue;

/// The kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    /// Top of a document or fragment.
    Root,
    Element,
    /// An attribute, including namespace declarations.
    Attribute,
    Comment,
    ProcessingInstruction,
}

impl NodeKind {
    /// Roots and elements can hold attributes and content.
    #[inline]
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Element)
    }
}

/// A node in the XML tree.
/// This is a lightweight value and can be copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node(NodeId);

impl Node {
    #[inline]
    pub(crate) fn new(node_id: NodeId) -> Self {
        Node(node_id)
    }

    #[inline]
    pub(crate) fn get(&self) -> NodeId {
        self.0
    }
}

#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) name: Option<QName>,
    pub(crate) value: TextRun,
    pub(crate) after: TextRun,
    pub(crate) vacant: bool,
    pub(crate) bookmarks: Vec<Bookmark>,
    pub(crate) cursors: Vec<CursorId>,
    pub(crate) typed: Option<Box<dyn TypedValue>>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self {
            kind,
            name,
            value: TextRun::default(),
            after: TextRun::default(),
            vacant: false,
            bookmarks: Vec::new(),
            cursors: Vec::new(),
            typed: None,
        }
    }
}

/// Metadata recorded for a document: the XML declaration and doctype.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DocumentProperties {
    pub version: Option<String>,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
    pub doctype_name: Option<String>,
    pub doctype_public_id: Option<String>,
    pub doctype_system_id: Option<String>,
}

/// The `Store` owns one or more XML trees, the character data they
/// reference, and every cursor and bookmark placed on them.
///
/// All access goes through `&Store` or `&mut Store`; the borrow is the
/// exclusive-access guard. Mutations bump a version counter which savers
/// check between steps.
///
/// Store is implemented in several sections focusing on different aspects:
/// read access, text editing, structural manipulation, namespaces, loading
/// and saving.
pub struct Store {
    pub(crate) arena: Arena<NodeData>,
    pub(crate) chars: CharStore,
    pub(crate) cursors: CursorRegistry,
    pub(crate) namespace_lookup: NamespaceLookup,
    pub(crate) prefix_lookup: PrefixLookup,
    pub(crate) name_lookup: NameLookup,
    pub(crate) no_namespace_id: NamespaceId,
    pub(crate) xmlns_namespace_id: NamespaceId,
    pub(crate) empty_prefix_id: PrefixId,
    pub(crate) xmlns_prefix_id: PrefixId,
    pub(crate) fragment_name: QName,
    pub(crate) open_fragment_name: QName,
    pub(crate) document_properties: HashMap<Node, DocumentProperties>,
    version: u64,
    version_sans_text: u64,
}

impl Store {
    /// Create a new, empty `Store`.
    pub fn new() -> Self {
        let mut namespace_lookup = NamespaceLookup::new();
        let no_namespace_id = namespace_lookup.get_id_mut(Namespace::new(""));
        let xmlns_namespace_id = namespace_lookup.get_id_mut(Namespace::new(XMLNS_NAMESPACE));
        let fragment_namespace_id = namespace_lookup.get_id_mut(Namespace::new(FRAGMENT_NAMESPACE));
        let mut prefix_lookup = PrefixLookup::new();
        let empty_prefix_id = prefix_lookup.get_id_mut(Prefix::new(""));
        let xmlns_prefix_id = prefix_lookup.get_id_mut(Prefix::new("xmlns"));
        let frag_prefix_id = prefix_lookup.get_id_mut(Prefix::new("frag"));
        let mut name_lookup = NameLookup::new();
        let fragment_name = QName::new(
            name_lookup.get_id_mut(Name::new("xml-fragment", no_namespace_id)),
            empty_prefix_id,
        );
        let open_fragment_name = QName::new(
            name_lookup.get_id_mut(Name::new("fragment", fragment_namespace_id)),
            frag_prefix_id,
        );
        Store {
            arena: Arena::new(),
            chars: CharStore::new(),
            cursors: CursorRegistry::new(),
            namespace_lookup,
            prefix_lookup,
            name_lookup,
            no_namespace_id,
            xmlns_namespace_id,
            empty_prefix_id,
            xmlns_prefix_id,
            fragment_name,
            open_fragment_name,
            document_properties: HashMap::default(),
            version: 0,
            version_sans_text: 0,
        }
    }

    #[inline]
    pub(crate) fn data(&self, node: Node) -> &NodeData {
        self.arena[node.get()].get()
    }

    #[inline]
    pub(crate) fn data_mut(&mut self, node: Node) -> &mut NodeData {
        self.arena[node.get()].get_mut()
    }

    pub(crate) fn new_node(&mut self, kind: NodeKind, name: Option<QName>) -> Node {
        Node::new(self.arena.new_node(NodeData::new(kind, name)))
    }

    /// Version counter, incremented by every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Version counter that ignores pure text edits.
    pub fn structure_version(&self) -> u64 {
        self.version_sans_text
    }

    pub(crate) fn bump_version(&mut self, structural: bool) {
        self.version += 1;
        if structural {
            self.version_sans_text += 1;
        }
    }

    // Names

    /// Look up or intern a namespace URI.
    pub fn add_namespace(&mut self, uri: &str) -> NamespaceId {
        self.namespace_lookup.get_id_mut(Namespace::new(uri))
    }

    /// Look up a namespace URI without interning it.
    pub fn namespace(&self, uri: &str) -> Option<NamespaceId> {
        self.namespace_lookup.get_id(&Namespace::new(uri))
    }

    pub fn no_namespace(&self) -> NamespaceId {
        self.no_namespace_id
    }

    pub fn namespace_str(&self, namespace: NamespaceId) -> &str {
        self.namespace_lookup.get_value(namespace).get()
    }

    /// Look up or intern a prefix.
    pub fn add_prefix(&mut self, prefix: &str) -> PrefixId {
        self.prefix_lookup.get_id_mut(Prefix::new(prefix))
    }

    pub fn empty_prefix(&self) -> PrefixId {
        self.empty_prefix_id
    }

    pub fn prefix_str(&self, prefix: PrefixId) -> &str {
        self.prefix_lookup.get_value(prefix).get()
    }

    /// Intern a local name in no namespace.
    pub fn add_name(&mut self, local: &str) -> NameId {
        self.add_name_ns(local, self.no_namespace_id)
    }

    /// Intern a local name in a namespace.
    pub fn add_name_ns(&mut self, local: &str, namespace: NamespaceId) -> NameId {
        self.name_lookup.get_id_mut(Name::new(local, namespace))
    }

    /// Look up a name without interning it.
    pub fn name_ns(&self, local: &str, namespace: NamespaceId) -> Option<NameId> {
        self.name_lookup.get_id(&Name::new(local, namespace))
    }

    /// Build an unprefixed qualified name in no namespace.
    pub fn qname(&mut self, local: &str) -> QName {
        QName::new(self.add_name(local), self.empty_prefix_id)
    }

    /// Build a qualified name from its three parts.
    pub fn qname_ns(&mut self, namespace: &str, local: &str, prefix: &str) -> QName {
        let namespace = self.add_namespace(namespace);
        let name = self.add_name_ns(local, namespace);
        QName::new(name, self.add_prefix(prefix))
    }

    pub fn local_name_str(&self, name: NameId) -> &str {
        &self.name_lookup.get_value(name).local
    }

    pub fn name_namespace(&self, name: NameId) -> NamespaceId {
        self.name_lookup.get_value(name).namespace_id
    }

    /// Namespace URI of a name as a string.
    pub fn name_namespace_str(&self, name: NameId) -> &str {
        self.namespace_str(self.name_namespace(name))
    }

    /// Resolve a qualified name into owned strings.
    pub fn expanded_name(&self, name: QName) -> ExpandedName {
        ExpandedName::new(
            self.name_namespace_str(name.name),
            self.local_name_str(name.name),
            self.prefix_str(name.prefix),
        )
    }

    pub(crate) fn xmlns_qname(&mut self, prefix: &str) -> QName {
        let local = if prefix.is_empty() { "xmlns" } else { prefix };
        let name = self.add_name_ns(local, self.xmlns_namespace_id);
        QName::new(name, self.xmlns_prefix_id)
    }

    // Document properties

    /// Properties recorded for the document rooted at `root`.
    pub fn document_properties(&self, root: Node) -> Option<&DocumentProperties> {
        self.document_properties.get(&root)
    }

    pub fn set_document_properties(&mut self, root: Node, properties: DocumentProperties) {
        self.document_properties.insert(root, properties);
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
