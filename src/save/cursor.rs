use crate::chars::is_xml_space;
use crate::name::ExpandedName;
use crate::position::{Pos, Position, Run};
use crate::store::{DocumentProperties, Node, NodeKind, Store};
use crate::walk::{Token, Walker};

use super::filter::FilterSaveCursor;
use super::options::SaveOptions;
use super::pretty::PrettySaveCursor;

/// The token a save cursor is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaveKind {
    Root,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    EndRoot,
    EndElement,
    /// End of an attribute, comment or processing instruction.
    EndLeaf,
}

impl SaveKind {
    pub(crate) fn is_end(self) -> bool {
        matches!(
            self,
            SaveKind::EndRoot | SaveKind::EndElement | SaveKind::EndLeaf
        )
    }

    pub(crate) fn is_container(self) -> bool {
        matches!(self, SaveKind::Root | SaveKind::Element)
    }
}

impl From<Token> for SaveKind {
    fn from(token: Token) -> Self {
        match token {
            Token::Start(NodeKind::Root) => SaveKind::Root,
            Token::Start(NodeKind::Element) => SaveKind::Element,
            Token::Start(NodeKind::Attribute) => SaveKind::Attribute,
            Token::Start(NodeKind::Comment) => SaveKind::Comment,
            Token::Start(NodeKind::ProcessingInstruction) => SaveKind::ProcessingInstruction,
            Token::End(NodeKind::Root) => SaveKind::EndRoot,
            Token::End(NodeKind::Element) => SaveKind::EndElement,
            Token::End(_) => SaveKind::EndLeaf,
            Token::Text => SaveKind::Text,
        }
    }
}

/// The token stream a saver consumes.
///
/// Implementations present a document, a range of one, or another cursor
/// with tokens added or removed. `push` and `pop` save and restore the
/// complete cursor state, so a saver can look ahead.
pub(crate) trait SaveCursor {
    fn kind(&self, store: &Store) -> SaveKind;

    /// Name of the element, attribute or processing instruction the cursor
    /// is on.
    fn name(&self, store: &Store) -> Option<ExpandedName>;

    /// The store node under the cursor.
    fn node(&self) -> Node;

    fn next(&mut self, store: &Store) -> bool;

    /// Jump to the end of the current element, comment or processing
    /// instruction.
    fn to_end(&mut self, store: &Store);

    fn to_first_attr(&mut self, store: &Store) -> bool;

    fn to_next_attr(&mut self, store: &Store) -> bool;

    fn push(&mut self);

    fn pop(&mut self);

    /// The text at the cursor.
    fn chars<'a>(&'a self, store: &'a Store) -> &'a [char];

    /// Whether the text at the cursor was loaded from a CDATA section.
    fn is_text_cdata(&self, store: &Store) -> bool;

    fn has_children(&mut self, store: &Store) -> bool {
        if !self.kind(store).is_container() {
            return false;
        }
        self.push();
        self.next(store);
        let kind = self.kind(store);
        self.pop();
        kind != SaveKind::Text && !kind.is_end()
    }

    fn has_text(&mut self, store: &Store) -> bool {
        if !self.kind(store).is_container() {
            return false;
        }
        self.push();
        self.next(store);
        let kind = self.kind(store);
        self.pop();
        kind == SaveKind::Text
    }

    /// Namespace declarations in scope at the start of a saved range,
    /// nearest first.
    fn ancestor_namespaces(&self) -> &[(String, String)] {
        &[]
    }

    fn document_properties<'s>(&self, store: &'s Store) -> Option<&'s DocumentProperties> {
        store.document_properties(store.top(self.node()))
    }
}

fn walker_name(store: &Store, walker: &Walker) -> Option<ExpandedName> {
    if walker.is_text() {
        return None;
    }
    store
        .node_name(walker.node())
        .map(|name| store.expanded_name(name))
}

/// Saves a whole document, root to end.
pub(crate) struct DocSaveCursor {
    walker: Walker,
    stack: Vec<Walker>,
}

impl DocSaveCursor {
    pub(crate) fn new(root: Node) -> Self {
        Self {
            walker: Walker::at(root),
            stack: Vec::new(),
        }
    }
}

impl SaveCursor for DocSaveCursor {
    fn kind(&self, store: &Store) -> SaveKind {
        self.walker.token(store).into()
    }

    fn name(&self, store: &Store) -> Option<ExpandedName> {
        walker_name(store, &self.walker)
    }

    fn node(&self) -> Node {
        self.walker.node()
    }

    fn next(&mut self, store: &Store) -> bool {
        self.walker.next(store)
    }

    fn to_end(&mut self, _store: &Store) {
        self.walker.to_end();
    }

    fn to_first_attr(&mut self, store: &Store) -> bool {
        self.walker.to_first_attr(store)
    }

    fn to_next_attr(&mut self, store: &Store) -> bool {
        self.walker.to_next_attr(store)
    }

    fn push(&mut self) {
        self.stack.push(self.walker);
    }

    fn pop(&mut self) {
        if let Some(walker) = self.stack.pop() {
            self.walker = walker;
        }
    }

    fn chars<'a>(&'a self, store: &'a Store) -> &'a [char] {
        self.walker.chars(store)
    }

    fn is_text_cdata(&self, store: &Store) -> bool {
        store.cdata_in_span(self.walker.position())
    }

    fn has_children(&mut self, store: &Store) -> bool {
        self.kind(store).is_container() && store.has_children(self.walker.node())
    }

    fn has_text(&mut self, store: &Store) -> bool {
        self.kind(store).is_container() && store.has_text(self.walker.node())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FragmentState {
    RootStart,
    ElemStart,
    Cur,
    ElemEnd,
    RootEnd,
}

/// Saves the tokens between two positions, framed by a synthesized root
/// and optionally wrapped in a synthesized element.
///
/// Attributes at the start of the range become attributes of the wrapper.
/// A range that starts and ends on the same attribute saves just that
/// attribute.
pub(crate) struct FragmentSaveCursor {
    cur: Walker,
    end: Option<Position>,
    elem: Option<ExpandedName>,
    save_attr: bool,
    state: FragmentState,
    stack: Vec<(FragmentState, Walker)>,
    ancestor_namespaces: Vec<(String, String)>,
}

impl FragmentSaveCursor {
    pub(crate) fn new(
        store: &Store,
        start: Position,
        end: Option<Position>,
        elem: Option<ExpandedName>,
    ) -> Self {
        let cur = Walker::new(store, start);
        let save_attr = cur.is_attribute(store) && end == Some(cur.position());
        Self {
            cur,
            end,
            elem,
            save_attr,
            state: FragmentState::RootStart,
            stack: Vec::new(),
            ancestor_namespaces: ancestor_namespaces(store, start),
        }
    }

    fn at_end(&self) -> bool {
        Some(self.cur.position()) == self.end
    }

    fn end_state(&self) -> FragmentState {
        if self.elem.is_none() {
            FragmentState::RootEnd
        } else {
            FragmentState::ElemEnd
        }
    }
}

impl SaveCursor for FragmentSaveCursor {
    fn kind(&self, store: &Store) -> SaveKind {
        match self.state {
            FragmentState::RootStart => SaveKind::Root,
            FragmentState::ElemStart => SaveKind::Element,
            FragmentState::ElemEnd => SaveKind::EndElement,
            FragmentState::RootEnd => SaveKind::EndRoot,
            FragmentState::Cur => self.cur.token(store).into(),
        }
    }

    fn name(&self, store: &Store) -> Option<ExpandedName> {
        match self.state {
            FragmentState::RootStart | FragmentState::RootEnd => None,
            FragmentState::ElemStart | FragmentState::ElemEnd => self.elem.clone(),
            FragmentState::Cur => walker_name(store, &self.cur),
        }
    }

    fn node(&self) -> Node {
        self.cur.node()
    }

    fn next(&mut self, store: &Store) -> bool {
        match self.state {
            FragmentState::RootStart => {
                self.state = if self.elem.is_none() {
                    FragmentState::Cur
                } else {
                    FragmentState::ElemStart
                };
            }
            FragmentState::ElemStart => {
                if self.save_attr {
                    self.state = FragmentState::ElemEnd;
                } else {
                    if self.cur.is_attribute(store) {
                        self.cur.to_parent(store);
                        self.cur.next(store);
                    }
                    self.state = if self.at_end() {
                        FragmentState::ElemEnd
                    } else {
                        FragmentState::Cur
                    };
                }
            }
            FragmentState::Cur => {
                if !self.cur.next(store) || self.at_end() {
                    self.state = self.end_state();
                }
            }
            FragmentState::ElemEnd => self.state = FragmentState::RootEnd,
            FragmentState::RootEnd => return false,
        }
        true
    }

    fn to_end(&mut self, _store: &Store) {
        match self.state {
            FragmentState::RootStart => self.state = FragmentState::RootEnd,
            FragmentState::ElemStart => self.state = FragmentState::ElemEnd,
            FragmentState::Cur => self.cur.to_end(),
            FragmentState::ElemEnd | FragmentState::RootEnd => {}
        }
    }

    fn to_first_attr(&mut self, store: &Store) -> bool {
        match self.state {
            FragmentState::Cur => self.cur.to_first_attr(store),
            FragmentState::ElemStart if self.cur.is_attribute(store) => {
                self.state = FragmentState::Cur;
                true
            }
            _ => false,
        }
    }

    fn to_next_attr(&mut self, store: &Store) -> bool {
        !self.save_attr && self.cur.to_next_attr(store)
    }

    fn push(&mut self) {
        self.stack.push((self.state, self.cur));
    }

    fn pop(&mut self) {
        if let Some((state, cur)) = self.stack.pop() {
            self.state = state;
            self.cur = cur;
        }
    }

    fn chars<'a>(&'a self, store: &'a Store) -> &'a [char] {
        let chars = self.cur.chars(store);
        let position = self.cur.position();
        match (position.pos, self.end) {
            (
                Pos::InRun { run, offset },
                Some(Position {
                    node,
                    pos: Pos::InRun {
                        run: end_run,
                        offset: end_offset,
                    },
                }),
            ) if node == position.node && run == end_run && end_offset > offset => {
                &chars[..(end_offset - offset).min(chars.len())]
            }
            _ => chars,
        }
    }

    fn is_text_cdata(&self, store: &Store) -> bool {
        store.cdata_in_span(self.cur.position())
    }

    fn ancestor_namespaces(&self) -> &[(String, String)] {
        &self.ancestor_namespaces
    }
}

/// Declarations visible at `start`, innermost container first. Bindings of
/// a prefix to the empty URI are left out.
fn ancestor_namespaces(store: &Store, start: Position) -> Vec<(String, String)> {
    let container = match start.pos {
        Pos::Before | Pos::InRun { run: Run::After, .. } => store.parent(start.node),
        Pos::InRun { run: Run::Value, .. } | Pos::EndOfContent => Some(start.node),
    };
    let Some(container) = container else {
        return Vec::new();
    };
    let mut namespaces = Vec::new();
    for node in store.ancestors(container) {
        for attr in store.attributes(node).filter(|a| store.is_xmlns(*a)) {
            let prefix = store.xmlns_prefix(attr);
            let uri = store.xmlns_uri(attr);
            if !uri.is_empty() || prefix.is_empty() {
                namespaces.push((prefix.to_string(), uri));
            }
        }
    }
    namespaces
}

/// Whether the content between `start` and `end` needs a wrapper element
/// to be well-formed: it holds non-whitespace text, attributes, or other
/// than exactly one element.
pub(crate) fn is_fragment(store: &Store, start: Position, end: Option<Position>) -> bool {
    let mut walker = Walker::new(store, start);
    let mut elements = 0;
    loop {
        if Some(walker.position()) == end {
            break;
        }
        let token = walker.token(store);
        match token {
            Token::Start(NodeKind::Attribute) => break,
            Token::Text => {
                if !walker.chars(store).iter().all(|c| is_xml_space(*c)) {
                    return true;
                }
            }
            Token::Start(NodeKind::Element) => {
                elements += 1;
                if elements > 1 {
                    return true;
                }
            }
            _ => {}
        }
        if let Token::Start(_) = token {
            walker.to_end();
        }
        if !walker.next(store) {
            break;
        }
    }
    elements != 1
}

/// Start of the attributes or content of a container, and its end.
fn inner_range(store: &Store, node: Node) -> (Position, Option<Position>) {
    let mut walker = Walker::at(node);
    if !walker.to_first_attr(store) {
        walker.next(store);
    }
    (walker.position(), Some(Position::end_of_content(node)))
}

/// Everything from `node` up to the token following it.
fn outer_range(store: &Store, node: Node) -> (Position, Option<Position>) {
    let mut walker = Walker::at(node);
    let end = walker.skip(store).then(|| walker.position());
    (Position::before(node), end)
}

/// Build the cursor that saves `node` under `options`.
pub(crate) fn create_save_cursor(
    store: &Store,
    node: Node,
    options: &SaveOptions,
) -> Box<dyn SaveCursor> {
    let synthetic = options.synthetic_document_element.clone();
    let fragment_name = synthetic.clone().unwrap_or_else(|| {
        store.expanded_name(if options.use_open_fragment {
            store.open_fragment_name
        } else {
            store.fragment_name
        })
    });

    let fragment = |(start, end): (Position, Option<Position>), elem| -> Box<dyn SaveCursor> {
        Box::new(FragmentSaveCursor::new(store, start, end, elem))
    };

    let mut cursor = match store.kind(node) {
        NodeKind::Root => {
            let (start, end) = inner_range(store, node);
            if is_fragment(store, start, end) {
                fragment((start, end), Some(fragment_name))
            } else if synthetic.is_some() {
                fragment((start, end), synthetic)
            } else {
                Box::new(DocSaveCursor::new(node))
            }
        }
        NodeKind::Element => {
            if options.save_inner {
                let (start, end) = inner_range(store, node);
                let elem = if is_fragment(store, start, end) {
                    Some(fragment_name)
                } else {
                    synthetic
                };
                fragment((start, end), elem)
            } else if synthetic.is_some() {
                fragment(inner_range(store, node), synthetic)
            } else {
                fragment(outer_range(store, node), None)
            }
        }
        NodeKind::Attribute => {
            let start = Position::before(node);
            fragment((start, Some(start)), Some(fragment_name))
        }
        NodeKind::Comment | NodeKind::ProcessingInstruction => {
            let range = if options.save_inner {
                let mut walker = Walker::at(node);
                walker.next(store);
                (walker.position(), Some(Position::end_of_content(node)))
            } else {
                outer_range(store, node)
            };
            fragment(range, Some(fragment_name))
        }
    };

    if let Some(target) = &options.filter_processing_instruction {
        cursor = Box::new(FilterSaveCursor::new(cursor, target));
    }
    if options.pretty_print {
        cursor = Box::new(PrettySaveCursor::new(cursor, options));
    }
    cursor
}
