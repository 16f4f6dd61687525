use crate::position::{Pos, Position, Run};
use crate::store::{Node, NodeKind, Store};

/// What a [`Walker`] is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// The start of a node.
    Start(NodeKind),
    /// The end of a node.
    End(NodeKind),
    /// Text, up to the end of the run holding it.
    Text,
}

/// A read-only pointer that steps through a tree token by token.
///
/// Starting at a node, the sequence is its start, its leading text, its
/// content, its end, and the text following it. Attributes are not part of
/// this sequence; [`Walker::to_first_attr`] steps onto them explicitly.
/// A walker always holds a normal position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Walker {
    position: Position,
}

impl Walker {
    pub fn new(store: &Store, position: Position) -> Self {
        Self {
            position: store.normalize(position),
        }
    }

    /// Walker positioned before `node`.
    pub fn at(node: Node) -> Self {
        Self {
            position: Position::before(node),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn node(&self) -> Node {
        self.position.node
    }

    pub fn token(&self, store: &Store) -> Token {
        match self.position.pos {
            Pos::Before => Token::Start(store.kind(self.position.node)),
            Pos::EndOfContent => Token::End(store.kind(self.position.node)),
            Pos::InRun { .. } => Token::Text,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.position.pos, Pos::InRun { .. })
    }

    pub fn is_attribute(&self, store: &Store) -> bool {
        self.position.pos == Pos::Before && store.is_attribute(self.position.node)
    }

    /// Characters from the walker to the end of the current text run.
    pub fn chars<'s>(&self, store: &'s Store) -> &'s [char] {
        store.chars_at(self.position)
    }

    /// Step to the next token. Returns `false` at the end of a root, at the
    /// end of the last attribute, or at the end of a detached node; the
    /// walker does not move then.
    pub fn next(&mut self, store: &Store) -> bool {
        let node = self.position.node;
        let next = match self.position.pos {
            Pos::InRun {
                run: Run::After, ..
            } => store.normalize(Position::in_run(node, Run::After, store.cch_after(node))),
            Pos::EndOfContent => {
                let kind = store.kind(node);
                if kind == NodeKind::Root || store.parent(node).is_none() {
                    return false;
                }
                if kind == NodeKind::Attribute
                    && !store
                        .next_raw_sibling(node)
                        .map_or(false, |n| store.is_attribute(n))
                {
                    return false;
                }
                store.normalize(Position::in_run(node, Run::After, 0))
            }
            Pos::InRun {
                run: Run::Value, ..
            } => match store.first_raw_child(node) {
                Some(child) => Position::before(child),
                None => Position::end_of_content(node),
            },
            Pos::Before => store.content_start(node),
        };
        self.position = next;
        true
    }

    /// Jump to the end of the current node.
    pub fn to_end(&mut self) {
        debug_assert!(self.position.pos == Pos::Before);
        self.position = Position::end_of_content(self.position.node);
    }

    /// Jump past the current node and step to the next token.
    pub fn skip(&mut self, store: &Store) -> bool {
        self.to_end();
        self.next(store)
    }

    /// Step onto the first attribute of the current container.
    pub fn to_first_attr(&mut self, store: &Store) -> bool {
        match store.first_attribute(self.position.node) {
            Some(attr) if self.position.pos == Pos::Before => {
                self.position = Position::before(attr);
                true
            }
            _ => false,
        }
    }

    /// Step to the next attribute. From a container this is its first
    /// attribute.
    pub fn to_next_attr(&mut self, store: &Store) -> bool {
        let node = self.position.node;
        let next = if store.is_attribute(node) {
            store.next_sibling(node)
        } else {
            store.first_attribute(node)
        };
        match next {
            Some(attr) => {
                self.position = Position::before(attr);
                true
            }
            None => false,
        }
    }

    /// Step to the start of the node containing the current point.
    pub fn to_parent(&mut self, store: &Store) -> bool {
        let node = self.position.node;
        let parent = match self.position.pos {
            Pos::InRun {
                run: Run::Value, ..
            } => Some(node),
            _ => store.parent(node),
        };
        match parent {
            Some(parent) => {
                self.position = Position::before(parent);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(store: &Store, root: Node) -> Vec<String> {
        let mut walker = Walker::at(root);
        let mut result = Vec::new();
        loop {
            result.push(match walker.token(store) {
                Token::Start(kind) => format!("+{:?} {}", kind, store.local_name(walker.node())),
                Token::End(kind) => format!("-{:?}", kind),
                Token::Text => walker.chars(store).iter().collect(),
            });
            match walker.token(store) {
                Token::Start(NodeKind::Comment | NodeKind::ProcessingInstruction) => {
                    if !walker.skip(store) {
                        break;
                    }
                }
                _ => {
                    if !walker.next(store) {
                        break;
                    }
                }
            }
        }
        result
    }

    #[test]
    fn test_walk_document_order() {
        let mut store = Store::new();
        let root = store
            .parse(r#"<a x="1">t1<b>t2</b>t3<!--c-->t4</a>"#)
            .unwrap();
        assert_eq!(
            tokens(&store, root),
            vec![
                "+Root ",
                "+Element a",
                "t1",
                "+Element b",
                "t2",
                "-Element",
                "t3",
                "+Comment ",
                "t4",
                "-Element",
                "-Root"
            ]
        );
    }

    #[test]
    fn test_attributes() {
        let mut store = Store::new();
        let root = store.parse(r#"<a x="1" y="2"/>"#).unwrap();
        let a = store.document_element(root).unwrap();
        let mut walker = Walker::at(a);
        assert!(walker.to_first_attr(&store));
        assert_eq!(store.local_name(walker.node()), "x");
        assert!(walker.to_next_attr(&store));
        assert_eq!(store.local_name(walker.node()), "y");
        assert!(!walker.to_next_attr(&store));
        assert!(walker.to_parent(&store));
        assert_eq!(walker.position(), Position::before(a));
    }

    #[test]
    fn test_walk_stops_at_detached_end() {
        let mut store = Store::new();
        let name = store.qname("b");
        let b = store.new_element(name);
        let mut walker = Walker::at(b);
        assert!(walker.next(&store));
        assert_eq!(walker.token(&store), Token::End(NodeKind::Element));
        assert!(!walker.next(&store));
    }
}
