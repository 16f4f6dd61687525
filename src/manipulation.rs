use ahash::{HashMap, HashMapExt};
use tracing::trace;

use crate::error::Error;
use crate::name::QName;
use crate::position::{Pos, Position, Run, Slot};
use crate::store::{Node, NodeData, NodeKind, Store};
use crate::walk::Walker;

/// ## Manipulation
///
/// Structural edits splice whole subtrees. Text stays where it belongs in
/// document order: the text following a moved node stays behind, and text
/// at the destination is split around the inserted node. Cursors inside a
/// moved subtree do not travel with it; they land at the point the node
/// was taken from.
impl Store {
    /// Move `node` (with its subtree) to `to`, or detach it when `to` is
    /// `None`. Returns the position right before the node.
    ///
    /// Moving a node to the point it already occupies does nothing.
    pub fn move_node(&mut self, node: Node, to: Option<Position>) -> Result<Position, Error> {
        if let Some(to) = to {
            self.ensure_occupancy_at(to);
            assert!(self.is_valid_position(to), "invalid destination");
            let to = self.normalize(to);
            if to == Position::before(node) {
                return Ok(to);
            }
            if self.parent(node).is_some()
                && to == self.normalize(Position::in_run(node, Run::After, 0))
            {
                return Ok(Position::before(node));
            }
            self.check_destination(node, to)?;
        }

        self.bump_version(true);
        for n in self.subtree(node).collect::<Vec<_>>() {
            self.disconnect_typed(n);
        }

        let mut to = to;
        if let Some(parent) = self.parent(node) {
            self.invalidate_text(parent);
            let after = self.cch_after(node);
            if after > 0 {
                let dest = match self.previous_raw_sibling(node) {
                    Some(prev) => Slot::new(prev, Run::After, self.cch_after(prev)),
                    None => Slot::new(parent, Run::Value, self.cch_value(parent)),
                };
                self.transfer_chars(Slot::new(node, Run::After, 0), dest, after);
                // a destination inside the node's own after text moved along
                if let Some(Position {
                    node: n,
                    pos: Pos::InRun {
                        run: Run::After,
                        offset,
                    },
                }) = to
                {
                    if n == node {
                        to = Some(Position::in_run(dest.node, dest.run, dest.offset + offset));
                    }
                }
            }
            let landing = self.normalize(Position::in_run(node, Run::After, 0));
            self.move_cursors_out(node, landing);
            node.get().detach(&mut self.arena);
        } else {
            let ids = self.cursors_in_subtree(node);
            if !ids.is_empty() {
                // cursors need somewhere to go
                let parent = self.ensure_parent(node);
                self.move_cursors_out(node, Position::end_of_content(parent));
                node.get().detach(&mut self.arena);
            }
        }

        let Some(to) = to else {
            trace!("detached node");
            return Ok(Position::before(node));
        };
        let to = self.normalize(to);
        let cch_right = self.cch_right(to);
        let (here, append) = if cch_right > 0 {
            let mut walker = Walker::new(self, to);
            walker.next(self);
            let next = walker.position();
            (next.node, next.pos != Pos::Before)
        } else {
            (to.node, to.pos != Pos::Before)
        };
        if append {
            here.get().checked_append(node.get(), &mut self.arena)?;
        } else {
            here.get().checked_insert_before(node.get(), &mut self.arena)?;
        }
        if cch_right > 0 {
            if let Pos::InRun { run, offset } = to.pos {
                self.transfer_chars(
                    Slot::new(to.node, run, offset),
                    Slot::new(node, Run::After, 0),
                    cch_right,
                );
            }
        }
        if let Some(parent) = self.parent(node) {
            self.invalidate_text(parent);
        }
        Ok(Position::before(node))
    }

    /// Detach a node from its tree. The node and its subtree stay usable
    /// and can be inserted elsewhere.
    pub fn remove_node(&mut self, node: Node) -> Result<(), Error> {
        if self.parent(node).is_none() {
            return Ok(());
        }
        self.move_node(node, None)?;
        Ok(())
    }

    /// Append `child` as the last content child of `parent`.
    pub fn append_child(&mut self, parent: Node, child: Node) -> Result<(), Error> {
        self.move_node(child, Some(Position::end_of_content(parent)))?;
        Ok(())
    }

    /// Insert `node` right before `reference`.
    pub fn insert_before(&mut self, reference: Node, node: Node) -> Result<(), Error> {
        self.move_node(node, Some(Position::before(reference)))?;
        Ok(())
    }

    /// Insert `node` right after `reference`, before the text following it.
    pub fn insert_after(&mut self, reference: Node, node: Node) -> Result<(), Error> {
        if self.parent(reference).is_none() {
            return Err(Error::InvalidStructure("reference node has no parent"));
        }
        let to = self.normalize(Position::in_run(reference, Run::After, 0));
        self.move_node(node, Some(to))?;
        Ok(())
    }

    /// Add an attribute after the existing attributes of `element`.
    pub fn insert_attribute(&mut self, element: Node, attribute: Node) -> Result<(), Error> {
        let to = self.content_start(element);
        self.move_node(attribute, Some(to))?;
        Ok(())
    }

    /// Set the value of the attribute `name`, creating it when missing.
    pub fn set_attribute(&mut self, element: Node, name: QName, value: &str) -> Result<Node, Error> {
        if let Some(attribute) = self.find_attribute(element, name.name) {
            self.set_text(attribute, value)?;
            return Ok(attribute);
        }
        let attribute = self.new_attribute(name, value);
        self.insert_attribute(element, attribute)?;
        Ok(attribute)
    }

    /// Remove the attribute `name`. Returns whether there was one.
    pub fn remove_attribute(&mut self, element: Node, name: crate::NameId) -> Result<bool, Error> {
        match self.find_attribute(element, name) {
            Some(attribute) => {
                self.remove_node(attribute)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove all content (text and child nodes) of a container, keeping
    /// its attributes.
    pub fn remove_contents(&mut self, node: Node) -> Result<(), Error> {
        loop {
            let start = self.content_start(node);
            match start.pos {
                Pos::InRun { .. } => {
                    let count = self.cch_right(start);
                    self.remove_chars(start, count);
                }
                Pos::Before => self.remove_node(start.node)?,
                Pos::EndOfContent => return Ok(()),
            }
        }
    }

    /// Replace the text of a node. Containers lose their content; other
    /// nodes get a new value.
    pub fn set_text(&mut self, node: Node, text: &str) -> Result<(), Error> {
        self.ensure_occupancy(node);
        if self.kind(node).is_container() {
            self.remove_contents(node)?;
        } else {
            let count = self.cch_value(node);
            self.remove_chars(Position::in_run(node, Run::Value, 0), count);
        }
        self.append_text(node, text);
        Ok(())
    }

    /// Copy a subtree. The copy is detached, shares character data with the
    /// original and carries its bookmarks, but no cursors and no typed
    /// values.
    pub fn copy_node(&mut self, node: Node) -> Node {
        self.ensure_occupancy_deep(node);
        let mut copies: HashMap<Node, Node> = HashMap::new();
        let mut top = node;
        for original in self.subtree(node).collect::<Vec<_>>() {
            let source = self.data(original);
            let data = NodeData {
                value: source.value,
                after: source.after,
                bookmarks: source.bookmarks.clone(),
                ..NodeData::new(source.kind, source.name)
            };
            let copy = Node::new(self.arena.new_node(data));
            if original == node {
                top = copy;
            } else if let Some(parent) = self.parent(original).and_then(|p| copies.get(&p)) {
                parent.get().append(copy.get(), &mut self.arena);
            }
            copies.insert(original, copy);
        }
        self.clear_after_run(top);
        top
    }

    /// Copy a subtree from another store into this one. Names and text are
    /// re-interned; bookmarks are carried over.
    pub fn import_node(&mut self, source: &Store, node: Node) -> Node {
        let mut copies: HashMap<Node, Node> = HashMap::new();
        let mut top = None;
        for original in source.subtree(node) {
            let data = source.data(original);
            let name = data.name.map(|q| {
                let namespace = self.add_namespace(source.name_namespace_str(q.name));
                QName::new(
                    self.add_name_ns(source.local_name_str(q.name), namespace),
                    self.add_prefix(source.prefix_str(q.prefix)),
                )
            });
            let value: Vec<char> = match (&data.typed, data.vacant) {
                (Some(typed), true) => typed.build_text().chars().collect(),
                _ => source.value_chars(original).to_vec(),
            };
            let after = if original == node {
                Vec::new()
            } else {
                source.after_chars(original).to_vec()
            };
            let value = self.chars.alloc(&value);
            let after = self.chars.alloc(&after);
            let copy = Node::new(self.arena.new_node(NodeData {
                value,
                after,
                bookmarks: data.bookmarks.clone(),
                ..NodeData::new(data.kind, name)
            }));
            match source.parent(original).and_then(|p| copies.get(&p)) {
                Some(parent) if original != node => {
                    parent.get().append(copy.get(), &mut self.arena);
                }
                _ => top = Some(copy),
            }
            copies.insert(original, copy);
        }
        match top {
            Some(top) => top,
            None => unreachable!("a subtree always contains its own top"),
        }
    }

    /// Free the arena slots of a detached subtree. Cursors still inside it
    /// become detached.
    pub fn dispose(&mut self, node: Node) -> Result<(), Error> {
        if self.parent(node).is_some() {
            return Err(Error::InvalidStructure("only detached nodes can be disposed"));
        }
        for id in self.cursors_in_subtree(node) {
            self.cursors.set(id, None);
        }
        for n in self.subtree(node).collect::<Vec<_>>() {
            self.disconnect_typed(n);
            self.document_properties.remove(&n);
        }
        node.get().remove_subtree(&mut self.arena);
        self.bump_version(true);
        Ok(())
    }

    pub(crate) fn find_attribute(&self, element: Node, name: crate::NameId) -> Option<Node> {
        self.attributes(element)
            .find(|a| self.node_name(*a).map_or(false, |q| q.name == name))
    }

    fn cursors_in_subtree(&self, node: Node) -> Vec<crate::CursorId> {
        self.subtree(node)
            .flat_map(|n| self.data(n).cursors.iter().copied())
            .collect()
    }

    fn move_cursors_out(&mut self, node: Node, landing: Position) {
        for id in self.cursors_in_subtree(node) {
            self.retarget_cursor(id, landing);
        }
    }

    fn check_destination(&self, node: Node, to: Position) -> Result<(), Error> {
        let kind = self.kind(node);
        if kind == NodeKind::Root {
            return Err(Error::InvalidStructure("a root cannot be inserted"));
        }
        let own_after = to.node == node
            && matches!(
                to.pos,
                Pos::InRun {
                    run: Run::After,
                    ..
                }
            );
        if !own_after && self.is_in_subtree(to.node, node) {
            return Err(Error::InvalidStructure("cannot move a node into itself"));
        }
        let parent = match to.pos {
            Pos::EndOfContent => Some(to.node),
            Pos::Before => self.parent(to.node),
            Pos::InRun {
                run: Run::Value, ..
            } => Some(to.node),
            Pos::InRun {
                run: Run::After, ..
            } => self.parent(to.node),
        };
        let Some(parent) = parent.filter(|p| self.kind(*p).is_container()) else {
            return Err(Error::InvalidStructure("destination is not inside a container"));
        };
        if kind == NodeKind::Attribute {
            let in_attribute_region = to == self.content_start(parent)
                || (to.pos == Pos::Before && self.is_attribute(to.node));
            if !in_attribute_region {
                return Err(Error::InvalidStructure("attributes must precede content"));
            }
        } else if to.pos == Pos::Before && self.is_attribute(to.node) {
            return Err(Error::InvalidStructure("content cannot precede attributes"));
        }
        Ok(())
    }
}
