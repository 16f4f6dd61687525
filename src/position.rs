//! Positions inside a tree.
//!
//! Every point in a document, inside markup or inside text, is addressed by
//! a node and a [`Pos`] relative to it. Several addresses can denote the same
//! point: the end of one node's after-text is the same point as just before
//! its next sibling. Exactly one of them is *normal*; cursors and bookmarks
//! only ever store normal positions.

use crate::store::{Node, Store};

/// Which of a node's two text runs an offset refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Run {
    /// Text right after the node's start: an attribute value, comment text,
    /// processing instruction data or a container's leading text.
    Value,
    /// Text following the node's end.
    After,
}

/// A position relative to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pos {
    /// Immediately before the node.
    Before,
    /// Inside one of the node's text runs.
    InRun { run: Run, offset: usize },
    /// After the node's last child, still inside the node.
    EndOfContent,
}

/// A node together with a position relative to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub node: Node,
    pub pos: Pos,
}

impl Position {
    pub fn new(node: Node, pos: Pos) -> Self {
        Self { node, pos }
    }

    pub fn before(node: Node) -> Self {
        Self::new(node, Pos::Before)
    }

    pub fn end_of_content(node: Node) -> Self {
        Self::new(node, Pos::EndOfContent)
    }

    pub fn in_run(node: Node, run: Run, offset: usize) -> Self {
        Self::new(node, Pos::InRun { run, offset })
    }
}

/// A denormalized address naming the run that physically holds a text
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) node: Node,
    pub(crate) run: Run,
    pub(crate) offset: usize,
}

impl Slot {
    pub(crate) fn new(node: Node, run: Run, offset: usize) -> Self {
        Self { node, run, offset }
    }

    pub(crate) fn position(&self) -> Position {
        Position::in_run(self.node, self.run, self.offset)
    }
}

/// ## Positions
impl Store {
    /// Length of a run of `node`.
    pub fn run_len(&self, node: Node, run: Run) -> usize {
        match run {
            Run::Value => self.cch_value(node),
            Run::After => self.cch_after(node),
        }
    }

    /// Integer form of a position: `0` before the node, `1 + offset` in the
    /// value run, `2 + cch_value + offset` in the after run. The end of
    /// content maps to `1 + cch_value`, the one integer never normal.
    pub fn raw_position(&self, position: Position) -> usize {
        let pos_after = 2 + self.cch_value(position.node);
        match position.pos {
            Pos::Before => 0,
            Pos::InRun {
                run: Run::Value,
                offset,
            } => 1 + offset,
            Pos::InRun {
                run: Run::After,
                offset,
            } => pos_after + offset,
            Pos::EndOfContent => pos_after - 1,
        }
    }

    /// Whether the position addresses a valid point of its node.
    pub fn is_valid_position(&self, position: Position) -> bool {
        match position.pos {
            Pos::InRun { run, offset } => offset <= self.run_len(position.node, run),
            _ => true,
        }
    }

    /// Whether `position` is the canonical address of its point.
    pub fn is_normal(&self, position: Position) -> bool {
        let node = position.node;
        match position.pos {
            Pos::Before | Pos::EndOfContent => true,
            Pos::InRun {
                run: Run::Value,
                offset,
            } => offset < self.cch_value(node),
            Pos::InRun {
                run: Run::After,
                offset,
            } => {
                if offset >= self.cch_after(node) || self.kind(node) == crate::NodeKind::Root {
                    return false;
                }
                match self.parent(node) {
                    Some(parent) => {
                        self.kind(parent).is_container()
                            && !(self.is_attribute(node)
                                && self.next_raw_sibling(node).map_or(false, |n| self.is_attribute(n)))
                    }
                    None => false,
                }
            }
        }
    }

    /// The canonical address of the point `position` denotes.
    ///
    /// The end of a value run is the start of the node's content: its first
    /// attribute-owned text, first child, or end of content. The end of an
    /// after run is just before the next sibling or at the parent's end of
    /// content. A detached node has no point after it; positions there are
    /// returned unchanged.
    pub fn normalize(&self, position: Position) -> Position {
        let node = position.node;
        match position.pos {
            Pos::InRun {
                run: Run::Value,
                offset,
            } if offset >= self.cch_value(node) => self.after_value(node),
            Pos::InRun {
                run: Run::After,
                offset,
            } if offset >= self.cch_after(node) => {
                if let Some(next) = self.next_raw_sibling(node) {
                    Position::before(next)
                } else if let Some(parent) = self.parent(node) {
                    Position::end_of_content(parent)
                } else {
                    position
                }
            }
            _ => position,
        }
    }

    /// The first point inside a container's content, normalized.
    pub(crate) fn content_start(&self, node: Node) -> Position {
        if self.cch_value(node) > 0 {
            Position::in_run(node, Run::Value, 0)
        } else {
            self.after_value(node)
        }
    }

    /// The point right after the value run of `node`.
    fn after_value(&self, node: Node) -> Position {
        if let Some(last_attr) = self.last_attribute(node) {
            if self.cch_after(last_attr) > 0 {
                return Position::in_run(last_attr, Run::After, 0);
            }
            return match self.next_raw_sibling(last_attr) {
                Some(next) => Position::before(next),
                None => Position::end_of_content(node),
            };
        }
        match self.first_raw_child(node) {
            Some(child) => Position::before(child),
            None => Position::end_of_content(node),
        }
    }

    /// The run slot that physically holds text inserted at `position`.
    ///
    /// Returns `None` for a point that cannot hold text: before a root,
    /// before the first attribute, or before a detached node without
    /// previous sibling.
    pub(crate) fn denormalize(&self, position: Position) -> Option<Slot> {
        let node = position.node;
        match position.pos {
            Pos::InRun { run, offset } => Some(Slot::new(node, run, offset)),
            Pos::Before => {
                if let Some(prev) = self.previous_raw_sibling(node) {
                    Some(Slot::new(prev, Run::After, self.cch_after(prev)))
                } else if self.is_attribute(node) {
                    None
                } else {
                    self.parent(node)
                        .map(|parent| Slot::new(parent, Run::Value, self.cch_value(parent)))
                }
            }
            Pos::EndOfContent => Some(match self.last_raw_child(node) {
                Some(last) => Slot::new(last, Run::After, self.cch_after(last)),
                None => Slot::new(node, Run::Value, self.cch_value(node)),
            }),
        }
    }

    /// Characters to the right of a position within the run holding it.
    pub fn cch_right(&self, position: Position) -> usize {
        match position.pos {
            Pos::InRun { run, offset } => self.run_len(position.node, run).saturating_sub(offset),
            _ => 0,
        }
    }

    /// The characters from a text position to the end of its run.
    pub fn chars_at(&self, position: Position) -> &[char] {
        match position.pos {
            Pos::InRun { run, offset } => &self.run_chars(position.node, run)[offset..],
            _ => &[],
        }
    }
}
