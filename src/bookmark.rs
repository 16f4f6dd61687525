use std::any::Any;
use std::sync::Arc;

use crate::position::{Pos, Position};
use crate::store::Store;

/// Identifies a kind of bookmark. At most one bookmark per key can sit at a
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BookmarkKey(&'static str);

impl BookmarkKey {
    /// Marks text that was loaded from a CDATA section.
    pub const CDATA: BookmarkKey = BookmarkKey("cdata");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// The value attached to a bookmark.
pub type BookmarkValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct Bookmark {
    pub(crate) pos: Pos,
    pub(crate) key: BookmarkKey,
    pub(crate) value: BookmarkValue,
}

/// ## Bookmarks
///
/// Bookmarks tag positions with a value. They follow text edits exactly
/// like cursors do, move with text that is relocated, and are copied along
/// with [`Store::copy_node`].
impl Store {
    /// Set the bookmark for `key` at `position`, replacing one that is
    /// already there.
    pub fn set_bookmark(&mut self, position: Position, key: BookmarkKey, value: BookmarkValue) {
        self.ensure_occupancy_at(position);
        let position = self.normalize(position);
        let bookmarks = &mut self.data_mut(position.node).bookmarks;
        match bookmarks
            .iter_mut()
            .find(|b| b.pos == position.pos && b.key == key)
        {
            Some(existing) => existing.value = value,
            None => bookmarks.push(Bookmark {
                pos: position.pos,
                key,
                value,
            }),
        }
    }

    /// The value of the bookmark for `key` at `position`.
    pub fn bookmark(&self, position: Position, key: BookmarkKey) -> Option<&BookmarkValue> {
        let position = self.normalize(position);
        self.data(position.node)
            .bookmarks
            .iter()
            .find(|b| b.pos == position.pos && b.key == key)
            .map(|b| &b.value)
    }

    pub fn has_bookmark(&self, position: Position, key: BookmarkKey) -> bool {
        self.bookmark(position, key).is_some()
    }

    /// Remove the bookmark for `key` at `position`, returning its value.
    pub fn remove_bookmark(&mut self, position: Position, key: BookmarkKey) -> Option<BookmarkValue> {
        let position = self.normalize(position);
        let bookmarks = &mut self.data_mut(position.node).bookmarks;
        let index = bookmarks
            .iter()
            .position(|b| b.pos == position.pos && b.key == key)?;
        Some(bookmarks.remove(index).value)
    }

    /// Positions of every bookmark with `key` in the subtree of a node.
    pub fn bookmark_positions(
        &self,
        node: crate::Node,
        key: BookmarkKey,
    ) -> impl Iterator<Item = Position> + '_ {
        self.subtree(node).flat_map(move |n| {
            self.data(n)
                .bookmarks
                .iter()
                .filter(move |b| b.key == key)
                .map(move |b| Position::new(n, b.pos))
        })
    }

    /// Tag the text at `position` as coming from a CDATA section.
    pub fn mark_cdata(&mut self, position: Position) {
        self.set_bookmark(position, BookmarkKey::CDATA, Arc::new(()));
    }

    /// Whether the text at `position` is tagged as CDATA.
    pub fn is_cdata(&self, position: Position) -> bool {
        self.has_bookmark(position, BookmarkKey::CDATA)
    }

    /// Whether a CDATA tag sits anywhere between a text position and the
    /// end of its run.
    pub(crate) fn cdata_in_span(&self, position: Position) -> bool {
        let Pos::InRun { run, offset } = position.pos else {
            return false;
        };
        let end = self.run_len(position.node, run);
        self.data(position.node).bookmarks.iter().any(|b| {
            b.key == BookmarkKey::CDATA
                && matches!(b.pos, Pos::InRun { run: r, offset: o } if r == run && o >= offset && o < end)
        })
    }
}
