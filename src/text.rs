use tracing::{debug, trace};

use crate::bookmark::Bookmark;
use crate::position::{Pos, Position, Run, Slot};
use crate::store::{Node, Store};

/// ## Text editing
///
/// Text lives in the value and after runs of nodes. These operations edit
/// runs and keep every cursor and bookmark on the edited node consistent:
/// points at or after an insertion shift right, points after a removal shift
/// left, and points inside a removed span either travel with relocated text
/// or collapse to the end of the span.
impl Store {
    /// Insert `text` at `at`. Returns the normal position right before the
    /// inserted text.
    ///
    /// # Panics
    ///
    /// Panics if `at` is outside its node's runs, or if it is a point that
    /// cannot hold text (before a root or before the first attribute).
    pub fn insert_chars(&mut self, at: Position, text: &str) -> Position {
        self.ensure_occupancy_at(at);
        assert!(self.is_valid_position(at), "invalid text position");
        if text.is_empty() {
            return self.normalize(at);
        }
        let slot = self.text_slot(at);
        let chars: Vec<char> = text.chars().collect();
        self.bump_version(false);
        self.insert_slot(slot, &chars, true);
        self.normalize(slot.position())
    }

    /// Append text at the end of a node's content.
    pub fn append_text(&mut self, node: Node, text: &str) -> Position {
        self.insert_chars(Position::end_of_content(node), text)
    }

    /// Remove up to `count` characters starting at a text position, and
    /// return them.
    ///
    /// Cursors inside the removed span collapse to the point right after it.
    /// When the span carries bookmarks, the text is relocated to a new root
    /// instead of being dropped, so the bookmarks stay reachable.
    pub fn remove_chars(&mut self, at: Position, count: usize) -> String {
        self.ensure_occupancy_at(at);
        let at = self.normalize(at);
        let Pos::InRun { run, offset } = at.pos else {
            return String::new();
        };
        let count = count.min(self.cch_right(at));
        if count == 0 {
            return String::new();
        }
        let slot = Slot::new(at.node, run, offset);
        let removed: String = self.run_chars(at.node, run)[offset..offset + count]
            .iter()
            .collect();
        self.bump_version(false);
        let end = offset + count;
        let has_bookmarks = self.data(at.node).bookmarks.iter().any(|b| {
            matches!(b.pos, Pos::InRun { run: r, offset: o } if r == run && o >= offset && o < end)
        });
        if has_bookmarks {
            let holder = self.new_root();
            debug!(count, "relocating bookmarked text to a new root");
            let dest = Slot::new(holder, Run::Value, 0);
            let chars: Vec<char> = removed.chars().collect();
            self.insert_slot(dest, &chars, false);
            self.remove_slot(slot, count, Some(dest), false, true);
        } else {
            self.remove_slot(slot, count, None, false, true);
        }
        removed
    }

    /// Move `count` characters starting at `from` to `to`. Cursors and
    /// bookmarks inside the moved text travel with it.
    ///
    /// Nothing happens when `to` lies inside the moved span. Returns the
    /// normal position right before the moved text.
    pub fn move_chars(&mut self, from: Position, count: usize, to: Position) -> Position {
        self.ensure_occupancy_at(from);
        self.ensure_occupancy_at(to);
        let from = self.normalize(from);
        let Pos::InRun { run, offset } = from.pos else {
            return self.normalize(to);
        };
        let count = count.min(self.cch_right(from));
        let to = self.normalize(to);
        if count == 0 {
            return to;
        }
        if let Pos::InRun {
            run: to_run,
            offset: to_offset,
        } = to.pos
        {
            if to.node == from.node && to_run == run && to_offset >= offset && to_offset <= offset + count {
                return to;
            }
        }
        let mut dest = self.text_slot(to);
        let mut source = Slot::new(from.node, run, offset);
        let chars = self.run_chars(from.node, run)[offset..offset + count].to_vec();
        self.bump_version(false);
        self.insert_slot(dest, &chars, true);
        if dest.node == source.node && dest.run == source.run && dest.offset <= source.offset {
            source.offset += count;
        }
        self.remove_slot(source, count, Some(dest), true, true);
        if dest.node == source.node && dest.run == source.run && dest.offset > source.offset {
            dest.offset -= count;
        }
        self.normalize(dest.position())
    }

    /// Move text between two runs without bumping the version. Cursors and
    /// bookmarks go along.
    pub(crate) fn transfer_chars(&mut self, from: Slot, to: Slot, count: usize) {
        debug_assert!(from.node != to.node || from.run != to.run);
        if count == 0 {
            return;
        }
        let chars = self.run_chars(from.node, from.run)[from.offset..from.offset + count].to_vec();
        self.insert_slot(to, &chars, false);
        self.remove_slot(from, count, Some(to), true, false);
    }

    /// The slot holding text inserted at `at`, giving a detached node a
    /// parent when the text has to go before it.
    pub(crate) fn text_slot(&mut self, at: Position) -> Slot {
        if let Some(slot) = self.denormalize(at) {
            return slot;
        }
        assert!(
            !self.is_root(at.node) && !self.is_attribute(at.node),
            "no text can precede a root or the first attribute"
        );
        self.ensure_parent(at.node);
        match self.denormalize(at) {
            Some(slot) => slot,
            None => unreachable!("a node with a parent always has a text slot before it"),
        }
    }

    /// Give a detached node a fresh root as parent.
    pub(crate) fn ensure_parent(&mut self, node: Node) -> Node {
        if let Some(parent) = self.parent(node) {
            return parent;
        }
        let root = self.new_root();
        root.get().append(node.get(), &mut self.arena);
        root
    }

    pub(crate) fn insert_value_run(&mut self, node: Node, offset: usize, chars: &[char]) {
        self.insert_slot(Slot::new(node, Run::Value, offset), chars, false);
    }

    pub(crate) fn remove_value_run(&mut self, node: Node, count: usize) {
        self.remove_slot(Slot::new(node, Run::Value, 0), count, None, false, false);
    }

    pub(crate) fn clear_after_run(&mut self, node: Node) {
        let count = self.cch_after(node);
        self.remove_slot(Slot::new(node, Run::After, 0), count, None, false, false);
    }

    pub(crate) fn insert_slot(&mut self, slot: Slot, src: &[char], invalidate: bool) {
        if src.is_empty() {
            return;
        }
        let Slot { node, run, offset } = slot;
        let n = src.len();
        let shift = |pos: &mut Pos| {
            if let Pos::InRun { run: r, offset: o } = pos {
                if *r == run && *o >= offset {
                    *o += n;
                }
            }
        };
        let data = self.arena[node.get()].get_mut();
        for id in &data.cursors {
            if let Some(mut position) = self.cursors.get(*id) {
                shift(&mut position.pos);
                self.cursors.set(*id, Some(position));
            }
        }
        for bookmark in data.bookmarks.iter_mut() {
            shift(&mut bookmark.pos);
        }
        let target = match run {
            Run::Value => &mut data.value,
            Run::After => &mut data.after,
        };
        *target = self.chars.insert(*target, offset, src);
        trace!(len = n, "inserted text");
        if invalidate {
            self.invalidate_run_owner(node, run);
        }
    }

    /// Remove `count` characters at `slot`.
    ///
    /// With a destination, bookmarks in the span move to the corresponding
    /// point of the destination, and so do cursors when `move_cursors` is
    /// set. The destination must already hold a copy of the text.
    pub(crate) fn remove_slot(
        &mut self,
        slot: Slot,
        count: usize,
        dest: Option<Slot>,
        move_cursors: bool,
        invalidate: bool,
    ) {
        if count == 0 {
            return;
        }
        let Slot { node, run, offset } = slot;
        let end = offset + count;
        // Where a point of the span lands in the destination, in
        // coordinates valid after the removal.
        let relocate = |o: usize| -> Option<Position> {
            dest.map(|d| {
                let mut target = d.offset + (o - offset);
                if d.node == node && d.run == run && target >= end {
                    target -= count;
                }
                Position::in_run(d.node, d.run, target)
            })
        };

        let mut moved_cursors = Vec::new();
        let mut collapsed_cursors = Vec::new();
        for id in self.data(node).cursors.clone() {
            let Some(mut position) = self.cursors.get(id) else {
                continue;
            };
            if let Pos::InRun { run: r, offset: o } = position.pos {
                if r == run && o >= offset {
                    if o >= end {
                        position.pos = Pos::InRun {
                            run,
                            offset: o - count,
                        };
                    } else if let (true, Some(target)) = (move_cursors, relocate(o)) {
                        moved_cursors.push((id, target));
                        continue;
                    } else {
                        position.pos = Pos::InRun { run, offset };
                        collapsed_cursors.push(id);
                    }
                    self.cursors.set(id, Some(position));
                }
            }
        }

        let mut moved_bookmarks = Vec::new();
        let bookmarks = std::mem::take(&mut self.data_mut(node).bookmarks);
        let mut kept = Vec::with_capacity(bookmarks.len());
        for mut bookmark in bookmarks {
            if let Pos::InRun { run: r, offset: o } = bookmark.pos {
                if r == run && o >= offset {
                    if o >= end {
                        bookmark.pos = Pos::InRun {
                            run,
                            offset: o - count,
                        };
                    } else {
                        match relocate(o) {
                            Some(target) => moved_bookmarks.push((bookmark, target)),
                            None => trace!(key = bookmark.key.name(), "dropped bookmark with removed text"),
                        }
                        continue;
                    }
                }
            }
            kept.push(bookmark);
        }

        let data = self.arena[node.get()].get_mut();
        data.bookmarks = kept;
        let target = match run {
            Run::Value => &mut data.value,
            Run::After => &mut data.after,
        };
        *target = self.chars.remove(*target, offset, count);

        for (bookmark, target) in moved_bookmarks {
            let target = self.normalize(target);
            self.data_mut(target.node).bookmarks.push(Bookmark {
                pos: target.pos,
                ..bookmark
            });
        }
        for (id, target) in moved_cursors {
            let target = self.normalize(target);
            self.retarget_cursor(id, target);
        }
        let collapsed = self.normalize(Position::in_run(node, run, offset));
        for id in collapsed_cursors {
            self.retarget_cursor(id, collapsed);
        }
        if invalidate {
            self.invalidate_run_owner(node, run);
        }
    }

    fn invalidate_run_owner(&mut self, node: Node, run: Run) {
        match run {
            Run::Value => self.invalidate_text(node),
            Run::After => {
                if let Some(parent) = self.parent(node) {
                    self.invalidate_text(parent);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmark::BookmarkKey;
    use std::sync::Arc;

    fn total_len(store: &Store, node: Node) -> usize {
        store.cch_value(node) + store.cch_after(node)
    }

    #[test]
    fn test_insert_grows_by_len() {
        let mut store = Store::new();
        let root = store.parse("<a>hello<b/>x</a>").unwrap();
        let a = store.document_element(root).unwrap();
        let b = store.first_child(a).unwrap();
        let before = total_len(&store, a);
        let at = store.insert_chars(Position::before(b), "123");
        assert_eq!(total_len(&store, a), before + 3);
        assert_eq!(at, Position::in_run(a, Run::Value, 5));
        assert_eq!(store.text_content(a), "hello123x");
    }

    #[test]
    fn test_insert_into_empty_element() {
        let mut store = Store::new();
        let root = store.parse("<a/>").unwrap();
        let a = store.document_element(root).unwrap();
        let cursor = store.attach_cursor(Position::end_of_content(a));
        let at = store.append_text(a, "hi");
        assert_eq!(at, Position::in_run(a, Run::Value, 0));
        // a cursor at the end stays at the end
        assert_eq!(
            store.cursor_position(cursor),
            Some(Position::end_of_content(a))
        );
    }

    #[test]
    fn test_insert_after_last_attribute() {
        let mut store = Store::new();
        let root = store.parse(r#"<a x="1"/>"#).unwrap();
        let a = store.document_element(root).unwrap();
        store.append_text(a, "t");
        let x = store.last_attribute(a).unwrap();
        assert_eq!(store.cch_value(a), 0);
        assert_eq!(store.after_chars(x), &['t']);
        assert_eq!(store.value_chars(x), &['1']);
    }

    #[test]
    fn test_remove_shrinks_by_count() {
        let mut store = Store::new();
        let root = store.parse("<a>hello</a>").unwrap();
        let a = store.document_element(root).unwrap();
        let removed = store.remove_chars(Position::in_run(a, Run::Value, 1), 3);
        assert_eq!(removed, "ell");
        assert_eq!(store.text_content(a), "ho");
    }

    #[test]
    fn test_remove_collapses_cursor_past_span() {
        let mut store = Store::new();
        let root = store.parse("<a>hello<b/></a>").unwrap();
        let a = store.document_element(root).unwrap();
        let b = store.first_child(a).unwrap();
        let cursor = store.attach_cursor(Position::in_run(a, Run::Value, 3));
        store.remove_chars(Position::in_run(a, Run::Value, 2), 3);
        assert_eq!(store.cursor_position(cursor), Some(Position::before(b)));
    }

    #[test]
    fn test_remove_keeps_bookmarked_text_alive() {
        let mut store = Store::new();
        let root = store.parse("<a>hello</a>").unwrap();
        let a = store.document_element(root).unwrap();
        const KEY: BookmarkKey = BookmarkKey::new("k");
        store.set_bookmark(Position::in_run(a, Run::Value, 2), KEY, Arc::new(()));
        store.remove_chars(Position::in_run(a, Run::Value, 1), 3);
        assert_eq!(store.text_content(a), "ho");
        let moved: Vec<_> = store.bookmark_positions(root, KEY).collect();
        assert!(moved.is_empty());
        let positions: Vec<_> = store
            .arena
            .iter()
            .filter(|n| !n.is_removed())
            .flat_map(|n| n.get().bookmarks.iter().map(|b| b.pos))
            .collect();
        assert_eq!(
            positions,
            vec![Pos::InRun {
                run: Run::Value,
                offset: 1
            }]
        );
    }

    #[test]
    fn test_move_chars_carries_cursors() {
        let mut store = Store::new();
        let root = store.parse("<a><b>hello</b><c/></a>").unwrap();
        let a = store.document_element(root).unwrap();
        let b = store.first_child(a).unwrap();
        let c = store.next_sibling(b).unwrap();
        let cursor = store.attach_cursor(Position::in_run(b, Run::Value, 3));
        let at = store.move_chars(
            Position::in_run(b, Run::Value, 2),
            3,
            Position::end_of_content(c),
        );
        assert_eq!(at, Position::in_run(c, Run::Value, 0));
        assert_eq!(store.text_content(b), "he");
        assert_eq!(store.text_content(c), "llo");
        assert_eq!(
            store.cursor_position(cursor),
            Some(Position::in_run(c, Run::Value, 1))
        );
    }

    #[test]
    fn test_move_chars_within_run() {
        let mut store = Store::new();
        let root = store.parse("<a>abcdef</a>").unwrap();
        let a = store.document_element(root).unwrap();
        let at = store.move_chars(
            Position::in_run(a, Run::Value, 0),
            2,
            Position::in_run(a, Run::Value, 4),
        );
        assert_eq!(store.text_content(a), "cdabef");
        assert_eq!(at, Position::in_run(a, Run::Value, 2));
        let same = store.move_chars(
            Position::in_run(a, Run::Value, 0),
            2,
            Position::in_run(a, Run::Value, 1),
        );
        assert_eq!(same, Position::in_run(a, Run::Value, 1));
        assert_eq!(store.text_content(a), "cdabef");
    }
}
