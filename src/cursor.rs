use crate::position::Position;
use crate::store::Store;
use crate::walk::Walker;

/// Handle of a cursor registered with a [`Store`].
///
/// A registered cursor sits on a normal position and is kept up to date by
/// every mutation: text edits shift it, relocated text carries it along and
/// removing its node moves it to the point where the node used to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Entry {
    generation: u32,
    position: Option<Position>,
}

#[derive(Debug, Default)]
pub(crate) struct CursorRegistry {
    entries: Vec<Entry>,
    free: Vec<u32>,
}

impl CursorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, position: Position) -> CursorId {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.generation += 1;
            entry.position = Some(position);
            return CursorId {
                index,
                generation: entry.generation,
            };
        }
        self.entries.push(Entry {
            generation: 0,
            position: Some(position),
        });
        CursorId {
            index: (self.entries.len() - 1) as u32,
            generation: 0,
        }
    }

    fn entry(&self, id: CursorId) -> Option<&Entry> {
        self.entries
            .get(id.index as usize)
            .filter(|e| e.generation == id.generation)
    }

    pub(crate) fn get(&self, id: CursorId) -> Option<Position> {
        self.entry(id).and_then(|e| e.position)
    }

    pub(crate) fn set(&mut self, id: CursorId, position: Option<Position>) {
        if let Some(entry) = self
            .entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)
        {
            entry.position = position;
        }
    }

    fn release(&mut self, id: CursorId) {
        if self.entry(id).is_some() {
            self.entries[id.index as usize].position = None;
            self.free.push(id.index);
        }
    }
}

/// ## Cursors
impl Store {
    /// Register a cursor at `position`.
    ///
    /// # Panics
    ///
    /// Panics if the position is outside its node's runs.
    pub fn attach_cursor(&mut self, position: Position) -> CursorId {
        self.ensure_occupancy_at(position);
        assert!(self.is_valid_position(position), "invalid cursor position");
        let position = self.normalize(position);
        let id = self.cursors.allocate(position);
        self.data_mut(position.node).cursors.push(id);
        id
    }

    /// Unregister a cursor. Its id becomes stale.
    pub fn detach_cursor(&mut self, id: CursorId) {
        if let Some(position) = self.cursors.get(id) {
            self.data_mut(position.node).cursors.retain(|c| *c != id);
        }
        self.cursors.release(id);
    }

    /// Current position of a cursor; `None` once detached or disposed.
    pub fn cursor_position(&self, id: CursorId) -> Option<Position> {
        self.cursors.get(id)
    }

    /// Move a cursor to another position.
    pub fn move_cursor(&mut self, id: CursorId, position: Position) {
        self.ensure_occupancy_at(position);
        assert!(self.is_valid_position(position), "invalid cursor position");
        let position = self.normalize(position);
        self.retarget_cursor(id, position);
    }

    /// Advance a cursor to the next token. Returns `false` at the end of
    /// the document.
    pub fn cursor_next(&mut self, id: CursorId) -> bool {
        let Some(position) = self.cursors.get(id) else {
            return false;
        };
        let mut walker = Walker::new(self, position);
        if !walker.next(self) {
            return false;
        }
        self.retarget_cursor(id, walker.position());
        true
    }

    /// Insert text at a cursor. The cursor ends up before the new text.
    pub fn cursor_insert_chars(&mut self, id: CursorId, text: &str) {
        if let Some(position) = self.cursors.get(id) {
            let at = self.insert_chars(position, text);
            self.retarget_cursor(id, at);
        }
    }

    /// Put a cursor on a (normal) position, updating the per-node lists.
    pub(crate) fn retarget_cursor(&mut self, id: CursorId, position: Position) {
        let Some(old) = self.cursors.get(id) else {
            return;
        };
        if old.node != position.node {
            self.data_mut(old.node).cursors.retain(|c| *c != id);
            self.data_mut(position.node).cursors.push(id);
        }
        self.cursors.set(id, Some(position));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Run;

    #[test]
    fn test_cursor_after_edit_point_shifts() {
        let mut store = Store::new();
        let root = store.parse("<a>hello</a>").unwrap();
        let a = store.document_element(root).unwrap();
        let before = store.attach_cursor(Position::in_run(a, Run::Value, 1));
        let at = store.attach_cursor(Position::in_run(a, Run::Value, 2));
        let after = store.attach_cursor(Position::in_run(a, Run::Value, 4));
        store.insert_chars(Position::in_run(a, Run::Value, 2), "123");
        assert_eq!(
            store.cursor_position(before),
            Some(Position::in_run(a, Run::Value, 1))
        );
        assert_eq!(
            store.cursor_position(at),
            Some(Position::in_run(a, Run::Value, 5))
        );
        assert_eq!(
            store.cursor_position(after),
            Some(Position::in_run(a, Run::Value, 7))
        );
        store.remove_chars(Position::in_run(a, Run::Value, 0), 3);
        assert_eq!(
            store.cursor_position(before),
            Some(Position::in_run(a, Run::Value, 0))
        );
        assert_eq!(
            store.cursor_position(after),
            Some(Position::in_run(a, Run::Value, 4))
        );
    }

    #[test]
    fn test_cursor_moves_off_removed_node() {
        let mut store = Store::new();
        let root = store.parse("<a><b><c/></b><d/></a>").unwrap();
        let a = store.document_element(root).unwrap();
        let b = store.first_child(a).unwrap();
        let c = store.first_child(b).unwrap();
        let d = store.next_sibling(b).unwrap();
        let cursor = store.attach_cursor(Position::before(c));
        store.remove_node(b).unwrap();
        assert_eq!(store.cursor_position(cursor), Some(Position::before(d)));
    }

    #[test]
    fn test_cursor_next_walks_tokens() {
        let mut store = Store::new();
        let root = store.parse("<a>t<b/></a>").unwrap();
        let a = store.document_element(root).unwrap();
        let b = store.first_child(a).unwrap();
        let cursor = store.attach_cursor(Position::before(a));
        assert!(store.cursor_next(cursor));
        assert_eq!(
            store.cursor_position(cursor),
            Some(Position::in_run(a, Run::Value, 0))
        );
        assert!(store.cursor_next(cursor));
        assert_eq!(store.cursor_position(cursor), Some(Position::before(b)));
        assert!(store.data(b).cursors.contains(&cursor));
        assert!(!store.data(a).cursors.contains(&cursor));
    }

    #[test]
    fn test_detached_cursor_is_stale() {
        let mut store = Store::new();
        let root = store.parse("<a/>").unwrap();
        let cursor = store.attach_cursor(Position::before(root));
        store.detach_cursor(cursor);
        assert_eq!(store.cursor_position(cursor), None);
        let other = store.attach_cursor(Position::before(root));
        assert_eq!(store.cursor_position(cursor), None);
        assert!(store.cursor_position(other).is_some());
    }
}
