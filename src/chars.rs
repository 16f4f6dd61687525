//! Shared character storage.
//!
//! Text of all nodes lives in a small number of append-only chunks. A node
//! run is a `(chunk, offset, len)` handle into one of them. Chunks never
//! change characters once written, so handles can be shared freely between
//! nodes (for instance by [`Store::copy_node`](crate::Store::copy_node)).
//! Editing a run returns a new handle.

/// Soft limit after which new text starts a fresh chunk.
const CHUNK_CAPACITY: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChunkId(u32);

/// A view of `len` characters starting at `offset` in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub(crate) struct TextRun {
    chunk: Option<ChunkId>,
    offset: usize,
    len: usize,
}

impl TextRun {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Default)]
pub(crate) struct CharStore {
    chunks: Vec<Vec<char>>,
}

impl CharStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn chars(&self, run: &TextRun) -> &[char] {
        match run.chunk {
            Some(chunk) => &self.chunks[chunk.0 as usize][run.offset..run.offset + run.len],
            None => &[],
        }
    }

    /// Copy `src` into storage and return a run viewing it.
    pub(crate) fn alloc(&mut self, src: &[char]) -> TextRun {
        if src.is_empty() {
            return TextRun::default();
        }
        let fits = self
            .chunks
            .last()
            .map(|c| c.len() + src.len() <= CHUNK_CAPACITY)
            .unwrap_or(false);
        if !fits {
            self.chunks
                .push(Vec::with_capacity(src.len().max(CHUNK_CAPACITY / 16)));
        }
        let index = self.chunks.len() - 1;
        let chunk = &mut self.chunks[index];
        let offset = chunk.len();
        chunk.extend_from_slice(src);
        TextRun {
            chunk: Some(ChunkId(index as u32)),
            offset,
            len: src.len(),
        }
    }

    /// Insert `src` at `pos` within `run`.
    ///
    /// Appending to a run that ends at the end of its chunk extends the chunk
    /// in place. Other edits allocate the spliced text.
    pub(crate) fn insert(&mut self, run: TextRun, pos: usize, src: &[char]) -> TextRun {
        assert!(pos <= run.len, "insert position out of range");
        if src.is_empty() {
            return run;
        }
        if run.is_empty() {
            return self.alloc(src);
        }
        if let Some(chunk) = run.chunk {
            let buffer = &mut self.chunks[chunk.0 as usize];
            if pos == run.len && run.offset + run.len == buffer.len() {
                buffer.extend_from_slice(src);
                return TextRun {
                    len: run.len + src.len(),
                    ..run
                };
            }
        }
        let old = self.chars(&run);
        let mut spliced = Vec::with_capacity(old.len() + src.len());
        spliced.extend_from_slice(&old[..pos]);
        spliced.extend_from_slice(src);
        spliced.extend_from_slice(&old[pos..]);
        self.alloc(&spliced)
    }

    /// Remove `len` characters at `pos` within `run`.
    ///
    /// Trimming either end only narrows the view.
    pub(crate) fn remove(&mut self, run: TextRun, pos: usize, len: usize) -> TextRun {
        assert!(pos + len <= run.len, "remove range out of range");
        if len == 0 {
            return run;
        }
        if len == run.len {
            return TextRun::default();
        }
        if pos == 0 {
            return TextRun {
                offset: run.offset + len,
                len: run.len - len,
                ..run
            };
        }
        if pos + len == run.len {
            return TextRun {
                len: run.len - len,
                ..run
            };
        }
        let old = self.chars(&run);
        let mut spliced = Vec::with_capacity(old.len() - len);
        spliced.extend_from_slice(&old[..pos]);
        spliced.extend_from_slice(&old[pos + len..]);
        self.alloc(&spliced)
    }
}

/// How whitespace is treated when reading a value as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WhitespaceRule {
    /// Text is returned unchanged.
    #[default]
    Preserve,
    /// Every whitespace character becomes a space.
    Replace,
    /// Leading and trailing whitespace is dropped and inner runs become a
    /// single space.
    Collapse,
}

#[inline]
pub(crate) fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r')
}

/// Accumulates text pieces while applying a [`WhitespaceRule`].
///
/// Collapsing spans piece boundaries, so a run of spaces split across two
/// text runs still becomes one space.
#[derive(Debug)]
pub(crate) struct Scrubber {
    rule: WhitespaceRule,
    out: String,
    pending_space: bool,
}

impl Scrubber {
    pub(crate) fn new(rule: WhitespaceRule) -> Self {
        Self {
            rule,
            out: String::new(),
            pending_space: false,
        }
    }

    pub(crate) fn push(&mut self, chars: &[char]) {
        match self.rule {
            WhitespaceRule::Preserve => self.out.extend(chars),
            WhitespaceRule::Replace => self
                .out
                .extend(chars.iter().map(|&c| if is_xml_space(c) { ' ' } else { c })),
            WhitespaceRule::Collapse => {
                for &c in chars {
                    if is_xml_space(c) {
                        self.pending_space = !self.out.is_empty();
                    } else {
                        if self.pending_space {
                            self.out.push(' ');
                            self.pending_space = false;
                        }
                        self.out.push(c);
                    }
                }
            }
        }
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn text(store: &CharStore, run: &TextRun) -> String {
        store.chars(run).iter().collect()
    }

    #[test]
    fn test_append_extends_in_place() {
        let mut store = CharStore::new();
        let run = store.alloc(&chars("hello"));
        let run2 = store.insert(run, 5, &chars(" world"));
        assert_eq!(run2.chunk, run.chunk);
        assert_eq!(run2.offset, run.offset);
        assert_eq!(text(&store, &run2), "hello world");
        // the old handle still sees its own text
        assert_eq!(text(&store, &run), "hello");
    }

    #[test]
    fn test_shared_runs_do_not_alias() {
        let mut store = CharStore::new();
        let a = store.alloc(&chars("abc"));
        let b = a;
        let a = store.insert(a, 3, &chars("x"));
        let b = store.insert(b, 3, &chars("y"));
        assert_eq!(text(&store, &a), "abcx");
        assert_eq!(text(&store, &b), "abcy");
    }

    #[test]
    fn test_insert_middle() {
        let mut store = CharStore::new();
        let run = store.alloc(&chars("ad"));
        let run = store.insert(run, 1, &chars("bc"));
        assert_eq!(text(&store, &run), "abcd");
    }

    #[test]
    fn test_remove_ends_narrows_view() {
        let mut store = CharStore::new();
        let run = store.alloc(&chars("abcdef"));
        let front = store.remove(run, 0, 2);
        assert_eq!(front.chunk, run.chunk);
        assert_eq!(text(&store, &front), "cdef");
        let back = store.remove(run, 4, 2);
        assert_eq!(text(&store, &back), "abcd");
        let middle = store.remove(run, 2, 2);
        assert_eq!(text(&store, &middle), "abef");
        assert!(store.remove(run, 0, 6).is_empty());
    }

    #[test]
    fn test_scrub_collapse_across_pieces() {
        let mut scrubber = Scrubber::new(WhitespaceRule::Collapse);
        scrubber.push(&chars("  a  "));
        scrubber.push(&chars("  b\n"));
        assert_eq!(scrubber.finish(), "a b");
    }

    #[test]
    fn test_scrub_replace() {
        let mut scrubber = Scrubber::new(WhitespaceRule::Replace);
        scrubber.push(&chars("a\tb\nc"));
        assert_eq!(scrubber.finish(), "a b c");
    }
}
