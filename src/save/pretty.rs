use crate::chars::is_xml_space;
use crate::name::ExpandedName;
use crate::store::{DocumentProperties, Node, Store};

use super::cursor::{SaveCursor, SaveKind};
use super::options::SaveOptions;

/// Inserts indentation between tokens and trims whitespace around text.
///
/// Indentation is reported as text tokens of its own, merged with any
/// trimmed text that was there. Nothing is inserted after comments and
/// processing instructions, or between the start and end of an element
/// without content, so those keep their layout.
pub(crate) struct PrettySaveCursor {
    inner: Box<dyn SaveCursor>,
    indent: i32,
    offset: usize,
    use_cdata_bookmarks: bool,
    txt: Option<Vec<char>>,
    is_text_cdata: bool,
    depth: i32,
    stack: Vec<(Option<Vec<char>>, i32)>,
}

impl PrettySaveCursor {
    pub(crate) fn new(inner: Box<dyn SaveCursor>, options: &SaveOptions) -> Self {
        Self {
            inner,
            indent: options.pretty_indent,
            offset: options.pretty_offset,
            use_cdata_bookmarks: options.use_cdata_bookmarks,
            txt: None,
            is_text_cdata: false,
            depth: 0,
            stack: Vec::new(),
        }
    }

    fn spaces(&self, depth: i32) -> usize {
        self.offset + (self.indent * depth).max(0) as usize
    }
}

fn trim(chars: &[char]) -> &[char] {
    let start = chars
        .iter()
        .position(|c| !is_xml_space(*c))
        .unwrap_or(chars.len());
    let end = chars
        .iter()
        .rposition(|c| !is_xml_space(*c))
        .map_or(start, |i| i + 1);
    &chars[start..end]
}

impl SaveCursor for PrettySaveCursor {
    fn kind(&self, store: &Store) -> SaveKind {
        if self.txt.is_some() {
            SaveKind::Text
        } else {
            self.inner.kind(store)
        }
    }

    fn name(&self, store: &Store) -> Option<ExpandedName> {
        debug_assert!(self.txt.is_none());
        self.inner.name(store)
    }

    fn node(&self) -> Node {
        self.inner.node()
    }

    fn next(&mut self, store: &Store) -> bool {
        let kind = if self.txt.take().is_some() {
            self.is_text_cdata = false;
            self.inner.kind(store)
        } else {
            let prev = self.inner.kind(store);
            if !self.inner.next(store) {
                return false;
            }

            let mut text = Vec::new();
            if self.inner.kind(store) == SaveKind::Text {
                self.is_text_cdata = self.use_cdata_bookmarks && self.inner.is_text_cdata(store);
                text.extend_from_slice(trim(self.inner.chars(store)));
                self.inner.next(store);
            }

            let mut kind = self.inner.kind(store);

            // a negative indent keeps everything on one line
            if self.indent >= 0
                && prev != SaveKind::Comment
                && prev != SaveKind::ProcessingInstruction
                && !(prev == SaveKind::Element && kind == SaveKind::EndElement)
            {
                if !text.is_empty() {
                    let mut indented = vec!['\n'];
                    indented.resize(1 + self.spaces(self.depth), ' ');
                    indented.append(&mut text);
                    text = indented;
                }
                if kind != SaveKind::EndRoot {
                    if prev != SaveKind::Root {
                        text.push('\n');
                    }
                    let depth = if kind.is_end() {
                        self.depth - 1
                    } else {
                        self.depth
                    };
                    let len = text.len() + self.spaces(depth);
                    text.resize(len, ' ');
                }
            }

            if !text.is_empty() {
                self.txt = Some(text);
                kind = SaveKind::Text;
            }
            kind
        };

        match kind {
            SaveKind::Element => self.depth += 1,
            SaveKind::EndElement => self.depth -= 1,
            _ => {}
        }
        true
    }

    fn to_end(&mut self, store: &Store) {
        debug_assert!(self.txt.is_none());
        self.inner.to_end(store);
        if self.inner.kind(store) == SaveKind::EndElement {
            self.depth -= 1;
        }
    }

    fn to_first_attr(&mut self, store: &Store) -> bool {
        self.inner.to_first_attr(store)
    }

    fn to_next_attr(&mut self, store: &Store) -> bool {
        self.inner.to_next_attr(store)
    }

    fn push(&mut self) {
        self.inner.push();
        self.stack.push((self.txt.clone(), self.depth));
        self.is_text_cdata = false;
    }

    fn pop(&mut self) {
        self.inner.pop();
        if let Some((txt, depth)) = self.stack.pop() {
            self.txt = txt;
            self.depth = depth;
        }
        self.is_text_cdata = false;
    }

    fn chars<'a>(&'a self, store: &'a Store) -> &'a [char] {
        match &self.txt {
            Some(txt) => txt,
            None => self.inner.chars(store),
        }
    }

    fn is_text_cdata(&self, store: &Store) -> bool {
        if self.txt.is_some() {
            self.is_text_cdata
        } else {
            self.use_cdata_bookmarks && self.inner.is_text_cdata(store)
        }
    }

    fn has_children(&mut self, store: &Store) -> bool {
        self.txt.is_none() && self.inner.has_children(store)
    }

    fn has_text(&mut self, store: &Store) -> bool {
        self.txt.is_none() && self.inner.has_text(store)
    }

    fn ancestor_namespaces(&self) -> &[(String, String)] {
        self.inner.ancestor_namespaces()
    }

    fn document_properties<'s>(&self, store: &'s Store) -> Option<&'s DocumentProperties> {
        self.inner.document_properties(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim() {
        let chars: Vec<char> = " \n x y \t".chars().collect();
        assert_eq!(trim(&chars), &['x', ' ', 'y']);
        let blank: Vec<char> = "  ".chars().collect();
        assert!(trim(&blank).is_empty());
    }
}
