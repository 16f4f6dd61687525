use std::io;

use encoding_rs::{Encoding, UTF_8};
use tracing::trace;

use crate::encoding::encoding_for_label;
use crate::error::Error;
use crate::store::{Node, Store};

use super::buffer::EmitBuffer;
use super::namespaces::NamespaceStack;
use super::options::{CharacterSubstitutions, SaveOptions};
use super::saver::{prefixed_name, ElementStart, EmitContext, Emitter, SavedAttribute, Saver};

/// Characters XML 1.0 does not allow anywhere in a document. They are
/// written as `?`.
pub(crate) fn is_bad_char(c: char) -> bool {
    !matches!(c as u32,
        0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF)
}

/// The encoding byte output uses, from the options.
pub(crate) fn output_encoding(options: &SaveOptions) -> Result<&'static Encoding, Error> {
    match &options.encoding {
        Some(label) => encoding_for_label(label),
        None => Ok(UTF_8),
    }
}

/// Renders save tokens as XML text into an [`EmitBuffer`].
///
/// Every piece of text is emitted raw and then escaped in place.
pub(crate) struct TextEmitter {
    buffer: EmitBuffer,
    pretty: bool,
    cdata_length_threshold: usize,
    cdata_entity_count_threshold: usize,
    use_cdata_bookmarks: bool,
    namespaces_first: bool,
    substitutions: CharacterSubstitutions,
}

impl TextEmitter {
    pub(crate) fn new(options: &SaveOptions) -> Self {
        Self {
            buffer: EmitBuffer::new(),
            pretty: options.pretty_print,
            cdata_length_threshold: options.cdata_length_threshold,
            cdata_entity_count_threshold: options.cdata_entity_count_threshold,
            use_cdata_bookmarks: options.use_cdata_bookmarks,
            namespaces_first: options.namespaces_first,
            substitutions: options.substitute_characters.clone(),
        }
    }

    fn emit_declaration(&mut self, version: &str, encoding: &str) {
        self.buffer.emit("<?xml version=\"");
        self.buffer.emit(version);
        self.buffer.emit("\" encoding=\"");
        self.buffer.emit(encoding);
        self.buffer.emit("\"?>\n");
    }

    fn emit_namespaces(&mut self, namespaces: &NamespaceStack) {
        for (prefix, uri) in namespaces.frame_mappings() {
            self.buffer.emit(" xmlns");
            if !prefix.is_empty() {
                self.buffer.emit_char(':');
                self.buffer.emit(prefix);
            }
            self.buffer.emit("=\"");
            self.buffer.emit(uri);
            self.entitize_attr_value(false);
            self.buffer.emit_char('"');
        }
    }

    fn emit_attribute(
        &mut self,
        namespaces: &NamespaceStack,
        attribute: &SavedAttribute,
    ) -> Result<(), Error> {
        self.buffer.emit_char(' ');
        self.buffer
            .emit(&prefixed_name(namespaces, &attribute.name, true)?);
        self.buffer.emit("=\"");
        self.buffer.emit(&attribute.value);
        self.entitize_attr_value(true);
        self.buffer.emit_char('"');
        Ok(())
    }

    fn emit_literal(&mut self, literal: &str) {
        let quote = if literal.contains('"') { '\'' } else { '"' };
        self.buffer.emit_char(quote);
        self.buffer.emit(literal);
        self.buffer.emit_char(quote);
    }

    fn entitize_attr_value(&mut self, substitute: bool) {
        let (mut i, len) = self.buffer.last_emit();
        for _ in 0..len {
            let c = self.buffer.get(i);
            i = match c {
                '<' => self.buffer.replace(i, "&lt;"),
                '&' => self.buffer.replace(i, "&amp;"),
                '"' => self.buffer.replace(i, "&quot;"),
                _ if is_bad_char(c) => self.buffer.replace(i, "?"),
                _ => match self.substitutions.get(c) {
                    Some(replacement) if substitute => self.buffer.replace(i, replacement),
                    _ => self.buffer.step(i),
                },
            };
        }
    }

    fn entitize_content(&mut self, force_cdata: bool) {
        let (start, len) = self.buffer.last_emit();
        if len == 0 {
            return;
        }

        let mut i = start;
        let mut count = 0;
        let mut needs_replacing = false;
        let (mut prev, mut prev_prev) = ('\0', '\0');
        for _ in 0..len {
            let c = self.buffer.get(i);
            if c == '<' || c == '&' {
                count += 1;
            } else if prev_prev == ']' && prev == ']' && c == '>' {
                needs_replacing = true;
            } else if is_bad_char(c)
                || self.substitutions.contains(c)
                || (!self.pretty && c == '\r')
            {
                needs_replacing = true;
            }
            i = self.buffer.step(i);
            prev_prev = prev;
            prev = c;
        }

        if !force_cdata && count == 0 && !needs_replacing {
            return;
        }

        if force_cdata
            || (len > self.cdata_length_threshold && count > self.cdata_entity_count_threshold)
        {
            self.entitize_cdata(start, len);
            return;
        }

        let mut i = start;
        let (mut prev, mut prev_prev) = ('\0', '\0');
        for _ in 0..len {
            let c = self.buffer.get(i);
            i = match c {
                '<' => self.buffer.replace(i, "&lt;"),
                '&' => self.buffer.replace(i, "&amp;"),
                '>' if prev == ']' && prev_prev == ']' => self.buffer.replace(i, "&gt;"),
                _ if is_bad_char(c) => self.buffer.replace(i, "?"),
                '\r' if !self.pretty => self.buffer.replace(i, "&#13;"),
                _ => match self.substitutions.get(c) {
                    Some(replacement) => self.buffer.replace(i, replacement),
                    None => self.buffer.step(i),
                },
            };
            prev_prev = prev;
            prev = c;
        }
    }

    /// Wrap the last emitted text in a CDATA section. A `]]>` inside the
    /// text is split over two sections.
    fn entitize_cdata(&mut self, start: usize, len: usize) {
        let first = self.buffer.get(start);
        let opening = format!(
            "<![CDATA[{}",
            if is_bad_char(first) { '?' } else { first }
        );
        let mut i = self.buffer.replace(start, &opening);
        let (mut prev, mut prev_prev) = (first, '\0');
        for _ in 1..len {
            let c = self.buffer.get(i);
            i = if c == '>' && prev == ']' && prev_prev == ']' {
                self.buffer.replace(i, "]]>><![CDATA[")
            } else if is_bad_char(c) {
                self.buffer.replace(i, "?")
            } else {
                self.buffer.step(i)
            };
            prev_prev = prev;
            prev = c;
        }
        self.buffer.emit("]]>");
    }

    fn entitize_comment(&mut self) {
        let (mut i, len) = self.buffer.last_emit();
        let mut last_was_dash = false;
        for _ in 0..len {
            let c = self.buffer.get(i);
            i = if is_bad_char(c) {
                last_was_dash = false;
                self.buffer.replace(i, "?")
            } else if c == '-' && last_was_dash {
                last_was_dash = false;
                self.buffer.replace(i, " ")
            } else {
                last_was_dash = c == '-';
                self.buffer.step(i)
            };
        }
        if len > 0 && self.buffer.last() == Some('-') {
            self.buffer.emit_char(' ');
        }
    }

    fn entitize_procinst(&mut self) {
        let (mut i, len) = self.buffer.last_emit();
        let mut last_was_question = false;
        for _ in 0..len {
            let c = self.buffer.get(i);
            i = if is_bad_char(c) {
                self.buffer.replace(i, "?")
            } else if c == '>' && last_was_question {
                self.buffer.replace(i, " >")
            } else {
                self.buffer.step(i)
            };
            last_was_question = c == '?';
        }
    }
}

impl Emitter for TextEmitter {
    fn emit_element(&mut self, cx: &EmitContext, element: &ElementStart) -> Result<bool, Error> {
        self.buffer.emit_char('<');
        self.buffer
            .emit(&prefixed_name(cx.namespaces, element.name, false)?);

        if self.namespaces_first {
            self.emit_namespaces(cx.namespaces);
        }
        for attribute in element.attributes {
            self.emit_attribute(cx.namespaces, attribute)?;
        }
        if !self.namespaces_first {
            self.emit_namespaces(cx.namespaces);
        }

        if element.is_empty {
            self.buffer.emit("/>");
            Ok(true)
        } else {
            self.buffer.emit_char('>');
            Ok(false)
        }
    }

    fn emit_finish(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let name = cx
            .cursor
            .name(cx.store)
            .ok_or_else(|| Error::UnexpectedKind(cx.cursor.node()))?;
        self.buffer.emit("</");
        self.buffer.emit(&prefixed_name(cx.namespaces, &name, false)?);
        self.buffer.emit_char('>');
        Ok(())
    }

    fn emit_text(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let force_cdata = self.use_cdata_bookmarks && cx.cursor.is_text_cdata(cx.store);
        self.buffer.emit_chars(cx.cursor.chars(cx.store));
        self.entitize_content(force_cdata);
        Ok(())
    }

    fn emit_comment(&mut self, cx: &EmitContext) -> Result<(), Error> {
        self.buffer.emit("<!--");
        self.buffer
            .emit_chars(cx.store.value_chars(cx.cursor.node()));
        self.entitize_comment();
        self.buffer.emit("-->");
        Ok(())
    }

    fn emit_procinst(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let node = cx.cursor.node();
        self.buffer.emit("<?");
        self.buffer.emit(cx.store.local_name(node));
        let data = cx.store.value_chars(node);
        if !data.is_empty() {
            self.buffer.emit_char(' ');
            self.buffer.emit_chars(data);
            self.entitize_procinst();
        }
        self.buffer.emit("?>");
        Ok(())
    }

    fn emit_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), Error> {
        self.buffer.emit("<!DOCTYPE ");
        self.buffer.emit(name);
        match (public_id, system_id) {
            (None, Some(system_id)) => {
                self.buffer.emit(" SYSTEM ");
                self.emit_literal(system_id);
            }
            (Some(public_id), system_id) => {
                self.buffer.emit(" PUBLIC ");
                self.emit_literal(public_id);
                if let Some(system_id) = system_id {
                    self.buffer.emit_char(' ');
                    self.emit_literal(system_id);
                }
            }
            (None, None) => {}
        }
        self.buffer.emit(">\n");
        Ok(())
    }

    fn emit_start_doc(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }

    fn emit_end_doc(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }
}

/// A save to text that can be pulled in pieces.
pub(crate) struct TextSaver {
    saver: Saver,
    emitter: TextEmitter,
}

impl TextSaver {
    pub(crate) fn new(store: &Store, node: Node, options: &SaveOptions) -> Result<Self, Error> {
        let saver = Saver::new(store, node, options)?;
        let mut emitter = TextEmitter::new(options);
        if options.xml_declaration {
            let version = store
                .document_properties(store.top(node))
                .and_then(|p| p.version.as_deref())
                .unwrap_or("1.0");
            emitter.emit_declaration(version, output_encoding(options)?.name());
        }
        Ok(Self { saver, emitter })
    }

    /// Process tokens until at least `min` characters are buffered or the
    /// save is complete. Returns the number of buffered characters.
    fn ensure(&mut self, store: &Store, min: usize) -> Result<usize, Error> {
        let min = min.max(1);
        while self.emitter.buffer.available() < min {
            if !self.saver.process(store, &mut self.emitter)? {
                break;
            }
        }
        Ok(self.emitter.buffer.available())
    }

    /// Fill `dst` with the next characters of output. Returns `0` at the
    /// end.
    pub(crate) fn read(&mut self, store: &Store, dst: &mut [char]) -> Result<usize, Error> {
        self.ensure(store, dst.len())?;
        Ok(self.emitter.buffer.read(dst))
    }

    /// At least `min` characters of output, fewer only at the end. Returns
    /// `None` once everything was read.
    pub(crate) fn read_chunk(&mut self, store: &Store, min: usize) -> Result<Option<String>, Error> {
        if self.ensure(store, min)? == 0 {
            return Ok(None);
        }
        let mut chunk = String::new();
        self.emitter.buffer.drain_into(&mut chunk);
        Ok(Some(chunk))
    }

    pub(crate) fn save_to_string(mut self, store: &Store) -> Result<String, Error> {
        let mut out = String::new();
        self.emitter.buffer.drain_into(&mut out);
        while self.saver.process(store, &mut self.emitter)? {
            self.emitter.buffer.drain_into(&mut out);
        }
        trace!(len = out.len(), "saved to string");
        Ok(out)
    }
}

/// Reads a save as characters.
pub struct SaveChars<'s> {
    store: &'s Store,
    saver: TextSaver,
}

impl<'s> SaveChars<'s> {
    pub(crate) fn new(store: &'s Store, node: Node, options: &SaveOptions) -> Result<Self, Error> {
        Ok(Self {
            store,
            saver: TextSaver::new(store, node, options)?,
        })
    }

    /// Fill `dst` with the next characters of output. Returns the number
    /// of characters written, `0` once the save is complete.
    pub fn read(&mut self, dst: &mut [char]) -> Result<usize, Error> {
        self.saver.read(self.store, dst)
    }
}

/// Reads a save as encoded bytes.
///
/// Characters the output encoding cannot represent are written as numeric
/// character references.
pub struct SaveReader<'s> {
    store: &'s Store,
    saver: TextSaver,
    encoding: &'static Encoding,
    pending: Vec<u8>,
    offset: usize,
}

impl<'s> SaveReader<'s> {
    pub(crate) fn new(store: &'s Store, node: Node, options: &SaveOptions) -> Result<Self, Error> {
        Ok(Self {
            store,
            saver: TextSaver::new(store, node, options)?,
            encoding: output_encoding(options)?,
            pending: Vec::new(),
            offset: 0,
        })
    }

    /// The encoding the bytes are produced in.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding.output_encoding()
    }
}

fn into_io_error(error: Error) -> io::Error {
    match error {
        Error::Io(error) => error,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

impl io::Read for SaveReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.offset >= self.pending.len() {
            let chunk = self
                .saver
                .read_chunk(self.store, buf.len())
                .map_err(into_io_error)?;
            let Some(chunk) = chunk else {
                return Ok(0);
            };
            let (bytes, _, _) = self.encoding.encode(&chunk);
            self.pending = bytes.into_owned();
            self.offset = 0;
        }
        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;
    use crate::position::{Position, Run};

    fn save(store: &Store, node: Node, options: &SaveOptions) -> String {
        TextSaver::new(store, node, options)
            .unwrap()
            .save_to_string(store)
            .unwrap()
    }

    #[test]
    fn test_bad_chars() {
        assert!(is_bad_char('\u{1}'));
        assert!(is_bad_char('\u{fffe}'));
        assert!(!is_bad_char('\t'));
        assert!(!is_bad_char('\u{10000}'));
    }

    #[test]
    fn test_read_in_small_pieces() {
        let mut store = Store::new();
        let root = store.parse("<a b=\"&lt;\">x &amp; y</a>").unwrap();
        let mut saver = TextSaver::new(&store, root, &SaveOptions::default()).unwrap();
        let mut out = String::new();
        let mut dst = ['\0'; 3];
        loop {
            let n = saver.read(&store, &mut dst).unwrap();
            if n == 0 {
                break;
            }
            out.extend(&dst[..n]);
        }
        assert_eq!(out, "<a b=\"&lt;\">x &amp; y</a>");
    }

    #[test]
    fn test_cdata_threshold() {
        let mut store = Store::new();
        let text = "<<<<<<".repeat(6);
        let name = store.qname("a");
        let a = store.new_element(name);
        store.append_text(a, &text);
        assert_eq!(
            save(&store, a, &SaveOptions::default()),
            format!("<a><![CDATA[{}]]></a>", text)
        );
        let options = SaveOptions {
            cdata_entity_count_threshold: 100,
            ..Default::default()
        };
        assert_eq!(
            save(&store, a, &options),
            format!("<a>{}</a>", "&lt;".repeat(36))
        );
    }

    #[test]
    fn test_cdata_end_is_split() {
        let mut store = Store::new();
        let name = store.qname("a");
        let a = store.new_element(name);
        store.append_text(a, "x]]>y");
        store.mark_cdata(Position::in_run(a, Run::Value, 0));
        let options = SaveOptions {
            use_cdata_bookmarks: true,
            ..Default::default()
        };
        assert_eq!(
            save(&store, a, &options),
            "<a><![CDATA[x]]]]>><![CDATA[y]]></a>"
        );
        assert_eq!(save(&store, a, &SaveOptions::default()), "<a>x]]&gt;y</a>");
    }

    #[test]
    fn test_comment_and_procinst() {
        let mut store = Store::new();
        let root = store.new_root();
        let comment = store.new_comment("a--b-");
        let pi = store.new_processing_instruction("t", "x?>y");
        store.append_child(root, comment).unwrap();
        store.append_child(root, pi).unwrap();
        assert_eq!(
            save(&store, comment, &SaveOptions::default()),
            "<xml-fragment><!--a- b- --></xml-fragment>"
        );
        assert_eq!(
            save(&store, pi, &SaveOptions::default()),
            "<xml-fragment><?t x? >y?></xml-fragment>"
        );
    }

    #[test]
    fn test_doctype_literals() {
        let mut store = Store::new();
        let root = store
            .parse(r#"<!DOCTYPE a SYSTEM 'say "hi".dtd'><a/>"#)
            .unwrap();
        assert_eq!(
            save(&store, root, &SaveOptions::default()),
            "<!DOCTYPE a SYSTEM 'say \"hi\".dtd'>\n<a/>"
        );
    }

    #[test]
    fn test_declaration_and_encoding() {
        let mut store = Store::new();
        let root = store.parse("<a>\u{e9}\u{3b1}</a>").unwrap();
        let options = SaveOptions {
            xml_declaration: true,
            encoding: Some("latin1".to_string()),
            ..Default::default()
        };
        let mut reader = SaveReader::new(&store, root, &options).unwrap();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).unwrap();
        let mut expected =
            b"<?xml version=\"1.0\" encoding=\"windows-1252\"?>\n<a>".to_vec();
        expected.push(0xe9);
        expected.extend_from_slice(b"&#945;</a>");
        assert_eq!(bytes, expected);
    }
}
