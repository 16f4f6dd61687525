//! Saving a store, or any part of it, as XML text, bytes, events or SAX
//! callbacks.
//!
//! All outputs share one saver: it walks a save cursor,
//! keeps namespace scope and hands resolved tokens to an emitter. The
//! [`SaveOptions`] decide what is saved and how it looks.
mod buffer;
mod cursor;
mod events;
mod filter;
mod namespaces;
mod options;
mod pretty;
mod sax;
mod saver;
mod text;

use std::io;

use tracing::debug;

pub use events::SaveEvent;
pub use options::{CharacterSubstitutions, SaveOptions, SubstitutionMode};
pub use sax::{ContentHandler, HandlerResult, SaxAttribute};
pub use text::{SaveChars, SaveReader};

use crate::error::Error;
use crate::store::{Node, Store};

use saver::Saver;
use text::{output_encoding, TextSaver};

// characters rendered per write when saving to a writer
const WRITE_CHUNK: usize = 1024;

/// Saving
impl Store {
    /// Save `node` as XML text with default options.
    ///
    /// ```rust
    /// use xmlstore::Store;
    ///
    /// let mut store = Store::new();
    /// let root = store.parse("<a><b>x</b></a>").unwrap();
    /// assert_eq!(store.to_string(root).unwrap(), "<a><b>x</b></a>");
    /// ```
    pub fn to_string(&mut self, node: Node) -> Result<String, Error> {
        self.save_to_string(node, &SaveOptions::default())
    }

    /// Save `node` as XML text.
    ///
    /// Elements, attributes, comments and processing instructions are saved
    /// on their own; anything that is not a single element is wrapped in a
    /// fragment element.
    pub fn save_to_string(&mut self, node: Node, options: &SaveOptions) -> Result<String, Error> {
        self.ensure_occupancy_deep(node);
        TextSaver::new(self, node, options)?.save_to_string(self)
    }

    /// Save `node` to a writer, encoded as [`SaveOptions::encoding`]
    /// (UTF-8 by default).
    pub fn save_to_writer<W: io::Write>(
        &mut self,
        node: Node,
        options: &SaveOptions,
        mut writer: W,
    ) -> Result<(), Error> {
        self.ensure_occupancy_deep(node);
        let encoding = output_encoding(options)?;
        let mut saver = TextSaver::new(self, node, options)?;
        while let Some(chunk) = saver.read_chunk(self, WRITE_CHUNK)? {
            let (bytes, _, _) = encoding.encode(&chunk);
            writer.write_all(&bytes)?;
        }
        writer.flush()?;
        debug!(encoding = encoding.name(), "saved to writer");
        Ok(())
    }

    /// Save `node` as encoded bytes.
    pub fn save_to_bytes(&mut self, node: Node, options: &SaveOptions) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        self.save_to_writer(node, options, &mut bytes)?;
        Ok(bytes)
    }

    /// A reader producing the saved bytes on demand.
    ///
    /// The store stays borrowed while the reader lives.
    pub fn save_reader(
        &mut self,
        node: Node,
        options: &SaveOptions,
    ) -> Result<SaveReader<'_>, Error> {
        self.ensure_occupancy_deep(node);
        SaveReader::new(self, node, options)
    }

    /// A pull source for the saved characters.
    ///
    /// ```rust
    /// use xmlstore::{SaveOptions, Store};
    ///
    /// let mut store = Store::new();
    /// let root = store.parse("<a>x</a>").unwrap();
    /// let mut chars = store.save_chars(root, &SaveOptions::default()).unwrap();
    /// let mut buf = ['\0'; 4];
    /// assert_eq!(chars.read(&mut buf).unwrap(), 4);
    /// assert_eq!(buf, ['<', 'a', '>', 'x']);
    /// ```
    pub fn save_chars(
        &mut self,
        node: Node,
        options: &SaveOptions,
    ) -> Result<SaveChars<'_>, Error> {
        self.ensure_occupancy_deep(node);
        SaveChars::new(self, node, options)
    }

    /// The save of `node` as a lazy sequence of events.
    ///
    /// The sequence stops after the first error.
    pub fn save_events(
        &mut self,
        node: Node,
        options: &SaveOptions,
    ) -> Result<impl Iterator<Item = Result<SaveEvent, Error>> + '_, Error> {
        self.ensure_occupancy_deep(node);
        let store: &Store = self;
        let saver = Saver::new(store, node, options)?;
        Ok(events::gen_events(store, saver, options.use_cdata_bookmarks))
    }

    /// Report the save of `node` to a SAX-style handler.
    pub fn save_to_handler(
        &mut self,
        node: Node,
        options: &SaveOptions,
        handler: &mut dyn ContentHandler,
    ) -> Result<(), Error> {
        self.ensure_occupancy_deep(node);
        let saver = Saver::new(self, node, options)?;
        sax::save_to_handler(self, saver, options, handler)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn test_to_string() {
        let mut store = Store::new();
        let root = store.parse(r#"<a x="1"><b>x &amp; y</b><c/></a>"#).unwrap();
        assert_eq!(
            store.to_string(root).unwrap(),
            r#"<a x="1"><b>x &amp; y</b><c/></a>"#
        );
    }

    #[test]
    fn test_save_to_bytes_in_encoding() {
        let mut store = Store::new();
        let root = store.parse("<a>é€</a>").unwrap();
        let options = SaveOptions {
            encoding: Some("ISO-8859-1".to_string()),
            ..Default::default()
        };
        let bytes = store.save_to_bytes(root, &options).unwrap();
        // windows-1252 has both characters
        assert_eq!(bytes, b"<a>\xe9\x80</a>");
    }

    #[test]
    fn test_unknown_encoding() {
        let mut store = Store::new();
        let root = store.parse("<a/>").unwrap();
        let options = SaveOptions {
            encoding: Some("no-such-encoding".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.save_to_bytes(root, &options),
            Err(Error::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_reader_matches_string() {
        let mut store = Store::new();
        let root = store.parse("<a><b>text</b><!--c--></a>").unwrap();
        let expected = store.to_string(root).unwrap();
        let mut reader = store.save_reader(root, &SaveOptions::default()).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_chars_in_small_reads() {
        let mut store = Store::new();
        let root = store.parse(r#"<a x="1"><b>text &amp; more</b></a>"#).unwrap();
        let expected: Vec<char> = store.to_string(root).unwrap().chars().collect();
        let mut chars = store.save_chars(root, &SaveOptions::default()).unwrap();
        let mut out = Vec::new();
        let mut buf = ['\0'; 3];
        loop {
            let n = chars.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, expected);
    }

    #[test]
    fn test_events_from_store() {
        let mut store = Store::new();
        let root = store.parse("<a>x</a>").unwrap();
        let events = store
            .save_events(root, &SaveOptions::default())
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], SaveEvent::StartDocument);
        assert_eq!(events[4], SaveEvent::EndDocument);
    }
}
