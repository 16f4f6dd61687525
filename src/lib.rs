#![forbid(unsafe_code)]

//! An XML infoset store with text runs, positional cursors and a
//! namespace-aware saver.
//!
//! Character data is never split into per-character nodes: each node owns
//! a `value` run (its own text) and an `after` run (the text that follows
//! it). Any point in a tree, inside markup or inside text, has a
//! [`Position`]; cursors and bookmarks placed on positions follow text
//! edits.
//!
//! ```rust
//! use xmlstore::{SaveOptions, Store};
//!
//! let mut store = Store::new();
//! let root = store.parse(r#"<doc xmlns="urn:x"><p>hello</p></doc>"#).unwrap();
//! let doc = store.document_element(root).unwrap();
//! let p = store.first_child(doc).unwrap();
//! store.append_text(p, " world");
//!
//! let options = SaveOptions {
//!     pretty_print: true,
//!     ..Default::default()
//! };
//! assert_eq!(
//!     store.save_to_string(root, &options).unwrap(),
//!     "<doc xmlns=\"urn:x\">\n  <p>hello world</p>\n</doc>"
//! );
//! ```

mod access;
mod bookmark;
mod chars;
mod creation;
mod cursor;
mod encoding;
mod entity;
mod error;
mod idmap;
mod manipulation;
mod name;
mod nameaccess;
mod namespace;
mod parse;
mod position;
mod prefix;
mod query;
mod save;
mod store;
mod text;
mod typed;
mod valueaccess;
mod walk;

pub use bookmark::{BookmarkKey, BookmarkValue};
pub use chars::WhitespaceRule;
pub use cursor::CursorId;
pub use error::Error;
pub use name::{ExpandedName, NameId, QName};
pub use namespace::{NamespaceId, FRAGMENT_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE};
pub use parse::LoadOptions;
pub use position::{Pos, Position, Run};
pub use prefix::PrefixId;
pub use query::{ChildPathEngine, QueryEngine};
pub use save::{
    CharacterSubstitutions, ContentHandler, HandlerResult, SaveChars, SaveEvent, SaveOptions,
    SaveReader, SaxAttribute, SubstitutionMode,
};
pub use store::{DocumentProperties, Node, NodeKind, Store};
pub use typed::TypedValue;
pub use walk::{Token, Walker};
