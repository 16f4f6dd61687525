use thiserror::Error;

use crate::store::Node;

/// Errors produced while loading, mutating or saving a [`Store`](crate::Store).
#[derive(Debug, Error)]
pub enum Error {
    /// An entity reference was not terminated by `;`.
    #[error("unclosed entity: {0}")]
    UnclosedEntity(String),
    /// An entity reference that is not predefined or a character reference.
    #[error("invalid entity: {0}")]
    InvalidEntity(String),
    /// A prefix was used that has no namespace declaration in scope.
    #[error("unknown prefix: {0}")]
    UnknownPrefix(String),
    /// A closing tag does not match the open element.
    #[error("invalid close tag: expected {0}, found {1}")]
    InvalidCloseTag(String, String),
    /// The input ended while elements were still open.
    #[error("unclosed tag")]
    UnclosedTag,
    /// The saver could not find a non-default prefix for an attribute
    /// namespace.
    #[error("no prefix for namespace: {0}")]
    NoPrefixForNamespace(String),
    /// The store was mutated while a save was in progress.
    #[error("document changed during save")]
    DocumentChanged,
    /// A node cannot be placed at the requested position.
    #[error("invalid structure: {0}")]
    InvalidStructure(&'static str),
    /// The operation requires a node of another kind.
    #[error("unexpected node kind for {0:?}")]
    UnexpectedKind(Node),
    /// The requested encoding label is unknown.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
    /// A path expression could not be parsed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    /// A handler passed to the saver reported a failure.
    #[error("handler error: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Node(#[from] indextree::NodeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parser(#[from] xmlparser::Error),
}
