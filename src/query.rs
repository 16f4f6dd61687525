//! A seam for selecting nodes with path expressions.
//!
//! Full XPath is out of reach of this crate; callers that need it plug in
//! their own [`QueryEngine`]. [`ChildPathEngine`] covers simple location
//! paths over the child, attribute, self and parent axes.
use ahash::{HashSet, HashSetExt};
use tracing::trace;

use crate::error::Error;
use crate::store::{Node, Store};

/// Selects nodes relative to a context node.
pub trait QueryEngine {
    /// Nodes matched by `expr`, in document order of discovery, without
    /// duplicates.
    fn select(&self, store: &Store, context: Node, expr: &str) -> Result<Vec<Node>, Error>;
}

/// Evaluates `/`-separated steps: `name`, `prefix:name`, `*`, `@name`,
/// `@*`, `.` and `..`. A leading `/` starts at the top of the tree.
///
/// Unprefixed names match nodes in no namespace. A prefix is resolved
/// against the declarations in scope at the node a step starts from.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChildPathEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Name { prefix: String, local: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    SelfNode,
    Parent,
    Child(NameTest),
    Attribute(NameTest),
}

fn name_test(test: &str, expr: &str) -> Result<NameTest, Error> {
    if test == "*" {
        return Ok(NameTest::Any);
    }
    let (prefix, local) = test.split_once(':').unwrap_or(("", test));
    if local.is_empty() || local.contains(|c: char| c == ':' || c == '@' || c.is_whitespace()) {
        return Err(Error::InvalidQuery(expr.to_string()));
    }
    Ok(NameTest::Name {
        prefix: prefix.to_string(),
        local: local.to_string(),
    })
}

fn parse_steps(expr: &str) -> Result<Vec<Step>, Error> {
    let path = expr.trim();
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split('/')
        .map(|step| match step.trim() {
            "" => Err(Error::InvalidQuery(expr.to_string())),
            "." => Ok(Step::SelfNode),
            ".." => Ok(Step::Parent),
            step => match step.strip_prefix('@') {
                Some(test) => Ok(Step::Attribute(name_test(test, expr)?)),
                None => Ok(Step::Child(name_test(step, expr)?)),
            },
        })
        .collect()
}

/// The `(namespace, local)` pair a test matches, with its prefix resolved
/// at `scope`. `None` matches any name.
fn resolve<'t>(
    store: &Store,
    scope: Node,
    test: &'t NameTest,
) -> Result<Option<(String, &'t str)>, Error> {
    match test {
        NameTest::Any => Ok(None),
        NameTest::Name { prefix, local } if prefix.is_empty() => {
            Ok(Some((String::new(), local.as_str())))
        }
        NameTest::Name { prefix, local } => {
            let namespace = store
                .namespace_for_prefix(scope, prefix, false)
                .ok_or_else(|| Error::UnknownPrefix(prefix.clone()))?;
            Ok(Some((namespace, local.as_str())))
        }
    }
}

fn matches(store: &Store, node: Node, name: &Option<(String, &str)>) -> bool {
    match name {
        None => true,
        Some((namespace, local)) => {
            store.local_name(node) == *local && store.namespace_uri(node) == namespace.as_str()
        }
    }
}

impl QueryEngine for ChildPathEngine {
    fn select(&self, store: &Store, context: Node, expr: &str) -> Result<Vec<Node>, Error> {
        let steps = parse_steps(expr)?;
        let start = if expr.trim_start().starts_with('/') {
            store.top(context)
        } else {
            context
        };

        let mut current = vec![start];
        for step in &steps {
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            for node in current {
                let found: Vec<Node> = match step {
                    Step::SelfNode => vec![node],
                    Step::Parent => store.parent(node).into_iter().collect(),
                    Step::Child(test) => {
                        let name = resolve(store, node, test)?;
                        store
                            .children(node)
                            .filter(|n| store.is_element(*n) && matches(store, *n, &name))
                            .collect()
                    }
                    Step::Attribute(test) => {
                        let name = resolve(store, node, test)?;
                        store
                            .attributes(node)
                            .filter(|n| !store.is_xmlns(*n) && matches(store, *n, &name))
                            .collect()
                    }
                };
                next.extend(found.into_iter().filter(|n| seen.insert(*n)));
            }
            current = next;
        }
        trace!(expr, count = current.len(), "selected nodes");
        Ok(current)
    }
}

/// ## Querying
impl Store {
    /// Select nodes with a [`ChildPathEngine`] expression.
    ///
    /// ```rust
    /// use xmlstore::Store;
    ///
    /// let mut store = Store::new();
    /// let root = store.parse(r#"<a><b x="1"/><c/><b x="2"/></a>"#).unwrap();
    /// let found = store.select(root, "a/b/@x").unwrap();
    /// let values: Vec<String> = found.iter().map(|n| store.text_content(*n)).collect();
    /// assert_eq!(values, vec!["1", "2"]);
    /// ```
    pub fn select(&self, context: Node, expr: &str) -> Result<Vec<Node>, Error> {
        ChildPathEngine.select(self, context, expr)
    }

    /// Select nodes with the given engine.
    pub fn select_with(
        &self,
        engine: &dyn QueryEngine,
        context: Node,
        expr: &str,
    ) -> Result<Vec<Node>, Error> {
        engine.select(self, context, expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const XML: &str =
        r#"<doc xmlns:p="urn:p"><a id="1"><b/></a><p:a id="2"/><a id="3"><b/><b/></a></doc>"#;

    #[rstest]
    #[case("doc/a", 2)]
    #[case("doc/*", 3)]
    #[case("doc/p:a", 1)]
    #[case("doc/a/b", 3)]
    #[case("doc/a/@id", 2)]
    #[case("doc/*/@*", 3)]
    #[case("doc/a/b/..", 2)]
    #[case("doc/./a/.", 2)]
    #[case("/doc", 1)]
    #[case("", 1)]
    #[case("doc/missing", 0)]
    fn test_select_count(#[case] expr: &str, #[case] count: usize) {
        let mut store = Store::new();
        let root = store.parse(XML).unwrap();
        assert_eq!(store.select(root, expr).unwrap().len(), count);
    }

    #[test]
    fn test_absolute_path_from_inner_node() {
        let mut store = Store::new();
        let root = store.parse(XML).unwrap();
        let doc = store.document_element(root).unwrap();
        let inner = store.select(doc, "a/b").unwrap()[0];
        let found = store.select(inner, "/doc/p:a").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(store.namespace_uri(found[0]), "urn:p");
    }

    #[test]
    fn test_invalid_expressions() {
        let mut store = Store::new();
        let root = store.parse(XML).unwrap();
        assert!(matches!(
            store.select(root, "doc//a"),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            store.select(root, "doc/q:a"),
            Err(Error::UnknownPrefix(_))
        ));
    }

    #[test]
    fn test_custom_engine() {
        struct Everything;

        impl QueryEngine for Everything {
            fn select(&self, store: &Store, context: Node, _expr: &str) -> Result<Vec<Node>, Error> {
                Ok(store.subtree(context).collect())
            }
        }

        let mut store = Store::new();
        let root = store.parse("<a><b/></a>").unwrap();
        let found = store.select_with(&Everything, root, "ignored").unwrap();
        assert_eq!(found.len(), store.subtree(root).count());
    }
}
