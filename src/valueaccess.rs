use crate::chars::{Scrubber, WhitespaceRule};
use crate::name::{ExpandedName, NameId};
use crate::store::{Node, NodeKind, Store};
use crate::walk::{Token, Walker};

/// ## Values as strings
impl Store {
    /// The text value of a node under a whitespace rule.
    ///
    /// For attributes, comments and processing instructions this is their
    /// value. For containers it is all text of the content in document
    /// order; comment and processing instruction text is not included.
    /// Vacant nodes contribute the text of their typed value.
    ///
    /// ```rust
    /// use xmlstore::{Store, WhitespaceRule};
    ///
    /// let mut store = Store::new();
    /// let root = store.parse("<a> x <b>y</b><!--no-->  z </a>").unwrap();
    /// let a = store.document_element(root).unwrap();
    /// assert_eq!(store.value_as_string(a, WhitespaceRule::Collapse), "x y z");
    /// ```
    pub fn value_as_string(&self, node: Node, rule: WhitespaceRule) -> String {
        let mut scrubber = Scrubber::new(rule);
        if !self.kind(node).is_container() {
            self.push_value(node, &mut scrubber);
            return scrubber.finish();
        }
        let mut walker = Walker::at(node);
        loop {
            match walker.token(self) {
                Token::End(_) if walker.node() == node => break,
                Token::Start(NodeKind::Comment | NodeKind::ProcessingInstruction) => {
                    if !walker.skip(self) {
                        break;
                    }
                    continue;
                }
                Token::Start(_) => {
                    if self.data(walker.node()).vacant {
                        self.push_value(walker.node(), &mut scrubber);
                    }
                }
                Token::Text => scrubber.push(walker.chars(self)),
                Token::End(_) => {}
            }
            if !walker.next(self) {
                break;
            }
        }
        scrubber.finish()
    }

    /// The text value of a node with whitespace preserved.
    pub fn text_content(&self, node: Node) -> String {
        self.value_as_string(node, WhitespaceRule::Preserve)
    }

    /// The value of the attribute `name` on `element`.
    pub fn attribute_value(&self, element: Node, name: NameId) -> Option<String> {
        self.find_attribute(element, name)
            .map(|attribute| self.text_content(attribute))
    }

    /// Read the value of a node as a `prefix:local` qualified name,
    /// resolving the prefix against the namespace declarations in scope.
    ///
    /// Returns `None` when the prefix is not declared.
    pub fn value_as_qname(&self, node: Node) -> Option<ExpandedName> {
        let value = self.value_as_string(node, WhitespaceRule::Collapse);
        let (prefix, local) = match value.split_once(':') {
            Some((prefix, local)) => (prefix, local),
            None => ("", value.as_str()),
        };
        let namespace = self.namespace_for_prefix(node, prefix, true)?;
        Some(ExpandedName::new(&namespace, local, prefix))
    }

    fn push_value(&self, node: Node, scrubber: &mut Scrubber) {
        match self.data(node).typed.as_ref() {
            Some(typed) if self.data(node).vacant => {
                let text: Vec<char> = typed.build_text().chars().collect();
                scrubber.push(&text);
            }
            _ => scrubber.push(self.value_chars(node)),
        }
    }
}
