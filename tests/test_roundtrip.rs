use proptest::prelude::*;
use rstest::rstest;

use xmlstore::{Node, Store};

const NAMESPACES: &[&str] = &["", "urn:x", "urn:y"];
const ELEMENT_NAMES: &[&str] = &["a", "b", "c"];
const ATTRIBUTE_NAMES: &[&str] = &["q", "r"];
// no carriage returns and no `]`: both have dedicated save tests
const TEXT: &str = "[ab <&>\"'\n\u{e9}]{1,40}";
const ATTRIBUTE_VALUE: &str = "[ab <&>\"']{0,10}";
const COMMENT: &str = "[ab <&>]{0,10}";

#[derive(Debug, Clone)]
enum Shape {
    Text(String),
    Comment(String),
    Element {
        name: &'static str,
        namespace: &'static str,
        attributes: Vec<(&'static str, &'static str, String)>,
        children: Vec<Shape>,
    },
}

fn arb_element(children: impl Strategy<Value = Vec<Shape>>) -> impl Strategy<Value = Shape> {
    (
        prop::sample::select(ELEMENT_NAMES),
        prop::sample::select(NAMESPACES),
        prop::collection::vec(
            (
                prop::sample::select(ATTRIBUTE_NAMES),
                prop::sample::select(NAMESPACES),
                ATTRIBUTE_VALUE,
            ),
            0..3,
        ),
        children,
    )
        .prop_map(|(name, namespace, attributes, children)| Shape::Element {
            name,
            namespace,
            attributes,
            children,
        })
}

fn arb_document() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        TEXT.prop_map(Shape::Text),
        COMMENT.prop_map(Shape::Comment),
    ];
    let content = leaf.prop_recursive(4, 32, 5, |inner| {
        prop_oneof![
            inner.clone(),
            arb_element(prop::collection::vec(inner, 0..5)),
        ]
    });
    arb_element(prop::collection::vec(content, 0..5))
}

fn build(store: &mut Store, parent: Node, shape: &Shape) {
    match shape {
        Shape::Text(text) => {
            store.append_text(parent, text);
        }
        Shape::Comment(text) => {
            let comment = store.new_comment(text);
            store.append_child(parent, comment).unwrap();
        }
        Shape::Element {
            name,
            namespace,
            attributes,
            children,
        } => {
            let name = store.qname_ns(namespace, name, "");
            let element = store.new_element(name);
            store.append_child(parent, element).unwrap();
            for (name, namespace, value) in attributes {
                let name = store.qname_ns(namespace, name, "");
                store.set_attribute(element, name, value).unwrap();
            }
            for child in children {
                build(store, element, child);
            }
        }
    }
}

fn reparse(xml: &str) -> (Store, Node) {
    let mut store = Store::new();
    let root = store.parse(xml).unwrap();
    (store, root)
}

proptest! {
    #[test]
    fn test_save_then_parse_keeps_text(shape in arb_document()) {
        let mut store = Store::new();
        let root = store.new_root();
        build(&mut store, root, &shape);
        let expected = store.text_content(root);

        let xml = store.to_string(root).unwrap();
        let (parsed, parsed_root) = reparse(&xml);
        prop_assert_eq!(parsed.text_content(parsed_root), expected);
    }

    #[test]
    fn test_save_is_stable_after_parse(shape in arb_document()) {
        let mut store = Store::new();
        let root = store.new_root();
        build(&mut store, root, &shape);

        let first = store.to_string(root).unwrap();
        let (mut parsed, parsed_root) = reparse(&first);
        let second = parsed.to_string(parsed_root).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_attribute_values_survive(value in ATTRIBUTE_VALUE) {
        let mut store = Store::new();
        let name = store.qname("a");
        let a = store.new_element(name);
        let x = store.qname("x");
        store.set_attribute(a, x, &value).unwrap();

        let xml = store.to_string(a).unwrap();
        let (parsed, root) = reparse(&xml);
        let a = parsed.document_element(root).unwrap();
        let x = parsed.name_ns("x", parsed.no_namespace()).unwrap();
        prop_assert_eq!(parsed.attribute_value(a, x), Some(value));
    }
}

#[rstest]
#[case(r#"<root><a>1</a><b>2</b></root>"#)]
#[case(r#"<foo:root xmlns:foo="http://example.com"><foo:a>1</foo:a><foo:b>2</foo:b></foo:root>"#)]
#[case(r#"<root xmlns:foo="http://example.com"><a>1</a><foo:b>2</foo:b></root>"#)]
#[case(r#"<root xmlns="http://example.com"><a>1</a><b>2</b></root>"#)]
#[case(r#"<a xmlns="urn:x"><b xmlns=""><c xmlns="urn:x"/></b></a>"#)]
#[case(r#"<a><!--note--><?pi data?>text<b/>tail</a>"#)]
#[case(r#"<a x="1" xml:lang="en">&lt;&amp;></a>"#)]
fn test_roundtrip(#[case] xml: &str) {
    let (mut store, root) = reparse(xml);
    assert_eq!(store.to_string(root).unwrap(), xml);
}
