use insta::assert_snapshot;
use rstest::rstest;

use xmlstore::{SaveOptions, Store};

fn pretty(xml: &str, indent: i32) -> String {
    let mut store = Store::new();
    let root = store.parse(xml).unwrap();
    let options = SaveOptions {
        pretty_print: true,
        pretty_indent: indent,
        ..Default::default()
    };
    store.save_to_string(root, &options).unwrap()
}

#[rstest]
#[case("<doc/>", "<doc/>")]
#[case("<doc><a/></doc>", "<doc>\n  <a/>\n</doc>")]
#[case("<doc><a>text</a></doc>", "<doc>\n  <a>text</a>\n</doc>")]
#[case("<doc>\n\n   <a>  text  </a>   </doc>", "<doc>\n  <a>text</a>\n</doc>")]
#[case("<doc><!--c--><a/></doc>", "<doc>\n  <!--c-->\n  <a/>\n</doc>")]
#[case("<!--c--><doc/>", "<!--c-->\n<doc/>")]
fn test_pretty_cases(#[case] xml: &str, #[case] expected: &str) {
    assert_eq!(pretty(xml, 2), expected);
}

#[test]
fn test_nested_elements() {
    assert_snapshot!(pretty("<doc><a><b/></a><a>text</a></doc>", 2), @r###"
    <doc>
      <a>
        <b/>
      </a>
      <a>text</a>
    </doc>
    "###);
}

#[test]
fn test_mixed_content() {
    assert_snapshot!(pretty("<doc><p>Hello <em>world</em>!</p></doc>", 2), @r###"
    <doc>
      <p>
        Hello
        <em>world</em>
        !
      </p>
    </doc>
    "###);
}

#[test]
fn test_wider_indent() {
    assert_eq!(
        pretty("<doc><a><b/></a></doc>", 4),
        "<doc>\n    <a>\n        <b/>\n    </a>\n</doc>"
    );
}

#[test]
fn test_negative_indent_keeps_one_line() {
    assert_eq!(
        pretty("<doc>\n  <a> x </a>\n</doc>", -1),
        "<doc><a>x</a></doc>"
    );
}

#[test]
fn test_offset() {
    let mut store = Store::new();
    let root = store.parse("<doc><a/></doc>").unwrap();
    let options = SaveOptions {
        pretty_print: true,
        pretty_offset: 3,
        ..Default::default()
    };
    assert_eq!(
        store.save_to_string(root, &options).unwrap(),
        "   <doc>\n     <a/>\n   </doc>"
    );
}

#[test]
fn test_carriage_return_kept_when_pretty() {
    let mut store = Store::new();
    let name = store.qname("a");
    let a = store.new_element(name);
    store.append_text(a, "x\ry");
    let options = SaveOptions {
        pretty_print: true,
        ..Default::default()
    };
    assert_eq!(store.save_to_string(a, &options).unwrap(), "<a>x\ry</a>");
}
