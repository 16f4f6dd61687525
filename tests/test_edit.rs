use xmlstore::{
    ExpandedName, Position, Run, SaveEvent, SaveOptions, Store, Token, Walker,
};

#[test]
fn test_cursor_follows_text_edits() {
    let mut store = Store::new();
    let root = store.parse("<a>hello</a>").unwrap();
    let a = store.document_element(root).unwrap();
    let cursor = store.attach_cursor(Position::in_run(a, Run::Value, 2));

    store.insert_chars(Position::in_run(a, Run::Value, 0), "XY");
    assert_eq!(
        store.cursor_position(cursor),
        Some(store.normalize(Position::in_run(a, Run::Value, 4)))
    );

    let removed = store.remove_chars(Position::in_run(a, Run::Value, 0), 3);
    assert_eq!(removed, "XYh");
    assert_eq!(
        store.cursor_position(cursor),
        Some(store.normalize(Position::in_run(a, Run::Value, 1)))
    );

    store.cursor_insert_chars(cursor, "-");
    assert_eq!(store.to_string(root).unwrap(), "<a>e-llo</a>");
}

#[test]
fn test_moved_element_keeps_its_text() {
    let mut store = Store::new();
    let root = store.parse("<doc><a>one</a>tail<b/></doc>").unwrap();
    let doc = store.document_element(root).unwrap();
    let a = store.first_child(doc).unwrap();
    let b = store.last_child(doc).unwrap();

    store.append_child(b, a).unwrap();
    assert_eq!(
        store.to_string(root).unwrap(),
        "<doc>tail<b><a>one</a></b></doc>"
    );
}

#[test]
fn test_walker_tokens() {
    let mut store = Store::new();
    let root = store.parse("<a>x<b/></a>").unwrap();
    let a = store.document_element(root).unwrap();

    let mut walker = Walker::at(a);
    let mut tokens = vec![walker.token(&store)];
    while walker.next(&store) && walker.node() != root {
        tokens.push(walker.token(&store));
    }
    assert_eq!(tokens.len(), 5);
    assert_eq!(tokens[1], Token::Text);
    assert!(matches!(tokens[4], Token::End(_)));
}

#[test]
fn test_events_for_document() {
    let mut store = Store::new();
    let root = store.parse(r#"<a x="1">t<!--c--></a>"#).unwrap();
    let events = store
        .save_events(root, &SaveOptions::default())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let a = ExpandedName::new("", "a", "");
    assert_eq!(
        events,
        vec![
            SaveEvent::StartDocument,
            SaveEvent::StartElement {
                name: a.clone(),
                attributes: vec![(ExpandedName::new("", "x", ""), "1".to_string())],
                namespaces: vec![],
            },
            SaveEvent::Text {
                text: "t".to_string(),
                cdata: false,
            },
            SaveEvent::Comment("c".to_string()),
            SaveEvent::EndElement { name: a },
            SaveEvent::EndDocument,
        ]
    );
}

#[test]
fn test_select_then_edit() {
    let mut store = Store::new();
    let root = store
        .parse(r#"<list><item n="1"/><item n="2"/><other/></list>"#)
        .unwrap();
    let list = store.document_element(root).unwrap();
    let items = store.select(list, "item").unwrap();
    assert_eq!(items.len(), 2);
    for item in items {
        store.append_text(item, "!");
    }
    assert_eq!(
        store.to_string(root).unwrap(),
        r#"<list><item n="1">!</item><item n="2">!</item><other/></list>"#
    );
}
