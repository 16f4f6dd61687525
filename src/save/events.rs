use genawaiter::rc::gen;
use genawaiter::yield_;

use crate::error::Error;
use crate::name::ExpandedName;
use crate::store::Store;

use super::saver::{resolved_prefix, ElementStart, EmitContext, Emitter, Saver};

/// A save reported as a sequence of structured events.
///
/// Names carry the prefix they are written with, not the one stored on the
/// node. Every `StartElement` is matched by an `EndElement`, also for
/// elements without content.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SaveEvent {
    StartDocument,
    /// Replaces `StartDocument` when the document has a doctype.
    DocType {
        name: String,
        public_id: Option<String>,
        system_id: Option<String>,
    },
    StartElement {
        name: ExpandedName,
        attributes: Vec<(ExpandedName, String)>,
        /// Declarations made on this element, as `(prefix, uri)`.
        namespaces: Vec<(String, String)>,
    },
    EndElement {
        name: ExpandedName,
    },
    Text {
        text: String,
        /// The text carries a CDATA bookmark.
        cdata: bool,
    },
    Comment(String),
    ProcessingInstruction {
        target: String,
        data: String,
    },
    EndDocument,
}

fn resolved(cx: &EmitContext, name: &ExpandedName, needs_prefix: bool) -> Result<ExpandedName, Error> {
    let prefix = resolved_prefix(cx.namespaces, name, needs_prefix)?;
    Ok(ExpandedName::new(&name.namespace, &name.local, prefix))
}

struct EventEmitter {
    use_cdata_bookmarks: bool,
    events: Vec<SaveEvent>,
}

impl Emitter for EventEmitter {
    fn emit_element(&mut self, cx: &EmitContext, element: &ElementStart) -> Result<bool, Error> {
        let attributes = element
            .attributes
            .iter()
            .map(|attribute| Ok((resolved(cx, &attribute.name, true)?, attribute.value.clone())))
            .collect::<Result<Vec<_>, Error>>()?;
        let namespaces = cx
            .namespaces
            .frame_mappings()
            .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
            .collect();
        self.events.push(SaveEvent::StartElement {
            name: resolved(cx, element.name, false)?,
            attributes,
            namespaces,
        });
        Ok(false)
    }

    fn emit_finish(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let name = cx
            .cursor
            .name(cx.store)
            .ok_or_else(|| Error::UnexpectedKind(cx.cursor.node()))?;
        self.events.push(SaveEvent::EndElement {
            name: resolved(cx, &name, false)?,
        });
        Ok(())
    }

    fn emit_text(&mut self, cx: &EmitContext) -> Result<(), Error> {
        self.events.push(SaveEvent::Text {
            text: cx.cursor.chars(cx.store).iter().collect(),
            cdata: self.use_cdata_bookmarks && cx.cursor.is_text_cdata(cx.store),
        });
        Ok(())
    }

    fn emit_comment(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let text = cx.store.value_chars(cx.cursor.node()).iter().collect();
        self.events.push(SaveEvent::Comment(text));
        Ok(())
    }

    fn emit_procinst(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let node = cx.cursor.node();
        self.events.push(SaveEvent::ProcessingInstruction {
            target: cx.store.local_name(node).to_string(),
            data: cx.store.value_chars(node).iter().collect(),
        });
        Ok(())
    }

    fn emit_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), Error> {
        self.events.push(SaveEvent::DocType {
            name: name.to_string(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
        });
        Ok(())
    }

    fn emit_start_doc(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        self.events.push(SaveEvent::StartDocument);
        Ok(())
    }

    fn emit_end_doc(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        self.events.push(SaveEvent::EndDocument);
        Ok(())
    }
}

/// Drive `saver` lazily, one token per step. The first error ends the
/// sequence.
pub(crate) fn gen_events(
    store: &Store,
    mut saver: Saver,
    use_cdata_bookmarks: bool,
) -> impl Iterator<Item = Result<SaveEvent, Error>> + '_ {
    gen!({
        let mut emitter = EventEmitter {
            use_cdata_bookmarks,
            events: Vec::new(),
        };
        loop {
            match saver.process(store, &mut emitter) {
                Ok(more) => {
                    for event in std::mem::take(&mut emitter.events) {
                        yield_!(Ok(event));
                    }
                    if !more {
                        break;
                    }
                }
                Err(error) => {
                    yield_!(Err(error));
                    break;
                }
            }
        }
    })
    .into_iter()
}
