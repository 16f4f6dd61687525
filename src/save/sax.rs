use crate::error::Error;
use crate::namespace::XMLNS_NAMESPACE;
use crate::store::Store;

use super::options::SaveOptions;
use super::saver::{prefixed_name, ElementStart, EmitContext, Emitter, Saver};

/// What a [`ContentHandler`] callback returns. Failures abort the save and
/// come back as [`Error::Handler`].
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// An attribute passed to [`ContentHandler::start_element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaxAttribute {
    pub uri: String,
    pub local_name: String,
    /// The name as written, with its prefix.
    pub qname: String,
    pub value: String,
}

/// Receives a save as SAX-style callbacks.
///
/// Only the element and text callbacks are required; the lexical ones
/// (comments, doctype, CDATA boundaries) default to doing nothing.
pub trait ContentHandler {
    fn start_document(&mut self) -> HandlerResult {
        Ok(())
    }

    fn end_document(&mut self) -> HandlerResult {
        Ok(())
    }

    /// Called before the `start_element` of the element declaring it.
    fn start_prefix_mapping(&mut self, _prefix: &str, _uri: &str) -> HandlerResult {
        Ok(())
    }

    /// Called after the `end_element` of the element declaring it.
    fn end_prefix_mapping(&mut self, _prefix: &str) -> HandlerResult {
        Ok(())
    }

    fn start_element(
        &mut self,
        uri: &str,
        local_name: &str,
        qname: &str,
        attributes: &[SaxAttribute],
    ) -> HandlerResult;

    fn end_element(&mut self, uri: &str, local_name: &str, qname: &str) -> HandlerResult;

    fn characters(&mut self, text: &str) -> HandlerResult;

    fn processing_instruction(&mut self, _target: &str, _data: &str) -> HandlerResult {
        Ok(())
    }

    fn comment(&mut self, _text: &str) -> HandlerResult {
        Ok(())
    }

    fn start_dtd(
        &mut self,
        _name: &str,
        _public_id: Option<&str>,
        _system_id: Option<&str>,
    ) -> HandlerResult {
        Ok(())
    }

    fn end_dtd(&mut self) -> HandlerResult {
        Ok(())
    }

    fn start_cdata(&mut self) -> HandlerResult {
        Ok(())
    }

    fn end_cdata(&mut self) -> HandlerResult {
        Ok(())
    }
}

fn handled(result: HandlerResult) -> Result<(), Error> {
    result.map_err(Error::Handler)
}

struct SaxEmitter<'h> {
    handler: &'h mut dyn ContentHandler,
    namespace_attributes: bool,
    namespaces_first: bool,
    use_cdata_bookmarks: bool,
    attributes: Vec<SaxAttribute>,
}

impl SaxEmitter<'_> {
    fn emit_namespaces(&mut self, cx: &EmitContext) -> Result<(), Error> {
        for (prefix, uri) in cx.namespaces.frame_mappings() {
            handled(self.handler.start_prefix_mapping(prefix, uri))?;
            if self.namespace_attributes {
                let (local_name, qname) = if prefix.is_empty() {
                    ("xmlns".to_string(), "xmlns".to_string())
                } else {
                    (prefix.to_string(), format!("xmlns:{}", prefix))
                };
                self.attributes.push(SaxAttribute {
                    uri: XMLNS_NAMESPACE.to_string(),
                    local_name,
                    qname,
                    value: uri.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Emitter for SaxEmitter<'_> {
    fn emit_element(&mut self, cx: &EmitContext, element: &ElementStart) -> Result<bool, Error> {
        self.attributes.clear();
        if self.namespaces_first {
            self.emit_namespaces(cx)?;
        }
        for attribute in element.attributes {
            self.attributes.push(SaxAttribute {
                uri: attribute.name.namespace.clone(),
                local_name: attribute.name.local.clone(),
                qname: prefixed_name(cx.namespaces, &attribute.name, true)?,
                value: attribute.value.clone(),
            });
        }
        if !self.namespaces_first {
            self.emit_namespaces(cx)?;
        }
        let qname = prefixed_name(cx.namespaces, element.name, false)?;
        handled(self.handler.start_element(
            &element.name.namespace,
            &element.name.local,
            &qname,
            &self.attributes,
        ))?;
        Ok(false)
    }

    fn emit_finish(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let name = cx
            .cursor
            .name(cx.store)
            .ok_or_else(|| Error::UnexpectedKind(cx.cursor.node()))?;
        let qname = prefixed_name(cx.namespaces, &name, false)?;
        handled(self.handler.end_element(&name.namespace, &name.local, &qname))?;
        for (prefix, _) in cx.namespaces.frame_mappings() {
            handled(self.handler.end_prefix_mapping(prefix))?;
        }
        Ok(())
    }

    fn emit_text(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let text: String = cx.cursor.chars(cx.store).iter().collect();
        if self.use_cdata_bookmarks && cx.cursor.is_text_cdata(cx.store) {
            handled(self.handler.start_cdata())?;
            handled(self.handler.characters(&text))?;
            handled(self.handler.end_cdata())
        } else {
            handled(self.handler.characters(&text))
        }
    }

    fn emit_comment(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let text: String = cx.store.value_chars(cx.cursor.node()).iter().collect();
        handled(self.handler.comment(&text))
    }

    fn emit_procinst(&mut self, cx: &EmitContext) -> Result<(), Error> {
        let node = cx.cursor.node();
        let data: String = cx.store.value_chars(node).iter().collect();
        handled(
            self.handler
                .processing_instruction(cx.store.local_name(node), &data),
        )
    }

    fn emit_doctype(
        &mut self,
        name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<(), Error> {
        handled(self.handler.start_dtd(name, public_id, system_id))?;
        handled(self.handler.end_dtd())
    }

    fn emit_start_doc(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }

    fn emit_end_doc(&mut self, _cx: &EmitContext) -> Result<(), Error> {
        Ok(())
    }
}

/// Run `saver` to completion, reporting everything to `handler` between
/// `start_document` and `end_document`.
pub(crate) fn save_to_handler(
    store: &Store,
    mut saver: Saver,
    options: &SaveOptions,
    handler: &mut dyn ContentHandler,
) -> Result<(), Error> {
    handled(handler.start_document())?;
    let mut emitter = SaxEmitter {
        handler,
        namespace_attributes: options.sax_namespace_attributes,
        namespaces_first: options.namespaces_first,
        use_cdata_bookmarks: options.use_cdata_bookmarks,
        attributes: Vec::new(),
    };
    while saver.process(store, &mut emitter)? {}
    handled(emitter.handler.end_document())
}
