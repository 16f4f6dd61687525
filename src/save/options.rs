use std::collections::BTreeMap;

use crate::error::Error;
use crate::name::ExpandedName;

/// How a substituted character is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstitutionMode {
    /// `&#xHH;`
    Hexadecimal,
    /// `&#DD;`
    Decimal,
    /// One of the five predefined entities, such as `&gt;`.
    PredefinedEntity,
}

/// Characters that are written as references instead of literally.
///
/// Substitutions apply to text content and attribute values. Namespace
/// declarations are never rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharacterSubstitutions {
    map: BTreeMap<char, String>,
}

impl CharacterSubstitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substitute `c` using `mode`.
    ///
    /// Only `<`, `>`, `&`, `'` and `"` have predefined entities; asking for
    /// one for any other character is an error.
    pub fn add(&mut self, c: char, mode: SubstitutionMode) -> Result<(), Error> {
        let replacement = match mode {
            SubstitutionMode::Hexadecimal => format!("&#x{:X};", c as u32),
            SubstitutionMode::Decimal => format!("&#{};", c as u32),
            SubstitutionMode::PredefinedEntity => {
                let name = match c {
                    '<' => "lt",
                    '>' => "gt",
                    '&' => "amp",
                    '\'' => "apos",
                    '"' => "quot",
                    _ => return Err(Error::InvalidEntity(c.to_string())),
                };
                format!("&{};", name)
            }
        };
        self.map.insert(c, replacement);
        Ok(())
    }

    pub fn get(&self, c: char) -> Option<&str> {
        self.map.get(&c).map(String::as_str)
    }

    pub fn contains(&self, c: char) -> bool {
        self.map.contains_key(&c)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Options controlling how a tree is saved.
///
/// The defaults write compact XML without declaration, invent `ns1`,
/// `ns2`, ... prefixes where a namespace has no binding, and wrap
/// content that is not a single element in an `xml-fragment` element.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SaveOptions {
    /// Indent elements and trim surrounding whitespace in text.
    pub pretty_print: bool,
    /// Spaces per level; a negative indent keeps everything on one line.
    pub pretty_indent: i32,
    /// Spaces added in front of every indented line.
    pub pretty_offset: usize,
    /// Text longer than this may be written as CDATA.
    pub cdata_length_threshold: usize,
    /// Text with more `<` and `&` than this may be written as CDATA.
    pub cdata_entity_count_threshold: usize,
    /// Write text loaded from CDATA sections as CDATA again.
    pub use_cdata_bookmarks: bool,
    /// Preferred prefix per namespace URI.
    pub suggested_prefixes: BTreeMap<String, String>,
    /// Allow invented bindings to use the default namespace.
    pub use_default_namespace: bool,
    /// Write namespace declarations before other attributes.
    pub namespaces_first: bool,
    /// Declare every namespace the document needs on its first element.
    pub aggressive_namespaces: bool,
    /// Prefix to URI bindings assumed to be declared already.
    pub implicit_namespaces: BTreeMap<String, String>,
    pub substitute_characters: CharacterSubstitutions,
    /// Wrap the saved content in this element.
    pub synthetic_document_element: Option<ExpandedName>,
    /// Save only the content of an element, not its tags.
    pub save_inner: bool,
    /// Use `frag:fragment` instead of `xml-fragment` as wrapper.
    pub use_open_fragment: bool,
    /// Leave out processing instructions with this target.
    pub filter_processing_instruction: Option<String>,
    /// Start the output with an XML declaration.
    pub xml_declaration: bool,
    /// Output encoding label for byte output; UTF-8 when absent.
    pub encoding: Option<String>,
    /// Report namespace declarations as attributes to content handlers too.
    pub sax_namespace_attributes: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            pretty_print: false,
            pretty_indent: 2,
            pretty_offset: 0,
            cdata_length_threshold: 32,
            cdata_entity_count_threshold: 5,
            use_cdata_bookmarks: false,
            suggested_prefixes: BTreeMap::new(),
            use_default_namespace: false,
            namespaces_first: false,
            aggressive_namespaces: false,
            implicit_namespaces: BTreeMap::new(),
            substitute_characters: CharacterSubstitutions::default(),
            synthetic_document_element: None,
            save_inner: false,
            use_open_fragment: false,
            filter_processing_instruction: None,
            xml_declaration: false,
            encoding: None,
            sax_namespace_attributes: true,
        }
    }
}
