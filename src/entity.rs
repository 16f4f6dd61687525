use std::borrow::Cow;

use crate::error::Error;

/// Resolve the predefined entities and character references in `content`.
///
/// Returns the input unchanged when there is nothing to resolve.
pub(crate) fn parse_entities(content: &str) -> Result<Cow<str>, Error> {
    if !content.contains('&') {
        return Ok(Cow::Borrowed(content));
    }
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c != '&' {
            result.push(c);
            continue;
        }
        let mut entity = String::new();
        let mut is_complete = false;
        for c in chars.by_ref() {
            if c == ';' {
                is_complete = true;
                break;
            }
            entity.push(c);
        }
        if !is_complete {
            return Err(Error::UnclosedEntity(entity));
        }
        result.push(resolve(&entity).ok_or(Error::InvalidEntity(entity))?);
    }
    Ok(Cow::Owned(result))
}

fn resolve(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "apos" => Some('\''),
        "gt" => Some('>'),
        "lt" => Some('<'),
        "quot" => Some('"'),
        _ => {
            let reference = entity.strip_prefix('#')?;
            let code = match reference.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => reference.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Normalize line endings: `\r\n` and a lone `\r` become `\n`.
pub(crate) fn normalize_newlines(content: &str) -> Cow<str> {
    if !content.contains('\r') {
        return Cow::Borrowed(content);
    }
    Cow::Owned(content.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Attribute value normalization: literal whitespace becomes a space.
pub(crate) fn normalize_attribute(content: &str) -> Cow<str> {
    if !content.contains(['\t', '\n', '\r']) {
        return Cow::Borrowed(content);
    }
    Cow::Owned(
        content
            .replace("\r\n", " ")
            .replace(['\t', '\n', '\r'], " "),
    )
}
