use encoding_rs::{Encoding, UTF_8};
use tracing::warn;
use xhtmlchardet::detect;

use crate::error::Error;

/// Detect the encoding of an XML document from its bytes, taking BOMs and
/// the encoding declaration into account.
pub(crate) fn encoding(data: &[u8], hint: Option<String>) -> Result<&'static Encoding, Error> {
    let mut cursor = std::io::Cursor::new(data);
    let charsets = match detect(&mut cursor, hint) {
        Ok(charsets) => charsets,
        Err(_) => {
            warn!("charset detection failed, assuming UTF-8");
            return Ok(UTF_8);
        }
    };
    // no encoding detected
    let Some(label) = charsets.first() else {
        return Ok(UTF_8);
    };
    Encoding::for_label(label.as_bytes()).ok_or_else(|| Error::UnknownEncoding(label.clone()))
}

/// Look up an encoding by label for saving.
pub(crate) fn encoding_for_label(label: &str) -> Result<&'static Encoding, Error> {
    Encoding::for_label(label.as_bytes()).ok_or_else(|| Error::UnknownEncoding(label.to_string()))
}
