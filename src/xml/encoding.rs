//! Input transcoding ahead of parsing.
//!
//! The reader only understands UTF-8, so documents in another encoding are
//! decoded up front. The encoding comes from the byte order mark, then the
//! `encoding` pseudo-attribute of the XML declaration, falling back to UTF-8.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use super::XmlError;

/// Returns `bytes` as UTF-8, borrowing when no transcoding is needed.
pub(crate) fn to_utf8(bytes: &[u8]) -> Result<Cow<'_, [u8]>, XmlError> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
        None => (sniff(bytes)?, bytes),
    };

    if encoding == UTF_8 {
        return Ok(Cow::Borrowed(body));
    }

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        return Err(XmlError::InvalidEncoding(encoding.name()));
    }
    tracing::debug!(encoding = encoding.name(), "Transcoded XML input to UTF-8");
    Ok(Cow::Owned(text.into_owned().into_bytes()))
}

/// Picks the encoding of a document without a byte order mark.
fn sniff(bytes: &[u8]) -> Result<&'static Encoding, XmlError> {
    match bytes {
        [0, b'<', ..] => return Ok(UTF_16BE),
        [b'<', 0, ..] => return Ok(UTF_16LE),
        _ => {}
    }

    let Some(label) = declared_encoding(bytes) else {
        return Ok(UTF_8);
    };
    let encoding = Encoding::for_label(label.trim_ascii())
        .ok_or_else(|| XmlError::UnsupportedEncoding(String::from_utf8_lossy(label).into_owned()))?;

    // Bytes that read as ASCII cannot be UTF-16, whatever the declaration says
    if encoding == UTF_16BE || encoding == UTF_16LE {
        return Ok(UTF_8);
    }
    Ok(encoding)
}

/// The raw `encoding` value of a leading `<?xml ...?>` declaration.
fn declared_encoding(bytes: &[u8]) -> Option<&[u8]> {
    let decl = bytes.strip_prefix(b"<?xml")?;
    let end = decl.windows(2).position(|w| w == b"?>")?;
    let decl = &decl[..end];

    let start = decl.windows(8).position(|w| w == b"encoding")? + 8;
    let rest = decl[start..].trim_ascii_start().strip_prefix(b"=")?.trim_ascii_start();
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let close = rest.iter().position(|&b| b == quote)?;
    Some(&rest[..close])
}
