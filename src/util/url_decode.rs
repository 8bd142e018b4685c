use thiserror::Error;

/// Errors from decoding a percent-encoded URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlDecodeError {
    /// A `%` not followed by two hex digits.
    #[error("malformed percent escape at byte {0}")]
    MalformedEscape(usize),
    /// The decoded bytes are not valid UTF-8.
    #[error("decoded URL is not valid UTF-8")]
    InvalidUtf8,
}

/// Decodes a form-encoded URL string.
///
/// `%XX` escapes become the byte they encode and `+` becomes a space, the
/// same rules HTML form encoding uses. The decoded bytes must be UTF-8.
///
/// # Errors
///
/// Returns [`UrlDecodeError`] if:
/// - a `%` is not followed by two hex digits ([`UrlDecodeError::MalformedEscape`])
/// - the decoded bytes are not UTF-8 ([`UrlDecodeError::InvalidUtf8`])
///
/// # Examples
///
/// ```
/// use atomclient::util::url_decode;
///
/// assert_eq!(
///     url_decode("https://example.com/feeds/a%20b?q=x+y").unwrap(),
///     "https://example.com/feeds/a b?q=x y"
/// );
/// assert!(url_decode("https://example.com/%zz").is_err());
/// ```
pub fn url_decode(url: &str) -> Result<String, UrlDecodeError> {
    let bytes = url.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(UrlDecodeError::MalformedEscape(i));
            }
        }
    }

    let spaced = url.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| UrlDecodeError::InvalidUtf8)
}
