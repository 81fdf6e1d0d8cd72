//! Low level helpers used while formatting a message

use std::borrow::Cow;

use crate::base64;

/// Maximum length of a base64 line, excluding the `CRLF`
///
/// [RFC 2045, section 6.8](https://tools.ietf.org/html/rfc2045#section-6.8)
const BASE64_LINE_LENGTH: usize = 76;

const BOUNDARY_LENGTH: usize = 40;

/// Create a random MIME boundary.
pub(crate) fn make_boundary() -> String {
    std::iter::repeat_with(fastrand::alphanumeric)
        .take(BOUNDARY_LENGTH)
        .collect()
}

/// Returns `boundary`, extended with a numeric suffix until no part content
/// contains it
pub(crate) fn unique_boundary<'a, I>(boundary: &str, contents: I) -> String
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let collides = |candidate: &str| contents.clone().into_iter().any(|c| c.contains(candidate));

    let mut candidate = boundary.to_owned();
    let mut suffix = 0_usize;
    while collides(&candidate) {
        candidate = format!("{boundary}={suffix}");
        suffix += 1;
    }
    candidate
}

/// Base64 encodes `content`, wrapped into `CRLF` separated lines
pub(crate) fn base64_lines(content: &[u8]) -> String {
    let encoded = base64::encode(content);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LENGTH * 2);

    // base64 output is ascii, so slicing on any index is a char boundary
    let mut rest = encoded.as_str();
    while rest.len() > BASE64_LINE_LENGTH {
        let (line, tail) = rest.split_at(BASE64_LINE_LENGTH);
        out.push_str(line);
        out.push_str("\r\n");
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// Converts bare `LF` and bare `CR` line endings to `CRLF`
pub(crate) fn crlf_line_endings(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let bare = bytes.iter().enumerate().any(|(i, b)| match b {
        b'\r' => bytes.get(i + 1) != Some(&b'\n'),
        b'\n' => i == 0 || bytes[i - 1] != b'\r',
        _ => false,
    });
    if !bare {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                chars.next_if_eq(&'\n');
                out.push_str("\r\n");
            }
            '\n' => out.push_str("\r\n"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Keeps a header value on a single line
pub(crate) fn header_value(value: &str) -> Cow<'_, str> {
    if value.contains(['\r', '\n']) {
        Cow::Owned(value.replace("\r\n", " ").replace(['\r', '\n'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

/// Formats `value` as a quoted-string
///
/// [RFC 5322, section 3.2.4](https://tools.ietf.org/html/rfc5322#section-3.2.4)
pub(crate) fn quoted_string(value: &str) -> String {
    let value = header_value(value);
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Formats the phrase of a `From` mailbox, quoted if it contains specials
///
/// [RFC 5322, section 3.2.3](https://tools.ietf.org/html/rfc5322#section-3.2.3)
pub(crate) fn display_name(name: &str) -> Cow<'_, str> {
    const SPECIALS: &[char] = &['(', ')', '<', '>', '[', ']', ':', ';', '@', '\\', ',', '.', '"'];

    if name.contains(SPECIALS) {
        Cow::Owned(quoted_string(name))
    } else {
        header_value(name)
    }
}
