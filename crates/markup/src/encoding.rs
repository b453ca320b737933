//! Encoding detection for the byte-to-scalar stage.
//!
//! Detection order (HTML): explicit caller encoding, then BOM, then a
//! `<meta>` prescan over the first 1024 bytes, then UTF-8. For XML the meta
//! prescan is replaced by the XML declaration's `encoding` pseudo-attribute.
//! The prescan runs before any scalar is committed downstream, so a
//! meta-announced encoding never forces a mid-parse re-decode.
//!
//! Decoding itself is delegated to `encoding_rs`; labels are resolved through
//! the WHATWG Encoding names map (`us-ascii` and `iso-8859-1` resolve to
//! windows-1252, MacRoman is `macintosh`).

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

/// How many leading bytes the detector may inspect.
pub(crate) const PRESCAN_BYTES: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DocumentKind {
    Html,
    Xml,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Detected {
    pub(crate) encoding: &'static Encoding,
    /// Leading bytes to skip (a BOM matching the selected encoding).
    pub(crate) bom_len: usize,
}

pub(crate) fn detect(
    kind: DocumentKind,
    prefix: &[u8],
    explicit: Option<&'static Encoding>,
) -> Detected {
    let encoding = explicit
        .or_else(|| bom_encoding(prefix))
        .or_else(|| match kind {
            DocumentKind::Html => prescan_meta(&prefix[..prefix.len().min(PRESCAN_BYTES)]),
            DocumentKind::Xml => xml_declaration_encoding(prefix),
        })
        .unwrap_or(UTF_8);
    Detected {
        encoding,
        bom_len: matching_bom_len(encoding, prefix),
    }
}

fn bom_encoding(prefix: &[u8]) -> Option<&'static Encoding> {
    if prefix.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some(UTF_8)
    } else if prefix.starts_with(&[0xFF, 0xFE]) {
        Some(UTF_16LE)
    } else if prefix.starts_with(&[0xFE, 0xFF]) {
        Some(UTF_16BE)
    } else {
        None
    }
}

fn matching_bom_len(encoding: &'static Encoding, prefix: &[u8]) -> usize {
    if encoding == UTF_8 && prefix.starts_with(&[0xEF, 0xBB, 0xBF]) {
        3
    } else if (encoding == UTF_16LE && prefix.starts_with(&[0xFF, 0xFE]))
        || (encoding == UTF_16BE && prefix.starts_with(&[0xFE, 0xFF]))
    {
        2
    } else {
        0
    }
}

/// Resolve a WHATWG encoding label, with the meta-specific overrides: a
/// document cannot announce itself as UTF-16 from inside a byte stream we are
/// already reading as ASCII-compatible, and `x-user-defined` maps to
/// windows-1252.
fn meta_label(label: &[u8]) -> Option<&'static Encoding> {
    let encoding = Encoding::for_label(label)?;
    if encoding == UTF_16LE || encoding == UTF_16BE {
        return Some(UTF_8);
    }
    if encoding.name() == "x-user-defined" {
        return Encoding::for_label(b"windows-1252");
    }
    Some(encoding)
}

/// WHATWG meta prescan over the head of the document.
///
/// Recognizes `<meta charset=...>` and
/// `<meta http-equiv=content-type content="...charset=...">`, skipping
/// comments and other tags (including their quoted attribute values).
fn prescan_meta(bytes: &[u8]) -> Option<&'static Encoding> {
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"<!--") {
            // Unterminated comment: nothing else can follow.
            let end = find_subslice(&bytes[i + 4..], b"-->")?;
            i += 4 + end + 3;
            continue;
        }
        if starts_with_ignore_case(&bytes[i..], b"<meta")
            && matches!(
                bytes.get(i + 5).copied(),
                Some(b' ' | b'\t' | b'\n' | b'\x0C' | b'\r' | b'/')
            )
        {
            i += 5;
            if let Some(encoding) = prescan_meta_attributes(bytes, &mut i) {
                return Some(encoding);
            }
            continue;
        }
        if bytes[i] == b'<'
            && matches!(bytes.get(i + 1), Some(b) if b.is_ascii_alphabetic())
        {
            // A real tag: skip its name, then its attributes with quote
            // awareness so a `>` inside a value does not cut the scan short.
            i += 1;
            while i < bytes.len() && !matches!(bytes[i], b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' | b'>') {
                i += 1;
            }
            while get_attribute(bytes, &mut i).is_some() {}
            i = skip_past(bytes, i, b'>');
            continue;
        }
        if bytes[i..].starts_with(b"</")
            || bytes[i..].starts_with(b"<!")
            || bytes[i..].starts_with(b"<?")
        {
            i = skip_past(bytes, i + 1, b'>');
            continue;
        }
        i += 1;
    }
    None
}

fn prescan_meta_attributes(bytes: &[u8], i: &mut usize) -> Option<&'static Encoding> {
    let mut got_pragma = false;
    let mut need_pragma: Option<bool> = None;
    let mut charset: Option<&'static Encoding> = None;
    let mut seen: Vec<Vec<u8>> = Vec::new();

    while let Some((name, value)) = get_attribute(bytes, i) {
        if seen.contains(&name) {
            continue;
        }
        seen.push(name.clone());
        match name.as_slice() {
            b"http-equiv" => {
                if value.eq_ignore_ascii_case(b"content-type") {
                    got_pragma = true;
                }
            }
            b"content" => {
                if charset.is_none()
                    && let Some(label) = charset_from_content(&value)
                {
                    charset = meta_label(&label);
                    need_pragma = Some(true);
                }
            }
            b"charset" => {
                charset = meta_label(&value);
                need_pragma = Some(false);
            }
            _ => {}
        }
    }

    match (need_pragma, charset) {
        (Some(true), Some(encoding)) if got_pragma => Some(encoding),
        (Some(false), Some(encoding)) => Some(encoding),
        _ => None,
    }
}

/// WHATWG "get an attribute" over raw bytes. Returns lowercased name and
/// value, advancing `i` past the attribute.
fn get_attribute(bytes: &[u8], i: &mut usize) -> Option<(Vec<u8>, Vec<u8>)> {
    while *i < bytes.len() && matches!(bytes[*i], b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' | b'/') {
        *i += 1;
    }
    if *i >= bytes.len() || bytes[*i] == b'>' {
        return None;
    }

    let mut name = Vec::new();
    let mut value = Vec::new();
    loop {
        if *i >= bytes.len() {
            return Some((name, value));
        }
        match bytes[*i] {
            b'=' if !name.is_empty() => {
                *i += 1;
                break;
            }
            b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' => {
                while *i < bytes.len()
                    && matches!(bytes[*i], b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
                {
                    *i += 1;
                }
                if *i >= bytes.len() || bytes[*i] != b'=' {
                    return Some((name, value));
                }
                *i += 1;
                break;
            }
            b'/' | b'>' => return Some((name, value)),
            b => {
                name.push(b.to_ascii_lowercase());
                *i += 1;
            }
        }
    }

    while *i < bytes.len() && matches!(bytes[*i], b'\t' | b'\n' | b'\x0C' | b'\r' | b' ') {
        *i += 1;
    }
    if *i >= bytes.len() {
        return Some((name, value));
    }
    match bytes[*i] {
        quote @ (b'"' | b'\'') => {
            *i += 1;
            while *i < bytes.len() && bytes[*i] != quote {
                value.push(bytes[*i].to_ascii_lowercase());
                *i += 1;
            }
            if *i < bytes.len() {
                *i += 1;
            }
        }
        b'>' => {}
        _ => {
            while *i < bytes.len()
                && !matches!(bytes[*i], b'\t' | b'\n' | b'\x0C' | b'\r' | b' ' | b'>')
            {
                value.push(bytes[*i].to_ascii_lowercase());
                *i += 1;
            }
        }
    }
    Some((name, value))
}

/// Extract the `charset=` label from a `content="text/html; charset=..."`
/// pragma value (already lowercased by `get_attribute`).
fn charset_from_content(content: &[u8]) -> Option<Vec<u8>> {
    let pos = find_subslice(content, b"charset")?;
    let mut i = pos + b"charset".len();
    while i < content.len() && content[i].is_ascii_whitespace() {
        i += 1;
    }
    if content.get(i) != Some(&b'=') {
        return None;
    }
    i += 1;
    while i < content.len() && content[i].is_ascii_whitespace() {
        i += 1;
    }
    match content.get(i) {
        Some(&(quote @ (b'"' | b'\''))) => {
            let rest = &content[i + 1..];
            let end = rest.iter().position(|&b| b == quote)?;
            Some(rest[..end].to_vec())
        }
        Some(_) => {
            let rest = &content[i..];
            let end = rest
                .iter()
                .position(|&b| b == b';' || b.is_ascii_whitespace())
                .unwrap_or(rest.len());
            Some(rest[..end].to_vec())
        }
        None => None,
    }
}

/// `encoding="..."` from an XML declaration at the very start of the input.
fn xml_declaration_encoding(prefix: &[u8]) -> Option<&'static Encoding> {
    if !prefix.starts_with(b"<?xml") {
        return None;
    }
    let end = find_subslice(prefix, b"?>").unwrap_or(prefix.len());
    let decl = &prefix[..end];
    let pos = find_subslice(decl, b"encoding")?;
    let mut i = pos + b"encoding".len();
    while i < decl.len() && decl[i].is_ascii_whitespace() {
        i += 1;
    }
    if decl.get(i) != Some(&b'=') {
        return None;
    }
    i += 1;
    while i < decl.len() && decl[i].is_ascii_whitespace() {
        i += 1;
    }
    let quote = match decl.get(i) {
        Some(&(q @ (b'"' | b'\''))) => q,
        _ => return None,
    };
    let rest = &decl[i + 1..];
    let close = rest.iter().position(|&b| b == quote)?;
    Encoding::for_label(&rest[..close])
}

fn skip_past(bytes: &[u8], from: usize, target: u8) -> usize {
    match memchr::memchr(target, &bytes[from.min(bytes.len())..]) {
        Some(rel) => from + rel + 1,
        None => bytes.len(),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    let first = needle[0];
    let mut i = 0;
    while i + needle.len() <= haystack.len() {
        let rel = memchr::memchr(first, &haystack[i..])?;
        let pos = i + rel;
        if pos + needle.len() > haystack.len() {
            return None;
        }
        if &haystack[pos..pos + needle.len()] == needle {
            return Some(pos);
        }
        i = pos + 1;
    }
    None
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

#[cfg(test)]
mod tests {
    use super::{detect, Detected, DocumentKind};
    use encoding_rs::{UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};

    fn html(prefix: &[u8]) -> Detected {
        detect(DocumentKind::Html, prefix, None)
    }

    #[test]
    fn utf8_bom_wins_and_is_stripped() {
        let d = html(b"\xEF\xBB\xBF<p>");
        assert_eq!(d.encoding, UTF_8);
        assert_eq!(d.bom_len, 3);
    }

    #[test]
    fn utf16_boms_are_recognized() {
        assert_eq!(html(b"\xFF\xFE<\x00").encoding, UTF_16LE);
        assert_eq!(html(b"\xFE\xFF\x00<").encoding, UTF_16BE);
        assert_eq!(html(b"\xFF\xFE<\x00").bom_len, 2);
    }

    #[test]
    fn explicit_encoding_overrides_bom() {
        let d = detect(DocumentKind::Html, b"\xEF\xBB\xBFabc", Some(WINDOWS_1252));
        assert_eq!(d.encoding, WINDOWS_1252);
        // A BOM for a different encoding is not stripped.
        assert_eq!(d.bom_len, 0);
    }

    #[test]
    fn meta_charset_is_found() {
        let d = html(b"<html><head><meta charset=\"windows-1252\"></head>");
        assert_eq!(d.encoding, WINDOWS_1252);
    }

    #[test]
    fn meta_pragma_content_type_is_found() {
        let d = html(
            b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=iso-8859-1\">",
        );
        // iso-8859-1 resolves to windows-1252 per the WHATWG names map.
        assert_eq!(d.encoding, WINDOWS_1252);
    }

    #[test]
    fn meta_inside_comment_is_ignored() {
        let d = html(b"<!-- <meta charset=\"windows-1252\"> --><p>");
        assert_eq!(d.encoding, UTF_8);
    }

    #[test]
    fn meta_utf16_label_falls_back_to_utf8() {
        let d = html(b"<meta charset=utf-16le>");
        assert_eq!(d.encoding, UTF_8);
    }

    #[test]
    fn quoted_gt_in_attribute_does_not_hide_meta() {
        let d = html(b"<img alt=\"a > b\"><meta charset=macintosh>");
        assert_eq!(d.encoding.name(), "macintosh");
    }

    #[test]
    fn xml_declaration_encoding_is_used() {
        let d = detect(
            DocumentKind::Xml,
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-15\"?><a/>",
            None,
        );
        assert_eq!(d.encoding.name(), "ISO-8859-15");
    }

    #[test]
    fn defaults_to_utf8() {
        assert_eq!(html(b"<p>hello</p>").encoding, UTF_8);
        assert_eq!(detect(DocumentKind::Xml, b"<a/>", None).encoding, UTF_8);
    }
}
