//! Serializers: signal streams back to byte streams.
//!
//! Each signal renders to one output chunk. The writers are plain iterator
//! adapters; no buffering beyond the single chunk under construction.

mod html;
mod xml;

pub use html::HtmlWriter;
pub use xml::{WriteConfig, XmlWriter};

use crate::signal::{Name, XLINK_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE};
use memchr::{memchr2, memchr3};

/// Escape `&`, `<` and `>` in character data.
pub(crate) fn escape_text(text: &str, out: &mut String) {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(rel) = memchr3(b'&', b'<', b'>', &bytes[from..]) {
        let at = from + rel;
        out.push_str(&text[from..at]);
        match bytes[at] {
            b'&' => out.push_str("&amp;"),
            b'<' => out.push_str("&lt;"),
            _ => out.push_str("&gt;"),
        }
        from = at + 1;
    }
    out.push_str(&text[from..]);
}

/// Escape `&` and `"` in a double-quoted HTML attribute value.
pub(crate) fn escape_html_attribute(value: &str, out: &mut String) {
    let bytes = value.as_bytes();
    let mut from = 0;
    while let Some(rel) = memchr2(b'&', b'"', &bytes[from..]) {
        let at = from + rel;
        out.push_str(&value[from..at]);
        match bytes[at] {
            b'&' => out.push_str("&amp;"),
            _ => out.push_str("&quot;"),
        }
        from = at + 1;
    }
    out.push_str(&value[from..]);
}

/// Escape `&`, `<`, `>`, `"` and `'` in a double-quoted XML attribute value.
pub(crate) fn escape_xml_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
}

/// Qualified attribute name for the well-known attribute namespaces.
pub(crate) fn attribute_qname(name: &Name) -> String {
    match name.namespace.as_deref() {
        Some(XML_NAMESPACE) => format!("xml:{}", name.local),
        Some(XLINK_NAMESPACE) => format!("xlink:{}", name.local),
        Some(XMLNS_NAMESPACE) if name.local == "xmlns" => "xmlns".to_string(),
        Some(XMLNS_NAMESPACE) => format!("xmlns:{}", name.local),
        _ => name.local.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::{escape_html_attribute, escape_text};

    #[test]
    fn text_escaping_covers_the_three_specials() {
        let mut out = String::new();
        escape_text("a<b&c>d", &mut out);
        assert_eq!(out, "a&lt;b&amp;c&gt;d");
    }

    #[test]
    fn attribute_escaping_leaves_angle_brackets() {
        let mut out = String::new();
        escape_html_attribute("a<\"b\"&c", &mut out);
        assert_eq!(out, "a<&quot;b&quot;&amp;c");
    }
}
