//! HTML serializer.
//!
//! Void elements produce no end tag, raw-text element content is emitted
//! without escaping, and everything else follows the HTML escaping rules:
//! `&`, `<`, `>` in text; `&`, `"` in attribute values.

use super::{attribute_qname, escape_html_attribute, escape_text};
use crate::signal::{Signal, HTML_NAMESPACE};

fn is_void(name: &str) -> bool {
    matches!(
        name,
        "area" | "base" | "basefont" | "bgsound" | "br" | "col" | "embed" | "frame" | "hr"
            | "img" | "input" | "keygen" | "link" | "meta" | "param" | "source" | "track"
            | "wbr"
    )
}

fn is_raw_text(name: &str) -> bool {
    matches!(
        name,
        "script" | "style" | "xmp" | "iframe" | "noembed" | "noframes" | "plaintext"
    )
}

#[derive(Clone, Copy, Debug)]
struct OpenElement {
    void: bool,
    raw_text: bool,
}

/// Serialize a signal stream to HTML byte chunks, one chunk per signal.
pub struct HtmlWriter<I> {
    signals: I,
    open: Vec<OpenElement>,
    open_names: Vec<String>,
}

impl<I> HtmlWriter<I>
where
    I: Iterator<Item = Signal>,
{
    pub fn new(signals: I) -> Self {
        Self {
            signals,
            open: Vec::new(),
            open_names: Vec::new(),
        }
    }

    fn in_raw_text(&self) -> bool {
        self.open.last().is_some_and(|entry| entry.raw_text)
    }

    fn render(&mut self, signal: Signal) -> String {
        let mut out = String::new();
        match signal {
            Signal::StartElement { name, attributes } => {
                out.push('<');
                out.push_str(&name.local);
                for (attr_name, value) in &attributes {
                    out.push(' ');
                    out.push_str(&attribute_qname(attr_name));
                    out.push_str("=\"");
                    escape_html_attribute(value, &mut out);
                    out.push('"');
                }
                out.push('>');
                // Void and raw-text rules apply to HTML elements only; an
                // SVG <title> is an ordinary escaped element.
                let html_ns = matches!(
                    name.namespace.as_deref(),
                    None | Some(HTML_NAMESPACE)
                );
                self.open.push(OpenElement {
                    void: html_ns && is_void(&name.local),
                    raw_text: html_ns && is_raw_text(&name.local),
                });
                self.open_names.push(name.local);
            }
            Signal::EndElement => {
                if let (Some(entry), Some(name)) = (self.open.pop(), self.open_names.pop())
                    && !entry.void
                {
                    out.push_str("</");
                    out.push_str(&name);
                    out.push('>');
                }
            }
            Signal::Text(chunks) => {
                if self.in_raw_text() {
                    for chunk in &chunks {
                        out.push_str(chunk);
                    }
                } else {
                    for chunk in &chunks {
                        escape_text(chunk, &mut out);
                    }
                }
            }
            Signal::Comment(text) => {
                out.push_str("<!--");
                out.push_str(&text);
                out.push_str("-->");
            }
            Signal::Doctype(doctype) => {
                out.push_str("<!DOCTYPE");
                if let Some(name) = &doctype.name {
                    out.push(' ');
                    out.push_str(name);
                }
                out.push('>');
            }
            Signal::Xml(decl) => {
                out.push_str("<?xml version=\"");
                out.push_str(&decl.version);
                out.push('"');
                if let Some(encoding) = &decl.encoding {
                    out.push_str(" encoding=\"");
                    out.push_str(encoding);
                    out.push('"');
                }
                if let Some(standalone) = decl.standalone {
                    out.push_str(" standalone=\"");
                    out.push_str(if standalone { "yes" } else { "no" });
                    out.push('"');
                }
                out.push_str("?>");
            }
            Signal::ProcessingInstruction { target, text } => {
                out.push_str("<?");
                out.push_str(&target);
                if !text.is_empty() {
                    out.push(' ');
                    out.push_str(&text);
                }
                out.push_str("?>");
            }
        }
        out
    }
}

impl<I> Iterator for HtmlWriter<I>
where
    I: Iterator<Item = Signal>,
{
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        let signal = self.signals.next()?;
        Some(self.render(signal).into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::HtmlWriter;
    use crate::signal::{Name, Signal, HTML_NAMESPACE};

    fn render(signals: Vec<Signal>) -> String {
        let chunks: Vec<Vec<u8>> = HtmlWriter::new(signals.into_iter()).collect();
        String::from_utf8(chunks.concat()).unwrap()
    }

    fn start(name: &str, attrs: &[(&str, &str)]) -> Signal {
        Signal::StartElement {
            name: Name::in_namespace(HTML_NAMESPACE, name),
            attributes: attrs
                .iter()
                .map(|(n, v)| (Name::local(*n), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn elements_text_and_escaping() {
        let html = render(vec![
            start("p", &[("class", "a\"b")]),
            Signal::Text(vec!["1 < 2 & 3".to_string()]),
            Signal::EndElement,
        ]);
        assert_eq!(html, "<p class=\"a&quot;b\">1 &lt; 2 &amp; 3</p>");
    }

    #[test]
    fn void_elements_have_no_end_tag() {
        let html = render(vec![start("br", &[]), Signal::EndElement]);
        assert_eq!(html, "<br>");
    }

    #[test]
    fn raw_text_content_is_not_escaped() {
        let html = render(vec![
            start("script", &[]),
            Signal::Text(vec!["if (a<b) c".to_string()]),
            Signal::EndElement,
        ]);
        assert_eq!(html, "<script>if (a<b) c</script>");
    }

    #[test]
    fn comments_and_doctype() {
        let html = render(vec![
            Signal::Doctype(crate::signal::Doctype {
                name: Some("html".to_string()),
                ..Default::default()
            }),
            Signal::Comment(" hi ".to_string()),
        ]);
        assert_eq!(html, "<!DOCTYPE html><!-- hi -->");
    }
}
