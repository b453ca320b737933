//! XML serializer.
//!
//! Prefixes are resolved from the in-scope `xmlns` declarations carried as
//! attributes; names whose namespace has no in-scope declaration degrade to
//! their local name. With `collapse_empty` set, a start/end pair with no
//! children in between is emitted in self-closing form.

use super::{attribute_qname, escape_text, escape_xml_attribute};
use crate::signal::{Name, Signal, XMLNS_NAMESPACE, XML_NAMESPACE};

#[derive(Clone, Copy, Debug)]
pub struct WriteConfig {
    /// Emit `<a/>` for element pairs that enclose no children.
    pub collapse_empty: bool,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            collapse_empty: false,
        }
    }
}

/// Serialize a signal stream to XML byte chunks.
pub struct XmlWriter<I> {
    signals: I,
    config: WriteConfig,
    pending: Option<Signal>,
    /// One frame per open element: the declarations it introduced.
    scopes: Vec<Vec<(String, String)>>,
    open_qnames: Vec<String>,
}

impl<I> XmlWriter<I>
where
    I: Iterator<Item = Signal>,
{
    pub fn new(config: WriteConfig, signals: I) -> Self {
        Self {
            signals,
            config,
            pending: None,
            scopes: Vec::new(),
            open_qnames: Vec::new(),
        }
    }

    fn pull(&mut self) -> Option<Signal> {
        self.pending.take().or_else(|| self.signals.next())
    }

    fn declarations_of(attributes: &[(Name, String)]) -> Vec<(String, String)> {
        attributes
            .iter()
            .filter(|(name, _)| name.namespace.as_deref() == Some(XMLNS_NAMESPACE))
            .map(|(name, value)| {
                let prefix = if name.local == "xmlns" {
                    String::new()
                } else {
                    name.local.clone()
                };
                (prefix, value.clone())
            })
            .collect()
    }

    fn prefix_for(&self, uri: &str) -> Option<String> {
        for scope in self.scopes.iter().rev() {
            for (prefix, declared) in scope.iter().rev() {
                if declared == uri {
                    return Some(prefix.clone());
                }
            }
        }
        None
    }

    fn element_qname(&self, name: &Name) -> String {
        match name.namespace.as_deref() {
            None => name.local.clone(),
            Some(XML_NAMESPACE) => format!("xml:{}", name.local),
            Some(uri) => match self.prefix_for(uri) {
                Some(prefix) if prefix.is_empty() => name.local.clone(),
                Some(prefix) => format!("{prefix}:{}", name.local),
                None => name.local.clone(),
            },
        }
    }

    fn render_start(&mut self, name: &Name, attributes: &[(Name, String)], close: bool) -> String {
        self.scopes.push(Self::declarations_of(attributes));
        let qname = self.element_qname(name);
        let mut out = String::new();
        out.push('<');
        out.push_str(&qname);
        for (attr_name, value) in attributes {
            out.push(' ');
            let attr_qname = match attr_name.namespace.as_deref() {
                Some(uri)
                    if uri != XML_NAMESPACE && uri != XMLNS_NAMESPACE =>
                {
                    match self.prefix_for(uri) {
                        Some(prefix) if !prefix.is_empty() => {
                            format!("{prefix}:{}", attr_name.local)
                        }
                        _ => attribute_qname(attr_name),
                    }
                }
                _ => attribute_qname(attr_name),
            };
            out.push_str(&attr_qname);
            out.push_str("=\"");
            escape_xml_attribute(value, &mut out);
            out.push('"');
        }
        if close {
            out.push_str("/>");
            self.scopes.pop();
        } else {
            out.push('>');
            self.open_qnames.push(qname);
        }
        out
    }
}

impl<I> Iterator for XmlWriter<I>
where
    I: Iterator<Item = Signal>,
{
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        let signal = self.pull()?;
        let mut out = String::new();
        match signal {
            Signal::StartElement { name, attributes } => {
                let mut collapse = false;
                if self.config.collapse_empty {
                    match self.signals.next() {
                        Some(Signal::EndElement) => collapse = true,
                        other => self.pending = other,
                    }
                }
                out = self.render_start(&name, &attributes, collapse);
            }
            Signal::EndElement => {
                self.scopes.pop();
                if let Some(qname) = self.open_qnames.pop() {
                    out.push_str("</");
                    out.push_str(&qname);
                    out.push('>');
                }
            }
            Signal::Text(chunks) => {
                for chunk in &chunks {
                    escape_text(chunk, &mut out);
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
                match (&doctype.public_id, &doctype.system_id) {
                    (Some(public), Some(system)) => {
                        out.push_str(&format!(" PUBLIC \"{public}\" \"{system}\""));
                    }
                    (Some(public), None) => out.push_str(&format!(" PUBLIC \"{public}\"")),
                    (None, Some(system)) => out.push_str(&format!(" SYSTEM \"{system}\"")),
                    (None, None) => {}
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
        Some(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::{WriteConfig, XmlWriter};
    use crate::signal::{Name, Signal, XMLNS_NAMESPACE};

    fn render(config: WriteConfig, signals: Vec<Signal>) -> String {
        let chunks: Vec<Vec<u8>> = XmlWriter::new(config, signals.into_iter()).collect();
        String::from_utf8(chunks.concat()).unwrap()
    }

    #[test]
    fn text_and_attribute_escaping() {
        let xml = render(
            WriteConfig::default(),
            vec![
                Signal::StartElement {
                    name: Name::local("a"),
                    attributes: vec![(Name::local("t"), "x'\"<".to_string())],
                },
                Signal::Text(vec!["1<2".to_string()]),
                Signal::EndElement,
            ],
        );
        assert_eq!(xml, "<a t=\"x&apos;&quot;&lt;\">1&lt;2</a>");
    }

    #[test]
    fn collapse_empty_emits_self_closing_form() {
        let signals = vec![
            Signal::StartElement {
                name: Name::local("a"),
                attributes: vec![],
            },
            Signal::StartElement {
                name: Name::local("b"),
                attributes: vec![],
            },
            Signal::EndElement,
            Signal::EndElement,
        ];
        let collapsed = render(
            WriteConfig {
                collapse_empty: true,
            },
            signals.clone(),
        );
        assert_eq!(collapsed, "<a><b/></a>");
        let plain = render(WriteConfig::default(), signals);
        assert_eq!(plain, "<a><b></b></a>");
    }

    #[test]
    fn prefixes_resolve_from_xmlns_declarations() {
        let ns = "urn:example";
        let xml = render(
            WriteConfig::default(),
            vec![
                Signal::StartElement {
                    name: Name::in_namespace(ns, "root"),
                    attributes: vec![(
                        Name::in_namespace(XMLNS_NAMESPACE, "e"),
                        ns.to_string(),
                    )],
                },
                Signal::EndElement,
            ],
        );
        assert_eq!(xml, "<e:root xmlns:e=\"urn:example\"></e:root>");
    }
}
