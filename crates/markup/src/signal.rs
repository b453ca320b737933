//! The public signal model: what both parsers emit and both serializers
//! consume.

use std::fmt;

pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// Expanded element or attribute name: optional namespace URI plus local
/// name. Immutable once emitted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Name {
    pub namespace: Option<String>,
    pub local: String,
}

impl Name {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    pub fn in_namespace(namespace: &str, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            local: local.into(),
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Doctype {
    pub name: Option<String>,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    pub force_quirks: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
}

/// A structural event in the parsed document.
///
/// `StartElement`/`EndElement` nest like brackets: every start emitted at the
/// public interface is matched by exactly one end by the time the stream
/// finishes, even under recovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    StartElement {
        name: Name,
        attributes: Vec<(Name, String)>,
    },
    EndElement,
    /// A text run, as a list of chunks. Chunks of one run are never split
    /// across a non-text signal.
    Text(Vec<String>),
    Comment(String),
    Doctype(Doctype),
    Xml(XmlDeclaration),
    ProcessingInstruction {
        target: String,
        text: String,
    },
}

impl Signal {
    /// Concatenated text content, for consumers that do not care about
    /// chunking.
    pub fn text(&self) -> Option<String> {
        match self {
            Signal::Text(chunks) => Some(chunks.concat()),
            _ => None,
        }
    }
}
