//! Parser configuration.

use crate::error::Reporter;
use encoding_rs::Encoding;

/// Resolver for XML namespace prefixes (prefix → URI).
pub type NamespaceResolver = Box<dyn FnMut(&str) -> Option<String>>;

/// Resolver for XML entity references (name → replacement text). The
/// default resolves nothing; external entities are never fetched.
pub type EntityResolver = Box<dyn FnMut(&str) -> Option<String>>;

/// Options shared by `parse_html` and `parse_xml`. The namespace and entity
/// resolvers only apply to XML.
#[derive(Default)]
pub struct Config {
    /// Explicit encoding override; detection runs otherwise.
    pub encoding: Option<&'static Encoding>,
    /// Fragment parsing: the local name of the context element.
    pub context: Option<String>,
    /// Parse-error callback; errors are dropped when absent.
    pub report: Option<Reporter>,
    /// Prefix → URI fallback for prefixes with no in-scope declaration.
    pub namespace: Option<NamespaceResolver>,
    /// Replacement text for entity references beyond the predefined five.
    pub entity: Option<EntityResolver>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_report(mut self, report: Reporter) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_namespace(mut self, namespace: NamespaceResolver) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn with_entity(mut self, entity: EntityResolver) -> Self {
        self.entity = Some(entity);
        self
    }
}
