//! Token model shared by the HTML and XML tokenizers.

use crate::signal::{Doctype, XmlDeclaration};

/// Tokenizer output, consumed by the tree builder / nesting tracker.
///
/// Character runs are batched into `Text` chunks so no unbounded string
/// concatenation is forced anywhere downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Token {
    Text(String),
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Comment(String),
    Doctype(Doctype),
    XmlDecl(XmlDeclaration),
    Pi {
        target: String,
        text: String,
    },
    Eof,
}
