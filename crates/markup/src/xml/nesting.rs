//! XML nesting tracker.
//!
//! Maintains the open-elements stack and the namespace scopes, matches end
//! tags against the top of the stack, and recovers from mismatches: if the
//! end tag's name appears deeper in the stack, intermediate elements receive
//! synthesized end signals; otherwise the end tag is reported and ignored.
//! Unclosed elements at EOF receive synthesized end signals at the EOF
//! location — that is the specified behavior of this parser, not a fallback.

use crate::config::NamespaceResolver;
use crate::context::ParseContext;
use crate::error::{ParseError, StreamError};
use crate::location::Location;
use crate::signal::{Name, Signal, XMLNS_NAMESPACE, XML_NAMESPACE};
use crate::token::Token;
use std::collections::VecDeque;

struct XmlOpenElement {
    qname: String,
    location: Location,
    /// Declarations introduced by this element: (prefix, uri); the default
    /// namespace uses the empty prefix, and an empty uri undeclares.
    declarations: Vec<(String, Option<String>)>,
}

pub(crate) struct NestingTracker {
    stack: Vec<XmlOpenElement>,
    namespace: Option<NamespaceResolver>,
    text_chunks: Vec<String>,
    text_location: Location,
    out: VecDeque<(Signal, Location)>,
    done: bool,
}

impl NestingTracker {
    pub(crate) fn new(namespace: Option<NamespaceResolver>) -> Self {
        Self {
            stack: Vec::new(),
            namespace,
            text_chunks: Vec::new(),
            text_location: Location::START,
            out: VecDeque::new(),
            done: false,
        }
    }

    pub(crate) fn pop_signal(&mut self) -> Option<(Signal, Location)> {
        self.out.pop_front()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done && self.out.is_empty()
    }

    pub(crate) fn flush_pending(&mut self) {
        self.flush_text();
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        ctx.counters.tokens_processed = ctx.counters.tokens_processed.saturating_add(1);
        match token {
            Token::Text(text) => {
                if self.text_chunks.is_empty() {
                    self.text_location = loc;
                }
                self.text_chunks.push(text);
                Ok(())
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::XmlDecl(decl) => {
                self.emit(Signal::Xml(decl), loc);
                Ok(())
            }
            Token::Pi { target, text } => {
                self.emit(Signal::ProcessingInstruction { target, text }, loc);
                Ok(())
            }
            Token::Doctype(doctype) => {
                self.emit(Signal::Doctype(doctype), loc);
                Ok(())
            }
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => self.start_element(name, attributes, self_closing, loc, ctx),
            Token::EndTag { name } => self.end_element(name, loc, ctx),
            Token::Eof => {
                while let Some(entry) = self.stack.last() {
                    ctx.error(
                        entry.location,
                        ParseError::UnmatchedStartTag {
                            name: entry.qname.clone(),
                        },
                    )?;
                    self.emit(Signal::EndElement, loc);
                    self.stack.pop();
                }
                self.flush_text();
                self.done = true;
                Ok(())
            }
        }
    }

    fn start_element(
        &mut self,
        qname: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let mut declarations: Vec<(String, Option<String>)> = Vec::new();
        for (name, value) in &attributes {
            if name == "xmlns" {
                declarations.push((
                    String::new(),
                    (!value.is_empty()).then(|| value.clone()),
                ));
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                declarations.push((
                    prefix.to_string(),
                    (!value.is_empty()).then(|| value.clone()),
                ));
            }
        }
        self.stack.push(XmlOpenElement {
            qname: qname.clone(),
            location: loc,
            declarations,
        });

        let name = self.expand_name(&qname, true, loc, ctx)?;
        let mut resolved_attributes: Vec<(Name, String)> = Vec::with_capacity(attributes.len());
        for (attr_name, value) in attributes {
            let resolved = if attr_name == "xmlns" {
                Name::in_namespace(XMLNS_NAMESPACE, "xmlns")
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                Name::in_namespace(XMLNS_NAMESPACE, prefix)
            } else {
                // Unprefixed attributes never take the default namespace.
                self.expand_name(&attr_name, false, loc, ctx)?
            };
            resolved_attributes.push((resolved, value));
        }

        self.emit(
            Signal::StartElement {
                name,
                attributes: resolved_attributes,
            },
            loc,
        );
        if self_closing {
            self.emit(Signal::EndElement, loc);
            self.stack.pop();
        }
        Ok(())
    }

    fn end_element(
        &mut self,
        qname: String,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if self.stack.last().is_some_and(|entry| entry.qname == qname) {
            self.emit(Signal::EndElement, loc);
            self.stack.pop();
            return Ok(());
        }
        ctx.error(loc, ParseError::UnmatchedEndTag { name: qname.clone() })?;
        if self.stack.iter().any(|entry| entry.qname == qname) {
            // The name is open deeper down: close intermediates on its way.
            while let Some(entry) = self.stack.pop() {
                self.emit(Signal::EndElement, loc);
                if entry.qname == qname {
                    break;
                }
            }
        }
        Ok(())
    }

    fn expand_name(
        &mut self,
        qname: &str,
        use_default: bool,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<Name, StreamError> {
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => (prefix, local),
            _ => ("", qname),
        };
        if prefix.is_empty() {
            if !use_default {
                return Ok(Name::local(local));
            }
            return Ok(match self.resolve_prefix("") {
                Some(uri) => Name::in_namespace(&uri, local),
                None => Name::local(local),
            });
        }
        match self.resolve_prefix(prefix) {
            Some(uri) => Ok(Name::in_namespace(&uri, local)),
            None => {
                ctx.error(
                    loc,
                    ParseError::BadNamespace {
                        prefix: prefix.to_string(),
                    },
                )?;
                Ok(Name::local(local))
            }
        }
    }

    fn resolve_prefix(&mut self, prefix: &str) -> Option<String> {
        match prefix {
            "xml" => return Some(XML_NAMESPACE.to_string()),
            "xmlns" => return Some(XMLNS_NAMESPACE.to_string()),
            _ => {}
        }
        for entry in self.stack.iter().rev() {
            for (declared, uri) in entry.declarations.iter().rev() {
                if declared == prefix {
                    return uri.clone();
                }
            }
        }
        if prefix.is_empty() {
            return None;
        }
        self.namespace.as_mut().and_then(|resolve| resolve(prefix))
    }

    fn emit(&mut self, signal: Signal, loc: Location) {
        self.flush_text();
        self.out.push_back((signal, loc));
    }

    fn flush_text(&mut self) {
        if !self.text_chunks.is_empty() {
            let chunks = std::mem::take(&mut self.text_chunks);
            self.out.push_back((Signal::Text(chunks), self.text_location));
        }
    }
}
