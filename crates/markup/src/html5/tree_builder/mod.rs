//! HTML5 tree construction.
//!
//! A state machine over the 23 insertion modes, consuming tokenizer output
//! and emitting the public signal stream. Instead of building a document
//! tree, every "insert an element" becomes a `StartElement` signal and every
//! pop of the open-elements stack becomes an `EndElement` signal, so the
//! stream nests like brackets by construction.
//!
//! Invariants:
//! - Signals are emitted in document order; locations are monotonic.
//! - Every recovery action named by the HTML5 specification maps to a
//!   reported parse error plus a continuation, never a halt.
//! - The wrapper elements html/head/body are tracked on the stack for scope
//!   and mode decisions but do not surface as signals.
//! - Algorithms that reparent DOM nodes (foster parenting, the adoption
//!   agency's clone step) take their signal-space reading: synthesized end
//!   tags plus re-opened clones, never reordering of already-emitted
//!   signals.

use crate::context::ParseContext;
use crate::error::{ParseError, StreamError};
use crate::html5::tokenizer::{HtmlTokenizer, State};
use crate::location::Location;
use crate::signal::{Name, Signal, HTML_NAMESPACE, MATHML_NAMESPACE, SVG_NAMESPACE};
use crate::token::Token;
use std::collections::VecDeque;

mod foreign;
mod formatting;
mod modes;
mod quirks;
mod stack;

use formatting::{ActiveFormattingList, FormattingElement, FormattingEntry};
use modes::InsertionMode;
use quirks::QuirksMode;
use stack::{ElementNs, OpenElement, OpenElementsStack, ScopeKind};

const IMPLIED_END_TAGS: [&str; 10] =
    ["dd", "dt", "li", "optgroup", "option", "p", "rb", "rp", "rt", "rtc"];

/// Elements whose being open at EOF is not an error.
const EOF_OK_TAGS: [&str; 18] = [
    "dd", "dt", "li", "optgroup", "option", "p", "rb", "rp", "rt", "rtc", "tbody", "td",
    "tfoot", "th", "thead", "tr", "body", "html",
];

fn is_special(entry: &OpenElement) -> bool {
    match entry.ns {
        ElementNs::Html => matches!(
            entry.name.as_str(),
            "address" | "applet" | "area" | "article" | "aside" | "base" | "basefont"
                | "bgsound" | "blockquote" | "body" | "br" | "button" | "caption" | "center"
                | "col" | "colgroup" | "dd" | "details" | "dir" | "div" | "dl" | "dt" | "embed"
                | "fieldset" | "figcaption" | "figure" | "footer" | "form" | "frame"
                | "frameset" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "head" | "header"
                | "hgroup" | "hr" | "html" | "iframe" | "img" | "input" | "keygen" | "li"
                | "link" | "listing" | "main" | "marquee" | "menu" | "meta" | "nav" | "noembed"
                | "noframes" | "noscript" | "object" | "ol" | "p" | "param" | "plaintext"
                | "pre" | "script" | "section" | "select" | "source" | "style" | "summary"
                | "table" | "tbody" | "td" | "template" | "textarea" | "tfoot" | "th" | "thead"
                | "title" | "tr" | "track" | "ul" | "wbr" | "xmp"
        ),
        ElementNs::MathMl => matches!(
            entry.name.as_str(),
            "mi" | "mo" | "mn" | "ms" | "mtext" | "annotation-xml"
        ),
        ElementNs::Svg => matches!(entry.name.as_str(), "foreignObject" | "desc" | "title"),
    }
}

fn is_whitespace_text(text: &str) -> bool {
    text.chars().all(|ch| matches!(ch, '\t' | '\n' | '\x0C' | '\r' | ' '))
}

fn advance_through(mut loc: Location, text: &str) -> Location {
    for ch in text.chars() {
        loc.advance(ch);
    }
    loc
}

pub(crate) struct TreeBuilder {
    mode: InsertionMode,
    original_mode: InsertionMode,
    template_modes: Vec<InsertionMode>,
    stack: OpenElementsStack,
    formatting: ActiveFormattingList,
    quirks: QuirksMode,
    head_seen: bool,
    form_active: bool,
    frameset_ok: bool,
    ignore_next_lf: bool,
    fragment: Option<String>,
    text_chunks: Vec<String>,
    text_location: Location,
    pending_table_text: Vec<String>,
    pending_table_text_location: Location,
    out: VecDeque<(Signal, Location)>,
    next_id: u32,
    done: bool,
}

impl TreeBuilder {
    pub(crate) fn new(fragment_context: Option<String>) -> Self {
        let mut builder = Self {
            mode: InsertionMode::Initial,
            original_mode: InsertionMode::Initial,
            template_modes: Vec::new(),
            stack: OpenElementsStack::default(),
            formatting: ActiveFormattingList::default(),
            quirks: QuirksMode::NoQuirks,
            head_seen: false,
            form_active: false,
            frameset_ok: true,
            ignore_next_lf: false,
            fragment: fragment_context,
            text_chunks: Vec::new(),
            text_location: Location::START,
            pending_table_text: Vec::new(),
            pending_table_text_location: Location::START,
            out: VecDeque::new(),
            next_id: 1,
            done: false,
        };
        if let Some(context) = builder.fragment.clone() {
            // Fragment parsing: a synthetic root stands in for the context
            // element's html ancestor chain.
            builder.push_synthetic("html", Location::START);
            if context == "template" {
                builder.template_modes.push(InsertionMode::InTemplate);
            }
            builder.head_seen = true;
            builder.reset_insertion_mode();
        }
        builder
    }

    pub(crate) fn pop_signal(&mut self) -> Option<(Signal, Location)> {
        self.out.pop_front()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done && self.out.is_empty()
    }

    /// Flush text that is still buffered because no later signal forced it
    /// out yet. Only meaningful once the token stream is exhausted.
    pub(crate) fn flush_pending(&mut self) {
        self.flush_text();
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        ctx.counters.tokens_processed = ctx.counters.tokens_processed.saturating_add(1);
        let token = match self.apply_ignore_lf(token) {
            Some(token) => token,
            None => return Ok(()),
        };
        if self.in_foreign_content(&token) {
            self.foreign_content(token, loc, tok, ctx)?;
        } else {
            self.dispatch(self.mode, token, loc, tok, ctx)?;
        }
        tok.set_in_foreign(
            self.stack
                .current()
                .is_some_and(|entry| entry.ns != ElementNs::Html),
        );
        ctx.counters.max_open_elements_depth = ctx
            .counters
            .max_open_elements_depth
            .max(self.stack.max_depth());
        Ok(())
    }

    fn apply_ignore_lf(&mut self, token: Token) -> Option<Token> {
        if !self.ignore_next_lf {
            return Some(token);
        }
        self.ignore_next_lf = false;
        match token {
            Token::Text(text) => {
                let stripped = text.strip_prefix('\n').map(str::to_string).unwrap_or(text);
                if stripped.is_empty() {
                    None
                } else {
                    Some(Token::Text(stripped))
                }
            }
            other => Some(other),
        }
    }

    // --- Signal emission ----------------------------------------------------

    fn emit(&mut self, signal: Signal, loc: Location) {
        self.flush_text();
        self.out.push_back((signal, loc));
    }

    fn append_text(&mut self, chunk: String, loc: Location) {
        if chunk.is_empty() {
            return;
        }
        if self.text_chunks.is_empty() {
            self.text_location = loc;
        }
        self.text_chunks.push(chunk);
    }

    fn flush_text(&mut self) {
        if !self.text_chunks.is_empty() {
            let chunks = std::mem::take(&mut self.text_chunks);
            self.out.push_back((Signal::Text(chunks), self.text_location));
        }
    }

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn push_synthetic(&mut self, name: &str, loc: Location) {
        let id = self.alloc_id();
        self.stack.push(OpenElement {
            id,
            name: name.to_string(),
            ns: ElementNs::Html,
            html_integration: false,
            attributes: Vec::new(),
            location: loc,
            synthetic: true,
        });
    }

    fn insert_html_element(
        &mut self,
        name: String,
        attributes: Vec<(String, String)>,
        loc: Location,
    ) -> u32 {
        let attributes: Vec<(Name, String)> = attributes
            .into_iter()
            .map(|(name, value)| (Name::local(name), value))
            .collect();
        self.insert_element(name, ElementNs::Html, false, attributes, loc)
    }

    fn insert_element(
        &mut self,
        name: String,
        ns: ElementNs,
        html_integration: bool,
        attributes: Vec<(Name, String)>,
        loc: Location,
    ) -> u32 {
        let id = self.alloc_id();
        let namespace = match ns {
            ElementNs::Html => HTML_NAMESPACE,
            ElementNs::Svg => SVG_NAMESPACE,
            ElementNs::MathMl => MATHML_NAMESPACE,
        };
        self.emit(
            Signal::StartElement {
                name: Name::in_namespace(namespace, name.clone()),
                attributes: attributes.clone(),
            },
            loc,
        );
        self.stack.push(OpenElement {
            id,
            name,
            ns,
            html_integration,
            attributes,
            location: loc,
            synthetic: false,
        });
        #[cfg(any(test, feature = "trace"))]
        log::trace!(target: "markup.html5.tree", "open <{}> depth={}", self.stack.current().map(|e| e.name.as_str()).unwrap_or(""), self.stack.len());
        id
    }

    /// Insert an element that cannot have content: start and end signals are
    /// emitted back to back and the stack is left unchanged.
    fn insert_void_html_element(
        &mut self,
        name: String,
        attributes: Vec<(String, String)>,
        loc: Location,
    ) {
        self.insert_html_element(name, attributes, loc);
        self.pop_element(loc);
    }

    fn pop_element(&mut self, loc: Location) {
        if let Some(entry) = self.stack.pop() {
            if !entry.synthetic {
                self.emit(Signal::EndElement, loc);
            }
            #[cfg(any(test, feature = "trace"))]
            log::trace!(target: "markup.html5.tree", "close <{}>", entry.name);
        }
    }

    /// Pop up to and including the nearest HTML element named in `targets`,
    /// reporting any other elements closed on the way as unmatched.
    fn pop_until_inclusive(
        &mut self,
        targets: &[&str],
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        while let Some(entry) = self.stack.current() {
            let found = entry.ns == ElementNs::Html && targets.contains(&entry.name.as_str());
            if !found && !entry.synthetic && !EOF_OK_TAGS.contains(&entry.name.as_str()) {
                ctx.error(
                    entry.location,
                    ParseError::UnmatchedStartTag {
                        name: entry.name.clone(),
                    },
                )?;
            }
            self.pop_element(loc);
            if found {
                break;
            }
        }
        Ok(())
    }

    fn generate_implied_end_tags(&mut self, except: Option<&str>, loc: Location) {
        while let Some(entry) = self.stack.current() {
            if entry.ns == ElementNs::Html
                && IMPLIED_END_TAGS.contains(&entry.name.as_str())
                && Some(entry.name.as_str()) != except
            {
                self.pop_element(loc);
            } else {
                break;
            }
        }
    }

    fn generate_implied_end_tags_thoroughly(&mut self, loc: Location) {
        while let Some(entry) = self.stack.current() {
            let name = entry.name.as_str();
            if entry.ns == ElementNs::Html
                && (IMPLIED_END_TAGS.contains(&name)
                    || matches!(
                        name,
                        "caption" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead" | "tr"
                    ))
            {
                self.pop_element(loc);
            } else {
                break;
            }
        }
    }

    fn close_p_element(
        &mut self,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        self.generate_implied_end_tags(Some("p"), loc);
        self.pop_until_inclusive(&["p"], loc, ctx)
    }

    fn close_p_if_in_button_scope(
        &mut self,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if self.stack.has_in_scope("p", ScopeKind::Button) {
            self.close_p_element(loc, ctx)?;
        }
        Ok(())
    }

    // --- Active formatting elements -----------------------------------------

    fn push_formatting_element(&mut self, id: u32) {
        let Some(index) = self.stack.index_of_id(id) else {
            return;
        };
        let entry = &self.stack.items()[index];
        self.formatting.push_element(FormattingElement {
            element_id: id,
            name: entry.name.clone(),
            attributes: entry.attributes.clone(),
        });
    }

    /// Reconstruct the active formatting elements: re-open (as clones) every
    /// entry after the last marker whose element is no longer on the stack.
    fn reconstruct_formatting(&mut self, loc: Location) {
        let needs_work = match self.formatting.entries().last() {
            None | Some(FormattingEntry::Marker) => false,
            Some(FormattingEntry::Element(element)) => {
                !self.stack.contains_id(element.element_id)
            }
        };
        if !needs_work {
            return;
        }
        let start = self.formatting.last_marker_index().map_or(0, |i| i + 1);
        let mut first = self.formatting.len();
        for index in (start..self.formatting.len()).rev() {
            match self.formatting.get_element(index) {
                Some(element) if !self.stack.contains_id(element.element_id) => first = index,
                _ => break,
            }
        }
        for index in first..self.formatting.len() {
            let Some(element) = self.formatting.get_element(index) else {
                continue;
            };
            let name = element.name.clone();
            let attributes = element.attributes.clone();
            let id = self.insert_element(name, ElementNs::Html, false, attributes, loc);
            self.formatting.rebind(index, id);
        }
    }

    /// The adoption agency algorithm, in its signal-space reading: cloning
    /// and reparenting become synthesized end tags plus re-opened clones.
    /// Bounded to eight outer iterations as specified.
    fn adoption_agency(
        &mut self,
        subject: &str,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if let Some(current) = self.stack.current()
            && current.is_html(subject)
            && !self.formatting.contains_element_id(current.id)
        {
            self.pop_element(loc);
            return Ok(());
        }

        for _ in 0..8 {
            let Some((entry_index, element)) = self.formatting.last_element_named(subject) else {
                return self.any_other_end_tag(subject.to_string(), loc, ctx);
            };
            let element_id = element.element_id;
            let fmt_name = element.name.clone();
            let fmt_attrs = element.attributes.clone();
            let Some(stack_index) = self.stack.index_of_id(element_id) else {
                ctx.error(
                    loc,
                    ParseError::UnmatchedEndTag {
                        name: subject.to_string(),
                    },
                )?;
                self.formatting.remove(entry_index);
                return Ok(());
            };
            if !self.stack.index_in_scope(stack_index, ScopeKind::InScope) {
                ctx.error(
                    loc,
                    ParseError::UnmatchedEndTag {
                        name: subject.to_string(),
                    },
                )?;
                return Ok(());
            }
            if stack_index != self.stack.len() - 1 {
                ctx.error(
                    loc,
                    ParseError::MisnestedTag {
                        name: subject.to_string(),
                    },
                )?;
            }

            // Furthest block: nearest special element deeper than the
            // formatting element.
            let furthest = self.stack.items()[stack_index + 1..]
                .iter()
                .position(is_special)
                .map(|offset| stack_index + 1 + offset);

            let Some(furthest_index) = furthest else {
                // Simple case: close everything down to and including the
                // formatting element.
                while self.stack.len() > stack_index {
                    self.pop_element(loc);
                }
                self.formatting.remove(entry_index);
                return Ok(());
            };

            // Clone case. Everything above the formatting element closes;
            // the furthest block and the elements above it re-open as
            // clones, with the formatting clone re-opened between the
            // furthest block and its former content. Intermediates between
            // the formatting element and the furthest block are dropped, as
            // the specification reparents them out of the way.
            let reopen: Vec<OpenElement> = self.stack.items()[furthest_index..].to_vec();
            while self.stack.len() > stack_index {
                self.pop_element(loc);
            }
            self.formatting.remove(entry_index);

            let mut reopened = reopen.into_iter();
            let furthest_block = reopened
                .next()
                .expect("furthest block is part of the reopen set");
            self.insert_element(
                furthest_block.name,
                furthest_block.ns,
                furthest_block.html_integration,
                furthest_block.attributes,
                loc,
            );
            let clone_id = self.insert_element(
                fmt_name.clone(),
                ElementNs::Html,
                false,
                fmt_attrs.clone(),
                loc,
            );
            self.formatting.insert_element(
                entry_index,
                FormattingElement {
                    element_id: clone_id,
                    name: fmt_name,
                    attributes: fmt_attrs,
                },
            );
            for entry in reopened {
                self.insert_element(
                    entry.name,
                    entry.ns,
                    entry.html_integration,
                    entry.attributes,
                    loc,
                );
            }
        }
        Ok(())
    }

    fn any_other_end_tag(
        &mut self,
        name: String,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        for index in (0..self.stack.len()).rev() {
            let entry = &self.stack.items()[index];
            if entry.is_html(&name) {
                self.generate_implied_end_tags(Some(&name), loc);
                if self.stack.len() != index + 1 {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                }
                while self.stack.len() > index {
                    self.pop_element(loc);
                }
                return Ok(());
            }
            if is_special(entry) {
                ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                return Ok(());
            }
        }
        ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
        Ok(())
    }

    // --- Mode dispatch ------------------------------------------------------

    fn dispatch(
        &mut self,
        mode: InsertionMode,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        #[cfg(any(test, feature = "trace"))]
        log::trace!(target: "markup.html5.tree", "{mode:?} <- {token:?}");
        match mode {
            InsertionMode::Initial => self.mode_initial(token, loc, tok, ctx),
            InsertionMode::BeforeHtml => self.mode_before_html(token, loc, tok, ctx),
            InsertionMode::BeforeHead => self.mode_before_head(token, loc, tok, ctx),
            InsertionMode::InHead => self.mode_in_head(token, loc, tok, ctx),
            InsertionMode::InHeadNoscript => self.mode_in_head_noscript(token, loc, tok, ctx),
            InsertionMode::AfterHead => self.mode_after_head(token, loc, tok, ctx),
            InsertionMode::InBody => self.mode_in_body(token, loc, tok, ctx),
            InsertionMode::Text => self.mode_text(token, loc, tok, ctx),
            InsertionMode::InTable => self.mode_in_table(token, loc, tok, ctx),
            InsertionMode::InTableText => self.mode_in_table_text(token, loc, tok, ctx),
            InsertionMode::InCaption => self.mode_in_caption(token, loc, tok, ctx),
            InsertionMode::InColumnGroup => self.mode_in_column_group(token, loc, tok, ctx),
            InsertionMode::InTableBody => self.mode_in_table_body(token, loc, tok, ctx),
            InsertionMode::InRow => self.mode_in_row(token, loc, tok, ctx),
            InsertionMode::InCell => self.mode_in_cell(token, loc, tok, ctx),
            InsertionMode::InSelect => self.mode_in_select(token, loc, tok, ctx),
            InsertionMode::InSelectInTable => self.mode_in_select_in_table(token, loc, tok, ctx),
            InsertionMode::InTemplate => self.mode_in_template(token, loc, tok, ctx),
            InsertionMode::AfterBody => self.mode_after_body(token, loc, tok, ctx),
            InsertionMode::InFrameset => self.mode_in_frameset(token, loc, tok, ctx),
            InsertionMode::AfterFrameset => self.mode_after_frameset(token, loc, tok, ctx),
            InsertionMode::AfterAfterBody => self.mode_after_after_body(token, loc, tok, ctx),
            InsertionMode::AfterAfterFrameset => {
                self.mode_after_after_frameset(token, loc, tok, ctx)
            }
        }
    }

    fn mode_initial(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                let rest = text.trim_start_matches(|ch| matches!(ch, '\t' | '\n' | '\x0C' | ' '));
                if rest.is_empty() {
                    return Ok(());
                }
                let rest_loc = advance_through(loc, &text[..text.len() - rest.len()]);
                self.anything_else_initial(ctx, loc)?;
                self.dispatch(self.mode, Token::Text(rest.to_string()), rest_loc, tok, ctx)
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(doctype) => {
                let simple = doctype.name.as_deref() == Some("html")
                    && doctype.public_id.is_none()
                    && (doctype.system_id.is_none()
                        || doctype.system_id.as_deref() == Some("about:legacy-compat"));
                if !simple {
                    ctx.error(loc, ParseError::BadDoctype)?;
                }
                self.quirks = quirks::classify(&doctype);
                self.emit(Signal::Doctype(doctype), loc);
                self.mode = InsertionMode::BeforeHtml;
                Ok(())
            }
            Token::Eof => {
                self.anything_else_initial(ctx, loc)?;
                self.dispatch(self.mode, Token::Eof, loc, tok, ctx)
            }
            other => {
                self.anything_else_initial(ctx, loc)?;
                self.dispatch(self.mode, other, loc, tok, ctx)
            }
        }
    }

    fn anything_else_initial(
        &mut self,
        ctx: &mut ParseContext,
        loc: Location,
    ) -> Result<(), StreamError> {
        ctx.error(loc, ParseError::BadDoctype)?;
        self.quirks = QuirksMode::Quirks;
        self.mode = InsertionMode::BeforeHtml;
        Ok(())
    }

    fn mode_before_html(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Text(text) => {
                let rest = text.trim_start_matches(|ch| matches!(ch, '\t' | '\n' | '\x0C' | ' '));
                if rest.is_empty() {
                    return Ok(());
                }
                let rest_loc = advance_through(loc, &text[..text.len() - rest.len()]);
                self.push_synthetic("html", loc);
                self.mode = InsertionMode::BeforeHead;
                self.dispatch(self.mode, Token::Text(rest.to_string()), rest_loc, tok, ctx)
            }
            Token::StartTag { name, .. } if name == "html" => {
                self.push_synthetic("html", loc);
                self.mode = InsertionMode::BeforeHead;
                Ok(())
            }
            Token::EndTag { ref name }
                if !matches!(name.as_str(), "head" | "body" | "html" | "br") =>
            {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                Ok(())
            }
            other => {
                self.push_synthetic("html", loc);
                self.mode = InsertionMode::BeforeHead;
                self.dispatch(self.mode, other, loc, tok, ctx)
            }
        }
    }

    fn mode_before_head(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                let rest = text.trim_start_matches(|ch| matches!(ch, '\t' | '\n' | '\x0C' | ' '));
                if rest.is_empty() {
                    return Ok(());
                }
                let rest_loc = advance_through(loc, &text[..text.len() - rest.len()]);
                self.open_head(loc);
                self.dispatch(self.mode, Token::Text(rest.to_string()), rest_loc, tok, ctx)
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { name, attributes, self_closing } if name == "html" => {
                self.mode_in_body(
                    Token::StartTag { name, attributes, self_closing },
                    loc,
                    tok,
                    ctx,
                )
            }
            Token::StartTag { name, .. } if name == "head" => {
                self.open_head(loc);
                Ok(())
            }
            Token::EndTag { ref name }
                if !matches!(name.as_str(), "head" | "body" | "html" | "br") =>
            {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                Ok(())
            }
            other => {
                self.open_head(loc);
                self.dispatch(self.mode, other, loc, tok, ctx)
            }
        }
    }

    fn open_head(&mut self, loc: Location) {
        self.push_synthetic("head", loc);
        self.head_seen = true;
        self.mode = InsertionMode::InHead;
    }

    fn mode_in_head(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                let rest = text.trim_start_matches(|ch| matches!(ch, '\t' | '\n' | '\x0C' | ' '));
                let ws_len = text.len() - rest.len();
                if ws_len > 0 {
                    self.append_text(text[..ws_len].to_string(), loc);
                }
                if rest.is_empty() {
                    return Ok(());
                }
                let rest_loc = advance_through(loc, &text[..ws_len]);
                self.close_head(rest_loc);
                self.dispatch(self.mode, Token::Text(rest.to_string()), rest_loc, tok, ctx)
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { name, attributes, self_closing } => match name.as_str() {
                "html" => self.mode_in_body(
                    Token::StartTag { name, attributes, self_closing },
                    loc,
                    tok,
                    ctx,
                ),
                "base" | "basefont" | "bgsound" | "link" | "meta" => {
                    self.insert_void_html_element(name, attributes, loc);
                    Ok(())
                }
                "title" => {
                    self.parse_raw_text(name, attributes, loc, tok, State::Rcdata);
                    Ok(())
                }
                "noscript" => {
                    // Scripting is off for this implementation.
                    self.insert_html_element(name, attributes, loc);
                    self.mode = InsertionMode::InHeadNoscript;
                    Ok(())
                }
                "noframes" | "style" => {
                    self.parse_raw_text(name, attributes, loc, tok, State::Rawtext);
                    Ok(())
                }
                "script" => {
                    self.parse_raw_text(name, attributes, loc, tok, State::ScriptData);
                    Ok(())
                }
                "template" => {
                    self.insert_html_element(name, attributes, loc);
                    self.formatting.push_marker();
                    self.frameset_ok = false;
                    self.mode = InsertionMode::InTemplate;
                    self.template_modes.push(InsertionMode::InTemplate);
                    Ok(())
                }
                "head" => {
                    ctx.error(loc, ParseError::MisnestedTag { name })?;
                    Ok(())
                }
                _ => {
                    self.close_head(loc);
                    self.dispatch(
                        self.mode,
                        Token::StartTag { name, attributes, self_closing },
                        loc,
                        tok,
                        ctx,
                    )
                }
            },
            Token::EndTag { name } => match name.as_str() {
                "head" => {
                    self.close_head(loc);
                    Ok(())
                }
                "template" => self.close_template(loc, ctx),
                "body" | "html" | "br" => {
                    self.close_head(loc);
                    self.dispatch(self.mode, Token::EndTag { name }, loc, tok, ctx)
                }
                _ => {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    Ok(())
                }
            },
            Token::Eof => {
                self.close_head(loc);
                self.dispatch(self.mode, Token::Eof, loc, tok, ctx)
            }
            other => {
                debug_assert!(false, "unexpected token in head: {other:?}");
                Ok(())
            }
        }
    }

    fn close_head(&mut self, loc: Location) {
        // The head entry is synthetic; popping emits nothing.
        if self.stack.current().is_some_and(|entry| entry.is_html("head")) {
            self.pop_element(loc);
        }
        self.mode = InsertionMode::AfterHead;
    }

    fn close_template(
        &mut self,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if !self
            .stack
            .items()
            .iter()
            .any(|entry| entry.is_html("template"))
        {
            ctx.error(
                loc,
                ParseError::UnmatchedEndTag {
                    name: "template".to_string(),
                },
            )?;
            return Ok(());
        }
        self.generate_implied_end_tags_thoroughly(loc);
        if !self
            .stack
            .current()
            .is_some_and(|entry| entry.is_html("template"))
        {
            ctx.error(
                loc,
                ParseError::MisnestedTag {
                    name: "template".to_string(),
                },
            )?;
        }
        self.pop_until_inclusive(&["template"], loc, ctx)?;
        self.formatting.clear_to_last_marker();
        self.template_modes.pop();
        self.reset_insertion_mode();
        Ok(())
    }

    fn mode_in_head_noscript(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { ref name, .. } if name == "html" => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::EndTag { ref name } if name == "noscript" => {
                self.pop_element(loc);
                self.mode = InsertionMode::InHead;
                Ok(())
            }
            Token::Text(ref text) if is_whitespace_text(text) => {
                self.mode_in_head(token, loc, tok, ctx)
            }
            Token::Comment(_) => self.mode_in_head(token, loc, tok, ctx),
            Token::StartTag { ref name, .. }
                if matches!(
                    name.as_str(),
                    "basefont" | "bgsound" | "link" | "meta" | "noframes" | "style"
                ) =>
            {
                self.mode_in_head(token, loc, tok, ctx)
            }
            Token::StartTag { ref name, .. } if matches!(name.as_str(), "head" | "noscript") => {
                ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                Ok(())
            }
            Token::EndTag { ref name } if name != "br" => {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                Ok(())
            }
            other => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '<' })?;
                self.pop_element(loc);
                self.mode = InsertionMode::InHead;
                self.dispatch(self.mode, other, loc, tok, ctx)
            }
        }
    }

    fn mode_after_head(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                let rest = text.trim_start_matches(|ch| matches!(ch, '\t' | '\n' | '\x0C' | ' '));
                let ws_len = text.len() - rest.len();
                if ws_len > 0 {
                    self.append_text(text[..ws_len].to_string(), loc);
                }
                if rest.is_empty() {
                    return Ok(());
                }
                let rest_loc = advance_through(loc, &text[..ws_len]);
                self.open_body(rest_loc);
                self.dispatch(self.mode, Token::Text(rest.to_string()), rest_loc, tok, ctx)
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { name, attributes, self_closing } => match name.as_str() {
                "html" => self.mode_in_body(
                    Token::StartTag { name, attributes, self_closing },
                    loc,
                    tok,
                    ctx,
                ),
                "body" => {
                    self.open_body(loc);
                    self.frameset_ok = false;
                    Ok(())
                }
                "frameset" => {
                    self.insert_html_element(name, attributes, loc);
                    self.mode = InsertionMode::InFrameset;
                    Ok(())
                }
                "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                | "style" | "template" | "title" => {
                    // Stray head content after the head has closed: emitted
                    // at its detection point, with a report.
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    self.mode_in_head(
                        Token::StartTag { name, attributes, self_closing },
                        loc,
                        tok,
                        ctx,
                    )
                }
                "head" => {
                    ctx.error(loc, ParseError::MisnestedTag { name })?;
                    Ok(())
                }
                _ => {
                    self.open_body(loc);
                    self.dispatch(
                        self.mode,
                        Token::StartTag { name, attributes, self_closing },
                        loc,
                        tok,
                        ctx,
                    )
                }
            },
            Token::EndTag { name } => match name.as_str() {
                "template" => self.close_template(loc, ctx),
                "body" | "html" | "br" => {
                    self.open_body(loc);
                    self.dispatch(self.mode, Token::EndTag { name }, loc, tok, ctx)
                }
                _ => {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    Ok(())
                }
            },
            Token::Eof => {
                self.open_body(loc);
                self.dispatch(self.mode, Token::Eof, loc, tok, ctx)
            }
            other => {
                debug_assert!(false, "unexpected token after head: {other:?}");
                Ok(())
            }
        }
    }

    fn open_body(&mut self, loc: Location) {
        self.push_synthetic("body", loc);
        self.mode = InsertionMode::InBody;
    }

    fn mode_in_body(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                self.reconstruct_formatting(loc);
                if !is_whitespace_text(&text) {
                    self.frameset_ok = false;
                }
                self.append_text(text, loc);
                Ok(())
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { name, attributes, self_closing } => {
                self.in_body_start_tag(name, attributes, self_closing, loc, tok, ctx)
            }
            Token::EndTag { name } => self.in_body_end_tag(name, loc, tok, ctx),
            Token::Eof => {
                if !self.template_modes.is_empty() {
                    return self.mode_in_template(Token::Eof, loc, tok, ctx);
                }
                self.stop_parsing(loc, ctx)
            }
            other => {
                debug_assert!(false, "unexpected token in body: {other:?}");
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_lines, reason = "one arm per specification rule")]
    fn in_body_start_tag(
        &mut self,
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match name.as_str() {
            "html" => {
                // The html element never surfaces as a signal; a repeated
                // tag cannot merge attributes into it either.
                ctx.error(loc, ParseError::MisnestedTag { name })?;
                Ok(())
            }
            "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
            | "style" | "template" | "title" => self.mode_in_head(
                Token::StartTag { name, attributes, self_closing },
                loc,
                tok,
                ctx,
            ),
            "body" => {
                ctx.error(loc, ParseError::MisnestedTag { name })?;
                self.frameset_ok = false;
                Ok(())
            }
            "frameset" => {
                ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                if !self.frameset_ok {
                    return Ok(());
                }
                // Abandon the body: close everything down to it, then open
                // the frameset in its place.
                while self
                    .stack
                    .current()
                    .is_some_and(|entry| !entry.is_html("body") && !entry.is_html("html"))
                {
                    self.pop_element(loc);
                }
                if self.stack.current().is_some_and(|entry| entry.is_html("body")) {
                    self.pop_element(loc);
                }
                self.insert_html_element(name, attributes, loc);
                self.mode = InsertionMode::InFrameset;
                Ok(())
            }
            "address" | "article" | "aside" | "blockquote" | "center" | "details" | "dialog"
            | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure" | "footer"
            | "header" | "hgroup" | "main" | "menu" | "nav" | "ol" | "p" | "section"
            | "summary" | "ul" => {
                self.close_p_if_in_button_scope(loc, ctx)?;
                self.insert_html_element(name, attributes, loc);
                Ok(())
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.close_p_if_in_button_scope(loc, ctx)?;
                if self.stack.current().is_some_and(|entry| {
                    entry.ns == ElementNs::Html
                        && matches!(entry.name.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
                }) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    self.pop_element(loc);
                }
                self.insert_html_element(name, attributes, loc);
                Ok(())
            }
            "pre" | "listing" => {
                self.close_p_if_in_button_scope(loc, ctx)?;
                self.insert_html_element(name, attributes, loc);
                self.ignore_next_lf = true;
                self.frameset_ok = false;
                Ok(())
            }
            "form" => {
                if self.form_active && !self.template_on_stack() {
                    ctx.error(loc, ParseError::MisnestedTag { name })?;
                    return Ok(());
                }
                self.close_p_if_in_button_scope(loc, ctx)?;
                self.insert_html_element(name, attributes, loc);
                if !self.template_on_stack() {
                    self.form_active = true;
                }
                Ok(())
            }
            "li" => {
                self.frameset_ok = false;
                if self.stack.has_in_scope("li", ScopeKind::ListItem) {
                    self.generate_implied_end_tags(Some("li"), loc);
                    self.pop_until_inclusive(&["li"], loc, ctx)?;
                }
                self.close_p_if_in_button_scope(loc, ctx)?;
                self.insert_html_element(name, attributes, loc);
                Ok(())
            }
            "dd" | "dt" => {
                self.frameset_ok = false;
                for target in ["dd", "dt"] {
                    if self.stack.has_in_scope(target, ScopeKind::InScope) {
                        self.generate_implied_end_tags(Some(target), loc);
                        self.pop_until_inclusive(&[target], loc, ctx)?;
                        break;
                    }
                }
                self.close_p_if_in_button_scope(loc, ctx)?;
                self.insert_html_element(name, attributes, loc);
                Ok(())
            }
            "plaintext" => {
                self.close_p_if_in_button_scope(loc, ctx)?;
                self.insert_html_element(name, attributes, loc);
                tok.set_state(State::Plaintext);
                Ok(())
            }
            "button" => {
                if self.stack.has_in_scope("button", ScopeKind::InScope) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    self.generate_implied_end_tags(None, loc);
                    self.pop_until_inclusive(&["button"], loc, ctx)?;
                }
                self.reconstruct_formatting(loc);
                self.insert_html_element(name, attributes, loc);
                self.frameset_ok = false;
                Ok(())
            }
            "a" => {
                if self.formatting.last_element_named("a").is_some() {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    self.adoption_agency("a", loc, ctx)?;
                    if let Some((index, element)) = self.formatting.last_element_named("a") {
                        let id = element.element_id;
                        self.formatting.remove(index);
                        if let Some(stack_index) = self.stack.index_of_id(id) {
                            while self.stack.len() > stack_index {
                                self.pop_element(loc);
                            }
                        }
                    }
                }
                self.reconstruct_formatting(loc);
                let id = self.insert_html_element(name, attributes, loc);
                self.push_formatting_element(id);
                Ok(())
            }
            "b" | "big" | "code" | "em" | "font" | "i" | "s" | "small" | "strike" | "strong"
            | "tt" | "u" => {
                self.reconstruct_formatting(loc);
                let id = self.insert_html_element(name, attributes, loc);
                self.push_formatting_element(id);
                Ok(())
            }
            "nobr" => {
                self.reconstruct_formatting(loc);
                if self.stack.has_in_scope("nobr", ScopeKind::InScope) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    self.adoption_agency("nobr", loc, ctx)?;
                    self.reconstruct_formatting(loc);
                }
                let id = self.insert_html_element(name, attributes, loc);
                self.push_formatting_element(id);
                Ok(())
            }
            "applet" | "marquee" | "object" => {
                self.reconstruct_formatting(loc);
                self.insert_html_element(name, attributes, loc);
                self.formatting.push_marker();
                self.frameset_ok = false;
                Ok(())
            }
            "table" => {
                if self.quirks != QuirksMode::Quirks {
                    self.close_p_if_in_button_scope(loc, ctx)?;
                }
                self.insert_html_element(name, attributes, loc);
                self.frameset_ok = false;
                self.mode = InsertionMode::InTable;
                Ok(())
            }
            "area" | "br" | "embed" | "img" | "keygen" | "wbr" => {
                self.reconstruct_formatting(loc);
                self.insert_void_html_element(name, attributes, loc);
                self.frameset_ok = false;
                Ok(())
            }
            "input" => {
                self.reconstruct_formatting(loc);
                let hidden = attributes
                    .iter()
                    .any(|(name, value)| name == "type" && value.eq_ignore_ascii_case("hidden"));
                self.insert_void_html_element(name, attributes, loc);
                if !hidden {
                    self.frameset_ok = false;
                }
                Ok(())
            }
            "param" | "source" | "track" => {
                self.insert_void_html_element(name, attributes, loc);
                Ok(())
            }
            "hr" => {
                self.close_p_if_in_button_scope(loc, ctx)?;
                self.insert_void_html_element(name, attributes, loc);
                self.frameset_ok = false;
                Ok(())
            }
            "image" => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '<' })?;
                self.in_body_start_tag("img".to_string(), attributes, self_closing, loc, tok, ctx)
            }
            "textarea" => {
                self.insert_html_element(name, attributes, loc);
                self.ignore_next_lf = true;
                tok.set_state(State::Rcdata);
                self.original_mode = self.mode;
                self.mode = InsertionMode::Text;
                self.frameset_ok = false;
                Ok(())
            }
            "xmp" => {
                self.close_p_if_in_button_scope(loc, ctx)?;
                self.reconstruct_formatting(loc);
                self.frameset_ok = false;
                self.parse_raw_text(name, attributes, loc, tok, State::Rawtext);
                Ok(())
            }
            "iframe" => {
                self.frameset_ok = false;
                self.parse_raw_text(name, attributes, loc, tok, State::Rawtext);
                Ok(())
            }
            "noembed" => {
                self.parse_raw_text(name, attributes, loc, tok, State::Rawtext);
                Ok(())
            }
            "select" => {
                self.reconstruct_formatting(loc);
                self.insert_html_element(name, attributes, loc);
                self.frameset_ok = false;
                self.mode = if matches!(
                    self.mode,
                    InsertionMode::InTable
                        | InsertionMode::InCaption
                        | InsertionMode::InTableBody
                        | InsertionMode::InRow
                        | InsertionMode::InCell
                ) {
                    InsertionMode::InSelectInTable
                } else {
                    InsertionMode::InSelect
                };
                Ok(())
            }
            "optgroup" | "option" => {
                if self.stack.current().is_some_and(|entry| entry.is_html("option")) {
                    self.pop_element(loc);
                }
                self.reconstruct_formatting(loc);
                self.insert_html_element(name, attributes, loc);
                Ok(())
            }
            "rb" | "rtc" => {
                if self.stack.has_in_scope("ruby", ScopeKind::InScope) {
                    self.generate_implied_end_tags(None, loc);
                }
                self.insert_html_element(name, attributes, loc);
                Ok(())
            }
            "rp" | "rt" => {
                if self.stack.has_in_scope("ruby", ScopeKind::InScope) {
                    self.generate_implied_end_tags(Some("rtc"), loc);
                }
                self.insert_html_element(name, attributes, loc);
                Ok(())
            }
            "math" => {
                self.reconstruct_formatting(loc);
                let attributes = foreign::adjust_foreign_attributes(false, attributes);
                self.insert_element(name, ElementNs::MathMl, false, attributes, loc);
                if self_closing {
                    self.pop_element(loc);
                }
                Ok(())
            }
            "svg" => {
                self.reconstruct_formatting(loc);
                let attributes = foreign::adjust_foreign_attributes(true, attributes);
                self.insert_element(name, ElementNs::Svg, false, attributes, loc);
                if self_closing {
                    self.pop_element(loc);
                }
                Ok(())
            }
            "caption" | "col" | "colgroup" | "frame" | "head" | "tbody" | "td" | "tfoot"
            | "th" | "thead" | "tr" => {
                ctx.error(loc, ParseError::MisnestedTag { name })?;
                Ok(())
            }
            _ => {
                self.reconstruct_formatting(loc);
                self.insert_html_element(name, attributes, loc);
                Ok(())
            }
        }
    }

    fn in_body_end_tag(
        &mut self,
        name: String,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match name.as_str() {
            "template" => self.close_template(loc, ctx),
            "body" | "html" => {
                if !self.stack.has_in_scope("body", ScopeKind::InScope) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    return Ok(());
                }
                for entry in self.stack.items() {
                    if !entry.synthetic && !EOF_OK_TAGS.contains(&entry.name.as_str()) {
                        ctx.error(
                            entry.location,
                            ParseError::UnmatchedStartTag {
                                name: entry.name.clone(),
                            },
                        )?;
                    }
                }
                self.mode = InsertionMode::AfterBody;
                if name == "html" {
                    return self.dispatch(self.mode, Token::EndTag { name }, loc, tok, ctx);
                }
                Ok(())
            }
            "address" | "article" | "aside" | "blockquote" | "button" | "center" | "details"
            | "dialog" | "dir" | "div" | "dl" | "fieldset" | "figcaption" | "figure"
            | "footer" | "header" | "hgroup" | "listing" | "main" | "menu" | "nav" | "ol"
            | "pre" | "section" | "summary" | "ul" => {
                if !self.stack.has_in_scope(&name, ScopeKind::InScope) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    return Ok(());
                }
                self.generate_implied_end_tags(None, loc);
                if !self.stack.current().is_some_and(|entry| entry.is_html(&name)) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                }
                self.pop_until_inclusive(&[name.as_str()], loc, ctx)
            }
            "form" => {
                if !self.template_on_stack() {
                    self.form_active = false;
                }
                if !self.stack.has_in_scope("form", ScopeKind::InScope) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    return Ok(());
                }
                self.generate_implied_end_tags(None, loc);
                if !self.stack.current().is_some_and(|entry| entry.is_html("form")) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                }
                self.pop_until_inclusive(&["form"], loc, ctx)
            }
            "p" => {
                if !self.stack.has_in_scope("p", ScopeKind::Button) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    self.insert_html_element("p".to_string(), Vec::new(), loc);
                }
                self.close_p_element(loc, ctx)
            }
            "li" => {
                if !self.stack.has_in_scope("li", ScopeKind::ListItem) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    return Ok(());
                }
                self.generate_implied_end_tags(Some("li"), loc);
                self.pop_until_inclusive(&["li"], loc, ctx)
            }
            "dd" | "dt" => {
                if !self.stack.has_in_scope(&name, ScopeKind::InScope) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    return Ok(());
                }
                self.generate_implied_end_tags(Some(&name), loc);
                self.pop_until_inclusive(&[name.as_str()], loc, ctx)
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];
                if !self.stack.has_any_in_scope(&HEADINGS, ScopeKind::InScope) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    return Ok(());
                }
                self.generate_implied_end_tags(None, loc);
                if !self.stack.current().is_some_and(|entry| entry.is_html(&name)) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                }
                self.pop_until_inclusive(&HEADINGS, loc, ctx)
            }
            "a" | "b" | "big" | "code" | "em" | "font" | "i" | "nobr" | "s" | "small"
            | "strike" | "strong" | "tt" | "u" => self.adoption_agency(&name, loc, ctx),
            "applet" | "marquee" | "object" => {
                if !self.stack.has_in_scope(&name, ScopeKind::InScope) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    return Ok(());
                }
                self.generate_implied_end_tags(None, loc);
                if !self.stack.current().is_some_and(|entry| entry.is_html(&name)) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                }
                self.pop_until_inclusive(&[name.as_str()], loc, ctx)?;
                self.formatting.clear_to_last_marker();
                Ok(())
            }
            "br" => {
                ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                self.reconstruct_formatting(loc);
                self.insert_void_html_element("br".to_string(), Vec::new(), loc);
                self.frameset_ok = false;
                Ok(())
            }
            _ => self.any_other_end_tag(name, loc, ctx),
        }
    }

    fn mode_text(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                self.append_text(text, loc);
                Ok(())
            }
            Token::EndTag { .. } => {
                self.pop_element(loc);
                self.mode = self.original_mode;
                Ok(())
            }
            Token::Eof => {
                if let Some(entry) = self.stack.current() {
                    ctx.error(
                        entry.location,
                        ParseError::UnmatchedStartTag {
                            name: entry.name.clone(),
                        },
                    )?;
                }
                self.pop_element(loc);
                self.mode = self.original_mode;
                self.dispatch(self.mode, Token::Eof, loc, tok, ctx)
            }
            other => {
                debug_assert!(false, "unexpected token in text mode: {other:?}");
                Ok(())
            }
        }
    }

    fn parse_raw_text(
        &mut self,
        name: String,
        attributes: Vec<(String, String)>,
        loc: Location,
        tok: &mut HtmlTokenizer,
        state: State,
    ) {
        self.insert_html_element(name, attributes, loc);
        tok.set_state(state);
        self.original_mode = self.mode;
        self.mode = InsertionMode::Text;
    }

    // --- Table modes --------------------------------------------------------

    fn clear_stack_to_context(&mut self, context: &[&str], loc: Location) {
        while let Some(entry) = self.stack.current() {
            if entry.ns == ElementNs::Html
                && (context.contains(&entry.name.as_str()) || entry.synthetic)
            {
                break;
            }
            self.pop_element(loc);
        }
    }

    fn mode_in_table(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(_)
                if self.stack.current().is_some_and(|entry| {
                    entry.ns == ElementNs::Html
                        && matches!(
                            entry.name.as_str(),
                            "table" | "tbody" | "tfoot" | "thead" | "tr"
                        )
                }) =>
            {
                self.pending_table_text.clear();
                self.pending_table_text_location = loc;
                self.original_mode = self.mode;
                self.mode = InsertionMode::InTableText;
                self.dispatch(self.mode, token, loc, tok, ctx)
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { name, attributes, self_closing } => match name.as_str() {
                "caption" => {
                    self.clear_stack_to_context(&["table", "template"], loc);
                    self.formatting.push_marker();
                    self.insert_html_element(name, attributes, loc);
                    self.mode = InsertionMode::InCaption;
                    Ok(())
                }
                "colgroup" => {
                    self.clear_stack_to_context(&["table", "template"], loc);
                    self.insert_html_element(name, attributes, loc);
                    self.mode = InsertionMode::InColumnGroup;
                    Ok(())
                }
                "col" => {
                    self.clear_stack_to_context(&["table", "template"], loc);
                    self.insert_html_element("colgroup".to_string(), Vec::new(), loc);
                    self.mode = InsertionMode::InColumnGroup;
                    self.dispatch(
                        self.mode,
                        Token::StartTag { name, attributes, self_closing },
                        loc,
                        tok,
                        ctx,
                    )
                }
                "tbody" | "tfoot" | "thead" => {
                    self.clear_stack_to_context(&["table", "template"], loc);
                    self.insert_html_element(name, attributes, loc);
                    self.mode = InsertionMode::InTableBody;
                    Ok(())
                }
                "td" | "th" | "tr" => {
                    self.clear_stack_to_context(&["table", "template"], loc);
                    self.insert_html_element("tbody".to_string(), Vec::new(), loc);
                    self.mode = InsertionMode::InTableBody;
                    self.dispatch(
                        self.mode,
                        Token::StartTag { name, attributes, self_closing },
                        loc,
                        tok,
                        ctx,
                    )
                }
                "table" => {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    if !self.stack.has_in_scope("table", ScopeKind::Table) {
                        return Ok(());
                    }
                    self.pop_until_inclusive(&["table"], loc, ctx)?;
                    self.reset_insertion_mode();
                    self.dispatch(
                        self.mode,
                        Token::StartTag { name, attributes, self_closing },
                        loc,
                        tok,
                        ctx,
                    )
                }
                "style" | "script" | "template" => self.mode_in_head(
                    Token::StartTag { name, attributes, self_closing },
                    loc,
                    tok,
                    ctx,
                ),
                "input" => {
                    let hidden = attributes.iter().any(|(name, value)| {
                        name == "type" && value.eq_ignore_ascii_case("hidden")
                    });
                    if hidden {
                        ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                        self.insert_void_html_element(name, attributes, loc);
                        Ok(())
                    } else {
                        self.foster_parent(
                            Token::StartTag { name, attributes, self_closing },
                            loc,
                            tok,
                            ctx,
                        )
                    }
                }
                "form" => {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    if self.form_active || self.template_on_stack() {
                        return Ok(());
                    }
                    self.insert_void_html_element(name, attributes, loc);
                    self.form_active = true;
                    Ok(())
                }
                _ => self.foster_parent(
                    Token::StartTag { name, attributes, self_closing },
                    loc,
                    tok,
                    ctx,
                ),
            },
            Token::EndTag { name } => match name.as_str() {
                "table" => {
                    if !self.stack.has_in_scope("table", ScopeKind::Table) {
                        ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                        return Ok(());
                    }
                    self.pop_until_inclusive(&["table"], loc, ctx)?;
                    self.reset_insertion_mode();
                    Ok(())
                }
                "body" | "caption" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot"
                | "th" | "thead" | "tr" => {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    Ok(())
                }
                "template" => self.close_template(loc, ctx),
                _ => self.foster_parent(Token::EndTag { name }, loc, tok, ctx),
            },
            Token::Eof => self.mode_in_body(Token::Eof, loc, tok, ctx),
            // Character data with a non-table current node is foster
            // parented like any other mis-placed content.
            other => self.foster_parent(other, loc, tok, ctx),
        }
    }

    /// Foster parenting, signal-space reading: the mis-placed content is
    /// emitted at its detection point in document order (locations stay
    /// monotonic), with a parse-error report.
    fn foster_parent(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match &token {
            Token::StartTag { name, .. } => {
                ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
            }
            Token::Text(_) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: ' ' })?;
            }
            _ => {}
        }
        self.mode_in_body(token, loc, tok, ctx)
    }

    fn mode_in_table_text(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                if self.pending_table_text.is_empty() {
                    self.pending_table_text_location = loc;
                }
                self.pending_table_text.push(text);
                Ok(())
            }
            other => {
                let pending = std::mem::take(&mut self.pending_table_text);
                let pending_loc = self.pending_table_text_location;
                let all_ws = pending.iter().all(|chunk| is_whitespace_text(chunk));
                if !all_ws {
                    ctx.error(pending_loc, ParseError::UnexpectedCharacter { ch: ' ' })?;
                    self.reconstruct_formatting(pending_loc);
                }
                for chunk in pending {
                    self.append_text(chunk, pending_loc);
                }
                self.mode = self.original_mode;
                self.dispatch(self.mode, other, loc, tok, ctx)
            }
        }
    }

    fn mode_in_caption(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::EndTag { ref name } if name == "caption" => {
                self.close_caption(loc, ctx)?;
                Ok(())
            }
            Token::StartTag { ref name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr"
                ) =>
            {
                if !self.stack.has_in_scope("caption", ScopeKind::Table) {
                    ctx.error(
                        loc,
                        ParseError::MisnestedTag {
                            name: name.clone(),
                        },
                    )?;
                    return Ok(());
                }
                self.close_caption(loc, ctx)?;
                self.dispatch(self.mode, token, loc, tok, ctx)
            }
            Token::EndTag { ref name } if name == "table" => {
                if !self.stack.has_in_scope("caption", ScopeKind::Table) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                    return Ok(());
                }
                self.close_caption(loc, ctx)?;
                self.dispatch(self.mode, token, loc, tok, ctx)
            }
            Token::EndTag { ref name }
                if matches!(
                    name.as_str(),
                    "body" | "col" | "colgroup" | "html" | "tbody" | "td" | "tfoot" | "th"
                        | "thead" | "tr"
                ) =>
            {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                Ok(())
            }
            other => self.mode_in_body(other, loc, tok, ctx),
        }
    }

    fn close_caption(
        &mut self,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if !self.stack.has_in_scope("caption", ScopeKind::Table) {
            ctx.error(
                loc,
                ParseError::UnmatchedEndTag {
                    name: "caption".to_string(),
                },
            )?;
            return Ok(());
        }
        self.generate_implied_end_tags(None, loc);
        if !self.stack.current().is_some_and(|entry| entry.is_html("caption")) {
            ctx.error(
                loc,
                ParseError::MisnestedTag {
                    name: "caption".to_string(),
                },
            )?;
        }
        self.pop_until_inclusive(&["caption"], loc, ctx)?;
        self.formatting.clear_to_last_marker();
        self.mode = InsertionMode::InTable;
        Ok(())
    }

    fn mode_in_column_group(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                let rest = text.trim_start_matches(|ch| matches!(ch, '\t' | '\n' | '\x0C' | ' '));
                let ws_len = text.len() - rest.len();
                if ws_len > 0 {
                    self.append_text(text[..ws_len].to_string(), loc);
                }
                if rest.is_empty() {
                    return Ok(());
                }
                let rest_loc = advance_through(loc, &text[..ws_len]);
                self.end_column_group(rest_loc, ctx)?;
                self.dispatch(self.mode, Token::Text(rest.to_string()), rest_loc, tok, ctx)
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { ref name, .. } if name == "html" => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::StartTag { name, attributes, .. } if name == "col" => {
                self.insert_void_html_element(name, attributes, loc);
                Ok(())
            }
            Token::EndTag { ref name } if name == "colgroup" => {
                if self.stack.current().is_some_and(|entry| entry.is_html("colgroup")) {
                    self.pop_element(loc);
                    self.mode = InsertionMode::InTable;
                } else {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                }
                Ok(())
            }
            Token::EndTag { ref name } if name == "col" => {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                Ok(())
            }
            Token::StartTag { ref name, .. } if name == "template" => {
                self.mode_in_head(token, loc, tok, ctx)
            }
            Token::EndTag { ref name } if name == "template" => self.close_template(loc, ctx),
            Token::Eof => self.mode_in_body(Token::Eof, loc, tok, ctx),
            other => {
                self.end_column_group(loc, ctx)?;
                self.dispatch(self.mode, other, loc, tok, ctx)
            }
        }
    }

    fn end_column_group(
        &mut self,
        loc: Location,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if self.stack.current().is_some_and(|entry| entry.is_html("colgroup")) {
            self.pop_element(loc);
            self.mode = InsertionMode::InTable;
            Ok(())
        } else {
            ctx.error(
                loc,
                ParseError::UnmatchedEndTag {
                    name: "colgroup".to_string(),
                },
            )
            .map_err(Into::into)
        }
    }

    fn mode_in_table_body(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::StartTag { name, attributes, .. } if name == "tr" => {
                self.clear_stack_to_context(&["tbody", "tfoot", "thead", "template"], loc);
                self.insert_html_element(name, attributes, loc);
                self.mode = InsertionMode::InRow;
                Ok(())
            }
            Token::StartTag { ref name, .. } if matches!(name.as_str(), "td" | "th") => {
                ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                self.clear_stack_to_context(&["tbody", "tfoot", "thead", "template"], loc);
                self.insert_html_element("tr".to_string(), Vec::new(), loc);
                self.mode = InsertionMode::InRow;
                self.dispatch(self.mode, token, loc, tok, ctx)
            }
            Token::EndTag { ref name }
                if matches!(name.as_str(), "tbody" | "tfoot" | "thead") =>
            {
                if !self.stack.has_in_scope(name, ScopeKind::Table) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                    return Ok(());
                }
                self.clear_stack_to_context(&["tbody", "tfoot", "thead", "template"], loc);
                self.pop_element(loc);
                self.mode = InsertionMode::InTable;
                Ok(())
            }
            Token::StartTag { ref name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead"
                ) =>
            {
                self.end_table_section(token, loc, tok, ctx)
            }
            Token::EndTag { ref name } if name == "table" => {
                self.end_table_section(token, loc, tok, ctx)
            }
            Token::EndTag { ref name }
                if matches!(
                    name.as_str(),
                    "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th" | "tr"
                ) =>
            {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                Ok(())
            }
            other => self.mode_in_table(other, loc, tok, ctx),
        }
    }

    fn end_table_section(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if !self.stack.has_any_in_scope(&["tbody", "thead", "tfoot"], ScopeKind::Table) {
            ctx.error(
                loc,
                ParseError::UnmatchedEndTag {
                    name: "tbody".to_string(),
                },
            )?;
            return Ok(());
        }
        self.clear_stack_to_context(&["tbody", "tfoot", "thead", "template"], loc);
        self.pop_element(loc);
        self.mode = InsertionMode::InTable;
        self.dispatch(self.mode, token, loc, tok, ctx)
    }

    fn mode_in_row(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::StartTag { name, attributes, .. }
                if matches!(name.as_str(), "td" | "th") =>
            {
                self.clear_stack_to_context(&["tr", "template"], loc);
                self.insert_html_element(name, attributes, loc);
                self.mode = InsertionMode::InCell;
                self.formatting.push_marker();
                Ok(())
            }
            Token::EndTag { ref name } if name == "tr" => {
                if !self.stack.has_in_scope("tr", ScopeKind::Table) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                    return Ok(());
                }
                self.clear_stack_to_context(&["tr", "template"], loc);
                self.pop_element(loc);
                self.mode = InsertionMode::InTableBody;
                Ok(())
            }
            Token::StartTag { ref name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "tfoot" | "thead" | "tr"
                ) =>
            {
                self.end_row_then(token, loc, tok, ctx)
            }
            Token::EndTag { ref name } if name == "table" => {
                self.end_row_then(token, loc, tok, ctx)
            }
            Token::EndTag { ref name }
                if matches!(name.as_str(), "tbody" | "tfoot" | "thead") =>
            {
                if !self.stack.has_in_scope(name, ScopeKind::Table) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                    return Ok(());
                }
                self.end_row_then(token, loc, tok, ctx)
            }
            Token::EndTag { ref name }
                if matches!(
                    name.as_str(),
                    "body" | "caption" | "col" | "colgroup" | "html" | "td" | "th"
                ) =>
            {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                Ok(())
            }
            other => self.mode_in_table(other, loc, tok, ctx),
        }
    }

    fn end_row_then(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if !self.stack.has_in_scope("tr", ScopeKind::Table) {
            ctx.error(
                loc,
                ParseError::UnmatchedEndTag {
                    name: "tr".to_string(),
                },
            )?;
            return Ok(());
        }
        self.clear_stack_to_context(&["tr", "template"], loc);
        self.pop_element(loc);
        self.mode = InsertionMode::InTableBody;
        self.dispatch(self.mode, token, loc, tok, ctx)
    }

    fn mode_in_cell(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::EndTag { ref name } if matches!(name.as_str(), "td" | "th") => {
                if !self.stack.has_in_scope(name, ScopeKind::Table) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                    return Ok(());
                }
                self.generate_implied_end_tags(None, loc);
                if !self.stack.current().is_some_and(|entry| entry.is_html(name)) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                }
                self.pop_until_inclusive(&[name.as_str()], loc, ctx)?;
                self.formatting.clear_to_last_marker();
                self.mode = InsertionMode::InRow;
                Ok(())
            }
            Token::StartTag { ref name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "col" | "colgroup" | "tbody" | "td" | "tfoot" | "th" | "thead"
                        | "tr"
                ) =>
            {
                if !self.stack.has_any_in_scope(&["td", "th"], ScopeKind::Table) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    return Ok(());
                }
                self.close_cell(loc, ctx)?;
                self.dispatch(self.mode, token, loc, tok, ctx)
            }
            Token::EndTag { ref name }
                if matches!(name.as_str(), "body" | "caption" | "col" | "colgroup" | "html") =>
            {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                Ok(())
            }
            Token::EndTag { ref name }
                if matches!(name.as_str(), "table" | "tbody" | "tfoot" | "thead" | "tr") =>
            {
                if !self.stack.has_in_scope(name, ScopeKind::Table) {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                    return Ok(());
                }
                self.close_cell(loc, ctx)?;
                self.dispatch(self.mode, token, loc, tok, ctx)
            }
            other => self.mode_in_body(other, loc, tok, ctx),
        }
    }

    fn close_cell(&mut self, loc: Location, ctx: &mut ParseContext) -> Result<(), StreamError> {
        self.generate_implied_end_tags(None, loc);
        if !self.stack.current().is_some_and(|entry| {
            entry.ns == ElementNs::Html && matches!(entry.name.as_str(), "td" | "th")
        }) {
            ctx.error(
                loc,
                ParseError::MisnestedTag {
                    name: "td".to_string(),
                },
            )?;
        }
        self.pop_until_inclusive(&["td", "th"], loc, ctx)?;
        self.formatting.clear_to_last_marker();
        self.mode = InsertionMode::InRow;
        Ok(())
    }

    fn mode_in_select(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                self.append_text(text, loc);
                Ok(())
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { name, attributes, self_closing } => match name.as_str() {
                "html" => self.mode_in_body(
                    Token::StartTag { name, attributes, self_closing },
                    loc,
                    tok,
                    ctx,
                ),
                "option" => {
                    if self.stack.current().is_some_and(|entry| entry.is_html("option")) {
                        self.pop_element(loc);
                    }
                    self.insert_html_element(name, attributes, loc);
                    Ok(())
                }
                "optgroup" => {
                    if self.stack.current().is_some_and(|entry| entry.is_html("option")) {
                        self.pop_element(loc);
                    }
                    if self.stack.current().is_some_and(|entry| entry.is_html("optgroup")) {
                        self.pop_element(loc);
                    }
                    self.insert_html_element(name, attributes, loc);
                    Ok(())
                }
                "hr" => {
                    if self.stack.current().is_some_and(|entry| entry.is_html("option")) {
                        self.pop_element(loc);
                    }
                    if self.stack.current().is_some_and(|entry| entry.is_html("optgroup")) {
                        self.pop_element(loc);
                    }
                    self.insert_void_html_element(name, attributes, loc);
                    Ok(())
                }
                "select" => {
                    ctx.error(loc, ParseError::MisnestedTag { name })?;
                    self.close_select(loc, ctx)
                }
                "input" | "keygen" | "textarea" => {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    if !self.stack.has_in_scope("select", ScopeKind::Select) {
                        return Ok(());
                    }
                    self.close_select(loc, ctx)?;
                    self.dispatch(
                        self.mode,
                        Token::StartTag { name, attributes, self_closing },
                        loc,
                        tok,
                        ctx,
                    )
                }
                "script" | "template" => self.mode_in_head(
                    Token::StartTag { name, attributes, self_closing },
                    loc,
                    tok,
                    ctx,
                ),
                _ => {
                    ctx.error(loc, ParseError::MisnestedTag { name })?;
                    Ok(())
                }
            },
            Token::EndTag { name } => match name.as_str() {
                "optgroup" => {
                    let option_on_top =
                        self.stack.current().is_some_and(|entry| entry.is_html("option"));
                    if option_on_top
                        && self
                            .stack
                            .get(self.stack.len().wrapping_sub(2))
                            .is_some_and(|entry| entry.is_html("optgroup"))
                    {
                        self.pop_element(loc);
                    }
                    if self.stack.current().is_some_and(|entry| entry.is_html("optgroup")) {
                        self.pop_element(loc);
                    } else {
                        ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    }
                    Ok(())
                }
                "option" => {
                    if self.stack.current().is_some_and(|entry| entry.is_html("option")) {
                        self.pop_element(loc);
                    } else {
                        ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    }
                    Ok(())
                }
                "select" => {
                    if !self.stack.has_in_scope("select", ScopeKind::Select) {
                        ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                        return Ok(());
                    }
                    self.close_select(loc, ctx)
                }
                "template" => self.close_template(loc, ctx),
                _ => {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    Ok(())
                }
            },
            Token::Eof => self.mode_in_body(Token::Eof, loc, tok, ctx),
            other => {
                debug_assert!(false, "unexpected token in select: {other:?}");
                Ok(())
            }
        }
    }

    fn close_select(&mut self, loc: Location, ctx: &mut ParseContext) -> Result<(), StreamError> {
        self.pop_until_inclusive(&["select"], loc, ctx)?;
        self.reset_insertion_mode();
        Ok(())
    }

    fn mode_in_select_in_table(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match &token {
            Token::StartTag { name, .. }
                if matches!(
                    name.as_str(),
                    "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th"
                ) =>
            {
                ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                self.close_select(loc, ctx)?;
                self.dispatch(self.mode, token, loc, tok, ctx)
            }
            Token::EndTag { name }
                if matches!(
                    name.as_str(),
                    "caption" | "table" | "tbody" | "tfoot" | "thead" | "tr" | "td" | "th"
                ) =>
            {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                if !self.stack.has_in_scope(name, ScopeKind::Table) {
                    return Ok(());
                }
                self.close_select(loc, ctx)?;
                self.dispatch(self.mode, token, loc, tok, ctx)
            }
            _ => self.mode_in_select(token, loc, tok, ctx),
        }
    }

    fn mode_in_template(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(_) | Token::Comment(_) | Token::Doctype(_) => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::StartTag { ref name, .. }
                if matches!(
                    name.as_str(),
                    "base" | "basefont" | "bgsound" | "link" | "meta" | "noframes" | "script"
                        | "style" | "template" | "title"
                ) =>
            {
                self.mode_in_head(token, loc, tok, ctx)
            }
            Token::EndTag { ref name } if name == "template" => self.close_template(loc, ctx),
            Token::StartTag { ref name, .. }
                if matches!(name.as_str(), "caption" | "colgroup" | "tbody" | "tfoot" | "thead") =>
            {
                self.retarget_template(InsertionMode::InTable, token, loc, tok, ctx)
            }
            Token::StartTag { ref name, .. } if name == "col" => {
                self.retarget_template(InsertionMode::InColumnGroup, token, loc, tok, ctx)
            }
            Token::StartTag { ref name, .. } if name == "tr" => {
                self.retarget_template(InsertionMode::InTableBody, token, loc, tok, ctx)
            }
            Token::StartTag { ref name, .. } if matches!(name.as_str(), "td" | "th") => {
                self.retarget_template(InsertionMode::InRow, token, loc, tok, ctx)
            }
            Token::StartTag { .. } => {
                self.retarget_template(InsertionMode::InBody, token, loc, tok, ctx)
            }
            Token::EndTag { ref name } => {
                ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                Ok(())
            }
            Token::Eof => {
                if !self.template_on_stack() {
                    return self.stop_parsing(loc, ctx);
                }
                ctx.error(
                    loc,
                    ParseError::UnexpectedEof {
                        expected: "</template>",
                    },
                )?;
                self.pop_until_inclusive(&["template"], loc, ctx)?;
                self.formatting.clear_to_last_marker();
                self.template_modes.pop();
                self.reset_insertion_mode();
                self.dispatch(self.mode, Token::Eof, loc, tok, ctx)
            }
            other => {
                debug_assert!(false, "unexpected token in template: {other:?}");
                Ok(())
            }
        }
    }

    fn retarget_template(
        &mut self,
        mode: InsertionMode,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        self.template_modes.pop();
        self.template_modes.push(mode);
        self.mode = mode;
        self.dispatch(self.mode, token, loc, tok, ctx)
    }

    fn mode_after_body(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(ref text) if is_whitespace_text(text) => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { ref name, .. } if name == "html" => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::EndTag { ref name } if name == "html" => {
                if self.fragment.is_some() {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name: name.clone() })?;
                    return Ok(());
                }
                self.mode = InsertionMode::AfterAfterBody;
                Ok(())
            }
            Token::Eof => self.stop_parsing(loc, ctx),
            other => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '<' })?;
                self.mode = InsertionMode::InBody;
                self.dispatch(self.mode, other, loc, tok, ctx)
            }
        }
    }

    fn mode_in_frameset(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                // Only whitespace survives in a frameset document.
                let ws: String = text
                    .chars()
                    .filter(|ch| matches!(ch, '\t' | '\n' | '\x0C' | ' '))
                    .collect();
                if ws.len() != text.len() {
                    ctx.error(loc, ParseError::UnexpectedCharacter { ch: ' ' })?;
                }
                self.append_text(ws, loc);
                Ok(())
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { name, attributes, self_closing } => match name.as_str() {
                "html" => self.mode_in_body(
                    Token::StartTag { name, attributes, self_closing },
                    loc,
                    tok,
                    ctx,
                ),
                "frameset" => {
                    self.insert_html_element(name, attributes, loc);
                    Ok(())
                }
                "frame" => {
                    self.insert_void_html_element(name, attributes, loc);
                    Ok(())
                }
                "noframes" => self.mode_in_head(
                    Token::StartTag { name, attributes, self_closing },
                    loc,
                    tok,
                    ctx,
                ),
                _ => {
                    ctx.error(loc, ParseError::MisnestedTag { name })?;
                    Ok(())
                }
            },
            Token::EndTag { name } => {
                if name == "frameset" {
                    if self
                        .stack
                        .current()
                        .is_some_and(|entry| entry.is_html("frameset"))
                    {
                        self.pop_element(loc);
                        if self.fragment.is_none()
                            && !self
                                .stack
                                .current()
                                .is_some_and(|entry| entry.is_html("frameset"))
                        {
                            self.mode = InsertionMode::AfterFrameset;
                        }
                    } else {
                        ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                    }
                } else {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                }
                Ok(())
            }
            Token::Eof => {
                if self
                    .stack
                    .current()
                    .is_some_and(|entry| !entry.is_html("html"))
                {
                    ctx.error(
                        loc,
                        ParseError::UnexpectedEof {
                            expected: "</frameset>",
                        },
                    )?;
                }
                self.stop_parsing(loc, ctx)
            }
            other => {
                debug_assert!(false, "unexpected token in frameset: {other:?}");
                Ok(())
            }
        }
    }

    fn mode_after_frameset(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                let ws: String = text
                    .chars()
                    .filter(|ch| matches!(ch, '\t' | '\n' | '\x0C' | ' '))
                    .collect();
                if ws.len() != text.len() {
                    ctx.error(loc, ParseError::UnexpectedCharacter { ch: ' ' })?;
                }
                self.append_text(ws, loc);
                Ok(())
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::StartTag { ref name, .. } if name == "html" => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::StartTag { ref name, .. } if name == "noframes" => {
                self.mode_in_head(token, loc, tok, ctx)
            }
            Token::EndTag { ref name } if name == "html" => {
                self.mode = InsertionMode::AfterAfterFrameset;
                Ok(())
            }
            Token::Eof => self.stop_parsing(loc, ctx),
            other => {
                if let Token::EndTag { name } | Token::StartTag { name, .. } = other {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                }
                Ok(())
            }
        }
    }

    fn mode_after_after_body(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => self.mode_in_body(token, loc, tok, ctx),
            Token::Text(ref text) if is_whitespace_text(text) => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::StartTag { ref name, .. } if name == "html" => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::Eof => self.stop_parsing(loc, ctx),
            other => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '<' })?;
                self.mode = InsertionMode::InBody;
                self.dispatch(self.mode, other, loc, tok, ctx)
            }
        }
    }

    fn mode_after_after_frameset(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => self.mode_in_body(token, loc, tok, ctx),
            Token::Text(ref text) if is_whitespace_text(text) => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::StartTag { ref name, .. } if name == "html" => {
                self.mode_in_body(token, loc, tok, ctx)
            }
            Token::StartTag { ref name, .. } if name == "noframes" => {
                self.mode_in_head(token, loc, tok, ctx)
            }
            Token::Eof => self.stop_parsing(loc, ctx),
            other => {
                if let Token::EndTag { name } | Token::StartTag { name, .. } = other {
                    ctx.error(loc, ParseError::UnmatchedEndTag { name })?;
                }
                Ok(())
            }
        }
    }

    // --- Foreign content ----------------------------------------------------

    fn in_foreign_content(&self, token: &Token) -> bool {
        let Some(current) = self.stack.current() else {
            return false;
        };
        if current.ns == ElementNs::Html {
            return false;
        }
        if matches!(token, Token::Eof) {
            return false;
        }
        if current.mathml_text_integration() {
            match token {
                Token::StartTag { name, .. } if name != "mglyph" && name != "malignmark" => {
                    return false;
                }
                Token::Text(_) => return false,
                _ => {}
            }
        }
        if current.ns == ElementNs::MathMl
            && current.name == "annotation-xml"
            && matches!(token, Token::StartTag { name, .. } if name == "svg")
        {
            return false;
        }
        if current.html_integration
            && matches!(token, Token::StartTag { .. } | Token::Text(_))
        {
            return false;
        }
        true
    }

    fn foreign_content(
        &mut self,
        token: Token,
        loc: Location,
        tok: &mut HtmlTokenizer,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match token {
            Token::Text(text) => {
                if !is_whitespace_text(&text) {
                    self.frameset_ok = false;
                }
                self.append_text(text, loc);
                Ok(())
            }
            Token::Comment(text) => {
                self.emit(Signal::Comment(text), loc);
                Ok(())
            }
            Token::Doctype(_) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                Ok(())
            }
            Token::StartTag { name, attributes, self_closing } => {
                if foreign::is_breakout_tag(&name, &attributes) {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                    while let Some(entry) = self.stack.current() {
                        if entry.ns == ElementNs::Html
                            || entry.html_integration
                            || entry.mathml_text_integration()
                        {
                            break;
                        }
                        self.pop_element(loc);
                    }
                    return self.dispatch(
                        self.mode,
                        Token::StartTag { name, attributes, self_closing },
                        loc,
                        tok,
                        ctx,
                    );
                }
                let ns = self
                    .stack
                    .current()
                    .map_or(ElementNs::Html, |entry| entry.ns);
                let (name, attributes, integration) = match ns {
                    ElementNs::Svg => {
                        let adjusted = foreign::adjust_svg_tag_name(&name).to_string();
                        let integration =
                            matches!(adjusted.as_str(), "foreignObject" | "desc" | "title");
                        (adjusted, foreign::adjust_foreign_attributes(true, attributes), integration)
                    }
                    _ => {
                        let integration = name == "annotation-xml"
                            && attributes.iter().any(|(attr, value)| {
                                attr == "encoding"
                                    && (value.eq_ignore_ascii_case("text/html")
                                        || value.eq_ignore_ascii_case("application/xhtml+xml"))
                            });
                        (name, foreign::adjust_foreign_attributes(false, attributes), integration)
                    }
                };
                self.insert_element(name, ns, integration, attributes, loc);
                if self_closing {
                    self.pop_element(loc);
                }
                Ok(())
            }
            Token::EndTag { name } => {
                if !self
                    .stack
                    .current()
                    .is_some_and(|entry| entry.name.eq_ignore_ascii_case(&name))
                {
                    ctx.error(loc, ParseError::MisnestedTag { name: name.clone() })?;
                }
                let mut index = self.stack.len().saturating_sub(1);
                loop {
                    if index == 0 {
                        return Ok(());
                    }
                    if self.stack.items()[index].name.eq_ignore_ascii_case(&name) {
                        while self.stack.len() > index {
                            self.pop_element(loc);
                        }
                        return Ok(());
                    }
                    index -= 1;
                    if self.stack.items()[index].ns == ElementNs::Html {
                        return self.dispatch(self.mode, Token::EndTag { name }, loc, tok, ctx);
                    }
                }
            }
            other => {
                debug_assert!(false, "unexpected token in foreign content: {other:?}");
                Ok(())
            }
        }
    }

    // --- Mode reset and termination -----------------------------------------

    fn template_on_stack(&self) -> bool {
        self.stack.items().iter().any(|entry| entry.is_html("template"))
    }

    fn reset_insertion_mode(&mut self) {
        for index in (0..self.stack.len()).rev() {
            let last = index == 0;
            let entry = &self.stack.items()[index];
            let name: &str = if last && self.fragment.is_some() {
                self.fragment.as_deref().unwrap_or("")
            } else {
                entry.name.as_str()
            };
            let html_ns = entry.ns == ElementNs::Html || (last && self.fragment.is_some());
            if !html_ns {
                continue;
            }
            match name {
                "select" => {
                    let mut mode = InsertionMode::InSelect;
                    for ancestor in self.stack.items()[..index].iter().rev() {
                        if ancestor.is_html("template") {
                            break;
                        }
                        if ancestor.is_html("table") {
                            mode = InsertionMode::InSelectInTable;
                            break;
                        }
                    }
                    self.mode = mode;
                    return;
                }
                "td" | "th" if !last => {
                    self.mode = InsertionMode::InCell;
                    return;
                }
                "tr" => {
                    self.mode = InsertionMode::InRow;
                    return;
                }
                "tbody" | "thead" | "tfoot" => {
                    self.mode = InsertionMode::InTableBody;
                    return;
                }
                "caption" => {
                    self.mode = InsertionMode::InCaption;
                    return;
                }
                "colgroup" => {
                    self.mode = InsertionMode::InColumnGroup;
                    return;
                }
                "table" => {
                    self.mode = InsertionMode::InTable;
                    return;
                }
                "template" => {
                    self.mode = self
                        .template_modes
                        .last()
                        .copied()
                        .unwrap_or(InsertionMode::InTemplate);
                    return;
                }
                "head" if !last => {
                    self.mode = InsertionMode::InHead;
                    return;
                }
                "body" => {
                    self.mode = InsertionMode::InBody;
                    return;
                }
                "frameset" => {
                    self.mode = InsertionMode::InFrameset;
                    return;
                }
                "html" => {
                    self.mode = if self.head_seen {
                        InsertionMode::AfterHead
                    } else {
                        InsertionMode::BeforeHead
                    };
                    return;
                }
                _ if last => {
                    self.mode = InsertionMode::InBody;
                    return;
                }
                _ => {}
            }
        }
        self.mode = InsertionMode::InBody;
    }

    /// EOF: synthesize end signals for everything still open, reporting the
    /// elements whose absence of an end tag the specification calls out.
    fn stop_parsing(&mut self, loc: Location, ctx: &mut ParseContext) -> Result<(), StreamError> {
        while let Some(entry) = self.stack.current() {
            if !entry.synthetic && !EOF_OK_TAGS.contains(&entry.name.as_str()) {
                ctx.error(
                    entry.location,
                    ParseError::UnmatchedStartTag {
                        name: entry.name.clone(),
                    },
                )?;
            }
            self.pop_element(loc);
        }
        self.flush_text();
        self.done = true;
        Ok(())
    }
}
