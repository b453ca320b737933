//! HTML5 tokenizer.
//!
//! A Mealy machine over decoded scalars: one handler per specification state,
//! dispatched over the `State` enum. The machine is pull-driven and resumable
//! between tokens; `next_token` advances only far enough to produce one token.
//!
//! Invariants:
//! - Input ownership: a tokenizer instance is bound to one `Input` for its
//!   lifetime; look-ahead is expressed through `Input::push_back`.
//! - Character runs are batched: contiguous character emissions coalesce into
//!   one `Token::Text` chunk, flushed before any non-character token.
//! - Content-model coupling is unidirectional: the tree builder switches the
//!   tokenizer into RCDATA/RAWTEXT/script-data/PLAINTEXT, the tokenizer never
//!   writes builder state.
//! - Duplicate attributes are dropped at assembly time, first occurrence
//!   wins.

use crate::context::ParseContext;
use crate::entities;
use crate::error::{ParseError, StreamError};
use crate::input::Input;
use crate::location::Location;
use crate::signal::Doctype;
use crate::source::ByteSource;
use crate::token::Token;
use std::collections::VecDeque;

mod states;
pub(crate) use states::State;

const WS: [char; 4] = ['\t', '\n', '\x0C', ' '];

fn is_ws(ch: char) -> bool {
    WS.contains(&ch)
}

pub(crate) struct HtmlTokenizer {
    state: State,
    return_state: State,
    tokens: VecDeque<(Token, Location)>,
    text: String,
    text_location: Location,
    /// Location of the `<` / `<!` that opened the token being assembled.
    token_location: Location,
    tag_name: String,
    tag_is_end: bool,
    tag_self_closing: bool,
    tag_attrs: Vec<(String, String)>,
    attr_name: String,
    attr_value: String,
    attr_in_progress: bool,
    comment: String,
    doctype: Doctype,
    temp: String,
    char_ref_location: Location,
    char_ref_raw: String,
    char_ref_code: u32,
    last_start_tag: String,
    in_foreign: bool,
    eof_queued: bool,
}

impl HtmlTokenizer {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Data,
            return_state: State::Data,
            tokens: VecDeque::new(),
            text: String::new(),
            text_location: Location::START,
            token_location: Location::START,
            tag_name: String::new(),
            tag_is_end: false,
            tag_self_closing: false,
            tag_attrs: Vec::new(),
            attr_name: String::new(),
            attr_value: String::new(),
            attr_in_progress: false,
            comment: String::new(),
            doctype: Doctype::default(),
            temp: String::new(),
            char_ref_location: Location::START,
            char_ref_raw: String::new(),
            char_ref_code: 0,
            last_start_tag: String::new(),
            in_foreign: false,
            eof_queued: false,
        }
    }

    /// Content-model switch, driven by the tree builder when it opens a
    /// raw-text, RCDATA, script or plaintext element.
    pub(crate) fn set_state(&mut self, state: State) {
        self.state = state;
    }

    pub(crate) fn set_last_start_tag(&mut self, name: &str) {
        self.last_start_tag.clear();
        self.last_start_tag.push_str(name);
    }

    /// True while the adjusted current node is outside the HTML namespace;
    /// gates `<![CDATA[` recognition.
    pub(crate) fn set_in_foreign(&mut self, in_foreign: bool) {
        self.in_foreign = in_foreign;
    }

    /// Produce the next token. `Ok(None)` after `Eof` has been delivered.
    pub(crate) fn next_token<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<Option<(Token, Location)>, StreamError> {
        loop {
            while let Some(loc) = input.take_decode_error() {
                ctx.error(
                    loc,
                    ParseError::BadByteSequence {
                        encoding: input.encoding_name(),
                    },
                )?;
            }
            if let Some(item) = self.tokens.pop_front() {
                return Ok(Some(item));
            }
            if self.eof_queued {
                return Ok(None);
            }
            self.step(input, ctx)?;
        }
    }

    fn transition_to(&mut self, next: State) {
        #[cfg(any(test, feature = "trace"))]
        if self.state != next {
            log::trace!(target: "markup.html5.tokenizer", "state {:?} -> {:?}", self.state, next);
        }
        self.state = next;
    }

    fn step<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match self.state {
            State::Data => self.step_data(input, ctx),
            State::Rcdata => self.step_rcdata(input, ctx),
            State::Rawtext => self.step_rawtext(input, ctx),
            State::ScriptData => self.step_script_data(input, ctx),
            State::Plaintext => self.step_plaintext(input, ctx),
            State::TagOpen => self.step_tag_open(input, ctx),
            State::EndTagOpen => self.step_end_tag_open(input, ctx),
            State::TagName => self.step_tag_name(input, ctx),
            State::RcdataLessThanSign => self.step_raw_less_than_sign(input, State::Rcdata),
            State::RcdataEndTagOpen => self.step_raw_end_tag_open(input, State::Rcdata),
            State::RcdataEndTagName => self.step_raw_end_tag_name(input, ctx, State::Rcdata),
            State::RawtextLessThanSign => self.step_raw_less_than_sign(input, State::Rawtext),
            State::RawtextEndTagOpen => self.step_raw_end_tag_open(input, State::Rawtext),
            State::RawtextEndTagName => self.step_raw_end_tag_name(input, ctx, State::Rawtext),
            State::ScriptDataLessThanSign => self.step_script_data_less_than_sign(input),
            State::ScriptDataEndTagOpen => self.step_raw_end_tag_open(input, State::ScriptData),
            State::ScriptDataEndTagName => {
                self.step_raw_end_tag_name(input, ctx, State::ScriptData)
            }
            State::ScriptDataEscapeStart => self.step_script_data_escape_start(input),
            State::ScriptDataEscapeStartDash => self.step_script_data_escape_start_dash(input),
            State::ScriptDataEscaped => self.step_script_data_escaped(input, ctx),
            State::ScriptDataEscapedDash => self.step_script_data_escaped_dash(input, ctx),
            State::ScriptDataEscapedDashDash => {
                self.step_script_data_escaped_dash_dash(input, ctx)
            }
            State::ScriptDataEscapedLessThanSign => {
                self.step_script_data_escaped_less_than_sign(input)
            }
            State::ScriptDataEscapedEndTagOpen => {
                self.step_raw_end_tag_open(input, State::ScriptDataEscaped)
            }
            State::ScriptDataEscapedEndTagName => {
                self.step_raw_end_tag_name(input, ctx, State::ScriptDataEscaped)
            }
            State::ScriptDataDoubleEscapeStart => {
                self.step_script_data_double_escape_transition(input, State::ScriptDataDoubleEscaped, State::ScriptDataEscaped)
            }
            State::ScriptDataDoubleEscaped => self.step_script_data_double_escaped(input, ctx),
            State::ScriptDataDoubleEscapedDash => {
                self.step_script_data_double_escaped_dash(input, ctx)
            }
            State::ScriptDataDoubleEscapedDashDash => {
                self.step_script_data_double_escaped_dash_dash(input, ctx)
            }
            State::ScriptDataDoubleEscapedLessThanSign => {
                self.step_script_data_double_escaped_less_than_sign(input)
            }
            State::ScriptDataDoubleEscapeEnd => {
                self.step_script_data_double_escape_transition(input, State::ScriptDataEscaped, State::ScriptDataDoubleEscaped)
            }
            State::BeforeAttributeName => self.step_before_attribute_name(input, ctx),
            State::AttributeName => self.step_attribute_name(input, ctx),
            State::AfterAttributeName => self.step_after_attribute_name(input, ctx),
            State::BeforeAttributeValue => self.step_before_attribute_value(input, ctx),
            State::AttributeValueDoubleQuoted => {
                self.step_attribute_value_quoted(input, ctx, '"')
            }
            State::AttributeValueSingleQuoted => {
                self.step_attribute_value_quoted(input, ctx, '\'')
            }
            State::AttributeValueUnquoted => self.step_attribute_value_unquoted(input, ctx),
            State::AfterAttributeValueQuoted => self.step_after_attribute_value_quoted(input, ctx),
            State::SelfClosingStartTag => self.step_self_closing_start_tag(input, ctx),
            State::BogusComment => self.step_bogus_comment(input, ctx),
            State::MarkupDeclarationOpen => self.step_markup_declaration_open(input, ctx),
            State::CommentStart => self.step_comment_start(input, ctx),
            State::CommentStartDash => self.step_comment_start_dash(input, ctx),
            State::Comment => self.step_comment(input, ctx),
            State::CommentLessThanSign => self.step_comment_less_than_sign(input),
            State::CommentLessThanSignBang => self.step_comment_less_than_sign_bang(input),
            State::CommentLessThanSignBangDash => {
                self.step_comment_less_than_sign_bang_dash(input)
            }
            State::CommentLessThanSignBangDashDash => {
                self.step_comment_less_than_sign_bang_dash_dash(input, ctx)
            }
            State::CommentEndDash => self.step_comment_end_dash(input, ctx),
            State::CommentEnd => self.step_comment_end(input, ctx),
            State::CommentEndBang => self.step_comment_end_bang(input, ctx),
            State::Doctype => self.step_doctype(input, ctx),
            State::BeforeDoctypeName => self.step_before_doctype_name(input, ctx),
            State::DoctypeName => self.step_doctype_name(input, ctx),
            State::AfterDoctypeName => self.step_after_doctype_name(input, ctx),
            State::AfterDoctypePublicKeyword => {
                self.step_after_doctype_public_keyword(input, ctx)
            }
            State::BeforeDoctypePublicIdentifier => {
                self.step_before_doctype_public_identifier(input, ctx)
            }
            State::DoctypePublicIdentifierDoubleQuoted => {
                self.step_doctype_public_identifier(input, ctx, '"')
            }
            State::DoctypePublicIdentifierSingleQuoted => {
                self.step_doctype_public_identifier(input, ctx, '\'')
            }
            State::AfterDoctypePublicIdentifier => {
                self.step_after_doctype_public_identifier(input, ctx)
            }
            State::BetweenDoctypePublicAndSystemIdentifiers => {
                self.step_between_doctype_public_and_system(input, ctx)
            }
            State::AfterDoctypeSystemKeyword => {
                self.step_after_doctype_system_keyword(input, ctx)
            }
            State::BeforeDoctypeSystemIdentifier => {
                self.step_before_doctype_system_identifier(input, ctx)
            }
            State::DoctypeSystemIdentifierDoubleQuoted => {
                self.step_doctype_system_identifier(input, ctx, '"')
            }
            State::DoctypeSystemIdentifierSingleQuoted => {
                self.step_doctype_system_identifier(input, ctx, '\'')
            }
            State::AfterDoctypeSystemIdentifier => {
                self.step_after_doctype_system_identifier(input, ctx)
            }
            State::BogusDoctype => self.step_bogus_doctype(input),
            State::CdataSection => self.step_cdata_section(input, ctx),
            State::CdataSectionBracket => self.step_cdata_section_bracket(input),
            State::CdataSectionEnd => self.step_cdata_section_end(input),
            State::CharacterReference => self.step_character_reference(input),
            State::NamedCharacterReference => self.step_named_character_reference(input, ctx),
            State::AmbiguousAmpersand => self.step_ambiguous_ampersand(input, ctx),
            State::NumericCharacterReference => self.step_numeric_character_reference(input),
            State::HexadecimalCharacterReferenceStart => {
                self.step_numeric_reference_start(input, ctx, 16)
            }
            State::DecimalCharacterReferenceStart => {
                self.step_numeric_reference_start(input, ctx, 10)
            }
            State::HexadecimalCharacterReference => self.step_numeric_reference(input, ctx, 16),
            State::DecimalCharacterReference => self.step_numeric_reference(input, ctx, 10),
            State::NumericCharacterReferenceEnd => {
                self.step_numeric_character_reference_end(ctx)
            }
        }
    }

    // --- Emission helpers ---------------------------------------------------

    fn emit_char(&mut self, ch: char, loc: Location) {
        if self.text.is_empty() {
            self.text_location = loc;
        }
        self.text.push(ch);
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let chunk = std::mem::take(&mut self.text);
            self.tokens.push_back((Token::Text(chunk), self.text_location));
        }
    }

    fn emit_eof(&mut self, loc: Location) {
        self.flush_text();
        self.tokens.push_back((Token::Eof, loc));
        self.eof_queued = true;
    }

    fn create_tag(&mut self, is_end: bool) {
        self.tag_name.clear();
        self.tag_is_end = is_end;
        self.tag_self_closing = false;
        self.tag_attrs.clear();
        self.attr_name.clear();
        self.attr_value.clear();
        self.attr_in_progress = false;
    }

    fn start_attribute(&mut self, ctx: &mut ParseContext) -> Result<(), StreamError> {
        self.finalize_attribute(ctx)?;
        self.attr_in_progress = true;
        Ok(())
    }

    fn finalize_attribute(&mut self, ctx: &mut ParseContext) -> Result<(), StreamError> {
        if !self.attr_in_progress {
            return Ok(());
        }
        self.attr_in_progress = false;
        let name = std::mem::take(&mut self.attr_name);
        let value = std::mem::take(&mut self.attr_value);
        if self.tag_attrs.iter().any(|(existing, _)| *existing == name) {
            ctx.error(self.token_location, ParseError::DuplicateAttribute { name })?;
            return Ok(());
        }
        self.tag_attrs.push((name, value));
        Ok(())
    }

    fn emit_tag(&mut self, ctx: &mut ParseContext) -> Result<(), StreamError> {
        self.finalize_attribute(ctx)?;
        self.flush_text();
        let name = std::mem::take(&mut self.tag_name);
        let token = if self.tag_is_end {
            if !self.tag_attrs.is_empty() || self.tag_self_closing {
                ctx.error(
                    self.token_location,
                    ParseError::UnexpectedCharacter { ch: '/' },
                )?;
                self.tag_attrs.clear();
            }
            Token::EndTag { name }
        } else {
            self.last_start_tag.clear();
            self.last_start_tag.push_str(&name);
            Token::StartTag {
                name,
                attributes: std::mem::take(&mut self.tag_attrs),
                self_closing: self.tag_self_closing,
            }
        };
        self.tokens.push_back((token, self.token_location));
        Ok(())
    }

    fn emit_comment(&mut self) {
        self.flush_text();
        let text = std::mem::take(&mut self.comment);
        self.tokens.push_back((Token::Comment(text), self.token_location));
    }

    fn begin_doctype(&mut self) {
        self.doctype = Doctype::default();
    }

    fn emit_doctype(&mut self) {
        self.flush_text();
        let doctype = std::mem::take(&mut self.doctype);
        self.tokens.push_back((Token::Doctype(doctype), self.token_location));
    }

    fn appropriate_end_tag(&self) -> bool {
        self.tag_is_end && self.tag_name == self.last_start_tag
    }

    // --- Character-reference plumbing --------------------------------------

    fn start_char_ref(&mut self, return_state: State, loc: Location) {
        self.return_state = return_state;
        self.char_ref_location = loc;
        self.char_ref_raw.clear();
        self.char_ref_raw.push('&');
        self.transition_to(State::CharacterReference);
    }

    fn flush_code_point(&mut self, ch: char) {
        if self.return_state.is_attribute_value() {
            self.attr_value.push(ch);
        } else {
            let loc = self.char_ref_location;
            self.emit_char(ch, loc);
        }
    }

    fn flush_raw_reference(&mut self) {
        let raw = std::mem::take(&mut self.char_ref_raw);
        for ch in raw.chars() {
            self.flush_code_point(ch);
        }
    }

    // --- Data-family states -------------------------------------------------

    fn step_data<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('&') => self.start_char_ref(State::Data, loc),
            Some('<') => {
                self.token_location = loc;
                self.transition_to(State::TagOpen);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
            }
            Some(ch) => self.emit_char(ch, loc),
            None => self.emit_eof(loc),
        }
        Ok(())
    }

    fn step_rcdata<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('&') => self.start_char_ref(State::Rcdata, loc),
            Some('<') => {
                self.token_location = loc;
                self.transition_to(State::RcdataLessThanSign);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
            }
            Some(ch) => self.emit_char(ch, loc),
            None => self.emit_eof(loc),
        }
        Ok(())
    }

    fn step_rawtext<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('<') => {
                self.token_location = loc;
                self.transition_to(State::RawtextLessThanSign);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
            }
            Some(ch) => self.emit_char(ch, loc),
            None => self.emit_eof(loc),
        }
        Ok(())
    }

    fn step_script_data<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('<') => {
                self.token_location = loc;
                self.transition_to(State::ScriptDataLessThanSign);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
            }
            Some(ch) => self.emit_char(ch, loc),
            None => self.emit_eof(loc),
        }
        Ok(())
    }

    fn step_plaintext<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
            }
            Some(ch) => self.emit_char(ch, loc),
            None => self.emit_eof(loc),
        }
        Ok(())
    }

    // --- Tag states ---------------------------------------------------------

    fn step_tag_open<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('!') => self.transition_to(State::MarkupDeclarationOpen),
            Some('/') => self.transition_to(State::EndTagOpen),
            Some(ch) if ch.is_ascii_alphabetic() => {
                self.create_tag(false);
                input.push_back(ch);
                self.transition_to(State::TagName);
            }
            Some('?') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '?' })?;
                self.comment.clear();
                input.push_back('?');
                self.transition_to(State::BogusComment);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                self.emit_char('<', self.token_location);
                input.push_back(ch);
                self.transition_to(State::Data);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "tag" })?;
                self.emit_char('<', self.token_location);
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_end_tag_open<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if ch.is_ascii_alphabetic() => {
                self.create_tag(true);
                input.push_back(ch);
                self.transition_to(State::TagName);
            }
            Some('>') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '>' })?;
                self.transition_to(State::Data);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                self.comment.clear();
                input.push_back(ch);
                self.transition_to(State::BogusComment);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "tag" })?;
                self.emit_char('<', self.token_location);
                self.emit_char('/', loc);
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_tag_name<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => self.transition_to(State::BeforeAttributeName),
            Some('/') => self.transition_to(State::SelfClosingStartTag),
            Some('>') => {
                self.emit_tag(ctx)?;
                self.transition_to(State::Data);
            }
            Some(ch) if ch.is_ascii_uppercase() => {
                self.tag_name.push(ch.to_ascii_lowercase());
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.tag_name.push('\u{FFFD}');
            }
            Some(ch) => self.tag_name.push(ch),
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "tag" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    // --- RCDATA / RAWTEXT / script-data end-tag scanning --------------------

    fn step_raw_less_than_sign<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        return_to: State,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some('/') => {
                self.temp.clear();
                self.transition_to(match return_to {
                    State::Rcdata => State::RcdataEndTagOpen,
                    _ => State::RawtextEndTagOpen,
                });
            }
            Some(ch) => {
                self.emit_char('<', self.token_location);
                input.push_back(ch);
                self.transition_to(return_to);
            }
            None => {
                self.emit_char('<', self.token_location);
                self.transition_to(return_to);
            }
        }
        Ok(())
    }

    fn step_raw_end_tag_open<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        return_to: State,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some(ch) if ch.is_ascii_alphabetic() => {
                self.create_tag(true);
                input.push_back(ch);
                self.transition_to(match return_to {
                    State::Rcdata => State::RcdataEndTagName,
                    State::Rawtext => State::RawtextEndTagName,
                    State::ScriptData => State::ScriptDataEndTagName,
                    _ => State::ScriptDataEscapedEndTagName,
                });
            }
            Some(ch) => {
                self.emit_char('<', self.token_location);
                self.emit_char('/', self.token_location);
                input.push_back(ch);
                self.transition_to(return_to);
            }
            None => {
                self.emit_char('<', self.token_location);
                self.emit_char('/', self.token_location);
                self.transition_to(return_to);
            }
        }
        Ok(())
    }

    fn step_raw_end_tag_name<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
        return_to: State,
    ) -> Result<(), StreamError> {
        let ch = input.next()?;
        match ch {
            Some(c) if is_ws(c) && self.appropriate_end_tag() => {
                self.transition_to(State::BeforeAttributeName);
                return Ok(());
            }
            Some('/') if self.appropriate_end_tag() => {
                self.transition_to(State::SelfClosingStartTag);
                return Ok(());
            }
            Some('>') if self.appropriate_end_tag() => {
                self.emit_tag(ctx)?;
                self.transition_to(State::Data);
                return Ok(());
            }
            Some(c) if c.is_ascii_alphabetic() => {
                self.tag_name.push(c.to_ascii_lowercase());
                self.temp.push(c);
                return Ok(());
            }
            _ => {}
        }
        // Not an appropriate end tag: everything consumed is text.
        self.emit_char('<', self.token_location);
        self.emit_char('/', self.token_location);
        let pending = std::mem::take(&mut self.temp);
        for c in pending.chars() {
            self.emit_char(c, self.token_location);
        }
        if let Some(c) = ch {
            input.push_back(c);
        }
        self.transition_to(return_to);
        Ok(())
    }

    // --- Script-data escape states ------------------------------------------

    fn step_script_data_less_than_sign<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some('/') => {
                self.temp.clear();
                self.transition_to(State::ScriptDataEndTagOpen);
            }
            Some('!') => {
                self.emit_char('<', self.token_location);
                self.emit_char('!', self.token_location);
                self.transition_to(State::ScriptDataEscapeStart);
            }
            Some(ch) => {
                self.emit_char('<', self.token_location);
                input.push_back(ch);
                self.transition_to(State::ScriptData);
            }
            None => {
                self.emit_char('<', self.token_location);
                self.transition_to(State::ScriptData);
            }
        }
        Ok(())
    }

    fn step_script_data_escape_start<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some('-') => {
                self.emit_char('-', self.token_location);
                self.transition_to(State::ScriptDataEscapeStartDash);
            }
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(State::ScriptData);
            }
            None => self.transition_to(State::ScriptData),
        }
        Ok(())
    }

    fn step_script_data_escape_start_dash<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some('-') => {
                self.emit_char('-', self.token_location);
                self.transition_to(State::ScriptDataEscapedDashDash);
            }
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(State::ScriptData);
            }
            None => self.transition_to(State::ScriptData),
        }
        Ok(())
    }

    fn step_script_data_escaped<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => {
                self.emit_char('-', loc);
                self.transition_to(State::ScriptDataEscapedDash);
            }
            Some('<') => {
                self.token_location = loc;
                self.transition_to(State::ScriptDataEscapedLessThanSign);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
            }
            Some(ch) => self.emit_char(ch, loc),
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "script content" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_script_data_escaped_dash<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => {
                self.emit_char('-', loc);
                self.transition_to(State::ScriptDataEscapedDashDash);
            }
            Some('<') => {
                self.token_location = loc;
                self.transition_to(State::ScriptDataEscapedLessThanSign);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
                self.transition_to(State::ScriptDataEscaped);
            }
            Some(ch) => {
                self.emit_char(ch, loc);
                self.transition_to(State::ScriptDataEscaped);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "script content" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_script_data_escaped_dash_dash<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => self.emit_char('-', loc),
            Some('<') => {
                self.token_location = loc;
                self.transition_to(State::ScriptDataEscapedLessThanSign);
            }
            Some('>') => {
                self.emit_char('>', loc);
                self.transition_to(State::ScriptData);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
                self.transition_to(State::ScriptDataEscaped);
            }
            Some(ch) => {
                self.emit_char(ch, loc);
                self.transition_to(State::ScriptDataEscaped);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "script content" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_script_data_escaped_less_than_sign<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some('/') => {
                self.temp.clear();
                self.transition_to(State::ScriptDataEscapedEndTagOpen);
            }
            Some(ch) if ch.is_ascii_alphabetic() => {
                self.temp.clear();
                self.emit_char('<', self.token_location);
                input.push_back(ch);
                self.transition_to(State::ScriptDataDoubleEscapeStart);
            }
            Some(ch) => {
                self.emit_char('<', self.token_location);
                input.push_back(ch);
                self.transition_to(State::ScriptDataEscaped);
            }
            None => {
                self.emit_char('<', self.token_location);
                self.transition_to(State::ScriptDataEscaped);
            }
        }
        Ok(())
    }

    fn step_script_data_double_escape_transition<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        on_script: State,
        otherwise: State,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) || ch == '/' || ch == '>' => {
                let next = if self.temp == "script" { on_script } else { otherwise };
                self.emit_char(ch, loc);
                self.transition_to(next);
            }
            Some(ch) if ch.is_ascii_alphabetic() => {
                self.temp.push(ch.to_ascii_lowercase());
                self.emit_char(ch, loc);
            }
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(otherwise);
            }
            None => self.transition_to(otherwise),
        }
        Ok(())
    }

    fn step_script_data_double_escaped<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => {
                self.emit_char('-', loc);
                self.transition_to(State::ScriptDataDoubleEscapedDash);
            }
            Some('<') => {
                self.emit_char('<', loc);
                self.transition_to(State::ScriptDataDoubleEscapedLessThanSign);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
            }
            Some(ch) => self.emit_char(ch, loc),
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "script content" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_script_data_double_escaped_dash<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => {
                self.emit_char('-', loc);
                self.transition_to(State::ScriptDataDoubleEscapedDashDash);
            }
            Some('<') => {
                self.emit_char('<', loc);
                self.transition_to(State::ScriptDataDoubleEscapedLessThanSign);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
                self.transition_to(State::ScriptDataDoubleEscaped);
            }
            Some(ch) => {
                self.emit_char(ch, loc);
                self.transition_to(State::ScriptDataDoubleEscaped);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "script content" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_script_data_double_escaped_dash_dash<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => self.emit_char('-', loc),
            Some('<') => {
                self.emit_char('<', loc);
                self.transition_to(State::ScriptDataDoubleEscapedLessThanSign);
            }
            Some('>') => {
                self.emit_char('>', loc);
                self.transition_to(State::ScriptData);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.emit_char('\u{FFFD}', loc);
                self.transition_to(State::ScriptDataDoubleEscaped);
            }
            Some(ch) => {
                self.emit_char(ch, loc);
                self.transition_to(State::ScriptDataDoubleEscaped);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "script content" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_script_data_double_escaped_less_than_sign<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some('/') => {
                self.temp.clear();
                self.emit_char('/', self.token_location);
                self.transition_to(State::ScriptDataDoubleEscapeEnd);
            }
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(State::ScriptDataDoubleEscaped);
            }
            None => self.transition_to(State::ScriptDataDoubleEscaped),
        }
        Ok(())
    }

    // --- Attribute states ---------------------------------------------------

    fn step_before_attribute_name<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {}
            Some(ch @ ('/' | '>')) => {
                input.push_back(ch);
                self.transition_to(State::AfterAttributeName);
            }
            None => self.transition_to(State::AfterAttributeName),
            Some('=') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '=' })?;
                self.start_attribute(ctx)?;
                self.attr_name.push('=');
                self.transition_to(State::AttributeName);
            }
            Some(ch) => {
                self.start_attribute(ctx)?;
                input.push_back(ch);
                self.transition_to(State::AttributeName);
            }
        }
        Ok(())
    }

    fn step_attribute_name<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {
                input.push_back(ch);
                self.transition_to(State::AfterAttributeName);
            }
            Some(ch @ ('/' | '>')) => {
                input.push_back(ch);
                self.transition_to(State::AfterAttributeName);
            }
            None => self.transition_to(State::AfterAttributeName),
            Some('=') => self.transition_to(State::BeforeAttributeValue),
            Some(ch) if ch.is_ascii_uppercase() => {
                self.attr_name.push(ch.to_ascii_lowercase());
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.attr_name.push('\u{FFFD}');
            }
            Some(ch @ ('"' | '\'' | '<')) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                self.attr_name.push(ch);
            }
            Some(ch) => self.attr_name.push(ch),
        }
        Ok(())
    }

    fn step_after_attribute_name<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {}
            Some('/') => self.transition_to(State::SelfClosingStartTag),
            Some('=') => self.transition_to(State::BeforeAttributeValue),
            Some('>') => {
                self.emit_tag(ctx)?;
                self.transition_to(State::Data);
            }
            Some(ch) => {
                self.start_attribute(ctx)?;
                input.push_back(ch);
                self.transition_to(State::AttributeName);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "tag" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_before_attribute_value<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {}
            Some('"') => self.transition_to(State::AttributeValueDoubleQuoted),
            Some('\'') => self.transition_to(State::AttributeValueSingleQuoted),
            Some('>') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '>' })?;
                self.emit_tag(ctx)?;
                self.transition_to(State::Data);
            }
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(State::AttributeValueUnquoted);
            }
            None => self.transition_to(State::AttributeValueUnquoted),
        }
        Ok(())
    }

    fn step_attribute_value_quoted<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
        quote: char,
    ) -> Result<(), StreamError> {
        let this = self.state;
        let loc = input.location();
        match input.next()? {
            Some(ch) if ch == quote => self.transition_to(State::AfterAttributeValueQuoted),
            Some('&') => self.start_char_ref(this, loc),
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.attr_value.push('\u{FFFD}');
            }
            Some(ch) => self.attr_value.push(ch),
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "attribute value" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_attribute_value_unquoted<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => self.transition_to(State::BeforeAttributeName),
            Some('&') => self.start_char_ref(State::AttributeValueUnquoted, loc),
            Some('>') => {
                self.emit_tag(ctx)?;
                self.transition_to(State::Data);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.attr_value.push('\u{FFFD}');
            }
            Some(ch @ ('"' | '\'' | '<' | '=' | '`')) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                self.attr_value.push(ch);
            }
            Some(ch) => self.attr_value.push(ch),
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "attribute value" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_after_attribute_value_quoted<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => self.transition_to(State::BeforeAttributeName),
            Some('/') => self.transition_to(State::SelfClosingStartTag),
            Some('>') => {
                self.emit_tag(ctx)?;
                self.transition_to(State::Data);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                input.push_back(ch);
                self.transition_to(State::BeforeAttributeName);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "tag" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_self_closing_start_tag<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('>') => {
                self.tag_self_closing = true;
                self.emit_tag(ctx)?;
                self.transition_to(State::Data);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '/' })?;
                input.push_back(ch);
                self.transition_to(State::BeforeAttributeName);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "tag" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    // --- Comment and markup-declaration states ------------------------------

    fn step_bogus_comment<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('>') => {
                self.emit_comment();
                self.transition_to(State::Data);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.comment.push('\u{FFFD}');
            }
            Some(ch) => self.comment.push(ch),
            None => {
                self.emit_comment();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    /// Bounded look-ahead for `--`, `DOCTYPE` and `[CDATA[`; consumed scalars
    /// are pushed back on mismatch.
    fn lookahead_matches<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        keyword: &str,
        case_insensitive: bool,
    ) -> Result<bool, StreamError> {
        let mut consumed: Vec<char> = Vec::with_capacity(keyword.len());
        for expected in keyword.chars() {
            match input.next()? {
                Some(ch)
                    if ch == expected
                        || (case_insensitive
                            && ch.to_ascii_lowercase() == expected.to_ascii_lowercase()) =>
                {
                    consumed.push(ch);
                }
                Some(ch) => {
                    input.push_back(ch);
                    for ch in consumed.into_iter().rev() {
                        input.push_back(ch);
                    }
                    return Ok(false);
                }
                None => {
                    for ch in consumed.into_iter().rev() {
                        input.push_back(ch);
                    }
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn step_markup_declaration_open<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if self.lookahead_matches(input, "--", false)? {
            self.comment.clear();
            self.transition_to(State::CommentStart);
            return Ok(());
        }
        if self.lookahead_matches(input, "doctype", true)? {
            self.begin_doctype();
            self.transition_to(State::Doctype);
            return Ok(());
        }
        if self.lookahead_matches(input, "[CDATA[", false)? {
            if self.in_foreign {
                self.transition_to(State::CdataSection);
            } else {
                ctx.error(input.location(), ParseError::UnexpectedCharacter { ch: '[' })?;
                self.comment.clear();
                self.comment.push_str("[CDATA[");
                self.transition_to(State::BogusComment);
            }
            return Ok(());
        }
        ctx.error(input.location(), ParseError::UnexpectedCharacter { ch: '!' })?;
        self.comment.clear();
        self.transition_to(State::BogusComment);
        Ok(())
    }

    fn step_comment_start<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => self.transition_to(State::CommentStartDash),
            Some('>') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '>' })?;
                self.emit_comment();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(State::Comment);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "comment" })?;
                self.emit_comment();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_comment_start_dash<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => self.transition_to(State::CommentEnd),
            Some('>') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '>' })?;
                self.emit_comment();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                self.comment.push('-');
                input.push_back(ch);
                self.transition_to(State::Comment);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "comment" })?;
                self.emit_comment();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_comment<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('<') => {
                self.comment.push('<');
                self.transition_to(State::CommentLessThanSign);
            }
            Some('-') => self.transition_to(State::CommentEndDash),
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.comment.push('\u{FFFD}');
            }
            Some(ch) => self.comment.push(ch),
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "comment" })?;
                self.emit_comment();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_comment_less_than_sign<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some('!') => {
                self.comment.push('!');
                self.transition_to(State::CommentLessThanSignBang);
            }
            Some('<') => self.comment.push('<'),
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(State::Comment);
            }
            None => self.transition_to(State::Comment),
        }
        Ok(())
    }

    fn step_comment_less_than_sign_bang<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some('-') => self.transition_to(State::CommentLessThanSignBangDash),
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(State::Comment);
            }
            None => self.transition_to(State::Comment),
        }
        Ok(())
    }

    fn step_comment_less_than_sign_bang_dash<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some('-') => self.transition_to(State::CommentLessThanSignBangDashDash),
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(State::CommentEndDash);
            }
            None => self.transition_to(State::CommentEndDash),
        }
        Ok(())
    }

    fn step_comment_less_than_sign_bang_dash_dash<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('>') => {
                input.push_back('>');
                self.transition_to(State::CommentEnd);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '<' })?;
                input.push_back(ch);
                self.transition_to(State::CommentEnd);
            }
            None => self.transition_to(State::CommentEnd),
        }
        Ok(())
    }

    fn step_comment_end_dash<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => self.transition_to(State::CommentEnd),
            Some(ch) => {
                self.comment.push('-');
                input.push_back(ch);
                self.transition_to(State::Comment);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "comment" })?;
                self.emit_comment();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_comment_end<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('>') => {
                self.emit_comment();
                self.transition_to(State::Data);
            }
            Some('!') => self.transition_to(State::CommentEndBang),
            Some('-') => self.comment.push('-'),
            Some(ch) => {
                self.comment.push_str("--");
                input.push_back(ch);
                self.transition_to(State::Comment);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "comment" })?;
                self.emit_comment();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_comment_end_bang<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('-') => {
                self.comment.push_str("--!");
                self.transition_to(State::CommentEndDash);
            }
            Some('>') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '!' })?;
                self.emit_comment();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                self.comment.push_str("--!");
                input.push_back(ch);
                self.transition_to(State::Comment);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "comment" })?;
                self.emit_comment();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    // --- DOCTYPE states -----------------------------------------------------

    fn step_doctype<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => self.transition_to(State::BeforeDoctypeName),
            Some('>') => {
                input.push_back('>');
                self.transition_to(State::BeforeDoctypeName);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                input.push_back(ch);
                self.transition_to(State::BeforeDoctypeName);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_before_doctype_name<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {}
            Some('>') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.doctype.name = Some("\u{FFFD}".to_string());
                self.transition_to(State::DoctypeName);
            }
            Some(ch) => {
                self.doctype.name = Some(ch.to_ascii_lowercase().to_string());
                self.transition_to(State::DoctypeName);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_doctype_name<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => self.transition_to(State::AfterDoctypeName),
            Some('>') => {
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                self.doctype_name_push('\u{FFFD}');
            }
            Some(ch) => self.doctype_name_push(ch.to_ascii_lowercase()),
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn doctype_name_push(&mut self, ch: char) {
        self.doctype.name.get_or_insert_with(String::new).push(ch);
    }

    fn step_after_doctype_name<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {}
            Some('>') => {
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                input.push_back(ch);
                if self.lookahead_matches(input, "public", true)? {
                    self.transition_to(State::AfterDoctypePublicKeyword);
                } else if self.lookahead_matches(input, "system", true)? {
                    self.transition_to(State::AfterDoctypeSystemKeyword);
                } else {
                    ctx.error(loc, ParseError::BadDoctype)?;
                    self.doctype.force_quirks = true;
                    self.transition_to(State::BogusDoctype);
                }
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_after_doctype_public_keyword<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => self.transition_to(State::BeforeDoctypePublicIdentifier),
            Some('"') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.public_id = Some(String::new());
                self.transition_to(State::DoctypePublicIdentifierDoubleQuoted);
            }
            Some('\'') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.public_id = Some(String::new());
                self.transition_to(State::DoctypePublicIdentifierSingleQuoted);
            }
            Some('>') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                input.push_back(ch);
                self.transition_to(State::BogusDoctype);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_before_doctype_public_identifier<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {}
            Some('"') => {
                self.doctype.public_id = Some(String::new());
                self.transition_to(State::DoctypePublicIdentifierDoubleQuoted);
            }
            Some('\'') => {
                self.doctype.public_id = Some(String::new());
                self.transition_to(State::DoctypePublicIdentifierSingleQuoted);
            }
            Some('>') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                input.push_back(ch);
                self.transition_to(State::BogusDoctype);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_doctype_public_identifier<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
        quote: char,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if ch == quote => self.transition_to(State::AfterDoctypePublicIdentifier),
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                if let Some(id) = &mut self.doctype.public_id {
                    id.push('\u{FFFD}');
                }
            }
            Some('>') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                if let Some(id) = &mut self.doctype.public_id {
                    id.push(ch);
                }
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_after_doctype_public_identifier<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {
                self.transition_to(State::BetweenDoctypePublicAndSystemIdentifiers)
            }
            Some('>') => {
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some('"') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.system_id = Some(String::new());
                self.transition_to(State::DoctypeSystemIdentifierDoubleQuoted);
            }
            Some('\'') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.system_id = Some(String::new());
                self.transition_to(State::DoctypeSystemIdentifierSingleQuoted);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                input.push_back(ch);
                self.transition_to(State::BogusDoctype);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_between_doctype_public_and_system<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {}
            Some('>') => {
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some('"') => {
                self.doctype.system_id = Some(String::new());
                self.transition_to(State::DoctypeSystemIdentifierDoubleQuoted);
            }
            Some('\'') => {
                self.doctype.system_id = Some(String::new());
                self.transition_to(State::DoctypeSystemIdentifierSingleQuoted);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                input.push_back(ch);
                self.transition_to(State::BogusDoctype);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_after_doctype_system_keyword<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => self.transition_to(State::BeforeDoctypeSystemIdentifier),
            Some('"') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.system_id = Some(String::new());
                self.transition_to(State::DoctypeSystemIdentifierDoubleQuoted);
            }
            Some('\'') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.system_id = Some(String::new());
                self.transition_to(State::DoctypeSystemIdentifierSingleQuoted);
            }
            Some('>') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                input.push_back(ch);
                self.transition_to(State::BogusDoctype);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_before_doctype_system_identifier<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {}
            Some('"') => {
                self.doctype.system_id = Some(String::new());
                self.transition_to(State::DoctypeSystemIdentifierDoubleQuoted);
            }
            Some('\'') => {
                self.doctype.system_id = Some(String::new());
                self.transition_to(State::DoctypeSystemIdentifierSingleQuoted);
            }
            Some('>') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                input.push_back(ch);
                self.transition_to(State::BogusDoctype);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_doctype_system_identifier<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
        quote: char,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if ch == quote => self.transition_to(State::AfterDoctypeSystemIdentifier),
            Some('\0') => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch: '\0' })?;
                if let Some(id) = &mut self.doctype.system_id {
                    id.push('\u{FFFD}');
                }
            }
            Some('>') => {
                ctx.error(loc, ParseError::BadDoctype)?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                if let Some(id) = &mut self.doctype.system_id {
                    id.push(ch);
                }
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_after_doctype_system_identifier<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(ch) if is_ws(ch) => {}
            Some('>') => {
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some(ch) => {
                // Trailing junk does not force quirks.
                ctx.error(loc, ParseError::BadDoctype)?;
                input.push_back(ch);
                self.transition_to(State::BogusDoctype);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "doctype" })?;
                self.doctype.force_quirks = true;
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_bogus_doctype<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('>') => {
                self.emit_doctype();
                self.transition_to(State::Data);
            }
            Some(_) => {}
            None => {
                self.emit_doctype();
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    // --- CDATA section (foreign content only) -------------------------------

    fn step_cdata_section<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(']') => self.transition_to(State::CdataSectionBracket),
            Some(ch) => self.emit_char(ch, loc),
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "]]>" })?;
                self.emit_eof(loc);
            }
        }
        Ok(())
    }

    fn step_cdata_section_bracket<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(']') => self.transition_to(State::CdataSectionEnd),
            Some(ch) => {
                self.emit_char(']', loc);
                input.push_back(ch);
                self.transition_to(State::CdataSection);
            }
            None => {
                self.emit_char(']', loc);
                self.transition_to(State::CdataSection);
            }
        }
        Ok(())
    }

    fn step_cdata_section_end<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some(']') => self.emit_char(']', loc),
            Some('>') => self.transition_to(State::Data),
            Some(ch) => {
                self.emit_char(']', loc);
                self.emit_char(']', loc);
                input.push_back(ch);
                self.transition_to(State::CdataSection);
            }
            None => {
                self.emit_char(']', loc);
                self.emit_char(']', loc);
                self.transition_to(State::CdataSection);
            }
        }
        Ok(())
    }

    // --- Character-reference states -----------------------------------------

    fn step_character_reference<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some(ch) if ch.is_ascii_alphanumeric() => {
                input.push_back(ch);
                self.transition_to(State::NamedCharacterReference);
            }
            Some('#') => {
                self.char_ref_raw.push('#');
                self.transition_to(State::NumericCharacterReference);
            }
            Some(ch) => {
                self.flush_raw_reference();
                input.push_back(ch);
                self.transition_to(self.return_state);
            }
            None => {
                self.flush_raw_reference();
                self.transition_to(self.return_state);
            }
        }
        Ok(())
    }

    fn step_named_character_reference<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let mut buf = String::new();
        loop {
            match input.next()? {
                Some(ch) if ch.is_ascii_alphanumeric() && buf.len() <= entities::MAX_NAME_LEN => {
                    buf.push(ch);
                }
                Some(ch) => {
                    input.push_back(ch);
                    break;
                }
                None => break,
            }
        }
        let has_semicolon = {
            match input.next()? {
                Some(';') => true,
                Some(ch) => {
                    input.push_back(ch);
                    false
                }
                None => false,
            }
        };
        let in_attribute = self.return_state.is_attribute_value();

        if has_semicolon {
            if let Some(rep) = entities::named(&buf) {
                self.flush_code_point(rep.first);
                if let Some(second) = rep.second {
                    self.flush_code_point(second);
                }
                self.char_ref_raw.clear();
                self.transition_to(self.return_state);
                return Ok(());
            }
            input.push_back(';');
        }

        if let Some((len, rep)) = entities::longest_legacy_prefix(&buf) {
            let trailing_blocks_match = in_attribute
                && if len == buf.len() {
                    matches!(self.peek(input)?, Some('='))
                } else {
                    // The next scalar is alphanumeric by construction.
                    true
                };
            if !trailing_blocks_match {
                ctx.error(
                    self.char_ref_location,
                    ParseError::BadCharacterReference {
                        reference: format!("&{}", &buf[..len]),
                    },
                )?;
                self.flush_code_point(rep.first);
                if let Some(second) = rep.second {
                    self.flush_code_point(second);
                }
                for ch in buf[len..].chars().rev() {
                    input.push_back(ch);
                }
                self.char_ref_raw.clear();
                self.transition_to(self.return_state);
                return Ok(());
            }
        }

        // No usable match: everything consumed is literal text.
        self.flush_raw_reference();
        for ch in buf.chars() {
            self.flush_code_point(ch);
        }
        self.transition_to(State::AmbiguousAmpersand);
        Ok(())
    }

    fn step_ambiguous_ampersand<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some(ch) if ch.is_ascii_alphanumeric() => self.flush_code_point(ch),
            Some(';') => {
                ctx.error(
                    self.char_ref_location,
                    ParseError::BadCharacterReference {
                        reference: "&".to_string(),
                    },
                )?;
                input.push_back(';');
                self.transition_to(self.return_state);
            }
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(self.return_state);
            }
            None => self.transition_to(self.return_state),
        }
        Ok(())
    }

    fn step_numeric_character_reference<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<(), StreamError> {
        self.char_ref_code = 0;
        match input.next()? {
            Some(ch @ ('x' | 'X')) => {
                self.char_ref_raw.push(ch);
                self.transition_to(State::HexadecimalCharacterReferenceStart);
            }
            Some(ch) => {
                input.push_back(ch);
                self.transition_to(State::DecimalCharacterReferenceStart);
            }
            None => self.transition_to(State::DecimalCharacterReferenceStart),
        }
        Ok(())
    }

    fn step_numeric_reference_start<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
        radix: u32,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some(ch) if ch.is_digit(radix) => {
                input.push_back(ch);
                self.transition_to(if radix == 16 {
                    State::HexadecimalCharacterReference
                } else {
                    State::DecimalCharacterReference
                });
            }
            other => {
                ctx.error(
                    self.char_ref_location,
                    ParseError::BadCharacterReference {
                        reference: self.char_ref_raw.clone(),
                    },
                )?;
                self.flush_raw_reference();
                if let Some(ch) = other {
                    input.push_back(ch);
                }
                self.transition_to(self.return_state);
            }
        }
        Ok(())
    }

    fn step_numeric_reference<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
        radix: u32,
    ) -> Result<(), StreamError> {
        match input.next()? {
            Some(ch) if ch.is_digit(radix) => {
                self.char_ref_raw.push(ch);
                self.char_ref_code = self
                    .char_ref_code
                    .saturating_mul(radix)
                    .saturating_add(ch.to_digit(radix).unwrap_or(0));
                Ok(())
            }
            Some(';') => {
                self.transition_to(State::NumericCharacterReferenceEnd);
                Ok(())
            }
            other => {
                ctx.error(
                    self.char_ref_location,
                    ParseError::BadCharacterReference {
                        reference: self.char_ref_raw.clone(),
                    },
                )?;
                if let Some(ch) = other {
                    input.push_back(ch);
                }
                self.transition_to(State::NumericCharacterReferenceEnd);
                Ok(())
            }
        }
    }

    fn step_numeric_character_reference_end(
        &mut self,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let (ch, bad) = entities::resolve_numeric(self.char_ref_code);
        if bad {
            ctx.error(
                self.char_ref_location,
                ParseError::BadCharacterReference {
                    reference: std::mem::take(&mut self.char_ref_raw),
                },
            )?;
        }
        self.char_ref_raw.clear();
        self.flush_code_point(ch);
        self.transition_to(self.return_state);
        Ok(())
    }

    fn peek<S: ByteSource>(&mut self, input: &mut Input<S>) -> Result<Option<char>, StreamError> {
        match input.next()? {
            Some(ch) => {
                input.push_back(ch);
                Ok(Some(ch))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HtmlTokenizer, State};
    use crate::context::ParseContext;
    use crate::encoding::DocumentKind;
    use crate::input::Input;
    use crate::source::SliceSource;
    use crate::token::Token;

    fn tokenize(html: &str) -> Vec<Token> {
        tokenize_with(html, |_| {})
    }

    fn tokenize_with(html: &str, mut on_token: impl FnMut(&mut HtmlTokenizer)) -> Vec<Token> {
        let mut input = Input::new(SliceSource::new(html.as_bytes()), DocumentKind::Html, None);
        let mut ctx = ParseContext::new(None);
        let mut tokenizer = HtmlTokenizer::new();
        let mut out = Vec::new();
        while let Some((token, _)) = tokenizer.next_token(&mut input, &mut ctx).unwrap() {
            out.push(token);
            on_token(&mut tokenizer);
        }
        out
    }

    fn start_tag(token: &Token) -> (&str, &[(String, String)], bool) {
        match token {
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => (name.as_str(), attributes.as_slice(), *self_closing),
            other => panic!("expected start tag, got {other:?}"),
        }
    }

    #[test]
    fn plain_element_with_text() {
        let tokens = tokenize("<p>hi</p>");
        assert_eq!(
            tokens,
            vec![
                Token::StartTag {
                    name: "p".to_string(),
                    attributes: vec![],
                    self_closing: false
                },
                Token::Text("hi".to_string()),
                Token::EndTag {
                    name: "p".to_string()
                },
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tag_and_attribute_names_are_lowercased() {
        let tokens = tokenize("<DiV CLASS=Menu>");
        let (name, attrs, _) = start_tag(&tokens[0]);
        assert_eq!(name, "div");
        assert_eq!(attrs, &[("class".to_string(), "Menu".to_string())]);
    }

    #[test]
    fn duplicate_attribute_is_dropped_first_wins() {
        let tokens = tokenize("<a href='1' href='2'>");
        let (_, attrs, _) = start_tag(&tokens[0]);
        assert_eq!(attrs, &[("href".to_string(), "1".to_string())]);
    }

    #[test]
    fn attribute_value_forms() {
        let tokens = tokenize("<a a=1 b='2' c=\"3\" d>");
        let (_, attrs, _) = start_tag(&tokens[0]);
        assert_eq!(
            attrs,
            &[
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
                ("d".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn self_closing_flag_is_reported() {
        let tokens = tokenize("<br/>");
        let (name, _, self_closing) = start_tag(&tokens[0]);
        assert_eq!(name, "br");
        assert!(self_closing);
    }

    #[test]
    fn named_character_references_resolve() {
        let tokens = tokenize("a&amp;b &notin; &notit;");
        assert_eq!(
            tokens[0],
            Token::Text("a&b \u{2209} \u{AC}it;".to_string())
        );
    }

    #[test]
    fn legacy_reference_in_attribute_before_equals_is_literal() {
        let tokens = tokenize("<a href=\"?a&not=1\">");
        let (_, attrs, _) = start_tag(&tokens[0]);
        assert_eq!(attrs[0].1, "?a&not=1");
    }

    #[test]
    fn numeric_references_clamp_per_override_table() {
        let tokens = tokenize("&#x80;&#1114112;&#x41;");
        assert_eq!(tokens[0], Token::Text("\u{20AC}\u{FFFD}A".to_string()));
    }

    #[test]
    fn comment_variants() {
        assert_eq!(tokenize("<!--x-->")[0], Token::Comment("x".to_string()));
        assert_eq!(tokenize("<!---->")[0], Token::Comment(String::new()));
        assert_eq!(tokenize("<!--a--b-->")[0], Token::Comment("a--b".to_string()));
        // Unterminated comment swallows the rest of the input.
        assert_eq!(
            tokenize("<!-- never closed")[0],
            Token::Comment(" never closed".to_string())
        );
    }

    #[test]
    fn bogus_comment_from_question_mark() {
        assert_eq!(
            tokenize("<?pi data?>")[0],
            Token::Comment("?pi data?".to_string())
        );
    }

    #[test]
    fn doctype_with_public_and_system_ids() {
        let tokens =
            tokenize("<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \"http://x\">");
        match &tokens[0] {
            Token::Doctype(d) => {
                assert_eq!(d.name.as_deref(), Some("html"));
                assert_eq!(d.public_id.as_deref(), Some("-//W3C//DTD HTML 4.01//EN"));
                assert_eq!(d.system_id.as_deref(), Some("http://x"));
                assert!(!d.force_quirks);
            }
            other => panic!("expected doctype, got {other:?}"),
        }
    }

    #[test]
    fn eof_inside_doctype_forces_quirks() {
        let tokens = tokenize("<!DOCTYPE htm");
        match &tokens[0] {
            Token::Doctype(d) => assert!(d.force_quirks),
            other => panic!("expected doctype, got {other:?}"),
        }
    }

    #[test]
    fn script_data_does_not_open_tags() {
        let tokens = tokenize_with("<script>if (a<b) c</script>", |tokenizer| {
            tokenizer.set_state(State::ScriptData);
        });
        assert_eq!(
            tokens,
            vec![
                Token::StartTag {
                    name: "script".to_string(),
                    attributes: vec![],
                    self_closing: false
                },
                Token::Text("if (a<b) c".to_string()),
                Token::EndTag {
                    name: "script".to_string()
                },
                Token::Eof,
            ]
        );
    }

    #[test]
    fn rcdata_resolves_references_but_not_tags() {
        let tokens = tokenize_with("<title>a &amp; <b></title>", |tokenizer| {
            tokenizer.set_state(State::Rcdata);
        });
        assert_eq!(tokens[1], Token::Text("a & <b>".to_string()));
    }

    #[test]
    fn script_escape_states_hide_close_tag_in_comment() {
        let html = "<script><!--<script></script>--></script>";
        let tokens = tokenize_with(html, |tokenizer| {
            tokenizer.set_state(State::ScriptData);
        });
        assert_eq!(
            tokens[1],
            Token::Text("<!--<script></script>-->".to_string())
        );
    }

    #[test]
    fn nul_in_data_becomes_replacement_with_error() {
        let mut input = Input::new(SliceSource::new(b"a\x00b"), DocumentKind::Html, None);
        let mut errors = 0;
        let mut ctx = ParseContext::new(None);
        let mut tokenizer = HtmlTokenizer::new();
        let mut texts = Vec::new();
        while let Some((token, _)) = tokenizer.next_token(&mut input, &mut ctx).unwrap() {
            if let Token::Text(t) = token {
                texts.push(t);
            }
        }
        errors += ctx.counters.errors_reported;
        assert_eq!(texts, vec!["a\u{FFFD}b".to_string()]);
        assert_eq!(errors, 1);
    }

    #[test]
    fn chunked_input_matches_whole_input() {
        use std::collections::VecDeque;
        let html = "<div class='a'>x &amp; y<!--c--></div>";
        let whole = tokenize(html);

        let bytes = html.as_bytes();
        let chunks: VecDeque<Vec<u8>> = bytes.chunks(3).map(<[u8]>::to_vec).collect();
        let mut input = Input::new(chunks, DocumentKind::Html, None);
        let mut ctx = ParseContext::new(None);
        let mut tokenizer = HtmlTokenizer::new();
        let mut chunked = Vec::new();
        while let Some((token, _)) = tokenizer.next_token(&mut input, &mut ctx).unwrap() {
            chunked.push(token);
        }
        assert_eq!(whole, chunked, "token sequence must be chunk-invariant");
    }

    #[test]
    fn empty_input_is_single_eof() {
        assert_eq!(tokenize(""), vec![Token::Eof]);
    }
}
