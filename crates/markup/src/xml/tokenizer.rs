//! XML 1.0 tokenizer.
//!
//! Much simpler than the HTML machine: no content models, no mode switching
//! from the nesting tracker. Each markup construct is consumed whole by its
//! handler; recovery never halts the stream.
//!
//! Divergences from strict XML, by design: ill-formedness is reported and
//! repaired, the internal DTD subset is skipped without being interpreted,
//! and entity references beyond the predefined five resolve through the
//! caller-supplied resolver or fall back to literal text with a report.

use crate::config::EntityResolver;
use crate::context::ParseContext;
use crate::entities;
use crate::error::{ParseError, StreamError};
use crate::input::Input;
use crate::location::Location;
use crate::signal::{Doctype, XmlDeclaration};
use crate::source::ByteSource;
use crate::token::Token;
use std::collections::VecDeque;

fn is_xml_ws(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n')
}

fn is_name_start(ch: char) -> bool {
    ch == '_' || ch == ':' || ch.is_alphabetic()
}

fn is_name_char(ch: char) -> bool {
    is_name_start(ch) || ch.is_numeric() || matches!(ch, '-' | '.' | '\u{B7}')
}

pub(crate) struct XmlTokenizer {
    tokens: VecDeque<(Token, Location)>,
    text: String,
    text_location: Location,
    token_location: Location,
    entity: Option<EntityResolver>,
    at_document_start: bool,
    eof_queued: bool,
}

impl XmlTokenizer {
    pub(crate) fn new(entity: Option<EntityResolver>) -> Self {
        Self {
            tokens: VecDeque::new(),
            text: String::new(),
            text_location: Location::START,
            token_location: Location::START,
            entity,
            at_document_start: true,
            eof_queued: false,
        }
    }

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

    fn step<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            None => {
                self.flush_text();
                self.tokens.push_back((Token::Eof, loc));
                self.eof_queued = true;
                Ok(())
            }
            Some('<') => {
                self.token_location = loc;
                self.markup(input, ctx)
            }
            Some('&') => {
                let decoded = self.reference(input, ctx, loc)?;
                self.emit_text(&decoded, loc);
                self.at_document_start = false;
                Ok(())
            }
            Some(ch) => {
                self.emit_char(ch, loc);
                if !is_xml_ws(ch) {
                    self.at_document_start = false;
                }
                Ok(())
            }
        }
    }

    fn markup<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let loc = input.location();
        match input.next()? {
            Some('/') => self.end_tag(input, ctx),
            Some('?') => self.processing_instruction(input, ctx),
            Some('!') => self.declaration(input, ctx),
            Some(ch) if is_name_start(ch) => {
                input.push_back(ch);
                self.start_tag(input, ctx)
            }
            Some(ch) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                self.emit_char('<', self.token_location);
                input.push_back(ch);
                Ok(())
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "tag" })?;
                self.emit_char('<', self.token_location);
                Ok(())
            }
        }
    }

    fn read_name<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
    ) -> Result<String, StreamError> {
        let mut name = String::new();
        loop {
            match input.next()? {
                Some(ch) if is_name_char(ch) => name.push(ch),
                Some(ch) => {
                    input.push_back(ch);
                    break;
                }
                None => break,
            }
        }
        Ok(name)
    }

    fn skip_ws<S: ByteSource>(&mut self, input: &mut Input<S>) -> Result<(), StreamError> {
        loop {
            match input.next()? {
                Some(ch) if is_xml_ws(ch) => {}
                Some(ch) => {
                    input.push_back(ch);
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }

    fn start_tag<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        self.at_document_start = false;
        let name = self.read_name(input)?;
        let mut attributes: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;
        loop {
            self.skip_ws(input)?;
            let loc = input.location();
            match input.next()? {
                Some('>') => break,
                Some('/') => match input.next()? {
                    Some('>') => {
                        self_closing = true;
                        break;
                    }
                    Some(ch) => {
                        ctx.error(loc, ParseError::UnexpectedCharacter { ch: '/' })?;
                        input.push_back(ch);
                    }
                    None => {
                        ctx.error(loc, ParseError::UnexpectedEof { expected: ">" })?;
                        break;
                    }
                },
                Some(ch) if is_name_start(ch) => {
                    input.push_back(ch);
                    let attr_name = self.read_name(input)?;
                    let value = self.attribute_value(input, ctx)?;
                    if attributes.iter().any(|(existing, _)| *existing == attr_name) {
                        ctx.error(loc, ParseError::DuplicateAttribute { name: attr_name })?;
                    } else {
                        attributes.push((attr_name, value));
                    }
                }
                Some(ch) => {
                    // Junk inside the tag: drop it and keep scanning.
                    ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                }
                None => {
                    ctx.error(loc, ParseError::UnexpectedEof { expected: ">" })?;
                    break;
                }
            }
        }
        self.flush_text();
        self.tokens.push_back((
            Token::StartTag {
                name,
                attributes,
                self_closing,
            },
            self.token_location,
        ));
        Ok(())
    }

    fn attribute_value<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<String, StreamError> {
        self.skip_ws(input)?;
        let loc = input.location();
        match input.next()? {
            Some('=') => {}
            Some(ch) => {
                // Minimized attribute: report and treat as empty-valued.
                ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                input.push_back(ch);
                return Ok(String::new());
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "=" })?;
                return Ok(String::new());
            }
        }
        self.skip_ws(input)?;
        let loc = input.location();
        let quote = match input.next()? {
            Some(q @ ('"' | '\'')) => q,
            Some(ch) => {
                ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                input.push_back(ch);
                // Unquoted recovery: scan to whitespace or tag end.
                let mut value = String::new();
                loop {
                    match input.next()? {
                        Some(ch) if is_xml_ws(ch) => break,
                        Some(ch @ ('>' | '/')) => {
                            input.push_back(ch);
                            break;
                        }
                        Some(ch) => value.push(ch),
                        None => break,
                    }
                }
                return Ok(value);
            }
            None => {
                ctx.error(loc, ParseError::UnexpectedEof { expected: "attribute value" })?;
                return Ok(String::new());
            }
        };
        let mut value = String::new();
        loop {
            let loc = input.location();
            match input.next()? {
                Some(ch) if ch == quote => break,
                Some('&') => {
                    let decoded = self.reference(input, ctx, loc)?;
                    value.push_str(&decoded);
                }
                Some(ch) if is_xml_ws(ch) => {
                    // Attribute-value normalization: whitespace becomes space.
                    value.push(' ');
                }
                Some('<') => {
                    ctx.error(loc, ParseError::UnexpectedCharacter { ch: '<' })?;
                    value.push('<');
                }
                Some(ch) => value.push(ch),
                None => {
                    ctx.error(loc, ParseError::UnexpectedEof { expected: "attribute value" })?;
                    break;
                }
            }
        }
        Ok(value)
    }

    fn end_tag<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let name = self.read_name(input)?;
        self.skip_ws(input)?;
        loop {
            let loc = input.location();
            match input.next()? {
                Some('>') => break,
                Some(ch) => {
                    ctx.error(loc, ParseError::UnexpectedCharacter { ch })?;
                }
                None => {
                    ctx.error(loc, ParseError::UnexpectedEof { expected: ">" })?;
                    break;
                }
            }
        }
        self.flush_text();
        self.tokens
            .push_back((Token::EndTag { name }, self.token_location));
        Ok(())
    }

    fn processing_instruction<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let target = self.read_name(input)?;
        let at_start = self.at_document_start;
        self.at_document_start = false;
        self.skip_ws(input)?;
        let mut body = String::new();
        loop {
            let loc = input.location();
            match input.next()? {
                Some('?') => match input.next()? {
                    Some('>') => break,
                    Some(ch) => {
                        body.push('?');
                        input.push_back(ch);
                    }
                    None => {
                        ctx.error(loc, ParseError::UnexpectedEof { expected: "?>" })?;
                        break;
                    }
                },
                Some(ch) => body.push(ch),
                None => {
                    ctx.error(loc, ParseError::UnexpectedEof { expected: "?>" })?;
                    break;
                }
            }
        }
        if target == "xml" && at_start {
            let decl = self.parse_xml_declaration(&body, ctx)?;
            self.flush_text();
            self.tokens
                .push_back((Token::XmlDecl(decl), self.token_location));
        } else {
            self.flush_text();
            self.tokens
                .push_back((Token::Pi { target, text: body }, self.token_location));
        }
        Ok(())
    }

    /// Pseudo-attributes of an XML declaration; malformed pieces degrade to
    /// the defaults with a report.
    fn parse_xml_declaration(
        &mut self,
        body: &str,
        ctx: &mut ParseContext,
    ) -> Result<XmlDeclaration, StreamError> {
        let mut decl = XmlDeclaration {
            version: "1.0".to_string(),
            encoding: None,
            standalone: None,
        };
        let mut rest = body.trim();
        while !rest.is_empty() {
            let Some(eq) = rest.find('=') else {
                ctx.error(self.token_location, ParseError::BadDoctype)?;
                break;
            };
            let key = rest[..eq].trim();
            let after = rest[eq + 1..].trim_start();
            let Some(quote) = after.chars().next().filter(|q| matches!(q, '"' | '\'')) else {
                ctx.error(self.token_location, ParseError::BadDoctype)?;
                break;
            };
            let Some(end) = after[1..].find(quote) else {
                ctx.error(self.token_location, ParseError::BadDoctype)?;
                break;
            };
            let value = &after[1..1 + end];
            match key {
                "version" => decl.version = value.to_string(),
                "encoding" => decl.encoding = Some(value.to_string()),
                "standalone" => decl.standalone = Some(value == "yes"),
                _ => ctx.error(self.token_location, ParseError::BadDoctype)?,
            }
            rest = after[1 + end + 1..].trim_start();
        }
        Ok(decl)
    }

    fn declaration<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        if self.lookahead(input, "--")? {
            return self.comment(input, ctx);
        }
        if self.lookahead(input, "[CDATA[")? {
            self.at_document_start = false;
            return self.cdata(input, ctx);
        }
        if self.lookahead_ci(input, "DOCTYPE")? {
            self.at_document_start = false;
            return self.doctype(input, ctx);
        }
        ctx.error(
            input.location(),
            ParseError::UnexpectedCharacter { ch: '!' },
        )?;
        // Skip the unrecognized declaration wholesale.
        loop {
            match input.next()? {
                Some('>') | None => break,
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn comment<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        let mut text = String::new();
        loop {
            let loc = input.location();
            match input.next()? {
                Some('-') => match input.next()? {
                    Some('-') => match input.next()? {
                        Some('>') => break,
                        Some(ch) => {
                            // "--" must not appear inside an XML comment.
                            ctx.error(loc, ParseError::UnexpectedCharacter { ch: '-' })?;
                            text.push_str("--");
                            input.push_back(ch);
                        }
                        None => {
                            ctx.error(loc, ParseError::UnexpectedEof { expected: "-->" })?;
                            break;
                        }
                    },
                    Some(ch) => {
                        text.push('-');
                        input.push_back(ch);
                    }
                    None => {
                        ctx.error(loc, ParseError::UnexpectedEof { expected: "-->" })?;
                        text.push('-');
                        break;
                    }
                },
                Some(ch) => text.push(ch),
                None => {
                    ctx.error(loc, ParseError::UnexpectedEof { expected: "-->" })?;
                    break;
                }
            }
        }
        self.flush_text();
        self.tokens
            .push_back((Token::Comment(text), self.token_location));
        Ok(())
    }

    fn cdata<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        // CDATA content is literal text; no markup, no references.
        let start = self.token_location;
        let mut text = String::new();
        loop {
            let loc = input.location();
            match input.next()? {
                Some(']') => match input.next()? {
                    Some(']') => match input.next()? {
                        Some('>') => break,
                        Some(ch) => {
                            text.push(']');
                            input.push_back(ch);
                            input.push_back(']');
                        }
                        None => {
                            ctx.error(loc, ParseError::UnexpectedEof { expected: "]]>" })?;
                            text.push_str("]]");
                            break;
                        }
                    },
                    Some(ch) => {
                        text.push(']');
                        input.push_back(ch);
                    }
                    None => {
                        ctx.error(loc, ParseError::UnexpectedEof { expected: "]]>" })?;
                        text.push(']');
                        break;
                    }
                },
                Some(ch) => text.push(ch),
                None => {
                    ctx.error(loc, ParseError::UnexpectedEof { expected: "]]>" })?;
                    break;
                }
            }
        }
        self.emit_text(&text, start);
        Ok(())
    }

    fn doctype<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<(), StreamError> {
        self.skip_ws(input)?;
        let name = self.read_name(input)?;
        let mut doctype = Doctype {
            name: (!name.is_empty()).then_some(name),
            public_id: None,
            system_id: None,
            force_quirks: false,
        };
        if doctype.name.is_none() {
            ctx.error(self.token_location, ParseError::BadDoctype)?;
        }
        // Skip the rest, tracking the internal-subset brackets; external
        // identifiers are recorded but never resolved.
        self.skip_ws(input)?;
        if self.lookahead_ci(input, "PUBLIC")? {
            doctype.public_id = self.external_id_literal(input, ctx)?;
            doctype.system_id = self.external_id_literal(input, ctx)?;
        } else if self.lookahead_ci(input, "SYSTEM")? {
            doctype.system_id = self.external_id_literal(input, ctx)?;
        }
        let mut depth = 0usize;
        loop {
            let loc = input.location();
            match input.next()? {
                Some('[') => depth += 1,
                Some(']') => depth = depth.saturating_sub(1),
                Some('>') if depth == 0 => break,
                Some(_) => {}
                None => {
                    ctx.error(loc, ParseError::UnexpectedEof { expected: ">" })?;
                    doctype.force_quirks = true;
                    break;
                }
            }
        }
        self.flush_text();
        self.tokens
            .push_back((Token::Doctype(doctype), self.token_location));
        Ok(())
    }

    fn external_id_literal<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
    ) -> Result<Option<String>, StreamError> {
        self.skip_ws(input)?;
        let quote = match input.next()? {
            Some(q @ ('"' | '\'')) => q,
            Some(ch) => {
                input.push_back(ch);
                return Ok(None);
            }
            None => return Ok(None),
        };
        let mut literal = String::new();
        loop {
            let loc = input.location();
            match input.next()? {
                Some(ch) if ch == quote => break,
                Some(ch) => literal.push(ch),
                None => {
                    ctx.error(loc, ParseError::UnexpectedEof { expected: "literal" })?;
                    break;
                }
            }
        }
        Ok(Some(literal))
    }

    /// Decode a reference after `&`: predefined, numeric, or through the
    /// caller-supplied resolver; unresolvable references stay literal.
    fn reference<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        ctx: &mut ParseContext,
        loc: Location,
    ) -> Result<String, StreamError> {
        match input.next()? {
            Some('#') => {
                let mut radix = 10;
                let mut digits = String::new();
                match input.next()? {
                    Some('x') | Some('X') => radix = 16,
                    Some(ch) => input.push_back(ch),
                    None => {}
                }
                loop {
                    match input.next()? {
                        Some(ch) if ch.is_digit(radix) => digits.push(ch),
                        Some(';') => break,
                        Some(ch) => {
                            ctx.error(loc, ParseError::BadCharacterReference {
                                reference: format!("&#{digits}"),
                            })?;
                            input.push_back(ch);
                            break;
                        }
                        None => {
                            ctx.error(loc, ParseError::UnexpectedEof { expected: ";" })?;
                            break;
                        }
                    }
                }
                let code = u32::from_str_radix(&digits, radix).unwrap_or(u32::MAX);
                let (ch, bad) = entities::resolve_numeric(code);
                if bad {
                    ctx.error(loc, ParseError::BadCharacterReference {
                        reference: format!("&#{digits};"),
                    })?;
                }
                Ok(ch.to_string())
            }
            Some(ch) if is_name_start(ch) => {
                input.push_back(ch);
                let name = self.read_name(input)?;
                let terminated = match input.next()? {
                    Some(';') => true,
                    Some(ch) => {
                        input.push_back(ch);
                        false
                    }
                    None => false,
                };
                if !terminated {
                    ctx.error(loc, ParseError::BadCharacterReference {
                        reference: format!("&{name}"),
                    })?;
                    return Ok(format!("&{name}"));
                }
                match name.as_str() {
                    "lt" => Ok("<".to_string()),
                    "gt" => Ok(">".to_string()),
                    "amp" => Ok("&".to_string()),
                    "apos" => Ok("'".to_string()),
                    "quot" => Ok("\"".to_string()),
                    _ => {
                        if let Some(resolver) = &mut self.entity
                            && let Some(replacement) = resolver(&name)
                        {
                            return Ok(replacement);
                        }
                        ctx.error(loc, ParseError::BadCharacterReference {
                            reference: format!("&{name};"),
                        })?;
                        Ok(format!("&{name};"))
                    }
                }
            }
            other => {
                ctx.error(loc, ParseError::BadCharacterReference {
                    reference: "&".to_string(),
                })?;
                if let Some(ch) = other {
                    input.push_back(ch);
                }
                Ok("&".to_string())
            }
        }
    }

    fn lookahead<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        keyword: &str,
    ) -> Result<bool, StreamError> {
        self.lookahead_inner(input, keyword, false)
    }

    fn lookahead_ci<S: ByteSource>(
        &mut self,
        input: &mut Input<S>,
        keyword: &str,
    ) -> Result<bool, StreamError> {
        self.lookahead_inner(input, keyword, true)
    }

    fn lookahead_inner<S: ByteSource>(
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
                            && ch.to_ascii_uppercase() == expected.to_ascii_uppercase()) =>
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

    fn emit_char(&mut self, ch: char, loc: Location) {
        if self.text.is_empty() {
            self.text_location = loc;
        }
        self.text.push(ch);
    }

    fn emit_text(&mut self, text: &str, loc: Location) {
        if text.is_empty() {
            return;
        }
        if self.text.is_empty() {
            self.text_location = loc;
        }
        self.text.push_str(text);
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let chunk = std::mem::take(&mut self.text);
            self.tokens.push_back((Token::Text(chunk), self.text_location));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::XmlTokenizer;
    use crate::context::ParseContext;
    use crate::encoding::DocumentKind;
    use crate::input::Input;
    use crate::source::SliceSource;
    use crate::token::Token;

    fn tokenize(xml: &str) -> Vec<Token> {
        let mut input = Input::new(SliceSource::new(xml.as_bytes()), DocumentKind::Xml, None);
        let mut ctx = ParseContext::new(None);
        let mut tokenizer = XmlTokenizer::new(None);
        let mut out = Vec::new();
        while let Some((token, _)) = tokenizer.next_token(&mut input, &mut ctx).unwrap() {
            out.push(token);
        }
        out
    }

    #[test]
    fn xml_declaration_is_recognized_at_start_only() {
        let tokens = tokenize("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?><a/>");
        match &tokens[0] {
            Token::XmlDecl(decl) => {
                assert_eq!(decl.version, "1.0");
                assert_eq!(decl.encoding.as_deref(), Some("UTF-8"));
                assert_eq!(decl.standalone, Some(true));
            }
            other => panic!("expected xml declaration, got {other:?}"),
        }

        let tokens = tokenize("<a/><?xml version=\"1.0\"?>");
        assert!(matches!(&tokens[1], Token::Pi { target, .. } if target == "xml"));
    }

    #[test]
    fn processing_instruction_keeps_target_and_body() {
        let tokens = tokenize("<?php echo 1; ?>");
        assert_eq!(
            tokens[0],
            Token::Pi {
                target: "php".to_string(),
                text: "echo 1; ".to_string()
            }
        );
    }

    #[test]
    fn cdata_becomes_plain_text() {
        let tokens = tokenize("<r><![CDATA[<foo>]]></r>");
        assert_eq!(tokens[1], Token::Text("<foo>".to_string()));
    }

    #[test]
    fn predefined_and_numeric_references_decode() {
        let tokens = tokenize("<r>a&lt;b&#x41;&#66;</r>");
        assert_eq!(tokens[1], Token::Text("a<bAB".to_string()));
    }

    #[test]
    fn unknown_reference_stays_literal() {
        let tokens = tokenize("<r>&nope;</r>");
        assert_eq!(tokens[1], Token::Text("&nope;".to_string()));
    }

    #[test]
    fn entity_resolver_is_consulted() {
        let mut input = Input::new(
            SliceSource::new(b"<r>&custom;</r>"),
            DocumentKind::Xml,
            None,
        );
        let mut ctx = ParseContext::new(None);
        let mut tokenizer = XmlTokenizer::new(Some(Box::new(|name: &str| {
            (name == "custom").then(|| "X".to_string())
        })));
        let mut out = Vec::new();
        while let Some((token, _)) = tokenizer.next_token(&mut input, &mut ctx).unwrap() {
            out.push(token);
        }
        assert_eq!(out[1], Token::Text("X".to_string()));
    }

    #[test]
    fn attribute_values_normalize_whitespace_and_references() {
        let tokens = tokenize("<a b=\"1\n2&amp;3\"/>");
        match &tokens[0] {
            Token::StartTag { attributes, self_closing, .. } => {
                assert_eq!(attributes[0], ("b".to_string(), "1 2&3".to_string()));
                assert!(self_closing);
            }
            other => panic!("expected start tag, got {other:?}"),
        }
    }

    #[test]
    fn doctype_with_internal_subset_is_skipped() {
        let tokens = tokenize("<!DOCTYPE root [<!ENTITY x \"y\">]><root/>");
        match &tokens[0] {
            Token::Doctype(d) => assert_eq!(d.name.as_deref(), Some("root")),
            other => panic!("expected doctype, got {other:?}"),
        }
        assert!(matches!(&tokens[1], Token::StartTag { name, .. } if name == "root"));
    }

    #[test]
    fn comment_with_double_dash_recovers() {
        let tokens = tokenize("<!-- a -- b -->");
        assert_eq!(tokens[0], Token::Comment(" a -- b ".to_string()));
    }

    #[test]
    fn duplicate_attribute_reports_and_keeps_first() {
        let mut input = Input::new(
            SliceSource::new(b"<a x=\"1\" x=\"2\"/>"),
            DocumentKind::Xml,
            None,
        );
        let mut ctx = ParseContext::new(None);
        let mut tokenizer = XmlTokenizer::new(None);
        let mut out = Vec::new();
        while let Some((token, _)) = tokenizer.next_token(&mut input, &mut ctx).unwrap() {
            out.push(token);
        }
        match &out[0] {
            Token::StartTag { attributes, .. } => {
                assert_eq!(attributes.len(), 1);
                assert_eq!(attributes[0].1, "1");
            }
            other => panic!("expected start tag, got {other:?}"),
        }
        assert_eq!(ctx.counters.errors_reported, 1);
    }
}
