//! Decoded scalar stream feeding a tokenizer.
//!
//! Owned exclusively by one tokenizer. The stream decodes lazily: no byte is
//! pulled from the source until the first scalar is requested, and encoding
//! detection happens on the buffered head at that point.
//!
//! Invariants:
//! - Newlines are normalized before delivery: CR and CR LF collapse to LF.
//! - `push_back` replays the most recently consumed scalars, locations
//!   included; look-ahead depth is bounded by `REPLAY_DEPTH`.
//! - `location()` is the position of the *next* scalar to be produced.

use crate::encoding::{detect, DocumentKind, PRESCAN_BYTES};
use crate::location::Location;
use crate::source::ByteSource;
use encoding_rs::{Decoder, Encoding};
use std::collections::VecDeque;
use std::io;

/// Upper bound on look-ahead push-back (the longest named character
/// reference plus slack).
const REPLAY_DEPTH: usize = 64;

pub(crate) struct Input<S> {
    source: S,
    kind: DocumentKind,
    explicit_encoding: Option<&'static Encoding>,
    decoder: Option<Decoder>,
    encoding_name: &'static str,
    pending: Vec<u8>,
    pending_pos: usize,
    source_done: bool,
    flushed: bool,
    queue: VecDeque<char>,
    pushback: Vec<(char, Location)>,
    replay: VecDeque<(char, Location)>,
    next_location: Location,
    pending_cr: bool,
    decode_errors: VecDeque<Location>,
}

impl<S: ByteSource> Input<S> {
    pub(crate) fn new(
        source: S,
        kind: DocumentKind,
        explicit_encoding: Option<&'static Encoding>,
    ) -> Self {
        Self {
            source,
            kind,
            explicit_encoding,
            decoder: None,
            encoding_name: "",
            pending: Vec::new(),
            pending_pos: 0,
            source_done: false,
            flushed: false,
            queue: VecDeque::new(),
            pushback: Vec::new(),
            replay: VecDeque::new(),
            next_location: Location::START,
            pending_cr: false,
            decode_errors: VecDeque::new(),
        }
    }

    /// Advance one scalar. `Ok(None)` is end of input and is sticky.
    pub(crate) fn next(&mut self) -> io::Result<Option<char>> {
        if let Some((ch, loc)) = self.pushback.pop() {
            self.remember(ch, loc);
            return Ok(Some(ch));
        }
        if self.queue.is_empty() {
            self.fill()?;
        }
        match self.queue.pop_front() {
            Some(ch) => {
                let loc = self.next_location;
                self.next_location.advance(ch);
                self.remember(ch, loc);
                Ok(Some(ch))
            }
            None => Ok(None),
        }
    }

    /// Re-insert the most recently consumed scalar so the next `next()`
    /// returns it again, at its original location.
    pub(crate) fn push_back(&mut self, ch: char) {
        let (replayed, loc) = self
            .replay
            .pop_back()
            .unwrap_or((ch, self.next_location));
        debug_assert_eq!(
            replayed, ch,
            "push_back must replay the last consumed scalar"
        );
        self.pushback.push((ch, loc));
    }

    /// Position of the next scalar to be produced.
    pub(crate) fn location(&self) -> Location {
        match self.pushback.last() {
            Some((_, loc)) => *loc,
            None => self.next_location,
        }
    }

    /// Name of the selected encoding (after detection).
    pub(crate) fn encoding_name(&self) -> &'static str {
        self.encoding_name
    }

    /// Locations where invalid byte sequences were replaced with U+FFFD
    /// since the last call.
    pub(crate) fn take_decode_error(&mut self) -> Option<Location> {
        self.decode_errors.pop_front()
    }

    fn remember(&mut self, ch: char, loc: Location) {
        self.replay.push_back((ch, loc));
        if self.replay.len() > REPLAY_DEPTH {
            self.replay.pop_front();
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        if self.decoder.is_none() {
            self.init()?;
        }
        while self.queue.is_empty() {
            if self.pending_pos < self.pending.len() {
                let start = self.pending_pos;
                self.pending_pos = self.pending.len();
                let bytes = std::mem::take(&mut self.pending);
                self.decode(&bytes[start..], false);
                continue;
            }
            if !self.source_done {
                match self.source.pull()? {
                    Some(chunk) => {
                        self.pending = chunk;
                        self.pending_pos = 0;
                    }
                    None => self.source_done = true,
                }
                continue;
            }
            if !self.flushed {
                self.decode(&[], true);
                self.flushed = true;
                continue;
            }
            break;
        }
        Ok(())
    }

    fn init(&mut self) -> io::Result<()> {
        // Buffer the detector's window up front; everything buffered is
        // decoded afterwards, so nothing is lost to the prescan.
        let mut prefix = Vec::new();
        while prefix.len() < PRESCAN_BYTES {
            match self.source.pull()? {
                Some(chunk) => prefix.extend_from_slice(&chunk),
                None => {
                    self.source_done = true;
                    break;
                }
            }
        }
        let detected = detect(self.kind, &prefix, self.explicit_encoding);
        self.encoding_name = detected.encoding.name();
        self.decoder = Some(detected.encoding.new_decoder_without_bom_handling());
        self.pending = prefix;
        self.pending_pos = detected.bom_len;
        #[cfg(any(test, feature = "trace"))]
        log::trace!(target: "markup.input", "selected encoding {}", self.encoding_name);
        Ok(())
    }

    fn decode(&mut self, bytes: &[u8], last: bool) {
        let decoder = self
            .decoder
            .as_mut()
            .expect("decoder initialized before decode");
        let mut read_total = 0;
        loop {
            let remaining = &bytes[read_total..];
            let capacity = decoder
                .max_utf8_buffer_length(remaining.len())
                .unwrap_or(remaining.len() * 3 + 16)
                .max(16);
            let mut dst = String::with_capacity(capacity);
            let (result, read, had_errors) = decoder.decode_to_string(remaining, &mut dst, last);
            read_total += read;
            if had_errors {
                self.decode_errors.push_back(self.next_location);
            }
            for ch in dst.chars() {
                if self.pending_cr {
                    self.pending_cr = false;
                    if ch == '\n' {
                        continue;
                    }
                }
                if ch == '\r' {
                    self.pending_cr = true;
                    self.queue.push_back('\n');
                } else {
                    self.queue.push_back(ch);
                }
            }
            match result {
                encoding_rs::CoderResult::InputEmpty => break,
                encoding_rs::CoderResult::OutputFull => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentKind, Input};
    use crate::location::Location;
    use crate::source::SliceSource;

    fn collect(input: &mut Input<SliceSource<'_>>) -> String {
        let mut out = String::new();
        while let Some(ch) = input.next().unwrap() {
            out.push(ch);
        }
        out
    }

    fn html_input(bytes: &[u8]) -> Input<SliceSource<'_>> {
        Input::new(SliceSource::new(bytes), DocumentKind::Html, None)
    }

    #[test]
    fn newlines_are_normalized() {
        let mut input = html_input(b"a\r\nb\rc\nd");
        assert_eq!(collect(&mut input), "a\nb\nc\nd");
    }

    #[test]
    fn bom_is_stripped_and_first_scalar_is_at_origin() {
        let mut input = html_input(b"\xEF\xBB\xBF<p>");
        assert_eq!(input.location(), Location::START);
        assert_eq!(input.next().unwrap(), Some('<'));
    }

    #[test]
    fn bom_only_input_is_empty() {
        let mut input = html_input(b"\xEF\xBB\xBF");
        assert_eq!(input.next().unwrap(), None);
        assert_eq!(input.next().unwrap(), None);
    }

    #[test]
    fn push_back_replays_scalar_and_location() {
        let mut input = html_input(b"ab");
        let first = input.location();
        let a = input.next().unwrap().unwrap();
        assert_eq!(a, 'a');
        input.push_back('a');
        assert_eq!(input.location(), first);
        assert_eq!(input.next().unwrap(), Some('a'));
        assert_eq!(input.next().unwrap(), Some('b'));
    }

    #[test]
    fn push_back_is_lifo_for_lookahead_rollback() {
        let mut input = html_input(b"xyz");
        let x = input.next().unwrap().unwrap();
        let y = input.next().unwrap().unwrap();
        input.push_back(y);
        input.push_back(x);
        assert_eq!(input.next().unwrap(), Some('x'));
        assert_eq!(input.next().unwrap(), Some('y'));
        assert_eq!(input.next().unwrap(), Some('z'));
    }

    #[test]
    fn locations_advance_across_lines() {
        let mut input = html_input(b"a\nb");
        input.next().unwrap();
        input.next().unwrap();
        assert_eq!(input.location(), Location { line: 2, column: 1 });
    }

    #[test]
    fn invalid_bytes_become_replacement_with_error() {
        let mut input = html_input(b"a\xFFb");
        let text = collect(&mut input);
        assert_eq!(text, "a\u{FFFD}b");
        assert!(input.take_decode_error().is_some());
        assert!(input.take_decode_error().is_none());
    }

    #[test]
    fn utf16le_decodes_after_bom_detection() {
        let bytes = b"\xFF\xFE<\x00p\x00>\x00";
        let mut input = Input::new(SliceSource::new(bytes), DocumentKind::Html, None);
        assert_eq!(collect(&mut input), "<p>");
        assert_eq!(input.encoding_name(), "UTF-16LE");
    }
}
