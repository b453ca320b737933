//! XML parsing session.

pub(crate) mod nesting;
pub(crate) mod tokenizer;

use crate::config::Config;
use crate::context::{Counters, ParseContext};
use crate::encoding::DocumentKind;
use crate::error::StreamError;
use crate::input::Input;
use crate::location::Location;
use crate::signal::Signal;
use crate::source::ByteSource;
use nesting::NestingTracker;
use tokenizer::XmlTokenizer;

/// Lazy XML signal stream.
pub struct XmlSignals<S> {
    input: Input<S>,
    tokenizer: XmlTokenizer,
    tracker: NestingTracker,
    ctx: ParseContext,
    failed: bool,
}

impl<S: ByteSource> XmlSignals<S> {
    pub(crate) fn new(config: Config, source: S) -> Self {
        let input = Input::new(source, DocumentKind::Xml, config.encoding);
        Self {
            input,
            tokenizer: XmlTokenizer::new(config.entity),
            tracker: NestingTracker::new(config.namespace),
            ctx: ParseContext::new(config.report),
            failed: false,
        }
    }

    /// Instrumentation counters for this parse.
    pub fn counters(&self) -> Counters {
        self.ctx.counters
    }
}

impl<S: ByteSource> Iterator for XmlSignals<S> {
    type Item = Result<(Signal, Location), StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(item) = self.tracker.pop_signal() {
                return Some(Ok(item));
            }
            if self.tracker.is_done() {
                return None;
            }
            match self.tokenizer.next_token(&mut self.input, &mut self.ctx) {
                Ok(Some((token, loc))) => {
                    if let Err(e) = self.tracker.process(token, loc, &mut self.ctx) {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
                Ok(None) => {
                    self.tracker.flush_pending();
                    if let Some(item) = self.tracker.pop_signal() {
                        return Some(Ok(item));
                    }
                    return None;
                }
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
