//! HTML5 parsing session: byte source, input stream, tokenizer and tree
//! builder wired into one pull-driven signal stream.

pub(crate) mod tokenizer;
pub(crate) mod tree_builder;

use crate::config::Config;
use crate::context::{Counters, ParseContext};
use crate::encoding::DocumentKind;
use crate::error::StreamError;
use crate::input::Input;
use crate::location::Location;
use crate::signal::Signal;
use crate::source::ByteSource;
use tokenizer::{HtmlTokenizer, State};
use tree_builder::TreeBuilder;

/// Lazy HTML signal stream. Each `next()` advances the parser just far
/// enough to produce one signal.
pub struct HtmlSignals<S> {
    input: Input<S>,
    tokenizer: HtmlTokenizer,
    builder: TreeBuilder,
    ctx: ParseContext,
    failed: bool,
}

impl<S: ByteSource> HtmlSignals<S> {
    pub(crate) fn new(config: Config, source: S) -> Self {
        let input = Input::new(source, DocumentKind::Html, config.encoding);
        let mut tokenizer = HtmlTokenizer::new();
        if let Some(context) = &config.context {
            // Fragment parsing: the context element decides the tokenizer's
            // initial content model.
            match context.as_str() {
                "title" | "textarea" => tokenizer.set_state(State::Rcdata),
                "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                    tokenizer.set_state(State::Rawtext)
                }
                "script" => tokenizer.set_state(State::ScriptData),
                "plaintext" => tokenizer.set_state(State::Plaintext),
                _ => {}
            }
            tokenizer.set_last_start_tag(context);
        }
        let builder = TreeBuilder::new(config.context);
        Self {
            input,
            tokenizer,
            builder,
            ctx: ParseContext::new(config.report),
            failed: false,
        }
    }

    /// Instrumentation counters for this parse.
    pub fn counters(&self) -> Counters {
        self.ctx.counters
    }
}

impl<S: ByteSource> Iterator for HtmlSignals<S> {
    type Item = Result<(Signal, Location), StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(item) = self.builder.pop_signal() {
                return Some(Ok(item));
            }
            if self.builder.is_done() {
                return None;
            }
            match self.tokenizer.next_token(&mut self.input, &mut self.ctx) {
                Ok(Some((token, loc))) => {
                    if let Err(e) =
                        self.builder
                            .process(token, loc, &mut self.tokenizer, &mut self.ctx)
                    {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
                Ok(None) => {
                    // The EOF token has already been through the builder;
                    // anything still buffered comes out now.
                    self.builder.flush_pending();
                    if let Some(item) = self.builder.pop_signal() {
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
