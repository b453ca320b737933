//! Document-scoped parse context shared by tokenizer and tree builder.

use crate::error::{ParseError, Reporter, Stopped};
use crate::location::Location;

/// Counters kept for instrumentation and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub tokens_processed: u64,
    pub errors_reported: u64,
    pub max_open_elements_depth: u32,
}

/// Per-parse resources: the error reporter and instrumentation counters.
///
/// Owned by one parser instance; two independent parsers share nothing
/// mutable.
pub(crate) struct ParseContext {
    report: Option<Reporter>,
    pub(crate) counters: Counters,
}

impl ParseContext {
    pub(crate) fn new(report: Option<Reporter>) -> Self {
        Self {
            report,
            counters: Counters::default(),
        }
    }

    /// Report a parse error at `location`.
    ///
    /// Reporting never blocks signal production; the callback may cancel the
    /// parse by returning `Stopped`, which propagates uncaught.
    pub(crate) fn error(&mut self, location: Location, error: ParseError) -> Result<(), Stopped> {
        self.counters.errors_reported = self.counters.errors_reported.saturating_add(1);
        #[cfg(any(test, feature = "trace"))]
        log::trace!(target: "markup", "parse error at {location}: {error}");
        match &mut self.report {
            Some(report) => report(location, &error),
            None => Ok(()),
        }
    }
}
