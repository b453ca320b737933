//! Parse-error taxonomy and stream failure types.
//!
//! Parse errors are recoverable by construction: every one of them is paired
//! with a recovery action in the tokenizer or tree builder, and the stream
//! keeps producing signals after reporting. The only terminal failures are
//! byte-source I/O errors and the consumer's stop sentinel.

use crate::location::Location;
use std::fmt;
use std::io;

/// A named ill-formedness condition, with structured payload.
///
/// This set is closed; matching on it is part of the public contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid octets for the selected encoding; replaced with U+FFFD.
    BadByteSequence { encoding: &'static str },
    /// Disallowed scalar in the current tokenizer state.
    UnexpectedCharacter { ch: char },
    /// End of input in a non-terminal state.
    UnexpectedEof { expected: &'static str },
    /// Start tag never closed by the time it had to be.
    UnmatchedStartTag { name: String },
    /// End tag without a matching open element.
    UnmatchedEndTag { name: String },
    /// Mis-nested formatting element; triggers the adoption agency.
    MisnestedTag { name: String },
    /// Malformed DOCTYPE structure.
    BadDoctype,
    /// Second occurrence of an attribute name; the duplicate is dropped.
    DuplicateAttribute { name: String },
    /// Invalid or out-of-range character reference.
    BadCharacterReference { reference: String },
    /// Undeclared namespace prefix (XML).
    BadNamespace { prefix: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadByteSequence { encoding } => {
                write!(f, "invalid byte sequence for {encoding}")
            }
            ParseError::UnexpectedCharacter { ch } => write!(f, "unexpected character {ch:?}"),
            ParseError::UnexpectedEof { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            ParseError::UnmatchedStartTag { name } => write!(f, "unmatched start tag <{name}>"),
            ParseError::UnmatchedEndTag { name } => write!(f, "unmatched end tag </{name}>"),
            ParseError::MisnestedTag { name } => write!(f, "mis-nested tag <{name}>"),
            ParseError::BadDoctype => write!(f, "malformed doctype"),
            ParseError::DuplicateAttribute { name } => write!(f, "duplicate attribute {name:?}"),
            ParseError::BadCharacterReference { reference } => {
                write!(f, "bad character reference {reference:?}")
            }
            ParseError::BadNamespace { prefix } => {
                write!(f, "undeclared namespace prefix {prefix:?}")
            }
        }
    }
}

/// Sentinel returned by a `report` callback to cancel the parse.
///
/// Propagates outward through the parser; internal stacks are dropped on the
/// way out and the stream yields `StreamError::Stopped` once, then ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stopped;

/// Consumer-supplied error reporter. The default ignores everything.
pub type Reporter = Box<dyn FnMut(Location, &ParseError) -> Result<(), Stopped>>;

/// Terminal failure of a signal stream.
#[derive(Debug)]
pub enum StreamError {
    /// The byte source failed.
    Io(io::Error),
    /// The `report` callback raised `Stopped`.
    Stopped,
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        StreamError::Io(e)
    }
}

impl From<Stopped> for StreamError {
    fn from(_: Stopped) -> Self {
        StreamError::Stopped
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Io(e) => write!(f, "byte source error: {e}"),
            StreamError::Stopped => write!(f, "stopped by error reporter"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Io(e) => Some(e),
            StreamError::Stopped => None,
        }
    }
}
