//! Streaming, error-recovering HTML5 and XML parsers.
//!
//! Both parsers turn a lazy byte stream into a lazy stream of structural
//! *signals* (start element, end element, text, comment, doctype, XML
//! declaration, processing instruction), and a matching pair of serializers
//! reverses the transformation. The streams are one-pass with bounded
//! look-ahead, advance only when the consumer pulls, and recover from every
//! ill-formed input: parse errors are reported through a callback and never
//! end the stream by themselves.
//!
//! ```
//! use markup::{parse_html, Config, Signal, SliceSource};
//!
//! let signals = parse_html(Config::default(), SliceSource::new(b"<p>hi</p>"));
//! for item in signals {
//!     let (signal, location) = item.unwrap();
//!     if let Signal::Text(chunks) = &signal {
//!         assert_eq!(chunks.concat(), "hi");
//!         assert_eq!(location.line, 1);
//!     }
//! }
//! ```
//!
//! Error handling: a `report` callback in [`Config`] receives every parse
//! error with its location. The callback may cancel the parse by returning
//! [`Stopped`]; byte-source I/O errors surface as [`StreamError::Io`].

mod config;
mod context;
mod encoding;
mod entities;
mod error;
mod html5;
mod input;
mod location;
mod serialize;
mod signal;
mod source;
mod token;
mod xml;

pub use config::{Config, EntityResolver, NamespaceResolver};
pub use context::Counters;
pub use encoding_rs::Encoding;
pub use error::{ParseError, Reporter, Stopped, StreamError};
pub use html5::HtmlSignals;
pub use location::Location;
pub use serialize::{HtmlWriter, WriteConfig, XmlWriter};
pub use signal::{
    Doctype, Name, Signal, XmlDeclaration, HTML_NAMESPACE, MATHML_NAMESPACE, SVG_NAMESPACE,
    XLINK_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE,
};
pub use source::{ByteSource, ReadSource, SliceSource};
pub use xml::XmlSignals;

/// Parse a byte stream as HTML5, returning the lazy signal stream.
pub fn parse_html<S: ByteSource>(config: Config, source: S) -> HtmlSignals<S> {
    HtmlSignals::new(config, source)
}

/// Parse a byte stream as XML 1.0, returning the lazy signal stream.
pub fn parse_xml<S: ByteSource>(config: Config, source: S) -> XmlSignals<S> {
    XmlSignals::new(config, source)
}

/// Serialize a signal stream as HTML byte chunks.
pub fn write_html<I>(signals: I) -> HtmlWriter<I::IntoIter>
where
    I: IntoIterator<Item = Signal>,
{
    HtmlWriter::new(signals.into_iter())
}

/// Serialize a signal stream as XML byte chunks.
pub fn write_xml<I>(config: WriteConfig, signals: I) -> XmlWriter<I::IntoIter>
where
    I: IntoIterator<Item = Signal>,
{
    XmlWriter::new(config, signals.into_iter())
}
