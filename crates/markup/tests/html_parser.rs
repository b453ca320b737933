//! End-to-end HTML parsing scenarios: recovery, content models, encodings,
//! and the stream-level invariants (bracket nesting, monotonic locations,
//! chunk equivalence).

use markup::{
    parse_html, Config, Location, ParseError, Signal, SliceSource, Stopped, StreamError,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

fn signals_of(html: &str) -> Vec<(Signal, Location)> {
    parse_html(Config::default(), SliceSource::new(html.as_bytes()))
        .map(|item| item.expect("in-memory parse cannot fail"))
        .collect()
}

/// Compact rendering for assertions: elements by local name, text
/// concatenated.
fn brief(signals: &[(Signal, Location)]) -> Vec<String> {
    signals
        .iter()
        .map(|(signal, _)| match signal {
            Signal::StartElement { name, .. } => format!("<{}>", name.local),
            Signal::EndElement => "</>".to_string(),
            Signal::Text(chunks) => format!("\"{}\"", chunks.concat()),
            Signal::Comment(text) => format!("<!--{text}-->"),
            Signal::Doctype(d) => format!("<!DOCTYPE {}>", d.name.as_deref().unwrap_or("")),
            Signal::Xml(_) => "<?xml?>".to_string(),
            Signal::ProcessingInstruction { target, .. } => format!("<?{target}?>"),
        })
        .collect()
}

fn collect_errors(html: &str) -> (Vec<(Signal, Location)>, Vec<(Location, ParseError)>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let config = Config::default().with_report(Box::new(move |loc, error| {
        sink.lock().unwrap().push((loc, error.clone()));
        Ok(())
    }));
    let signals = parse_html(config, SliceSource::new(html.as_bytes()))
        .map(|item| item.expect("in-memory parse cannot fail"))
        .collect();
    let errors = errors.lock().unwrap().clone();
    (signals, errors)
}

#[test]
fn unclosed_paragraph_reconstructs_formatting() {
    // <p><em>Markup.ml<p>rocks!  -- the second <p> implies closing the
    // first, the <em> is reported unmatched and later reconstructed.
    let (signals, errors) = collect_errors("<p><em>Markup.ml<p>rocks!");
    assert_eq!(
        brief(&signals),
        vec![
            "<p>", "<em>", "\"Markup.ml\"", "</>", "</>", "<p>", "<em>", "\"rocks!\"", "</>",
            "</>"
        ]
    );
    assert!(
        errors.iter().any(|(loc, error)| {
            *loc == Location { line: 1, column: 4 }
                && matches!(error, ParseError::UnmatchedStartTag { name } if name == "em")
        }),
        "expected unmatched <em> report at 1:4, got {errors:?}"
    );
}

#[test]
fn text_inside_table_is_reported_and_kept_in_document_order() {
    let (signals, errors) = collect_errors("<table>text</table>");
    assert_eq!(brief(&signals), vec!["<table>", "\"text\"", "</>"]);
    assert!(errors.len() > 1, "foster parenting must be reported");
}

#[test]
fn adoption_agency_resolves_nested_anchors() {
    let (signals, _) =
        collect_errors("<!DOCTYPE html><html><body><a><b><a></a></b></a>");
    assert_eq!(
        brief(&signals),
        vec![
            "<!DOCTYPE html>",
            "<a>",
            "<b>",
            "</>",
            "</>",
            "<b>",
            "<a>",
            "</>",
            "</>"
        ]
    );
}

#[test]
fn adoption_agency_reopens_formatting_after_block() {
    // The classic mis-nesting: the <b> must be closed at </b> and the
    // trailing text must not land inside it.
    let signals = signals_of("<b><i></b>x</i>");
    assert_eq!(
        brief(&signals),
        vec!["<b>", "<i>", "</>", "</>", "<i>", "\"x\"", "</>"]
    );
}

#[test]
fn script_content_is_raw_text() {
    let signals = signals_of("<script>if (a<b) c</script>");
    assert_eq!(
        brief(&signals),
        vec!["<script>", "\"if (a<b) c\"", "</>"]
    );
}

#[test]
fn bom_is_stripped_and_first_signal_is_at_origin() {
    let bytes = b"\xEF\xBB\xBF<p>";
    let signals: Vec<_> = parse_html(Config::default(), SliceSource::new(bytes))
        .map(|item| item.unwrap())
        .collect();
    let (first, loc) = &signals[0];
    assert!(matches!(first, Signal::StartElement { name, .. } if name.local == "p"));
    assert_eq!(*loc, Location { line: 1, column: 1 });
}

#[test]
fn empty_input_yields_no_signals() {
    assert!(signals_of("").is_empty());
}

#[test]
fn bom_only_input_yields_no_signals() {
    let signals: Vec<_> = parse_html(Config::default(), SliceSource::new(b"\xEF\xBB\xBF"))
        .map(|item| item.unwrap())
        .collect();
    assert!(signals.is_empty());
}

#[test]
fn unterminated_comment_swallows_the_rest() {
    let (signals, errors) = collect_errors("<!-- never closed");
    assert_eq!(brief(&signals), vec!["<!-- never closed-->"]);
    assert!(errors
        .iter()
        .any(|(_, error)| matches!(error, ParseError::UnexpectedEof { .. })));
}

#[test]
fn every_start_is_matched_by_an_end() {
    let inputs = [
        "<p><em>Markup.ml<p>rocks!",
        "<table>text</table>",
        "<b><i></b></i>",
        "<ul><li>a<li>b</ul>",
        "<select><option>a<option>b",
        "<svg><circle/><foreignObject><p>x</svg>",
        "<template><td>x</td></template>",
        "<a href=1>text",
        "<!doctype html><frameset><frame></frameset>",
    ];
    for input in inputs {
        let mut depth = 0i64;
        for (signal, _) in signals_of(input) {
            match signal {
                Signal::StartElement { .. } => depth += 1,
                Signal::EndElement => {
                    depth -= 1;
                    assert!(depth >= 0, "unbalanced end in {input:?}");
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0, "unbalanced stream for {input:?}");
    }
}

#[test]
fn locations_are_monotonic_non_decreasing() {
    let inputs = [
        "<p>a</p>\n<p>b</p>",
        "<table>text</table>",
        "<p><em>Markup.ml<p>rocks!",
        "<div>\n  <span>x</span>\n</div>",
    ];
    for input in inputs {
        let signals = signals_of(input);
        let mut previous = Location { line: 1, column: 1 };
        for (_, loc) in signals {
            assert!(loc >= previous, "location went backwards in {input:?}");
            previous = loc;
        }
    }
}

#[test]
fn chunked_input_matches_whole_input() {
    let html = "<!doctype html><ul><li>one<li>two &amp; three</ul><!--done-->";
    let whole = signals_of(html);
    for chunk_len in [1, 2, 3, 7] {
        let chunks: VecDeque<Vec<u8>> = html
            .as_bytes()
            .chunks(chunk_len)
            .map(<[u8]>::to_vec)
            .collect();
        let chunked: Vec<_> = parse_html(Config::default(), chunks)
            .map(|item| item.unwrap())
            .collect();
        assert_eq!(whole, chunked, "chunk_len={chunk_len}");
    }
}

#[test]
fn meta_declared_encoding_is_applied() {
    // 0xE9 is e-acute in windows-1252.
    let bytes = b"<meta charset=\"windows-1252\"><p>caf\xE9</p>";
    let signals: Vec<_> = parse_html(Config::default(), SliceSource::new(bytes))
        .map(|item| item.unwrap())
        .collect();
    let text = signals
        .iter()
        .find_map(|(signal, _)| signal.text())
        .expect("text signal");
    assert_eq!(text, "caf\u{E9}");
}

#[test]
fn reporter_sentinel_cancels_the_parse() {
    let config = Config::default().with_report(Box::new(|_, _| Err(Stopped)));
    let mut stream = parse_html(config, SliceSource::new(b"<table>text</table>"));
    let outcome = stream.find_map(|item| match item {
        Ok(_) => None,
        Err(e) => Some(e),
    });
    assert!(matches!(outcome, Some(StreamError::Stopped)));
    assert_eq!(stream.next().map(|_| ()), None, "stream must be fused");
}

#[test]
fn fragment_context_sets_the_content_model() {
    let config = Config::default().with_context("script");
    let signals: Vec<_> = parse_html(config, SliceSource::new(b"a < b"))
        .map(|item| item.unwrap())
        .collect();
    assert_eq!(brief(&signals), vec!["\"a < b\""]);
}

#[test]
fn foreign_content_case_correction_and_breakout() {
    let signals = signals_of("<svg><lineargradient x1=\"0\"></lineargradient><p>out</svg>");
    let names: Vec<String> = signals
        .iter()
        .filter_map(|(signal, _)| match signal {
            Signal::StartElement { name, .. } => Some(name.local.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["svg", "linearGradient", "p"]);
}

#[test]
fn svg_namespace_is_attached() {
    let signals = signals_of("<svg><circle/></svg>");
    let circle = signals
        .iter()
        .find_map(|(signal, _)| match signal {
            Signal::StartElement { name, .. } if name.local == "circle" => {
                Some(name.namespace.clone())
            }
            _ => None,
        })
        .expect("circle element");
    assert_eq!(circle.as_deref(), Some(markup::SVG_NAMESPACE));
}

#[test]
fn cdata_in_foreign_content_is_text() {
    let signals = signals_of("<svg><![CDATA[a < b]]></svg>");
    assert_eq!(brief(&signals), vec!["<svg>", "\"a < b\"", "</>"]);
}

#[test]
fn plaintext_never_ends() {
    let signals = signals_of("<plaintext></plaintext><p>");
    assert_eq!(
        brief(&signals),
        vec!["<plaintext>", "\"</plaintext><p>\"", "</>"]
    );
}

#[test]
fn character_references_in_text_and_attributes() {
    let signals = signals_of("<a href=\"?x=1&amp;y=2\">&copy; &#169;</a>");
    let (start, _) = &signals[0];
    match start {
        Signal::StartElement { attributes, .. } => {
            assert_eq!(attributes[0].1, "?x=1&y=2");
        }
        other => panic!("expected start element, got {other:?}"),
    }
    let text = signals
        .iter()
        .find_map(|(signal, _)| signal.text())
        .unwrap();
    assert_eq!(text, "\u{A9} \u{A9}");
}

#[test]
fn well_formed_document_reports_no_errors() {
    let html = "<!DOCTYPE html><html><head><title>t</title></head>\
                <body><p>a</p><ul><li>x</li></ul></body></html>";
    let (_, errors) = collect_errors(html);
    assert!(errors.is_empty(), "unexpected reports: {errors:?}");
}

#[test]
fn counters_observe_progress() {
    let mut stream = parse_html(
        Config::default(),
        SliceSource::new(b"<div><p>x</p></div>"),
    );
    while let Some(item) = stream.next() {
        item.unwrap();
    }
    let counters = stream.counters();
    assert!(counters.tokens_processed >= 5);
    assert!(counters.max_open_elements_depth >= 3);
}
