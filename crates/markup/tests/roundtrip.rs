//! Round-trip properties: parse → write → parse reaches a fixed point after
//! one normalization, modulo locations and text-chunk grouping.

use markup::{
    parse_html, parse_xml, write_html, write_xml, Config, Signal, SliceSource, WriteConfig,
};

/// Normalize a signal for comparison: drop locations (done by the caller)
/// and collapse text chunk grouping.
fn normalize(signals: Vec<Signal>) -> Vec<Signal> {
    let mut out: Vec<Signal> = Vec::with_capacity(signals.len());
    for signal in signals {
        match (out.last_mut(), signal) {
            (Some(Signal::Text(chunks)), Signal::Text(more)) => {
                chunks.extend(more);
            }
            (_, signal) => out.push(signal),
        }
    }
    out.into_iter()
        .map(|signal| match signal {
            Signal::Text(chunks) => Signal::Text(vec![chunks.concat()]),
            other => other,
        })
        .collect()
}

fn html_signals(bytes: &[u8]) -> Vec<Signal> {
    parse_html(Config::default(), SliceSource::new(bytes))
        .map(|item| item.unwrap().0)
        .collect()
}

fn xml_signals(bytes: &[u8]) -> Vec<Signal> {
    parse_xml(Config::default(), SliceSource::new(bytes))
        .map(|item| item.unwrap().0)
        .collect()
}

#[test]
fn html_round_trip_is_idempotent() {
    let inputs: [&str; 6] = [
        "<!DOCTYPE html><p class=\"x\">a &amp; b</p>",
        "<ul><li>one<li>two</ul>",
        "<table>text</table>",
        "<script>if (a<b) c</script>",
        "<p><em>Markup.ml<p>rocks!",
        "<div><br><img src=\"x\"></div>",
    ];
    for input in inputs {
        let first = normalize(html_signals(input.as_bytes()));
        let written: Vec<u8> = write_html(first.clone()).flatten().collect();
        let second = normalize(html_signals(&written));
        assert_eq!(first, second, "round trip diverged for {input:?}");
    }
}

#[test]
fn xml_round_trip_is_idempotent() {
    let inputs: [&str; 4] = [
        "<?xml version=\"1.0\"?><r><a x=\"1\"/>text</r>",
        "<r xmlns=\"urn:a\" xmlns:b=\"urn:b\"><b:x>1 &lt; 2</b:x></r>",
        "<r><![CDATA[<literal>]]></r>",
        "<r><!-- note --><?pi body?></r>",
    ];
    for input in inputs {
        let first = normalize(xml_signals(input.as_bytes()));
        let written: Vec<u8> = write_xml(WriteConfig::default(), first.clone())
            .flatten()
            .collect();
        let second = normalize(xml_signals(&written));
        assert_eq!(first, second, "round trip diverged for {input:?}");
    }
}

#[test]
fn xml_collapse_empty_round_trips_to_the_same_signals() {
    let input = b"<r><empty></empty><full>x</full></r>";
    let first = normalize(xml_signals(input));
    let written: Vec<u8> = write_xml(
        WriteConfig {
            collapse_empty: true,
        },
        first.clone(),
    )
    .flatten()
    .collect();
    assert!(String::from_utf8_lossy(&written).contains("<empty/>"));
    let second = normalize(xml_signals(&written));
    assert_eq!(first, second);
}

#[test]
fn written_html_is_parseable_text_escaped() {
    let signals = vec![
        Signal::StartElement {
            name: markup::Name::in_namespace(markup::HTML_NAMESPACE, "p"),
            attributes: vec![],
        },
        Signal::Text(vec!["a < b & c > d".to_string()]),
        Signal::EndElement,
    ];
    let written: Vec<u8> = write_html(signals.clone()).flatten().collect();
    assert_eq!(
        String::from_utf8(written.clone()).unwrap(),
        "<p>a &lt; b &amp; c &gt; d</p>"
    );
    let reparsed = normalize(html_signals(&written));
    let text = reparsed
        .iter()
        .find_map(|signal| signal.text())
        .unwrap();
    assert_eq!(text, "a < b & c > d");
}
