//! End-to-end XML parsing: namespaces, recovery, and the relaxed
//! unclosed-element behavior.

use markup::{
    parse_xml, Config, Location, Name, ParseError, Signal, SliceSource, XMLNS_NAMESPACE,
};
use std::sync::{Arc, Mutex};

fn signals_of(xml: &str) -> Vec<(Signal, Location)> {
    parse_xml(Config::default(), SliceSource::new(xml.as_bytes()))
        .map(|item| item.expect("in-memory parse cannot fail"))
        .collect()
}

fn collect_errors(xml: &str) -> (Vec<(Signal, Location)>, Vec<(Location, ParseError)>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let config = Config::default().with_report(Box::new(move |loc, error| {
        sink.lock().unwrap().push((loc, error.clone()));
        Ok(())
    }));
    let signals = parse_xml(config, SliceSource::new(xml.as_bytes()))
        .map(|item| item.expect("in-memory parse cannot fail"))
        .collect();
    let errors = errors.lock().unwrap().clone();
    (signals, errors)
}

#[test]
fn cdata_section_is_plain_text_without_errors() {
    let (signals, errors) = collect_errors("<![CDATA[<foo>]]>");
    assert_eq!(signals.len(), 1);
    match &signals[0].0 {
        Signal::Text(chunks) => assert_eq!(chunks.concat(), "<foo>"),
        other => panic!("expected text, got {other:?}"),
    }
    assert!(errors.is_empty(), "unexpected reports: {errors:?}");
}

#[test]
fn xml_declaration_surfaces_as_a_signal() {
    let signals = signals_of("<?xml version=\"1.0\" encoding=\"UTF-8\"?><a/>");
    match &signals[0].0 {
        Signal::Xml(decl) => {
            assert_eq!(decl.version, "1.0");
            assert_eq!(decl.encoding.as_deref(), Some("UTF-8"));
        }
        other => panic!("expected xml declaration, got {other:?}"),
    }
}

#[test]
fn default_and_prefixed_namespaces_resolve() {
    let signals =
        signals_of("<r xmlns=\"urn:a\" xmlns:b=\"urn:b\"><b:x/><plain/></r>");
    let names: Vec<Name> = signals
        .iter()
        .filter_map(|(signal, _)| match signal {
            Signal::StartElement { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(names[0], Name::in_namespace("urn:a", "r"));
    assert_eq!(names[1], Name::in_namespace("urn:b", "x"));
    assert_eq!(names[2], Name::in_namespace("urn:a", "plain"));
}

#[test]
fn xmlns_attributes_carry_the_xmlns_namespace() {
    let signals = signals_of("<r xmlns:p=\"urn:p\"/>");
    match &signals[0].0 {
        Signal::StartElement { attributes, .. } => {
            assert_eq!(
                attributes[0].0,
                Name::in_namespace(XMLNS_NAMESPACE, "p")
            );
        }
        other => panic!("expected start element, got {other:?}"),
    }
}

#[test]
fn unprefixed_attributes_do_not_take_the_default_namespace() {
    let signals = signals_of("<r xmlns=\"urn:a\" id=\"1\"/>");
    match &signals[0].0 {
        Signal::StartElement { attributes, .. } => {
            let id = attributes
                .iter()
                .find(|(name, _)| name.local == "id")
                .unwrap();
            assert_eq!(id.0.namespace, None);
        }
        other => panic!("expected start element, got {other:?}"),
    }
}

#[test]
fn undeclared_prefix_is_reported_and_degrades() {
    let (signals, errors) = collect_errors("<x:y/>");
    assert!(errors
        .iter()
        .any(|(_, error)| matches!(error, ParseError::BadNamespace { prefix } if prefix == "x")));
    match &signals[0].0 {
        Signal::StartElement { name, .. } => {
            assert_eq!(name.namespace, None);
            assert_eq!(name.local, "y");
        }
        other => panic!("expected start element, got {other:?}"),
    }
}

#[test]
fn namespace_resolver_fallback_is_consulted() {
    let config = Config::default().with_namespace(Box::new(|prefix: &str| {
        (prefix == "ext").then(|| "urn:external".to_string())
    }));
    let signals: Vec<_> = parse_xml(config, SliceSource::new(b"<ext:e/>"))
        .map(|item| item.unwrap())
        .collect();
    match &signals[0].0 {
        Signal::StartElement { name, .. } => {
            assert_eq!(name.namespace.as_deref(), Some("urn:external"));
        }
        other => panic!("expected start element, got {other:?}"),
    }
}

#[test]
fn mismatched_end_tag_synthesizes_intermediate_ends() {
    let (signals, errors) = collect_errors("<a><b></a>");
    let brief: Vec<&str> = signals
        .iter()
        .map(|(signal, _)| match signal {
            Signal::StartElement { .. } => "start",
            Signal::EndElement => "end",
            _ => "other",
        })
        .collect();
    assert_eq!(brief, vec!["start", "start", "end", "end"]);
    assert!(errors
        .iter()
        .any(|(_, error)| matches!(error, ParseError::UnmatchedEndTag { name } if name == "a")));
}

#[test]
fn stray_end_tag_is_ignored() {
    let (signals, errors) = collect_errors("<a></b></a>");
    let ends = signals
        .iter()
        .filter(|(signal, _)| matches!(signal, Signal::EndElement))
        .count();
    assert_eq!(ends, 1);
    assert!(errors
        .iter()
        .any(|(_, error)| matches!(error, ParseError::UnmatchedEndTag { name } if name == "b")));
}

#[test]
fn unclosed_elements_get_ends_at_eof() {
    let (signals, errors) = collect_errors("<a><b>text");
    let (last, last_loc) = signals.last().unwrap();
    assert!(matches!(last, Signal::EndElement));
    assert_eq!(*last_loc, Location { line: 1, column: 11 });
    let ends = signals
        .iter()
        .filter(|(signal, _)| matches!(signal, Signal::EndElement))
        .count();
    assert_eq!(ends, 2);
    assert_eq!(
        errors
            .iter()
            .filter(|(_, error)| matches!(error, ParseError::UnmatchedStartTag { .. }))
            .count(),
        2
    );
}

#[test]
fn entity_resolver_supplies_replacement_text() {
    let config = Config::default().with_entity(Box::new(|name: &str| {
        (name == "version").then(|| "1.2.3".to_string())
    }));
    let signals: Vec<_> = parse_xml(config, SliceSource::new(b"<v>&version;</v>"))
        .map(|item| item.unwrap())
        .collect();
    let text = signals
        .iter()
        .find_map(|(signal, _)| signal.text())
        .unwrap();
    assert_eq!(text, "1.2.3");
}

#[test]
fn doctype_and_processing_instructions_surface() {
    let signals = signals_of("<!DOCTYPE note><?style href=\"x\"?><note/>");
    assert!(matches!(&signals[0].0, Signal::Doctype(d) if d.name.as_deref() == Some("note")));
    assert!(matches!(
        &signals[1].0,
        Signal::ProcessingInstruction { target, .. } if target == "style"
    ));
}

#[test]
fn xml_declaration_encoding_drives_decoding() {
    let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-15\"?><p>caf\xE9</p>";
    let signals: Vec<_> = parse_xml(Config::default(), SliceSource::new(bytes))
        .map(|item| item.unwrap())
        .collect();
    let text = signals
        .iter()
        .find_map(|(signal, _)| signal.text())
        .unwrap();
    assert_eq!(text, "caf\u{E9}");
}
