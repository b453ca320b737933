//! Foreign-content (SVG and MathML) adjustments.
//!
//! Case-correcting tables for SVG tag and attribute names, the MathML
//! `definitionURL` fix-up, the xlink/xml/xmlns attribute namespacing, and the
//! breakout tag set that forces a return to HTML insertion.

use crate::signal::{Name, XLINK_NAMESPACE, XMLNS_NAMESPACE, XML_NAMESPACE};

/// Start tags that break out of foreign content back into HTML.
pub(crate) fn is_breakout_tag(name: &str, attributes: &[(String, String)]) -> bool {
    match name {
        "b" | "big" | "blockquote" | "body" | "br" | "center" | "code" | "dd" | "div" | "dl"
        | "dt" | "em" | "embed" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "head" | "hr"
        | "i" | "img" | "li" | "listing" | "menu" | "meta" | "nobr" | "ol" | "p" | "pre"
        | "ruby" | "s" | "small" | "span" | "strong" | "strike" | "sub" | "sup" | "table"
        | "tt" | "u" | "ul" | "var" => true,
        "font" => attributes
            .iter()
            .any(|(name, _)| matches!(name.as_str(), "color" | "face" | "size")),
        _ => false,
    }
}

/// Restore the canonical mixed-case SVG tag name.
pub(crate) fn adjust_svg_tag_name(name: &str) -> &str {
    for &(lower, canonical) in SVG_TAG_NAMES {
        if name == lower {
            return canonical;
        }
    }
    name
}

/// Adjust attribute names for a foreign element: SVG camelCase restoration,
/// MathML `definitionURL`, and xlink/xml/xmlns namespacing.
pub(crate) fn adjust_foreign_attributes(
    svg: bool,
    attributes: Vec<(String, String)>,
) -> Vec<(Name, String)> {
    attributes
        .into_iter()
        .map(|(name, value)| (adjust_attribute_name(svg, name), value))
        .collect()
}

fn adjust_attribute_name(svg: bool, name: String) -> Name {
    if let Some(local) = name.strip_prefix("xlink:")
        && matches!(
            local,
            "actuate" | "arcrole" | "href" | "role" | "show" | "title" | "type"
        )
    {
        return Name::in_namespace(XLINK_NAMESPACE, local);
    }
    if let Some(local) = name.strip_prefix("xml:")
        && matches!(local, "lang" | "space")
    {
        return Name::in_namespace(XML_NAMESPACE, local);
    }
    if name == "xmlns" {
        return Name::in_namespace(XMLNS_NAMESPACE, "xmlns");
    }
    if name == "xmlns:xlink" {
        return Name::in_namespace(XMLNS_NAMESPACE, "xlink");
    }
    if !svg {
        if name == "definitionurl" {
            return Name::local("definitionURL");
        }
        return Name::local(name);
    }
    for &(lower, canonical) in SVG_ATTRIBUTE_NAMES {
        if name == lower {
            return Name::local(canonical);
        }
    }
    Name::local(name)
}

const SVG_TAG_NAMES: &[(&str, &str)] = &[
    ("altglyph", "altGlyph"),
    ("altglyphdef", "altGlyphDef"),
    ("altglyphitem", "altGlyphItem"),
    ("animatecolor", "animateColor"),
    ("animatemotion", "animateMotion"),
    ("animatetransform", "animateTransform"),
    ("clippath", "clipPath"),
    ("feblend", "feBlend"),
    ("fecolormatrix", "feColorMatrix"),
    ("fecomponenttransfer", "feComponentTransfer"),
    ("fecomposite", "feComposite"),
    ("feconvolvematrix", "feConvolveMatrix"),
    ("fediffuselighting", "feDiffuseLighting"),
    ("fedisplacementmap", "feDisplacementMap"),
    ("fedistantlight", "feDistantLight"),
    ("fedropshadow", "feDropShadow"),
    ("feflood", "feFlood"),
    ("fefunca", "feFuncA"),
    ("fefuncb", "feFuncB"),
    ("fefuncg", "feFuncG"),
    ("fefuncr", "feFuncR"),
    ("fegaussianblur", "feGaussianBlur"),
    ("feimage", "feImage"),
    ("femerge", "feMerge"),
    ("femergenode", "feMergeNode"),
    ("femorphology", "feMorphology"),
    ("feoffset", "feOffset"),
    ("fepointlight", "fePointLight"),
    ("fespecularlighting", "feSpecularLighting"),
    ("fespotlight", "feSpotLight"),
    ("fetile", "feTile"),
    ("feturbulence", "feTurbulence"),
    ("foreignobject", "foreignObject"),
    ("glyphref", "glyphRef"),
    ("lineargradient", "linearGradient"),
    ("radialgradient", "radialGradient"),
    ("textpath", "textPath"),
];

const SVG_ATTRIBUTE_NAMES: &[(&str, &str)] = &[
    ("attributename", "attributeName"),
    ("attributetype", "attributeType"),
    ("basefrequency", "baseFrequency"),
    ("baseprofile", "baseProfile"),
    ("calcmode", "calcMode"),
    ("clippathunits", "clipPathUnits"),
    ("diffuseconstant", "diffuseConstant"),
    ("edgemode", "edgeMode"),
    ("filterunits", "filterUnits"),
    ("glyphref", "glyphRef"),
    ("gradienttransform", "gradientTransform"),
    ("gradientunits", "gradientUnits"),
    ("kernelmatrix", "kernelMatrix"),
    ("kernelunitlength", "kernelUnitLength"),
    ("keypoints", "keyPoints"),
    ("keysplines", "keySplines"),
    ("keytimes", "keyTimes"),
    ("lengthadjust", "lengthAdjust"),
    ("limitingconeangle", "limitingConeAngle"),
    ("markerheight", "markerHeight"),
    ("markerunits", "markerUnits"),
    ("markerwidth", "markerWidth"),
    ("maskcontentunits", "maskContentUnits"),
    ("maskunits", "maskUnits"),
    ("numoctaves", "numOctaves"),
    ("pathlength", "pathLength"),
    ("patterncontentunits", "patternContentUnits"),
    ("patterntransform", "patternTransform"),
    ("patternunits", "patternUnits"),
    ("pointsatx", "pointsAtX"),
    ("pointsaty", "pointsAtY"),
    ("pointsatz", "pointsAtZ"),
    ("preservealpha", "preserveAlpha"),
    ("preserveaspectratio", "preserveAspectRatio"),
    ("primitiveunits", "primitiveUnits"),
    ("refx", "refX"),
    ("refy", "refY"),
    ("repeatcount", "repeatCount"),
    ("repeatdur", "repeatDur"),
    ("requiredextensions", "requiredExtensions"),
    ("requiredfeatures", "requiredFeatures"),
    ("specularconstant", "specularConstant"),
    ("specularexponent", "specularExponent"),
    ("spreadmethod", "spreadMethod"),
    ("startoffset", "startOffset"),
    ("stddeviation", "stdDeviation"),
    ("stitchtiles", "stitchTiles"),
    ("surfacescale", "surfaceScale"),
    ("systemlanguage", "systemLanguage"),
    ("tablevalues", "tableValues"),
    ("targetx", "targetX"),
    ("targety", "targetY"),
    ("textlength", "textLength"),
    ("viewbox", "viewBox"),
    ("viewtarget", "viewTarget"),
    ("xchannelselector", "xChannelSelector"),
    ("ychannelselector", "yChannelSelector"),
    ("zoomandpan", "zoomAndPan"),
];

#[cfg(test)]
mod tests {
    use super::{adjust_foreign_attributes, adjust_svg_tag_name, is_breakout_tag};
    use crate::signal::XLINK_NAMESPACE;

    #[test]
    fn svg_tag_names_are_case_corrected() {
        assert_eq!(adjust_svg_tag_name("foreignobject"), "foreignObject");
        assert_eq!(adjust_svg_tag_name("lineargradient"), "linearGradient");
        assert_eq!(adjust_svg_tag_name("circle"), "circle");
    }

    #[test]
    fn svg_attributes_are_case_corrected() {
        let adjusted = adjust_foreign_attributes(
            true,
            vec![("viewbox".to_string(), "0 0 1 1".to_string())],
        );
        assert_eq!(adjusted[0].0.local, "viewBox");
        assert_eq!(adjusted[0].0.namespace, None);
    }

    #[test]
    fn xlink_attributes_gain_a_namespace() {
        let adjusted =
            adjust_foreign_attributes(true, vec![("xlink:href".to_string(), "#x".to_string())]);
        assert_eq!(adjusted[0].0.namespace.as_deref(), Some(XLINK_NAMESPACE));
        assert_eq!(adjusted[0].0.local, "href");
    }

    #[test]
    fn mathml_definitionurl_is_fixed_up() {
        let adjusted =
            adjust_foreign_attributes(false, vec![("definitionurl".to_string(), "x".to_string())]);
        assert_eq!(adjusted[0].0.local, "definitionURL");
    }

    #[test]
    fn font_breaks_out_only_with_styling_attributes() {
        assert!(is_breakout_tag("p", &[]));
        assert!(!is_breakout_tag("font", &[]));
        assert!(is_breakout_tag(
            "font",
            &[("color".to_string(), "red".to_string())]
        ));
        assert!(!is_breakout_tag("circle", &[]));
    }
}
