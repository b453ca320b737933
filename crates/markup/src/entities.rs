//! Character-reference lookup.
//!
//! Contract:
//! - Named references resolve by longest match. Entries marked `legacy` also
//!   match without a terminating semicolon (with a parse error at the call
//!   site); all other entries require the semicolon.
//! - Numeric references are clamped per the HTML5 override table: C1 control
//!   codes map through `C1_OVERRIDES`, NUL/surrogates/out-of-range become
//!   U+FFFD, noncharacters and controls pass through flagged as errors.
//! - The full WHATWG table (~2200 entries) is an external data asset; the
//!   built-in table carries the complete legacy subset plus the names that
//!   occur in practice, behind the same lookup contract.
//!
//! The table is process-wide constant data, indexed once on first use.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Longest name in the full WHATWG table; bounds look-ahead.
pub(crate) const MAX_NAME_LEN: usize = 32;

/// Replacement for an entity name: one or two scalars.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Replacement {
    pub(crate) first: char,
    pub(crate) second: Option<char>,
}

/// Exact lookup for a semicolon-terminated name.
pub(crate) fn named(name: &str) -> Option<Replacement> {
    let &(_, first, second, _) = index().get(name).map(|&i| &NAMED[i])?;
    Some(replacement(first, second))
}

/// Longest prefix of `candidate` that is a legacy (semicolon-optional) name.
/// Returns the matched length and its replacement.
pub(crate) fn longest_legacy_prefix(candidate: &str) -> Option<(usize, Replacement)> {
    let max = candidate.len().min(MAX_NAME_LEN);
    for len in (2..=max).rev() {
        if !candidate.is_char_boundary(len) {
            continue;
        }
        if let Some(&i) = index().get(&candidate[..len]) {
            let (_, first, second, legacy) = NAMED[i];
            if legacy {
                return Some((len, replacement(first, second)));
            }
        }
    }
    None
}

/// Resolve a numeric reference code to a scalar, flagging the conditions the
/// tokenizer reports as `BadCharacterReference`.
pub(crate) fn resolve_numeric(code: u32) -> (char, bool) {
    if code == 0 {
        return ('\u{FFFD}', true);
    }
    if code > 0x10FFFF || (0xD800..=0xDFFF).contains(&code) {
        return ('\u{FFFD}', true);
    }
    if let Some(&(from, to)) = C1_OVERRIDES.iter().find(|&&(from, _)| from == code) {
        return (to, true);
    }
    let ch = char::from_u32(code).unwrap_or('\u{FFFD}');
    let noncharacter =
        (0xFDD0..=0xFDEF).contains(&code) || (code & 0xFFFE) == 0xFFFE;
    let control =
        code < 0x20 && !matches!(code, 0x09 | 0x0A | 0x0C) || (0x7F..=0x9F).contains(&code);
    (ch, noncharacter || control)
}

fn replacement(first: char, second: char) -> Replacement {
    Replacement {
        first,
        second: (second != '\0').then_some(second),
    }
}

fn index() -> &'static HashMap<&'static str, usize> {
    static INDEX: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
    INDEX.get_or_init(|| {
        let mut map = HashMap::with_capacity(NAMED.len());
        for (i, &(name, _, _, _)) in NAMED.iter().enumerate() {
            let previous = map.insert(name, i);
            debug_assert!(previous.is_none(), "duplicate entity name {name:?}");
        }
        map
    })
}

/// Windows-1252 mappings applied to numeric references in the C1 range.
const C1_OVERRIDES: &[(u32, char)] = &[
    (0x80, '\u{20AC}'),
    (0x82, '\u{201A}'),
    (0x83, '\u{0192}'),
    (0x84, '\u{201E}'),
    (0x85, '\u{2026}'),
    (0x86, '\u{2020}'),
    (0x87, '\u{2021}'),
    (0x88, '\u{02C6}'),
    (0x89, '\u{2030}'),
    (0x8A, '\u{0160}'),
    (0x8B, '\u{2039}'),
    (0x8C, '\u{0152}'),
    (0x8E, '\u{017D}'),
    (0x91, '\u{2018}'),
    (0x92, '\u{2019}'),
    (0x93, '\u{201C}'),
    (0x94, '\u{201D}'),
    (0x95, '\u{2022}'),
    (0x96, '\u{2013}'),
    (0x97, '\u{2014}'),
    (0x98, '\u{02DC}'),
    (0x99, '\u{2122}'),
    (0x9A, '\u{0161}'),
    (0x9B, '\u{203A}'),
    (0x9C, '\u{0153}'),
    (0x9E, '\u{017E}'),
    (0x9F, '\u{0178}'),
];

/// (name, first scalar, second scalar or NUL, legacy).
///
/// The legacy entries are exactly the names HTML tolerates without a
/// semicolon.
const NAMED: &[(&str, char, char, bool)] = &[
    ("AElig", '\u{C6}', '\0', true),
    ("AMP", '&', '\0', true),
    ("Aacute", '\u{C1}', '\0', true),
    ("Acirc", '\u{C2}', '\0', true),
    ("Agrave", '\u{C0}', '\0', true),
    ("Alpha", '\u{391}', '\0', false),
    ("Aring", '\u{C5}', '\0', true),
    ("Atilde", '\u{C3}', '\0', true),
    ("Auml", '\u{C4}', '\0', true),
    ("Beta", '\u{392}', '\0', false),
    ("COPY", '\u{A9}', '\0', true),
    ("Ccedil", '\u{C7}', '\0', true),
    ("Dagger", '\u{2021}', '\0', false),
    ("Delta", '\u{394}', '\0', false),
    ("ETH", '\u{D0}', '\0', true),
    ("Eacute", '\u{C9}', '\0', true),
    ("Ecirc", '\u{CA}', '\0', true),
    ("Egrave", '\u{C8}', '\0', true),
    ("Euml", '\u{CB}', '\0', true),
    ("GT", '>', '\0', true),
    ("Gamma", '\u{393}', '\0', false),
    ("Iacute", '\u{CD}', '\0', true),
    ("Icirc", '\u{CE}', '\0', true),
    ("Igrave", '\u{CC}', '\0', true),
    ("Iuml", '\u{CF}', '\0', true),
    ("LT", '<', '\0', true),
    ("Lambda", '\u{39B}', '\0', false),
    ("NotEqualTilde", '\u{2242}', '\u{338}', false),
    ("Ntilde", '\u{D1}', '\0', true),
    ("OElig", '\u{152}', '\0', false),
    ("Oacute", '\u{D3}', '\0', true),
    ("Ocirc", '\u{D4}', '\0', true),
    ("Ograve", '\u{D2}', '\0', true),
    ("Omega", '\u{3A9}', '\0', false),
    ("Oslash", '\u{D8}', '\0', true),
    ("Otilde", '\u{D5}', '\0', true),
    ("Ouml", '\u{D6}', '\0', true),
    ("Phi", '\u{3A6}', '\0', false),
    ("Pi", '\u{3A0}', '\0', false),
    ("Prime", '\u{2033}', '\0', false),
    ("Psi", '\u{3A8}', '\0', false),
    ("QUOT", '"', '\0', true),
    ("REG", '\u{AE}', '\0', true),
    ("Scaron", '\u{160}', '\0', false),
    ("Sigma", '\u{3A3}', '\0', false),
    ("THORN", '\u{DE}', '\0', true),
    ("ThickSpace", '\u{205F}', '\u{200A}', false),
    ("Theta", '\u{398}', '\0', false),
    ("Uacute", '\u{DA}', '\0', true),
    ("Ucirc", '\u{DB}', '\0', true),
    ("Ugrave", '\u{D9}', '\0', true),
    ("Uuml", '\u{DC}', '\0', true),
    ("Yacute", '\u{DD}', '\0', true),
    ("Yuml", '\u{178}', '\0', false),
    ("aacute", '\u{E1}', '\0', true),
    ("acirc", '\u{E2}', '\0', true),
    ("acute", '\u{B4}', '\0', true),
    ("aelig", '\u{E6}', '\0', true),
    ("agrave", '\u{E0}', '\0', true),
    ("alpha", '\u{3B1}', '\0', false),
    ("amp", '&', '\0', true),
    ("and", '\u{2227}', '\0', false),
    ("ang", '\u{2220}', '\0', false),
    ("apos", '\'', '\0', false),
    ("aring", '\u{E5}', '\0', true),
    ("asymp", '\u{2248}', '\0', false),
    ("atilde", '\u{E3}', '\0', true),
    ("auml", '\u{E4}', '\0', true),
    ("bdquo", '\u{201E}', '\0', false),
    ("beta", '\u{3B2}', '\0', false),
    ("brvbar", '\u{A6}', '\0', true),
    ("bull", '\u{2022}', '\0', false),
    ("cap", '\u{2229}', '\0', false),
    ("ccedil", '\u{E7}', '\0', true),
    ("cedil", '\u{B8}', '\0', true),
    ("cent", '\u{A2}', '\0', true),
    ("chi", '\u{3C7}', '\0', false),
    ("circ", '\u{2C6}', '\0', false),
    ("clubs", '\u{2663}', '\0', false),
    ("cong", '\u{2245}', '\0', false),
    ("copy", '\u{A9}', '\0', true),
    ("crarr", '\u{21B5}', '\0', false),
    ("cup", '\u{222A}', '\0', false),
    ("curren", '\u{A4}', '\0', true),
    ("dArr", '\u{21D3}', '\0', false),
    ("dagger", '\u{2020}', '\0', false),
    ("darr", '\u{2193}', '\0', false),
    ("deg", '\u{B0}', '\0', true),
    ("delta", '\u{3B4}', '\0', false),
    ("diams", '\u{2666}', '\0', false),
    ("divide", '\u{F7}', '\0', true),
    ("eacute", '\u{E9}', '\0', true),
    ("ecirc", '\u{EA}', '\0', true),
    ("egrave", '\u{E8}', '\0', true),
    ("empty", '\u{2205}', '\0', false),
    ("emsp", '\u{2003}', '\0', false),
    ("ensp", '\u{2002}', '\0', false),
    ("epsilon", '\u{3B5}', '\0', false),
    ("equiv", '\u{2261}', '\0', false),
    ("eta", '\u{3B7}', '\0', false),
    ("eth", '\u{F0}', '\0', true),
    ("euml", '\u{EB}', '\0', true),
    ("euro", '\u{20AC}', '\0', false),
    ("exist", '\u{2203}', '\0', false),
    ("fjlig", 'f', 'j', false),
    ("fnof", '\u{192}', '\0', false),
    ("forall", '\u{2200}', '\0', false),
    ("frac12", '\u{BD}', '\0', true),
    ("frac14", '\u{BC}', '\0', true),
    ("frac34", '\u{BE}', '\0', true),
    ("frasl", '\u{2044}', '\0', false),
    ("gamma", '\u{3B3}', '\0', false),
    ("ge", '\u{2265}', '\0', false),
    ("gt", '>', '\0', true),
    ("hArr", '\u{21D4}', '\0', false),
    ("harr", '\u{2194}', '\0', false),
    ("hearts", '\u{2665}', '\0', false),
    ("hellip", '\u{2026}', '\0', false),
    ("iacute", '\u{ED}', '\0', true),
    ("icirc", '\u{EE}', '\0', true),
    ("iexcl", '\u{A1}', '\0', true),
    ("igrave", '\u{EC}', '\0', true),
    ("infin", '\u{221E}', '\0', false),
    ("int", '\u{222B}', '\0', false),
    ("iota", '\u{3B9}', '\0', false),
    ("iquest", '\u{BF}', '\0', true),
    ("isin", '\u{2208}', '\0', false),
    ("iuml", '\u{EF}', '\0', true),
    ("kappa", '\u{3BA}', '\0', false),
    ("lArr", '\u{21D0}', '\0', false),
    ("lambda", '\u{3BB}', '\0', false),
    ("lang", '\u{27E8}', '\0', false),
    ("laquo", '\u{AB}', '\0', true),
    ("larr", '\u{2190}', '\0', false),
    ("lceil", '\u{2308}', '\0', false),
    ("ldquo", '\u{201C}', '\0', false),
    ("le", '\u{2264}', '\0', false),
    ("lfloor", '\u{230A}', '\0', false),
    ("loz", '\u{25CA}', '\0', false),
    ("lrm", '\u{200E}', '\0', false),
    ("lsaquo", '\u{2039}', '\0', false),
    ("lsquo", '\u{2018}', '\0', false),
    ("lt", '<', '\0', true),
    ("lowast", '\u{2217}', '\0', false),
    ("macr", '\u{AF}', '\0', true),
    ("mdash", '\u{2014}', '\0', false),
    ("micro", '\u{B5}', '\0', true),
    ("middot", '\u{B7}', '\0', true),
    ("minus", '\u{2212}', '\0', false),
    ("mu", '\u{3BC}', '\0', false),
    ("nabla", '\u{2207}', '\0', false),
    ("nbsp", '\u{A0}', '\0', true),
    ("ndash", '\u{2013}', '\0', false),
    ("ne", '\u{2260}', '\0', false),
    ("ni", '\u{220B}', '\0', false),
    ("not", '\u{AC}', '\0', true),
    ("notin", '\u{2209}', '\0', false),
    ("nsub", '\u{2284}', '\0', false),
    ("ntilde", '\u{F1}', '\0', true),
    ("nu", '\u{3BD}', '\0', false),
    ("oacute", '\u{F3}', '\0', true),
    ("ocirc", '\u{F4}', '\0', true),
    ("oelig", '\u{153}', '\0', false),
    ("ograve", '\u{F2}', '\0', true),
    ("oline", '\u{203E}', '\0', false),
    ("omega", '\u{3C9}', '\0', false),
    ("omicron", '\u{3BF}', '\0', false),
    ("oplus", '\u{2295}', '\0', false),
    ("or", '\u{2228}', '\0', false),
    ("ordf", '\u{AA}', '\0', true),
    ("ordm", '\u{BA}', '\0', true),
    ("oslash", '\u{F8}', '\0', true),
    ("otilde", '\u{F5}', '\0', true),
    ("otimes", '\u{2297}', '\0', false),
    ("ouml", '\u{F6}', '\0', true),
    ("para", '\u{B6}', '\0', true),
    ("part", '\u{2202}', '\0', false),
    ("permil", '\u{2030}', '\0', false),
    ("perp", '\u{22A5}', '\0', false),
    ("phi", '\u{3C6}', '\0', false),
    ("pi", '\u{3C0}', '\0', false),
    ("plusmn", '\u{B1}', '\0', true),
    ("pound", '\u{A3}', '\0', true),
    ("prime", '\u{2032}', '\0', false),
    ("prod", '\u{220F}', '\0', false),
    ("prop", '\u{221D}', '\0', false),
    ("psi", '\u{3C8}', '\0', false),
    ("quot", '"', '\0', true),
    ("rArr", '\u{21D2}', '\0', false),
    ("radic", '\u{221A}', '\0', false),
    ("rang", '\u{27E9}', '\0', false),
    ("raquo", '\u{BB}', '\0', true),
    ("rarr", '\u{2192}', '\0', false),
    ("rceil", '\u{2309}', '\0', false),
    ("rdquo", '\u{201D}', '\0', false),
    ("reg", '\u{AE}', '\0', true),
    ("rfloor", '\u{230B}', '\0', false),
    ("rho", '\u{3C1}', '\0', false),
    ("rlm", '\u{200F}', '\0', false),
    ("rsaquo", '\u{203A}', '\0', false),
    ("rsquo", '\u{2019}', '\0', false),
    ("sbquo", '\u{201A}', '\0', false),
    ("scaron", '\u{161}', '\0', false),
    ("sdot", '\u{22C5}', '\0', false),
    ("sect", '\u{A7}', '\0', true),
    ("shy", '\u{AD}', '\0', true),
    ("sigma", '\u{3C3}', '\0', false),
    ("sigmaf", '\u{3C2}', '\0', false),
    ("sim", '\u{223C}', '\0', false),
    ("spades", '\u{2660}', '\0', false),
    ("sub", '\u{2282}', '\0', false),
    ("sube", '\u{2286}', '\0', false),
    ("sum", '\u{2211}', '\0', false),
    ("sup", '\u{2283}', '\0', false),
    ("sup1", '\u{B9}', '\0', true),
    ("sup2", '\u{B2}', '\0', true),
    ("sup3", '\u{B3}', '\0', true),
    ("supe", '\u{2287}', '\0', false),
    ("szlig", '\u{DF}', '\0', true),
    ("tau", '\u{3C4}', '\0', false),
    ("there4", '\u{2234}', '\0', false),
    ("theta", '\u{3B8}', '\0', false),
    ("thinsp", '\u{2009}', '\0', false),
    ("thorn", '\u{FE}', '\0', true),
    ("tilde", '\u{2DC}', '\0', false),
    ("times", '\u{D7}', '\0', true),
    ("trade", '\u{2122}', '\0', false),
    ("uArr", '\u{21D1}', '\0', false),
    ("uacute", '\u{FA}', '\0', true),
    ("uarr", '\u{2191}', '\0', false),
    ("ucirc", '\u{FB}', '\0', true),
    ("ugrave", '\u{F9}', '\0', true),
    ("uml", '\u{A8}', '\0', true),
    ("upsilon", '\u{3C5}', '\0', false),
    ("uuml", '\u{FC}', '\0', true),
    ("xi", '\u{3BE}', '\0', false),
    ("yacute", '\u{FD}', '\0', true),
    ("yen", '\u{A5}', '\0', true),
    ("yuml", '\u{FF}', '\0', true),
    ("zeta", '\u{3B6}', '\0', false),
    ("zwj", '\u{200D}', '\0', false),
    ("zwnj", '\u{200C}', '\0', false),
];

#[cfg(test)]
mod tests {
    use super::{longest_legacy_prefix, named, resolve_numeric, Replacement};

    #[test]
    fn named_resolves_exact_entries() {
        assert_eq!(
            named("amp"),
            Some(Replacement {
                first: '&',
                second: None
            })
        );
        assert_eq!(named("notin").map(|r| r.first), Some('\u{2209}'));
        assert_eq!(named("nosuchname"), None);
    }

    #[test]
    fn two_scalar_replacements_survive() {
        let r = named("fjlig").unwrap();
        assert_eq!((r.first, r.second), ('f', Some('j')));
    }

    #[test]
    fn longest_legacy_prefix_prefers_longer_names() {
        // "notin" is not legacy; "not" is, and wins over "no".
        let (len, r) = longest_legacy_prefix("notit").unwrap();
        assert_eq!(len, 3);
        assert_eq!(r.first, '\u{AC}');

        // Non-legacy names never match without semicolon.
        assert!(longest_legacy_prefix("ndash").is_none() || {
            let (len, _) = longest_legacy_prefix("ndash").unwrap();
            len < 5
        });
    }

    #[test]
    fn numeric_clamps_c1_range() {
        assert_eq!(resolve_numeric(0x80), ('\u{20AC}', true));
        assert_eq!(resolve_numeric(0x9F), ('\u{0178}', true));
    }

    #[test]
    fn numeric_rejects_nul_surrogates_and_out_of_range() {
        assert_eq!(resolve_numeric(0), ('\u{FFFD}', true));
        assert_eq!(resolve_numeric(0xD800), ('\u{FFFD}', true));
        assert_eq!(resolve_numeric(0x110000), ('\u{FFFD}', true));
    }

    #[test]
    fn numeric_flags_noncharacters_but_passes_them_through() {
        assert_eq!(resolve_numeric(0xFDD0), ('\u{FDD0}', true));
        assert_eq!(resolve_numeric(0xFFFE), ('\u{FFFE}', true));
        assert_eq!(resolve_numeric(0x41), ('A', false));
        assert_eq!(resolve_numeric(0x10FFFF), ('\u{10FFFF}', true));
    }
}
