//! DOCTYPE-driven quirks-mode classification.
//!
//! The public-identifier tables are the HTML5 quirky DTD lists; matching is
//! ASCII case-insensitive.

use crate::signal::Doctype;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum QuirksMode {
    #[default]
    NoQuirks,
    LimitedQuirks,
    Quirks,
}

pub(crate) fn classify(doctype: &Doctype) -> QuirksMode {
    if doctype.force_quirks {
        return QuirksMode::Quirks;
    }
    if doctype.name.as_deref() != Some("html") {
        return QuirksMode::Quirks;
    }
    let public = doctype.public_id.as_deref().map(str::to_ascii_lowercase);
    let system = doctype.system_id.as_deref().map(str::to_ascii_lowercase);

    if let Some(public) = &public {
        if QUIRKY_PUBLIC_EXACT.iter().any(|id| id.eq_ignore_ascii_case(public)) {
            return QuirksMode::Quirks;
        }
        if QUIRKY_PUBLIC_PREFIXES.iter().any(|p| public.starts_with(p)) {
            return QuirksMode::Quirks;
        }
        if SYSTEM_DEPENDENT_PREFIXES.iter().any(|p| public.starts_with(p)) {
            return if system.is_some() {
                QuirksMode::LimitedQuirks
            } else {
                QuirksMode::Quirks
            };
        }
        if LIMITED_QUIRKS_PREFIXES.iter().any(|p| public.starts_with(p)) {
            return QuirksMode::LimitedQuirks;
        }
    }
    if let Some(system) = &system
        && system == "http://www.ibm.com/data/dtd/v11/ibmxhtml1-transitional.dtd"
    {
        return QuirksMode::Quirks;
    }
    QuirksMode::NoQuirks
}

const QUIRKY_PUBLIC_EXACT: &[&str] = &[
    "-//w3o//dtd w3 html strict 3.0//en//",
    "-/w3c/dtd html 4.0 transitional/en",
    "html",
];

const QUIRKY_PUBLIC_PREFIXES: &[&str] = &[
    "+//silmaril//dtd html pro v0r11 19970101//",
    "-//as//dtd html 3.0 aswedit + extensions//",
    "-//advasoft ltd//dtd html 3.0 aswedit + extensions//",
    "-//ietf//dtd html 2.0 level 1//",
    "-//ietf//dtd html 2.0 level 2//",
    "-//ietf//dtd html 2.0 strict level 1//",
    "-//ietf//dtd html 2.0 strict level 2//",
    "-//ietf//dtd html 2.0 strict//",
    "-//ietf//dtd html 2.0//",
    "-//ietf//dtd html 2.1e//",
    "-//ietf//dtd html 3.0//",
    "-//ietf//dtd html 3.2 final//",
    "-//ietf//dtd html 3.2//",
    "-//ietf//dtd html 3//",
    "-//ietf//dtd html level 0//",
    "-//ietf//dtd html level 1//",
    "-//ietf//dtd html level 2//",
    "-//ietf//dtd html level 3//",
    "-//ietf//dtd html strict level 0//",
    "-//ietf//dtd html strict level 1//",
    "-//ietf//dtd html strict level 2//",
    "-//ietf//dtd html strict level 3//",
    "-//ietf//dtd html strict//",
    "-//ietf//dtd html//",
    "-//metrius//dtd metrius presentational//",
    "-//microsoft//dtd internet explorer 2.0 html strict//",
    "-//microsoft//dtd internet explorer 2.0 html//",
    "-//microsoft//dtd internet explorer 2.0 tables//",
    "-//microsoft//dtd internet explorer 3.0 html strict//",
    "-//microsoft//dtd internet explorer 3.0 html//",
    "-//microsoft//dtd internet explorer 3.0 tables//",
    "-//netscape comm. corp.//dtd html//",
    "-//netscape comm. corp.//dtd strict html//",
    "-//o'reilly and associates//dtd html 2.0//",
    "-//o'reilly and associates//dtd html extended 1.0//",
    "-//o'reilly and associates//dtd html extended relaxed 1.0//",
    "-//sq//dtd html 2.0 hotmetal + extensions//",
    "-//softquad software//dtd hotmetal pro 6.0::19990601::extensions to html 4.0//",
    "-//softquad//dtd hotmetal pro 4.0::19971010::extensions to html 4.0//",
    "-//spyglass//dtd html 2.0 extended//",
    "-//sun microsystems corp.//dtd hotjava html//",
    "-//sun microsystems corp.//dtd hotjava strict html//",
    "-//w3c//dtd html 3 1995-03-24//",
    "-//w3c//dtd html 3.2 draft//",
    "-//w3c//dtd html 3.2 final//",
    "-//w3c//dtd html 3.2//",
    "-//w3c//dtd html 3.2s draft//",
    "-//w3c//dtd html 4.0 frameset//",
    "-//w3c//dtd html 4.0 transitional//",
    "-//w3c//dtd html experimental 19960712//",
    "-//w3c//dtd html experimental 970421//",
    "-//w3c//dtd w3 html//",
    "-//w3o//dtd w3 html 3.0//",
    "-//webtechs//dtd mozilla html 2.0//",
    "-//webtechs//dtd mozilla html//",
];

/// Quirks without a system id, limited quirks with one.
const SYSTEM_DEPENDENT_PREFIXES: &[&str] = &[
    "-//w3c//dtd html 4.01 frameset//",
    "-//w3c//dtd html 4.01 transitional//",
];

const LIMITED_QUIRKS_PREFIXES: &[&str] = &[
    "-//w3c//dtd xhtml 1.0 frameset//",
    "-//w3c//dtd xhtml 1.0 transitional//",
];

#[cfg(test)]
mod tests {
    use super::{classify, QuirksMode};
    use crate::signal::Doctype;

    fn doctype(name: Option<&str>, public: Option<&str>, system: Option<&str>) -> Doctype {
        Doctype {
            name: name.map(str::to_string),
            public_id: public.map(str::to_string),
            system_id: system.map(str::to_string),
            force_quirks: false,
        }
    }

    #[test]
    fn modern_doctype_is_no_quirks() {
        assert_eq!(classify(&doctype(Some("html"), None, None)), QuirksMode::NoQuirks);
    }

    #[test]
    fn missing_or_wrong_name_is_quirks() {
        assert_eq!(classify(&doctype(None, None, None)), QuirksMode::Quirks);
        assert_eq!(classify(&doctype(Some("foo"), None, None)), QuirksMode::Quirks);
    }

    #[test]
    fn html32_public_id_is_quirks() {
        assert_eq!(
            classify(&doctype(Some("html"), Some("-//W3C//DTD HTML 3.2//EN"), None)),
            QuirksMode::Quirks
        );
    }

    #[test]
    fn html401_transitional_depends_on_system_id() {
        let public = Some("-//W3C//DTD HTML 4.01 Transitional//EN");
        assert_eq!(
            classify(&doctype(Some("html"), public, None)),
            QuirksMode::Quirks
        );
        assert_eq!(
            classify(&doctype(Some("html"), public, Some("http://www.w3.org/TR/html4/loose.dtd"))),
            QuirksMode::LimitedQuirks
        );
    }

    #[test]
    fn xhtml_transitional_is_limited_quirks() {
        assert_eq!(
            classify(&doctype(
                Some("html"),
                Some("-//W3C//DTD XHTML 1.0 Transitional//EN"),
                None
            )),
            QuirksMode::LimitedQuirks
        );
    }

    #[test]
    fn force_quirks_wins() {
        let mut d = doctype(Some("html"), None, None);
        d.force_quirks = true;
        assert_eq!(classify(&d), QuirksMode::Quirks);
    }
}
