//! Stack of open elements.
//!
//! Entries carry a stable numeric id so the active-formatting list can refer
//! to stack members without live references; the adoption agency relies on
//! index-based access and remove-by-identity.

use crate::location::Location;
use crate::signal::Name;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ElementNs {
    Html,
    Svg,
    MathMl,
}

/// An element that has been opened (its `StartElement` signal emitted) and
/// not yet closed.
#[derive(Clone, Debug)]
pub(crate) struct OpenElement {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) ns: ElementNs,
    /// HTML integration point (SVG foreignObject/desc/title, or
    /// annotation-xml with an HTML encoding attribute).
    pub(crate) html_integration: bool,
    /// Snapshot kept for clone re-insertion during the adoption agency.
    pub(crate) attributes: Vec<(Name, String)>,
    pub(crate) location: Location,
    /// Wrapper elements (html/head/body and fragment roots) are tracked on
    /// the stack but never surface as signals.
    pub(crate) synthetic: bool,
}

impl OpenElement {
    pub(crate) fn is_html(&self, name: &str) -> bool {
        self.ns == ElementNs::Html && self.name == name
    }

    pub(crate) fn mathml_text_integration(&self) -> bool {
        self.ns == ElementNs::MathMl
            && matches!(self.name.as_str(), "mi" | "mo" | "mn" | "ms" | "mtext")
    }
}

/// Scope flavors used by end-tag and implied-close handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    InScope,
    Button,
    ListItem,
    Table,
    Select,
}

fn is_default_scope_boundary(entry: &OpenElement) -> bool {
    match entry.ns {
        ElementNs::Html => matches!(
            entry.name.as_str(),
            "applet" | "caption" | "html" | "table" | "td" | "th" | "marquee" | "object"
                | "template"
        ),
        ElementNs::MathMl => matches!(
            entry.name.as_str(),
            "mi" | "mo" | "mn" | "ms" | "mtext" | "annotation-xml"
        ),
        ElementNs::Svg => matches!(entry.name.as_str(), "foreignObject" | "desc" | "title"),
    }
}

fn is_scope_boundary(entry: &OpenElement, kind: ScopeKind) -> bool {
    match kind {
        ScopeKind::InScope => is_default_scope_boundary(entry),
        ScopeKind::Button => {
            is_default_scope_boundary(entry) || entry.is_html("button")
        }
        ScopeKind::ListItem => {
            is_default_scope_boundary(entry) || entry.is_html("ol") || entry.is_html("ul")
        }
        ScopeKind::Table => {
            entry.ns == ElementNs::Html
                && matches!(entry.name.as_str(), "html" | "table" | "template")
        }
        // Select scope is inverted: everything except optgroup/option bounds it.
        ScopeKind::Select => {
            !(entry.is_html("optgroup") || entry.is_html("option"))
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct OpenElementsStack {
    items: Vec<OpenElement>,
    max_depth: u32,
}

impl OpenElementsStack {
    pub(crate) fn push(&mut self, entry: OpenElement) {
        self.items.push(entry);
        self.max_depth = self.max_depth.max(self.items.len() as u32);
    }

    pub(crate) fn pop(&mut self) -> Option<OpenElement> {
        self.items.pop()
    }

    pub(crate) fn current(&self) -> Option<&OpenElement> {
        self.items.last()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&OpenElement> {
        self.items.get(index)
    }

    pub(crate) fn items(&self) -> &[OpenElement] {
        &self.items
    }

    pub(crate) fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub(crate) fn contains_id(&self, id: u32) -> bool {
        self.items.iter().any(|entry| entry.id == id)
    }

    pub(crate) fn index_of_id(&self, id: u32) -> Option<usize> {
        self.items.iter().position(|entry| entry.id == id)
    }

    /// True if an HTML element named `target` is visible in the given scope.
    pub(crate) fn has_in_scope(&self, target: &str, kind: ScopeKind) -> bool {
        for entry in self.items.iter().rev() {
            if entry.is_html(target) {
                return true;
            }
            if is_scope_boundary(entry, kind) {
                return false;
            }
        }
        false
    }

    /// True if any of `targets` is visible in the given scope.
    pub(crate) fn has_any_in_scope(&self, targets: &[&str], kind: ScopeKind) -> bool {
        targets.iter().any(|target| self.has_in_scope(target, kind))
    }

    /// True if the element at `index` is visible in the given scope (nothing
    /// between it and the top is a scope boundary).
    pub(crate) fn index_in_scope(&self, index: usize, kind: ScopeKind) -> bool {
        self.items[index + 1..]
            .iter()
            .all(|entry| !is_scope_boundary(entry, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::{ElementNs, OpenElement, OpenElementsStack, ScopeKind};
    use crate::location::Location;

    fn element(id: u32, name: &str) -> OpenElement {
        OpenElement {
            id,
            name: name.to_string(),
            ns: ElementNs::Html,
            html_integration: false,
            attributes: Vec::new(),
            location: Location::START,
            synthetic: false,
        }
    }

    fn stack_of(names: &[&str]) -> OpenElementsStack {
        let mut stack = OpenElementsStack::default();
        for (i, name) in names.iter().enumerate() {
            stack.push(element(i as u32 + 1, name));
        }
        stack
    }

    #[test]
    fn table_bounds_default_scope() {
        let stack = stack_of(&["html", "body", "p", "table"]);
        assert!(!stack.has_in_scope("p", ScopeKind::InScope));
        assert!(stack.has_in_scope("table", ScopeKind::InScope));
    }

    #[test]
    fn button_scope_adds_button_boundary() {
        let stack = stack_of(&["html", "body", "p", "button"]);
        assert!(stack.has_in_scope("p", ScopeKind::InScope));
        assert!(!stack.has_in_scope("p", ScopeKind::Button));
    }

    #[test]
    fn list_item_scope_bounded_by_lists() {
        let stack = stack_of(&["html", "body", "li", "ul"]);
        assert!(!stack.has_in_scope("li", ScopeKind::ListItem));
    }

    #[test]
    fn select_scope_is_inverted() {
        let stack = stack_of(&["html", "body", "select", "option"]);
        assert!(stack.has_in_scope("select", ScopeKind::Select));
        let stack = stack_of(&["html", "body", "select", "div"]);
        assert!(!stack.has_in_scope("select", ScopeKind::Select));
    }

    #[test]
    fn index_scope_visibility() {
        let stack = stack_of(&["html", "body", "b", "table", "i"]);
        assert!(!stack.index_in_scope(2, ScopeKind::InScope), "b hidden by table");
        assert!(stack.index_in_scope(3, ScopeKind::InScope));
    }
}
