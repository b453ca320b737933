//! Active formatting elements list.
//!
//! The list holds snapshots (name + original attributes) keyed by the stack
//! entry's numeric id, never live references; whether an entry's element is
//! still open is answered by the stack. Markers are inserted at
//! applet/marquee/object/template and table-cell boundaries.

use crate::signal::Name;

#[derive(Clone, Debug)]
pub(crate) struct FormattingElement {
    /// Id of the stack entry this snapshot was taken from. The element may
    /// since have been closed; reconstruction re-opens a clone and rebinds
    /// this id.
    pub(crate) element_id: u32,
    pub(crate) name: String,
    pub(crate) attributes: Vec<(Name, String)>,
}

#[derive(Clone, Debug)]
pub(crate) enum FormattingEntry {
    Marker,
    Element(FormattingElement),
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ActiveFormattingList {
    entries: Vec<FormattingEntry>,
}

impl ActiveFormattingList {
    pub(crate) fn entries(&self) -> &[FormattingEntry] {
        &self.entries
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn push_marker(&mut self) {
        self.entries.push(FormattingEntry::Marker);
    }

    /// Insert an element entry, applying the Noah's Ark clause: at most
    /// three entries with the same name and attributes since the last
    /// marker; the earliest is evicted.
    pub(crate) fn push_element(&mut self, element: FormattingElement) {
        let start = self.last_marker_index().map_or(0, |i| i + 1);
        let mut matching: Vec<usize> = Vec::new();
        for (i, entry) in self.entries.iter().enumerate().skip(start) {
            if let FormattingEntry::Element(existing) = entry
                && existing.name == element.name
                && existing.attributes == element.attributes
            {
                matching.push(i);
            }
        }
        if matching.len() >= 3 {
            self.entries.remove(matching[0]);
        }
        self.entries.push(FormattingEntry::Element(element));
    }

    pub(crate) fn last_marker_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| matches!(entry, FormattingEntry::Marker))
    }

    /// Remove entries down to and including the last marker.
    pub(crate) fn clear_to_last_marker(&mut self) {
        while let Some(entry) = self.entries.pop() {
            if matches!(entry, FormattingEntry::Marker) {
                break;
            }
        }
    }

    /// Last element entry named `name` after the last marker.
    pub(crate) fn last_element_named(&self, name: &str) -> Option<(usize, &FormattingElement)> {
        let start = self.last_marker_index().map_or(0, |i| i + 1);
        self.entries[start..]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(offset, entry)| match entry {
                FormattingEntry::Element(element) if element.name == name => {
                    Some((start + offset, element))
                }
                _ => None,
            })
    }

    pub(crate) fn get_element(&self, index: usize) -> Option<&FormattingElement> {
        match self.entries.get(index) {
            Some(FormattingEntry::Element(element)) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn remove(&mut self, index: usize) {
        self.entries.remove(index);
    }

    pub(crate) fn insert_element(&mut self, index: usize, element: FormattingElement) {
        self.entries.insert(index, FormattingEntry::Element(element));
    }

    pub(crate) fn contains_element_id(&self, id: u32) -> bool {
        self.entries.iter().any(|entry| {
            matches!(entry, FormattingEntry::Element(element) if element.element_id == id)
        })
    }

    pub(crate) fn rebind(&mut self, index: usize, new_id: u32) {
        if let Some(FormattingEntry::Element(element)) = self.entries.get_mut(index) {
            element.element_id = new_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActiveFormattingList, FormattingElement, FormattingEntry};

    fn entry(id: u32, name: &str) -> FormattingElement {
        FormattingElement {
            element_id: id,
            name: name.to_string(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn noahs_ark_keeps_at_most_three_identical_entries() {
        let mut list = ActiveFormattingList::default();
        for id in 1..=4 {
            list.push_element(entry(id, "b"));
        }
        let ids: Vec<u32> = list
            .entries()
            .iter()
            .filter_map(|e| match e {
                FormattingEntry::Element(el) => Some(el.element_id),
                FormattingEntry::Marker => None,
            })
            .collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn noahs_ark_resets_at_markers() {
        let mut list = ActiveFormattingList::default();
        for id in 1..=3 {
            list.push_element(entry(id, "b"));
        }
        list.push_marker();
        list.push_element(entry(4, "b"));
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn clear_to_last_marker_drops_cell_scope() {
        let mut list = ActiveFormattingList::default();
        list.push_element(entry(1, "b"));
        list.push_marker();
        list.push_element(entry(2, "i"));
        list.clear_to_last_marker();
        assert_eq!(list.len(), 1);
        assert!(list.last_element_named("b").is_some());
    }

    #[test]
    fn last_element_named_ignores_entries_before_marker() {
        let mut list = ActiveFormattingList::default();
        list.push_element(entry(1, "a"));
        list.push_marker();
        assert!(list.last_element_named("a").is_none());
    }
}
