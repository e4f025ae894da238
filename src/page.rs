use crate::dom::{Document, Selection};

/// A loaded page: its URL (the persistence key), its live document and the user's
/// current selection.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub document: Document,
    pub selection: Selection,
    injected: bool,
}

impl Page {
    pub fn new(url: impl Into<String>, document: Document) -> Self {
        Self {
            url: url.into(),
            document,
            selection: Selection::default(),
            injected: false,
        }
    }

    /// Whether the highlighter already ran on this page.
    pub fn is_injected(&self) -> bool {
        self.injected
    }

    pub(crate) fn mark_injected(&mut self) {
        self.injected = true;
    }
}
