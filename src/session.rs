//! Activation state and page-level event entry points.
//!
//! The activation controller owns the on/off flag that the toolbar icon toggles.
//! Nothing reads it ambiently: every entry point takes the current
//! [`ActivationState`] as an argument.

use crate::applier;
use crate::dom::NodeId;
use crate::listener::{SavePolicy, SelectionListener, SelectionOutcome};
use crate::page::Page;
use crate::restore::{RestoreReport, restore_page};
use crate::storage::DurableStore;
use crate::store::HighlightStore;

const ICON_SIZES: [u32; 3] = [16, 48, 128];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivationState {
    active: bool,
}

impl ActivationState {
    pub fn active() -> Self {
        Self { active: true }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Toolbar icon per size for this state, e.g. `icon16-active.png`.
    pub fn icons(&self) -> Vec<(u32, String)> {
        let suffix = if self.active { "-active" } else { "" };
        ICON_SIZES
            .iter()
            .map(|size| (*size, format!("icon{size}{suffix}.png")))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct ActivationController {
    state: ActivationState,
}

impl ActivationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// Flips the flag and returns the new state.
    pub fn toggle(&mut self) -> ActivationState {
        self.state.active = !self.state.active;
        tracing::info!(active = self.state.active, "highlighter toggled");
        self.state
    }
}

/// Wires the listener, the restore runner and the delete controls to one store.
pub struct Session<S> {
    store: HighlightStore<S>,
    listener: SelectionListener,
}

impl<S: DurableStore> Session<S> {
    pub fn new(store: HighlightStore<S>, policy: SavePolicy) -> Self {
        Self {
            store,
            listener: SelectionListener::new(policy),
        }
    }

    pub fn store(&self) -> &HighlightStore<S> {
        &self.store
    }

    /// Runs the highlighter on `page`: installs the shared rules and restores the
    /// stored highlights. Activating an already injected page does nothing, so
    /// repeated toggles never stack markers.
    pub async fn on_activation(&self, state: ActivationState, page: &mut Page) -> Option<RestoreReport> {
        if !state.is_active() {
            return None;
        }
        if page.is_injected() {
            tracing::debug!(url = %page.url, "page already injected");
            return None;
        }
        page.mark_injected();
        applier::install_stylesheet(&mut page.document);
        Some(restore_page(page, &self.store).await)
    }

    pub async fn on_selection_completed(&self, state: ActivationState, page: &mut Page) -> SelectionOutcome {
        self.listener
            .on_selection_completed(state, page, &self.store)
            .await
    }

    /// Handles a click on `target`. Returns whether it hit a delete control.
    pub async fn on_click(&self, page: &mut Page, target: NodeId) -> bool {
        let Some(marker) = applier::marker_for_control(&page.document, target) else {
            return false;
        };
        if let Err(e) = applier::remove(page, &self.store, marker).await {
            tracing::error!(url = %page.url, error = %crate::unpack_error(&e), "failed to remove highlight");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applier::markers;
    use crate::dom::{Document, Range, Selection};
    use crate::storage::MemoryStore;

    const URL: &str = "https://example.com/essay";

    fn fresh_page() -> (Page, NodeId) {
        let mut doc = Document::new();
        let intro = doc.append_element(doc.body(), "p").unwrap();
        doc.append_text(intro, "intro").unwrap();
        let second = doc.append_element(doc.body(), "p").unwrap();
        let hello = doc.append_text(second, "oh hello world").unwrap();
        (Page::new(URL, doc), hello)
    }

    #[test]
    fn test_toggle_flips_state_and_icons() {
        let mut controller = ActivationController::new();
        assert!(!controller.state().is_active());

        let state = controller.toggle();
        assert!(state.is_active());
        assert_eq!(state.icons()[0], (16, "icon16-active.png".to_string()));

        let state = controller.toggle();
        assert!(!state.is_active());
        assert_eq!(state.icons()[2], (128, "icon128.png".to_string()));
    }

    #[tokio::test]
    async fn test_highlight_survives_reload() {
        let backend = MemoryStore::new();
        let session = Session::new(HighlightStore::new(backend.clone()), SavePolicy::Always);
        let state = ActivationState::active();

        let (mut page, hello) = fresh_page();
        session.on_activation(state, &mut page).await;
        page.selection = Selection::from_range(Range::new(&page.document, hello, 3, 8).unwrap());
        session.on_selection_completed(state, &mut page).await;
        let applied = markers(&page.document);
        assert_eq!(applied.len(), 1);

        let (mut reloaded, _) = fresh_page();
        let report = session.on_activation(state, &mut reloaded).await;

        assert_eq!(report, Some(RestoreReport { restored: 1, skipped: 0 }));
        let restored = markers(&reloaded.document);
        assert_eq!(restored.len(), 1);
        assert_eq!(
            reloaded.document.text_content(restored[0]),
            page.document.text_content(applied[0])
        );
        assert_eq!(
            reloaded.document.parent(restored[0]).map(|p| reloaded.document.text_content(p)),
            page.document.parent(applied[0]).map(|p| page.document.text_content(p))
        );
        assert_eq!(
            reloaded.document.attr(restored[0], "style"),
            page.document.attr(applied[0], "style")
        );
    }

    #[tokio::test]
    async fn test_repeated_activation_does_not_duplicate() {
        let session = Session::new(HighlightStore::new(MemoryStore::new()), SavePolicy::Always);
        let state = ActivationState::active();
        let (mut page, hello) = fresh_page();
        page.selection = Selection::from_range(Range::new(&page.document, hello, 0, 2).unwrap());
        session.on_selection_completed(state, &mut page).await;

        let (mut reloaded, _) = fresh_page();
        assert!(session.on_activation(ActivationState::default(), &mut reloaded).await.is_none());
        assert!(session.on_activation(state, &mut reloaded).await.is_some());
        assert!(session.on_activation(state, &mut reloaded).await.is_none());
        assert_eq!(markers(&reloaded.document).len(), 1);
    }

    #[tokio::test]
    async fn test_clicking_delete_control_removes_highlight() {
        let session = Session::new(HighlightStore::new(MemoryStore::new()), SavePolicy::Always);
        let state = ActivationState::active();
        let (mut page, hello) = fresh_page();
        let paragraph = page.document.parent(hello).unwrap();
        page.selection = Selection::from_range(Range::new(&page.document, hello, 3, 8).unwrap());

        let SelectionOutcome::Handled { highlight: Some(highlight), .. } =
            session.on_selection_completed(state, &mut page).await
        else {
            panic!("highlight was not applied");
        };

        assert!(!session.on_click(&mut page, paragraph).await);
        let glyph = page.document.first_child(highlight.delete_control).unwrap();
        assert!(session.on_click(&mut page, glyph).await);

        assert!(markers(&page.document).is_empty());
        assert_eq!(page.document.text_content(paragraph), "oh hello world");
        assert!(session.store().get(URL).await.unwrap().is_empty());

        let (mut reloaded, _) = fresh_page();
        let report = session.on_activation(state, &mut reloaded).await;
        assert_eq!(report, Some(RestoreReport::default()));
    }
}
