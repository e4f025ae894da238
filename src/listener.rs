use serde::Deserialize;

use crate::applier::{self, DomHighlight};
use crate::color::{read_text_color, select_colors};
use crate::model::HighlightRecord;
use crate::page::Page;
use crate::path::build_path;
use crate::session::ActivationState;
use crate::storage::DurableStore;
use crate::store::HighlightStore;

/// Whether a selection is persisted when its marker could not be applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavePolicy {
    /// Track every attempted highlight, even ones that never showed up.
    #[default]
    Always,
    /// Persist only highlights that made it into the DOM.
    OnlyApplied,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// The highlighter is switched off.
    Inactive,
    /// Nothing, or only an empty string, was selected.
    Empty,
    Handled {
        highlight: Option<DomHighlight>,
        record: Option<HighlightRecord>,
        saved: bool,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionListener {
    policy: SavePolicy,
}

impl SelectionListener {
    pub fn new(policy: SavePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SavePolicy {
        self.policy
    }

    /// Runs the select → color → apply → persist pipeline for the page's current
    /// selection.
    ///
    /// The record is taken from the first range's start container only, so it is
    /// meaningful only when the whole selection sits in one text node.
    pub async fn on_selection_completed<S: DurableStore>(
        &self,
        state: ActivationState,
        page: &mut Page,
        store: &HighlightStore<S>,
    ) -> SelectionOutcome {
        if !state.is_active() {
            return SelectionOutcome::Inactive;
        }
        if page.selection.to_text(&page.document).is_empty() {
            return SelectionOutcome::Empty;
        }
        let Some(range) = page.selection.range_at(0).copied() else {
            return SelectionOutcome::Empty;
        };

        let doc = &mut page.document;
        let start = range.start_container();
        let start_element = if doc.is_text(start) {
            doc.parent(start).unwrap_or(start)
        } else {
            start
        };
        let colors = select_colors(read_text_color(doc, start_element));

        let record = build_path(doc, start).map(|address| HighlightRecord {
            address,
            start_offset: range.start_offset(),
            end_offset: range.end_offset(),
            colors,
        });

        let highlight = match applier::apply(doc, &range, &colors) {
            Ok(highlight) => Some(highlight),
            Err(e) => {
                tracing::warn!(url = %page.url, error = %crate::unpack_error(&e), "could not apply highlight");
                None
            }
        };

        let Some(record) = record else {
            tracing::warn!(url = %page.url, "selection starts outside the page body, not saving");
            return SelectionOutcome::Handled {
                highlight,
                record: None,
                saved: false,
            };
        };

        if highlight.is_none() && self.policy == SavePolicy::OnlyApplied {
            tracing::debug!(address = %record.address, "highlight was not applied, skipping save");
            return SelectionOutcome::Handled {
                highlight,
                record: Some(record),
                saved: false,
            };
        }

        let saved = match store.save(&page.url, record.clone()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    url = %page.url,
                    address = %record.address,
                    error = %crate::unpack_error(&e),
                    "failed to save highlight"
                );
                false
            }
        };

        SelectionOutcome::Handled {
            highlight,
            record: Some(record),
            saved,
        }
    }
}
