use crate::applier::{self, DomHighlight};
use crate::dom::{Document, Range};
use crate::error::HighlightError;
use crate::model::HighlightRecord;
use crate::page::Page;
use crate::path::resolve_path;
use crate::storage::DurableStore;
use crate::store::HighlightStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub skipped: usize,
}

/// Re-applies every stored highlight of the page, in stored order. A record that no
/// longer resolves or no longer fits its node is logged and skipped; the rest still
/// run.
pub async fn restore_page<S: DurableStore>(page: &mut Page, store: &HighlightStore<S>) -> RestoreReport {
    let records = match store.get(&page.url).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(url = %page.url, error = %crate::unpack_error(&e), "failed to load highlights");
            return RestoreReport::default();
        }
    };

    let mut report = RestoreReport::default();
    for record in &records {
        match restore_record(&mut page.document, record) {
            Ok(_) => report.restored += 1,
            Err(e) => {
                report.skipped += 1;
                tracing::warn!(
                    url = %page.url,
                    address = %record.address,
                    error = %crate::unpack_error(&e),
                    "skipping highlight"
                );
            }
        }
    }
    tracing::info!(url = %page.url, restored = report.restored, skipped = report.skipped, "highlights restored");
    report
}

/// Rebuilds one highlight. The saved offsets are applied to the text of the node
/// the address resolves to; an element is read through its first text child.
///
/// An element that already holds a marker is refused: its text is split around that
/// marker, and a record saved from one of the split pieces carries offsets relative
/// to that piece, not to the first text child.
pub fn restore_record(doc: &mut Document, record: &HighlightRecord) -> Result<DomHighlight, HighlightError> {
    let node = resolve_path(doc, &record.address)
        .ok_or_else(|| HighlightError::PathResolution(record.address.clone()))?;
    if doc.iter_children(node).any(|child| applier::is_marker(doc, child)) {
        return Err(HighlightError::StaleTarget(format!(
            "{} already holds a highlight",
            record.address
        )));
    }
    let text = if doc.is_text(node) {
        node
    } else {
        doc.iter_children(node)
            .find(|child| doc.is_text(*child))
            .ok_or_else(|| HighlightError::PathResolution(format!("{} holds no text", record.address)))?
    };

    let range = Range::new(doc, text, record.start_offset, record.end_offset)?;
    applier::apply(doc, &range, &record.colors)
}
