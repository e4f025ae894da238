//! Visual markers: wrapping a range in a `mark`, and unwrapping it again.
//!
//! Every marker carries the shared highlight class plus a class unique to it. The
//! overlay color travels as the `--highlight-color` custom property on the marker
//! and is painted by one shared `::before` rule, so the stylesheet holds the same
//! handful of rules however many highlights a page has.

use crate::dom::{Document, NodeId, Range, StyleRule};
use crate::error::{DomError, HighlightError};
use crate::model::HighlightColors;
use crate::page::Page;
use crate::path::build_path;
use crate::storage::DurableStore;
use crate::store::HighlightStore;

pub const HIGHLIGHT_CLASS: &str = "inkmark-highlight";
pub const DELETE_CLASS: &str = "inkmark-highlight-delete";
pub const COLOR_PROPERTY: &str = "--highlight-color";
pub const TEXT_COLOR_PROPERTY: &str = "--highlight-text-color";

const CONTROL_ATTR: &str = "data-inkmark-control";
const REMOVE_ACTION: &str = "remove";

/// A marker that currently sits in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomHighlight {
    pub marker: NodeId,
    pub delete_control: NodeId,
    pub class_name: String,
}

/// Installs the shared highlight rules once per document.
pub fn install_stylesheet(doc: &mut Document) {
    let marker_selector = format!(".{HIGHLIGHT_CLASS}");
    if doc.stylesheet().has_selector(&marker_selector) {
        return;
    }

    let sheet = doc.stylesheet_mut();
    sheet.insert_rule(StyleRule::new(
        &marker_selector,
        &format!(
            "position: relative; display: inline; padding: 0 !important; \
             margin: 0 !important; line-height: inherit !important; \
             color: var({TEXT_COLOR_PROPERTY}, inherit) !important; z-index: 1"
        ),
    ));
    sheet.insert_rule(StyleRule::new(
        &format!(".{HIGHLIGHT_CLASS}::before"),
        &format!(
            "content: ''; position: absolute; top: 0; left: 0; right: 0; bottom: 0; \
             margin: -0.15em -0.05em; z-index: -1; border-radius: 0.2em; \
             background-color: var({COLOR_PROPERTY}, rgba(255, 255, 0, 0.5))"
        ),
    ));
    sheet.insert_rule(StyleRule::new(
        &format!(".{DELETE_CLASS}"),
        "position: absolute; top: -0.8em; right: -0.8em; width: 1.6em; height: 1.6em; \
         background: #ff4444; color: white; border-radius: 50%; display: none; \
         align-items: center; justify-content: center; font-size: 0.75em; cursor: pointer; \
         line-height: 1; font-family: Arial, sans-serif; z-index: 2; \
         padding: 0 !important; margin: 0 !important; border: none !important",
    ));
    sheet.insert_rule(StyleRule::new(
        &format!(".{HIGHLIGHT_CLASS}:hover .{DELETE_CLASS}"),
        "display: flex",
    ));
}

/// Wraps `range` in a new marker painted with `colors`.
///
/// When the range cannot be surrounded the document is left exactly as it was and
/// nothing is attached.
pub fn apply(doc: &mut Document, range: &Range, colors: &HighlightColors) -> Result<DomHighlight, HighlightError> {
    install_stylesheet(doc);

    let marker = doc.create_element("mark");
    let class_name = format!("{HIGHLIGHT_CLASS}-{}", doc.node_count());
    doc.class_add(marker, HIGHLIGHT_CLASS)?;
    doc.class_add(marker, &class_name)?;
    doc.set_style_property(marker, COLOR_PROPERTY, &colors.background.to_string())?;
    doc.set_style_property(marker, TEXT_COLOR_PROPERTY, &colors.text.to_string())?;

    range
        .surround_contents(doc, marker)
        .map_err(HighlightError::Wrap)?;

    let delete_control = create_delete_control(doc)?;
    doc.append_child(marker, delete_control)?;

    tracing::debug!(class = %class_name, "highlight applied");
    Ok(DomHighlight {
        marker,
        delete_control,
        class_name,
    })
}

fn create_delete_control(doc: &mut Document) -> Result<NodeId, DomError> {
    let control = doc.create_element("span");
    doc.class_add(control, DELETE_CLASS)?;
    doc.set_attr(control, "title", "Remove highlight")?;
    doc.set_attr(control, CONTROL_ATTR, REMOVE_ACTION)?;
    doc.append_text(control, "\u{00d7}")?;
    Ok(control)
}

pub fn is_marker(doc: &Document, node: NodeId) -> bool {
    doc.tag_name(node) == Some("mark") && doc.has_class(node, HIGHLIGHT_CLASS)
}

pub fn is_delete_control(doc: &Document, node: NodeId) -> bool {
    doc.attr(node, CONTROL_ATTR) == Some(REMOVE_ACTION)
}

/// Maps a clicked node (the delete control or anything inside it) to the marker
/// the control removes.
pub fn marker_for_control(doc: &Document, node: NodeId) -> Option<NodeId> {
    let control = doc
        .ancestors(node)
        .into_iter()
        .find(|candidate| is_delete_control(doc, *candidate))?;
    doc.parent(control).filter(|parent| is_marker(doc, *parent))
}

/// Every marker currently attached to the document, in tree order.
pub fn markers(doc: &Document) -> Vec<NodeId> {
    let mut found = Vec::new();
    collect_markers(doc, doc.root(), &mut found);
    found
}

fn collect_markers(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if is_marker(doc, node) {
        out.push(node);
    }
    for child in doc.iter_children(node) {
        collect_markers(doc, child, out);
    }
}

/// The address a marker's highlight was saved under: the element hosting the
/// marker, which is the element whose text the selection started in.
///
/// This is the host's path, not the path of the marker itself. A marker's own path
/// ends in `mark[n]` and never equals an address a selection was saved under, so
/// deleting by it would leave the record behind to be restored on the next load.
pub fn marker_address(doc: &Document, marker: NodeId) -> Option<String> {
    doc.parent(marker).and_then(|host| build_path(doc, host))
}

/// Deletes the highlight behind `marker`: its stored records first, then the marker
/// itself, putting the marker's first child back where the marker was.
///
/// A storage failure is logged and the DOM is unwrapped anyway; nothing is rolled
/// back.
pub async fn remove<S: DurableStore>(
    page: &mut Page,
    store: &HighlightStore<S>,
    marker: NodeId,
) -> Result<(), HighlightError> {
    if !is_marker(&page.document, marker) {
        return Err(DomError::NotFound("node is not a highlight marker".into()).into());
    }

    match marker_address(&page.document, marker) {
        Some(address) => match store.delete(&page.url, &address).await {
            Ok(removed) => tracing::debug!(address = %address, removed, "highlight records deleted"),
            Err(e) => tracing::error!(
                address = %address,
                error = %crate::unpack_error(&e),
                "failed to delete highlight records"
            ),
        },
        None => tracing::warn!("highlight marker has no address, nothing to delete from storage"),
    }

    let doc = &mut page.document;
    let parent = doc
        .parent(marker)
        .ok_or_else(|| DomError::NotFound("highlight marker is detached".into()))?;
    let children = doc.children(marker).to_vec();

    let dropped = children
        .iter()
        .skip(1)
        .filter(|child| !is_delete_control(doc, **child))
        .count();
    if dropped > 0 {
        tracing::warn!(dropped, "highlight held more than one node, extra nodes are discarded");
    }

    if let Some(first) = children.first().copied() {
        if !is_delete_control(doc, first) {
            doc.insert_before(parent, first, marker)?;
        }
    }
    doc.remove_child(parent, marker)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Boundary;
    use crate::model::{Rgb, Rgba};
    use crate::storage::MemoryStore;

    const URL: &str = "https://example.com/a";

    fn colors() -> HighlightColors {
        HighlightColors {
            background: Rgba(50, 50, 0, 0.7),
            text: Rgb::WHITE,
        }
    }

    fn page_with(text: &str) -> (Page, NodeId, NodeId) {
        let mut doc = Document::new();
        let p = doc.append_element(doc.body(), "p").unwrap();
        let t = doc.append_text(p, text).unwrap();
        (Page::new(URL, doc), p, t)
    }

    #[test]
    fn test_apply_builds_marker_with_control() {
        let (mut page, p, text) = page_with("say hello world");
        let doc = &mut page.document;
        let range = Range::new(doc, text, 4, 9).unwrap();

        let highlight = apply(doc, &range, &colors()).unwrap();

        let marker = highlight.marker;
        assert_eq!(doc.parent(marker), Some(p));
        assert!(doc.has_class(marker, HIGHLIGHT_CLASS));
        assert!(doc.has_class(marker, &highlight.class_name));
        assert_eq!(
            doc.style_property(marker, COLOR_PROPERTY).as_deref(),
            Some("rgba(50, 50, 0, 0.7)")
        );
        let children = doc.children(marker).to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(doc.text(children[0]), Some("hello"));
        assert_eq!(children[1], highlight.delete_control);
        assert_eq!(doc.last_child(marker), Some(highlight.delete_control));
        assert_eq!(marker_for_control(doc, highlight.delete_control), Some(marker));
    }

    #[test]
    fn test_unique_classes_and_shared_rules() {
        let (mut page, p, text) = page_with("one two three");
        let doc = &mut page.document;
        let range = Range::new(doc, text, 0, 3).unwrap();
        let first = apply(doc, &range, &colors()).unwrap();
        let rules_after_first = doc.stylesheet().len();

        let tail = doc.children(p)[1];
        let range = Range::new(doc, tail, 1, 4).unwrap();
        let second = apply(doc, &range, &colors()).unwrap();

        assert_ne!(first.class_name, second.class_name);
        assert_eq!(doc.stylesheet().len(), rules_after_first);
        assert_eq!(markers(doc), vec![first.marker, second.marker]);
    }

    #[test]
    fn test_failed_apply_leaves_document_untouched() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.body(), "p").unwrap();
        let plain = doc.append_text(p, "plain ").unwrap();
        let bold = doc.append_element(p, "b").unwrap();
        let inner = doc.append_text(bold, "bold").unwrap();
        let range = Range::between(&doc, Boundary::new(plain, 1), Boundary::new(inner, 2)).unwrap();

        let result = apply(&mut doc, &range, &colors());

        assert!(matches!(result, Err(HighlightError::Wrap(_))));
        assert_eq!(doc.children(p), &[plain, bold]);
        assert_eq!(doc.text_content(p), "plain bold");
        assert!(markers(&doc).is_empty());
    }

    #[tokio::test]
    async fn test_apply_then_remove_restores_text() {
        let (mut page, p, text) = page_with("say hello world");
        let store = HighlightStore::new(MemoryStore::new());
        let range = Range::new(&page.document, text, 4, 9).unwrap();
        let highlight = apply(&mut page.document, &range, &colors()).unwrap();

        remove(&mut page, &store, highlight.marker).await.unwrap();

        assert_eq!(page.document.text_content(p), "say hello world");
        assert!(markers(&page.document).is_empty());
        assert_eq!(page.document.parent(highlight.delete_control), Some(highlight.marker));
        assert_eq!(page.document.parent(highlight.marker), None);
    }

    #[tokio::test]
    async fn test_remove_deletes_records_for_host_address() {
        let (mut page, _, text) = page_with("hello");
        let store = HighlightStore::new(MemoryStore::new());
        let record = crate::model::HighlightRecord {
            address: "/html/body/p[1]".to_string(),
            start_offset: 0,
            end_offset: 5,
            colors: colors(),
        };
        store.save(URL, record).await.unwrap();
        let range = Range::new(&page.document, text, 0, 5).unwrap();
        let highlight = apply(&mut page.document, &range, &colors()).unwrap();

        remove(&mut page, &store, highlight.marker).await.unwrap();

        assert!(store.get(URL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_unwraps_even_when_storage_fails() {
        let (mut page, p, text) = page_with("hello");
        let backend = MemoryStore::new();
        let store = HighlightStore::new(backend.clone());
        let range = Range::new(&page.document, text, 0, 5).unwrap();
        let highlight = apply(&mut page.document, &range, &colors()).unwrap();
        backend.set_failing(true);

        remove(&mut page, &store, highlight.marker).await.unwrap();

        assert_eq!(page.document.children(p), &[text]);
    }

    #[tokio::test]
    async fn test_remove_drops_extra_children() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.body(), "p").unwrap();
        let first = doc.append_text(p, "one ").unwrap();
        let bold = doc.append_element(p, "b").unwrap();
        doc.append_text(bold, "two").unwrap();
        let range = Range::between(&doc, Boundary::new(p, 0), Boundary::new(p, 2)).unwrap();
        let highlight = apply(&mut doc, &range, &colors()).unwrap();
        let mut page = Page::new(URL, doc);
        let store = HighlightStore::new(MemoryStore::new());

        remove(&mut page, &store, highlight.marker).await.unwrap();

        assert_eq!(page.document.children(p), &[first]);
        assert_eq!(page.document.text_content(p), "one ");
    }

    #[tokio::test]
    async fn test_remove_rejects_non_marker() {
        let (mut page, p, _) = page_with("hello");
        let store = HighlightStore::new(MemoryStore::new());
        assert!(remove(&mut page, &store, p).await.is_err());
    }
}
