use std::cmp::Ordering;

use super::document::{Document, NodeId, char_to_byte};
use crate::error::{DomError, DomResult};

/// A boundary point: a container node and an offset into it (characters for text
/// nodes, child index otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub container: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(container: NodeId, offset: usize) -> Self {
        Self { container, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    start: Boundary,
    end: Boundary,
}

impl Range {
    /// A range inside a single node, as built by `setStart(node, start)` followed by
    /// `setEnd(node, end)`.
    pub fn new(doc: &Document, node: NodeId, start: usize, end: usize) -> DomResult<Self> {
        Self::between(doc, Boundary::new(node, start), Boundary::new(node, end))
    }

    pub fn between(doc: &Document, start: Boundary, end: Boundary) -> DomResult<Self> {
        for point in [start, end] {
            if !doc.contains(point.container) {
                return Err(DomError::NotFound("range container is unknown".into()));
            }
            let length = doc.length(point.container);
            if point.offset > length {
                return Err(DomError::IndexSize {
                    offset: point.offset,
                    length,
                });
            }
        }
        // A start after the end collapses the range onto the end, like `setEnd` does.
        if compare_points(doc, &start, &end) == Ordering::Greater {
            return Ok(Self { start: end, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Boundary {
        self.start
    }

    pub fn end(&self) -> Boundary {
        self.end
    }

    pub fn start_container(&self) -> NodeId {
        self.start.container
    }

    pub fn start_offset(&self) -> usize {
        self.start.offset
    }

    pub fn end_offset(&self) -> usize {
        self.end.offset
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn common_ancestor(&self, doc: &Document) -> Option<NodeId> {
        doc.common_ancestor(self.start.container, self.end.container)
    }

    /// The text the range covers, in tree order.
    pub fn to_text(&self, doc: &Document) -> String {
        let mut out = String::new();
        let Some(common) = self.common_ancestor(doc) else {
            return out;
        };
        let mut text_nodes = Vec::new();
        collect_text_nodes(doc, common, &mut text_nodes);

        for node in text_nodes {
            let Some(text) = doc.text(node) else {
                continue;
            };
            let length = text.chars().count();
            if compare_points(doc, &Boundary::new(node, length), &self.start) == Ordering::Less
                || compare_points(doc, &Boundary::new(node, 0), &self.end) == Ordering::Greater
            {
                continue;
            }
            let from = if node == self.start.container {
                self.start.offset
            } else {
                0
            };
            let to = if node == self.end.container {
                self.end.offset
            } else {
                length
            };
            if from < to {
                out.push_str(&text[char_to_byte(text, from)..char_to_byte(text, to)]);
            }
        }
        out
    }

    /// DOM `Range.surroundContents`: moves the range's contents into `new_parent`
    /// and inserts it where the contents were.
    ///
    /// Fails with `InvalidStateError` when the range partially selects a non-text
    /// node. All checks run before the first mutation, so a failure leaves the
    /// document untouched.
    pub fn surround_contents(&self, doc: &mut Document, new_parent: NodeId) -> DomResult<()> {
        if !doc.is_element(new_parent) {
            return Err(DomError::InvalidState(
                "surround target must be an element".into(),
            ));
        }
        if doc.is_inclusive_ancestor(new_parent, self.start.container) {
            return Err(DomError::HierarchyRequest(
                "surround target contains the range".into(),
            ));
        }
        let common = self
            .common_ancestor(doc)
            .ok_or_else(|| DomError::InvalidState("range spans unrelated trees".into()))?;

        if self.start.container == self.end.container && doc.is_text(common) {
            return self.surround_text(doc, new_parent);
        }

        for container in [self.start.container, self.end.container] {
            if partially_selects_element(doc, container, common) {
                return Err(DomError::InvalidState(
                    "range partially selects a non-text node".into(),
                ));
            }
        }

        let last = self.last_selected_child(doc, common)?;
        let first_index = if self.start.container == common {
            self.start.offset
        } else {
            let text = self.start.container;
            let index = doc.index_in_parent(text).unwrap_or_default();
            if self.start.offset == 0 {
                index
            } else if self.start.offset >= doc.length(text) {
                index + 1
            } else {
                doc.split_text(text, self.start.offset)?;
                index + 1
            }
        };
        let first = doc.children(common).get(first_index).copied();

        let selected: Vec<NodeId> = match (first, last) {
            (Some(first), Some(last)) => {
                let from = doc.index_in_parent(first).unwrap_or_default();
                let to = doc.index_in_parent(last).unwrap_or_default();
                if from <= to {
                    doc.children(common)[from..=to].to_vec()
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        };

        match selected.first().copied().or(first) {
            Some(reference) => doc.insert_before(common, new_parent, reference)?,
            None => doc.append_child(common, new_parent)?,
        }
        for node in selected {
            doc.append_child(new_parent, node)?;
        }
        Ok(())
    }

    fn last_selected_child(&self, doc: &mut Document, common: NodeId) -> DomResult<Option<NodeId>> {
        if self.end.container == common {
            return Ok(self
                .end
                .offset
                .checked_sub(1)
                .and_then(|index| doc.children(common).get(index).copied()));
        }
        let text = self.end.container;
        if self.end.offset == 0 {
            return Ok(doc.previous_sibling(text));
        }
        if self.end.offset < doc.length(text) {
            doc.split_text(text, self.end.offset)?;
        }
        Ok(Some(text))
    }

    fn surround_text(&self, doc: &mut Document, new_parent: NodeId) -> DomResult<()> {
        let text = self.start.container;
        let parent = doc
            .parent(text)
            .ok_or_else(|| DomError::HierarchyRequest("text node is detached".into()))?;

        let mut target = text;
        if self.start.offset > 0 {
            target = doc.split_text(text, self.start.offset)?;
        }
        let selected_len = self.end.offset - self.start.offset;
        if selected_len < doc.length(target) {
            doc.split_text(target, selected_len)?;
        }
        doc.insert_before(parent, new_parent, target)?;
        doc.append_child(new_parent, target)
    }
}

/// Whether an ancestor of `container` below `common` is a non-text node, which makes
/// it only partially covered by the range.
fn partially_selects_element(doc: &Document, container: NodeId, common: NodeId) -> bool {
    doc.ancestors(container)
        .into_iter()
        .take_while(|node| *node != common)
        .any(|node| !doc.is_text(node))
}

fn collect_text_nodes(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if doc.is_text(node) {
        out.push(node);
        return;
    }
    for child in doc.iter_children(node) {
        collect_text_nodes(doc, child, out);
    }
}

fn child_towards(doc: &Document, ancestor: NodeId, node: NodeId) -> Option<NodeId> {
    doc.ancestors(node)
        .into_iter()
        .find(|n| doc.parent(*n) == Some(ancestor))
}

/// Orders two boundary points in tree order.
pub(crate) fn compare_points(doc: &Document, a: &Boundary, b: &Boundary) -> Ordering {
    if a.container == b.container {
        return a.offset.cmp(&b.offset);
    }
    if doc.is_inclusive_ancestor(a.container, b.container) {
        let index = child_towards(doc, a.container, b.container)
            .and_then(|child| doc.index_in_parent(child))
            .unwrap_or_default();
        return if index < a.offset {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if doc.is_inclusive_ancestor(b.container, a.container) {
        return compare_points(doc, b, a).reverse();
    }
    if doc.precedes(a.container, b.container) {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// The user's current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ranges: Vec<Range>,
}

impl Selection {
    pub fn from_range(range: Range) -> Self {
        Self {
            ranges: vec![range],
        }
    }

    pub fn add_range(&mut self, range: Range) {
        self.ranges.push(range);
    }

    pub fn remove_all_ranges(&mut self) {
        self.ranges.clear();
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn range_at(&self, index: usize) -> Option<&Range> {
        self.ranges.get(index)
    }

    /// `Selection.toString()`: the concatenated text of every range.
    pub fn to_text(&self, doc: &Document) -> String {
        self.ranges.iter().map(|range| range.to_text(doc)).collect()
    }
}
