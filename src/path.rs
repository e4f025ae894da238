//! Structural path addressing.
//!
//! A node is addressed by the `tag[position]` steps leading to it from `body`, e.g.
//! `/html/body/div[1]/p[2]`. Positions count preceding element siblings with the same
//! tag, so an address is only as stable as the markup around it: inserting or removing
//! a sibling silently shifts it onto another node.

use crate::dom::{Document, NodeId};

/// The address of `body`, where every walk stops.
pub const ROOT_TOKEN: &str = "/html/body";

/// Builds the structural path of `node`. Text nodes are addressed through their
/// parent element. Returns `None` for nodes outside `body`.
pub fn build_path(doc: &Document, node: NodeId) -> Option<String> {
    let mut current = if doc.is_text(node) {
        doc.parent_element(node)?
    } else {
        node
    };

    let mut segments = Vec::new();
    while current != doc.body() {
        let tag = doc.tag_name(current)?;
        segments.push(format!("{tag}[{}]", same_tag_position(doc, current, tag)));
        current = doc.parent_element(current)?;
    }

    let mut path = String::from(ROOT_TOKEN);
    for segment in segments.iter().rev() {
        path.push('/');
        path.push_str(segment);
    }
    Some(path)
}

fn same_tag_position(doc: &Document, node: NodeId, tag: &str) -> usize {
    let mut position = 1;
    let mut sibling = doc.previous_sibling(node);
    while let Some(prev) = sibling {
        if doc
            .tag_name(prev)
            .is_some_and(|other| other.eq_ignore_ascii_case(tag))
        {
            position += 1;
        }
        sibling = doc.previous_sibling(prev);
    }
    position
}

#[derive(Debug, PartialEq, Eq)]
struct Step<'a> {
    name: &'a str,
    position: Option<usize>,
}

fn parse_steps(path: &str) -> Option<Vec<Step<'_>>> {
    let rest = path.strip_prefix('/')?;
    rest.split('/').map(parse_step).collect()
}

fn parse_step(raw: &str) -> Option<Step<'_>> {
    let (name, position) = match raw.split_once('[') {
        Some((name, predicate)) => {
            let index = predicate.strip_suffix(']')?.trim().parse::<usize>().ok()?;
            (name, Some(index))
        }
        None => (raw, None),
    };
    let valid_name = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '*');
    valid_name.then_some(Step { name, position })
}

/// Resolves a structural path against the current document.
///
/// Steps are evaluated as ordered child-axis node sets, so a step without a position
/// keeps every same-named child and the first node of the final set, in document
/// order, is returned. Malformed paths and misses yield `None`.
pub fn resolve_path(doc: &Document, path: &str) -> Option<NodeId> {
    let Some(steps) = parse_steps(path) else {
        tracing::debug!(path, "malformed structural path");
        return None;
    };

    let mut context = vec![doc.root()];
    for step in &steps {
        let mut next = Vec::new();
        for node in &context {
            let mut matching = doc.iter_children(*node).filter(|child| {
                doc.tag_name(*child)
                    .is_some_and(|tag| step.name == "*" || tag.eq_ignore_ascii_case(step.name))
            });
            match step.position {
                // XPath positions are 1-based; `[0]` never matches.
                Some(position) => next.extend(position.checked_sub(1).and_then(|i| matching.nth(i))),
                None => next.extend(matching),
            }
        }
        if next.is_empty() {
            return None;
        }
        context = next;
    }
    context.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Document, Vec<NodeId>) {
        let mut doc = Document::new();
        let body = doc.body();
        let first = doc.append_element(body, "p").unwrap();
        doc.append_text(first, "first").unwrap();
        let div = doc.append_element(body, "div").unwrap();
        let second = doc.append_element(body, "p").unwrap();
        let hello = doc.append_text(second, "hello").unwrap();
        let nested = doc.append_element(div, "span").unwrap();
        let nested_text = doc.append_text(nested, "inner").unwrap();
        (doc, vec![first, div, second, hello, nested, nested_text])
    }

    #[test]
    fn test_second_paragraph_address() {
        let (doc, nodes) = sample();
        assert_eq!(build_path(&doc, nodes[3]).as_deref(), Some("/html/body/p[2]"));
        assert_eq!(build_path(&doc, nodes[2]).as_deref(), Some("/html/body/p[2]"));
        assert_eq!(
            build_path(&doc, nodes[5]).as_deref(),
            Some("/html/body/div[1]/span[1]")
        );
        assert_eq!(build_path(&doc, doc.body()).as_deref(), Some(ROOT_TOKEN));
    }

    #[test]
    fn test_resolve_inverts_build_for_every_element() {
        let (doc, nodes) = sample();
        for node in nodes.into_iter().filter(|n| doc.is_element(*n)) {
            let path = build_path(&doc, node).unwrap();
            assert_eq!(resolve_path(&doc, &path), Some(node), "path {path}");
        }
        assert_eq!(resolve_path(&doc, ROOT_TOKEN), Some(doc.body()));
    }

    #[test]
    fn test_nodes_outside_body_have_no_address() {
        let mut doc = Document::new();
        let title = doc.append_element(doc.head(), "title").unwrap();
        let detached = doc.create_element("p");
        assert_eq!(build_path(&doc, title), None);
        assert_eq!(build_path(&doc, detached), None);
    }

    #[test]
    fn test_resolve_failures_return_none() {
        let (doc, _) = sample();
        assert_eq!(resolve_path(&doc, "/html/body/p[3]"), None);
        assert_eq!(resolve_path(&doc, "/html/body/p[0]"), None);
        assert_eq!(resolve_path(&doc, "html/body"), None);
        assert_eq!(resolve_path(&doc, "/html/body/p[x]"), None);
        assert_eq!(resolve_path(&doc, "/html/body/p[1"), None);
        assert_eq!(resolve_path(&doc, ""), None);
    }

    #[test]
    fn test_resolve_without_position_takes_first_match() {
        let (doc, nodes) = sample();
        assert_eq!(resolve_path(&doc, "/html/body/p"), Some(nodes[0]));
    }

    #[test]
    fn test_sibling_insertion_shifts_address() {
        let (mut doc, nodes) = sample();
        let path = build_path(&doc, nodes[2]).unwrap();
        let inserted = doc.create_element("p");
        doc.insert_before(doc.body(), inserted, nodes[0]).unwrap();

        assert_eq!(resolve_path(&doc, &path), Some(nodes[0]));
    }
}
