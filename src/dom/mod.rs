//! Arena DOM
//!
//! A small, single-threaded document model that carries exactly what the highlight
//! engine touches on a live page: elements with attributes and inline styles, text
//! nodes, a document stylesheet, ranges and the user's selection.
//!
//! Nodes are addressed by [`NodeId`] into an arena owned by [`Document`]. Detached
//! nodes stay in the arena (so a `NodeId` never dangles) but have no parent.

mod document;
mod range;
mod style;

pub use document::{Document, Element, NodeId, NodeKind};
pub use range::{Boundary, Range, Selection};
pub use style::{StyleRule, StyleSheet, parse_style_declarations, serialize_style_declarations};
