//! Contrast-driven highlight color selection.

use crate::dom::{Document, NodeId};
use crate::model::{HighlightColors, Rgb, Rgba};

/// What a candidate does with the page's text color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextTreatment {
    Preserve,
    Force(Rgb),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub background: Rgba,
    pub text: TextTreatment,
}

impl Candidate {
    pub fn colors_for(&self, text: Rgb) -> HighlightColors {
        HighlightColors {
            background: self.background,
            text: match self.text {
                TextTreatment::Preserve => text,
                TextTreatment::Force(forced) => forced,
            },
        }
    }
}

/// Evaluated in order; an earlier candidate wins ties.
pub const CANDIDATES: [Candidate; 2] = [
    Candidate {
        background: Rgba(255, 255, 200, 0.5),
        text: TextTreatment::Preserve,
    },
    Candidate {
        background: Rgba(50, 50, 0, 0.7),
        text: TextTreatment::Force(Rgb::WHITE),
    },
];

/// sRGB relative luminance.
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    let channel = |c: u8| {
        let c = f64::from(c) / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * channel(r) + 0.7152 * channel(g) + 0.0722 * channel(b)
}

pub fn rgb_luminance(color: Rgb) -> f64 {
    luminance(color.0, color.1, color.2)
}

pub fn contrast_ratio(l1: f64, l2: f64) -> f64 {
    let lighter = l1.max(l2);
    let darker = l1.min(l2);
    (lighter + 0.05) / (darker + 0.05)
}

/// Picks the candidate whose background contrasts most with `text`.
pub fn select_colors(text: Rgb) -> HighlightColors {
    let text_luminance = rgb_luminance(text);
    let mut best: Option<(f64, &Candidate)> = None;
    for candidate in &CANDIDATES {
        let contrast = contrast_ratio(text_luminance, rgb_luminance(candidate.background.rgb()));
        if best.is_none_or(|(best_contrast, _)| contrast > best_contrast) {
            best = Some((contrast, candidate));
        }
    }
    let (_, chosen) = best.unwrap_or((0.0, &CANDIDATES[0]));
    chosen.colors_for(text)
}

/// Parses any CSS color into integer channels, dropping alpha.
pub fn parse_css_color(value: &str) -> Option<Rgb> {
    let color = csscolorparser::parse(value.trim()).ok()?;
    let [r, g, b, _] = color.to_rgba8();
    Some(Rgb(r, g, b))
}

/// The effective text color of `element`: its own or the nearest ancestor's `color`,
/// from inline style first and then the document stylesheet. Text nodes are read
/// through their parent. Pages that never set a color render black.
pub fn read_text_color(doc: &Document, element: NodeId) -> Rgb {
    let start = if doc.is_text(element) {
        doc.parent(element)
    } else {
        Some(element)
    };

    let mut cursor = start;
    while let Some(node) = cursor {
        if doc.is_element(node) {
            let declared = doc
                .style_property(node, "color")
                .or_else(|| doc.stylesheet().lookup(doc, node, "color").map(str::to_owned));
            if let Some(value) = declared {
                match parse_css_color(&value) {
                    Some(rgb) => return rgb,
                    None => tracing::debug!(value = %value, "unusable color declaration, inheriting"),
                }
            }
        }
        cursor = doc.parent(node);
    }
    Rgb::BLACK
}
