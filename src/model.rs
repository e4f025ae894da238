use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An opaque text color, serialized as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.0, self.1, self.2)
    }
}

/// A translucent background color, serialized as `[r, g, b, a]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba(pub u8, pub u8, pub u8, pub f64);

impl Rgba {
    pub fn rgb(&self) -> Rgb {
        Rgb(self.0, self.1, self.2)
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.0, self.1, self.2, self.3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighlightColors {
    #[serde(rename = "bg")]
    pub background: Rgba,
    pub text: Rgb,
}

/// One persisted highlight. Offsets are character offsets into the single text node
/// the address pointed at when the highlight was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRecord {
    #[serde(rename = "xpath")]
    pub address: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub colors: HighlightColors,
}

/// Highlights of one page, in creation order.
pub type PageHighlights = Vec<HighlightRecord>;

/// The whole persisted value: page URL to its highlights.
pub type PersistedDocument = BTreeMap<String, PageHighlights>;

/// Per-page summary used by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub url: String,
    pub highlights: usize,
}
