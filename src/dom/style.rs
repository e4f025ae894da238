use super::document::{Document, NodeId};

/// One rule of the document stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Vec<(String, String)>,
}

impl StyleRule {
    pub fn new(selector: &str, declarations: &str) -> Self {
        Self {
            selector: selector.trim().to_owned(),
            declarations: parse_style_declarations(Some(declarations)),
        }
    }

    pub fn declaration(&self, name: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Matches compound selectors built from a tag, `#id` and `.class` parts, with
    /// comma-separated alternatives. Anything carrying a pseudo-element or a
    /// combinator never matches an element.
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        self.selector
            .split(',')
            .any(|alternative| compound_matches(alternative.trim(), doc, id))
    }
}

fn compound_matches(selector: &str, doc: &Document, id: NodeId) -> bool {
    if selector.is_empty()
        || selector.contains("::")
        || selector.contains(':')
        || selector.contains(char::is_whitespace)
        || selector.contains(['>', '+', '~'])
    {
        return false;
    }
    let Some(tag) = doc.tag_name(id) else {
        return false;
    };

    let mut rest = selector;
    let tag_end = rest.find(['.', '#']).unwrap_or(rest.len());
    let wanted_tag = &rest[..tag_end];
    if !wanted_tag.is_empty() && wanted_tag != "*" && !wanted_tag.eq_ignore_ascii_case(tag) {
        return false;
    }
    rest = &rest[tag_end..];

    while !rest.is_empty() {
        let sigil = rest.as_bytes()[0];
        let body = &rest[1..];
        let end = body.find(['.', '#']).unwrap_or(body.len());
        let name = &body[..end];
        let ok = match sigil {
            b'.' => doc.has_class(id, name),
            b'#' => doc.attr(id, "id") == Some(name),
            _ => false,
        };
        if !ok {
            return false;
        }
        rest = &body[end..];
    }
    true
}

/// The document-level stylesheet. Rules are kept in insertion order; later rules
/// win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSheet {
    rules: Vec<StyleRule>,
}

impl StyleSheet {
    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn insert_rule(&mut self, rule: StyleRule) {
        self.rules.push(rule);
    }

    pub fn has_selector(&self, selector: &str) -> bool {
        self.rules.iter().any(|rule| rule.selector == selector)
    }

    /// The winning value of `name` among rules matching `id`.
    pub fn lookup(&self, doc: &Document, id: NodeId, name: &str) -> Option<&str> {
        self.rules
            .iter()
            .rev()
            .filter(|rule| rule.matches(doc, id))
            .find_map(|rule| rule.declaration(name))
    }
}

/// Splits a declaration block (`a: b; c: d`) into lowercase-name/value pairs,
/// respecting quotes and parentheses. Repeated names keep the last value.
pub fn parse_style_declarations(style_attr: Option<&str>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let Some(style_attr) = style_attr else {
        return out;
    };

    let bytes = style_attr.as_bytes();
    let mut start = 0usize;
    let mut i = 0usize;
    let mut paren_depth = 0isize;
    let mut quote: Option<u8> = None;

    while i < bytes.len() {
        let ch = bytes[i];
        match (quote, ch) {
            (Some(_), b'\\') => {
                i += 2;
                continue;
            }
            (Some(q), _) if ch == q => quote = None,
            (Some(_), _) => {}
            (None, b'\'') | (None, b'"') => quote = Some(ch),
            (None, b'(') => paren_depth += 1,
            (None, b')') => paren_depth = (paren_depth - 1).max(0),
            (None, b';') if paren_depth == 0 => {
                push_style_declaration(&style_attr[start..i], &mut out);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < style_attr.len() {
        push_style_declaration(&style_attr[start..], &mut out);
    }

    out
}

fn push_style_declaration(raw_decl: &str, out: &mut Vec<(String, String)>) {
    let decl = raw_decl.trim();
    let Some((name, value)) = decl.split_once(':') else {
        return;
    };
    let name = name.trim().to_ascii_lowercase();
    if name.is_empty() {
        return;
    }
    let value = value.trim().to_owned();

    match out.iter_mut().find(|(existing, _)| *existing == name) {
        Some(existing) => existing.1 = value,
        None => out.push((name, value)),
    }
}

pub fn serialize_style_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_style_declarations() {
        let decls = parse_style_declarations(Some(
            "color: rgb(1, 2, 3); --x: 'a;b'; COLOR: blue; bogus",
        ));
        assert_eq!(
            decls,
            vec![
                ("color".to_string(), "blue".to_string()),
                ("--x".to_string(), "'a;b'".to_string()),
            ]
        );
    }

    #[test]
    fn test_rule_matching() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.body(), "p").unwrap();
        doc.set_attr(p, "class", "lead note").unwrap();
        doc.set_attr(p, "id", "intro").unwrap();

        assert!(StyleRule::new("p", "").matches(&doc, p));
        assert!(StyleRule::new("p.lead", "").matches(&doc, p));
        assert!(StyleRule::new(".note#intro", "").matches(&doc, p));
        assert!(StyleRule::new("div, .lead", "").matches(&doc, p));
        assert!(!StyleRule::new("p.missing", "").matches(&doc, p));
        assert!(!StyleRule::new("p::before", "").matches(&doc, p));
        assert!(!StyleRule::new("body p", "").matches(&doc, p));
    }

    #[test]
    fn test_stylesheet_lookup_prefers_later_rules() {
        let mut doc = Document::new();
        let p = doc.append_element(doc.body(), "p").unwrap();
        doc.stylesheet_mut().insert_rule(StyleRule::new("p", "color: red"));
        doc.stylesheet_mut().insert_rule(StyleRule::new("p", "color: blue"));

        assert_eq!(doc.stylesheet().lookup(&doc, p, "color"), Some("blue"));
        assert_eq!(doc.stylesheet().lookup(&doc, p, "background"), None);
    }
}
