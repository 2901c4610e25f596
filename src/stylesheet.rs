//! Splits stylesheet text into selector rules and preserved `@media` blocks.
//!
//! Scanning is brace-counting over plain text. Braces or semicolons inside
//! quoted strings (for example in attribute selector values) are not
//! recognized as literals, so such stylesheets are handled best-effort.

use crate::debug::DebugLogger;
use crate::selector::parse_selector;

/// Media types that never apply to a screen rendering.
const NON_SCREEN_MEDIA: [&str; 9] = [
    "aural",
    "braille",
    "embossed",
    "handheld",
    "print",
    "projection",
    "speech",
    "tty",
    "tv",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: String,
    /// Index of the rule block in the stylesheet; selectors split from one
    /// list share it.
    pub source_order: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStyleSheet {
    pub rules: Vec<StyleRule>,
    /// Verbatim `@media ... { ... }` text for screen/all/unconditioned media.
    pub preserved_media: Vec<String>,
}

pub fn parse_stylesheet(css: &str, debug: Option<&DebugLogger>) -> ParsedStyleSheet {
    let without_comments = strip_comments(css);
    let mut parsed = ParsedStyleSheet::default();
    let mut block_index = 0usize;
    let mut scanner = Scanner::new(&without_comments);

    while let Some(item) = scanner.next_item() {
        match item {
            Item::AtStatement(name) => {
                if let Some(logger) = debug {
                    logger.log_event("inline.at_rule_skipped", &[("name", &name)]);
                }
            }
            Item::AtBlock {
                name,
                prelude,
                body,
                raw,
            } => {
                if name.eq_ignore_ascii_case("media") {
                    handle_media(&prelude, &body, &raw, &mut parsed, debug);
                } else if let Some(logger) = debug {
                    logger.log_event("inline.at_rule_skipped", &[("name", &name)]);
                    logger.increment("inline.at_rules_skipped", 1);
                }
            }
            Item::Rule { selectors, body } => {
                let index = block_index;
                block_index += 1;
                let declarations = body.trim();
                if declarations.is_empty() {
                    continue;
                }
                for selector in split_selector_list(&selectors) {
                    let selector = selector.trim();
                    if selector.is_empty() {
                        continue;
                    }
                    if let Err(err) = parse_selector(selector) {
                        if let Some(logger) = debug {
                            logger.log_event(
                                "inline.selector_skipped",
                                &[("selector", selector), ("reason", &err.message)],
                            );
                            logger.increment("inline.selectors_skipped", 1);
                        }
                        continue;
                    }
                    parsed.rules.push(StyleRule {
                        selector: selector.to_string(),
                        declarations: declarations.to_string(),
                        source_order: index,
                    });
                }
            }
        }
    }
    parsed
}

fn handle_media(
    prelude: &str,
    body: &str,
    raw: &str,
    parsed: &mut ParsedStyleSheet,
    debug: Option<&DebugLogger>,
) {
    let prelude = prelude.trim();
    let action = if body.trim().is_empty() {
        "dropped_empty"
    } else if is_non_screen_media(prelude) {
        "dropped_non_screen"
    } else {
        parsed.preserved_media.push(raw.trim().to_string());
        "preserved"
    };
    if let Some(logger) = debug {
        logger.log_event("inline.media", &[("query", prelude), ("action", action)]);
    }
}

/// True when every medium in the list is one of the non-screen media types.
fn is_non_screen_media(prelude: &str) -> bool {
    let media: Vec<&str> = prelude
        .split(',')
        .map(str::trim)
        .filter(|medium| !medium.is_empty())
        .collect();
    !media.is_empty()
        && media.iter().all(|medium| {
            NON_SCREEN_MEDIA
                .iter()
                .any(|name| medium.eq_ignore_ascii_case(name))
        })
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Splits on commas outside parentheses, brackets and quotes.
pub fn split_selector_list(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (idx, ch) in list.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&list[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

enum Item {
    /// `@import ...;`, `@charset ...;` and other block-less at-rules.
    AtStatement(String),
    AtBlock {
        name: String,
        prelude: String,
        body: String,
        /// Source text from `@` through the closing brace.
        raw: String,
    },
    Rule {
        selectors: String,
        body: String,
    },
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn next_item(&mut self) -> Option<Item> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                self.pos = self.text.len();
                return None;
            }
            self.pos += rest.len() - trimmed.len();

            if let Some(after_at) = trimmed.strip_prefix('@') {
                let name_len = after_at
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
                    .unwrap_or(after_at.len());
                let name = after_at[..name_len].to_string();
                let head_start = self.pos + 1 + name_len;
                let head = &self.text[head_start..];
                let brace = head.find('{');
                let semi = head.find(';');
                match (brace, semi) {
                    (Some(b), Some(s)) if s < b => {
                        self.pos = head_start + s + 1;
                        return Some(Item::AtStatement(name));
                    }
                    (None, Some(s)) => {
                        self.pos = head_start + s + 1;
                        return Some(Item::AtStatement(name));
                    }
                    (Some(b), _) => {
                        let at_start = self.pos;
                        let prelude = head[..b].to_string();
                        let body_start = head_start + b + 1;
                        let (body, next) = self.block_from(body_start);
                        self.pos = next;
                        return Some(Item::AtBlock {
                            name,
                            prelude,
                            body,
                            raw: self.text[at_start..next].to_string(),
                        });
                    }
                    (None, None) => {
                        self.pos = self.text.len();
                        return Some(Item::AtStatement(name));
                    }
                }
            }

            let Some(open) = trimmed.find('{') else {
                self.pos = self.text.len();
                return None;
            };
            // A stray closing brace before the next block is skipped.
            if let Some(close) = trimmed[..open].find('}') {
                self.pos += close + 1;
                continue;
            }
            let selectors = trimmed[..open].to_string();
            let body_start = self.pos + open + 1;
            let body_end = self.text[body_start..]
                .find('}')
                .map(|i| body_start + i)
                .unwrap_or(self.text.len());
            let body = self.text[body_start..body_end].to_string();
            // Nested blocks inside a rule body are not part of the grammar.
            if body.contains('{') {
                let (_, next) = self.block_from(body_start);
                self.pos = next;
                continue;
            }
            self.pos = (body_end + 1).min(self.text.len());
            return Some(Item::Rule { selectors, body });
        }
    }

    /// Reads a brace-balanced body starting just after `{`; returns the body
    /// and the position after the matching `}`.
    fn block_from(&self, start: usize) -> (String, usize) {
        let mut depth = 1usize;
        for (offset, ch) in self.text[start..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let end = start + offset;
                        return (self.text[start..end].to_string(), end + 1);
                    }
                }
                _ => {}
            }
        }
        (self.text[start..].to_string(), self.text.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectors(parsed: &ParsedStyleSheet) -> Vec<&str> {
        parsed.rules.iter().map(|r| r.selector.as_str()).collect()
    }

    #[test]
    fn splits_selector_lists_and_keeps_block_order() {
        let parsed = parse_stylesheet("h1, h2 { color: red; } p { margin: 0 }", None);
        assert_eq!(selectors(&parsed), vec!["h1", "h2", "p"]);
        assert_eq!(parsed.rules[0].source_order, 0);
        assert_eq!(parsed.rules[1].source_order, 0);
        assert_eq!(parsed.rules[2].source_order, 1);
        assert_eq!(parsed.rules[0].declarations, "color: red;");
    }

    #[test]
    fn strips_comments_imports_and_empty_rules() {
        let css = "@import url(x.css);\n/* p { color: red } */ a { } em { font-style: italic }";
        let parsed = parse_stylesheet(css, None);
        assert_eq!(selectors(&parsed), vec!["em"]);
        assert!(parsed.preserved_media.is_empty());
    }

    #[test]
    fn filters_unsupported_selectors() {
        let css = "a:hover, a:first-child, li:nth-child(2n+1), p::before, a ~ b, td { color: red }";
        let parsed = parse_stylesheet(css, None);
        assert_eq!(
            selectors(&parsed),
            vec!["a:first-child", "li:nth-child(2n+1)", "td"]
        );
    }

    #[test]
    fn media_blocks_are_preserved_or_dropped_by_medium() {
        let css = "@media print { p { color: red } }\n\
                   @media screen { p { color: red } }\n\
                   @media tv, braille { p { color: red } }\n\
                   @media all and (max-width: 600px) { .x { width: 100% } }\n\
                   @media screen { }\n\
                   p { color: blue }";
        let parsed = parse_stylesheet(css, None);
        assert_eq!(selectors(&parsed), vec!["p"]);
        assert_eq!(
            parsed.preserved_media,
            vec![
                "@media screen { p { color: red } }".to_string(),
                "@media all and (max-width: 600px) { .x { width: 100% } }".to_string(),
            ]
        );
    }

    #[test]
    fn other_block_at_rules_are_skipped_whole() {
        let css = "@keyframes spin { from { top: 0 } to { top: 10px } } \
                   @font-face { font-family: X; src: url(x.woff) } p { color: red }";
        let parsed = parse_stylesheet(css, None);
        assert_eq!(selectors(&parsed), vec!["p"]);
    }

    #[test]
    fn comma_split_respects_brackets_and_parens() {
        assert_eq!(
            split_selector_list("a[title=\"x,y\"], li:nth-child(2n+1)"),
            vec!["a[title=\"x,y\"]", " li:nth-child(2n+1)"]
        );
    }

    #[test]
    fn overflowing_nth_argument_drops_only_that_rule() {
        let parsed = parse_stylesheet(
            "li:nth-child(-9223372036854775808n-1){color:red} p{color:blue}",
            None,
        );
        assert_eq!(selectors(&parsed), vec!["p"]);
        assert_eq!(parsed.rules[0].source_order, 1);
    }
}
