//! Runs the inlining phases over one parsed document.

use kuchiki::NodeRef;
use std::collections::HashSet;

use crate::cache::{RankedStyleSheet, StyleCache};
use crate::debug::DebugLogger;
use crate::declarations::{DeclarationMap, MergeMode, normalize_property_names};
use crate::dom::{self, Document};
use crate::perf::{PerfLogger, PhaseTimer};
use crate::specificity::rank_rules;
use crate::stylesheet::parse_stylesheet;

pub(crate) struct InlineContext<'a> {
    pub css: &'a str,
    pub merge_mode: MergeMode,
    pub cache: &'a mut StyleCache,
    pub debug: Option<&'a DebugLogger>,
    pub perf: Option<&'a PerfLogger>,
    pub run_id: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct InlineReport {
    pub rules: usize,
    pub styled_elements: usize,
    pub restored_elements: usize,
    pub hidden_removed: usize,
    pub media_blocks: usize,
}

pub(crate) fn apply(document: &Document, ctx: InlineContext<'_>) -> InlineReport {
    let InlineContext {
        css,
        merge_mode,
        cache,
        debug,
        perf,
        run_id,
    } = ctx;
    let mut report = InlineReport::default();
    let mut timer = PhaseTimer::start(perf, run_id);

    let originals = capture_original_styles(document);
    timer.lap("inline.capture");

    let mut combined_css = css.to_string();
    for block in document.take_style_blocks() {
        combined_css.push_str("\n\n");
        combined_css.push_str(&block);
    }
    timer.lap("inline.hoist");

    let sheet = cache.stylesheet(&combined_css, |cache| {
        let parsed = parse_stylesheet(&combined_css, debug);
        RankedStyleSheet {
            rules: rank_rules(parsed.rules, cache),
            preserved_media: parsed.preserved_media,
        }
    });
    report.rules = sheet.rules.len();
    timer.lap("inline.stylesheet");

    for ranked in &sheet.rules {
        let query = match cache.query(&ranked.rule.selector) {
            Ok(query) => query,
            Err(err) => {
                if let Some(logger) = debug {
                    logger.log_event(
                        "inline.selector_untranslatable",
                        &[("selector", &err.selector), ("reason", &err.message)],
                    );
                }
                continue;
            }
        };
        let incoming = DeclarationMap::parse(&ranked.rule.declarations);
        let matched = document.select(&query);
        for node in &matched {
            let existing = dom::attribute(node, "style");
            let current = existing
                .as_deref()
                .map(DeclarationMap::parse)
                .unwrap_or_default();
            let merged = current.merge(&incoming, merge_mode);
            if existing.is_none() && merged.is_empty() {
                continue;
            }
            dom::set_attribute(node, "style", &merged.serialize());
        }
        report.styled_elements += matched.len();
        if let Some(logger) = debug {
            logger.log_event(
                "inline.rule",
                &[
                    ("selector", &ranked.rule.selector),
                    ("query", &query.to_string()),
                    ("specificity", &ranked.specificity.to_string()),
                    ("matched", &matched.len().to_string()),
                ],
            );
            logger.increment("inline.rules_applied", 1);
            logger.increment("inline.elements_styled", matched.len() as u64);
        }
    }
    timer.lap("inline.apply");

    for (node, original) in &originals {
        let current = dom::attribute(node, "style")
            .as_deref()
            .map(DeclarationMap::parse)
            .unwrap_or_default();
        let restored = original.merge(&current, MergeMode::OldWins);
        dom::set_attribute(node, "style", &restored.serialize());
    }
    report.restored_elements = originals.len();
    timer.lap("inline.restore");

    report.hidden_removed = strip_hidden(document, debug);
    timer.lap("inline.strip_hidden");

    if !sheet.preserved_media.is_empty() {
        let text = sheet.preserved_media.join("\n");
        if document.append_style_block(&text) {
            report.media_blocks = sheet.preserved_media.len();
        } else if let Some(logger) = debug {
            logger.log_event("inline.media_dropped", &[("reason", "no body element")]);
        }
    }
    timer.lap("inline.reinject");

    if let Some(perf) = perf {
        let stats = cache.stats();
        perf.log_counts(
            "inline.run",
            run_id,
            &[
                ("rules", report.rules as u64),
                ("styled_elements", report.styled_elements as u64),
                ("hidden_removed", report.hidden_removed as u64),
                ("cache_hits", stats.hits),
                ("cache_misses", stats.misses),
            ],
        );
    }
    report
}

/// Lower-cases property names of every inline style in place and remembers
/// each element's original declarations, keyed by its structural path.
fn capture_original_styles(document: &Document) -> Vec<(NodeRef, DeclarationMap)> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut originals = Vec::new();
    for node in document.elements() {
        let Some(style) = dom::attribute(&node, "style") else {
            continue;
        };
        let normalized = normalize_property_names(&style);
        if seen.insert(dom::node_path(&node)) {
            originals.push((node.clone(), DeclarationMap::parse(&normalized)));
        }
        dom::set_attribute(&node, "style", &normalized);
    }
    originals
}

fn strip_hidden(document: &Document, debug: Option<&DebugLogger>) -> usize {
    let hidden: Vec<NodeRef> = document
        .elements()
        .into_iter()
        .filter(|node| {
            dom::attribute(node, "style")
                .is_some_and(|style| DeclarationMap::parse(&style).hides_element())
        })
        .collect();
    let mut removed = 0usize;
    for node in &hidden {
        let path = dom::node_path(node);
        if dom::detach(node) {
            removed += 1;
            if let Some(logger) = debug {
                logger.log_event("inline.hidden_removed", &[("path", &path)]);
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(html: &str, css: &str, merge_mode: MergeMode) -> (String, InlineReport) {
        let mut cache = StyleCache::new();
        let document = Document::parse(html);
        let report = apply(
            &document,
            InlineContext {
                css,
                merge_mode,
                cache: &mut cache,
                debug: None,
                perf: None,
                run_id: 0,
            },
        );
        (document.serialize().expect("serialize"), report)
    }

    #[test]
    fn rules_apply_in_precedence_order() {
        let (html, report) = run(
            r#"<p id="a" class="b">x</p>"#,
            "#a { color: red } .b { color: blue; margin: 0 } p { color: green; padding: 1px }",
            MergeMode::NewWins,
        );
        assert_eq!(report.rules, 3);
        assert!(
            html.contains(r#"style="color:red;padding:1px;margin:0;""#),
            "unexpected output: {html}"
        );
    }

    #[test]
    fn original_inline_style_outranks_rules() {
        let (html, report) = run(
            r#"<p style="COLOR: green">x</p>"#,
            "p { color: red; font-weight: bold }",
            MergeMode::NewWins,
        );
        assert_eq!(report.restored_elements, 1);
        assert!(
            html.contains(r#"style="color:green;font-weight:bold;""#),
            "unexpected output: {html}"
        );
    }

    #[test]
    fn old_wins_keeps_earlier_rule_values() {
        let (html, _) = run(
            "<p>x</p>",
            "p { color: red } p { color: blue; margin: 0 }",
            MergeMode::OldWins,
        );
        assert!(
            html.contains(r#"style="color:red;margin:0;""#),
            "unexpected output: {html}"
        );
    }

    #[test]
    fn embedded_style_blocks_follow_supplied_css() {
        let (html, _) = run(
            "<html><head><style>p { color: blue }</style></head><body><p>x</p></body></html>",
            "p { color: red }",
            MergeMode::NewWins,
        );
        assert!(html.contains(r#"style="color:blue;""#), "unexpected output: {html}");
        assert!(!html.contains("<style"), "style blocks must be removed: {html}");
    }

    #[test]
    fn hidden_elements_are_removed_with_subtree() {
        let (html, report) = run(
            r#"<div><span>gone<b>inner</b></span><em style="Display : NONE">also</em><i>kept</i></div>"#,
            "span { display: none }",
            MergeMode::NewWins,
        );
        assert_eq!(report.hidden_removed, 2);
        assert!(!html.contains("gone") && !html.contains("inner") && !html.contains("also"));
        assert!(html.contains("<i>kept</i>"), "unexpected output: {html}");
    }

    #[test]
    fn nested_hidden_elements_do_not_fail() {
        let (html, report) = run(
            r#"<div class="h"><p class="h">x</p></div><p>y</p>"#,
            ".h { display: none }",
            MergeMode::NewWins,
        );
        assert_eq!(report.hidden_removed, 2);
        assert!(html.contains("<p>y</p>"), "unexpected output: {html}");
    }

    #[test]
    fn preserved_media_is_reinjected_not_inlined() {
        let (html, report) = run(
            "<html><body><p>x</p></body></html>",
            "@media print { p { color: red } } @media screen { p { color: red } }",
            MergeMode::NewWins,
        );
        assert_eq!(report.media_blocks, 1);
        assert!(!html.contains("style=\""), "media rules must not be inlined: {html}");
        assert!(
            html.contains("<style type=\"text/css\">@media screen { p { color: red } }</style></body>"),
            "unexpected output: {html}"
        );
        assert!(!html.contains("print"));
    }

    #[test]
    fn empty_declaration_text_leaves_unstyled_elements_alone() {
        let (html, _) = run("<p>x</p>", "p { garbage }", MergeMode::NewWins);
        assert!(!html.contains("style="), "unexpected output: {html}");
    }

    #[test]
    fn media_without_body_is_skipped_silently() {
        let (html, report) = run(
            r#"<html><frameset><frame src="a"></frameset></html>"#,
            "@media screen { p { color: red } }",
            MergeMode::NewWins,
        );
        assert_eq!(report.media_blocks, 0);
        assert!(!html.contains("@media"), "unexpected output: {html}");
        assert!(html.contains("<frameset>"), "unexpected output: {html}");
    }
}
