mod cache;
mod debug;
mod declarations;
mod dom;
mod error;
mod inline;
mod markup;
mod nth;
mod perf;
#[cfg(feature = "python")]
mod python;
mod query;
mod selector;
mod specificity;
mod stylesheet;

pub use cache::{CacheKey, CacheKind, CacheStats};
use cache::StyleCache;
use debug::DebugLogger;
pub use declarations::{DeclarationMap, MergeMode};
pub use error::{InlineError, SelectorError};
pub use nth::{NthIndex, PositionTest, parse_nth};
use perf::PerfLogger;
pub use query::{Axis, NodeTest, PositionScope, Predicate, Query, Step, compile, translate};
pub use selector::{AttrFilter, Combinator, Compound, Selector, Structural, parse_selector};
pub use specificity::{RankedRule, specificity};
pub use stylesheet::{ParsedStyleSheet, StyleRule, split_selector_list};
use std::sync::Arc;

const DEFAULT_UNPROCESSABLE_TAGS: [&str; 1] = ["wbr"];

/// Splits `css` into ordered style rules and the `@media` blocks kept for
/// reinsertion.
pub fn parse_stylesheet(css: &str) -> ParsedStyleSheet {
    stylesheet::parse_stylesheet(css, None)
}

/// Inlines a stylesheet into the `style` attributes of an HTML document.
///
/// One engine owns its caches; reuse it to apply the same stylesheet to
/// many documents in sequence.
pub struct Inliner {
    html: String,
    css: String,
    unprocessable_tags: Vec<String>,
    preserve_encoding: bool,
    merge_mode: MergeMode,
    cache: StyleCache,
    debug: Option<Arc<DebugLogger>>,
    perf: Option<Arc<PerfLogger>>,
    runs: u64,
}

#[derive(Clone)]
pub struct InlinerBuilder {
    html: String,
    css: String,
    unprocessable_tags: Vec<String>,
    preserve_encoding: bool,
    merge_mode: MergeMode,
    debug_path: Option<std::path::PathBuf>,
    perf_path: Option<std::path::PathBuf>,
}

impl Inliner {
    pub fn new(html: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            unprocessable_tags: DEFAULT_UNPROCESSABLE_TAGS
                .iter()
                .map(|tag| tag.to_string())
                .collect(),
            preserve_encoding: false,
            merge_mode: MergeMode::NewWins,
            cache: StyleCache::new(),
            debug: None,
            perf: None,
            runs: 0,
        }
    }

    pub fn builder() -> InlinerBuilder {
        InlinerBuilder::new()
    }

    pub fn set_html(&mut self, html: impl Into<String>) {
        self.html = html.into();
    }

    /// Replaces the stylesheet. Only the stylesheet table of the cache is
    /// invalidated; specificity and query entries are keyed by selector text.
    pub fn set_css(&mut self, css: impl Into<String>) {
        self.css = css.into();
        self.cache.clear_kind(CacheKind::StyleSheet);
    }

    pub fn add_unprocessable_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self
            .unprocessable_tags
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&tag))
        {
            self.unprocessable_tags.push(tag);
        }
    }

    pub fn remove_unprocessable_tag(&mut self, tag: &str) {
        self.unprocessable_tags
            .retain(|t| !t.eq_ignore_ascii_case(tag));
    }

    pub fn unprocessable_tags(&self) -> &[String] {
        &self.unprocessable_tags
    }

    // When false (default) non-ASCII output is written as numeric character
    // references; when true the document text is returned as UTF-8.
    pub fn set_preserve_encoding(&mut self, enabled: bool) {
        self.preserve_encoding = enabled;
    }

    pub fn preserve_encoding(&self) -> bool {
        self.preserve_encoding
    }

    pub fn set_merge_mode(&mut self, mode: MergeMode) {
        self.merge_mode = mode;
    }

    pub fn merge_mode(&self) -> MergeMode {
        self.merge_mode
    }

    pub fn set_overwrite_duplicate_styles(&mut self, enabled: bool) {
        self.merge_mode = if enabled {
            MergeMode::NewWins
        } else {
            MergeMode::OldWins
        };
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn clear_cache_kind(&mut self, kind: CacheKind) {
        self.cache.clear_kind(kind);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Inlines the stored stylesheet into the stored HTML.
    pub fn inline(&mut self) -> Result<String, InlineError> {
        let html = self.html.clone();
        self.inline_html(&html)
    }

    /// Inlines the stored stylesheet into `html` without replacing the
    /// stored document.
    pub fn inline_html(&mut self, html: &str) -> Result<String, InlineError> {
        self.runs = self.runs.wrapping_add(1);
        let run_id = self.runs;
        let debug = self.debug.as_deref();
        let perf = self.perf.as_deref();
        let mut timer = perf::PhaseTimer::start(perf, run_id);

        let filtered = markup::strip_tags(html, &self.unprocessable_tags);
        timer.lap("inline.filter");
        let document = dom::Document::parse(&filtered);
        timer.lap("inline.parse");

        let report = inline::apply(
            &document,
            inline::InlineContext {
                css: &self.css,
                merge_mode: self.merge_mode,
                cache: &mut self.cache,
                debug,
                perf,
                run_id,
            },
        );

        let mut timer = perf::PhaseTimer::start(perf, run_id);
        let serialized = document.serialize()?;
        let output = if self.preserve_encoding {
            serialized
        } else {
            markup::encode_entities(&serialized)
        };
        timer.lap("inline.serialize");

        if let Some(logger) = debug {
            logger.increment("inline.runs", 1);
            logger.increment("inline.hidden_removed", report.hidden_removed as u64);
            logger.increment("inline.media_blocks", report.media_blocks as u64);
            logger.increment("inline.restored_elements", report.restored_elements as u64);
        }
        self.emit_debug_summary("inline");
        Ok(output)
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
        if let Some(perf) = self.perf.as_deref() {
            perf.flush();
        }
    }
}

impl Default for InlinerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InlinerBuilder {
    pub fn new() -> Self {
        Self {
            html: String::new(),
            css: String::new(),
            unprocessable_tags: DEFAULT_UNPROCESSABLE_TAGS
                .iter()
                .map(|tag| tag.to_string())
                .collect(),
            preserve_encoding: false,
            merge_mode: MergeMode::NewWins,
            debug_path: None,
            perf_path: None,
        }
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    pub fn css(mut self, css: impl Into<String>) -> Self {
        self.css = css.into();
        self
    }

    pub fn unprocessable_tag(mut self, tag: impl Into<String>) -> Self {
        self.unprocessable_tags.push(tag.into());
        self
    }

    // Replaces the default list (`wbr`).
    pub fn unprocessable_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unprocessable_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn preserve_encoding(mut self, enabled: bool) -> Self {
        self.preserve_encoding = enabled;
        self
    }

    pub fn merge_mode(mut self, mode: MergeMode) -> Self {
        self.merge_mode = mode;
        self
    }

    pub fn overwrite_duplicate_styles(mut self, enabled: bool) -> Self {
        self.merge_mode = if enabled {
            MergeMode::NewWins
        } else {
            MergeMode::OldWins
        };
        self
    }

    // JSON-lines record of skipped selectors, media decisions, applied rules
    // and removed elements.
    pub fn debug_log(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Inliner, InlineError> {
        let mut unprocessable_tags: Vec<String> = Vec::new();
        for tag in self.unprocessable_tags {
            let trimmed = tag.trim();
            if trimmed.is_empty()
                || !trimmed
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
            {
                return Err(InlineError::InvalidConfiguration(format!(
                    "unprocessable tag name {tag:?} must be ASCII letters, digits or '-'"
                )));
            }
            if !unprocessable_tags
                .iter()
                .any(|t| t.eq_ignore_ascii_case(trimmed))
            {
                unprocessable_tags.push(trimmed.to_string());
            }
        }
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        let perf = if let Some(path) = self.perf_path {
            Some(Arc::new(PerfLogger::new(path)?))
        } else {
            None
        };
        Ok(Inliner {
            html: self.html,
            css: self.css,
            unprocessable_tags,
            preserve_encoding: self.preserve_encoding,
            merge_mode: self.merge_mode,
            cache: StyleCache::new(),
            debug,
            perf,
            runs: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_log_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("inliner_{tag}_{nanos}.log"))
    }

    fn inline(html: &str, css: &str) -> String {
        Inliner::new(html, css).inline().expect("inline")
    }

    fn style_of(html: &str, id: &str) -> Option<String> {
        let doc = dom::Document::parse(html);
        let query = translate(&format!("#{id}")).expect("id selector");
        doc.select(&query)
            .first()
            .and_then(|node| dom::attribute(node, "style"))
    }

    #[test]
    fn id_outranks_class_regardless_of_source_order() {
        let html = r#"<p id="a" class="b">x</p>"#;
        for css in ["#a{color:red} .b{color:blue}", ".b{color:blue} #a{color:red}"] {
            let out = inline(html, css);
            assert_eq!(style_of(&out, "a").as_deref(), Some("color:red;"), "css: {css}");
        }
    }

    #[test]
    fn later_rule_wins_at_equal_specificity() {
        let out = inline(r#"<p id="p">x</p>"#, "p{color:red} p{color:blue}");
        assert_eq!(style_of(&out, "p").as_deref(), Some("color:blue;"));
    }

    #[test]
    fn inline_style_beats_matching_rule() {
        let out = inline(r#"<p id="p" style="color:green">x</p>"#, "p{color:red}");
        assert_eq!(style_of(&out, "p").as_deref(), Some("color:green;"));
    }

    #[test]
    fn merge_mode_toggle_keeps_existing_values() {
        let mut inliner = Inliner::new(r#"<p id="p">x</p>"#, "p{color:green} p{color:red}");
        inliner.set_overwrite_duplicate_styles(false);
        assert_eq!(inliner.merge_mode(), MergeMode::OldWins);
        let out = inliner.inline().expect("inline");
        assert_eq!(style_of(&out, "p").as_deref(), Some("color:green;"));
    }

    #[test]
    fn class_conjunction_requires_every_class() {
        let out = inline(
            r#"<p id="ab" class="a b">x</p><p id="a" class="a">y</p>"#,
            ".a.b{color:red}",
        );
        assert_eq!(style_of(&out, "ab").as_deref(), Some("color:red;"));
        assert_eq!(style_of(&out, "a"), None);
    }

    #[test]
    fn media_print_dropped_and_screen_preserved() {
        let out = inline(
            "<html><body><p id=\"p\">x</p></body></html>",
            "@media print{p{color:red}} @media screen{p{color:red}}",
        );
        assert_eq!(style_of(&out, "p"), None);
        assert!(
            out.contains("<style type=\"text/css\">@media screen{p{color:red}}</style>"),
            "unexpected output: {out}"
        );
        assert!(!out.contains("@media print"));
    }

    #[test]
    fn hidden_elements_are_absent_from_output() {
        let out = inline(
            "<div><span>secret <b>nested</b></span><p>shown</p></div>",
            "span{display:none}",
        );
        assert!(!out.contains("secret") && !out.contains("nested"));
        assert!(out.contains("<p>shown</p>"));
    }

    #[test]
    fn output_is_idempotent_under_empty_stylesheet() {
        let first = inline(
            r#"<html><head><style>p{COLOR:red;margin:0} @media screen{p{color:blue}}</style></head><body><p style="Font-Weight:bold">x</p><div class="c">y</div></body></html>"#,
            ".c{padding:1px}",
        );
        let second = inline(&first, "");
        assert_eq!(first, second);
    }

    #[test]
    fn unprocessable_tags_are_stripped_before_parsing() {
        let mut inliner = Inliner::new("<p>a<wbr>b<blink>c</blink></p>", "");
        inliner.add_unprocessable_tag("blink");
        let out = inliner.inline().expect("inline");
        assert!(out.contains("<p>abc</p>"), "unexpected output: {out}");

        inliner.remove_unprocessable_tag("wbr");
        inliner.remove_unprocessable_tag("BLINK");
        assert!(inliner.unprocessable_tags().is_empty());
    }

    #[test]
    fn encoding_flag_controls_entity_output() {
        let html = "<p>café</p>";
        let mut inliner = Inliner::new(html, "");
        let entity_safe = inliner.inline().expect("inline");
        assert!(entity_safe.contains("caf&#233;"), "{entity_safe}");
        inliner.set_preserve_encoding(true);
        let preserved = inliner.inline().expect("inline");
        assert!(preserved.contains("café"), "{preserved}");
    }

    #[test]
    fn style_text_in_attributes_keeps_output_entity_safe() {
        let out = inline("<p title=\"<style>\">x</p><p>café</p>", "");
        assert!(out.contains("<p>caf&#233;</p>"), "unexpected output: {out}");
        assert!(!out.contains('é'), "unexpected output: {out}");
    }

    #[test]
    fn set_css_invalidates_only_stylesheet_cache() {
        let mut inliner = Inliner::new("<p class=\"x\">a</p>", ".x{color:red}");
        inliner.inline().expect("inline");
        let stats = inliner.cache_stats();
        assert_eq!(
            (stats.stylesheets, stats.specificities, stats.queries),
            (1, 1, 1)
        );

        inliner.set_css(".x{color:blue}");
        let stats = inliner.cache_stats();
        assert_eq!(
            (stats.stylesheets, stats.specificities, stats.queries),
            (0, 1, 1)
        );

        inliner.inline().expect("inline");
        inliner.clear_cache_kind(CacheKind::Query);
        assert_eq!(inliner.cache_stats().queries, 0);
        inliner.clear_cache();
        let stats = inliner.cache_stats();
        assert_eq!(
            (stats.stylesheets, stats.specificities, stats.queries),
            (0, 0, 0)
        );
    }

    #[test]
    fn repeated_runs_reuse_cached_stylesheet() {
        let mut inliner = Inliner::new("", "p{color:red}");
        let a = inliner.inline_html("<p>1</p>").expect("inline");
        let misses = inliner.cache_stats().misses;
        let b = inliner.inline_html("<p>2</p>").expect("inline");
        assert_eq!(inliner.cache_stats().misses, misses, "second run must hit the cache");
        assert!(a.contains("<p style=\"color:red;\">1</p>"));
        assert!(b.contains("<p style=\"color:red;\">2</p>"));
    }

    #[test]
    fn builder_validates_tags_and_writes_logs() {
        let err = Inliner::builder()
            .unprocessable_tag("bad tag")
            .build()
            .err()
            .expect("invalid tag must be rejected");
        assert!(matches!(err, InlineError::InvalidConfiguration(_)));

        let debug_path = temp_log_path("debug");
        let perf_path = temp_log_path("perf");
        let mut inliner = Inliner::builder()
            .css("p{color:red} a:hover{color:blue}")
            .html("<p>x</p>")
            .debug_log(&debug_path)
            .perf_log(&perf_path)
            .build()
            .expect("build");
        inliner.inline().expect("inline");
        drop(inliner);

        let debug_text = std::fs::read_to_string(&debug_path).expect("debug log");
        let perf_text = std::fs::read_to_string(&perf_path).expect("perf log");
        let _ = std::fs::remove_file(&debug_path);
        let _ = std::fs::remove_file(&perf_path);
        assert!(debug_text.contains("\"type\":\"inline.selector_skipped\""), "{debug_text}");
        assert!(debug_text.contains("\"type\":\"inline.rule\""), "{debug_text}");
        assert!(debug_text.contains("\"type\":\"debug.summary\""), "{debug_text}");
        assert!(perf_text.contains("\"name\":\"inline.apply\""), "{perf_text}");
        assert!(perf_text.contains("perf.hot.span"), "{perf_text}");
    }
}
