//! Rule precedence. Scores come from stripping `#word`, then `.word`, then
//! bare words out of the selector text and weighting each pass 100/10/1.
//! Attribute and pseudo-class text is not weighted separately; any words
//! left inside it are counted as element names.

use crate::cache::StyleCache;
use crate::stylesheet::StyleRule;

pub fn specificity(selector: &str) -> u32 {
    let mut working = selector.to_string();
    let mut score = 0u32;
    for (prefix, weight) in [(Some('#'), 100u32), (Some('.'), 10), (None, 1)] {
        if working.trim().is_empty() {
            break;
        }
        let (rest, removed) = strip_words(&working, prefix);
        score = score.saturating_add(weight.saturating_mul(removed));
        working = rest;
    }
    score
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Removes every `prefix` + word-run (or bare word-run when `prefix` is
/// `None`) and reports how many were removed.
fn strip_words(text: &str, prefix: Option<char>) -> (String, u32) {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut removed = 0u32;
    let mut i = 0usize;
    while i < chars.len() {
        let word_start = match prefix {
            Some(p) if chars[i] == p => i + 1,
            Some(_) => {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            None => i,
        };
        let mut end = word_start;
        while end < chars.len() && is_word_char(chars[end]) {
            end += 1;
        }
        if end > word_start {
            removed += 1;
            i = end;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    (out, removed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedRule {
    pub rule: StyleRule,
    pub specificity: u32,
}

/// Stable ascending sort by `(specificity, source_order)`, so applying the
/// result in order lets the last write for a property win.
pub fn rank_rules(rules: Vec<StyleRule>, cache: &mut StyleCache) -> Vec<RankedRule> {
    let mut ranked: Vec<RankedRule> = rules
        .into_iter()
        .map(|rule| RankedRule {
            specificity: cache.specificity(&rule.selector),
            rule,
        })
        .collect();
    ranked.sort_by_key(|entry| (entry.specificity, entry.rule.source_order));
    ranked
}
