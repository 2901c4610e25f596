//! Per-engine memo tables keyed by the SHA-256 digest of their input text.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use crate::error::SelectorError;
use crate::query::{Query, translate};
use crate::specificity::{RankedRule, specificity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for b in self.0 {
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    StyleSheet,
    Specificity,
    Query,
}

/// A parsed and ranked stylesheet as stored in the stylesheet table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankedStyleSheet {
    pub rules: Vec<RankedRule>,
    pub preserved_media: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub stylesheets: usize,
    pub specificities: usize,
    pub queries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct StyleCache {
    stylesheets: HashMap<CacheKey, Arc<RankedStyleSheet>>,
    specificities: HashMap<CacheKey, u32>,
    queries: HashMap<CacheKey, Arc<Query>>,
    hits: u64,
    misses: u64,
}

impl StyleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.stylesheets.clear();
        self.specificities.clear();
        self.queries.clear();
    }

    pub fn clear_kind(&mut self, kind: CacheKind) {
        match kind {
            CacheKind::StyleSheet => self.stylesheets.clear(),
            CacheKind::Specificity => self.specificities.clear(),
            CacheKind::Query => self.queries.clear(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            stylesheets: self.stylesheets.len(),
            specificities: self.specificities.len(),
            queries: self.queries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    pub fn specificity(&mut self, selector: &str) -> u32 {
        let key = CacheKey::of(selector);
        if let Some(score) = self.specificities.get(&key) {
            self.hits += 1;
            return *score;
        }
        self.misses += 1;
        let score = specificity(selector);
        self.specificities.insert(key, score);
        score
    }

    /// Compiled query for a selector; selectors that fail to translate are
    /// not cached.
    pub fn query(&mut self, selector: &str) -> Result<Arc<Query>, SelectorError> {
        let selector = selector.trim();
        let key = CacheKey::of(selector);
        if let Some(query) = self.queries.get(&key) {
            self.hits += 1;
            return Ok(Arc::clone(query));
        }
        self.misses += 1;
        let query = Arc::new(translate(selector)?);
        self.queries.insert(key, Arc::clone(&query));
        Ok(query)
    }

    /// Looks up the ranked stylesheet for `css`, building it with `build` on a miss.
    pub fn stylesheet(
        &mut self,
        css: &str,
        build: impl FnOnce(&mut Self) -> RankedStyleSheet,
    ) -> Arc<RankedStyleSheet> {
        let key = CacheKey::of(css);
        if let Some(sheet) = self.stylesheets.get(&key) {
            self.hits += 1;
            return Arc::clone(sheet);
        }
        self.misses += 1;
        let sheet = Arc::new(build(self));
        self.stylesheets.insert(key, Arc::clone(&sheet));
        sheet
    }
}
