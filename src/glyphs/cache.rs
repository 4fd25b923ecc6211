//! Bounded least-recently-used cache of resolved glyph widths.

use indexmap::IndexMap;

use super::{fallback_width, GlyphMetricsProvider};

pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Resolved glyph widths, most recently used last.
///
/// Owned by one layout invocation (or injected by the caller), never shared
/// between threads.
#[derive(Debug, Clone)]
pub struct MeasurementCache {
    capacity: usize,
    entries: IndexMap<String, f64>,
    hits: u64,
    misses: u64,
}

impl MeasurementCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: IndexMap::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Cached width, marking the entry as most recently used.
    pub fn get(&mut self, name: &str) -> Option<f64> {
        let idx = self.entries.get_index_of(name)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(idx, last);
        self.entries.get_index(last).map(|(_, &w)| w)
    }

    /// Insert a width, evicting the least recently used entry when full.
    pub fn insert(&mut self, name: &str, width: f64) {
        if let Some(idx) = self.entries.get_index_of(name) {
            let last = self.entries.len() - 1;
            self.entries.move_index(idx, last);
            if let Some((_, w)) = self.entries.get_index_mut(last) {
                *w = width;
            }
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(name.to_string(), width);
    }

    /// Width of `name` in staff spaces: cached, else from the provider,
    /// else the fallback constant.
    pub fn width(&mut self, metrics: Option<&dyn GlyphMetricsProvider>, name: &str) -> f64 {
        if let Some(w) = self.get(name) {
            self.hits += 1;
            return w;
        }
        self.misses += 1;
        let width = match metrics.and_then(|m| m.width_of(name)) {
            Some(w) if w.is_finite() && w >= 0.0 => w,
            _ => {
                if metrics.is_some() {
                    log::warn!("glyph '{name}' not in font metrics, using fallback width");
                }
                fallback_width(name)
            }
        };
        self.insert(name, width);
        width
    }

    /// Drop every entry; the hit and miss counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MeasurementCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::{names, SmuflMetrics};

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = MeasurementCache::new(2);
        cache.insert("a", 1.0);
        cache.insert("b", 2.0);
        // touch "a" so "b" becomes the eviction candidate
        assert_eq!(cache.get("a"), Some(1.0));
        cache.insert("c", 3.0);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut cache = MeasurementCache::new(3);
        for i in 0..10 {
            cache.insert(&format!("g{i}"), i as f64);
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.contains("g9"));
        assert!(!cache.contains("g6"));
    }

    #[test]
    fn width_counts_hits_and_misses() {
        let metrics = SmuflMetrics::bravura();
        let mut cache = MeasurementCache::default();
        let w1 = cache.width(Some(&metrics), names::NOTEHEAD_WHOLE);
        let w2 = cache.width(Some(&metrics), names::NOTEHEAD_WHOLE);
        assert_eq!(w1, 1.688);
        assert_eq!(w1, w2);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn clear_keeps_counters() {
        let metrics = SmuflMetrics::bravura();
        let mut cache = MeasurementCache::new(4);
        cache.width(Some(&metrics), names::NOTEHEAD_BLACK);
        cache.clear();
        assert!(cache.is_empty());
        cache.width(Some(&metrics), names::NOTEHEAD_BLACK);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.capacity(), 4);
    }

    #[test]
    fn width_falls_back_without_provider() {
        let mut cache = MeasurementCache::new(8);
        assert_eq!(cache.width(None, names::REST_QUARTER), 1.08);
    }
}
