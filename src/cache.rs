use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use metapath_engine::{EvaluationConfig, MetapathError, StaticContext};

use crate::expression::MetapathExpression;

type CompileResult = Result<Arc<MetapathExpression>, MetapathError>;
type Slot = Arc<OnceLock<CompileResult>>;

/// Compiled expressions keyed by source text.
///
/// Each distinct text is compiled at most once, even when several threads ask
/// for it at the same time: the map only hands out a shared slot, and the
/// slot's `OnceLock` runs the compilation. Failed compilations are cached
/// like successful ones. When the cache reaches its capacity its finished
/// entries are cleared before the next new entry is added; slots whose
/// compilation is still running are kept, so the map may briefly hold more
/// than `capacity` entries.
#[derive(Debug)]
pub struct ExpressionCache {
    entries: RwLock<HashMap<String, Slot>>,
    static_context: Arc<StaticContext>,
    capacity: usize,
}

impl ExpressionCache {
    /// A cache sized by `config.expression_cache_capacity`. A capacity of 0
    /// disables caching.
    pub fn new(static_context: StaticContext, config: &EvaluationConfig) -> Self {
        Self::with_capacity(static_context, config.expression_cache_capacity)
    }

    pub fn with_capacity(static_context: StaticContext, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            static_context: Arc::new(static_context),
            capacity,
        }
    }

    pub fn static_context(&self) -> &StaticContext {
        &self.static_context
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The compiled form of `text`, compiling it on first use.
    pub fn get_or_compile(&self, text: &str) -> CompileResult {
        let Some(slot) = self.slot(text) else {
            return self.compile(text);
        };
        slot.get_or_init(|| {
            log::trace!("expression cache miss: {}", text);
            self.compile(text)
        })
        .clone()
    }

    fn compile(&self, text: &str) -> CompileResult {
        MetapathExpression::compile_shared(text, Arc::clone(&self.static_context)).map(Arc::new)
    }

    /// The shared slot for `text`, or `None` when caching is disabled or the
    /// map's lock is poisoned.
    fn slot(&self, text: &str) -> Option<Slot> {
        if self.capacity == 0 {
            return None;
        }

        if let Some(slot) = self.entries.read().ok()?.get(text) {
            log::trace!("expression cache hit: {}", text);
            return Some(Arc::clone(slot));
        }

        let Ok(mut entries) = self.entries.write() else {
            log::warn!("expression cache lock poisoned, compiling without caching");
            return None;
        };
        if entries.len() >= self.capacity && !entries.contains_key(text) {
            log::debug!("expression cache full ({} entries), clearing", entries.len());
            retain_pending(&mut entries);
        }
        Some(Arc::clone(entries.entry(text.to_string()).or_default()))
    }

    /// Number of cached entries. Returns 0 if the lock is poisoned.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every finished entry. Compilations in progress keep their slot.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            retain_pending(&mut entries);
        }
    }
}

fn retain_pending(entries: &mut HashMap<String, Slot>) {
    entries.retain(|_, slot| slot.get().is_none());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_text_compiles_once() {
        let cache = ExpressionCache::with_capacity(StaticContext::default(), 8);
        let first = cache.get_or_compile("1 + 2").unwrap();
        let second = cache.get_or_compile("1 + 2").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_errors_are_cached() {
        let cache = ExpressionCache::with_capacity(StaticContext::default(), 8);
        let first = cache.get_or_compile("1 +").unwrap_err();
        let second = cache.get_or_compile("1 +").unwrap_err();
        assert_eq!(first, second);
        assert!(matches!(first, MetapathError::SyntaxError { .. }));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cleared_when_full() {
        let cache = ExpressionCache::with_capacity(StaticContext::default(), 2);
        cache.get_or_compile("1").unwrap();
        cache.get_or_compile("2").unwrap();
        assert_eq!(cache.len(), 2);
        cache.get_or_compile("3").unwrap();
        assert_eq!(cache.len(), 1);
        // re-requesting a cached text never clears
        cache.get_or_compile("3").unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clearing_keeps_pending_compilations() {
        let cache = ExpressionCache::with_capacity(StaticContext::default(), 2);
        let pending = cache.slot("field1").unwrap();
        cache.get_or_compile("1").unwrap();
        assert_eq!(cache.len(), 2);

        cache.get_or_compile("2").unwrap();
        assert_eq!(cache.len(), 2);
        let again = cache.slot("field1").unwrap();
        assert!(Arc::ptr_eq(&pending, &again));

        cache.clear();
        assert_eq!(cache.len(), 1);
        let compiled = cache.get_or_compile("field1").unwrap();
        assert!(matches!(pending.get(), Some(Ok(e)) if Arc::ptr_eq(e, &compiled)));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let config = EvaluationConfig {
            expression_cache_capacity: 0,
            ..EvaluationConfig::default()
        };
        let cache = ExpressionCache::new(StaticContext::default(), &config);
        let first = cache.get_or_compile("1").unwrap();
        let second = cache.get_or_compile("1").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_requests_share_one_compilation() {
        let cache = ExpressionCache::with_capacity(StaticContext::default(), 16);
        let compiled: Vec<Arc<MetapathExpression>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| cache.get_or_compile("for $i in 1 to 3 return $i").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(compiled.iter().all(|c| Arc::ptr_eq(c, &compiled[0])));
        assert_eq!(cache.len(), 1);
    }
}
