//! Fingerprint-keyed cache of rendered fragments.
//!
//! One slot per source path holds at most one [`RenderCacheEntry`]. A lookup
//! only hits when the stored fingerprint (and render options) match the
//! content supplied by the caller, so a stale fragment is never returned even
//! if an invalidation was missed.
//!
//! Locking is per path: the outer [`DashMap`] is sharded and only held long
//! enough to fetch the slot, the render itself runs under the slot's own mutex.
//! Two requests for the same document render once; requests for different
//! documents never wait on each other.

use crate::document::{Fingerprint, SourceDocument};
use crate::render::{MarkdownRenderer, RenderError, RenderOptions, Rendered, Renderer};
use crate::toc::TocEntry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A rendered fragment together with the inputs it was produced from.
#[derive(Debug)]
pub struct RenderCacheEntry {
    fingerprint: Fingerprint,
    options: RenderOptions,
    rendered: Rendered,
    render_duration: Duration,
}

impl RenderCacheEntry {
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn html(&self) -> &str {
        &self.rendered.html
    }

    pub fn toc(&self) -> &[TocEntry] {
        &self.rendered.toc
    }

    pub fn rendered(&self) -> &Rendered {
        &self.rendered
    }

    /// How long the renderer took to produce this entry.
    pub fn render_duration(&self) -> Duration {
        self.render_duration
    }
}

type Slot = Arc<Mutex<Option<Arc<RenderCacheEntry>>>>;

/// Hit/miss counters, mostly for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct RenderCache {
    renderer: Arc<dyn Renderer>,
    slots: DashMap<PathBuf, Slot>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for RenderCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(MarkdownRenderer)
    }
}

impl RenderCache {
    pub fn new(renderer: impl Renderer + 'static) -> Self {
        Self::with_renderer(Arc::new(renderer))
    }

    pub fn with_renderer(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            slots: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn slot(&self, path: &Path) -> Slot {
        if let Some(slot) = self.slots.get(path) {
            return slot.clone();
        }
        self.slots.entry(path.to_path_buf()).or_default().clone()
    }

    /// Returns the fragment for `content`, rendering it only if the cached
    /// entry for `path` was produced from different content or options.
    ///
    /// A failed render evicts whatever the slot held before.
    pub fn get_or_render(
        &self,
        path: &Path,
        content: &str,
        options: &RenderOptions,
    ) -> Result<Arc<RenderCacheEntry>, RenderError> {
        let fingerprint = Fingerprint::of(content.as_bytes());
        self.lookup_or_render(path, fingerprint, content, options)
    }

    /// Same as [`Self::get_or_render`] for a document read from disk, reusing
    /// the fingerprint taken when it was loaded.
    ///
    /// Content that is not UTF-8 fails with [`RenderError::Utf8`].
    pub fn render_document(
        &self,
        document: &SourceDocument,
        options: &RenderOptions,
    ) -> Result<Arc<RenderCacheEntry>, RenderError> {
        let content = document.as_str()?;
        self.lookup_or_render(document.path(), document.fingerprint(), content, options)
    }

    fn lookup_or_render(
        &self,
        path: &Path,
        fingerprint: Fingerprint,
        content: &str,
        options: &RenderOptions,
    ) -> Result<Arc<RenderCacheEntry>, RenderError> {
        let slot = self.slot(path);
        let mut slot = slot.lock();

        if let Some(entry) = slot.as_ref() {
            if entry.fingerprint == fingerprint && entry.options == *options {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(path = %path.display(), ?fingerprint, "Render cache hit");
                return Ok(entry.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);

        // Whatever was there no longer matches the caller's content.
        slot.take();

        let started_at = Instant::now();
        let rendered = self.renderer.render(content, options)?;
        let render_duration = started_at.elapsed();

        tracing::debug!(
            path = %path.display(),
            ?fingerprint,
            ?render_duration,
            "Rendered document"
        );

        let entry = Arc::new(RenderCacheEntry {
            fingerprint,
            options: options.clone(),
            rendered,
            render_duration,
        });
        slot.replace(entry.clone());

        Ok(entry)
    }

    /// Drops the entry for `path`, returns whether there was one.
    ///
    /// The slot itself is kept, the next request for `path` renders into it.
    pub fn invalidate(&self, path: &Path) -> bool {
        let Some(slot) = self.slots.get(path).map(|slot| slot.clone()) else {
            return false;
        };
        let had_entry = slot.lock().take().is_some();
        had_entry
    }

    /// Forgets `path` entirely, used once the source file is gone.
    pub fn evict(&self, path: &Path) -> bool {
        self.slots
            .remove(path)
            .map(|(_, slot)| {
                let had_entry = slot.lock().take().is_some();
                had_entry
            })
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        self.slots.clear();
    }

    /// Current entry for `path` without rendering anything.
    pub fn peek(&self, path: &Path) -> Option<Arc<RenderCacheEntry>> {
        let slot = self.slots.get(path)?.clone();
        let entry = slot.lock().clone();
        entry
    }

    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Counts renders, fails on documents containing `boom`.
    #[derive(Default)]
    struct CountingRenderer {
        calls: AtomicUsize,
    }

    impl Renderer for CountingRenderer {
        fn render(
            &self,
            markdown: &str,
            options: &RenderOptions,
        ) -> Result<Rendered, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if markdown.contains("boom") {
                return Err(RenderError::Other("boom".into()));
            }
            crate::render::to_html(markdown, options)
        }
    }

    fn counting_cache() -> (Arc<CountingRenderer>, RenderCache) {
        let renderer = Arc::new(CountingRenderer::default());
        let cache = RenderCache::with_renderer(renderer.clone());
        (renderer, cache)
    }

    #[test]
    fn test_unchanged_content_renders_once() {
        let (renderer, cache) = counting_cache();
        let path = Path::new("/docs/a.md");
        let options = RenderOptions::gfm();

        let first = cache.get_or_render(path, "# Title", &options).unwrap();
        let second = cache.get_or_render(path, "# Title", &options).unwrap();

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn test_new_content_never_returns_old_fragment() {
        let (_renderer, cache) = counting_cache();
        let path = Path::new("/docs/a.md");
        let options = RenderOptions::gfm();

        let a = cache.get_or_render(path, "# Alpha", &options).unwrap();
        let b = cache.get_or_render(path, "# Beta", &options).unwrap();

        assert!(a.html().contains("Alpha"));
        assert!(b.html().contains("Beta"));
        assert!(!b.html().contains("Alpha"));
        assert_ne!(a.fingerprint(), b.fingerprint());
        // Single entry per path.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_paths_do_not_share_entries() {
        let (renderer, cache) = counting_cache();
        let options = RenderOptions::gfm();

        let a = cache
            .get_or_render(Path::new("/docs/a.md"), "# Same", &options)
            .unwrap();
        let b = cache
            .get_or_render(Path::new("/docs/b.md"), "# Same", &options)
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_options_change_is_a_miss() {
        let (renderer, cache) = counting_cache();
        let path = Path::new("/docs/a.md");

        cache
            .get_or_render(path, "# A", &RenderOptions::gfm())
            .unwrap();
        let no_toc = RenderOptions {
            toc: false,
            ..RenderOptions::gfm()
        };
        let entry = cache.get_or_render(path, "# A", &no_toc).unwrap();

        assert!(entry.toc().is_empty());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_forces_render() {
        let (renderer, cache) = counting_cache();
        let path = Path::new("/docs/a.md");
        let options = RenderOptions::gfm();

        cache.get_or_render(path, "# A", &options).unwrap();
        assert!(cache.invalidate(path));
        assert!(!cache.invalidate(path));
        assert!(cache.peek(path).is_none());

        cache.get_or_render(path, "# A", &options).unwrap();
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_evict_forgets_path() {
        let (_renderer, cache) = counting_cache();
        let options = RenderOptions::gfm();

        cache
            .get_or_render(Path::new("/docs/a.md"), "# A", &options)
            .unwrap();
        cache
            .get_or_render(Path::new("/docs/b.md"), "# B", &options)
            .unwrap();

        assert!(cache.evict(Path::new("/docs/a.md")));
        assert!(!cache.evict(Path::new("/docs/a.md")));
        assert_eq!(cache.len(), 1);
        assert!(cache.peek(Path::new("/docs/b.md")).is_some());
    }

    #[test]
    fn test_failed_render_evicts_previous_entry() {
        let (_renderer, cache) = counting_cache();
        let path = Path::new("/docs/a.md");
        let options = RenderOptions::gfm();

        cache.get_or_render(path, "# Fine", &options).unwrap();
        assert!(cache.get_or_render(path, "boom", &options).is_err());
        assert!(cache.peek(path).is_none());
    }

    #[test]
    fn test_concurrent_requests_render_once() {
        let (renderer, cache) = counting_cache();
        let cache = Arc::new(cache);
        let options = RenderOptions::gfm();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let options = options.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_render(Path::new("/docs/a.md"), "# Shared", &options)
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap().html().contains("Shared"));
        }
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_render_document_shares_entries_with_content_lookups() {
        let (renderer, cache) = counting_cache();
        let options = RenderOptions::gfm();
        let path = PathBuf::from("/docs/a.md");

        let document = SourceDocument::from_bytes(path.clone(), b"# Same".to_vec(), None);
        let first = cache.render_document(&document, &options).unwrap();
        let second = cache.get_or_render(&path, "# Same", &options).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.fingerprint(), document.fingerprint());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_render_document_rejects_invalid_utf8() {
        let (renderer, cache) = counting_cache();
        let document = SourceDocument::from_bytes(PathBuf::from("/docs/a.md"), vec![0xff, 0xfe], None);

        let result = cache.render_document(&document, &RenderOptions::gfm());
        assert!(matches!(result, Err(RenderError::Utf8(_))));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }
}
