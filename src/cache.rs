//! Image cache
//!
//! In-memory mapping from an image URL to its decoded payload. Concurrent
//! fetches for the same key are deduplicated: the first caller performs the
//! network fetch and every later caller attaches to it, so a key never has
//! more than one request in flight. Failures resolve to a placeholder payload
//! and are not cached, so a later call may retry the network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::client::FetchClient;
use crate::geometry::Size;

/// A decoded image: raw RGBA bytes plus pixel dimensions.
///
/// Payloads are created once and shared read-only behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    placeholder: bool,
}

impl ImagePayload {
    /// Decode fetched bytes into a payload. Returns `None` for bytes the
    /// image decoder rejects.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let decoded = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("Failed to decode image bytes: {}", e);
                return None;
            }
        };
        let rgba = decoded.to_rgba8();
        Some(Self {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
            placeholder: false,
        })
    }

    /// The payload substituted when a fetch or decode fails: a single opaque
    /// gray pixel the rendering layer can stretch.
    pub fn placeholder() -> Self {
        Self {
            width: 1,
            height: 1,
            rgba: vec![128, 128, 128, 255],
            placeholder: true,
        }
    }

    /// Fixed-size payload for geometry tests, skipping the decoder.
    #[cfg(test)]
    pub(crate) fn stub(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0; (width * height * 4) as usize],
            placeholder: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Pixel dimensions as a geometry size.
    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }
}

struct CacheState {
    entries: HashMap<String, Arc<ImagePayload>>,
    /// Insertion order of `entries`, used for capacity eviction.
    order: VecDeque<String>,
    /// Waiters attached to the single in-flight fetch per key.
    in_flight: HashMap<String, Vec<oneshot::Sender<Arc<ImagePayload>>>>,
}

enum Role {
    Hit(Arc<ImagePayload>),
    Waiter(oneshot::Receiver<Arc<ImagePayload>>),
    Leader,
}

/// Removes the in-flight entry and resolves any waiters with the placeholder
/// if the owning fetch is dropped before it completes. Without this, a key
/// whose leader was aborted would keep collecting waiters that never resolve.
struct InFlightGuard<'a> {
    state: &'a Mutex<CacheState>,
    key: &'a str,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let waiters = {
            let mut state = self.state.lock().unwrap();
            state.in_flight.remove(self.key).unwrap_or_default()
        };
        if !waiters.is_empty() {
            log::warn!(
                "Image fetch for {} dropped mid-flight, resolving {} waiters with the placeholder",
                self.key,
                waiters.len()
            );
        }
        let placeholder = Arc::new(ImagePayload::placeholder());
        for tx in waiters {
            let _ = tx.send(placeholder.clone());
        }
    }
}

/// Image cache keyed by the raw URL string.
///
/// Keys are not normalized; two differently formatted URLs to the same
/// resource are distinct entries.
pub struct ImageCache<C> {
    client: C,
    capacity: Option<usize>,
    state: Mutex<CacheState>,
}

impl<C: FetchClient> ImageCache<C> {
    /// An unbounded cache.
    pub fn new(client: C) -> Self {
        Self::with_capacity(client, None)
    }

    /// A cache that evicts the oldest entries once `capacity` is exceeded.
    /// `None` disables eviction.
    pub fn with_capacity(client: C, capacity: Option<usize>) -> Self {
        Self {
            client,
            capacity,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Fetch the image for `key`, hitting the network at most once per key
    /// regardless of how many callers are waiting. Never fails: fetch and
    /// decode errors resolve to the placeholder payload.
    pub async fn fetch(&self, key: &str) -> Arc<ImagePayload> {
        let role = {
            let mut state = self.state.lock().unwrap();
            if let Some(payload) = state.entries.get(key) {
                Role::Hit(payload.clone())
            } else if let Some(waiters) = state.in_flight.get_mut(key) {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Role::Waiter(rx)
            } else {
                state.in_flight.insert(key.to_string(), Vec::new());
                Role::Leader
            }
        };

        match role {
            Role::Hit(payload) => {
                log::debug!("Cache hit for {}", key);
                payload
            }
            Role::Waiter(rx) => rx
                .await
                .unwrap_or_else(|_| Arc::new(ImagePayload::placeholder())),
            Role::Leader => self.load(key).await,
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `key` is already cached (synchronous hit path available).
    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().unwrap().entries.contains_key(key)
    }

    async fn load(&self, key: &str) -> Arc<ImagePayload> {
        // The in-flight entry was registered by `fetch` in the same poll; the
        // guard keeps it from leaking if this future is dropped mid-fetch.
        let mut guard = InFlightGuard {
            state: &self.state,
            key,
            armed: true,
        };

        let payload = match self.client.fetch(key, &[], None).await {
            Ok(bytes) => match ImagePayload::decode(&bytes) {
                Some(payload) => Arc::new(payload),
                None => Arc::new(ImagePayload::placeholder()),
            },
            Err(e) => {
                log::warn!("Image fetch failed for {}: {}", key, e);
                Arc::new(ImagePayload::placeholder())
            }
        };

        let waiters = {
            let mut state = self.state.lock().unwrap();
            if !payload.is_placeholder() {
                state.entries.insert(key.to_string(), payload.clone());
                state.order.push_back(key.to_string());
                if let Some(capacity) = self.capacity {
                    while state.entries.len() > capacity {
                        match state.order.pop_front() {
                            Some(oldest) => {
                                log::debug!("Evicting cached image {}", oldest);
                                state.entries.remove(&oldest);
                            }
                            None => break,
                        }
                    }
                }
            }
            state.in_flight.remove(key).unwrap_or_default()
        };
        guard.disarm();

        for tx in waiters {
            let _ = tx.send(payload.clone());
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FetchError;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    /// Serves one PNG per request after a short delay; `fail_first` requests
    /// error out before any succeed.
    struct MockClient {
        calls: AtomicUsize,
        fail_first: usize,
        image: Vec<u8>,
    }

    impl MockClient {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: 0,
                image: png_bytes(4, 2),
            }
        }

        fn failing_first(count: usize) -> Self {
            Self {
                fail_first: count,
                ..Self::new()
            }
        }
    }

    impl FetchClient for MockClient {
        async fn fetch(
            &self,
            _url: &str,
            _query: &[(&str, String)],
            _timeout: Option<Duration>,
        ) -> Result<Vec<u8>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if call < self.fail_first {
                Err(FetchError::NoData)
            } else {
                Ok(self.image.clone())
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_network_call() {
        let cache = ImageCache::new(MockClient::new());
        let key = "https://example.com/img/1.png";

        let (a, b, c) = tokio::join!(cache.fetch(key), cache.fetch(key), cache.fetch(key));

        assert_eq!(cache.client.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
        assert_eq!(a.size(), Size::new(4.0, 2.0));
    }

    #[tokio::test]
    async fn test_hit_path_skips_network() {
        let cache = ImageCache::new(MockClient::new());
        let key = "https://example.com/img/1.png";

        cache.fetch(key).await;
        assert!(cache.contains(key));
        cache.fetch(key).await;
        assert_eq!(cache.client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_resolves_placeholder_and_is_not_cached() {
        let cache = ImageCache::new(MockClient::failing_first(1));
        let key = "https://example.com/img/flaky.png";

        let first = cache.fetch(key).await;
        assert!(first.is_placeholder());
        assert!(!cache.contains(key));

        // A later call retries the network and succeeds.
        let second = cache.fetch(key).await;
        assert!(!second.is_placeholder());
        assert_eq!(cache.client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_resolves_every_waiter() {
        let cache = ImageCache::new(MockClient::failing_first(1));
        let key = "https://example.com/img/flaky.png";

        let (a, b) = tokio::join!(cache.fetch(key), cache.fetch(key));
        assert!(a.is_placeholder());
        assert!(b.is_placeholder());
        assert_eq!(cache.client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest_entry() {
        let cache = ImageCache::with_capacity(MockClient::new(), Some(2));

        cache.fetch("a").await;
        cache.fetch("b").await;
        cache.fetch("c").await;

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[tokio::test]
    async fn test_aborted_fetch_does_not_wedge_the_key() {
        let cache = Arc::new(ImageCache::new(MockClient::new()));
        let key = "https://example.com/img/1.png";

        let task = tokio::spawn({
            let cache = cache.clone();
            async move { cache.fetch(key).await }
        });
        tokio::time::sleep(Duration::from_millis(2)).await;
        task.abort();
        let _ = task.await;

        // The in-flight entry is gone; a later fetch leads a fresh request
        // instead of attaching to one that no longer exists.
        let payload = tokio::time::timeout(Duration::from_secs(1), cache.fetch(key))
            .await
            .unwrap();
        assert!(!payload.is_placeholder());
        assert_eq!(cache.client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_leader_abort_resolves_waiters_with_placeholder() {
        let cache = Arc::new(ImageCache::new(MockClient::new()));
        let key = "https://example.com/img/1.png";

        let leader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.fetch(key).await }
        });
        tokio::time::sleep(Duration::from_millis(2)).await;

        let waiter = tokio::spawn({
            let cache = cache.clone();
            async move { cache.fetch(key).await }
        });
        tokio::time::sleep(Duration::from_millis(2)).await;

        leader.abort();
        let _ = leader.await;

        let payload = waiter.await.unwrap();
        assert!(payload.is_placeholder());
        assert!(!cache.contains(key));

        // The placeholder was not cached; a retry hits the network again.
        assert!(!cache.fetch(key).await.is_placeholder());
    }

    #[tokio::test]
    async fn test_distinct_keys_are_distinct_entries() {
        let cache = ImageCache::new(MockClient::new());
        cache.fetch("https://example.com/img/1.png").await;
        cache.fetch("https://example.com/img/1.png/").await;
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.client.calls.load(Ordering::SeqCst), 2);
    }
}
