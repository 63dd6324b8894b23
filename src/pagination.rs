//! Pagination engine
//!
//! Drives infinite-scroll loading of the photo list. Page fetches are
//! serialized by the `InProgress` guard, so a feed never has two page
//! requests in flight. Fetch and decode failures leave the accumulated list
//! untouched, publish a message on the error channel and still return the
//! feed to `Completed` so the consumer can retry.

use std::sync::Mutex;

use tokio::sync::watch;

use crate::client::{param, FetchClient};
use crate::models::{GalleryConfig, Photo};

/// Fetch state of the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    InProgress,
    Completed,
}

/// Outcome of a [`PhotoFeed::request_next_page`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// A fetch was already in progress; the call was a no-op.
    Busy,
    /// The page loaded; carries the number of photos it contributed.
    Loaded(usize),
    /// The fetch or decode failed; an error message was published.
    Failed,
    /// The feed was reset while this page was in flight; the result was
    /// discarded.
    Stale,
}

struct FeedState {
    /// Next page to fetch, 1-based.
    page_index: u32,
    status: FetchStatus,
    photos: Vec<Photo>,
    /// Bumped by `reset`; fetches capture it at start and completions whose
    /// generation no longer matches are discarded.
    generation: u64,
}

/// Restores the pre-fetch status if the owning fetch is dropped before it
/// completes. Without this, an aborted `request_next_page` would leave the
/// feed answering `Busy` forever.
struct InProgressGuard<'a> {
    state: &'a Mutex<FeedState>,
    generation: u64,
    restore: FetchStatus,
    armed: bool,
}

impl InProgressGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap();
        if state.generation == self.generation && state.status == FetchStatus::InProgress {
            state.status = self.restore;
            log::debug!("Page fetch dropped mid-flight, status restored");
        }
    }
}

/// Paginated photo feed.
///
/// An empty page is treated as a successful page, not as end-of-data: there
/// is no `has_more` latch and callers may keep requesting pages. This
/// preserves the upstream API's behavior, where a slow backend is
/// indistinguishable from an exhausted one.
pub struct PhotoFeed<C> {
    client: C,
    list_url: String,
    page_size: u32,
    state: Mutex<FeedState>,
    error_tx: watch::Sender<Option<String>>,
}

impl<C: FetchClient> PhotoFeed<C> {
    pub fn new(client: C, config: &GalleryConfig) -> Self {
        let (error_tx, _) = watch::channel(None);
        Self {
            client,
            list_url: config.list_url(),
            page_size: config.page_size,
            state: Mutex::new(FeedState {
                page_index: 1,
                status: FetchStatus::Idle,
                photos: Vec::new(),
                generation: 0,
            }),
            error_tx,
        }
    }

    pub fn status(&self) -> FetchStatus {
        self.state.lock().unwrap().status
    }

    /// The next page that will be fetched, 1-based.
    pub fn page_index(&self) -> u32 {
        self.state.lock().unwrap().page_index
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the accumulated photo list.
    pub fn photos(&self) -> Vec<Photo> {
        self.state.lock().unwrap().photos.clone()
    }

    /// The photo at `index`, if the list is long enough.
    pub fn photo_at(&self, index: usize) -> Option<Photo> {
        self.state.lock().unwrap().photos.get(index).cloned()
    }

    /// Channel carrying the latest fetch error message, if any.
    pub fn subscribe_errors(&self) -> watch::Receiver<Option<String>> {
        self.error_tx.subscribe()
    }

    /// Near-end trigger policy: the consumer should request the next page
    /// when the visible item is within 2 of the end of the accumulated list
    /// and no fetch is in progress. Triggering only on `Completed` is what
    /// prevents duplicate-page races.
    pub fn should_request_next(&self, visible_index: usize) -> bool {
        let state = self.state.lock().unwrap();
        state.status == FetchStatus::Completed
            && !state.photos.is_empty()
            && visible_index + 3 >= state.photos.len()
    }

    /// Fetch the next page. Returns [`PageOutcome::Busy`] without issuing a
    /// request if a fetch is already in progress. The first page after
    /// construction or [`reset`](Self::reset) replaces the accumulated list;
    /// later pages append.
    pub async fn request_next_page(&self) -> PageOutcome {
        let (page, mut guard) = {
            let mut state = self.state.lock().unwrap();
            if state.status == FetchStatus::InProgress {
                log::debug!("Page fetch already in progress, ignoring request");
                return PageOutcome::Busy;
            }
            let restore = state.status;
            state.status = FetchStatus::InProgress;
            let guard = InProgressGuard {
                state: &self.state,
                generation: state.generation,
                restore,
                armed: true,
            };
            (state.page_index, guard)
        };

        let query = [
            (param::PAGE, page.to_string()),
            (param::LIMIT, self.page_size.to_string()),
        ];

        let bytes = match self.client.fetch(&self.list_url, &query, None).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return self.fail(&mut guard, page, format!("Failed to fetch page {}: {}", page, e))
            }
        };

        let list: Vec<Photo> = match serde_json::from_slice(&bytes) {
            Ok(list) => list,
            Err(e) => {
                return self.fail(&mut guard, page, format!("Failed to decode page {}: {}", page, e))
            }
        };

        let count = list.len();
        let total = {
            let mut state = self.state.lock().unwrap();
            guard.disarm();
            if state.generation != guard.generation {
                log::debug!("Discarding page {} completion: feed was reset", page);
                return PageOutcome::Stale;
            }
            if page == 1 {
                state.photos = list;
            } else {
                state.photos.extend(list);
            }
            state.page_index = page + 1;
            state.status = FetchStatus::Completed;
            state.photos.len()
        };
        log::debug!("Page {} loaded: {} photos, {} total", page, count, total);
        PageOutcome::Loaded(count)
    }

    /// Pull-to-refresh: back to page 1 with an empty list. A fetch still in
    /// flight is invalidated; its completion will be discarded.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        state.page_index = 1;
        state.status = FetchStatus::Idle;
        state.photos.clear();
        log::debug!("Feed reset");
    }

    fn fail(&self, guard: &mut InProgressGuard<'_>, page: u32, message: String) -> PageOutcome {
        {
            let mut state = self.state.lock().unwrap();
            guard.disarm();
            if state.generation != guard.generation {
                log::debug!("Discarding failed page {} fetch: feed was reset", page);
                return PageOutcome::Stale;
            }
            state.status = FetchStatus::Completed;
        }
        log::warn!("{}", message);
        let _ = self.error_tx.send(Some(message));
        PageOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FetchError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn page_json(start: usize, count: usize) -> Vec<u8> {
        let items: Vec<String> = (start..start + count)
            .map(|i| {
                format!(
                    r#"{{"id":"{i}","author":"Author {i}","width":500,"height":300,
                        "url":"https://example.com/{i}",
                        "download_url":"https://example.com/dl/{i}"}}"#
                )
            })
            .collect();
        format!("[{}]", items.join(",")).into_bytes()
    }

    /// Serves sequential pages of `page_size` photos; can serve malformed
    /// bytes or errors for specific calls.
    struct MockClient {
        calls: AtomicUsize,
        page_size: usize,
        fail_call: Option<usize>,
        garbage_call: Option<usize>,
    }

    impl MockClient {
        fn new(page_size: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                page_size,
                fail_call: None,
                garbage_call: None,
            }
        }
    }

    impl FetchClient for MockClient {
        async fn fetch(
            &self,
            _url: &str,
            query: &[(&str, String)],
            _timeout: Option<Duration>,
        ) -> Result<Vec<u8>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self.fail_call == Some(call) {
                return Err(FetchError::NoData);
            }
            if self.garbage_call == Some(call) {
                return Ok(b"not json".to_vec());
            }
            let page: usize = query
                .iter()
                .find(|(k, _)| *k == param::PAGE)
                .map(|(_, v)| v.parse().unwrap())
                .unwrap();
            Ok(page_json((page - 1) * self.page_size, self.page_size))
        }
    }

    fn config() -> GalleryConfig {
        GalleryConfig {
            page_size: 3,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_page_replaces_later_pages_append() {
        let _ = env_logger::builder().is_test(true).try_init();
        let feed = PhotoFeed::new(MockClient::new(3), &config());

        assert_eq!(feed.request_next_page().await, PageOutcome::Loaded(3));
        assert_eq!(feed.len(), 3);
        assert_eq!(feed.page_index(), 2);

        assert_eq!(feed.request_next_page().await, PageOutcome::Loaded(3));
        assert_eq!(feed.len(), 6);
        assert_eq!(feed.photo_at(3).unwrap().id.as_deref(), Some("3"));
        assert_eq!(feed.status(), FetchStatus::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_requests_honor_only_one() {
        let feed = PhotoFeed::new(MockClient::new(3), &config());

        let (a, b) = tokio::join!(feed.request_next_page(), feed.request_next_page());

        assert_eq!(feed.client.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            (a, b),
            (PageOutcome::Loaded(3), PageOutcome::Busy) | (PageOutcome::Busy, PageOutcome::Loaded(3))
        ));
        assert_eq!(feed.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_list_and_publishes_error() {
        let mut client = MockClient::new(3);
        client.fail_call = Some(1);
        let feed = PhotoFeed::new(client, &config());
        let errors = feed.subscribe_errors();

        feed.request_next_page().await;
        assert_eq!(feed.request_next_page().await, PageOutcome::Failed);

        assert_eq!(feed.len(), 3);
        assert_eq!(feed.status(), FetchStatus::Completed);
        // The failed page was not consumed; a retry refetches page 2.
        assert_eq!(feed.page_index(), 2);
        assert!(errors.borrow().is_some());

        assert_eq!(feed.request_next_page().await, PageOutcome::Loaded(3));
        assert_eq!(feed.len(), 6);
    }

    #[tokio::test]
    async fn test_decode_failure_degrades_like_fetch_failure() {
        let mut client = MockClient::new(3);
        client.garbage_call = Some(0);
        let feed = PhotoFeed::new(client, &config());

        assert_eq!(feed.request_next_page().await, PageOutcome::Failed);
        assert!(feed.is_empty());
        assert_eq!(feed.status(), FetchStatus::Completed);
    }

    #[tokio::test]
    async fn test_reset_restores_initial_state() {
        let feed = PhotoFeed::new(MockClient::new(3), &config());
        feed.request_next_page().await;
        feed.request_next_page().await;

        feed.reset();
        assert_eq!(feed.page_index(), 1);
        assert!(feed.is_empty());
        assert_eq!(feed.status(), FetchStatus::Idle);

        // The page after a reset replaces rather than appends.
        assert_eq!(feed.request_next_page().await, PageOutcome::Loaded(3));
        assert_eq!(feed.len(), 3);
    }

    #[tokio::test]
    async fn test_near_end_trigger_policy() {
        let feed = PhotoFeed::new(MockClient::new(5), &config());
        assert!(!feed.should_request_next(0));

        feed.request_next_page().await;
        assert_eq!(feed.len(), 5);

        assert!(!feed.should_request_next(1));
        assert!(feed.should_request_next(2));
        assert!(feed.should_request_next(4));
    }

    #[tokio::test]
    async fn test_aborted_fetch_releases_the_in_progress_guard() {
        let feed = std::sync::Arc::new(PhotoFeed::new(MockClient::new(3), &config()));

        let task = tokio::spawn({
            let feed = feed.clone();
            async move { feed.request_next_page().await }
        });
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(feed.status(), FetchStatus::InProgress);

        task.abort();
        let _ = task.await;

        // The guard restored the pre-fetch status; the feed is not stuck
        // answering Busy and the page can be retried.
        assert_eq!(feed.status(), FetchStatus::Idle);
        assert_eq!(feed.request_next_page().await, PageOutcome::Loaded(3));
    }

    #[tokio::test]
    async fn test_reset_invalidates_in_flight_fetch() {
        let feed = std::sync::Arc::new(PhotoFeed::new(MockClient::new(3), &config()));

        let task = tokio::spawn({
            let feed = feed.clone();
            async move { feed.request_next_page().await }
        });
        tokio::time::sleep(Duration::from_millis(2)).await;
        feed.reset();

        // The completion lands after the reset and is discarded instead of
        // repopulating the cleared list.
        assert_eq!(task.await.unwrap(), PageOutcome::Stale);
        assert!(feed.is_empty());
        assert_eq!(feed.page_index(), 1);
        assert_eq!(feed.status(), FetchStatus::Idle);

        assert_eq!(feed.request_next_page().await, PageOutcome::Loaded(3));
        assert_eq!(feed.len(), 3);
    }

    #[tokio::test]
    async fn test_reset_discards_stale_failure() {
        let mut client = MockClient::new(3);
        client.fail_call = Some(0);
        let feed = std::sync::Arc::new(PhotoFeed::new(client, &config()));
        let errors = feed.subscribe_errors();

        let task = tokio::spawn({
            let feed = feed.clone();
            async move { feed.request_next_page().await }
        });
        tokio::time::sleep(Duration::from_millis(2)).await;
        feed.reset();

        assert_eq!(task.await.unwrap(), PageOutcome::Stale);
        // No error message for a fetch whose context was torn down.
        assert!(errors.borrow().is_none());
        assert_eq!(feed.status(), FetchStatus::Idle);
    }

    #[tokio::test]
    async fn test_empty_page_is_a_successful_page() {
        let feed = PhotoFeed::new(MockClient::new(0), &config());
        assert_eq!(feed.request_next_page().await, PageOutcome::Loaded(0));
        assert_eq!(feed.status(), FetchStatus::Completed);
        assert_eq!(feed.page_index(), 2);
    }
}
