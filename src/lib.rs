//! # Photo Browser
//!
//! Core library for a mobile photo-browsing app. The UI shell renders; this
//! crate owns the logic:
//!
//! - Paginated photo feed with infinite-scroll loading and pull-to-refresh
//! - Image cache that deduplicates concurrent fetches per URL
//! - Durable favorites set backed by a key-value store
//! - Transition geometry (fit/fill frames, zoom limits)
//! - Interactive present/dismiss transition state machine
//!
//! ## Composition
//!
//! There is no global state: the application's composition root constructs
//! the cache, feed and favorites store explicitly and shares them by
//! reference, so tests run against fresh instances and mock transports.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use photo_browser::{GalleryConfig, HttpFetchClient, ImageCache, PhotoFeed};
//!
//! let config = GalleryConfig::default();
//! let client = HttpFetchClient::new(config.request_timeout)?;
//! let feed = PhotoFeed::new(client, &config);
//! feed.request_next_page().await;
//! ```

pub mod cache;
pub mod client;
pub mod detail;
pub mod favorites;
pub mod geometry;
pub mod models;
pub mod pagination;
pub mod store;
pub mod transition;

pub use cache::{ImageCache, ImagePayload};
pub use client::{FetchClient, FetchError, HttpFetchClient};
pub use detail::{DetailViewState, ZoomAction};
pub use favorites::FavoriteStore;
pub use geometry::{
    compute_frame, max_zoom_scale, ContentMode, ImageFrameInfo, Point, Rect, Size,
};
pub use models::{GalleryConfig, Photo};
pub use pagination::{FetchStatus, PageOutcome, PhotoFeed};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};
pub use transition::{
    AnimationCurve, DetailScrollState, PanFrame, PanOutcome, SpringBack, TransitionAnimation,
    TransitionContext, TransitionController, TransitionError, TransitionPhase,
};
