//! Favorites store
//!
//! Durable set of favorited photo URLs with toggle semantics. The whole set
//! is re-serialized and written through to the backing store after every
//! mutation; membership order follows insertion order.

use std::sync::Mutex;

use crate::store::{KeyValueStore, StoreError};

const FAVORITES_KEY: &str = "saved_photos";

/// Persistent set of favorited download URLs.
///
/// The empty string is a valid member: photos without a download URL all
/// collapse onto it, matching the toggle behavior the UI exposes for them.
pub struct FavoriteStore<S> {
    store: S,
    favorites: Mutex<Vec<String>>,
}

impl<S: KeyValueStore> FavoriteStore<S> {
    /// Load the persisted set from `store`. A missing entry starts empty; a
    /// corrupt entry is discarded with a warning rather than failing.
    pub fn new(store: S) -> Result<Self, StoreError> {
        let favorites = match store.get(FAVORITES_KEY)? {
            Some(bytes) => match serde_json::from_slice::<Vec<String>>(&bytes) {
                Ok(list) => list,
                Err(e) => {
                    log::warn!("Discarding corrupt favorites blob: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        Ok(Self {
            store,
            favorites: Mutex::new(favorites),
        })
    }

    pub fn is_favorite(&self, url: &str) -> bool {
        self.favorites.lock().unwrap().iter().any(|u| u == url)
    }

    /// Add `url` if absent, remove it if present, then persist the whole
    /// set. Returns the new membership state.
    pub fn toggle_favorite(&self, url: &str) -> Result<bool, StoreError> {
        let snapshot;
        let now_favorite;
        {
            let mut favorites = self.favorites.lock().unwrap();
            if let Some(pos) = favorites.iter().position(|u| u == url) {
                favorites.remove(pos);
                now_favorite = false;
            } else {
                favorites.push(url.to_string());
                now_favorite = true;
            }
            snapshot = favorites.clone();
        }

        let bytes = serde_json::to_vec(&snapshot)?;
        self.store.set(FAVORITES_KEY, &bytes)?;
        log::debug!(
            "Favorite {} for {} ({} total)",
            if now_favorite { "added" } else { "removed" },
            url,
            snapshot.len()
        );
        Ok(now_favorite)
    }

    /// Snapshot of the favorited URLs in insertion order.
    pub fn favorites(&self) -> Vec<String> {
        self.favorites.lock().unwrap().clone()
    }
}
