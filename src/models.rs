use std::time::Duration;

use serde::Deserialize;

/// A single photo record as returned by the paginated list API.
///
/// Every field is optional on the wire; records are never mutated after
/// decoding.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Photo {
    pub id: Option<String>,
    pub author: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub url: Option<String>,
    pub download_url: Option<String>,
}

impl Photo {
    /// The download URL, or an empty string when the record lacks one.
    ///
    /// The favorites store accepts the empty string as a (meaningless but
    /// valid) member, so callers can pass this through unchanged.
    pub fn download_url_or_empty(&self) -> &str {
        self.download_url.as_deref().unwrap_or("")
    }
}

/// Configuration for the photo browser core.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Base URL of the photo list API.
    pub base_url: String,
    /// Number of photos requested per page.
    pub page_size: u32,
    /// Timeout applied to page and thumbnail fetches.
    pub request_timeout: Duration,
    /// Timeout applied to high-resolution image fetches.
    pub high_res_timeout: Duration,
    /// Maximum number of cached images; `None` means unbounded.
    pub cache_capacity: Option<usize>,
}

impl GalleryConfig {
    /// URL of the paginated photo list endpoint.
    pub fn list_url(&self) -> String {
        format!("{}/list", self.base_url.trim_end_matches('/'))
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://picsum.photos/v2".to_string(),
            page_size: 30,
            request_timeout: Duration::from_secs(10),
            high_res_timeout: Duration::from_secs(15),
            cache_capacity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_photo_list() {
        let json = r#"[
            {"id":"0","author":"Alejandro Escamilla","width":5000,"height":3333,
             "url":"https://unsplash.com/photos/yC-Yzbqy7PY",
             "download_url":"https://picsum.photos/id/0/5000/3333"},
            {"id":"1","author":null,"width":null,"height":null,"url":null,"download_url":null}
        ]"#;
        let photos: Vec<Photo> = serde_json::from_str(json).unwrap();
        assert_eq!(photos.len(), 2);
        assert_eq!(photos[0].author.as_deref(), Some("Alejandro Escamilla"));
        assert_eq!(
            photos[0].download_url_or_empty(),
            "https://picsum.photos/id/0/5000/3333"
        );
        assert_eq!(photos[1].download_url_or_empty(), "");
    }

    #[test]
    fn test_list_url_joins_base() {
        let config = GalleryConfig {
            base_url: "https://picsum.photos/v2/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.list_url(), "https://picsum.photos/v2/list");
    }
}
