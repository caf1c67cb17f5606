//! YouTube metadata used by block set rules
//!
//! Category ids come from a fixed table. Channel titles are resolved through
//! a [`ChannelTitleFetcher`] supplied by the caller.

use async_trait::async_trait;

/// Known YouTube video categories, id to display name.
pub const CATEGORIES: &[(&str, &str)] = &[
    ("1", "Film & Animation"),
    ("2", "Autos & Vehicles"),
    ("10", "Music"),
    ("15", "Pets & Animals"),
    ("17", "Sports"),
    ("18", "Short Movies"),
    ("19", "Travel & Events"),
    ("20", "Gaming"),
    ("21", "Videoblogging"),
    ("22", "People & Blogs"),
    ("23", "Comedy"),
    ("24", "Entertainment"),
    ("25", "News & Politics"),
    ("26", "Howto & Style"),
    ("27", "Education"),
    ("28", "Science & Technology"),
    ("29", "Nonprofits & Activism"),
    ("30", "Movies"),
    ("31", "Anime/Animation"),
    ("32", "Action/Adventure"),
    ("33", "Classics"),
    ("34", "Comedy"),
    ("35", "Documentary"),
    ("36", "Drama"),
    ("37", "Family"),
    ("38", "Foreign"),
    ("39", "Horror"),
    ("40", "Sci-Fi/Fantasy"),
    ("41", "Thriller"),
    ("42", "Shorts"),
    ("43", "Shows"),
    ("44", "Trailers"),
];

/// Display name of a category id.
pub fn category_name(id: &str) -> Option<&'static str> {
    CATEGORIES
        .iter()
        .find(|(cat_id, _)| *cat_id == id)
        .map(|(_, name)| *name)
}

#[inline]
pub fn is_known_category(id: &str) -> bool {
    category_name(id).is_some()
}

// =============================================================================
// Channel Title Lookup
// =============================================================================

/// Error type for channel title lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Lookup failed with HTTP status {0}")]
    BadStatus(u16),
    #[error("Lookup returned no channel")]
    EmptyResponse,
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Unreadable lookup response: {0}")]
    Decode(String),
}

/// Resolves the display title of a YouTube channel.
#[async_trait(?Send)]
pub trait ChannelTitleFetcher {
    async fn fetch_channel_title(&self, channel_id: &str) -> Result<String, FetchError>;
}

#[cfg(feature = "youtube-api")]
pub use data_api::YouTubeDataApi;

#[cfg(feature = "youtube-api")]
mod data_api {
    use async_trait::async_trait;
    use serde::Deserialize;

    use super::{ChannelTitleFetcher, FetchError};

    const CHANNELS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/channels";

    /// Channel lookup through the YouTube Data API v3.
    pub struct YouTubeDataApi {
        client: reqwest::Client,
        api_key: String,
        endpoint: String,
    }

    #[derive(Deserialize)]
    struct ChannelList {
        #[serde(default)]
        items: Vec<ChannelItem>,
    }

    #[derive(Deserialize)]
    struct ChannelItem {
        snippet: Snippet,
    }

    #[derive(Deserialize)]
    struct Snippet {
        title: String,
    }

    impl YouTubeDataApi {
        pub fn new(api_key: impl Into<String>) -> Self {
            Self::with_endpoint(api_key, CHANNELS_ENDPOINT)
        }

        /// Point the lookup at a different `channels` endpoint.
        pub fn with_endpoint(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                api_key: api_key.into(),
                endpoint: endpoint.into(),
            }
        }
    }

    #[async_trait(?Send)]
    impl ChannelTitleFetcher for YouTubeDataApi {
        async fn fetch_channel_title(&self, channel_id: &str) -> Result<String, FetchError> {
            let response = self
                .client
                .get(&self.endpoint)
                .query(&[("part", "snippet"), ("id", channel_id), ("key", self.api_key.as_str())])
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::BadStatus(status.as_u16()));
            }

            let body = response
                .text()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            first_title(&body)
        }
    }

    /// Title of the first channel in a `channels` response body.
    fn first_title(body: &str) -> Result<String, FetchError> {
        let list: ChannelList =
            serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
        list.items
            .into_iter()
            .next()
            .map(|item| item.snippet.title)
            .ok_or(FetchError::EmptyResponse)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_first_title() {
            let body = r#"{"items": [{"snippet": {"title": "Rust Videos"}}, {"snippet": {"title": "Other"}}]}"#;
            assert_eq!(first_title(body), Ok("Rust Videos".to_string()));
            assert_eq!(first_title(r#"{"kind": "youtube#channelListResponse"}"#), Err(FetchError::EmptyResponse));
            assert!(matches!(first_title("<html>quota page</html>"), Err(FetchError::Decode(_))));
            assert!(matches!(first_title(r#"{"items": [{"id": "UCx"}]}"#), Err(FetchError::Decode(_))));
        }
    }
}
