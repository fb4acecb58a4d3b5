use std::time::Duration;

use shared::{
    domain::Username,
    protocol::{CACHE_BUSTER_PARAM, DEFAULT_API_URL, PROFILE_PIC_PATH},
};
use url::Url;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: Url,
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_URL).expect("default api url is valid"),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url.trim()).map_err(|source| ClientError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::UnsupportedBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url: parsed,
            request_timeout: None,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    // Keeps any path prefix the base url carries.
    pub fn endpoint(&self, path: &str) -> Url {
        self.endpoint_with_segments(path.split('/').filter(|segment| !segment.is_empty()))
    }

    pub fn profile_picture_url(&self, username: &Username, cache_buster: i64) -> Url {
        let mut url = self.endpoint_with_segments(
            PROFILE_PIC_PATH
                .split('/')
                .filter(|segment| !segment.is_empty())
                .chain(std::iter::once(username.as_str())),
        );
        url.query_pairs_mut()
            .append_pair(CACHE_BUSTER_PARAM, &cache_buster.to_string());
        url
    }

    fn endpoint_with_segments<'a>(&self, segments: impl Iterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        let mut segments = segments.peekable();
        if segments.peek().is_none() {
            return url;
        }
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
