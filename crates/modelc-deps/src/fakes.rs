//! In-memory fetcher for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;
use crate::fetch::RemoteFetcher;

/// Serves canned bodies by url; unknown urls fail like an unreachable host.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    documents: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(url.to_string(), body.into());
        self
    }

    /// Urls requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl RemoteFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(url.to_string());
        self.documents
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Http(format!("error trying to connect: {url} unreachable")))
    }
}
