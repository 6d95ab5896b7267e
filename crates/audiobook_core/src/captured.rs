use serde::{Deserialize, Serialize};

/// Ordered list of captured media URLs, unique by exact string match.
///
/// Insertion order is discovery order; that order later becomes the track
/// numbering of a batch download.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CapturedUrls {
    urls: Vec<String>,
}

impl CapturedUrls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from possibly repeated entries, keeping first-seen order.
    pub fn from_vec(urls: Vec<String>) -> Self {
        let mut list = Self::new();
        for url in urls {
            list.insert(&url);
        }
        list
    }

    /// Appends `url` unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, url: &str) -> bool {
        if self.contains(url) {
            return false;
        }
        self.urls.push(url.to_string());
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.iter().any(|known| known == url)
    }

    pub fn clear(&mut self) {
        self.urls.clear();
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

impl From<Vec<String>> for CapturedUrls {
    fn from(urls: Vec<String>) -> Self {
        Self::from_vec(urls)
    }
}

impl From<CapturedUrls> for Vec<String> {
    fn from(list: CapturedUrls) -> Self {
        list.urls
    }
}
