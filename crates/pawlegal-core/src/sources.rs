use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};

/// URLs of legal database articles fetched during one script run.
///
/// Cloning shares the underlying set, so the tool set and the script runner
/// observe the same log.
#[derive(Debug, Clone, Default)]
pub struct SourceLog {
    urls: Arc<Mutex<BTreeSet<String>>>,
}

impl SourceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, url: impl Into<String>) {
        self.urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into());
    }

    pub fn is_empty(&self) -> bool {
        self.urls.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn len(&self) -> usize {
        self.urls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Sorted copy of the recorded URLs.
    pub fn snapshot(&self) -> Vec<String> {
        self.urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}
