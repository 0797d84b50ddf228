use std::sync::RwLock;

/// Source of the originating page's address and title.
///
/// Read once per `track()` call, so a record reflects the page at the
/// moment the event happened rather than when it was flushed.
pub trait PageContext: Send + Sync {
    fn url(&self) -> String;
    fn title(&self) -> String;
}

/// Page context with a fixed address and title that the host updates on navigation
#[derive(Debug, Default)]
pub struct StaticPage {
    inner: RwLock<(String, String)>,
}

impl StaticPage {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        StaticPage {
            inner: RwLock::new((url.into(), title.into())),
        }
    }

    /// Record a navigation to a new page
    pub fn navigate(&self, url: impl Into<String>, title: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = (url.into(), title.into());
    }
}

impl PageContext for StaticPage {
    fn url(&self) -> String {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).0.clone()
    }

    fn title(&self) -> String {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).1.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_updates_both_fields() {
        let page = StaticPage::new("http://a/1.html", "One");
        page.navigate("http://a/2.html", "Two");
        assert_eq!(page.url(), "http://a/2.html");
        assert_eq!(page.title(), "Two");
    }
}
