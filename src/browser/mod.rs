//! Rendering surface abstractions.
//!
//! The scan engine only sees a loaded page as a list of [`Surface`]s: the
//! top-level document first, then any embedded frames. Two backends exist:
//!
//! - `chrome`: a live headless Chromium session (feature `chrome`)
//! - `snapshot`: saved HTML documents with scripted click transitions

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod snapshot;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

#[cfg(feature = "chrome")]
pub use chrome::ChromeBrowser;
pub use snapshot::{INITIAL_VIEW, SnapshotBrowser, SnapshotSite, SnapshotSurface};

/// Opaque reference to an element in one render of a surface.
///
/// Handles are not durable: once the surface re-renders or navigates, a
/// stale handle fails on use instead of pointing at a different node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An element returned by a query, with the facts the locators need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    pub handle: ElementHandle,
    /// Trimmed text content
    pub text: String,
    /// Whether the element is rendered and takes up space
    pub visible: bool,
    pub attributes: BTreeMap<String, String>,
}

impl ElementNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A document context (top-level page or embedded frame) that can be queried.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Source URL of the document.
    fn url(&self) -> &str;

    /// All elements matching a CSS selector, in document order.
    async fn query(&self, selector: &str) -> Result<Vec<ElementNode>>;

    /// Bring an element into the viewport.
    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<()>;

    /// Activate an element, failing if it is gone, disabled or too slow.
    async fn click(&self, handle: &ElementHandle, timeout: Duration) -> Result<()>;

    /// Rendered text of the whole document body.
    async fn body_text(&self) -> Result<String>;
}

/// A browser tab that can load a URL and expose its surfaces.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Load a URL and wait until it has settled.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Surfaces currently attached to the page, top-level document first.
    async fn surfaces(&self) -> Result<Vec<Arc<dyn Surface>>>;

    /// Release the tab.
    async fn close(&self) -> Result<()>;
}

/// A provisioned browser able to open fresh pages.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_lookup() {
        let node = ElementNode {
            handle: ElementHandle::new("1"),
            text: "17".to_string(),
            visible: true,
            attributes: BTreeMap::from([("data-date".to_string(), "2025-10-17".to_string())]),
        };
        assert_eq!(node.attr("data-date"), Some("2025-10-17"));
        assert_eq!(node.attr("aria-label"), None);
        assert_eq!(node.handle.to_string(), "1");
    }
}
