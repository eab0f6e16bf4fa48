//! Calendar frame selection.
//!
//! Picks the surface whose URL looks like a scheduling widget, falling back
//! to the top-level document for inline integrations.

use std::sync::Arc;

use crate::browser::Surface;

/// Chooses the surface hosting the calendar by URL keyword.
#[derive(Debug, Clone)]
pub struct FrameSelector {
    keywords: Vec<String>,
}

impl FrameSelector {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Whether a surface URL contains any keyword, ignoring case.
    pub fn matches(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.keywords.iter().any(|k| url.contains(k.as_str()))
    }

    /// First matching surface, else the top-level document (index 0).
    pub fn select(&self, surfaces: &[Arc<dyn Surface>]) -> Option<Arc<dyn Surface>> {
        surfaces
            .iter()
            .find(|s| self.matches(s.url()))
            .or_else(|| surfaces.first())
            .cloned()
    }
}
