//! Month pagination.

use std::time::Duration;

use crate::browser::Surface;
use crate::models::{CalendarSelectors, ControlSelector, ScanSettings};

/// Advances the calendar one month through the first "next" control that responds.
#[derive(Debug, Clone)]
pub struct MonthPaginator {
    controls: Vec<ControlSelector>,
    click_timeout: Duration,
    settle: Duration,
}

impl MonthPaginator {
    pub fn new(selectors: &CalendarSelectors, settings: &ScanSettings) -> Self {
        Self {
            controls: selectors.next_month_controls.clone(),
            click_timeout: settings.click_timeout(),
            settle: settings.pagination_settle(),
        }
    }

    /// Returns false when no control could be clicked; that ends the scan.
    pub async fn advance(&self, surface: &dyn Surface) -> bool {
        for control in &self.controls {
            let nodes = match surface.query(&control.css).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    log::debug!("Next-month control '{}' unusable: {}", control.css, e);
                    continue;
                }
            };
            let Some(node) = nodes.into_iter().find(|n| control.accepts_text(&n.text)) else {
                continue;
            };

            match surface.click(&node.handle, self.click_timeout).await {
                Ok(()) => {
                    log::debug!("Advanced month via '{}'", control.css);
                    tokio::time::sleep(self.settle).await;
                    return true;
                }
                Err(e) => log::debug!("Next-month click via '{}' failed: {}", control.css, e),
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{INITIAL_VIEW, SnapshotSurface};

    fn paginator() -> MonthPaginator {
        MonthPaginator::new(&CalendarSelectors::default(), &ScanSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_clicks_first_responding_control() {
        let surface = SnapshotSurface::new(
            "https://w.example/embed",
            r#"<button aria-label="Previous month">‹</button>
               <button id="next" aria-label="Next month">›</button>"#,
        )
        .with_view("november", "<h2>November 2025</h2>")
        .on_click(INITIAL_VIEW, "next", "november");

        assert!(paginator().advance(&surface).await);
        assert_eq!(surface.current_view(), "november");
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_control_falls_through_to_text_match() {
        let surface = SnapshotSurface::new(
            "https://w.example/embed",
            r#"<button id="arrow" title="Next" disabled>›</button>
               <button id="back">Back</button>
               <button id="text-next">Next dates</button>"#,
        );
        assert!(paginator().advance(&surface).await);
        assert_eq!(surface.clicks(), vec!["#text-next".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_control() {
        let surface = SnapshotSurface::new("https://w.example/embed", "<button>Back</button>");
        assert!(!paginator().advance(&surface).await);
        assert!(surface.clicks().is_empty());
    }
}
