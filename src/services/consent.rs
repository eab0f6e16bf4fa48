//! Cookie/consent banner dismissal.

use std::time::Duration;

use regex::{Regex, RegexBuilder};

use crate::browser::Surface;
use crate::error::{AppError, Result};
use crate::models::{CalendarSelectors, ScanSettings};

/// Clicks visible consent buttons. Never fails; every fault is swallowed.
#[derive(Debug, Clone)]
pub struct ConsentDismisser {
    controls: String,
    labels: Vec<Regex>,
    click_timeout: Duration,
    settle: Duration,
}

impl ConsentDismisser {
    pub fn new(selectors: &CalendarSelectors, settings: &ScanSettings) -> Result<Self> {
        let labels = selectors
            .consent_labels
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| AppError::config(format!("bad consent label '{pattern}': {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            controls: selectors.consent_controls.clone(),
            labels,
            click_timeout: settings.consent_click_timeout(),
            settle: settings.consent_settle(),
        })
    }

    pub fn matches_label(&self, text: &str) -> bool {
        let text = text.trim();
        !text.is_empty() && self.labels.iter().any(|rx| rx.is_match(text))
    }

    /// Click every visible matching control; returns how many clicks landed.
    pub async fn dismiss(&self, surface: &dyn Surface) -> usize {
        let nodes = match surface.query(&self.controls).await {
            Ok(nodes) => nodes,
            Err(e) => {
                log::debug!("Consent scan skipped on {}: {}", surface.url(), e);
                return 0;
            }
        };

        let mut clicked = 0;
        for node in nodes
            .iter()
            .filter(|n| n.visible && self.matches_label(&n.text))
        {
            match surface.click(&node.handle, self.click_timeout).await {
                Ok(()) => {
                    log::debug!("Dismissed consent control '{}'", node.text);
                    clicked += 1;
                    tokio::time::sleep(self.settle).await;
                }
                Err(e) => log::debug!("Consent click on '{}' failed: {}", node.text, e),
            }
        }
        clicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{INITIAL_VIEW, SnapshotSurface};

    fn dismisser() -> ConsentDismisser {
        ConsentDismisser::new(&CalendarSelectors::default(), &ScanSettings::default()).unwrap()
    }

    #[test]
    fn test_label_set() {
        let d = dismisser();
        assert!(d.matches_label("Accept all cookies"));
        assert!(d.matches_label("I AGREE"));
        assert!(d.matches_label("Allow all"));
        assert!(d.matches_label("Got it!"));
        assert!(d.matches_label("OK"));
        assert!(!d.matches_label("OK, take me there"));
        assert!(!d.matches_label("Book a meeting"));
        assert!(!d.matches_label(""));
    }

    #[test]
    fn test_bad_pattern_is_config_error() {
        let mut selectors = CalendarSelectors::default();
        selectors.consent_labels = vec!["(".to_string()];
        assert!(matches!(
            ConsentDismisser::new(&selectors, &ScanSettings::default()),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clicks_visible_matches_and_swallows_failures() {
        let html = r#"
            <div id="banner">
              <button id="accept">Accept</button>
              <button id="gone" disabled>Got it</button>
              <button id="hidden" hidden>OK</button>
              <div role="button" id="agree">Agree</div>
              <button id="book">Book</button>
            </div>"#;
        let surface = SnapshotSurface::new("https://acme.example", html)
            .with_view("cleared", "<p>no banner</p>")
            .on_click(INITIAL_VIEW, "agree", "cleared");

        let clicked = dismisser().dismiss(&surface).await;
        assert_eq!(clicked, 2);
        assert_eq!(
            surface.clicks(),
            vec!["#accept".to_string(), "#agree".to_string()]
        );
        assert_eq!(surface.current_view(), "cleared");

        // Idempotent once the banner is gone.
        assert_eq!(dismisser().dismiss(&surface).await, 0);
    }
}
