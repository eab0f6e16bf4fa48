//! Offline diagnostics against saved widget HTML.
//!
//! Runs frame selection, the day locator chain and a single slot detection
//! pass without clicking anything, so a new widget layout can be checked
//! against the locator tables before a live scan.

use std::sync::Arc;

use crate::browser::{BrowserSession, SnapshotBrowser, SnapshotSite, Surface};
use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::{ConsentDismisser, DayLocatorChain, FrameSelector, SlotDetector};

/// What each scan stage sees on a static page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectReport {
    pub surfaces: Vec<String>,
    pub calendar_url: String,
    pub consent_controls: usize,
    pub day_strategy: Option<&'static str>,
    pub days: Vec<String>,
    pub slots: Vec<String>,
    pub can_paginate: bool,
}

/// Inspect a saved page; the site is loaded into a snapshot browser.
pub async fn run_inspect(config: &Config, site: SnapshotSite) -> Result<InspectReport> {
    let url = site.url().to_string();
    let browser = SnapshotBrowser::new(vec![site]);
    let page = browser.open_page().await?;
    page.goto(&url).await?;

    let surfaces = page.surfaces().await?;
    let calendar = FrameSelector::new(&config.selectors.frame_keywords)
        .select(&surfaces)
        .ok_or_else(|| AppError::browser("page has no document"))?;

    let consent = ConsentDismisser::new(&config.selectors, &config.scan)?;
    let mut consent_controls = 0;
    for surface in &surfaces {
        consent_controls += surface
            .query(&config.selectors.consent_controls)
            .await
            .map(|nodes| {
                nodes
                    .iter()
                    .filter(|n| n.visible && consent.matches_label(&n.text))
                    .count()
            })
            .unwrap_or_default();
    }

    let located = DayLocatorChain::from_selectors(&config.selectors)
        .locate_with_strategy(calendar.as_ref())
        .await;
    let (day_strategy, days): (Option<&'static str>, Vec<String>) = match located {
        Some((name, days)) => (Some(name), days.iter().map(|d| d.iso()).collect()),
        None => (None, Vec::new()),
    };

    let slots: Vec<String> = SlotDetector::new(&config.selectors, &config.scan)
        .observe(page.as_ref(), &calendar)
        .await
        .times()
        .map(str::to_string)
        .collect();

    let can_paginate = has_next_control(config, &calendar).await;

    Ok(InspectReport {
        surfaces: surfaces.iter().map(|s| s.url().to_string()).collect(),
        calendar_url: calendar.url().to_string(),
        consent_controls,
        day_strategy,
        days,
        slots,
        can_paginate,
    })
}

/// Whether any next-month control would be found, without clicking it.
async fn has_next_control(config: &Config, calendar: &Arc<dyn Surface>) -> bool {
    for control in &config.selectors.next_month_controls {
        if let Ok(nodes) = calendar.query(&control.css).await {
            if nodes.iter().any(|n| control.accepts_text(&n.text)) {
                return true;
            }
        }
    }
    false
}

impl InspectReport {
    /// Log the report at info level.
    pub fn log(&self) {
        log::info!("Surfaces: {}", self.surfaces.len());
        for (i, url) in self.surfaces.iter().enumerate() {
            let marker = if *url == self.calendar_url { "*" } else { " " };
            log::info!("  {}[{}] {}", marker, i, url);
        }
        log::info!("Consent controls: {}", self.consent_controls);
        match self.day_strategy {
            Some(strategy) => log::info!(
                "Days ({} via {}): {}",
                self.days.len(),
                strategy,
                self.days.join(", ")
            ),
            None => log::info!("Days: none recognised"),
        }
        log::info!("Slots ({}): {}", self.slots.len(), self.slots.join(", "));
        log::info!(
            "Next-month control: {}",
            if self.can_paginate { "found" } else { "missing" }
        );
    }
}
