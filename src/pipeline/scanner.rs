//! Per-link scan state machine.
//!
//! ```text
//! SelectingFrame -> DismissingConsent -> ScanningMonth -> NextDay
//! NextDay        -> ActivatingDay | NextMonth
//! ActivatingDay  -> DetectingSlots | NextDay
//! DetectingSlots -> Found | NextDay
//! NextMonth      -> ScanningMonth | Exhausted
//! ```
//!
//! Days are tried in ascending order within a month and months forward from
//! the widget's initial view, so the first `Found` is the earliest qualifying
//! day the forward scan can reach.
//!
//! Selecting a day may re-render the grid, so `NextDay` re-locates the days
//! and continues from the first date after the last one tried instead of
//! reusing handles from an earlier render.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::browser::{PageSession, Surface};
use crate::error::{AppError, Result};
use crate::models::{CalendarDay, Config, ScanOutcome};
use crate::services::{ConsentDismisser, DayLocatorChain, FrameSelector, MonthPaginator, SlotDetector};

/// The calendar surface plus the zero-based index of the month it shows.
struct MonthCursor {
    calendar: Arc<dyn Surface>,
    month: u32,
}

enum ScanState {
    SelectingFrame,
    DismissingConsent {
        top: Arc<dyn Surface>,
        calendar: Arc<dyn Surface>,
    },
    ScanningMonth(MonthCursor),
    /// Carries the last date tried in this month, if any.
    NextDay(MonthCursor, Option<NaiveDate>),
    ActivatingDay(MonthCursor, CalendarDay),
    DetectingSlots(MonthCursor, CalendarDay),
    NextMonth(MonthCursor),
    Found { date: NaiveDate, slots: usize },
    Exhausted { months_scanned: u32 },
}

/// Finds the earliest day with at least `min_slots` slots on a loaded page.
pub struct CalendarScanner {
    frames: FrameSelector,
    consent: ConsentDismisser,
    days: DayLocatorChain,
    paginator: MonthPaginator,
    slots: SlotDetector,
    min_slots: usize,
    max_months: u32,
    click_timeout: Duration,
    click_settle: Duration,
}

impl CalendarScanner {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            frames: FrameSelector::new(&config.selectors.frame_keywords),
            consent: ConsentDismisser::new(&config.selectors, &config.scan)?,
            days: DayLocatorChain::from_selectors(&config.selectors),
            paginator: MonthPaginator::new(&config.selectors, &config.scan),
            slots: SlotDetector::new(&config.selectors, &config.scan),
            min_slots: config.min_slots.max(1),
            max_months: config.max_months_to_scan.max(1),
            click_timeout: config.scan.click_timeout(),
            click_settle: config.scan.click_settle(),
        })
    }

    /// Drive the state machine over a page that has already loaded.
    pub async fn find_earliest(&self, page: &dyn PageSession) -> Result<ScanOutcome> {
        let mut state = ScanState::SelectingFrame;
        loop {
            state = match state {
                ScanState::SelectingFrame => {
                    let surfaces = page.surfaces().await?;
                    let top = surfaces
                        .first()
                        .cloned()
                        .ok_or_else(|| AppError::browser("page has no document"))?;
                    let calendar = self
                        .frames
                        .select(&surfaces)
                        .unwrap_or_else(|| Arc::clone(&top));
                    log::debug!(
                        "Calendar surface {} of {}: {}",
                        surfaces
                            .iter()
                            .position(|s| Arc::ptr_eq(s, &calendar))
                            .unwrap_or_default(),
                        surfaces.len(),
                        calendar.url()
                    );
                    ScanState::DismissingConsent { top, calendar }
                }

                ScanState::DismissingConsent { top, calendar } => {
                    let mut clicked = self.consent.dismiss(top.as_ref()).await;
                    if !Arc::ptr_eq(&top, &calendar) {
                        clicked += self.consent.dismiss(calendar.as_ref()).await;
                    }
                    if clicked > 0 {
                        log::debug!("Dismissed {} consent control(s)", clicked);
                    }
                    ScanState::ScanningMonth(MonthCursor { calendar, month: 0 })
                }

                ScanState::ScanningMonth(cursor) => {
                    log::debug!("Scanning month {}", cursor.month + 1);
                    ScanState::NextDay(cursor, None)
                }

                ScanState::NextDay(cursor, after) => {
                    let days = self.days.locate(cursor.calendar.as_ref()).await;
                    if after.is_none() {
                        log::debug!("Month {}: {} candidate day(s)", cursor.month + 1, days.len());
                    }
                    match next_after(days, after) {
                        Some(day) => ScanState::ActivatingDay(cursor, day),
                        None => ScanState::NextMonth(cursor),
                    }
                }

                ScanState::ActivatingDay(cursor, day) => {
                    match self.activate(cursor.calendar.as_ref(), &day).await {
                        Ok(()) => ScanState::DetectingSlots(cursor, day),
                        Err(e) => {
                            log::debug!("Skipping {}: {}", day.iso(), e);
                            ScanState::NextDay(cursor, Some(day.date))
                        }
                    }
                }

                ScanState::DetectingSlots(cursor, day) => {
                    let slots = self.slots.wait_for_slots(page, &cursor.calendar).await;
                    log::debug!("{}: {} slot(s)", day.iso(), slots.len());
                    if slots.len() >= self.min_slots {
                        ScanState::Found {
                            date: day.date,
                            slots: slots.len(),
                        }
                    } else {
                        ScanState::NextDay(cursor, Some(day.date))
                    }
                }

                ScanState::NextMonth(cursor) => {
                    let scanned = cursor.month + 1;
                    if scanned >= self.max_months {
                        ScanState::Exhausted {
                            months_scanned: scanned,
                        }
                    } else if self.paginator.advance(cursor.calendar.as_ref()).await {
                        ScanState::ScanningMonth(MonthCursor {
                            month: scanned,
                            ..cursor
                        })
                    } else {
                        log::debug!("No next-month control after month {}", scanned);
                        ScanState::Exhausted {
                            months_scanned: scanned,
                        }
                    }
                }

                ScanState::Found { date, slots } => return Ok(ScanOutcome::Found { date, slots }),
                ScanState::Exhausted { months_scanned } => {
                    return Ok(ScanOutcome::Exhausted { months_scanned });
                }
            };
        }
    }

    /// Click a day; a stale handle is re-resolved by date and retried once.
    async fn activate(&self, calendar: &dyn Surface, day: &CalendarDay) -> Result<()> {
        match self.click_day(calendar, day).await {
            Err(AppError::Element(reason)) => {
                log::debug!("Re-resolving {} after: {}", day.iso(), reason);
                let fresh = self
                    .days
                    .locate(calendar)
                    .await
                    .into_iter()
                    .find(|d| d.date == day.date && d.handle != day.handle)
                    .ok_or_else(|| AppError::element(reason))?;
                self.click_day(calendar, &fresh).await
            }
            other => other,
        }
    }

    async fn click_day(&self, calendar: &dyn Surface, day: &CalendarDay) -> Result<()> {
        if let Err(e) = calendar.scroll_into_view(&day.handle).await {
            log::debug!("Scroll to {} failed: {}", day.iso(), e);
        }
        calendar.click(&day.handle, self.click_timeout).await?;
        tokio::time::sleep(self.click_settle).await;
        Ok(())
    }
}

/// First day strictly after `after`; days arrive sorted ascending.
fn next_after(days: Vec<CalendarDay>, after: Option<NaiveDate>) -> Option<CalendarDay> {
    days.into_iter()
        .find(|day| after.is_none_or(|last| day.date > last))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::browser::{
        BrowserSession, ElementHandle, ElementNode, INITIAL_VIEW, SnapshotBrowser, SnapshotSite,
        SnapshotSurface,
    };
    use crate::models::CalendarSelectors;

    /// A grid that re-mounts on every accepted click, so handles from an
    /// earlier render fail as detached. Only the 21st shows slots.
    struct RemountingGrid {
        selectors: CalendarSelectors,
        generation: Mutex<u32>,
        selected: Mutex<Option<u32>>,
        /// Day queries that re-mount the grid right after answering.
        remount_after_query: Mutex<u32>,
        clicks: Mutex<Vec<String>>,
    }

    impl RemountingGrid {
        fn new(remount_after_query: u32) -> Arc<Self> {
            Arc::new(Self {
                selectors: CalendarSelectors::default(),
                generation: Mutex::new(0),
                selected: Mutex::new(None),
                remount_after_query: Mutex::new(remount_after_query),
                clicks: Mutex::new(Vec::new()),
            })
        }

        fn node(handle: String, text: &str, attributes: BTreeMap<String, String>) -> ElementNode {
            ElementNode {
                handle: ElementHandle::new(handle),
                text: text.to_string(),
                visible: true,
                attributes,
            }
        }
    }

    #[async_trait]
    impl Surface for RemountingGrid {
        fn url(&self) -> &str {
            "https://w.example/embed"
        }

        async fn query(&self, selector: &str) -> Result<Vec<ElementNode>> {
            if selector == self.selectors.date_attribute_cells {
                let mut generation = self.generation.lock().unwrap();
                let days = [20, 21, 22]
                    .into_iter()
                    .map(|day| {
                        let attributes = BTreeMap::from([(
                            "data-date".to_string(),
                            format!("2025-10-{day}"),
                        )]);
                        Self::node(format!("g{generation}-d{day}"), &day.to_string(), attributes)
                    })
                    .collect();
                let mut remounts = self.remount_after_query.lock().unwrap();
                if *remounts > 0 {
                    *remounts -= 1;
                    *generation += 1;
                }
                return Ok(days);
            }
            if selector == self.selectors.slot_candidates
                && *self.selected.lock().unwrap() == Some(21)
            {
                return Ok(["1:00 pm", "2:00 pm", "3:00 pm"]
                    .into_iter()
                    .enumerate()
                    .map(|(i, text)| Self::node(format!("slot{i}"), text, BTreeMap::new()))
                    .collect());
            }
            Ok(Vec::new())
        }

        async fn scroll_into_view(&self, _handle: &ElementHandle) -> Result<()> {
            Ok(())
        }

        async fn click(&self, handle: &ElementHandle, _timeout: Duration) -> Result<()> {
            self.clicks.lock().unwrap().push(handle.to_string());
            let mut generation = self.generation.lock().unwrap();
            let (issued, day) = handle
                .as_str()
                .trim_start_matches('g')
                .split_once("-d")
                .unwrap();
            if issued.parse::<u32>().unwrap() != *generation {
                return Err(AppError::element(format!("element {handle} is detached")));
            }
            *generation += 1;
            *self.selected.lock().unwrap() = Some(day.parse().unwrap());
            Ok(())
        }

        async fn body_text(&self) -> Result<String> {
            Ok(String::new())
        }
    }

    struct GridPage(Arc<RemountingGrid>);

    #[async_trait]
    impl PageSession for GridPage {
        async fn goto(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn surfaces(&self) -> Result<Vec<Arc<dyn Surface>>> {
            let grid: Arc<dyn Surface> = self.0.clone();
            Ok(vec![grid])
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    const OCTOBER: &str = r#"
        <h2>October 2025</h2>
        <button data-date="2025-10-20" id="oct20">20</button>
        <button data-date="2025-10-21" id="oct21">21</button>
        <button id="next" aria-label="Next month">›</button>"#;

    fn config(min_slots: usize, max_months: u32) -> Config {
        Config {
            min_slots,
            max_months_to_scan: max_months,
            ..Config::default()
        }
    }

    async fn scan(site: SnapshotSite, config: &Config) -> ScanOutcome {
        let url = site.url().to_string();
        let browser = SnapshotBrowser::new(vec![site]);
        let page = browser.open_page().await.unwrap();
        page.goto(&url).await.unwrap();
        CalendarScanner::from_config(config)
            .unwrap()
            .find_earliest(page.as_ref())
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_qualifying_day_wins() {
        let widget = SnapshotSurface::new("https://acme.chilipiper.com/router", OCTOBER)
            .with_view("oct20", format!("{OCTOBER}<ul><li>9:00 am</li><li>9:30 am</li></ul>"))
            .with_view(
                "oct21",
                format!("{OCTOBER}<ul><li>1:00 pm</li><li>2:00 pm</li><li>3:00 pm</li></ul>"),
            )
            .on_click(INITIAL_VIEW, "oct20", "oct20")
            .on_click("oct20", "oct21", "oct21");
        let site = SnapshotSite::new(SnapshotSurface::new(
            "https://acme.example/book",
            "<p>Book a demo</p>",
        ))
        .with_frame(widget);

        let outcome = scan(site, &config(3, 6)).await;
        assert_eq!(
            outcome,
            ScanOutcome::Found {
                date: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
                slots: 3
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_month_budget_stops_before_paginating() {
        let widget = SnapshotSurface::new("https://w.example/embed", OCTOBER)
            .with_view("november", "<h2>November 2025</h2>")
            .on_click(INITIAL_VIEW, "next", "november");
        let site = SnapshotSite::new(widget);
        let surface = site.surface(0).unwrap();

        let outcome = scan(site, &config(1, 1)).await;
        assert_eq!(outcome, ScanOutcome::Exhausted { months_scanned: 1 });
        assert!(!surface.clicks().contains(&"#next".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_day_is_skipped() {
        let html = r#"
            <button data-date="2025-10-20" disabled>20</button>
            <button data-date="2025-10-21" id="d21">21</button>"#;
        let widget = SnapshotSurface::new("https://w.example/embed", html)
            .with_view("slots", format!("{html}<button>10:00</button>"))
            .on_click(INITIAL_VIEW, "d21", "slots");

        let outcome = scan(SnapshotSite::new(widget), &config(1, 1)).await;
        assert_eq!(
            outcome,
            ScanOutcome::Found {
                date: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
                slots: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_consent_banner_is_dismissed_first() {
        let html = r#"<button id="ok">Accept all</button>"#;
        let top = SnapshotSurface::new("https://acme.example/book", html)
            .with_view("clear", "<p>thanks</p>")
            .on_click(INITIAL_VIEW, "ok", "clear");
        let site = SnapshotSite::new(top);
        let surface = site.surface(0).unwrap();

        let outcome = scan(site, &config(1, 3)).await;
        assert_eq!(outcome, ScanOutcome::Exhausted { months_scanned: 1 });
        assert_eq!(surface.clicks(), vec!["#ok".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_days_are_re_resolved_after_each_click() {
        let grid = RemountingGrid::new(0);
        let outcome = CalendarScanner::from_config(&config(3, 1))
            .unwrap()
            .find_earliest(&GridPage(Arc::clone(&grid)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ScanOutcome::Found {
                date: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
                slots: 3
            }
        );
        assert_eq!(*grid.clicks.lock().unwrap(), vec!["g0-d20", "g1-d21"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_day_handle_is_retried_once() {
        let grid = RemountingGrid::new(1);
        let outcome = CalendarScanner::from_config(&config(3, 1))
            .unwrap()
            .find_earliest(&GridPage(Arc::clone(&grid)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ScanOutcome::Found {
                date: NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(),
                slots: 3
            }
        );
        assert_eq!(
            *grid.clicks.lock().unwrap(),
            vec!["g0-d20", "g1-d20", "g2-d21"]
        );
    }
}
