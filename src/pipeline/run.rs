// src/pipeline/run.rs

//! Availability scanning pipeline.

use chrono::Utc;
use chrono_tz::Tz;

use crate::browser::BrowserSession;
use crate::error::{AppError, Result};
use crate::models::{Config, LinkTarget, ScanOutcome, ScanResult};
use crate::pipeline::CalendarScanner;
use crate::utils::{get_domain, today_in};

/// Scan every configured link in order, one fresh page per link.
///
/// Per-link faults become that link's `error`; only invalid configuration
/// fails the run.
pub async fn run_scan(config: &Config, browser: &dyn BrowserSession) -> Result<Vec<ScanResult>> {
    let start_time = Utc::now();
    let tz = config.tz()?;
    let scanner = CalendarScanner::from_config(config)?;

    log::info!(
        "Scanning {} link(s) for days with >= {} slots, up to {} month(s) ahead ({})",
        config.links.len(),
        config.min_slots,
        config.max_months_to_scan,
        tz
    );

    let mut results = Vec::with_capacity(config.links.len());
    for (i, link) in config.links.iter().enumerate() {
        log::info!(
            "[{}/{}] {} ({})",
            i + 1,
            config.links.len(),
            link.name,
            get_domain(&link.url).unwrap_or_else(|| link.url.clone())
        );
        let result = scan_link(config, &scanner, browser, link, tz).await;
        log_result(&result);
        results.push(result);
    }

    let found = results.iter().filter(|r| r.is_found()).count();
    let failed = results.iter().filter(|r| r.is_error()).count();
    log::info!(
        "Scan complete in {}s: {} found, {} without a qualifying day, {} failed",
        (Utc::now() - start_time).num_seconds(),
        found,
        results.len() - found - failed,
        failed
    );
    Ok(results)
}

async fn scan_link(
    config: &Config,
    scanner: &CalendarScanner,
    browser: &dyn BrowserSession,
    link: &LinkTarget,
    tz: Tz,
) -> ScanResult {
    match scan_page(config, scanner, browser, link).await {
        Ok(ScanOutcome::Found { date, slots }) => {
            ScanResult::found(link, date, slots, today_in(tz))
        }
        Ok(ScanOutcome::Exhausted { months_scanned }) => {
            log::debug!("{}: exhausted after {} month(s)", link.name, months_scanned);
            ScanResult::exhausted(link, config.exhausted_note())
        }
        Err(e) => ScanResult::failed(link, e.to_string()),
    }
}

async fn scan_page(
    config: &Config,
    scanner: &CalendarScanner,
    browser: &dyn BrowserSession,
    link: &LinkTarget,
) -> Result<ScanOutcome> {
    let page = browser.open_page().await?;

    let outcome = async {
        tokio::time::timeout(config.scan.navigation_timeout(), page.goto(&link.url))
            .await
            .map_err(|_| {
                AppError::navigation(
                    &link.url,
                    format!(
                        "timed out after {}s",
                        config.scan.navigation_timeout().as_secs()
                    ),
                )
            })??;
        tokio::time::sleep(config.scan.post_navigation_settle()).await;
        scanner.find_earliest(page.as_ref()).await
    }
    .await;

    if let Err(e) = page.close().await {
        log::debug!("Closing page for {} failed: {}", link.name, e);
    }
    outcome
}

fn log_result(result: &ScanResult) {
    match (&result.earliest_date, &result.error) {
        (Some(date), _) => log::info!(
            "  {}: {} ({} day(s) out, {} slots)",
            result.name,
            date,
            result.days_from_today.unwrap_or_default(),
            result.slot_count_observed
        ),
        (None, Some(error)) => log::warn!("  {}: {}", result.name, error),
        (None, None) => log::info!("  {}: no qualifying day", result.name),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::browser::{INITIAL_VIEW, SnapshotBrowser, SnapshotSite, SnapshotSurface};

    const TOP: &str = "https://acme.example/book";
    const WIDGET: &str = "https://acme.chilipiper.com/router/demo";

    fn october() -> String {
        r#"<div aria-live="polite">October 2025</div>
           <table><tr>
             <td id="o1">1</td><td id="o2">2</td>
           </tr></table>
           <button id="next" aria-label="Next month">›</button>"#
            .to_string()
    }

    fn november(slots_view: &str) -> String {
        format!(
            r#"<div aria-live="polite">November 2025</div>
               <table><tr>
                 <td id="n1">1</td><td id="n2">2</td><td id="n3">3</td><td id="n4">4</td>
               </tr></table>
               <button aria-label="Next month">›</button>
               {slots_view}"#
        )
    }

    /// Two-month widget: October has only one slot per day, November 3rd has
    /// exactly three (plus a hidden duplicate), November 4th would have more.
    fn two_month_site() -> SnapshotSite {
        let one_slot = "<div role=\"listbox\"><button role=\"option\">9:00 am</button></div>";
        let three_slots = r#"
            <div role="listbox">
              <button role="option">9:00 am</button>
              <button role="option">9:30 AM</button>
              <button role="option">10:00am</button>
              <button role="option" style="display:none">11:00 am</button>
              <button role="option" hidden>9:00 am</button>
            </div>"#;
        let many_slots = "<button>8:00</button><button>8:30</button><button>9:00</button><button>9:30</button>";

        let widget = SnapshotSurface::new(WIDGET, october())
            .with_view("o1", format!("{}{}", october(), one_slot))
            .with_view("o2", format!("{}{}", october(), one_slot))
            .with_view("nov", november(""))
            .with_view("n1", november(one_slot))
            .with_view("n2", november(""))
            .with_view("n3", november(three_slots))
            .with_view("n4", november(many_slots))
            .on_click(INITIAL_VIEW, "o1", "o1")
            .on_click("o1", "o2", "o2")
            .on_click("o2", "next", "nov")
            .on_click("nov", "n1", "n1")
            .on_click("n1", "n2", "n2")
            .on_click("n2", "n3", "n3")
            .on_click("n3", "n4", "n4");

        SnapshotSite::new(SnapshotSurface::new(TOP, "<h1>Book a demo</h1>")).with_frame(widget)
    }

    fn config(links: Vec<LinkTarget>) -> Config {
        Config {
            timezone: "America/New_York".to_string(),
            min_slots: 3,
            max_months_to_scan: 6,
            links,
            ..Config::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_month_widget_finds_third_day() {
        let browser = SnapshotBrowser::new(vec![two_month_site()]);
        let config = config(vec![LinkTarget::new("Sales Demo", TOP)]);

        let results = run_scan(&config, &browser).await.unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(
            result.earliest_date,
            Some(NaiveDate::from_ymd_opt(2025, 11, 3).unwrap())
        );
        assert_eq!(result.slot_count_observed, 3);
        assert!(result.note.is_none());
        assert!(result.error.is_none());
        let today = today_in(config.tz().unwrap());
        assert_eq!(
            result.days_from_today,
            Some((NaiveDate::from_ymd_opt(2025, 11, 3).unwrap() - today).num_days())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pagination_control_sets_note() {
        let widget = SnapshotSurface::new(
            WIDGET,
            r#"<button data-date="2025-10-01">1</button><button data-date="2025-10-02">2</button>"#,
        );
        let browser = SnapshotBrowser::new(vec![SnapshotSite::new(widget)]);
        let config = config(vec![LinkTarget::new("Support", WIDGET)]);

        let results = run_scan(&config, &browser).await.unwrap();
        let result = &results[0];
        assert_eq!(result.earliest_date, None);
        assert_eq!(result.days_from_today, None);
        assert_eq!(result.slot_count_observed, 0);
        assert!(result.error.is_none());
        assert_eq!(
            result.note.as_deref(),
            Some("No day with ≥3 slots within 6 months, or times rendered in an unsupported way.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_is_isolated() {
        let browser = SnapshotBrowser::new(vec![two_month_site()]);
        let config = config(vec![
            LinkTarget::new("Broken", "https://unreachable.example/book"),
            LinkTarget::new("Sales Demo", TOP),
        ]);

        let results = run_scan(&config, &browser).await.unwrap();
        assert_eq!(results.len(), 2);

        let broken = &results[0];
        assert_eq!(broken.name, "Broken");
        assert_eq!(broken.earliest_date, None);
        assert!(broken.note.is_none());
        assert!(
            broken
                .error
                .as_deref()
                .is_some_and(|e| e.contains("unreachable.example"))
        );

        assert_eq!(results[1].name, "Sales Demo");
        assert!(results[1].is_found());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_outcome_per_link_in_order() {
        let empty = SnapshotSite::new(SnapshotSurface::new(
            "https://empty.example/embed",
            "<p>Nothing to book</p>",
        ));
        let browser = SnapshotBrowser::new(vec![two_month_site(), empty]);
        let config = config(vec![
            LinkTarget::new("A", "https://empty.example/embed"),
            LinkTarget::new("B", TOP),
            LinkTarget::new("C", "https://missing.example"),
        ]);

        let results = run_scan(&config, &browser).await.unwrap();
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        for result in &results {
            let set = [
                result.earliest_date.is_some(),
                result.note.is_some(),
                result.error.is_some(),
            ];
            assert_eq!(set.iter().filter(|s| **s).count(), 1, "{}", result.name);
            if result.is_found() {
                assert!(result.slot_count_observed >= config.min_slots);
            }
        }
    }

    #[tokio::test]
    async fn test_bad_timezone_fails_run() {
        let browser = SnapshotBrowser::default();
        let mut config = config(vec![LinkTarget::new("A", TOP)]);
        config.timezone = "Mars/Olympus".to_string();
        assert!(matches!(
            run_scan(&config, &browser).await,
            Err(AppError::Config(_))
        ));
    }
}
