//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CalendarSelectors, LinkTarget};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// IANA timezone used for "today" and the browser's clock
    #[serde(default = "defaults::timezone")]
    pub timezone: String,

    /// Minimum number of slots a day needs to qualify
    #[serde(default = "defaults::min_slots")]
    pub min_slots: usize,

    /// Month horizon per link, counting the initial view
    #[serde(default = "defaults::max_months_to_scan")]
    pub max_months_to_scan: u32,

    /// Widget pages to scan, in output order
    #[serde(default)]
    pub links: Vec<LinkTarget>,

    /// Engine timings
    #[serde(default)]
    pub scan: ScanSettings,

    /// Locator tables
    #[serde(default)]
    pub selectors: CalendarSelectors,

    /// Browser session settings
    #[serde(default)]
    pub browser: BrowserSettings,
}

impl Config {
    /// Load configuration from a JSON file, or TOML when the extension is `.toml`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path.extension().and_then(|e| e.to_str()))
    }

    /// Load configuration or fall back to defaults when the file is missing or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default configuration ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    fn parse(content: &str, extension: Option<&str>) -> Result<Self> {
        match extension {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(toml::from_str(content)?),
            _ => Ok(serde_json::from_str(content)?),
        }
    }

    /// Replace the configured timezone when an override is given.
    pub fn with_timezone_override(mut self, timezone: Option<String>) -> Self {
        if let Some(tz) = timezone.filter(|tz| !tz.trim().is_empty()) {
            self.timezone = tz.trim().to_string();
        }
        self
    }

    /// Parsed timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AppError::config(format!("unknown timezone '{}': {e}", self.timezone)))
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.tz()?;
        if self.min_slots == 0 {
            return Err(AppError::validation("minSlots must be >= 1"));
        }
        if self.max_months_to_scan == 0 {
            return Err(AppError::validation("maxMonthsToScan must be >= 1"));
        }
        if self.links.is_empty() {
            return Err(AppError::validation("No links defined"));
        }

        let mut names = HashSet::new();
        for link in &self.links {
            if link.name.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "link with url {} has an empty name",
                    link.url
                )));
            }
            if !names.insert(link.name.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate link name '{}'",
                    link.name
                )));
            }
            let parsed = Url::parse(&link.url).map_err(|e| {
                AppError::validation(format!("link '{}' has invalid url: {e}", link.name))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::validation(format!(
                    "link '{}' must use http(s), got {}",
                    link.name,
                    parsed.scheme()
                )));
            }
        }

        if self.scan.poll_attempts == 0 {
            return Err(AppError::validation("scan.pollAttempts must be > 0"));
        }
        if self.scan.navigation_timeout_secs == 0 {
            return Err(AppError::validation("scan.navigationTimeoutSecs must be > 0"));
        }
        if self.selectors.next_month_controls.is_empty() {
            return Err(AppError::validation("selectors.nextMonthControls is empty"));
        }
        let selectors = &self.selectors;
        let css_tables = [
            ("consentControls", &selectors.consent_controls),
            ("dateAttributeCells", &selectors.date_attribute_cells),
            ("dateAttribute", &selectors.date_attribute),
            ("ariaLabelCells", &selectors.aria_label_cells),
            ("dayNumberCells", &selectors.day_number_cells),
            ("slotCandidates", &selectors.slot_candidates),
        ];
        for (name, css) in css_tables {
            if css.trim().is_empty() {
                return Err(AppError::validation(format!("selectors.{name} is empty")));
            }
        }
        let lists = [
            ("frameKeywords", &selectors.frame_keywords),
            ("consentLabels", &selectors.consent_labels),
            ("monthHeaders", &selectors.month_headers),
        ];
        for (name, list) in lists {
            if list.iter().all(|entry| entry.trim().is_empty()) {
                return Err(AppError::validation(format!("selectors.{name} is empty")));
            }
        }
        Ok(())
    }

    /// Note recorded when a link is exhausted without a qualifying day.
    pub fn exhausted_note(&self) -> String {
        format!(
            "No day with ≥{} slots within {} months, or times rendered in an unsupported way.",
            self.min_slots, self.max_months_to_scan
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: defaults::timezone(),
            min_slots: defaults::min_slots(),
            max_months_to_scan: defaults::max_months_to_scan(),
            links: Vec::new(),
            scan: ScanSettings::default(),
            selectors: CalendarSelectors::default(),
            browser: BrowserSettings::default(),
        }
    }
}

/// Engine timings: settle delays, click timeouts and the slot poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSettings {
    /// Slot detector re-scans before giving up
    #[serde(default = "defaults::poll_attempts")]
    pub poll_attempts: u32,

    /// Delay between slot detector re-scans
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_ms: u64,

    /// Timeout for a single day click
    #[serde(default = "defaults::click_timeout")]
    pub click_timeout_ms: u64,

    /// Pause after a day click before polling for slots
    #[serde(default = "defaults::click_settle")]
    pub click_settle_ms: u64,

    /// Pause after a "next month" click
    #[serde(default = "defaults::pagination_settle")]
    pub pagination_settle_ms: u64,

    /// Timeout for a single consent button click
    #[serde(default = "defaults::consent_click_timeout")]
    pub consent_click_timeout_ms: u64,

    /// Pause after a consent button click
    #[serde(default = "defaults::consent_settle")]
    pub consent_settle_ms: u64,

    /// Page load timeout
    #[serde(default = "defaults::navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Pause after the page has loaded
    #[serde(default = "defaults::post_navigation_settle")]
    pub post_navigation_settle_ms: u64,

    /// Look for time slots in every frame, not only the calendar frame
    #[serde(default = "defaults::scan_all_frames")]
    pub scan_all_frames: bool,
}

impl ScanSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.click_timeout_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn pagination_settle(&self) -> Duration {
        Duration::from_millis(self.pagination_settle_ms)
    }

    pub fn consent_click_timeout(&self) -> Duration {
        Duration::from_millis(self.consent_click_timeout_ms)
    }

    pub fn consent_settle(&self) -> Duration {
        Duration::from_millis(self.consent_settle_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn post_navigation_settle(&self) -> Duration {
        Duration::from_millis(self.post_navigation_settle_ms)
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            poll_attempts: defaults::poll_attempts(),
            poll_interval_ms: defaults::poll_interval(),
            click_timeout_ms: defaults::click_timeout(),
            click_settle_ms: defaults::click_settle(),
            pagination_settle_ms: defaults::pagination_settle(),
            consent_click_timeout_ms: defaults::consent_click_timeout(),
            consent_settle_ms: defaults::consent_settle(),
            navigation_timeout_secs: defaults::navigation_timeout(),
            post_navigation_settle_ms: defaults::post_navigation_settle(),
            scan_all_frames: defaults::scan_all_frames(),
        }
    }
}

/// Headless browser launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSettings {
    /// Run without a visible window
    #[serde(default = "defaults::headless")]
    pub headless: bool,

    /// Viewport size as (width, height)
    #[serde(default = "defaults::window_size")]
    pub window_size: (u32, u32),

    /// User-Agent presented to widget pages
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Browser UI/content language
    #[serde(default = "defaults::locale")]
    pub locale: String,

    /// Hide common automation fingerprints
    #[serde(default = "defaults::stealth")]
    pub stealth: bool,

    /// Additional command-line flags for the browser
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: defaults::headless(),
            window_size: defaults::window_size(),
            user_agent: defaults::user_agent(),
            locale: defaults::locale(),
            stealth: defaults::stealth(),
            extra_args: Vec::new(),
        }
    }
}

mod defaults {
    // Scan defaults
    pub fn timezone() -> String {
        "America/New_York".into()
    }
    pub fn min_slots() -> usize {
        3
    }
    pub fn max_months_to_scan() -> u32 {
        6
    }

    // Timing defaults
    pub fn poll_attempts() -> u32 {
        16
    }
    pub fn poll_interval() -> u64 {
        500
    }
    pub fn click_timeout() -> u64 {
        2500
    }
    pub fn click_settle() -> u64 {
        300
    }
    pub fn pagination_settle() -> u64 {
        550
    }
    pub fn consent_click_timeout() -> u64 {
        500
    }
    pub fn consent_settle() -> u64 {
        250
    }
    pub fn navigation_timeout() -> u64 {
        90
    }
    pub fn post_navigation_settle() -> u64 {
        1000
    }
    pub fn scan_all_frames() -> bool {
        true
    }

    // Browser defaults
    pub fn headless() -> bool {
        true
    }
    pub fn window_size() -> (u32, u32) {
        (1366, 900)
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36"
            .into()
    }
    pub fn locale() -> String {
        "en-US".into()
    }
    pub fn stealth() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            links: vec![LinkTarget::new("Sales Demo", "https://example.com/demo")],
            ..Config::default()
        }
    }

    #[test]
    fn validate_sample_config_ok() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_links() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_min_slots() {
        let mut config = sample_config();
        config.min_slots = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_timezone() {
        let mut config = sample_config();
        config.timezone = "Mars/Olympus_Mons".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let mut config = sample_config();
        config
            .links
            .push(LinkTarget::new("Sales Demo", "https://example.com/other"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_urls() {
        let mut config = sample_config();
        config.links[0].url = "/booking".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_selector_tables() {
        let mut config = sample_config();
        config.selectors.month_headers = Vec::new();
        assert!(matches!(config.validate(), Err(AppError::Validation(m)) if m.contains("monthHeaders")));

        let mut config = sample_config();
        config.selectors.frame_keywords = vec!["  ".to_string()];
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.selectors.day_number_cells = String::new();
        assert!(matches!(config.validate(), Err(AppError::Validation(m)) if m.contains("dayNumberCells")));

        let mut config = sample_config();
        config.selectors.consent_controls = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_json_applies_defaults() {
        let json = r#"{ "links": [ { "name": "Demo", "url": "https://example.com" } ] }"#;
        let config = Config::parse(json, Some("json")).unwrap();
        assert_eq!(config.timezone, "America/New_York");
        assert_eq!(config.min_slots, 3);
        assert_eq!(config.max_months_to_scan, 6);
        assert_eq!(config.scan.poll_attempts, 16);
        assert_eq!(config.links.len(), 1);
    }

    #[test]
    fn parse_toml_by_extension() {
        let toml = r#"
            timezone = "Europe/Berlin"
            minSlots = 2

            [[links]]
            name = "Demo"
            url = "https://example.com"

            [scan]
            pollAttempts = 4
        "#;
        let config = Config::parse(toml, Some("toml")).unwrap();
        assert_eq!(config.timezone, "Europe/Berlin");
        assert_eq!(config.min_slots, 2);
        assert_eq!(config.scan.poll_attempts, 4);
        assert_eq!(config.scan.poll_interval_ms, 500);
    }

    #[test]
    fn timezone_override_wins_when_present() {
        let config = sample_config().with_timezone_override(Some("Asia/Tokyo".to_string()));
        assert_eq!(config.timezone, "Asia/Tokyo");
        let config = config.with_timezone_override(Some("  ".to_string()));
        assert_eq!(config.timezone, "Asia/Tokyo");
        let config = config.with_timezone_override(None);
        assert_eq!(config.timezone, "Asia/Tokyo");
    }

    #[test]
    fn exhausted_note_mentions_threshold_and_horizon() {
        let note = sample_config().exhausted_note();
        assert!(note.contains("≥3 slots"));
        assert!(note.contains("6 months"));
    }
}
