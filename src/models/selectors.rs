// src/models/selectors.rs

//! Locator tables for scanning a calendar widget.
//!
//! Every list is ordered by priority: earlier entries are tried first.

use serde::{Deserialize, Serialize};

/// A clickable control located by CSS, optionally narrowed by its visible text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSelector {
    /// CSS selector for candidate elements
    pub css: String,

    /// Case-insensitive substring the element text must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ControlSelector {
    /// Control matched by CSS alone.
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
        }
    }

    /// Control matched by CSS and a text fragment.
    pub fn with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: Some(text.into()),
        }
    }

    /// Whether an element's text satisfies the optional text filter.
    pub fn accepts_text(&self, text: &str) -> bool {
        match &self.text {
            Some(needle) => text.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

/// CSS selectors and keyword tables used by the locator chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSelectors {
    /// URL keywords identifying the frame that hosts the calendar
    #[serde(default = "defaults::frame_keywords")]
    pub frame_keywords: Vec<String>,

    /// Elements inspected for consent banners
    #[serde(default = "defaults::consent_controls")]
    pub consent_controls: String,

    /// Case-insensitive regex patterns for consent button labels
    #[serde(default = "defaults::consent_labels")]
    pub consent_labels: Vec<String>,

    /// Day cells carrying a machine-readable date attribute
    #[serde(default = "defaults::date_attribute_cells")]
    pub date_attribute_cells: String,

    /// Name of the machine-readable date attribute
    #[serde(default = "defaults::date_attribute")]
    pub date_attribute: String,

    /// Elements whose accessible label may spell out a date
    #[serde(default = "defaults::aria_label_cells")]
    pub aria_label_cells: String,

    /// Month/year caption locations, tried in order
    #[serde(default = "defaults::month_headers")]
    pub month_headers: Vec<String>,

    /// Cells whose text may be a bare day-of-month number
    #[serde(default = "defaults::day_number_cells")]
    pub day_number_cells: String,

    /// "Next month" controls, tried in order
    #[serde(default = "defaults::next_month_controls")]
    pub next_month_controls: Vec<ControlSelector>,

    /// Elements whose text may be a single time slot
    #[serde(default = "defaults::slot_candidates")]
    pub slot_candidates: String,
}

impl Default for CalendarSelectors {
    fn default() -> Self {
        Self {
            frame_keywords: defaults::frame_keywords(),
            consent_controls: defaults::consent_controls(),
            consent_labels: defaults::consent_labels(),
            date_attribute_cells: defaults::date_attribute_cells(),
            date_attribute: defaults::date_attribute(),
            aria_label_cells: defaults::aria_label_cells(),
            month_headers: defaults::month_headers(),
            day_number_cells: defaults::day_number_cells(),
            next_month_controls: defaults::next_month_controls(),
            slot_candidates: defaults::slot_candidates(),
        }
    }
}

mod defaults {
    use super::ControlSelector;

    pub fn frame_keywords() -> Vec<String> {
        vec![
            "chilipiper".into(),
            "calendar".into(),
            "widget".into(),
            "embed".into(),
        ]
    }

    pub fn consent_controls() -> String {
        "button, [role=button]".into()
    }
    pub fn consent_labels() -> Vec<String> {
        vec![
            "accept".into(),
            "agree".into(),
            "allow all".into(),
            "got it".into(),
            "^ok$".into(),
        ]
    }

    pub fn date_attribute_cells() -> String {
        r#"[role="gridcell"][data-date], button[data-date]"#.into()
    }
    pub fn date_attribute() -> String {
        "data-date".into()
    }
    pub fn aria_label_cells() -> String {
        r#"[role="gridcell"][aria-label], button[aria-label], [aria-label]"#.into()
    }
    pub fn month_headers() -> Vec<String> {
        vec![
            r#"[aria-live="polite"]"#.into(),
            r#"[data-testid*="current-month"]"#.into(),
            ".DayPicker-Caption".into(),
            ".react-datepicker__current-month".into(),
            "header h2, h2".into(),
        ]
    }
    pub fn day_number_cells() -> String {
        r#"[role="gridcell"], button, td"#.into()
    }

    pub fn next_month_controls() -> Vec<ControlSelector> {
        vec![
            ControlSelector::css(r#"button[aria-label="Next month"]"#),
            ControlSelector::css(r#"button[title="Next"]"#),
            ControlSelector::css(r#"[data-testid="next-month"]"#),
            ControlSelector::with_text("button", "Next"),
        ]
    }

    pub fn slot_candidates() -> String {
        r#"button, a, [role="option"], [role="button"], li, div, span"#.into()
    }
}
