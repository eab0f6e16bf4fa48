//! Time slot detection.
//!
//! After a day is activated, booking widgets render its available times
//! asynchronously. Detection is element-first: any visible element whose
//! entire text is a single time counts as a slot. Only when no element
//! qualifies is the rendered page text scanned for time patterns.
//!
//! Recognised forms, case-insensitive:
//! - `9:00 am`, `12:30PM` (12-hour with minutes)
//! - `9 am`, `11pm` (12-hour without minutes)
//! - `09:00`, `17:45` (24-hour)

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::browser::{PageSession, Surface};
use crate::models::{CalendarSelectors, ScanSettings, SlotObservation};
use crate::services::Poller;

static WHOLE_TEXT_SLOT: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        r"(?i)^(?:1[0-2]|0?[1-9]):[0-5]\d\s?[ap]m$",
        r"(?i)^(?:1[0-2]|0?[1-9])\s?[ap]m$",
        r"^(?:[01]?\d|2[0-3]):[0-5]\d$",
    ]
    .map(|pattern| Regex::new(pattern).expect("valid slot regex"))
});

// Alternatives ordered longest first so "9:00 am" is not also counted as "9:00".
static SLOT_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:1[0-2]|0?[1-9]):[0-5]\d\s?[ap]m|(?:1[0-2]|0?[1-9])\s?[ap]m|(?:[01]?\d|2[0-3]):[0-5]\d)\b",
    )
    .expect("valid slot regex")
});

/// Normalized slot time when an element's whole text is one time.
pub fn classify_slot_text(text: &str) -> Option<String> {
    let text = text.trim();
    WHOLE_TEXT_SLOT
        .iter()
        .any(|rx| rx.is_match(text))
        .then(|| normalize_time(text))
}

/// Every time pattern in a block of rendered text, normalized.
pub fn extract_slot_times(text: &str) -> Vec<String> {
    SLOT_IN_TEXT
        .find_iter(text)
        .map(|m| normalize_time(m.as_str()))
        .collect()
}

/// Lowercase with exactly one space before any am/pm suffix.
fn normalize_time(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    match compact.strip_suffix("am").or_else(|| compact.strip_suffix("pm")) {
        Some(clock) => format!("{} {}", clock, &compact[clock.len()..]),
        None => compact,
    }
}

/// Polls the page for the slots of the most recently activated day.
#[derive(Debug, Clone)]
pub struct SlotDetector {
    candidates: String,
    poller: Poller,
    all_surfaces: bool,
}

impl SlotDetector {
    pub fn new(selectors: &CalendarSelectors, settings: &ScanSettings) -> Self {
        Self {
            candidates: selectors.slot_candidates.clone(),
            poller: Poller::new(settings.poll_attempts, settings.poll_interval()),
            all_surfaces: settings.scan_all_frames,
        }
    }

    /// Poll until any slot shows up; empty after the attempts run out.
    pub async fn wait_for_slots(
        &self,
        page: &dyn PageSession,
        calendar: &Arc<dyn Surface>,
    ) -> SlotObservation {
        self.poller
            .until(move || async move {
                let slots = self.observe(page, calendar).await;
                (!slots.is_empty()).then_some(slots)
            })
            .await
            .unwrap_or_default()
    }

    /// One detection pass over the calendar, or every surface of the page.
    pub async fn observe(
        &self,
        page: &dyn PageSession,
        calendar: &Arc<dyn Surface>,
    ) -> SlotObservation {
        let surfaces = if self.all_surfaces {
            match page.surfaces().await {
                Ok(surfaces) => surfaces,
                Err(e) => {
                    log::debug!("Frame listing failed, scanning calendar only: {}", e);
                    vec![Arc::clone(calendar)]
                }
            }
        } else {
            vec![Arc::clone(calendar)]
        };

        let mut slots = SlotObservation::new();
        for surface in &surfaces {
            slots.extend(self.scan_elements(surface.as_ref()).await);
        }
        if !slots.is_empty() {
            return slots;
        }

        for surface in &surfaces {
            match surface.body_text().await {
                Ok(text) => extract_slot_times(&text).into_iter().for_each(|t| {
                    slots.insert(t);
                }),
                Err(e) => log::debug!("Body text of {} unavailable: {}", surface.url(), e),
            }
        }
        slots
    }

    async fn scan_elements(&self, surface: &dyn Surface) -> SlotObservation {
        match surface.query(&self.candidates).await {
            Ok(nodes) => nodes
                .iter()
                .filter(|n| n.visible)
                .filter_map(|n| classify_slot_text(&n.text))
                .collect(),
            Err(e) => {
                log::debug!("Slot candidates on {} unavailable: {}", surface.url(), e);
                SlotObservation::new()
            }
        }
    }
}
