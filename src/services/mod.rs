//! Service layer for the scanner.
//!
//! This module contains the scan engine building blocks:
//! - Calendar frame selection (`FrameSelector`)
//! - Consent banner dismissal (`ConsentDismisser`)
//! - Day cell discovery (`DayLocatorChain`)
//! - Month pagination (`MonthPaginator`)
//! - Time slot detection (`SlotDetector`)

mod consent;
mod days;
mod frames;
mod paginator;
mod poll;
mod slots;

pub use consent::ConsentDismisser;
pub use days::{
    AriaLabelStrategy, DateAttributeStrategy, DayLocatorChain, DayStrategy, MonthHeaderStrategy,
    dedupe_sorted,
};
pub use frames::FrameSelector;
pub use paginator::MonthPaginator;
pub use poll::Poller;
pub use slots::{SlotDetector, classify_slot_text, extract_slot_times};
