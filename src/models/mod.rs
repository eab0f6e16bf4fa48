// src/models/mod.rs

//! Domain models for the scanner.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod calendar;
mod config;
mod link;
mod result;
mod selectors;

// Re-export all public types
pub use calendar::{
    CalendarDay, MonthHeader, SlotObservation, month_index_from_name, parse_iso_date,
    parse_label_date,
};
pub use config::{BrowserSettings, Config, ScanSettings};
pub use link::LinkTarget;
pub use result::{ScanOutcome, ScanResult};
pub use selectors::{CalendarSelectors, ControlSelector};
