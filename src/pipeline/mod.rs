//! Pipeline entry points for scanner operations.
//!
//! - `run_scan`: Scan every configured link and collect one result per link
//! - `run_inspect`: Run the locator stages once against saved HTML
//! - `CalendarScanner`: The per-link state machine both build on

pub mod inspect;
pub mod run;
pub mod scanner;

pub use inspect::{InspectReport, run_inspect};
pub use run::run_scan;
pub use scanner::CalendarScanner;
