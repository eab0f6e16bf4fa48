// src/lib.rs

//! Slotscan Library
//!
//! Finds the earliest day with enough bookable time slots on embedded
//! scheduling widgets, driving a browser through a calendar month by month.

pub mod browser;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
