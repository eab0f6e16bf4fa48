//! Link target data structure.

use serde::{Deserialize, Serialize};

/// A scheduling page to scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkTarget {
    /// Unique display label
    pub name: String,

    /// Page hosting the booking widget
    pub url: String,
}

impl LinkTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}
