//! Day cell discovery.
//!
//! Widgets expose dates in different ways, so discovery is a chain of
//! strategies tried in priority order. The first strategy that yields any
//! day wins; later strategies are not consulted.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::browser::Surface;
use crate::error::Result;
use crate::models::{CalendarDay, CalendarSelectors, MonthHeader, parse_iso_date, parse_label_date};

/// One way of recognising clickable day cells.
#[async_trait]
pub trait DayStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn locate(&self, surface: &dyn Surface) -> Result<Vec<CalendarDay>>;
}

/// Cells carrying a machine-readable date attribute such as `data-date`.
#[derive(Debug, Clone)]
pub struct DateAttributeStrategy {
    cells: String,
    attribute: String,
}

impl DateAttributeStrategy {
    pub fn new(cells: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            cells: cells.into(),
            attribute: attribute.into(),
        }
    }
}

#[async_trait]
impl DayStrategy for DateAttributeStrategy {
    fn name(&self) -> &'static str {
        "date-attribute"
    }

    async fn locate(&self, surface: &dyn Surface) -> Result<Vec<CalendarDay>> {
        let nodes = surface.query(&self.cells).await?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| {
                let date = parse_iso_date(node.attr(&self.attribute)?)?;
                Some(CalendarDay::new(date, node.handle))
            })
            .collect())
    }
}

/// Elements whose `aria-label` spells out a date.
#[derive(Debug, Clone)]
pub struct AriaLabelStrategy {
    cells: String,
}

impl AriaLabelStrategy {
    pub fn new(cells: impl Into<String>) -> Self {
        Self {
            cells: cells.into(),
        }
    }
}

#[async_trait]
impl DayStrategy for AriaLabelStrategy {
    fn name(&self) -> &'static str {
        "aria-label"
    }

    async fn locate(&self, surface: &dyn Surface) -> Result<Vec<CalendarDay>> {
        let nodes = surface.query(&self.cells).await?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| {
                let date = parse_label_date(node.attr("aria-label")?)?;
                Some(CalendarDay::new(date, node.handle))
            })
            .collect())
    }
}

/// Bare day numbers combined with the month/year caption.
#[derive(Debug, Clone)]
pub struct MonthHeaderStrategy {
    headers: Vec<String>,
    cells: String,
}

impl MonthHeaderStrategy {
    pub fn new(headers: Vec<String>, cells: impl Into<String>) -> Self {
        Self {
            headers,
            cells: cells.into(),
        }
    }

    /// First caption, across the header locations in order, that parses.
    pub async fn read_header(&self, surface: &dyn Surface) -> Option<MonthHeader> {
        for selector in &self.headers {
            let nodes = match surface.query(selector).await {
                Ok(nodes) => nodes,
                Err(e) => {
                    log::debug!("Month header '{}' unusable: {}", selector, e);
                    continue;
                }
            };
            if let Some(header) = nodes.iter().find_map(|n| MonthHeader::parse(&n.text)) {
                return Some(header);
            }
        }
        None
    }
}

#[async_trait]
impl DayStrategy for MonthHeaderStrategy {
    fn name(&self) -> &'static str {
        "month-header"
    }

    async fn locate(&self, surface: &dyn Surface) -> Result<Vec<CalendarDay>> {
        let Some(header) = self.read_header(surface).await else {
            return Ok(Vec::new());
        };
        let nodes = surface.query(&self.cells).await?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| {
                let date = header.day_from_text(&node.text)?;
                Some(CalendarDay::new(date, node.handle))
            })
            .collect())
    }
}

/// Ordered strategies with first-non-empty-wins semantics.
pub struct DayLocatorChain {
    strategies: Vec<Box<dyn DayStrategy>>,
}

impl DayLocatorChain {
    pub fn new(strategies: Vec<Box<dyn DayStrategy>>) -> Self {
        Self { strategies }
    }

    /// Default chain: date attribute, then aria-label, then caption + day number.
    pub fn from_selectors(selectors: &CalendarSelectors) -> Self {
        Self::new(vec![
            Box::new(DateAttributeStrategy::new(
                &selectors.date_attribute_cells,
                &selectors.date_attribute,
            )),
            Box::new(AriaLabelStrategy::new(&selectors.aria_label_cells)),
            Box::new(MonthHeaderStrategy::new(
                selectors.month_headers.clone(),
                &selectors.day_number_cells,
            )),
        ])
    }

    /// Days of the current view, deduplicated and sorted ascending.
    pub async fn locate(&self, surface: &dyn Surface) -> Vec<CalendarDay> {
        self.locate_with_strategy(surface)
            .await
            .map(|(_, days)| days)
            .unwrap_or_default()
    }

    /// Like [`locate`](Self::locate), also naming the strategy that produced the days.
    pub async fn locate_with_strategy(
        &self,
        surface: &dyn Surface,
    ) -> Option<(&'static str, Vec<CalendarDay>)> {
        for strategy in &self.strategies {
            match strategy.locate(surface).await {
                Ok(days) if !days.is_empty() => {
                    let days = dedupe_sorted(days);
                    log::debug!("{} strategy found {} days", strategy.name(), days.len());
                    return Some((strategy.name(), days));
                }
                Ok(_) => log::debug!("{} strategy found nothing", strategy.name()),
                Err(e) => log::debug!("{} strategy failed: {}", strategy.name(), e),
            }
        }
        None
    }
}

/// Keep the first cell per date, then sort by date.
pub fn dedupe_sorted(days: Vec<CalendarDay>) -> Vec<CalendarDay> {
    let mut seen = HashSet::new();
    let mut unique: Vec<CalendarDay> = days.into_iter().filter(|d| seen.insert(d.date)).collect();
    unique.sort_by_key(|d| d.date);
    unique
}
