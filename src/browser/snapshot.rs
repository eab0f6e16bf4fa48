//! Static HTML backend.
//!
//! Serves saved documents through the [`Surface`] and [`PageSession`] traits.
//! A surface can hold several named views; clicking an element with an `id`
//! may switch the surface to another view, which is enough to replay a
//! calendar widget's month and day transitions offline.
//!
//! Layout is not computed. An element counts as hidden when it or an ancestor
//! carries `hidden`, `aria-hidden="true"`, or an inline `display:none` /
//! `visibility:hidden` style.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use scraper::node::Element;
use scraper::{ElementRef, Html, Selector};

use crate::browser::{BrowserSession, ElementHandle, ElementNode, PageSession, Surface};
use crate::error::{AppError, Result};

/// Name of the view a surface starts in.
pub const INITIAL_VIEW: &str = "initial";

/// One document with optional alternate views.
#[derive(Debug)]
pub struct SnapshotSurface {
    url: String,
    views: HashMap<String, String>,
    transitions: HashMap<(String, String), String>,
    current: Mutex<String>,
    clicks: Mutex<Vec<String>>,
}

impl SnapshotSurface {
    /// Surface whose initial view is the given HTML.
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            views: HashMap::from([(INITIAL_VIEW.to_string(), html.into())]),
            transitions: HashMap::new(),
            current: Mutex::new(INITIAL_VIEW.to_string()),
            clicks: Mutex::new(Vec::new()),
        }
    }

    /// Surface read from a saved HTML file.
    pub fn from_file(url: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let html = std::fs::read_to_string(path)?;
        Ok(Self::new(url, html))
    }

    /// Add an alternate view.
    pub fn with_view(mut self, name: impl Into<String>, html: impl Into<String>) -> Self {
        self.views.insert(name.into(), html.into());
        self
    }

    /// Switch to `target` when the element with `element_id` is clicked in `view`.
    pub fn on_click(
        mut self,
        view: impl Into<String>,
        element_id: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.transitions
            .insert((view.into(), element_id.into()), target.into());
        self
    }

    /// Name of the view currently shown.
    pub fn current_view(&self) -> String {
        lock(&self.current).clone()
    }

    /// Handles of every successful click, in order.
    pub fn clicks(&self) -> Vec<String> {
        lock(&self.clicks).clone()
    }

    fn reset(&self) {
        *lock(&self.current) = INITIAL_VIEW.to_string();
    }

    fn current_html(&self) -> Result<(String, String)> {
        let view = self.current_view();
        let html = self
            .views
            .get(&view)
            .cloned()
            .ok_or_else(|| AppError::browser(format!("snapshot view '{view}' is not defined")))?;
        Ok((view, html))
    }

    /// Resolve a handle against the current view, returning the element's id and attributes.
    fn resolve(&self, handle: &ElementHandle) -> Result<ResolvedElement> {
        let (view, html) = self.current_html()?;
        let document = Html::parse_document(&html);
        let found = elements_in_order(&document)
            .into_iter()
            .enumerate()
            .find(|(ordinal, el)| handle_for(el, &view, *ordinal) == *handle)
            .map(|(_, el)| ResolvedElement {
                view: view.clone(),
                id: el.value().id().map(str::to_string),
                disabled: el.value().attr("disabled").is_some()
                    || el.value().attr("aria-disabled") == Some("true"),
            });

        found.ok_or_else(|| {
            AppError::element(format!("element {handle} is detached from {}", self.url))
        })
    }
}

struct ResolvedElement {
    view: String,
    id: Option<String>,
    disabled: bool,
}

#[async_trait]
impl Surface for SnapshotSurface {
    fn url(&self) -> &str {
        &self.url
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementNode>> {
        let (view, html) = self.current_html()?;
        query_html(&html, &view, selector)
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<()> {
        self.resolve(handle).map(|_| ())
    }

    async fn click(&self, handle: &ElementHandle, _timeout: Duration) -> Result<()> {
        let element = self.resolve(handle)?;
        if element.disabled {
            return Err(AppError::element(format!("element {handle} is disabled")));
        }

        lock(&self.clicks).push(handle.to_string());
        if let Some(id) = element.id {
            if let Some(target) = self.transitions.get(&(element.view, id)) {
                *lock(&self.current) = target.clone();
            }
        }
        Ok(())
    }

    async fn body_text(&self) -> Result<String> {
        let (_, html) = self.current_html()?;
        Ok(document_text(&Html::parse_document(&html)))
    }
}

/// A page: top-level document plus embedded frames.
#[derive(Debug, Clone)]
pub struct SnapshotSite {
    url: String,
    surfaces: Vec<Arc<SnapshotSurface>>,
}

impl SnapshotSite {
    /// Site whose top-level document is `top`; the site URL is the document's URL.
    pub fn new(top: SnapshotSurface) -> Self {
        Self {
            url: top.url.clone(),
            surfaces: vec![Arc::new(top)],
        }
    }

    /// Attach an embedded frame.
    pub fn with_frame(mut self, frame: SnapshotSurface) -> Self {
        self.surfaces.push(Arc::new(frame));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Shared handle to one of the site's surfaces, top-level document at 0.
    pub fn surface(&self, index: usize) -> Option<Arc<SnapshotSurface>> {
        self.surfaces.get(index).cloned()
    }
}

/// Browser over a fixed set of sites; unknown URLs fail to load.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBrowser {
    sites: Arc<Vec<SnapshotSite>>,
}

impl SnapshotBrowser {
    pub fn new(sites: Vec<SnapshotSite>) -> Self {
        Self {
            sites: Arc::new(sites),
        }
    }
}

#[async_trait]
impl BrowserSession for SnapshotBrowser {
    async fn open_page(&self) -> Result<Box<dyn PageSession>> {
        Ok(Box::new(SnapshotTab {
            sites: Arc::clone(&self.sites),
            loaded: Mutex::new(None),
        }))
    }
}

struct SnapshotTab {
    sites: Arc<Vec<SnapshotSite>>,
    loaded: Mutex<Option<SnapshotSite>>,
}

#[async_trait]
impl PageSession for SnapshotTab {
    async fn goto(&self, url: &str) -> Result<()> {
        let site = self
            .sites
            .iter()
            .find(|site| site.url == url)
            .cloned()
            .ok_or_else(|| AppError::navigation(url, "net::ERR_NAME_NOT_RESOLVED"))?;

        for surface in &site.surfaces {
            surface.reset();
        }
        *lock(&self.loaded) = Some(site);
        Ok(())
    }

    async fn surfaces(&self) -> Result<Vec<Arc<dyn Surface>>> {
        let loaded = lock(&self.loaded);
        let site = loaded
            .as_ref()
            .ok_or_else(|| AppError::browser("no page loaded"))?;
        Ok(site
            .surfaces
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn Surface>)
            .collect())
    }

    async fn close(&self) -> Result<()> {
        *lock(&self.loaded) = None;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Every element of the document in tree order.
fn elements_in_order(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

/// Handles prefer the element id so they survive view switches that keep it.
fn handle_for(el: &ElementRef<'_>, view: &str, ordinal: usize) -> ElementHandle {
    match el.value().id() {
        Some(id) => ElementHandle::new(format!("#{id}")),
        None => ElementHandle::new(format!("@{view}:{ordinal}")),
    }
}

fn query_html(html: &str, view: &str, selector: &str) -> Result<Vec<ElementNode>> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let ordinals: HashMap<_, _> = elements_in_order(&document)
        .into_iter()
        .enumerate()
        .map(|(ordinal, el)| (el.id(), ordinal))
        .collect();

    Ok(document
        .select(&selector)
        .map(|el| {
            let ordinal = ordinals.get(&el.id()).copied().unwrap_or_default();
            ElementNode {
                handle: handle_for(&el, view, ordinal),
                text: el.text().collect::<String>().trim().to_string(),
                visible: is_visible(el),
                attributes: el
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            }
        })
        .collect())
}

fn is_visible(el: ElementRef<'_>) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .all(|e| !hides(e.value()))
}

fn hides(el: &Element) -> bool {
    if el.attr("hidden").is_some() || el.attr("aria-hidden") == Some("true") {
        return true;
    }
    let style: String = el
        .attr("style")
        .unwrap_or_default()
        .to_lowercase()
        .split_whitespace()
        .collect();
    style.contains("display:none") || style.contains("visibility:hidden")
}

/// Body text with one space between text nodes; script and style are skipped.
fn document_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_code = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|e| matches!(e.value().name(), "script" | "style" | "noscript"));
        let text = text.trim();
        if !in_code && !text.is_empty() {
            parts.push(text.to_string());
        }
    }
    parts.join(" ")
}
