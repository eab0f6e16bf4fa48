//! Headless Chromium backend over the DevTools protocol.
//!
//! Frames are driven through their own execution contexts, so cross-origin
//! widgets need site isolation disabled at launch. Element handles are ids in
//! a registry kept inside each frame's JavaScript realm; a handle whose node
//! was removed resolves to "detached" instead of a different element.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{AddScriptToEvaluateOnNewDocumentParams, FrameId};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::browser::{BrowserSession, ElementHandle, ElementNode, PageSession, Surface};
use crate::error::{AppError, Result};
use crate::models::BrowserSettings;

const STEALTH_SCRIPT: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

/// Registry lookup shared by every handle-based script.
const RESOLVE_HANDLE: &str = "const reg = window.__slotscan; \
     const el = reg && reg.refs.get(__HANDLE__); \
     if (!el || !el.isConnected) return 'detached';";

/// A launched browser process plus its CDP event loop.
pub struct ChromeBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
    timezone: String,
    stealth: bool,
}

impl ChromeBrowser {
    /// Launch Chromium with the configured flags; the timezone is applied per page.
    pub async fn launch(settings: &BrowserSettings, timezone: &str) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.window_size.0, settings.window_size.1)
            .args(launch_args(settings));
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(AppError::browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(AppError::browser)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser event error: {}", e);
                }
            }
        });

        log::info!(
            "Launched Chromium ({}, {}x{})",
            if settings.headless { "headless" } else { "headed" },
            settings.window_size.0,
            settings.window_size.1
        );
        Ok(Self {
            browser,
            handler,
            timezone: timezone.to_string(),
            stealth: settings.stealth,
        })
    }

    /// Close the browser process and stop the event loop.
    pub async fn close(mut self) -> Result<()> {
        let closed = self.browser.close().await.map_err(AppError::browser);
        if let Err(e) = self.browser.wait().await {
            log::debug!("Waiting for browser exit failed: {}", e);
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}

/// Command-line flags for the browser process.
pub fn launch_args(settings: &BrowserSettings) -> Vec<String> {
    let mut args = vec![
        format!("--lang={}", settings.locale),
        format!("--user-agent={}", settings.user_agent),
        "--disable-features=IsolateOrigins,site-per-process".to_string(),
        "--disable-site-isolation-trials".to_string(),
    ];
    if settings.stealth {
        args.push("--disable-blink-features=AutomationControlled".to_string());
    }
    args.extend(settings.extra_args.iter().cloned());
    args
}

#[async_trait]
impl BrowserSession for ChromeBrowser {
    async fn open_page(&self) -> Result<Box<dyn PageSession>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(AppError::browser)?;

        let prepared = self.prepare(&page).await;
        release_on_error(prepared, async {
            page.clone().close().await.map_err(AppError::browser)
        })
        .await?;

        Ok(Box::new(ChromePage { page }))
    }
}

impl ChromeBrowser {
    /// Per-page emulation: stealth script and timezone.
    async fn prepare(&self, page: &Page) -> Result<()> {
        if self.stealth {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
                .await
                .map_err(AppError::browser)?;
        }
        page.execute(SetTimezoneOverrideParams::new(self.timezone.clone()))
            .await
            .map_err(AppError::browser)?;
        Ok(())
    }
}

/// Run `release` when `result` failed, keeping the original error.
async fn release_on_error<T>(
    result: Result<T>,
    release: impl Future<Output = Result<()>>,
) -> Result<T> {
    if result.is_err() {
        if let Err(e) = release.await {
            log::debug!("Releasing page after setup failure failed: {}", e);
        }
    }
    result
}

struct ChromePage {
    page: Page,
}

#[async_trait]
impl PageSession for ChromePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| AppError::navigation(url, e))?;
        Ok(())
    }

    async fn surfaces(&self) -> Result<Vec<Arc<dyn Surface>>> {
        let main = self.page.mainframe().await.map_err(AppError::browser)?;
        let mut frames = self.page.frames().await.map_err(AppError::browser)?;
        if let Some(main) = main {
            frames.retain(|f| *f != main);
            frames.insert(0, main);
        }

        let mut surfaces: Vec<Arc<dyn Surface>> = Vec::with_capacity(frames.len());
        for frame in frames {
            let url = self
                .page
                .frame_url(frame.clone())
                .await
                .map_err(AppError::browser)?
                .unwrap_or_default();
            surfaces.push(Arc::new(ChromeFrame {
                page: self.page.clone(),
                frame,
                url,
            }));
        }
        Ok(surfaces)
    }

    async fn close(&self) -> Result<()> {
        self.page.clone().close().await.map_err(AppError::browser)
    }
}

struct ChromeFrame {
    page: Page,
    frame: FrameId,
    url: String,
}

#[derive(Deserialize)]
struct RawNode {
    handle: String,
    text: String,
    visible: bool,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl ChromeFrame {
    async fn evaluate<T: DeserializeOwned + Send>(&self, expression: String) -> Result<T> {
        let context = self
            .page
            .frame_execution_context(self.frame.clone())
            .await
            .map_err(AppError::script)?
            .ok_or_else(|| AppError::script(format!("no execution context for {}", self.url)))?;

        let params = EvaluateParams::builder()
            .expression(expression)
            .context_id(context)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(AppError::script)?;

        self.page
            .evaluate_expression(params)
            .await
            .map_err(AppError::script)?
            .into_value()
            .map_err(AppError::script)
    }

    /// Run a handle-scoped script body that returns a status string.
    async fn with_handle(&self, handle: &ElementHandle, body: &str) -> Result<()> {
        let resolve = RESOLVE_HANDLE.replace("__HANDLE__", &js_string(handle.as_str()));
        let status: String = self
            .evaluate(format!("(() => {{ {resolve} {body} }})()"))
            .await?;
        match status.as_str() {
            "ok" => Ok(()),
            "detached" => Err(AppError::element(format!(
                "element {handle} is detached from {}",
                self.url
            ))),
            "disabled" => Err(AppError::element(format!("element {handle} is disabled"))),
            other => Err(AppError::script(format!("unexpected status '{other}'"))),
        }
    }
}

#[async_trait]
impl Surface for ChromeFrame {
    fn url(&self) -> &str {
        &self.url
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementNode>> {
        let nodes: Vec<RawNode> = self.evaluate(query_script(selector)).await?;
        Ok(nodes
            .into_iter()
            .map(|raw| ElementNode {
                handle: ElementHandle::new(raw.handle),
                text: raw.text,
                visible: raw.visible,
                attributes: raw.attributes,
            })
            .collect())
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<()> {
        self.with_handle(
            handle,
            "el.scrollIntoView({ block: 'center', inline: 'center' }); return 'ok';",
        )
        .await
    }

    async fn click(&self, handle: &ElementHandle, timeout: Duration) -> Result<()> {
        let body = "if (el.disabled === true || el.getAttribute('aria-disabled') === 'true') return 'disabled'; \
             for (const type of ['pointerdown', 'mousedown', 'pointerup', 'mouseup']) { \
               el.dispatchEvent(new MouseEvent(type, { bubbles: true, cancelable: true, view: window })); \
             } \
             el.click(); return 'ok';";
        tokio::time::timeout(timeout, self.with_handle(handle, body))
            .await
            .map_err(|_| {
                AppError::timeout(format!("click on {handle} exceeded {}ms", timeout.as_millis()))
            })?
    }

    async fn body_text(&self) -> Result<String> {
        self.evaluate("document.body ? document.body.innerText : ''".to_string())
            .await
    }
}

/// JSON-quote a string for embedding in a script.
fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn query_script(selector: &str) -> String {
    format!(
        r#"(() => {{
  const reg = (window.__slotscan = window.__slotscan || {{ seq: 0, refs: new Map(), ids: new WeakMap() }});
  return Array.from(document.querySelectorAll({selector})).map((el) => {{
    let id = reg.ids.get(el);
    if (id === undefined) {{
      id = String(++reg.seq);
      reg.ids.set(el, id);
      reg.refs.set(id, el);
    }}
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    const attributes = {{}};
    for (const name of el.getAttributeNames()) attributes[name] = el.getAttribute(name);
    return {{
      handle: id,
      text: (el.textContent || '').trim(),
      visible: style.display !== 'none' && style.visibility !== 'hidden' && rect.width > 0 && rect.height > 0,
      attributes,
    }};
  }});
}})()"#,
        selector = js_string(selector)
    )
}
