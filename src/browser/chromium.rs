//! Chromium over the DevTools protocol.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    Cookie, CookieParam, CookieSameSite, TimeSinceEpoch,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::browser::{CookieRecord, Surface};
use crate::error::BrowserError;

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 800;

const FONT_WEIGHT_JS: &str = "function() { return window.getComputedStyle(this).fontWeight; }";
const CLICK_JS: &str = "function() { this.click(); }";
const CLEAR_JS: &str = "function() { \
    if ('value' in this) { this.value = ''; } else { this.textContent = ''; } \
    this.dispatchEvent(new Event('input', { bubbles: true })); }";

/// Assigns the text in page script and fires `input` so the page's editor
/// state picks it up.
fn fill_js(text: &str) -> Result<String, BrowserError> {
    let literal = serde_json::to_string(text)
        .map_err(|e| BrowserError::Protocol(format!("unencodable text: {e}")))?;
    Ok(format!(
        "function() {{ \
         if ('value' in this) {{ this.value = {literal}; }} else {{ this.textContent = {literal}; }} \
         this.dispatchEvent(new Event('input', {{ bubbles: true }})); }}"
    ))
}

fn protocol(e: CdpError) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

/// One browser with one page.
pub struct ChromiumSurface {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSurface {
    /// Launch a browser and open a blank page.
    pub async fn launch(headless: bool) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage");
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler error");
                }
            }
            tracing::debug!("Browser handler ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        tracing::info!(headless, "Browser launched");
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Close the browser and stop the event handler.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "Browser did not close cleanly");
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

fn to_record(cookie: Cookie) -> CookieRecord {
    CookieRecord {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires: cookie.expires,
        http_only: cookie.http_only,
        secure: cookie.secure,
        same_site: cookie.same_site.map(|s| s.as_ref().to_string()),
    }
}

fn to_param(record: &CookieRecord) -> Result<CookieParam, BrowserError> {
    let mut builder = CookieParam::builder()
        .name(record.name.clone())
        .value(record.value.clone())
        .domain(record.domain.clone())
        .path(record.path.clone())
        .http_only(record.http_only)
        .secure(record.secure);
    if record.expires > 0.0 {
        builder = builder.expires(TimeSinceEpoch::new(record.expires));
    }
    if let Some(same_site) = record.same_site.as_deref().and_then(|s| s.parse::<CookieSameSite>().ok()) {
        builder = builder.same_site(same_site);
    }
    builder.build().map_err(BrowserError::Protocol)
}

#[async_trait]
impl Surface for ChromiumSurface {
    type Node = Element;

    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(protocol(e)),
            Err(_) => Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.page.url().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn query_all(&self, scope: Option<&Element>, selector: &str) -> Result<Vec<Element>, BrowserError> {
        match scope {
            Some(element) => element.find_elements(selector).await.map_err(protocol),
            None => self.page.find_elements(selector).await.map_err(protocol),
        }
    }

    async fn text(&self, node: &Element) -> Result<String, BrowserError> {
        Ok(node.inner_text().await.map_err(protocol)?.unwrap_or_default())
    }

    async fn attribute(&self, node: &Element, name: &str) -> Result<Option<String>, BrowserError> {
        node.attribute(name).await.map_err(protocol)
    }

    async fn font_weight(&self, node: &Element) -> Result<u32, BrowserError> {
        let returns = node.call_js_fn(FONT_WEIGHT_JS, false).await.map_err(protocol)?;
        let weight = match returns.result.value {
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            Some(serde_json::Value::Number(n)) => n.as_u64().map(|n| n as u32),
            _ => None,
        };
        weight.ok_or_else(|| BrowserError::Protocol("font weight unavailable".into()))
    }

    async fn scroll_into_view(&self, node: &Element) -> Result<(), BrowserError> {
        node.scroll_into_view().await.map_err(protocol)?;
        Ok(())
    }

    async fn click(&self, node: &Element) -> Result<(), BrowserError> {
        node.click().await.map_err(protocol)?;
        Ok(())
    }

    async fn script_click(&self, node: &Element) -> Result<(), BrowserError> {
        node.call_js_fn(CLICK_JS, false).await.map_err(protocol)?;
        Ok(())
    }

    async fn clear(&self, node: &Element) -> Result<(), BrowserError> {
        node.call_js_fn(CLEAR_JS, false).await.map_err(protocol)?;
        Ok(())
    }

    async fn type_text(&self, node: &Element, text: &str) -> Result<(), BrowserError> {
        node.type_str(text).await.map_err(protocol)?;
        Ok(())
    }

    async fn set_text_content(&self, node: &Element, text: &str) -> Result<(), BrowserError> {
        node.call_js_fn(fill_js(text)?, false).await.map_err(protocol)?;
        Ok(())
    }

    async fn press_enter(&self, node: &Element) -> Result<(), BrowserError> {
        node.press_key("Enter").await.map_err(protocol)?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(protocol)
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError> {
        let cookies = self.page.get_cookies().await.map_err(protocol)?;
        Ok(cookies.into_iter().map(to_record).collect())
    }

    async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<(), BrowserError> {
        let params = cookies.iter().map(to_param).collect::<Result<Vec<_>, _>>()?;
        self.page.set_cookies(params).await.map_err(protocol)?;
        Ok(())
    }
}
