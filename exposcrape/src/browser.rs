//! Headless Chrome implementation of [`Surface`].
//!
//! Chrome operations are blocking; callers run the session inside
//! `tokio::task::spawn_blocking`. DOM queries are injected as JavaScript so
//! that the `:has-text(...)` selector extension behaves the same as in
//! [`crate::surface::HtmlSurface`].

use anyhow::{anyhow, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::BrowserConfig;
use crate::surface::{split_text_filter, Surface};

/// A launched Chrome process and the single tab the scraper drives.
pub struct ChromeSurface {
    // Dropping the browser kills the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSurface {
    /// Launch Chrome with the configured options and open one tab.
    ///
    /// The sandbox is disabled inside containers (detected via /.dockerenv or
    /// the EXPOSCRAPE_CONTAINER env var). CHROME_PATH overrides binary discovery.
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let is_container = std::env::var("EXPOSCRAPE_CONTAINER").is_ok()
            || std::path::Path::new("/.dockerenv").exists();
        let chrome_path: Option<PathBuf> = std::env::var("CHROME_PATH").ok().map(PathBuf::from);

        let args: Vec<OsString> = config.extra_args.iter().map(OsString::from).collect();
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(!is_container)
            .path(chrome_path)
            .window_size(Some((config.window_width, config.window_height)))
            .idle_browser_timeout(Duration::from_secs(config.timeout_secs.max(1) * 10))
            .args(args.iter().map(|a| a.as_os_str()).collect())
            .build()
            .map_err(|e| anyhow!("Failed to build Chrome launch options: {}", e))?;

        let browser = Browser::new(options)
            .map_err(|e| anyhow!("Failed to launch headless Chrome: {}", e))?;
        let tab = browser
            .new_tab()
            .map_err(|e| anyhow!("Failed to create browser tab: {}", e))?;
        tab.set_default_timeout(Duration::from_secs(config.timeout_secs));
        tab.set_user_agent(&config.user_agent, None, None)
            .map_err(|e| anyhow!("Failed to set user agent: {}", e))?;

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn run_query(&self, selector: &str, body: &str) -> Result<serde_json::Value> {
        self.evaluate(&query_script(selector, body))
    }
}

/// Wrap `body` in a function that has `els` bound to the matches of `selector`.
/// Invalid selectors evaluate to `null` instead of throwing.
fn query_script(selector: &str, body: &str) -> String {
    let (css, text_filter) = split_text_filter(selector);
    let css_json = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
    let text_json = match text_filter {
        Some(text) => serde_json::to_string(&text).unwrap_or_else(|_| "null".to_string()),
        None => "null".to_string(),
    };
    format!(
        r#"(() => {{
    try {{
        const text = {text_json};
        let els = Array.from(document.querySelectorAll({css_json}));
        if (text !== null) {{
            els = els.filter(e => (e.innerText || e.textContent || '').toLowerCase().includes(text));
        }}
        {body}
    }} catch (err) {{
        return null;
    }}
}})()"#
    )
}

impl Surface for ChromeSurface {
    fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| anyhow!("Page failed to load for {}: {}", url, e))?;
        Ok(())
    }

    fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(|e| anyhow!("Script evaluation failed: {}", e))?;
        Ok(remote.value.unwrap_or(serde_json::Value::Null))
    }

    fn count(&self, selector: &str) -> Result<usize> {
        let value = self.run_query(selector, "return els.length;")?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    fn attribute(&self, selector: &str, index: usize, name: &str) -> Result<Option<String>> {
        let name_json = serde_json::to_string(name)?;
        let body = format!("const e = els[{index}]; return e ? e.getAttribute({name_json}) : null;");
        let value = self.run_query(selector, &body)?;
        Ok(value.as_str().map(str::to_string))
    }

    fn inner_text(&self, selector: &str, index: usize) -> Result<Option<String>> {
        let body = format!("const e = els[{index}]; return e ? (e.innerText || e.textContent || '') : null;");
        let value = self.run_query(selector, &body)?;
        Ok(value.as_str().map(str::to_string))
    }

    fn is_visible(&self, selector: &str) -> Result<bool> {
        let body = r#"const e = els[0];
        if (!e) { return false; }
        const r = e.getBoundingClientRect();
        const s = window.getComputedStyle(e);
        return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';"#;
        let value = self.run_query(selector, body)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn click(&self, selector: &str, index: usize) -> Result<()> {
        let body = format!(
            "const e = els[{index}]; if (!e) {{ return false; }} e.scrollIntoView({{block: 'center'}}); e.click(); return true;"
        );
        let value = self.run_query(selector, &body)?;
        if value.as_bool() != Some(true) {
            return Err(anyhow!("No clickable element {} for selector '{}'", index, selector));
        }
        debug!(selector, index, "Clicked element");
        Ok(())
    }

    fn press_key(&self, key: &str) -> Result<()> {
        self.tab
            .press_key(key)
            .map_err(|e| anyhow!("Failed to press {}: {}", key, e))?;
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    fn go_back(&self) -> Result<()> {
        self.evaluate("window.history.back()")?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| anyhow!("Failed to return to previous page: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_script_escapes_selector() {
        let script = query_script(r#"a[href*="exhibitor"]"#, "return els.length;");
        assert!(script.contains(r#"document.querySelectorAll("a[href*=\"exhibitor\"]")"#));
        assert!(script.contains("const text = null;"));
        assert!(script.contains("return els.length;"));
    }

    #[test]
    fn test_query_script_with_text_filter() {
        let script = query_script(r#"button:has-text("Load More")"#, "return els.length;");
        assert!(script.contains(r#"document.querySelectorAll("button")"#));
        assert!(script.contains(r#"const text = "load more";"#));
    }
}
