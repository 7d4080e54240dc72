//! The page-rendering capability the scraper drives.
//!
//! Everything the pipeline does to a page goes through [`Surface`]: navigate,
//! wait, evaluate a script, query elements by selector, read attributes and
//! text, click, press keys, read the current URL and go back. Nothing else is
//! assumed about the renderer, so a headless browser ([`crate::browser`]) and a
//! static HTML snapshot ([`HtmlSurface`]) are interchangeable.
//!
//! Selectors are CSS with one extension: a trailing `:has-text("...")` keeps
//! only elements whose inner text contains the quoted text, case-insensitively.

use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// A rendered page that can be inspected and driven.
pub trait Surface {
    /// Load `url` and wait for the navigation to complete.
    fn navigate(&self, url: &str) -> Result<()>;

    /// Suspend for `duration` to let rendering settle.
    fn wait(&self, duration: Duration);

    /// Run a script in the page and return its JSON result.
    fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Number of elements matching `selector`.
    fn count(&self, selector: &str) -> Result<usize>;

    /// Attribute `name` of the `index`-th match, if the element and attribute exist.
    fn attribute(&self, selector: &str, index: usize, name: &str) -> Result<Option<String>>;

    /// Rendered text of the `index`-th match.
    fn inner_text(&self, selector: &str, index: usize) -> Result<Option<String>>;

    /// Whether the first match exists and is displayed.
    fn is_visible(&self, selector: &str) -> Result<bool>;

    /// Click the `index`-th match.
    fn click(&self, selector: &str, index: usize) -> Result<()>;

    /// Press a named key (`"Escape"`, `"End"`, `"PageDown"`).
    fn press_key(&self, key: &str) -> Result<()>;

    /// URL currently displayed.
    fn current_url(&self) -> Result<String>;

    /// Return to the previous history entry.
    fn go_back(&self) -> Result<()>;
}

/// Split a selector into its CSS part and an optional `:has-text("...")` filter.
///
/// The returned filter text is lower-cased.
pub fn split_text_filter(selector: &str) -> (&str, Option<String>) {
    let trimmed = selector.trim();
    if let Some(start) = trimmed.rfind(":has-text(") {
        let tail = &trimmed[start + ":has-text(".len()..];
        if let Some(inner) = tail.strip_suffix(')') {
            let text = inner.trim().trim_matches(|c| c == '"' || c == '\'');
            return (trimmed[..start].trim_end(), Some(text.to_lowercase()));
        }
    }
    (trimmed, None)
}

/// Static, multi-page surface over saved HTML.
///
/// Pages are keyed by URL. Clicking an element that carries an `href` follows
/// it; anything else is a no-op click. Scripts are not executed: the only
/// script understood is a `scrollHeight` query, which reports the size of the
/// current document.
pub struct HtmlSurface {
    pages: RefCell<HashMap<String, String>>,
    history: RefCell<Vec<String>>,
}

impl HtmlSurface {
    pub fn new() -> Self {
        Self {
            pages: RefCell::new(HashMap::new()),
            history: RefCell::new(Vec::new()),
        }
    }

    /// Surface holding a single page, not yet navigated to.
    pub fn single(url: &str, html: impl Into<String>) -> Self {
        let surface = Self::new();
        surface.insert_page(url, html);
        surface
    }

    /// Surface whose only page is read from a saved HTML file.
    pub fn from_file(url: &str, path: &Path) -> Result<Self> {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read HTML snapshot: {}", path.display()))?;
        Ok(Self::single(url, html))
    }

    /// Add or replace the page served at `url`.
    pub fn insert_page(&self, url: &str, html: impl Into<String>) {
        self.pages.borrow_mut().insert(url.to_string(), html.into());
    }

    /// Remove the page served at `url`; later navigation to it fails.
    pub fn remove_page(&self, url: &str) {
        self.pages.borrow_mut().remove(url);
    }

    fn current_html(&self) -> Result<String> {
        let history = self.history.borrow();
        let url = history.last().ok_or_else(|| anyhow!("No page loaded"))?;
        self.pages
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("Page {} is no longer available", url))
    }

    /// Run `f` over every element matching `selector` in the current page.
    fn with_matches<T>(&self, selector: &str, f: impl FnOnce(Vec<ElementRef<'_>>) -> T) -> Result<T> {
        let html = self.current_html()?;
        let document = Html::parse_document(&html);
        let (css, text_filter) = split_text_filter(selector);
        let parsed = Selector::parse(css)
            .map_err(|e| anyhow!("Invalid selector '{}': {:?}", css, e))?;
        let matches: Vec<ElementRef<'_>> = document
            .select(&parsed)
            .filter(|el| match &text_filter {
                Some(text) => element_text(el).to_lowercase().contains(text.as_str()),
                None => true,
            })
            .collect();
        Ok(f(matches))
    }
}

impl Default for HtmlSurface {
    fn default() -> Self {
        Self::new()
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Surface for HtmlSurface {
    fn navigate(&self, url: &str) -> Result<()> {
        if !self.pages.borrow().contains_key(url) {
            return Err(anyhow!("Failed to navigate to {}: page not found", url));
        }
        self.history.borrow_mut().push(url.to_string());
        Ok(())
    }

    fn wait(&self, _duration: Duration) {}

    fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        if script.contains("scrollHeight") && !script.contains("scrollTo") && !script.contains('=') {
            let html = self.current_html()?;
            return Ok(serde_json::json!(html.len()));
        }
        Ok(serde_json::Value::Null)
    }

    fn count(&self, selector: &str) -> Result<usize> {
        self.with_matches(selector, |matches| matches.len())
    }

    fn attribute(&self, selector: &str, index: usize, name: &str) -> Result<Option<String>> {
        self.with_matches(selector, |matches| {
            matches
                .get(index)
                .and_then(|el| el.value().attr(name))
                .map(str::to_string)
        })
    }

    fn inner_text(&self, selector: &str, index: usize) -> Result<Option<String>> {
        self.with_matches(selector, |matches| matches.get(index).map(element_text))
    }

    fn is_visible(&self, selector: &str) -> Result<bool> {
        Ok(self.count(selector)? > 0)
    }

    fn click(&self, selector: &str, index: usize) -> Result<()> {
        let href = self.with_matches(selector, |matches| {
            matches
                .get(index)
                .map(|el| el.value().attr("href").map(str::to_string))
        })?;
        match href {
            None => Err(anyhow!("No element {} for selector '{}'", index, selector)),
            Some(None) => Ok(()),
            Some(Some(href)) => {
                let current = self.current_url()?;
                let target = Url::parse(&current)
                    .and_then(|base| base.join(&href))
                    .map(String::from)
                    .unwrap_or(href);
                self.navigate(&target)
            }
        }
    }

    fn press_key(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        self.history
            .borrow()
            .last()
            .cloned()
            .ok_or_else(|| anyhow!("No page loaded"))
    }

    fn go_back(&self) -> Result<()> {
        let mut history = self.history.borrow_mut();
        if history.len() < 2 {
            return Err(anyhow!("No previous page in history"));
        }
        history.pop();
        Ok(())
    }
}
