//! A scripted listing for driving click-and-collect without a browser.
//!
//! Items are `.company-card` divs with no links. Clicking one either opens an
//! in-place dialog (overlay mode) or navigates to a detail page. Only `batch`
//! items are shown at a time; a "Load more" button reveals the next batch, or,
//! for scroll-only listings, scrolling to the bottom does.

use anyhow::{anyhow, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::time::Duration;

use exposcrape::surface::{HtmlSurface, Surface};

pub const LISTING_URL: &str = "https://fair.test/exhibitors";
pub const ITEM_SELECTOR: &str = ".company-card";

#[derive(Debug, Clone)]
pub struct FakeCompany {
    pub name: String,
    pub website: String,
    pub phone: String,
}

impl FakeCompany {
    pub fn new(name: &str) -> Self {
        let slug = slug(name);
        Self {
            name: name.to_string(),
            website: format!("https://{}.test", slug),
            phone: "+39 06 1234 5678".to_string(),
        }
    }
}

pub fn companies(names: &[&str]) -> Vec<FakeCompany> {
    names.iter().map(|n| FakeCompany::new(n)).collect()
}

fn slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

pub fn detail_url(company: &FakeCompany) -> String {
    format!("https://fair.test/stand/{}", slug(&company.name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailMode {
    Overlay,
    Page,
}

pub struct FakeListing {
    inner: HtmlSurface,
    companies: Vec<FakeCompany>,
    mode: DetailMode,
    batch: usize,
    visible: Cell<usize>,
    overlay: Cell<Option<usize>>,
    failing: HashSet<usize>,
    broken_back: HashSet<usize>,
    close_button: bool,
    scroll_only: bool,
    listing_loads: Cell<usize>,
    clicks: RefCell<Vec<usize>>,
    escapes: Cell<usize>,
}

impl FakeListing {
    pub fn new(companies: Vec<FakeCompany>, mode: DetailMode, batch: usize) -> Self {
        let listing = Self {
            inner: HtmlSurface::new(),
            visible: Cell::new(batch.min(companies.len())),
            companies,
            mode,
            batch,
            overlay: Cell::new(None),
            failing: HashSet::new(),
            broken_back: HashSet::new(),
            close_button: true,
            scroll_only: false,
            listing_loads: Cell::new(0),
            clicks: RefCell::new(Vec::new()),
            escapes: Cell::new(0),
        };
        for company in &listing.companies {
            listing.inner.insert_page(&detail_url(company), detail_html(company));
        }
        listing.render();
        listing
    }

    /// Clicking the item at `index` (0-based) fails. In page mode the click
    /// still navigates to the detail page before reporting the error.
    pub fn failing_on(mut self, index: usize) -> Self {
        self.failing.insert(index);
        self
    }

    /// Going back from the detail page of item `index` fails.
    pub fn broken_back_on(mut self, index: usize) -> Self {
        self.broken_back.insert(index);
        self
    }

    /// No load-more button; a scroll-to-bottom script reveals the next batch.
    pub fn scroll_only(mut self) -> Self {
        self.scroll_only = true;
        self.render();
        self
    }

    /// Times the listing URL was navigated to.
    pub fn listing_loads(&self) -> usize {
        self.listing_loads.get()
    }

    /// Overlays can only be dismissed with Escape.
    pub fn without_close_button(mut self) -> Self {
        self.close_button = false;
        self
    }

    /// Item indices clicked, in order.
    pub fn clicks(&self) -> Vec<usize> {
        self.clicks.borrow().clone()
    }

    pub fn escapes(&self) -> usize {
        self.escapes.get()
    }

    pub fn overlay_open(&self) -> bool {
        self.overlay.get().is_some()
    }

    fn render(&self) {
        let mut html = String::from("<html><body><h1>Exhibitors</h1><div class=\"grid\">");
        for (i, company) in self.companies.iter().take(self.visible.get()).enumerate() {
            html.push_str(&format!(
                "<div class=\"company-card\" data-index=\"{}\">{}</div>",
                i, company.name
            ));
        }
        html.push_str("</div>");
        if self.visible.get() < self.companies.len() && !self.scroll_only {
            html.push_str("<button class=\"more\" data-load-more=\"1\">Load more</button>");
        }
        if let Some(open) = self.overlay.get() {
            html.push_str(&overlay_html(&self.companies[open], self.close_button));
        }
        html.push_str("</body></html>");
        self.inner.insert_page(LISTING_URL, html);
    }

    fn on_listing(&self) -> bool {
        self.inner.current_url().map(|u| u == LISTING_URL).unwrap_or(false)
    }

    fn reveal_next_batch(&self) {
        let next = (self.visible.get() + self.batch).min(self.companies.len());
        self.visible.set(next);
        self.render();
    }
}

fn detail_html(company: &FakeCompany) -> String {
    format!(
        r#"<html><body>
            <a href="https://fair.test/exhibitors">Back</a>
            <h1>{name}</h1>
            <div class="contact"><a href="tel:{phone}">Call</a></div>
            <a href="{website}" target="_blank">Website</a>
        </body></html>"#,
        name = company.name,
        phone = company.phone,
        website = company.website
    )
}

fn overlay_html(company: &FakeCompany, close_button: bool) -> String {
    let close = if close_button {
        r#"<button class="close-button" data-close="1">Close</button>"#
    } else {
        ""
    };
    format!(
        r#"<div role="dialog" class="modal">
            <h2>{name}</h2>
            <a href="tel:{phone}">Call</a>
            <a href="{website}" target="_blank">Website</a>
            {close}
        </div>"#,
        name = company.name,
        phone = company.phone,
        website = company.website,
        close = close
    )
}

impl Surface for FakeListing {
    fn navigate(&self, url: &str) -> Result<()> {
        if url == LISTING_URL {
            self.listing_loads.set(self.listing_loads.get() + 1);
            self.overlay.set(None);
            self.render();
        }
        self.inner.navigate(url)
    }

    fn wait(&self, _duration: Duration) {}

    fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        if self.scroll_only && script.contains("scrollTo(") && self.on_listing() {
            self.reveal_next_batch();
        }
        self.inner.evaluate(script)
    }

    fn count(&self, selector: &str) -> Result<usize> {
        self.inner.count(selector)
    }

    fn attribute(&self, selector: &str, index: usize, name: &str) -> Result<Option<String>> {
        self.inner.attribute(selector, index, name)
    }

    fn inner_text(&self, selector: &str, index: usize) -> Result<Option<String>> {
        self.inner.inner_text(selector, index)
    }

    fn is_visible(&self, selector: &str) -> Result<bool> {
        self.inner.is_visible(selector)
    }

    fn click(&self, selector: &str, index: usize) -> Result<()> {
        if !self.on_listing() {
            return self.inner.click(selector, index);
        }

        if selector == ITEM_SELECTOR {
            let item: usize = self
                .inner
                .attribute(selector, index, "data-index")?
                .ok_or_else(|| anyhow!("No item {}", index))?
                .parse()?;
            self.clicks.borrow_mut().push(item);
            if self.failing.contains(&item) {
                if self.mode == DetailMode::Page {
                    self.inner.navigate(&detail_url(&self.companies[item]))?;
                    return Err(anyhow!("Timed out waiting for item {} to open", item));
                }
                return Err(anyhow!("Element {} detached from the page", item));
            }
            return match self.mode {
                DetailMode::Overlay => {
                    self.overlay.set(Some(item));
                    self.render();
                    Ok(())
                }
                DetailMode::Page => self.inner.navigate(&detail_url(&self.companies[item])),
            };
        }

        if self.inner.attribute(selector, index, "data-close")?.is_some() {
            self.overlay.set(None);
            self.render();
            return Ok(());
        }
        if self.inner.attribute(selector, index, "data-load-more")?.is_some() {
            self.reveal_next_batch();
            return Ok(());
        }
        self.inner.click(selector, index)
    }

    fn press_key(&self, key: &str) -> Result<()> {
        if key == "Escape" && self.overlay.get().is_some() {
            self.escapes.set(self.escapes.get() + 1);
            self.overlay.set(None);
            self.render();
        }
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        self.inner.current_url()
    }

    fn go_back(&self) -> Result<()> {
        let url = self.inner.current_url()?;
        let broken = self
            .broken_back
            .iter()
            .any(|&item| detail_url(&self.companies[item]) == url);
        if broken {
            return Err(anyhow!("No history entry to return to from {}", url));
        }
        self.inner.go_back()
    }
}
