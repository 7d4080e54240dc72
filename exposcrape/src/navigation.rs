//! Listing preparation and navigation-strategy selection.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

use crate::config::Heuristics;
use crate::surface::Surface;
use crate::url_utils::normalize_url;

/// How entities on a listing are reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Detail pages linked from the listing, in discovery order.
    DirectLinks(Vec<String>),
    /// No usable links; repeated items must be clicked in place.
    ClickAndCollect { item_selector: String, item_count: usize },
    /// The listing itself is the only entity surface.
    SingleSurface,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::DirectLinks(_) => StrategyKind::DirectLinks,
            Strategy::ClickAndCollect { .. } => StrategyKind::ClickAndCollect,
            Strategy::SingleSurface => StrategyKind::SingleSurface,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    DirectLinks,
    ClickAndCollect,
    SingleSurface,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::DirectLinks => write!(f, "direct-link"),
            StrategyKind::ClickAndCollect => write!(f, "click-and-collect"),
            StrategyKind::SingleSurface => write!(f, "single-surface"),
        }
    }
}

/// Load the listing, let it settle and clear any consent banner.
///
/// Returns the URL the listing ended up at. Failure to load is fatal for the
/// run.
pub fn prepare_listing(surface: &dyn Surface, heuristics: &Heuristics, listing_url: &str) -> Result<String> {
    info!("Loading listing {}", listing_url);
    surface
        .navigate(listing_url)
        .with_context(|| format!("Failed to load listing {}", listing_url))?;
    surface.wait(heuristics.pacing.settle);
    dismiss_cookie_consent(surface, heuristics);
    surface.current_url()
}

/// Click the first visible consent button, if any.
pub fn dismiss_cookie_consent(surface: &dyn Surface, heuristics: &Heuristics) -> bool {
    for selector in &heuristics.cookie_consent {
        match surface.is_visible(selector) {
            Ok(true) => match surface.click(selector, 0) {
                Ok(()) => {
                    info!("Dismissed cookie consent via {}", selector);
                    surface.wait(heuristics.pacing.dismiss);
                    return true;
                }
                Err(e) => debug!(selector = %selector, "Consent click failed: {}", e),
            },
            Ok(false) => {}
            Err(e) => debug!(selector = %selector, "Consent check failed: {}", e),
        }
    }
    false
}

/// Detail-page URLs linked from the listing, deduplicated by exact string.
pub fn find_company_links(surface: &dyn Surface, heuristics: &Heuristics, listing_url: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for selector in &heuristics.company_links {
        let count = match surface.count(selector) {
            Ok(count) => count,
            Err(e) => {
                debug!(selector = %selector, "Link selector failed: {}", e);
                continue;
            }
        };

        for index in 0..count {
            let href = match surface.attribute(selector, index, "href") {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    debug!(selector = %selector, index, "Failed to read href: {}", e);
                    continue;
                }
            };

            let lower = href.to_lowercase();
            if heuristics.skip_patterns.iter().any(|p| lower.contains(p.as_str())) {
                continue;
            }
            let Some(url) = normalize_url(&href, listing_url) else {
                continue;
            };
            if url == listing_url || !heuristics.detail_patterns.iter().any(|re| re.is_match(&url)) {
                continue;
            }
            if seen.insert(url.clone()) {
                links.push(url);
            }
        }
    }

    debug!("Found {} company links", links.len());
    links
}

/// First item selector repeated at least `min_list_items` times.
pub fn find_repeated_items(surface: &dyn Surface, heuristics: &Heuristics) -> Option<(String, usize)> {
    heuristics.items.iter().find_map(|selector| match surface.count(selector) {
        Ok(count) if count >= heuristics.min_list_items => Some((selector.clone(), count)),
        Ok(_) => None,
        Err(e) => {
            debug!(selector = %selector, "Item selector failed: {}", e);
            None
        }
    })
}

/// Decide once per run how the listing's entities are reached.
pub fn select_strategy(surface: &dyn Surface, heuristics: &Heuristics, listing_url: &str) -> Strategy {
    let links = find_company_links(surface, heuristics, listing_url);
    if !links.is_empty() {
        info!("Found {} company detail links", links.len());
        return Strategy::DirectLinks(links);
    }

    if let Some((item_selector, item_count)) = find_repeated_items(surface, heuristics) {
        info!(
            "No detail links; {} repeated items match '{}', switching to click-and-collect",
            item_count, item_selector
        );
        return Strategy::ClickAndCollect {
            item_selector,
            item_count,
        };
    }

    info!("No links or repeated items found, treating listing as a single entity page");
    Strategy::SingleSurface
}
