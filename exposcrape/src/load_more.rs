use tracing::debug;

use crate::config::Heuristics;
use crate::surface::Surface;

/// Script reporting the scrollable height of the document.
pub const HEIGHT_SCRIPT: &str = "document.body.scrollHeight";

const PAGING_KEYS: [&str; 2] = ["End", "PageDown"];

/// Reveals more list items by scrolling, keyboard paging and "load more"
/// buttons.
pub struct LoadMoreDriver<'a> {
    surface: &'a dyn Surface,
    heuristics: &'a Heuristics,
}

impl<'a> LoadMoreDriver<'a> {
    pub fn new(surface: &'a dyn Surface, heuristics: &'a Heuristics) -> Self {
        Self { surface, heuristics }
    }

    /// One load-more pass. Returns true if new content appeared: either a
    /// load-more button was clicked, or the page grew taller.
    pub fn attempt_load_more(&self) -> bool {
        let pacing = &self.heuristics.pacing;
        let before = self.scroll_height();

        for script in &self.heuristics.scroll_scripts {
            if let Err(e) = self.surface.evaluate(script) {
                debug!("Scroll script failed: {}", e);
            }
            self.surface.wait(pacing.scroll);
        }

        for _ in 0..self.heuristics.key_presses {
            for key in PAGING_KEYS {
                if let Err(e) = self.surface.press_key(key) {
                    debug!("Key press {} failed: {}", key, e);
                }
                self.surface.wait(pacing.key);
            }
        }

        if self.click_load_more() {
            return true;
        }

        self.surface.wait(pacing.lazy_load);
        let after = self.scroll_height();
        debug!(?before, ?after, "Scroll height after load-more pass");
        matches!((before, after), (Some(b), Some(a)) if a > b)
    }

    fn click_load_more(&self) -> bool {
        for selector in &self.heuristics.load_more {
            if !self.surface.is_visible(selector).unwrap_or(false) {
                continue;
            }
            match self.surface.click(selector, 0) {
                Ok(()) => {
                    debug!(selector = %selector, "Clicked load-more button");
                    self.surface.wait(self.heuristics.pacing.load_more_click);
                    return true;
                }
                Err(e) => debug!(selector = %selector, "Load-more click failed: {}", e),
            }
        }
        false
    }

    fn scroll_height(&self) -> Option<f64> {
        self.surface.evaluate(HEIGHT_SCRIPT).ok()?.as_f64()
    }
}
