//! Click-and-collect: drive a listing whose items open their details on click,
//! either by navigating to a new page or by opening an in-place overlay.
//!
//! The per-item flow is an explicit state machine:
//!
//! ```text
//! Idle --Clicked--> ItemClicked --UrlChanged--> DetailNavigated --WentBack--> Idle
//!                               --UrlUnchanged-> OverlayOpen --CloseClicked|EscapePressed--> Idle
//! any --Failed--> Recovering --Recovered--> Idle
//! ```
//!
//! Any other event is treated as a failure.

use anyhow::{anyhow, Result};
use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::config::Heuristics;
use crate::extract::EntityExtractor;
use crate::load_more::LoadMoreDriver;
use crate::record::EntityRecord;
use crate::store::Acceptance;
use crate::surface::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickState {
    Idle,
    ItemClicked,
    DetailNavigated,
    OverlayOpen,
    Recovering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickEvent {
    Clicked,
    UrlChanged,
    UrlUnchanged,
    WentBack,
    CloseClicked,
    EscapePressed,
    Failed,
    Recovered,
}

impl ClickState {
    pub fn on(self, event: ClickEvent) -> ClickState {
        use ClickEvent::*;
        use ClickState::*;

        match (self, event) {
            (_, Failed) => Recovering,
            (Idle, Clicked) => ItemClicked,
            (ItemClicked, UrlChanged) => DetailNavigated,
            (ItemClicked, UrlUnchanged) => OverlayOpen,
            (DetailNavigated, WentBack) => Idle,
            (OverlayOpen, CloseClicked) | (OverlayOpen, EscapePressed) => Idle,
            (Recovering, Recovered) => Idle,
            _ => Recovering,
        }
    }
}

/// Receives extracted candidates.
pub trait RecordSink {
    fn offer(&mut self, record: EntityRecord) -> Result<Acceptance>;
}

/// Per-run visit counts, shared by every strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitCounts {
    pub visited: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

impl VisitCounts {
    pub fn tally(&mut self, outcome: &Result<Acceptance>) {
        self.visited += 1;
        match outcome {
            Ok(Acceptance::Accepted(_)) => self.accepted += 1,
            Ok(Acceptance::Duplicate) => self.duplicates += 1,
            Err(_) => self.failed += 1,
        }
    }
}

pub struct ClickCollector<'a> {
    surface: &'a dyn Surface,
    heuristics: &'a Heuristics,
    extractor: &'a EntityExtractor,
    listing_url: String,
    item_selector: String,
    state: ClickState,
    processed: usize,
    progress: Option<&'a ProgressBar>,
}

impl<'a> ClickCollector<'a> {
    pub fn new(
        surface: &'a dyn Surface,
        heuristics: &'a Heuristics,
        extractor: &'a EntityExtractor,
        listing_url: impl Into<String>,
        item_selector: impl Into<String>,
    ) -> Self {
        Self {
            surface,
            heuristics,
            extractor,
            listing_url: listing_url.into(),
            item_selector: item_selector.into(),
            state: ClickState::Idle,
            processed: 0,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> ClickState {
        self.state
    }

    /// Items processed so far; never decreases.
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Click through every item, loading more until the listing stops growing.
    ///
    /// Stops after `max_load_more_attempts` consecutive passes that either
    /// report no new content or leave the item count unchanged.
    pub fn run(&mut self, sink: &mut dyn RecordSink) -> VisitCounts {
        let max_misses = self.heuristics.max_load_more_attempts;
        let mut counts = VisitCounts::default();
        let mut misses = 0;
        let mut stalls = 0;
        let mut last_count = 0;

        loop {
            // Re-locate items after every pass; earlier handles may be stale.
            let count = match self.surface.count(&self.item_selector) {
                Ok(count) => count,
                Err(e) => {
                    warn!("Failed to count items '{}': {}", self.item_selector, e);
                    0
                }
            };
            if count > last_count {
                stalls = 0;
            } else if self.processed > 0 {
                stalls += 1;
            }
            last_count = count.max(last_count);

            if let Some(pb) = self.progress {
                pb.set_length(count.max(self.processed) as u64);
            }

            while self.processed < count {
                let index = self.processed;
                self.processed += 1;

                let outcome = self.process_item(index, sink);
                if let Err(e) = &outcome {
                    warn!("Skipping item {}: {}", index + 1, e);
                    self.recover();
                }
                counts.tally(&outcome);

                if let Some(pb) = self.progress {
                    pb.inc(1);
                    pb.set_message(format!("{} saved", counts.accepted));
                }
            }

            if stalls >= max_misses {
                debug!("Item count unchanged for {} passes, stopping", stalls);
                break;
            }

            if LoadMoreDriver::new(self.surface, self.heuristics).attempt_load_more() {
                misses = 0;
            } else {
                misses += 1;
                debug!("No new content ({}/{})", misses, max_misses);
                if misses >= max_misses {
                    break;
                }
            }
        }

        info!(
            "Click-and-collect finished: {} items, {} saved, {} duplicates, {} failed",
            counts.visited, counts.accepted, counts.duplicates, counts.failed
        );
        counts
    }

    fn transition(&mut self, event: ClickEvent) {
        let next = self.state.on(event);
        debug!(from = ?self.state, ?event, to = ?next, "Click state");
        self.state = next;
    }

    /// The outcome is the sink's verdict; failing to leave the detail view
    /// afterwards only triggers recovery.
    fn process_item(&mut self, index: usize, sink: &mut dyn RecordSink) -> Result<Acceptance> {
        self.surface.click(&self.item_selector, index)?;
        self.transition(ClickEvent::Clicked);
        self.surface.wait(self.heuristics.pacing.click);

        let url = self.surface.current_url()?;
        if url != self.listing_url {
            self.transition(ClickEvent::UrlChanged);
            let record = self.extractor.extract(self.surface, &url)?;
            let offered = sink.offer(record);

            match self.surface.go_back() {
                Ok(()) => {
                    self.surface.wait(self.heuristics.pacing.navigation);
                    self.transition(ClickEvent::WentBack);
                }
                Err(e) => {
                    warn!("Failed to return from {}: {}", url, e);
                    self.recover();
                }
            }
            offered
        } else {
            self.transition(ClickEvent::UrlUnchanged);
            let record = self.extractor.extract(self.surface, &self.listing_url)?;
            let offered = sink.offer(record);

            if let Err(e) = self.dismiss_overlay() {
                warn!("{}", e);
                self.recover();
            }
            offered
        }
    }

    /// First visible close button, otherwise Escape.
    fn dismiss_overlay(&mut self) -> Result<()> {
        let heuristics = self.heuristics;
        for selector in &heuristics.close_overlay {
            if !self.surface.is_visible(selector).unwrap_or(false) {
                continue;
            }
            if self.surface.click(selector, 0).is_ok() {
                self.surface.wait(heuristics.pacing.dismiss);
                self.transition(ClickEvent::CloseClicked);
                return Ok(());
            }
        }

        self.surface
            .press_key("Escape")
            .map_err(|e| anyhow!("Failed to dismiss overlay: {}", e))?;
        self.surface.wait(self.heuristics.pacing.dismiss);
        self.transition(ClickEvent::EscapePressed);
        Ok(())
    }

    /// Return to the listing if the surface drifted away from it.
    fn recover(&mut self) {
        self.transition(ClickEvent::Failed);
        match self.surface.current_url() {
            Ok(url) if url == self.listing_url => {}
            _ => {
                warn!("Returning to listing {}", self.listing_url);
                match self.surface.navigate(&self.listing_url) {
                    Ok(()) => self.surface.wait(self.heuristics.pacing.settle),
                    Err(e) => warn!("Recovery navigation failed: {}", e),
                }
            }
        }
        self.transition(ClickEvent::Recovered);
    }
}
