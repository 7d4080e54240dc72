//! One scraping session over one listing: owns the loaded records, the dedup
//! index (through [`CompanyStore`]) and the compiled heuristics.

use anyhow::Result;
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::click_collect::{ClickCollector, RecordSink, VisitCounts};
use crate::config::Heuristics;
use crate::export::{export_records, ScrapeStats};
use crate::extract::EntityExtractor;
use crate::navigation::{prepare_listing, select_strategy, Strategy, StrategyKind};
use crate::record::EntityRecord;
use crate::store::{Acceptance, CompanyStore, StoreError, StorePaths};
use crate::surface::Surface;

impl RecordSink for CompanyStore {
    fn offer(&mut self, record: EntityRecord) -> Result<Acceptance> {
        Ok(self.accept(record)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub strategy: StrategyKind,
    pub counts: VisitCounts,
    /// Records in the store after the run, including earlier runs.
    pub total_stored: usize,
}

pub struct ScraperSession {
    heuristics: Arc<Heuristics>,
    listing_url: String,
    store: CompanyStore,
    extractor: EntityExtractor,
    progress: Option<ProgressBar>,
}

impl ScraperSession {
    /// Open the session, loading whatever earlier runs stored for this site.
    pub fn open(heuristics: Arc<Heuristics>, listing_url: &str, output_dir: &Path) -> Result<Self, StoreError> {
        let store = CompanyStore::open(output_dir, listing_url, heuristics.social.clone())?;
        let extractor = EntityExtractor::new(Arc::clone(&heuristics));
        Ok(Self {
            heuristics,
            listing_url: listing_url.to_string(),
            store,
            extractor,
            progress: None,
        })
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Scrape the listing through `surface`.
    ///
    /// Failing to load the listing aborts the run; any failure while handling
    /// a single entity only skips that entity.
    pub fn run(&mut self, surface: &dyn Surface) -> Result<RunSummary> {
        let listing = prepare_listing(surface, &self.heuristics, &self.listing_url)?;
        let strategy = select_strategy(surface, &self.heuristics, &listing);
        let kind = strategy.kind();
        info!("Using {} strategy", kind);

        let counts = match strategy {
            Strategy::DirectLinks(urls) => self.visit_links(surface, &urls),
            Strategy::ClickAndCollect { item_selector, .. } => {
                let mut collector =
                    ClickCollector::new(surface, &self.heuristics, &self.extractor, listing.as_str(), item_selector);
                if let Some(pb) = &self.progress {
                    collector = collector.with_progress(pb);
                }
                collector.run(&mut self.store)
            }
            Strategy::SingleSurface => {
                let mut counts = VisitCounts::default();
                let outcome = self
                    .extractor
                    .extract(surface, &listing)
                    .and_then(|record| self.store.offer(record));
                if let Err(e) = &outcome {
                    warn!("Failed to extract listing page: {}", e);
                }
                counts.tally(&outcome);
                counts
            }
        };

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }

        Ok(RunSummary {
            strategy: kind,
            counts,
            total_stored: self.store.len(),
        })
    }

    fn visit_links(&mut self, surface: &dyn Surface, urls: &[String]) -> VisitCounts {
        let mut counts = VisitCounts::default();
        if let Some(pb) = &self.progress {
            pb.set_length(urls.len() as u64);
        }

        for (position, url) in urls.iter().enumerate() {
            info!("Processing company {}/{}: {}", position + 1, urls.len(), url);
            let outcome = self.visit_link(surface, url);
            if let Err(e) = &outcome {
                warn!("Skipping {}: {}", url, e);
            }
            counts.tally(&outcome);

            if let Some(pb) = &self.progress {
                pb.inc(1);
                pb.set_message(format!("{} saved", counts.accepted));
            }
        }
        counts
    }

    fn visit_link(&mut self, surface: &dyn Surface, url: &str) -> Result<Acceptance> {
        surface.navigate(url)?;
        surface.wait(self.heuristics.pacing.navigation);
        let record = self.extractor.extract(surface, url)?;
        self.store.offer(record)
    }

    pub fn listing_url(&self) -> &str {
        &self.listing_url
    }

    pub fn records(&self) -> &[EntityRecord] {
        self.store.records()
    }

    pub fn paths(&self) -> &StorePaths {
        self.store.paths()
    }

    pub fn stats(&self) -> ScrapeStats {
        ScrapeStats::from_records(self.store.records(), self.store.social())
    }

    /// Re-export every stored record to `csv_path` and a sibling `.json`.
    pub fn export(&self, csv_path: &Path) -> Result<(), StoreError> {
        export_records(csv_path, self.store.records(), self.store.social())?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        self.store.clear_all()
    }

    /// Final flush: bring the CSV in line with the document.
    pub fn finish(mut self) -> Result<ScrapeStats, StoreError> {
        self.store.reconcile()?;
        Ok(self.stats())
    }
}
